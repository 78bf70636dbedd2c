//! Core type definitions for the soybean disease classifier.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Number of categorical symptom fields per observation
pub const NUM_SYMPTOM_FIELDS: usize = 35;

/// A categorical symptom field and the values the collection form offers for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name as it appears in records (e.g., "leaf-mild")
    pub name: &'static str,
    /// Values offered to the person filling in an observation
    pub choices: &'static [&'static str],
}

impl FieldSpec {
    const fn new(name: &'static str, choices: &'static [&'static str]) -> Self {
        Self { name, choices }
    }

    /// Whether `value` is one of the offered choices
    pub fn accepts(&self, value: &str) -> bool {
        self.choices.contains(&value)
    }
}

const YES_NO: &[&str] = &["yes", "no"];
const NORMAL_ABNORMAL: &[&str] = &["normal", "abnormal"];
const BELOW_AT_ABOVE: &[&str] = &["lt-norm", "norm", "gt-norm"];
const SEVERITY: &[&str] = &["none", "low", "medium", "high"];
const SIZES: &[&str] = &["small", "medium", "large"];

/// The symptom fields in canonical order.
pub const SYMPTOM_FIELDS: [FieldSpec; NUM_SYMPTOM_FIELDS] = [
    FieldSpec::new("date", &["april", "may", "june", "july"]),
    FieldSpec::new("plant-stand", &["normal", "lt-normal"]),
    FieldSpec::new("precip", BELOW_AT_ABOVE),
    FieldSpec::new("temp", BELOW_AT_ABOVE),
    FieldSpec::new("hail", YES_NO),
    FieldSpec::new("crop-hist", &["continuous", "previous", "none"]),
    FieldSpec::new("area-damaged", SEVERITY),
    FieldSpec::new("severity", SEVERITY),
    FieldSpec::new("seed-tmt", &["none", "tmt1", "tmt2", "tmt3"]),
    FieldSpec::new("germination", &["low", "high"]),
    FieldSpec::new("plant-growth", &["normal", "stunted", "luxuriant"]),
    FieldSpec::new("leaves", NORMAL_ABNORMAL),
    FieldSpec::new("leafspots-halo", YES_NO),
    FieldSpec::new("leafspots-marg", YES_NO),
    FieldSpec::new("leafspot-size", SIZES),
    FieldSpec::new("leaf-shread", YES_NO),
    FieldSpec::new("leaf-malf", YES_NO),
    FieldSpec::new("leaf-mild", YES_NO),
    FieldSpec::new("stem", NORMAL_ABNORMAL),
    FieldSpec::new("lodging", YES_NO),
    FieldSpec::new("stem-cankers", YES_NO),
    FieldSpec::new("canker-lesion", YES_NO),
    FieldSpec::new("fruiting-bodies", YES_NO),
    FieldSpec::new("external-decay", YES_NO),
    FieldSpec::new("mycelium", YES_NO),
    FieldSpec::new("int-discolor", YES_NO),
    FieldSpec::new("sclerotia", YES_NO),
    FieldSpec::new("fruit-pods", &["none", "few", "some", "many"]),
    FieldSpec::new("fruit-spots", YES_NO),
    FieldSpec::new("seed", NORMAL_ABNORMAL),
    FieldSpec::new("mold-growth", YES_NO),
    FieldSpec::new("seed-discolor", YES_NO),
    FieldSpec::new("seed-size", SIZES),
    FieldSpec::new("shriveling", YES_NO),
    FieldSpec::new("roots", NORMAL_ABNORMAL),
];

/// Looks up a field by name
pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    SYMPTOM_FIELDS.iter().find(|f| f.name == name)
}

/// Iterator over the canonical field names
pub fn field_names() -> impl Iterator<Item = &'static str> {
    SYMPTOM_FIELDS.iter().map(|f| f.name)
}

/// One observed plant sample: symptom field name -> observed value.
///
/// Records are built once and never mutated. A record may be incomplete;
/// [`SymptomRecord::validate`] is the gate that anything feeding the model
/// must pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymptomRecord {
    values: BTreeMap<String, String>,
}

impl SymptomRecord {
    /// Builds a record from `(field, value)` pairs. Later duplicates win.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Builds a complete record from values given in canonical field order.
    pub fn from_ordered_values<S: AsRef<str>>(values: &[S]) -> Result<Self> {
        if values.len() != NUM_SYMPTOM_FIELDS {
            return Err(Error::SchemaMismatch(format!(
                "expected {} symptom values, got {}",
                NUM_SYMPTOM_FIELDS,
                values.len()
            )));
        }

        Ok(Self::from_pairs(
            field_names().zip(values.iter().map(|v| v.as_ref().to_string())),
        ))
    }

    /// Value observed for `field`, if present
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    /// Number of fields carried (including unknown ones)
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Schema fields this record does not provide, in canonical order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        field_names()
            .filter(|name| !self.values.contains_key(*name))
            .collect()
    }

    /// Field names carried by this record that are not part of the schema
    pub fn unknown_fields(&self) -> Vec<&str> {
        self.values
            .keys()
            .map(String::as_str)
            .filter(|name| field_spec(name).is_none())
            .collect()
    }

    /// Fields whose value is outside the form vocabulary: `(field, value)`
    pub fn off_vocabulary(&self) -> Vec<(&'static str, &str)> {
        SYMPTOM_FIELDS
            .iter()
            .filter_map(|spec| {
                self.get(spec.name)
                    .filter(|value| !spec.accepts(value))
                    .map(|value| (spec.name, value))
            })
            .collect()
    }

    /// Fails with [`Error::SchemaMismatch`] listing every missing field.
    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::SchemaMismatch(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

/// A symptom record with its disease label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledSample {
    /// Observed symptoms
    pub record: SymptomRecord,
    /// Disease class (e.g., "D1")
    pub label: String,
}

impl LabeledSample {
    /// Creates a new labeled sample
    pub fn new(record: SymptomRecord, label: impl Into<String>) -> Self {
        Self {
            record,
            label: label.into(),
        }
    }
}
