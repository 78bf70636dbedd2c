//! Feature encoding: one-hot expansion of the symptom fields followed by
//! per-column standardization.
//!
//! Both halves are fitted once and then applied unchanged to training rows,
//! held-out rows and new observations alike. Column identity and order are
//! fixed by `fit`.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use soy_core::{Error, Result, SymptomRecord, SYMPTOM_FIELDS};
use std::collections::BTreeSet;
use tracing::debug;

/// Values observed for one symptom field during fitting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct FieldCategories {
    field: String,
    /// Sorted, distinct
    values: Vec<String>,
}

/// One-hot encoder with a vocabulary learned per symptom field.
///
/// Unseen values encode to all zeros for their field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    fields: Vec<FieldCategories>,
}

impl OneHotEncoder {
    /// Learns the distinct values of every symptom field in `records`.
    pub fn fit<'a, I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a SymptomRecord>,
    {
        let mut observed: Vec<BTreeSet<String>> = vec![BTreeSet::new(); SYMPTOM_FIELDS.len()];
        let mut count = 0usize;

        for record in records {
            record.validate()?;
            for (set, spec) in observed.iter_mut().zip(SYMPTOM_FIELDS.iter()) {
                if let Some(value) = record.get(spec.name) {
                    set.insert(value.to_string());
                }
            }
            count += 1;
        }

        if count == 0 {
            return Err(Error::Training("cannot fit encoder on zero records".to_string()));
        }

        let fields: Vec<FieldCategories> = SYMPTOM_FIELDS
            .iter()
            .zip(observed)
            .map(|(spec, values)| FieldCategories {
                field: spec.name.to_string(),
                values: values.into_iter().collect(),
            })
            .collect();

        let encoder = Self { fields };
        debug!(
            "Encoder fitted on {} records: {} output columns",
            count,
            encoder.n_features()
        );
        Ok(encoder)
    }

    /// Width of an encoded vector
    pub fn n_features(&self) -> usize {
        self.fields.iter().map(|f| f.values.len()).sum()
    }

    /// Number of symptom fields covered
    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }

    /// Column names in output order, `field_value`
    pub fn feature_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .flat_map(|f| f.values.iter().map(move |v| format!("{}_{}", f.field, v)))
            .collect()
    }

    /// Values learned for `field`, sorted
    pub fn categories(&self, field: &str) -> Option<&[String]> {
        self.fields
            .iter()
            .find(|f| f.field == field)
            .map(|f| f.values.as_slice())
    }

    /// Encodes one record. Fails only on a missing field.
    pub fn encode(&self, record: &SymptomRecord) -> Result<Array1<f64>> {
        record.validate()?;

        let mut encoded = Array1::zeros(self.n_features());
        let mut offset = 0;

        for field in &self.fields {
            let value = record.get(&field.field).ok_or_else(|| {
                Error::SchemaMismatch(format!("missing required fields: {}", field.field))
            })?;

            if let Ok(pos) = field.values.binary_search_by(|v| v.as_str().cmp(value)) {
                encoded[offset + pos] = 1.0;
            }
            offset += field.values.len();
        }

        Ok(encoded)
    }

    /// Encodes many records into a row-per-record matrix
    pub fn encode_batch<'a, I>(&self, records: I) -> Result<Array2<f64>>
    where
        I: IntoIterator<Item = &'a SymptomRecord>,
    {
        let width = self.n_features();
        let mut data = Vec::new();
        let mut rows = 0;

        for record in records {
            data.extend(self.encode(record)?.iter().copied());
            rows += 1;
        }

        Array2::from_shape_vec((rows, width), data)
            .map_err(|e| Error::Training(format!("Failed to build encoded matrix: {e}")))
    }
}

/// Per-column standardization with statistics from the fitting matrix only.
///
/// Columns with zero variance at fit time scale to 0 for every input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    std: Array1<f64>,
}

impl StandardScaler {
    /// Computes column means and (population) standard deviations
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(Error::Training("cannot fit scaler on zero rows".to_string()));
        }

        let n = x.nrows() as f64;
        let mean = x.sum_axis(Axis(0)) / n;
        let std = x
            .axis_iter(Axis(1))
            .zip(mean.iter())
            .map(|(column, &m)| {
                let var = column.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
                var.sqrt()
            })
            .collect::<Array1<f64>>();

        Ok(Self { mean, std })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn std(&self) -> &Array1<f64> {
        &self.std
    }

    /// Scales one encoded vector
    pub fn transform(&self, x: ArrayView1<f64>) -> Result<Array1<f64>> {
        if x.len() != self.n_features() {
            return Err(Error::InvalidArgument(format!(
                "scaler expects {} columns, got {}",
                self.n_features(),
                x.len()
            )));
        }

        Ok(x
            .iter()
            .zip(self.mean.iter().zip(self.std.iter()))
            .map(|(&v, (&m, &s))| if s > 0.0 { (v - m) / s } else { 0.0 })
            .collect())
    }

    /// Scales every row of `x`
    pub fn transform_batch(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut out = Array2::zeros(x.raw_dim());
        for (row_in, mut row_out) in x.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
            row_out.assign(&self.transform(row_in)?);
        }
        Ok(out)
    }
}

/// Encoder and scaler fitted together, applied together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCodec {
    pub encoder: OneHotEncoder,
    pub scaler: StandardScaler,
}

impl FeatureCodec {
    /// Pairs an encoder with a scaler fitted on its output
    pub fn new(encoder: OneHotEncoder, scaler: StandardScaler) -> Result<Self> {
        if encoder.n_features() != scaler.n_features() {
            return Err(Error::Training(format!(
                "encoder produces {} columns but scaler expects {}",
                encoder.n_features(),
                scaler.n_features()
            )));
        }
        Ok(Self { encoder, scaler })
    }

    /// Fits both halves on the same records
    pub fn fit<'a, I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a SymptomRecord> + Clone,
    {
        let encoder = OneHotEncoder::fit(records.clone())?;
        let encoded = encoder.encode_batch(records)?;
        let scaler = StandardScaler::fit(&encoded)?;
        Self::new(encoder, scaler)
    }

    pub fn n_features(&self) -> usize {
        self.encoder.n_features()
    }

    /// Encode then scale one record
    pub fn transform(&self, record: &SymptomRecord) -> Result<Array1<f64>> {
        let encoded = self.encoder.encode(record)?;
        self.scaler.transform(encoded.view())
    }

    /// Encode then scale many records
    pub fn transform_batch<'a, I>(&self, records: I) -> Result<Array2<f64>>
    where
        I: IntoIterator<Item = &'a SymptomRecord>,
    {
        let encoded = self.encoder.encode_batch(records)?;
        self.scaler.transform_batch(&encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    fn record_with(overrides: &[(&str, &str)]) -> SymptomRecord {
        let mut pairs: Vec<(String, String)> = SYMPTOM_FIELDS
            .iter()
            .map(|spec| (spec.name.to_string(), spec.choices[0].to_string()))
            .collect();
        for (field, value) in overrides {
            if let Some(pair) = pairs.iter_mut().find(|(f, _)| f == field) {
                pair.1 = value.to_string();
            }
        }
        SymptomRecord::from_pairs(pairs)
    }

    fn fitted_encoder() -> OneHotEncoder {
        let records = vec![
            record_with(&[("precip", "lt-norm")]),
            record_with(&[("precip", "gt-norm"), ("roots", "abnormal")]),
            record_with(&[("precip", "norm")]),
        ];
        OneHotEncoder::fit(&records).unwrap()
    }

    #[test]
    fn test_encoder_columns() {
        let encoder = fitted_encoder();
        // 33 single-valued fields, precip with 3 values, roots with 2
        assert_eq!(encoder.n_fields(), 35);
        assert_eq!(encoder.n_features(), 33 + 3 + 2);
        assert_eq!(
            encoder.categories("precip").unwrap(),
            &["gt-norm".to_string(), "lt-norm".to_string(), "norm".to_string()]
        );

        let names = encoder.feature_names();
        assert_eq!(names.len(), encoder.n_features());
        assert_eq!(names[0], "date_april");
        assert!(names.contains(&"precip_gt-norm".to_string()));
    }

    #[test]
    fn test_encode_one_hot_per_field() {
        let encoder = fitted_encoder();
        let encoded = encoder.encode(&record_with(&[("precip", "norm")])).unwrap();
        assert_eq!(encoded.sum(), 35.0);
    }

    #[test]
    fn test_unseen_value_encodes_to_zero() {
        let encoder = fitted_encoder();
        let encoded = encoder
            .encode(&record_with(&[("precip", "monsoon")]))
            .unwrap();

        // precip columns follow date, plant-stand (one value each)
        let precip = encoded.slice(ndarray::s![2..5]);
        assert!(precip.iter().all(|&v| v == 0.0));
        assert_eq!(encoded.sum(), 34.0);
    }

    #[test]
    fn test_encode_missing_field_is_schema_mismatch() {
        let encoder = fitted_encoder();
        let record = SymptomRecord::from_pairs([("date", "april")]);
        assert!(matches!(encoder.encode(&record), Err(Error::SchemaMismatch(_))));
    }

    #[test]
    fn test_fit_on_nothing_fails() {
        let records: Vec<SymptomRecord> = Vec::new();
        assert!(OneHotEncoder::fit(&records).is_err());
    }

    #[test]
    fn test_scaler_standardizes_columns() {
        let x = array![[1.0, 0.0], [3.0, 0.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        assert_eq!(scaler.mean(), &array![2.0, 0.0]);
        assert_eq!(scaler.std(), &array![1.0, 0.0]);

        let scaled = scaler.transform_batch(&x).unwrap();
        assert_eq!(scaled, array![[-1.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn test_zero_variance_column_scales_to_zero() {
        let x = array![[5.0, 1.0], [5.0, 2.0]];
        let scaler = StandardScaler::fit(&x).unwrap();

        for value in [-100.0, 0.0, 5.0, 42.0] {
            let scaled = scaler.transform(array![value, 1.5].view()).unwrap();
            assert_eq!(scaled[0], 0.0);
        }
    }

    #[test]
    fn test_scaler_rejects_wrong_width() {
        let scaler = StandardScaler::fit(&array![[1.0, 2.0]]).unwrap();
        assert!(scaler.transform(array![1.0].view()).is_err());
    }

    #[test]
    fn test_codec_width_mismatch_rejected() {
        let encoder = fitted_encoder();
        let scaler = StandardScaler::fit(&array![[1.0, 2.0]]).unwrap();
        assert!(FeatureCodec::new(encoder, scaler).is_err());
    }

    #[test]
    fn test_codec_transform_matches_batch() {
        let records = vec![
            record_with(&[("precip", "lt-norm")]),
            record_with(&[("precip", "gt-norm"), ("roots", "abnormal")]),
        ];
        let codec = FeatureCodec::fit(&records).unwrap();
        let batch = codec.transform_batch(&records).unwrap();
        let single = codec.transform(&records[1]).unwrap();
        assert_eq!(batch.row(1), single);
    }

    proptest! {
        #[test]
        fn prop_encoding_is_idempotent(choice in proptest::collection::vec(0usize..4, 35)) {
            let encoder = fitted_encoder();
            let record = SymptomRecord::from_pairs(
                SYMPTOM_FIELDS.iter().zip(choice.iter()).map(|(spec, &c)| {
                    (spec.name, spec.choices[c % spec.choices.len()])
                }),
            );

            let first = encoder.encode(&record).unwrap();
            let second = encoder.encode(&record).unwrap();
            prop_assert_eq!(first.len(), encoder.n_features());
            prop_assert_eq!(first, second);
        }
    }
}
