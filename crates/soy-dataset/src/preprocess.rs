//! Parsing and cleaning of raw comma-separated symptom rows.
//!
//! Rows with a missing value or the wrong number of columns are dropped, never
//! imputed. After cleaning, the problem is narrowed to the most frequent
//! classes.

use csv::{ReaderBuilder, StringRecord};
use soy_core::{LabelColumn, LabeledSample, SymptomRecord, NUM_SYMPTOM_FIELDS};
use std::collections::HashMap;
use tracing::{debug, info};

/// Columns per raw row: the symptom fields plus the class
pub const NUM_COLUMNS: usize = NUM_SYMPTOM_FIELDS + 1;

/// Why a row was dropped during cleaning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Row did not have exactly [`NUM_COLUMNS`] fields
    ColumnCount(usize),
    /// Row contained the missing-value marker or an empty field
    MissingValue,
    /// Row could not be read as CSV
    Malformed,
}

/// Result of parsing a raw dataset body
#[derive(Debug, Clone, Default)]
pub struct ParsedDataset {
    /// Rows that survived cleaning
    pub samples: Vec<LabeledSample>,
    /// 1-based line numbers of dropped rows with the reason
    pub dropped: Vec<(usize, DropReason)>,
}

/// Options controlling how raw rows are read
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub label_column: LabelColumn,
    pub missing_marker: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            label_column: LabelColumn::Last,
            missing_marker: "?".to_string(),
        }
    }
}

/// Parses a headerless CSV body into labelled samples, dropping dirty rows.
pub fn parse_records(body: &str, options: &ParseOptions) -> ParsedDataset {
    let mut parsed = ParsedDataset::default();

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    for (idx, result) in reader.records().enumerate() {
        let outcome = match result {
            Ok(record) => {
                let line = record.position().map_or(idx + 1, |p| p.line() as usize);
                (line, parse_row(&record, options))
            }
            Err(e) => {
                let line = e.position().map_or(idx + 1, |p| p.line() as usize);
                (line, Err(DropReason::Malformed))
            }
        };

        match outcome {
            (_, Ok(sample)) => parsed.samples.push(sample),
            (line, Err(reason)) => {
                debug!("Dropping line {}: {:?}", line, reason);
                parsed.dropped.push((line, reason));
            }
        }
    }

    if !parsed.dropped.is_empty() {
        info!(
            "Dropped {} of {} rows during cleaning",
            parsed.dropped.len(),
            parsed.dropped.len() + parsed.samples.len()
        );
    }

    parsed
}

fn parse_row(
    record: &StringRecord,
    options: &ParseOptions,
) -> std::result::Result<LabeledSample, DropReason> {
    if record.len() != NUM_COLUMNS {
        return Err(DropReason::ColumnCount(record.len()));
    }

    if record
        .iter()
        .any(|f| f.is_empty() || f == options.missing_marker)
    {
        return Err(DropReason::MissingValue);
    }

    let fields: Vec<&str> = record.iter().collect();
    let (label, symptoms) = match options.label_column {
        LabelColumn::First => (fields[0], &fields[1..]),
        LabelColumn::Last => (fields[NUM_SYMPTOM_FIELDS], &fields[..NUM_SYMPTOM_FIELDS]),
    };

    let record = SymptomRecord::from_ordered_values(symptoms)
        .map_err(|_| DropReason::ColumnCount(fields.len()))?;

    Ok(LabeledSample::new(record, label))
}

/// Counts samples per label
pub fn class_counts(samples: &[LabeledSample]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for sample in samples {
        *counts.entry(sample.label.clone()).or_insert(0) += 1;
    }
    counts
}

/// The `n` most frequent labels. Ties are broken by label name so the
/// selection is reproducible.
pub fn top_classes(samples: &[LabeledSample], n: usize) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = class_counts(samples).into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts.into_iter().take(n).map(|(label, _)| label).collect()
}

/// Keeps only samples whose label is among the `n` most frequent ones.
///
/// Every other label is discarded entirely, which narrows the classification
/// problem to `n` classes.
pub fn retain_top_classes(samples: Vec<LabeledSample>, n: usize) -> Vec<LabeledSample> {
    let keep = top_classes(&samples, n);
    let before = samples.len();

    let kept: Vec<LabeledSample> = samples
        .into_iter()
        .filter(|s| keep.contains(&s.label))
        .collect();

    if kept.len() < before {
        info!(
            "Kept {} classes ({}), discarded {} samples of other classes",
            keep.len(),
            keep.join(", "),
            before - kept.len()
        );
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &str, label: &str) -> String {
        let symptoms = vec![values; NUM_SYMPTOM_FIELDS].join(",");
        format!("{symptoms},{label}")
    }

    #[test]
    fn test_parse_clean_rows() {
        let body = format!("{}\n{}\n", row("0", "D1"), row("1", "D2"));
        let parsed = parse_records(&body, &ParseOptions::default());

        assert_eq!(parsed.samples.len(), 2);
        assert!(parsed.dropped.is_empty());
        assert_eq!(parsed.samples[0].label, "D1");
        assert_eq!(parsed.samples[1].record.get("roots"), Some("1"));
    }

    #[test]
    fn test_label_first_column() {
        let symptoms = vec!["2"; NUM_SYMPTOM_FIELDS].join(",");
        let body = format!("D4,{symptoms}");
        let options = ParseOptions {
            label_column: LabelColumn::First,
            ..ParseOptions::default()
        };

        let parsed = parse_records(&body, &options);
        assert_eq!(parsed.samples[0].label, "D4");
        assert_eq!(parsed.samples[0].record.get("date"), Some("2"));
    }

    #[test]
    fn test_drops_missing_values_and_bad_rows() {
        let mut with_missing: Vec<&str> = vec!["0"; NUM_SYMPTOM_FIELDS];
        with_missing[3] = "?";
        let body = format!(
            "{}\n{},D1\n1,2,3\n\n{}",
            row("0", "D1"),
            with_missing.join(","),
            row("1", "D2")
        );

        let parsed = parse_records(&body, &ParseOptions::default());
        assert_eq!(parsed.samples.len(), 2);
        assert_eq!(
            parsed.dropped,
            vec![(2, DropReason::MissingValue), (3, DropReason::ColumnCount(3))]
        );
    }

    #[test]
    fn test_quoted_and_padded_fields_are_unwrapped() {
        let mut values: Vec<String> = vec!["0".to_string(); NUM_SYMPTOM_FIELDS];
        values[0] = "\"3\"".to_string();
        values[1] = "  1 ".to_string();
        let body = format!("{},\"D2\"\r\n", values.join(","));

        let parsed = parse_records(&body, &ParseOptions::default());
        assert!(parsed.dropped.is_empty());
        let sample = &parsed.samples[0];
        assert_eq!(sample.label, "D2");
        assert_eq!(sample.record.get("date"), Some("3"));
        assert_eq!(sample.record.get("plant-stand"), Some("1"));
    }

    #[test]
    fn test_retain_top_classes() {
        let mut samples = Vec::new();
        for (label, count) in [("D1", 5), ("D2", 4), ("D3", 3), ("D4", 3), ("D5", 1)] {
            for _ in 0..count {
                let body = row("0", label);
                samples.extend(parse_records(&body, &ParseOptions::default()).samples);
            }
        }

        assert_eq!(top_classes(&samples, 2), vec!["D1", "D2"]);

        let kept = retain_top_classes(samples, 4);
        assert_eq!(kept.len(), 15);
        assert!(kept.iter().all(|s| s.label != "D5"));
    }

    #[test]
    fn test_top_classes_tie_break_is_stable() {
        let body = [row("0", "B"), row("0", "A"), row("0", "C")].join("\n");
        let samples = parse_records(&body, &ParseOptions::default()).samples;
        assert_eq!(top_classes(&samples, 2), vec!["A", "B"]);
    }
}
