//! # Format Parsers
//!
//! Tolerant parsers for the heterogeneous source formats an annotation
//! bundle is built from:
//!
//! - [`sdf`]: structure-data (SDF) files, `$$$$`-delimited blocks of tagged
//!   fields, optionally gzip-compressed.
//! - [`xml`]: per-spectrum XML documents discovered inside a directory by
//!   filename convention.
//!
//! Parsers produce [`RawRecord`]s: open, string-keyed mappings that preserve
//! every recognized field verbatim. Interpretation of field names is the
//! normalizer's job; the parsers know nothing about sources.
//!
//! A malformed record fails only itself. The `read_*` convenience functions
//! skip such records with a `warn!` diagnostic and report how many were
//! skipped; stream-level I/O errors abort the whole parse.

pub mod sdf;
pub mod xml;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

/// Errors raised by the format parsers
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// I/O error on the underlying byte stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parsing error from quick-xml
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// One source record could not be parsed; only that record is lost
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// A spectrum document whose mz and intensity sequences differ in length
    #[error("malformed spectrum: {mz_len} mz values but {intensity_len} intensity values")]
    MalformedSpectrum { mz_len: usize, intensity_len: usize },
}

impl FormatError {
    /// Whether this error concerns a single record (recoverable by skipping)
    /// rather than the whole stream.
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            FormatError::MalformedRecord(_) | FormatError::MalformedSpectrum { .. }
        )
    }
}

/// A raw field value as decoded from a source file
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Single text value
    Text(String),
    /// Single numeric value
    Number(f64),
    /// Accumulated multi-valued text field (e.g. synonyms, peak-list lines)
    TextList(Vec<String>),
    /// Numeric sequence (e.g. mz or intensity arrays)
    NumberList(Vec<f64>),
}

/// One raw source record: an ordered, string-keyed field mapping
///
/// Repeated insertion under the same key accumulates values into a list
/// rather than overwriting, so multi-valued fields survive parsing intact.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Insert a text value, accumulating into a list if the key repeats
    pub fn push_text(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.get_mut(key) {
            None => {
                self.fields.insert(key.to_string(), RawValue::Text(value));
            }
            Some(RawValue::Text(existing)) => {
                let first = std::mem::take(existing);
                self.fields
                    .insert(key.to_string(), RawValue::TextList(vec![first, value]));
            }
            Some(RawValue::TextList(list)) => list.push(value),
            Some(other) => {
                // Numeric slot already taken; keep the first interpretation.
                log::debug!("field '{key}' already holds {other:?}, ignoring text value");
            }
        }
    }

    /// Insert a numeric value, accumulating into a list if the key repeats
    pub fn push_number(&mut self, key: &str, value: f64) {
        match self.fields.get_mut(key) {
            None => {
                self.fields.insert(key.to_string(), RawValue::Number(value));
            }
            Some(RawValue::Number(existing)) => {
                let first = *existing;
                self.fields
                    .insert(key.to_string(), RawValue::NumberList(vec![first, value]));
            }
            Some(RawValue::NumberList(list)) => list.push(value),
            Some(other) => {
                log::debug!("field '{key}' already holds {other:?}, ignoring numeric value");
            }
        }
    }

    /// Replace a field with a numeric sequence
    pub fn set_number_list(&mut self, key: &str, values: Vec<f64>) {
        self.fields
            .insert(key.to_string(), RawValue::NumberList(values));
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.fields.get(key)
    }

    /// Single text value for a field, if it holds one
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(RawValue::Text(s)) => Some(s),
            Some(RawValue::TextList(list)) => list.first().map(String::as_str),
            _ => None,
        }
    }

    /// Numeric value for a field, parsing stored text if necessary
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.fields.get(key) {
            Some(RawValue::Number(n)) => Some(*n),
            Some(RawValue::Text(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// All text values stored under a field
    pub fn text_list(&self, key: &str) -> Vec<&str> {
        match self.fields.get(key) {
            Some(RawValue::Text(s)) => vec![s.as_str()],
            Some(RawValue::TextList(list)) => list.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Numeric sequence stored under a field
    pub fn number_list(&self, key: &str) -> Option<&[f64]> {
        match self.fields.get(key) {
            Some(RawValue::NumberList(list)) => Some(list),
            _ => None,
        }
    }

    /// Iterate over fields in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Drain an iterator of parse results, skipping per-record failures
///
/// Malformed records are logged with `warn!` and counted; stream-level
/// errors propagate. Returns the surviving records and the skipped count.
pub fn collect_records<I>(results: I) -> Result<(Vec<RawRecord>, usize), FormatError>
where
    I: IntoIterator<Item = Result<RawRecord, FormatError>>,
{
    let mut records = Vec::new();
    let mut skipped = 0usize;
    for result in results {
        match result {
            Ok(record) => records.push(record),
            Err(e) if e.is_record_error() => {
                log::warn!("skipping record: {e}");
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok((records, skipped))
}
