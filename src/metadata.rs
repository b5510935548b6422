//! # Store Metadata
//!
//! Every annotation bundle carries exactly one immutable provenance record:
//! where the data came from, which release it was, and which organism it
//! describes. The record is validated on construction and again whenever it
//! is read back from disk, so a bundle can never circulate with provenance
//! that fails the conventions.
//!
//! Organism names follow the capitalized-genus convention: first character
//! upper-case, remainder lower-case, no whitespace ("Hsapiens"), or the
//! literal sentinel [`UNSPECIFIED_ORGANISM`].

use serde::{Deserialize, Serialize};

/// Sentinel organism value for stores not tied to one organism
pub const UNSPECIFIED_ORGANISM: &str = "Unspecified";

/// Errors raised while validating or (de)serializing store metadata
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// The metadata record violates a required convention
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error reading a metadata file
    #[error("failed to read metadata file: {0}")]
    Io(#[from] std::io::Error),
}

/// Immutable provenance record accompanying every store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Originating resource name (e.g. "HMDB")
    pub source: String,
    /// Where the source files were retrieved from
    pub url: String,
    /// Source release version
    pub source_version: String,
    /// Source release date, free-form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_date: Option<String>,
    /// Organism in capitalized-genus convention, or "Unspecified"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organism: Option<String>,
}

impl StoreMetadata {
    /// Construct and validate a metadata record
    ///
    /// `source`, `url`, and `source_version` must be non-empty.
    pub fn new(
        source: impl Into<String>,
        url: impl Into<String>,
        source_version: impl Into<String>,
    ) -> Result<Self, MetadataError> {
        let metadata = Self {
            source: source.into(),
            url: url.into(),
            source_version: source_version.into(),
            source_date: None,
            organism: None,
        };
        metadata.validate()?;
        Ok(metadata)
    }

    /// Attach a source release date
    pub fn with_source_date(mut self, date: impl Into<String>) -> Self {
        self.source_date = Some(date.into());
        self
    }

    /// Attach an organism, validating the naming convention
    pub fn with_organism(mut self, organism: impl Into<String>) -> Result<Self, MetadataError> {
        let organism = organism.into();
        validate_organism(&organism)?;
        self.organism = Some(organism);
        Ok(self)
    }

    /// Re-check every convention; used before builds and after deserialization
    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.source.trim().is_empty() {
            return Err(MetadataError::InvalidMetadata(
                "'source' must not be empty".to_string(),
            ));
        }
        if self.url.trim().is_empty() {
            return Err(MetadataError::InvalidMetadata(
                "'url' must not be empty".to_string(),
            ));
        }
        if self.source_version.trim().is_empty() {
            return Err(MetadataError::InvalidMetadata(
                "'source_version' must not be empty".to_string(),
            ));
        }
        if let Some(organism) = &self.organism {
            validate_organism(organism)?;
        }
        Ok(())
    }

    /// Serialize to JSON for `metadata.json` and Parquet footer embedding
    pub fn to_json(&self) -> Result<String, MetadataError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON, re-validating the record
    pub fn from_json(json: &str) -> Result<Self, MetadataError> {
        let metadata: Self = serde_json::from_str(json)?;
        metadata.validate()?;
        Ok(metadata)
    }
}

/// Enforce the capitalized-genus organism convention
fn validate_organism(organism: &str) -> Result<(), MetadataError> {
    if organism == UNSPECIFIED_ORGANISM {
        return Ok(());
    }
    let mut chars = organism.chars();
    let valid = match chars.next() {
        Some(first) => first.is_uppercase() && chars.all(|c| c.is_lowercase()),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(MetadataError::InvalidMetadata(format!(
            "organism '{organism}' must be capitalized (e.g. 'Hsapiens') or '{UNSPECIFIED_ORGANISM}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> StoreMetadata {
        StoreMetadata::new("HMDB", "https://hmdb.ca", "5.0").unwrap()
    }

    #[test]
    fn test_required_fields_must_be_non_empty() {
        assert!(StoreMetadata::new("", "https://hmdb.ca", "5.0").is_err());
        assert!(StoreMetadata::new("HMDB", " ", "5.0").is_err());
        assert!(StoreMetadata::new("HMDB", "https://hmdb.ca", "").is_err());
        assert!(StoreMetadata::new("HMDB", "https://hmdb.ca", "5.0").is_ok());
    }

    #[test]
    fn test_organism_convention() {
        assert!(base().with_organism("hsapiens").is_err());
        assert!(base().with_organism("Hsapiens").is_ok());
        assert!(base().with_organism("Unspecified").is_ok());
        assert!(base().with_organism("H sapiens").is_err());
        assert!(base().with_organism("HSapiens").is_err());
        assert!(base().with_organism("").is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let metadata = base()
            .with_source_date("2024-01-15")
            .with_organism("Hsapiens")
            .unwrap();
        let json = metadata.to_json().unwrap();
        let back = StoreMetadata::from_json(&json).unwrap();
        assert_eq!(metadata, back);
    }

    #[test]
    fn test_deserialization_revalidates() {
        let json = r#"{"source":"HMDB","url":"https://hmdb.ca","source_version":"5.0","organism":"hsapiens"}"#;
        let err = StoreMetadata::from_json(json).unwrap_err();
        assert!(matches!(err, MetadataError::InvalidMetadata(_)));
    }
}
