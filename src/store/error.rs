use crate::metadata::MetadataError;
use crate::schema::SchemaError;

/// Errors that can occur while building or opening an annotation bundle
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the Arrow library during array operations
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from the Parquet library
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Invalid store metadata; raised before any write
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored table does not match the expected schema shape
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Invalid or unusable bundle location
    #[error("invalid bundle location: {0}")]
    InvalidPath(String),

    /// A bundle already exists at the location and overwrite was not requested
    #[error("bundle already exists: {0}")]
    AlreadyExists(String),

    /// Neither compounds nor spectra survived ingestion; nothing to store
    #[error("no usable records: both the compound and spectrum sets are empty")]
    NoUsableRecords,

    /// The atomic commit failed; the partially-built bundle was discarded
    #[error("store write failure: {0}")]
    StoreWriteFailure(String),

    /// The bundle exists but was written by an incompatible format version
    #[error("incompatible store: bundle format version '{found}' (this build reads '{expected}')")]
    IncompatibleStore { found: String, expected: String },

    /// A required bundle file is missing
    #[error("bundle is missing its '{0}' table")]
    MissingTable(String),

    /// Introspection request for a table the store does not have
    #[error("no such table: {0}")]
    UnknownTable(String),
}
