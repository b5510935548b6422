/// mzAnnot bundle format version - follows semantic versioning
pub const MZANNOT_FORMAT_VERSION: &str = "1.0.0";

/// Conventional extension for annotation bundle directories
pub const MZANNOT_EXTENSION: &str = ".mzannot";

/// File name of the compound table inside a bundle
pub const COMPOUNDS_FILE: &str = "compounds.parquet";

/// File name of the spectrum table inside a bundle
pub const SPECTRA_FILE: &str = "spectra.parquet";

/// File name of the standalone metadata record inside a bundle
pub const METADATA_FILE: &str = "metadata.json";

/// Logical name of the compound table
pub const TABLE_COMPOUNDS: &str = "compounds";

/// Logical name of the spectrum table
pub const TABLE_SPECTRA: &str = "spectra";

/// Logical name of the single-record metadata table
pub const TABLE_METADATA: &str = "metadata";

/// Metadata key for the format version in the Parquet footer
pub const KEY_FORMAT_VERSION: &str = "mzannot:format_version";

/// Metadata key for the build timestamp in the Parquet footer
pub const KEY_BUILD_TIMESTAMP: &str = "mzannot:build_timestamp";

/// Metadata key for builder software info
pub const KEY_BUILDER_INFO: &str = "mzannot:builder_info";

/// Metadata key for the embedded store metadata JSON
pub const KEY_STORE_METADATA: &str = "mzannot:store_metadata";
