//! # Annotation Bundle Store
//!
//! The persisted store is an *annotation bundle*: a directory containing
//! `compounds.parquet`, `spectra.parquet`, and `metadata.json`.
//!
//! [`StoreBuilder`] writes a bundle once, atomically; [`Store`] is a typed,
//! reusable handle bound to one bundle. After the commit a bundle is
//! immutable: there is no update or delete path, and any number of handles
//! may open the same location concurrently. All post-open state is
//! read-only, so queries from different handles (or threads) need no
//! synchronization.

mod builder;
mod error;


pub use builder::{StoreBuilder, WriterConfig};
pub use error::StoreError;

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::datatypes::Schema;
use parquet::file::reader::{FileReader, SerializedFileReader};

use crate::metadata::StoreMetadata;
use crate::query::{self, FilterExpr, Projection, QueryError, RowIter};
use crate::schema::{
    validate_compound_schema, validate_spectrum_schema, versions_compatible, COMPOUNDS_FILE,
    KEY_FORMAT_VERSION, METADATA_FILE, MZANNOT_FORMAT_VERSION, SPECTRA_FILE, TABLE_COMPOUNDS,
    TABLE_METADATA, TABLE_SPECTRA,
};

/// Footer information for one stored table
#[derive(Debug, Clone)]
struct TableInfo {
    path: PathBuf,
    schema: Arc<Schema>,
    row_count: i64,
}

/// Read-only handle to one opened annotation bundle
#[derive(Debug, Clone)]
pub struct Store {
    location: PathBuf,
    format_version: String,
    compounds: TableInfo,
    spectra: TableInfo,
    metadata: StoreMetadata,
}

impl Store {
    /// Open an existing bundle and validate its schema and format version
    ///
    /// Fails with [`StoreError::IncompatibleStore`] when the bundle was
    /// written by an incompatible format version, and with
    /// [`StoreError::Schema`] when a table's shape does not match the
    /// expected schema.
    pub fn open<P: AsRef<Path>>(location: P) -> Result<Self, StoreError> {
        let location = location.as_ref().to_path_buf();
        if !location.is_dir() {
            return Err(StoreError::InvalidPath(format!(
                "'{}' is not a bundle directory",
                location.display()
            )));
        }

        let compounds = read_table_info(&location, COMPOUNDS_FILE, TABLE_COMPOUNDS)?;
        let spectra = read_table_info(&location, SPECTRA_FILE, TABLE_SPECTRA)?;
        validate_compound_schema(&compounds.0.schema)?;
        validate_spectrum_schema(&spectra.0.schema)?;

        // Both tables are written by one commit; their versions must agree.
        let format_version = compounds.1;
        if spectra.1 != format_version {
            return Err(StoreError::IncompatibleStore {
                found: format!("{} / {}", format_version, spectra.1),
                expected: MZANNOT_FORMAT_VERSION.to_string(),
            });
        }

        let metadata_path = location.join(METADATA_FILE);
        if !metadata_path.is_file() {
            return Err(StoreError::MissingTable(TABLE_METADATA.to_string()));
        }
        let metadata = StoreMetadata::from_json(&std::fs::read_to_string(metadata_path)?)?;

        log::debug!(
            "opened bundle {} (format {}, {} compounds, {} spectra)",
            location.display(),
            format_version,
            compounds.0.row_count,
            spectra.0.row_count
        );

        Ok(Self {
            location,
            format_version,
            compounds: compounds.0,
            spectra: spectra.0,
            metadata,
        })
    }

    /// Location this handle is bound to
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Format version the bundle was written with
    pub fn format_version(&self) -> &str {
        &self.format_version
    }

    /// The bundle's immutable provenance record
    pub fn metadata(&self) -> &StoreMetadata {
        &self.metadata
    }

    /// Logical table names of the store
    pub fn tables(&self) -> Vec<&'static str> {
        vec![TABLE_COMPOUNDS, TABLE_SPECTRA, TABLE_METADATA]
    }

    /// Column names of one logical table
    pub fn columns(&self, table: &str) -> Result<Vec<String>, StoreError> {
        match table {
            TABLE_COMPOUNDS => Ok(field_names(&self.compounds.schema)),
            TABLE_SPECTRA => Ok(field_names(&self.spectra.schema)),
            TABLE_METADATA => Ok(vec![
                "source".to_string(),
                "url".to_string(),
                "source_version".to_string(),
                "source_date".to_string(),
                "organism".to_string(),
            ]),
            other => Err(StoreError::UnknownTable(other.to_string())),
        }
    }

    /// Number of compound rows in the bundle
    pub fn compound_count(&self) -> i64 {
        self.compounds.row_count
    }

    /// Number of spectrum rows in the bundle
    pub fn spectrum_count(&self) -> i64 {
        self.spectra.row_count
    }

    /// Stream compound rows under a column projection
    ///
    /// The default projection returns every compound column. No join is
    /// performed.
    pub fn compounds(&self, projection: &Projection) -> Result<RowIter, QueryError> {
        query::compounds_query(self, projection)
    }

    /// Stream spectrum rows under a projection and optional filter
    ///
    /// If the projection or filter references any compound column, a left
    /// outer join from spectrum to compound on `compound_id` is performed;
    /// spectra without a join partner appear with `Null` compound columns.
    pub fn spectra(
        &self,
        projection: &Projection,
        filter: Option<FilterExpr>,
    ) -> Result<RowIter, QueryError> {
        query::spectra_query(self, projection, filter)
    }

    pub(crate) fn compounds_path(&self) -> PathBuf {
        self.compounds.path.clone()
    }

    pub(crate) fn spectra_path(&self) -> PathBuf {
        self.spectra.path.clone()
    }

    pub(crate) fn compound_schema(&self) -> &Arc<Schema> {
        &self.compounds.schema
    }

    pub(crate) fn spectrum_schema(&self) -> &Arc<Schema> {
        &self.spectra.schema
    }
}

fn field_names(schema: &Schema) -> Vec<String> {
    schema.fields().iter().map(|f| f.name().clone()).collect()
}

/// Read one table's footer: schema, row count, and format version
fn read_table_info(
    location: &Path,
    file_name: &str,
    table: &str,
) -> Result<(TableInfo, String), StoreError> {
    let path = location.join(file_name);
    if !path.is_file() {
        return Err(StoreError::MissingTable(table.to_string()));
    }

    let file = File::open(&path)?;
    let reader = SerializedFileReader::new(file)?;
    let parquet_metadata = reader.metadata();
    let file_metadata = parquet_metadata.file_metadata();

    let schema = parquet::arrow::parquet_to_arrow_schema(
        file_metadata.schema_descr(),
        file_metadata.key_value_metadata(),
    )?;

    let mut key_value = HashMap::new();
    if let Some(entries) = file_metadata.key_value_metadata() {
        for entry in entries {
            if let Some(value) = &entry.value {
                key_value.insert(entry.key.clone(), value.clone());
            }
        }
    }

    let format_version = key_value
        .get(KEY_FORMAT_VERSION)
        .cloned()
        .unwrap_or_else(|| "unknown".to_string());
    if !versions_compatible(&format_version) {
        return Err(StoreError::IncompatibleStore {
            found: format_version,
            expected: MZANNOT_FORMAT_VERSION.to_string(),
        });
    }

    let row_count: i64 = (0..parquet_metadata.num_row_groups())
        .map(|i| parquet_metadata.row_group(i).num_rows())
        .sum();

    Ok((
        TableInfo {
            path,
            schema: Arc::new(schema),
            row_count,
        },
        format_version,
    ))
}
