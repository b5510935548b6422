//! # Annotation Bundle Schema
//!
//! Defines the Apache Arrow schemas for the two tables of an annotation
//! bundle, the bundle layout constants, and the Parquet footer metadata keys.
//!
//! ## Tables
//!
//! | Table | Key | Notes |
//! |-------|-----|-------|
//! | compounds | `compound_id` (grouping key) | A bag: spectrum-centric sources may store several rows per id |
//! | spectra | `spectrum_id` | `compound_id` is a non-enforced reference into the compound table |
//!
//! The metadata record is persisted twice: as a standalone `metadata.json`
//! for quick inspection without Parquet tooling, and embedded in the Parquet
//! footer key-value metadata of both tables.
//!
//! ## Versioning
//!
//! Every table carries [`MZANNOT_FORMAT_VERSION`] in its footer. A store
//! handle refuses to open a bundle whose major version component differs
//! from its own (see [`versions_compatible`]).

mod constants;

pub mod compound_columns;
pub mod spectrum_columns;

#[cfg(test)]
mod tests;

pub use constants::*;

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema};

/// Schema shape mismatches detected when validating an opened table
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A required column is missing from the stored table
    #[error("table '{table}' is missing required column '{column}'")]
    MissingColumn { table: String, column: String },

    /// A column is present but stored with an unexpected type
    #[error("table '{table}' column '{column}' has type {found}, expected {expected}")]
    TypeMismatch {
        table: String,
        column: String,
        found: String,
        expected: String,
    },
}

fn float_list(item_nullable: bool) -> DataType {
    DataType::List(Arc::new(Field::new("item", DataType::Float64, item_nullable)))
}

fn utf8_list(item_nullable: bool) -> DataType {
    DataType::List(Arc::new(Field::new("item", DataType::Utf8, item_nullable)))
}

/// Create the Arrow schema for the compound table
///
/// `compound_id` is the only required column. It is a grouping key, not a
/// primary key: spectrum-centric sources legitimately store multiple rows
/// with the same id and divergent attribute values.
pub fn create_compound_schema() -> Schema {
    Schema::new(vec![
        Field::new(compound_columns::COMPOUND_ID, DataType::Utf8, false),
        Field::new(compound_columns::COMPOUND_NAME, DataType::Utf8, true),
        Field::new(compound_columns::INCHI, DataType::Utf8, true),
        Field::new(compound_columns::INCHI_KEY, DataType::Utf8, true),
        Field::new(compound_columns::FORMULA, DataType::Utf8, true),
        Field::new(compound_columns::SMILES, DataType::Utf8, true),
        Field::new(compound_columns::EXACT_MASS, DataType::Float64, true),
        Field::new(compound_columns::SYNONYMS, utf8_list(false), false),
    ])
}

/// Create the compound schema wrapped in an Arc
pub fn create_compound_schema_arc() -> Arc<Schema> {
    Arc::new(create_compound_schema())
}

/// Create the Arrow schema for the spectrum table
///
/// `mz` and `intensity` are index-aligned lists in acquisition order; the
/// builder rejects any spectrum whose two lists differ in length.
pub fn create_spectrum_schema() -> Schema {
    Schema::new(vec![
        Field::new(spectrum_columns::SPECTRUM_ID, DataType::Int64, false),
        Field::new(spectrum_columns::COMPOUND_ID, DataType::Utf8, true),
        Field::new(spectrum_columns::POLARITY, DataType::Int8, true),
        Field::new(spectrum_columns::COLLISION_ENERGY, DataType::Float64, true),
        Field::new(spectrum_columns::PRECURSOR_MZ, DataType::Float64, true),
        Field::new(spectrum_columns::INSTRUMENT, DataType::Utf8, true),
        Field::new(spectrum_columns::INSTRUMENT_TYPE, DataType::Utf8, true),
        Field::new(spectrum_columns::SPLASH, DataType::Utf8, true),
        Field::new(spectrum_columns::PREDICTED, DataType::Boolean, true),
        Field::new(spectrum_columns::MZ, float_list(false), false),
        Field::new(spectrum_columns::INTENSITY, float_list(false), false),
    ])
}

/// Create the spectrum schema wrapped in an Arc
pub fn create_spectrum_schema_arc() -> Arc<Schema> {
    Arc::new(create_spectrum_schema())
}

/// Ordered column names of the compound table
pub fn compound_column_names() -> Vec<&'static str> {
    vec![
        compound_columns::COMPOUND_ID,
        compound_columns::COMPOUND_NAME,
        compound_columns::INCHI,
        compound_columns::INCHI_KEY,
        compound_columns::FORMULA,
        compound_columns::SMILES,
        compound_columns::EXACT_MASS,
        compound_columns::SYNONYMS,
    ]
}

/// Ordered column names of the spectrum table
pub fn spectrum_column_names() -> Vec<&'static str> {
    vec![
        spectrum_columns::SPECTRUM_ID,
        spectrum_columns::COMPOUND_ID,
        spectrum_columns::POLARITY,
        spectrum_columns::COLLISION_ENERGY,
        spectrum_columns::PRECURSOR_MZ,
        spectrum_columns::INSTRUMENT,
        spectrum_columns::INSTRUMENT_TYPE,
        spectrum_columns::SPLASH,
        spectrum_columns::PREDICTED,
        spectrum_columns::MZ,
        spectrum_columns::INTENSITY,
    ]
}

fn validate_against(table: &str, expected: &Schema, found: &Schema) -> Result<(), SchemaError> {
    for field in expected.fields() {
        let stored =
            found
                .field_with_name(field.name())
                .map_err(|_| SchemaError::MissingColumn {
                    table: table.to_string(),
                    column: field.name().clone(),
                })?;
        if !types_equivalent(stored.data_type(), field.data_type()) {
            return Err(SchemaError::TypeMismatch {
                table: table.to_string(),
                column: field.name().clone(),
                found: format!("{}", stored.data_type()),
                expected: format!("{}", field.data_type()),
            });
        }
    }
    Ok(())
}

// List item field names and nullability vary between writers; compare the
// item types, not the full nested field.
fn types_equivalent(found: &DataType, expected: &DataType) -> bool {
    match (found, expected) {
        (DataType::List(f), DataType::List(e)) => f.data_type() == e.data_type(),
        (f, e) => f == e,
    }
}

/// Validate an opened compound table against the expected schema shape
pub fn validate_compound_schema(found: &Schema) -> Result<(), SchemaError> {
    validate_against(TABLE_COMPOUNDS, &create_compound_schema(), found)
}

/// Validate an opened spectrum table against the expected schema shape
pub fn validate_spectrum_schema(found: &Schema) -> Result<(), SchemaError> {
    validate_against(TABLE_SPECTRA, &create_spectrum_schema(), found)
}

/// Check whether a stored format version can be read by this build
///
/// Compatibility is defined on the major component of the semantic version:
/// `1.x.y` bundles are readable by any `1.*` reader.
pub fn versions_compatible(found: &str) -> bool {
    let major = |v: &str| v.split('.').next().map(str::to_string);
    match (major(found), major(MZANNOT_FORMAT_VERSION)) {
        (Some(f), Some(e)) => !f.is_empty() && f == e,
        _ => false,
    }
}
