//! # Query Engine
//!
//! Compiles a column projection and an optional filter expression into an
//! execution plan over an opened annotation bundle, then streams typed rows
//! back lazily.
//!
//! Two entry operations (exposed through [`crate::store::Store`]):
//!
//! - **compounds(projection)** — scans the compound table alone.
//! - **spectra(projection, filter)** — scans the spectrum table; if the
//!   projection or filter touches any compound column, a *left outer* hash
//!   join from spectrum to compound on `compound_id` is performed first.
//!   Spectra with a dangling or absent reference still appear, with `Null`
//!   compound columns.
//!
//! Filters are a small boolean grammar (`column OP literal` clauses under
//! `AND`/`OR`, `OP ∈ {=, !=, <, <=, >, >=, IN}`). Top-level `AND` clauses
//! touching only spectrum columns are pushed down into the spectrum scan
//! and evaluated before the join; the rest run post-join. Both paths share
//! one evaluator, so results are identical either way.
//!
//! Column resolution happens at compilation: an unresolvable or ambiguous
//! name fails with [`QueryError::UnknownColumn`] before any row is read.

mod filter;
mod plan;
mod value;

#[cfg(test)]
mod tests;

pub use filter::{CompareOp, FilterExpr};
pub use plan::RowIter;
pub(crate) use plan::{compounds_query, spectra_query};
pub use value::Value;

use std::sync::Arc;

/// Errors raised while compiling or executing a query
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// A projection or filter referenced a column that does not exist (or
    /// is ambiguous post-join); raised before any data is scanned
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// The filter expression failed to parse
    #[error("invalid filter expression: {0}")]
    InvalidFilter(String),

    /// I/O error during a scan
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the Arrow library
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from the Parquet library
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

/// Ordered set of requested output columns
///
/// Duplicates are collapsed keeping the first position; the remaining order
/// defines the output column order.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    columns: Option<Vec<String>>,
}

impl Projection {
    /// Request every column of the queried table
    pub fn all() -> Self {
        Self { columns: None }
    }

    /// Request a specific ordered set of columns
    pub fn columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = Vec::new();
        for name in names {
            let name = name.into();
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        Self {
            columns: Some(seen),
        }
    }

    /// Whether this projection requests all columns
    pub fn is_all(&self) -> bool {
        self.columns.is_none()
    }

    pub(crate) fn requested(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }
}

/// One typed result row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<Vec<String>>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(columns: Arc<Vec<String>>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Output column names, in projection order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in column order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value of a column by name
    pub fn get(&self, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.values.get(idx)
    }

    /// Consume the row, yielding its values
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}
