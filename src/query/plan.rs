//! Query compilation and streaming execution
//!
//! Plans are compiled fully before any data is read: column names are
//! resolved against the stored schemas, the filter is split into pushdown
//! and post-join parts, and only then is a Parquet scan opened. Execution
//! is pull-based; dropping the iterator closes the scan.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array,
    Int8Array, ListArray, StringArray,
};
use arrow::datatypes::{DataType, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::arrow::ProjectionMask;

use crate::schema::{compound_columns, spectrum_columns};
use crate::store::Store;

use super::{FilterExpr, Projection, QueryError, Row, Value};

const BATCH_SIZE: usize = 1024;

/// Lazy stream of query result rows
///
/// Re-issuing the query produces a fresh, independent iterator; abandoning
/// iteration drops the underlying scan immediately.
pub struct RowIter {
    columns: Arc<Vec<String>>,
    inner: Box<dyn Iterator<Item = Result<Row, QueryError>> + Send>,
}

impl RowIter {
    /// Output column names, in projection order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl std::fmt::Debug for RowIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowIter")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

impl Iterator for RowIter {
    type Item = Result<Row, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Streaming scan over one Parquet table, restricted to a column subset
///
/// Yields rows as value vectors in *file column order* of the selected
/// columns; callers reorder into projection order.
struct TableScan {
    reader: ParquetRecordBatchReader,
    batch: Option<RecordBatch>,
    row: usize,
    failed: bool,
}

impl TableScan {
    /// Open a scan over `columns` of the table at `path`
    ///
    /// Returns the scan plus the selected column names in file order.
    fn open(path: &Path, columns: &[String]) -> Result<(Self, Vec<String>), QueryError> {
        let file = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?.with_batch_size(BATCH_SIZE);

        let file_schema = builder.schema().clone();
        let mut indices = Vec::with_capacity(columns.len());
        for column in columns {
            // Resolution already happened during compilation; a miss here
            // means the stored file diverged from the validated schema.
            let idx = file_schema
                .index_of(column)
                .map_err(|_| QueryError::UnknownColumn(column.clone()))?;
            indices.push(idx);
        }
        indices.sort_unstable();
        indices.dedup();

        let scanned: Vec<String> = indices
            .iter()
            .map(|&i| file_schema.field(i).name().clone())
            .collect();
        let mask = ProjectionMask::roots(builder.parquet_schema(), indices.iter().copied());
        let reader = builder.with_projection(mask).build()?;

        Ok((
            Self {
                reader,
                batch: None,
                row: 0,
                failed: false,
            },
            scanned,
        ))
    }
}

impl Iterator for TableScan {
    type Item = Result<Vec<Value>, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(batch) = &self.batch {
                if self.row < batch.num_rows() {
                    let values = (0..batch.num_columns())
                        .map(|c| value_at(batch.column(c), self.row))
                        .collect();
                    self.row += 1;
                    return Some(Ok(values));
                }
            }
            match self.reader.next() {
                Some(Ok(batch)) => {
                    self.batch = Some(batch);
                    self.row = 0;
                }
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e.into()));
                }
                None => return None,
            }
        }
    }
}

/// Decode one Arrow cell into a dynamic value
fn value_at(array: &ArrayRef, row: usize) -> Value {
    if array.is_null(row) {
        return Value::Null;
    }
    match array.data_type() {
        DataType::Utf8 => downcast::<StringArray>(array)
            .map(|a| Value::Text(a.value(row).to_string()))
            .unwrap_or(Value::Null),
        DataType::Int64 => downcast::<Int64Array>(array)
            .map(|a| Value::Int(a.value(row)))
            .unwrap_or(Value::Null),
        DataType::Int32 => downcast::<Int32Array>(array)
            .map(|a| Value::Int(a.value(row) as i64))
            .unwrap_or(Value::Null),
        DataType::Int16 => downcast::<Int16Array>(array)
            .map(|a| Value::Int(a.value(row) as i64))
            .unwrap_or(Value::Null),
        DataType::Int8 => downcast::<Int8Array>(array)
            .map(|a| Value::Int(a.value(row) as i64))
            .unwrap_or(Value::Null),
        DataType::Float64 => downcast::<Float64Array>(array)
            .map(|a| Value::Number(a.value(row)))
            .unwrap_or(Value::Null),
        DataType::Float32 => downcast::<Float32Array>(array)
            .map(|a| Value::Number(a.value(row) as f64))
            .unwrap_or(Value::Null),
        DataType::Boolean => downcast::<BooleanArray>(array)
            .map(|a| Value::Bool(a.value(row)))
            .unwrap_or(Value::Null),
        DataType::List(field) => {
            let Some(list) = downcast::<ListArray>(array) else {
                return Value::Null;
            };
            let items = list.value(row);
            match field.data_type() {
                DataType::Float64 => downcast::<Float64Array>(&items)
                    .map(|a| Value::NumberList(a.values().to_vec()))
                    .unwrap_or(Value::Null),
                DataType::Utf8 => downcast::<StringArray>(&items)
                    .map(|a| {
                        Value::TextList((0..a.len()).map(|i| a.value(i).to_string()).collect())
                    })
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            }
        }
        _ => Value::Null,
    }
}

fn downcast<T: 'static>(array: &dyn Array) -> Option<&T> {
    array.as_any().downcast_ref::<T>()
}

/// Resolve a projection against a single table's stored schema
fn resolve_single_table(
    projection: &Projection,
    schema: &Schema,
) -> Result<Vec<String>, QueryError> {
    match projection.requested() {
        None => Ok(schema.fields().iter().map(|f| f.name().clone()).collect()),
        Some(requested) => {
            for column in requested {
                if schema.field_with_name(column).is_err() {
                    return Err(QueryError::UnknownColumn(column.clone()));
                }
            }
            Ok(requested.to_vec())
        }
    }
}

/// Compile and open a scan over the compound table
pub(crate) fn compounds_query(
    store: &Store,
    projection: &Projection,
) -> Result<RowIter, QueryError> {
    let output = resolve_single_table(projection, store.compound_schema())?;
    let (scan, scanned) = TableScan::open(&store.compounds_path(), &output)?;

    // Scans come back in file column order; reorder into projection order.
    let order: Vec<usize> = output
        .iter()
        .map(|col| {
            scanned
                .iter()
                .position(|s| s == col)
                .ok_or_else(|| QueryError::UnknownColumn(col.clone()))
        })
        .collect::<Result<_, _>>()?;

    let columns = Arc::new(output);
    let out_columns = columns.clone();
    let inner = scan.map(move |row| {
        row.map(|values| {
            let picked = order.iter().map(|&i| values[i].clone()).collect();
            Row::new(out_columns.clone(), picked)
        })
    });
    Ok(RowIter {
        columns,
        inner: Box::new(inner),
    })
}

/// Which side of the (potential) join a resolved column lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Spectrum,
    Compound,
}

/// Post-join column namespace for `spectra` queries
struct Namespace {
    sides: HashMap<String, Side>,
    ambiguous: Vec<String>,
}

impl Namespace {
    fn build(spectrum: &Schema, compound: &Schema) -> Self {
        let mut sides = HashMap::new();
        let mut ambiguous = Vec::new();
        for field in spectrum.fields() {
            sides.insert(field.name().clone(), Side::Spectrum);
        }
        for field in compound.fields() {
            let name = field.name();
            // The join key is one logical column; the spectrum side carries
            // it through the outer join.
            if name == spectrum_columns::COMPOUND_ID {
                continue;
            }
            if sides.contains_key(name) {
                ambiguous.push(name.clone());
            } else {
                sides.insert(name.clone(), Side::Compound);
            }
        }
        Self { sides, ambiguous }
    }

    fn resolve(&self, column: &str) -> Result<Side, QueryError> {
        if self.ambiguous.iter().any(|a| a == column) {
            return Err(QueryError::UnknownColumn(format!(
                "'{column}' is ambiguous: present in both tables"
            )));
        }
        self.sides
            .get(column)
            .copied()
            .ok_or_else(|| QueryError::UnknownColumn(column.to_string()))
    }
}

/// Compile and open a (possibly joined) scan over the spectrum table
pub(crate) fn spectra_query(
    store: &Store,
    projection: &Projection,
    filter: Option<FilterExpr>,
) -> Result<RowIter, QueryError> {
    let spectrum_schema = store.spectrum_schema();
    let compound_schema = store.compound_schema();
    let namespace = Namespace::build(spectrum_schema, compound_schema);

    // Output columns: default is the full spectrum table, no join.
    let output: Vec<String> = match projection.requested() {
        None => spectrum_schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect(),
        Some(requested) => requested.to_vec(),
    };
    let mut output_sides = Vec::with_capacity(output.len());
    for column in &output {
        output_sides.push(namespace.resolve(column)?);
    }

    // Filter columns resolve before any scan is opened.
    let mut filter_sides: HashMap<String, Side> = HashMap::new();
    if let Some(filter) = &filter {
        let mut columns = Vec::new();
        filter.for_each_column(&mut |c| columns.push(c.to_string()));
        for column in columns {
            let side = namespace.resolve(&column)?;
            filter_sides.insert(column, side);
        }
    }

    // Column sets each side of the plan has to read.
    let mut compound_needed: Vec<String> = Vec::new();
    for (column, side) in output.iter().zip(&output_sides) {
        if *side == Side::Compound && !compound_needed.contains(column) {
            compound_needed.push(column.clone());
        }
    }
    for (column, side) in &filter_sides {
        if *side == Side::Compound && !compound_needed.contains(column) {
            compound_needed.push(column.clone());
        }
    }
    let join_needed = !compound_needed.is_empty();

    let mut spectrum_needed: Vec<String> = Vec::new();
    for (column, side) in output.iter().zip(&output_sides) {
        if *side == Side::Spectrum && !spectrum_needed.contains(column) {
            spectrum_needed.push(column.clone());
        }
    }
    for (column, side) in &filter_sides {
        if *side == Side::Spectrum && !spectrum_needed.contains(column) {
            spectrum_needed.push(column.clone());
        }
    }
    let key = spectrum_columns::COMPOUND_ID.to_string();
    if join_needed && !spectrum_needed.contains(&key) {
        spectrum_needed.push(key);
    }

    // Pushdown: top-level AND clauses touching only spectrum columns run
    // inside the scan, before the join; everything else runs post-join.
    let (pushdown, residue) = match filter {
        None => (None, None),
        Some(filter) => {
            let (mut down, mut post) = (Vec::new(), Vec::new());
            for clause in filter.into_conjuncts() {
                let mut spectrum_only = true;
                clause.for_each_column(&mut |c| {
                    if filter_sides.get(c) != Some(&Side::Spectrum) {
                        spectrum_only = false;
                    }
                });
                if spectrum_only {
                    down.push(clause);
                } else {
                    post.push(clause);
                }
            }
            (FilterExpr::conjoin(down), FilterExpr::conjoin(post))
        }
    };

    // The compound side of the hash join. Loaded eagerly (it is the small
    // side); first row wins per id, preserving spectrum cardinality even
    // against bag-style compound tables.
    let compound_map: HashMap<String, Vec<Value>> = if join_needed {
        let mut scan_cols = vec![compound_columns::COMPOUND_ID.to_string()];
        scan_cols.extend(compound_needed.iter().cloned());
        let (scan, scanned) = TableScan::open(&store.compounds_path(), &scan_cols)?;
        let key_idx = scanned
            .iter()
            .position(|c| c == compound_columns::COMPOUND_ID)
            .ok_or_else(|| QueryError::UnknownColumn(compound_columns::COMPOUND_ID.to_string()))?;
        let value_idx: Vec<usize> = compound_needed
            .iter()
            .map(|col| {
                scanned
                    .iter()
                    .position(|s| s == col)
                    .ok_or_else(|| QueryError::UnknownColumn(col.clone()))
            })
            .collect::<Result<_, _>>()?;
        let mut map = HashMap::new();
        for row in scan {
            let values = row?;
            let Value::Text(id) = &values[key_idx] else {
                continue;
            };
            map.entry(id.clone())
                .or_insert_with(|| value_idx.iter().map(|&i| values[i].clone()).collect());
        }
        map
    } else {
        HashMap::new()
    };

    let (scan, scanned) = TableScan::open(&store.spectra_path(), &spectrum_needed)?;
    let spectrum_index: HashMap<String, usize> = scanned
        .iter()
        .enumerate()
        .map(|(i, c)| (c.clone(), i))
        .collect();
    let compound_index: HashMap<String, usize> = compound_needed
        .iter()
        .enumerate()
        .map(|(i, c)| (c.clone(), i))
        .collect();
    let key_idx = spectrum_index
        .get(spectrum_columns::COMPOUND_ID)
        .copied();

    // Where each output column is picked from at emission time.
    enum Pick {
        Spectrum(usize),
        Compound(usize),
    }
    let picks: Vec<Pick> = output
        .iter()
        .zip(&output_sides)
        .map(|(column, side)| match side {
            Side::Spectrum => spectrum_index
                .get(column)
                .copied()
                .map(Pick::Spectrum)
                .ok_or_else(|| QueryError::UnknownColumn(column.clone())),
            Side::Compound => compound_index
                .get(column)
                .copied()
                .map(Pick::Compound)
                .ok_or_else(|| QueryError::UnknownColumn(column.clone())),
        })
        .collect::<Result<_, _>>()?;

    let columns = Arc::new(output);
    let out_columns = columns.clone();
    let compound_width = compound_needed.len();

    let inner = scan.filter_map(move |row| {
        let values = match row {
            Ok(values) => values,
            Err(e) => return Some(Err(e)),
        };

        let spectrum_lookup = |name: &str| -> Value {
            spectrum_index
                .get(name)
                .map(|&i| values[i].clone())
                .unwrap_or(Value::Null)
        };
        if let Some(pushdown) = &pushdown {
            if !pushdown.evaluate(&spectrum_lookup) {
                return None;
            }
        }

        // Left outer join: a missing partner contributes Null columns.
        let joined: Vec<Value> = if join_needed {
            let partner = key_idx.and_then(|i| match &values[i] {
                Value::Text(id) => compound_map.get(id),
                _ => None,
            });
            match partner {
                Some(row) => row.clone(),
                None => vec![Value::Null; compound_width],
            }
        } else {
            Vec::new()
        };

        if let Some(residue) = &residue {
            let lookup = |name: &str| -> Value {
                if let Some(&i) = spectrum_index.get(name) {
                    return values[i].clone();
                }
                if let Some(&i) = compound_index.get(name) {
                    return joined[i].clone();
                }
                Value::Null
            };
            if !residue.evaluate(&lookup) {
                return None;
            }
        }

        let picked = picks
            .iter()
            .map(|pick| match pick {
                Pick::Spectrum(i) => values[*i].clone(),
                Pick::Compound(i) => joined[*i].clone(),
            })
            .collect();
        Some(Ok(Row::new(out_columns.clone(), picked)))
    });

    Ok(RowIter {
        columns,
        inner: Box::new(inner),
    })
}
