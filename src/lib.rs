//! # mzannot
//!
//! A normalized annotation store for chemical compounds and their MS/MS
//! fragmentation spectra.
//!
//! Public annotation resources ship the same information under wildly
//! different field names and file layouts. `mzannot` parses the common
//! interchange shapes (SDF dumps, per-spectrum XML documents), normalizes
//! them through per-source alias tables into one canonical schema, and
//! persists the result as an immutable *annotation bundle*: a directory of
//! Parquet tables plus a provenance record, written atomically and queried
//! through a typed projection/filter interface.
//!
//! ## Pipeline
//!
//! ```no_run
//! use mzannot::{
//!     FilterExpr, Ingestor, Projection, SourceLayout, Store, StoreBuilder, StoreMetadata,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut ingestor = Ingestor::new();
//! ingestor.sdf_file("hmdb_metabolites.sdf.gz", &SourceLayout::hmdb())?;
//! ingestor.spectrum_dir("hmdb_spectra/", &SourceLayout::hmdb_msms())?;
//! let (batch, _stats) = ingestor.finish();
//!
//! let metadata = StoreMetadata::new("HMDB", "https://hmdb.ca", "5.0")?
//!     .with_organism("Hsapiens")?;
//! StoreBuilder::new("hmdb.mzannot").build(&batch.compounds, &batch.spectra, &metadata)?;
//!
//! let store = Store::open("hmdb.mzannot")?;
//! let rows = store.spectra(
//!     &Projection::columns(["spectrum_id", "compound_name", "exact_mass"]),
//!     Some(FilterExpr::parse("polarity = 1 AND collision_energy >= 20")?),
//! )?;
//! for row in rows {
//!     println!("{:?}", row?.values());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Canonical column names
//!
//! Projections and filters address the normalized column names defined in
//! [`schema::compound_columns`] and [`schema::spectrum_columns`], not the
//! raw source field names. In particular the compound monoisotopic mass is
//! the `exact_mass` column (Da); there is no `mass` alias.
//!
//! ## Modules
//!
//! - [`formats`] — SDF and spectrum-XML parsers producing raw records
//! - [`normalize`] — per-source alias tables and the canonical record types
//! - [`ingest`] — multi-source pipeline facade
//! - [`metadata`] — the validated provenance record every bundle carries
//! - [`store`] — atomic bundle construction and the read handle
//! - [`query`] — projection, filter grammar, and the lazy row stream
//! - [`schema`] — canonical Arrow schemas, format version, bundle constants

pub mod formats;
pub mod ingest;
pub mod metadata;
pub mod normalize;
pub mod query;
pub mod schema;
pub mod store;

pub use formats::FormatError;
pub use ingest::{IngestStats, Ingestor};
pub use metadata::{MetadataError, StoreMetadata, UNSPECIFIED_ORGANISM};
pub use normalize::{Compound, NormalizedBatch, Normalizer, SourceLayout, SourcePolicy, Spectrum};
pub use query::{FilterExpr, Projection, QueryError, Row, RowIter, Value};
pub use schema::MZANNOT_FORMAT_VERSION;
pub use store::{Store, StoreBuilder, StoreError, WriterConfig};
