//! Annotation bundle construction
//!
//! The builder turns normalized records plus one metadata value into a
//! persisted bundle. The write is one atomic unit: everything is staged
//! into a temp directory beside the target and renamed into place after
//! the last byte is flushed, so a failed build never leaves a partial
//! store behind.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, Int8Builder, ListBuilder,
    StringBuilder,
};
use arrow::datatypes::{DataType, Field};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;

use crate::metadata::StoreMetadata;
use crate::normalize::{Compound, Spectrum};
use crate::schema::{
    create_compound_schema_arc, create_spectrum_schema_arc, COMPOUNDS_FILE, KEY_BUILDER_INFO,
    KEY_BUILD_TIMESTAMP, KEY_FORMAT_VERSION, KEY_STORE_METADATA, METADATA_FILE,
    MZANNOT_FORMAT_VERSION, SPECTRA_FILE,
};

use super::error::StoreError;

/// Configuration for the bundle writer
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// ZSTD compression level for both tables
    pub compression_level: i32,

    /// Target row group size (rows per group). Smaller groups improve
    /// row-group pruning on the `compound_id` scan path.
    pub row_group_size: usize,

    /// Whether to write column statistics. Statistics on the sorted
    /// `compound_id` column act as the index for the dominant join path.
    pub write_statistics: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            compression_level: 3,
            row_group_size: 4096,
            write_statistics: true,
        }
    }
}

impl WriterConfig {
    fn writer_properties(&self, key_value: Vec<KeyValue>) -> WriterProperties {
        let level = ZstdLevel::try_new(self.compression_level).unwrap_or_default();
        WriterProperties::builder()
            .set_compression(Compression::ZSTD(level))
            .set_max_row_group_size(self.row_group_size)
            .set_statistics_enabled(if self.write_statistics {
                EnabledStatistics::Page
            } else {
                EnabledStatistics::None
            })
            .set_key_value_metadata(Some(key_value))
            .build()
    }
}

/// One-shot builder for a persisted annotation bundle
///
/// The location is an explicit, required parameter; there is no implicit
/// default such as the process working directory.
pub struct StoreBuilder {
    location: PathBuf,
    overwrite: bool,
    config: WriterConfig,
}

impl StoreBuilder {
    /// Prepare a build targeting `location` (a directory that will be created)
    pub fn new<P: AsRef<Path>>(location: P) -> Self {
        Self {
            location: location.as_ref().to_path_buf(),
            overwrite: false,
            config: WriterConfig::default(),
        }
    }

    /// Allow replacing an existing bundle at the location
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn config(mut self, config: WriterConfig) -> Self {
        self.config = config;
        self
    }

    /// Write the bundle and return its final location
    ///
    /// Fails with [`StoreError::Metadata`] before any write if the metadata
    /// record is invalid, and with [`StoreError::NoUsableRecords`] if both
    /// record sets are empty. Any failure after staging begins discards the
    /// staged directory.
    pub fn build(
        &self,
        compounds: &[Compound],
        spectra: &[Spectrum],
        metadata: &StoreMetadata,
    ) -> Result<PathBuf, StoreError> {
        metadata.validate()?;
        if compounds.is_empty() && spectra.is_empty() {
            return Err(StoreError::NoUsableRecords);
        }
        for spectrum in spectra {
            if spectrum.mz.len() != spectrum.intensity.len() {
                return Err(StoreError::StoreWriteFailure(format!(
                    "spectrum {} has {} mz values but {} intensity values",
                    spectrum.spectrum_id,
                    spectrum.mz.len(),
                    spectrum.intensity.len()
                )));
            }
        }

        if self.location.exists() && !self.overwrite {
            return Err(StoreError::AlreadyExists(
                self.location.display().to_string(),
            ));
        }
        let parent = match self.location.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => {
                return Err(StoreError::InvalidPath(format!(
                    "'{}' has no parent directory",
                    self.location.display()
                )))
            }
        };
        if !parent.is_dir() {
            return Err(StoreError::InvalidPath(format!(
                "parent directory '{}' does not exist",
                parent.display()
            )));
        }

        log::info!(
            "building annotation bundle at {} ({} compounds, {} spectra)",
            self.location.display(),
            compounds.len(),
            spectra.len()
        );

        // Stage beside the target so the final rename stays on one filesystem.
        let staging = tempfile::Builder::new()
            .prefix(".mzannot-staging-")
            .tempdir_in(&parent)?;

        let key_value = footer_metadata(metadata)?;
        write_table(
            &staging.path().join(COMPOUNDS_FILE),
            compound_batch(compounds)?,
            &self.config,
            key_value.clone(),
        )?;
        write_table(
            &staging.path().join(SPECTRA_FILE),
            spectrum_batch(spectra)?,
            &self.config,
            key_value,
        )?;
        fs::write(staging.path().join(METADATA_FILE), metadata.to_json()?)?;

        if self.location.exists() {
            fs::remove_dir_all(&self.location)?;
        }
        fs::rename(staging.path(), &self.location).map_err(|e| {
            StoreError::StoreWriteFailure(format!(
                "failed to commit bundle to {}: {e}",
                self.location.display()
            ))
        })?;
        // The staging TempDir now points at a renamed-away path; its drop
        // cleanup is a no-op.

        log::info!("committed annotation bundle at {}", self.location.display());
        Ok(self.location.clone())
    }
}

/// Footer key-value metadata shared by both tables
fn footer_metadata(metadata: &StoreMetadata) -> Result<Vec<KeyValue>, StoreError> {
    Ok(vec![
        KeyValue::new(
            KEY_FORMAT_VERSION.to_string(),
            MZANNOT_FORMAT_VERSION.to_string(),
        ),
        KeyValue::new(
            KEY_BUILD_TIMESTAMP.to_string(),
            chrono::Utc::now().to_rfc3339(),
        ),
        KeyValue::new(
            KEY_BUILDER_INFO.to_string(),
            format!("mzannot v{}", env!("CARGO_PKG_VERSION")),
        ),
        KeyValue::new(KEY_STORE_METADATA.to_string(), metadata.to_json()?),
    ])
}

fn write_table(
    path: &Path,
    batch: RecordBatch,
    config: &WriterConfig,
    key_value: Vec<KeyValue>,
) -> Result<(), StoreError> {
    let file = fs::File::create(path)?;
    let props = config.writer_properties(key_value);
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn utf8_item_field() -> Field {
    Field::new("item", DataType::Utf8, false)
}

fn float_item_field() -> Field {
    Field::new("item", DataType::Float64, false)
}

fn compound_batch(compounds: &[Compound]) -> Result<RecordBatch, StoreError> {
    let mut id = StringBuilder::new();
    let mut name = StringBuilder::new();
    let mut inchi = StringBuilder::new();
    let mut inchi_key = StringBuilder::new();
    let mut formula = StringBuilder::new();
    let mut smiles = StringBuilder::new();
    let mut exact_mass = Float64Builder::new();
    let mut synonyms = ListBuilder::new(StringBuilder::new()).with_field(utf8_item_field());

    for compound in compounds {
        id.append_value(&compound.compound_id);
        name.append_option(compound.compound_name.as_deref());
        inchi.append_option(compound.inchi.as_deref());
        inchi_key.append_option(compound.inchi_key.as_deref());
        formula.append_option(compound.formula.as_deref());
        smiles.append_option(compound.smiles.as_deref());
        exact_mass.append_option(compound.exact_mass);
        for synonym in &compound.synonyms {
            synonyms.values().append_value(synonym);
        }
        synonyms.append(true);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(id.finish()),
        Arc::new(name.finish()),
        Arc::new(inchi.finish()),
        Arc::new(inchi_key.finish()),
        Arc::new(formula.finish()),
        Arc::new(smiles.finish()),
        Arc::new(exact_mass.finish()),
        Arc::new(synonyms.finish()),
    ];
    Ok(RecordBatch::try_new(create_compound_schema_arc(), columns)?)
}

fn spectrum_batch(spectra: &[Spectrum]) -> Result<RecordBatch, StoreError> {
    // Written sorted by compound_id so row-group statistics can prune scans
    // along the dominant join path.
    let mut order: Vec<usize> = (0..spectra.len()).collect();
    order.sort_by(|&a, &b| {
        spectra[a]
            .compound_id
            .cmp(&spectra[b].compound_id)
            .then(spectra[a].spectrum_id.cmp(&spectra[b].spectrum_id))
    });

    let mut id = Int64Builder::new();
    let mut compound_id = StringBuilder::new();
    let mut polarity = Int8Builder::new();
    let mut collision_energy = Float64Builder::new();
    let mut precursor_mz = Float64Builder::new();
    let mut instrument = StringBuilder::new();
    let mut instrument_type = StringBuilder::new();
    let mut splash = StringBuilder::new();
    let mut predicted = BooleanBuilder::new();
    let mut mz = ListBuilder::new(Float64Builder::new()).with_field(float_item_field());
    let mut intensity = ListBuilder::new(Float64Builder::new()).with_field(float_item_field());

    for &i in &order {
        let spectrum = &spectra[i];
        id.append_value(spectrum.spectrum_id);
        compound_id.append_option(spectrum.compound_id.as_deref());
        polarity.append_option(spectrum.polarity);
        collision_energy.append_option(spectrum.collision_energy);
        precursor_mz.append_option(spectrum.precursor_mz);
        instrument.append_option(spectrum.instrument.as_deref());
        instrument_type.append_option(spectrum.instrument_type.as_deref());
        splash.append_option(spectrum.splash.as_deref());
        predicted.append_option(spectrum.predicted);
        mz.values().append_slice(&spectrum.mz);
        mz.append(true);
        intensity.values().append_slice(&spectrum.intensity);
        intensity.append(true);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(id.finish()),
        Arc::new(compound_id.finish()),
        Arc::new(polarity.finish()),
        Arc::new(collision_energy.finish()),
        Arc::new(precursor_mz.finish()),
        Arc::new(instrument.finish()),
        Arc::new(instrument_type.finish()),
        Arc::new(splash.finish()),
        Arc::new(predicted.finish()),
        Arc::new(mz.finish()),
        Arc::new(intensity.finish()),
    ];
    Ok(RecordBatch::try_new(create_spectrum_schema_arc(), columns)?)
}
