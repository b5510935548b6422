//! Built-in source layouts
//!
//! Each layout records how one annotation resource names its fields and how
//! the source is organized. Canonical names are the store column names (see
//! [`crate::schema`]); a handful of pseudo-targets (`peaks_text`,
//! `source_spectrum_id`) route fields that need interpretation rather than
//! storage.

use std::collections::HashMap;

use crate::schema::{compound_columns as cc, spectrum_columns as sc};

use super::canonical;

/// How a source organizes its records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePolicy {
    /// A compound catalog: one row per distinct `compound_id`, duplicates
    /// merged first-non-empty-wins
    CompoundCentric,
    /// Per-spectrum submissions: compound fields kept verbatim per record,
    /// `compound_id` treated as a grouping key
    SpectrumCentric,
}

/// Alias table and policy for one source
#[derive(Debug, Clone)]
pub struct SourceLayout {
    id: String,
    policy: SourcePolicy,
    aliases: HashMap<String, String>,
}

impl SourceLayout {
    /// Start an empty layout for a custom source
    pub fn new(id: impl Into<String>, policy: SourcePolicy) -> Self {
        Self {
            id: id.into(),
            policy,
            aliases: HashMap::new(),
        }
    }

    /// Map a raw source field name onto a canonical column name
    pub fn with_alias(mut self, raw: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.aliases.insert(raw.into(), canonical.into());
        self
    }

    /// Source identifier (e.g. `"hmdb"`)
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn policy(&self) -> SourcePolicy {
        self.policy
    }

    /// Canonical name for a raw field, if the layout recognizes it
    pub fn canonical_name(&self, raw: &str) -> Option<&str> {
        self.aliases.get(raw).map(String::as_str)
    }

    /// HMDB metabolite dumps: compound-centric SDF
    pub fn hmdb() -> Self {
        Self::new("hmdb", SourcePolicy::CompoundCentric)
            .with_alias("DATABASE_ID", cc::COMPOUND_ID)
            .with_alias("HMDB_ID", cc::COMPOUND_ID)
            .with_alias("GENERIC_NAME", cc::COMPOUND_NAME)
            .with_alias("INCHI_IDENTIFIER", cc::INCHI)
            .with_alias("INCHI_KEY", cc::INCHI_KEY)
            .with_alias("FORMULA", cc::FORMULA)
            .with_alias("EXACT_MASS", cc::EXACT_MASS)
            .with_alias("SMILES", cc::SMILES)
            .with_alias("SYNONYMS", canonical::SYNONYMS)
    }

    /// HMDB per-spectrum XML documents
    pub fn hmdb_msms() -> Self {
        Self::new("hmdb_msms", SourcePolicy::SpectrumCentric)
            .with_alias("database_id", cc::COMPOUND_ID)
            .with_alias("id", canonical::SOURCE_SPECTRUM_ID)
            .with_alias("collision_energy_voltage", sc::COLLISION_ENERGY)
            .with_alias("ionization_mode", sc::POLARITY)
            .with_alias("instrument_type", sc::INSTRUMENT_TYPE)
            .with_alias("predicted", sc::PREDICTED)
            .with_alias("splash_key", sc::SPLASH)
            .with_alias("mz", sc::MZ)
            .with_alias("intensity", sc::INTENSITY)
    }

    /// ChEBI complete dumps: compound-centric SDF
    pub fn chebi() -> Self {
        Self::new("chebi", SourcePolicy::CompoundCentric)
            .with_alias("ChEBI ID", cc::COMPOUND_ID)
            .with_alias("ChEBI Name", cc::COMPOUND_NAME)
            .with_alias("InChI", cc::INCHI)
            .with_alias("InChIKey", cc::INCHI_KEY)
            .with_alias("Formulae", cc::FORMULA)
            .with_alias("Monoisotopic Mass", cc::EXACT_MASS)
            .with_alias("SMILES", cc::SMILES)
            .with_alias("Synonyms", canonical::SYNONYMS)
    }

    /// MassBank of North America exports: spectrum-centric SDF, each record
    /// one submitted spectrum carrying its own copy of the compound fields
    pub fn mona() -> Self {
        Self::new("mona", SourcePolicy::SpectrumCentric)
            .with_alias("ID", cc::COMPOUND_ID)
            .with_alias("NAME", cc::COMPOUND_NAME)
            .with_alias("INCHI", cc::INCHI)
            .with_alias("INCHIKEY", cc::INCHI_KEY)
            .with_alias("FORMULA", cc::FORMULA)
            .with_alias("EXACT MASS", cc::EXACT_MASS)
            .with_alias("SMILES", cc::SMILES)
            .with_alias("SYNONYMS", canonical::SYNONYMS)
            .with_alias("ION MODE", sc::POLARITY)
            .with_alias("COLLISION ENERGY", sc::COLLISION_ENERGY)
            .with_alias("PRECURSOR M/Z", sc::PRECURSOR_MZ)
            .with_alias("INSTRUMENT", sc::INSTRUMENT)
            .with_alias("INSTRUMENT TYPE", sc::INSTRUMENT_TYPE)
            .with_alias("SPLASH", sc::SPLASH)
            .with_alias("MASS SPECTRAL PEAKS", canonical::PEAKS_TEXT)
    }
}
