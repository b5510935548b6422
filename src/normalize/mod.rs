//! # Normalizer
//!
//! Maps raw parser output into the canonical [`Compound`] and [`Spectrum`]
//! records the store builder consumes. Sources name the same semantic field
//! differently, so every source gets a [`SourceLayout`]: an alias table from
//! its raw field names to canonical column names, plus a policy describing
//! how the source is organized:
//!
//! - [`SourcePolicy::CompoundCentric`] — the source is a compound catalog;
//!   one output row per distinct `compound_id`, later records for the same
//!   id only fill fields still empty (first-non-empty-wins), so sparse
//!   duplicates never overwrite richer earlier data.
//! - [`SourcePolicy::SpectrumCentric`] — the source is organized around
//!   per-spectrum submissions; every record's compound fields are kept
//!   verbatim as their own compound row even when `compound_id` repeats
//!   with divergent values. The compound table is a bag, and downstream
//!   code must not assume id uniqueness.
//!
//! A record missing all of `compound_id`, `inchi`, and `formula` carries no
//! usable identity and is dropped with a diagnostic; records missing only
//! some fields are kept with those fields absent.

mod sources;


pub use sources::{SourceLayout, SourcePolicy};

use std::collections::{BTreeMap, HashMap};

use crate::formats::{RawRecord, RawValue};
use crate::schema::{compound_columns, spectrum_columns};

/// Canonical chemical entity record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compound {
    /// Source-scoped identifier; never absent, but not necessarily unique
    pub compound_id: String,
    pub compound_name: Option<String>,
    pub inchi: Option<String>,
    pub inchi_key: Option<String>,
    pub formula: Option<String>,
    pub smiles: Option<String>,
    /// Monoisotopic mass in Da
    pub exact_mass: Option<f64>,
    /// Ordered alias names (possibly empty)
    pub synonyms: Vec<String>,
    /// Unrecognized source fields, preserved for layout extensions
    pub extra: BTreeMap<String, String>,
}

/// Canonical fragmentation spectrum record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spectrum {
    /// Store-unique identifier, assigned sequentially during normalization
    pub spectrum_id: i64,
    /// Reference into the compound table; tolerated dangling
    pub compound_id: Option<String>,
    /// 1 for positive mode, -1 for negative
    pub polarity: Option<i8>,
    pub collision_energy: Option<f64>,
    pub precursor_mz: Option<f64>,
    pub instrument: Option<String>,
    pub instrument_type: Option<String>,
    pub splash: Option<String>,
    pub predicted: Option<bool>,
    /// Mass-to-charge values in acquisition order
    pub mz: Vec<f64>,
    /// Intensity values, index-aligned with `mz`
    pub intensity: Vec<f64>,
    /// Unrecognized source fields, preserved for layout extensions
    pub extra: BTreeMap<String, String>,
}

impl Spectrum {
    /// Number of peaks in the spectrum
    pub fn peak_count(&self) -> usize {
        self.mz.len()
    }
}

/// Output of one normalization run
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub compounds: Vec<Compound>,
    pub spectra: Vec<Spectrum>,
}

/// Counters describing one normalization run
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizerStats {
    /// Compound rows emitted
    pub compounds_emitted: usize,
    /// Records folded into an existing compound row (compound-centric only)
    pub compounds_merged: usize,
    /// Spectrum rows emitted
    pub spectra_emitted: usize,
    /// Records dropped for missing identity or misaligned peaks
    pub records_dropped: usize,
}

/// Converts raw records of one source into canonical records
pub struct Normalizer {
    layout: SourceLayout,
    next_spectrum_id: i64,
    stats: NormalizerStats,
}

/// Canonical target of an aliased field that is not a stored column
pub(crate) mod canonical {
    /// Multi-line `"mz intensity"` peak text (spectrum-centric SDF sources)
    pub const PEAKS_TEXT: &str = "peaks_text";
    /// Source-supplied spectrum identifier, preserved in the side-map
    pub const SOURCE_SPECTRUM_ID: &str = "source_spectrum_id";
    /// Alias names
    pub const SYNONYMS: &str = "synonyms";
}

/// Fields of one record after alias resolution, before policy application
#[derive(Debug, Default)]
struct Draft {
    compound: Compound,
    has_compound_id: bool,
    polarity: Option<i8>,
    collision_energy: Option<f64>,
    precursor_mz: Option<f64>,
    instrument: Option<String>,
    instrument_type: Option<String>,
    splash: Option<String>,
    predicted: Option<bool>,
    mz: Vec<f64>,
    intensity: Vec<f64>,
    extra: BTreeMap<String, String>,
}

impl Normalizer {
    pub fn new(layout: SourceLayout) -> Self {
        Self {
            layout,
            next_spectrum_id: 1,
            stats: NormalizerStats::default(),
        }
    }

    /// Continue spectrum-id assignment from a given value
    ///
    /// Needed when several sources feed one store and ids must stay unique
    /// across normalizers.
    pub fn with_first_spectrum_id(mut self, id: i64) -> Self {
        self.next_spectrum_id = id;
        self
    }

    /// The id the next emitted spectrum would receive
    pub fn next_spectrum_id(&self) -> i64 {
        self.next_spectrum_id
    }

    pub fn stats(&self) -> &NormalizerStats {
        &self.stats
    }

    pub fn layout(&self) -> &SourceLayout {
        &self.layout
    }

    /// Normalize a batch of raw records
    ///
    /// Compound-centric deduplication happens within one call: records for
    /// the same `compound_id` merge into the row created by the first one.
    pub fn normalize(&mut self, records: impl IntoIterator<Item = RawRecord>) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for record in records {
            let draft = match self.resolve(&record) {
                Ok(draft) => draft,
                Err(reason) => {
                    log::warn!("dropping {} record: {reason}", self.layout.id());
                    self.stats.records_dropped += 1;
                    continue;
                }
            };

            if !draft.has_compound_id && draft.compound.inchi.is_none()
                && draft.compound.formula.is_none()
            {
                log::warn!(
                    "dropping {} record: no compound_id, inchi, or formula",
                    self.layout.id()
                );
                self.stats.records_dropped += 1;
                continue;
            }

            let has_peaks = !draft.mz.is_empty() || !draft.intensity.is_empty();
            if has_peaks {
                if draft.mz.len() != draft.intensity.len() {
                    log::warn!(
                        "dropping {} record: {} mz values but {} intensity values",
                        self.layout.id(),
                        draft.mz.len(),
                        draft.intensity.len()
                    );
                    self.stats.records_dropped += 1;
                    continue;
                }
                batch.spectra.push(Spectrum {
                    spectrum_id: self.next_spectrum_id,
                    compound_id: if draft.has_compound_id {
                        Some(draft.compound.compound_id.clone())
                    } else {
                        None
                    },
                    polarity: draft.polarity,
                    collision_energy: draft.collision_energy,
                    precursor_mz: draft.precursor_mz,
                    instrument: draft.instrument.clone(),
                    instrument_type: draft.instrument_type.clone(),
                    splash: draft.splash.clone(),
                    predicted: draft.predicted,
                    mz: draft.mz.clone(),
                    intensity: draft.intensity.clone(),
                    extra: draft.extra.clone(),
                });
                self.next_spectrum_id += 1;
                self.stats.spectra_emitted += 1;
            }

            if !draft.has_compound_id {
                log::warn!(
                    "{} record has structure fields but no compound_id; no compound row emitted",
                    self.layout.id()
                );
                continue;
            }

            let mut compound = draft.compound;
            compound.extra = draft.extra;
            match self.layout.policy() {
                SourcePolicy::SpectrumCentric => {
                    // A record carrying nothing but the id (e.g. a spectrum
                    // document referencing a compound catalogued elsewhere)
                    // adds no information to the compound bag.
                    if !compound_is_bare(&compound) {
                        batch.compounds.push(compound);
                        self.stats.compounds_emitted += 1;
                    }
                }
                SourcePolicy::CompoundCentric => {
                    match seen.entry(compound.compound_id.clone()) {
                        std::collections::hash_map::Entry::Vacant(slot) => {
                            slot.insert(batch.compounds.len());
                            batch.compounds.push(compound);
                            self.stats.compounds_emitted += 1;
                        }
                        std::collections::hash_map::Entry::Occupied(slot) => {
                            merge_compound(&mut batch.compounds[*slot.get()], compound);
                            self.stats.compounds_merged += 1;
                        }
                    }
                }
            }
        }

        log::debug!(
            "normalized {}: {} compounds ({} merged), {} spectra, {} dropped",
            self.layout.id(),
            self.stats.compounds_emitted,
            self.stats.compounds_merged,
            self.stats.spectra_emitted,
            self.stats.records_dropped
        );
        batch
    }

    /// Map one raw record through the alias table
    fn resolve(&self, record: &RawRecord) -> Result<Draft, String> {
        let mut draft = Draft::default();

        for (raw_name, value) in record.iter() {
            let Some(target) = self.layout.canonical_name(raw_name) else {
                draft
                    .extra
                    .entry(raw_name.to_ascii_lowercase())
                    .or_insert_with(|| display_value(value));
                continue;
            };
            match target {
                compound_columns::COMPOUND_ID => {
                    if let Some(id) = record.text(raw_name) {
                        if !draft.has_compound_id {
                            draft.compound.compound_id = id.to_string();
                            draft.has_compound_id = true;
                        }
                    }
                }
                compound_columns::COMPOUND_NAME => set_text(&mut draft.compound.compound_name, record.text(raw_name)),
                compound_columns::INCHI => set_text(&mut draft.compound.inchi, record.text(raw_name)),
                compound_columns::INCHI_KEY => set_text(&mut draft.compound.inchi_key, record.text(raw_name)),
                compound_columns::FORMULA => set_text(&mut draft.compound.formula, record.text(raw_name)),
                compound_columns::SMILES => set_text(&mut draft.compound.smiles, record.text(raw_name)),
                compound_columns::EXACT_MASS => {
                    if draft.compound.exact_mass.is_none() {
                        draft.compound.exact_mass = record.number(raw_name);
                    }
                }
                canonical::SYNONYMS => {
                    for item in record.text_list(raw_name) {
                        for synonym in item.split(';') {
                            let synonym = synonym.trim();
                            if !synonym.is_empty()
                                && !draft.compound.synonyms.iter().any(|s| s == synonym)
                            {
                                draft.compound.synonyms.push(synonym.to_string());
                            }
                        }
                    }
                }
                spectrum_columns::POLARITY => {
                    if let Some(text) = record.text(raw_name) {
                        draft.polarity = parse_polarity(text);
                    }
                }
                spectrum_columns::COLLISION_ENERGY => {
                    draft.collision_energy = record
                        .number(raw_name)
                        .or_else(|| record.text(raw_name).and_then(parse_leading_number));
                }
                spectrum_columns::PRECURSOR_MZ => draft.precursor_mz = record.number(raw_name),
                spectrum_columns::INSTRUMENT => set_text(&mut draft.instrument, record.text(raw_name)),
                spectrum_columns::INSTRUMENT_TYPE => set_text(&mut draft.instrument_type, record.text(raw_name)),
                spectrum_columns::SPLASH => set_text(&mut draft.splash, record.text(raw_name)),
                spectrum_columns::PREDICTED => {
                    draft.predicted = record.text(raw_name).map(parse_flag);
                }
                spectrum_columns::MZ => {
                    if let Some(values) = record.number_list(raw_name) {
                        draft.mz = values.to_vec();
                    }
                }
                spectrum_columns::INTENSITY => {
                    if let Some(values) = record.number_list(raw_name) {
                        draft.intensity = values.to_vec();
                    }
                }
                canonical::PEAKS_TEXT => {
                    let (mz, intensity) = parse_peaks_text(record.text_list(raw_name))?;
                    draft.mz = mz;
                    draft.intensity = intensity;
                }
                canonical::SOURCE_SPECTRUM_ID => {
                    if let Some(id) = record.text(raw_name) {
                        draft
                            .extra
                            .insert(canonical::SOURCE_SPECTRUM_ID.to_string(), id.to_string());
                    }
                }
                other => {
                    draft
                        .extra
                        .entry(other.to_string())
                        .or_insert_with(|| display_value(value));
                }
            }
        }

        Ok(draft)
    }
}

fn set_text(slot: &mut Option<String>, value: Option<&str>) {
    if slot.is_none() {
        *slot = value.map(str::to_string);
    }
}

fn display_value(value: &RawValue) -> String {
    match value {
        RawValue::Text(s) => s.clone(),
        RawValue::Number(n) => n.to_string(),
        RawValue::TextList(list) => list.join("; "),
        RawValue::NumberList(list) => list
            .iter()
            .map(f64::to_string)
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Interpret the polarity words and signs sources use
pub(crate) fn parse_polarity(text: &str) -> Option<i8> {
    let lower = text.trim().to_ascii_lowercase();
    if lower.starts_with('p') || lower == "+" || lower == "1" {
        Some(1)
    } else if lower.starts_with('n') || lower == "-" || lower == "-1" {
        Some(-1)
    } else {
        None
    }
}

fn parse_flag(text: &str) -> bool {
    matches!(text.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Parse numbers like "10 eV" or "35.0 V" down to the leading value
fn parse_leading_number(text: &str) -> Option<f64> {
    text.split_whitespace().next()?.parse().ok()
}

/// Parse `"mz intensity"` peak lines into aligned sequences
fn parse_peaks_text(lines: Vec<&str>) -> Result<(Vec<f64>, Vec<f64>), String> {
    let mut mz = Vec::new();
    let mut intensity = Vec::new();
    for line in lines {
        let mut tokens = line.split_whitespace();
        let (Some(m), Some(i)) = (tokens.next(), tokens.next()) else {
            return Err(format!("unparsable peak line '{line}'"));
        };
        let m: f64 = m
            .parse()
            .map_err(|_| format!("non-numeric mz '{m}' in peak line"))?;
        let i: f64 = i
            .parse()
            .map_err(|_| format!("non-numeric intensity '{i}' in peak line"))?;
        mz.push(m);
        intensity.push(i);
    }
    Ok((mz, intensity))
}

/// Whether a compound row carries nothing beyond its identifier
fn compound_is_bare(compound: &Compound) -> bool {
    compound.compound_name.is_none()
        && compound.inchi.is_none()
        && compound.inchi_key.is_none()
        && compound.formula.is_none()
        && compound.smiles.is_none()
        && compound.exact_mass.is_none()
        && compound.synonyms.is_empty()
}

/// Fill empty fields of `target` from `incoming` (first-non-empty-wins)
fn merge_compound(target: &mut Compound, incoming: Compound) {
    if target.compound_name.is_none() {
        target.compound_name = incoming.compound_name;
    }
    if target.inchi.is_none() {
        target.inchi = incoming.inchi;
    }
    if target.inchi_key.is_none() {
        target.inchi_key = incoming.inchi_key;
    }
    if target.formula.is_none() {
        target.formula = incoming.formula;
    }
    if target.smiles.is_none() {
        target.smiles = incoming.smiles;
    }
    if target.exact_mass.is_none() {
        target.exact_mass = incoming.exact_mass;
    }
    for synonym in incoming.synonyms {
        if !target.synonyms.iter().any(|s| *s == synonym) {
            target.synonyms.push(synonym);
        }
    }
    for (key, value) in incoming.extra {
        target.extra.entry(key).or_insert(value);
    }
}
