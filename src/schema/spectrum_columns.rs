//! Column names of the spectrum table as constants for type safety

/// Store-unique spectrum identifier
pub const SPECTRUM_ID: &str = "spectrum_id";
/// Reference to the compound table (non-enforced)
pub const COMPOUND_ID: &str = "compound_id";
/// Polarity (1 for positive, -1 for negative)
pub const POLARITY: &str = "polarity";
/// Collision energy in eV
pub const COLLISION_ENERGY: &str = "collision_energy";
/// Precursor m/z
pub const PRECURSOR_MZ: &str = "precursor_mz";
/// Instrument name
pub const INSTRUMENT: &str = "instrument";
/// Instrument type
pub const INSTRUMENT_TYPE: &str = "instrument_type";
/// SPLASH spectral hash
pub const SPLASH: &str = "splash";
/// Whether the spectrum is predicted rather than experimental
pub const PREDICTED: &str = "predicted";
/// Mass-to-charge values in acquisition order
pub const MZ: &str = "mz";
/// Intensity values, index-aligned with `mz`
pub const INTENSITY: &str = "intensity";
