//! Column names of the compound table as constants for type safety

/// Source-scoped compound identifier (grouping key, not a primary key)
pub const COMPOUND_ID: &str = "compound_id";
/// Preferred compound name
pub const COMPOUND_NAME: &str = "compound_name";
/// InChI structure identifier
pub const INCHI: &str = "inchi";
/// Hashed InChI key
pub const INCHI_KEY: &str = "inchi_key";
/// Molecular formula
pub const FORMULA: &str = "formula";
/// SMILES structure notation
pub const SMILES: &str = "smiles";
/// Monoisotopic exact mass in Da
pub const EXACT_MASS: &str = "exact_mass";
/// Ordered alias names (possibly empty)
pub const SYNONYMS: &str = "synonyms";
