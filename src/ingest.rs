//! Multi-source ingestion
//!
//! Drives the parse-then-normalize pipeline for any number of source files
//! and keeps spectrum ids unique across all of them. The accumulated
//! records feed [`crate::store::StoreBuilder`] directly.

use std::path::Path;

use crate::formats::{self, FormatError, RawRecord};
use crate::normalize::{NormalizedBatch, Normalizer, SourceLayout};

/// Counters accumulated across every ingested source
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestStats {
    /// Source files or directories ingested
    pub sources: usize,
    /// Raw records that parsed successfully
    pub records_parsed: usize,
    /// Malformed records skipped during parsing
    pub records_skipped: usize,
    /// Records dropped during normalization
    pub records_dropped: usize,
    /// Compound rows accumulated
    pub compounds: usize,
    /// Spectrum rows accumulated
    pub spectra: usize,
}

/// Accumulates normalized records from several sources into one batch
///
/// Spectrum ids continue across sources, so a store built from the result
/// never contains duplicate ids.
#[derive(Debug)]
pub struct Ingestor {
    batch: NormalizedBatch,
    next_spectrum_id: i64,
    stats: IngestStats,
}

impl Default for Ingestor {
    fn default() -> Self {
        Self::new()
    }
}

impl Ingestor {
    pub fn new() -> Self {
        Self {
            batch: NormalizedBatch::default(),
            next_spectrum_id: 1,
            stats: IngestStats::default(),
        }
    }

    /// Ingest one SDF file (plain or gzip-compressed)
    pub fn sdf_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        layout: &SourceLayout,
    ) -> Result<(), FormatError> {
        let (records, skipped) = formats::sdf::read_records(path.as_ref())?;
        log::info!(
            "parsed {} ({} records, {} skipped)",
            path.as_ref().display(),
            records.len(),
            skipped
        );
        self.absorb(records, skipped, layout);
        Ok(())
    }

    /// Ingest a directory of per-spectrum XML documents
    pub fn spectrum_dir<P: AsRef<Path>>(
        &mut self,
        dir: P,
        layout: &SourceLayout,
    ) -> Result<(), FormatError> {
        let (records, skipped) = formats::xml::read_spectra(dir.as_ref())?;
        log::info!(
            "parsed {} ({} spectrum documents, {} skipped)",
            dir.as_ref().display(),
            records.len(),
            skipped
        );
        self.absorb(records, skipped, layout);
        Ok(())
    }

    /// Counters so far
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Finish ingestion, yielding the accumulated batch and counters
    pub fn finish(self) -> (NormalizedBatch, IngestStats) {
        (self.batch, self.stats)
    }

    fn absorb(&mut self, records: Vec<RawRecord>, skipped: usize, layout: &SourceLayout) {
        self.stats.sources += 1;
        self.stats.records_parsed += records.len();
        self.stats.records_skipped += skipped;

        let mut normalizer =
            Normalizer::new(layout.clone()).with_first_spectrum_id(self.next_spectrum_id);
        let normalized = normalizer.normalize(records);
        self.next_spectrum_id = normalizer.next_spectrum_id();

        let stats = normalizer.stats();
        self.stats.records_dropped += stats.records_dropped;
        self.stats.compounds += normalized.compounds.len();
        self.stats.spectra += normalized.spectra.len();
        self.batch.compounds.extend(normalized.compounds);
        self.batch.spectra.extend(normalized.spectra);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::tempdir;

    use super::*;
    use crate::normalize::SourceLayout;

    const SDF: &str = "\
Glucose
  Generated

  0  0  0  0  0  0  0  0  0  0 V2000
M  END
> <DATABASE_ID>
HMDB0000122

> <GENERIC_NAME>
D-Glucose

> <FORMULA>
C6H12O6

$$$$
";

    const SPECTRUM_XML: &str = "\
<?xml version=\"1.0\"?>
<ms-ms>
  <id>77</id>
  <database-id>HMDB0000122</database-id>
  <ionization-mode>positive</ionization-mode>
  <ms-ms-peaks>
    <ms-ms-peak><mass-charge>85.02</mass-charge><intensity>100.0</intensity></ms-ms-peak>
    <ms-ms-peak><mass-charge>127.03</mass-charge><intensity>42.0</intensity></ms-ms-peak>
  </ms-ms-peaks>
</ms-ms>
";

    #[test]
    fn test_spectrum_ids_stay_unique_across_sources() {
        let dir = tempdir().unwrap();
        let sdf_path = dir.path().join("compounds.sdf");
        std::fs::File::create(&sdf_path)
            .unwrap()
            .write_all(SDF.as_bytes())
            .unwrap();
        let spectra_dir = dir.path().join("spectra");
        std::fs::create_dir(&spectra_dir).unwrap();
        for name in ["a_ms_ms_spectrum_1.xml", "b_ms_ms_spectrum_2.xml"] {
            std::fs::File::create(spectra_dir.join(name))
                .unwrap()
                .write_all(SPECTRUM_XML.as_bytes())
                .unwrap();
        }

        let mut ingestor = Ingestor::new();
        ingestor.sdf_file(&sdf_path, &SourceLayout::hmdb()).unwrap();
        ingestor
            .spectrum_dir(&spectra_dir, &SourceLayout::hmdb_msms())
            .unwrap();

        let (batch, stats) = ingestor.finish();
        assert_eq!(stats.sources, 2);
        assert_eq!(batch.compounds.len(), 1);
        assert_eq!(batch.spectra.len(), 2);
        let mut ids: Vec<i64> = batch.spectra.iter().map(|s| s.spectrum_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 2);
    }
}
