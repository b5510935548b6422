use std::io::BufReader;
use std::io::Write;

use super::sdf::{self, SdfReader};
use super::xml;
use super::{FormatError, RawRecord, RawValue};

const HMDB_SDF: &str = "\
HMDB0000001

Generated record
  0  0  0  0  0  0  0  0  0  0999 V2000
M  END
> <DATABASE_ID>
HMDB0000001

> <GENERIC_NAME>
1-Methylhistidine

> <FORMULA>
C7H11N3O2

> <EXACT_MASS>
169.085126611

> <SYNONYMS>
(2S)-2-amino-3-(1-methyl-1H-imidazol-4-yl)propanoic acid; 1-MHis

$$$$
HMDB0000002

Generated record
M  END
> <DATABASE_ID>
HMDB0000002

> <GENERIC_NAME>
1,3-Diaminopropane

$$$$
";

fn reader(text: &str) -> SdfReader<BufReader<&[u8]>> {
    SdfReader::new(BufReader::new(text.as_bytes()))
}

#[test]
fn test_sdf_parses_tagged_fields() {
    let records: Vec<RawRecord> = reader(HMDB_SDF).map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 2);

    let first = &records[0];
    assert_eq!(first.text("DATABASE_ID"), Some("HMDB0000001"));
    assert_eq!(first.text("GENERIC_NAME"), Some("1-Methylhistidine"));
    assert_eq!(first.text("FORMULA"), Some("C7H11N3O2"));
    assert_eq!(first.number("EXACT_MASS"), Some(169.085126611));
    assert_eq!(first.text(sdf::MOLFILE_TITLE_FIELD), Some("HMDB0000001"));

    let second = &records[1];
    assert_eq!(second.text("DATABASE_ID"), Some("HMDB0000002"));
    assert_eq!(second.text("FORMULA"), None);
}

#[test]
fn test_sdf_accumulates_multivalued_fields() {
    let text = "\
title
M  END
> <ID>
X1

> <Synonyms>
alpha
beta
gamma

$$$$
";
    let records: Vec<RawRecord> = reader(text).map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text_list("Synonyms"), vec!["alpha", "beta", "gamma"]);
    assert!(matches!(
        records[0].get("Synonyms"),
        Some(RawValue::TextList(_))
    ));
}

#[test]
fn test_sdf_skips_malformed_block_and_continues() {
    let text = "\
just a molfile with no data items
M  END
$$$$
good
M  END
> <ID>
X2

$$$$
";
    let results: Vec<_> = reader(text).collect();
    assert_eq!(results.len(), 2);
    assert!(matches!(
        results[0],
        Err(FormatError::MalformedRecord(_))
    ));
    let record = results[1].as_ref().unwrap();
    assert_eq!(record.text("ID"), Some("X2"));
}

#[test]
fn test_sdf_trailing_whitespace_is_not_a_record() {
    let text = "t\nM  END\n> <ID>\nX\n\n$$$$\n\n  \n";
    let records: Vec<_> = reader(text).collect();
    assert_eq!(records.len(), 1);
}

#[test]
fn test_sdf_gzip_roundtrip() {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let dir = tempfile::tempdir().unwrap();
    let plain_path = dir.path().join("dump.sdf");
    let gz_path = dir.path().join("dump.sdf.gz");
    std::fs::write(&plain_path, HMDB_SDF).unwrap();
    let mut encoder = GzEncoder::new(
        std::fs::File::create(&gz_path).unwrap(),
        Compression::default(),
    );
    encoder.write_all(HMDB_SDF.as_bytes()).unwrap();
    encoder.finish().unwrap();

    let (plain, skipped_plain) = sdf::read_records(&plain_path).unwrap();
    let (gz, skipped_gz) = sdf::read_records(&gz_path).unwrap();
    assert_eq!(skipped_plain, 0);
    assert_eq!(skipped_gz, 0);
    assert_eq!(plain, gz);
}

const SPECTRUM_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ms-ms>
  <id>1098</id>
  <database-id>HMDB0000001</database-id>
  <collision-energy-voltage>10</collision-energy-voltage>
  <ionization-mode>positive</ionization-mode>
  <instrument-type>LC-ESI-qTof</instrument-type>
  <predicted>false</predicted>
  <ms-ms-peaks>
    <ms-ms-peak>
      <mass-charge>40.948</mass-charge>
      <intensity>0.271</intensity>
    </ms-ms-peak>
    <ms-ms-peak>
      <mass-charge>109.998</mass-charge>
      <intensity>1.634</intensity>
    </ms-ms-peak>
    <ms-ms-peak>
      <mass-charge>170.089</mass-charge>
      <intensity>100.0</intensity>
    </ms-ms-peak>
  </ms-ms-peaks>
</ms-ms>
"#;

#[test]
fn test_xml_captures_open_field_set_and_peaks() {
    let record = xml::parse_spectrum_document(BufReader::new(SPECTRUM_XML.as_bytes())).unwrap();
    assert_eq!(record.text("database_id"), Some("HMDB0000001"));
    assert_eq!(record.text("ionization_mode"), Some("positive"));
    assert_eq!(record.number("collision_energy_voltage"), Some(10.0));
    assert_eq!(record.text("predicted"), Some("false"));
    assert_eq!(
        record.number_list("mz"),
        Some(&[40.948, 109.998, 170.089][..])
    );
    assert_eq!(
        record.number_list("intensity"),
        Some(&[0.271, 1.634, 100.0][..])
    );
}

#[test]
fn test_xml_rejects_misaligned_peak_arrays() {
    let doc = r#"<ms-ms>
  <database-id>HMDB0000002</database-id>
  <ms-ms-peaks>
    <ms-ms-peak><mass-charge>1.0</mass-charge><intensity>2.0</intensity></ms-ms-peak>
    <ms-ms-peak><mass-charge>3.0</mass-charge></ms-ms-peak>
  </ms-ms-peaks>
</ms-ms>"#;
    let err = xml::parse_spectrum_document(BufReader::new(doc.as_bytes())).unwrap_err();
    assert!(matches!(
        err,
        FormatError::MalformedSpectrum {
            mz_len: 2,
            intensity_len: 1
        }
    ));
    assert!(err.is_record_error());
}

#[test]
fn test_spectrum_document_naming_convention() {
    assert!(xml::is_spectrum_document(
        "HMDB0000001_ms_ms_spectrum_1098_experimental.xml"
    ));
    assert!(xml::is_spectrum_document("hmdb_ms_ms_spectrum_2.XML"));
    assert!(!xml::is_spectrum_document("HMDB0000001.xml"));
    assert!(!xml::is_spectrum_document("ms_ms_spectrum_1.txt"));
    assert!(!xml::is_spectrum_document("readme.md"));
}

#[test]
fn test_directory_discovery_ignores_unrelated_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("HMDB01_ms_ms_spectrum_1_experimental.xml"),
        SPECTRUM_XML,
    )
    .unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a spectrum").unwrap();
    std::fs::write(dir.path().join("compound.xml"), "<other/>").unwrap();

    let documents = xml::discover_spectrum_documents(dir.path()).unwrap();
    assert_eq!(documents.len(), 1);
}

#[test]
fn test_batch_continues_past_malformed_spectrum() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("a_ms_ms_spectrum_1.xml"),
        SPECTRUM_XML,
    )
    .unwrap();
    let broken = r#"<ms-ms>
  <database-id>HMDB0000009</database-id>
  <ms-ms-peaks>
    <ms-ms-peak><mass-charge>1.0</mass-charge></ms-ms-peak>
  </ms-ms-peaks>
</ms-ms>"#;
    std::fs::write(dir.path().join("b_ms_ms_spectrum_2.xml"), broken).unwrap();

    let (records, skipped) = xml::read_spectra(dir.path()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(skipped, 1);
    assert_eq!(records[0].text("database_id"), Some("HMDB0000001"));
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    fn tag_name() -> impl Strategy<Value = String> {
        "[A-Z][A-Z_]{1,12}".prop_filter("reserved", |t| t != "MOLFILE_TITLE")
    }

    fn field_value() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 ,.()-]{1,30}"
            .prop_map(|s| s.trim().to_string())
            .prop_filter("non-empty", |s| !s.is_empty())
    }

    fn peaks() -> impl Strategy<Value = Vec<(f64, f64)>> {
        proptest::collection::vec((0.1f64..2000.0, 0.1f64..100.0), 1..20)
    }

    proptest! {
        /// A spectrum document parses iff its mass and intensity sequences
        /// are the same length; parsed sequences stay index-aligned.
        #[test]
        fn spectrum_peak_alignment(peaks in peaks(), drop_last_intensity in any::<bool>()) {
            let mut doc = String::from(
                "<ms-ms>\n  <database-id>HMDB0000001</database-id>\n  <ms-ms-peaks>\n",
            );
            for (i, (mass, value)) in peaks.iter().enumerate() {
                doc.push_str(&format!("    <ms-ms-peak><mass-charge>{mass}</mass-charge>"));
                if !(drop_last_intensity && i == peaks.len() - 1) {
                    doc.push_str(&format!("<intensity>{value}</intensity>"));
                }
                doc.push_str("</ms-ms-peak>\n");
            }
            doc.push_str("  </ms-ms-peaks>\n</ms-ms>\n");

            let result = xml::parse_spectrum_document(BufReader::new(doc.as_bytes()));
            if drop_last_intensity {
                let malformed = matches!(
                    result,
                    Err(FormatError::MalformedSpectrum { mz_len, intensity_len })
                        if mz_len == peaks.len() && intensity_len == peaks.len() - 1
                );
                prop_assert!(malformed);
            } else {
                prop_assert!(result.is_ok());
                let record = result.unwrap();
                let mz = record.number_list("mz");
                let intensity = record.number_list("intensity");
                prop_assert_eq!(mz.map(<[f64]>::len), Some(peaks.len()));
                prop_assert_eq!(intensity.map(<[f64]>::len), Some(peaks.len()));
            }
        }

        /// Rendering a field mapping as an SDF block and parsing it back
        /// recovers every field.
        #[test]
        fn sdf_roundtrip(fields in proptest::collection::btree_map(tag_name(), field_value(), 1..8)) {
            let mut text = String::from("title\nM  END\n");
            for (tag, value) in &fields {
                text.push_str(&format!("> <{tag}>\n{value}\n\n"));
            }
            text.push_str("$$$$\n");

            let records: Vec<RawRecord> =
                reader(&text).map(|r| r.unwrap()).collect();
            prop_assert_eq!(records.len(), 1);
            for (tag, value) in &fields {
                prop_assert_eq!(records[0].text(tag), Some(value.as_str()));
            }
        }
    }
}
