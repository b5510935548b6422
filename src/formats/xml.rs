//! Parser for per-spectrum XML documents
//!
//! Sources like HMDB publish one MS/MS spectrum per XML document, named
//! after a convention (`HMDB0000001_ms_ms_spectrum_12_experimental.xml`).
//! Discovery walks a directory and silently ignores files that do not match
//! the convention; they are simply not spectrum documents.
//!
//! A document is a shallow tree of leaf elements:
//!
//! ```xml
//! <ms-ms>
//!   <database-id>HMDB0000001</database-id>
//!   <collision-energy-voltage>10</collision-energy-voltage>
//!   <ionization-mode>positive</ionization-mode>
//!   <ms-ms-peaks>
//!     <ms-ms-peak>
//!       <mass-charge>40.948</mass-charge>
//!       <intensity>0.271</intensity>
//!     </ms-ms-peak>
//!   </ms-ms-peaks>
//! </ms-ms>
//! ```
//!
//! Every leaf element outside the peak list is captured verbatim into the
//! raw record (the attribute set is open and source-dependent); peak values
//! accumulate into the `mz` and `intensity` number lists. A document whose
//! two lists end up with different lengths fails with `MalformedSpectrum`,
//! losing only that document.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;

use super::{FormatError, RawRecord};

/// Canonical field name for the mass-to-charge sequence
pub const MZ_FIELD: &str = "mz";
/// Canonical field name for the intensity sequence
pub const INTENSITY_FIELD: &str = "intensity";

/// Filename marker identifying spectrum documents
const SPECTRUM_FILE_MARKER: &str = "ms_ms_spectrum";

/// Whether a file name follows the spectrum-document naming convention
pub fn is_spectrum_document(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    lower.ends_with(".xml") && lower.contains(SPECTRUM_FILE_MARKER)
}

/// List the spectrum documents inside a directory, sorted by file name
///
/// Files not matching the naming convention are ignored, not errors.
pub fn discover_spectrum_documents<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, FormatError> {
    let dir = dir.as_ref();
    let mut documents = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if is_spectrum_document(&name) {
            documents.push(path);
        } else {
            log::debug!("ignoring non-spectrum file {}", path.display());
        }
    }
    documents.sort();
    Ok(documents)
}

/// Parse one spectrum document from a buffered stream
pub fn parse_spectrum_document<R: BufRead>(reader: R) -> Result<RawRecord, FormatError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut record = RawRecord::new();
    let mut mz: Vec<f64> = Vec::new();
    let mut intensity: Vec<f64> = Vec::new();

    // Stack of (element name, saw a child element)
    let mut stack: Vec<(String, bool)> = Vec::new();
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match xml.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                if let Some(top) = stack.last_mut() {
                    top.1 = true;
                }
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                stack.push((name, false));
                text.clear();
            }
            Event::Text(ref t) => {
                text.push_str(&t.unescape()?);
            }
            Event::End(_) => {
                let (name, had_children) = match stack.pop() {
                    Some(frame) => frame,
                    None => {
                        return Err(FormatError::MalformedRecord(
                            "unbalanced element nesting".to_string(),
                        ))
                    }
                };
                if !had_children && !text.trim().is_empty() {
                    let value = text.trim();
                    let in_peak = stack
                        .last()
                        .map(|(parent, _)| parent.ends_with("peak"))
                        .unwrap_or(false);
                    if in_peak {
                        let number: f64 = value.parse().map_err(|_| {
                            FormatError::MalformedRecord(format!(
                                "non-numeric peak value '{value}' in <{name}>"
                            ))
                        })?;
                        if name.contains("mass") || name.contains("charge") {
                            mz.push(number);
                        } else if name.contains("intensity") {
                            intensity.push(number);
                        }
                    } else {
                        record.push_text(&field_name(&name), value);
                    }
                }
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if mz.len() != intensity.len() {
        return Err(FormatError::MalformedSpectrum {
            mz_len: mz.len(),
            intensity_len: intensity.len(),
        });
    }
    if record.is_empty() && mz.is_empty() {
        return Err(FormatError::MalformedRecord(
            "document contains no fields and no peaks".to_string(),
        ));
    }

    record.set_number_list(MZ_FIELD, mz);
    record.set_number_list(INTENSITY_FIELD, intensity);
    Ok(record)
}

/// Parse one spectrum document from disk
pub fn parse_spectrum_file<P: AsRef<Path>>(path: P) -> Result<RawRecord, FormatError> {
    let file = File::open(path.as_ref())?;
    parse_spectrum_document(BufReader::new(file))
}

/// XML element names use dashes; raw field names use underscores
fn field_name(element: &str) -> String {
    element.replace('-', "_")
}

/// Parse every spectrum document in a directory, skipping failed documents
///
/// Non-matching file names are ignored silently; documents that fail to
/// parse (including mz/intensity misalignment) are skipped with a `warn!`
/// diagnostic. Returns the surviving records and the skipped count.
pub fn read_spectra<P: AsRef<Path>>(dir: P) -> Result<(Vec<RawRecord>, usize), FormatError> {
    let dir = dir.as_ref();
    let mut records = Vec::new();
    let mut skipped = 0usize;
    for path in discover_spectrum_documents(dir)? {
        match parse_spectrum_file(&path) {
            Ok(record) => records.push(record),
            Err(e) if e.is_record_error() => {
                log::warn!("skipping {}: {e}", path.display());
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    log::debug!(
        "parsed {} spectrum documents from {} ({} skipped)",
        records.len(),
        dir.display(),
        skipped
    );
    Ok((records, skipped))
}
