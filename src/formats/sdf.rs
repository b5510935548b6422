//! Streaming parser for structure-data (SDF) files
//!
//! An SDF file is a concatenation of records separated by `$$$$` lines. Each
//! record starts with a molfile (whose first line is a free-text title) and
//! carries its annotation payload as data items of the form:
//!
//! ```text
//! > <TAG>
//! value line
//! (further value lines)
//!
//! ```
//!
//! The parser is a pull-based iterator over `BufRead`, so arbitrarily large
//! dumps are handled with bounded memory. Gzip-compressed files are decoded
//! transparently by sniffing the two magic bytes.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use super::{collect_records, FormatError, RawRecord};

/// Field under which the molfile title line is preserved
///
/// Some sources put the record identifier or the compound name here and
/// nowhere else; the normalizer decides whether it means anything.
pub const MOLFILE_TITLE_FIELD: &str = "MOLFILE_TITLE";

const RECORD_DELIMITER: &str = "$$$$";

/// Streaming reader over the records of one SDF file
pub struct SdfReader<R: BufRead> {
    reader: R,
    line_no: usize,
    record_no: usize,
    done: bool,
}

impl SdfReader<BufReader<Box<dyn Read + Send>>> {
    /// Open an SDF file, decoding gzip transparently
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FormatError> {
        let file = File::open(path.as_ref())?;
        let mut buffered = BufReader::new(file);
        let gzipped = {
            let head = buffered.fill_buf()?;
            head.len() >= 2 && head[0] == 0x1f && head[1] == 0x8b
        };
        let inner: Box<dyn Read + Send> = if gzipped {
            Box::new(GzDecoder::new(buffered))
        } else {
            Box::new(buffered)
        };
        Ok(Self::new(BufReader::new(inner)))
    }
}

impl<R: BufRead> SdfReader<R> {
    /// Wrap any buffered byte stream
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            record_no: 0,
            done: false,
        }
    }

    fn read_line(&mut self, buf: &mut String) -> Result<usize, FormatError> {
        buf.clear();
        let n = self.reader.read_line(buf)?;
        if n > 0 {
            self.line_no += 1;
        }
        Ok(n)
    }

    /// Read raw lines up to the next `$$$$` delimiter (or EOF)
    fn next_block(&mut self) -> Result<Option<Vec<String>>, FormatError> {
        let mut block: Vec<String> = Vec::new();
        let mut line = String::new();
        loop {
            let n = self.read_line(&mut line)?;
            if n == 0 {
                self.done = true;
                // Trailing whitespace after the last delimiter is not a record
                if block.iter().all(|l| l.trim().is_empty()) {
                    return Ok(None);
                }
                return Ok(Some(block));
            }
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.trim() == RECORD_DELIMITER {
                return Ok(Some(block));
            }
            block.push(trimmed.to_string());
        }
    }

    /// Parse one delimiter-bounded block into a raw record
    fn parse_block(&self, block: &[String]) -> Result<RawRecord, FormatError> {
        let mut record = RawRecord::new();

        if let Some(title) = block.first() {
            let title = title.trim();
            if !title.is_empty() {
                record.push_text(MOLFILE_TITLE_FIELD, title);
            }
        }

        let mut i = 0usize;
        let mut saw_data_item = false;
        while i < block.len() {
            let line = block[i].trim_start();
            if let Some(tag) = parse_tag_line(line) {
                saw_data_item = true;
                i += 1;
                // Value lines run until the next blank line or tag line
                while i < block.len() {
                    let value = block[i].trim();
                    if value.is_empty() || parse_tag_line(block[i].trim_start()).is_some() {
                        break;
                    }
                    record.push_text(&tag, value);
                    i += 1;
                }
            } else {
                i += 1;
            }
        }

        if !saw_data_item {
            return Err(FormatError::MalformedRecord(format!(
                "record {} (near line {}) has no data items",
                self.record_no, self.line_no
            )));
        }
        Ok(record)
    }
}

/// Extract the tag name from a `> <TAG>` data-item header line
fn parse_tag_line(line: &str) -> Option<String> {
    let rest = line.strip_prefix('>')?;
    let start = rest.find('<')?;
    let end = rest[start + 1..].find('>')?;
    let tag = rest[start + 1..start + 1 + end].trim();
    if tag.is_empty() {
        None
    } else {
        Some(tag.to_string())
    }
}

impl<R: BufRead> Iterator for SdfReader<R> {
    type Item = Result<RawRecord, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.next_block() {
                Err(e) => return Some(Err(e)),
                Ok(None) => return None,
                Ok(Some(block)) => {
                    // Delimiter runs and stray blank blocks are not records
                    if block.iter().all(|l| l.trim().is_empty()) {
                        if self.done {
                            return None;
                        }
                        continue;
                    }
                    self.record_no += 1;
                    return Some(self.parse_block(&block));
                }
            }
        }
    }
}

/// Parse every record of an SDF file, skipping malformed blocks
///
/// Returns the surviving records and how many blocks were skipped (each
/// skip is logged as a `warn!` diagnostic).
pub fn read_records<P: AsRef<Path>>(path: P) -> Result<(Vec<RawRecord>, usize), FormatError> {
    let path = path.as_ref();
    log::debug!("parsing SDF file {}", path.display());
    collect_records(SdfReader::open(path)?)
}
