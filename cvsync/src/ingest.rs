//! Encoding-tolerant loading of the exported CSV.
//!
//! The console emits UTF-8 on some days and Shift_JIS/CP932 on others. Strict UTF-8 is tried
//! first; only when it rejects the bytes is CP932 attempted, and that decode is strict as
//! well so a wrong guess is reported rather than turned into replacement characters.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::errors::SyncError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextEncoding {
    Utf8,
    Cp932,
}

impl TextEncoding {
    /// Attempt order.
    pub const FALLBACK_ORDER: [TextEncoding; 2] = [TextEncoding::Utf8, TextEncoding::Cp932];

    fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                std::str::from_utf8(body).ok().map(str::to_owned)
            }
            // encoding_rs' Shift_JIS decoder is the WHATWG one, which covers the CP932 extensions.
            TextEncoding::Cp932 => encoding_rs::SHIFT_JIS
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|text| text.into_owned()),
        }
    }
}

/// Rows of the export, header included, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedTable {
    rows: Vec<Vec<String>>,
    encoding: TextEncoding,
}

impl IngestedTable {
    pub fn new(rows: Vec<Vec<String>>, encoding: TextEncoding) -> Self {
        Self { rows, encoding }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }

    /// Encoding that successfully decoded the file.
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileIngestor;

impl FileIngestor {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn ingest(&self, path: &Path) -> Result<IngestedTable, SyncError> {
        let bytes = std::fs::read(path).map_err(|e| SyncError::UnreadableFile {
            path: path.to_path_buf(),
            attempted: Vec::new(),
            reason: e.to_string(),
        })?;
        let table = self.parse_bytes(path, &bytes)?;
        info!(
            rows = table.len(),
            encoding = ?table.encoding(),
            "Loaded export file"
        );
        Ok(table)
    }

    /// Decode and parse an in-memory export. `path` is only used for error reporting.
    pub fn parse_bytes(&self, path: &Path, bytes: &[u8]) -> Result<IngestedTable, SyncError> {
        let mut attempted = Vec::new();
        let mut last_reason = String::new();

        for encoding in TextEncoding::FALLBACK_ORDER {
            attempted.push(encoding);
            let Some(text) = encoding.decode(bytes) else {
                debug!(?encoding, "Decode rejected, trying next encoding");
                last_reason = format!("not valid {encoding:?}");
                continue;
            };
            if encoding != TextEncoding::Utf8 {
                warn!(?encoding, "Export was not UTF-8, decoded with fallback");
            }
            return parse_rows(&text)
                .map(|rows| IngestedTable::new(rows, encoding))
                .map_err(|e| SyncError::UnreadableFile {
                    path: path.to_path_buf(),
                    attempted,
                    reason: format!("malformed CSV after {encoding:?} decode: {e}"),
                });
        }

        Err(SyncError::UnreadableFile {
            path: path.to_path_buf(),
            attempted,
            reason: last_reason,
        })
    }
}

/// RFC 4180 records. Ragged rows are kept as-is; the header is an ordinary row.
fn parse_rows(text: &str) -> Result<Vec<Vec<String>>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_owned).collect()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(bytes: &[u8]) -> Result<IngestedTable, SyncError> {
        FileIngestor::new().parse_bytes(Path::new("export.csv"), bytes)
    }

    #[test]
    fn strips_utf8_bom() {
        let table = parse("\u{feff}日時,金額\r\n2026-10-19,1200\r\n".as_bytes()).unwrap();
        assert_eq!(table.encoding(), TextEncoding::Utf8);
        assert_eq!(table.rows()[0], ["日時", "金額"]);
        assert_eq!(table.rows()[1], ["2026-10-19", "1200"]);
    }

    #[test]
    fn quoted_fields_keep_commas_and_newlines() {
        let table = parse(b"a,b\n\"x, y\",\"line1\nline2\"\n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1], ["x, y", "line1\nline2"]);
    }

    #[test]
    fn ragged_rows_are_kept() {
        let table = parse(b"a,b,c\n1\n1,2\n").unwrap();
        let widths: Vec<usize> = table.rows().iter().map(Vec::len).collect();
        assert_eq!(widths, [3, 1, 2]);
    }

    #[test]
    fn falls_back_to_cp932() {
        let (bytes, _, unmappable) =
            encoding_rs::SHIFT_JIS.encode("パートナー,金額\r\n株式会社,500\r\n");
        assert!(!unmappable);
        let table = parse(&bytes).unwrap();
        assert_eq!(table.encoding(), TextEncoding::Cp932);
        assert_eq!(table.rows()[0], ["パートナー", "金額"]);
        assert_eq!(table.rows()[1], ["株式会社", "500"]);
    }

    #[test]
    fn reports_every_attempted_encoding() {
        match parse(&[0xFF, 0xFE, 0xFD]) {
            Err(SyncError::UnreadableFile { attempted, .. }) => {
                assert_eq!(attempted, [TextEncoding::Utf8, TextEncoding::Cp932]);
            }
            other => panic!("expected UnreadableFile, got {other:?}"),
        }
    }

    #[test]
    fn empty_input_is_an_empty_table() {
        let table = parse(b"").unwrap();
        assert!(table.is_empty());
    }
}
