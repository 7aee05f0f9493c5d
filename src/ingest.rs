// 📥 CSV Ingestor - heterogeneous collection exports → NormalizedRow
//
// Collection spreadsheets come from many tools: different delimiters,
// different header spellings, a BOM from Excel, stray non-UTF-8 bytes.
// This module turns all of that into one row shape and never aborts a
// batch because of a single bad row.

use crate::error::{IngestError, RowError};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// CORE TYPES
// ============================================================================

/// NormalizedRow - one CSV line reduced to what reconciliation needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRow {
    /// 1-based data row number (header excluded)
    pub row_number: usize,
    /// Printed set code, trimmed, never empty
    pub set_code: String,
    /// Rarity exactly as written in the file (trimmed), if a rarity column had a value
    pub rarity_raw: Option<String>,
    /// Always >= 1
    pub quantity: i64,
}

/// Result of ingesting one file: every data row in input order.
#[derive(Debug, Clone)]
pub struct ParsedCsv {
    /// Header names as they appear in the file
    pub headers: Vec<String>,
    pub delimiter: u8,
    pub rows: Vec<Result<NormalizedRow, RowError>>,
}

impl ParsedCsv {
    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    /// Rows that produced a NormalizedRow
    pub fn valid_rows(&self) -> impl Iterator<Item = &NormalizedRow> {
        self.rows.iter().filter_map(|r| r.as_ref().ok())
    }

    pub fn row_errors(&self) -> impl Iterator<Item = &RowError> {
        self.rows.iter().filter_map(|r| r.as_ref().err())
    }
}

// ============================================================================
// HEADER ALIASES
// ============================================================================

const SET_CODE_HEADERS: &[&str] = &["setcode", "code", "printcode", "cardsetcode", "cardcode"];
const RARITY_HEADERS: &[&str] = &["rarity", "setrarity", "printrarity"];
const QUANTITY_HEADERS: &[&str] = &["quantity", "qty", "count", "amount"];

/// "Set Code", "set_code", "SET-CODE" → "setcode"
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .collect()
}

/// Column indexes for each recognized field, in header order.
#[derive(Debug, Default)]
struct ColumnMap {
    set_code: Vec<usize>,
    rarity: Vec<usize>,
    quantity: Vec<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &[String]) -> Self {
        let mut map = ColumnMap::default();
        for (idx, header) in headers.iter().enumerate() {
            let key = normalize_header(header);
            if SET_CODE_HEADERS.contains(&key.as_str()) {
                map.set_code.push(idx);
            } else if RARITY_HEADERS.contains(&key.as_str()) {
                map.rarity.push(idx);
            } else if QUANTITY_HEADERS.contains(&key.as_str()) {
                map.quantity.push(idx);
            }
        }
        map
    }

    /// First set-code column with a non-empty value
    fn set_code(&self, record: &csv::StringRecord) -> Option<String> {
        self.set_code
            .iter()
            .filter_map(|&i| record.get(i))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// First rarity column, even when its value is blank
    fn rarity(&self, record: &csv::StringRecord) -> Option<String> {
        let idx = *self.rarity.first()?;
        let value = record.get(idx).unwrap_or("").trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    /// First quantity column that parses; 1 otherwise
    fn quantity(&self, record: &csv::StringRecord) -> i64 {
        self.quantity
            .iter()
            .filter_map(|&i| record.get(i))
            .find_map(parse_quantity)
            .unwrap_or(1)
    }
}

/// Parse a quantity cell: "3" → 3, "2.0" → 2, "abc" → None.
///
/// Values below 1 are raised to 1; a collection row always owns at least one card.
pub fn parse_quantity(raw: &str) -> Option<i64> {
    let v = raw.trim();
    if v.is_empty() {
        return None;
    }

    // Digits that overflow i64 still go through the float path (saturating)
    let qty = match v.parse::<i64>() {
        Ok(n) => n,
        Err(_) => {
            let f = v.parse::<f64>().ok()?;
            if !f.is_finite() {
                return None;
            }
            f.trunc() as i64
        }
    };

    Some(qty.max(1))
}

// ============================================================================
// DECODING
// ============================================================================

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Strip a UTF-8 BOM and decode, dropping any byte sequence that is not valid UTF-8.
pub fn decode_lossy(raw: &[u8]) -> String {
    let bytes = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}

// ============================================================================
// DELIMITER SNIFFING
// ============================================================================

/// Candidates in tie-break order: comma wins unless another splits the header wider
const DELIMITER_CANDIDATES: &[u8] = &[b',', b';', b'\t', b'|'];

/// Detect the field delimiter from the header line; comma when nothing splits it.
pub fn sniff_delimiter(text: &str) -> u8 {
    let first_line = match text.lines().next() {
        Some(line) if !line.trim().is_empty() => line,
        _ => return b',',
    };

    let mut best = b',';
    let mut best_fields = 1usize;

    for &delim in DELIMITER_CANDIDATES {
        let fields = csv::ReaderBuilder::new()
            .delimiter(delim)
            .has_headers(false)
            .flexible(true)
            .from_reader(first_line.as_bytes())
            .records()
            .next()
            .and_then(|r| r.ok())
            .map(|r| r.len())
            .unwrap_or(1);

        if fields > best_fields {
            best_fields = fields;
            best = delim;
        }
    }

    log::debug!("Delimiter sniffed: {:?} ({} fields)", best as char, best_fields);
    best
}

// ============================================================================
// INGEST
// ============================================================================

/// Parse raw CSV bytes into normalized rows.
///
/// # Returns
/// * `Ok(ParsedCsv)` - every data row, each either a NormalizedRow or a RowError
/// * `Err(IngestError::Decode)` - input had bytes but none decoded to text
/// * `Err(IngestError::EmptyInput)` - no data rows
pub fn ingest(raw: &[u8]) -> Result<ParsedCsv, IngestError> {
    let text = decode_lossy(raw);
    if text.trim().is_empty() {
        let had_content = raw
            .strip_prefix(UTF8_BOM)
            .unwrap_or(raw)
            .iter()
            .any(|b| !b.is_ascii_whitespace());
        return Err(if had_content {
            IngestError::Decode
        } else {
            IngestError::EmptyInput
        });
    }

    let delimiter = sniff_delimiter(&text);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = match reader.headers() {
        Ok(h) => h.iter().map(|s| s.to_string()).collect(),
        Err(e) => {
            log::warn!("CSV header row unreadable: {}", e);
            return Err(IngestError::EmptyInput);
        }
    };
    log::debug!("Headers detected: {}", headers.join(","));

    let columns = ColumnMap::from_headers(&headers);
    let columns_found = headers.join(", ");

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let row_number = idx + 1;

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                rows.push(Err(RowError::new(
                    row_number,
                    format!("Row {}: unreadable CSV record ({})", row_number, e),
                )));
                continue;
            }
        };

        let row = match columns.set_code(&record) {
            Some(set_code) => Ok(NormalizedRow {
                row_number,
                set_code,
                rarity_raw: columns.rarity(&record),
                quantity: columns.quantity(&record),
            }),
            None => Err(RowError::new(
                row_number,
                format!(
                    "Row {}: missing set code (columns found: {})",
                    row_number, columns_found
                ),
            )),
        };
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(IngestError::EmptyInput);
    }

    Ok(ParsedCsv {
        headers,
        delimiter,
        rows,
    })
}

/// Read a CSV file from disk and ingest it.
pub fn ingest_file(path: &Path) -> Result<ParsedCsv, IngestError> {
    let raw = std::fs::read(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    ingest(&raw)
}
