//! Loading the DNS reconnaissance CSV export into typed rows.

use anyhow::{Context, Result};
use encoding_rs::{BIG5, GB18030};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::SieveError;
use crate::fs_abstraction::FileSystem;

/// Columns the export must provide.
pub const REQUIRED_COLUMNS: &[&str] = &["CdnCompany", "IsCdn", "CNAME", "A", "IpSizeIsCdn"];

/// Delimiters considered when sniffing the header line, in tie-break order.
const CANDIDATE_DELIMITERS: &[u8] = b",;\t|";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One row of the export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CsvRow {
    /// CDN provider label; `None` when the cell is blank.
    #[serde(rename = "CdnCompany", deserialize_with = "deserialize_company")]
    pub cdn_company: Option<String>,

    #[serde(rename = "IsCdn", deserialize_with = "deserialize_flag")]
    pub is_cdn: bool,

    /// Raw CNAME cell, `"[a b]"` or `"a b"`.
    #[serde(rename = "CNAME")]
    pub cname: String,

    /// Raw A-record cell, same list format as `cname`.
    #[serde(rename = "A")]
    pub a: String,

    #[serde(rename = "IpSizeIsCdn", deserialize_with = "deserialize_flag")]
    pub ip_size_is_cdn: bool,
}

/// Flags are set only by a literal `true` (any case).
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().eq_ignore_ascii_case("true"))
}

fn deserialize_company<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    let trimmed = value.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

/// Rows read from an export plus what was learned while reading it.
#[derive(Debug, Default)]
pub struct CsvInput {
    pub rows: Vec<CsvRow>,
    /// Rows dropped because they could not be parsed.
    pub skipped: usize,
    pub encoding: &'static str,
    pub delimiter: u8,
}

/// Decode raw bytes, trying UTF-8, GB18030 and Big5 in that order.
///
/// Falls back to lossy UTF-8 when none decode cleanly.
pub fn decode(bytes: &[u8]) -> (String, &'static str) {
    if let Some(stripped) = bytes.strip_prefix(UTF8_BOM) {
        if let Ok(text) = std::str::from_utf8(stripped) {
            return (text.to_string(), "UTF-8-SIG");
        }
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return (text.to_string(), "UTF-8");
    }
    for encoding in [GB18030, BIG5] {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            return (text.into_owned(), encoding.name());
        }
    }

    warn!(
        "{}",
        SieveError::Encoding("tried UTF-8, GB18030, Big5".to_string())
    );
    (String::from_utf8_lossy(bytes).into_owned(), "UTF-8 (lossy)")
}

/// Guess the delimiter from the header line, defaulting to a comma.
pub fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    CANDIDATE_DELIMITERS
        .iter()
        .map(|&d| (d, header.bytes().filter(|&b| b == d).count()))
        .filter(|&(_, count)| count > 0)
        // max_by_key keeps the last maximum, so reverse to prefer earlier candidates
        .rev()
        .max_by_key(|&(_, count)| count)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

/// Parse decoded CSV text.
///
/// A header missing a required column fails the whole file; individual
/// rows that fail to parse are logged and skipped.
pub fn parse_rows(text: &str, delimiter: u8) -> Result<(Vec<CsvRow>, usize)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == *column) {
            return Err(SieveError::MissingColumn(column.to_string()).into());
        }
    }

    let mut rows = Vec::new();
    let mut skipped = 0;
    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(index as u64 + 2);
                warn!(
                    "{}",
                    SieveError::MalformedRow {
                        line,
                        reason: e.to_string()
                    }
                );
                skipped += 1;
            }
        }
    }
    Ok((rows, skipped))
}

/// Read and parse an export.
///
/// `delimiter` overrides sniffing when set. A missing or unreadable file is
/// an error; an empty file yields no rows.
pub fn load_csv<F: FileSystem + ?Sized>(
    fs: &F,
    path: &Path,
    delimiter: Option<char>,
) -> Result<CsvInput> {
    let bytes = fs
        .read(path)
        .with_context(|| format!("Failed to read input file: {:?}", path))?;

    let (text, encoding) = decode(&bytes);
    debug!("Input {:?} decoded as {}", path, encoding);

    if text.trim().is_empty() {
        warn!("Input file {:?} is empty", path);
        return Ok(CsvInput {
            encoding,
            delimiter: b',',
            ..Default::default()
        });
    }

    let delimiter = match delimiter {
        Some(c) => u8::try_from(c)
            .map_err(|_| SieveError::Config(format!("Delimiter '{}' is not ASCII", c)))?,
        None => sniff_delimiter(&text),
    };

    let (rows, skipped) = parse_rows(&text, delimiter)
        .with_context(|| format!("Failed to parse input file: {:?}", path))?;
    info!(
        "Loaded {} rows from {:?} ({} skipped)",
        rows.len(),
        path,
        skipped
    );

    Ok(CsvInput {
        rows,
        skipped,
        encoding,
        delimiter,
    })
}
