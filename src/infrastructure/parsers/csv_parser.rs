use csv::ReaderBuilder;
use encoding_rs::Encoding;
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::domain::{
    error::ParseError,
    models::{ParseOptions, ParsedTable},
    ports::DataParser,
};

/// Tolerant structural parser: the first non-blank record is the header,
/// blank records are dropped, ragged records are kept as-is.
#[derive(Debug, Default, Clone)]
pub struct CsvParser;

impl CsvParser {
    pub fn new() -> Self {
        Self
    }

    pub fn try_parse(&self, path: &Path, options: &ParseOptions) -> Result<ParsedTable, ParseError> {
        if !path.exists() {
            return Err(ParseError::NotFound(path.to_path_buf()));
        }
        if !options.delimiter.is_ascii() {
            return Err(ParseError::InvalidDelimiter(options.delimiter));
        }

        let bytes = std::fs::read(path).map_err(|e| ParseError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!("Read {} bytes from {}", bytes.len(), path.display());

        let text = decode(&bytes, &options.encoding, path)?;
        parse_csv(&text, options.delimiter as u8)
    }
}

impl DataParser for CsvParser {
    fn parse(&self, path: &Path, options: &ParseOptions) -> ParsedTable {
        info!(
            "Parsing CSV: {}, encoding: {}, delimiter: {:?}",
            path.display(),
            options.encoding,
            options.delimiter
        );

        match self.try_parse(path, options) {
            Ok(table) => {
                info!(
                    "Parsed CSV: {} - {} cols, {} rows",
                    path.display(),
                    table.header.len(),
                    table.rows.len()
                );
                table
            }
            Err(ParseError::NoHeader) => {
                warn!("No header found in CSV: {}", path.display());
                ParsedTable::default()
            }
            Err(e) => {
                error!("Failed to parse CSV {}: {}", path.display(), e);
                ParsedTable::default()
            }
        }
    }
}

/// Decodes with the labelled encoding unless a byte-order mark says otherwise.
/// Malformed input is an error, never replaced.
fn decode(bytes: &[u8], label: &str, path: &Path) -> Result<String, ParseError> {
    let labelled = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| ParseError::UnknownEncoding(label.to_string()))?;
    let (encoding, bom_len) = Encoding::for_bom(bytes).unwrap_or((labelled, 0));
    if encoding != labelled {
        debug!("Byte-order mark selects {} over {}", encoding.name(), labelled.name());
    }

    encoding
        .decode_without_bom_handling_and_without_replacement(&bytes[bom_len..])
        .map(|text| text.into_owned())
        .ok_or_else(|| ParseError::Decode {
            path: path.to_path_buf(),
            encoding: encoding.name().to_string(),
        })
}

pub fn parse_csv(text: &str, delimiter: u8) -> Result<ParsedTable, ParseError> {
    debug!("Creating CSV reader without headers, flexible record lengths");
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut header: Vec<String> = Vec::new();
    let mut rows = Vec::new();
    let mut row_count = 0;

    for record in reader.records() {
        let record = record.map_err(|e| {
            error!("Failed to read CSV record after row {}: {}", row_count, e);
            ParseError::Malformed(e.to_string())
        })?;

        let cells: Vec<String> = record.iter().map(|cell| cell.trim().to_string()).collect();
        if cells.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        if header.is_empty() {
            debug!("CSV header: {:?}", cells);
            header = cells;
            continue;
        }

        rows.push(cells);
        row_count += 1;
        if row_count % 1000 == 0 {
            debug!("Processed {} CSV rows", row_count);
        }
    }

    if header.is_empty() {
        return Err(ParseError::NoHeader);
    }

    Ok(ParsedTable { header, rows })
}
