use crate::extract::table::Table;
use crate::utils::error::Result;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

const CSV_DELIMITERS: &[u8] = &[b',', b';', b'\t', b'|'];

/// UTF-8 when valid, Windows-1252 otherwise. A leading BOM is dropped.
pub fn decode_text(bytes: &[u8]) -> String {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    };
    text.trim_start_matches('\u{feff}').to_string()
}

/// Picks the candidate delimiter that occurs most often in the header line.
pub fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().find(|line| !line.trim().is_empty()).unwrap_or("");
    CSV_DELIMITERS
        .iter()
        .copied()
        .max_by_key(|d| header.bytes().filter(|b| b == d).count())
        .filter(|d| header.as_bytes().contains(d))
        .unwrap_or(b',')
}

/// Parses a CSV attachment. Lines with more fields than the header are skipped.
pub fn table_from_csv(bytes: &[u8]) -> Result<Table> {
    let text = decode_text(bytes);
    let delimiter = sniff_delimiter(&text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for record in reader.records() {
        match record {
            Ok(record) if record.len() <= headers.len() => {
                rows.push(record.iter().map(str::to_string).collect());
            }
            Ok(_) => skipped += 1,
            Err(e) => {
                tracing::debug!("Skipping bad CSV line: {}", e);
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        tracing::debug!("Skipped {} malformed CSV lines", skipped);
    }

    Ok(Table::new(headers, rows))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => format!("{}", f),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR({:?})", e),
        Data::DateTime(dt) => format!("{}", dt),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Reads every worksheet of an XLS/XLSX workbook; the first row of each sheet
/// is its header. Sheets that fail to load are skipped.
pub fn tables_from_spreadsheet(bytes: &[u8]) -> Result<Vec<Table>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let mut tables = Vec::new();

    for sheet_name in workbook.sheet_names().to_vec() {
        let range = match workbook.worksheet_range(&sheet_name) {
            Ok(range) => range,
            Err(e) => {
                tracing::warn!("Skipping sheet {}: {}", sheet_name, e);
                continue;
            }
        };

        let mut rows = range
            .rows()
            .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>())
            .filter(|row| row.iter().any(|c| !c.trim().is_empty()));

        if let Some(headers) = rows.next() {
            tables.push(Table::new(headers, rows.collect()));
        }
    }

    Ok(tables)
}

/// Tables of a tabular attachment, by extension (`csv`, `xls`, `xlsx`).
pub fn tables_from_attachment(extension: &str, bytes: &[u8]) -> Result<Vec<Table>> {
    match extension {
        "csv" => Ok(vec![table_from_csv(bytes)?]),
        "xls" | "xlsx" | "xlsm" => tables_from_spreadsheet(bytes),
        _ => Ok(Vec::new()),
    }
}

pub fn is_tabular(extension: &str) -> bool {
    matches!(extension, "csv" | "xls" | "xlsx" | "xlsm")
}
