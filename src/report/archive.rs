use crate::domain::model::{PriceDiff, PriceRow};
use crate::utils::error::{EtlError, Result};
use serde::Serialize;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

/// Flat CSV view of a normalized price row.
#[derive(Debug, Serialize)]
struct PriceCsvRecord<'a> {
    provider: &'a str,
    country: &'a str,
    operator: &'a str,
    mcc: &'a str,
    mnc: &'a str,
    price: Option<f64>,
    currency: &'a str,
    normalized_price: Option<f64>,
    base_currency: &'a str,
    variation: &'a str,
    effective_date: &'a str,
}

impl<'a> From<&'a PriceRow> for PriceCsvRecord<'a> {
    fn from(row: &'a PriceRow) -> Self {
        let s = |value: &'a Option<String>| value.as_deref().unwrap_or("");
        Self {
            provider: s(&row.provider),
            country: s(&row.country),
            operator: row.operator_name(),
            mcc: s(&row.mcc),
            mnc: s(&row.mnc),
            price: row.raw_price(),
            currency: s(&row.currency),
            normalized_price: row.normalized_price,
            base_currency: s(&row.base_currency),
            variation: s(&row.variation),
            effective_date: s(&row.effective_date),
        }
    }
}

pub fn prices_csv(rows: &[PriceRow]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(PriceCsvRecord::from(row))?;
    }
    writer.into_inner().map_err(|e| EtlError::ProcessingError {
        message: format!("could not finish CSV output: {}", e),
    })
}

/// Bundles the day's report: `summary.html`, `diff.json` and `prices.csv`.
pub fn build_archive(html: &str, diff: &PriceDiff, rows: &[PriceRow]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

    zip.start_file::<_, ()>("summary.html", FileOptions::default())?;
    zip.write_all(html.as_bytes())?;

    zip.start_file::<_, ()>("diff.json", FileOptions::default())?;
    zip.write_all(serde_json::to_string_pretty(diff)?.as_bytes())?;

    zip.start_file::<_, ()>("prices.csv", FileOptions::default())?;
    zip.write_all(&prices_csv(rows)?)?;

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_archive_contains_report_files() {
        let rows = vec![PriceRow {
            provider: Some("acme".to_string()),
            country: Some("Sweden".to_string()),
            network: Some("Telia".to_string()),
            new_price: Some(0.1),
            currency: Some("USD".to_string()),
            normalized_price: Some(0.092),
            base_currency: Some("EUR".to_string()),
            ..Default::default()
        }];

        let data = build_archive("<html></html>", &PriceDiff::default(), &rows).unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(data)).unwrap();
        assert_eq!(archive.len(), 3);

        let mut csv_text = String::new();
        archive
            .by_name("prices.csv")
            .unwrap()
            .read_to_string(&mut csv_text)
            .unwrap();
        let mut lines = csv_text.lines();
        assert_eq!(
            lines.next(),
            Some("provider,country,operator,mcc,mnc,price,currency,normalized_price,base_currency,variation,effective_date")
        );
        assert_eq!(lines.next(), Some("acme,Sweden,Telia,,,0.1,USD,0.092,EUR,,"));

        let mut diff_json = String::new();
        archive
            .by_name("diff.json")
            .unwrap()
            .read_to_string(&mut diff_json)
            .unwrap();
        let diff: PriceDiff = serde_json::from_str(&diff_json).unwrap();
        assert_eq!(diff, PriceDiff::default());
    }
}
