use crate::domain::model::PriceRow;
use regex::Regex;
use std::sync::LazyLock;

static NON_ALNUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid header pattern"));

static PRICE_CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(?P<cur1>[€$£]|[A-Z]{3})\s*)?(?P<num>[0-9]+(?:[.,][0-9]+)?)\s*(?P<cur2>[€$£]|[A-Z]{3})?")
        .expect("valid price pattern")
});

static HEADER_CURRENCY_PAREN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((EUR|USD|GBP)\)").expect("valid currency pattern"));

static HEADER_CURRENCY_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(EUR|USD|GBP)\b").expect("valid currency pattern"));

const COUNTRY_TOKENS: &[&str] = &["country", "country_code", "destination"];
const NETWORK_TOKENS: &[&str] = &["network", "operator", "carrier", "route"];
const PRICE_TOKENS: &[&str] = &["price", "rate", "eur", "usd", "cost", "mt_price"];
const CHANGE_TOKENS: &[&str] = &["change", "delta", "variation"];
const VALID_TOKENS: &[&str] = &["valid", "effective", "start_date", "effective_date"];

/// A header row plus data rows, as read from HTML, CSV or a worksheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Column indexes of the fields a supplier table may carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnMap {
    pub country: Option<usize>,
    pub network: Option<usize>,
    pub price: Option<usize>,
    pub change: Option<usize>,
    pub valid: Option<usize>,
    pub header_currency: Option<String>,
}

pub fn normalize_header(header: &str) -> String {
    NON_ALNUM_RE
        .replace_all(&header.trim().to_lowercase(), "_")
        .into_owned()
}

fn find_first(normalized: &[String], candidates: &[&str]) -> Option<usize> {
    normalized
        .iter()
        .position(|col| candidates.iter().any(|tok| col.contains(tok)))
}

fn header_currency(raw_header: &str) -> Option<String> {
    let upper = raw_header.to_uppercase();
    HEADER_CURRENCY_PAREN_RE
        .captures(&upper)
        .or_else(|| HEADER_CURRENCY_WORD_RE.captures(&upper))
        .map(|caps| caps[1].to_string())
}

pub fn pick_columns(headers: &[String]) -> ColumnMap {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let price = find_first(&normalized, PRICE_TOKENS);

    ColumnMap {
        country: find_first(&normalized, COUNTRY_TOKENS),
        network: find_first(&normalized, NETWORK_TOKENS),
        price,
        change: find_first(&normalized, CHANGE_TOKENS),
        valid: find_first(&normalized, VALID_TOKENS),
        header_currency: price.and_then(|idx| header_currency(&headers[idx])),
    }
}

/// Parses `€0.05`, `0,05 EUR`, `USD 0.1` and bare numbers. The currency
/// falls back to the one named in the column header.
pub fn parse_price_cell(cell: &str, header_currency: Option<&str>) -> Option<(f64, Option<String>)> {
    let cell = cell.replace('\u{a0}', " ");
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }

    let caps = PRICE_CELL_RE.captures(cell)?;
    let value: f64 = caps["num"].replace(',', ".").parse().ok()?;

    let currency = caps
        .name("cur1")
        .or_else(|| caps.name("cur2"))
        .map(|m| match m.as_str() {
            "€" => "EUR".to_string(),
            "$" => "USD".to_string(),
            "£" => "GBP".to_string(),
            code => code.to_string(),
        })
        .or_else(|| header_currency.map(str::to_string));

    Some((value, currency))
}

fn cell(row: &[String], idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| row.get(i))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Converts a supplier table into price rows. Tables without a price column
/// and rows whose price does not parse are skipped.
pub fn rows_from_table(table: &Table, provider_hint: Option<&str>, debug: bool) -> Vec<PriceRow> {
    if table.is_empty() {
        return Vec::new();
    }

    let columns = pick_columns(&table.headers);
    if debug {
        tracing::info!("  -> picked columns {:?} from {:?}", columns, table.headers);
    }
    let Some(price_idx) = columns.price else {
        return Vec::new();
    };

    table
        .rows
        .iter()
        .filter_map(|row| {
            let raw = row.get(price_idx)?;
            let (price, currency) = parse_price_cell(raw, columns.header_currency.as_deref())?;
            Some(PriceRow {
                provider: provider_hint.map(str::to_string),
                country: cell(row, columns.country),
                operator: cell(row, columns.network),
                new_price: Some(price),
                currency,
                variation: cell(row, columns.change).map(|v| v.to_lowercase()),
                effective_date: cell(row, columns.valid),
                ..Default::default()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("  Price (EUR) "), "price_eur_");
        assert_eq!(normalize_header("MCC/MNC"), "mcc_mnc");
    }

    #[test]
    fn test_pick_columns_and_header_currency() {
        let columns = pick_columns(&strings(&[
            "Destination",
            "Operator",
            "Price (USD)",
            "Change",
            "Valid from",
        ]));
        assert_eq!(columns.country, Some(0));
        assert_eq!(columns.network, Some(1));
        assert_eq!(columns.price, Some(2));
        assert_eq!(columns.change, Some(3));
        assert_eq!(columns.valid, Some(4));
        assert_eq!(columns.header_currency.as_deref(), Some("USD"));

        let columns = pick_columns(&strings(&["Country", "EUR"]));
        assert_eq!(columns.price, Some(1));
        assert_eq!(columns.header_currency.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_parse_price_cell() {
        assert_eq!(
            parse_price_cell("€0,045", None),
            Some((0.045, Some("EUR".to_string())))
        );
        assert_eq!(
            parse_price_cell("0.05 USD", Some("EUR")),
            Some((0.05, Some("USD".to_string())))
        );
        assert_eq!(
            parse_price_cell("0.07", Some("GBP")),
            Some((0.07, Some("GBP".to_string())))
        );
        assert_eq!(parse_price_cell("0.07", None), Some((0.07, None)));
        assert_eq!(parse_price_cell("n/a", None), None);
        assert_eq!(parse_price_cell("   ", None), None);
    }

    #[test]
    fn test_rows_from_table_skips_unparseable_prices() {
        let table = Table::new(
            strings(&["Country", "Network", "Rate EUR", "Variation"]),
            vec![
                strings(&["Sweden", "Telia", "0.0450", "Increase"]),
                strings(&["Norway", "Telenor", "tbd", "New"]),
                strings(&["Denmark", "", "€0,03", ""]),
            ],
        );

        let rows = rows_from_table(&table, Some("acme"), false);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].provider.as_deref(), Some("acme"));
        assert_eq!(rows[0].country.as_deref(), Some("Sweden"));
        assert_eq!(rows[0].operator.as_deref(), Some("Telia"));
        assert_eq!(rows[0].new_price, Some(0.045));
        assert_eq!(rows[0].currency.as_deref(), Some("EUR"));
        assert_eq!(rows[0].variation.as_deref(), Some("increase"));
        assert_eq!(rows[1].operator, None);
        assert_eq!(rows[1].new_price, Some(0.03));
    }

    #[test]
    fn test_table_without_price_column_yields_nothing() {
        let table = Table::new(
            strings(&["Country", "Network"]),
            vec![strings(&["Sweden", "Telia"])],
        );
        assert!(rows_from_table(&table, None, false).is_empty());
    }
}
