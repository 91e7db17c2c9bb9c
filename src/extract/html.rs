use crate::extract::table::Table;
use crate::utils::error::{EtlError, Result};
use scraper::{ElementRef, Html, Selector};

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| EtlError::ProcessingError {
        message: format!("invalid selector {}: {}", css, e),
    })
}

fn cell_text(cell: ElementRef) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cells that belong to `tr` itself, not to a table nested inside one of them.
fn own_cells(tr: ElementRef) -> Vec<ElementRef> {
    tr.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "th" | "td"))
        .collect()
}

fn closest_table_is(tr: ElementRef, table: ElementRef) -> bool {
    tr.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table")
        .is_some_and(|el| el.id() == table.id())
}

/// Reads every `<table>` in an HTML body. The header is the first row that
/// uses `<th>` cells, or the first row when there is none.
pub fn tables_from_html(html: &str) -> Result<Vec<Table>> {
    if !html.to_lowercase().contains("<table") {
        return Ok(Vec::new());
    }

    let table_sel = selector("table")?;
    let tr_sel = selector("tr")?;

    let document = Html::parse_document(html);
    let mut tables = Vec::new();

    for table_el in document.select(&table_sel) {
        let mut header_row: Option<Vec<String>> = None;
        let mut first_row: Option<Vec<String>> = None;
        let mut rows = Vec::new();

        for tr in table_el.select(&tr_sel) {
            // Nested tables are read on their own.
            if !closest_table_is(tr, table_el) {
                continue;
            }
            let own = own_cells(tr);
            if own.is_empty() {
                continue;
            }
            let has_th = own.iter().any(|cell| cell.value().name() == "th");
            let cells: Vec<String> = own.into_iter().map(cell_text).collect();
            if header_row.is_none() && has_th {
                header_row = Some(cells);
                rows.clear();
                continue;
            }
            if first_row.is_none() {
                first_row = Some(cells.clone());
            }
            rows.push(cells);
        }

        let headers = match header_row {
            Some(headers) => headers,
            None => match first_row {
                Some(first) => {
                    rows.remove(0);
                    first
                }
                None => continue,
            },
        };
        tables.push(Table::new(headers, rows));
    }

    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::table::rows_from_table;

    #[test]
    fn test_table_with_th_header() {
        let html = r#"<html><body><p>Dear partner,</p>
<table>
  <thead><tr><th>Country</th><th>Operator</th><th>New price (EUR)</th></tr></thead>
  <tbody>
    <tr><td>Sweden</td><td>Telia</td><td>0.045</td></tr>
    <tr><td>Norway</td><td>Telenor  AS</td><td>0.051</td></tr>
  </tbody>
</table></body></html>"#;

        let tables = tables_from_html(html).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].headers, vec!["Country", "Operator", "New price (EUR)"]);
        assert_eq!(tables[0].rows.len(), 2);
        assert_eq!(tables[0].rows[1], vec!["Norway", "Telenor AS", "0.051"]);
    }

    #[test]
    fn test_table_without_th_uses_first_row() {
        let html = "<TABLE><tr><td>Country</td><td>Rate</td></tr><tr><td>Spain</td><td>0.06</td></tr></TABLE>";
        let tables = tables_from_html(html).unwrap();
        assert_eq!(tables[0].headers, vec!["Country", "Rate"]);
        assert_eq!(tables[0].rows, vec![vec!["Spain".to_string(), "0.06".to_string()]]);
    }

    #[test]
    fn test_layout_table_does_not_swallow_nested_table() {
        let html = "<table><tr><td><p>Weekly update</p>\
<table><tr><th>MCC</th><th>Country</th><th>Price</th></tr>\
<tr><td>240</td><td>Sweden</td><td>0.045</td></tr></table>\
</td></tr></table>";

        let tables = tables_from_html(html).unwrap();
        let rows: Vec<_> = tables
            .iter()
            .flat_map(|t| rows_from_table(t, Some("acme"), false))
            .collect();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].country.as_deref(), Some("Sweden"));
        assert_eq!(rows[0].new_price, Some(0.045));

        let inner = tables.iter().find(|t| t.headers.len() == 3).unwrap();
        assert_eq!(inner.headers, vec!["MCC", "Country", "Price"]);
        assert_eq!(inner.rows, vec![vec!["240", "Sweden", "0.045"]]);
    }

    #[test]
    fn test_body_without_table() {
        assert!(tables_from_html("<p>no prices today</p>").unwrap().is_empty());
    }
}
