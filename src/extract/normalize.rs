use crate::domain::model::PriceRow;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static LETTERS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]").expect("valid letters pattern"));
static NON_NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9.\-]").expect("valid numeric pattern"));

/// Lenient number parsing for supplier text: `€0,05`, `0.05 EUR`, `"0.05"`.
pub fn parse_number(text: &str) -> Option<f64> {
    let s = text
        .replace(['€', '$', '£'], "")
        .replace('\u{a0}', " ")
        .trim()
        .replace(',', ".");
    let s = LETTERS_RE.replace_all(&s, "");
    let s = NON_NUMERIC_RE.replace_all(&s, "");
    if matches!(s.as_ref(), "" | "." | "-") {
        return None;
    }
    s.parse().ok()
}

pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Maps supplier wording (`up`, `no change`, ...) onto
/// increase / decrease / unchanged / new. Unknown words pass through.
pub fn normalize_variation(raw: &str) -> String {
    let v = raw.trim().to_lowercase();
    match v.as_str() {
        "up" | "increase" | "inc" => "increase".to_string(),
        "down" | "decrease" | "dec" => "decrease".to_string(),
        "unchanged" | "no change" | "nochange" => "unchanged".to_string(),
        "new" => "new".to_string(),
        _ => v,
    }
}

/// Builds a row from a loosely typed JSON object (LLM output, hand-edited
/// snapshots). Blank strings become `None`; numbers may arrive as strings.
pub fn row_from_json(obj: &Map<String, Value>) -> PriceRow {
    let text = |key: &str| obj.get(key).and_then(value_to_string);
    let number = |key: &str| obj.get(key).and_then(value_to_f64);

    PriceRow {
        provider: text("provider"),
        country: text("country"),
        country_iso: text("country_iso"),
        country_code: text("country_code"),
        operator: text("operator"),
        network: text("network"),
        mcc: text("mcc"),
        mnc: text("mnc"),
        number_type: text("number_type"),
        destination: text("destination"),
        previous_rate: number("previous_rate"),
        old_price: number("old_price"),
        current_rate: number("current_rate"),
        new_price: number("new_price"),
        price: number("price"),
        currency: text("currency").map(|c| c.to_uppercase()),
        variation: text("variation").map(|v| normalize_variation(&v)),
        effective_date: text("effective_date").or_else(|| text("effective_from")),
        notes: text("notes"),
        ..Default::default()
    }
}
