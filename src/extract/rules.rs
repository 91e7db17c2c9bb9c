//! Regex based price extraction for free-text supplier notices.
//!
//! The text is split into blank-line separated blocks and each block that
//! mentions a rate or price becomes one row. No network access is needed,
//! which makes this the default extractor.

use crate::domain::model::PriceRow;
use crate::domain::ports::TextExtractor;
use crate::extract::normalize::{normalize_variation, parse_number};
use crate::utils::error::Result;
use async_trait::async_trait;
use regex::{Match, Regex};
use std::sync::LazyLock;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid extraction pattern")
}

static BLOCK_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| re(r"\n[ \t]*\n"));
static COUNTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\bcountry(?:\s*iso)?\s*[:=]\s*([A-Za-z ()/&'-]+)"));
static OPERATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(?:operator|network)\s*[:=]\s*([A-Za-z0-9 ()/&'._-]+)"));
static MCC_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\bmcc\D{0,5}(\d{2,4})\b"));
static MNC_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\bmnc\D{0,5}(\d{1,4})\b"));
static CURRENCY_RE: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\b(EUR|USD|SEK|GBP)\b"));
static OLD_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)\b(?:old price|previous rate|old rate|current rate)\b\D{0,10}([0-9][0-9.,]*)")
});
static NEW_PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(?:new price|new rate)\b\D{0,10}([0-9][0-9.,]*)"));
static ANY_PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(?:rate|price)\b\D{0,10}([0-9][0-9.,]*)"));
static VARIATION_RE: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(increase|decrease|unchanged|up|down|new)\b"));
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"\b(20\d{2}[-/]\d{2}[-/]\d{2}(?:[ T]\d{2}:\d{2}(?::\d{2})?)?)")
});

fn first_group(regex: &Regex, block: &str) -> Option<String> {
    regex
        .captures(block)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn amount(m: Match) -> Option<f64> {
    parse_number(m.as_str().trim_end_matches(['.', ',']))
}

/// "new" only counts as a variation when it is not the start of "new price".
fn variation(block: &str) -> Option<String> {
    VARIATION_RE.captures_iter(block).find_map(|caps| {
        let word = caps.get(1)?;
        let rest = block[word.end()..].trim_start().to_lowercase();
        if word.as_str().eq_ignore_ascii_case("new")
            && (rest.starts_with("price") || rest.starts_with("rate"))
        {
            return None;
        }
        Some(normalize_variation(word.as_str()))
    })
}

fn extract_block(block: &str, provider_hint: Option<&str>) -> Option<PriceRow> {
    let old_match = OLD_PRICE_RE.captures(block);
    let old_span = old_match.as_ref().and_then(|c| c.get(0)).map(|m| m.range());
    let old_price = old_match.as_ref().and_then(|c| c.get(1)).and_then(amount);

    let new_price = NEW_PRICE_RE
        .captures(block)
        .and_then(|c| c.get(1))
        .and_then(amount)
        .or_else(|| {
            // Bare "rate"/"price" mentions that are not part of the old price.
            ANY_PRICE_RE
                .captures_iter(block)
                .filter(|c| match (&old_span, c.get(0)) {
                    (Some(span), Some(m)) => !span.contains(&m.start()),
                    _ => true,
                })
                .find_map(|c| c.get(1).and_then(amount))
        });

    if old_price.is_none() && new_price.is_none() {
        return None;
    }

    Some(PriceRow {
        provider: provider_hint.map(str::to_string),
        country: first_group(&COUNTRY_RE, block),
        operator: first_group(&OPERATOR_RE, block),
        mcc: first_group(&MCC_RE, block),
        mnc: first_group(&MNC_RE, block),
        previous_rate: old_price,
        old_price,
        new_price,
        price: if old_price.is_none() { new_price } else { None },
        currency: first_group(&CURRENCY_RE, block).map(|c| c.to_uppercase()),
        variation: variation(block),
        effective_date: first_group(&DATE_RE, block).map(|d| d.replace('/', "-")),
        ..Default::default()
    })
}

pub fn extract_rows(text: &str, provider_hint: Option<&str>) -> Vec<PriceRow> {
    let text = text.replace("\r\n", "\n");
    BLOCK_SPLIT_RE
        .split(&text)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .filter_map(|block| extract_block(block, provider_hint))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct RuleBasedExtractor;

#[async_trait]
impl TextExtractor for RuleBasedExtractor {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn extract(&self, text: &str, provider_hint: Option<&str>) -> Result<Vec<PriceRow>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(extract_rows(text, provider_hint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTICE: &str = "Dear customer,\r\n\
\r\n\
Country: Sweden\r\n\
Operator: Telia\r\n\
MCC: 240 MNC: 01\r\n\
Old price: 0.0400 EUR\r\n\
New price: 0.0450 EUR\r\n\
Effective from 2024/06/01\r\n\
\r\n\
Country: Norway\r\n\
Network = Telenor\r\n\
Rate: 0,051 EUR (increase)\r\n\
\r\n\
Best regards";

    #[test]
    fn test_extracts_one_row_per_priced_block() {
        let rows = extract_rows(NOTICE, Some("acme"));
        assert_eq!(rows.len(), 2);

        let sweden = &rows[0];
        assert_eq!(sweden.provider.as_deref(), Some("acme"));
        assert_eq!(sweden.country.as_deref(), Some("Sweden"));
        assert_eq!(sweden.operator.as_deref(), Some("Telia"));
        assert_eq!(sweden.mcc.as_deref(), Some("240"));
        assert_eq!(sweden.mnc.as_deref(), Some("01"));
        assert_eq!(sweden.old_price, Some(0.04));
        assert_eq!(sweden.new_price, Some(0.045));
        assert_eq!(sweden.price, None);
        assert_eq!(sweden.currency.as_deref(), Some("EUR"));
        assert_eq!(sweden.variation, None);
        assert_eq!(sweden.effective_date.as_deref(), Some("2024-06-01"));

        let norway = &rows[1];
        assert_eq!(norway.operator.as_deref(), Some("Telenor"));
        assert_eq!(norway.old_price, None);
        assert_eq!(norway.new_price, Some(0.051));
        assert_eq!(norway.price, Some(0.051));
        assert_eq!(norway.variation.as_deref(), Some("increase"));
    }

    #[test]
    fn test_bare_rate_after_old_rate() {
        let rows = extract_rows("old rate 0.04, rate 0.05.", None);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].old_price, Some(0.04));
        assert_eq!(rows[0].new_price, Some(0.05));
    }

    #[tokio::test]
    async fn test_blank_text_yields_nothing() {
        let rows = RuleBasedExtractor.extract("  \n ", None).await.unwrap();
        assert!(rows.is_empty());
        assert!(extract_rows("Hello, no prices here.", None).is_empty());
    }
}
