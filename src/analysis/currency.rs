use crate::config::toml_config::CurrencyConfig;
use crate::domain::model::{round_to, PriceRow};
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Approximate `FROM_TO` rates used when the live API is unavailable.
const FALLBACK_RATES: &[(&str, f64)] = &[
    ("USD_EUR", 0.92),
    ("GBP_EUR", 1.17),
    ("SEK_EUR", 0.088),
    ("NOK_EUR", 0.086),
    ("DKK_EUR", 0.134),
    ("CHF_EUR", 1.06),
    ("PLN_EUR", 0.23),
    ("CZK_EUR", 0.040),
];

#[derive(Debug, Deserialize)]
struct PairResponse {
    result: String,
    conversion_rate: Option<f64>,
}

/// Exchange rates with an in-memory TTL cache, a live pair API and a
/// fallback table.
pub struct CurrencyConverter {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    ttl: Duration,
    timeout: Duration,
    fallback: HashMap<String, f64>,
    cache: Mutex<HashMap<String, (f64, Instant)>>,
}

impl CurrencyConverter {
    pub fn new(config: &CurrencyConfig, api_key: Option<&str>) -> Self {
        let mut fallback: HashMap<String, f64> = FALLBACK_RATES
            .iter()
            .map(|(pair, rate)| (pair.to_string(), *rate))
            .collect();
        for (pair, rate) in &config.fallback_rates {
            fallback.insert(pair.to_uppercase(), *rate);
        }

        Self {
            client: Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
            ttl: Duration::from_secs(config.cache_ttl_seconds),
            timeout: Duration::from_secs(config.timeout_seconds),
            fallback,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, key: &str) -> Option<f64> {
        let cache = self.cache.lock().ok()?;
        cache
            .get(key)
            .filter(|(_, at)| at.elapsed() < self.ttl)
            .map(|(rate, _)| *rate)
    }

    fn remember(&self, key: &str, rate: f64) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key.to_string(), (rate, Instant::now()));
        }
    }

    async fn fetch_live(&self, api_key: &str, from: &str, to: &str) -> Result<f64> {
        let url = format!("{}/{}/pair/{}/{}", self.api_base, api_key, from, to);
        let response = self.client.get(&url).timeout(self.timeout).send().await?;

        if !response.status().is_success() {
            return Err(EtlError::ProcessingError {
                message: format!("exchange rate request failed with status: {}", response.status()),
            });
        }

        let body: PairResponse = response.json().await?;
        match (body.result.as_str(), body.conversion_rate) {
            ("success", Some(rate)) => Ok(rate),
            (result, _) => Err(EtlError::ProcessingError {
                message: format!("exchange rate API returned {}", result),
            }),
        }
    }

    /// Rate to multiply a `from` amount by to get `to`. Never fails: unknown
    /// pairs fall back to 1.0 with a warning.
    pub async fn rate(&self, from: &str, to: &str) -> f64 {
        let from = from.trim().to_uppercase();
        let to = to.trim().to_uppercase();
        if from == to {
            return 1.0;
        }

        let key = format!("{}_{}", from, to);
        if let Some(rate) = self.cached(&key) {
            return rate;
        }

        if let Some(api_key) = &self.api_key {
            match self.fetch_live(api_key, &from, &to).await {
                Ok(rate) => {
                    tracing::debug!("Fetched rate {}/{}: {:.6}", from, to, rate);
                    self.remember(&key, rate);
                    return rate;
                }
                Err(e) => tracing::warn!("Live rate {}/{} unavailable: {}", from, to, e),
            }
        }

        if let Some(rate) = self.fallback.get(&key).copied() {
            tracing::debug!("Using fallback rate {}/{}: {:.6}", from, to, rate);
            self.remember(&key, rate);
            return rate;
        }

        let reverse = format!("{}_{}", to, from);
        if let Some(rate) = self.fallback.get(&reverse).filter(|r| **r != 0.0).map(|r| 1.0 / r) {
            tracing::debug!("Using reverse fallback rate {}/{}: {:.6}", from, to, rate);
            self.remember(&key, rate);
            return rate;
        }

        tracing::warn!("No rate found for {}/{}, using 1.0", from, to);
        1.0
    }

    /// Adds `normalized_price` (6 dp), `base_currency` and `original_currency`
    /// to every row. Rows without a currency are taken to be in EUR.
    pub async fn normalize_rows(&self, rows: Vec<PriceRow>, base: &str) -> Vec<PriceRow> {
        let base = base.trim().to_uppercase();
        let mut normalized = Vec::with_capacity(rows.len());

        for mut row in rows {
            let currency = row
                .currency
                .as_deref()
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "EUR".to_string());

            row.normalized_price = match row.raw_price() {
                Some(price) => Some(round_to(price * self.rate(&currency, &base).await, 6)),
                None => None,
            };
            row.base_currency = Some(base.clone());
            row.original_currency = Some(currency);
            normalized.push(row);
        }

        tracing::info!("Normalized {} prices to {}", normalized.len(), base);
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline() -> CurrencyConverter {
        CurrencyConverter::new(&CurrencyConfig::default(), None)
    }

    #[tokio::test]
    async fn test_fallback_and_reverse_rates() {
        let converter = offline();
        assert_eq!(converter.rate("eur", "EUR").await, 1.0);
        assert_eq!(converter.rate("USD", "EUR").await, 0.92);
        assert!((converter.rate("EUR", "SEK").await - 1.0 / 0.088).abs() < 1e-9);
        assert_eq!(converter.rate("XYZ", "EUR").await, 1.0);
    }

    #[tokio::test]
    async fn test_configured_fallback_overrides_builtin() {
        let mut config = CurrencyConfig::default();
        config.fallback_rates.insert("usd_eur".to_string(), 0.9);
        config.fallback_rates.insert("HUF_EUR".to_string(), 0.0025);
        let converter = CurrencyConverter::new(&config, None);
        assert_eq!(converter.rate("USD", "EUR").await, 0.9);
        assert_eq!(converter.rate("HUF", "EUR").await, 0.0025);
    }

    #[tokio::test]
    async fn test_normalize_rows() {
        let rows = vec![
            PriceRow {
                new_price: Some(0.1),
                currency: Some("usd".to_string()),
                ..Default::default()
            },
            PriceRow {
                price: Some(0.05),
                ..Default::default()
            },
            PriceRow {
                old_price: Some(0.05),
                currency: Some("GBP".to_string()),
                ..Default::default()
            },
        ];

        let rows = offline().normalize_rows(rows, "EUR").await;
        assert_eq!(rows[0].normalized_price, Some(0.092));
        assert_eq!(rows[0].original_currency.as_deref(), Some("USD"));
        assert_eq!(rows[1].normalized_price, Some(0.05));
        assert_eq!(rows[1].original_currency.as_deref(), Some("EUR"));
        assert_eq!(rows[2].normalized_price, None);
        assert!(rows.iter().all(|r| r.base_currency.as_deref() == Some("EUR")));
    }
}
