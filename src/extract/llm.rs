use crate::config::toml_config::LlmConfig;
use crate::domain::model::PriceRow;
use crate::domain::ports::TextExtractor;
use crate::extract::normalize::row_from_json;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::LazyLock;
use std::time::Duration;

const EXTRACTION_PROMPT: &str = r#"You extract SMS termination price changes from supplier emails.

Return ONLY a JSON array. Each element describes one route and uses these keys
(use null when a value is not present in the email):
  provider, country, country_iso, operator, network, mcc, mnc, number_type,
  destination, old_price, new_price, currency, variation, effective_from, notes

Rules:
- Prices are numbers with a dot as decimal separator, no currency symbols.
- currency is an ISO 4217 code such as EUR or USD.
- variation is one of: increase, decrease, unchanged, new.
- effective_from uses YYYY-MM-DD.
- If the email contains no prices, return [].

Provider hint: {provider_hint}

Email:
{email}
"#;

static FENCED_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*([\[{].*?[\]}])\s*```").expect("valid fenced json pattern")
});
static BARE_JSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)(\[.*\]|\{.*\})").expect("valid bare json pattern"));

/// First JSON array or object in a model reply, fenced code blocks first.
pub fn first_json(reply: &str) -> Option<&str> {
    FENCED_JSON_RE
        .captures(reply)
        .or_else(|| BARE_JSON_RE.captures(reply))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Turns the JSON part of a reply into rows. A single object counts as one row.
pub fn rows_from_reply(reply: &str) -> Result<Vec<PriceRow>> {
    let json_str = first_json(reply).unwrap_or(reply);
    let value: Value = serde_json::from_str(json_str)?;

    let rows = match value {
        Value::Object(obj) => vec![row_from_json(&obj)],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_object)
            .map(row_from_json)
            .collect(),
        _ => Vec::new(),
    };
    Ok(rows)
}

fn reply_text(response: &Value) -> Option<String> {
    let parts = response
        .pointer("/candidates/0/content/parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    Some(text).filter(|t| !t.trim().is_empty())
}

/// Gemini `generateContent` client.
pub struct GeminiExtractor {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiExtractor {
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model)
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        tracing::debug!("LLM response status: {}", response.status());

        if !response.status().is_success() {
            return Err(EtlError::ExtractionError {
                message: format!("LLM request failed with status: {}", response.status()),
            });
        }

        let payload: Value = response.json().await?;
        reply_text(&payload).ok_or_else(|| EtlError::ExtractionError {
            message: "LLM reply contained no text".to_string(),
        })
    }
}

#[async_trait]
impl TextExtractor for GeminiExtractor {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn extract(&self, text: &str, provider_hint: Option<&str>) -> Result<Vec<PriceRow>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let prompt = EXTRACTION_PROMPT
            .replace("{provider_hint}", provider_hint.unwrap_or(""))
            .replace("{email}", text.trim());

        let reply = self.generate(&prompt).await?;
        let mut rows = rows_from_reply(&reply).map_err(|e| EtlError::ExtractionError {
            message: format!("could not parse LLM reply: {}", e),
        })?;

        if let Some(hint) = provider_hint {
            for row in rows.iter_mut().filter(|r| r.provider.is_none()) {
                row.provider = Some(hint.to_string());
            }
        }
        tracing::debug!("LLM extracted {} rows", rows.len());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_json_prefers_fenced_block() {
        let reply = "Sure! [note]\n```json\n[{\"country\": \"Sweden\"}]\n```\nDone.";
        assert_eq!(first_json(reply), Some("[{\"country\": \"Sweden\"}]"));
        assert_eq!(first_json("here: {\"a\": 1} ok"), Some("{\"a\": 1}"));
        assert_eq!(first_json("nothing"), None);
    }

    #[test]
    fn test_rows_from_reply() {
        let rows = rows_from_reply(
            "```\n[{\"country\": \"Spain\", \"new_price\": \"0,06\", \"variation\": \"down\"}, 3]\n```",
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].new_price, Some(0.06));
        assert_eq!(rows[0].variation.as_deref(), Some("decrease"));

        let single = rows_from_reply("{\"country\": \"Chile\", \"price\": 0.1}").unwrap();
        assert_eq!(single[0].price, Some(0.1));

        assert!(rows_from_reply("I could not find any prices").is_err());
    }

    #[test]
    fn test_reply_text_joins_parts() {
        let payload = json!({
            "candidates": [{ "content": { "parts": [{ "text": "[" }, { "text": "]" }] } }]
        });
        assert_eq!(reply_text(&payload).as_deref(), Some("[]"));
        assert_eq!(reply_text(&json!({ "candidates": [] })), None);
    }
}
