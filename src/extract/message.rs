use crate::config::toml_config::{TextExtractorKind, TomlConfig};
use crate::domain::model::{EmailMessage, PriceRow};
use crate::domain::ports::TextExtractor;
use crate::email::attachments::{attachment_text, html_to_text};
use crate::extract::html::tables_from_html;
use crate::extract::llm::GeminiExtractor;
use crate::extract::rules::RuleBasedExtractor;
use crate::extract::table::rows_from_table;
use crate::extract::tabular::{is_tabular, tables_from_attachment};
use crate::utils::error::{EtlError, Result};

fn looks_like_html(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("<html") || lower.contains("<body") || lower.contains("<table")
        || lower.contains("<p>") || lower.contains("<div")
}

/// Runs every extraction source over one email: tables in the body, the
/// text extractor on the body, then each attachment.
pub struct MessageExtractor {
    text: Option<Box<dyn TextExtractor>>,
    debug_tables: bool,
}

impl MessageExtractor {
    pub fn new(text: Option<Box<dyn TextExtractor>>, debug_tables: bool) -> Self {
        Self { text, debug_tables }
    }

    /// Builds the extractor selected in `[extract]`. `llm` needs `[llm].api_key`.
    pub fn from_config(config: &TomlConfig) -> Result<Self> {
        let text: Option<Box<dyn TextExtractor>> = match config.extract.text_extractor {
            TextExtractorKind::Rules => Some(Box::new(RuleBasedExtractor)),
            TextExtractorKind::Llm => {
                let api_key = config.llm_api_key().ok_or_else(|| EtlError::MissingConfigError {
                    field: "llm.api_key".to_string(),
                })?;
                Some(Box::new(GeminiExtractor::new(&config.llm, api_key)))
            }
            TextExtractorKind::None => None,
        };
        Ok(Self::new(text, config.extract.debug_tables))
    }

    pub fn text_extractor_name(&self) -> &'static str {
        self.text.as_ref().map(|t| t.name()).unwrap_or("none")
    }

    async fn extract_text(&self, text: &str, provider_hint: Option<&str>, source: &str) -> Vec<PriceRow> {
        let Some(extractor) = &self.text else {
            return Vec::new();
        };
        if text.trim().is_empty() {
            return Vec::new();
        }
        match extractor.extract(text, provider_hint).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("{} extractor failed on {}: {}", extractor.name(), source, e);
                Vec::new()
            }
        }
    }

    pub async fn extract(&self, message: &EmailMessage) -> Vec<PriceRow> {
        let hint = message.provider_hint();
        let hint = hint.as_deref();
        let mut rows = Vec::new();

        // 內文中的 HTML 表格
        match tables_from_html(&message.body) {
            Ok(tables) => {
                for table in &tables {
                    rows.extend(rows_from_table(table, hint, self.debug_tables));
                }
            }
            Err(e) => tracing::warn!("Could not read tables in {}: {}", message.filename, e),
        }

        let body_text = if looks_like_html(&message.body) {
            html_to_text(&message.body)
        } else {
            message.body.clone()
        };
        rows.extend(self.extract_text(&body_text, hint, &message.filename).await);

        for attachment in &message.attachments {
            let ext = attachment.extension();
            let source = format!("{}/{}", message.filename, attachment.filename);

            if is_tabular(&ext) {
                match tables_from_attachment(&ext, &attachment.data) {
                    Ok(tables) => {
                        let found: Vec<PriceRow> = tables
                            .iter()
                            .flat_map(|t| rows_from_table(t, hint, self.debug_tables))
                            .collect();
                        if !found.is_empty() {
                            tracing::debug!("attachment {} -> {} rows", source, found.len());
                            rows.extend(found);
                            continue;
                        }
                    }
                    Err(e) => tracing::warn!("Could not read attachment {}: {}", source, e),
                }
            }

            let text = attachment_text(attachment);
            rows.extend(self.extract_text(&text, hint, &source).await);
        }

        tracing::info!("message: {} -> {} rows", message.filename, rows.len());
        rows
    }

    pub async fn extract_all(&self, messages: &[EmailMessage]) -> Vec<PriceRow> {
        let mut rows = Vec::new();
        for message in messages {
            rows.extend(self.extract(message).await);
        }
        rows
    }
}
