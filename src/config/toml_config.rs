use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

/// Price monitor configuration. Every section is optional; a missing file
/// section falls back to the defaults below.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
    pub extract: ExtractConfig,
    pub llm: LlmConfig,
    pub currency: CurrencyConfig,
    pub analysis: AnalysisConfig,
    pub load: LoadConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub name: String,
    pub summary_title: String,
    pub base_currency: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "daily-sms-prices".to_string(),
            summary_title: "Daily SMS Price Changes".to_string(),
            base_currency: "EUR".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the local backend.
    pub root: String,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub url_expiration_seconds: u64,
    pub layout: StorageLayout,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            root: "./data".to_string(),
            bucket: None,
            region: None,
            endpoint_url: None,
            url_expiration_seconds: 3600,
            layout: StorageLayout::default(),
        }
    }
}

/// Folder structure shared by every backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageLayout {
    /// Raw supplier emails.
    pub emails: String,
    /// Working folder for the daily run.
    pub inbox: String,
    /// Extractions, snapshots and diffs.
    pub logs: String,
    /// Rendered reports.
    pub summaries: String,
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self {
            emails: "emails/".to_string(),
            inbox: "inbox_today/".to_string(),
            logs: "logs/".to_string(),
            summaries: "summaries/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum TextExtractorKind {
    /// Regex based extraction, no network.
    Rules,
    /// Gemini `generateContent` endpoint.
    Llm,
    /// Only structured tables are read.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// 0 means no limit.
    pub max_messages: usize,
    pub debug_tables: bool,
    pub text_extractor: TextExtractorKind,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_messages: 0,
            debug_tables: false,
            text_extractor: TextExtractorKind::Rules,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key: None,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub cache_ttl_seconds: u64,
    pub timeout_seconds: u64,
    /// Extra `FROM_TO` rates merged over the built-in fallback table.
    pub fallback_rates: HashMap<String, f64>,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://v6.exchangerate-api.com/v6".to_string(),
            cache_ttl_seconds: 3600,
            timeout_seconds: 5,
            fallback_rates: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub anomaly_threshold_percent: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            anomaly_threshold_percent: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Bundle summary, diff and prices into a ZIP next to the summary.
    pub archive: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self { archive: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

/// Treats empty strings and unresolved `${VAR}` placeholders as unset.
pub fn secret(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !ENV_VAR_RE.is_match(v))
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GOOGLE_API_KEY})，未設定者保留原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_RE
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    pub fn llm_api_key(&self) -> Option<&str> {
        secret(&self.llm.api_key)
    }

    pub fn currency_api_key(&self) -> Option<&str> {
        secret(&self.currency.api_key)
    }

    pub fn max_messages(&self) -> Option<usize> {
        (self.extract.max_messages > 0).then_some(self.extract.max_messages)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.enabled
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("pipeline.name", &self.pipeline.name)?;
        validation::validate_non_empty_string(
            "pipeline.summary_title",
            &self.pipeline.summary_title,
        )?;
        validation::validate_currency_code("pipeline.base_currency", &self.pipeline.base_currency)?;

        match self.storage.backend {
            StorageBackend::Local => {
                validation::validate_path("storage.root", &self.storage.root)?;
            }
            StorageBackend::S3 => {
                let bucket = validation::validate_required_field("storage.bucket", &self.storage.bucket)?;
                validation::validate_non_empty_string("storage.bucket", bucket)?;
                if let Some(endpoint) = &self.storage.endpoint_url {
                    validation::validate_url("storage.endpoint_url", endpoint)?;
                }
            }
        }
        validation::validate_range(
            "storage.url_expiration_seconds",
            self.storage.url_expiration_seconds,
            1,
            7 * 24 * 3600,
        )?;

        let layout = &self.storage.layout;
        validation::validate_prefix("storage.layout.emails", &layout.emails)?;
        validation::validate_prefix("storage.layout.inbox", &layout.inbox)?;
        validation::validate_prefix("storage.layout.logs", &layout.logs)?;
        validation::validate_prefix("storage.layout.summaries", &layout.summaries)?;
        if layout.emails == layout.inbox {
            return Err(EtlError::ConfigValidationError {
                field: "storage.layout.inbox".to_string(),
                message: "Inbox must differ from the emails folder".to_string(),
            });
        }

        if self.extract.text_extractor == TextExtractorKind::Llm {
            validation::validate_url("llm.endpoint", &self.llm.endpoint)?;
            validation::validate_non_empty_string("llm.model", &self.llm.model)?;
            if self.llm_api_key().is_none() {
                return Err(EtlError::MissingConfigError {
                    field: "llm.api_key".to_string(),
                });
            }
            validation::validate_positive_number("llm.timeout_seconds", self.llm.timeout_seconds, 1)?;
        }

        validation::validate_url("currency.api_base", &self.currency.api_base)?;
        validation::validate_positive_number(
            "currency.timeout_seconds",
            self.currency.timeout_seconds,
            1,
        )?;
        for (pair, rate) in &self.currency.fallback_rates {
            if !(rate.is_finite() && *rate > 0.0) {
                return Err(EtlError::InvalidConfigValueError {
                    field: format!("currency.fallback_rates.{}", pair),
                    value: rate.to_string(),
                    reason: "Rate must be a positive number".to_string(),
                });
            }
        }

        validation::validate_range(
            "analysis.anomaly_threshold_percent",
            self.analysis.anomaly_threshold_percent,
            0.0,
            10_000.0,
        )?;

        Ok(())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
