use serde::{Deserialize, Serialize};

/// One supplier price for one route, as found in an email.
///
/// Suppliers are inconsistent about which columns they send, so every field
/// is optional. `normalized_price` and friends are filled in by currency
/// normalization before comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceRow {
    pub provider: Option<String>,
    pub country: Option<String>,
    pub country_iso: Option<String>,
    pub country_code: Option<String>,
    pub operator: Option<String>,
    pub network: Option<String>,
    pub mcc: Option<String>,
    pub mnc: Option<String>,
    pub number_type: Option<String>,
    pub destination: Option<String>,
    pub previous_rate: Option<f64>,
    pub old_price: Option<f64>,
    pub current_rate: Option<f64>,
    pub new_price: Option<f64>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub variation: Option<String>,
    pub effective_date: Option<String>,
    pub notes: Option<String>,
    pub normalized_price: Option<f64>,
    pub base_currency: Option<String>,
    pub original_currency: Option<String>,
}

/// Identity of a route across snapshots: provider, country, operator, currency.
pub type RouteKey = (String, String, String, String);

fn trimmed(value: &Option<String>) -> String {
    value.as_deref().unwrap_or("").trim().to_string()
}

impl PriceRow {
    pub fn key(&self) -> RouteKey {
        let operator = match self.operator.as_deref() {
            Some(op) if !op.is_empty() => self.operator.clone(),
            _ => self.network.clone(),
        };
        (
            trimmed(&self.provider),
            trimmed(&self.country),
            trimmed(&operator),
            trimmed(&self.currency).to_uppercase(),
        )
    }

    /// Price as quoted by the supplier, before any conversion.
    pub fn raw_price(&self) -> Option<f64> {
        self.new_price.or(self.price).or(self.current_rate)
    }

    /// Price used for comparison: the normalized price when available.
    pub fn effective_price(&self) -> Option<f64> {
        self.normalized_price.or_else(|| self.raw_price())
    }

    pub fn operator_name(&self) -> &str {
        self.operator
            .as_deref()
            .filter(|op| !op.is_empty())
            .or(self.network.as_deref())
            .unwrap_or("")
    }

    /// Currency the effective price is expressed in.
    pub fn display_currency(&self) -> &str {
        self.base_currency
            .as_deref()
            .or(self.currency.as_deref())
            .unwrap_or("EUR")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub before: PriceRow,
    pub after: PriceRow,
    pub delta: f64,
    pub percent_change: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    ExtremeChange,
    ScaleMismatch,
    NearZero,
    LargeAbsoluteChange,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtremeChange => "extreme_change",
            Self::ScaleMismatch => "scale_mismatch",
            Self::NearZero => "near_zero",
            Self::LargeAbsoluteChange => "large_absolute_change",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    #[serde(flatten)]
    pub change: ChangeRecord,
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffSummary {
    pub unchanged: usize,
    pub current_count: usize,
    pub previous_count: usize,
    pub changes_count: usize,
    pub new_count: usize,
    pub removed_count: usize,
    pub anomalies_count: usize,
    pub avg_increase: f64,
    pub max_increase: f64,
    pub increases_count: usize,
    pub avg_decrease: f64,
    pub max_decrease: f64,
    pub decreases_count: usize,
    pub net_change: f64,
    pub avg_change: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceDiff {
    pub changed: Vec<ChangeRecord>,
    pub new: Vec<PriceRow>,
    pub removed: Vec<PriceRow>,
    pub anomalies: Vec<Anomaly>,
    pub summary: DiffSummary,
}

impl PriceDiff {
    /// One-line digest used in CLI output and logs.
    pub fn headline(&self) -> String {
        let mut text = format!(
            "📊 Summary: {} price changes, {} new routes",
            self.summary.changes_count, self.summary.new_count
        );
        if self.summary.anomalies_count > 0 {
            text.push_str(&format!(
                ", ⚠️ {} anomalies detected!",
                self.summary.anomalies_count
            ));
        }
        text
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    /// Lower-case extension without the dot, or "".
    pub fn extension(&self) -> String {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub filename: String,
    pub subject: Option<String>,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

impl EmailMessage {
    /// Supplier hint derived from the file name (`acme.eml` -> `acme`).
    pub fn provider_hint(&self) -> Option<String> {
        std::path::Path::new(&self.filename)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .map(str::to_string)
    }
}

/// Output of the transform phase: the normalized rows and their diff.
#[derive(Debug, Clone)]
pub struct TransformResult {
    pub current: Vec<PriceRow>,
    pub diff: PriceDiff,
}

/// Output of the load phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub storage_path: String,
    pub download_url: String,
    pub summary: String,
    pub archive_path: Option<String>,
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_falls_back_to_network_and_uppercases_currency() {
        let row = PriceRow {
            provider: Some(" acme ".to_string()),
            country: Some("Sweden".to_string()),
            network: Some("Telia".to_string()),
            currency: Some("eur".to_string()),
            ..Default::default()
        };
        assert_eq!(
            row.key(),
            (
                "acme".to_string(),
                "Sweden".to_string(),
                "Telia".to_string(),
                "EUR".to_string()
            )
        );
    }

    #[test]
    fn test_effective_price_prefers_normalized() {
        let mut row = PriceRow {
            price: Some(0.5),
            ..Default::default()
        };
        assert_eq!(row.effective_price(), Some(0.5));
        row.new_price = Some(0.4);
        assert_eq!(row.effective_price(), Some(0.4));
        row.normalized_price = Some(0.3);
        assert_eq!(row.effective_price(), Some(0.3));
        assert_eq!(row.raw_price(), Some(0.4));
    }

    #[test]
    fn test_anomaly_serializes_flat() {
        let anomaly = Anomaly {
            change: ChangeRecord {
                before: PriceRow::default(),
                after: PriceRow::default(),
                delta: 0.2,
                percent_change: 200.0,
            },
            anomaly_type: AnomalyType::ExtremeChange,
            severity: Severity::Critical,
            reason: "big".to_string(),
        };
        let json = serde_json::to_value(&anomaly).unwrap();
        assert_eq!(json["anomaly_type"], "extreme_change");
        assert_eq!(json["severity"], "critical");
        assert_eq!(json["delta"], 0.2);
        assert!(json.get("before").is_some());
    }

    #[test]
    fn test_provider_hint_and_extension() {
        let msg = EmailMessage {
            filename: "acme_telecom.eml".to_string(),
            subject: None,
            body: String::new(),
            attachments: vec![Attachment {
                filename: "Rates.XLSX".to_string(),
                content_type: "application/octet-stream".to_string(),
                data: vec![],
            }],
        };
        assert_eq!(msg.provider_hint().as_deref(), Some("acme_telecom"));
        assert_eq!(msg.attachments[0].extension(), "xlsx");
    }

    #[test]
    fn test_headline_mentions_anomalies_only_when_present() {
        let mut diff = PriceDiff::default();
        diff.summary.changes_count = 2;
        diff.summary.new_count = 1;
        assert_eq!(diff.headline(), "📊 Summary: 2 price changes, 1 new routes");
        diff.summary.anomalies_count = 1;
        assert!(diff.headline().ends_with("1 anomalies detected!"));
    }
}
