use crate::domain::model::{Anomaly, ChangeRecord, PriceDiff, PriceRow};
use crate::utils::error::Result;
use serde::Serialize;
use tera::{Context, Tera};

const TEMPLATE_NAME: &str = "summary.html.tera";
const GENERATOR: &str = "SMS Price Monitor";

#[derive(Debug, Serialize)]
struct StatsView {
    changes: usize,
    new_routes: usize,
    removed: usize,
    anomalies: usize,
    avg_change: String,
    avg_class: &'static str,
    increases: usize,
    decreases: usize,
    unchanged: usize,
}

#[derive(Debug, Serialize)]
struct AnomalyView {
    severity: &'static str,
    anomaly_type: &'static str,
    reason: String,
    provider: String,
    country: String,
    operator: String,
    percent: String,
}

#[derive(Debug, Serialize)]
struct ChangeView {
    provider: String,
    country: String,
    operator: String,
    old_price: String,
    new_price: String,
    delta: String,
    percent: String,
    row_class: &'static str,
    delta_class: &'static str,
}

#[derive(Debug, Serialize)]
struct RouteView {
    provider: String,
    country: String,
    operator: String,
    price: String,
    currency: String,
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn sign_class(value: f64) -> &'static str {
    if value > 0.0 {
        "positive"
    } else if value < 0.0 {
        "negative"
    } else {
        ""
    }
}

impl From<&PriceRow> for RouteView {
    fn from(row: &PriceRow) -> Self {
        Self {
            provider: text(&row.provider),
            country: text(&row.country),
            operator: row.operator_name().to_string(),
            price: format!("{:.6}", row.effective_price().unwrap_or(0.0)),
            currency: row.display_currency().to_string(),
        }
    }
}

impl From<&ChangeRecord> for ChangeView {
    fn from(change: &ChangeRecord) -> Self {
        let after = &change.after;
        Self {
            provider: text(&after.provider),
            country: text(&after.country),
            operator: after.operator_name().to_string(),
            old_price: format!("{:.6}", change.before.effective_price().unwrap_or(0.0)),
            new_price: format!("{:.6}", after.effective_price().unwrap_or(0.0)),
            delta: format!("{:+.6} {}", change.delta, after.display_currency()),
            percent: format!("{:+.1}%", change.percent_change),
            row_class: if change.delta > 0.0 { "price-increase" } else { "price-decrease" },
            delta_class: if change.delta > 0.0 { "positive" } else { "negative" },
        }
    }
}

impl From<&Anomaly> for AnomalyView {
    fn from(anomaly: &Anomaly) -> Self {
        let after = &anomaly.change.after;
        Self {
            severity: anomaly.severity.as_str(),
            anomaly_type: anomaly.anomaly_type.as_str(),
            reason: anomaly.reason.clone(),
            provider: text(&after.provider),
            country: text(&after.country),
            operator: after.operator_name().to_string(),
            percent: format!("{:+.1}%", anomaly.change.percent_change),
        }
    }
}

/// Renders the daily HTML summary. Every interpolated value is HTML-escaped.
pub struct SummaryRenderer {
    tera: Tera,
}

impl SummaryRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html.tera"]);
        tera.add_raw_template(TEMPLATE_NAME, include_str!("../../templates/summary.html.tera"))?;
        Ok(Self { tera })
    }

    pub fn render(
        &self,
        diff: &PriceDiff,
        title: &str,
        base_currency: &str,
        generated_at: &str,
    ) -> Result<String> {
        let s = &diff.summary;
        let stats = StatsView {
            changes: s.changes_count,
            new_routes: s.new_count,
            removed: s.removed_count,
            anomalies: s.anomalies_count,
            avg_change: format!("{:+.4} {}", s.avg_change, base_currency),
            avg_class: sign_class(s.avg_change),
            increases: s.increases_count,
            decreases: s.decreases_count,
            unchanged: s.unchanged,
        };

        let mut context = Context::new();
        context.insert("title", title);
        context.insert("generated_at", generated_at);
        context.insert("generator", GENERATOR);
        context.insert("stats", &stats);
        context.insert(
            "anomalies",
            &diff.anomalies.iter().map(AnomalyView::from).collect::<Vec<_>>(),
        );
        context.insert(
            "changes",
            &diff.changed.iter().map(ChangeView::from).collect::<Vec<_>>(),
        );
        context.insert(
            "new_routes",
            &diff.new.iter().map(RouteView::from).collect::<Vec<_>>(),
        );
        context.insert(
            "removed_routes",
            &diff.removed.iter().map(RouteView::from).collect::<Vec<_>>(),
        );

        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }
}
