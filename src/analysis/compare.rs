use crate::domain::model::{
    round_to, Anomaly, AnomalyType, ChangeRecord, DiffSummary, PriceDiff, PriceRow, RouteKey,
    Severity,
};
use std::collections::HashMap;

pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 50.0;

/// Rows keyed by route: first occurrence fixes the order, the last one wins.
fn index_rows(rows: &[PriceRow]) -> (Vec<RouteKey>, HashMap<RouteKey, &PriceRow>) {
    let mut order = Vec::new();
    let mut map = HashMap::new();
    for row in rows {
        let key = row.key();
        if map.insert(key.clone(), row).is_none() {
            order.push(key);
        }
    }
    (order, map)
}

/// Classifies a price change. The first matching rule wins.
pub fn detect_anomaly(change: &ChangeRecord, threshold_percent: f64) -> Option<Anomaly> {
    let old = change.before.effective_price()?;
    let new = change.after.effective_price()?;
    let pct = change.percent_change;
    let delta = change.delta;

    let (anomaly_type, severity, reason) = if pct.abs() > threshold_percent {
        let severity = if pct.abs() > 100.0 {
            Severity::Critical
        } else if pct.abs() > 75.0 {
            Severity::High
        } else {
            Severity::Medium
        };
        (
            AnomalyType::ExtremeChange,
            severity,
            format!("Price change of {:+.1}% exceeds threshold", pct),
        )
    } else if new > 1.0 && old < 0.01 {
        (
            AnomalyType::ScaleMismatch,
            Severity::Critical,
            format!("Suspicious jump from {:.6} to {:.6}", old, new),
        )
    } else if new < 0.0001 && old > 0.01 {
        (
            AnomalyType::NearZero,
            Severity::High,
            format!("Price dropped to near-zero: {:.6}", new),
        )
    } else if delta.abs() > 0.1 && old < 0.5 {
        (
            AnomalyType::LargeAbsoluteChange,
            Severity::Medium,
            format!(
                "Absolute change of {:+.4} is large for base price {:.4}",
                delta, old
            ),
        )
    } else {
        return None;
    };

    Some(Anomaly {
        change: change.clone(),
        anomaly_type,
        severity,
        reason,
    })
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Diffs today's rows against the previous snapshot.
pub fn compare_prices(current: &[PriceRow], previous: &[PriceRow], threshold_percent: f64) -> PriceDiff {
    let (prev_order, prev_map) = index_rows(previous);
    let (cur_order, cur_map) = index_rows(current);

    let mut diff = PriceDiff::default();
    let mut increases = Vec::new();
    let mut decreases = Vec::new();

    for key in &cur_order {
        let row = cur_map[key];
        let Some(before) = prev_map.get(key) else {
            diff.new.push(row.clone());
            continue;
        };

        let (Some(old), Some(new)) = (before.effective_price(), row.effective_price()) else {
            continue;
        };
        if (new - old).abs() <= 1e-9 {
            continue;
        }

        let delta = new - old;
        let pct = if old != 0.0 { delta / old * 100.0 } else { 0.0 };
        let change = ChangeRecord {
            before: (*before).clone(),
            after: row.clone(),
            delta: round_to(delta, 6),
            percent_change: round_to(pct, 2),
        };

        if delta > 0.0 {
            increases.push(delta);
        } else {
            decreases.push(delta);
        }
        if let Some(anomaly) = detect_anomaly(&change, threshold_percent) {
            diff.anomalies.push(anomaly);
        }
        diff.changed.push(change);
    }

    diff.removed = prev_order
        .iter()
        .filter(|key| !cur_map.contains_key(*key))
        .map(|key| prev_map[key].clone())
        .collect();

    let all: Vec<f64> = increases.iter().chain(decreases.iter()).copied().collect();
    let unchanged = cur_order.len() as i64 - diff.new.len() as i64 - diff.changed.len() as i64;

    diff.summary = DiffSummary {
        unchanged: unchanged.max(0) as usize,
        current_count: cur_order.len(),
        previous_count: prev_order.len(),
        changes_count: diff.changed.len(),
        new_count: diff.new.len(),
        removed_count: diff.removed.len(),
        anomalies_count: diff.anomalies.len(),
        avg_increase: round_to(mean(&increases), 6),
        max_increase: round_to(increases.iter().copied().fold(0.0, f64::max), 6),
        increases_count: increases.len(),
        avg_decrease: round_to(mean(&decreases), 6),
        max_decrease: round_to(decreases.iter().copied().fold(0.0, f64::min), 6),
        decreases_count: decreases.len(),
        net_change: round_to(all.iter().sum(), 6),
        avg_change: round_to(mean(&all), 6),
    };

    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(country: &str, operator: &str, price: f64) -> PriceRow {
        PriceRow {
            provider: Some("acme".to_string()),
            country: Some(country.to_string()),
            operator: Some(operator.to_string()),
            new_price: Some(price),
            currency: Some("EUR".to_string()),
            ..Default::default()
        }
    }

    fn change(old: f64, new: f64) -> ChangeRecord {
        let delta = new - old;
        ChangeRecord {
            before: row("X", "Y", old),
            after: row("X", "Y", new),
            delta: round_to(delta, 6),
            percent_change: round_to(if old != 0.0 { delta / old * 100.0 } else { 0.0 }, 2),
        }
    }

    #[test]
    fn test_changed_new_removed_and_stats() {
        let previous = vec![
            row("Sweden", "Telia", 0.04),
            row("Norway", "Telenor", 0.05),
            row("Denmark", "TDC", 0.03),
            row("Finland", "Elisa", 0.02),
        ];
        let current = vec![
            row("Sweden", "Telia", 0.045),
            row("Norway", "Telenor", 0.04),
            row("Finland", "Elisa", 0.02),
            row("Spain", "Movistar", 0.06),
        ];

        let diff = compare_prices(&current, &previous, DEFAULT_ANOMALY_THRESHOLD);
        assert_eq!(diff.changed.len(), 2);
        assert_eq!(diff.changed[0].delta, 0.005);
        assert_eq!(diff.changed[0].percent_change, 12.5);
        assert_eq!(diff.changed[1].percent_change, -20.0);
        assert_eq!(diff.new.len(), 1);
        assert_eq!(diff.new[0].country.as_deref(), Some("Spain"));
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].country.as_deref(), Some("Denmark"));
        assert!(diff.anomalies.is_empty());

        let s = &diff.summary;
        assert_eq!(s.unchanged, 1);
        assert_eq!(s.current_count, 4);
        assert_eq!(s.previous_count, 4);
        assert_eq!(s.increases_count, 1);
        assert_eq!(s.decreases_count, 1);
        assert_eq!(s.max_increase, 0.005);
        assert_eq!(s.max_decrease, -0.01);
        assert_eq!(s.net_change, -0.005);
        assert_eq!(s.avg_change, -0.0025);
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let current = vec![row("Sweden", "Telia", 0.04), row("Sweden", "Telia", 0.05)];
        let previous = vec![row("Sweden", "Telia", 0.04)];
        let diff = compare_prices(&current, &previous, DEFAULT_ANOMALY_THRESHOLD);
        assert_eq!(diff.summary.current_count, 1);
        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.changed[0].after.new_price, Some(0.05));
    }

    #[test]
    fn test_anomaly_rules() {
        let extreme = detect_anomaly(&change(0.04, 0.1), 50.0).unwrap();
        assert_eq!(extreme.anomaly_type, AnomalyType::ExtremeChange);
        assert_eq!(extreme.severity, Severity::Critical);
        assert_eq!(extreme.reason, "Price change of +150.0% exceeds threshold");

        let high = detect_anomaly(&change(0.1, 0.18), 50.0).unwrap();
        assert_eq!(high.severity, Severity::High);

        let medium = detect_anomaly(&change(0.1, 0.04), 50.0).unwrap();
        assert_eq!(medium.severity, Severity::Medium);

        // Zero old price gives a 0% change, so the scale rule applies.
        let scale = detect_anomaly(&change(0.0, 2.0), 50.0).unwrap();
        assert_eq!(scale.anomaly_type, AnomalyType::ScaleMismatch);

        let near_zero = detect_anomaly(&change(0.02, 0.00005), 100.0).unwrap();
        assert_eq!(near_zero.anomaly_type, AnomalyType::NearZero);

        let absolute = detect_anomaly(&change(0.4, 0.55), 50.0).unwrap();
        assert_eq!(absolute.anomaly_type, AnomalyType::LargeAbsoluteChange);

        assert!(detect_anomaly(&change(0.04, 0.045), 50.0).is_none());
    }
}
