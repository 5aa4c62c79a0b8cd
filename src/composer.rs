//! Turns classified readings into candidate alerts.

use serde::Serialize;

use crate::models::{Pond, Severity};
use crate::thresholds::Classification;

// ---

/// Alert candidate, alive for one pipeline invocation only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    // ---
    pub severity: Severity,
    /// Stable per (parameter, severity); the cooldown guard matches on it.
    pub title: String,
    pub message: String,
    pub parameter_key: String,
    pub pond_id: String,
}

/// Display label of a pond: its configured name, else `kolam1` => `Kolam 1`.
pub fn pond_label(pond_id: &str, pond: Option<&Pond>) -> String {
    // ---
    if let Some(name) = pond.and_then(|p| p.name.as_deref()) {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }
    pond_id.replacen("kolam", "Kolam ", 1)
}

pub fn alert_title(severity: Severity, label: &str) -> String {
    format!("Peringatan {}: {}", severity, label)
}

/// Build one alert per non-safe classification.
pub fn compose(pond_id: &str, label: &str, results: &[Classification<'_>]) -> Vec<Alert> {
    // ---
    results
        .iter()
        .filter(|c| c.severity.is_alert())
        .map(|c| {
            let value = format!("{} {}", c.value, c.rule.unit);
            Alert {
                severity: c.severity,
                title: alert_title(c.severity, &c.rule.label),
                message: format!(
                    "Status {} di {}. Nilai tercatat: {}.",
                    c.severity,
                    label,
                    value.trim_end()
                ),
                parameter_key: c.rule.key.clone(),
                pond_id: pond_id.to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::SensorReading;
    use crate::thresholds::RuleSet;
    use serde_json::{json, Map, Value};

    fn reading(pond_id: &str, values: Value) -> SensorReading {
        // ---
        let values: Map<String, Value> = serde_json::from_value(values).unwrap();
        SensorReading {
            pond_id: pond_id.to_string(),
            doc_id: "doc-1".to_string(),
            values,
            timestamp: None,
        }
    }

    #[test]
    fn test_pond_label() {
        // ---
        assert_eq!(pond_label("kolam1", None), "Kolam 1");
        assert_eq!(pond_label("tambak-a", None), "tambak-a");

        let named = Pond {
            id: "kolam1".to_string(),
            name: Some("Kolam Lele Utara".to_string()),
            ..Default::default()
        };
        assert_eq!(pond_label("kolam1", Some(&named)), "Kolam Lele Utara");

        let blank = Pond {
            name: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(pond_label("kolam7", Some(&blank)), "Kolam 7");
    }

    #[test]
    fn test_compose_danger_temperature() {
        // ---
        let rules = RuleSet::default_table();
        let r = reading("kolam1", json!({ "suhu": 35 }));
        let alerts = compose("kolam1", "Kolam 1", &rules.classify(&r));

        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.severity, Severity::Danger);
        assert_eq!(alert.title, "Peringatan Bahaya: Suhu Air");
        assert_eq!(
            alert.message,
            "Status Bahaya di Kolam 1. Nilai tercatat: 35 °C."
        );
        assert_eq!(alert.parameter_key, "suhu");
        assert_eq!(alert.pond_id, "kolam1");
    }

    #[test]
    fn test_safe_values_compose_nothing() {
        // ---
        let rules = RuleSet::default_table();
        let r = reading("kolam1", json!({ "suhu": 27.0, "pH": 7.0, "DO": 5.2 }));
        assert!(compose("kolam1", "Kolam 1", &rules.classify(&r)).is_empty());
    }

    #[test]
    fn test_title_ignores_value_and_pond() {
        // ---
        let rules = RuleSet::default_table();
        let a = compose(
            "kolam1",
            "Kolam 1",
            &rules.classify(&reading("kolam1", json!({ "DO": 2.5 }))),
        );
        let b = compose(
            "kolam2",
            "Kolam 2",
            &rules.classify(&reading("kolam2", json!({ "DO": 2.1 }))),
        );

        assert_eq!(a[0].title, "Peringatan Waspada: Oksigen (DO)");
        assert_eq!(a[0].title, b[0].title);
        assert_ne!(a[0].message, b[0].message);
    }

    #[test]
    fn test_unitless_message_and_multiple_alerts() {
        // ---
        let rules = RuleSet::default_table();
        let r = reading("kolam1", json!({ "pH": 6.7, "suhu": 22.0 }));
        let mut alerts = compose("kolam1", "Kolam 1", &rules.classify(&r));
        alerts.sort_by(|a, b| a.parameter_key.cmp(&b.parameter_key));

        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].title, "Peringatan Waspada: pH Air");
        assert_eq!(
            alerts[0].message,
            "Status Waspada di Kolam 1. Nilai tercatat: 6.7."
        );
        assert_eq!(alerts[1].title, "Peringatan Bahaya: Suhu Air");
    }
}
