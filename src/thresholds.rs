//! Threshold rules and the classifier that maps sensor values to severity tiers.
//!
//! Rules are resolved per pond: admin-configured sensor bounds on the pond
//! document win, and the built-in table is the fallback when a pond has no
//! usable sensor configuration. Reading keys are matched against an explicit
//! alias table once, when a [`RuleSet`] is built.

use std::collections::{HashMap, HashSet};

use crate::models::{as_number, Pond, SensorConfig, SensorReading, Severity};

// ---

/// Inclusive numeric band; a missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Band {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Band {
    pub const fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// Classification policy of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Policy {
    /// Safe band nested inside a wider caution band; anything outside both is danger.
    Tiered { safe: Band, caution: Band },
    /// Plain min/max band with no caution tier.
    MinMax { safe: Band },
}

impl Policy {
    pub fn classify(&self, value: f64) -> Severity {
        // ---
        // MinMax is Tiered with a zero-width caution margin
        let (safe, caution) = match *self {
            Policy::Tiered { safe, caution } => (safe, caution),
            Policy::MinMax { safe } => (safe, safe),
        };

        if safe.contains(value) {
            Severity::Safe
        } else if caution.contains(value) {
            Severity::Caution
        } else {
            Severity::Danger
        }
    }
}

/// Static rule for one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    pub key: String,
    pub label: String,
    pub unit: String,
    pub policy: Policy,
}

impl ThresholdRule {
    pub fn classify(&self, value: f64) -> Severity {
        self.policy.classify(value)
    }
}

/// Water-quality parameters the service knows how to judge without pond config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Temperature,
    Ph,
    DissolvedOxygen,
}

/// Every document key that is understood as one of the known parameters.
const KEY_ALIASES: &[(&str, ParameterKind)] = &[
    ("suhu", ParameterKind::Temperature),
    ("suhu_air", ParameterKind::Temperature),
    ("temp", ParameterKind::Temperature),
    ("temperature", ParameterKind::Temperature),
    ("pH", ParameterKind::Ph),
    ("ph", ParameterKind::Ph),
    ("DO", ParameterKind::DissolvedOxygen),
    ("do", ParameterKind::DissolvedOxygen),
    ("oksigen", ParameterKind::DissolvedOxygen),
    ("dissolved_oxygen", ParameterKind::DissolvedOxygen),
];

impl ParameterKind {
    pub const ALL: [ParameterKind; 3] = [
        ParameterKind::Temperature,
        ParameterKind::Ph,
        ParameterKind::DissolvedOxygen,
    ];

    pub fn from_key(key: &str) -> Option<Self> {
        KEY_ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, kind)| *kind)
    }

    /// Built-in rule used when a pond carries no sensor configuration.
    pub fn default_rule(&self) -> ThresholdRule {
        // ---
        let (key, label, unit, policy) = match self {
            ParameterKind::Temperature => (
                "suhu",
                "Suhu Air",
                "°C",
                Policy::Tiered {
                    safe: Band::new(Some(25.0), Some(30.0)),
                    caution: Band::new(Some(23.0), Some(32.0)),
                },
            ),
            ParameterKind::Ph => (
                "pH",
                "pH Air",
                "",
                Policy::Tiered {
                    safe: Band::new(Some(7.0), Some(8.5)),
                    caution: Band::new(Some(6.5), Some(9.0)),
                },
            ),
            ParameterKind::DissolvedOxygen => (
                "DO",
                "Oksigen (DO)",
                "ppm",
                Policy::Tiered {
                    safe: Band::new(Some(3.0), None),
                    caution: Band::new(Some(2.0), None),
                },
            ),
        };

        ThresholdRule {
            key: key.to_string(),
            label: label.to_string(),
            unit: unit.to_string(),
            policy,
        }
    }
}

/// Outcome of classifying one parameter of a reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification<'a> {
    pub rule: &'a ThresholdRule,
    pub value: f64,
    pub severity: Severity,
}

/// Rules applicable to one pond, indexed by document key.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<ThresholdRule>,
    by_key: HashMap<String, usize>,
}

impl RuleSet {
    /// Global fallback table covering temperature, pH and dissolved oxygen.
    pub fn default_table() -> Self {
        // ---
        let rules: Vec<ThresholdRule> = ParameterKind::ALL
            .iter()
            .map(ParameterKind::default_rule)
            .collect();

        let by_key = KEY_ALIASES
            .iter()
            .filter_map(|(alias, kind)| {
                let idx = ParameterKind::ALL.iter().position(|k| k == kind)?;
                Some((alias.to_string(), idx))
            })
            .collect();

        Self { rules, by_key }
    }

    /// Build rules from the pond's admin-configured sensors.
    ///
    /// Returns `None` when no configured sensor yields a rule, so the caller
    /// can fall back to [`RuleSet::default_table`].
    pub fn from_pond(pond: &Pond) -> Option<Self> {
        // ---
        let mut rules = Vec::new();
        let mut by_key = HashMap::new();
        let mut labels = HashSet::new();

        for sensor in &pond.sensors {
            if sensor.key.is_empty() || sensor.is_actuator() || by_key.contains_key(&sensor.key) {
                continue;
            }
            let Some(mut rule) = rule_from_sensor(sensor) else {
                continue;
            };
            // Titles are built from labels and cooldown matches on titles
            if !labels.insert(rule.label.clone()) {
                rule.label = format!("{} ({})", rule.label, rule.key);
                labels.insert(rule.label.clone());
            }
            by_key.insert(sensor.key.clone(), rules.len());
            rules.push(rule);
        }

        if rules.is_empty() {
            None
        } else {
            Some(Self { rules, by_key })
        }
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    /// Classify every recognised, numeric parameter of a reading.
    ///
    /// Unknown keys and missing or non-numeric values are skipped. A rule is
    /// evaluated at most once even when the document carries two aliases of
    /// the same parameter; keys are visited in sorted order, so the
    /// lexicographically smallest alias wins.
    pub fn classify(&self, reading: &SensorReading) -> Vec<Classification<'_>> {
        // ---
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for (key, raw) in &reading.values {
            let Some(&idx) = self.by_key.get(key) else {
                continue;
            };
            let Some(value) = as_number(raw) else {
                continue;
            };
            if !seen.insert(idx) {
                continue;
            }

            let rule = &self.rules[idx];
            out.push(Classification {
                rule,
                value,
                severity: rule.classify(value),
            });
        }

        out
    }
}

/// Per-pond configuration first, built-in table otherwise.
pub fn resolve_rules(pond: Option<&Pond>) -> RuleSet {
    pond.and_then(RuleSet::from_pond)
        .unwrap_or_else(RuleSet::default_table)
}

fn rule_from_sensor(sensor: &SensorConfig) -> Option<ThresholdRule> {
    // ---
    let known = ParameterKind::from_key(&sensor.key).map(|kind| kind.default_rule());

    let policy = if sensor.has_bounds() {
        let safe = Band::new(sensor.aman_min, sensor.aman_max);
        if sensor.wasp_min.is_some() || sensor.wasp_max.is_some() {
            Policy::Tiered {
                safe,
                caution: Band::new(
                    sensor.wasp_min.or(sensor.aman_min),
                    sensor.wasp_max.or(sensor.aman_max),
                ),
            }
        } else {
            Policy::MinMax { safe }
        }
    } else {
        known.as_ref()?.policy
    };

    let label = match (sensor.label.is_empty(), &known) {
        (false, _) => sensor.label.clone(),
        (true, Some(rule)) => rule.label.clone(),
        (true, None) => sensor.key.clone(),
    };
    let unit = match (sensor.unit.is_empty(), &known) {
        (true, Some(rule)) => rule.unit.clone(),
        _ => sensor.unit.clone(),
    };

    Some(ThresholdRule {
        key: sensor.key.clone(),
        label,
        unit,
        policy,
    })
}
