//! Layered latency thresholds
//!
//! Lookup order is model override, then action override, then global. The
//! first layer whose warning limit is reached decides the severity.

use super::types::Severity;
use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Warning and critical limits in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdPair {
    pub warning_ms: u64,
    pub critical_ms: u64,
}

impl ThresholdPair {
    pub const fn new(warning_ms: u64, critical_ms: u64) -> Self {
        Self {
            warning_ms,
            critical_ms,
        }
    }

    /// Severity under this layer alone, `None` when below the warning limit
    fn classify(&self, duration_ms: u64) -> Option<Severity> {
        if duration_ms >= self.critical_ms {
            Some(Severity::Critical)
        } else if duration_ms >= self.warning_ms {
            Some(Severity::Warning)
        } else {
            None
        }
    }
}

impl Default for ThresholdPair {
    fn default() -> Self {
        Self::new(1000, 3000)
    }
}

/// Global limits plus optional per-model and per-action overrides
///
/// Lookup checks the model layer, then the action layer, then the global
/// one. [`validate`](Self::validate) only accepts overrides that keep severity
/// monotonic in duration: a more specific layer's `warning_ms` may not exceed
/// a less specific layer's `critical_ms`. Overrides can tighten limits or
/// loosen them up to that bound, so `models.Report = {5000, 10000}` is
/// rejected under a global `{1000, 3000}` while `{2500, 10000}` is accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceThresholds {
    #[serde(default)]
    pub global: ThresholdPair,

    /// Keyed by model name (e.g. "User")
    #[serde(default)]
    pub models: HashMap<String, ThresholdPair>,

    /// Keyed by action name (e.g. "findMany")
    #[serde(default)]
    pub actions: HashMap<String, ThresholdPair>,
}

impl PerformanceThresholds {
    pub fn new(global: ThresholdPair) -> Self {
        Self {
            global,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>, pair: ThresholdPair) -> Self {
        self.models.insert(model.into(), pair);
        self
    }

    pub fn with_action(mut self, action: impl Into<String>, pair: ThresholdPair) -> Self {
        self.actions.insert(action.into(), pair);
        self
    }

    /// Classify a duration against the layered limits
    ///
    /// When both a model and an action override are configured and both are
    /// exceeded, the model layer wins.
    pub fn severity(&self, model: &str, action: &str, duration_ms: u64) -> Severity {
        let layers = [self.models.get(model), self.actions.get(action), Some(&self.global)];

        layers
            .into_iter()
            .flatten()
            .find_map(|pair| pair.classify(duration_ms))
            .unwrap_or(Severity::Normal)
    }

    /// Reject layer combinations that would make severity non-monotonic
    ///
    /// Within a layer `warning <= critical`. A more specific layer's warning
    /// limit may not exceed a less specific layer's critical limit, otherwise
    /// a duration could fall through to a broader layer and be classified
    /// higher than a longer duration caught by the narrower one.
    pub fn validate(&self) -> Result<()> {
        check_pair("global", &self.global)?;

        for (model, pair) in &self.models {
            check_pair(&format!("model '{}'", model), pair)?;
            check_nested(&format!("model '{}'", model), pair, "global", &self.global)?;
            for (action, action_pair) in &self.actions {
                check_nested(
                    &format!("model '{}'", model),
                    pair,
                    &format!("action '{}'", action),
                    action_pair,
                )?;
            }
        }

        for (action, pair) in &self.actions {
            check_pair(&format!("action '{}'", action), pair)?;
            check_nested(&format!("action '{}'", action), pair, "global", &self.global)?;
        }

        Ok(())
    }
}

fn check_pair(name: &str, pair: &ThresholdPair) -> Result<()> {
    if pair.warning_ms > pair.critical_ms {
        return Err(MonitorError::InvalidThresholds(format!(
            "{} warning ({}ms) exceeds its critical limit ({}ms)",
            name, pair.warning_ms, pair.critical_ms
        )));
    }
    Ok(())
}

fn check_nested(name: &str, pair: &ThresholdPair, broader: &str, broader_pair: &ThresholdPair) -> Result<()> {
    if pair.warning_ms > broader_pair.critical_ms {
        return Err(MonitorError::InvalidThresholds(format!(
            "{} warning ({}ms) exceeds {} critical limit ({}ms)",
            name, pair.warning_ms, broader, broader_pair.critical_ms
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layered() -> PerformanceThresholds {
        PerformanceThresholds::new(ThresholdPair::new(1000, 3000))
            .with_model("AuditLog", ThresholdPair::new(200, 800))
            .with_action("aggregate", ThresholdPair::new(500, 2000))
    }

    #[test]
    fn test_global_layer() {
        let thresholds = PerformanceThresholds::default();
        assert_eq!(thresholds.severity("User", "count", 999), Severity::Normal);
        assert_eq!(thresholds.severity("User", "count", 1000), Severity::Warning);
        assert_eq!(thresholds.severity("User", "count", 3000), Severity::Critical);
    }

    #[test]
    fn test_model_layer_takes_precedence() {
        let thresholds = layered();
        // Both model and action overrides exceeded: model decides
        assert_eq!(thresholds.severity("AuditLog", "aggregate", 900), Severity::Critical);
        assert_eq!(thresholds.severity("AuditLog", "findMany", 250), Severity::Warning);
    }

    #[test]
    fn test_action_layer_applies_without_model_override() {
        let thresholds = layered();
        assert_eq!(thresholds.severity("User", "aggregate", 600), Severity::Warning);
        assert_eq!(thresholds.severity("User", "aggregate", 2500), Severity::Critical);
        assert_eq!(thresholds.severity("User", "findMany", 600), Severity::Normal);
    }

    #[test]
    fn test_falls_through_to_broader_layer() {
        let thresholds = layered();
        // Below the model warning limit, the global layer is still consulted
        assert_eq!(thresholds.severity("AuditLog", "findMany", 150), Severity::Normal);
    }

    #[test]
    fn test_severity_is_monotonic() {
        let thresholds = layered();
        for (model, action) in [("AuditLog", "aggregate"), ("User", "aggregate"), ("User", "count")] {
            let mut previous = Severity::Normal;
            for duration in (0..5000).step_by(7) {
                let current = thresholds.severity(model, action, duration);
                assert!(current >= previous, "{}.{} at {}ms", model, action, duration);
                previous = current;
            }
        }
    }

    #[test]
    fn test_validate_rejects_inverted_pair() {
        let thresholds = PerformanceThresholds::new(ThresholdPair::new(3000, 1000));
        assert!(thresholds.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_override_above_global_critical() {
        let thresholds = PerformanceThresholds::default()
            .with_model("Report", ThresholdPair::new(5000, 10000));
        let err = thresholds.validate().unwrap_err();
        assert!(err.to_string().contains("model 'Report'"));
    }

    #[test]
    fn test_validate_accepts_loosened_override_within_bound() {
        let thresholds = PerformanceThresholds::default()
            .with_model("Report", ThresholdPair::new(2500, 10000));
        assert!(thresholds.validate().is_ok());
        assert_eq!(thresholds.severity("Report", "aggregate", 2000), Severity::Warning);
        assert_eq!(thresholds.severity("Report", "aggregate", 5000), Severity::Warning);
        assert_eq!(thresholds.severity("Report", "aggregate", 10000), Severity::Critical);
    }

    #[test]
    fn test_validate_accepts_layered() {
        assert!(layered().validate().is_ok());
    }
}
