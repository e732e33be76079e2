use crate::definition::{EventDefaults, Threshold, ThresholdDefinition, ThresholdType};
use crate::error::{Result, ThresholdError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One threshold record as it appears in configuration.
///
/// `type` stays a string here so an unknown kind rejects only its own
/// record instead of failing the whole file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub ds_name: String,
    #[serde(default)]
    pub ds_type: String,
    pub value: f64,
    /// Defaults to `value` when absent
    #[serde(default)]
    pub rearm: Option<f64>,
    #[serde(default = "default_trigger")]
    pub trigger: i64,
    #[serde(default)]
    pub triggered_uei: Option<String>,
    #[serde(default)]
    pub rearmed_uei: Option<String>,
    #[serde(default = "default_resource_pattern")]
    pub resource_pattern: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_trigger() -> i64 {
    1
}

fn default_resource_pattern() -> String {
    "*".to_string()
}

/// Convert a single config record into a validated [`Threshold`], injecting
/// the default event identifiers.
pub fn build_threshold(config: &ThresholdConfig, defaults: &EventDefaults) -> Result<Threshold> {
    let kind: ThresholdType = config
        .kind
        .parse()
        .map_err(|e: String| ThresholdError::config(&config.id, e))?;

    // Out-of-range counts become 0 and fail validation for count-based kinds.
    let trigger = u32::try_from(config.trigger).unwrap_or(0);

    let definition = ThresholdDefinition {
        id: config.id.clone(),
        kind,
        ds_name: config.ds_name.clone(),
        ds_type: config.ds_type.clone(),
        value: config.value,
        rearm: config.rearm.unwrap_or(config.value),
        trigger,
        triggered_uei: config.triggered_uei.clone(),
        rearmed_uei: config.rearmed_uei.clone(),
        resource_pattern: config.resource_pattern.clone(),
        description: config.description.clone(),
    }
    .with_event_defaults(defaults);

    Threshold::new(definition)
}

/// Thresholds accepted from a configuration set, plus the errors of the
/// records that were rejected.
#[derive(Debug, Default)]
pub struct LoadedThresholds {
    pub thresholds: Vec<Threshold>,
    pub rejected: Vec<ThresholdError>,
}

/// Convert multiple records, skipping invalid ones with warnings. A record
/// reusing an already accepted ID is rejected.
pub fn build_thresholds(configs: &[ThresholdConfig], defaults: &EventDefaults) -> LoadedThresholds {
    let mut loaded = LoadedThresholds {
        thresholds: Vec::with_capacity(configs.len()),
        rejected: Vec::new(),
    };
    let mut seen = HashSet::new();

    for config in configs {
        let result = if seen.contains(config.id.as_str()) {
            Err(ThresholdError::config(&config.id, "duplicate threshold id"))
        } else {
            build_threshold(config, defaults)
        };

        match result {
            Ok(threshold) => {
                seen.insert(config.id.as_str());
                loaded.thresholds.push(threshold);
            }
            Err(e) => {
                tracing::warn!(
                    threshold_id = %config.id,
                    threshold_type = %config.kind,
                    ds = %config.ds_name,
                    error = %e,
                    "Skipping invalid threshold definition"
                );
                loaded.rejected.push(e);
            }
        }
    }

    loaded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{HIGH_THRESHOLD_REARM_UEI, RELATIVE_CHANGE_UEI};

    #[derive(Deserialize)]
    struct File {
        thresholds: Vec<ThresholdConfig>,
    }

    fn parse(toml_str: &str) -> Vec<ThresholdConfig> {
        toml::from_str::<File>(toml_str).unwrap().thresholds
    }

    #[test]
    fn loads_defaults_for_optional_fields() {
        let configs = parse(
            r#"
            [[thresholds]]
            id = "if-spike"
            type = "relativeChange"
            ds_name = "ifInOctets"
            value = 1.5
            "#,
        );
        let loaded = build_thresholds(&configs, &EventDefaults::default());
        assert!(loaded.rejected.is_empty());

        let def = loaded.thresholds[0].definition();
        assert_eq!(def.kind, ThresholdType::RelativeChange);
        assert_eq!(def.trigger, 1);
        assert_eq!(def.rearm, 1.5);
        assert_eq!(def.resource_pattern, "*");
        assert_eq!(def.triggered_uei.as_deref(), Some(RELATIVE_CHANGE_UEI));
        assert_eq!(def.rearmed_uei, None);
    }

    #[test]
    fn low_without_rearm_loads() {
        let configs = parse(
            r#"
            [[thresholds]]
            id = "disk-low"
            type = "low"
            ds_name = "freePercent"
            value = 10.0
            trigger = 2
            "#,
        );
        let loaded = build_thresholds(&configs, &EventDefaults::default());
        assert!(loaded.rejected.is_empty());
        assert_eq!(loaded.thresholds[0].definition().rearm, 10.0);
    }

    #[test]
    fn unknown_type_rejects_only_that_record() {
        let configs = parse(
            r#"
            [[thresholds]]
            id = "median-cpu"
            type = "median"
            ds_name = "cpu"
            value = 50.0

            [[thresholds]]
            id = "cpu-high"
            type = "high"
            ds_name = "cpu"
            value = 90.0
            rearm = 80.0
            trigger = 2
            "#,
        );
        let loaded = build_thresholds(&configs, &EventDefaults::default());

        assert_eq!(loaded.thresholds.len(), 1);
        assert_eq!(loaded.thresholds[0].id(), "cpu-high");
        assert_eq!(
            loaded.thresholds[0].definition().rearmed_uei.as_deref(),
            Some(HIGH_THRESHOLD_REARM_UEI)
        );
        assert_eq!(loaded.rejected.len(), 1);
        assert!(loaded.rejected[0].to_string().contains("median"));
    }

    #[test]
    fn rejects_non_finite_and_bad_trigger() {
        let configs = parse(
            r#"
            [[thresholds]]
            id = "nan-value"
            type = "relativeChange"
            ds_name = "ds"
            value = nan

            [[thresholds]]
            id = "negative-trigger"
            type = "low"
            ds_name = "ds"
            value = 10.0
            rearm = 20.0
            trigger = -1

            [[thresholds]]
            id = "inf-rearm"
            type = "high"
            ds_name = "ds"
            value = 10.0
            rearm = -inf
            "#,
        );
        let loaded = build_thresholds(&configs, &EventDefaults::default());
        assert!(loaded.thresholds.is_empty());
        assert_eq!(loaded.rejected.len(), 3);
        assert!(loaded
            .rejected
            .iter()
            .all(|e| matches!(e, ThresholdError::Configuration { .. })));
    }

    #[test]
    fn duplicate_ids_keep_the_first() {
        let configs = parse(
            r#"
            [[thresholds]]
            id = "dup"
            type = "absoluteChange"
            ds_name = "a"
            value = 5.0

            [[thresholds]]
            id = "dup"
            type = "absoluteChange"
            ds_name = "b"
            value = 5.0
            "#,
        );
        let loaded = build_thresholds(&configs, &EventDefaults::default());
        assert_eq!(loaded.thresholds.len(), 1);
        assert_eq!(loaded.thresholds[0].definition().ds_name, "a");
        assert_eq!(loaded.rejected.len(), 1);
    }

    #[test]
    fn configured_uei_wins_over_defaults() {
        let configs = parse(
            r#"
            [[thresholds]]
            id = "custom"
            type = "relativeChange"
            ds_name = "ds"
            value = 0.5
            triggered_uei = "uei.example.org/custom/relativeChange"
            "#,
        );
        let defaults = EventDefaults {
            relative_change_triggered: "uei.example.org/site-default".to_string(),
            ..EventDefaults::default()
        };
        let loaded = build_thresholds(&configs, &defaults);
        assert_eq!(
            loaded.thresholds[0].definition().triggered_uei(),
            "uei.example.org/custom/relativeChange"
        );
    }
}
