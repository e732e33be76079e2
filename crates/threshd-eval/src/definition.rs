use crate::error::{Result, ThresholdError};
use crate::kinds::{self, StateFactory};
use crate::EvaluatorState;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

pub const HIGH_THRESHOLD_UEI: &str = "uei.opennms.org/threshold/highThresholdExceeded";
pub const HIGH_THRESHOLD_REARM_UEI: &str = "uei.opennms.org/threshold/highThresholdRearmed";
pub const LOW_THRESHOLD_UEI: &str = "uei.opennms.org/threshold/lowThresholdExceeded";
pub const LOW_THRESHOLD_REARM_UEI: &str = "uei.opennms.org/threshold/lowThresholdRearmed";
pub const RELATIVE_CHANGE_UEI: &str = "uei.opennms.org/threshold/relativeChangeExceeded";
pub const ABSOLUTE_CHANGE_UEI: &str = "uei.opennms.org/threshold/absoluteChangeExceeded";
pub const REARMING_ABSOLUTE_CHANGE_UEI: &str =
    "uei.opennms.org/threshold/rearmingAbsoluteChangeExceeded";
pub const REARMING_ABSOLUTE_CHANGE_REARM_UEI: &str =
    "uei.opennms.org/threshold/rearmingAbsoluteChangeRearmed";

/// Evaluator kind of a threshold definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdType {
    High,
    Low,
    RelativeChange,
    AbsoluteChange,
    RearmingAbsoluteChange,
}

impl FromStr for ThresholdType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "high" => Ok(Self::High),
            "low" => Ok(Self::Low),
            "relativeChange" => Ok(Self::RelativeChange),
            "absoluteChange" => Ok(Self::AbsoluteChange),
            "rearmingAbsoluteChange" | "rearm" => Ok(Self::RearmingAbsoluteChange),
            _ => Err(format!("unknown threshold type '{s}'")),
        }
    }
}

impl std::fmt::Display for ThresholdType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Low => write!(f, "low"),
            Self::RelativeChange => write!(f, "relativeChange"),
            Self::AbsoluteChange => write!(f, "absoluteChange"),
            Self::RearmingAbsoluteChange => write!(f, "rearmingAbsoluteChange"),
        }
    }
}

impl ThresholdType {
    /// Kinds that wait for `trigger` consecutive samples before changing
    /// status. The others decide on a single sample-to-sample comparison.
    pub fn is_count_based(self) -> bool {
        matches!(self, Self::High | Self::Low | Self::RearmingAbsoluteChange)
    }

    pub fn default_triggered_uei(self) -> &'static str {
        match self {
            Self::High => HIGH_THRESHOLD_UEI,
            Self::Low => LOW_THRESHOLD_UEI,
            Self::RelativeChange => RELATIVE_CHANGE_UEI,
            Self::AbsoluteChange => ABSOLUTE_CHANGE_UEI,
            Self::RearmingAbsoluteChange => REARMING_ABSOLUTE_CHANGE_UEI,
        }
    }

    /// `None` for kinds that never report a rearm.
    pub fn default_rearmed_uei(self) -> Option<&'static str> {
        match self {
            Self::High => Some(HIGH_THRESHOLD_REARM_UEI),
            Self::Low => Some(LOW_THRESHOLD_REARM_UEI),
            Self::RearmingAbsoluteChange => Some(REARMING_ABSOLUTE_CHANGE_REARM_UEI),
            Self::RelativeChange | Self::AbsoluteChange => None,
        }
    }
}

/// Process-wide default event identifiers, loaded once at startup and
/// injected into every definition that does not override them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventDefaults {
    pub high_triggered: String,
    pub high_rearmed: String,
    pub low_triggered: String,
    pub low_rearmed: String,
    pub relative_change_triggered: String,
    pub absolute_change_triggered: String,
    pub rearming_absolute_change_triggered: String,
    pub rearming_absolute_change_rearmed: String,
}

impl Default for EventDefaults {
    fn default() -> Self {
        Self {
            high_triggered: HIGH_THRESHOLD_UEI.to_string(),
            high_rearmed: HIGH_THRESHOLD_REARM_UEI.to_string(),
            low_triggered: LOW_THRESHOLD_UEI.to_string(),
            low_rearmed: LOW_THRESHOLD_REARM_UEI.to_string(),
            relative_change_triggered: RELATIVE_CHANGE_UEI.to_string(),
            absolute_change_triggered: ABSOLUTE_CHANGE_UEI.to_string(),
            rearming_absolute_change_triggered: REARMING_ABSOLUTE_CHANGE_UEI.to_string(),
            rearming_absolute_change_rearmed: REARMING_ABSOLUTE_CHANGE_REARM_UEI.to_string(),
        }
    }
}

impl EventDefaults {
    pub fn triggered_uei(&self, kind: ThresholdType) -> &str {
        match kind {
            ThresholdType::High => &self.high_triggered,
            ThresholdType::Low => &self.low_triggered,
            ThresholdType::RelativeChange => &self.relative_change_triggered,
            ThresholdType::AbsoluteChange => &self.absolute_change_triggered,
            ThresholdType::RearmingAbsoluteChange => &self.rearming_absolute_change_triggered,
        }
    }

    pub fn rearmed_uei(&self, kind: ThresholdType) -> Option<&str> {
        match kind {
            ThresholdType::High => Some(&self.high_rearmed),
            ThresholdType::Low => Some(&self.low_rearmed),
            ThresholdType::RearmingAbsoluteChange => Some(&self.rearming_absolute_change_rearmed),
            ThresholdType::RelativeChange | ThresholdType::AbsoluteChange => None,
        }
    }
}

/// Immutable description of one threshold rule.
///
/// `rearm` defaults to `value`, which leaves high and low thresholds without
/// a hysteresis gap.
///
/// The meaning of `value` and `rearm` depends on `kind`: a limit for high and
/// low, a multiplier for relative change, a delta for the absolute change
/// kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdDefinition {
    pub id: String,
    pub kind: ThresholdType,
    pub ds_name: String,
    pub ds_type: String,
    pub value: f64,
    pub rearm: f64,
    pub trigger: u32,
    pub triggered_uei: Option<String>,
    pub rearmed_uei: Option<String>,
    /// Glob over resource ids this definition applies to
    pub resource_pattern: String,
    pub description: Option<String>,
}

impl ThresholdDefinition {
    pub fn new(
        id: impl Into<String>,
        kind: ThresholdType,
        ds_name: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            ds_name: ds_name.into(),
            ds_type: String::new(),
            value,
            rearm: value,
            trigger: 1,
            triggered_uei: None,
            rearmed_uei: None,
            resource_pattern: "*".to_string(),
            description: None,
        }
    }

    pub fn with_ds_type(mut self, ds_type: impl Into<String>) -> Self {
        self.ds_type = ds_type.into();
        self
    }

    pub fn with_rearm(mut self, rearm: f64) -> Self {
        self.rearm = rearm;
        self
    }

    pub fn with_trigger(mut self, trigger: u32) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_triggered_uei(mut self, uei: impl Into<String>) -> Self {
        self.triggered_uei = Some(uei.into());
        self
    }

    pub fn with_rearmed_uei(mut self, uei: impl Into<String>) -> Self {
        self.rearmed_uei = Some(uei.into());
        self
    }

    pub fn with_resource_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.resource_pattern = pattern.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Fills unset event identifiers from the process-wide defaults.
    pub fn with_event_defaults(mut self, defaults: &EventDefaults) -> Self {
        if self.triggered_uei.is_none() {
            self.triggered_uei = Some(defaults.triggered_uei(self.kind).to_string());
        }
        if self.rearmed_uei.is_none() {
            self.rearmed_uei = defaults.rearmed_uei(self.kind).map(str::to_string);
        }
        self
    }

    pub fn triggered_uei(&self) -> &str {
        self.triggered_uei
            .as_deref()
            .unwrap_or_else(|| self.kind.default_triggered_uei())
    }

    /// Falls back to the triggered identifier for kinds without a rearm
    /// default; those kinds never report [`crate::Status::ReArmed`].
    pub fn rearmed_uei(&self) -> &str {
        self.rearmed_uei
            .as_deref()
            .or_else(|| self.kind.default_rearmed_uei())
            .unwrap_or_else(|| self.triggered_uei())
    }

    /// Checks the numeric and identity invariants of the definition.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(ThresholdError::config(&self.id, "id must not be empty"));
        }
        if self.ds_name.trim().is_empty() {
            return Err(ThresholdError::config(&self.id, "ds_name must not be empty"));
        }
        if self.resource_pattern.is_empty() {
            return Err(ThresholdError::config(
                &self.id,
                "resource_pattern must not be empty",
            ));
        }
        if !self.value.is_finite() {
            return Err(ThresholdError::config(
                &self.id,
                format!("value must be finite, got {}", self.value),
            ));
        }
        if !self.rearm.is_finite() {
            return Err(ThresholdError::config(
                &self.id,
                format!("rearm must be finite, got {}", self.rearm),
            ));
        }
        if self.kind.is_count_based() && self.trigger < 1 {
            return Err(ThresholdError::config(
                &self.id,
                format!("trigger must be at least 1 for {} thresholds", self.kind),
            ));
        }
        match self.kind {
            ThresholdType::High if self.rearm > self.value => Err(ThresholdError::config(
                &self.id,
                format!(
                    "high threshold rearm {} is above value {}",
                    self.rearm, self.value
                ),
            )),
            ThresholdType::Low if self.rearm < self.value => Err(ThresholdError::config(
                &self.id,
                format!(
                    "low threshold rearm {} is below value {}",
                    self.rearm, self.value
                ),
            )),
            ThresholdType::AbsoluteChange | ThresholdType::RearmingAbsoluteChange
                if self.value == 0.0 =>
            {
                Err(ThresholdError::config(
                    &self.id,
                    "change threshold value must not be zero",
                ))
            }
            _ => Ok(()),
        }
    }
}

/// A validated definition together with the state factory for its kind.
///
/// The factory is resolved once here so the engine never switches on the
/// threshold type per sample.
#[derive(Clone)]
pub struct Threshold {
    definition: Arc<ThresholdDefinition>,
    factory: StateFactory,
}

impl Threshold {
    pub fn new(definition: ThresholdDefinition) -> Result<Self> {
        definition.validate()?;
        let factory = kinds::factory_for(definition.kind);
        Ok(Self {
            definition: Arc::new(definition),
            factory,
        })
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn definition(&self) -> &ThresholdDefinition {
        &self.definition
    }

    pub fn applies_to(&self, resource_id: &str) -> bool {
        let pattern = self.definition.resource_pattern.as_str();
        pattern == "*" || glob_match::glob_match(pattern, resource_id)
    }

    /// Creates a fresh evaluator state with no baseline.
    pub fn new_state(&self) -> Result<Box<dyn EvaluatorState>> {
        (self.factory)(Arc::clone(&self.definition))
    }
}

impl std::fmt::Debug for Threshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Threshold")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_parses_config_names() {
        assert_eq!("relativeChange".parse::<ThresholdType>(), Ok(ThresholdType::RelativeChange));
        assert_eq!("rearm".parse::<ThresholdType>(), Ok(ThresholdType::RearmingAbsoluteChange));
        assert_eq!(
            ThresholdType::RearmingAbsoluteChange.to_string(),
            "rearmingAbsoluteChange"
        );
        assert!("median".parse::<ThresholdType>().is_err());
    }

    #[test]
    fn test_event_defaults_only_fill_missing_ueis() {
        let defaults = EventDefaults {
            high_triggered: "uei.example.org/high".to_string(),
            ..EventDefaults::default()
        };
        let def = ThresholdDefinition::new("cpu-high", ThresholdType::High, "cpu", 90.0)
            .with_rearmed_uei("uei.example.org/custom-rearm")
            .with_event_defaults(&defaults);

        assert_eq!(def.triggered_uei(), "uei.example.org/high");
        assert_eq!(def.rearmed_uei(), "uei.example.org/custom-rearm");
    }

    #[test]
    fn test_uei_fallbacks_without_injection() {
        let def =
            ThresholdDefinition::new("spike", ThresholdType::RelativeChange, "ifInOctets", 1.5);
        assert_eq!(def.triggered_uei(), RELATIVE_CHANGE_UEI);
        assert_eq!(def.rearmed_uei(), RELATIVE_CHANGE_UEI);

        let low =
            ThresholdDefinition::new("disk-low", ThresholdType::Low, "free", 10.0).with_rearm(15.0);
        assert_eq!(low.rearmed_uei(), LOW_THRESHOLD_REARM_UEI);
    }

    #[test]
    fn test_validate_rejects_bad_numbers() {
        let nan = ThresholdDefinition::new("a", ThresholdType::RelativeChange, "ds", f64::NAN);
        assert!(matches!(nan.validate(), Err(ThresholdError::Configuration { .. })));

        let inf_rearm = ThresholdDefinition::new("b", ThresholdType::High, "ds", 10.0)
            .with_rearm(f64::INFINITY);
        assert!(inf_rearm.validate().is_err());

        let zero_trigger =
            ThresholdDefinition::new("c", ThresholdType::High, "ds", 10.0).with_trigger(0);
        assert!(zero_trigger.validate().is_err());

        // trigger is not consulted by relative change
        let relative =
            ThresholdDefinition::new("d", ThresholdType::RelativeChange, "ds", 0.9).with_trigger(0);
        assert!(relative.validate().is_ok());
    }

    #[test]
    fn test_default_rearm_is_valid_for_both_directions() {
        let low = ThresholdDefinition::new("disk-low", ThresholdType::Low, "freePercent", 10.0);
        assert_eq!(low.rearm, 10.0);
        assert!(low.validate().is_ok());

        let high = ThresholdDefinition::new("cpu-high", ThresholdType::High, "cpu", 90.0);
        assert!(high.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_hysteresis() {
        let high = ThresholdDefinition::new("h", ThresholdType::High, "ds", 80.0).with_rearm(90.0);
        assert!(high.validate().is_err());

        let low = ThresholdDefinition::new("l", ThresholdType::Low, "ds", 20.0).with_rearm(10.0);
        assert!(low.validate().is_err());

        let ok = ThresholdDefinition::new("h2", ThresholdType::High, "ds", 80.0).with_rearm(70.0);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_applies_to_matches_glob() {
        let threshold = Threshold::new(
            ThresholdDefinition::new("t", ThresholdType::High, "cpu", 90.0)
                .with_rearm(80.0)
                .with_resource_pattern("web-*"),
        )
        .unwrap();
        assert!(threshold.applies_to("web-01"));
        assert!(!threshold.applies_to("db-01"));
    }
}
