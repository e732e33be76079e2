use crate::definition::{ThresholdDefinition, ThresholdType};
use crate::error::Result;
use crate::event::EventBuilder;
use crate::{EvaluatorState, Status};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use threshd_common::types::{AlertEvent, CollectionResource};

/// Which side of the limit counts as exceeding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `high`: samples at or above `value` qualify, at or below `rearm` clear
    Above,
    /// `low`: samples at or below `value` qualify, at or above `rearm` clear
    Below,
}

impl Direction {
    fn check(self, sample: f64, limit: f64) -> bool {
        match self {
            Self::Above => sample >= limit,
            Self::Below => sample <= limit,
        }
    }

    fn rearmed(self, sample: f64, rearm: f64) -> bool {
        match self {
            Self::Above => sample <= rearm,
            Self::Below => sample >= rearm,
        }
    }
}

/// Count-based absolute limit with a hysteresis gap.
///
/// While armed, consecutive qualifying samples are counted and the state
/// triggers once when the count reaches `definition.trigger`. Any
/// non-qualifying sample resets the count. Once triggered, the state stays
/// quiet until a sample crosses the rearm bound, which reports
/// [`Status::ReArmed`] and arms it again. Samples between `rearm` and
/// `value` neither trigger nor clear.
pub struct HighLowState {
    definition: Arc<ThresholdDefinition>,
    direction: Direction,
    armed: bool,
    exceeded_count: u32,
    last_sample: Option<f64>,
}

impl HighLowState {
    pub fn new(definition: Arc<ThresholdDefinition>) -> Result<Self> {
        super::check_definition(&definition, &[ThresholdType::High, ThresholdType::Low])?;
        let direction = if definition.kind == ThresholdType::High {
            Direction::Above
        } else {
            Direction::Below
        };
        Ok(Self {
            definition,
            direction,
            armed: true,
            exceeded_count: 0,
            last_sample: None,
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn exceeded_count(&self) -> u32 {
        self.exceeded_count
    }
}

impl EvaluatorState for HighLowState {
    fn definition(&self) -> &ThresholdDefinition {
        &self.definition
    }

    fn evaluate(&mut self, value: f64) -> Status {
        self.last_sample = Some(value);

        if self.direction.check(value, self.definition.value) {
            if self.armed {
                self.exceeded_count += 1;
                if self.exceeded_count >= self.definition.trigger {
                    self.armed = false;
                    self.exceeded_count = 0;
                    return Status::Triggered;
                }
            }
            return Status::NoChange;
        }

        self.exceeded_count = 0;
        if !self.armed && self.direction.rearmed(value, self.definition.rearm) {
            self.armed = true;
            return Status::ReArmed;
        }
        Status::NoChange
    }

    fn event_for_state(
        &self,
        status: Status,
        timestamp: DateTime<Utc>,
        value: f64,
        resource: Option<&CollectionResource>,
    ) -> Option<AlertEvent> {
        let event = EventBuilder::for_status(&self.definition, status, timestamp, resource)?
            .value("value", value)
            .value("threshold", self.definition.value)
            .value("rearm", self.definition.rearm)
            .param("trigger", self.definition.trigger.to_string())
            .build();
        Some(event)
    }

    fn last_sample(&self) -> Option<f64> {
        self.last_sample
    }

    fn is_triggered(&self) -> bool {
        !self.armed
    }
}
