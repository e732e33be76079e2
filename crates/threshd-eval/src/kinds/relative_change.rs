use crate::definition::{ThresholdDefinition, ThresholdType};
use crate::error::Result;
use crate::event::EventBuilder;
use crate::{EvaluatorState, Status};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use threshd_common::types::{AlertEvent, CollectionResource};

/// Detects a proportional jump or drop between two consecutive samples.
///
/// `definition.value` is the multiplier: below `1.0` it is a decrease
/// threshold (`new / last <= value`), otherwise an increase threshold
/// (`new / last >= value`). Every sample becomes the baseline for the next
/// one. A zero baseline cannot be compared against and is replaced without
/// triggering.
pub struct RelativeChangeState {
    definition: Arc<ThresholdDefinition>,
    last_sample: Option<f64>,
    /// Baseline that the most recent triggering sample was compared against
    previous_triggering_sample: Option<f64>,
    triggered: bool,
}

impl RelativeChangeState {
    pub fn new(definition: Arc<ThresholdDefinition>) -> Result<Self> {
        super::check_definition(&definition, &[ThresholdType::RelativeChange])?;
        Ok(Self {
            definition,
            last_sample: None,
            previous_triggering_sample: None,
            triggered: false,
        })
    }

    pub fn multiplier(&self) -> f64 {
        self.definition.value
    }

    fn exceeded(&self, ratio: f64) -> bool {
        let multiplier = self.multiplier();
        if multiplier < 1.0 {
            ratio <= multiplier
        } else {
            ratio >= multiplier
        }
    }
}

impl EvaluatorState for RelativeChangeState {
    fn definition(&self) -> &ThresholdDefinition {
        &self.definition
    }

    fn evaluate(&mut self, value: f64) -> Status {
        let baseline = self.last_sample.replace(value);

        let status = match baseline {
            Some(last) if last != 0.0 => {
                if self.exceeded(value / last) {
                    self.previous_triggering_sample = Some(last);
                    Status::Triggered
                } else {
                    Status::NoChange
                }
            }
            // no baseline yet, or a zero baseline: rebaseline only
            _ => Status::NoChange,
        };

        self.triggered = status == Status::Triggered;
        status
    }

    fn event_for_state(
        &self,
        status: Status,
        timestamp: DateTime<Utc>,
        value: f64,
        resource: Option<&CollectionResource>,
    ) -> Option<AlertEvent> {
        if status != Status::Triggered {
            return None;
        }
        let event = EventBuilder::for_status(&self.definition, status, timestamp, resource)?
            .value("value", value)
            .optional_value("previousValue", self.previous_triggering_sample)
            .value("multiplier", self.multiplier())
            .build();
        Some(event)
    }

    fn last_sample(&self) -> Option<f64> {
        self.last_sample
    }

    fn is_triggered(&self) -> bool {
        self.triggered
    }
}
