use crate::definition::{ThresholdDefinition, ThresholdType};
use crate::error::Result;
use crate::event::EventBuilder;
use crate::{EvaluatorState, Status};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use threshd_common::types::{AlertEvent, CollectionResource};

/// Detects a fixed-size move between two consecutive samples.
///
/// A positive `definition.value` triggers when `new - last >= value`, a
/// negative one when `new - last <= value`.
pub struct AbsoluteChangeState {
    definition: Arc<ThresholdDefinition>,
    last_sample: Option<f64>,
    previous_triggering_sample: Option<f64>,
    triggered: bool,
}

impl AbsoluteChangeState {
    pub fn new(definition: Arc<ThresholdDefinition>) -> Result<Self> {
        super::check_definition(&definition, &[ThresholdType::AbsoluteChange])?;
        Ok(Self {
            definition,
            last_sample: None,
            previous_triggering_sample: None,
            triggered: false,
        })
    }

    pub fn change(&self) -> f64 {
        self.definition.value
    }
}

impl EvaluatorState for AbsoluteChangeState {
    fn definition(&self) -> &ThresholdDefinition {
        &self.definition
    }

    fn evaluate(&mut self, value: f64) -> Status {
        let Some(last) = self.last_sample.replace(value) else {
            self.triggered = false;
            return Status::NoChange;
        };

        let delta = value - last;
        let change = self.change();
        let exceeded = if change < 0.0 {
            delta <= change
        } else {
            delta >= change
        };

        if exceeded {
            self.previous_triggering_sample = Some(last);
        }
        self.triggered = exceeded;
        if exceeded {
            Status::Triggered
        } else {
            Status::NoChange
        }
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
            .value("changeThreshold", self.change())
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
