use crate::definition::{ThresholdDefinition, ThresholdType};
use crate::error::Result;
use crate::event::EventBuilder;
use crate::{EvaluatorState, Status};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use threshd_common::types::{AlertEvent, CollectionResource};

/// Absolute change in either direction that clears itself after a quiet
/// period.
///
/// Triggers when `|new - last| >= |value|`. While triggered, every sample
/// that does not move by that much counts toward `definition.trigger`; when
/// the count is reached the state reports [`Status::ReArmed`]. A further
/// large move while triggered restarts the count without re-triggering.
pub struct RearmingAbsoluteChangeState {
    definition: Arc<ThresholdDefinition>,
    last_sample: Option<f64>,
    previous_triggering_sample: Option<f64>,
    triggered: bool,
    quiet_count: u32,
}

impl RearmingAbsoluteChangeState {
    pub fn new(definition: Arc<ThresholdDefinition>) -> Result<Self> {
        super::check_definition(&definition, &[ThresholdType::RearmingAbsoluteChange])?;
        Ok(Self {
            definition,
            last_sample: None,
            previous_triggering_sample: None,
            triggered: false,
            quiet_count: 0,
        })
    }

    fn moved(&self, last: f64, value: f64) -> bool {
        (value - last).abs() >= self.definition.value.abs()
    }
}

impl EvaluatorState for RearmingAbsoluteChangeState {
    fn definition(&self) -> &ThresholdDefinition {
        &self.definition
    }

    fn evaluate(&mut self, value: f64) -> Status {
        let baseline = self.last_sample.replace(value);

        if let Some(last) = baseline.filter(|last| self.moved(*last, value)) {
            self.previous_triggering_sample = Some(last);
            self.quiet_count = 0;
            if self.triggered {
                return Status::NoChange;
            }
            self.triggered = true;
            return Status::Triggered;
        }

        if self.triggered {
            self.quiet_count += 1;
            if self.quiet_count >= self.definition.trigger {
                self.triggered = false;
                self.quiet_count = 0;
                return Status::ReArmed;
            }
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
            .optional_value("previousValue", self.previous_triggering_sample)
            .value("changeThreshold", self.definition.value)
            .param("trigger", self.definition.trigger.to_string())
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
