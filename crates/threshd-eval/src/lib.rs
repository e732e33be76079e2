//! Threshold evaluation engine for per-(resource, datasource) sample streams.
//!
//! The engine keeps one [`EvaluatorState`] per (resource, datasource,
//! definition) key and feeds every incoming sample through it. A state
//! reports a [`Status`] for each sample; triggered and rearmed statuses are
//! turned into [`AlertEvent`]s and forwarded to an [`sink::EventSink`].
//! Built-in evaluator kinds are high, low, relative change, absolute change
//! and rearming absolute change.

pub mod definition;
pub mod engine;
pub mod error;
pub mod event;
pub mod kinds;
pub mod loader;
pub mod sink;


use chrono::{DateTime, Utc};
use serde::Serialize;
use threshd_common::types::{AlertEvent, CollectionResource};

use crate::definition::ThresholdDefinition;

pub use error::{Result, SinkError, ThresholdError};

/// Outcome of evaluating one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    NoChange,
    Triggered,
    ReArmed,
}

impl Status {
    /// Whether this status should produce an outbound event.
    pub fn is_event_worthy(self) -> bool {
        !matches!(self, Status::NoChange)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::NoChange => write!(f, "NO_CHANGE"),
            Status::Triggered => write!(f, "TRIGGERED"),
            Status::ReArmed => write!(f, "RE-ARMED"),
        }
    }
}

/// Mutable evaluation memory for one (resource, datasource, definition) key.
///
/// Each threshold kind provides its own implementation, created through the
/// factory selected when the definition is loaded (see
/// [`kinds::factory_for`]). The engine owns every state exclusively and
/// never shares one between keys.
pub trait EvaluatorState: Send {
    /// The definition this state evaluates against.
    fn definition(&self) -> &ThresholdDefinition;

    /// Folds a new sample value into the state and reports the resulting
    /// status.
    fn evaluate(&mut self, value: f64) -> Status;

    /// Projects an already computed status into an outbound event.
    ///
    /// Returns `None` for [`Status::NoChange`]. Never mutates the state, so
    /// repeated calls with the same arguments produce identical events.
    fn event_for_state(
        &self,
        status: Status,
        timestamp: DateTime<Utc>,
        value: f64,
        resource: Option<&CollectionResource>,
    ) -> Option<AlertEvent>;

    /// The most recent sample value seen, if any.
    fn last_sample(&self) -> Option<f64>;

    /// Whether the condition is currently considered active.
    fn is_triggered(&self) -> bool;
}
