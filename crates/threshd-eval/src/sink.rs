use crate::error::SinkError;
use std::sync::Mutex;
use threshd_common::types::{format_params, AlertEvent};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Receiver of the alert events produced by the engine.
///
/// Delivery is fire-and-forget with respect to evaluation: the engine has
/// already committed the state transition when `send` is called, and a
/// failure is only reported back to the caller. Implementations must not
/// block on I/O.
pub trait EventSink: Send + Sync {
    /// Hands one event to the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink can no longer accept events.
    fn send(&self, event: &AlertEvent) -> Result<(), SinkError>;

    /// Returns the sink type name (e.g., `"tracing"`, `"channel"`).
    fn sink_name(&self) -> &str;
}

/// Logs every event at `info` level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn send(&self, event: &AlertEvent) -> Result<(), SinkError> {
        tracing::info!(
            uei = %event.uei,
            threshold_id = %event.threshold_id,
            ds = %event.ds_name,
            resource_id = event.resource_id.as_deref().unwrap_or("-"),
            params = %format_params(&event.params),
            "Threshold event"
        );
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "tracing"
    }
}

/// Forwards events into an unbounded tokio channel for an async consumer.
///
/// # Examples
///
/// ```
/// use threshd_eval::sink::{ChannelSink, EventSink};
///
/// let (sink, rx) = ChannelSink::new();
/// drop(rx);
/// # let event = threshd_common::types::AlertEvent {
/// #     uei: "uei".into(), timestamp: chrono::Utc::now(), threshold_id: "t".into(),
/// #     ds_name: "ds".into(), resource_id: None, params: Default::default(),
/// # };
/// assert!(sink.send(&event).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<AlertEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<AlertEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn send(&self, event: &AlertEvent) -> Result<(), SinkError> {
        self.tx.send(event.clone()).map_err(|_| SinkError::Closed)
    }

    fn sink_name(&self) -> &str {
        "channel"
    }
}

/// Keeps every event in memory, in delivery order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AlertEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AlertEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Drains and returns the collected events.
    pub fn take(&self) -> Vec<AlertEvent> {
        std::mem::take(
            &mut *self
                .events
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemorySink {
    fn send(&self, event: &AlertEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "memory"
    }
}
