use crate::Status;

/// Errors raised while loading definitions or evaluating samples.
///
/// # Examples
///
/// ```rust
/// use threshd_eval::error::ThresholdError;
///
/// let err = ThresholdError::Configuration {
///     id: "if-spike".to_string(),
///     reason: "unknown threshold type 'median'".to_string(),
/// };
/// assert!(err.to_string().contains("if-spike"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ThresholdError {
    /// An evaluator or the engine was handed an argument it cannot use
    /// (wrong definition kind, non-finite sample value).
    #[error("Threshold: invalid argument: {0}")]
    InvalidArgument(String),

    /// A definition was rejected at load time. Only that definition is
    /// affected; the rest of the set keeps evaluating.
    #[error("Threshold: invalid definition '{id}': {reason}")]
    Configuration { id: String, reason: String },

    /// The state transition was committed but the event sink refused the
    /// resulting event.
    #[error("Threshold: {status} event '{uei}' could not be delivered: {source}")]
    Delivery {
        status: Status,
        uei: String,
        #[source]
        source: SinkError,
    },
}

impl ThresholdError {
    pub(crate) fn config(id: &str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors returned by [`crate::sink::EventSink`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The receiving side of the sink has gone away.
    #[error("Sink: receiver closed")]
    Closed,

    #[error("Sink: {0}")]
    Other(String),
}

/// Convenience `Result` alias for evaluation operations.
pub type Result<T> = std::result::Result<T, ThresholdError>;
