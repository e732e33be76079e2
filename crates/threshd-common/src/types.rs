use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value of the `instance` event parameter when no instance label is known.
pub const NO_INSTANCE: &str = "null";

/// The monitored entity a sample was collected for.
///
/// `id` identifies the resource in the evaluator registry; `instance` is the
/// optional sub-instance label (interface name, mount point, ...) reported
/// back in alert events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionResource {
    pub id: String,
    #[serde(default)]
    pub instance: Option<String>,
}

impl CollectionResource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            instance: None,
        }
    }

    pub fn with_instance(id: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            instance: Some(instance.into()),
        }
    }

    /// The instance label, or [`NO_INSTANCE`] when the resource has none.
    ///
    /// # Examples
    ///
    /// ```
    /// use threshd_common::types::{CollectionResource, NO_INSTANCE};
    ///
    /// assert_eq!(CollectionResource::with_instance("node-1", "eth0").instance_label(), "eth0");
    /// assert_eq!(CollectionResource::new("node-1").instance_label(), NO_INSTANCE);
    /// ```
    pub fn instance_label(&self) -> &str {
        self.instance.as_deref().unwrap_or(NO_INSTANCE)
    }
}

/// One collected value for a (resource, datasource) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }

    pub fn now(value: f64) -> Self {
        Self::new(Utc::now(), value)
    }
}

/// Outbound alert record handed to the event sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Event identifier the sink classifies the event by
    pub uei: String,
    pub timestamp: DateTime<Utc>,
    /// Definition that produced the event
    pub threshold_id: String,
    pub ds_name: String,
    /// Resource the sample belonged to, when one was supplied
    pub resource_id: Option<String>,
    pub params: BTreeMap<String, String>,
}

impl AlertEvent {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Render a sample value the way event parameters carry it: the decimal
/// point is always present, so `10.0` stays `"10.0"`. Magnitudes below
/// `1e-3` or from `1e7` up use scientific notation with an upper-case `E`
/// and a mantissa that always has a fraction (`1.0E16`, `2.5E-7`).
///
/// # Examples
///
/// ```
/// use threshd_common::types::format_value;
///
/// assert_eq!(format_value(10.0), "10.0");
/// assert_eq!(format_value(1.1), "1.1");
/// assert_eq!(format_value(-12.5), "-12.5");
/// assert_eq!(format_value(1e16), "1.0E16");
/// assert_eq!(format_value(2.5e-7), "2.5E-7");
/// assert_eq!(format_value(f64::NAN), "NaN");
/// ```
pub fn format_value(value: f64) -> String {
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = value.abs();
    if magnitude == 0.0 || (1e-3..1e7).contains(&magnitude) || value.is_nan() {
        return format!("{value:?}");
    }

    let scientific = format!("{value:E}");
    match scientific.split_once('E') {
        Some((mantissa, exponent)) if !mantissa.contains('.') => {
            format!("{mantissa}.0E{exponent}")
        }
        _ => scientific,
    }
}

/// Format event parameters into a human-readable string.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use threshd_common::types::format_params;
///
/// let mut params = BTreeMap::new();
/// params.insert("value".to_string(), "10.0".to_string());
/// params.insert("instance".to_string(), "eth0".to_string());
/// assert_eq!(format_params(&params), "instance=eth0, value=10.0");
/// ```
pub fn format_params(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}
