use crate::definition::ThresholdDefinition;
use crate::Status;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use threshd_common::types::{format_value, AlertEvent, CollectionResource, NO_INSTANCE};

/// Assembles outbound [`AlertEvent`]s.
///
/// [`EventBuilder::for_status`] fills in everything common to all threshold
/// kinds (identifier, datasource, instance, label); evaluator states then
/// add their kind-specific parameters.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use threshd_eval::definition::{ThresholdDefinition, ThresholdType};
/// use threshd_eval::event::EventBuilder;
/// use threshd_eval::Status;
///
/// let def = ThresholdDefinition::new("spike", ThresholdType::RelativeChange, "ifInOctets", 1.5);
/// let event = EventBuilder::for_status(&def, Status::Triggered, Utc::now(), None)
///     .unwrap()
///     .value("value", 30.0)
///     .build();
/// assert_eq!(event.param("value"), Some("30.0"));
/// assert_eq!(event.param("instance"), Some("null"));
/// assert_eq!(event.param("ds"), Some("ifInOctets"));
/// ```
#[derive(Debug, Clone)]
pub struct EventBuilder {
    uei: String,
    timestamp: DateTime<Utc>,
    threshold_id: String,
    ds_name: String,
    resource_id: Option<String>,
    params: BTreeMap<String, String>,
}

impl EventBuilder {
    /// Starts an event for `status`, or returns `None` for
    /// [`Status::NoChange`].
    pub fn for_status(
        definition: &ThresholdDefinition,
        status: Status,
        timestamp: DateTime<Utc>,
        resource: Option<&CollectionResource>,
    ) -> Option<Self> {
        let uei = match status {
            Status::NoChange => return None,
            Status::Triggered => definition.triggered_uei(),
            Status::ReArmed => definition.rearmed_uei(),
        };

        let instance = resource.map_or(NO_INSTANCE, CollectionResource::instance_label);
        let mut builder = Self {
            uei: uei.to_string(),
            timestamp,
            threshold_id: definition.id.clone(),
            ds_name: definition.ds_name.clone(),
            resource_id: resource.map(|r| r.id.clone()),
            params: BTreeMap::new(),
        }
        .param("ds", &definition.ds_name)
        .param("instance", instance);

        if let Some(label) = &definition.description {
            builder = builder.param("label", label);
        }
        Some(builder)
    }

    pub fn param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    /// Adds a numeric parameter rendered with [`format_value`].
    pub fn value(self, name: &str, value: f64) -> Self {
        self.param(name, format_value(value))
    }

    /// Adds a numeric parameter that may be unknown; an absent value is
    /// rendered as `NaN`.
    pub fn optional_value(self, name: &str, value: Option<f64>) -> Self {
        self.value(name, value.unwrap_or(f64::NAN))
    }

    pub fn build(self) -> AlertEvent {
        AlertEvent {
            uei: self.uei,
            timestamp: self.timestamp,
            threshold_id: self.threshold_id,
            ds_name: self.ds_name,
            resource_id: self.resource_id,
            params: self.params,
        }
    }
}
