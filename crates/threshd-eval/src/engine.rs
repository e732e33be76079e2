use crate::definition::Threshold;
use crate::error::{Result, ThresholdError};
use crate::sink::EventSink;
use crate::{EvaluatorState, Status};
use dashmap::DashMap;
use std::sync::{Arc, Mutex, RwLock};
use threshd_common::types::{AlertEvent, CollectionResource, Sample};

/// Registry key of one evaluator state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EvaluatorKey {
    pub resource_id: String,
    pub ds_name: String,
    pub threshold_id: String,
}

impl EvaluatorKey {
    pub fn new(resource_id: &str, threshold: &Threshold) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            ds_name: threshold.definition().ds_name.clone(),
            threshold_id: threshold.id().to_string(),
        }
    }
}

/// Result of evaluating one sample against one threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub threshold_id: String,
    pub status: Status,
    /// The event handed to the sink, if the status was event-worthy
    pub event: Option<AlertEvent>,
}

/// Per-key state cell. The mutex serializes samples for one key; distinct
/// keys never contend on it.
type StateCell = Arc<Mutex<Box<dyn EvaluatorState>>>;

/// Routes samples to per-(resource, datasource, threshold) evaluator states
/// and forwards the resulting events to an [`EventSink`].
///
/// All methods take `&self`; the engine can be shared across threads behind
/// an `Arc`. Samples for different keys evaluate concurrently, samples for
/// the same key are applied one at a time in the order their callers acquire
/// the key.
pub struct ThresholdEngine {
    thresholds: RwLock<Vec<Arc<Threshold>>>,
    states: DashMap<EvaluatorKey, StateCell>,
    sink: Arc<dyn EventSink>,
}

impl ThresholdEngine {
    pub fn new(thresholds: Vec<Threshold>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            thresholds: RwLock::new(thresholds.into_iter().map(Arc::new).collect()),
            states: DashMap::new(),
            sink,
        }
    }

    pub fn thresholds(&self) -> Vec<Arc<Threshold>> {
        self.read_thresholds().clone()
    }

    /// Get a threshold by its ID.
    pub fn get_threshold(&self, id: &str) -> Option<Arc<Threshold>> {
        self.read_thresholds().iter().find(|t| t.id() == id).cloned()
    }

    /// Add a threshold at runtime. An existing threshold with the same ID is
    /// replaced; its states are dropped if the definition changed.
    pub fn add_threshold(&self, threshold: Threshold) {
        let mut thresholds = self.write_thresholds();
        if let Some(pos) = thresholds.iter().position(|t| t.id() == threshold.id()) {
            let old = thresholds.remove(pos);
            if old.definition() != threshold.definition() {
                self.drop_states_for_threshold(old.id());
            }
        }
        thresholds.push(Arc::new(threshold));
    }

    /// Remove a threshold and all of its evaluator states. Returns true if
    /// found and removed.
    pub fn remove_definition(&self, id: &str) -> bool {
        let mut thresholds = self.write_thresholds();
        let len_before = thresholds.len();
        thresholds.retain(|t| t.id() != id);
        let removed = thresholds.len() < len_before;
        // Dropped under the write lock so no sample can recreate a state
        // for `id` in between.
        let dropped = self.drop_states_for_threshold(id);
        drop(thresholds);

        if removed || dropped > 0 {
            tracing::info!(threshold_id = id, dropped_states = dropped, "Threshold removed");
        }
        removed
    }

    /// Drop every evaluator state of a resource. Returns the number of states
    /// dropped.
    pub fn remove_resource(&self, resource_id: &str) -> usize {
        let before = self.states.len();
        self.states.retain(|key, _| key.resource_id != resource_id);
        let dropped = before.saturating_sub(self.states.len());
        tracing::debug!(resource_id, dropped_states = dropped, "Resource removed");
        dropped
    }

    /// Replace all thresholds with a new set.
    ///
    /// States of thresholds whose definition is unchanged survive; states of
    /// changed or removed thresholds are dropped so they restart from an
    /// empty baseline.
    pub fn replace_definitions(&self, thresholds: Vec<Threshold>) {
        let mut current = self.write_thresholds();
        let next: Vec<Arc<Threshold>> = thresholds.into_iter().map(Arc::new).collect();

        let before = self.states.len();
        self.states.retain(|key, _| {
            let old = current.iter().find(|t| t.id() == key.threshold_id);
            let new = next.iter().find(|t| t.id() == key.threshold_id);
            matches!((old, new), (Some(old), Some(new)) if old.definition() == new.definition())
        });
        let dropped = before.saturating_sub(self.states.len());

        *current = next;
        tracing::info!(
            threshold_count = current.len(),
            dropped_states = dropped,
            "Threshold definitions replaced"
        );
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn has_state(&self, key: &EvaluatorKey) -> bool {
        self.states.contains_key(key)
    }

    /// Whether the state for `key` currently considers its condition active.
    pub fn is_triggered(&self, key: &EvaluatorKey) -> bool {
        let Some(cell) = self.states.get(key).map(|c| Arc::clone(c.value())) else {
            return false;
        };
        let triggered = lock_state(&cell).is_triggered();
        triggered
    }

    /// Evaluate one sample against one threshold.
    ///
    /// `threshold` must be loaded in the engine with an identical definition,
    /// otherwise [`ThresholdError::InvalidArgument`] is returned and no state
    /// is created. The state for (resource, datasource, threshold) is created
    /// on first use. An event-worthy status builds an event and forwards it to the
    /// sink; the state is updated before delivery, so a delivery failure
    /// (reported as [`ThresholdError::Delivery`]) never rolls it back.
    pub fn submit_sample(
        &self,
        resource: &CollectionResource,
        threshold: &Threshold,
        sample: &Sample,
    ) -> Result<Evaluation> {
        if !sample.value.is_finite() {
            return Err(ThresholdError::InvalidArgument(format!(
                "sample value for '{}' on {} must be finite, got {}",
                threshold.definition().ds_name,
                resource.id,
                sample.value
            )));
        }

        let key = EvaluatorKey::new(&resource.id, threshold);
        let cell = {
            // Held until the state is in the map: removal and reload take the
            // write lock, so they either see the new state or make this fail.
            let thresholds = self.read_thresholds();
            match thresholds.iter().find(|t| t.id() == threshold.id()) {
                Some(loaded) if loaded.definition() == threshold.definition() => {}
                Some(_) => {
                    return Err(ThresholdError::InvalidArgument(format!(
                        "threshold '{}' differs from the loaded definition",
                        threshold.id()
                    )));
                }
                None => {
                    return Err(ThresholdError::InvalidArgument(format!(
                        "threshold '{}' is not loaded",
                        threshold.id()
                    )));
                }
            }
            self.state_cell(key, threshold)?
        };
        let mut state = lock_state(&cell);

        if state.definition() != threshold.definition() {
            tracing::debug!(
                threshold_id = threshold.id(),
                resource_id = %resource.id,
                "Threshold definition changed, resetting state"
            );
            *state = threshold.new_state()?;
        }

        let status = state.evaluate(sample.value);
        tracing::debug!(
            threshold_id = threshold.id(),
            resource_id = %resource.id,
            ds = %threshold.definition().ds_name,
            value = sample.value,
            %status,
            "Sample evaluated"
        );

        let event = state.event_for_state(status, sample.timestamp, sample.value, Some(resource));
        let evaluation = Evaluation {
            threshold_id: threshold.id().to_string(),
            status,
            event,
        };

        // Delivered under the key lock so events for one key reach the sink
        // in sample order.
        if let Some(event) = &evaluation.event {
            tracing::info!(
                threshold_id = threshold.id(),
                resource_id = %resource.id,
                uei = %event.uei,
                %status,
                "Threshold status changed"
            );
            if let Err(source) = self.sink.send(event) {
                tracing::warn!(
                    threshold_id = threshold.id(),
                    resource_id = %resource.id,
                    sink = self.sink.sink_name(),
                    error = %source,
                    "Event delivery failed"
                );
                return Err(ThresholdError::Delivery {
                    status,
                    uei: event.uei.clone(),
                    source,
                });
            }
        }

        Ok(evaluation)
    }

    /// Evaluate a sample against every loaded threshold that watches
    /// `ds_name` and applies to the resource.
    pub fn ingest(
        &self,
        resource: &CollectionResource,
        ds_name: &str,
        sample: &Sample,
    ) -> Vec<Result<Evaluation>> {
        let matching: Vec<Arc<Threshold>> = self
            .read_thresholds()
            .iter()
            .filter(|t| t.definition().ds_name == ds_name && t.applies_to(&resource.id))
            .cloned()
            .collect();

        matching
            .iter()
            .map(|threshold| self.submit_sample(resource, threshold, sample))
            .collect()
    }

    fn state_cell(&self, key: EvaluatorKey, threshold: &Threshold) -> Result<StateCell> {
        let existing = self.states.get(&key).map(|c| Arc::clone(c.value()));
        if let Some(cell) = existing {
            return Ok(cell);
        }
        let fresh: StateCell = Arc::new(Mutex::new(threshold.new_state()?));
        // Another caller may have inserted the key meanwhile; keep theirs.
        Ok(Arc::clone(self.states.entry(key).or_insert(fresh).value()))
    }

    fn drop_states_for_threshold(&self, threshold_id: &str) -> usize {
        let before = self.states.len();
        self.states.retain(|key, _| key.threshold_id != threshold_id);
        before.saturating_sub(self.states.len())
    }

    fn read_thresholds(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<Threshold>>> {
        self.thresholds.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_thresholds(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<Threshold>>> {
        self.thresholds.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn lock_state(cell: &StateCell) -> std::sync::MutexGuard<'_, Box<dyn EvaluatorState>> {
    cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
