//! Evaluator state implementations, one per [`ThresholdType`].

pub mod absolute_change;
pub mod high_low;
pub mod rearming_absolute_change;
pub mod relative_change;

use crate::definition::{ThresholdDefinition, ThresholdType};
use crate::error::{Result, ThresholdError};
use crate::EvaluatorState;
use std::sync::Arc;

use absolute_change::AbsoluteChangeState;
use high_low::HighLowState;
use rearming_absolute_change::RearmingAbsoluteChangeState;
use relative_change::RelativeChangeState;

/// Creates a fresh evaluator state for a definition.
pub type StateFactory = fn(Arc<ThresholdDefinition>) -> Result<Box<dyn EvaluatorState>>;

/// Resolves the state factory for a threshold kind.
pub fn factory_for(kind: ThresholdType) -> StateFactory {
    match kind {
        ThresholdType::High | ThresholdType::Low => new_high_low,
        ThresholdType::RelativeChange => new_relative_change,
        ThresholdType::AbsoluteChange => new_absolute_change,
        ThresholdType::RearmingAbsoluteChange => new_rearming_absolute_change,
    }
}

fn new_high_low(definition: Arc<ThresholdDefinition>) -> Result<Box<dyn EvaluatorState>> {
    Ok(Box::new(HighLowState::new(definition)?))
}

fn new_relative_change(definition: Arc<ThresholdDefinition>) -> Result<Box<dyn EvaluatorState>> {
    Ok(Box::new(RelativeChangeState::new(definition)?))
}

fn new_absolute_change(definition: Arc<ThresholdDefinition>) -> Result<Box<dyn EvaluatorState>> {
    Ok(Box::new(AbsoluteChangeState::new(definition)?))
}

fn new_rearming_absolute_change(
    definition: Arc<ThresholdDefinition>,
) -> Result<Box<dyn EvaluatorState>> {
    Ok(Box::new(RearmingAbsoluteChangeState::new(definition)?))
}

/// Rejects a definition that cannot drive an evaluator of one of `expected`
/// kinds.
fn check_definition(definition: &ThresholdDefinition, expected: &[ThresholdType]) -> Result<()> {
    if !expected.contains(&definition.kind) {
        return Err(ThresholdError::InvalidArgument(format!(
            "threshold '{}' has type {}, expected {}",
            definition.id,
            definition.kind,
            expected
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" or ")
        )));
    }
    if !definition.value.is_finite() {
        return Err(ThresholdError::InvalidArgument(format!(
            "threshold '{}' has non-finite value {}",
            definition.id, definition.value
        )));
    }
    Ok(())
}
