//! Value types shared by the threshold evaluator and its drivers.

pub mod types;
