//! Fault detection: timed and immediate rules folded into one latched
//! fault word, classified as FAULT, LV_ERROR or NO_FAULT.
//!
//! - [`timed`] - debounce counter primitive
//! - [`rules`] - built-in rules and the [`rules::FaultRule`] extension trait
//! - [`manager`] - the [`manager::FaultManager`] stepping all rules

pub mod manager;
pub mod rules;
pub mod timed;

use thiserror::Error;

pub use manager::FaultManager;
pub use rules::FaultRule;
pub use timed::TimedCondition;

/// Fault manager construction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FaultManagerError {
    #[error("tick period must be non-zero")]
    ZeroTickPeriod,
}
