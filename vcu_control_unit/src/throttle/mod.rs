//! Throttle: pedal position to motor torque.
//!
//! - [`torque_map`] - piecewise-linear breakpoint tables
//! - [`controller`] - enable/direction state and the per-tick torque command

pub mod controller;
pub mod torque_map;

pub use controller::{ThrottleController, ThrottleError, ThrottleSettings, ThrottleTask};
pub use torque_map::{Breakpoint, TorqueMap, TorqueMapError};
