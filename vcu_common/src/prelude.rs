//! Prelude module for common re-exports.
//!
//! ```rust
//! use vcu_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::vehicle::config::{
    BmsConfig, InputSensorsConfig, InverterConfig, PedalCalibration, PedalConfig,
    TorqueMapConfig, VcuLogicConfig, VehicleConfig,
};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{DEFAULT_BLOCK_TIME_MS, DEFAULT_TICK_PERIOD_MS, MAX_TASKS};

// ─── Vehicle ────────────────────────────────────────────────────────
pub use crate::vehicle::control::{ControlError, Direction, VehicleControl};
pub use crate::vehicle::fault::{FaultFlags, FaultStatus};
pub use crate::vehicle::state::{InverterVsmState, VehicleStateData};
