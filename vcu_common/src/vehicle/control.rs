//! Actuator-facing interface of the supervisory core.
//!
//! The supervisory state machine and the throttle controller only talk to
//! hardware through [`VehicleControl`]. Implementations validate every
//! command and report rejections as [`ControlError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Commanded drive direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    /// No torque is produced in neutral.
    Neutral = 0,
    Forward = 1,
    Reverse = 2,
}

impl Direction {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Neutral),
            1 => Some(Self::Forward),
            2 => Some(Self::Reverse),
            _ => None,
        }
    }
}

impl Default for Direction {
    fn default() -> Self {
        Self::Neutral
    }
}

/// Rejected or failed actuator command.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error("torque request {requested} Nm outside ±{limit} Nm")]
    TorqueOutOfRange { requested: f32, limit: f32 },

    #[error("power channel {0} does not exist")]
    InvalidChannel(u8),

    #[error("torque requested while inverter is disabled")]
    InverterDisabled,

    /// The transport below the control layer failed.
    #[error("driver error: {0}")]
    Driver(String),
}

/// Outputs the supervisory core drives.
///
/// Implementations must be callable from several periodic tasks at once.
pub trait VehicleControl: Send + Sync {
    /// Close the HV contactors / enable the inverter power stage.
    fn enable_inverter(&self) -> Result<(), ControlError>;

    fn disable_inverter(&self) -> Result<(), ControlError>;

    /// Command motor torque [Nm] in the given direction.
    fn request_motor_torque(&self, torque: f32, direction: Direction)
    -> Result<(), ControlError>;

    /// Switch one low-voltage power channel.
    fn set_power_channel(&self, channel: u8, enabled: bool) -> Result<(), ControlError>;

    /// Drive the ECU error indicator.
    fn set_ecu_error(&self, asserted: bool) -> Result<(), ControlError>;

    /// Drive the dashboard LED.
    fn set_dash(&self, led_on: bool) -> Result<(), ControlError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_u8() {
        assert_eq!(Direction::from_u8(1), Some(Direction::Forward));
        assert_eq!(Direction::from_u8(3), None);
        assert_eq!(Direction::default(), Direction::Neutral);
    }

    #[test]
    fn test_error_display() {
        let err = ControlError::TorqueOutOfRange {
            requested: 600.0,
            limit: 500.0,
        };
        assert_eq!(err.to_string(), "torque request 600 Nm outside ±500 Nm");
    }
}
