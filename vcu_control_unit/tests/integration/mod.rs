mod boot;
mod drive_cycle;
mod fault_latching;
mod frame_pipeline;

use parking_lot::Mutex;
use vcu_common::vehicle::control::{ControlError, Direction, VehicleControl};

/// One call made on the vehicle control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Call {
    Enable,
    Disable,
    Torque(f32, Direction),
    PowerChannel(u8, bool),
    EcuError(bool),
    Dash(bool),
}

/// Vehicle control that records every call.
#[derive(Debug, Default)]
pub struct Recorder {
    calls: Mutex<Vec<Call>>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls.lock().iter().filter(|c| **c == call).count()
    }

    pub fn last_torque(&self) -> Option<(f32, Direction)> {
        self.calls.lock().iter().rev().find_map(|c| match c {
            Call::Torque(t, d) => Some((*t, *d)),
            _ => None,
        })
    }

    fn record(&self, call: Call) -> Result<(), ControlError> {
        self.calls.lock().push(call);
        Ok(())
    }
}

impl VehicleControl for Recorder {
    fn enable_inverter(&self) -> Result<(), ControlError> {
        self.record(Call::Enable)
    }
    fn disable_inverter(&self) -> Result<(), ControlError> {
        self.record(Call::Disable)
    }
    fn request_motor_torque(&self, torque: f32, direction: Direction) -> Result<(), ControlError> {
        self.record(Call::Torque(torque, direction))
    }
    fn set_power_channel(&self, channel: u8, enabled: bool) -> Result<(), ControlError> {
        self.record(Call::PowerChannel(channel, enabled))
    }
    fn set_ecu_error(&self, asserted: bool) -> Result<(), ControlError> {
        self.record(Call::EcuError(asserted))
    }
    fn set_dash(&self, led_on: bool) -> Result<(), ControlError> {
        self.record(Call::Dash(led_on))
    }
}
