//! Frame-based [`VehicleControl`] implementation.
//!
//! Validates each command, tracks the commanded outputs and sends inverter
//! commands as encoded frames on the outbound queue.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use vcu_common::consts::POWER_CHANNEL_COUNT;
use vcu_common::vehicle::control::{ControlError, Direction, VehicleControl};

use crate::context::VcuContext;
use crate::device::{FrameQueue, InverterCommand};

/// Current state of every output.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ControlOutputs {
    pub inverter_enabled: bool,
    pub torque: f32,
    pub direction: Direction,
    /// Bit `n` set when power channel `n` is on.
    pub power_channels: u8,
    pub ecu_error: bool,
    pub dash_led: bool,
    /// Torque commands sent so far.
    pub commands_sent: u64,
}

/// Outputs driven through the inverter command frame and discrete pins.
pub struct FrameVehicleControl {
    ctx: VcuContext,
    outbound: Arc<FrameQueue>,
    outputs: Mutex<ControlOutputs>,
    torque_limit: f32,
}

impl FrameVehicleControl {
    pub fn new(ctx: &VcuContext, outbound: Arc<FrameQueue>) -> Self {
        let ctx = ctx.module("control");
        let torque_limit = ctx.config().inverter.torque_limit_nm;
        Self {
            ctx,
            outbound,
            outputs: Mutex::new(ControlOutputs::default()),
            torque_limit,
        }
    }

    /// Snapshot of the commanded outputs.
    pub fn outputs(&self) -> ControlOutputs {
        *self.outputs.lock()
    }

    fn send(&self, outputs: &mut ControlOutputs) -> Result<(), ControlError> {
        let command = InverterCommand {
            torque: outputs.torque,
            direction: outputs.direction,
            enable: outputs.inverter_enabled,
            discharge: false,
        };
        self.outbound
            .push(command.encode())
            .map_err(|e| ControlError::Driver(e.to_string()))?;
        outputs.commands_sent += 1;
        Ok(())
    }

    fn set_inverter(&self, enabled: bool) -> Result<(), ControlError> {
        let mut outputs = self.outputs.lock();
        outputs.inverter_enabled = enabled;
        if !enabled {
            outputs.torque = 0.0;
        }
        self.send(&mut outputs)
    }
}

impl VehicleControl for FrameVehicleControl {
    fn enable_inverter(&self) -> Result<(), ControlError> {
        self.set_inverter(true)?;
        info!(parent: self.ctx.span(), "inverter enabled");
        Ok(())
    }

    fn disable_inverter(&self) -> Result<(), ControlError> {
        self.set_inverter(false)?;
        info!(parent: self.ctx.span(), "inverter disabled");
        Ok(())
    }

    fn request_motor_torque(&self, torque: f32, direction: Direction) -> Result<(), ControlError> {
        if !torque.is_finite() || torque.abs() > self.torque_limit {
            return Err(ControlError::TorqueOutOfRange {
                requested: torque,
                limit: self.torque_limit,
            });
        }
        let mut outputs = self.outputs.lock();
        if !outputs.inverter_enabled && torque != 0.0 {
            return Err(ControlError::InverterDisabled);
        }
        outputs.torque = torque;
        outputs.direction = direction;
        self.send(&mut outputs)
    }

    fn set_power_channel(&self, channel: u8, enabled: bool) -> Result<(), ControlError> {
        if channel >= POWER_CHANNEL_COUNT {
            return Err(ControlError::InvalidChannel(channel));
        }
        let mut outputs = self.outputs.lock();
        if enabled {
            outputs.power_channels |= 1 << channel;
        } else {
            outputs.power_channels &= !(1 << channel);
        }
        debug!(parent: self.ctx.span(), channel, enabled, "power channel");
        Ok(())
    }

    fn set_ecu_error(&self, asserted: bool) -> Result<(), ControlError> {
        self.outputs.lock().ecu_error = asserted;
        if asserted {
            error!(parent: self.ctx.span(), "ECU error asserted");
        } else {
            warn!(parent: self.ctx.span(), "ECU error cleared");
        }
        Ok(())
    }

    fn set_dash(&self, led_on: bool) -> Result<(), ControlError> {
        self.outputs.lock().dash_led = led_on;
        debug!(parent: self.ctx.span(), led_on, "dash LED");
        Ok(())
    }
}

impl std::fmt::Debug for FrameVehicleControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameVehicleControl")
            .field("outputs", &self.outputs)
            .field("torque_limit", &self.torque_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::inverter::ID_COMMAND;

    fn control(capacity: usize) -> (Arc<FrameQueue>, FrameVehicleControl) {
        let queue = Arc::new(FrameQueue::new(capacity));
        let ctl = FrameVehicleControl::new(&VcuContext::default(), Arc::clone(&queue));
        (queue, ctl)
    }

    #[test]
    fn test_enable_sends_command() {
        let (queue, ctl) = control(4);
        ctl.enable_inverter().unwrap();
        let frame = queue.try_pop().unwrap();
        assert_eq!(frame.id, ID_COMMAND);
        let cmd = InverterCommand::decode(&frame).unwrap();
        assert!(cmd.enable);
        assert_eq!(cmd.torque, 0.0);
        assert!(ctl.outputs().inverter_enabled);
    }

    #[test]
    fn test_torque_limit() {
        let (_, ctl) = control(4);
        ctl.enable_inverter().unwrap();
        assert_eq!(
            ctl.request_motor_torque(500.5, Direction::Forward),
            Err(ControlError::TorqueOutOfRange {
                requested: 500.5,
                limit: 500.0
            })
        );
        assert!(matches!(
            ctl.request_motor_torque(f32::NAN, Direction::Forward),
            Err(ControlError::TorqueOutOfRange { .. })
        ));
        ctl.request_motor_torque(-500.0, Direction::Reverse).unwrap();
        assert_eq!(ctl.outputs().torque, -500.0);
    }

    #[test]
    fn test_torque_needs_enabled_inverter() {
        let (queue, ctl) = control(4);
        assert_eq!(
            ctl.request_motor_torque(10.0, Direction::Forward),
            Err(ControlError::InverterDisabled)
        );
        ctl.request_motor_torque(0.0, Direction::Neutral).unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_disable_zeroes_torque() {
        let (_, ctl) = control(8);
        ctl.enable_inverter().unwrap();
        ctl.request_motor_torque(120.0, Direction::Forward).unwrap();
        ctl.disable_inverter().unwrap();
        let out = ctl.outputs();
        assert!(!out.inverter_enabled);
        assert_eq!(out.torque, 0.0);
        assert_eq!(out.commands_sent, 3);
    }

    #[test]
    fn test_full_queue_is_driver_error() {
        let (_, ctl) = control(1);
        ctl.enable_inverter().unwrap();
        assert!(matches!(
            ctl.request_motor_torque(0.0, Direction::Neutral),
            Err(ControlError::Driver(_))
        ));
        assert_eq!(ctl.outputs().commands_sent, 1);
    }

    #[test]
    fn test_power_channels() {
        let (_, ctl) = control(1);
        ctl.set_power_channel(0, true).unwrap();
        ctl.set_power_channel(7, true).unwrap();
        ctl.set_power_channel(0, false).unwrap();
        assert_eq!(ctl.outputs().power_channels, 0b1000_0000);
        assert_eq!(
            ctl.set_power_channel(8, true),
            Err(ControlError::InvalidChannel(8))
        );
    }

    #[test]
    fn test_discrete_outputs() {
        let (_, ctl) = control(1);
        ctl.set_ecu_error(true).unwrap();
        ctl.set_dash(true).unwrap();
        let out = ctl.outputs();
        assert!(out.ecu_error && out.dash_led);
    }
}
