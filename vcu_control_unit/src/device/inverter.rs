//! Motor inverter broadcast decoding and command encoding.
//!
//! Broadcast frames carry little-endian signed 16-bit fields. Temperatures,
//! currents, voltages and torques are in tenths; flux in thousandths;
//! modulation index in ten-thousandths.

use vcu_common::vehicle::control::Direction;
use vcu_common::vehicle::state::{
    DischargeState, InverterPowerState, InverterVsmState, RotationDirection, VehicleStateData,
};

use super::FrameDecoder;
use super::frame::{CanFrame, fixed, scaled};

// ─── Frame Identifiers ──────────────────────────────────────────────

pub const ID_TEMPERATURES_1: u16 = 0x0A0;
pub const ID_TEMPERATURES_2: u16 = 0x0A1;
pub const ID_TEMPERATURES_3: u16 = 0x0A2;
pub const ID_MOTOR_POSITION: u16 = 0x0A5;
pub const ID_CURRENT_INFO: u16 = 0x0A6;
pub const ID_VOLTAGE_INFO: u16 = 0x0A7;
pub const ID_FLUX_INFO: u16 = 0x0A8;
pub const ID_INTERNAL_STATES: u16 = 0x0AA;
pub const ID_FAULT_CODES: u16 = 0x0AB;
pub const ID_TORQUE_TIMER: u16 = 0x0AC;
pub const ID_MODULATION_FLUX: u16 = 0x0AD;
pub const ID_COMMAND: u16 = 0x0C0;

const TENTHS: f32 = 0.1;
const THOUSANDTHS: f32 = 0.001;
const TEN_THOUSANDTHS: f32 = 0.0001;

// ─── Broadcast Decoding ─────────────────────────────────────────────

/// Decoder for every inverter broadcast frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct InverterDecoder;

impl FrameDecoder for InverterDecoder {
    fn name(&self) -> &'static str {
        "inverter"
    }

    fn accepts(&self, id: u16) -> bool {
        (ID_TEMPERATURES_1..=ID_MODULATION_FLUX).contains(&id)
    }

    fn decode(&self, frame: &CanFrame, data: &mut VehicleStateData) -> bool {
        if !frame.is_full() {
            return false;
        }
        let t = |offset| scaled(frame.i16_le(offset), TENTHS);
        let inv = &mut data.inverter;
        match frame.id {
            ID_TEMPERATURES_1 => {
                inv.module_a_temp = t(0);
                inv.module_b_temp = t(2);
                inv.module_c_temp = t(4);
                inv.gate_driver_temp = t(6);
            }
            ID_TEMPERATURES_2 => inv.control_board_temp = t(0),
            ID_TEMPERATURES_3 => data.motor.temperature = t(4),
            ID_MOTOR_POSITION => {
                data.motor.angle = t(0);
                data.motor.speed = frame.i16_le(2);
                inv.output_frequency = t(4);
            }
            ID_CURRENT_INFO => {
                data.motor.phase_a_current = t(0);
                data.motor.phase_b_current = t(2);
                data.motor.phase_c_current = t(4);
                inv.dc_bus_current = t(6);
            }
            ID_VOLTAGE_INFO => {
                inv.dc_bus_voltage = t(0);
                inv.output_voltage = t(2);
                inv.vd = t(4);
                inv.vq = t(6);
            }
            ID_FLUX_INFO => {
                inv.flux_command = scaled(frame.i16_le(0), THOUSANDTHS);
                inv.flux_feedback = scaled(frame.i16_le(2), THOUSANDTHS);
                inv.id_feedback = t(4);
                inv.iq_feedback = t(6);
            }
            ID_INTERNAL_STATES => {
                // Unknown enum values keep the previous state.
                if let Some(vsm) = InverterVsmState::from_u8(frame.data[0]) {
                    inv.vsm_state = vsm;
                }
                if let Some(power) = InverterPowerState::from_u8(frame.data[2]) {
                    inv.inverter_state = power;
                }
                if let Some(discharge) = DischargeState::from_u8(frame.data[4] >> 5) {
                    inv.discharge_state = discharge;
                }
                inv.enabled = frame.data[6] & 0x01 != 0;
                inv.direction = if frame.data[7] & 0x01 != 0 {
                    RotationDirection::Forward
                } else {
                    RotationDirection::Reverse
                };
            }
            ID_FAULT_CODES => {
                inv.post_faults = frame.u32_le(0);
                inv.run_faults = frame.u32_le(4);
            }
            ID_TORQUE_TIMER => {
                inv.commanded_torque = t(0);
                data.motor.calculated_torque = t(2);
                inv.timer_counts = frame.u32_le(4);
            }
            ID_MODULATION_FLUX => {
                inv.modulation_index = scaled(frame.i16_le(0), TEN_THOUSANDTHS);
                inv.flux_weakening_output = t(2);
                inv.id_command = t(4);
                inv.iq_command = t(6);
            }
            _ => return false,
        }
        true
    }
}

/// Encode the internal-states broadcast.
pub fn encode_internal_states(
    vsm: InverterVsmState,
    power: InverterPowerState,
    discharge: DischargeState,
    enabled: bool,
    direction: RotationDirection,
) -> CanFrame {
    let mut data = [0u8; 8];
    data[0] = vsm as u8;
    data[2] = power as u8;
    data[4] = (discharge as u8) << 5;
    data[6] = u8::from(enabled);
    data[7] = direction as u8;
    CanFrame::full(ID_INTERNAL_STATES, data)
}

/// Encode the torque and timer broadcast.
pub fn encode_torque_timer(commanded: f32, feedback: f32, timer_counts: u32) -> CanFrame {
    let mut frame = CanFrame::full(ID_TORQUE_TIMER, [0; 8]);
    frame.put_i16_le(0, fixed(commanded, TENTHS));
    frame.put_i16_le(2, fixed(feedback, TENTHS));
    frame.put_u32_le(4, timer_counts);
    frame
}

// ─── Command Frame ──────────────────────────────────────────────────

const CMD_ENABLE: u8 = 0x01;
const CMD_DISCHARGE: u8 = 0x02;

/// Torque command sent to the inverter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverterCommand {
    /// [Nm], sent in tenths.
    pub torque: f32,
    pub direction: Direction,
    pub enable: bool,
    pub discharge: bool,
}

impl InverterCommand {
    /// Inverter disabled, zero torque.
    pub const fn idle() -> Self {
        Self {
            torque: 0.0,
            direction: Direction::Neutral,
            enable: false,
            discharge: false,
        }
    }

    /// Encode as the command frame. Neutral is sent as forward with zero
    /// torque.
    pub fn encode(&self) -> CanFrame {
        let mut frame = CanFrame::full(ID_COMMAND, [0; 8]);
        let torque = if self.direction == Direction::Neutral {
            0.0
        } else {
            self.torque
        };
        frame.put_i16_le(0, fixed(torque, TENTHS));
        frame.put_i16_le(2, 0);
        frame.data[4] = u8::from(self.direction != Direction::Reverse);
        let mut flags = 0;
        if self.enable {
            flags |= CMD_ENABLE;
        }
        if self.discharge {
            flags |= CMD_DISCHARGE;
        }
        frame.data[5] = flags;
        frame
    }

    /// Decode a command frame. Returns `None` for other IDs or short frames.
    pub fn decode(frame: &CanFrame) -> Option<Self> {
        if frame.id != ID_COMMAND || !frame.is_full() {
            return None;
        }
        let torque = scaled(frame.i16_le(0), TENTHS);
        let direction = match (frame.data[4] & 0x01, torque == 0.0) {
            (_, true) => Direction::Neutral,
            (1, false) => Direction::Forward,
            _ => Direction::Reverse,
        };
        Some(Self {
            torque,
            direction,
            enable: frame.data[5] & CMD_ENABLE != 0,
            discharge: frame.data[5] & CMD_DISCHARGE != 0,
        })
    }
}
