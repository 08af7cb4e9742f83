//! Vehicle-wide data block shared by every VCU task.
//!
//! [`VehicleStateData`] is a plain `Copy` struct so a consistent snapshot is a
//! single memcpy under the vehicle state lock. All physical quantities are in
//! engineering units: volts, amps, degrees Celsius, rpm, newton-metres.
//! Pedal positions are scaled fractions in `[0, 1]`.

use serde::{Deserialize, Serialize};

// ─── Inverter Enums ─────────────────────────────────────────────────

/// State of the inverter's own internal state machine, as broadcast by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum InverterVsmState {
    Start = 0,
    PrechargeInit = 1,
    PrechargeActive = 2,
    PrechargeComplete = 3,
    Wait = 4,
    /// HV bus charged, inverter accepts torque commands.
    Ready = 5,
    MotorRunning = 6,
    Fault = 7,
}

impl InverterVsmState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Start),
            1 => Some(Self::PrechargeInit),
            2 => Some(Self::PrechargeActive),
            3 => Some(Self::PrechargeComplete),
            4 => Some(Self::Wait),
            5 => Some(Self::Ready),
            6 => Some(Self::MotorRunning),
            7 => Some(Self::Fault),
            _ => None,
        }
    }

    /// True once the inverter has finished precharging the HV bus.
    #[inline]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready | Self::MotorRunning)
    }
}

impl Default for InverterVsmState {
    fn default() -> Self {
        Self::Start
    }
}

/// Inverter power stage state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum InverterPowerState {
    PowerOn = 0,
    Stop = 1,
    OpenLoop = 2,
    ClosedLoop = 3,
    IdleRun = 8,
    IdleStop = 9,
}

impl InverterPowerState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::PowerOn),
            1 => Some(Self::Stop),
            2 => Some(Self::OpenLoop),
            3 => Some(Self::ClosedLoop),
            8 => Some(Self::IdleRun),
            9 => Some(Self::IdleStop),
            _ => None,
        }
    }
}

impl Default for InverterPowerState {
    fn default() -> Self {
        Self::PowerOn
    }
}

/// HV bus active discharge state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DischargeState {
    Disabled = 0,
    Enabled = 1,
    SpeedCheck = 2,
    Active = 3,
    Complete = 4,
}

impl DischargeState {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Disabled),
            1 => Some(Self::Enabled),
            2 => Some(Self::SpeedCheck),
            3 => Some(Self::Active),
            4 => Some(Self::Complete),
            _ => None,
        }
    }
}

impl Default for DischargeState {
    fn default() -> Self {
        Self::Disabled
    }
}

/// Motor rotation direction reported by the inverter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RotationDirection {
    Reverse = 0,
    Forward = 1,
}

impl Default for RotationDirection {
    fn default() -> Self {
        Self::Reverse
    }
}

// ─── Data Groups ────────────────────────────────────────────────────

/// Pedal sensor inputs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PedalInputs {
    /// Combined accelerator position used for torque requests.
    pub accel: f32,
    pub accel_a: f32,
    pub accel_b: f32,
    pub accel_raw_a: u16,
    pub accel_raw_b: u16,
    /// Combined brake position used by the pedal abuse check.
    pub brake: f32,
    pub brake_a: f32,
    pub brake_b: f32,
    pub brake_raw_a: u16,
    pub brake_raw_b: u16,
}

/// Dashboard inputs and outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DashState {
    /// Debounced start button level.
    pub button_pressed: bool,
    pub led_on: bool,
}

/// Battery pack data reported by the BMS.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BatteryState {
    pub max_cell_voltage: f32,
    pub max_cell_voltage_id: u8,
    pub min_cell_voltage: f32,
    pub min_cell_voltage_id: u8,
    pub max_cell_temp: f32,
    pub max_cell_temp_id: u8,
    pub min_cell_temp: f32,
    pub min_cell_temp_id: u8,
    /// [A], discharge positive.
    pub dc_current: f32,
    pub dc_voltage: f32,
    /// Percent, 0 to 100.
    pub state_of_charge: f32,
    pub bms_fault_indicator: bool,
    pub populated_cells: u8,
    /// Rolling counter incremented by the BMS on every pack message.
    pub health_counter: u8,
    pub failsafe_status: u16,
}

/// Motor data derived from inverter broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotorState {
    pub temperature: f32,
    pub angle: f32,
    /// Revolutions per minute.
    pub speed: i16,
    pub phase_a_current: f32,
    pub phase_b_current: f32,
    pub phase_c_current: f32,
    pub calculated_torque: f32,
}

/// Inverter telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InverterState {
    pub module_a_temp: f32,
    pub module_b_temp: f32,
    pub module_c_temp: f32,
    pub gate_driver_temp: f32,
    pub control_board_temp: f32,
    pub output_frequency: f32,
    pub dc_bus_current: f32,
    pub dc_bus_voltage: f32,
    pub output_voltage: f32,
    pub vd: f32,
    pub vq: f32,
    pub flux_command: f32,
    pub flux_feedback: f32,
    pub id_feedback: f32,
    pub iq_feedback: f32,
    pub id_command: f32,
    pub iq_command: f32,
    pub commanded_torque: f32,
    pub modulation_index: f32,
    pub flux_weakening_output: f32,
    pub vsm_state: InverterVsmState,
    pub inverter_state: InverterPowerState,
    pub discharge_state: DischargeState,
    pub enabled: bool,
    pub direction: RotationDirection,
    pub timer_counts: u32,
    pub run_faults: u32,
    pub post_faults: u32,
}

/// The canonical vehicle data block.
///
/// Zero-initialised by `Default`. Owned by the vehicle state store; every
/// other component works on snapshots or under the store's guard.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleStateData {
    pub inputs: PedalInputs,
    pub dash: DashState,
    pub battery: BatteryState,
    pub motor: MotorState,
    pub inverter: InverterState,
}
