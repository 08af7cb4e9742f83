//! Workstation simulation of the vehicle around the control unit.
//!
//! [`SimulatedVehicle`] drives the pedal sensors and the dash button and
//! broadcasts nominal BMS frames. [`SimulatedInverter`] consumes the outbound
//! command frames and answers with internal-state broadcasts, walking the
//! precharge sequence to `Ready` after a configurable number of ticks.

use std::sync::Arc;

use tracing::{debug, info, trace};
use vcu_common::vehicle::config::PedalCalibration;
use vcu_common::vehicle::control::Direction;
use vcu_common::vehicle::state::{
    DischargeState, InverterPowerState, InverterVsmState, RotationDirection, VehicleStateData,
};

use crate::config::SimulationConfig;
use crate::context::VcuContext;
use crate::cycle::PeriodicTask;
use crate::device::bms::{CellReport, PackReport};
use crate::device::inverter::{encode_internal_states, encode_torque_timer};
use crate::device::{FrameQueue, FrameRouter, InverterCommand};
use crate::vehicle_state::{StateError, VehicleState};

// ─── Nominal Pack ───────────────────────────────────────────────────

const PACK_VOLTAGE: f32 = 350.0;
const PACK_SOC: f32 = 80.0;

fn nominal_cells() -> CellReport {
    CellReport {
        max_voltage: 3.95,
        max_voltage_id: 12,
        min_voltage: 3.91,
        min_voltage_id: 40,
        populated_cells: 96,
        max_temp: 31,
        max_temp_id: 7,
        min_temp: 27,
        min_temp_id: 55,
        failsafe_status: 0,
    }
}

/// Raw sensor count for a pedal fraction.
fn raw_for(cal: &PedalCalibration, fraction: f32) -> u16 {
    let span = f32::from(cal.raw_upper.saturating_sub(cal.raw_lower));
    cal.raw_lower
        .saturating_add((fraction.clamp(0.0, 1.0) * span).round() as u16)
}

// ─── Simulated Vehicle ──────────────────────────────────────────────

/// Pedals, dash button and BMS of a vehicle parked on the bench.
pub struct SimulatedVehicle {
    ctx: VcuContext,
    script: SimulationConfig,
    state: Arc<VehicleState>,
    router: FrameRouter,
    elapsed_ms: u64,
    counter: u8,
}

impl SimulatedVehicle {
    pub fn new(
        ctx: &VcuContext,
        script: &SimulationConfig,
        state: Arc<VehicleState>,
        router: FrameRouter,
    ) -> Self {
        Self {
            ctx: ctx.module("sim_vehicle"),
            script: script.clone(),
            state,
            router,
            elapsed_ms: 0,
            counter: 0,
        }
    }

    /// Write nominal sensor and battery values straight into the vehicle
    /// state, before any task runs.
    pub fn seed(&self) -> Result<(), StateError> {
        let cells = nominal_cells();
        self.state.write(|d| {
            self.write_pedals(d, false);
            let b = &mut d.battery;
            b.dc_voltage = PACK_VOLTAGE;
            b.state_of_charge = PACK_SOC;
            b.max_cell_voltage = cells.max_voltage;
            b.min_cell_voltage = cells.min_voltage;
            b.max_cell_temp = f32::from(cells.max_temp);
            b.min_cell_temp = f32::from(cells.min_temp);
            b.populated_cells = cells.populated_cells;
        })?;
        info!(parent: self.ctx.span(), "vehicle state seeded");
        Ok(())
    }

    /// True while a scripted button press is being held.
    pub fn button_held(&self) -> bool {
        let now = self.elapsed_ms;
        let hold = u64::from(self.script.press_duration_ms);
        self.script.button_presses_ms.iter().any(|&at| {
            let at = u64::from(at);
            now >= at && now < at + hold
        })
    }

    fn write_pedals(&self, d: &mut VehicleStateData, button: bool) {
        let inputs = &self.ctx.config().inputs;
        let accel = &inputs.accel_pedal;
        let brake = &inputs.brake_pedal;
        let p = &mut d.inputs;

        p.accel_raw_a = raw_for(&accel.calibration_a, self.script.pedal);
        p.accel_raw_b = raw_for(&accel.calibration_b, self.script.pedal);
        p.accel_a = accel.calibration_a.scale(p.accel_raw_a);
        p.accel_b = accel.calibration_b.scale(p.accel_raw_b);
        p.accel = (p.accel_a + p.accel_b) / 2.0;

        p.brake_raw_a = brake.calibration_a.raw_lower;
        p.brake_raw_b = brake.calibration_b.raw_lower;
        p.brake_a = 0.0;
        p.brake_b = 0.0;
        p.brake = 0.0;

        d.dash.button_pressed = button;
    }

    fn broadcast_bms(&mut self) {
        let base = self.ctx.config().bms.base_can_id;
        let pack = PackReport {
            current: 0.0,
            voltage: PACK_VOLTAGE,
            state_of_charge: PACK_SOC,
            fault: false,
            counter: self.counter,
        };
        self.counter = self.counter.wrapping_add(1);

        let [volts, temps] = nominal_cells().encode(base);
        for frame in [pack.encode(base), volts, temps] {
            if let Err(e) = self.router.route(frame) {
                trace!(parent: self.ctx.span(), "bms frame dropped: {e}");
            }
        }
    }
}

impl PeriodicTask for SimulatedVehicle {
    fn name(&self) -> &'static str {
        "sim_vehicle"
    }

    fn step(&mut self) {
        let button = self.button_held();
        if let Err(e) = self.state.write(|d| self.write_pedals(d, button)) {
            debug!(parent: self.ctx.span(), "pedal update skipped: {e}");
        }
        self.broadcast_bms();
        self.elapsed_ms += u64::from(self.ctx.tick_period_ms());
    }
}

// ─── Simulated Inverter ─────────────────────────────────────────────

/// Inverter answering command frames.
pub struct SimulatedInverter {
    ctx: VcuContext,
    commands: Arc<FrameQueue>,
    router: FrameRouter,
    precharge_ticks: u32,
    last: InverterCommand,
    ticks_enabled: u32,
    timer: u32,
}

impl SimulatedInverter {
    pub fn new(
        ctx: &VcuContext,
        commands: Arc<FrameQueue>,
        router: FrameRouter,
        precharge_ticks: u32,
    ) -> Self {
        Self {
            ctx: ctx.module("sim_inverter"),
            commands,
            router,
            precharge_ticks,
            last: InverterCommand::idle(),
            ticks_enabled: 0,
            timer: 0,
        }
    }

    /// Internal state the inverter would broadcast now.
    pub fn vsm_state(&self) -> InverterVsmState {
        if !self.last.enable {
            return InverterVsmState::Wait;
        }
        let third = (self.precharge_ticks / 3).max(1);
        match self.ticks_enabled {
            t if t >= self.precharge_ticks => {
                if self.last.torque != 0.0 {
                    InverterVsmState::MotorRunning
                } else {
                    InverterVsmState::Ready
                }
            }
            t if t >= 2 * third => InverterVsmState::PrechargeComplete,
            t if t >= third => InverterVsmState::PrechargeActive,
            _ => InverterVsmState::PrechargeInit,
        }
    }

    /// Apply pending commands, advance precharge and broadcast.
    pub fn update(&mut self) -> InverterVsmState {
        while let Some(frame) = self.commands.try_pop() {
            let Some(command) = InverterCommand::decode(&frame) else {
                continue;
            };
            if command.enable != self.last.enable {
                info!(parent: self.ctx.span(), enabled = command.enable, "inverter command");
                self.ticks_enabled = 0;
            }
            self.last = command;
        }
        if self.last.enable {
            self.ticks_enabled = self.ticks_enabled.saturating_add(1);
        }
        self.timer = self.timer.wrapping_add(1);

        let vsm = self.vsm_state();
        let power = match vsm {
            InverterVsmState::MotorRunning => InverterPowerState::ClosedLoop,
            InverterVsmState::Ready => InverterPowerState::IdleRun,
            _ => InverterPowerState::Stop,
        };
        let direction = if self.last.direction == Direction::Reverse {
            RotationDirection::Reverse
        } else {
            RotationDirection::Forward
        };
        let frames = [
            encode_internal_states(
                vsm,
                power,
                DischargeState::Disabled,
                self.last.enable,
                direction,
            ),
            encode_torque_timer(self.last.torque, self.last.torque, self.timer),
        ];
        for frame in frames {
            if let Err(e) = self.router.route(frame) {
                trace!(parent: self.ctx.span(), "inverter frame dropped: {e}");
            }
        }
        vsm
    }
}

impl PeriodicTask for SimulatedInverter {
    fn name(&self) -> &'static str {
        "sim_inverter"
    }

    fn step(&mut self) {
        self.update();
    }
}
