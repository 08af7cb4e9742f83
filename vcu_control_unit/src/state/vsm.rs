//! Per-tick VSM runner.
//!
//! Each [`Vsm::step`]:
//! 1. runs the fault manager (its only caller),
//! 2. samples the dash button and inverter state under one vehicle state
//!    lock acquisition,
//! 3. evaluates [`transition`],
//! 4. applies the resulting actions to the vehicle control and throttle.
//!
//! A lock miss in step 2 reports no button edge and leaves the previous
//! button value untouched.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use vcu_common::vehicle::control::VehicleControl;
use vcu_common::vehicle::fault::FaultStatus;
use vcu_common::vehicle::state::InverterVsmState;

use super::machine::{TransitionInputs, VsmAction, VsmState, transition};
use crate::context::VcuContext;
use crate::fault::{FaultManager, FaultManagerError};
use crate::throttle::ThrottleController;
use crate::vehicle_state::VehicleState;

/// Supervisory state machine with its fault manager.
pub struct Vsm {
    ctx: VcuContext,
    state: VsmState,
    ticks_in_state: u32,
    prev_button: bool,
    last_status: FaultStatus,
    faults: FaultManager,
    vehicle: Arc<VehicleState>,
    control: Arc<dyn VehicleControl>,
    throttle: Arc<ThrottleController>,
}

impl Vsm {
    pub fn new(
        ctx: &VcuContext,
        vehicle: Arc<VehicleState>,
        control: Arc<dyn VehicleControl>,
        throttle: Arc<ThrottleController>,
    ) -> Result<Self, FaultManagerError> {
        let faults = FaultManager::new(ctx, ctx.tick_period_ms())?;
        Ok(Self {
            ctx: ctx.module("vsm"),
            state: VsmState::Init,
            ticks_in_state: 0,
            prev_button: false,
            last_status: FaultStatus::Init,
            faults,
            vehicle,
            control,
            throttle,
        })
    }

    #[inline]
    pub fn state(&self) -> VsmState {
        self.state
    }

    #[inline]
    pub fn ticks_in_state(&self) -> u32 {
        self.ticks_in_state
    }

    /// Fault classification from the most recent step.
    #[inline]
    pub fn last_status(&self) -> FaultStatus {
        self.last_status
    }

    #[inline]
    pub fn fault_manager(&self) -> &FaultManager {
        &self.faults
    }

    /// Maintenance access, e.g. to clear latched faults.
    #[inline]
    pub fn fault_manager_mut(&mut self) -> &mut FaultManager {
        &mut self.faults
    }

    fn sample_inputs(&mut self) -> TransitionInputs {
        let cfg = &self.ctx.config().vcu;
        let mut inputs = TransitionInputs {
            elapsed_ms: u64::from(self.ticks_in_state) * u64::from(cfg.tick_period_ms),
            hv_charge_timeout_ms: cfg.hv_charge_timeout_ms,
            ..Default::default()
        };

        match self
            .vehicle
            .read(|d| (d.dash.button_pressed, d.inverter.vsm_state))
        {
            Ok((button, inverter)) => {
                inputs.button_rising_edge = button && !self.prev_button;
                inputs.inverter_ready = inverter == InverterVsmState::Ready;
                self.prev_button = button;
            }
            Err(e) => debug!("input sample skipped: {e}"),
        }
        inputs
    }

    fn apply(&self, action: VsmAction) {
        let result = match action {
            VsmAction::EnableInverter => self.control.enable_inverter().map_err(|e| e.to_string()),
            VsmAction::DisableInverter => {
                self.control.disable_inverter().map_err(|e| e.to_string())
            }
            VsmAction::SetEcuError(asserted) => {
                self.control.set_ecu_error(asserted).map_err(|e| e.to_string())
            }
            VsmAction::SetTorqueEnabled(enabled) => self
                .throttle
                .set_torque_enabled(enabled)
                .map_err(|e| e.to_string()),
            VsmAction::SetDirection(direction) => self
                .throttle
                .set_motor_direction(direction)
                .map_err(|e| e.to_string()),
        };
        if let Err(e) = result {
            warn!(?action, "action failed: {e}");
        }
    }

    /// Run one supervisory tick. Returns the state after the tick.
    pub fn step(&mut self) -> VsmState {
        let status = self.faults.step(&self.vehicle);
        self.last_status = status;

        let span = self.ctx.span().clone();
        let _entered = span.enter();

        let inputs = self.sample_inputs();
        let t = transition(self.state, status, &inputs);

        if t.next != self.state {
            if t.next == VsmState::Fault {
                error!(
                    from = ?self.state,
                    ?status,
                    latched = ?self.faults.latched(),
                    "entering fault state"
                );
            } else {
                info!(from = ?self.state, to = ?t.next, "state transition");
            }
        }
        for action in &t.actions {
            self.apply(*action);
        }

        if t.next != self.state {
            self.state = t.next;
            self.ticks_in_state = 0;
        } else {
            self.ticks_in_state = self.ticks_in_state.saturating_add(1);
        }
        self.state
    }
}

impl std::fmt::Debug for Vsm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vsm")
            .field("state", &self.state)
            .field("ticks_in_state", &self.ticks_in_state)
            .field("prev_button", &self.prev_button)
            .field("faults", &self.faults)
            .finish()
    }
}
