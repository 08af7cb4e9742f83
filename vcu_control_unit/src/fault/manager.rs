//! Fault manager.
//!
//! Exactly one task may call [`FaultManager::step`]: the fault manager is
//! owned by the VSM, which is owned by the supervisory task. Its counters and
//! latched word are therefore not lock-protected.

use tracing::{error, info, warn};
use vcu_common::vehicle::fault::{FaultFlags, FaultStatus};
use vcu_common::vehicle::state::VehicleStateData;

use super::rules::{BatteryRules, FaultRule, InverterFaultRule, LvSystemRule, PedalRules};
use super::FaultManagerError;
use crate::context::VcuContext;
use crate::vehicle_state::VehicleState;

/// Latching fault evaluator.
pub struct FaultManager {
    ctx: VcuContext,
    pedals: PedalRules,
    battery: BatteryRules,
    extensions: Vec<Box<dyn FaultRule>>,
    latched: FaultFlags,
    status: FaultStatus,
}

impl FaultManager {
    /// Derive every rule's tick limit from its timeout and `tick_period_ms`.
    pub fn new(ctx: &VcuContext, tick_period_ms: u32) -> Result<Self, FaultManagerError> {
        let ctx = ctx.module("fault_manager");
        let entered = ctx.span().enter();
        let config = ctx.config();

        let pedals = PedalRules::new(&config.inputs, tick_period_ms)?;
        let battery = BatteryRules::new(&config.bms, tick_period_ms)?;
        info!(
            pedal_limit = pedals.limit(),
            bms_limit = battery.limit(),
            "fault manager initialised"
        );
        drop(entered);

        Ok(Self {
            ctx,
            pedals,
            battery,
            extensions: vec![Box::new(InverterFaultRule), Box::new(LvSystemRule)],
            latched: FaultFlags::empty(),
            status: FaultStatus::Init,
        })
    }

    /// Register an additional rule, e.g. vendor-specific inverter decoding.
    pub fn with_rule(mut self, rule: Box<dyn FaultRule>) -> Self {
        self.extensions.push(rule);
        self
    }

    /// Snapshot the vehicle state and evaluate every rule.
    ///
    /// A snapshot failure classifies as `LvError` without touching any rule.
    pub fn step(&mut self, state: &VehicleState) -> FaultStatus {
        match state.copy_state() {
            Ok(snapshot) => self.evaluate(&snapshot),
            Err(e) => {
                let _span = self.ctx.span().enter();
                warn!("snapshot failed, reporting LV error: {e}");
                self.status = FaultStatus::LvError;
                self.status
            }
        }
    }

    /// Evaluate every rule against `snapshot` and fold the result into the
    /// latched word.
    pub fn evaluate(&mut self, snapshot: &VehicleStateData) -> FaultStatus {
        let config = self.ctx.config();
        let mut raised = self.pedals.evaluate(&snapshot.inputs, &config.inputs)
            | self.battery.evaluate(snapshot, &config.bms);
        for rule in &mut self.extensions {
            raised |= rule.evaluate(snapshot, config);
        }

        let new_bits = raised.difference(self.latched);
        if !new_bits.is_empty() {
            let _span = self.ctx.span().enter();
            error!(flags = ?new_bits, latched = ?(self.latched | raised), "fault latched");
        }
        self.latched |= raised;
        self.status = self.latched.status();
        self.status
    }

    /// Latched fault word.
    #[inline]
    pub fn latched(&self) -> FaultFlags {
        self.latched
    }

    /// Classification from the most recent step.
    #[inline]
    pub fn status(&self) -> FaultStatus {
        self.status
    }

    /// Maintenance action: clear the latched word and every debounce timer.
    pub fn reset_latched(&mut self) {
        let _span = self.ctx.span().enter();
        info!(cleared = ?self.latched, "latched faults reset");
        self.latched = FaultFlags::empty();
        self.status = FaultStatus::Init;
        self.pedals.reset();
        self.battery.reset();
        for rule in &mut self.extensions {
            rule.reset();
        }
    }
}

impl std::fmt::Debug for FaultManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultManager")
            .field("latched", &self.latched)
            .field("status", &self.status)
            .field("extensions", &self.extensions.len())
            .finish()
    }
}
