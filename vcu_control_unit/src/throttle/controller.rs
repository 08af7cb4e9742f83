//! Throttle controller.
//!
//! Enable and direction live under the controller's own lock. That lock and
//! the vehicle state lock are never held at the same time: the pedal is
//! read and the vehicle state guard dropped before the settings are read.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, trace, warn};
use vcu_common::vehicle::control::{Direction, VehicleControl};

use super::torque_map::{TorqueMap, TorqueMapError};
use crate::context::VcuContext;
use crate::cycle::PeriodicTask;
use crate::vehicle_state::VehicleState;

/// Throttle failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThrottleError {
    #[error("throttle lock not acquired within {0:?}")]
    LockTimeout(Duration),

    #[error("invalid {direction} torque map: {source}")]
    TorqueMap {
        direction: &'static str,
        #[source]
        source: TorqueMapError,
    },
}

/// Torque authorization set by the supervisory state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThrottleSettings {
    pub enabled: bool,
    pub direction: Direction,
}

/// Pedal to torque command path.
pub struct ThrottleController {
    ctx: VcuContext,
    state: Arc<VehicleState>,
    control: Arc<dyn VehicleControl>,
    forward: TorqueMap,
    reverse: TorqueMap,
    settings: Mutex<ThrottleSettings>,
    lock_timeout: Duration,
}

impl ThrottleController {
    /// Build the controller disabled, in neutral.
    pub fn new(
        ctx: &VcuContext,
        state: Arc<VehicleState>,
        control: Arc<dyn VehicleControl>,
    ) -> Result<Self, ThrottleError> {
        let ctx = ctx.module("throttle");
        let maps = &ctx.config().torque_maps;
        let forward = TorqueMap::from_config(&maps.forward).map_err(|source| {
            ThrottleError::TorqueMap {
                direction: "forward",
                source,
            }
        })?;
        let reverse = TorqueMap::from_config(&maps.reverse).map_err(|source| {
            ThrottleError::TorqueMap {
                direction: "reverse",
                source,
            }
        })?;
        let lock_timeout = state.lock_timeout();

        ctx.span().in_scope(|| {
            info!(
                forward_points = forward.points().len(),
                reverse_points = reverse.points().len(),
                "throttle initialised"
            )
        });

        Ok(Self {
            ctx,
            state,
            control,
            forward,
            reverse,
            settings: Mutex::new(ThrottleSettings::default()),
            lock_timeout,
        })
    }

    fn with_settings<R>(&self, f: impl FnOnce(&mut ThrottleSettings) -> R) -> Result<R, ThrottleError> {
        let mut settings = self
            .settings
            .try_lock_for(self.lock_timeout)
            .ok_or(ThrottleError::LockTimeout(self.lock_timeout))?;
        Ok(f(&mut settings))
    }

    pub fn set_torque_enabled(&self, enabled: bool) -> Result<(), ThrottleError> {
        self.with_settings(|s| s.enabled = enabled)?;
        self.ctx.span().in_scope(|| debug!(enabled, "torque authorization"));
        Ok(())
    }

    pub fn set_motor_direction(&self, direction: Direction) -> Result<(), ThrottleError> {
        self.with_settings(|s| s.direction = direction)?;
        self.ctx.span().in_scope(|| debug!(?direction, "motor direction"));
        Ok(())
    }

    pub fn settings(&self) -> Result<ThrottleSettings, ThrottleError> {
        self.with_settings(|s| *s)
    }

    /// Torque for `pedal` under `settings`. Zero when disabled or in neutral.
    pub fn torque_for(&self, pedal: f32, settings: ThrottleSettings) -> f32 {
        if !settings.enabled {
            return 0.0;
        }
        match settings.direction {
            Direction::Forward => self.forward.interpolate(pedal),
            Direction::Reverse => self.reverse.interpolate(pedal),
            Direction::Neutral => 0.0,
        }
    }

    /// One throttle cycle. Returns the torque that was requested.
    ///
    /// A vehicle state lock miss reads the pedal as 0; a settings lock miss
    /// reads as disabled. A command is issued either way.
    pub fn step(&self) -> f32 {
        let _span = self.ctx.span().enter();

        let pedal = match self.state.read(|d| d.inputs.accel) {
            Ok(pedal) => pedal,
            Err(e) => {
                warn!("pedal read failed, using 0: {e}");
                0.0
            }
        };
        let settings = self.settings().unwrap_or_else(|e| {
            warn!("settings read failed, torque disabled: {e}");
            ThrottleSettings::default()
        });

        let torque = self.torque_for(pedal, settings);
        trace!(pedal, torque, direction = ?settings.direction, "torque request");
        if let Err(e) = self.control.request_motor_torque(torque, settings.direction) {
            warn!("torque request rejected: {e}");
        }
        torque
    }
}

impl std::fmt::Debug for ThrottleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottleController")
            .field("forward", &self.forward)
            .field("reverse", &self.reverse)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Periodic task running [`ThrottleController::step`].
#[derive(Debug, Clone)]
pub struct ThrottleTask {
    controller: Arc<ThrottleController>,
}

impl ThrottleTask {
    pub fn new(controller: Arc<ThrottleController>) -> Self {
        Self { controller }
    }
}

impl PeriodicTask for ThrottleTask {
    fn name(&self) -> &'static str {
        "throttle"
    }

    fn step(&mut self) {
        self.controller.step();
    }
}
