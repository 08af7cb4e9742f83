//! Supervisory loop and boot sequence.
//!
//! [`VehicleStateManager`] hosts the [`Vsm`] as a periodic task and publishes
//! its state through a lock-free [`StateHandle`]. [`Vcu::boot`] wires every
//! component together; any failure surfaces as an [`InitError`] and the
//! caller halts in fail-safe.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};
use vcu_common::config::ConfigError;
use vcu_common::vehicle::control::{ControlError, VehicleControl};
use vcu_common::vehicle::fault::{FaultFlags, FaultStatus};

use crate::config::VcuConfig;
use crate::context::VcuContext;
use crate::cycle::{
    CycleStats, Notification, PeriodicTask, TaskTimer, TaskTimerError, spawn_periodic,
};
use crate::device::{BmsDecoder, DeviceTask, FrameQueue, FrameRouter, InverterDecoder};
use crate::fault::FaultManagerError;
use crate::state::{Vsm, VsmState};
use crate::throttle::{ThrottleController, ThrottleError, ThrottleTask};
use crate::vehicle_state::VehicleState;

// ─── State Handle ───────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Published {
    state: AtomicU8,
    status: AtomicU8,
    latched: AtomicU32,
    ticks: AtomicU64,
    reset_requested: AtomicBool,
}

/// Lock-free view of the supervisory state for diagnostics and maintenance.
#[derive(Debug, Clone, Default)]
pub struct StateHandle {
    inner: Arc<Published>,
}

impl StateHandle {
    pub fn state(&self) -> VsmState {
        VsmState::from_u8(self.inner.state.load(Ordering::Acquire)).unwrap_or_default()
    }

    pub fn fault_status(&self) -> FaultStatus {
        FaultStatus::from_u8(self.inner.status.load(Ordering::Acquire)).unwrap_or_default()
    }

    pub fn latched(&self) -> FaultFlags {
        FaultFlags::from_bits_retain(self.inner.latched.load(Ordering::Acquire))
    }

    /// Supervisory ticks completed.
    pub fn ticks(&self) -> u64 {
        self.inner.ticks.load(Ordering::Acquire)
    }

    /// Ask the supervisory task to clear the latched fault word on its next
    /// tick. The VSM itself stays in `Fault` once there.
    pub fn request_fault_reset(&self) {
        self.inner.reset_requested.store(true, Ordering::Release);
    }

    fn take_reset_request(&self) -> bool {
        self.inner.reset_requested.swap(false, Ordering::AcqRel)
    }

    fn publish(&self, state: VsmState, status: FaultStatus, latched: FaultFlags) {
        self.inner.state.store(state as u8, Ordering::Release);
        self.inner.status.store(status as u8, Ordering::Release);
        self.inner.latched.store(latched.bits(), Ordering::Release);
        self.inner.ticks.fetch_add(1, Ordering::AcqRel);
    }
}

// ─── Vehicle State Manager ──────────────────────────────────────────

/// Periodic task ticking the VSM.
pub struct VehicleStateManager {
    ctx: VcuContext,
    vsm: Vsm,
    control: Arc<dyn VehicleControl>,
    vehicle: Arc<VehicleState>,
    handle: StateHandle,
    dash_on: bool,
}

impl VehicleStateManager {
    pub fn new(
        ctx: &VcuContext,
        vsm: Vsm,
        control: Arc<dyn VehicleControl>,
        vehicle: Arc<VehicleState>,
    ) -> Self {
        Self {
            ctx: ctx.module("supervisor"),
            vsm,
            control,
            vehicle,
            handle: StateHandle::default(),
            dash_on: false,
        }
    }

    pub fn handle(&self) -> StateHandle {
        self.handle.clone()
    }

    pub fn vsm(&self) -> &Vsm {
        &self.vsm
    }

    /// One supervisory tick. Returns the state after the tick.
    pub fn step(&mut self) -> VsmState {
        if self.handle.take_reset_request() {
            self.vsm.fault_manager_mut().reset_latched();
        }

        let state = self.vsm.step();
        self.handle.publish(
            state,
            self.vsm.last_status(),
            self.vsm.fault_manager().latched(),
        );

        let led_on = state.is_active();
        if led_on != self.dash_on {
            self.dash_on = led_on;
            let _span = self.ctx.span().enter();
            if let Err(e) = self.control.set_dash(led_on) {
                warn!("dash LED update failed: {e}");
            }
            if let Err(e) = self.vehicle.write(|d| d.dash.led_on = led_on) {
                warn!("dash LED state not recorded: {e}");
            }
        }
        state
    }
}

impl PeriodicTask for VehicleStateManager {
    fn name(&self) -> &'static str {
        "vsm"
    }

    fn step(&mut self) {
        VehicleStateManager::step(self);
    }
}

impl std::fmt::Debug for VehicleStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VehicleStateManager")
            .field("vsm", &self.vsm)
            .field("dash_on", &self.dash_on)
            .finish()
    }
}

// ─── Boot ───────────────────────────────────────────────────────────

/// Boot failure. Any variant halts the unit in fail-safe with no retry.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("fault manager: {0}")]
    FaultManager(#[from] FaultManagerError),

    #[error("throttle: {0}")]
    Throttle(#[from] ThrottleError),

    #[error("task timer: {0}")]
    TaskTimer(#[from] TaskTimerError),

    #[error("output control: {0}")]
    Control(#[from] ControlError),
}

/// A booted control unit whose tasks have not started yet.
pub struct Vcu {
    ctx: VcuContext,
    vehicle: Arc<VehicleState>,
    throttle: Arc<ThrottleController>,
    handle: StateHandle,
    router: FrameRouter,
    divider: u32,
    block_time: Duration,
    timer: TaskTimer,
    tasks: Vec<(Box<dyn PeriodicTask>, Arc<Notification>)>,
}

impl Vcu {
    /// Build and register every component.
    ///
    /// Registers the inverter and BMS decode tasks, the throttle and the
    /// supervisory task, all at the supervisory tick, then switches on the
    /// configured boot power channels.
    pub fn boot(config: &VcuConfig, control: Arc<dyn VehicleControl>) -> Result<Self, InitError> {
        config.validate()?;
        let ctx = VcuContext::new(config.vehicle.clone());
        let span = ctx.span().clone();
        let _entered = span.enter();
        info!(service = %config.shared.service_name, "boot started");

        let vcu_cfg = &config.vehicle.vcu;
        let vehicle = Arc::new(VehicleState::new(Duration::from_millis(u64::from(
            vcu_cfg.state_lock_timeout_ms,
        ))));
        let throttle = Arc::new(ThrottleController::new(
            &ctx,
            Arc::clone(&vehicle),
            Arc::clone(&control),
        )?);
        let vsm = Vsm::new(
            &ctx,
            Arc::clone(&vehicle),
            Arc::clone(&control),
            Arc::clone(&throttle),
        )?;
        let manager =
            VehicleStateManager::new(&ctx, vsm, Arc::clone(&control), Arc::clone(&vehicle));
        let handle = manager.handle();

        let capacity = config.scheduling.frame_queue_capacity;
        let inverter_frames = Arc::new(FrameQueue::new(capacity));
        let bms_frames = Arc::new(FrameQueue::new(capacity));
        let bms_base = config.vehicle.bms.base_can_id;
        let router = FrameRouter::new(
            Arc::clone(&inverter_frames),
            Arc::clone(&bms_frames),
            bms_base,
        );

        let mut vcu = Self {
            divider: config.scheduling.divider(vcu_cfg.tick_period_ms),
            block_time: Duration::from_millis(u64::from(config.scheduling.block_time_ms)),
            timer: TaskTimer::new(Duration::from_millis(u64::from(
                config.scheduling.base_tick_ms,
            ))),
            tasks: Vec::new(),
            ctx: ctx.clone(),
            vehicle: Arc::clone(&vehicle),
            throttle: Arc::clone(&throttle),
            handle,
            router,
        };

        let divider = vcu.divider;
        vcu.add_task(
            Box::new(DeviceTask::new(
                &ctx,
                inverter_frames,
                InverterDecoder,
                Arc::clone(&vehicle),
            )),
            divider,
        )?;
        vcu.add_task(
            Box::new(DeviceTask::new(
                &ctx,
                bms_frames,
                BmsDecoder::new(bms_base),
                Arc::clone(&vehicle),
            )),
            divider,
        )?;
        vcu.add_task(Box::new(ThrottleTask::new(throttle)), divider)?;
        vcu.add_task(Box::new(manager), divider)?;

        for &channel in &config.outputs.boot_power_channels {
            control.set_power_channel(channel, true)?;
        }

        info!(
            tasks = vcu.tasks.len(),
            tick_ms = vcu_cfg.tick_period_ms,
            divider,
            "boot complete"
        );
        Ok(vcu)
    }

    #[inline]
    pub fn context(&self) -> &VcuContext {
        &self.ctx
    }

    pub fn vehicle(&self) -> Arc<VehicleState> {
        Arc::clone(&self.vehicle)
    }

    pub fn throttle(&self) -> Arc<ThrottleController> {
        Arc::clone(&self.throttle)
    }

    pub fn handle(&self) -> StateHandle {
        self.handle.clone()
    }

    /// Router feeding the device decode tasks.
    pub fn router(&self) -> FrameRouter {
        self.router.clone()
    }

    /// Base ticks per supervisory tick.
    #[inline]
    pub fn divider(&self) -> u32 {
        self.divider
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(task, _)| task.name()).collect()
    }

    /// Register an additional task notified every `divider` base ticks.
    pub fn add_task(&mut self, task: Box<dyn PeriodicTask>, divider: u32) -> Result<(), InitError> {
        let notification = self.timer.register(divider)?;
        self.tasks.push((task, notification));
        Ok(())
    }

    /// Run every task body once, in registration order, without the timer.
    pub fn step_once(&mut self) {
        for (task, _) in &mut self.tasks {
            task.step();
        }
    }

    /// Spawn one thread per task plus the tick source.
    ///
    /// On a spawn failure `running` is cleared so already started threads
    /// wind down.
    pub fn start(self, running: Arc<AtomicBool>) -> Result<VcuThreads, InitError> {
        let _span = self.ctx.span().enter();
        let mut tasks = Vec::with_capacity(self.tasks.len());
        for (task, notification) in self.tasks {
            let name = task.name();
            match spawn_periodic(task, notification, self.block_time, Arc::clone(&running)) {
                Ok(handle) => tasks.push((name, handle)),
                Err(e) => {
                    error!(task = name, "task spawn failed: {e}");
                    running.store(false, Ordering::Release);
                    return Err(e.into());
                }
            }
        }
        let timer = self.timer.start(Arc::clone(&running)).inspect_err(|_| {
            running.store(false, Ordering::Release);
        })?;
        info!(tasks = tasks.len(), "tasks started");
        Ok(VcuThreads { timer, tasks })
    }
}

impl std::fmt::Debug for Vcu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vcu")
            .field("tasks", &self.task_names())
            .field("divider", &self.divider)
            .field("state", &self.handle.state())
            .finish()
    }
}

/// Threads of a started control unit.
#[derive(Debug)]
pub struct VcuThreads {
    timer: JoinHandle<()>,
    tasks: Vec<(&'static str, JoinHandle<CycleStats>)>,
}

impl VcuThreads {
    /// Wait for every thread to exit. Call after clearing `running`.
    ///
    /// Tasks whose thread panicked are reported without statistics.
    pub fn join(self) -> Vec<(&'static str, Option<CycleStats>)> {
        if self.timer.join().is_err() {
            error!("task timer thread panicked");
        }
        self.tasks
            .into_iter()
            .map(|(name, handle)| (name, handle.join().ok()))
            .collect()
    }
}
