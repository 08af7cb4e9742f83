//! Periodic task scheduling.
//!
//! A single [`TaskTimer`] ticks at the base period and notifies each
//! registered task every `divider` ticks. Each task runs on its own thread
//! and waits on its [`Notification`] with a bounded timeout:
//!
//! - a notified wake runs the task body once,
//! - a timeout-only wake skips the cycle,
//! - the body is never invoked concurrently with itself.
//!
//! Tasks run until the shared `running` flag is cleared.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use heapless::Vec as HVec;
use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{debug, info, trace};
use vcu_common::consts::MAX_TASKS;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// Per-task timing statistics. O(1) update, no allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    /// Task bodies executed.
    pub cycle_count: u64,
    /// Last body duration [ns].
    pub last_cycle_ns: u64,
    pub min_cycle_ns: u64,
    pub max_cycle_ns: u64,
    /// Running sum for average computation.
    pub sum_cycle_ns: u64,
    /// Wakes that ended by timeout without a notification.
    pub timeouts: u64,
    /// Notifications coalesced into a single wake.
    pub missed: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: u64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            timeouts: 0,
            missed: 0,
        }
    }

    /// Record one body duration.
    #[inline]
    pub fn record(&mut self, duration_ns: u64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
    }

    /// Average body duration [ns] (0 if nothing ran).
    #[inline]
    pub fn avg_cycle_ns(&self) -> u64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Notification ───────────────────────────────────────────────────

/// Counting wake-up signal between the task timer and one task.
#[derive(Debug, Default)]
pub struct Notification {
    pending: Mutex<u32>,
    cond: Condvar,
}

impl Notification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post one wake-up.
    pub fn give(&self) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_add(1);
        self.cond.notify_one();
    }

    /// Wait up to `timeout` for a wake-up, then clear the count.
    ///
    /// Returns the number of wake-ups consumed; 0 means the wait timed out.
    pub fn take(&self, timeout: Duration) -> u32 {
        let mut pending = self.pending.lock();
        if *pending == 0 {
            let _ = self.cond.wait_for(&mut pending, timeout);
        }
        std::mem::take(&mut *pending)
    }
}

// ─── Task Timer ─────────────────────────────────────────────────────

/// Task timer registration failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskTimerError {
    #[error("task timer full")]
    Full,

    #[error("tick divider must be non-zero")]
    InvalidDivider,

    #[error("failed to spawn thread: {0}")]
    Spawn(String),
}

#[derive(Debug)]
struct TimerSlot {
    divider: u32,
    counter: u32,
    notification: Arc<Notification>,
}

/// Shared tick source driving every periodic task.
#[derive(Debug)]
pub struct TaskTimer {
    base_period: Duration,
    slots: HVec<TimerSlot, MAX_TASKS>,
}

impl TaskTimer {
    pub fn new(base_period: Duration) -> Self {
        Self {
            base_period,
            slots: HVec::new(),
        }
    }

    #[inline]
    pub fn base_period(&self) -> Duration {
        self.base_period
    }

    /// Register a task notified every `divider` base ticks.
    pub fn register(&mut self, divider: u32) -> Result<Arc<Notification>, TaskTimerError> {
        if divider == 0 {
            return Err(TaskTimerError::InvalidDivider);
        }
        let notification = Arc::new(Notification::new());
        self.slots
            .push(TimerSlot {
                divider,
                counter: 1,
                notification: Arc::clone(&notification),
            })
            .map_err(|_| TaskTimerError::Full)?;
        Ok(notification)
    }

    /// Advance every slot by one base tick.
    pub fn tick(&mut self) {
        for slot in &mut self.slots {
            if slot.counter >= slot.divider {
                slot.counter = 1;
                slot.notification.give();
            } else {
                slot.counter += 1;
            }
        }
    }

    /// Run the tick source on its own thread until `running` is cleared.
    pub fn start(mut self, running: Arc<AtomicBool>) -> Result<JoinHandle<()>, TaskTimerError> {
        thread::Builder::new()
            .name("task_timer".into())
            .spawn(move || {
                info!(
                    period_us = self.base_period.as_micros() as u64,
                    tasks = self.slots.len(),
                    "task timer started"
                );
                let mut next = Instant::now() + self.base_period;
                while running.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if next > now {
                        thread::sleep(next - now);
                    }
                    self.tick();
                    next += self.base_period;
                }
                info!("task timer stopped");
            })
            .map_err(|e| TaskTimerError::Spawn(e.to_string()))
    }
}

// ─── Periodic Tasks ─────────────────────────────────────────────────

/// One logical periodic component.
pub trait PeriodicTask: Send {
    fn name(&self) -> &'static str;

    /// One cycle of work. Must not block beyond bounded lock waits.
    fn step(&mut self);
}

impl<T: PeriodicTask + ?Sized> PeriodicTask for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn step(&mut self) {
        (**self).step()
    }
}

/// Spawn `task` on its own thread, woken by `notification`.
///
/// Returns the task's statistics when the thread exits.
pub fn spawn_periodic<T: PeriodicTask + 'static>(
    mut task: T,
    notification: Arc<Notification>,
    block_time: Duration,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<CycleStats>, TaskTimerError> {
    let name = task.name();
    thread::Builder::new()
        .name(name.into())
        .spawn(move || {
            let mut stats = CycleStats::new();
            debug!(task = name, "task started");
            while running.load(Ordering::Acquire) {
                let wakes = notification.take(block_time);
                if wakes == 0 {
                    stats.timeouts += 1;
                    trace!(task = name, "notification timeout, cycle skipped");
                    continue;
                }
                stats.missed += u64::from(wakes - 1);

                let start = Instant::now();
                task.step();
                stats.record(start.elapsed().as_nanos() as u64);
            }
            info!(
                task = name,
                cycles = stats.cycle_count,
                avg_ns = stats.avg_cycle_ns(),
                max_ns = stats.max_cycle_ns,
                timeouts = stats.timeouts,
                "task stopped"
            );
            stats
        })
        .map_err(|e| TaskTimerError::Spawn(e.to_string()))
}
