//! Canonical vehicle data store.
//!
//! One [`VehicleState`] exists per process. Producers (device decoders) and
//! consumers (fault manager, VSM, throttle) share it through an `Arc`.
//! Access goes through a non-reentrant lock with a bounded wait:
//!
//! - [`VehicleState::acquire`] returns a guard for scalar access. The lock is
//!   released when the guard drops, on every exit path.
//! - [`VehicleState::copy_state`] takes a whole-structure snapshot. This is
//!   the only way to get a consistent multi-field view.
//!
//! A lock timeout is reported as [`StateError::LockTimeout`]; callers apply
//! their own fail-safe policy.

use std::ops::{Deref, DerefMut};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;
use vcu_common::vehicle::state::VehicleStateData;

/// Vehicle state access failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    /// Lock not obtained within the configured wait. Transient.
    #[error("vehicle state lock not acquired within {0:?}")]
    LockTimeout(Duration),
}

/// Lock-guarded vehicle data block.
#[derive(Debug)]
pub struct VehicleState {
    data: Mutex<VehicleStateData>,
    lock_timeout: Duration,
}

impl VehicleState {
    /// Zero-initialise the data block.
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            data: Mutex::new(VehicleStateData::default()),
            lock_timeout,
        }
    }

    #[inline]
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Acquire the lock, waiting at most the configured timeout.
    ///
    /// Holders must not block or take the throttle lock while the guard is
    /// alive.
    pub fn acquire(&self) -> Result<VehicleStateGuard<'_>, StateError> {
        self.data
            .try_lock_for(self.lock_timeout)
            .map(|inner| VehicleStateGuard { inner })
            .ok_or(StateError::LockTimeout(self.lock_timeout))
    }

    /// Explicitly release a guard. Equivalent to dropping it.
    #[inline]
    pub fn release(guard: VehicleStateGuard<'_>) {
        drop(guard);
    }

    /// Atomic snapshot of the whole data block.
    pub fn copy_state(&self) -> Result<VehicleStateData, StateError> {
        self.acquire().map(|guard| *guard)
    }

    /// Snapshot into a caller-owned buffer. `dest` is untouched on failure.
    pub fn copy_state_into(&self, dest: &mut VehicleStateData) -> Result<(), StateError> {
        let guard = self.acquire()?;
        *dest = *guard;
        Ok(())
    }

    /// Run `f` with shared access under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&VehicleStateData) -> R) -> Result<R, StateError> {
        let guard = self.acquire()?;
        Ok(f(&guard))
    }

    /// Run `f` with exclusive access under the lock.
    pub fn write<R>(&self, f: impl FnOnce(&mut VehicleStateData) -> R) -> Result<R, StateError> {
        let mut guard = self.acquire()?;
        Ok(f(&mut guard))
    }
}

/// Scoped access to the vehicle data. Releases the lock on drop.
pub struct VehicleStateGuard<'a> {
    inner: MutexGuard<'a, VehicleStateData>,
}

impl Deref for VehicleStateGuard<'_> {
    type Target = VehicleStateData;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for VehicleStateGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
