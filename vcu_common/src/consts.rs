//! Scheduling constants shared by every periodic task.

/// Period of the base tick source in milliseconds.
pub const BASE_TICK_MS: u32 = 1;

/// Default supervisory tick period in milliseconds (100 Hz).
pub const DEFAULT_TICK_PERIOD_MS: u32 = 10;

/// Default maximum wait for a task notification before the cycle is skipped.
pub const DEFAULT_BLOCK_TIME_MS: u32 = 100;

/// Default maximum wait for the vehicle state lock.
pub const DEFAULT_STATE_LOCK_TIMEOUT_MS: u32 = 5;

/// Maximum number of tasks the task timer can drive.
pub const MAX_TASKS: usize = 8;

/// Maximum number of breakpoints in a torque map.
pub const MAX_TORQUE_MAP_POINTS: usize = 16;

/// Number of switchable low-voltage power channels.
pub const POWER_CHANNEL_COUNT: u8 = 8;
