//! Fault bitflags and the fault classification returned by the fault manager.
//!
//! The 32-bit fault word is split into two partitions:
//! - low byte (`LV_ERROR_MASK`): low-voltage system errors, communication
//!   timeouts. These keep the vehicle in LV startup but block HV.
//! - upper 24 bits (`FAULT_MASK`): safety faults. Any of these forces the
//!   supervisory state machine into `Fault`.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

bitflags! {
    /// Latched fault word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FaultFlags: u32 {
        // ── LV_ERROR partition ──
        /// BMS stopped broadcasting.
        const BMS_TIMEOUT         = 0x0000_0001;
        /// Inverter stopped broadcasting.
        const INV_TIMEOUT         = 0x0000_0002;
        /// Inverter reports a state that blocks HV enable.
        const INV_LV_STATE        = 0x0000_0004;

        // ── FAULT partition ──
        /// Accelerator sensor outside its calibrated range.
        const ACCEL_RANGE         = 0x0000_0100;
        /// Accelerator sensors A and B disagree.
        const ACCEL_CONSISTENCY   = 0x0000_0200;
        /// Brake sensor outside its calibrated range.
        const BRAKE_RANGE         = 0x0000_0400;
        /// Brake sensors disagree.
        const BRAKE_CONSISTENCY   = 0x0000_0800;
        /// Accelerator and brake pressed together.
        const PEDAL_ABUSE         = 0x0000_1000;
        const BMS_CELL_TEMP       = 0x0000_2000;
        const BMS_CURRENT         = 0x0000_4000;
        const BMS_CELL_VOLTAGE    = 0x0000_8000;
        const BMS_LOW_SOC         = 0x0001_0000;
        /// BMS asserted its own fault output.
        const BMS_FAULT_INDICATOR = 0x0002_0000;
        const INV_OVER_TEMP       = 0x0004_0000;
        const INV_IGBT_TEMP       = 0x0008_0000;
        const INV_MOTOR_TEMP      = 0x0010_0000;
        const INV_CURRENT         = 0x0020_0000;
        const INV_FAULT_INDICATOR = 0x0040_0000;
        const INV_FAULT_MESSAGE   = 0x0080_0000;
        const INV_FAULT_STATE     = 0x0100_0000;
    }
}

impl FaultFlags {
    /// Partition of low-voltage errors.
    pub const LV_ERROR_MASK: u32 = 0x0000_00FF;
    /// Partition of safety faults.
    pub const FAULT_MASK: u32 = 0xFFFF_FF00;

    /// Returns true if any FAULT-partition bit is set.
    #[inline]
    pub const fn has_fault(&self) -> bool {
        self.bits() & Self::FAULT_MASK != 0
    }

    /// Returns true if any LV_ERROR-partition bit is set.
    #[inline]
    pub const fn has_lv_error(&self) -> bool {
        self.bits() & Self::LV_ERROR_MASK != 0
    }

    /// Classify the word. FAULT wins over LV_ERROR.
    #[inline]
    pub const fn status(&self) -> FaultStatus {
        if self.has_fault() {
            FaultStatus::Fault
        } else if self.has_lv_error() {
            FaultStatus::LvError
        } else {
            FaultStatus::NoFault
        }
    }
}

impl Default for FaultFlags {
    fn default() -> Self {
        Self::empty()
    }
}

const_assert_eq!(FaultFlags::LV_ERROR_MASK & FaultFlags::FAULT_MASK, 0);
const_assert_eq!(FaultFlags::LV_ERROR_MASK | FaultFlags::FAULT_MASK, u32::MAX);
const_assert_eq!(
    (FaultFlags::BMS_TIMEOUT.bits() | FaultFlags::INV_TIMEOUT.bits() | FaultFlags::INV_LV_STATE.bits())
        & FaultFlags::FAULT_MASK,
    0
);
const_assert_eq!(FaultFlags::ACCEL_RANGE.bits() & FaultFlags::LV_ERROR_MASK, 0);

/// Result of one fault manager evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FaultStatus {
    /// No evaluation has run yet.
    Init = 0,
    NoFault = 1,
    LvError = 2,
    Fault = 3,
}

impl FaultStatus {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Init),
            1 => Some(Self::NoFault),
            2 => Some(Self::LvError),
            3 => Some(Self::Fault),
            _ => None,
        }
    }
}

impl Default for FaultStatus {
    fn default() -> Self {
        Self::Init
    }
}
