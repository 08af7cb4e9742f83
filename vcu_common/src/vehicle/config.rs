//! Static vehicle configuration: sensor calibration, battery and inverter
//! limits, supervisory timing and torque maps.
//!
//! Every section deserializes with defaults, so an empty `[vehicle]` table
//! yields the reference calibration. `validate()` must pass before the fault
//! manager is constructed.

use heapless::Vec as HVec;
use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_STATE_LOCK_TIMEOUT_MS, DEFAULT_TICK_PERIOD_MS, MAX_TORQUE_MAP_POINTS};

/// Full ADC range of a 12-bit pedal sensor.
pub const PEDAL_RAW_MAX: u16 = 4095;

// ─── Top-Level Config ───────────────────────────────────────────────

/// Static vehicle configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleConfig {
    #[serde(default)]
    pub inputs: InputSensorsConfig,
    #[serde(default)]
    pub bms: BmsConfig,
    #[serde(default)]
    pub inverter: InverterConfig,
    #[serde(default)]
    pub vcu: VcuLogicConfig,
    #[serde(default)]
    pub torque_maps: TorqueMapsConfig,
}

impl VehicleConfig {
    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), String> {
        self.inputs.validate()?;
        self.bms.validate()?;
        self.vcu.validate()?;
        if !self.inverter.torque_limit_nm.is_finite() || self.inverter.torque_limit_nm <= 0.0 {
            return Err(format!(
                "inverter.torque_limit_nm {} must be positive",
                self.inverter.torque_limit_nm
            ));
        }
        self.torque_maps
            .forward
            .validate()
            .map_err(|e| format!("torque_maps.forward: {e}"))?;
        self.torque_maps
            .reverse
            .validate()
            .map_err(|e| format!("torque_maps.reverse: {e}"))?;
        Ok(())
    }
}

// ─── Input Sensors ──────────────────────────────────────────────────

/// Raw ADC range one pedal sensor is calibrated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PedalCalibration {
    pub raw_lower: u16,
    pub raw_upper: u16,
}

impl PedalCalibration {
    /// True if `raw` lies inside `[raw_lower, raw_upper]`.
    #[inline]
    pub const fn contains(&self, raw: u16) -> bool {
        raw >= self.raw_lower && raw <= self.raw_upper
    }

    /// Scale `raw` into `[0, 1]`, clamped.
    pub fn scale(&self, raw: u16) -> f32 {
        let span = self.raw_upper.saturating_sub(self.raw_lower);
        if span == 0 {
            return 0.0;
        }
        let offset = raw.saturating_sub(self.raw_lower).min(span);
        f32::from(offset) / f32::from(span)
    }
}

impl Default for PedalCalibration {
    fn default() -> Self {
        Self {
            raw_lower: 0,
            raw_upper: PEDAL_RAW_MAX,
        }
    }
}

/// Dual-sensor pedal configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PedalConfig {
    #[serde(default)]
    pub calibration_a: PedalCalibration,
    #[serde(default)]
    pub calibration_b: PedalCalibration,
    /// Maximum allowed `|a - b|` as a pedal fraction.
    #[serde(default = "default_consistency_limit")]
    pub consistency_limit: f32,
}

fn default_consistency_limit() -> f32 {
    0.1
}

impl Default for PedalConfig {
    fn default() -> Self {
        Self {
            calibration_a: PedalCalibration::default(),
            calibration_b: PedalCalibration::default(),
            consistency_limit: default_consistency_limit(),
        }
    }
}

impl PedalConfig {
    fn validate(&self, name: &str) -> Result<(), String> {
        for (sensor, cal) in [("a", &self.calibration_a), ("b", &self.calibration_b)] {
            if cal.raw_lower > cal.raw_upper {
                return Err(format!(
                    "{name}.calibration_{sensor}: raw_lower {} > raw_upper {}",
                    cal.raw_lower, cal.raw_upper
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.consistency_limit) {
            return Err(format!(
                "{name}.consistency_limit {} out of range [0, 1]",
                self.consistency_limit
            ));
        }
        Ok(())
    }
}

/// Accelerator plus brake pressed together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PedalAbuseConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_abuse_threshold")]
    pub accel_threshold: f32,
    #[serde(default = "default_abuse_threshold")]
    pub brake_threshold: f32,
}

fn default_abuse_threshold() -> f32 {
    0.1
}

impl Default for PedalAbuseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            accel_threshold: default_abuse_threshold(),
            brake_threshold: default_abuse_threshold(),
        }
    }
}

/// Pedal sensor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputSensorsConfig {
    #[serde(default)]
    pub accel_pedal: PedalConfig,
    #[serde(default)]
    pub brake_pedal: PedalConfig,
    #[serde(default)]
    pub pedal_abuse: PedalAbuseConfig,
    /// How long a pedal condition must persist before it latches [ms].
    #[serde(default = "default_data_timeout_ms")]
    pub invalid_data_timeout_ms: u32,
}

fn default_data_timeout_ms() -> u32 {
    100
}

impl Default for InputSensorsConfig {
    fn default() -> Self {
        Self {
            accel_pedal: PedalConfig::default(),
            brake_pedal: PedalConfig::default(),
            pedal_abuse: PedalAbuseConfig::default(),
            invalid_data_timeout_ms: default_data_timeout_ms(),
        }
    }
}

impl InputSensorsConfig {
    fn validate(&self) -> Result<(), String> {
        self.accel_pedal.validate("inputs.accel_pedal")?;
        self.brake_pedal.validate("inputs.brake_pedal")?;
        Ok(())
    }
}

// ─── BMS ────────────────────────────────────────────────────────────

/// Battery management system limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BmsConfig {
    /// [°C]
    #[serde(default = "default_max_temp")]
    pub max_cell_temp: f32,
    /// Discharge limit [A]. Charge and regen current are not limited here.
    #[serde(default = "default_max_current")]
    pub max_current: f32,
    /// [V]
    #[serde(default = "default_max_cell_voltage")]
    pub max_cell_voltage: f32,
    /// [%]
    #[serde(default = "default_min_soc")]
    pub min_soc: f32,
    /// Persistence before a BMS limit violation latches [ms].
    #[serde(default = "default_data_timeout_ms")]
    pub invalid_data_timeout_ms: u32,
    #[serde(default = "default_data_timeout_ms")]
    pub can_timeout_ms: u32,
    #[serde(default = "default_bms_base_id")]
    pub base_can_id: u16,
}

fn default_max_temp() -> f32 {
    75.0
}
fn default_max_current() -> f32 {
    450.0
}
fn default_max_cell_voltage() -> f32 {
    4.2
}
fn default_min_soc() -> f32 {
    10.0
}
fn default_bms_base_id() -> u16 {
    0x300
}

impl Default for BmsConfig {
    fn default() -> Self {
        Self {
            max_cell_temp: default_max_temp(),
            max_current: default_max_current(),
            max_cell_voltage: default_max_cell_voltage(),
            min_soc: default_min_soc(),
            invalid_data_timeout_ms: default_data_timeout_ms(),
            can_timeout_ms: default_data_timeout_ms(),
            base_can_id: default_bms_base_id(),
        }
    }
}

impl BmsConfig {
    fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.min_soc) {
            return Err(format!("bms.min_soc {} out of range [0, 100]", self.min_soc));
        }
        if self.base_can_id > 0x7FD {
            return Err(format!(
                "bms.base_can_id {:#x} leaves no room for three frames",
                self.base_can_id
            ));
        }
        Ok(())
    }
}

// ─── Inverter ───────────────────────────────────────────────────────

/// Motor inverter limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InverterConfig {
    #[serde(default = "default_max_temp")]
    pub max_internal_temp: f32,
    #[serde(default = "default_max_temp")]
    pub max_igbt_temp: f32,
    #[serde(default = "default_max_temp")]
    pub max_motor_temp: f32,
    #[serde(default = "default_max_current")]
    pub max_current_draw: f32,
    #[serde(default = "default_data_timeout_ms")]
    pub invalid_data_timeout_ms: u32,
    #[serde(default = "default_data_timeout_ms")]
    pub can_timeout_ms: u32,
    /// Largest torque magnitude the command path accepts [Nm].
    #[serde(default = "default_torque_limit")]
    pub torque_limit_nm: f32,
}

fn default_torque_limit() -> f32 {
    500.0
}

impl Default for InverterConfig {
    fn default() -> Self {
        Self {
            max_internal_temp: default_max_temp(),
            max_igbt_temp: default_max_temp(),
            max_motor_temp: default_max_temp(),
            max_current_draw: default_max_current(),
            invalid_data_timeout_ms: default_data_timeout_ms(),
            can_timeout_ms: default_data_timeout_ms(),
            torque_limit_nm: default_torque_limit(),
        }
    }
}

// ─── Supervisory Timing ─────────────────────────────────────────────

/// Timing of the supervisory state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcuLogicConfig {
    /// Supervisory tick period [ms].
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u32,
    /// Maximum time allowed for HV precharge [ms].
    #[serde(default = "default_hv_charge_timeout_ms")]
    pub hv_charge_timeout_ms: u32,
    /// Settling time after HV precharge [ms]. Informational.
    #[serde(default = "default_hv_active_wait_ms")]
    pub hv_active_state_wait_ms: u32,
    /// Maximum wait for the vehicle state lock [ms].
    #[serde(default = "default_state_lock_timeout_ms")]
    pub state_lock_timeout_ms: u32,
}

fn default_tick_period_ms() -> u32 {
    DEFAULT_TICK_PERIOD_MS
}
fn default_hv_charge_timeout_ms() -> u32 {
    7000
}
fn default_hv_active_wait_ms() -> u32 {
    500
}
fn default_state_lock_timeout_ms() -> u32 {
    DEFAULT_STATE_LOCK_TIMEOUT_MS
}

impl Default for VcuLogicConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: default_tick_period_ms(),
            hv_charge_timeout_ms: default_hv_charge_timeout_ms(),
            hv_active_state_wait_ms: default_hv_active_wait_ms(),
            state_lock_timeout_ms: default_state_lock_timeout_ms(),
        }
    }
}

impl VcuLogicConfig {
    fn validate(&self) -> Result<(), String> {
        if self.tick_period_ms == 0 {
            return Err("vcu.tick_period_ms must be non-zero".to_string());
        }
        if self.state_lock_timeout_ms >= self.tick_period_ms {
            return Err(format!(
                "vcu.state_lock_timeout_ms {} must be below tick_period_ms {}",
                self.state_lock_timeout_ms, self.tick_period_ms
            ));
        }
        Ok(())
    }
}

// ─── Torque Maps ────────────────────────────────────────────────────

/// Breakpoint table for one direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorqueMapConfig {
    /// Pedal fractions, strictly ascending.
    pub pedal: HVec<f32, MAX_TORQUE_MAP_POINTS>,
    /// Torque [Nm] at each pedal breakpoint.
    pub torque: HVec<f32, MAX_TORQUE_MAP_POINTS>,
}

impl TorqueMapConfig {
    fn from_slices(pedal: &[f32], torque: &[f32]) -> Self {
        let mut cfg = Self {
            pedal: HVec::new(),
            torque: HVec::new(),
        };
        // Both tables are compile-time constants below capacity.
        let _ = cfg.pedal.extend_from_slice(pedal);
        let _ = cfg.torque.extend_from_slice(torque);
        cfg
    }

    /// Reference forward map (continuous rating near 213 Nm).
    pub fn default_forward() -> Self {
        Self::from_slices(&[0.0, 0.1, 0.5, 0.7, 1.0], &[0.0, 0.0, 100.0, 200.0, 500.0])
    }

    /// Reference reverse map.
    pub fn default_reverse() -> Self {
        Self::from_slices(&[0.0, 0.1, 0.5, 0.7, 1.0], &[0.0, 0.0, 20.0, 75.0, 75.0])
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.pedal.len() != self.torque.len() {
            return Err(format!(
                "{} pedal breakpoints but {} torque values",
                self.pedal.len(),
                self.torque.len()
            ));
        }
        if self.pedal.len() < 2 {
            return Err("at least two breakpoints required".to_string());
        }
        if self.pedal.windows(2).any(|w| !(w[0] < w[1])) {
            return Err("pedal breakpoints must be strictly ascending".to_string());
        }
        let (first, last) = (self.pedal[0], self.pedal[self.pedal.len() - 1]);
        if first > 0.0 || last < 1.0 {
            return Err(format!("pedal range [{first}, {last}] does not cover [0, 1]"));
        }
        if self.torque.iter().any(|t| !t.is_finite()) {
            return Err("torque values must be finite".to_string());
        }
        Ok(())
    }
}

/// Forward and reverse torque maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorqueMapsConfig {
    #[serde(default = "TorqueMapConfig::default_forward")]
    pub forward: TorqueMapConfig,
    #[serde(default = "TorqueMapConfig::default_reverse")]
    pub reverse: TorqueMapConfig,
}

impl Default for TorqueMapsConfig {
    fn default() -> Self {
        Self {
            forward: TorqueMapConfig::default_forward(),
            reverse: TorqueMapConfig::default_reverse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let cfg = VehicleConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.vcu.tick_period_ms, 10);
        assert_eq!(cfg.vcu.hv_charge_timeout_ms, 7000);
        assert_eq!(cfg.bms.base_can_id, 0x300);
        assert_eq!(cfg.inputs.invalid_data_timeout_ms, 100);
        assert!(!cfg.inputs.pedal_abuse.enabled);
    }

    #[test]
    fn test_calibration_contains_and_scale() {
        let cal = PedalCalibration {
            raw_lower: 100,
            raw_upper: 1100,
        };
        assert!(cal.contains(100));
        assert!(cal.contains(1100));
        assert!(!cal.contains(99));
        assert!(!cal.contains(1101));
        assert_eq!(cal.scale(600), 0.5);
        assert_eq!(cal.scale(0), 0.0);
        assert_eq!(cal.scale(4095), 1.0);
    }

    #[test]
    fn test_zero_tick_rejected() {
        let mut cfg = VehicleConfig::default();
        cfg.vcu.tick_period_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_inverted_calibration_rejected() {
        let mut cfg = VehicleConfig::default();
        cfg.inputs.brake_pedal.calibration_b = PedalCalibration {
            raw_lower: 200,
            raw_upper: 100,
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("brake_pedal.calibration_b"), "{err}");
    }

    #[test]
    fn test_torque_map_must_cover_domain() {
        let map = TorqueMapConfig::from_slices(&[0.2, 1.0], &[0.0, 10.0]);
        assert!(map.validate().is_err());
    }

    #[test]
    fn test_torque_map_must_ascend() {
        let map = TorqueMapConfig::from_slices(&[0.0, 0.5, 0.5, 1.0], &[0.0, 1.0, 2.0, 3.0]);
        assert!(map.validate().is_err());
    }

    #[test]
    fn test_torque_map_length_mismatch() {
        let map = TorqueMapConfig::from_slices(&[0.0, 1.0], &[0.0]);
        assert!(map.validate().is_err());
    }
}
