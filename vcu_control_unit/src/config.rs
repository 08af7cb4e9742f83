//! TOML configuration loader with validation.
//!
//! One file holds everything the control unit needs:
//!
//! ```toml
//! [shared]
//! service_name = "vcu"
//!
//! [vehicle.bms]
//! max_cell_temp = 60.0
//!
//! [scheduling]
//! block_time_ms = 100
//!
//! [simulation]
//! enabled = true
//! ```
//!
//! Every section is optional; missing values take the reference defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use vcu_common::config::{ConfigError, ConfigLoader, SharedConfig};
use vcu_common::consts::{BASE_TICK_MS, DEFAULT_BLOCK_TIME_MS, POWER_CHANNEL_COUNT};
use vcu_common::vehicle::config::VehicleConfig;

// ─── Scheduling ─────────────────────────────────────────────────────

/// Task timer and queue sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Base tick of the task timer [ms].
    #[serde(default = "default_base_tick_ms")]
    pub base_tick_ms: u32,
    /// Longest wait for a task notification before the cycle is skipped [ms].
    #[serde(default = "default_block_time_ms")]
    pub block_time_ms: u32,
    /// Capacity of each device frame queue.
    #[serde(default = "default_queue_capacity")]
    pub frame_queue_capacity: usize,
}

fn default_base_tick_ms() -> u32 {
    BASE_TICK_MS
}
fn default_block_time_ms() -> u32 {
    DEFAULT_BLOCK_TIME_MS
}
fn default_queue_capacity() -> usize {
    64
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            base_tick_ms: default_base_tick_ms(),
            block_time_ms: default_block_time_ms(),
            frame_queue_capacity: default_queue_capacity(),
        }
    }
}

impl SchedulingConfig {
    /// Base ticks per supervisory tick.
    pub fn divider(&self, tick_period_ms: u32) -> u32 {
        tick_period_ms / self.base_tick_ms.max(1)
    }

    fn validate(&self, tick_period_ms: u32) -> Result<(), String> {
        if self.base_tick_ms == 0 {
            return Err("scheduling.base_tick_ms must be non-zero".to_string());
        }
        if tick_period_ms % self.base_tick_ms != 0 {
            return Err(format!(
                "vcu.tick_period_ms {tick_period_ms} is not a multiple of scheduling.base_tick_ms {}",
                self.base_tick_ms
            ));
        }
        if self.block_time_ms <= tick_period_ms {
            return Err(format!(
                "scheduling.block_time_ms {} must exceed the tick period {tick_period_ms}",
                self.block_time_ms
            ));
        }
        if self.frame_queue_capacity == 0 {
            return Err("scheduling.frame_queue_capacity must be non-zero".to_string());
        }
        Ok(())
    }
}

// ─── Outputs ────────────────────────────────────────────────────────

/// Discrete outputs driven at boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputsConfig {
    /// Power channels switched on once boot completes.
    #[serde(default = "default_boot_channels")]
    pub boot_power_channels: Vec<u8>,
}

fn default_boot_channels() -> Vec<u8> {
    vec![0]
}

impl Default for OutputsConfig {
    fn default() -> Self {
        Self {
            boot_power_channels: default_boot_channels(),
        }
    }
}

impl OutputsConfig {
    fn validate(&self) -> Result<(), String> {
        match self
            .boot_power_channels
            .iter()
            .find(|&&c| c >= POWER_CHANNEL_COUNT)
        {
            Some(c) => Err(format!(
                "outputs.boot_power_channels: channel {c} beyond {POWER_CHANNEL_COUNT} channels"
            )),
            None => Ok(()),
        }
    }
}

// ─── Simulation ─────────────────────────────────────────────────────

/// Workstation simulation of the vehicle around the VCU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Inverter ticks from enable to `Ready`.
    #[serde(default = "default_precharge_ticks")]
    pub precharge_ticks: u32,
    /// Times at which the dash button is pressed [ms since start].
    #[serde(default = "default_button_presses")]
    pub button_presses_ms: Vec<u32>,
    /// How long each press is held [ms].
    #[serde(default = "default_press_duration")]
    pub press_duration_ms: u32,
    /// Accelerator position once driving.
    #[serde(default = "default_pedal")]
    pub pedal: f32,
}

fn default_precharge_ticks() -> u32 {
    50
}
fn default_button_presses() -> Vec<u32> {
    vec![500, 2000]
}
fn default_press_duration() -> u32 {
    100
}
fn default_pedal() -> f32 {
    0.3
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            precharge_ticks: default_precharge_ticks(),
            button_presses_ms: default_button_presses(),
            press_duration_ms: default_press_duration(),
            pedal: default_pedal(),
        }
    }
}

// ─── Top-Level Config ───────────────────────────────────────────────

/// Complete control unit configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VcuConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub vehicle: VehicleConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl VcuConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.vehicle
            .validate()
            .map_err(ConfigError::ValidationError)?;
        self.scheduling
            .validate(self.vehicle.vcu.tick_period_ms)
            .map_err(ConfigError::ValidationError)?;
        self.outputs
            .validate()
            .map_err(ConfigError::ValidationError)?;
        if !(0.0..=1.0).contains(&self.simulation.pedal) {
            return Err(ConfigError::ValidationError(format!(
                "simulation.pedal {} out of range [0, 1]",
                self.simulation.pedal
            )));
        }
        Ok(())
    }
}

// ─── Loading Functions ──────────────────────────────────────────────

/// Load and validate the configuration file.
pub fn load_config(path: &Path) -> Result<VcuConfig, ConfigError> {
    let config = VcuConfig::load(path)?;
    config.validate()?;
    Ok(config)
}

/// Parse and validate configuration text.
pub fn load_config_from_str(content: &str) -> Result<VcuConfig, ConfigError> {
    let config = VcuConfig::load_str(content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_valid() {
        let cfg = load_config_from_str("").unwrap();
        assert_eq!(cfg, VcuConfig::default());
        assert_eq!(cfg.scheduling.divider(cfg.vehicle.vcu.tick_period_ms), 10);
        assert!(!cfg.simulation.enabled);
    }

    #[test]
    fn test_tick_not_multiple_of_base() {
        let err = load_config_from_str(
            r#"
[scheduling]
base_tick_ms = 3
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("multiple")));
    }

    #[test]
    fn test_block_time_must_exceed_tick() {
        let err = load_config_from_str("[scheduling]\nblock_time_ms = 10\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_vehicle_validation_propagates() {
        let err = load_config_from_str("[vehicle.vcu]\ntick_period_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("tick_period_ms")));
    }

    #[test]
    fn test_simulation_section() {
        let cfg = load_config_from_str(
            r#"
[simulation]
enabled = true
button_presses_ms = [100]
pedal = 0.6
"#,
        )
        .unwrap();
        assert!(cfg.simulation.enabled);
        assert_eq!(cfg.simulation.button_presses_ms, vec![100]);
        assert_eq!(cfg.simulation.precharge_ticks, 50);
    }

    #[test]
    fn test_boot_channel_bounds() {
        let cfg = load_config_from_str("[outputs]\nboot_power_channels = [0, 7]\n").unwrap();
        assert_eq!(cfg.outputs.boot_power_channels, vec![0, 7]);
        assert!(load_config_from_str("[outputs]\nboot_power_channels = [8]\n").is_err());
    }

    #[test]
    fn test_bad_pedal_rejected() {
        assert!(load_config_from_str("[simulation]\npedal = 1.5\n").is_err());
    }
}
