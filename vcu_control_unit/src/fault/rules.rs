//! Fault rules evaluated by the fault manager.
//!
//! Built-in rules cover the pedal sensors and the battery. Inverter faults
//! and LV-system errors are [`FaultRule`] extension points; the built-in
//! implementations contribute no bits until vendor decoding is supplied.

use vcu_common::vehicle::config::{BmsConfig, InputSensorsConfig, PedalConfig, VehicleConfig};
use vcu_common::vehicle::fault::FaultFlags;
use vcu_common::vehicle::state::{PedalInputs, VehicleStateData};

use super::timed::TimedCondition;
use super::FaultManagerError;

/// Pluggable fault rule.
///
/// `evaluate` runs once per fault manager step, on the step's snapshot.
/// The returned bits are ORed into the latched word.
pub trait FaultRule: Send {
    fn name(&self) -> &'static str;

    fn evaluate(&mut self, snapshot: &VehicleStateData, config: &VehicleConfig) -> FaultFlags;

    /// Clear debounce state. Called by the maintenance reset.
    fn reset(&mut self) {}
}

// ─── Pedal Rules ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pedal {
    Accel,
    Brake,
}

/// Raw and scaled readings of one dual-sensor pedal.
#[derive(Debug, Clone, Copy)]
struct PedalChannels {
    raw_a: u16,
    raw_b: u16,
    a: f32,
    b: f32,
}

impl Pedal {
    fn channels(self, inputs: &PedalInputs) -> PedalChannels {
        match self {
            Pedal::Accel => PedalChannels {
                raw_a: inputs.accel_raw_a,
                raw_b: inputs.accel_raw_b,
                a: inputs.accel_a,
                b: inputs.accel_b,
            },
            Pedal::Brake => PedalChannels {
                raw_a: inputs.brake_raw_a,
                raw_b: inputs.brake_raw_b,
                a: inputs.brake_a,
                b: inputs.brake_b,
            },
        }
    }

    fn config(self, inputs: &InputSensorsConfig) -> &PedalConfig {
        match self {
            Pedal::Accel => &inputs.accel_pedal,
            Pedal::Brake => &inputs.brake_pedal,
        }
    }
}

/// Range and consistency checks for one pedal.
#[derive(Debug, Clone)]
struct PedalCheck {
    pedal: Pedal,
    range: TimedCondition,
    consistency: TimedCondition,
    range_flag: FaultFlags,
    consistency_flag: FaultFlags,
}

impl PedalCheck {
    fn evaluate(&mut self, inputs: &PedalInputs, config: &InputSensorsConfig) -> FaultFlags {
        let ch = self.pedal.channels(inputs);
        let cfg = self.pedal.config(config);
        let mut flags = FaultFlags::empty();

        let out_of_range =
            !cfg.calibration_a.contains(ch.raw_a) || !cfg.calibration_b.contains(ch.raw_b);
        if self.range.sample(out_of_range) {
            flags |= self.range_flag;
        }

        let disagree = (ch.a - ch.b).abs() > cfg.consistency_limit;
        if self.consistency.sample(disagree) {
            flags |= self.consistency_flag;
        }
        flags
    }

    fn reset(&mut self) {
        self.range.reset();
        self.consistency.reset();
    }
}

/// Accelerator, brake and pedal abuse rules.
///
/// All pedal timers share the inputs' invalid data timeout.
#[derive(Debug, Clone)]
pub struct PedalRules {
    accel: PedalCheck,
    brake: PedalCheck,
    abuse: TimedCondition,
}

impl PedalRules {
    pub fn new(config: &InputSensorsConfig, tick_period_ms: u32) -> Result<Self, FaultManagerError> {
        let timer = TimedCondition::from_timeout(config.invalid_data_timeout_ms, tick_period_ms)?;
        Ok(Self {
            accel: PedalCheck {
                pedal: Pedal::Accel,
                range: timer,
                consistency: timer,
                range_flag: FaultFlags::ACCEL_RANGE,
                consistency_flag: FaultFlags::ACCEL_CONSISTENCY,
            },
            brake: PedalCheck {
                pedal: Pedal::Brake,
                range: timer,
                consistency: timer,
                range_flag: FaultFlags::BRAKE_RANGE,
                consistency_flag: FaultFlags::BRAKE_CONSISTENCY,
            },
            abuse: timer,
        })
    }

    /// Debounce limit shared by the pedal timers [ticks].
    pub fn limit(&self) -> u32 {
        self.abuse.limit()
    }

    pub fn evaluate(&mut self, inputs: &PedalInputs, config: &InputSensorsConfig) -> FaultFlags {
        let mut flags = self.accel.evaluate(inputs, config) | self.brake.evaluate(inputs, config);

        let abuse = &config.pedal_abuse;
        if abuse.enabled {
            let both_pressed =
                inputs.accel > abuse.accel_threshold && inputs.brake > abuse.brake_threshold;
            if self.abuse.sample(both_pressed) {
                flags |= FaultFlags::PEDAL_ABUSE;
            }
        }
        flags
    }

    pub fn reset(&mut self) {
        self.accel.reset();
        self.brake.reset();
        self.abuse.reset();
    }
}

// ─── Battery Rules ──────────────────────────────────────────────────

/// BMS limit checks.
///
/// Over-temperature, over-current and over-voltage are timed against one
/// shared BMS timeout. Low SOC and the BMS fault indicator latch immediately.
/// Current is signed with discharge positive; only discharge is limited.
#[derive(Debug, Clone)]
pub struct BatteryRules {
    cell_temp: TimedCondition,
    current: TimedCondition,
    cell_voltage: TimedCondition,
}

impl BatteryRules {
    pub fn new(config: &BmsConfig, tick_period_ms: u32) -> Result<Self, FaultManagerError> {
        let timer = TimedCondition::from_timeout(config.invalid_data_timeout_ms, tick_period_ms)?;
        Ok(Self {
            cell_temp: timer,
            current: timer,
            cell_voltage: timer,
        })
    }

    pub fn limit(&self) -> u32 {
        self.cell_temp.limit()
    }

    pub fn evaluate(&mut self, snapshot: &VehicleStateData, config: &BmsConfig) -> FaultFlags {
        let battery = &snapshot.battery;
        let mut flags = FaultFlags::empty();

        if self.cell_temp.sample(battery.max_cell_temp > config.max_cell_temp) {
            flags |= FaultFlags::BMS_CELL_TEMP;
        }
        if self.current.sample(battery.dc_current > config.max_current) {
            flags |= FaultFlags::BMS_CURRENT;
        }
        if self
            .cell_voltage
            .sample(battery.max_cell_voltage > config.max_cell_voltage)
        {
            flags |= FaultFlags::BMS_CELL_VOLTAGE;
        }
        if battery.state_of_charge < config.min_soc {
            flags |= FaultFlags::BMS_LOW_SOC;
        }
        if battery.bms_fault_indicator {
            flags |= FaultFlags::BMS_FAULT_INDICATOR;
        }
        flags
    }

    pub fn reset(&mut self) {
        self.cell_temp.reset();
        self.current.reset();
        self.cell_voltage.reset();
    }
}

// ─── Extension Points ───────────────────────────────────────────────

/// Inverter fault decoding. Contributes no bits until vendor-specific
/// fault code decoding is supplied.
#[derive(Debug, Clone, Default)]
pub struct InverterFaultRule;

impl FaultRule for InverterFaultRule {
    fn name(&self) -> &'static str {
        "inverter"
    }

    fn evaluate(&mut self, _snapshot: &VehicleStateData, _config: &VehicleConfig) -> FaultFlags {
        FaultFlags::empty()
    }
}

/// Low-voltage system errors (bus timeouts, inverter LV state).
/// Contributes no bits until device timeout tracking is supplied.
#[derive(Debug, Clone, Default)]
pub struct LvSystemRule;

impl FaultRule for LvSystemRule {
    fn name(&self) -> &'static str {
        "lv_system"
    }

    fn evaluate(&mut self, _snapshot: &VehicleStateData, _config: &VehicleConfig) -> FaultFlags {
        FaultFlags::empty()
    }
}
