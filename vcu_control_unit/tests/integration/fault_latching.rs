//! Integration test: fault latching and hysteresis through the VSM.
//!
//! Feeds sensor values into the vehicle state and checks that the fault
//! manager debounces, latches and classifies them, and that the VSM reacts
//! on the tick the classification changes.

use std::sync::Arc;
use std::time::Duration;

use vcu_common::vehicle::config::VehicleConfig;
use vcu_common::vehicle::control::VehicleControl;
use vcu_common::vehicle::fault::{FaultFlags, FaultStatus};
use vcu_common::vehicle::state::VehicleStateData;
use vcu_control_unit::context::VcuContext;
use vcu_control_unit::fault::{FaultManager, FaultRule};
use vcu_control_unit::state::{Vsm, VsmState};
use vcu_control_unit::throttle::ThrottleController;
use vcu_control_unit::vehicle_state::VehicleState;

use super::{Call, Recorder};

// ── Helpers ─────────────────────────────────────────────────────────

fn nominal(d: &mut VehicleStateData) {
    d.battery.state_of_charge = 80.0;
    d.battery.max_cell_temp = 30.0;
    d.battery.max_cell_voltage = 3.9;
    d.inputs.accel_raw_a = 2000;
    d.inputs.accel_raw_b = 2000;
    d.inputs.accel_a = 0.5;
    d.inputs.accel_b = 0.5;
}

fn vsm_at_lv_ready(config: VehicleConfig) -> (Arc<VehicleState>, Arc<Recorder>, Vsm) {
    let ctx = VcuContext::new(config);
    let state = Arc::new(VehicleState::new(Duration::from_millis(2)));
    state.write(nominal).unwrap();
    let recorder = Arc::new(Recorder::default());
    let control: Arc<dyn VehicleControl> = recorder.clone();
    let throttle =
        Arc::new(ThrottleController::new(&ctx, Arc::clone(&state), Arc::clone(&control)).unwrap());
    let mut vsm = Vsm::new(&ctx, Arc::clone(&state), control, throttle).unwrap();
    vsm.step();
    assert_eq!(vsm.step(), VsmState::LvReady);
    (state, recorder, vsm)
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn accel_disagreement_of_five_percent_is_tolerated() {
    let (state, _, mut vsm) = vsm_at_lv_ready(VehicleConfig::default());
    state.write(|d| d.inputs.accel_b = 0.55).unwrap();

    for _ in 0..50 {
        assert_eq!(vsm.step(), VsmState::LvReady);
    }
    assert!(vsm.fault_manager().latched().is_empty());
    assert_eq!(vsm.last_status(), FaultStatus::NoFault);
}

#[test]
fn accel_disagreement_of_fifteen_percent_latches_after_timeout() {
    let (state, recorder, mut vsm) = vsm_at_lv_ready(VehicleConfig::default());
    state.write(|d| d.inputs.accel_b = 0.65).unwrap();

    // Limit 100 ms / 10 ms = 10: ten faulting samples are tolerated.
    for _ in 0..10 {
        assert_eq!(vsm.step(), VsmState::LvReady);
    }
    assert_eq!(vsm.step(), VsmState::Fault);
    assert_eq!(vsm.fault_manager().latched(), FaultFlags::ACCEL_CONSISTENCY);
    assert_eq!(recorder.count(Call::EcuError(true)), 1);

    // Sensors agree again: the bit stays latched.
    state.write(|d| d.inputs.accel_b = 0.5).unwrap();
    for _ in 0..20 {
        assert_eq!(vsm.step(), VsmState::Fault);
    }
    assert!(vsm.fault_manager().latched().contains(FaultFlags::ACCEL_CONSISTENCY));
    assert_eq!(vsm.last_status(), FaultStatus::Fault);
}

#[test]
fn brake_sensor_out_of_range_latches_fault() {
    let (state, recorder, mut vsm) = vsm_at_lv_ready(VehicleConfig::default());
    state
        .write(|d| {
            d.inputs.brake_raw_a = 4200;
            d.inputs.brake_raw_b = 4200;
        })
        .unwrap();

    for _ in 0..10 {
        assert_eq!(vsm.step(), VsmState::LvReady);
    }
    assert_eq!(vsm.step(), VsmState::Fault);
    assert_eq!(vsm.fault_manager().latched(), FaultFlags::BRAKE_RANGE);
    assert_eq!(vsm.last_status(), FaultStatus::Fault);
    assert_eq!(recorder.count(Call::EcuError(true)), 1);
}

#[test]
fn intermittent_fault_never_trips() {
    let (state, _, mut vsm) = vsm_at_lv_ready(VehicleConfig::default());
    for _ in 0..5 {
        state.write(|d| d.battery.max_cell_temp = 90.0).unwrap();
        for _ in 0..10 {
            vsm.step();
        }
        state.write(|d| d.battery.max_cell_temp = 30.0).unwrap();
        vsm.step();
    }
    assert_eq!(vsm.state(), VsmState::LvReady);
    assert!(vsm.fault_manager().latched().is_empty());
}

#[test]
fn low_soc_is_immediate() {
    let (state, _, mut vsm) = vsm_at_lv_ready(VehicleConfig::default());
    state.write(|d| d.battery.state_of_charge = 9.5).unwrap();
    assert_eq!(vsm.step(), VsmState::Fault);
    assert_eq!(vsm.fault_manager().latched(), FaultFlags::BMS_LOW_SOC);
}

#[test]
fn pedal_abuse_requires_gate() {
    let both_pressed = |d: &mut VehicleStateData| {
        d.inputs.accel = 0.5;
        d.inputs.brake = 0.5;
        d.inputs.brake_a = 0.5;
        d.inputs.brake_b = 0.5;
        d.inputs.brake_raw_a = 2000;
        d.inputs.brake_raw_b = 2000;
    };

    let (state, _, mut vsm) = vsm_at_lv_ready(VehicleConfig::default());
    state.write(both_pressed).unwrap();
    for _ in 0..30 {
        vsm.step();
    }
    assert_eq!(vsm.state(), VsmState::LvReady);

    let mut config = VehicleConfig::default();
    config.inputs.pedal_abuse.enabled = true;
    let (state, _, mut vsm) = vsm_at_lv_ready(config);
    state.write(both_pressed).unwrap();
    for _ in 0..30 {
        vsm.step();
    }
    assert_eq!(vsm.state(), VsmState::Fault);
    assert_eq!(vsm.fault_manager().latched(), FaultFlags::PEDAL_ABUSE);
}

#[test]
fn lock_miss_in_lv_ready_faults() {
    let (state, _, mut vsm) = vsm_at_lv_ready(VehicleConfig::default());
    let guard = state.acquire().unwrap();
    assert_eq!(vsm.step(), VsmState::Fault);
    drop(guard);
    assert_eq!(vsm.last_status(), FaultStatus::LvError);
    assert!(vsm.fault_manager().latched().is_empty());
}

struct BusSilence {
    silent: bool,
}

impl FaultRule for BusSilence {
    fn name(&self) -> &'static str {
        "bus_silence"
    }

    fn evaluate(&mut self, _: &VehicleStateData, _: &VehicleConfig) -> FaultFlags {
        if self.silent {
            FaultFlags::BMS_TIMEOUT
        } else {
            FaultFlags::empty()
        }
    }
}

#[test]
fn extension_rule_feeds_lv_partition() {
    let ctx = VcuContext::default();
    let mut faults = FaultManager::new(&ctx, 10)
        .unwrap()
        .with_rule(Box::new(BusSilence { silent: true }));
    let mut snapshot = VehicleStateData::default();
    nominal(&mut snapshot);

    assert_eq!(faults.evaluate(&snapshot), FaultStatus::LvError);
    assert_eq!(faults.latched(), FaultFlags::BMS_TIMEOUT);

    snapshot.battery.bms_fault_indicator = true;
    assert_eq!(faults.evaluate(&snapshot), FaultStatus::Fault);

    faults.reset_latched();
    assert!(faults.latched().is_empty());
    assert_eq!(faults.status(), FaultStatus::Init);
}
