//! Integration test: supervisory drive cycle.
//!
//! Walks the VSM from power-up through HV charging into the three driving
//! states, checking the inverter enable and throttle authorization at each
//! step.

use std::sync::Arc;
use std::time::Duration;

use vcu_common::vehicle::config::VehicleConfig;
use vcu_common::vehicle::control::{Direction, VehicleControl};
use vcu_common::vehicle::state::InverterVsmState;
use vcu_control_unit::context::VcuContext;
use vcu_control_unit::state::{Vsm, VsmState};
use vcu_control_unit::throttle::ThrottleController;
use vcu_control_unit::vehicle_state::VehicleState;

use super::{Call, Recorder};

// ── Helpers ─────────────────────────────────────────────────────────

struct Rig {
    state: Arc<VehicleState>,
    control: Arc<Recorder>,
    throttle: Arc<ThrottleController>,
    vsm: Vsm,
}

fn rig(config: VehicleConfig) -> Rig {
    let ctx = VcuContext::new(config);
    let state = Arc::new(VehicleState::new(Duration::from_millis(2)));
    state.write(|d| d.battery.state_of_charge = 80.0).unwrap();
    let control = Arc::new(Recorder::default());
    let dyn_control: Arc<dyn VehicleControl> = control.clone();
    let throttle = Arc::new(
        ThrottleController::new(&ctx, Arc::clone(&state), Arc::clone(&dyn_control)).unwrap(),
    );
    let vsm = Vsm::new(&ctx, Arc::clone(&state), dyn_control, Arc::clone(&throttle)).unwrap();
    Rig {
        state,
        control,
        throttle,
        vsm,
    }
}

impl Rig {
    fn button(&self, pressed: bool) {
        self.state.write(|d| d.dash.button_pressed = pressed).unwrap();
    }

    fn inverter(&self, vsm_state: InverterVsmState) {
        self.state
            .write(|d| d.inverter.vsm_state = vsm_state)
            .unwrap();
    }

    fn pedal(&self, value: f32) {
        self.state
            .write(|d| {
                d.inputs.accel = value;
                d.inputs.accel_a = value;
                d.inputs.accel_b = value;
            })
            .unwrap();
    }

    /// Press and release the dash button, one tick each.
    fn click(&mut self) -> VsmState {
        self.button(true);
        let state = self.vsm.step();
        self.button(false);
        self.vsm.step();
        state
    }

    /// Step from power-up to `LvReady`.
    fn to_lv_ready(&mut self) {
        assert_eq!(self.vsm.step(), VsmState::LvStartup);
        assert_eq!(self.vsm.step(), VsmState::LvReady);
    }

    fn to_active_neutral(&mut self) {
        self.to_lv_ready();
        assert_eq!(self.click(), VsmState::HvCharging);
        self.inverter(InverterVsmState::Ready);
        assert_eq!(self.vsm.step(), VsmState::ActiveNeutral);
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn full_drive_cycle() {
    let mut rig = rig(VehicleConfig::default());
    rig.to_active_neutral();
    assert_eq!(rig.control.count(Call::Enable), 1);

    rig.pedal(0.5);
    assert_eq!(rig.throttle.step(), 0.0);
    assert_eq!(rig.control.last_torque(), Some((0.0, Direction::Neutral)));

    assert_eq!(rig.click(), VsmState::ActiveForward);
    assert!((rig.throttle.step() - 100.0).abs() < 1e-3);
    assert_eq!(rig.control.last_torque().map(|t| t.1), Some(Direction::Forward));

    assert_eq!(rig.click(), VsmState::ActiveReverse);
    assert!((rig.throttle.step() - 20.0).abs() < 1e-3);
    assert_eq!(rig.control.last_torque().map(|t| t.1), Some(Direction::Reverse));

    assert_eq!(rig.click(), VsmState::ActiveNeutral);
    assert_eq!(rig.throttle.step(), 0.0);
    assert_eq!(rig.control.count(Call::Enable), 1);
    assert_eq!(rig.control.count(Call::Disable), 0);
}

#[test]
fn held_button_enables_inverter_once() {
    let mut rig = rig(VehicleConfig::default());
    rig.to_lv_ready();

    rig.button(true);
    assert_eq!(rig.vsm.step(), VsmState::HvCharging);
    for _ in 0..20 {
        assert_eq!(rig.vsm.step(), VsmState::HvCharging);
    }
    assert_eq!(rig.control.count(Call::Enable), 1);

    // Held through Ready: no edge, so no move out of neutral.
    rig.inverter(InverterVsmState::Ready);
    assert_eq!(rig.vsm.step(), VsmState::ActiveNeutral);
    for _ in 0..5 {
        assert_eq!(rig.vsm.step(), VsmState::ActiveNeutral);
    }

    rig.button(false);
    rig.vsm.step();
    rig.button(true);
    assert_eq!(rig.vsm.step(), VsmState::ActiveForward);
    assert_eq!(rig.control.count(Call::Enable), 1);
}

#[test]
fn motor_running_is_not_ready() {
    let mut rig = rig(VehicleConfig::default());
    rig.to_lv_ready();
    assert_eq!(rig.click(), VsmState::HvCharging);

    rig.inverter(InverterVsmState::MotorRunning);
    assert_eq!(rig.vsm.step(), VsmState::HvCharging);
    rig.inverter(InverterVsmState::Ready);
    assert_eq!(rig.vsm.step(), VsmState::ActiveNeutral);
}

#[test]
fn hv_charge_timeout_faults_on_twelfth_tick() {
    let mut config = VehicleConfig::default();
    config.vcu.hv_charge_timeout_ms = 100;
    config.vcu.tick_period_ms = 10;
    let mut rig = rig(config);
    rig.to_lv_ready();

    rig.button(true);
    assert_eq!(rig.vsm.step(), VsmState::HvCharging);
    rig.button(false);

    for tick in 1..=11 {
        assert_eq!(rig.vsm.step(), VsmState::HvCharging, "tick {tick}");
    }
    assert_eq!(rig.vsm.step(), VsmState::Fault);

    let calls = rig.control.calls();
    assert!(calls.contains(&Call::Disable));
    assert!(calls.contains(&Call::EcuError(true)));
}

#[test]
fn ready_before_timeout_wins() {
    let mut config = VehicleConfig::default();
    config.vcu.hv_charge_timeout_ms = 100;
    let mut rig = rig(config);
    rig.to_lv_ready();
    assert_eq!(rig.click(), VsmState::HvCharging);

    for _ in 0..9 {
        rig.vsm.step();
    }
    rig.inverter(InverterVsmState::Ready);
    assert_eq!(rig.vsm.step(), VsmState::ActiveNeutral);
}

#[test]
fn fault_disables_throttle() {
    let mut rig = rig(VehicleConfig::default());
    rig.to_active_neutral();
    rig.pedal(0.7);
    assert_eq!(rig.click(), VsmState::ActiveForward);
    assert!((rig.throttle.step() - 200.0).abs() < 1e-3);

    rig.state
        .write(|d| d.battery.bms_fault_indicator = true)
        .unwrap();
    assert_eq!(rig.vsm.step(), VsmState::Fault);
    assert_eq!(rig.throttle.step(), 0.0);

    // The sink ignores the button.
    assert_eq!(rig.click(), VsmState::Fault);
    assert_eq!(rig.control.count(Call::Enable), 1);
}
