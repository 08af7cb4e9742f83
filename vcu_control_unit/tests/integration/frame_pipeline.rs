//! Integration test: frame pipeline end-to-end.
//!
//! Boots a full unit on the frame-based vehicle control, attaches the
//! simulated vehicle and inverter and drives every task body in lockstep
//! with [`Vcu::step_once`].

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;

use vcu_common::vehicle::control::{Direction, VehicleControl};
use vcu_common::vehicle::fault::{FaultFlags, FaultStatus};
use vcu_control_unit::config::{SimulationConfig, VcuConfig};
use vcu_control_unit::context::VcuContext;
use vcu_control_unit::control::FrameVehicleControl;
use vcu_control_unit::device::bms::PackReport;
use vcu_control_unit::device::{FrameQueue, TransmitTask};
use vcu_control_unit::sim::{SimulatedInverter, SimulatedVehicle};
use vcu_control_unit::state::VsmState;
use vcu_control_unit::supervisor::Vcu;

// ── Helpers ─────────────────────────────────────────────────────────

fn config() -> VcuConfig {
    VcuConfig {
        simulation: SimulationConfig {
            enabled: true,
            precharge_ticks: 10,
            button_presses_ms: vec![30, 800],
            press_duration_ms: 30,
            pedal: 0.5,
        },
        ..Default::default()
    }
}

fn boot(config: &VcuConfig) -> (Arc<FrameQueue>, Arc<FrameVehicleControl>, Vcu) {
    let outbound = Arc::new(FrameQueue::new(config.scheduling.frame_queue_capacity));
    let control = Arc::new(FrameVehicleControl::new(
        &VcuContext::new(config.vehicle.clone()),
        Arc::clone(&outbound),
    ));
    let vcu = Vcu::boot(config, Arc::clone(&control) as Arc<dyn VehicleControl>).unwrap();
    (outbound, control, vcu)
}

fn attach_simulation(vcu: &mut Vcu, config: &VcuConfig, outbound: &Arc<FrameQueue>) {
    let vehicle = SimulatedVehicle::new(
        vcu.context(),
        &config.simulation,
        vcu.vehicle(),
        vcu.router(),
    );
    vehicle.seed().unwrap();
    let divider = vcu.divider();
    vcu.add_task(Box::new(vehicle), divider).unwrap();
    vcu.add_task(
        Box::new(SimulatedInverter::new(
            vcu.context(),
            Arc::clone(outbound),
            vcu.router(),
            config.simulation.precharge_ticks,
        )),
        divider,
    )
    .unwrap();
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn simulated_vehicle_reaches_forward_drive() {
    let config = config();
    let (outbound, control, mut vcu) = boot(&config);
    attach_simulation(&mut vcu, &config, &outbound);
    let handle = vcu.handle();

    let mut seen = vec![handle.state()];
    for _ in 0..100 {
        vcu.step_once();
        let state = handle.state();
        if seen.last() != Some(&state) {
            seen.push(state);
        }
    }

    assert_eq!(
        seen,
        vec![
            VsmState::Init,
            VsmState::LvStartup,
            VsmState::LvReady,
            VsmState::HvCharging,
            VsmState::ActiveNeutral,
            VsmState::ActiveForward,
        ]
    );
    assert_eq!(handle.fault_status(), FaultStatus::NoFault);

    let outputs = control.outputs();
    assert!(outputs.inverter_enabled);
    assert!(outputs.dash_led);
    assert!(!outputs.ecu_error);
    assert_eq!(outputs.direction, Direction::Forward);
    assert!((outputs.torque - 100.0).abs() < 0.5, "torque {}", outputs.torque);
    assert_eq!(outputs.power_channels, 0b1);

    let data = vcu.vehicle().copy_state().unwrap();
    assert!((data.battery.dc_voltage - 350.0).abs() < 0.1);
    assert_eq!(data.battery.populated_cells, 96);
}

#[test]
fn bms_fault_frame_trips_unit() {
    let config = VcuConfig::default();
    let (outbound, control, mut vcu) = boot(&config);
    let divider = vcu.divider();
    vcu.add_task(
        Box::new(TransmitTask::new(vcu.context(), Arc::clone(&outbound))),
        divider,
    )
    .unwrap();
    vcu.vehicle()
        .write(|d| d.battery.state_of_charge = 80.0)
        .unwrap();

    vcu.step_once();
    vcu.step_once();
    assert_eq!(vcu.handle().state(), VsmState::LvReady);

    let report = PackReport {
        voltage: 355.0,
        state_of_charge: 80.0,
        fault: true,
        ..Default::default()
    };
    vcu.router()
        .route(report.encode(config.vehicle.bms.base_can_id))
        .unwrap();

    vcu.step_once();
    assert_eq!(vcu.handle().state(), VsmState::Fault);
    assert!(vcu.handle().latched().contains(FaultFlags::BMS_FAULT_INDICATOR));

    let outputs = control.outputs();
    assert!(outputs.ecu_error);
    assert!(!outputs.inverter_enabled);
    assert_eq!(outputs.torque, 0.0);
}

#[test]
fn threaded_run_ticks_and_stops() {
    let mut config = config();
    config.simulation.button_presses_ms = vec![];
    let (outbound, _control, mut vcu) = boot(&config);
    attach_simulation(&mut vcu, &config, &outbound);
    let handle = vcu.handle();

    let running = Arc::new(AtomicBool::new(true));
    let threads = vcu.start(Arc::clone(&running)).unwrap();
    thread::sleep(Duration::from_millis(300));
    running.store(false, std::sync::atomic::Ordering::SeqCst);
    let stats = threads.join();

    assert_eq!(stats.len(), 6);
    assert!(stats.iter().all(|(_, s)| s.is_some()));
    assert!(handle.ticks() > 0);
}
