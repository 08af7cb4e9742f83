//! Integration test: configuration loading and boot.
//!
//! Loads configuration files from disk and boots the unit, checking that
//! every init failure surfaces as a distinguished error before any task
//! starts.

use std::io::Write;
use std::sync::Arc;

use tempfile::NamedTempFile;
use vcu_common::config::ConfigError;
use vcu_control_unit::config::{VcuConfig, load_config};
use vcu_control_unit::state::VsmState;
use vcu_control_unit::supervisor::{InitError, Vcu};

use super::{Call, Recorder};

// ── Helpers ─────────────────────────────────────────────────────────

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn boot_from_file() {
    let file = write_config(
        r#"
[shared]
service_name = "bench"

[vehicle.vcu]
tick_period_ms = 20
hv_charge_timeout_ms = 3000

[scheduling]
base_tick_ms = 2

[outputs]
boot_power_channels = [0, 3]
"#,
    );
    let config = load_config(file.path()).unwrap();
    let recorder = Arc::new(Recorder::default());
    let vcu = Vcu::boot(&config, recorder.clone()).unwrap();

    assert_eq!(vcu.divider(), 10);
    assert_eq!(vcu.context().tick_period_ms(), 20);
    assert_eq!(vcu.handle().state(), VsmState::Init);
    assert_eq!(
        recorder.calls(),
        vec![Call::PowerChannel(0, true), Call::PowerChannel(3, true)]
    );
}

#[test]
fn missing_file_is_reported() {
    let err = load_config(std::path::Path::new("/nonexistent/vcu.toml")).unwrap_err();
    assert_eq!(err, ConfigError::FileNotFound);
}

#[test]
fn malformed_torque_map_is_rejected() {
    let file = write_config(
        r#"
[vehicle.torque_maps.forward]
pedal = [0.0, 0.6, 0.5, 1.0]
torque = [0.0, 10.0, 20.0, 30.0]
"#,
    );
    assert!(matches!(
        load_config(file.path()),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn boot_validates_unvalidated_config() {
    let mut config = VcuConfig::default();
    config.vehicle.inputs.accel_pedal.calibration_a.raw_lower = 4000;
    config.vehicle.inputs.accel_pedal.calibration_a.raw_upper = 100;

    let recorder = Arc::new(Recorder::default());
    let err = Vcu::boot(&config, recorder.clone()).unwrap_err();
    assert!(matches!(err, InitError::Config(_)));
    assert!(err.to_string().starts_with("invalid configuration"));
    assert!(recorder.calls().is_empty());
}

#[test]
fn task_table_overflow_is_an_init_error() {
    let recorder = Arc::new(Recorder::default());
    let mut vcu = Vcu::boot(&VcuConfig::default(), recorder).unwrap();
    let divider = vcu.divider();

    let extra = vcu_common::consts::MAX_TASKS - vcu.task_names().len();
    for _ in 0..extra {
        let ctx = vcu.context().clone();
        let queue = Arc::new(vcu_control_unit::device::FrameQueue::new(1));
        vcu.add_task(
            Box::new(vcu_control_unit::device::TransmitTask::new(&ctx, queue)),
            divider,
        )
        .unwrap();
    }

    let ctx = vcu.context().clone();
    let queue = Arc::new(vcu_control_unit::device::FrameQueue::new(1));
    let err = vcu
        .add_task(
            Box::new(vcu_control_unit::device::TransmitTask::new(&ctx, queue)),
            divider,
        )
        .unwrap_err();
    assert!(matches!(err, InitError::TaskTimer(_)));
}
