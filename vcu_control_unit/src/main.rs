//! # VCU Control Unit
//!
//! Boots the supervisory core from a TOML configuration, starts every
//! periodic task on the shared task timer and runs until Ctrl-C (or for a
//! fixed duration with `--run-for-ms`).
//!
//! With `[simulation] enabled = true` a simulated vehicle and inverter are
//! attached so the unit can be driven end-to-end on a workstation. Without
//! it, outbound command frames are drained by the transmit task.
//!
//! A boot failure asserts the ECU error output and exits non-zero. There is
//! no retry.

use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;
use vcu_common::config::LogLevel;
use vcu_common::vehicle::control::VehicleControl;
use vcu_common::vehicle::fault::FaultStatus;
use vcu_common::vehicle::state::VehicleStateData;
use vcu_control_unit::config::{VcuConfig, load_config};
use vcu_control_unit::control::{ControlOutputs, FrameVehicleControl};
use vcu_control_unit::context::VcuContext;
use vcu_control_unit::device::{FrameQueue, TransmitTask};
use vcu_control_unit::sim::{SimulatedInverter, SimulatedVehicle};
use vcu_control_unit::state::VsmState;
use vcu_control_unit::supervisor::Vcu;

/// VCU supervisory core
#[derive(Parser, Debug)]
#[command(name = "vcu_control_unit")]
#[command(version)]
#[command(about = "Supervisory control core of an electric vehicle control unit")]
struct Args {
    /// Path to the configuration TOML.
    #[arg(default_value = "config/vcu.toml")]
    config: PathBuf,

    /// Stop after this many milliseconds instead of waiting for Ctrl-C.
    #[arg(long, value_name = "MS")]
    run_for_ms: Option<u64>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

/// Final report logged at shutdown.
#[derive(Debug, Serialize)]
struct ShutdownReport {
    state: VsmState,
    fault_status: FaultStatus,
    latched_faults: u32,
    supervisory_ticks: u64,
    outputs: ControlOutputs,
    vehicle: Option<VehicleStateData>,
}

fn main() {
    let args = Args::parse();
    let config = load_config(&args.config);
    let log_level = config
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, log_level);

    info!("VCU Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = match config {
        Ok(config) => run(&args, config),
        Err(e) => Err(e.into()),
    };
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("VCU Control Unit shutdown complete");
}

fn run(args: &Args, config: VcuConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Config OK: tick={}ms, base_tick={}ms, simulation={}",
        config.vehicle.vcu.tick_period_ms,
        config.scheduling.base_tick_ms,
        config.simulation.enabled,
    );

    let outbound = Arc::new(FrameQueue::new(config.scheduling.frame_queue_capacity));
    let control = Arc::new(FrameVehicleControl::new(
        &VcuContext::new(config.vehicle.clone()),
        Arc::clone(&outbound),
    ));

    let mut vcu = match Vcu::boot(&config, Arc::clone(&control) as Arc<dyn VehicleControl>) {
        Ok(vcu) => vcu,
        Err(e) => {
            if let Err(ce) = control.set_ecu_error(true) {
                error!("ECU error output not asserted: {ce}");
            }
            return Err(e.into());
        }
    };

    let divider = vcu.divider();
    if config.simulation.enabled {
        let vehicle = SimulatedVehicle::new(
            vcu.context(),
            &config.simulation,
            vcu.vehicle(),
            vcu.router(),
        );
        vehicle.seed()?;
        vcu.add_task(Box::new(vehicle), divider)?;
        vcu.add_task(
            Box::new(SimulatedInverter::new(
                vcu.context(),
                Arc::clone(&outbound),
                vcu.router(),
                config.simulation.precharge_ticks,
            )),
            divider,
        )?;
        info!("Simulation attached");
    } else {
        vcu.add_task(
            Box::new(TransmitTask::new(vcu.context(), Arc::clone(&outbound))),
            divider,
        )?;
    }

    let handle = vcu.handle();
    let vehicle_state = vcu.vehicle();

    // Setup signal handler for graceful shutdown.
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let names = vcu.task_names();
    let threads = vcu.start(Arc::clone(&running))?;
    info!(tasks = ?names, "VCU running");

    let deadline = args
        .run_for_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));
    let mut last_state = handle.state();
    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            info!("Run duration elapsed");
            running.store(false, Ordering::SeqCst);
            break;
        }
        let state = handle.state();
        if state != last_state {
            info!(from = ?last_state, to = ?state, "VSM state");
            last_state = state;
        }
        thread::sleep(Duration::from_millis(20));
    }

    for (name, stats) in threads.join() {
        match stats {
            Some(s) => info!(
                task = name,
                cycles = s.cycle_count,
                avg_us = s.avg_cycle_ns() / 1_000,
                max_us = s.max_cycle_ns / 1_000,
                timeouts = s.timeouts,
                missed = s.missed,
                "task statistics"
            ),
            None => warn!(task = name, "task thread panicked"),
        }
    }

    let report = ShutdownReport {
        state: handle.state(),
        fault_status: handle.fault_status(),
        latched_faults: handle.latched().bits(),
        supervisory_ticks: handle.ticks(),
        outputs: control.outputs(),
        vehicle: vehicle_state.copy_state().ok(),
    };
    info!("Final state: {}", serde_json::to_string(&report)?);
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments.
///
/// `--verbose` forces DEBUG; otherwise `RUST_LOG` wins over the configured
/// `shared.log_level`.
fn setup_tracing(args: &Args, log_level: LogLevel) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.as_directive()))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
