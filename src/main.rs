//! Photobooth controller: main entry point.
//!
//! Hexagonal architecture around one synchronous control thread.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SerialRig          SimulatedCameras   ConsoleOperator         │
//! │  (RigPort)          (CameraPort)       (OperatorPort)          │
//! │  JsonConfigFile     LogEventSink       StdDelay                │
//! │  (ConfigPort)       (EventSink)        (DelayNs)               │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              Orchestrator (pure logic)                 │    │
//! │  │  cycle FSM · cleanup guard                             │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `photobooth [rig.json]`.  Without a file the built-in rig
//! defaults are used.  `RUST_LOG` controls verbosity (default `info`).
//! Exit status is 0 when the run ended without a fault, 130 when Ctrl-C
//! cut it short (the rig is still parked first), and 1 otherwise.

use std::process::ExitCode;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use log::{error, info, warn};

use photobooth::adapters::camera::SimulatedCameras;
use photobooth::adapters::config_file::JsonConfigFile;
use photobooth::adapters::log_sink::LogEventSink;
use photobooth::adapters::operator::{AutoOperator, ConsoleOperator};
use photobooth::adapters::rig::{SerialOpener, SerialRig};
use photobooth::adapters::time::StdDelay;
use photobooth::app::ports::ConfigPort;
use photobooth::app::service::{Orchestrator, RunReport};
use photobooth::config::{OperatorMode, RigConfig};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(report) if report.is_success() && report.interrupted => ExitCode::from(130),
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(report) => {
            if let Some(fault) = &report.fault {
                match fault.device() {
                    Some(device) => error!("fatal ({}): {}", device, fault),
                    None => error!("fatal: {}", fault),
                }
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<RunReport> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => JsonConfigFile::new(path)
            .load()
            .context("loading rig configuration")?,
        None => {
            info!("no configuration file given, using rig defaults");
            RigConfig::default()
        }
    };

    let orchestrator = Orchestrator::new(config).context("rig configuration rejected")?;
    let config = orchestrator.config();
    info!(
        "photobooth v{} starting ({:?} feed, {:?} operator)",
        env!("CARGO_PKG_VERSION"),
        config.feed,
        config.operator
    );

    let stop = orchestrator.stop_flag();
    let handler_flag = stop.clone();
    ctrlc::set_handler(move || {
        if !handler_flag.swap(true, Ordering::SeqCst) {
            warn!("interrupt: finishing the current step, then parking the rig (press enter at a prompt)");
        }
    })
    .context("installing the interrupt handler")?;

    let mut rig = SerialRig::new(SerialOpener, StdDelay, config);
    warn!("no imaging backend linked, using simulated cameras");
    let mut cameras = SimulatedCameras::default();
    let mut sink = LogEventSink::new();
    let mut delay = StdDelay;

    let report = match config.operator {
        OperatorMode::Console => orchestrator.run(
            &mut rig,
            &mut cameras,
            &mut ConsoleOperator::stdio().with_stop_flag(stop),
            &mut sink,
            &mut delay,
        ),
        OperatorMode::Auto => orchestrator.run(
            &mut rig,
            &mut cameras,
            &mut AutoOperator,
            &mut sink,
            &mut delay,
        ),
    };
    Ok(report)
}
