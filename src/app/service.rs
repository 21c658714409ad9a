//! Application service: the hexagonal core.
//!
//! [`Orchestrator`] owns the validated rig configuration and drives one
//! run of the cycle FSM to `Terminated`.  All I/O flows through port
//! traits injected at the call site, so every path is testable with
//! mock adapters.
//!
//! ```text
//!   RigPort ◀──┐                          ┌──▶ EventSink
//! CameraPort ◀─┤ ┌──────────────────────┐ │
//! OperatorPort ┴─│     Orchestrator     │─┘
//!                │  FSM · cleanup guard │
//!                └──────────────────────┘
//! ```
//!
//! Interrupts arrive through the stop flag from
//! [`Orchestrator::stop_flag`].  It is checked between FSM ticks; once
//! raised, the machine is forced into `Cleanup` from wherever it is.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::config::RigConfig;
use crate::drivers::DispenseOutcome;
use crate::error::{Error, Result};
use crate::fsm::context::FsmContext;
use crate::fsm::states::{build_state_table, run_cleanup};
use crate::fsm::{Fsm, StateId};

use super::ports::{CameraPort, EventSink, OperatorPort, RigPort};

// ───────────────────────────────────────────────────────────────
// Run report
// ───────────────────────────────────────────────────────────────

/// What one run did.
#[derive(Debug)]
pub struct RunReport {
    pub cycles_completed: u32,
    pub images_saved: u32,
    pub dispense_attempts: u32,
    /// 1 on every path that reached the FSM.
    pub cleanup_runs: u32,
    pub last_dispense: Option<DispenseOutcome>,
    /// First fatal error, if any.
    pub fault: Option<Error>,
    pub final_state: StateId,
    /// The stop flag cut the run short.
    pub interrupted: bool,
    entries: [u32; StateId::COUNT],
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.fault.is_none()
    }

    /// How many times `state` was entered during the run.
    pub fn entries(&self, state: StateId) -> u32 {
        self.entries[state as usize]
    }
}

// ───────────────────────────────────────────────────────────────
// Cleanup guard
// ───────────────────────────────────────────────────────────────

/// Holds the live FSM for the duration of [`Orchestrator::run`].  If the
/// run unwinds before `Cleanup` was entered, cleanup runs from `Drop`.
struct RunGuard<'a> {
    fsm: Fsm,
    ctx: FsmContext<'a>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.ctx.cleanup_runs == 0 {
            warn!(
                "run interrupted in {:?}, cleaning up",
                self.fsm.current_state()
            );
            run_cleanup(&mut self.ctx);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Orchestrator
// ───────────────────────────────────────────────────────────────

/// Sequences the rig through setup, dispense cycles and cleanup.
pub struct Orchestrator {
    config: RigConfig,
    stop: Arc<AtomicBool>,
}

impl Orchestrator {
    /// Construct from a configuration.  Rejects invalid calibration and
    /// timing up front, before any device is touched.
    pub fn new(config: RigConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    /// Shared flag that ends the run through `Cleanup` once set.  Safe to
    /// raise from a signal handler thread.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Run from `Idle` to `Terminated`.
    ///
    /// Returns once the operator quits, the cycle limit is reached, the
    /// dispenser reports a terminal outcome, the stop flag is raised, or
    /// a fatal error occurs.
    /// The rig is always left with the stepper and pump off, the inlet
    /// gate open and the outlet gate closed.
    pub fn run(
        &self,
        rig: &mut impl RigPort,
        cameras: &mut impl CameraPort,
        operator: &mut impl OperatorPort,
        sink: &mut impl EventSink,
        delay: &mut impl DelayNs,
    ) -> RunReport {
        let mut guard = RunGuard {
            fsm: Fsm::new(build_state_table(), StateId::Idle),
            ctx: FsmContext::new(&self.config, rig, cameras, operator, sink, delay),
        };

        let mut interrupted = false;
        guard.fsm.start(&mut guard.ctx);
        while !guard.fsm.is_terminated() {
            let state = guard.fsm.current_state();
            if !interrupted && self.stop.load(Ordering::SeqCst) && !state.is_shutdown() {
                warn!("interrupt received in {:?}, cleaning up", state);
                interrupted = true;
                guard.fsm.force_transition(StateId::Cleanup, &mut guard.ctx);
                continue;
            }
            guard.fsm.tick(&mut guard.ctx);
        }

        let report = RunReport {
            cycles_completed: guard.ctx.cycles_completed,
            images_saved: guard.ctx.images_saved,
            dispense_attempts: guard.ctx.dispense_attempts,
            cleanup_runs: guard.ctx.cleanup_runs,
            last_dispense: guard.ctx.last_dispense.take(),
            fault: guard.ctx.fault.take(),
            final_state: guard.fsm.current_state(),
            interrupted,
            entries: guard.fsm.entry_counts(),
        };
        info!(
            "run finished: {} cycle(s), {} image(s), {}",
            report.cycles_completed,
            report.images_saved,
            if !report.is_success() {
                "fault"
            } else if report.interrupted {
                "interrupted"
            } else {
                "ok"
            }
        );
        report
    }
}
