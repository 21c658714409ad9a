//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch in the table itself.
//!
//! ```text
//!  IDLE ──[setup ok]──▶ AWAITING_START ──[quit | t | n]──────────────┐
//!                          ▲      │                                  │
//!                          │  [f | hand-load]                        │
//!                          │      ▼                                  │
//!                          │   GATE_CLOSING ──▶ VANE_ADVANCING       │
//!                          │                         │               │
//!                          │                         ▼               │
//!                          │   VANE_RETURNING ◀── CAPTURING          │
//!                          │      │                                  │
//!                          │      ▼                                  │
//!                          │   GATE_OPENING ──▶ PUMP_RUNNING ──[limit]┤
//!                          └─────────────────────────┘               ▼
//!                                                      CLEANUP ──▶ TERMINATED
//!
//!  Any state ──[error]──▶ CLEANUP
//! ```

use log::{info, warn};

use super::context::FsmContext;
use super::{StateDescriptor, StateId};
use crate::app::events::CycleEvent;
use crate::app::ports::{CameraRole, StartSignal, identify_cameras};
use crate::config::{FeedMode, Gate, GateState};
use crate::drivers::DispenseOutcome;
use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once per run.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: None,
            on_exit: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: StateId::AwaitingStart,
            name: "AwaitingStart",
            on_enter: None,
            on_exit: None,
            on_update: awaiting_start_update,
        },
        StateDescriptor {
            id: StateId::GateClosing,
            name: "GateClosing",
            on_enter: None,
            on_exit: None,
            on_update: gate_closing_update,
        },
        StateDescriptor {
            id: StateId::VaneAdvancing,
            name: "VaneAdvancing",
            on_enter: None,
            on_exit: None,
            on_update: vane_advancing_update,
        },
        StateDescriptor {
            id: StateId::Capturing,
            name: "Capturing",
            on_enter: None,
            on_exit: Some(capturing_exit),
            on_update: capturing_update,
        },
        StateDescriptor {
            id: StateId::VaneReturning,
            name: "VaneReturning",
            on_enter: None,
            on_exit: None,
            on_update: vane_returning_update,
        },
        StateDescriptor {
            id: StateId::GateOpening,
            name: "GateOpening",
            on_enter: None,
            on_exit: None,
            on_update: gate_opening_update,
        },
        StateDescriptor {
            id: StateId::PumpRunning,
            name: "PumpRunning",
            on_enter: None,
            on_exit: None,
            on_update: pump_running_update,
        },
        StateDescriptor {
            id: StateId::Cleanup,
            name: "Cleanup",
            on_enter: Some(cleanup_enter),
            on_exit: None,
            on_update: cleanup_update,
        },
        StateDescriptor {
            id: StateId::Terminated,
            name: "Terminated",
            on_enter: Some(terminated_enter),
            on_exit: None,
            on_update: terminated_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state: bring the rig up
// ═══════════════════════════════════════════════════════════════════════════

fn idle_update(ctx: &mut FsmContext<'_>) -> Result<Option<StateId>> {
    let t = ctx.config.timing;

    ctx.rig.connect()?;
    ctx.settle(t.open_settle_ms);

    let inlet = ctx.rig.gate_position(Gate::Inlet)?;
    let outlet = ctx.rig.gate_position(Gate::Outlet)?;
    info!("IDLE: gate positions inlet={} outlet={}", inlet, outlet);

    ctx.rig.set_gate(Gate::Inlet, GateState::Open)?;
    ctx.settle(t.gate_settle_ms);
    ctx.rig.set_gate(Gate::Outlet, GateState::Closed)?;
    ctx.settle(t.gate_settle_ms);

    ctx.rig.set_lights(true)?;
    info!("IDLE: lights enabled");

    let names = ctx.cameras.enumerate()?;
    let (upper, lower) = identify_cameras(&names)?;
    info!(
        "IDLE: upper camera {:?}, lower camera {:?}",
        names[upper], names[lower]
    );
    ctx.cameras.attach(CameraRole::Upper, upper)?;
    ctx.cameras.attach(CameraRole::Lower, lower)?;

    if ctx.config.feed == FeedMode::Dispenser {
        initialize_dispenser(ctx)?;
        match ctx.rig.dispenser_version() {
            Ok(version) => info!("IDLE: dispenser firmware {:?}", version),
            Err(e) => warn!("IDLE: dispenser version query failed: {}", e),
        }
    }

    ctx.emit(CycleEvent::RigReady);
    Ok(Some(StateId::AwaitingStart))
}

/// A mismatched `ok` to `I` gets one more try; the mechanism may have
/// still been settling from power-up.
fn initialize_dispenser(ctx: &mut FsmContext<'_>) -> Result<()> {
    match ctx.rig.init_dispenser() {
        Err(e) if e.is_unexpected_reply() => {
            warn!("IDLE: {}; retrying dispenser init once", e);
            ctx.rig.init_dispenser()
        }
        other => other,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  AWAITING_START: operator signal, then one dispense
// ═══════════════════════════════════════════════════════════════════════════

fn awaiting_start_update(ctx: &mut FsmContext<'_>) -> Result<Option<StateId>> {
    let prompt = match ctx.config.feed {
        FeedMode::Dispenser => "Press enter to dispense a specimen (q + enter quits)",
        FeedMode::HandLoad => "Load a specimen and press enter (q + enter quits)",
    };
    if ctx.operator.await_start(prompt) == StartSignal::Quit {
        info!("AWAITING_START: operator requested stop");
        return Ok(Some(StateId::Cleanup));
    }

    if ctx.config.feed == FeedMode::HandLoad {
        return Ok(Some(StateId::GateClosing));
    }

    ctx.dispense_attempts += 1;
    let outcome = ctx.rig.dispense()?;
    ctx.last_dispense = Some(outcome.clone());
    ctx.emit(CycleEvent::Dispensed(outcome.clone()));

    match outcome {
        DispenseOutcome::Dispensed => Ok(Some(StateId::GateClosing)),
        DispenseOutcome::Timeout | DispenseOutcome::NoDetect => {
            warn!(
                "AWAITING_START: dispenser reported {:?}; specimen not positioned, stopping",
                outcome
            );
            Ok(Some(StateId::Cleanup))
        }
        DispenseOutcome::Unexpected(raw) => Err(Error::UnexpectedStatus(raw)),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  GATE_CLOSING: trap the specimen, upper camera first
// ═══════════════════════════════════════════════════════════════════════════

fn gate_closing_update(ctx: &mut FsmContext<'_>) -> Result<Option<StateId>> {
    let t = ctx.config.timing;
    ctx.rig.set_gate(Gate::Inlet, GateState::Closed)?;
    ctx.settle(t.gate_close_settle_ms);

    // Upper window opens before the vane moves.
    ctx.cameras
        .start_capture(CameraRole::Upper, ctx.config.capture.frames_per_camera)?;
    ctx.settle(t.vane_settle_ms);
    Ok(Some(StateId::VaneAdvancing))
}

// ═══════════════════════════════════════════════════════════════════════════
//  VANE_ADVANCING
// ═══════════════════════════════════════════════════════════════════════════

fn vane_advancing_update(ctx: &mut FsmContext<'_>) -> Result<Option<StateId>> {
    ctx.rig.step_vane()?;
    ctx.settle(ctx.config.timing.vane_settle_ms);
    ctx.cameras
        .start_capture(CameraRole::Lower, ctx.config.capture.frames_per_camera)?;
    Ok(Some(StateId::Capturing))
}

// ═══════════════════════════════════════════════════════════════════════════
//  CAPTURING: one frame per tick until both windows drain
// ═══════════════════════════════════════════════════════════════════════════

fn capturing_update(ctx: &mut FsmContext<'_>) -> Result<Option<StateId>> {
    for role in CameraRole::BOTH {
        if ctx.cameras.is_capturing(role) {
            retrieve_frame(ctx, role)?;
            return Ok(None);
        }
    }
    Ok(Some(StateId::VaneReturning))
}

fn retrieve_frame(ctx: &mut FsmContext<'_>, role: CameraRole) -> Result<()> {
    let index = ctx.images.peek(role);
    let grab = ctx.cameras.retrieve(role, index)?;
    if grab.succeeded {
        info!("CAPTURING: saved {}{:03}", role.label(), index);
        ctx.images_saved += 1;
        ctx.emit(CycleEvent::ImageSaved { role, index });
        ctx.images.advance(role)?;
    } else {
        warn!(
            "CAPTURING: {} grab failed: {} {}",
            role.label(),
            grab.error_code,
            grab.error_description
        );
        ctx.emit(CycleEvent::GrabFailed {
            role,
            code: grab.error_code,
            description: grab.error_description,
        });
    }
    Ok(())
}

fn capturing_exit(ctx: &mut FsmContext<'_>) {
    ctx.images.finish_cycle();
}

// ═══════════════════════════════════════════════════════════════════════════
//  VANE_RETURNING / GATE_OPENING
// ═══════════════════════════════════════════════════════════════════════════

fn vane_returning_update(ctx: &mut FsmContext<'_>) -> Result<Option<StateId>> {
    // Same letter as the advance: the cam toggles.
    ctx.rig.step_vane()?;
    Ok(Some(StateId::GateOpening))
}

fn gate_opening_update(ctx: &mut FsmContext<'_>) -> Result<Option<StateId>> {
    ctx.rig.set_gate(Gate::Outlet, GateState::Open)?;
    ctx.settle(ctx.config.timing.gate_settle_ms);
    Ok(Some(StateId::PumpRunning))
}

// ═══════════════════════════════════════════════════════════════════════════
//  PUMP_RUNNING: flush the specimen out, reset the gates
// ═══════════════════════════════════════════════════════════════════════════

fn pump_running_update(ctx: &mut FsmContext<'_>) -> Result<Option<StateId>> {
    let t = ctx.config.timing;

    ctx.rig.set_pump(true)?;
    ctx.settle(t.pump_run_ms);
    ctx.rig.set_pump(false)?;

    ctx.settle(t.gate_settle_ms);
    ctx.rig.set_gate(Gate::Inlet, GateState::Open)?;
    ctx.settle(t.gate_settle_ms);
    ctx.rig.set_gate(Gate::Outlet, GateState::Closed)?;

    ctx.cycles_completed += 1;
    ctx.emit(CycleEvent::CycleCompleted(ctx.cycles_completed));
    info!("PUMP_RUNNING: cycle {} done", ctx.cycles_completed);

    if ctx.cycle_limit_reached() {
        info!("PUMP_RUNNING: cycle limit reached");
        return Ok(Some(StateId::Cleanup));
    }
    Ok(Some(StateId::AwaitingStart))
}

// ═══════════════════════════════════════════════════════════════════════════
//  CLEANUP: best-effort return to the safe resting configuration
// ═══════════════════════════════════════════════════════════════════════════

/// Stop the stepper and pump, park the gates, close cameras and lines.
///
/// Runs at most once per context.  Failures are logged and counted,
/// never retried: there is no safer fallback.
pub fn run_cleanup(ctx: &mut FsmContext<'_>) {
    if ctx.cleanup_runs > 0 {
        return;
    }
    ctx.cleanup_runs += 1;

    let mut failures = 0;
    let mut attempt = |what: &str, result: Result<()>| {
        if let Err(e) = result {
            warn!("CLEANUP: {} failed: {}", what, e);
            failures += 1;
        }
    };
    attempt("stepper off", ctx.rig.stepper_off());
    attempt("pump off", ctx.rig.set_pump(false));
    attempt("inlet gate open", ctx.rig.set_gate(Gate::Inlet, GateState::Open));
    attempt(
        "outlet gate closed",
        ctx.rig.set_gate(Gate::Outlet, GateState::Closed),
    );

    ctx.cameras.close();
    ctx.rig.disconnect();

    info!("CLEANUP: done ({} step(s) failed)", failures);
    ctx.emit(CycleEvent::CleanupDone { failures });
}

fn cleanup_enter(ctx: &mut FsmContext<'_>) -> Result<()> {
    run_cleanup(ctx);
    Ok(())
}

fn cleanup_update(_ctx: &mut FsmContext<'_>) -> Result<Option<StateId>> {
    Ok(Some(StateId::Terminated))
}

// ═══════════════════════════════════════════════════════════════════════════
//  TERMINATED
// ═══════════════════════════════════════════════════════════════════════════

fn terminated_enter(ctx: &mut FsmContext<'_>) -> Result<()> {
    match &ctx.fault {
        Some(e) => warn!("TERMINATED: run ended on fault: {}", e),
        None => info!(
            "TERMINATED: {} cycle(s), {} image(s)",
            ctx.cycles_completed, ctx.images_saved
        ),
    }
    Ok(())
}

fn terminated_update(_ctx: &mut FsmContext<'_>) -> Result<Option<StateId>> {
    Ok(None)
}
