//! Outbound cycle events.
//!
//! The [`Orchestrator`](super::service::Orchestrator) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters decide what
//! to do with them; the default one writes them to the console log.

use crate::drivers::DispenseOutcome;
use crate::fsm::StateId;

use super::ports::CameraRole;

/// Structured events emitted by the cycle core.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleEvent {
    /// The machine has started (carries initial state).
    Started(StateId),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// Setup finished; cycles may begin.
    RigReady,

    /// The dispenser reported the outcome of one dispense.
    Dispensed(DispenseOutcome),

    /// A frame was saved.
    ImageSaved { role: CameraRole, index: u32 },

    /// A frame grab failed inside the camera collaborator.
    GrabFailed {
        role: CameraRole,
        code: u32,
        description: String,
    },

    /// One full cycle finished (1-based count).
    CycleCompleted(u32),

    /// A fatal error interrupted the run.
    Fault(String),

    /// Cleanup finished; `failures` best-effort steps did not succeed.
    CleanupDone { failures: u32 },
}
