//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing cycle events through the `log`
//! facade (stderr via `env_logger` in the binary).

use log::{error, info, warn};

use crate::app::events::CycleEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`CycleEvent`] to the console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &CycleEvent) {
        match event {
            CycleEvent::Started(state) => info!("START | initial_state={:?}", state),
            CycleEvent::StateChanged { from, to } => info!("STATE | {:?} -> {:?}", from, to),
            CycleEvent::RigReady => info!("READY | rig set up"),
            CycleEvent::Dispensed(outcome) => info!("DISPENSE | {:?}", outcome),
            CycleEvent::ImageSaved { role, index } => {
                info!("IMAGE | {}{:03}", role.label(), index);
            }
            CycleEvent::GrabFailed {
                role,
                code,
                description,
            } => warn!("IMAGE | {} grab failed: {} {}", role.label(), code, description),
            CycleEvent::CycleCompleted(n) => info!("CYCLE | {} complete", n),
            CycleEvent::Fault(msg) => error!("FAULT | {}", msg),
            CycleEvent::CleanupDone { failures: 0 } => info!("CLEANUP | rig safe"),
            CycleEvent::CleanupDone { failures } => {
                warn!("CLEANUP | finished with {} failed step(s)", failures);
            }
        }
    }
}
