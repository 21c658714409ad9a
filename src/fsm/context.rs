//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct state handlers read from and write
//! to: the injected ports, the rig configuration, per-run counters and
//! the fault slot.  Think of it as the "blackboard" in a blackboard
//! architecture.

use embedded_hal::delay::DelayNs;

use crate::app::events::CycleEvent;
use crate::app::ports::{CameraPort, CameraRole, EventSink, OperatorPort, RigPort};
use crate::config::RigConfig;
use crate::drivers::DispenseOutcome;
use crate::error::Error;

// ---------------------------------------------------------------------------
// Per-run counters
// ---------------------------------------------------------------------------

/// Numbering of saved frames.
///
/// Both cameras in one cycle count up from the same base, so the
/// upper and lower frames of a specimen share indices.  The next cycle
/// starts after the highest index either camera used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCounter {
    upper_next: u32,
    lower_next: u32,
}

impl ImageCounter {
    pub fn new(first_index: u32) -> Self {
        Self {
            upper_next: first_index,
            lower_next: first_index,
        }
    }

    /// Index the next successful grab of `role` will be saved under.
    pub fn peek(&self, role: CameraRole) -> u32 {
        match role {
            CameraRole::Upper => self.upper_next,
            CameraRole::Lower => self.lower_next,
        }
    }

    /// Consume the index after a successful grab.  Fails once the
    /// index space is used up rather than wrapping to 0.
    pub fn advance(&mut self, role: CameraRole) -> Result<(), Error> {
        let next = match role {
            CameraRole::Upper => &mut self.upper_next,
            CameraRole::Lower => &mut self.lower_next,
        };
        *next = next
            .checked_add(1)
            .ok_or(Error::ImageIndexExhausted(role))?;
        Ok(())
    }

    /// Close the cycle: the next one starts past every index used.
    pub fn finish_cycle(&mut self) {
        let next = self.upper_next.max(self.lower_next);
        *self = Self::new(next);
    }
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext<'a> {
    // -- Ports --
    pub rig: &'a mut dyn RigPort,
    pub cameras: &'a mut dyn CameraPort,
    pub operator: &'a mut dyn OperatorPort,
    pub sink: &'a mut dyn EventSink,
    /// Physical settle delays.
    pub delay: &'a mut dyn DelayNs,

    // -- Configuration --
    pub config: &'a RigConfig,

    // -- Run state --
    pub cycles_completed: u32,
    pub images: ImageCounter,
    pub images_saved: u32,
    pub dispense_attempts: u32,
    pub last_dispense: Option<DispenseOutcome>,
    /// How many times the cleanup sequence has run.  Never above 1.
    pub cleanup_runs: u32,
    /// First fatal error of the run.
    pub fault: Option<Error>,
}

impl<'a> FsmContext<'a> {
    pub fn new(
        config: &'a RigConfig,
        rig: &'a mut dyn RigPort,
        cameras: &'a mut dyn CameraPort,
        operator: &'a mut dyn OperatorPort,
        sink: &'a mut dyn EventSink,
        delay: &'a mut dyn DelayNs,
    ) -> Self {
        Self {
            rig,
            cameras,
            operator,
            sink,
            delay,
            config,
            cycles_completed: 0,
            images: ImageCounter::new(config.capture.first_image_index),
            images_saved: 0,
            dispense_attempts: 0,
            last_dispense: None,
            cleanup_runs: 0,
            fault: None,
        }
    }

    /// Sleep for a physical settle delay.
    pub fn settle(&mut self, ms: u32) {
        if ms > 0 {
            self.delay.delay_ms(ms);
        }
    }

    pub fn emit(&mut self, event: CycleEvent) {
        self.sink.emit(&event);
    }

    /// Keep the first fatal error; later ones are only reported.
    pub fn record_fault(&mut self, err: Error) {
        self.emit(CycleEvent::Fault(err.to_string()));
        if self.fault.is_none() {
            self.fault = Some(err);
        }
    }

    pub fn has_fault(&self) -> bool {
        self.fault.is_some()
    }

    /// True once `max_cycles` cycles have completed.
    pub fn cycle_limit_reached(&self) -> bool {
        self.config
            .max_cycles
            .is_some_and(|max| self.cycles_completed >= max)
    }
}
