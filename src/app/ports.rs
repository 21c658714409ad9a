//! Port traits: the hexagonal boundary between the cycle logic and the rig.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Orchestrator (domain)
//! ```
//!
//! Driven adapters (serial rig, cameras, operator console, event sinks,
//! config storage) implement these traits.  The
//! [`Orchestrator`](super::service::Orchestrator) only ever sees them as
//! trait objects, so every cycle path can be exercised with mocks.

use crate::config::{Gate, GateState, RigConfig};
use crate::drivers::DispenseOutcome;
use crate::error::{Error, Result};

// ───────────────────────────────────────────────────────────────
// Rig port (domain → serial peripherals)
// ───────────────────────────────────────────────────────────────

/// Everything the cycle asks of the three serial peripherals.
///
/// Every method is a complete command exchange.  Errors already carry
/// the [`Device`](crate::error::Device) they came from.
pub trait RigPort {
    /// Open and configure every serial line the feed mode needs.
    fn connect(&mut self) -> Result<()>;

    /// Command one gate to its calibrated open or closed position.
    fn set_gate(&mut self, gate: Gate, state: GateState) -> Result<()>;

    /// Read back the servo position of one gate (quarter-µs).
    fn gate_position(&mut self, gate: Gate) -> Result<u16>;

    fn set_lights(&mut self, on: bool) -> Result<()>;

    /// Toggle the vane cam by one step.  There is no direction.
    fn step_vane(&mut self) -> Result<()>;

    /// De-energise the vane stepper.
    fn stepper_off(&mut self) -> Result<()>;

    fn set_pump(&mut self, on: bool) -> Result<()>;

    /// Send `I` once.  Retry policy belongs to the caller.
    fn init_dispenser(&mut self) -> Result<()>;

    /// Send `F`, require the acknowledgement, then wait for the status.
    fn dispense(&mut self) -> Result<DispenseOutcome>;

    /// Firmware identification string of the dispenser.
    fn dispenser_version(&mut self) -> Result<String>;

    /// Close every open line.  Idempotent.
    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Camera port (domain → imaging collaborator)
// ───────────────────────────────────────────────────────────────

/// Which physical position a camera occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraRole {
    /// Looks down; captures before the vane moves.
    Upper,
    /// Looks up; captures after the vane has turned.
    Lower,
}

impl CameraRole {
    pub const BOTH: [CameraRole; 2] = [Self::Upper, Self::Lower];

    /// Prefix used for saved image names (`Upper007`, `Lower007`).
    pub fn label(self) -> &'static str {
        match self {
            Self::Upper => "Upper",
            Self::Lower => "Lower",
        }
    }
}

/// Outcome of one frame retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrabResult {
    pub succeeded: bool,
    pub error_code: u32,
    pub error_description: String,
}

impl GrabResult {
    pub fn ok() -> Self {
        Self {
            succeeded: true,
            error_code: 0,
            error_description: String::new(),
        }
    }

    pub fn failed(error_code: u32, description: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            error_code,
            error_description: description.into(),
        }
    }
}

/// The two machine-vision cameras.  Acquisition, conversion and
/// persistence all happen behind this trait.
pub trait CameraPort {
    /// Friendly names of every attached camera, in enumeration order.
    fn enumerate(&mut self) -> Result<Vec<String>>;

    /// Bind enumeration entry `index` to `role` and open it.
    fn attach(&mut self, role: CameraRole, index: usize) -> Result<()>;

    /// Begin grabbing `frames` frames on `role`.
    fn start_capture(&mut self, role: CameraRole, frames: u32) -> Result<()>;

    /// True while `role` still has frames to deliver.
    fn is_capturing(&mut self, role: CameraRole) -> bool;

    /// Retrieve the next frame of `role`, saving it under `image_index`
    /// if the grab succeeded.
    fn retrieve(&mut self, role: CameraRole, image_index: u32) -> Result<GrabResult>;

    /// Close both cameras.  Idempotent.
    fn close(&mut self);
}

/// Pick (upper, lower) enumeration indices from the camera names.
///
/// Exactly two cameras are required.  Entry 0 is the upper camera iff
/// its name starts with `"upper"`; otherwise entry 1 is.
pub fn identify_cameras(names: &[String]) -> Result<(usize, usize)> {
    if names.len() != 2 {
        return Err(Error::CameraEnumeration { found: names.len() });
    }
    if names[0].starts_with("upper") {
        Ok((0, 1))
    } else {
        Ok((1, 0))
    }
}

// ───────────────────────────────────────────────────────────────
// Operator port (domain ← human at the rig)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartSignal {
    Proceed,
    Quit,
}

/// Source of the per-cycle start signal.
pub trait OperatorPort {
    /// Show `prompt` and block until the operator answers.
    fn await_start(&mut self, prompt: &str) -> StartSignal;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`CycleEvent`](super::events::CycleEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::CycleEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (domain ← persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads the rig configuration.
///
/// Implementations MUST validate before returning.  Out-of-range
/// calibration is rejected with
/// [`ConfigError::ValidationFailed`](crate::config::ConfigError::ValidationFailed),
/// never clamped.
pub trait ConfigPort {
    fn load(&self) -> core::result::Result<RigConfig, crate::config::ConfigError>;
}
