//! Unified error types for the photobooth controller.
//!
//! Two layers:
//!
//! - [`ProtocolError`]: what a single command exchange on one serial
//!   line can fail with.  Only [`ProtocolError::UnexpectedReply`] is
//!   recoverable; everything else means the line itself is broken.
//! - [`Error`]: the crate-wide type the orchestrator and the binary
//!   deal in.  Every variant names the device it came from so the
//!   console diagnostic can say which peripheral misbehaved.

use core::fmt;

use crate::app::ports::CameraRole;
use crate::config::ConfigError;

// ---------------------------------------------------------------------------
// Device identity
// ---------------------------------------------------------------------------

/// The three independently addressed serial peripherals on the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    /// Servo controller driving the inlet and outlet gates.
    ServoController,
    /// Microcontroller switching lights, the vane stepper and the pump.
    Actuator,
    /// Pneumatic specimen dispenser.
    Dispenser,
}

impl Device {
    pub const ALL: [Device; 3] = [Self::ServoController, Self::Actuator, Self::Dispenser];
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServoController => write!(f, "servo controller"),
            Self::Actuator => write!(f, "actuator controller"),
            Self::Dispenser => write!(f, "dispenser"),
        }
    }
}

// ---------------------------------------------------------------------------
// Protocol errors (one command exchange)
// ---------------------------------------------------------------------------

/// Failure of one request/response exchange on a serial line.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The underlying read or write failed outright.
    #[error("serial I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Fewer bytes left the port than were handed to it.
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// A fixed-length binary reply came back incomplete.
    #[error("short read: {got} of {expected} bytes")]
    ShortRead { got: usize, expected: usize },

    /// Nothing terminated the reply within the poll budget.
    #[error("no reply within {budget} polls (partial: {partial:?})")]
    TimedOut { budget: u32, partial: String },

    /// A complete reply arrived but it was not the expected literal.
    #[error("unexpected reply {0:?}")]
    UnexpectedReply(String),
}

impl ProtocolError {
    /// True only for a reply mismatch; the line is still usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnexpectedReply(_))
    }
}

// ---------------------------------------------------------------------------
// Crate-wide error
// ---------------------------------------------------------------------------

/// Every fallible rig operation funnels into this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The device node could not be opened.
    #[error("{device} unavailable at {path}: {source}")]
    DeviceUnavailable {
        device: Device,
        path: String,
        #[source]
        source: serialport::Error,
    },

    /// The line opened but raw 8N1 settings could not be applied.
    #[error("{device} at {path} could not be configured: {source}")]
    Configuration {
        device: Device,
        path: String,
        #[source]
        source: serialport::Error,
    },

    /// A command exchange with an open device failed.
    #[error("{device}: {source}")]
    Protocol {
        device: Device,
        #[source]
        source: ProtocolError,
    },

    /// A command was issued to a device whose channel is not open.
    #[error("{0} is not connected")]
    NotConnected(Device),

    /// The dispenser reported a status line outside its vocabulary.
    #[error("dispenser reported unexpected status {0:?}")]
    UnexpectedStatus(String),

    /// The wrong number of cameras is attached.
    #[error("expected exactly two cameras, found {found}")]
    CameraEnumeration { found: usize },

    /// No image index is left for the next frame.
    #[error("image index space exhausted for the {0:?} camera")]
    ImageIndexExhausted(CameraRole),

    /// The imaging collaborator failed.
    #[error("camera: {0}")]
    Camera(String),

    /// The rig configuration is unusable.
    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Wrap a protocol failure with the device it happened on.
    pub fn protocol(device: Device, source: ProtocolError) -> Self {
        Self::Protocol { device, source }
    }

    /// The serial peripheral this error concerns, if any.
    pub fn device(&self) -> Option<Device> {
        match self {
            Self::DeviceUnavailable { device, .. }
            | Self::Configuration { device, .. }
            | Self::Protocol { device, .. }
            | Self::NotConnected(device) => Some(*device),
            Self::UnexpectedStatus(_) => Some(Device::Dispenser),
            Self::CameraEnumeration { .. }
            | Self::ImageIndexExhausted(_)
            | Self::Camera(_)
            | Self::Config(_) => None,
        }
    }

    /// True when the failure is a reply mismatch the caller may retry.
    pub fn is_unexpected_reply(&self) -> bool {
        matches!(self, Self::Protocol { source, .. } if source.is_recoverable())
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
