//! Rig configuration parameters
//!
//! Everything that is a property of one physical photobooth rather than of
//! the protocol: device paths, gate calibration, settle delays, poll
//! budgets, capture sizes and the cycle policy.  Loaded from a JSON file
//! (see [`crate::adapters::config_file`]) or taken from [`Default`].

use serde::{Deserialize, Serialize};

/// Lowest servo target accepted by the calibration (500 µs pulse).
pub const SERVO_TARGET_MIN: u16 = 2000;
/// Highest servo target accepted by the calibration (2500 µs pulse).
pub const SERVO_TARGET_MAX: u16 = 10000;

/// Line speed shared by all three peripherals.
pub const BAUD_RATE: u32 = 9600;

// ---------------------------------------------------------------------------
// Gates
// ---------------------------------------------------------------------------

/// The two servo-driven gates.  The discriminant is the servo channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Gate {
    Inlet = 0,
    Outlet = 1,
}

impl Gate {
    /// Servo controller channel this gate is wired to.
    pub const fn channel(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Open,
    Closed,
}

/// Open/closed targets for one gate, in quarter-microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateCalibration {
    pub open: u16,
    pub closed: u16,
}

impl GateCalibration {
    pub const fn target(&self, state: GateState) -> u16 {
        match state {
            GateState::Open => self.open,
            GateState::Closed => self.closed,
        }
    }
}

/// Per-gate calibration.  Positions are only reachable through
/// [`Calibration::target`], keyed by gate, so an outlet value can never be
/// sent to the inlet channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calibration {
    pub inlet: GateCalibration,
    pub outlet: GateCalibration,
}

impl Calibration {
    pub const fn target(&self, gate: Gate, state: GateState) -> u16 {
        match gate {
            Gate::Inlet => self.inlet.target(state),
            Gate::Outlet => self.outlet.target(state),
        }
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            inlet: GateCalibration {
                open: 7000,
                closed: 5600,
            },
            outlet: GateCalibration {
                open: 5700,
                closed: 7000,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Ports, timing, capture
// ---------------------------------------------------------------------------

/// Character device paths of the three peripherals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortPaths {
    pub servo_controller: String,
    pub actuator: String,
    /// Not needed in hand-load mode.
    pub dispenser: Option<String>,
}

impl Default for PortPaths {
    fn default() -> Self {
        Self {
            servo_controller: "/dev/ttyACM0".into(),
            actuator: "/dev/ttyUSB0".into(),
            dispenser: Some("/dev/ttyACM2".into()),
        }
    }
}

/// Settle delays and read budgets.  Delays are in milliseconds; budgets
/// are counted in poll iterations, not wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Sleep between empty polls of a serial line (µs).
    pub poll_interval_us: u32,
    /// Polls allowed for an immediate acknowledgement.
    pub reply_budget_polls: u32,
    /// Polls allowed for the dispenser's delayed status line.
    pub dispense_status_budget_polls: u32,
    /// Pause after flushing input before a command is written.
    pub flush_settle_ms: u32,
    /// Default pause between writing a text command and reading its echo.
    pub command_settle_ms: u32,
    /// Pause after `I` while the dispenser mechanism resets.
    pub dispenser_init_settle_ms: u32,
    /// Pause between a servo position request and its reply.
    pub servo_query_settle_ms: u32,
    /// Pause after commanding a gate.
    pub gate_settle_ms: u32,
    /// Pause after the inlet gate closes, before the upper camera starts.
    pub gate_close_settle_ms: u32,
    /// Pause around the vane step so the capture windows see a still vane.
    pub vane_settle_ms: u32,
    /// How long the pump runs to move the specimen out.
    pub pump_run_ms: u32,
    /// Pause after the serial lines open before the first command.
    pub open_settle_ms: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_interval_us: 1000, // 1 ms
            reply_budget_polls: 2000,
            dispense_status_budget_polls: 25_000,
            flush_settle_ms: 100,
            command_settle_ms: 500,
            dispenser_init_settle_ms: 1500,
            servo_query_settle_ms: 50,
            gate_settle_ms: 100,
            gate_close_settle_ms: 1000,
            vane_settle_ms: 1000,
            pump_run_ms: 4000,
            open_settle_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Frames grabbed by each camera per cycle.
    pub frames_per_camera: u32,
    /// Index given to the first saved image of the run.
    pub first_image_index: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frames_per_camera: 3,
            first_image_index: 0,
        }
    }
}

/// How a specimen gets into the booth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
    /// The pneumatic dispenser releases one specimen per cycle.
    Dispenser,
    /// The operator loads the specimen by hand and confirms.
    HandLoad,
}

/// Where the start signal for each cycle comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorMode {
    /// Prompt on the console; `q` quits.
    Console,
    /// Proceed immediately (bounded by `max_cycles`).
    Auto,
}

// ---------------------------------------------------------------------------
// RigConfig
// ---------------------------------------------------------------------------

/// Complete configuration for one rig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub ports: PortPaths,
    pub calibration: Calibration,
    pub timing: Timing,
    pub capture: CaptureConfig,
    pub feed: FeedMode,
    pub operator: OperatorMode,
    /// Stop after this many completed cycles; `None` runs until the
    /// operator quits or the dispenser reports a terminal outcome.
    pub max_cycles: Option<u32>,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            ports: PortPaths::default(),
            calibration: Calibration::default(),
            timing: Timing::default(),
            capture: CaptureConfig::default(),
            feed: FeedMode::Dispenser,
            operator: OperatorMode::Console,
            max_cycles: None,
        }
    }
}

impl RigConfig {
    /// Reject values that would drive the rig somewhere unsafe or make
    /// the serial layer unable to terminate a read.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let gates = [
            (
                self.calibration.inlet,
                "inlet gate target outside 2000..=10000",
                "inlet gate open and closed targets are equal",
            ),
            (
                self.calibration.outlet,
                "outlet gate target outside 2000..=10000",
                "outlet gate open and closed targets are equal",
            ),
        ];
        for (cal, out_of_range, degenerate) in gates {
            let in_range = |t: u16| (SERVO_TARGET_MIN..=SERVO_TARGET_MAX).contains(&t);
            if !in_range(cal.open) || !in_range(cal.closed) {
                return Err(ConfigError::ValidationFailed(out_of_range));
            }
            if cal.open == cal.closed {
                return Err(ConfigError::ValidationFailed(degenerate));
            }
        }

        if self.timing.poll_interval_us == 0 {
            return Err(ConfigError::ValidationFailed("poll interval must be non-zero"));
        }
        if self.timing.reply_budget_polls == 0 || self.timing.dispense_status_budget_polls == 0 {
            return Err(ConfigError::ValidationFailed("read budgets must be non-zero"));
        }
        if self.capture.frames_per_camera == 0 {
            return Err(ConfigError::ValidationFailed("frames per camera must be non-zero"));
        }
        if self
            .capture
            .first_image_index
            .checked_add(self.capture.frames_per_camera)
            .is_none()
        {
            return Err(ConfigError::ValidationFailed(
                "first image index leaves no room for one cycle",
            ));
        }
        if self.feed == FeedMode::Dispenser && self.ports.dispenser.is_none() {
            return Err(ConfigError::ValidationFailed(
                "dispenser feed mode needs a dispenser port",
            ));
        }
        if self.max_cycles == Some(0) {
            return Err(ConfigError::ValidationFailed("max_cycles must be at least 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from loading or validating a [`RigConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file does not exist.
    #[error("config not found: {0}")]
    NotFound(String),
    /// The file exists but is not a valid config document.
    #[error("config corrupted: {0}")]
    Corrupted(String),
    /// A field failed range validation.
    #[error("validation failed: {0}")]
    ValidationFailed(&'static str),
    /// Reading the file failed.
    #[error("I/O error: {0}")]
    Io(String),
}
