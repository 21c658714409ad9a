//! Mock rig adapters for integration tests.
//!
//! Records every rig call so tests can assert on the full command
//! history without touching real serial lines.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;
use photobooth::app::events::CycleEvent;
use photobooth::app::ports::{
    CameraPort, CameraRole, EventSink, GrabResult, OperatorPort, RigPort, StartSignal,
};
use photobooth::config::{Gate, GateState};
use photobooth::drivers::DispenseOutcome;
use photobooth::error::{Device, Error, ProtocolError, Result};

// ── Rig call record ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigCall {
    Connect,
    SetGate(Gate, GateState),
    GatePosition(Gate),
    Lights(bool),
    StepVane,
    StepperOff,
    Pump(bool),
    InitDispenser,
    Dispense,
    Version,
    Disconnect,
}

impl RigCall {
    fn device(self) -> Device {
        match self {
            Self::SetGate(..) | Self::GatePosition(_) => Device::ServoController,
            Self::InitDispenser | Self::Dispense | Self::Version => Device::Dispenser,
            _ => Device::Actuator,
        }
    }
}

// ── Shared sequence ───────────────────────────────────────────

/// One entry in the cross-device history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Rig(RigCall),
    StartCapture(CameraRole),
}

/// History shared by a rig and a camera pair, in call order.
pub type Sequence = Rc<RefCell<Vec<Step>>>;

/// Make `cameras` record into the same history as `rig`.
#[allow(dead_code)]
pub fn linked(rig: MockRig, mut cameras: MockCameras) -> (MockRig, MockCameras) {
    cameras.sequence = Rc::clone(&rig.sequence);
    (rig, cameras)
}

/// Position of the first `step` in `sequence`.
#[allow(dead_code)]
pub fn position(sequence: &Sequence, step: Step) -> Option<usize> {
    sequence.borrow().iter().position(|s| *s == step)
}

// ── MockRig ───────────────────────────────────────────────────

pub struct MockRig {
    pub calls: Vec<RigCall>,
    /// Status lines the dispenser reports, one per dispense.
    pub outcomes: VecDeque<DispenseOutcome>,
    /// Fail the first call equal to this one with a transport error.
    pub fail_on: Option<RigCall>,
    /// Answer this many `init_dispenser` calls with a wrong reply.
    pub init_mismatches: u32,
    /// Raise the flag when this call is made, as Ctrl-C would.
    pub interrupt_on: Option<(RigCall, Arc<AtomicBool>)>,
    pub sequence: Sequence,
}

#[allow(dead_code)]
impl MockRig {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            outcomes: VecDeque::new(),
            fail_on: None,
            init_mismatches: 0,
            interrupt_on: None,
            sequence: Sequence::default(),
        }
    }

    pub fn with_outcomes(outcomes: impl IntoIterator<Item = DispenseOutcome>) -> Self {
        let mut rig = Self::new();
        rig.outcomes = outcomes.into_iter().collect();
        rig
    }

    pub fn count(&self, call: RigCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }

    /// Last commanded state of `gate`.
    pub fn gate(&self, gate: Gate) -> Option<GateState> {
        self.calls.iter().rev().find_map(|c| match c {
            RigCall::SetGate(g, s) if *g == gate => Some(*s),
            _ => None,
        })
    }

    pub fn pump_on(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                RigCall::Pump(on) => Some(*on),
                _ => None,
            })
            .unwrap_or(false)
    }

    fn record(&mut self, call: RigCall) -> Result<()> {
        self.calls.push(call);
        self.sequence.borrow_mut().push(Step::Rig(call));
        if let Some((_, stop)) = self.interrupt_on.as_ref().filter(|(on, _)| *on == call) {
            stop.store(true, Ordering::SeqCst);
        }
        if self.fail_on == Some(call) {
            self.fail_on = None;
            return Err(Error::protocol(
                call.device(),
                ProtocolError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "cable pulled",
                )),
            ));
        }
        Ok(())
    }
}

impl Default for MockRig {
    fn default() -> Self {
        Self::new()
    }
}

impl RigPort for MockRig {
    fn connect(&mut self) -> Result<()> {
        self.record(RigCall::Connect)
    }

    fn set_gate(&mut self, gate: Gate, state: GateState) -> Result<()> {
        self.record(RigCall::SetGate(gate, state))
    }

    fn gate_position(&mut self, gate: Gate) -> Result<u16> {
        self.record(RigCall::GatePosition(gate))?;
        Ok(6000)
    }

    fn set_lights(&mut self, on: bool) -> Result<()> {
        self.record(RigCall::Lights(on))
    }

    fn step_vane(&mut self) -> Result<()> {
        self.record(RigCall::StepVane)
    }

    fn stepper_off(&mut self) -> Result<()> {
        self.record(RigCall::StepperOff)
    }

    fn set_pump(&mut self, on: bool) -> Result<()> {
        self.record(RigCall::Pump(on))
    }

    fn init_dispenser(&mut self) -> Result<()> {
        self.record(RigCall::InitDispenser)?;
        if self.init_mismatches > 0 {
            self.init_mismatches -= 1;
            return Err(Error::protocol(
                Device::Dispenser,
                ProtocolError::UnexpectedReply("o\n".into()),
            ));
        }
        Ok(())
    }

    fn dispense(&mut self) -> Result<DispenseOutcome> {
        self.record(RigCall::Dispense)?;
        Ok(self.outcomes.pop_front().unwrap_or(DispenseOutcome::Timeout))
    }

    fn dispenser_version(&mut self) -> Result<String> {
        self.record(RigCall::Version)?;
        Ok("mock dispenser 1.0".into())
    }

    fn disconnect(&mut self) {
        self.calls.push(RigCall::Disconnect);
        self.sequence
            .borrow_mut()
            .push(Step::Rig(RigCall::Disconnect));
    }
}

// ── MockCameras ───────────────────────────────────────────────

pub struct MockCameras {
    pub names: Vec<String>,
    pub attached: Vec<(CameraRole, usize)>,
    pub windows: Vec<(CameraRole, u32)>,
    pending: [u32; 2],
    /// Grabs that fail, as (role, index offered).
    pub failing: Vec<(CameraRole, u32)>,
    pub saved: Vec<(CameraRole, u32)>,
    pub closes: u32,
    pub sequence: Sequence,
}

fn slot(role: CameraRole) -> usize {
    match role {
        CameraRole::Upper => 0,
        CameraRole::Lower => 1,
    }
}

#[allow(dead_code)]
impl MockCameras {
    pub fn new() -> Self {
        Self::named(&["lower-40123", "upper-40124"])
    }

    pub fn named(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| (*n).to_owned()).collect(),
            attached: Vec::new(),
            windows: Vec::new(),
            pending: [0; 2],
            failing: Vec::new(),
            saved: Vec::new(),
            closes: 0,
            sequence: Sequence::default(),
        }
    }

    pub fn saved_by(&self, role: CameraRole) -> Vec<u32> {
        self.saved
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, i)| *i)
            .collect()
    }
}

impl Default for MockCameras {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraPort for MockCameras {
    fn enumerate(&mut self) -> Result<Vec<String>> {
        Ok(self.names.clone())
    }

    fn attach(&mut self, role: CameraRole, index: usize) -> Result<()> {
        self.attached.push((role, index));
        Ok(())
    }

    fn start_capture(&mut self, role: CameraRole, frames: u32) -> Result<()> {
        self.windows.push((role, frames));
        self.sequence.borrow_mut().push(Step::StartCapture(role));
        self.pending[slot(role)] = frames;
        Ok(())
    }

    fn is_capturing(&mut self, role: CameraRole) -> bool {
        self.pending[slot(role)] > 0
    }

    fn retrieve(&mut self, role: CameraRole, image_index: u32) -> Result<GrabResult> {
        let pending = &mut self.pending[slot(role)];
        if *pending == 0 {
            return Err(Error::Camera("not grabbing".into()));
        }
        *pending -= 1;
        if let Some(pos) = self.failing.iter().position(|f| *f == (role, image_index)) {
            self.failing.remove(pos);
            return Ok(GrabResult::failed(0xE100_0014, "buffer incompletely grabbed"));
        }
        self.saved.push((role, image_index));
        Ok(GrabResult::ok())
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

// ── ScriptedOperator ──────────────────────────────────────────

/// Answers from a script, then quits.
#[derive(Default)]
pub struct ScriptedOperator {
    pub script: VecDeque<StartSignal>,
    pub prompts: Vec<String>,
}

#[allow(dead_code)]
impl ScriptedOperator {
    pub fn new(script: impl IntoIterator<Item = StartSignal>) -> Self {
        Self {
            script: script.into_iter().collect(),
            prompts: Vec::new(),
        }
    }

    pub fn proceeding(times: usize) -> Self {
        Self::new(std::iter::repeat_n(StartSignal::Proceed, times))
    }
}

impl OperatorPort for ScriptedOperator {
    fn await_start(&mut self, prompt: &str) -> StartSignal {
        self.prompts.push(prompt.to_owned());
        self.script.pop_front().unwrap_or(StartSignal::Quit)
    }
}

// ── Sink and delay ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<CycleEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &CycleEvent) {
        self.events.push(event.clone());
    }
}

/// Adds up requested settle time without sleeping.
#[derive(Default, Clone)]
pub struct NoDelay {
    pub total_ms: u64,
}

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ms += u64::from(ns) / 1_000_000;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ms += u64::from(ms);
    }
}
