//! Integration tests for the Orchestrator → FSM → rig ports pipeline.

use std::rc::Rc;

use photobooth::app::events::CycleEvent;
use photobooth::app::ports::{CameraRole, StartSignal};
use photobooth::app::service::{Orchestrator, RunReport};
use photobooth::config::{FeedMode, Gate, GateState, RigConfig};
use photobooth::drivers::DispenseOutcome;
use photobooth::error::Error;
use photobooth::fsm::StateId;

use crate::mock_hw::{
    MockCameras, MockRig, NoDelay, RecordingSink, RigCall, ScriptedOperator, Step, linked, position,
};

struct Run {
    report: RunReport,
    rig: MockRig,
    cameras: MockCameras,
    operator: ScriptedOperator,
    sink: RecordingSink,
    delay: NoDelay,
}

fn run_with(
    config: RigConfig,
    mut rig: MockRig,
    mut cameras: MockCameras,
    mut operator: ScriptedOperator,
) -> Run {
    let orchestrator = Orchestrator::new(config).unwrap();
    let mut sink = RecordingSink::default();
    let mut delay = NoDelay::default();
    let report = orchestrator.run(&mut rig, &mut cameras, &mut operator, &mut sink, &mut delay);
    Run {
        report,
        rig,
        cameras,
        operator,
        sink,
        delay,
    }
}

// ── Dispensed path ────────────────────────────────────────────

#[test]
fn dispensed_specimen_is_photographed_once() {
    let run = run_with(
        RigConfig::default(),
        MockRig::with_outcomes([DispenseOutcome::Dispensed]),
        MockCameras::new(),
        ScriptedOperator::new([StartSignal::Proceed, StartSignal::Quit]),
    );

    assert!(run.report.is_success());
    assert_eq!(run.report.entries(StateId::VaneAdvancing), 1);
    assert_eq!(run.rig.count(RigCall::Dispense), 1, "never a second dispense");
    assert_eq!(run.report.cycles_completed, 1);
    assert_eq!(run.report.images_saved, 6);
    assert_eq!(run.report.last_dispense, Some(DispenseOutcome::Dispensed));
    // Vane toggled out and back.
    assert_eq!(run.rig.count(RigCall::StepVane), 2);
}

#[test]
fn setup_order_and_initial_configuration() {
    let run = run_with(
        RigConfig::default(),
        MockRig::new(),
        MockCameras::new(),
        ScriptedOperator::new([StartSignal::Quit]),
    );

    assert_eq!(
        &run.rig.calls[..8],
        [
            RigCall::Connect,
            RigCall::GatePosition(Gate::Inlet),
            RigCall::GatePosition(Gate::Outlet),
            RigCall::SetGate(Gate::Inlet, GateState::Open),
            RigCall::SetGate(Gate::Outlet, GateState::Closed),
            RigCall::Lights(true),
            RigCall::InitDispenser,
            RigCall::Version,
        ]
    );
    // Entry 1 is named "upper-…".
    assert_eq!(
        run.cameras.attached,
        [(CameraRole::Upper, 1), (CameraRole::Lower, 0)]
    );
    assert!(run.sink.events.contains(&CycleEvent::RigReady));
    assert_eq!(run.operator.prompts.len(), 1);
}

#[test]
fn upper_window_opens_before_vane_moves() {
    let (rig, cameras) = linked(
        MockRig::with_outcomes([DispenseOutcome::Dispensed]),
        MockCameras::new(),
    );
    let sequence = Rc::clone(&rig.sequence);
    let run = run_with(
        RigConfig::default(),
        rig,
        cameras,
        ScriptedOperator::proceeding(1),
    );
    assert_eq!(
        run.cameras.windows,
        [(CameraRole::Upper, 3), (CameraRole::Lower, 3)]
    );

    let at = |step| position(&sequence, step).unwrap();
    let inlet_closed = at(Step::Rig(RigCall::SetGate(Gate::Inlet, GateState::Closed)));
    let upper = at(Step::StartCapture(CameraRole::Upper));
    let vane = at(Step::Rig(RigCall::StepVane));
    let lower = at(Step::StartCapture(CameraRole::Lower));
    assert!(inlet_closed < upper);
    assert!(upper < vane, "upper window must open before the vane moves");
    assert!(vane < lower, "lower window opens after the vane step");

    let outlet_open = at(Step::Rig(RigCall::SetGate(Gate::Outlet, GateState::Open)));
    assert!(outlet_open < at(Step::Rig(RigCall::Pump(true))));
}

#[test]
fn cycle_limit_stops_unattended_run() {
    let mut config = RigConfig::default();
    config.max_cycles = Some(3);
    let run = run_with(
        config,
        MockRig::with_outcomes(vec![DispenseOutcome::Dispensed; 3]),
        MockCameras::new(),
        ScriptedOperator::proceeding(10),
    );
    assert!(run.report.is_success());
    assert_eq!(run.report.cycles_completed, 3);
    assert_eq!(run.report.entries(StateId::AwaitingStart), 3);
    assert_eq!(run.operator.prompts.len(), 3);
    assert!(run.sink.events.contains(&CycleEvent::CycleCompleted(3)));
}

#[test]
fn image_indices_pair_up_across_cameras() {
    let mut config = RigConfig::default();
    config.capture.first_image_index = 7;
    config.capture.frames_per_camera = 2;
    let run = run_with(
        config,
        MockRig::with_outcomes([DispenseOutcome::Dispensed, DispenseOutcome::Dispensed]),
        MockCameras::new(),
        ScriptedOperator::proceeding(2),
    );
    assert_eq!(run.cameras.saved_by(CameraRole::Upper), [7, 8, 9, 10]);
    assert_eq!(run.cameras.saved_by(CameraRole::Lower), [7, 8, 9, 10]);
}

#[test]
fn exhausted_image_index_faults_instead_of_wrapping() {
    let mut config = RigConfig::default();
    config.capture.first_image_index = u32::MAX;
    assert!(matches!(
        Orchestrator::new(config.clone()),
        Err(Error::Config(_))
    ));

    // Room for exactly one cycle of three frames, then the base is MAX.
    config.capture.first_image_index = u32::MAX - 3;
    let run = run_with(
        config,
        MockRig::with_outcomes([DispenseOutcome::Dispensed, DispenseOutcome::Dispensed]),
        MockCameras::new(),
        ScriptedOperator::proceeding(2),
    );
    assert!(matches!(
        run.report.fault,
        Some(Error::ImageIndexExhausted(CameraRole::Upper))
    ));
    assert_eq!(run.report.cycles_completed, 1);
    assert_eq!(run.cameras.saved_by(CameraRole::Upper).last(), Some(&u32::MAX));
    assert!(!run.cameras.saved_by(CameraRole::Upper).contains(&0));
    assert_eq!(run.report.cleanup_runs, 1);
    assert_eq!(run.rig.gate(Gate::Outlet), Some(GateState::Closed));
}

#[test]
fn failed_grab_does_not_consume_an_index() {
    let mut cameras = MockCameras::new();
    cameras.failing.push((CameraRole::Lower, 1));
    let run = run_with(
        RigConfig::default(),
        MockRig::with_outcomes([DispenseOutcome::Dispensed]),
        cameras,
        ScriptedOperator::proceeding(1),
    );
    // Three frames offered, the second failed and its index was reused.
    assert_eq!(run.cameras.saved_by(CameraRole::Lower), [0, 1]);
    assert_eq!(run.report.images_saved, 5);
    assert!(run.report.is_success());
    assert!(run.sink.events.iter().any(|e| matches!(
        e,
        CycleEvent::GrabFailed {
            role: CameraRole::Lower,
            ..
        }
    )));
}

#[test]
fn pump_runs_for_configured_time() {
    let mut config = RigConfig::default();
    config.timing.pump_run_ms = 2500;
    let quick = run_with(
        config.clone(),
        MockRig::with_outcomes([DispenseOutcome::Dispensed]),
        MockCameras::new(),
        ScriptedOperator::proceeding(1),
    );
    config.timing.pump_run_ms = 4000;
    let slow = run_with(
        config,
        MockRig::with_outcomes([DispenseOutcome::Dispensed]),
        MockCameras::new(),
        ScriptedOperator::proceeding(1),
    );
    assert_eq!(slow.delay.total_ms - quick.delay.total_ms, 1500);
}

// ── Terminal dispenser outcomes ───────────────────────────────

#[test]
fn timeout_and_no_detect_skip_photography() {
    for outcome in [DispenseOutcome::Timeout, DispenseOutcome::NoDetect] {
        let run = run_with(
            RigConfig::default(),
            MockRig::with_outcomes([outcome.clone()]),
            MockCameras::new(),
            ScriptedOperator::proceeding(5),
        );

        assert!(run.report.is_success(), "{outcome:?} is not a fault");
        assert_eq!(run.report.last_dispense, Some(outcome.clone()));
        for skipped in [
            StateId::GateClosing,
            StateId::VaneAdvancing,
            StateId::Capturing,
            StateId::VaneReturning,
        ] {
            assert_eq!(run.report.entries(skipped), 0, "{outcome:?} entered {skipped:?}");
        }
        assert_eq!(run.rig.count(RigCall::StepVane), 0);
        assert_eq!(run.rig.gate(Gate::Inlet), Some(GateState::Open));
        assert_eq!(run.rig.gate(Gate::Outlet), Some(GateState::Closed));
        assert!(run.cameras.windows.is_empty());
    }
}

#[test]
fn unexpected_status_ends_run_with_fault() {
    let run = run_with(
        RigConfig::default(),
        MockRig::with_outcomes([DispenseOutcome::Unexpected("x".into())]),
        MockCameras::new(),
        ScriptedOperator::proceeding(5),
    );
    assert!(matches!(run.report.fault, Some(Error::UnexpectedStatus(ref s)) if s == "x"));
    assert_eq!(run.report.entries(StateId::GateClosing), 0);
    assert_eq!(run.report.cleanup_runs, 1);
}

// ── Setup variants ────────────────────────────────────────────

#[test]
fn dispenser_init_mismatch_is_retried_once() {
    let mut rig = MockRig::new();
    rig.init_mismatches = 1;
    let run = run_with(
        RigConfig::default(),
        rig,
        MockCameras::new(),
        ScriptedOperator::default(),
    );
    assert!(run.report.is_success());
    assert_eq!(run.rig.count(RigCall::InitDispenser), 2);

    let mut rig = MockRig::new();
    rig.init_mismatches = 2;
    let run = run_with(
        RigConfig::default(),
        rig,
        MockCameras::new(),
        ScriptedOperator::default(),
    );
    assert!(run.report.fault.as_ref().is_some_and(Error::is_unexpected_reply));
    assert_eq!(run.rig.count(RigCall::InitDispenser), 2);
    assert_eq!(run.report.entries(StateId::AwaitingStart), 0);
}

#[test]
fn version_failure_is_not_fatal() {
    let mut rig = MockRig::new();
    rig.fail_on = Some(RigCall::Version);
    let run = run_with(
        RigConfig::default(),
        rig,
        MockCameras::new(),
        ScriptedOperator::default(),
    );
    assert!(run.report.is_success());
    assert_eq!(run.report.entries(StateId::AwaitingStart), 1);
}

#[test]
fn hand_load_cycles_without_dispenser() {
    let mut config = RigConfig::default();
    config.feed = FeedMode::HandLoad;
    config.ports.dispenser = None;
    let run = run_with(
        config,
        MockRig::new(),
        MockCameras::new(),
        ScriptedOperator::proceeding(2),
    );
    assert!(run.report.is_success());
    assert_eq!(run.report.cycles_completed, 2);
    assert_eq!(run.rig.count(RigCall::Dispense), 0);
    assert_eq!(run.rig.count(RigCall::InitDispenser), 0);
    assert!(run.operator.prompts[0].starts_with("Load a specimen"));
}

#[test]
fn wrong_camera_count_is_fatal_before_any_cycle() {
    let run = run_with(
        RigConfig::default(),
        MockRig::with_outcomes([DispenseOutcome::Dispensed]),
        MockCameras::named(&["upper", "lower", "spare"]),
        ScriptedOperator::proceeding(1),
    );
    assert!(matches!(
        run.report.fault,
        Some(Error::CameraEnumeration { found: 3 })
    ));
    assert_eq!(run.rig.count(RigCall::Dispense), 0);
    assert!(run.cameras.attached.is_empty());
    assert_eq!(run.report.cleanup_runs, 1);
}

#[test]
fn events_trace_the_machine() {
    let run = run_with(
        RigConfig::default(),
        MockRig::new(),
        MockCameras::new(),
        ScriptedOperator::default(),
    );
    let states: Vec<StateId> = run
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            CycleEvent::StateChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        [
            StateId::AwaitingStart,
            StateId::Cleanup,
            StateId::Terminated
        ]
    );
    assert_eq!(run.sink.events[0], CycleEvent::Started(StateId::Idle));
}
