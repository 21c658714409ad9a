//! Cleanup guarantees: whatever ends the run, the rig is left with the
//! stepper released, the pump off, the inlet open and the outlet closed,
//! and the cleanup sequence runs exactly once.

use std::sync::atomic::Ordering;

use photobooth::app::events::CycleEvent;
use photobooth::app::ports::StartSignal;
use photobooth::app::service::{Orchestrator, RunReport};
use photobooth::config::{Gate, GateState, RigConfig};
use photobooth::drivers::DispenseOutcome;
use photobooth::error::{Device, Error};
use photobooth::fsm::StateId;

use crate::mock_hw::{MockCameras, MockRig, NoDelay, RecordingSink, RigCall, ScriptedOperator};

fn run(
    mut rig: MockRig,
    script: &[StartSignal],
) -> (RunReport, MockRig, MockCameras, RecordingSink) {
    let orchestrator = Orchestrator::new(RigConfig::default()).unwrap();
    let mut cameras = MockCameras::new();
    let mut operator = ScriptedOperator::new(script.iter().copied());
    let mut sink = RecordingSink::default();
    let report = orchestrator.run(
        &mut rig,
        &mut cameras,
        &mut operator,
        &mut sink,
        &mut NoDelay::default(),
    );
    (report, rig, cameras, sink)
}

fn assert_safe(rig: &MockRig, cameras: &MockCameras) {
    let tail_start = rig
        .calls
        .iter()
        .rposition(|c| *c == RigCall::StepperOff)
        .expect("stepper released");
    assert_eq!(
        &rig.calls[tail_start..],
        [
            RigCall::StepperOff,
            RigCall::Pump(false),
            RigCall::SetGate(Gate::Inlet, GateState::Open),
            RigCall::SetGate(Gate::Outlet, GateState::Closed),
            RigCall::Disconnect,
        ]
    );
    assert!(!rig.pump_on());
    assert_eq!(rig.count(RigCall::StepperOff), 1);
    assert_eq!(rig.count(RigCall::Disconnect), 1);
    assert_eq!(cameras.closes, 1);
}

#[test]
fn operator_quit_cleans_up_once() {
    let (report, rig, cameras, sink) = run(
        MockRig::with_outcomes([DispenseOutcome::Dispensed]),
        &[StartSignal::Proceed, StartSignal::Quit],
    );
    assert!(report.is_success());
    assert_eq!(report.cleanup_runs, 1);
    assert_eq!(report.final_state, StateId::Terminated);
    assert_safe(&rig, &cameras);
    assert!(sink.events.contains(&CycleEvent::CleanupDone { failures: 0 }));
}

#[test]
fn dispenser_timeout_cleans_up_once() {
    let (report, rig, cameras, _) = run(
        MockRig::with_outcomes([DispenseOutcome::Timeout]),
        &[StartSignal::Proceed],
    );
    assert!(report.is_success());
    assert_eq!(report.cleanup_runs, 1);
    assert_safe(&rig, &cameras);
}

#[test]
fn io_error_mid_cycle_faults_and_cleans_up() {
    let mut rig = MockRig::with_outcomes([DispenseOutcome::Dispensed]);
    rig.fail_on = Some(RigCall::StepVane);
    let (report, rig, cameras, sink) = run(rig, &[StartSignal::Proceed, StartSignal::Proceed]);

    assert!(!report.is_success());
    let fault = report.fault.as_ref().unwrap();
    assert!(matches!(fault, Error::Protocol { .. }));
    assert_eq!(fault.device(), Some(Device::Actuator));
    assert_eq!(report.cleanup_runs, 1);
    assert_eq!(report.entries(StateId::Capturing), 0);
    assert_eq!(report.cycles_completed, 0);
    assert_eq!(report.final_state, StateId::Terminated);
    assert_safe(&rig, &cameras);
    assert!(sink.events.iter().any(|e| matches!(e, CycleEvent::Fault(_))));
}

#[test]
fn cleanup_presses_on_after_a_failing_step() {
    let mut rig = MockRig::new();
    rig.fail_on = Some(RigCall::Pump(false));
    let (report, rig, cameras, sink) = run(rig, &[StartSignal::Quit]);

    // Cleanup failures are reported but do not become the run's fault.
    assert!(report.is_success());
    assert_safe(&rig, &cameras);
    assert!(sink.events.contains(&CycleEvent::CleanupDone { failures: 1 }));
}

#[test]
fn connect_failure_still_runs_cleanup() {
    let mut rig = MockRig::new();
    rig.fail_on = Some(RigCall::Connect);
    let (report, rig, cameras, _) = run(rig, &[StartSignal::Proceed]);

    assert!(report.fault.is_some());
    assert_eq!(report.entries(StateId::AwaitingStart), 0);
    assert_eq!(report.cleanup_runs, 1);
    assert_safe(&rig, &cameras);
}

#[test]
fn interrupt_during_pump_parks_rig_and_stops() {
    let orchestrator = Orchestrator::new(RigConfig::default()).unwrap();
    let mut rig = MockRig::with_outcomes([DispenseOutcome::Dispensed, DispenseOutcome::Dispensed]);
    rig.interrupt_on = Some((RigCall::Pump(true), orchestrator.stop_flag()));
    let mut cameras = MockCameras::new();
    let mut operator = ScriptedOperator::proceeding(5);
    let mut sink = RecordingSink::default();

    let report = orchestrator.run(
        &mut rig,
        &mut cameras,
        &mut operator,
        &mut sink,
        &mut NoDelay::default(),
    );

    assert!(report.interrupted);
    assert!(report.is_success());
    assert!(orchestrator.stop_flag().load(Ordering::SeqCst));
    // The pump step finishes its pulse, then no new cycle starts.
    assert_eq!(report.cycles_completed, 1);
    assert_eq!(rig.count(RigCall::Dispense), 1);
    assert_eq!(operator.prompts.len(), 1);
    assert_eq!(report.cleanup_runs, 1);
    assert_eq!(report.final_state, StateId::Terminated);
    assert_safe(&rig, &cameras);
}

#[test]
fn interrupt_mid_capture_skips_rest_of_cycle() {
    let orchestrator = Orchestrator::new(RigConfig::default()).unwrap();
    let mut rig = MockRig::with_outcomes([DispenseOutcome::Dispensed]);
    rig.interrupt_on = Some((RigCall::StepVane, orchestrator.stop_flag()));
    let mut cameras = MockCameras::new();
    let mut sink = RecordingSink::default();

    let report = orchestrator.run(
        &mut rig,
        &mut cameras,
        &mut ScriptedOperator::proceeding(5),
        &mut sink,
        &mut NoDelay::default(),
    );

    assert!(report.interrupted);
    assert_eq!(report.entries(StateId::VaneReturning), 0);
    assert_eq!(report.entries(StateId::PumpRunning), 0);
    assert!(cameras.saved.is_empty());
    assert_eq!(report.cleanup_runs, 1);
    assert_safe(&rig, &cameras);
}
