//! Integration tests: stage ordering, partial failure, preflight
//! idempotence, progress reporting and cancellation, using the shared
//! fixture stages.

use std::sync::mpsc;

use grainflow_core::{Category, DataArrayPath, ElementType};
use grainflow_engine::{
    EngineConfig, Phase, Pipeline, PipelineEvent, PipelineWorker, RunOutcome, StageState,
};
use grainflow_stage::codes;
use grainflow_stages::FindVolumeFractions;
use grainflow_test_utils::{
    cell_path, volume_with_phases, CancellingStage, CreateArrayStage, FailingStage, GateStage,
    RecordingObserver, RequireArrayStage,
};

// ── Helpers ──────────────────────────────────────────────────────

fn seeded(ensembles: usize) -> Pipeline {
    let mut pipeline = Pipeline::new();
    pipeline.replace_data(volume_with_phases([2, 2, 1], &[1, 1, 2, 2], ensembles));
    pipeline
}

fn create(name: &str) -> CreateArrayStage {
    CreateArrayStage::new(cell_path(name), ElementType::Float32, 1).filled_with(1.0)
}

fn require(name: &str) -> RequireArrayStage {
    RequireArrayStage::new(cell_path(name), ElementType::Float32, 1)
}

// ── Ordering ─────────────────────────────────────────────────────

#[test]
fn consumer_after_producer_passes() {
    let mut pipeline = seeded(3);
    pipeline.push(create("A")).push(require("A"));
    assert!(pipeline.preflight().is_success());
    assert!(pipeline.execute().is_success());
}

#[test]
fn consumer_before_producer_fails_preflight() {
    let mut pipeline = seeded(3);
    pipeline.push(require("A")).push(create("A"));
    let report = pipeline.preflight();
    assert_eq!(
        report.outcome,
        RunOutcome::Failed {
            stage_index: 0,
            code: codes::MISSING_ARRAY
        }
    );
    assert_eq!(report.states[1], StageState::Unexecuted);
}

// ── Partial failure ──────────────────────────────────────────────

#[test]
fn execute_failure_stops_later_stages() {
    let failing = FailingStage::in_execute(-77);
    let calls = failing.calls();
    let mut pipeline = seeded(3);
    pipeline
        .push(create("A"))
        .push(create("B"))
        .push(failing)
        .push(create("C"));

    let mut observer = RecordingObserver::new();
    let report = pipeline.execute_with(&mut observer);

    assert_eq!(
        report.outcome,
        RunOutcome::Failed {
            stage_index: 2,
            code: -77
        }
    );
    assert_eq!(report.error_code(), -77);
    assert_eq!(
        report.states,
        vec![
            StageState::ExecuteOk,
            StageState::ExecuteOk,
            StageState::ExecuteFailed,
            StageState::PreflightOk,
        ]
    );
    assert_eq!(calls.computes(), 1);

    let data = pipeline.data();
    assert!(data.array(&cell_path("A")).is_some());
    assert!(data.array(&cell_path("B")).is_some());
    assert!(data.array(&cell_path("C")).is_none());
    assert_eq!(observer.percents(), vec![25, 50]);
    assert_eq!(observer.errors(), vec![(2, -77)]);
    assert_eq!(observer.started(Phase::Execute), vec![0, 1, 2]);
}

#[test]
fn preflight_failure_runs_no_compute() {
    let failing = FailingStage::in_preflight(-12);
    let calls = failing.calls();
    let mut pipeline = seeded(3);
    pipeline.push(create("A")).push(failing);
    let report = pipeline.execute();
    assert_eq!(
        report.outcome,
        RunOutcome::Failed {
            stage_index: 1,
            code: -12
        }
    );
    assert_eq!(calls.computes(), 0);
    assert!(pipeline.data().array(&cell_path("A")).is_none());
}

// ── Preflight ────────────────────────────────────────────────────

#[test]
fn preflight_is_repeatable() {
    let mut pipeline = seeded(3);
    pipeline
        .push(create("A"))
        .push(require("A"))
        .push(FindVolumeFractions::new(cell_path("Phases")));
    let before = pipeline.data().clone();

    let first = pipeline.preflight();
    let second = pipeline.preflight();
    assert!(first.is_success());
    assert_eq!(first.outcome, second.outcome);
    assert_eq!(first.states, second.states);
    assert_eq!(first.messages, second.messages);
    assert_eq!(pipeline.data(), &before);
}

#[test]
fn phases_with_ensembles_pass() {
    let mut pipeline = seeded(1);
    pipeline.push(
        RequireArrayStage::new(cell_path("Phases"), ElementType::Int32, 1).with_min_ensembles(1),
    );
    assert!(pipeline.preflight().is_success());
}

#[test]
fn missing_phases_reported() {
    let mut pipeline = seeded(1);
    pipeline.push(RequireArrayStage::new(
        DataArrayPath::new("Volume", Category::Cell, "CellPhases"),
        ElementType::Int32,
        1,
    ));
    let report = pipeline.preflight();
    assert_eq!(report.error_code(), codes::MISSING_ARRAY);
}

#[test]
fn empty_ensemble_reported() {
    let mut pipeline = seeded(0);
    pipeline.push(FindVolumeFractions::new(cell_path("Phases")));
    assert_eq!(pipeline.preflight().error_code(), codes::EMPTY_ENSEMBLE);
}

// ── Cancellation ─────────────────────────────────────────────────

#[test]
fn cancel_from_inside_a_stage() {
    let mut pipeline = seeded(3);
    let token = pipeline.cancel_token();
    pipeline
        .push(create("A"))
        .push(CancellingStage::new(token))
        .push(create("B"));
    let mut observer = RecordingObserver::new();
    let report = pipeline.execute_with(&mut observer);

    assert_eq!(report.outcome, RunOutcome::Cancelled { next_stage: 2 });
    assert!(report.is_cancelled());
    assert!(pipeline.data().array(&cell_path("A")).is_some());
    assert!(pipeline.data().array(&cell_path("B")).is_none());
    assert_eq!(
        observer.outcome(),
        Some(RunOutcome::Cancelled { next_stage: 2 })
    );
}

#[test]
fn worker_cancel_stops_before_next_stage() {
    let (release, gate) = mpsc::channel();
    let mut pipeline = seeded(3);
    pipeline.push(GateStage::new(gate)).push(create("A"));
    let handle = PipelineWorker::spawn(pipeline).unwrap();

    for event in handle.events() {
        if let PipelineEvent::StageStarted {
            stage_index: 0,
            phase: Phase::Execute,
            ..
        } = event
        {
            break;
        }
    }
    handle.cancel();
    release.send(()).unwrap();

    let (pipeline, report) = handle.join().unwrap();
    assert_eq!(report.outcome, RunOutcome::Cancelled { next_stage: 1 });
    assert_eq!(report.states[0], StageState::ExecuteOk);
    assert!(pipeline.data().array(&cell_path("A")).is_none());
}

#[test]
fn worker_delivers_every_event_through_a_tiny_channel() {
    let mut pipeline = Pipeline::with_config(EngineConfig {
        event_capacity: 1,
        ..EngineConfig::default()
    });
    pipeline.replace_data(volume_with_phases([2, 2, 1], &[1, 1, 2, 2], 3));
    let names = ["A", "B", "C", "D", "E", "F"];
    for name in names {
        pipeline.push(create(name));
    }
    let handle = PipelineWorker::spawn(pipeline).unwrap();

    let events: Vec<_> = handle.events().iter().collect();
    let progress: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Progress { stage_index, .. } => Some(*stage_index),
            _ => None,
        })
        .collect();
    assert_eq!(progress, (0..names.len()).collect::<Vec<_>>());
    assert_eq!(
        events.last(),
        Some(&PipelineEvent::Finished {
            outcome: RunOutcome::Completed
        })
    );

    let (pipeline, report) = handle.join().unwrap();
    assert!(report.is_success());
    assert!(pipeline.data().array(&cell_path("F")).is_some());
}

#[test]
fn worker_join_without_draining_completes() {
    let mut pipeline = Pipeline::with_config(EngineConfig {
        event_capacity: 1,
        ..EngineConfig::default()
    });
    pipeline.replace_data(volume_with_phases([2, 2, 1], &[1, 1, 2, 2], 3));
    for name in ["A", "B", "C", "D"] {
        pipeline.push(create(name));
    }
    let handle = PipelineWorker::spawn(pipeline).unwrap();
    let (_, report) = handle.join().unwrap();
    assert!(report.is_success());
}
