//! Run command - load a persisted pipeline and run it.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use grainflow::engine::{
    EngineConfig, Pipeline, PipelineEvent, PipelineObserver, PipelineWorker, RunOutcome,
    RunReport,
};
use grainflow::stage::PipelineSettings;
use tracing::info;

/// Prints pipeline events to stdout.
struct ConsoleObserver;

impl PipelineObserver for ConsoleObserver {
    fn on_event(&mut self, event: PipelineEvent) {
        if let Some(line) = describe(&event) {
            println!("{line}");
        }
    }
}

/// One console line per event; `None` for events not worth a line.
fn describe(event: &PipelineEvent) -> Option<String> {
    match event {
        PipelineEvent::StageStarted {
            stage_index,
            stage_count,
            class_name,
            phase,
        } => Some(format!(
            "[{}/{stage_count}] {phase} {class_name}",
            stage_index + 1
        )),
        PipelineEvent::Status { .. } => None,
        PipelineEvent::Warning {
            stage_index,
            code,
            text,
        } => Some(format!("  warning ({code}) at stage {stage_index}: {text}")),
        PipelineEvent::Error {
            stage_index,
            code,
            text,
        } => Some(format!("  error ({code}) at stage {stage_index}: {text}")),
        PipelineEvent::Progress { percent, .. } => Some(format!("  {percent}% complete")),
        PipelineEvent::Cancelled { next_stage } => {
            Some(format!("cancelled before stage {next_stage}"))
        }
        PipelineEvent::Finished { .. } => None,
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read engine config {}", path.display()))?;
    let config: EngineConfig = serde_json::from_str(&text)
        .with_context(|| format!("invalid engine config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn summarize(report: &RunReport) -> Result<()> {
    let metrics = &report.metrics;
    info!(
        total_us = metrics.total_us,
        execute_us = metrics.execute_us(),
        warnings = report.warnings().count(),
        "run finished"
    );
    if let Some(slowest) = metrics.slowest_stage() {
        println!(
            "slowest stage: {} ({} us)",
            slowest.class_name, slowest.execute_us
        );
    }
    match report.outcome {
        RunOutcome::Completed => {
            println!("pipeline completed");
            Ok(())
        }
        RunOutcome::Failed { stage_index, code } => {
            bail!("pipeline failed at stage {stage_index} with code {code}")
        }
        RunOutcome::Cancelled { next_stage } => {
            bail!("pipeline cancelled before stage {next_stage}")
        }
    }
}

/// Run the run command.
pub fn run(pipeline_file: &Path, preflight_only: bool, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let settings = PipelineSettings::load(pipeline_file)
        .with_context(|| format!("failed to load pipeline {}", pipeline_file.display()))?;
    let registry = grainflow::default_registry()?;
    let pipeline = Pipeline::from_settings(&settings, &registry, config)?;
    info!(
        file = %pipeline_file.display(),
        stages = pipeline.len(),
        "pipeline loaded"
    );

    let report = if preflight_only {
        pipeline.preflight_with(&mut ConsoleObserver)
    } else {
        let handle = PipelineWorker::spawn(pipeline)?;
        let mut console = ConsoleObserver;
        for event in handle.events() {
            console.on_event(event);
        }
        let (_, report) = handle.join()?;
        report
    };
    summarize(&report)
}
