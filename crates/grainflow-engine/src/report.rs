//! Outcome of a pipeline run.

use grainflow_stage::{Severity, StageMessage};

use crate::metrics::RunMetrics;

/// Per-stage, per-run state.
///
/// `Unexecuted → Preflighting → (PreflightOk | PreflightFailed) →
/// Executing → (ExecuteOk | ExecuteFailed)`. The failed states are
/// terminal for the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageState {
    /// Not reached in this run.
    Unexecuted,
    /// Preflight in progress.
    Preflighting,
    /// Preflight succeeded.
    PreflightOk,
    /// Preflight recorded an error.
    PreflightFailed,
    /// Execute in progress.
    Executing,
    /// Execute succeeded.
    ExecuteOk,
    /// Execute recorded an error.
    ExecuteFailed,
}

impl StageState {
    /// Whether this is a failed state.
    pub fn is_failed(self) -> bool {
        matches!(self, Self::PreflightFailed | Self::ExecuteFailed)
    }
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunOutcome {
    /// Every stage succeeded.
    Completed,
    /// A stage failed; later stages did not run.
    Failed {
        /// Index of the failing stage.
        stage_index: usize,
        /// Its negative error code.
        code: i32,
    },
    /// Cancellation was requested; stages from `next_stage` on did not run.
    Cancelled {
        /// First stage that did not run.
        next_stage: usize,
    },
}

/// Everything a caller needs after a run: outcome, messages, states and
/// timings.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    /// How the run ended.
    pub outcome: RunOutcome,
    /// `(stage index, severity, code, message)` records in emission order.
    pub messages: Vec<StageMessage>,
    /// Final state of every stage, in pipeline order.
    pub states: Vec<StageState>,
    /// Wall-clock timings.
    pub metrics: RunMetrics,
}

impl RunReport {
    pub(crate) fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let metrics = RunMetrics::for_stages(names);
        Self {
            outcome: RunOutcome::Completed,
            messages: Vec::new(),
            states: vec![StageState::Unexecuted; metrics.stages.len()],
            metrics,
        }
    }

    /// Whether every stage succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    /// Whether the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, RunOutcome::Cancelled { .. })
    }

    /// Pipeline-level error code: the most negative error code reported,
    /// or zero. Cancellation is not an error.
    pub fn error_code(&self) -> i32 {
        let from_messages = self
            .errors()
            .map(|m| m.code)
            .min()
            .unwrap_or(0);
        let from_outcome = match self.outcome {
            RunOutcome::Failed { code, .. } => code,
            _ => 0,
        };
        from_messages.min(from_outcome).min(0)
    }

    /// Warning records.
    pub fn warnings(&self) -> impl Iterator<Item = &StageMessage> {
        self.with_severity(Severity::Warning)
    }

    /// Error records.
    pub fn errors(&self) -> impl Iterator<Item = &StageMessage> {
        self.with_severity(Severity::Error)
    }

    /// Final state of stage `index`.
    pub fn state(&self, index: usize) -> Option<StageState> {
        self.states.get(index).copied()
    }

    fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &StageMessage> {
        self.messages.iter().filter(move |m| m.severity == severity)
    }
}
