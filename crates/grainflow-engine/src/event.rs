//! Events streamed from a running pipeline to an observer.
//!
//! Events carry owned copies of messages; no engine state crosses to the
//! observer. Any [`PipelineObserver`] can subscribe, including a
//! `crossbeam_channel::Sender<PipelineEvent>`.

use std::fmt;

use crossbeam_channel::Sender;
use grainflow_stage::{MessageSink, Severity, StageMessage};

use crate::report::RunOutcome;

/// Which half of the protocol a stage is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Declare-only validation pass.
    Preflight,
    /// Real computation pass.
    Execute,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Preflight => "preflight",
            Self::Execute => "execute",
        })
    }
}

/// A notification from a running pipeline.
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineEvent {
    /// A stage is about to run.
    StageStarted {
        /// Position in the pipeline.
        stage_index: usize,
        /// Number of stages in the pipeline.
        stage_count: usize,
        /// Class name of the stage.
        class_name: String,
        /// Phase being run.
        phase: Phase,
    },
    /// Informational message from a stage.
    Status {
        /// Reporting stage.
        stage_index: usize,
        /// Message text.
        text: String,
    },
    /// Non-fatal problem reported by a stage.
    Warning {
        /// Reporting stage.
        stage_index: usize,
        /// Warning code.
        code: i32,
        /// Message text.
        text: String,
    },
    /// Stage failure.
    Error {
        /// Reporting stage.
        stage_index: usize,
        /// Negative error code.
        code: i32,
        /// Message text.
        text: String,
    },
    /// A stage finished executing successfully.
    Progress {
        /// Index of the stage that finished.
        stage_index: usize,
        /// Number of stages in the pipeline.
        stage_count: usize,
        /// Completed fraction of the run, 0..=100.
        percent: u32,
    },
    /// The run stopped because cancellation was requested.
    Cancelled {
        /// First stage that did not run.
        next_stage: usize,
    },
    /// The run ended.
    Finished {
        /// How it ended.
        outcome: RunOutcome,
    },
}

impl From<&StageMessage> for PipelineEvent {
    fn from(message: &StageMessage) -> Self {
        let stage_index = message.stage_index;
        let text = message.text.clone();
        match message.severity {
            Severity::Status => Self::Status { stage_index, text },
            Severity::Warning => Self::Warning {
                stage_index,
                code: message.code,
                text,
            },
            Severity::Error => Self::Error {
                stage_index,
                code: message.code,
                text,
            },
        }
    }
}

/// Receives [`PipelineEvent`]s from the engine.
pub trait PipelineObserver {
    /// Called once per event, on the thread running the pipeline.
    fn on_event(&mut self, event: PipelineEvent);
}

/// Observer that discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl PipelineObserver for NullObserver {
    fn on_event(&mut self, _event: PipelineEvent) {}
}

impl PipelineObserver for Vec<PipelineEvent> {
    fn on_event(&mut self, event: PipelineEvent) {
        self.push(event);
    }
}

/// Blocks while the channel is full; drops events once the receiver is gone.
impl PipelineObserver for Sender<PipelineEvent> {
    fn on_event(&mut self, event: PipelineEvent) {
        let _ = self.send(event);
    }
}

/// Adapts an observer to the stage-side [`MessageSink`].
pub(crate) struct ObserverSink<'a> {
    pub(crate) observer: &'a mut dyn PipelineObserver,
}

impl MessageSink for ObserverSink<'_> {
    fn message(&mut self, message: &StageMessage) {
        self.observer.on_event(PipelineEvent::from(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_map_to_events() {
        let m = StageMessage {
            stage_index: 4,
            severity: Severity::Warning,
            code: -3,
            text: "w".into(),
        };
        assert_eq!(
            PipelineEvent::from(&m),
            PipelineEvent::Warning {
                stage_index: 4,
                code: -3,
                text: "w".into()
            }
        );
    }

    #[test]
    fn sender_observer_forwards() {
        let (mut tx, rx) = crossbeam_channel::bounded::<PipelineEvent>(4);
        tx.on_event(PipelineEvent::Cancelled { next_stage: 2 });
        assert_eq!(
            rx.try_recv().unwrap(),
            PipelineEvent::Cancelled { next_stage: 2 }
        );
        drop(rx);
        tx.on_event(PipelineEvent::Cancelled { next_stage: 3 });
    }

    #[test]
    fn sink_adapter_forwards_to_observer() {
        let mut events: Vec<PipelineEvent> = Vec::new();
        let mut sink = ObserverSink {
            observer: &mut events,
        };
        sink.message(&StageMessage {
            stage_index: 0,
            severity: Severity::Status,
            code: 0,
            text: "hi".into(),
        });
        assert_eq!(events.len(), 1);
    }
}
