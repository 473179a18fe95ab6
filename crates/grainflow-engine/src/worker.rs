//! Running a pipeline on a background thread.
//!
//! The worker thread owns the [`Pipeline`] exclusively (moved in via
//! `thread::Builder::spawn`). The controlling thread gets a
//! [`PipelineHandle`] with a bounded event receiver and a [`CancelToken`];
//! no other state is shared. [`PipelineHandle::join`] hands the pipeline
//! and its data back together with the run report.
//!
//! A full channel applies backpressure: the worker waits for the consumer
//! before sending anything except status text, which is dropped instead.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use thiserror::Error;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::config::ConfigError;
use crate::event::{PipelineEvent, PipelineObserver};
use crate::pipeline::Pipeline;
use crate::report::RunReport;

/// Errors starting or joining a worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The pipeline's engine configuration is invalid.
    #[error("invalid engine configuration: {0}")]
    Config(#[from] ConfigError),
    /// The OS refused to create the thread.
    #[error("failed to spawn pipeline thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// A stage panicked on the worker thread.
    #[error("pipeline thread panicked")]
    Panicked,
}

/// Entry point for background runs.
#[derive(Debug)]
pub struct PipelineWorker;

impl PipelineWorker {
    /// Validate the pipeline's configuration and start `execute()` on a
    /// named thread.
    pub fn spawn(pipeline: Pipeline) -> Result<PipelineHandle, WorkerError> {
        let config = pipeline.config().clone();
        config.validate()?;
        let (tx, rx) = crossbeam_channel::bounded(config.event_capacity);
        let cancel = pipeline.cancel_token();
        let thread = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run(pipeline, tx))?;
        Ok(PipelineHandle {
            events: rx,
            cancel,
            thread,
        })
    }
}

fn run(mut pipeline: Pipeline, tx: Sender<PipelineEvent>) -> (Pipeline, RunReport) {
    let mut observer = ChannelObserver { tx, dropped: 0 };
    let report = pipeline.execute_with(&mut observer);
    if observer.dropped > 0 {
        debug!(dropped = observer.dropped, "event channel was full; events dropped");
    }
    (pipeline, report)
}

/// Blocks on a full channel for every event except [`PipelineEvent::Status`],
/// which is dropped when there is no room. Once the receiver is gone all
/// events are discarded; the report still carries every message.
struct ChannelObserver {
    tx: Sender<PipelineEvent>,
    dropped: u64,
}

impl PipelineObserver for ChannelObserver {
    fn on_event(&mut self, event: PipelineEvent) {
        if matches!(event, PipelineEvent::Status { .. }) {
            if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
                self.dropped += 1;
            }
            return;
        }
        // Err only when the receiver was dropped.
        let _ = self.tx.send(event);
    }
}

/// Controlling-thread side of a background run.
#[derive(Debug)]
pub struct PipelineHandle {
    events: Receiver<PipelineEvent>,
    cancel: CancelToken,
    thread: JoinHandle<(Pipeline, RunReport)>,
}

impl PipelineHandle {
    /// Events from the running pipeline. Disconnects when the run ends.
    pub fn events(&self) -> &Receiver<PipelineEvent> {
        &self.events
    }

    /// Request cancellation before the next stage.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clone of the run's cancellation token.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Whether the worker thread has finished.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the run to end and recover the pipeline and its report.
    /// Undelivered events are discarded so a worker blocked on a full
    /// channel can finish.
    pub fn join(self) -> Result<(Pipeline, RunReport), WorkerError> {
        let Self { events, thread, .. } = self;
        drop(events);
        thread.join().map_err(|_| WorkerError::Panicked)
    }
}
