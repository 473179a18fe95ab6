//! Pipeline engine for grainflow.
//!
//! A [`Pipeline`] owns an ordered list of stages and the one
//! [`DataContainerArray`](grainflow_core::DataContainerArray) they share.
//! [`Pipeline::preflight`] validates the whole chain against a
//! placeholder copy of the data; [`Pipeline::execute`] runs it for real,
//! stopping at the first failing stage. [`PipelineWorker`] runs a pipeline
//! on its own thread and streams [`PipelineEvent`]s back.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod cancel;
pub mod config;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod worker;

pub use cancel::CancelToken;
pub use config::{ConfigError, EngineConfig};
pub use event::{NullObserver, Phase, PipelineEvent, PipelineObserver};
pub use metrics::{RunMetrics, StageMetrics};
pub use pipeline::Pipeline;
pub use report::{RunOutcome, RunReport, StageState};
pub use worker::{PipelineHandle, PipelineWorker, WorkerError};
