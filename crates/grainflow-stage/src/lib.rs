//! Stage trait, data checks and stage registry for grainflow pipelines.
//!
//! A [`Stage`] validates its inputs and declares its outputs in
//! [`Stage::data_check`], then computes in [`Stage::compute`]. Failures are
//! recorded as negative codes in a [`StageContext`]; they never unwind
//! across the engine boundary.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod check;
pub mod codes;
pub mod context;
pub mod parameter;
pub mod registry;
pub mod settings;
pub mod stage;

pub use context::{CheckMode, MessageSink, Severity, StageContext, StageMessage};
pub use parameter::{ParameterCategory, ParameterDef, ParameterValue};
pub use registry::{RegistryError, StageFactory, StageRegistry, TypedFactory};
pub use settings::{
    PipelineSettings, SettingsError, SettingsReader, SettingsWriter, StageSettings,
    StageSettingsReader, StageSettingsWriter,
};
pub use stage::{Stage, StageInfo};
