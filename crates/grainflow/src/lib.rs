//! grainflow: preflight-checked processing pipelines over voxel
//! microstructure data.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all grainflow sub-crates. For most users, adding `grainflow` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use grainflow::prelude::*;
//! use grainflow::stages::{CreateDataArray, CreateDataContainer, FindVolumeFractions};
//!
//! let phases = DataArrayPath::new("Volume", Category::Cell, "Phases");
//! let mut container = CreateDataContainer::new("Volume", [4, 4, 1]);
//! container.ensembles = 2;
//!
//! let mut pipeline = Pipeline::new();
//! pipeline
//!     .push(container)
//!     .push(CreateDataArray::new(phases.clone(), ElementType::Int32, 1.0))
//!     .push(FindVolumeFractions::new(phases));
//!
//! // Preflight declares everything without computing.
//! assert!(pipeline.preflight().is_success());
//! assert!(pipeline.data().is_empty());
//!
//! let report = pipeline.execute();
//! assert!(report.is_success());
//! let fractions = pipeline
//!     .data()
//!     .get("Volume")
//!     .and_then(|dc| dc.array(Category::CellEnsemble, "VolumeFractions"))
//!     .unwrap();
//! assert_eq!(fractions.as_slice::<f32>(), Some(&[0.0, 1.0][..]));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`data`] | `grainflow-core` | Typed arrays, attribute maps, containers, paths |
//! | [`stage`] | `grainflow-stage` | Stage trait, data checks, settings, registry |
//! | [`engine`] | `grainflow-engine` | Pipelines, reports, events, background worker |
//! | [`io`] | `grainflow-io` | Container files, XDMF, reader/writer stages |
//! | [`stages`] | `grainflow-stages` | Reference stages |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Data model (`grainflow-core`).
///
/// [`data::TypedArray`] values live in [`data::AttributeArrayMap`]s inside
/// [`data::DataContainer`]s, addressed by [`data::DataArrayPath`].
pub use grainflow_core as data;

/// Stage contract (`grainflow-stage`).
///
/// The [`stage::Stage`] trait is the main extension point; the
/// [`stage::check`] helpers cover the common data-check patterns.
pub use grainflow_stage as stage;

/// Pipeline engine (`grainflow-engine`).
pub use grainflow_engine as engine;

/// Container file format and I/O stages (`grainflow-io`).
pub use grainflow_io as io;

/// Reference stages (`grainflow-stages`).
pub use grainflow_stages as stages;

use grainflow_stage::{RegistryError, StageRegistry};

/// A registry holding every stage shipped with grainflow: the reference
/// stages followed by the container file reader and writer.
pub fn default_registry() -> Result<StageRegistry, RegistryError> {
    let mut registry = StageRegistry::new();
    grainflow_stages::register_builtin_stages(&mut registry)?;
    grainflow_io::register_stages(&mut registry)?;
    Ok(registry)
}

/// Common imports for typical grainflow usage.
///
/// ```rust
/// use grainflow::prelude::*;
/// ```
pub mod prelude {
    // Data model
    pub use grainflow_core::{
        Category, DataArrayPath, DataContainer, DataContainerArray, ElementType, Geometry,
        TypedArray,
    };

    // Stage contract
    pub use grainflow_stage::{
        check, codes, CheckMode, ParameterDef, ParameterValue, PipelineSettings, SettingsReader,
        SettingsWriter, Stage, StageContext, StageInfo, StageRegistry,
    };

    // Engine
    pub use grainflow_engine::{
        CancelToken, EngineConfig, Pipeline, PipelineEvent, PipelineObserver, PipelineWorker,
        RunOutcome, RunReport, StageState,
    };

    // I/O
    pub use grainflow_io::{DataContainerReader, DataContainerWriter};

    pub use crate::default_registry;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_resolves_io_and_builtin_stages() {
        let registry = default_registry().unwrap();
        assert!(registry.by_name("CreateDataContainer").is_some());
        assert!(registry.by_name("DataContainerWriter").is_some());
        assert!(registry.by_name("DataContainerReader").is_some());
        assert_eq!(registry.len(), 8);
    }
}
