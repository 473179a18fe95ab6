//! Test utilities for grainflow development.
//!
//! Provides fixture stages ([`RequireArrayStage`], [`CreateArrayStage`],
//! [`FailingStage`] and the cancellation helpers), a
//! [`RecordingObserver`] and builders for small voxel containers.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{
    CancellingStage, CreateArrayStage, FailingCalls, FailingStage, GateStage, RequireArrayStage,
};

use grainflow_core::{
    Category, DataArrayPath, DataContainer, DataContainerArray, Element, Geometry, TypedArray,
};
use grainflow_engine::{Phase, PipelineEvent, PipelineObserver, RunOutcome};

// ── Container builders ──────────────────────────────────────────

/// An empty container named `name` over a `dims` voxel grid.
pub fn volume(name: &str, dims: [usize; 3]) -> DataContainer {
    DataContainer::with_geometry(name, Geometry::with_dimensions(dims))
}

/// Insert a cell array built from `values`. Panics on a shape mismatch.
pub fn with_cell_array<T: Element>(
    mut dc: DataContainer,
    name: &str,
    components: usize,
    values: Vec<T>,
) -> DataContainer {
    let array = TypedArray::from_vec(name, components, values).expect("ragged test array");
    dc.insert_array(Category::Cell, array)
        .expect("test array does not match the cell count");
    dc
}

/// A `"Volume"` container holding an int32 `Phases` cell array and an
/// ensemble map of `ensembles` tuples.
pub fn volume_with_phases(dims: [usize; 3], phases: &[i32], ensembles: usize) -> DataContainerArray {
    let mut dc = with_cell_array(volume("Volume", dims), "Phases", 1, phases.to_vec());
    dc.resize_tuples(Category::CellEnsemble, ensembles);
    let mut dca = DataContainerArray::new();
    dca.add(dc).expect("fresh container array");
    dca
}

/// Path of a cell array in the `"Volume"` container.
pub fn cell_path(array: &str) -> DataArrayPath {
    DataArrayPath::new("Volume", Category::Cell, array)
}

// ── RecordingObserver ───────────────────────────────────────────

/// Observer that keeps every event for later assertions.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<PipelineEvent>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Percentages of every `Progress` event, in order.
    pub fn percents(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    /// Indices of stages started in `phase`, in order.
    pub fn started(&self, phase: Phase) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::StageStarted {
                    stage_index,
                    phase: p,
                    ..
                } if *p == phase => Some(*stage_index),
                _ => None,
            })
            .collect()
    }

    /// `(stage, code)` of every `Error` event.
    pub fn errors(&self) -> Vec<(usize, i32)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Error {
                    stage_index, code, ..
                } => Some((*stage_index, *code)),
                _ => None,
            })
            .collect()
    }

    /// Outcome carried by the `Finished` event, if one arrived.
    pub fn outcome(&self) -> Option<RunOutcome> {
        self.events.iter().rev().find_map(|e| match e {
            PipelineEvent::Finished { outcome } => Some(*outcome),
            _ => None,
        })
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&mut self, event: PipelineEvent) {
        self.events.push(event);
    }
}
