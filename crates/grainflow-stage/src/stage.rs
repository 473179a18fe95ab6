//! The [`Stage`] trait and its static [`StageInfo`].
//!
//! Stages are configured objects run in sequence over one
//! [`DataContainerArray`]. Each call borrows the array mutably for its
//! duration; between calls a stage refers to arrays only by path.

use grainflow_core::DataContainerArray;
use uuid::Uuid;

use crate::context::{CheckMode, StageContext};
use crate::parameter::ParameterDef;
use crate::settings::{SettingsReader, SettingsWriter};

/// Static identity of a stage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StageInfo {
    /// Stable class identifier used in persisted pipelines.
    pub class_name: &'static str,
    /// Stable UUID; resolves to the same factory as `class_name`.
    pub uuid: Uuid,
    /// Top-level group for listings, e.g. `"Statistics"`.
    pub group: &'static str,
    /// Second-level group, e.g. `"Morphological"`.
    pub subgroup: &'static str,
    /// Human-readable label.
    pub human_label: &'static str,
}

/// A unit of pipeline work.
///
/// # Contract
///
/// - [`data_check`](Self::data_check) validates required containers and
///   arrays and declares outputs. In [`CheckMode::Preflight`] it must not
///   change array contents and must be idempotent: two calls in a row
///   produce the same code and the same output shapes.
/// - [`compute`](Self::compute) runs only after a successful
///   `data_check` in [`CheckMode::Execute`] and mutates arrays in place.
/// - Failures are reported through the [`StageContext`] with a negative
///   code. A stage never panics to signal a runtime failure.
///
/// # Object safety
///
/// This trait is object-safe; pipelines store `Vec<Box<dyn Stage>>`.
///
/// # Examples
///
/// ```
/// use grainflow_core::{Category, DataArrayPath, DataContainerArray, ElementType};
/// use grainflow_stage::{
///     check, CheckMode, ParameterDef, SettingsReader, SettingsWriter, Stage, StageContext,
///     StageInfo,
/// };
/// use uuid::Uuid;
///
/// struct Threshold {
///     input: DataArrayPath,
/// }
///
/// impl Stage for Threshold {
///     fn info(&self) -> StageInfo {
///         StageInfo {
///             class_name: "Threshold",
///             uuid: Uuid::from_u128(0x1),
///             group: "Processing",
///             subgroup: "Threshold",
///             human_label: "Threshold Array",
///         }
///     }
///
///     fn parameters(&self) -> Vec<ParameterDef> {
///         vec![ParameterDef::required_array("Input", "Input Array", self.input.clone())]
///     }
///
///     fn data_check(&self, dca: &mut DataContainerArray, _: CheckMode, ctx: &mut StageContext<'_>) {
///         check::require_array(dca, &self.input, ElementType::Float32, 1, ctx);
///     }
///
///     fn compute(&self, _: &mut DataContainerArray, _: &mut StageContext<'_>) {}
///
///     fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
///         writer.open_stage(index, &self.info()).array_path("Input", &self.input);
///         index + 1
///     }
///
///     fn read_parameters(&mut self, _: &SettingsReader<'_>, index: usize) -> usize {
///         index + 1
///     }
/// }
///
/// let stage = Threshold { input: DataArrayPath::new("dc", Category::Cell, "Data") };
/// let mut dca = DataContainerArray::new();
/// let mut ctx = StageContext::new(0);
/// stage.preflight(&mut dca, &mut ctx);
/// assert_eq!(ctx.error_code(), grainflow_stage::codes::MISSING_CONTAINER);
/// ```
pub trait Stage: Send + 'static {
    /// Static identity of this stage type.
    fn info(&self) -> StageInfo;

    /// Stable class identifier.
    fn class_name(&self) -> &'static str {
        self.info().class_name
    }

    /// Human-readable label for messages and listings.
    fn human_label(&self) -> &'static str {
        self.info().human_label
    }

    /// Configuration schema with current values as defaults. Pure metadata.
    fn parameters(&self) -> Vec<ParameterDef>;

    /// Validate inputs and declare outputs.
    fn data_check(
        &self,
        dca: &mut DataContainerArray,
        mode: CheckMode,
        ctx: &mut StageContext<'_>,
    );

    /// Perform the computation. Only called after a clean execute-mode
    /// [`data_check`](Self::data_check).
    fn compute(&self, dca: &mut DataContainerArray, ctx: &mut StageContext<'_>);

    /// Declare-only pass: [`data_check`](Self::data_check) in
    /// [`CheckMode::Preflight`].
    fn preflight(&self, dca: &mut DataContainerArray, ctx: &mut StageContext<'_>) {
        self.data_check(dca, CheckMode::Preflight, ctx);
    }

    /// Real pass: [`data_check`](Self::data_check) in
    /// [`CheckMode::Execute`], then [`compute`](Self::compute) if that
    /// recorded no error.
    fn execute(&self, dca: &mut DataContainerArray, ctx: &mut StageContext<'_>) {
        self.data_check(dca, CheckMode::Execute, ctx);
        if ctx.has_failed() {
            return;
        }
        self.compute(dca, ctx);
    }

    /// Persist configuration into slot `index`. Returns the next free slot.
    fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize;

    /// Restore configuration from slot `index`. Missing or mistyped keys
    /// keep their current values. Returns the next slot to read, which
    /// must match what [`Stage::write_parameters`] returned for this stage.
    fn read_parameters(&mut self, reader: &SettingsReader<'_>, index: usize) -> usize;
}
