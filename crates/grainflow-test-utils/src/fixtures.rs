//! Test stage fixtures for pipeline and engine testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use grainflow_core::{Category, DataArrayPath, DataContainerArray, ElementType};
use grainflow_engine::CancelToken;
use grainflow_stage::{
    check, CheckMode, ParameterDef, ParameterValue, SettingsReader, SettingsWriter, Stage,
    StageContext, StageInfo,
};
use uuid::Uuid;

fn info(class_name: &'static str, uuid: u128, human_label: &'static str) -> StageInfo {
    StageInfo {
        class_name,
        uuid: Uuid::from_u128(uuid),
        group: "Test",
        subgroup: "Fixtures",
        human_label,
    }
}

fn default_path() -> DataArrayPath {
    DataArrayPath::new("Volume", Category::Cell, "Data")
}

// ── RequireArrayStage ───────────────────────────────────────────

/// Requires a fixed-width array and, optionally, a minimum ensemble count
/// in the array's container. Computes nothing.
#[derive(Clone, Debug)]
pub struct RequireArrayStage {
    pub path: DataArrayPath,
    pub element_type: ElementType,
    pub components: usize,
    pub min_ensembles: usize,
}

impl RequireArrayStage {
    pub fn new(path: DataArrayPath, element_type: ElementType, components: usize) -> Self {
        Self {
            path,
            element_type,
            components,
            min_ensembles: 0,
        }
    }

    /// Also require `min` tuples in the container's ensemble map.
    pub fn with_min_ensembles(mut self, min: usize) -> Self {
        self.min_ensembles = min;
        self
    }
}

impl Default for RequireArrayStage {
    fn default() -> Self {
        Self::new(default_path(), ElementType::Float32, 1)
    }
}

impl Stage for RequireArrayStage {
    fn info(&self) -> StageInfo {
        info("RequireArrayStage", 0x7e57_0001, "Require Array")
    }

    fn parameters(&self) -> Vec<ParameterDef> {
        vec![
            ParameterDef::required_array("Path", "Array", self.path.clone()),
            ParameterDef::parameter(
                "ElementType",
                "Element Type",
                ParameterValue::ElementType(self.element_type),
            ),
            ParameterDef::parameter(
                "Components",
                "Components",
                ParameterValue::Int(self.components as i64),
            ),
            ParameterDef::parameter(
                "MinEnsembles",
                "Minimum Ensembles",
                ParameterValue::Int(self.min_ensembles as i64),
            ),
        ]
    }

    fn data_check(&self, dca: &mut DataContainerArray, _: CheckMode, ctx: &mut StageContext<'_>) {
        if check::require_array(dca, &self.path, self.element_type, self.components, ctx)
            .is_none()
        {
            return;
        }
        if self.min_ensembles > 0 {
            check::require_tuple_count_at_least(
                dca,
                &self.path.container,
                Category::CellEnsemble,
                self.min_ensembles,
                ctx,
            );
        }
    }

    fn compute(&self, _: &mut DataContainerArray, _: &mut StageContext<'_>) {}

    fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
        writer
            .open_stage(index, &self.info())
            .array_path("Path", &self.path)
            .element_type("ElementType", self.element_type)
            .int("Components", self.components as i64)
            .int("MinEnsembles", self.min_ensembles as i64);
        index + 1
    }

    fn read_parameters(&mut self, reader: &SettingsReader<'_>, index: usize) -> usize {
        let Some(s) = reader.stage(index) else {
            return index + 1;
        };
        self.path = s.array_path("Path", &self.path);
        self.element_type = s.element_type("ElementType", self.element_type);
        self.components = s.int("Components", self.components as i64).max(0) as usize;
        self.min_ensembles = s.int("MinEnsembles", self.min_ensembles as i64).max(0) as usize;
        index + 1
    }
}

// ── CreateArrayStage ────────────────────────────────────────────

/// Declares an array and fills it with a constant on execute.
#[derive(Clone, Debug)]
pub struct CreateArrayStage {
    pub path: DataArrayPath,
    pub element_type: ElementType,
    pub components: usize,
    pub value: f64,
}

impl CreateArrayStage {
    pub fn new(path: DataArrayPath, element_type: ElementType, components: usize) -> Self {
        Self {
            path,
            element_type,
            components,
            value: 0.0,
        }
    }

    pub fn filled_with(mut self, value: f64) -> Self {
        self.value = value;
        self
    }
}

impl Default for CreateArrayStage {
    fn default() -> Self {
        Self::new(default_path(), ElementType::Float32, 1)
    }
}

impl Stage for CreateArrayStage {
    fn info(&self) -> StageInfo {
        info("CreateArrayStage", 0x7e57_0002, "Create Array")
    }

    fn parameters(&self) -> Vec<ParameterDef> {
        vec![
            ParameterDef::created_array("Path", "Array", self.path.clone()),
            ParameterDef::parameter(
                "ElementType",
                "Element Type",
                ParameterValue::ElementType(self.element_type),
            ),
            ParameterDef::parameter(
                "Components",
                "Components",
                ParameterValue::Int(self.components as i64),
            ),
            ParameterDef::parameter("Value", "Fill Value", ParameterValue::Float(self.value)),
        ]
    }

    fn data_check(&self, dca: &mut DataContainerArray, mode: CheckMode, ctx: &mut StageContext<'_>) {
        check::create_array(
            dca,
            &self.path,
            self.element_type,
            self.components,
            mode,
            ctx,
        );
    }

    fn compute(&self, dca: &mut DataContainerArray, ctx: &mut StageContext<'_>) {
        match dca.array_mut(&self.path) {
            Some(array) => array.fill_f64(self.value),
            None => ctx.error(
                grainflow_stage::codes::MISSING_ARRAY,
                format!("array '{}' vanished after data check", self.path),
            ),
        }
    }

    fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
        writer
            .open_stage(index, &self.info())
            .array_path("Path", &self.path)
            .element_type("ElementType", self.element_type)
            .int("Components", self.components as i64)
            .float("Value", self.value);
        index + 1
    }

    fn read_parameters(&mut self, reader: &SettingsReader<'_>, index: usize) -> usize {
        let Some(s) = reader.stage(index) else {
            return index + 1;
        };
        self.path = s.array_path("Path", &self.path);
        self.element_type = s.element_type("ElementType", self.element_type);
        self.components = s.int("Components", self.components as i64).max(0) as usize;
        self.value = s.float("Value", self.value);
        index + 1
    }
}

// ── FailingStage ────────────────────────────────────────────────

/// Records a fixed error code in the chosen phase and counts how often
/// each phase ran.
#[derive(Debug)]
pub struct FailingStage {
    pub code: i32,
    pub fail_in: CheckMode,
    calls: Arc<FailingCalls>,
}

/// Shared call counters of a [`FailingStage`]; survives the stage being
/// moved into a pipeline.
#[derive(Debug, Default)]
pub struct FailingCalls {
    checks: AtomicUsize,
    computes: AtomicUsize,
}

impl FailingCalls {
    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::Relaxed)
    }

    pub fn computes(&self) -> usize {
        self.computes.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.checks.store(0, Ordering::Relaxed);
        self.computes.store(0, Ordering::Relaxed);
    }
}

impl FailingStage {
    /// Fails in `data_check` (either mode) with `code`.
    pub fn in_preflight(code: i32) -> Self {
        Self::new(code, CheckMode::Preflight)
    }

    /// Passes every check and fails in `compute` with `code`.
    pub fn in_execute(code: i32) -> Self {
        Self::new(code, CheckMode::Execute)
    }

    fn new(code: i32, fail_in: CheckMode) -> Self {
        Self {
            code,
            fail_in,
            calls: Arc::new(FailingCalls::default()),
        }
    }

    /// Handle to the call counters.
    pub fn calls(&self) -> Arc<FailingCalls> {
        Arc::clone(&self.calls)
    }
}

impl Default for FailingStage {
    fn default() -> Self {
        Self::in_execute(-1)
    }
}

impl Stage for FailingStage {
    fn info(&self) -> StageInfo {
        info("FailingStage", 0x7e57_0003, "Failing Stage")
    }

    fn parameters(&self) -> Vec<ParameterDef> {
        vec![ParameterDef::parameter(
            "Code",
            "Error Code",
            ParameterValue::Int(i64::from(self.code)),
        )]
    }

    fn data_check(&self, _: &mut DataContainerArray, _: CheckMode, ctx: &mut StageContext<'_>) {
        self.calls.checks.fetch_add(1, Ordering::Relaxed);
        if self.fail_in == CheckMode::Preflight {
            ctx.error(self.code, "configured to fail in data check");
        }
    }

    fn compute(&self, _: &mut DataContainerArray, ctx: &mut StageContext<'_>) {
        self.calls.computes.fetch_add(1, Ordering::Relaxed);
        ctx.error(self.code, "configured to fail in compute");
    }

    fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
        writer
            .open_stage(index, &self.info())
            .int("Code", i64::from(self.code))
            .bool("FailInPreflight", self.fail_in == CheckMode::Preflight);
        index + 1
    }

    fn read_parameters(&mut self, reader: &SettingsReader<'_>, index: usize) -> usize {
        let Some(s) = reader.stage(index) else {
            return index + 1;
        };
        self.code = i32::try_from(s.int("Code", i64::from(self.code))).unwrap_or(self.code);
        let in_preflight = s.bool("FailInPreflight", self.fail_in == CheckMode::Preflight);
        self.fail_in = if in_preflight {
            CheckMode::Preflight
        } else {
            CheckMode::Execute
        };
        index + 1
    }
}

// ── Cancellation fixtures ───────────────────────────────────────

/// Requests cancellation from inside `compute`, so the run stops before
/// the following stage.
#[derive(Clone, Debug, Default)]
pub struct CancellingStage {
    pub token: CancelToken,
}

impl CancellingStage {
    pub fn new(token: CancelToken) -> Self {
        Self { token }
    }
}

impl Stage for CancellingStage {
    fn info(&self) -> StageInfo {
        info("CancellingStage", 0x7e57_0004, "Cancel Run")
    }

    fn parameters(&self) -> Vec<ParameterDef> {
        Vec::new()
    }

    fn data_check(&self, _: &mut DataContainerArray, _: CheckMode, _: &mut StageContext<'_>) {}

    fn compute(&self, _: &mut DataContainerArray, _: &mut StageContext<'_>) {
        self.token.cancel();
    }

    fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
        writer.open_stage(index, &self.info());
        index + 1
    }

    fn read_parameters(&mut self, _: &SettingsReader<'_>, index: usize) -> usize {
        index + 1
    }
}

/// Blocks in `compute` until the paired sender sends or is dropped.
#[derive(Debug)]
pub struct GateStage {
    release: Receiver<()>,
}

impl GateStage {
    pub fn new(release: Receiver<()>) -> Self {
        Self { release }
    }
}

impl Stage for GateStage {
    fn info(&self) -> StageInfo {
        info("GateStage", 0x7e57_0005, "Wait For Release")
    }

    fn parameters(&self) -> Vec<ParameterDef> {
        Vec::new()
    }

    fn data_check(&self, _: &mut DataContainerArray, _: CheckMode, _: &mut StageContext<'_>) {}

    fn compute(&self, _: &mut DataContainerArray, _: &mut StageContext<'_>) {
        let _ = self.release.recv();
    }

    fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
        writer.open_stage(index, &self.info());
        index + 1
    }

    fn read_parameters(&mut self, _: &SettingsReader<'_>, index: usize) -> usize {
        index + 1
    }
}
