//! The [`Pipeline`]: ordered stages over one data container array.
//!
//! Stages run strictly in order, each completing before the next starts.
//! A failing stage halts the run; stages before it keep their mutations
//! and stages after it never run. Cancellation is checked only between
//! stages.

use std::time::Instant;

use grainflow_core::{DataContainerArray, DataError};
use grainflow_stage::{
    codes, PipelineSettings, RegistryError, SettingsWriter, Stage, StageContext, StageMessage,
    StageRegistry,
};
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::event::{NullObserver, ObserverSink, Phase, PipelineEvent, PipelineObserver};
use crate::report::{RunOutcome, RunReport, StageState};

/// An ordered list of stages plus the data they run over.
///
/// # Examples
///
/// ```
/// use grainflow_engine::Pipeline;
///
/// let mut pipeline = Pipeline::new();
/// let report = pipeline.execute();
/// assert!(report.is_success());
/// ```
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    data: DataContainerArray,
    config: EngineConfig,
    cancel: CancelToken,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Empty pipeline over empty data with default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Empty pipeline with the given configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            stages: Vec::new(),
            data: DataContainerArray::new(),
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Rebuild a persisted pipeline through `registry`.
    pub fn from_settings(
        settings: &PipelineSettings,
        registry: &StageRegistry,
        config: EngineConfig,
    ) -> Result<Self, RegistryError> {
        let mut pipeline = Self::with_config(config);
        pipeline.stages = registry.load_pipeline(settings)?;
        Ok(pipeline)
    }

    /// Persist every stage's configuration, one slot per stage.
    pub fn to_settings(&self) -> PipelineSettings {
        let mut writer = SettingsWriter::new();
        let mut index = 0;
        for stage in &self.stages {
            index = stage.write_parameters(&mut writer, index);
        }
        writer.finish()
    }

    // ── editing ────────────────────────────────────────────────────

    /// Append a stage.
    pub fn push(&mut self, stage: impl Stage) -> &mut Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Append a boxed stage.
    pub fn push_stage(&mut self, stage: Box<dyn Stage>) -> &mut Self {
        self.stages.push(stage);
        self
    }

    /// Insert a stage at `index`, clamped to the end.
    pub fn insert_stage(&mut self, index: usize, stage: Box<dyn Stage>) {
        let index = index.min(self.stages.len());
        self.stages.insert(index, stage);
    }

    /// Remove the stage at `index`.
    pub fn remove_stage(&mut self, index: usize) -> Option<Box<dyn Stage>> {
        (index < self.stages.len()).then(|| self.stages.remove(index))
    }

    /// Stages in run order.
    pub fn stages(&self) -> &[Box<dyn Stage>] {
        &self.stages
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether there are no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    // ── data and control ───────────────────────────────────────────

    /// The shared data.
    pub fn data(&self) -> &DataContainerArray {
        &self.data
    }

    /// The shared data, mutably (for seeding inputs between runs).
    pub fn data_mut(&mut self) -> &mut DataContainerArray {
        &mut self.data
    }

    /// Replace the shared data, returning the old one.
    pub fn replace_data(&mut self, data: DataContainerArray) -> DataContainerArray {
        std::mem::replace(&mut self.data, data)
    }

    /// Consume the pipeline, keeping its data.
    pub fn into_data(self) -> DataContainerArray {
        self.data
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A handle to this pipeline's cancellation flag.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    // ── running ────────────────────────────────────────────────────

    /// Preflight every stage against a placeholder copy of the data.
    pub fn preflight(&self) -> RunReport {
        self.preflight_with(&mut NullObserver)
    }

    /// [`preflight`](Self::preflight), streaming events to `observer`.
    pub fn preflight_with(&self, observer: &mut dyn PipelineObserver) -> RunReport {
        let started = Instant::now();
        let mut report = self.new_report();
        self.preflight_into(&mut report, observer);
        finish(&mut report, started, observer);
        report
    }

    /// Run the pipeline for real, mutating [`data`](Self::data).
    pub fn execute(&mut self) -> RunReport {
        self.execute_with(&mut NullObserver)
    }

    /// [`execute`](Self::execute), streaming events to `observer`.
    pub fn execute_with(&mut self, observer: &mut dyn PipelineObserver) -> RunReport {
        let started = Instant::now();
        let mut report = self.new_report();
        if self.config.preflight_before_execute && !self.preflight_into(&mut report, observer) {
            finish(&mut report, started, observer);
            return report;
        }

        let count = self.stages.len();
        for (index, stage) in self.stages.iter().enumerate() {
            if self.cancel.is_cancelled() {
                cancel_at(&mut report, index, observer);
                break;
            }
            report.states[index] = StageState::Executing;
            let (code, elapsed_us) = run_stage(
                stage.as_ref(),
                index,
                count,
                Phase::Execute,
                &mut self.data,
                &mut report.messages,
                observer,
            );
            report.metrics.stages[index].execute_us = elapsed_us;

            let code = if code == 0 && self.config.validate_after_stage {
                check_invariants(&self.data, index, &mut report.messages, observer)
            } else {
                code
            };
            if code < 0 {
                warn!(stage = stage.human_label(), index, code, "stage execute failed");
                report.states[index] = StageState::ExecuteFailed;
                report.outcome = RunOutcome::Failed {
                    stage_index: index,
                    code,
                };
                break;
            }
            report.states[index] = StageState::ExecuteOk;
            observer.on_event(PipelineEvent::Progress {
                stage_index: index,
                stage_count: count,
                percent: percent_complete(index + 1, count),
            });
        }
        finish(&mut report, started, observer);
        report
    }

    fn new_report(&self) -> RunReport {
        RunReport::new(self.stages.iter().map(|s| s.class_name()))
    }

    /// Runs the preflight pass into `report`. Returns whether it passed.
    fn preflight_into(&self, report: &mut RunReport, observer: &mut dyn PipelineObserver) -> bool {
        let mut scratch = self.data.placeholder_copy();
        let count = self.stages.len();
        for (index, stage) in self.stages.iter().enumerate() {
            if self.cancel.is_cancelled() {
                cancel_at(report, index, observer);
                return false;
            }
            report.states[index] = StageState::Preflighting;
            let (code, elapsed_us) = run_stage(
                stage.as_ref(),
                index,
                count,
                Phase::Preflight,
                &mut scratch,
                &mut report.messages,
                observer,
            );
            report.metrics.stages[index].preflight_us = elapsed_us;
            if code < 0 {
                info!(stage = stage.human_label(), index, code, "preflight failed");
                report.states[index] = StageState::PreflightFailed;
                report.outcome = RunOutcome::Failed {
                    stage_index: index,
                    code,
                };
                return false;
            }
            report.states[index] = StageState::PreflightOk;
        }
        true
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field(
                "stages",
                &self.stages.iter().map(|s| s.class_name()).collect::<Vec<_>>(),
            )
            .field("containers", &self.data.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Run one phase of one stage. Returns its error code and elapsed time.
fn run_stage(
    stage: &dyn Stage,
    index: usize,
    count: usize,
    phase: Phase,
    data: &mut DataContainerArray,
    messages: &mut Vec<StageMessage>,
    observer: &mut dyn PipelineObserver,
) -> (i32, u64) {
    debug!(stage = stage.human_label(), index, %phase, "stage started");
    observer.on_event(PipelineEvent::StageStarted {
        stage_index: index,
        stage_count: count,
        class_name: stage.class_name().to_string(),
        phase,
    });
    let started = Instant::now();
    let mut sink = ObserverSink { observer };
    let mut ctx = StageContext::with_sink(index, &mut sink);
    match phase {
        Phase::Preflight => stage.preflight(data, &mut ctx),
        Phase::Execute => stage.execute(data, &mut ctx),
    }
    let (code, stage_messages) = ctx.finish();
    messages.extend(stage_messages);
    (code, started.elapsed().as_micros() as u64)
}

fn check_invariants(
    data: &DataContainerArray,
    index: usize,
    messages: &mut Vec<StageMessage>,
    observer: &mut dyn PipelineObserver,
) -> i32 {
    let Err(err) = data.validate() else {
        return 0;
    };
    let code = match err {
        DataError::TupleCountMismatch { .. } | DataError::GeometryMismatch { .. } => {
            codes::TUPLE_COUNT_MISMATCH
        }
        _ => codes::INVALID_PARAMETER,
    };
    let mut sink = ObserverSink { observer };
    let mut ctx = StageContext::with_sink(index, &mut sink);
    ctx.error(code, format!("stage left data inconsistent: {err}"));
    let (code, stage_messages) = ctx.finish();
    messages.extend(stage_messages);
    code
}

fn cancel_at(report: &mut RunReport, next_stage: usize, observer: &mut dyn PipelineObserver) {
    info!(next_stage, "pipeline cancelled");
    report.outcome = RunOutcome::Cancelled { next_stage };
    observer.on_event(PipelineEvent::Cancelled { next_stage });
}

fn finish(report: &mut RunReport, started: Instant, observer: &mut dyn PipelineObserver) {
    report.metrics.total_us = started.elapsed().as_micros() as u64;
    debug!(outcome = ?report.outcome, total_us = report.metrics.total_us, "pipeline finished");
    observer.on_event(PipelineEvent::Finished {
        outcome: report.outcome,
    });
}

fn percent_complete(done: usize, count: usize) -> u32 {
    if count == 0 {
        return 100;
    }
    (done * 100 / count) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use grainflow_core::{Category, DataArrayPath, DataContainer, ElementType, TypedArray};
    use grainflow_stage::{
        check, CheckMode, ParameterDef, SettingsReader, StageInfo, TypedFactory,
    };
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Creates a cell array of ones in "dc".
    #[derive(Default)]
    struct MakeOnes {
        name: String,
    }

    impl Stage for MakeOnes {
        fn info(&self) -> StageInfo {
            StageInfo {
                class_name: "MakeOnes",
                uuid: Uuid::from_u128(10),
                group: "Test",
                subgroup: "Test",
                human_label: "Make Ones",
            }
        }

        fn parameters(&self) -> Vec<ParameterDef> {
            Vec::new()
        }

        fn data_check(
            &self,
            dca: &mut DataContainerArray,
            mode: CheckMode,
            ctx: &mut StageContext<'_>,
        ) {
            let path = DataArrayPath::new("dc", Category::Cell, self.name.clone());
            check::create_array(dca, &path, ElementType::Float32, 1, mode, ctx);
        }

        fn compute(&self, dca: &mut DataContainerArray, _: &mut StageContext<'_>) {
            let path = DataArrayPath::new("dc", Category::Cell, self.name.clone());
            if let Some(array) = dca.array_mut(&path) {
                array.fill_f64(1.0);
            }
        }

        fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
            writer.open_stage(index, &self.info()).text("Name", &self.name);
            index + 1
        }

        fn read_parameters(&mut self, reader: &SettingsReader<'_>, index: usize) -> usize {
            if let Some(s) = reader.stage(index) {
                self.name = s.text("Name", &self.name);
            }
            index + 1
        }
    }

    /// Breaks the cell tuple invariant during compute.
    struct Corrupt;

    impl Stage for Corrupt {
        fn info(&self) -> StageInfo {
            StageInfo {
                class_name: "Corrupt",
                uuid: Uuid::from_u128(11),
                group: "Test",
                subgroup: "Test",
                human_label: "Corrupt",
            }
        }

        fn parameters(&self) -> Vec<ParameterDef> {
            Vec::new()
        }

        fn data_check(&self, _: &mut DataContainerArray, _: CheckMode, _: &mut StageContext<'_>) {}

        fn compute(&self, dca: &mut DataContainerArray, ctx: &mut StageContext<'_>) {
            if let Some(dc) = dca.get_mut("dc") {
                let cells = dc.map_mut(Category::Cell);
                let names: Vec<String> = cells.names().map(str::to_string).collect();
                for name in names {
                    if let Some(array) = cells.get_mut(&name) {
                        array.resize_tuples(1);
                    }
                }
            }
            ctx.status("corrupted");
        }

        fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
            writer.open_stage(index, &self.info());
            index + 1
        }

        fn read_parameters(&mut self, _: &SettingsReader<'_>, index: usize) -> usize {
            index + 1
        }
    }

    fn seeded(stages: Vec<Box<dyn Stage>>) -> Pipeline {
        let mut pipeline = Pipeline::new();
        let mut dc = DataContainer::new("dc");
        dc.set_dimensions([2, 2, 1]);
        pipeline.data_mut().add(dc).unwrap();
        for stage in stages {
            pipeline.push_stage(stage);
        }
        pipeline
    }

    fn ones(name: &str) -> Box<dyn Stage> {
        Box::new(MakeOnes { name: name.into() })
    }

    #[test]
    fn execute_runs_every_stage() {
        let mut pipeline = seeded(vec![ones("a"), ones("b")]);
        let mut events: Vec<PipelineEvent> = Vec::new();
        let report = pipeline.execute_with(&mut events);
        assert!(report.is_success(), "{report:?}");
        assert_eq!(report.states, [StageState::ExecuteOk; 2]);
        let a = pipeline
            .data()
            .array(&DataArrayPath::new("dc", Category::Cell, "a"))
            .unwrap();
        assert_eq!(a.as_slice::<f32>().unwrap(), &[1.0; 4]);

        let progress: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert_eq!(progress, [50, 100]);
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::Finished {
                outcome: RunOutcome::Completed
            })
        ));
    }

    #[test]
    fn preflight_leaves_real_data_untouched() {
        let pipeline = seeded(vec![ones("a")]);
        let before = pipeline.data().clone();
        let report = pipeline.preflight();
        assert!(report.is_success());
        assert_eq!(report.states, [StageState::PreflightOk]);
        assert_eq!(pipeline.data(), &before);
    }

    #[test]
    fn preflight_failure_blocks_execute() {
        let mut pipeline = Pipeline::new();
        pipeline.push(MakeOnes { name: "a".into() });
        let report = pipeline.execute();
        assert_eq!(
            report.outcome,
            RunOutcome::Failed {
                stage_index: 0,
                code: codes::MISSING_CONTAINER
            }
        );
        assert_eq!(report.states, [StageState::PreflightFailed]);
        assert!(pipeline.data().is_empty());
    }

    #[test]
    fn invariant_violation_fails_the_stage() {
        let mut pipeline = seeded(vec![ones("a"), Box::new(Corrupt), ones("b")]);
        let report = pipeline.execute();
        assert_eq!(
            report.outcome,
            RunOutcome::Failed {
                stage_index: 1,
                code: codes::TUPLE_COUNT_MISMATCH
            }
        );
        assert_eq!(report.state(2), Some(StageState::PreflightOk));
        assert!(report.messages.iter().any(|m| m.text == "corrupted"));
    }

    #[test]
    fn invariant_check_can_be_disabled() {
        let config = EngineConfig {
            validate_after_stage: false,
            ..EngineConfig::default()
        };
        let mut pipeline = Pipeline::with_config(config);
        let mut dc = DataContainer::new("dc");
        dc.set_dimensions([2, 2, 1]);
        dc.insert_array(
            Category::Cell,
            TypedArray::zeros("x", ElementType::Int8, 1, 4).unwrap(),
        )
        .unwrap();
        pipeline.data_mut().add(dc).unwrap();
        pipeline.push(Corrupt);
        assert!(pipeline.execute().is_success());
    }

    #[test]
    fn cancelled_before_start_runs_nothing() {
        let config = EngineConfig {
            preflight_before_execute: false,
            ..EngineConfig::default()
        };
        let mut pipeline = Pipeline::with_config(config);
        pipeline.data_mut().add(DataContainer::new("dc")).unwrap();
        pipeline.push(MakeOnes { name: "a".into() });
        pipeline.cancel_token().cancel();
        let report = pipeline.execute();
        assert_eq!(report.outcome, RunOutcome::Cancelled { next_stage: 0 });
        assert_eq!(report.error_code(), 0);
        assert_eq!(report.states, [StageState::Unexecuted]);
    }

    #[test]
    fn editing_and_settings_round_trip() {
        let mut pipeline = seeded(vec![ones("a")]);
        pipeline.insert_stage(0, ones("first"));
        pipeline.insert_stage(99, ones("last"));
        assert_eq!(pipeline.len(), 3);
        assert!(pipeline.remove_stage(7).is_none());

        let settings = pipeline.to_settings();
        assert_eq!(settings.stages.len(), 3);
        assert_eq!(settings.stages[2].index, 2);

        let mut registry = StageRegistry::new();
        registry.register(TypedFactory::<MakeOnes>::new()).unwrap();
        let rebuilt = Pipeline::from_settings(&settings, &registry, EngineConfig::default()).unwrap();
        assert_eq!(rebuilt.to_settings(), settings);
    }

    #[test]
    fn percent_rounds_down() {
        assert_eq!(percent_complete(1, 3), 33);
        assert_eq!(percent_complete(3, 3), 100);
        assert_eq!(percent_complete(0, 0), 100);
    }

    proptest! {
        #[test]
        fn percent_is_monotone_and_ends_at_100(count in 1usize..500) {
            let mut last = 0;
            for done in 1..=count {
                let percent = percent_complete(done, count);
                prop_assert!(percent >= last);
                prop_assert!(percent <= 100);
                last = percent;
            }
            prop_assert_eq!(last, 100);
        }
    }
}
