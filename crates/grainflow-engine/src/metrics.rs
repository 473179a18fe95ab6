//! Per-stage timing for one pipeline run.
//!
//! All durations are in microseconds. A stage that never reached a phase
//! reports zero for it.

/// Timings for one stage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageMetrics {
    /// Class name of the stage.
    pub class_name: String,
    /// Wall-clock time of the stage's preflight, in microseconds.
    pub preflight_us: u64,
    /// Wall-clock time of the stage's execute, in microseconds.
    pub execute_us: u64,
}

/// Timings for a whole run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunMetrics {
    /// Wall-clock time of the run, in microseconds.
    pub total_us: u64,
    /// One entry per stage, in pipeline order.
    pub stages: Vec<StageMetrics>,
}

impl RunMetrics {
    pub(crate) fn for_stages<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            total_us: 0,
            stages: names
                .into_iter()
                .map(|name| StageMetrics {
                    class_name: name.to_string(),
                    ..StageMetrics::default()
                })
                .collect(),
        }
    }

    /// Sum of all stages' execute time.
    pub fn execute_us(&self) -> u64 {
        self.stages.iter().map(|s| s.execute_us).sum()
    }

    /// The stage with the longest execute time, if any stage executed.
    pub fn slowest_stage(&self) -> Option<&StageMetrics> {
        self.stages
            .iter()
            .filter(|s| s.execute_us > 0)
            .max_by_key(|s| s.execute_us)
    }
}
