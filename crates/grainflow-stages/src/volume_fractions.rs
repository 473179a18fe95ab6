//! Per-phase volume fractions.

use grainflow_core::{Category, DataArrayPath, DataContainerArray, ElementType};
use grainflow_stage::{
    check, codes, CheckMode, ParameterDef, ParameterValue, SettingsReader, SettingsWriter, Stage,
    StageContext, StageInfo,
};
use rayon::prelude::*;
use tracing::debug;
use uuid::Uuid;

/// Computes, for every ensemble, the fraction of cells whose phase is that
/// ensemble's index.
///
/// Reads an int32 cell array of phase ids and writes a float32 ensemble
/// array in the same container. The ensemble map must hold at least one
/// tuple ([`codes::EMPTY_ENSEMBLE`] otherwise) and every phase id must be
/// a valid ensemble index ([`codes::VALUE_OUT_OF_RANGE`] otherwise).
/// Index 0 is conventionally unused, so its fraction is normally zero.
#[derive(Clone, Debug, PartialEq)]
pub struct FindVolumeFractions {
    /// Cell phase ids.
    pub phases: DataArrayPath,
    /// Name of the created ensemble array.
    pub output_name: String,
}

impl Default for FindVolumeFractions {
    fn default() -> Self {
        Self::new(DataArrayPath::new(
            "VoxelDataContainer",
            Category::Cell,
            "Phases",
        ))
    }
}

impl FindVolumeFractions {
    /// Fractions from `phases`, written as `VolumeFractions`.
    pub fn new(phases: DataArrayPath) -> Self {
        Self {
            phases,
            output_name: "VolumeFractions".to_string(),
        }
    }

    fn output(&self) -> DataArrayPath {
        DataArrayPath::new(
            self.phases.container.clone(),
            Category::CellEnsemble,
            self.output_name.clone(),
        )
    }
}

impl Stage for FindVolumeFractions {
    fn info(&self) -> StageInfo {
        StageInfo {
            class_name: "FindVolFractions",
            uuid: Uuid::from_u128(0x68b2_f0d1_3c4a_4e97_a5f8_0b1c_d27e_8a45),
            group: "Statistics",
            subgroup: "Ensemble",
            human_label: "Find Volume Fractions of Phases",
        }
    }

    fn parameters(&self) -> Vec<ParameterDef> {
        vec![
            ParameterDef::required_array("CellPhasesArrayPath", "Cell Phases", self.phases.clone()),
            ParameterDef::parameter(
                "VolFractionsArrayName",
                "Volume Fractions",
                ParameterValue::Text(self.output_name.clone()),
            ),
        ]
    }

    fn data_check(&self, dca: &mut DataContainerArray, mode: CheckMode, ctx: &mut StageContext<'_>) {
        if check::require_array(dca, &self.phases, ElementType::Int32, 1, ctx).is_none() {
            return;
        }
        if !check::require_tuple_count_at_least(
            dca,
            &self.phases.container,
            Category::CellEnsemble,
            1,
            ctx,
        ) {
            return;
        }
        check::create_array(dca, &self.output(), ElementType::Float32, 1, mode, ctx);
    }

    fn compute(&self, dca: &mut DataContainerArray, ctx: &mut StageContext<'_>) {
        let Some(dc) = dca.get(&self.phases.container) else {
            ctx.error(codes::MISSING_CONTAINER, "container vanished after data check");
            return;
        };
        let ensembles = dc.map(Category::CellEnsemble).tuple_count();
        let Some(phases) = dc
            .array(Category::Cell, &self.phases.array)
            .and_then(|a| a.as_slice::<i32>())
        else {
            ctx.error(codes::MISSING_ARRAY, "phases vanished after data check");
            return;
        };

        if let Some(bad) = phases
            .par_iter()
            .find_any(|p| !matches!(usize::try_from(**p), Ok(p) if p < ensembles))
        {
            ctx.error(
                codes::VALUE_OUT_OF_RANGE,
                format!(
                    "phase {bad} in '{}' is outside the {ensembles} ensembles",
                    self.phases
                ),
            );
            return;
        }

        let counts = phases
            .par_iter()
            .fold(
                || vec![0usize; ensembles],
                |mut acc, p| {
                    acc[*p as usize] += 1;
                    acc
                },
            )
            .reduce(
                || vec![0usize; ensembles],
                |mut a, b| {
                    a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                    a
                },
            );
        let total = phases.len().max(1) as f32;
        let fractions: Vec<f32> = counts.iter().map(|c| *c as f32 / total).collect();
        debug!(ensembles, cells = phases.len(), "volume fractions computed");

        match dca
            .array_mut(&self.output())
            .and_then(|a| a.as_mut_slice::<f32>())
        {
            Some(out) if out.len() == fractions.len() => out.copy_from_slice(&fractions),
            _ => ctx.error(
                codes::TUPLE_COUNT_MISMATCH,
                format!("'{}' does not match the ensemble count", self.output()),
            ),
        }
    }

    fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
        writer
            .open_stage(index, &self.info())
            .array_path("CellPhasesArrayPath", &self.phases)
            .text("VolFractionsArrayName", &self.output_name);
        index + 1
    }

    fn read_parameters(&mut self, reader: &SettingsReader<'_>, index: usize) -> usize {
        let Some(s) = reader.stage(index) else {
            return index + 1;
        };
        self.phases = s.array_path("CellPhasesArrayPath", &self.phases);
        self.output_name = s.text("VolFractionsArrayName", &self.output_name);
        index + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grainflow_test_utils::{cell_path, volume_with_phases};

    fn stage() -> FindVolumeFractions {
        FindVolumeFractions::new(cell_path("Phases"))
    }

    #[test]
    fn fractions_per_phase() {
        let mut dca = volume_with_phases([2, 2, 1], &[1, 1, 1, 2], 3);
        let mut ctx = StageContext::new(0);
        stage().execute(&mut dca, &mut ctx);
        assert_eq!(ctx.error_code(), 0);
        let out = dca.array(&stage().output()).unwrap();
        assert_eq!(out.as_slice::<f32>(), Some(&[0.0, 0.75, 0.25][..]));
    }

    #[test]
    fn empty_ensemble_fails_preflight() {
        let mut dca = volume_with_phases([2, 2, 1], &[1, 1, 1, 2], 0);
        let mut ctx = StageContext::new(0);
        stage().preflight(&mut dca, &mut ctx);
        assert_eq!(ctx.error_code(), codes::EMPTY_ENSEMBLE);
    }

    #[test]
    fn missing_phases_fails_preflight() {
        let mut dca = volume_with_phases([2, 2, 1], &[1, 1, 1, 2], 3);
        let stage = FindVolumeFractions::new(cell_path("CellPhases"));
        let mut ctx = StageContext::new(0);
        stage.preflight(&mut dca, &mut ctx);
        assert_eq!(ctx.error_code(), codes::MISSING_ARRAY);
    }

    #[test]
    fn phase_beyond_ensembles_fails_execute() {
        let mut dca = volume_with_phases([2, 2, 1], &[1, 1, 1, 5], 3);
        let mut ctx = StageContext::new(0);
        stage().preflight(&mut dca.placeholder_copy(), &mut ctx);
        assert_eq!(ctx.error_code(), 0);
        let mut ctx = StageContext::new(0);
        stage().execute(&mut dca, &mut ctx);
        assert_eq!(ctx.error_code(), codes::VALUE_OUT_OF_RANGE);
    }

    #[test]
    fn negative_phase_fails_execute() {
        let mut dca = volume_with_phases([2, 1, 1], &[-1, 1], 2);
        let mut ctx = StageContext::new(0);
        stage().execute(&mut dca, &mut ctx);
        assert_eq!(ctx.error_code(), codes::VALUE_OUT_OF_RANGE);
    }
}
