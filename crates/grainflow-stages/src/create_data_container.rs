//! Creates a named voxel container.

use grainflow_core::{Category, DataContainer, DataContainerArray, Geometry};
use grainflow_stage::{
    codes, CheckMode, ParameterDef, ParameterValue, SettingsReader, SettingsWriter, Stage,
    StageContext, StageInfo,
};
use tracing::debug;
use uuid::Uuid;

/// Creates (or reshapes) a voxel container during the data check, so
/// later stages see it in preflight too.
///
/// An existing container of the same name keeps its arrays; its geometry
/// is replaced and its cell arrays are resized to the new point count.
/// A non-zero `ensembles` also sets the ensemble map's tuple count.
#[derive(Clone, Debug, PartialEq)]
pub struct CreateDataContainer {
    /// Container name.
    pub name: String,
    /// Grid points along x, y and z. Each must be at least 1.
    pub dimensions: [usize; 3],
    /// Voxel spacing.
    pub spacing: [f32; 3],
    /// Grid origin.
    pub origin: [f32; 3],
    /// Ensemble tuples to declare; 0 leaves the ensemble map alone.
    pub ensembles: usize,
}

impl Default for CreateDataContainer {
    fn default() -> Self {
        Self {
            name: "VoxelDataContainer".to_string(),
            dimensions: [1, 1, 1],
            spacing: [1.0; 3],
            origin: [0.0; 3],
            ensembles: 0,
        }
    }
}

impl CreateDataContainer {
    /// A unit-spaced container at the origin.
    pub fn new(name: impl Into<String>, dimensions: [usize; 3]) -> Self {
        Self {
            name: name.into(),
            dimensions,
            ..Self::default()
        }
    }

    fn geometry(&self) -> Geometry {
        Geometry {
            dimensions: self.dimensions,
            spacing: self.spacing,
            origin: self.origin,
        }
    }
}

impl Stage for CreateDataContainer {
    fn info(&self) -> StageInfo {
        StageInfo {
            class_name: "CreateDataContainer",
            uuid: Uuid::from_u128(0x816f_d7a9_5b8c_4a7e_9e51_0c9d_2f43_11a0),
            group: "Core",
            subgroup: "Generation",
            human_label: "Create Data Container",
        }
    }

    fn parameters(&self) -> Vec<ParameterDef> {
        vec![
            ParameterDef::parameter(
                "DataContainerName",
                "Data Container Name",
                ParameterValue::Text(self.name.clone()),
            ),
            ParameterDef::parameter(
                "Dimensions",
                "Dimensions",
                ParameterValue::IntVec3(self.dimensions.map(|d| d as i64)),
            ),
            ParameterDef::parameter("Spacing", "Spacing", ParameterValue::FloatVec3(self.spacing)),
            ParameterDef::parameter("Origin", "Origin", ParameterValue::FloatVec3(self.origin)),
            ParameterDef::parameter(
                "NumberOfEnsembles",
                "Number of Ensembles",
                ParameterValue::Int(self.ensembles as i64),
            ),
        ]
    }

    fn data_check(&self, dca: &mut DataContainerArray, _: CheckMode, ctx: &mut StageContext<'_>) {
        if self.name.is_empty() {
            ctx.error(codes::INVALID_PARAMETER, "data container name is empty");
            return;
        }
        if self.dimensions.contains(&0) {
            ctx.error(
                codes::INVALID_PARAMETER,
                format!("dimensions {:?} must all be at least 1", self.dimensions),
            );
            return;
        }
        if self.spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            ctx.error(
                codes::INVALID_PARAMETER,
                format!("spacing {:?} must be finite and positive", self.spacing),
            );
            return;
        }

        let geometry = self.geometry();
        if !dca.contains(&self.name) {
            dca.replace(DataContainer::with_geometry(self.name.clone(), geometry));
        }
        let Some(dc) = dca.get_mut(&self.name) else {
            return;
        };
        if *dc.geometry() != geometry {
            debug!(container = %self.name, ?geometry, "reshaping container");
            dc.set_geometry(geometry);
        }
        if self.ensembles > 0 && dc.map(Category::CellEnsemble).tuple_count() != self.ensembles {
            dc.resize_tuples(Category::CellEnsemble, self.ensembles);
        }
    }

    fn compute(&self, _: &mut DataContainerArray, ctx: &mut StageContext<'_>) {
        ctx.status("Complete");
    }

    fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
        writer
            .open_stage(index, &self.info())
            .text("DataContainerName", &self.name)
            .int_vec3("Dimensions", self.dimensions.map(|d| d as i64))
            .float_vec3("Spacing", self.spacing)
            .float_vec3("Origin", self.origin)
            .int("NumberOfEnsembles", self.ensembles as i64);
        index + 1
    }

    fn read_parameters(&mut self, reader: &SettingsReader<'_>, index: usize) -> usize {
        let Some(s) = reader.stage(index) else {
            return index + 1;
        };
        self.name = s.text("DataContainerName", &self.name);
        self.dimensions = s
            .int_vec3("Dimensions", self.dimensions.map(|d| d as i64))
            .map(|d| usize::try_from(d).unwrap_or(0));
        self.spacing = s.float_vec3("Spacing", self.spacing);
        self.origin = s.float_vec3("Origin", self.origin);
        self.ensembles =
            usize::try_from(s.int("NumberOfEnsembles", self.ensembles as i64)).unwrap_or(0);
        index + 1
    }
}
