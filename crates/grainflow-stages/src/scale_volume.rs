//! Rescales a container's voxel spacing and, optionally, its vertex
//! coordinates.

use grainflow_core::{Category, DataArrayPath, DataContainerArray, ElementType};
use grainflow_stage::{
    check, codes, CheckMode, ParameterDef, ParameterValue, SettingsReader, SettingsWriter, Stage,
    StageContext, StageInfo,
};
use rayon::prelude::*;
use uuid::Uuid;

/// Name of the vertex coordinate array scaled by
/// [`ScaleVolume::apply_to_vertices`].
pub const VERTEX_COORDINATES: &str = "Nodes";

/// Multiplies spacing component-wise by `scale_factor`.
///
/// With `apply_to_vertices`, the float32 x3 vertex array
/// [`VERTEX_COORDINATES`] is scaled about the grid origin as well, so a
/// surface mesh stays aligned with the voxels.
#[derive(Clone, Debug, PartialEq)]
pub struct ScaleVolume {
    /// Container to rescale.
    pub container: String,
    /// Per-axis factor. Each must be finite and positive.
    pub scale_factor: [f32; 3],
    /// Scale the voxel spacing.
    pub apply_to_voxel_volume: bool,
    /// Scale the vertex coordinates.
    pub apply_to_vertices: bool,
}

impl Default for ScaleVolume {
    fn default() -> Self {
        Self {
            container: "VoxelDataContainer".to_string(),
            scale_factor: [1.0; 3],
            apply_to_voxel_volume: true,
            apply_to_vertices: false,
        }
    }
}

impl ScaleVolume {
    /// Scale the voxel spacing of `container` by `scale_factor`.
    pub fn new(container: impl Into<String>, scale_factor: [f32; 3]) -> Self {
        Self {
            container: container.into(),
            scale_factor,
            ..Self::default()
        }
    }

    fn vertex_path(&self) -> DataArrayPath {
        DataArrayPath::new(self.container.clone(), Category::Vertex, VERTEX_COORDINATES)
    }
}

impl Stage for ScaleVolume {
    fn info(&self) -> StageInfo {
        StageInfo {
            class_name: "ScaleVolume",
            uuid: Uuid::from_u128(0x5d0b_3e6c_91f2_47a8_b4c7_e2a1_9f08_6d33),
            group: "Generic",
            subgroup: "Spatial",
            human_label: "Change Scaling of Volume",
        }
    }

    fn parameters(&self) -> Vec<ParameterDef> {
        vec![
            ParameterDef::parameter(
                "DataContainerName",
                "Data Container",
                ParameterValue::Text(self.container.clone()),
            ),
            ParameterDef::parameter(
                "ScaleFactor",
                "Scaling Factor",
                ParameterValue::FloatVec3(self.scale_factor),
            ),
            ParameterDef::parameter(
                "ApplyToVoxelVolume",
                "Apply to Voxel Volume",
                ParameterValue::Bool(self.apply_to_voxel_volume),
            ),
            ParameterDef::parameter(
                "ApplyToVertices",
                "Apply to Vertices",
                ParameterValue::Bool(self.apply_to_vertices),
            ),
        ]
    }

    fn data_check(&self, dca: &mut DataContainerArray, _: CheckMode, ctx: &mut StageContext<'_>) {
        if self
            .scale_factor
            .iter()
            .any(|f| !f.is_finite() || *f <= 0.0)
        {
            ctx.error(
                codes::INVALID_PARAMETER,
                format!(
                    "scale factor {:?} must be finite and positive",
                    self.scale_factor
                ),
            );
            return;
        }
        if check::require_container(dca, &self.container, ctx).is_none() {
            return;
        }
        if self.apply_to_vertices {
            check::require_array(dca, &self.vertex_path(), ElementType::Float32, 3, ctx);
        }
    }

    fn compute(&self, dca: &mut DataContainerArray, ctx: &mut StageContext<'_>) {
        let Some(dc) = check::require_container_mut(dca, &self.container, ctx) else {
            return;
        };
        let geometry = *dc.geometry();
        if self.apply_to_voxel_volume {
            let spacing = [0, 1, 2].map(|i| geometry.spacing[i] * self.scale_factor[i]);
            dc.set_spacing(spacing);
        }
        if !self.apply_to_vertices {
            return;
        }
        let Some(nodes) = dc
            .array_mut(Category::Vertex, VERTEX_COORDINATES)
            .and_then(|a| a.as_mut_slice::<f32>())
        else {
            ctx.error(
                codes::MISSING_ARRAY,
                format!("vertex array '{}' is not float32", self.vertex_path()),
            );
            return;
        };
        let origin = geometry.origin;
        let scale = self.scale_factor;
        nodes.par_chunks_mut(3).for_each(|p| {
            for axis in 0..3 {
                p[axis] = origin[axis] + (p[axis] - origin[axis]) * scale[axis];
            }
        });
    }

    fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
        writer
            .open_stage(index, &self.info())
            .text("DataContainerName", &self.container)
            .float_vec3("ScaleFactor", self.scale_factor)
            .bool("ApplyToVoxelVolume", self.apply_to_voxel_volume)
            .bool("ApplyToVertices", self.apply_to_vertices);
        index + 1
    }

    fn read_parameters(&mut self, reader: &SettingsReader<'_>, index: usize) -> usize {
        let Some(s) = reader.stage(index) else {
            return index + 1;
        };
        self.container = s.text("DataContainerName", &self.container);
        self.scale_factor = s.float_vec3("ScaleFactor", self.scale_factor);
        self.apply_to_voxel_volume = s.bool("ApplyToVoxelVolume", self.apply_to_voxel_volume);
        self.apply_to_vertices = s.bool("ApplyToVertices", self.apply_to_vertices);
        index + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grainflow_core::{DataContainer, Geometry, TypedArray};

    fn container_with_nodes() -> DataContainerArray {
        let mut dc = DataContainer::with_geometry(
            "Volume",
            Geometry {
                dimensions: [2, 2, 2],
                spacing: [0.5, 1.0, 2.0],
                origin: [1.0, 1.0, 1.0],
            },
        );
        dc.resize_tuples(Category::Vertex, 2);
        dc.insert_array(
            Category::Vertex,
            TypedArray::from_vec::<f32>(VERTEX_COORDINATES, 3, vec![1.0, 1.0, 1.0, 3.0, 2.0, 5.0])
                .unwrap(),
        )
        .unwrap();
        let mut dca = DataContainerArray::new();
        dca.add(dc).unwrap();
        dca
    }

    #[test]
    fn spacing_is_scaled() {
        let mut dca = container_with_nodes();
        let stage = ScaleVolume::new("Volume", [2.0, 3.0, 0.5]);
        let mut ctx = StageContext::new(0);
        stage.execute(&mut dca, &mut ctx);
        assert_eq!(ctx.error_code(), 0);
        let g = dca.get("Volume").unwrap().geometry();
        assert_eq!(g.spacing, [1.0, 3.0, 1.0]);
        assert_eq!(g.dimensions, [2, 2, 2]);
    }

    #[test]
    fn vertices_scaled_about_origin() {
        let mut dca = container_with_nodes();
        let mut stage = ScaleVolume::new("Volume", [2.0, 2.0, 2.0]);
        stage.apply_to_voxel_volume = false;
        stage.apply_to_vertices = true;
        let mut ctx = StageContext::new(0);
        stage.execute(&mut dca, &mut ctx);
        assert_eq!(ctx.error_code(), 0);
        let dc = dca.get("Volume").unwrap();
        assert_eq!(dc.geometry().spacing, [0.5, 1.0, 2.0]);
        let nodes = dc.array(Category::Vertex, VERTEX_COORDINATES).unwrap();
        assert_eq!(
            nodes.as_slice::<f32>(),
            Some(&[1.0, 1.0, 1.0, 5.0, 3.0, 9.0][..])
        );
    }

    #[test]
    fn non_positive_factor_rejected() {
        let mut dca = container_with_nodes();
        let stage = ScaleVolume::new("Volume", [1.0, 0.0, 1.0]);
        let mut ctx = StageContext::new(0);
        stage.preflight(&mut dca, &mut ctx);
        assert_eq!(ctx.error_code(), codes::INVALID_PARAMETER);
    }

    #[test]
    fn missing_vertices_reported_in_preflight() {
        let mut dca = DataContainerArray::new();
        dca.add(DataContainer::with_geometry(
            "Volume",
            Geometry::with_dimensions([1, 1, 1]),
        ))
        .unwrap();
        let mut stage = ScaleVolume::new("Volume", [2.0; 3]);
        stage.apply_to_vertices = true;
        let mut ctx = StageContext::new(0);
        stage.preflight(&mut dca, &mut ctx);
        assert_eq!(ctx.error_code(), codes::MISSING_ARRAY);
    }
}
