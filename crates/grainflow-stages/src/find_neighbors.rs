//! Face-connected feature neighbors.

use std::collections::BTreeSet;

use grainflow_core::{Category, DataArrayPath, DataContainerArray, ElementType, TypedArray};
use grainflow_stage::{
    check, codes, CheckMode, ParameterDef, ParameterValue, SettingsReader, SettingsWriter, Stage,
    StageContext, StageInfo,
};
use tracing::debug;
use uuid::Uuid;

use crate::grid::face_neighbors;

/// Finds, for every feature, the other features it shares a voxel face
/// with.
///
/// Reads an int32 cell array of feature ids (0 marks unassigned voxels and
/// is never anyone's neighbor). Writes two feature arrays in the same
/// container: an int32 neighbor count and a neighbor list with ids in
/// ascending order. The feature map is grown to `max id + 1` tuples when
/// it is smaller.
#[derive(Clone, Debug, PartialEq)]
pub struct FindNeighbors {
    /// Cell feature ids.
    pub feature_ids: DataArrayPath,
    /// Name of the created neighbor-count array.
    pub num_neighbors_name: String,
    /// Name of the created neighbor-list array.
    pub neighbor_list_name: String,
}

impl Default for FindNeighbors {
    fn default() -> Self {
        Self::new(DataArrayPath::new(
            "VoxelDataContainer",
            Category::Cell,
            "GrainIds",
        ))
    }
}

impl FindNeighbors {
    /// Neighbors from `feature_ids`, written as `NumNeighbors` and
    /// `NeighborList`.
    pub fn new(feature_ids: DataArrayPath) -> Self {
        Self {
            feature_ids,
            num_neighbors_name: "NumNeighbors".to_string(),
            neighbor_list_name: "NeighborList".to_string(),
        }
    }

    fn feature_path(&self, name: &str) -> DataArrayPath {
        DataArrayPath::new(
            self.feature_ids.container.clone(),
            Category::CellFeature,
            name,
        )
    }
}

/// Sorted neighbor ids per feature for a grid of `dims`.
fn neighbor_sets(ids: &[i32], dims: [usize; 3], features: usize) -> Vec<BTreeSet<i32>> {
    let mut sets = vec![BTreeSet::new(); features];
    let [dx, dy, dz] = dims;
    for z in 0..dz {
        for y in 0..dy {
            for x in 0..dx {
                let here = ids[(z * dy + y) * dx + x];
                if here <= 0 {
                    continue;
                }
                for n in face_neighbors(x, y, z, dims) {
                    let there = ids[n];
                    if there > 0 && there != here {
                        sets[here as usize].insert(there);
                    }
                }
            }
        }
    }
    sets
}

impl Stage for FindNeighbors {
    fn info(&self) -> StageInfo {
        StageInfo {
            class_name: "FindNeighbors",
            uuid: Uuid::from_u128(0x97d1_5a0e_b8c3_4f12_9e6d_3a2f_c41b_07e8),
            group: "Statistics",
            subgroup: "Morphological",
            human_label: "Find Feature Neighbors",
        }
    }

    fn parameters(&self) -> Vec<ParameterDef> {
        vec![
            ParameterDef::required_array(
                "FeatureIdsArrayPath",
                "Feature Ids",
                self.feature_ids.clone(),
            ),
            ParameterDef::parameter(
                "NumNeighborsArrayName",
                "Number of Neighbors",
                ParameterValue::Text(self.num_neighbors_name.clone()),
            ),
            ParameterDef::parameter(
                "NeighborListArrayName",
                "Neighbor List",
                ParameterValue::Text(self.neighbor_list_name.clone()),
            ),
        ]
    }

    fn data_check(&self, dca: &mut DataContainerArray, mode: CheckMode, ctx: &mut StageContext<'_>) {
        if check::require_array(dca, &self.feature_ids, ElementType::Int32, 1, ctx).is_none() {
            return;
        }
        let num_neighbors = self.feature_path(&self.num_neighbors_name);
        if !check::create_array(dca, &num_neighbors, ElementType::Int32, 1, mode, ctx) {
            return;
        }
        let list = self.feature_path(&self.neighbor_list_name);
        check::create_neighbor_list(dca, &list, mode, ctx);
    }

    fn compute(&self, dca: &mut DataContainerArray, ctx: &mut StageContext<'_>) {
        let Some(dc) = dca.get_mut(&self.feature_ids.container) else {
            ctx.error(codes::MISSING_CONTAINER, "container vanished after data check");
            return;
        };
        let dims = dc.geometry().dimensions;
        let Some(ids) = dc
            .array(Category::Cell, &self.feature_ids.array)
            .and_then(|a| a.as_slice::<i32>())
        else {
            ctx.error(codes::MISSING_ARRAY, "feature ids vanished after data check");
            return;
        };
        let cells = dims.iter().product::<usize>();
        if ids.len() != cells {
            ctx.error(
                codes::TUPLE_COUNT_MISMATCH,
                format!("'{}' holds {} tuples, grid has {cells} cells", self.feature_ids, ids.len()),
            );
            return;
        }
        if let Some(bad) = ids.iter().find(|id| **id < 0) {
            ctx.error(
                codes::VALUE_OUT_OF_RANGE,
                format!("negative feature id {bad} in '{}'", self.feature_ids),
            );
            return;
        }

        let max_id = ids.iter().copied().max().unwrap_or(0) as usize;
        let features = dc.map(Category::CellFeature).tuple_count().max(max_id + 1);
        let sets = neighbor_sets(ids, dims, features);
        debug!(features, cells = ids.len(), "feature neighbors found");

        dc.resize_tuples(Category::CellFeature, features);
        let counts: Vec<i32> = sets
            .iter()
            .map(|s| i32::try_from(s.len()).unwrap_or(i32::MAX))
            .collect();
        let lists: Vec<Vec<i32>> = sets.into_iter().map(|s| s.into_iter().collect()).collect();

        let replaced = [
            TypedArray::from_vec(self.num_neighbors_name.clone(), 1, counts),
            Ok(TypedArray::neighbor_list(
                self.neighbor_list_name.clone(),
                lists,
            )),
        ];
        for array in replaced {
            let result = array.and_then(|a| dc.insert_array(Category::CellFeature, a));
            if let Err(err) = result {
                ctx.error(codes::TUPLE_COUNT_MISMATCH, err.to_string());
                return;
            }
        }
    }

    fn write_parameters(&self, writer: &mut SettingsWriter, index: usize) -> usize {
        writer
            .open_stage(index, &self.info())
            .array_path("FeatureIdsArrayPath", &self.feature_ids)
            .text("NumNeighborsArrayName", &self.num_neighbors_name)
            .text("NeighborListArrayName", &self.neighbor_list_name);
        index + 1
    }

    fn read_parameters(&mut self, reader: &SettingsReader<'_>, index: usize) -> usize {
        let Some(s) = reader.stage(index) else {
            return index + 1;
        };
        self.feature_ids = s.array_path("FeatureIdsArrayPath", &self.feature_ids);
        self.num_neighbors_name = s.text("NumNeighborsArrayName", &self.num_neighbors_name);
        self.neighbor_list_name = s.text("NeighborListArrayName", &self.neighbor_list_name);
        index + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grainflow_test_utils::{cell_path, volume, with_cell_array};

    fn grains(dims: [usize; 3], ids: Vec<i32>) -> DataContainerArray {
        let mut dca = DataContainerArray::new();
        dca.add(with_cell_array(volume("Volume", dims), "GrainIds", 1, ids))
            .unwrap();
        dca
    }

    fn stage() -> FindNeighbors {
        FindNeighbors::new(cell_path("GrainIds"))
    }

    #[test]
    fn unsized_feature_ids_rejected() {
        let mut dc = volume("Volume", [2, 2, 1]);
        dc.insert_array(
            Category::Cell,
            TypedArray::zeros("GrainIds", ElementType::Int32, 1, 0).unwrap(),
        )
        .unwrap();
        let mut dca = DataContainerArray::new();
        dca.add(dc).unwrap();
        dca.validate().unwrap();

        let mut ctx = StageContext::new(0);
        stage().execute(&mut dca, &mut ctx);
        assert_eq!(ctx.error_code(), codes::TUPLE_COUNT_MISMATCH);
        let dc = dca.get("Volume").unwrap();
        assert_eq!(dc.map(Category::CellFeature).tuple_count(), 0);
    }

    #[test]
    fn three_strips() {
        // 3x2 grid, x fastest:
        //   1 2 3
        //   1 2 3
        let mut dca = grains([3, 2, 1], vec![1, 2, 3, 1, 2, 3]);
        let mut ctx = StageContext::new(0);
        stage().execute(&mut dca, &mut ctx);
        assert_eq!(ctx.error_code(), 0);

        let dc = dca.get("Volume").unwrap();
        assert_eq!(dc.map(Category::CellFeature).tuple_count(), 4);
        let counts = dc.array(Category::CellFeature, "NumNeighbors").unwrap();
        assert_eq!(counts.as_slice::<i32>(), Some(&[0, 1, 2, 1][..]));
        let lists = dc
            .array(Category::CellFeature, "NeighborList")
            .unwrap()
            .neighbor_lists()
            .unwrap();
        assert_eq!(lists[1], vec![2]);
        assert_eq!(lists[2], vec![1, 3]);
        assert_eq!(lists[3], vec![2]);
        dc.validate().unwrap();
    }

    #[test]
    fn unassigned_voxels_are_nobody_neighbor() {
        let mut dca = grains([3, 1, 1], vec![1, 0, 2]);
        let mut ctx = StageContext::new(0);
        stage().execute(&mut dca, &mut ctx);
        let dc = dca.get("Volume").unwrap();
        let counts = dc.array(Category::CellFeature, "NumNeighbors").unwrap();
        assert_eq!(counts.as_slice::<i32>(), Some(&[0, 0, 0][..]));
    }

    #[test]
    fn neighbors_across_z() {
        let mut dca = grains([1, 1, 2], vec![4, 7]);
        let mut ctx = StageContext::new(0);
        stage().execute(&mut dca, &mut ctx);
        let dc = dca.get("Volume").unwrap();
        let lists = dc
            .array(Category::CellFeature, "NeighborList")
            .unwrap()
            .neighbor_lists()
            .unwrap();
        assert_eq!(lists.len(), 8);
        assert_eq!(lists[4], vec![7]);
        assert_eq!(lists[7], vec![4]);
    }

    #[test]
    fn preflight_declares_placeholders() {
        let mut dca = grains([2, 1, 1], vec![1, 2]).placeholder_copy();
        let mut ctx = StageContext::new(0);
        stage().preflight(&mut dca, &mut ctx);
        assert_eq!(ctx.error_code(), 0);
        let dc = dca.get("Volume").unwrap();
        assert!(dc
            .array(Category::CellFeature, "NeighborList")
            .unwrap()
            .is_neighbor_list());
        assert_eq!(
            dc.array(Category::CellFeature, "NumNeighbors")
                .unwrap()
                .tuples(),
            0
        );
    }

    #[test]
    fn negative_id_rejected() {
        let mut dca = grains([2, 1, 1], vec![1, -3]);
        let mut ctx = StageContext::new(0);
        stage().execute(&mut dca, &mut ctx);
        assert_eq!(ctx.error_code(), codes::VALUE_OUT_OF_RANGE);
    }
}
