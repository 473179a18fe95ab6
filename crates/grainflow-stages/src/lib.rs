//! Reference stages for grainflow pipelines.
//!
//! Exercise the full stage contract: creation during the data check,
//! placeholder outputs in preflight, map resizing, neighbor lists and
//! data-parallel compute.
//!
//! # Typical pipeline
//!
//! 1. [`CreateDataContainer`] declares the voxel grid
//! 2. [`CreateDataArray`] seeds cell arrays
//! 3. [`FindNeighbors`] derives feature-level arrays from cell ids
//! 4. [`FindVolumeFractions`] derives ensemble-level statistics
//!
//! [`register_builtin_stages`] adds every stage here to a registry.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod create_data_array;
pub mod create_data_container;
pub mod find_neighbors;
mod grid;
pub mod multiply_arrays;
pub mod scale_volume;
pub mod volume_fractions;

pub use create_data_array::CreateDataArray;
pub use create_data_container::CreateDataContainer;
pub use find_neighbors::FindNeighbors;
pub use multiply_arrays::MultiplyArrays;
pub use scale_volume::ScaleVolume;
pub use volume_fractions::FindVolumeFractions;

use grainflow_stage::{RegistryError, StageRegistry};

/// Register every stage in this crate.
pub fn register_builtin_stages(registry: &mut StageRegistry) -> Result<(), RegistryError> {
    registry.register_stage::<CreateDataContainer>()?;
    registry.register_stage::<CreateDataArray>()?;
    registry.register_stage::<ScaleVolume>()?;
    registry.register_stage::<MultiplyArrays>()?;
    registry.register_stage::<FindVolumeFractions>()?;
    registry.register_stage::<FindNeighbors>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_stage_registers_once() {
        let mut registry = StageRegistry::new();
        register_builtin_stages(&mut registry).unwrap();
        assert_eq!(registry.len(), 6);
        for factory in registry.factories() {
            let info = factory.info();
            let by_uuid = registry.by_uuid(&info.uuid).unwrap();
            assert_eq!(by_uuid.info().class_name, info.class_name);
        }
        assert!(register_builtin_stages(&mut registry).is_err());
    }
}
