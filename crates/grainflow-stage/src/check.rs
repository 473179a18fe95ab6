//! Data-check helpers shared by stages.
//!
//! Each helper records the matching reserved code in the
//! [`StageContext`] on failure and returns `None`/`false`, so a stage's
//! `data_check` can run every check and report all problems at once.

use grainflow_core::{
    AttributeArrayMap, Category, DataArrayPath, DataContainer, DataContainerArray, ElementType,
    TypedArray,
};
use tracing::debug;

use crate::codes;
use crate::context::{CheckMode, StageContext};

/// Fail with [`codes::INVALID_PARAMETER`] if any part of `path` is empty.
pub fn require_complete_path(path: &DataArrayPath, ctx: &mut StageContext<'_>) -> bool {
    if path.is_incomplete() {
        ctx.error(
            codes::INVALID_PARAMETER,
            format!("array path '{path}' is incomplete"),
        );
        return false;
    }
    true
}

/// Look up a container, failing with [`codes::MISSING_CONTAINER`].
pub fn require_container<'d>(
    dca: &'d DataContainerArray,
    name: &str,
    ctx: &mut StageContext<'_>,
) -> Option<&'d DataContainer> {
    let found = dca.get(name);
    if found.is_none() {
        ctx.error(
            codes::MISSING_CONTAINER,
            format!("data container '{name}' does not exist"),
        );
    }
    found
}

/// Mutable variant of [`require_container`].
pub fn require_container_mut<'d>(
    dca: &'d mut DataContainerArray,
    name: &str,
    ctx: &mut StageContext<'_>,
) -> Option<&'d mut DataContainer> {
    if !dca.contains(name) {
        ctx.error(
            codes::MISSING_CONTAINER,
            format!("data container '{name}' does not exist"),
        );
        return None;
    }
    dca.get_mut(name)
}

/// Look up a fixed-width array and check its element type and width.
///
/// Codes: [`codes::MISSING_CONTAINER`], [`codes::MISSING_ARRAY`],
/// [`codes::ARRAY_TYPE_MISMATCH`], [`codes::ARRAY_COMPONENT_MISMATCH`].
pub fn require_array<'d>(
    dca: &'d DataContainerArray,
    path: &DataArrayPath,
    element_type: ElementType,
    components: usize,
    ctx: &mut StageContext<'_>,
) -> Option<&'d TypedArray> {
    let array = find_array(dca, path, ctx)?;
    if array.is_neighbor_list() || array.element_type() != element_type {
        let found = if array.is_neighbor_list() {
            "neighbor list".to_string()
        } else {
            array.element_type().to_string()
        };
        ctx.error(
            codes::ARRAY_TYPE_MISMATCH,
            format!("array '{path}' holds {found}, expected {element_type}"),
        );
        return None;
    }
    if array.components() != components {
        ctx.error(
            codes::ARRAY_COMPONENT_MISMATCH,
            format!(
                "array '{path}' has {} components, expected {components}",
                array.components()
            ),
        );
        return None;
    }
    Some(array)
}

/// Look up a numeric array of any fixed-width type with the given width.
pub fn require_numeric_array<'d>(
    dca: &'d DataContainerArray,
    path: &DataArrayPath,
    components: usize,
    ctx: &mut StageContext<'_>,
) -> Option<&'d TypedArray> {
    let array = find_array(dca, path, ctx)?;
    if array.is_neighbor_list() || array.element_type() == ElementType::Bool {
        ctx.error(
            codes::ARRAY_TYPE_MISMATCH,
            format!("array '{path}' is not numeric"),
        );
        return None;
    }
    if array.components() != components {
        ctx.error(
            codes::ARRAY_COMPONENT_MISMATCH,
            format!(
                "array '{path}' has {} components, expected {components}",
                array.components()
            ),
        );
        return None;
    }
    Some(array)
}

/// Fail unless the map at `container`/`category` holds at least `min`
/// tuples. An empty ensemble map reports [`codes::EMPTY_ENSEMBLE`];
/// other categories report [`codes::TUPLE_COUNT_MISMATCH`].
pub fn require_tuple_count_at_least(
    dca: &DataContainerArray,
    container: &str,
    category: Category,
    min: usize,
    ctx: &mut StageContext<'_>,
) -> bool {
    let Some(dc) = require_container(dca, container, ctx) else {
        return false;
    };
    let count = dc.map(category).tuple_count();
    if count >= min {
        return true;
    }
    let code = if category == Category::CellEnsemble {
        codes::EMPTY_ENSEMBLE
    } else {
        codes::TUPLE_COUNT_MISMATCH
    };
    ctx.error(
        code,
        format!("{container}/{category} holds {count} tuples, at least {min} required"),
    );
    false
}

/// Declare a fixed-width output array.
///
/// In [`CheckMode::Preflight`] a missing array is created as a zero-tuple
/// placeholder. In [`CheckMode::Execute`] it is sized to the owning map's
/// tuple count. An existing array of the same shape is kept (and resized
/// in execute mode); one of a different shape is replaced.
pub fn create_array(
    dca: &mut DataContainerArray,
    path: &DataArrayPath,
    element_type: ElementType,
    components: usize,
    mode: CheckMode,
    ctx: &mut StageContext<'_>,
) -> bool {
    if !require_complete_path(path, ctx) {
        return false;
    }
    if components == 0 {
        ctx.error(
            codes::INVALID_PARAMETER,
            format!("array '{path}' must have at least one component"),
        );
        return false;
    }
    let Some(dc) = require_container_mut(dca, &path.container, ctx) else {
        return false;
    };
    let tuples = match mode {
        CheckMode::Preflight => 0,
        CheckMode::Execute => dc.map(path.category).tuple_count(),
    };
    let map = dc.map_mut(path.category);
    if let Some(existing) = map.get_mut(&path.array) {
        if existing.has_shape(element_type, components) {
            if mode == CheckMode::Execute {
                existing.resize_tuples(tuples);
            }
            return true;
        }
    }
    let array = match TypedArray::zeros(path.array.clone(), element_type, components, tuples) {
        Ok(array) => array,
        Err(err) => {
            ctx.error(codes::INVALID_PARAMETER, err.to_string());
            return false;
        }
    };
    insert_created(map, array, path, ctx)
}

/// Declare a neighbor-list output array. Sizing follows [`create_array`].
pub fn create_neighbor_list(
    dca: &mut DataContainerArray,
    path: &DataArrayPath,
    mode: CheckMode,
    ctx: &mut StageContext<'_>,
) -> bool {
    if !require_complete_path(path, ctx) {
        return false;
    }
    let Some(dc) = require_container_mut(dca, &path.container, ctx) else {
        return false;
    };
    let tuples = match mode {
        CheckMode::Preflight => 0,
        CheckMode::Execute => dc.map(path.category).tuple_count(),
    };
    let map = dc.map_mut(path.category);
    if let Some(existing) = map.get_mut(&path.array) {
        if existing.is_neighbor_list() {
            if mode == CheckMode::Execute {
                existing.resize_tuples(tuples);
            }
            return true;
        }
    }
    let array = TypedArray::neighbor_list(path.array.clone(), vec![Vec::new(); tuples]);
    insert_created(map, array, path, ctx)
}

fn insert_created(
    map: &mut AttributeArrayMap,
    array: TypedArray,
    path: &DataArrayPath,
    ctx: &mut StageContext<'_>,
) -> bool {
    match map.insert(array) {
        Ok(_) => {
            debug!(array = %path, "declared output array");
            true
        }
        Err(err) => {
            ctx.error(codes::TUPLE_COUNT_MISMATCH, err.to_string());
            false
        }
    }
}

fn find_array<'d>(
    dca: &'d DataContainerArray,
    path: &DataArrayPath,
    ctx: &mut StageContext<'_>,
) -> Option<&'d TypedArray> {
    if !require_complete_path(path, ctx) {
        return None;
    }
    let dc = require_container(dca, &path.container, ctx)?;
    let array = dc.array(path.category, &path.array);
    if array.is_none() {
        ctx.error(
            codes::MISSING_ARRAY,
            format!("required array '{path}' does not exist"),
        );
    }
    array
}
