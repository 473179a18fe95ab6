//! Error type for data-model operations.

use thiserror::Error;

use crate::path::{Category, DataArrayPath};

/// Errors from constructing or mutating arrays, maps and containers.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DataError {
    /// An array was declared with zero components per tuple.
    #[error("array '{name}' must have at least one component")]
    ZeroComponents {
        /// Array name.
        name: String,
    },

    /// Storage length is not a whole number of tuples.
    #[error("array '{name}' holds {len} elements, not a multiple of {components} components")]
    RaggedStorage {
        /// Array name.
        name: String,
        /// Storage length.
        len: usize,
        /// Declared tuple width.
        components: usize,
    },

    /// An array's tuple count disagrees with its map.
    #[error("array '{array}' has {actual} tuples but the {category} map holds {expected}")]
    TupleCountMismatch {
        /// Offending array.
        array: String,
        /// Category of the owning map.
        category: Category,
        /// The map's tuple count.
        expected: usize,
        /// The array's tuple count.
        actual: usize,
    },

    /// Cell tuple count does not match the grid dimensions.
    #[error("container '{container}' has {actual} cell tuples, dimensions imply {expected}")]
    GeometryMismatch {
        /// Container name.
        container: String,
        /// `x * y * z`.
        expected: usize,
        /// Cell map tuple count.
        actual: usize,
    },

    /// A container with this name already exists.
    #[error("data container '{0}' already exists")]
    DuplicateContainer(String),

    /// No container with this name.
    #[error("data container '{0}' not found")]
    ContainerNotFound(String),

    /// No array at this path.
    #[error("array '{0}' not found")]
    ArrayNotFound(DataArrayPath),

    /// A path string could not be parsed.
    #[error("invalid array path '{0}'")]
    InvalidPath(String),
}
