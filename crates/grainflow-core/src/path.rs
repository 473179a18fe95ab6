//! Attribute categories and the [`DataArrayPath`] addressing scheme.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// The category an attribute array belongs to within a container.
///
/// The declaration order is the fixed serialization order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Per-vertex data.
    Vertex,
    /// Per-edge data.
    Edge,
    /// Per-face data.
    Face,
    /// Per-voxel data; tuple count tracks the grid dimensions.
    Cell,
    /// Per-feature (grain) data.
    CellFeature,
    /// Per-ensemble (phase) data.
    CellEnsemble,
}

impl Category {
    /// All categories in serialization order.
    pub const ALL: [Category; 6] = [
        Self::Vertex,
        Self::Edge,
        Self::Face,
        Self::Cell,
        Self::CellFeature,
        Self::CellEnsemble,
    ];

    /// Position in [`ALL`](Self::ALL).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name of the sub-group holding this category in a container file.
    pub fn group_name(self) -> &'static str {
        match self {
            Self::Vertex => "VertexData",
            Self::Edge => "EdgeData",
            Self::Face => "FaceData",
            Self::Cell => "CellData",
            Self::CellFeature => "FieldData",
            Self::CellEnsemble => "EnsembleData",
        }
    }

    /// Inverse of [`group_name`](Self::group_name).
    pub fn from_group_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.group_name() == name)
    }

    /// Whether every array in this category must share the map's tuple count.
    pub fn enforces_tuple_count(self) -> bool {
        matches!(self, Self::Cell | Self::CellFeature | Self::CellEnsemble)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.group_name())
    }
}

/// Address of one array: container name, category, array name.
///
/// Renders and parses as `container/CategoryGroup/array`, e.g.
/// `ImageDataContainer/CellData/Phases`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataArrayPath {
    /// Owning container name.
    pub container: String,
    /// Attribute category.
    pub category: Category,
    /// Array name within the category.
    pub array: String,
}

impl DataArrayPath {
    /// Build a path from its parts.
    pub fn new(container: impl Into<String>, category: Category, array: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            category,
            array: array.into(),
        }
    }

    /// A sibling path in the same container and category.
    pub fn with_array(&self, array: impl Into<String>) -> Self {
        Self {
            container: self.container.clone(),
            category: self.category,
            array: array.into(),
        }
    }

    /// Whether any part is empty.
    pub fn is_incomplete(&self) -> bool {
        self.container.is_empty() || self.array.is_empty()
    }
}

impl fmt::Display for DataArrayPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.container, self.category, self.array)
    }
}

impl FromStr for DataArrayPath {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        let (Some(container), Some(group), Some(array), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(DataError::InvalidPath(s.to_string()));
        };
        let category =
            Category::from_group_name(group).ok_or_else(|| DataError::InvalidPath(s.to_string()))?;
        if container.is_empty() || array.is_empty() {
            return Err(DataError::InvalidPath(s.to_string()));
        }
        Ok(Self::new(container, category, array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_order_is_serialization_order() {
        let names: Vec<_> = Category::ALL.iter().map(|c| c.group_name()).collect();
        assert_eq!(
            names,
            ["VertexData", "EdgeData", "FaceData", "CellData", "FieldData", "EnsembleData"]
        );
        for (i, c) in Category::ALL.iter().enumerate() {
            assert_eq!(c.index(), i);
        }
    }

    #[test]
    fn path_display_parse_roundtrip() {
        let p = DataArrayPath::new("Volume", Category::CellFeature, "AvgQuats");
        assert_eq!(p.to_string(), "Volume/FieldData/AvgQuats");
        assert_eq!(p.to_string().parse::<DataArrayPath>().unwrap(), p);
    }

    #[test]
    fn malformed_paths_rejected() {
        for bad in ["", "a/b", "a/CellData/", "/CellData/x", "a/Bogus/x", "a/CellData/x/y"] {
            assert!(bad.parse::<DataArrayPath>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn only_grid_categories_enforce_tuple_count() {
        assert!(!Category::Vertex.enforces_tuple_count());
        assert!(!Category::Face.enforces_tuple_count());
        assert!(Category::Cell.enforces_tuple_count());
        assert!(Category::CellEnsemble.enforces_tuple_count());
    }
}
