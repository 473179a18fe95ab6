//! [`DataContainer`]: six attribute maps plus regular-grid geometry.

use crate::array::TypedArray;
use crate::attribute_map::AttributeArrayMap;
use crate::error::DataError;
use crate::path::Category;

/// Regular-grid geometry: point counts, voxel spacing and origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    /// `(xPoints, yPoints, zPoints)`.
    pub dimensions: [usize; 3],
    /// `(dx, dy, dz)`.
    pub spacing: [f32; 3],
    /// `(ox, oy, oz)`.
    pub origin: [f32; 3],
}

impl Geometry {
    /// Geometry with unit spacing at the origin.
    pub fn with_dimensions(dimensions: [usize; 3]) -> Self {
        Self {
            dimensions,
            ..Self::default()
        }
    }

    /// `xPoints * yPoints * zPoints`.
    pub fn total_points(&self) -> usize {
        self.dimensions.iter().product()
    }

    /// Linear cell index of `(x, y, z)`, x fastest.
    pub fn index_of(&self, x: usize, y: usize, z: usize) -> usize {
        let [nx, ny, _] = self.dimensions;
        (z * ny + y) * nx + x
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            dimensions: [0, 0, 0],
            spacing: [1.0, 1.0, 1.0],
            origin: [0.0, 0.0, 0.0],
        }
    }
}

/// A named dataset: geometry plus one [`AttributeArrayMap`] per [`Category`].
///
/// The cell map's tuple count is kept equal to
/// [`total_points`](Geometry::total_points) by
/// [`set_geometry`](Self::set_geometry) and
/// [`set_dimensions`](Self::set_dimensions).
///
/// # Examples
///
/// ```
/// use grainflow_core::{Category, DataContainer, ElementType, TypedArray};
///
/// let mut dc = DataContainer::new("Volume");
/// dc.set_dimensions([2, 2, 1]);
/// assert_eq!(dc.map(Category::Cell).tuple_count(), 4);
///
/// let phases = TypedArray::zeros("Phases", ElementType::Int32, 1, 4).unwrap();
/// dc.insert_array(Category::Cell, phases).unwrap();
/// assert!(dc.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct DataContainer {
    name: String,
    geometry: Geometry,
    maps: [AttributeArrayMap; 6],
}

impl DataContainer {
    /// Empty container with zero dimensions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            geometry: Geometry::default(),
            maps: Category::ALL.map(|c| AttributeArrayMap::new(c, 0)),
        }
    }

    /// Empty container with the given geometry.
    pub fn with_geometry(name: impl Into<String>, geometry: Geometry) -> Self {
        let mut dc = Self::new(name);
        dc.set_geometry(geometry);
        dc
    }

    /// Container name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Grid geometry.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Replace the geometry, resizing cell arrays to the new point count.
    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.geometry = geometry;
        let points = geometry.total_points();
        self.map_mut(Category::Cell).set_tuple_count(points);
    }

    /// Replace the dimensions, resizing cell arrays to the new point count.
    pub fn set_dimensions(&mut self, dimensions: [usize; 3]) {
        let geometry = Geometry {
            dimensions,
            ..self.geometry
        };
        self.set_geometry(geometry);
    }

    /// Replace voxel spacing. Does not touch array data.
    pub fn set_spacing(&mut self, spacing: [f32; 3]) {
        self.geometry.spacing = spacing;
    }

    /// Replace grid origin. Does not touch array data.
    pub fn set_origin(&mut self, origin: [f32; 3]) {
        self.geometry.origin = origin;
    }

    /// `xPoints * yPoints * zPoints`.
    pub fn total_points(&self) -> usize {
        self.geometry.total_points()
    }

    /// The attribute map for a category.
    pub fn map(&self, category: Category) -> &AttributeArrayMap {
        &self.maps[category.index()]
    }

    /// The attribute map for a category, mutably.
    pub fn map_mut(&mut self, category: Category) -> &mut AttributeArrayMap {
        &mut self.maps[category.index()]
    }

    /// All maps in serialization order.
    pub fn maps(&self) -> impl Iterator<Item = &AttributeArrayMap> {
        self.maps.iter()
    }

    /// Look up an array.
    pub fn array(&self, category: Category, name: &str) -> Option<&TypedArray> {
        self.map(category).get(name)
    }

    /// Look up an array for mutation.
    pub fn array_mut(&mut self, category: Category, name: &str) -> Option<&mut TypedArray> {
        self.map_mut(category).get_mut(name)
    }

    /// Insert (or replace) an array in a category.
    pub fn insert_array(
        &mut self,
        category: Category,
        array: TypedArray,
    ) -> Result<Option<TypedArray>, DataError> {
        self.map_mut(category).insert(array)
    }

    /// Remove an array from a category.
    pub fn remove_array(&mut self, category: Category, name: &str) -> Option<TypedArray> {
        self.map_mut(category).remove(name)
    }

    /// Resize every array in a category. For [`Category::Cell`] prefer
    /// [`set_dimensions`](Self::set_dimensions).
    pub fn resize_tuples(&mut self, category: Category, tuples: usize) {
        self.map_mut(category).set_tuple_count(tuples);
    }

    /// Total number of arrays across all categories.
    pub fn array_count(&self) -> usize {
        self.maps.iter().map(AttributeArrayMap::len).sum()
    }

    /// Geometry and array shapes without array contents.
    pub fn placeholder_copy(&self) -> Self {
        Self {
            name: self.name.clone(),
            geometry: self.geometry,
            maps: std::array::from_fn(|i| self.maps[i].placeholder_copy()),
        }
    }

    /// Check every map's tuple invariant and the cell/geometry invariant.
    pub fn validate(&self) -> Result<(), DataError> {
        for map in &self.maps {
            map.validate()?;
        }
        let cells = self.map(Category::Cell);
        if !cells.is_empty() && cells.tuple_count() != self.total_points() {
            return Err(DataError::GeometryMismatch {
                container: self.name.clone(),
                expected: self.total_points(),
                actual: cells.tuple_count(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementType;

    #[test]
    fn new_container_has_six_empty_maps() {
        let dc = DataContainer::new("dc");
        let cats: Vec<_> = dc.maps().map(|m| m.category()).collect();
        assert_eq!(cats, Category::ALL);
        assert_eq!(dc.array_count(), 0);
        assert_eq!(dc.geometry().spacing, [1.0; 3]);
    }

    #[test]
    fn dimensions_drive_cell_tuple_count() {
        let mut dc = DataContainer::new("dc");
        dc.set_dimensions([2, 3, 4]);
        dc.insert_array(
            Category::Cell,
            TypedArray::zeros("ids", ElementType::Int32, 1, 24).unwrap(),
        )
        .unwrap();

        dc.set_dimensions([2, 2, 1]);
        assert_eq!(dc.array(Category::Cell, "ids").unwrap().tuples(), 4);
        assert!(dc.validate().is_ok());
    }

    #[test]
    fn spacing_and_origin_leave_data_alone() {
        let mut dc = DataContainer::with_geometry("dc", Geometry::with_dimensions([2, 1, 1]));
        dc.insert_array(
            Category::Cell,
            TypedArray::from_vec("v", 1, vec![5u8, 6]).unwrap(),
        )
        .unwrap();
        dc.set_spacing([0.5, 0.5, 2.0]);
        dc.set_origin([1.0, 2.0, 3.0]);
        assert_eq!(
            dc.array(Category::Cell, "v").unwrap().as_slice::<u8>(),
            Some(&[5, 6][..])
        );
        assert_eq!(dc.geometry().spacing, [0.5, 0.5, 2.0]);
    }

    #[test]
    fn geometry_mismatch_detected() {
        let mut dc = DataContainer::new("dc");
        dc.set_dimensions([2, 2, 1]);
        dc.insert_array(
            Category::Cell,
            TypedArray::zeros("x", ElementType::Float32, 1, 4).unwrap(),
        )
        .unwrap();
        dc.map_mut(Category::Cell).set_tuple_count(5);
        assert!(matches!(
            dc.validate(),
            Err(DataError::GeometryMismatch { expected: 4, actual: 5, .. })
        ));
    }

    #[test]
    fn linear_index_is_x_fastest() {
        let g = Geometry::with_dimensions([3, 4, 5]);
        assert_eq!(g.index_of(0, 0, 0), 0);
        assert_eq!(g.index_of(1, 0, 0), 1);
        assert_eq!(g.index_of(0, 1, 0), 3);
        assert_eq!(g.index_of(0, 0, 1), 12);
        assert_eq!(g.index_of(2, 3, 4), 59);
    }
}
