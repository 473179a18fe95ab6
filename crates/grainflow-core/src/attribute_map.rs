//! Category-scoped ordered mapping from array name to [`TypedArray`].

use indexmap::IndexMap;

use crate::array::TypedArray;
use crate::error::DataError;
use crate::path::Category;

/// An ordered name → array map for one [`Category`] of a container.
///
/// Insertion order is preserved and is the serialization order. For
/// categories that [enforce a tuple count](Category::enforces_tuple_count),
/// every array either matches [`tuple_count`](Self::tuple_count) or is a
/// zero-tuple placeholder declared during preflight.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeArrayMap {
    category: Category,
    tuple_count: usize,
    arrays: IndexMap<String, TypedArray>,
}

impl AttributeArrayMap {
    /// Empty map with the given declared tuple count.
    pub fn new(category: Category, tuple_count: usize) -> Self {
        Self {
            category,
            tuple_count,
            arrays: IndexMap::new(),
        }
    }

    /// The category this map holds.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Declared tuple count for arrays in this map.
    pub fn tuple_count(&self) -> usize {
        self.tuple_count
    }

    /// Number of arrays.
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    /// Whether the map holds no arrays.
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Whether an array with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.arrays.contains_key(name)
    }

    /// Array names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    /// Arrays in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &TypedArray> {
        self.arrays.values()
    }

    /// Look up an array by name.
    pub fn get(&self, name: &str) -> Option<&TypedArray> {
        self.arrays.get(name)
    }

    /// Look up an array by name for mutation.
    ///
    /// Resizing through this reference can break the tuple-count
    /// invariant; call [`validate`](Self::validate) afterwards.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut TypedArray> {
        self.arrays.get_mut(name)
    }

    /// Insert an array, replacing (in place) any array of the same name.
    ///
    /// Returns the replaced array. Fails without modifying the map if the
    /// array's tuple count conflicts with the map.
    pub fn insert(&mut self, array: TypedArray) -> Result<Option<TypedArray>, DataError> {
        self.check_tuples(&array)?;
        Ok(self.arrays.insert(array.name().to_string(), array))
    }

    /// Remove an array, keeping the order of the rest.
    pub fn remove(&mut self, name: &str) -> Option<TypedArray> {
        self.arrays.shift_remove(name)
    }

    /// Rename an array in place. Fails if `to` is already taken.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return self.contains(from);
        }
        if self.contains(to) {
            return false;
        }
        let Some(index) = self.arrays.get_index_of(from) else {
            return false;
        };
        let Some((_, mut array)) = self.arrays.shift_remove_index(index) else {
            return false;
        };
        array.set_name(to);
        self.arrays.shift_insert(index, to.to_string(), array);
        true
    }

    /// Change the declared tuple count, resizing every array to match.
    pub fn set_tuple_count(&mut self, tuples: usize) {
        self.tuple_count = tuples;
        for array in self.arrays.values_mut() {
            array.resize_tuples(tuples);
        }
    }

    /// Remove every array, keeping the declared tuple count.
    pub fn clear(&mut self) {
        self.arrays.clear();
    }

    /// Same category, tuple count and array shapes, with every array
    /// replaced by its zero-tuple placeholder.
    pub fn placeholder_copy(&self) -> Self {
        Self {
            category: self.category,
            tuple_count: self.tuple_count,
            arrays: self
                .arrays
                .iter()
                .map(|(name, array)| (name.clone(), array.placeholder()))
                .collect(),
        }
    }

    /// Check the tuple-count invariant across all arrays.
    pub fn validate(&self) -> Result<(), DataError> {
        self.arrays.values().try_for_each(|a| self.check_tuples(a))
    }

    fn check_tuples(&self, array: &TypedArray) -> Result<(), DataError> {
        if !self.category.enforces_tuple_count() {
            return Ok(());
        }
        let actual = array.tuples();
        if actual == self.tuple_count || actual == 0 {
            return Ok(());
        }
        Err(DataError::TupleCountMismatch {
            array: array.name().to_string(),
            category: self.category,
            expected: self.tuple_count,
            actual,
        })
    }
}

impl<'a> IntoIterator for &'a AttributeArrayMap {
    type Item = &'a TypedArray;
    type IntoIter = indexmap::map::Values<'a, String, TypedArray>;

    fn into_iter(self) -> Self::IntoIter {
        self.arrays.values()
    }
}
