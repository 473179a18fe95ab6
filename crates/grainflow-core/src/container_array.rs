//! [`DataContainerArray`]: the run-scoped collection of containers.

use indexmap::IndexMap;

use crate::array::TypedArray;
use crate::container::DataContainer;
use crate::error::DataError;
use crate::path::DataArrayPath;

/// Ordered mapping from container name to [`DataContainer`].
///
/// Exactly one instance is threaded through a pipeline run. Stages borrow
/// it mutably for the length of one `preflight` or `execute` call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataContainerArray {
    containers: IndexMap<String, DataContainer>,
}

impl DataContainerArray {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of containers.
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// Whether there are no containers.
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Whether a container with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.containers.contains_key(name)
    }

    /// Container names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.containers.keys().map(String::as_str)
    }

    /// Containers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DataContainer> {
        self.containers.values()
    }

    /// Containers in insertion order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DataContainer> {
        self.containers.values_mut()
    }

    /// Add a container. Names are unique.
    pub fn add(&mut self, container: DataContainer) -> Result<(), DataError> {
        if self.contains(container.name()) {
            return Err(DataError::DuplicateContainer(container.name().to_string()));
        }
        self.containers
            .insert(container.name().to_string(), container);
        Ok(())
    }

    /// Add a container, replacing any existing one of the same name in place.
    pub fn replace(&mut self, container: DataContainer) -> Option<DataContainer> {
        self.containers
            .insert(container.name().to_string(), container)
    }

    /// Look up a container.
    pub fn get(&self, name: &str) -> Option<&DataContainer> {
        self.containers.get(name)
    }

    /// Look up a container for mutation.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut DataContainer> {
        self.containers.get_mut(name)
    }

    /// Get an existing container or create an empty one.
    pub fn get_or_create(&mut self, name: &str) -> &mut DataContainer {
        self.containers
            .entry(name.to_string())
            .or_insert_with(|| DataContainer::new(name))
    }

    /// Remove a container, keeping the order of the rest.
    pub fn remove(&mut self, name: &str) -> Option<DataContainer> {
        self.containers.shift_remove(name)
    }

    /// Rename a container in place. Fails if the target name is taken.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), DataError> {
        if from == to {
            return if self.contains(from) {
                Ok(())
            } else {
                Err(DataError::ContainerNotFound(from.to_string()))
            };
        }
        if self.contains(to) {
            return Err(DataError::DuplicateContainer(to.to_string()));
        }
        let index = self
            .containers
            .get_index_of(from)
            .ok_or_else(|| DataError::ContainerNotFound(from.to_string()))?;
        let (_, mut dc) = self
            .containers
            .shift_remove_index(index)
            .ok_or_else(|| DataError::ContainerNotFound(from.to_string()))?;
        dc.set_name(to);
        self.containers.shift_insert(index, to.to_string(), dc);
        Ok(())
    }

    /// Remove every container.
    pub fn clear(&mut self) {
        self.containers.clear();
    }

    /// Resolve a path to an array.
    pub fn array(&self, path: &DataArrayPath) -> Option<&TypedArray> {
        self.get(&path.container)?.array(path.category, &path.array)
    }

    /// Resolve a path to an array for mutation.
    pub fn array_mut(&mut self, path: &DataArrayPath) -> Option<&mut TypedArray> {
        self.get_mut(&path.container)?
            .array_mut(path.category, &path.array)
    }

    /// Resolve a path, reporting which part is missing.
    pub fn try_array(&self, path: &DataArrayPath) -> Result<&TypedArray, DataError> {
        let dc = self
            .get(&path.container)
            .ok_or_else(|| DataError::ContainerNotFound(path.container.clone()))?;
        dc.array(path.category, &path.array)
            .ok_or_else(|| DataError::ArrayNotFound(path.clone()))
    }

    /// Copy of every container's geometry and array shapes, with all
    /// arrays emptied to zero-tuple placeholders. Preflight passes run
    /// against this so real contents are never touched.
    pub fn placeholder_copy(&self) -> Self {
        Self {
            containers: self
                .containers
                .iter()
                .map(|(name, dc)| (name.clone(), dc.placeholder_copy()))
                .collect(),
        }
    }

    /// Validate every container.
    pub fn validate(&self) -> Result<(), DataError> {
        self.containers.values().try_for_each(DataContainer::validate)
    }
}
