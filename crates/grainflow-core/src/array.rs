//! The atomic data unit: [`TypedArray`] and its [`ArrayStorage`].

use crate::element::{Element, ElementType};
use crate::error::DataError;

/// Contiguous element storage, one variant per [`ElementType`] plus the
/// variable-length neighbor list.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayStorage {
    /// `int8` elements.
    Int8(Vec<i8>),
    /// `int16` elements.
    Int16(Vec<i16>),
    /// `int32` elements.
    Int32(Vec<i32>),
    /// `int64` elements.
    Int64(Vec<i64>),
    /// `uint8` elements.
    UInt8(Vec<u8>),
    /// `uint16` elements.
    UInt16(Vec<u16>),
    /// `uint32` elements.
    UInt32(Vec<u32>),
    /// `uint64` elements.
    UInt64(Vec<u64>),
    /// `float32` elements.
    Float32(Vec<f32>),
    /// `float64` elements.
    Float64(Vec<f64>),
    /// `bool` elements.
    Bool(Vec<bool>),
    /// One variable-length `int32` list per tuple.
    NeighborList(Vec<Vec<i32>>),
}

/// Apply `$body` to whichever fixed-width vector the storage holds, or
/// `$nl_body` to the neighbor list.
macro_rules! match_storage {
    ($storage:expr, $v:ident => $body:expr, $nl:ident => $nl_body:expr) => {
        match $storage {
            ArrayStorage::Int8($v) => $body,
            ArrayStorage::Int16($v) => $body,
            ArrayStorage::Int32($v) => $body,
            ArrayStorage::Int64($v) => $body,
            ArrayStorage::UInt8($v) => $body,
            ArrayStorage::UInt16($v) => $body,
            ArrayStorage::UInt32($v) => $body,
            ArrayStorage::UInt64($v) => $body,
            ArrayStorage::Float32($v) => $body,
            ArrayStorage::Float64($v) => $body,
            ArrayStorage::Bool($v) => $body,
            ArrayStorage::NeighborList($nl) => $nl_body,
        }
    };
}

impl ArrayStorage {
    /// Zero-filled storage of `len` elements.
    pub fn zeros(element_type: ElementType, len: usize) -> Self {
        match element_type {
            ElementType::Int8 => Self::Int8(vec![0; len]),
            ElementType::Int16 => Self::Int16(vec![0; len]),
            ElementType::Int32 => Self::Int32(vec![0; len]),
            ElementType::Int64 => Self::Int64(vec![0; len]),
            ElementType::UInt8 => Self::UInt8(vec![0; len]),
            ElementType::UInt16 => Self::UInt16(vec![0; len]),
            ElementType::UInt32 => Self::UInt32(vec![0; len]),
            ElementType::UInt64 => Self::UInt64(vec![0; len]),
            ElementType::Float32 => Self::Float32(vec![0.0; len]),
            ElementType::Float64 => Self::Float64(vec![0.0; len]),
            ElementType::Bool => Self::Bool(vec![false; len]),
        }
    }

    /// The element type held. Neighbor lists report `Int32`.
    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Int8(_) => ElementType::Int8,
            Self::Int16(_) => ElementType::Int16,
            Self::Int32(_) | Self::NeighborList(_) => ElementType::Int32,
            Self::Int64(_) => ElementType::Int64,
            Self::UInt8(_) => ElementType::UInt8,
            Self::UInt16(_) => ElementType::UInt16,
            Self::UInt32(_) => ElementType::UInt32,
            Self::UInt64(_) => ElementType::UInt64,
            Self::Float32(_) => ElementType::Float32,
            Self::Float64(_) => ElementType::Float64,
            Self::Bool(_) => ElementType::Bool,
        }
    }

    /// Number of storage slots: elements for fixed-width data, lists for
    /// neighbor lists.
    pub fn len(&self) -> usize {
        match_storage!(self, v => v.len(), nl => nl.len())
    }

    /// Whether the storage holds no slots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn resize(&mut self, len: usize) {
        match_storage!(self, v => v.resize(len, Default::default()), nl => nl.resize(len, Vec::new()))
    }

    fn value_f64(&self, index: usize) -> Option<f64> {
        match_storage!(self, v => v.get(index).map(|x| x.to_f64()), _nl => None)
    }

    fn set_value_f64(&mut self, index: usize, value: f64) -> bool {
        match_storage!(
            self,
            v => match v.get_mut(index) {
                Some(slot) => {
                    *slot = Element::from_f64(value);
                    true
                }
                None => false,
            },
            _nl => false
        )
    }
}

/// A named, typed, resizable n-tuple array.
///
/// Fixed-width arrays hold `tuples * components` elements contiguously,
/// tuple-major. Neighbor lists hold one `Vec<i32>` per tuple and always
/// report one component.
///
/// # Examples
///
/// ```
/// use grainflow_core::{ElementType, TypedArray};
///
/// let mut quats = TypedArray::zeros("AvgQuats", ElementType::Float32, 4, 3).unwrap();
/// assert_eq!(quats.len(), 12);
///
/// quats.as_mut_slice::<f32>().unwrap()[4] = 1.0;
/// quats.resize_tuples(5);
/// assert_eq!(quats.len(), 20);
/// assert_eq!(quats.tuple::<f32>(1).unwrap(), &[1.0, 0.0, 0.0, 0.0]);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct TypedArray {
    name: String,
    components: usize,
    storage: ArrayStorage,
}

impl TypedArray {
    /// Zero-filled array of `tuples` tuples of width `components`.
    pub fn zeros(
        name: impl Into<String>,
        element_type: ElementType,
        components: usize,
        tuples: usize,
    ) -> Result<Self, DataError> {
        let name = name.into();
        if components == 0 {
            return Err(DataError::ZeroComponents { name });
        }
        Ok(Self {
            name,
            components,
            storage: ArrayStorage::zeros(element_type, tuples * components),
        })
    }

    /// Wrap existing tuple-major values.
    ///
    /// Fails if `values.len()` is not a multiple of `components`.
    pub fn from_vec<T: Element>(
        name: impl Into<String>,
        components: usize,
        values: Vec<T>,
    ) -> Result<Self, DataError> {
        Self::from_storage(name, components, T::into_storage(values))
    }

    /// Wrap pre-built storage, checking the length invariant.
    pub fn from_storage(
        name: impl Into<String>,
        components: usize,
        storage: ArrayStorage,
    ) -> Result<Self, DataError> {
        let name = name.into();
        if components == 0 {
            return Err(DataError::ZeroComponents { name });
        }
        let is_list = matches!(storage, ArrayStorage::NeighborList(_));
        if is_list && components != 1 {
            return Err(DataError::RaggedStorage {
                name,
                len: storage.len(),
                components,
            });
        }
        if storage.len() % components != 0 {
            return Err(DataError::RaggedStorage {
                name,
                len: storage.len(),
                components,
            });
        }
        Ok(Self {
            name,
            components,
            storage,
        })
    }

    /// A neighbor-list array with one list per tuple.
    pub fn neighbor_list(name: impl Into<String>, lists: Vec<Vec<i32>>) -> Self {
        Self {
            name: name.into(),
            components: 1,
            storage: ArrayStorage::NeighborList(lists),
        }
    }

    /// Array name, unique within its owning map.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the array. The owning map must be updated separately.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Element type of the stored values.
    pub fn element_type(&self) -> ElementType {
        self.storage.element_type()
    }

    /// Fixed tuple width.
    pub fn components(&self) -> usize {
        self.components
    }

    /// Number of tuples (rows).
    pub fn tuples(&self) -> usize {
        self.storage.len() / self.components
    }

    /// Storage length; always `tuples() * components()`.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Whether the array holds zero tuples.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Total serialized element count. Equal to [`len`](Self::len) for
    /// fixed-width arrays; the flattened size for neighbor lists.
    pub fn element_count(&self) -> usize {
        match &self.storage {
            ArrayStorage::NeighborList(lists) => lists.iter().map(Vec::len).sum(),
            other => other.len(),
        }
    }

    /// Whether this is a variable-length neighbor list.
    pub fn is_neighbor_list(&self) -> bool {
        matches!(self.storage, ArrayStorage::NeighborList(_))
    }

    /// Whether the array has the given element type and tuple width.
    pub fn has_shape(&self, element_type: ElementType, components: usize) -> bool {
        !self.is_neighbor_list()
            && self.element_type() == element_type
            && self.components == components
    }

    /// Resize to `tuples` tuples.
    ///
    /// The first `min(tuples, old)` tuples keep their values; new tuples
    /// are zero (or empty lists).
    pub fn resize_tuples(&mut self, tuples: usize) {
        self.storage.resize(tuples * self.components);
    }

    /// A zero-tuple array with the same name, element type and width.
    pub fn placeholder(&self) -> Self {
        let storage = match &self.storage {
            ArrayStorage::NeighborList(_) => ArrayStorage::NeighborList(Vec::new()),
            other => ArrayStorage::zeros(other.element_type(), 0),
        };
        Self {
            name: self.name.clone(),
            components: self.components,
            storage,
        }
    }

    /// Raw storage.
    pub fn storage(&self) -> &ArrayStorage {
        &self.storage
    }

    /// Typed view of all elements, or `None` on a type mismatch.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice(&self.storage)
    }

    /// Mutable typed view of all elements, or `None` on a type mismatch.
    pub fn as_mut_slice<T: Element>(&mut self) -> Option<&mut [T]> {
        T::slice_mut(&mut self.storage)
    }

    /// Typed view of one tuple.
    pub fn tuple<T: Element>(&self, index: usize) -> Option<&[T]> {
        let start = index.checked_mul(self.components)?;
        self.as_slice::<T>()?.get(start..start + self.components)
    }

    /// Mutable typed view of one tuple.
    pub fn tuple_mut<T: Element>(&mut self, index: usize) -> Option<&mut [T]> {
        let components = self.components;
        let start = index.checked_mul(components)?;
        self.as_mut_slice::<T>()?.get_mut(start..start + components)
    }

    /// Neighbor lists, if this is a neighbor-list array.
    pub fn neighbor_lists(&self) -> Option<&[Vec<i32>]> {
        match &self.storage {
            ArrayStorage::NeighborList(lists) => Some(lists),
            _ => None,
        }
    }

    /// Mutable neighbor lists, if this is a neighbor-list array.
    pub fn neighbor_lists_mut(&mut self) -> Option<&mut [Vec<i32>]> {
        match &mut self.storage {
            ArrayStorage::NeighborList(lists) => Some(lists),
            _ => None,
        }
    }

    /// Read element `index` widened to `f64`, regardless of element type.
    pub fn value_f64(&self, index: usize) -> Option<f64> {
        self.storage.value_f64(index)
    }

    /// Write element `index` from an `f64`. Returns `false` when out of
    /// range or called on a neighbor list.
    pub fn set_value_f64(&mut self, index: usize, value: f64) -> bool {
        self.storage.set_value_f64(index, value)
    }

    /// Set every element to `value` (converted to the element type).
    pub fn fill_f64(&mut self, value: f64) {
        for i in 0..self.storage.len() {
            self.storage.set_value_f64(i, value);
        }
    }
}
