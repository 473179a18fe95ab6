//! Element types and the [`Element`] trait linking Rust scalars to them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::array::ArrayStorage;

/// The fixed set of scalar element types a [`TypedArray`](crate::TypedArray)
/// may hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// IEEE-754 single precision.
    Float32,
    /// IEEE-754 double precision.
    Float64,
    /// Boolean, stored as one byte on disk.
    Bool,
}

impl ElementType {
    /// Every element type, in tag order.
    pub const ALL: [ElementType; 11] = [
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::UInt8,
        Self::UInt16,
        Self::UInt32,
        Self::UInt64,
        Self::Float32,
        Self::Float64,
        Self::Bool,
    ];

    /// Size of one element in bytes, as stored on disk.
    pub fn size_in_bytes(self) -> usize {
        match self {
            Self::Int8 | Self::UInt8 | Self::Bool => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    /// Stable lowercase name (`"int32"`, `"float64"`, ...).
    pub fn name(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Bool => "bool",
        }
    }

    /// One-byte tag used by the container file format.
    pub fn tag(self) -> u8 {
        match self {
            Self::Int8 => 0,
            Self::Int16 => 1,
            Self::Int32 => 2,
            Self::Int64 => 3,
            Self::UInt8 => 4,
            Self::UInt16 => 5,
            Self::UInt32 => 6,
            Self::UInt64 => 7,
            Self::Float32 => 8,
            Self::Float64 => 9,
            Self::Bool => 10,
        }
    }

    /// Inverse of [`tag`](Self::tag).
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    /// Whether this is a floating-point type.
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Whether this is a signed or unsigned integer type.
    pub fn is_integer(self) -> bool {
        !self.is_float() && self != Self::Bool
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("unknown element type '{s}'"))
    }
}

/// A Rust scalar that can be stored in a [`TypedArray`](crate::TypedArray).
///
/// Implemented for exactly the types named by [`ElementType`]. The
/// conversion helpers go through `f64` so that generic numeric stages
/// (calculators, statistics) can operate on any element type.
pub trait Element: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// The element type tag for `Self`.
    const TYPE: ElementType;

    /// Borrow the storage as `&[Self]` if it holds this element type.
    fn slice(storage: &ArrayStorage) -> Option<&[Self]>;

    /// Borrow the storage as `&mut [Self]` if it holds this element type.
    fn slice_mut(storage: &mut ArrayStorage) -> Option<&mut [Self]>;

    /// Wrap a vector of values as array storage.
    fn into_storage(values: Vec<Self>) -> ArrayStorage;

    /// Lossy widening to `f64`.
    fn to_f64(self) -> f64;

    /// Lossy narrowing from `f64` (saturating for integers).
    fn from_f64(v: f64) -> Self;
}

macro_rules! impl_numeric_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const TYPE: ElementType = ElementType::$variant;

                fn slice(storage: &ArrayStorage) -> Option<&[Self]> {
                    match storage {
                        ArrayStorage::$variant(v) => Some(v.as_slice()),
                        _ => None,
                    }
                }

                fn slice_mut(storage: &mut ArrayStorage) -> Option<&mut [Self]> {
                    match storage {
                        ArrayStorage::$variant(v) => Some(v.as_mut_slice()),
                        _ => None,
                    }
                }

                fn into_storage(values: Vec<Self>) -> ArrayStorage {
                    ArrayStorage::$variant(values)
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_f64(v: f64) -> Self {
                    v as $ty
                }
            }
        )*
    };
}

impl_numeric_element! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
}

impl Element for bool {
    const TYPE: ElementType = ElementType::Bool;

    fn slice(storage: &ArrayStorage) -> Option<&[Self]> {
        match storage {
            ArrayStorage::Bool(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    fn slice_mut(storage: &mut ArrayStorage) -> Option<&mut [Self]> {
        match storage {
            ArrayStorage::Bool(v) => Some(v.as_mut_slice()),
            _ => None,
        }
    }

    fn into_storage(values: Vec<Self>) -> ArrayStorage {
        ArrayStorage::Bool(values)
    }

    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }

    fn from_f64(v: f64) -> Self {
        v != 0.0
    }
}
