//! Stage configuration schema.
//!
//! A stage describes its configuration as a list of [`ParameterDef`]s, each
//! a tagged [`ParameterValue`] default plus a [`ParameterCategory`]. The
//! same value type carries persisted settings.

use std::fmt;
use std::path::PathBuf;

use grainflow_core::{DataArrayPath, ElementType};
use serde::{Deserialize, Serialize};

/// Role of a parameter in the data flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterCategory {
    /// Plain configuration value.
    Parameter,
    /// Path of an array the stage reads.
    RequiredArray,
    /// Path or name of an array the stage creates.
    CreatedArray,
}

/// A typed configuration value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParameterValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating-point scalar.
    Float(f64),
    /// Three floats, e.g. spacing or origin.
    FloatVec3([f32; 3]),
    /// Three integers, e.g. grid dimensions.
    IntVec3([i64; 3]),
    /// Free text, e.g. a container or array name.
    Text(String),
    /// Filesystem path.
    Path(PathBuf),
    /// Address of an array.
    ArrayPath(DataArrayPath),
    /// Element type selector.
    ElementType(ElementType),
}

impl ParameterValue {
    /// Name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::FloatVec3(_) => "float_vec3",
            Self::IntVec3(_) => "int_vec3",
            Self::Text(_) => "text",
            Self::Path(_) => "path",
            Self::ArrayPath(_) => "array_path",
            Self::ElementType(_) => "element_type",
        }
    }

    /// The boolean, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The integer, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The float, if this is a `Float` or an `Int`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// The vector, if this is a `FloatVec3`.
    pub fn as_float_vec3(&self) -> Option<[f32; 3]> {
        match self {
            Self::FloatVec3(v) => Some(*v),
            _ => None,
        }
    }

    /// The vector, if this is an `IntVec3`.
    pub fn as_int_vec3(&self) -> Option<[i64; 3]> {
        match self {
            Self::IntVec3(v) => Some(*v),
            _ => None,
        }
    }

    /// The text, if this is `Text`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// The path, if this is a `Path`.
    pub fn as_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Path(v) => Some(v),
            _ => None,
        }
    }

    /// The array path, if this is an `ArrayPath`.
    pub fn as_array_path(&self) -> Option<&DataArrayPath> {
        match self {
            Self::ArrayPath(v) => Some(v),
            _ => None,
        }
    }

    /// The element type, if this is an `ElementType`.
    pub fn as_element_type(&self) -> Option<ElementType> {
        match self {
            Self::ElementType(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::FloatVec3([x, y, z]) => write!(f, "({x}, {y}, {z})"),
            Self::IntVec3([x, y, z]) => write!(f, "({x}, {y}, {z})"),
            Self::Text(v) => f.write_str(v),
            Self::Path(v) => write!(f, "{}", v.display()),
            Self::ArrayPath(v) => write!(f, "{v}"),
            Self::ElementType(v) => write!(f, "{v}"),
        }
    }
}

/// One entry of a stage's configuration schema.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterDef {
    /// Settings key, e.g. `"ScaleFactor"`.
    pub property: String,
    /// Human-readable label.
    pub label: String,
    /// Role in the data flow.
    pub category: ParameterCategory,
    /// Default value; also fixes the value type.
    pub default: ParameterValue,
}

impl ParameterDef {
    /// A plain configuration parameter.
    pub fn parameter(
        property: impl Into<String>,
        label: impl Into<String>,
        default: ParameterValue,
    ) -> Self {
        Self::new(property, label, ParameterCategory::Parameter, default)
    }

    /// A required input array.
    pub fn required_array(
        property: impl Into<String>,
        label: impl Into<String>,
        default: DataArrayPath,
    ) -> Self {
        Self::new(
            property,
            label,
            ParameterCategory::RequiredArray,
            ParameterValue::ArrayPath(default),
        )
    }

    /// A created output array.
    pub fn created_array(
        property: impl Into<String>,
        label: impl Into<String>,
        default: DataArrayPath,
    ) -> Self {
        Self::new(
            property,
            label,
            ParameterCategory::CreatedArray,
            ParameterValue::ArrayPath(default),
        )
    }

    fn new(
        property: impl Into<String>,
        label: impl Into<String>,
        category: ParameterCategory,
        default: ParameterValue,
    ) -> Self {
        Self {
            property: property.into(),
            label: label.into(),
            category,
            default,
        }
    }
}
