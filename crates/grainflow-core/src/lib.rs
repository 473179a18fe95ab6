//! Core data model for grainflow pipelines.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! self-describing columnar model every stage reads and writes:
//!
//! - [`TypedArray`] : a named, typed, resizable n-tuple array
//! - [`AttributeArrayMap`] : a category-scoped, ordered name → array map
//! - [`DataContainer`] : six attribute maps plus grid geometry
//! - [`DataContainerArray`] : the run-scoped collection of containers
//!
//! Arrays are owned by exactly one map. Stages receive borrowed access for
//! the duration of a single `preflight`/`execute` call and address arrays
//! between calls through a [`DataArrayPath`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod array;
pub mod attribute_map;
pub mod container;
pub mod container_array;
pub mod element;
pub mod error;
pub mod path;

pub use array::{ArrayStorage, TypedArray};
pub use attribute_map::AttributeArrayMap;
pub use container::{DataContainer, Geometry};
pub use container_array::DataContainerArray;
pub use element::{Element, ElementType};
pub use error::DataError;
pub use path::{Category, DataArrayPath};
