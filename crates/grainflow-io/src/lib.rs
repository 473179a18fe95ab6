//! Container files for grainflow data.
//!
//! Saves a [`DataContainerArray`](grainflow_core::DataContainerArray) to a
//! hierarchical binary file and loads it back, with an optional XDMF
//! companion describing the grids for visualization tools.
//!
//! # Architecture
//!
//! - [`ContainerFileWriter`] streams groups, attributes and datasets to any
//!   `Write` sink; groups close through an RAII [`GroupGuard`]
//! - [`ContainerFileReader`] rebuilds the [`Group`] tree from any `Read`
//!   source
//! - [`layout`] maps containers onto groups and back
//! - [`XdmfWriter`] emits the companion grid description
//! - [`DataContainerWriter`] and [`DataContainerReader`] are pipeline stages
//!
//! # Format
//!
//! ```text
//! [MAGIC "GFDC"] [VERSION u8]
//! [OPEN_GROUP name] [ATTRIBUTE name value]* [DATASET name array]* ... [CLOSE_GROUP]
//! ...
//! [END]
//! ```
//!
//! All integers are little-endian; strings are `u32`-length-prefixed UTF-8.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod layout;
pub mod reader;
pub mod stages;
pub mod tree;
pub mod writer;
pub mod xdmf;

pub use error::{ContainerFileError, WriteError, WriteStep};
pub use layout::{read_file, write_file, xdmf_path};
pub use reader::ContainerFileReader;
pub use stages::{register_stages, DataContainerReader, DataContainerWriter};
pub use tree::{AttributeValue, Group};
pub use writer::{ContainerFileWriter, GroupGuard};
pub use xdmf::XdmfWriter;

/// Magic bytes at the start of every container file.
pub const MAGIC: [u8; 4] = *b"GFDC";

/// Current binary format version.
pub const FORMAT_VERSION: u8 = 1;

/// Conventional extension for container files.
pub const FILE_EXTENSION: &str = "gfdc";
