//! Error types for container files.

use std::fmt;
use std::io;

use grainflow_core::{Category, DataError};
use grainflow_stage::codes;
use thiserror::Error;

/// Errors reading or writing a container file.
#[derive(Debug, Error)]
pub enum ContainerFileError {
    /// An I/O error occurred during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The file does not start with `b"GFDC"`.
    #[error("invalid magic bytes (expected b\"GFDC\")")]
    InvalidMagic,
    /// The format version is not supported by this build.
    #[error("unsupported format version {found}")]
    UnsupportedVersion {
        /// The version found in the file.
        found: u8,
    },
    /// The record stream is truncated, unbalanced or does not follow the
    /// container layout.
    #[error("malformed container file: {detail}")]
    Malformed {
        /// Human-readable description of what went wrong.
        detail: String,
    },
    /// A dataset carries an element type tag this build does not know.
    #[error("unknown element type tag {tag}")]
    UnknownElementTag {
        /// The unrecognized tag.
        tag: u8,
    },
    /// A record tag is not recognized.
    #[error("unknown record tag {tag:#04x}")]
    UnknownRecord {
        /// The unrecognized tag.
        tag: u8,
    },
    /// Decoded data violates a data-model invariant.
    #[error(transparent)]
    Data(#[from] DataError),
}

impl ContainerFileError {
    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed {
            detail: detail.into(),
        }
    }
}

/// The serializer step that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteStep {
    /// Opening the file, the container group or a category group.
    CreateGroup,
    /// Writing container geometry attributes.
    WriteMeta,
    /// Writing the arrays of one category.
    WriteCategory(Category),
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateGroup => f.write_str("creating group"),
            Self::WriteMeta => f.write_str("writing meta info"),
            Self::WriteCategory(category) => write!(f, "writing {category} arrays"),
        }
    }
}

/// A failed container write, tagged with the step and container it hit.
///
/// The file is left as far as it got; there is no rollback.
#[derive(Debug, Error)]
#[error("{step} for container '{container}' failed: {source}")]
pub struct WriteError {
    /// Step that failed.
    pub step: WriteStep,
    /// Container being written, empty if the failure preceded any container.
    pub container: String,
    /// Underlying failure.
    #[source]
    pub source: ContainerFileError,
}

impl WriteError {
    pub(crate) fn new(
        step: WriteStep,
        container: impl Into<String>,
        source: impl Into<ContainerFileError>,
    ) -> Self {
        Self {
            step,
            container: container.into(),
            source: source.into(),
        }
    }

    /// Reserved stage error code for this failure.
    pub fn code(&self) -> i32 {
        match self.step {
            WriteStep::CreateGroup => codes::CREATE_GROUP_FAILED,
            WriteStep::WriteMeta => codes::WRITE_META_FAILED,
            WriteStep::WriteCategory(_) => codes::CATEGORY_WRITE_FAILED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_step() {
        let io = || io::Error::other("disk full");
        assert_eq!(WriteError::new(WriteStep::CreateGroup, "v", io()).code(), -60);
        assert_eq!(WriteError::new(WriteStep::WriteMeta, "v", io()).code(), -62);
        assert_eq!(
            WriteError::new(WriteStep::WriteCategory(Category::Cell), "v", io()).code(),
            -63
        );
    }

    #[test]
    fn message_names_step_and_container() {
        let err = WriteError::new(
            WriteStep::WriteCategory(Category::CellFeature),
            "Volume",
            ContainerFileError::malformed("x"),
        );
        let text = err.to_string();
        assert!(text.contains("Volume"), "{text}");
        assert!(text.contains("writing"), "{text}");
    }
}
