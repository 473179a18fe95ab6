//! Container file writer.
//!
//! [`ContainerFileWriter`] streams records to any `Write` sink. The header
//! is written on construction. Groups are opened through
//! [`GroupGuard`]s, which emit `CLOSE_GROUP` when dropped, so every group
//! is closed on every exit path, early `?` returns included.

use std::io::Write;

use grainflow_core::TypedArray;
use tracing::debug;

use crate::codec::{
    encode_attribute_value, encode_dataset, encode_header, record, write_length_prefixed_str,
    write_u8,
};
use crate::error::ContainerFileError;
use crate::tree::AttributeValue;

/// Writes a container file to a byte stream.
///
/// Generic over `W: Write` so tests can use `Vec<u8>` and production code
/// can use `BufWriter<File>`.
///
/// # Examples
///
/// ```
/// use grainflow_core::{ElementType, TypedArray};
/// use grainflow_io::{AttributeValue, ContainerFileReader, ContainerFileWriter};
///
/// let mut writer = ContainerFileWriter::new(Vec::new()).unwrap();
/// {
///     let mut group = writer.open_group("CellData").unwrap();
///     group.attribute("TupleCount", &AttributeValue::U64(4)).unwrap();
///     let phases = TypedArray::from_vec::<i32>("Phases", 1, vec![1, 1, 2, 2]).unwrap();
///     group.dataset(&phases).unwrap();
/// } // CellData closed here
/// let bytes = writer.finish().unwrap();
///
/// let root = ContainerFileReader::open(bytes.as_slice()).unwrap().read_tree().unwrap();
/// let cells = root.group("CellData").unwrap();
/// assert_eq!(cells.dataset("Phases").unwrap().tuples(), 4);
/// ```
#[derive(Debug)]
pub struct ContainerFileWriter<W: Write> {
    writer: W,
    groups_written: u64,
    datasets_written: u64,
}

impl<W: Write> ContainerFileWriter<W> {
    /// Create a writer, immediately writing the header.
    pub fn new(mut writer: W) -> Result<Self, ContainerFileError> {
        encode_header(&mut writer)?;
        Ok(Self {
            writer,
            groups_written: 0,
            datasets_written: 0,
        })
    }

    /// Open a top-level group.
    pub fn open_group(&mut self, name: &str) -> Result<GroupGuard<'_, W>, ContainerFileError> {
        GroupGuard::open(self, name)
    }

    /// Number of groups opened so far.
    pub fn groups_written(&self) -> u64 {
        self.groups_written
    }

    /// Number of datasets written so far.
    pub fn datasets_written(&self) -> u64 {
        self.datasets_written
    }

    /// Write the end marker, flush, and return the underlying sink.
    ///
    /// All guards borrow the writer, so no group can still be open here.
    pub fn finish(mut self) -> Result<W, ContainerFileError> {
        write_u8(&mut self.writer, record::END)?;
        self.writer.flush()?;
        debug!(
            groups = self.groups_written,
            datasets = self.datasets_written,
            "container file finished"
        );
        Ok(self.writer)
    }
}

/// An open group. Closes itself on drop.
///
/// Call [`close`](Self::close) to observe the close error; a close during
/// drop ignores it since the stream has already failed or been abandoned.
#[derive(Debug)]
pub struct GroupGuard<'a, W: Write> {
    file: &'a mut ContainerFileWriter<W>,
    closed: bool,
}

impl<'a, W: Write> GroupGuard<'a, W> {
    fn open(file: &'a mut ContainerFileWriter<W>, name: &str) -> Result<Self, ContainerFileError> {
        write_u8(&mut file.writer, record::OPEN_GROUP)?;
        write_length_prefixed_str(&mut file.writer, name)?;
        file.groups_written += 1;
        Ok(Self {
            file,
            closed: false,
        })
    }

    /// Open a child group. This group stays borrowed until the child closes.
    pub fn open_group(&mut self, name: &str) -> Result<GroupGuard<'_, W>, ContainerFileError> {
        GroupGuard::open(&mut *self.file, name)
    }

    /// Write a named attribute on this group.
    pub fn attribute(
        &mut self,
        name: &str,
        value: &AttributeValue,
    ) -> Result<(), ContainerFileError> {
        let w = &mut self.file.writer;
        write_u8(w, record::ATTRIBUTE)?;
        write_length_prefixed_str(w, name)?;
        encode_attribute_value(w, value)
    }

    /// Write an array as a dataset in this group.
    pub fn dataset(&mut self, array: &TypedArray) -> Result<(), ContainerFileError> {
        let w = &mut self.file.writer;
        write_u8(w, record::DATASET)?;
        encode_dataset(w, array)?;
        self.file.datasets_written += 1;
        debug!(
            array = array.name(),
            tuples = array.tuples(),
            "dataset written"
        );
        Ok(())
    }

    /// Close the group, reporting any write error.
    pub fn close(mut self) -> Result<(), ContainerFileError> {
        self.closed = true;
        write_u8(&mut self.file.writer, record::CLOSE_GROUP)
    }
}

impl<W: Write> Drop for GroupGuard<'_, W> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = write_u8(&mut self.file.writer, record::CLOSE_GROUP);
        }
    }
}
