//! Container file reader.
//!
//! [`ContainerFileReader`] validates the header on construction and
//! decodes the record stream into a [`Group`] tree.

use std::io::Read;

use crate::codec::{
    decode_attribute_value, decode_dataset, decode_header, read_length_prefixed_str, read_u8,
    record,
};
use crate::error::ContainerFileError;
use crate::tree::Group;

/// Reads a container file from a byte stream.
///
/// Generic over `R: Read` so tests can use `&[u8]` and production code can
/// use `BufReader<File>`.
#[derive(Debug)]
pub struct ContainerFileReader<R: Read> {
    reader: R,
}

impl<R: Read> ContainerFileReader<R> {
    /// Open a stream, reading and validating the header.
    pub fn open(mut reader: R) -> Result<Self, ContainerFileError> {
        decode_header(&mut reader)?;
        Ok(Self { reader })
    }

    /// Decode the whole record stream. The returned root is named `"/"`.
    pub fn read_tree(mut self) -> Result<Group, ContainerFileError> {
        let r: &mut dyn Read = &mut self.reader;
        let mut stack = vec![Group::new("/")];
        loop {
            let tag = read_u8(r).map_err(|e| match e {
                ContainerFileError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                    ContainerFileError::malformed("stream ended without END record")
                }
                other => other,
            })?;
            match tag {
                record::OPEN_GROUP => {
                    let name = read_length_prefixed_str(r)?;
                    stack.push(Group::new(name));
                }
                record::ATTRIBUTE => {
                    let name = read_length_prefixed_str(r)?;
                    let value = decode_attribute_value(r)?;
                    top(&mut stack)?.attributes.insert(name, value);
                }
                record::DATASET => {
                    let array = decode_dataset(r)?;
                    top(&mut stack)?.datasets.push(array);
                }
                record::CLOSE_GROUP => {
                    if stack.len() == 1 {
                        return Err(ContainerFileError::malformed(
                            "CLOSE_GROUP without matching OPEN_GROUP",
                        ));
                    }
                    if let Some(done) = stack.pop() {
                        top(&mut stack)?.groups.push(done);
                    }
                }
                record::END => {
                    if stack.len() != 1 {
                        return Err(ContainerFileError::malformed(format!(
                            "{} group(s) still open at END",
                            stack.len() - 1
                        )));
                    }
                    return stack
                        .pop()
                        .ok_or_else(|| ContainerFileError::malformed("empty group stack"));
                }
                other => return Err(ContainerFileError::UnknownRecord { tag: other }),
            }
        }
    }
}

fn top(stack: &mut [Group]) -> Result<&mut Group, ContainerFileError> {
    stack
        .last_mut()
        .ok_or_else(|| ContainerFileError::malformed("empty group stack"))
}
