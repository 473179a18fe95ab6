//! Binary encode/decode for the container format.
//!
//! All integers are little-endian. Strings are length-prefixed with a `u32`
//! length. Element payloads are raw little-endian values, one byte per
//! `bool`. Length fields are never trusted for allocation: payloads are
//! read through `Read::take`, so a truncated or corrupt file fails with
//! [`ContainerFileError::Malformed`] instead of exhausting memory.

use std::io::{Read, Write};

use grainflow_core::{ArrayStorage, ElementType, TypedArray};

use crate::error::ContainerFileError;
use crate::tree::AttributeValue;
use crate::{FORMAT_VERSION, MAGIC};

/// Record tags.
pub mod record {
    /// Start of a group; followed by its name.
    pub const OPEN_GROUP: u8 = 0x01;
    /// A named attribute on the innermost open group.
    pub const ATTRIBUTE: u8 = 0x02;
    /// A named dataset in the innermost open group.
    pub const DATASET: u8 = 0x03;
    /// End of the innermost open group.
    pub const CLOSE_GROUP: u8 = 0x04;
    /// End of the file.
    pub const END: u8 = 0xFF;
}

const ATTR_TEXT: u8 = 1;
const ATTR_I64S: u8 = 2;
const ATTR_F32S: u8 = 3;
const ATTR_U64: u8 = 4;

const KIND_FIXED: u8 = 0;
const KIND_NEIGHBOR_LIST: u8 = 1;

macro_rules! decode_le {
    ($bytes:expr, $ty:ty) => {
        $bytes
            .chunks_exact(std::mem::size_of::<$ty>())
            .map(|chunk| {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(chunk);
                <$ty>::from_le_bytes(buf)
            })
            .collect::<Vec<$ty>>()
    };
}

// ── Primitive writers ───────────────────────────────────────────

/// Write a single byte.
pub fn write_u8(w: &mut dyn Write, v: u8) -> Result<(), ContainerFileError> {
    w.write_all(&[v])?;
    Ok(())
}

/// Write a little-endian u32.
pub fn write_u32_le(w: &mut dyn Write, v: u32) -> Result<(), ContainerFileError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64.
pub fn write_u64_le(w: &mut dyn Write, v: u64) -> Result<(), ContainerFileError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

/// Write a `usize` as a little-endian u32, failing if it does not fit.
pub fn write_len_u32(w: &mut dyn Write, len: usize) -> Result<(), ContainerFileError> {
    let v = u32::try_from(len)
        .map_err(|_| ContainerFileError::malformed(format!("length {len} exceeds u32")))?;
    write_u32_le(w, v)
}

/// Write a length-prefixed UTF-8 string (u32 length + bytes).
pub fn write_length_prefixed_str(w: &mut dyn Write, s: &str) -> Result<(), ContainerFileError> {
    write_len_u32(w, s.len())?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

// ── Primitive readers ───────────────────────────────────────────

/// Read a single byte.
pub fn read_u8(r: &mut dyn Read) -> Result<u8, ContainerFileError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a little-endian u32.
pub fn read_u32_le(r: &mut dyn Read) -> Result<u32, ContainerFileError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a little-endian u64.
pub fn read_u64_le(r: &mut dyn Read) -> Result<u64, ContainerFileError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read exactly `len` bytes without pre-allocating `len`.
pub fn read_bytes(r: &mut dyn Read, len: u64) -> Result<Vec<u8>, ContainerFileError> {
    let mut buf = Vec::new();
    r.take(len).read_to_end(&mut buf)?;
    if buf.len() as u64 != len {
        return Err(ContainerFileError::malformed(format!(
            "truncated payload: expected {len} bytes, found {}",
            buf.len()
        )));
    }
    Ok(buf)
}

/// Read a length-prefixed UTF-8 string.
pub fn read_length_prefixed_str(r: &mut dyn Read) -> Result<String, ContainerFileError> {
    let len = read_u32_le(r)?;
    let buf = read_bytes(r, u64::from(len))?;
    String::from_utf8(buf)
        .map_err(|e| ContainerFileError::malformed(format!("invalid UTF-8 string: {e}")))
}

// ── Header ──────────────────────────────────────────────────────

/// Write magic bytes and format version.
pub fn encode_header(w: &mut dyn Write) -> Result<(), ContainerFileError> {
    w.write_all(&MAGIC)?;
    write_u8(w, FORMAT_VERSION)
}

/// Read and validate magic bytes and format version.
pub fn decode_header(r: &mut dyn Read) -> Result<(), ContainerFileError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(ContainerFileError::InvalidMagic);
    }
    let version = read_u8(r)?;
    if version != FORMAT_VERSION {
        return Err(ContainerFileError::UnsupportedVersion { found: version });
    }
    Ok(())
}

// ── Attributes ──────────────────────────────────────────────────

/// Encode a tagged attribute value.
pub fn encode_attribute_value(
    w: &mut dyn Write,
    value: &AttributeValue,
) -> Result<(), ContainerFileError> {
    match value {
        AttributeValue::Text(s) => {
            write_u8(w, ATTR_TEXT)?;
            write_length_prefixed_str(w, s)
        }
        AttributeValue::I64s(values) => {
            write_u8(w, ATTR_I64S)?;
            write_len_u32(w, values.len())?;
            for v in values {
                w.write_all(&v.to_le_bytes())?;
            }
            Ok(())
        }
        AttributeValue::F32s(values) => {
            write_u8(w, ATTR_F32S)?;
            write_len_u32(w, values.len())?;
            for v in values {
                w.write_all(&v.to_le_bytes())?;
            }
            Ok(())
        }
        AttributeValue::U64(v) => {
            write_u8(w, ATTR_U64)?;
            write_u64_le(w, *v)
        }
    }
}

/// Decode a tagged attribute value.
pub fn decode_attribute_value(r: &mut dyn Read) -> Result<AttributeValue, ContainerFileError> {
    let tag = read_u8(r)?;
    match tag {
        ATTR_TEXT => Ok(AttributeValue::Text(read_length_prefixed_str(r)?)),
        ATTR_I64S => {
            let count = read_u32_le(r)?;
            let bytes = read_bytes(r, u64::from(count) * 8)?;
            Ok(AttributeValue::I64s(decode_le!(bytes, i64)))
        }
        ATTR_F32S => {
            let count = read_u32_le(r)?;
            let bytes = read_bytes(r, u64::from(count) * 4)?;
            Ok(AttributeValue::F32s(decode_le!(bytes, f32)))
        }
        ATTR_U64 => Ok(AttributeValue::U64(read_u64_le(r)?)),
        other => Err(ContainerFileError::malformed(format!(
            "unknown attribute value tag {other}"
        ))),
    }
}

// ── Datasets ────────────────────────────────────────────────────

fn write_le_values(w: &mut dyn Write, storage: &ArrayStorage) -> Result<(), ContainerFileError> {
    macro_rules! put {
        ($values:expr) => {
            for v in $values {
                w.write_all(&v.to_le_bytes())?;
            }
        };
    }
    match storage {
        ArrayStorage::Int8(v) => put!(v),
        ArrayStorage::Int16(v) => put!(v),
        ArrayStorage::Int32(v) => put!(v),
        ArrayStorage::Int64(v) => put!(v),
        ArrayStorage::UInt8(v) => w.write_all(v)?,
        ArrayStorage::UInt16(v) => put!(v),
        ArrayStorage::UInt32(v) => put!(v),
        ArrayStorage::UInt64(v) => put!(v),
        ArrayStorage::Float32(v) => put!(v),
        ArrayStorage::Float64(v) => put!(v),
        ArrayStorage::Bool(v) => {
            let bytes: Vec<u8> = v.iter().map(|&b| u8::from(b)).collect();
            w.write_all(&bytes)?;
        }
        ArrayStorage::NeighborList(_) => {
            return Err(ContainerFileError::malformed(
                "neighbor list passed as fixed-width payload",
            ))
        }
    }
    Ok(())
}

fn storage_from_le(element_type: ElementType, bytes: &[u8]) -> ArrayStorage {
    match element_type {
        ElementType::Int8 => ArrayStorage::Int8(decode_le!(bytes, i8)),
        ElementType::Int16 => ArrayStorage::Int16(decode_le!(bytes, i16)),
        ElementType::Int32 => ArrayStorage::Int32(decode_le!(bytes, i32)),
        ElementType::Int64 => ArrayStorage::Int64(decode_le!(bytes, i64)),
        ElementType::UInt8 => ArrayStorage::UInt8(bytes.to_vec()),
        ElementType::UInt16 => ArrayStorage::UInt16(decode_le!(bytes, u16)),
        ElementType::UInt32 => ArrayStorage::UInt32(decode_le!(bytes, u32)),
        ElementType::UInt64 => ArrayStorage::UInt64(decode_le!(bytes, u64)),
        ElementType::Float32 => ArrayStorage::Float32(decode_le!(bytes, f32)),
        ElementType::Float64 => ArrayStorage::Float64(decode_le!(bytes, f64)),
        ElementType::Bool => ArrayStorage::Bool(bytes.iter().map(|&b| b != 0).collect()),
    }
}

/// Encode an array as a dataset body (without the record tag).
///
/// Layout: name, element tag, components (u32), tuples (u64), kind, then
/// either `byte_len u64 + values` or, for neighbor lists, one `u32` length
/// per tuple followed by `value_count u64 + i32 values`.
pub fn encode_dataset(w: &mut dyn Write, array: &TypedArray) -> Result<(), ContainerFileError> {
    write_length_prefixed_str(w, array.name())?;
    write_u8(w, array.element_type().tag())?;
    write_len_u32(w, array.components())?;
    write_u64_le(w, array.tuples() as u64)?;
    match array.neighbor_lists() {
        Some(lists) => {
            write_u8(w, KIND_NEIGHBOR_LIST)?;
            for list in lists {
                write_len_u32(w, list.len())?;
            }
            write_u64_le(w, array.element_count() as u64)?;
            for list in lists {
                for v in list {
                    w.write_all(&v.to_le_bytes())?;
                }
            }
        }
        None => {
            write_u8(w, KIND_FIXED)?;
            let byte_len = array.len() * array.element_type().size_in_bytes();
            write_u64_le(w, byte_len as u64)?;
            write_le_values(w, array.storage())?;
        }
    }
    Ok(())
}

/// Decode a dataset body written by [`encode_dataset`].
pub fn decode_dataset(r: &mut dyn Read) -> Result<TypedArray, ContainerFileError> {
    let name = read_length_prefixed_str(r)?;
    let tag = read_u8(r)?;
    let element_type =
        ElementType::from_tag(tag).ok_or(ContainerFileError::UnknownElementTag { tag })?;
    let components = read_u32_le(r)? as usize;
    let tuples = read_u64_le(r)?;
    let kind = read_u8(r)?;
    match kind {
        KIND_FIXED => {
            let byte_len = read_u64_le(r)?;
            let expected = tuples
                .checked_mul(components as u64)
                .and_then(|n| n.checked_mul(element_type.size_in_bytes() as u64));
            if expected != Some(byte_len) {
                return Err(ContainerFileError::malformed(format!(
                    "dataset '{name}': {byte_len} bytes do not hold {tuples} tuples of \
                     {components} x {element_type}"
                )));
            }
            let bytes = read_bytes(r, byte_len)?;
            let storage = storage_from_le(element_type, &bytes);
            Ok(TypedArray::from_storage(name, components, storage)?)
        }
        KIND_NEIGHBOR_LIST => {
            if element_type != ElementType::Int32 || components != 1 {
                return Err(ContainerFileError::malformed(format!(
                    "neighbor list '{name}' must be int32 with one component"
                )));
            }
            let mut lengths = Vec::new();
            for _ in 0..tuples {
                lengths.push(read_u32_le(r)? as usize);
            }
            let value_count = read_u64_le(r)?;
            let total: u64 = lengths.iter().map(|&n| n as u64).sum();
            if total != value_count {
                return Err(ContainerFileError::malformed(format!(
                    "neighbor list '{name}': lengths sum to {total}, header says {value_count}"
                )));
            }
            let bytes = read_bytes(r, value_count.saturating_mul(4))?;
            let mut values = decode_le!(bytes, i32).into_iter();
            let lists = lengths
                .iter()
                .map(|&n| values.by_ref().take(n).collect())
                .collect();
            Ok(TypedArray::neighbor_list(name, lists))
        }
        other => Err(ContainerFileError::malformed(format!(
            "dataset '{name}' has unknown kind {other}"
        ))),
    }
}
