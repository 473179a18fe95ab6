//! Reserved stage error codes.
//!
//! Zero is success. Every failure is negative. Stage-specific codes should
//! stay clear of the values below.

/// A required data container does not exist.
pub const MISSING_CONTAINER: i32 = -999;
/// A required array does not exist.
pub const MISSING_ARRAY: i32 = -301;
/// A required array has the wrong element type.
pub const ARRAY_TYPE_MISMATCH: i32 = -302;
/// A required array has the wrong component count.
pub const ARRAY_COMPONENT_MISMATCH: i32 = -303;
/// Array or map tuple counts disagree.
pub const TUPLE_COUNT_MISMATCH: i32 = -304;
/// The ensemble map holds no tuples.
pub const EMPTY_ENSEMBLE: i32 = -305;
/// An input value lies outside the range its consumer accepts.
pub const VALUE_OUT_OF_RANGE: i32 = -306;
/// A parameter is malformed or empty.
pub const INVALID_PARAMETER: i32 = -11000;
/// A container the stage would create already exists.
pub const CONTAINER_EXISTS: i32 = -889;
/// No output file was configured.
pub const MISSING_OUTPUT_FILE: i32 = -150;
/// The configured input file does not exist.
pub const MISSING_INPUT_FILE: i32 = -151;
/// A group could not be created in the output file.
pub const CREATE_GROUP_FAILED: i32 = -60;
/// Container metadata could not be written.
pub const WRITE_META_FAILED: i32 = -62;
/// An array in a category could not be written.
pub const CATEGORY_WRITE_FAILED: i32 = -63;
/// The input file could not be read.
pub const READ_FAILED: i32 = -70;
/// Operand arrays cannot be combined.
pub const INVALID_EXPRESSION: i32 = -4005;
