//! Logical column types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The abstract kind of a column value, independent of any destination.
///
/// The set is closed except for [`LogicalType::Extension`], which carries
/// the name of a type the engine knows nothing about. Destinations map
/// unknown extensions to their most general textual type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    /// Boolean.
    Bool,
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
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// UTF-8 text.
    String,
    /// Opaque bytes.
    Bytes,
    /// Instant in microseconds since the Unix epoch.
    Timestamp,
    /// Calendar date in days since the Unix epoch.
    Date,
    /// 128-bit unique identifier.
    Uuid,
    /// IPv4 or IPv6 network address.
    Inet,
    /// 48-bit hardware (MAC) address.
    Mac,
    /// Arbitrary semi-structured document.
    Json,
    /// Homogeneous list of the element type.
    List(Box<LogicalType>),
    /// Named extension type.
    Extension(String),
}

impl LogicalType {
    /// Creates a list type of the given element type.
    pub fn list_of(element: LogicalType) -> Self {
        Self::List(Box::new(element))
    }

    /// Returns true for the signed and unsigned integer types.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::UInt8
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
        )
    }

    /// Returns true for types whose values carry nested structure.
    pub fn is_nested(&self) -> bool {
        matches!(self, Self::Json | Self::List(_))
    }

    /// Inclusive range of a signed integer type.
    pub(crate) fn signed_range(&self) -> Option<(i64, i64)> {
        match self {
            Self::Int8 => Some((i64::from(i8::MIN), i64::from(i8::MAX))),
            Self::Int16 => Some((i64::from(i16::MIN), i64::from(i16::MAX))),
            Self::Int32 => Some((i64::from(i32::MIN), i64::from(i32::MAX))),
            Self::Int64 | Self::Timestamp => Some((i64::MIN, i64::MAX)),
            Self::Date => Some((i64::from(i32::MIN), i64::from(i32::MAX))),
            _ => None,
        }
    }

    /// Upper bound of an unsigned integer type.
    pub(crate) fn unsigned_max(&self) -> Option<u64> {
        match self {
            Self::UInt8 => Some(u64::from(u8::MAX)),
            Self::UInt16 => Some(u64::from(u16::MAX)),
            Self::UInt32 => Some(u64::from(u32::MAX)),
            Self::UInt64 => Some(u64::MAX),
            _ => None,
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int8 => f.write_str("int8"),
            Self::Int16 => f.write_str("int16"),
            Self::Int32 => f.write_str("int32"),
            Self::Int64 => f.write_str("int64"),
            Self::UInt8 => f.write_str("uint8"),
            Self::UInt16 => f.write_str("uint16"),
            Self::UInt32 => f.write_str("uint32"),
            Self::UInt64 => f.write_str("uint64"),
            Self::Float32 => f.write_str("float32"),
            Self::Float64 => f.write_str("float64"),
            Self::String => f.write_str("string"),
            Self::Bytes => f.write_str("bytes"),
            Self::Timestamp => f.write_str("timestamp"),
            Self::Date => f.write_str("date"),
            Self::Uuid => f.write_str("uuid"),
            Self::Inet => f.write_str("inet"),
            Self::Mac => f.write_str("mac"),
            Self::Json => f.write_str("json"),
            Self::List(element) => write!(f, "list<{element}>"),
            Self::Extension(name) => write!(f, "ext:{name}"),
        }
    }
}
