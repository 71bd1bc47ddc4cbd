//! ClickHouse type normalizer.
//!
//! | Logical | ClickHouse |
//! |---|---|
//! | `bool` | `Bool` |
//! | `int8`..`int64`, `uint8`..`uint64` | same width `IntN` / `UIntN` |
//! | `float32`, `float64` | `Float32`, `Float64` |
//! | `string`, `bytes` | `String` |
//! | `timestamp` | `DateTime64(6)` |
//! | `date` | `Date32` |
//! | `uuid` | `UUID` |
//! | `inet`, `mac`, `json`, extensions | `String` |
//! | `list<T>` | `Array(T')` |
//!
//! JSON is stored as its text serialization: ClickHouse cannot hold
//! arbitrarily nested documents such as `[{"x":{"y":"z"}}]` natively.
//! Structure survives only by re-parsing the text on read.

use tabsync_types::{LogicalType, TypeNormalizer};

/// Maps logical types to ClickHouse column types.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickHouseNormalizer;

impl ClickHouseNormalizer {
    /// Creates the normalizer.
    pub fn new() -> Self {
        Self
    }

    /// Returns true if ClickHouse can wrap the type in `Nullable(..)`.
    pub fn can_be_nullable(logical: &LogicalType) -> bool {
        !matches!(logical, LogicalType::List(_))
    }

    fn nullable(&self, logical: &LogicalType) -> String {
        let physical = self.physical_type(logical);
        if Self::can_be_nullable(logical) {
            format!("Nullable({physical})")
        } else {
            physical
        }
    }
}

impl TypeNormalizer for ClickHouseNormalizer {
    fn name(&self) -> &str {
        "clickhouse"
    }

    fn physical_type(&self, logical: &LogicalType) -> String {
        match logical {
            LogicalType::Bool => "Bool".into(),
            LogicalType::Int8 => "Int8".into(),
            LogicalType::Int16 => "Int16".into(),
            LogicalType::Int32 => "Int32".into(),
            LogicalType::Int64 => "Int64".into(),
            LogicalType::UInt8 => "UInt8".into(),
            LogicalType::UInt16 => "UInt16".into(),
            LogicalType::UInt32 => "UInt32".into(),
            LogicalType::UInt64 => "UInt64".into(),
            LogicalType::Float32 => "Float32".into(),
            LogicalType::Float64 => "Float64".into(),
            LogicalType::Timestamp => "DateTime64(6)".into(),
            LogicalType::Date => "Date32".into(),
            LogicalType::Uuid => "UUID".into(),
            LogicalType::List(element) => format!("Array({})", self.nullable(element)),
            // String, Bytes, Inet, Mac, Json and every extension type.
            _ => "String".into(),
        }
    }

    fn column_type(&self, logical: &LogicalType, primary_key: bool) -> String {
        if primary_key {
            self.physical_type(logical)
        } else {
            self.nullable(logical)
        }
    }
}
