//! Cell encoding.
//!
//! A [`Cell`] is a value in ClickHouse's representation. Types that
//! normalize to `String` are stored as their canonical text and parsed back
//! on read.

use crate::error::{ClickHouseError, ClickHouseResult};
use tabsync_types::{LogicalType, Value};
use uuid::Uuid;

/// A stored ClickHouse value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// `NULL`.
    Null,
    /// `Bool`.
    Bool(bool),
    /// Any signed integer width.
    Int(i64),
    /// Any unsigned integer width.
    UInt(u64),
    /// `Float32` or `Float64`.
    Float(f64),
    /// `String` holding UTF-8 text.
    String(String),
    /// `String` holding raw bytes.
    Binary(Vec<u8>),
    /// `UUID`.
    Uuid(Uuid),
    /// `DateTime64(6)`, microseconds since the epoch.
    DateTime64(i64),
    /// `Date32`, days since the epoch.
    Date32(i32),
    /// `Array(..)`.
    Array(Vec<Cell>),
}

impl Cell {
    /// Short kind name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Cell::Null => "Null",
            Cell::Bool(_) => "Bool",
            Cell::Int(_) => "Int",
            Cell::UInt(_) => "UInt",
            Cell::Float(_) => "Float",
            Cell::String(_) => "String",
            Cell::Binary(_) => "Binary",
            Cell::Uuid(_) => "UUID",
            Cell::DateTime64(_) => "DateTime64",
            Cell::Date32(_) => "Date32",
            Cell::Array(_) => "Array",
        }
    }

    /// Returns true for `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

/// Encodes a value, `None` being `NULL`.
pub fn to_cell(value: Option<&Value>) -> Cell {
    let Some(value) = value else {
        return Cell::Null;
    };
    match value {
        Value::Bool(b) => Cell::Bool(*b),
        Value::Int(n) => Cell::Int(*n),
        Value::UInt(u) => Cell::UInt(*u),
        Value::Float(f) => Cell::Float(*f),
        Value::Text(s) => Cell::String(s.clone()),
        Value::Bytes(b) => Cell::Binary(b.clone()),
        Value::Timestamp(t) => Cell::DateTime64(*t),
        Value::Date(d) => Cell::Date32(*d),
        Value::Uuid(id) => Cell::Uuid(*id),
        Value::Json(doc) => Cell::String(doc.to_string()),
        Value::List(items) => Cell::Array(items.iter().map(|v| to_cell(Some(v))).collect()),
        Value::Inet { .. } | Value::Mac(_) | Value::Extension { .. } => {
            Cell::String(value.to_string())
        }
    }
}

/// Decodes a stored cell as a value of `logical`.
pub fn from_cell(cell: &Cell, logical: &LogicalType) -> ClickHouseResult<Option<Value>> {
    let value = match (cell, logical) {
        (Cell::Null, _) => return Ok(None),
        (Cell::Bool(b), LogicalType::Bool) => Value::Bool(*b),
        (Cell::Int(n), t) if t.is_integer() => Value::Int(*n),
        (Cell::UInt(u), t) if t.is_integer() => Value::UInt(*u),
        (Cell::Float(f), LogicalType::Float32 | LogicalType::Float64) => Value::Float(*f),
        (Cell::String(s), LogicalType::String) => Value::Text(s.clone()),
        (Cell::Binary(b), LogicalType::Bytes) => Value::Bytes(b.clone()),
        (Cell::String(s), LogicalType::Bytes) => Value::Bytes(s.as_bytes().to_vec()),
        (Cell::DateTime64(t), LogicalType::Timestamp) => Value::Timestamp(*t),
        (Cell::Date32(d), LogicalType::Date) => Value::Date(*d),
        (Cell::Uuid(id), LogicalType::Uuid) => Value::Uuid(*id),
        (Cell::String(s), LogicalType::Json) => {
            let doc = serde_json::from_str(s).map_err(|e| ClickHouseError::parse(logical, s, e))?;
            Value::Json(doc)
        }
        (Cell::String(s), LogicalType::Inet | LogicalType::Mac | LogicalType::Extension(_)) => {
            let raw = serde_json::Value::String(s.clone());
            Value::from_json(&raw, logical)
                .map_err(|e| ClickHouseError::parse(logical, s, e))?
                .ok_or_else(|| ClickHouseError::parse(logical, s, "empty"))?
        }
        (Cell::Array(cells), LogicalType::List(element)) => {
            let mut values = Vec::with_capacity(cells.len());
            for cell in cells {
                match from_cell(cell, element)? {
                    Some(value) => values.push(value),
                    None => {
                        return Err(ClickHouseError::Decode {
                            expected: logical.clone(),
                            found: "Array with Null",
                        })
                    }
                }
            }
            Value::List(values)
        }
        (cell, _) => {
            return Err(ClickHouseError::Decode {
                expected: logical.clone(),
                found: cell.kind_name(),
            })
        }
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::net::{IpAddr, Ipv4Addr};

    fn round_trip(value: Value, logical: LogicalType) -> Value {
        from_cell(&to_cell(Some(&value)), &logical).unwrap().unwrap()
    }

    #[test]
    fn text_backed_types_round_trip() {
        let inet = Value::Inet {
            addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 0)),
            prefix: 8,
        };
        assert_eq!(round_trip(inet.clone(), LogicalType::Inet), inet);

        let mac = Value::Mac([0x00, 0x1b, 0x44, 0x11, 0x3a, 0xb7]);
        assert_eq!(to_cell(Some(&mac)), Cell::String("00:1b:44:11:3a:b7".into()));
        assert_eq!(round_trip(mac.clone(), LogicalType::Mac), mac);

        let ext = Value::Extension {
            name: "geo".into(),
            text: "POINT(1 2)".into(),
        };
        assert_eq!(round_trip(ext.clone(), LogicalType::Extension("geo".into())), ext);
    }

    #[test]
    fn json_is_stored_as_text() {
        let doc = json!([{"x": {"y": "z"}}]);
        let cell = to_cell(Some(&Value::Json(doc.clone())));
        assert!(matches!(cell, Cell::String(_)));
        assert_eq!(from_cell(&cell, &LogicalType::Json).unwrap(), Some(Value::Json(doc)));
    }

    #[test]
    fn lists_and_nulls() {
        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        let logical = LogicalType::list_of(LogicalType::Int32);
        assert_eq!(round_trip(list.clone(), logical.clone()), list);

        assert_eq!(to_cell(None), Cell::Null);
        assert_eq!(from_cell(&Cell::Null, &LogicalType::Uuid).unwrap(), None);

        let holey = Cell::Array(vec![Cell::Int(1), Cell::Null]);
        assert!(from_cell(&holey, &logical).is_err());
    }

    #[test]
    fn mismatched_cell() {
        let err = from_cell(&Cell::Bool(true), &LogicalType::Uuid).unwrap_err();
        assert_eq!(err.to_string(), "cannot decode Bool cell as uuid");

        let err = from_cell(&Cell::String("{".into()), &LogicalType::Json).unwrap_err();
        assert!(matches!(err, ClickHouseError::Parse { .. }));
    }
}
