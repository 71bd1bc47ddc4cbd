//! Typed column values.

use crate::error::{TypeError, TypeResult};
use crate::logical::LogicalType;
use std::fmt;
use std::net::IpAddr;
use uuid::Uuid;

/// A typed column value.
///
/// Absence is not a value: resolvers return `Option<Value>` and `None`
/// means the column is absent for that row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point number.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Microseconds since the Unix epoch.
    Timestamp(i64),
    /// Days since the Unix epoch.
    Date(i32),
    /// Unique identifier.
    Uuid(Uuid),
    /// Network address with prefix length.
    Inet {
        /// Address part.
        addr: IpAddr,
        /// Prefix length in bits.
        prefix: u8,
    },
    /// Hardware address.
    Mac([u8; 6]),
    /// Semi-structured document.
    Json(serde_json::Value),
    /// List of values of one logical type.
    List(Vec<Value>),
    /// Value of a named extension type, carried as text.
    Extension {
        /// Extension type name.
        name: String,
        /// Textual rendering of the value.
        text: String,
    },
}

impl Value {
    /// Creates an inet value for a single host address.
    pub fn host(addr: IpAddr) -> Self {
        let prefix = if addr.is_ipv4() { 32 } else { 128 };
        Value::Inet { addr, prefix }
    }

    /// Short name of the value kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::Date(_) => "date",
            Value::Uuid(_) => "uuid",
            Value::Inet { .. } => "inet",
            Value::Mac(_) => "mac",
            Value::Json(_) => "json",
            Value::List(_) => "list",
            Value::Extension { .. } => "extension",
        }
    }

    /// Returns true if this value can be stored in a column of `ty`.
    pub fn conforms_to(&self, ty: &LogicalType) -> bool {
        match (self, ty) {
            (Value::Bool(_), LogicalType::Bool) => true,
            (Value::Int(n), t) if t.is_integer() => match (t.signed_range(), t.unsigned_max()) {
                (Some((lo, hi)), _) => (lo..=hi).contains(n),
                (_, Some(max)) => u64::try_from(*n).is_ok_and(|u| u <= max),
                _ => false,
            },
            (Value::UInt(u), t) if t.is_integer() => match (t.signed_range(), t.unsigned_max()) {
                (Some((_, hi)), _) => i64::try_from(*u).is_ok_and(|n| n <= hi),
                (_, Some(max)) => *u <= max,
                _ => false,
            },
            (Value::Float(_), LogicalType::Float32 | LogicalType::Float64) => true,
            (Value::Text(_), LogicalType::String) => true,
            (Value::Bytes(_), LogicalType::Bytes) => true,
            (Value::Timestamp(_), LogicalType::Timestamp) => true,
            (Value::Date(_), LogicalType::Date) => true,
            (Value::Uuid(_), LogicalType::Uuid) => true,
            (Value::Inet { .. }, LogicalType::Inet) => true,
            (Value::Mac(_), LogicalType::Mac) => true,
            (Value::Json(_), LogicalType::Json) => true,
            (Value::List(items), LogicalType::List(element)) => {
                items.iter().all(|v| v.conforms_to(element))
            }
            (Value::Extension { name, .. }, LogicalType::Extension(ext)) => name == ext,
            _ => false,
        }
    }

    /// Converts a raw item field into a value of the given logical type.
    ///
    /// JSON `null` converts to `None` (column absent).
    pub fn from_json(raw: &serde_json::Value, ty: &LogicalType) -> TypeResult<Option<Value>> {
        use serde_json::Value as Json;

        if raw.is_null() {
            return Ok(None);
        }

        let value = match ty {
            LogicalType::Bool => match raw {
                Json::Bool(b) => Value::Bool(*b),
                Json::String(s) if s == "true" => Value::Bool(true),
                Json::String(s) if s == "false" => Value::Bool(false),
                other => return Err(TypeError::conversion(ty, describe(other))),
            },
            t if t.is_integer() => {
                let value = if let Some(n) = raw.as_i64() {
                    Value::Int(n)
                } else if let Some(u) = raw.as_u64() {
                    Value::UInt(u)
                } else {
                    return Err(TypeError::conversion(ty, describe(raw)));
                };
                if !value.conforms_to(ty) {
                    return Err(TypeError::out_of_range(ty, raw));
                }
                value
            }
            LogicalType::Float32 | LogicalType::Float64 => match raw.as_f64() {
                Some(f) => Value::Float(f),
                None => return Err(TypeError::conversion(ty, describe(raw))),
            },
            LogicalType::String => match raw {
                Json::String(s) => Value::Text(s.clone()),
                Json::Bool(_) | Json::Number(_) => Value::Text(raw.to_string()),
                other => return Err(TypeError::conversion(ty, describe(other))),
            },
            LogicalType::Bytes => match raw {
                Json::String(s) => Value::Bytes(s.as_bytes().to_vec()),
                Json::Array(elements) => {
                    let mut bytes = Vec::with_capacity(elements.len());
                    for element in elements {
                        let byte = element
                            .as_u64()
                            .and_then(|b| u8::try_from(b).ok())
                            .ok_or_else(|| TypeError::conversion(ty, describe(element)))?;
                        bytes.push(byte);
                    }
                    Value::Bytes(bytes)
                }
                other => return Err(TypeError::conversion(ty, describe(other))),
            },
            LogicalType::Timestamp => match raw.as_i64() {
                Some(micros) => Value::Timestamp(micros),
                None => return Err(TypeError::conversion(ty, describe(raw))),
            },
            LogicalType::Date => {
                let days = raw
                    .as_i64()
                    .ok_or_else(|| TypeError::conversion(ty, describe(raw)))?;
                let days = i32::try_from(days).map_err(|_| TypeError::out_of_range(ty, days))?;
                Value::Date(days)
            }
            LogicalType::Uuid => {
                let text = raw
                    .as_str()
                    .ok_or_else(|| TypeError::conversion(ty, describe(raw)))?;
                let id = Uuid::parse_str(text)
                    .map_err(|_| TypeError::conversion(ty, describe(raw)))?;
                Value::Uuid(id)
            }
            LogicalType::Inet => {
                let text = raw
                    .as_str()
                    .ok_or_else(|| TypeError::conversion(ty, describe(raw)))?;
                parse_inet(text).ok_or_else(|| TypeError::conversion(ty, describe(raw)))?
            }
            LogicalType::Mac => {
                let text = raw
                    .as_str()
                    .ok_or_else(|| TypeError::conversion(ty, describe(raw)))?;
                Value::Mac(parse_mac(text).ok_or_else(|| TypeError::conversion(ty, describe(raw)))?)
            }
            LogicalType::Json => Value::Json(raw.clone()),
            LogicalType::List(element) => {
                let elements = raw
                    .as_array()
                    .ok_or_else(|| TypeError::conversion(ty, describe(raw)))?;
                let mut values = Vec::with_capacity(elements.len());
                for element_raw in elements {
                    match Value::from_json(element_raw, element)? {
                        Some(v) => values.push(v),
                        None => return Err(TypeError::conversion(ty, "list with null element")),
                    }
                }
                Value::List(values)
            }
            LogicalType::Extension(name) => Value::Extension {
                name: name.clone(),
                text: match raw {
                    Json::String(s) => s.clone(),
                    other => other.to_string(),
                },
            },
            _ => return Err(TypeError::conversion(ty, describe(raw))),
        };

        Ok(Some(value))
    }

    /// Canonical textual form used for primary-key identity.
    ///
    /// Two values of the same logical type have equal keys exactly when they
    /// are equal.
    pub fn key_repr(&self) -> String {
        match self {
            Value::Bool(b) => format!("b:{b}"),
            Value::Int(n) => format!("i:{n}"),
            Value::UInt(u) => format!("u:{u}"),
            Value::Float(f) => format!("f:{:016x}", f.to_bits()),
            Value::Text(s) => format!("s:{s}"),
            Value::Bytes(b) => format!("x:{}", hex(b)),
            Value::Timestamp(t) => format!("t:{t}"),
            Value::Date(d) => format!("d:{d}"),
            Value::Uuid(id) => format!("g:{}", id.as_hyphenated()),
            Value::Inet { addr, prefix } => format!("n:{addr}/{prefix}"),
            Value::Mac(_) => format!("m:{self}"),
            Value::Json(doc) => format!("j:{doc}"),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::key_repr).collect();
                let encoded = serde_json::to_string(&parts).unwrap_or_default();
                format!("l:{encoded}")
            }
            Value::Extension { name, text } => format!("e:{name}:{text}"),
        }
    }

    /// Get this value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as a signed integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// Get this value as a UUID, if it is one.
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(id) => Some(*id),
            _ => None,
        }
    }

    /// Get this value as a JSON document, if it is one.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(doc) => Some(doc),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::UInt(u) => write!(f, "{u}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&hex(b)),
            Value::Timestamp(t) => write!(f, "{t}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::Uuid(id) => write!(f, "{}", id.as_hyphenated()),
            Value::Inet { addr, prefix } => write!(f, "{addr}/{prefix}"),
            Value::Mac(m) => write!(
                f,
                "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
                m[0], m[1], m[2], m[3], m[4], m[5]
            ),
            Value::Json(doc) => write!(f, "{doc}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Extension { text, .. } => f.write_str(text),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::UInt(u)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Uuid> for Value {
    fn from(id: Uuid) -> Self {
        Value::Uuid(id)
    }
}

impl From<serde_json::Value> for Value {
    fn from(doc: serde_json::Value) -> Self {
        Value::Json(doc)
    }
}

fn describe(raw: &serde_json::Value) -> String {
    match raw {
        serde_json::Value::Null => "null".into(),
        serde_json::Value::Bool(b) => format!("bool {b}"),
        serde_json::Value::Number(n) => format!("number {n}"),
        serde_json::Value::String(s) => format!("string {s:?}"),
        serde_json::Value::Array(a) => format!("array of {}", a.len()),
        serde_json::Value::Object(_) => "object".into(),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Parses `addr` or `addr/prefix`.
fn parse_inet(text: &str) -> Option<Value> {
    match text.split_once('/') {
        Some((addr, prefix)) => {
            let addr: IpAddr = addr.parse().ok()?;
            let prefix: u8 = prefix.parse().ok()?;
            let max = if addr.is_ipv4() { 32 } else { 128 };
            (prefix <= max).then_some(Value::Inet { addr, prefix })
        }
        None => text.parse().ok().map(Value::host),
    }
}

/// Parses six hex octets separated by `:` or `-`.
fn parse_mac(text: &str) -> Option<[u8; 6]> {
    let mut octets = [0u8; 6];
    let mut parts = text.split([':', '-']);
    for octet in &mut octets {
        let part = parts.next()?;
        if part.len() != 2 {
            return None;
        }
        *octet = u8::from_str_radix(part, 16).ok()?;
    }
    parts.next().is_none().then_some(octets)
}
