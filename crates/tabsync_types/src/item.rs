//! Provider items flowing through the engine.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Longest label produced by [`Item::label`].
const MAX_LABEL_LEN: usize = 96;

/// A raw or detailed item produced by a fetch collaborator.
///
/// Items are immutable and cheap to clone; a child table receives a clone of
/// its parent's item as fetch context.
#[derive(Debug, Clone, PartialEq)]
pub struct Item(Arc<serde_json::Value>);

impl Item {
    /// Wraps a JSON document.
    pub fn new(doc: serde_json::Value) -> Self {
        Self(Arc::new(doc))
    }

    /// Serializes a provider type into an item.
    pub fn from_serialize<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        serde_json::to_value(value).map(Self::new)
    }

    /// Returns the underlying document.
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    /// Returns the item as a string, for bare-identifier items.
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    /// Looks up a dotted path such as `ArchivalSummary.ArchivalReason` or
    /// `Replicas.0.RegionName`.
    ///
    /// An empty path returns the whole item.
    pub fn path(&self, path: &str) -> Option<&serde_json::Value> {
        if path.is_empty() {
            return Some(&self.0);
        }
        let mut current = self.0.as_ref();
        for segment in path.split('.') {
            current = match current {
                serde_json::Value::Object(map) => map.get(segment)?,
                serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Looks up a path and returns it as a string.
    pub fn str_at(&self, path: &str) -> Option<&str> {
        self.path(path).and_then(serde_json::Value::as_str)
    }

    /// Short human-readable identity used when attributing failures.
    pub fn label(&self) -> String {
        let mut label = match self.0.as_ref() {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if label.len() > MAX_LABEL_LEN {
            let mut end = MAX_LABEL_LEN;
            while !label.is_char_boundary(end) {
                end -= 1;
            }
            label.truncate(end);
            label.push('…');
        }
        label
    }
}

impl From<serde_json::Value> for Item {
    fn from(doc: serde_json::Value) -> Self {
        Self::new(doc)
    }
}

impl From<&str> for Item {
    fn from(s: &str) -> Self {
        Self::new(serde_json::Value::String(s.to_string()))
    }
}

impl From<String> for Item {
    fn from(s: String) -> Self {
        Self::new(serde_json::Value::String(s))
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
