//! # Values
//!
//! The three value kinds shared by properties, event parameters and
//! hash-array entries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size reported for an integer value (a C `int`)
pub const INT_SIZE: usize = std::mem::size_of::<i32>();

/// Discriminant of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Integer,
    Text,
    Blob,
}

impl ValueKind {
    /// Type tag used by the persisted hash-array layout
    pub fn tag(self) -> u8 {
        match self {
            ValueKind::Integer => 0x01,
            ValueKind::Text => 0x02,
            ValueKind::Blob => 0x03,
        }
    }

    /// Decode a persisted type tag
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(ValueKind::Integer),
            0x02 => Some(ValueKind::Text),
            0x03 => Some(ValueKind::Blob),
            _ => None,
        }
    }

    /// Short label used in property listings and renderings
    pub fn label(self) -> &'static str {
        match self {
            ValueKind::Integer => "Int",
            ValueKind::Text => "Str",
            ValueKind::Blob => "Blob",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A tagged value. The payload is always owned.
///
/// An empty `Blob` is a valid value and distinct from an absent key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Integer(i32),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::Text(_) => ValueKind::Text,
            Value::Blob(_) => ValueKind::Blob,
        }
    }

    /// Size of the value as reported to callers.
    ///
    /// Text sizes include a trailing terminator slot, so `"Value"` reports 6.
    pub fn size_of(&self) -> usize {
        match self {
            Value::Integer(_) => INT_SIZE,
            Value::Text(s) => s.len() + 1,
            Value::Blob(b) => b.len(),
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "int({v})"),
            Value::Text(s) => write!(f, "str({s:?})"),
            Value::Blob(b) => {
                f.write_str("blob(")?;
                for (i, byte) in b.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{byte:02x}")?;
                }
                f.write_str(")")
            }
        }
    }
}
