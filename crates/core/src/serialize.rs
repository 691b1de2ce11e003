//! Serialization of dy values
//!
//! Two ways out of the object graph:
//!
//! - `impl serde::Serialize for Value`: the natural form (unit, bool,
//!   integer, float, string, sequence, map), so any serde format can emit a
//!   value graph directly. `serde_json::to_string(&value)` produces JSON.
//! - [`TypedValue`]: an owned mirror of the data variants that also
//!   implements `Deserialize`, for binary snapshots with bincode.
//!
//! Only data serializes. `Undefined`, userdata and exceptions are rejected,
//! and so is any list or dict that contains itself.
//!
//! # Why BTreeMap?
//!
//! `TypedValue::Dict` keeps entries in a `BTreeMap` so a given dict always
//! encodes to the same bytes, whatever its table order.

use crate::dict::Dict;
use crate::list::List;
use crate::string::Str;
use crate::value::Value;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Error during serialization/deserialization
#[derive(Debug)]
pub enum SerializeError {
    /// Undefined, Userdata and Exception values have no data form
    NotSerializable(&'static str),
    /// A list or dict contains itself
    Cycle,
    /// Bincode encoding/decoding error
    BincodeError(Box<bincode::Error>),
    /// Non-finite float (NaN or Infinity)
    NonFiniteFloat(f64),
}

impl std::fmt::Display for SerializeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializeError::NotSerializable(what) => {
                write!(f, "{} values cannot be serialized", what)
            }
            SerializeError::Cycle => write!(f, "Cannot serialize a container that contains itself"),
            SerializeError::BincodeError(e) => write!(f, "Bincode error: {}", e),
            SerializeError::NonFiniteFloat(v) => {
                write!(f, "Cannot serialize non-finite float: {}", v)
            }
        }
    }
}

impl std::error::Error for SerializeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SerializeError::BincodeError(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<bincode::Error> for SerializeError {
    fn from(e: bincode::Error) -> Self {
        SerializeError::BincodeError(Box::new(e))
    }
}

fn not_serializable(value: &Value) -> SerializeError {
    match value {
        Value::Undefined => SerializeError::NotSerializable("Undefined"),
        other => SerializeError::NotSerializable(other.type_name()),
    }
}

/// Containers on the path from the root to the value being serialized
struct Path(RefCell<Vec<*const ()>>);

/// Pops its container off the path when dropped
struct Visit<'p>(&'p Path);

impl Path {
    fn new() -> Self {
        Path(RefCell::new(Vec::new()))
    }

    fn enter(&self, addr: *const ()) -> Result<Visit<'_>, SerializeError> {
        let mut path = self.0.borrow_mut();
        if path.contains(&addr) {
            return Err(SerializeError::Cycle);
        }
        path.push(addr);
        Ok(Visit(self))
    }
}

impl Drop for Visit<'_> {
    fn drop(&mut self) {
        self.0.0.borrow_mut().pop();
    }
}

struct Tracked<'a> {
    value: &'a Value,
    path: &'a Path,
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let path = Path::new();
        Tracked { value: self, path: &path }.serialize(serializer)
    }
}

impl Serialize for Tracked<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let path = self.path;
        match self.value {
            Value::None => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => match s.to_str() {
                Some(text) => serializer.serialize_str(text),
                None => Err(S::Error::custom("string is not valid UTF-8")),
            },
            Value::List(list) => {
                let _visit = path.enter(list.addr()).map_err(S::Error::custom)?;
                let items = list.to_vec();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for value in &items {
                    seq.serialize_element(&Tracked { value, path })?;
                }
                seq.end()
            }
            Value::Dict(dict) => {
                let _visit = path.enter(dict.addr()).map_err(S::Error::custom)?;
                let entries = dict.entries();
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in &entries {
                    map.serialize_entry(&Tracked { value: key, path }, &Tracked { value, path })?;
                }
                map.end()
            }
            other => Err(S::Error::custom(not_serializable(other))),
        }
    }
}

/// Serializable dict keys; the hashable subset of [`TypedValue`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypedKey {
    Integer(i64),
    String(String),
    /// A string key that is not valid UTF-8
    Bytes(Vec<u8>),
}

impl TypedKey {
    fn from_key(s: &Str) -> Self {
        match s.to_str() {
            Some(text) => TypedKey::String(text.to_string()),
            None => TypedKey::Bytes(s.as_bytes().to_vec()),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            TypedKey::Integer(i) => Value::Integer(*i),
            TypedKey::String(s) => Value::interned(s.as_bytes()),
            TypedKey::Bytes(b) => Value::interned(b),
        }
    }
}

/// Owned, serializable representation of a value graph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TypedValue {
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// A string value that is not valid UTF-8
    Bytes(Vec<u8>),
    List(Vec<TypedValue>),
    /// Local entries only; parents are not captured
    Dict(BTreeMap<TypedKey, TypedValue>),
}

impl TypedValue {
    /// Convert from a runtime value.
    ///
    /// Fails on Undefined, Userdata, Exception, non-finite floats and cycles.
    pub fn from_value(value: &Value) -> Result<Self, SerializeError> {
        Self::convert(value, &Path::new())
    }

    fn convert(value: &Value, path: &Path) -> Result<Self, SerializeError> {
        match value {
            Value::None => Ok(TypedValue::None),
            Value::Bool(b) => Ok(TypedValue::Bool(*b)),
            Value::Integer(i) => Ok(TypedValue::Integer(*i)),
            Value::Float(f) => {
                if !f.is_finite() {
                    return Err(SerializeError::NonFiniteFloat(*f));
                }
                Ok(TypedValue::Float(*f))
            }
            Value::String(s) => Ok(match s.to_str() {
                Some(text) => TypedValue::String(text.to_string()),
                None => TypedValue::Bytes(s.as_bytes().to_vec()),
            }),
            Value::List(list) => {
                let _visit = path.enter(list.addr())?;
                let items = list.to_vec();
                let mut typed = Vec::with_capacity(items.len());
                for item in &items {
                    typed.push(Self::convert(item, path)?);
                }
                Ok(TypedValue::List(typed))
            }
            Value::Dict(dict) => {
                let _visit = path.enter(dict.addr())?;
                let mut typed = BTreeMap::new();
                for (key, value) in dict.entries() {
                    let key = match &key {
                        Value::Integer(i) => TypedKey::Integer(*i),
                        Value::String(s) => TypedKey::from_key(s),
                        // Dicts only ever hold hashable keys
                        _ => continue,
                    };
                    typed.insert(key, Self::convert(&value, path)?);
                }
                Ok(TypedValue::Dict(typed))
            }
            other => Err(not_serializable(other)),
        }
    }

    /// Build a fresh runtime value; dict keys are interned
    pub fn to_value(&self) -> Value {
        match self {
            TypedValue::None => Value::None,
            TypedValue::Bool(b) => Value::Bool(*b),
            TypedValue::Integer(i) => Value::Integer(*i),
            TypedValue::Float(f) => Value::Float(*f),
            TypedValue::String(s) => Value::from(s.as_str()),
            TypedValue::Bytes(b) => Value::string(b),
            TypedValue::List(items) => {
                Value::List(items.iter().map(TypedValue::to_value).collect::<List>())
            }
            TypedValue::Dict(entries) => {
                let dict = Dict::new();
                for (key, value) in entries {
                    match key {
                        TypedKey::Integer(i) => dict.set_int(*i, value.to_value()),
                        TypedKey::String(s) => dict.set_str(s, value.to_value()),
                        TypedKey::Bytes(b) => dict.set_string(Str::intern(b), value.to_value()),
                    }
                }
                Value::Dict(dict)
            }
        }
    }

    /// Serialize to binary format (bincode)
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        bincode::serialize(self).map_err(SerializeError::from)
    }

    /// Deserialize from binary format (bincode)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializeError> {
        bincode::deserialize(bytes).map_err(SerializeError::from)
    }
}

/// Serialization shortcuts on [`Value`]
pub trait ValueSerialize {
    fn to_typed(&self) -> Result<TypedValue, SerializeError>;

    fn to_bytes(&self) -> Result<Vec<u8>, SerializeError>;
}

impl ValueSerialize for Value {
    fn to_typed(&self) -> Result<TypedValue, SerializeError> {
        TypedValue::from_value(self)
    }

    fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        TypedValue::from_value(self)?.to_bytes()
    }
}

/// Decode a bincode snapshot straight into a runtime value
pub fn value_from_bytes(bytes: &[u8]) -> Result<Value, SerializeError> {
    Ok(TypedValue::from_bytes(bytes)?.to_value())
}
