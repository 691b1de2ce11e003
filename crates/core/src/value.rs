//! Value - the universal dynamic object
//!
//! A `Value` is a tagged union over a closed set of variants. Scalars
//! (`Undefined`, `None`, `Bool`, `Integer`, `Float`) are stored inline and
//! have no identity or lifetime of their own. Every other variant is a handle
//! to a reference-counted object:
//!
//! - retain is `Clone`
//! - release is `Drop` (or [`Value::release`] when that reads better)
//! - type-specific cleanup (un-interning strings, releasing container
//!   entries, running userdata destructors) lives in the `Drop` impls of the
//!   backing objects and therefore runs exactly once
//!
//! Containers take the values they store by value, so building a value and
//! handing it to a container never needs a separate reference-count step.
//!
//! `Value` is neither `Send` nor `Sync`: a value graph belongs to one thread.

use crate::dict::Dict;
use crate::error::{self, Exception, Result};
use crate::list::List;
use crate::string::{Hash, Str};
use crate::userdata::Userdata;
use std::fmt;

/// A dynamically typed value
#[derive(Clone)]
pub enum Value {
    /// "Absent": returned by lookups that found nothing; distinct from `None`
    Undefined,
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    /// Immutable byte string
    String(Str),
    /// Hash table keyed by hashable values, with optional parent
    Dict(Dict),
    /// Growable array
    List(List),
    /// Opaque native data, optionally callable
    Userdata(Userdata),
    /// A raised error, usable as a value
    Exception(Exception),
}

/// Type tag of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    None,
    Bool,
    Integer,
    Float,
    String,
    Dict,
    List,
    Userdata,
    Exception,
}

impl Type {
    /// Human-readable name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            Type::None => "None",
            Type::Bool => "Boolean",
            Type::Integer => "Integral",
            Type::Float => "Floating",
            Type::String => "String",
            Type::Dict => "Object",
            Type::List => "List",
            Type::Userdata => "Userdata",
            Type::Exception => "Exception",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type tag of `v`; `Undefined` reports `Type::None`
pub fn type_of(v: &Value) -> Type {
    v.type_of()
}

pub fn type_name(t: Type) -> &'static str {
    t.name()
}

/// Take another reference to `v`
pub fn retain(v: &Value) -> Value {
    v.clone()
}

/// Give up a reference to `v`
pub fn release(v: Value) {
    drop(v);
}

pub fn equals(a: &Value, b: &Value) -> bool {
    a.equals(b)
}

pub fn hash(v: &Value) -> Result<Hash> {
    v.hash()
}

pub fn length(v: &Value) -> Result<usize> {
    v.length()
}

impl Value {
    pub fn none() -> Value {
        Value::None
    }

    pub fn undefined() -> Value {
        Value::Undefined
    }

    /// A new (not interned) string value
    pub fn string(bytes: &[u8]) -> Value {
        Value::String(Str::new(bytes))
    }

    /// An interned string value
    pub fn interned(bytes: &[u8]) -> Value {
        Value::String(Str::intern(bytes))
    }

    pub fn new_list() -> Value {
        Value::List(List::new())
    }

    pub fn list_with_capacity(capacity: usize) -> Value {
        Value::List(List::with_capacity(capacity))
    }

    pub fn new_dict() -> Value {
        Value::Dict(Dict::new())
    }

    pub fn dict_with_parent(parent: Dict) -> Value {
        Value::Dict(Dict::with_parent(parent))
    }

    pub fn type_of(&self) -> Type {
        match self {
            Value::Undefined | Value::None => Type::None,
            Value::Bool(_) => Type::Bool,
            Value::Integer(_) => Type::Integer,
            Value::Float(_) => Type::Float,
            Value::String(_) => Type::String,
            Value::Dict(_) => Type::Dict,
            Value::List(_) => Type::List,
            Value::Userdata(_) => Type::Userdata,
            Value::Exception(_) => Type::Exception,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_of().name()
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Number of live handles to the backing object; `None` for scalars,
    /// which have no backing object.
    pub fn ref_count(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.ref_count()),
            Value::Dict(d) => Some(d.ref_count()),
            Value::List(l) => Some(l.ref_count()),
            Value::Userdata(u) => Some(u.ref_count()),
            Value::Exception(e) => Some(e.ref_count()),
            _ => None,
        }
    }

    /// Drop this handle
    pub fn release(self) {}

    /// Equality as used by dictionary keys.
    ///
    /// Scalars and strings compare by value; containers, userdata and
    /// exceptions compare by identity. Values of different types are never
    /// equal, so `Integer(1)` differs from `Float(1.0)`.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) => a.ptr_eq(b),
            (Value::Userdata(a), Value::Userdata(b)) => a.ptr_eq(b),
            (Value::Exception(a), Value::Exception(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Hash for use as a dictionary key; only strings and integers hash
    pub fn hash(&self) -> Result<Hash> {
        match self {
            Value::String(s) => Ok(s.hash()),
            Value::Integer(i) => Ok(*i),
            other => Err(Exception::new(
                error::UNHASHABLE_ERROR,
                format!("Cannot use unhashable type {} as object key.", other.type_name()),
            )),
        }
    }

    pub fn is_hashable(&self) -> bool {
        matches!(self, Value::String(_) | Value::Integer(_))
    }

    /// Element count of a list or byte length of a string
    pub fn length(&self) -> Result<usize> {
        match self {
            Value::List(l) => Ok(l.len()),
            Value::String(s) => Ok(s.len()),
            other => Err(Exception::argument(
                "length",
                0,
                "List or String",
                other.type_of(),
            )),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&Str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_userdata(&self) -> Option<&Userdata> {
        match self {
            Value::Userdata(u) => Some(u),
            _ => None,
        }
    }

    pub fn as_exception(&self) -> Option<&Exception> {
        match self {
            Value::Exception(e) => Some(e),
            _ => None,
        }
    }

    /// The integer payload, or an argument error
    pub fn integer(&self) -> Result<i64> {
        self.as_integer()
            .ok_or_else(|| Exception::argument("integer", 0, "Integral", self.type_of()))
    }

    /// The float payload; integers are widened
    pub fn float(&self) -> Result<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            Value::Integer(i) => Ok(*i as f64),
            other => Err(Exception::argument("float", 0, "Floating", other.type_of())),
        }
    }

    pub fn boolean(&self) -> Result<bool> {
        self.as_bool()
            .ok_or_else(|| Exception::argument("boolean", 0, "Boolean", self.type_of()))
    }
}

// Same relation as `equals`; not `Eq` because NaN != NaN
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.equals(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Str::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Str::from(s))
    }
}

impl From<Str> for Value {
    fn from(s: Str) -> Self {
        Value::String(s)
    }
}

impl From<Dict> for Value {
    fn from(d: Dict) -> Self {
        Value::Dict(d)
    }
}

impl From<List> for Value {
    fn from(l: List) -> Self {
        Value::List(l)
    }
}

impl From<Userdata> for Value {
    fn from(u: Userdata) -> Self {
        Value::Userdata(u)
    }
}

impl From<Exception> for Value {
    fn from(e: Exception) -> Self {
        Value::Exception(e)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::None
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::None.type_name(), "None");
        assert_eq!(Value::Undefined.type_of(), Type::None);
        assert_eq!(Value::from(true).type_name(), "Boolean");
        assert_eq!(Value::from(3).type_name(), "Integral");
        assert_eq!(Value::from(1.5).type_name(), "Floating");
        assert_eq!(Value::from("s").type_name(), "String");
        assert_eq!(Value::new_dict().type_name(), "Object");
        assert_eq!(Value::new_list().type_name(), "List");
    }

    #[test]
    fn test_scalar_equality() {
        assert!(Value::from(1).equals(&Value::from(1)));
        assert!(!Value::from(1).equals(&Value::from(1.0)));
        assert!(Value::from(true).equals(&Value::from(true)));
        assert!(!Value::from(true).equals(&Value::from(false)));
        assert!(!Value::from(f64::NAN).equals(&Value::from(f64::NAN)));
        assert!(Value::None.equals(&Value::None));
        assert!(!Value::None.equals(&Value::Undefined));
    }

    #[test]
    fn test_container_identity() {
        let a = Value::new_list();
        let b = Value::new_list();
        assert!(!a.equals(&b));
        assert!(a.equals(&a.clone()));
    }

    #[test]
    fn test_string_equality_by_content() {
        assert!(Value::from("abc").equals(&Value::from(String::from("abc"))));
        assert!(!Value::from("abc").equals(&Value::from("abd")));
    }

    #[test]
    fn test_hash() {
        assert_eq!(Value::from(42).hash().unwrap(), 42);
        assert_eq!(
            Value::from("k").hash().unwrap(),
            Value::from("k").hash().unwrap()
        );
        let err = Value::from(1.5).hash().unwrap_err();
        assert!(err.matches(error::UNHASHABLE_ERROR));
        assert!(Value::new_list().hash().is_err());
    }

    #[test]
    fn test_length() {
        assert_eq!(Value::from("four").length().unwrap(), 4);
        let list = List::new();
        list.append(Value::from(1)).unwrap();
        assert_eq!(Value::from(list).length().unwrap(), 1);

        let err = Value::from(7).length().unwrap_err();
        assert_eq!(err.errid(), error::ARGUMENT_ERROR);
    }

    #[test]
    fn test_ref_count_retain_release() {
        let v = Value::new_list();
        assert_eq!(v.ref_count(), Some(1));
        let r1 = retain(&v);
        let r2 = retain(&v);
        assert_eq!(v.ref_count(), Some(3));
        release(r1);
        r2.release();
        assert_eq!(v.ref_count(), Some(1));
        assert_eq!(Value::from(5).ref_count(), None);
    }

    #[test]
    fn test_typed_accessors() {
        assert_eq!(Value::from(3).integer().unwrap(), 3);
        assert_eq!(Value::from(3).float().unwrap(), 3.0);
        assert!(Value::from("x").integer().is_err());
        assert!(Value::from(true).boolean().unwrap());
    }

    #[test]
    fn test_option_conversion() {
        let none: Option<i64> = None;
        assert!(Value::from(none).is_none());
        assert!(Value::from(Some(2)).equals(&Value::from(2)));
    }
}
