//! Subscription and calling
//!
//! The uniform `value[key]` protocol, dispatched on the receiver's type:
//!
//! | receiver | key                | result                          |
//! |----------|--------------------|---------------------------------|
//! | Dict     | any hashable value | entry (parent chain consulted)  |
//! | List     | Integer            | element, negative from the end  |
//! | String   | Integer            | one-byte string                 |
//!
//! Anything else is not subscriptable. `remove_item` is the explicit
//! counterpart of `set_item`; storing `None` or `Undefined` stores that value.

use crate::error::{self, Exception, Result};
use crate::list::List;
use crate::string::Str;
use crate::value::Value;

fn not_subscriptable(receiver: &Value) -> Exception {
    Exception::format(
        error::TYPE_ERROR,
        format_args!("{} object is not subscriptable", receiver.type_name()),
    )
}

fn list_index(key: &Value) -> Result<i64> {
    match key {
        Value::Integer(i) => Ok(*i),
        other => Err(Exception::format(
            error::TYPE_ERROR,
            format_args!(
                "Lists only support numerical indices, not {}",
                other.type_name()
            ),
        )),
    }
}

fn string_index(s: &Str, key: &Value) -> Result<Option<Value>> {
    let Value::Integer(index) = key else {
        return Err(Exception::format(
            error::TYPE_ERROR,
            format_args!(
                "Strings only support numerical indices, not {}",
                key.type_name()
            ),
        ));
    };
    let len = s.len() as i64;
    let i = if *index < 0 { index + len } else { *index };
    if (0..len).contains(&i) {
        let i = i as usize;
        Ok(Some(Value::string(&s.as_bytes()[i..=i])))
    } else {
        Ok(None)
    }
}

impl Value {
    /// `self[key]`; absent keys and out-of-range indices are errors
    pub fn get_item(&self, key: &Value) -> Result<Value> {
        match self {
            Value::Dict(d) => d.get_required(key),
            Value::List(l) => l.get(list_index(key)?),
            Value::String(s) => string_index(s, key)?
                .ok_or_else(|| Exception::new(error::INDEX_ERROR, "String index out of range")),
            other => Err(not_subscriptable(other)),
        }
    }

    /// `self[key]`, or `Undefined` when the key or index is absent.
    ///
    /// Type errors (unhashable keys, non-subscriptable receivers) are
    /// still raised.
    pub fn get_item_or_undefined(&self, key: &Value) -> Result<Value> {
        match self {
            Value::Dict(d) => d.get(key),
            Value::List(l) => Ok(l.get_or_undefined(list_index(key)?)),
            Value::String(s) => Ok(string_index(s, key)?.unwrap_or(Value::Undefined)),
            other => Err(not_subscriptable(other)),
        }
    }

    pub fn get_item_or_default(&self, key: &Value, default: Value) -> Result<Value> {
        let found = self.get_item_or_undefined(key)?;
        Ok(if found.is_undefined() { default } else { found })
    }

    /// `self[key] = value`. Strings are immutable and not assignable.
    pub fn set_item(&self, key: Value, value: Value) -> Result<()> {
        match self {
            Value::Dict(d) => d.set(key, value),
            Value::List(l) => l.set(list_index(&key)?, value),
            other => Err(Exception::format(
                error::TYPE_ERROR,
                format_args!("{} object does not support item assignment", other.type_name()),
            )),
        }
    }

    /// Remove `self[key]`, returning the removed value if there was one
    pub fn remove_item(&self, key: &Value) -> Result<Option<Value>> {
        match self {
            Value::Dict(d) => d.remove(key),
            Value::List(l) => {
                let index = list_index(key)?;
                let len = l.len() as i64;
                if index >= len || index < -len {
                    return Ok(None);
                }
                l.remove(index).map(Some)
            }
            other => Err(Exception::format(
                error::TYPE_ERROR,
                format_args!("{} object does not support item deletion", other.type_name()),
            )),
        }
    }

    /// Membership: dict keys (parent chain included), list elements by
    /// [`Value::equals`], substrings of a string.
    pub fn contains(&self, item: &Value) -> Result<bool> {
        match self {
            Value::Dict(d) => d.contains(item),
            Value::List(l) => Ok(l.iter().any(|v| v.equals(item))),
            Value::String(s) => match item {
                Value::String(needle) => Ok(contains_bytes(s.as_bytes(), needle.as_bytes())),
                other => Err(Exception::argument(
                    "contains",
                    1,
                    "String",
                    other.type_of(),
                )),
            },
            other => Err(Exception::format(
                error::TYPE_ERROR,
                format_args!("argument of type {} is not iterable", other.type_name()),
            )),
        }
    }

    pub fn get_item_str(&self, key: &str) -> Result<Value> {
        self.get_item(&Value::interned(key.as_bytes()))
    }

    pub fn get_item_str_or_undefined(&self, key: &str) -> Result<Value> {
        match self {
            Value::Dict(d) => Ok(d.get_str(key)),
            other => other.get_item_or_undefined(&Value::interned(key.as_bytes())),
        }
    }

    pub fn set_item_str(&self, key: &str, value: Value) -> Result<()> {
        match self {
            Value::Dict(d) => {
                d.set_str(key, value);
                Ok(())
            }
            other => other.set_item(Value::interned(key.as_bytes()), value),
        }
    }

    pub fn remove_item_str(&self, key: &str) -> Result<Option<Value>> {
        match self {
            Value::Dict(d) => Ok(d.remove_str(key)),
            other => other.remove_item(&Value::interned(key.as_bytes())),
        }
    }

    pub fn contains_str(&self, key: &str) -> Result<bool> {
        match self {
            Value::Dict(d) => Ok(d.contains_str(key)),
            other => other.contains(&Value::from(key)),
        }
    }

    pub fn get_item_int(&self, index: i64) -> Result<Value> {
        self.get_item(&Value::Integer(index))
    }

    pub fn get_item_int_or_undefined(&self, index: i64) -> Result<Value> {
        self.get_item_or_undefined(&Value::Integer(index))
    }

    pub fn set_item_int(&self, index: i64, value: Value) -> Result<()> {
        self.set_item(Value::Integer(index), value)
    }

    /// Call a callable userdata without a receiver
    pub fn call(&self, args: &List) -> Result<Value> {
        match self {
            Value::Userdata(u) => u.call(None, args),
            other => Err(Exception::format(
                error::TYPE_ERROR,
                format_args!("{} object is not callable", other.type_name()),
            )),
        }
    }

    /// Look up `key` on this dict (through its parents) and call the result
    /// with this dict as the receiver.
    pub fn call_member(&self, key: &Value, args: &List) -> Result<Value> {
        let Value::Dict(d) = self else {
            return Err(Exception::argument("call_member", 0, "Object", self.type_of()));
        };
        match d.get_required(key)? {
            Value::Userdata(u) => u.call(Some(self), args),
            other => Err(Exception::format(
                error::TYPE_ERROR,
                format_args!(
                    "Member {} is a {} object, which is not callable",
                    key.repr().to_string_lossy(),
                    other.type_name()
                ),
            )),
        }
    }

    pub fn call_member_str(&self, key: &str, args: &List) -> Result<Value> {
        self.call_member(&Value::interned(key.as_bytes()), args)
    }
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::Dict;
    use crate::userdata::Userdata;

    fn list(values: &[i64]) -> Value {
        Value::from(values.iter().map(|&i| Value::from(i)).collect::<List>())
    }

    #[test]
    fn test_dict_subscription() {
        let d = Value::new_dict();
        d.set_item_str("a", Value::from(1)).unwrap();
        d.set_item(Value::from(7), Value::from("seven")).unwrap();

        assert_eq!(d.get_item_str("a").unwrap(), Value::from(1));
        assert_eq!(d.get_item_int(7).unwrap(), Value::from("seven"));

        let err = d.get_item_str("missing").unwrap_err();
        assert_eq!(err.errid(), error::KEY_ERROR);
        assert_eq!(err.message(), "\"missing\"");

        assert!(d.get_item_str_or_undefined("missing").unwrap().is_undefined());
        assert_eq!(
            d.get_item_or_default(&Value::from("missing"), Value::from(0))
                .unwrap(),
            Value::from(0)
        );
    }

    #[test]
    fn test_none_is_stored_not_removed() {
        let d = Value::new_dict();
        d.set_item_str("k", Value::None).unwrap();
        assert!(d.contains_str("k").unwrap());
        assert!(d.get_item_str("k").unwrap().is_none());

        assert!(d.remove_item_str("k").unwrap().unwrap().is_none());
        assert!(!d.contains_str("k").unwrap());
        assert!(d.remove_item_str("k").unwrap().is_none());
    }

    #[test]
    fn test_list_subscription() {
        let l = list(&[1, 2, 3]);
        assert_eq!(l.get_item_int(-1).unwrap(), Value::from(3));
        assert!(l.get_item_int(3).is_err());
        assert!(l.get_item_int_or_undefined(3).unwrap().is_undefined());

        l.set_item_int(0, Value::from(10)).unwrap();
        assert_eq!(l.get_item_int(0).unwrap(), Value::from(10));

        let err = l.get_item(&Value::from("0")).unwrap_err();
        assert_eq!(err.errid(), error::TYPE_ERROR);
        assert_eq!(err.message(), "Lists only support numerical indices, not String");

        assert_eq!(l.remove_item(&Value::from(1)).unwrap(), Some(Value::from(2)));
        assert_eq!(l.remove_item(&Value::from(5)).unwrap(), None);
        assert_eq!(l.length().unwrap(), 2);
    }

    #[test]
    fn test_string_subscription() {
        let s = Value::from("abc");
        assert_eq!(s.get_item_int(1).unwrap(), Value::from("b"));
        assert_eq!(s.get_item_int(-1).unwrap(), Value::from("c"));
        let err = s.get_item_int(3).unwrap_err();
        assert_eq!(err.errid(), error::INDEX_ERROR);
        assert!(s.set_item_int(0, Value::from("x")).is_err());
    }

    #[test]
    fn test_not_subscriptable() {
        let err = Value::from(5).get_item_int(0).unwrap_err();
        assert_eq!(err.errid(), error::TYPE_ERROR);
        assert_eq!(err.message(), "Integral object is not subscriptable");
        assert!(Value::None.get_item_or_undefined(&Value::from(0)).is_err());
    }

    #[test]
    fn test_unhashable_key_is_error_not_absent() {
        let d = Value::new_dict();
        let err = d.contains(&Value::new_list()).unwrap_err();
        assert_eq!(err.errid(), error::UNHASHABLE_ERROR);
        assert!(d.get_item_or_undefined(&Value::new_list()).is_err());
    }

    #[test]
    fn test_contains() {
        let l = list(&[1, 2]);
        assert!(l.contains(&Value::from(2)).unwrap());
        assert!(!l.contains(&Value::from(2.0)).unwrap());

        let s = Value::from("haystack");
        assert!(s.contains_str("st").unwrap());
        assert!(!s.contains_str("needle").unwrap());

        let parent = Dict::new();
        parent.set_str("p", Value::None);
        let child = Value::dict_with_parent(parent);
        assert!(child.contains_str("p").unwrap());
    }

    #[test]
    fn test_call() {
        let f = Value::from(Userdata::callable(|_, args| {
            Ok(Value::from(args.len() as i64))
        }));
        let args: List = vec![Value::None, Value::None].into();
        assert_eq!(f.call(&args).unwrap(), Value::from(2));

        let err = Value::from(1).call(&args).unwrap_err();
        assert_eq!(err.message(), "Integral object is not callable");
    }

    #[test]
    fn test_call_member_passes_receiver() {
        let proto = Dict::new();
        proto.set_str(
            "get_name",
            Value::from(Userdata::callable0(|this| {
                let this = this.ok_or_else(|| Exception::new(error::CALL_ERROR, "no receiver"))?;
                this.get_item_str("name")
            })),
        );
        let obj = Value::dict_with_parent(proto);
        obj.set_item_str("name", Value::from("dy")).unwrap();

        assert_eq!(
            obj.call_member_str("get_name", &List::new()).unwrap(),
            Value::from("dy")
        );

        obj.set_item_str("plain", Value::from(3)).unwrap();
        let err = obj.call_member_str("plain", &List::new()).unwrap_err();
        assert_eq!(err.errid(), error::TYPE_ERROR);
        let err = obj.call_member_str("absent", &List::new()).unwrap_err();
        assert_eq!(err.errid(), error::KEY_ERROR);
    }
}
