//! Textual representation of values
//!
//! `repr` renders any value; for data built from JSON the output is valid
//! JSON and parses back to an element-wise equal structure:
//!
//! - `None` → `null`, `Undefined` → `undefined`
//! - booleans → `true` / `false`
//! - floats always carry a `.`, an exponent, `inf` or `NaN`, so they never
//!   read back as integers
//! - strings are double-quoted with JSON escapes
//! - lists → `[a, b]`, dicts → `{k: v}` (local entries only)
//! - userdata → `<Userdata name>` / `<Callable name>`
//! - exceptions → `<Exception errid: message>`
//!
//! A container that is already being printed further up (a reference
//! cycle) is rendered as `[...]` or `{...}`.
//!
//! All pieces go into one [`StringBuilder`], joined once at the end.

use crate::builder::StringBuilder;
use crate::string::Str;
use crate::value::Value;

/// Formatting options for [`repr_with`]
#[derive(Debug, Clone)]
pub struct ReprConfig {
    /// One element per line, indented by nesting depth
    pub pretty: bool,
    /// Spaces per indentation level
    pub indent: usize,
}

impl Default for ReprConfig {
    fn default() -> Self {
        ReprConfig {
            pretty: false,
            indent: 2,
        }
    }
}

impl ReprConfig {
    pub fn compact() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        ReprConfig {
            pretty: true,
            indent: 2,
        }
    }
}

/// Compact representation of `v`
pub fn repr(v: &Value) -> Str {
    repr_with(v, &ReprConfig::compact())
}

pub fn repr_with(v: &Value, config: &ReprConfig) -> Str {
    let mut writer = ReprWriter {
        config,
        out: StringBuilder::new(),
        path: Vec::new(),
    };
    writer.value(v, 0);
    writer.out.build()
}

/// Strings as themselves, everything else as `repr`
pub fn str(v: &Value) -> Str {
    match v {
        Value::String(s) => s.clone(),
        other => repr(other),
    }
}

impl Value {
    pub fn repr(&self) -> Str {
        repr(self)
    }

    pub fn str(&self) -> Str {
        str(self)
    }
}

struct ReprWriter<'c> {
    config: &'c ReprConfig,
    out: StringBuilder<'static>,
    /// Containers currently being printed
    path: Vec<*const ()>,
}

impl ReprWriter<'_> {
    fn value(&mut self, v: &Value, depth: usize) {
        match v {
            Value::Undefined => {
                self.out.append(b"undefined");
            }
            Value::None => {
                self.out.append(b"null");
            }
            Value::Bool(true) => {
                self.out.append(b"true");
            }
            Value::Bool(false) => {
                self.out.append(b"false");
            }
            Value::Integer(i) => {
                self.out.append_fmt(format_args!("{}", i));
            }
            Value::Float(f) => {
                // Debug keeps ".0" on integral values and uses exponents at the extremes
                self.out.append_fmt(format_args!("{:?}", f));
            }
            Value::String(s) => self.string(s),
            Value::List(list) => {
                let addr = list.addr();
                if self.path.contains(&addr) {
                    self.out.append(b"[...]");
                    return;
                }
                self.path.push(addr);
                let items = list.to_vec();
                self.out.append(b"[");
                for (i, item) in items.iter().enumerate() {
                    self.separator(i, depth + 1);
                    self.value(item, depth + 1);
                }
                self.close(items.is_empty(), depth, b"]");
                self.path.pop();
            }
            Value::Dict(dict) => {
                let addr = dict.addr();
                if self.path.contains(&addr) {
                    self.out.append(b"{...}");
                    return;
                }
                self.path.push(addr);
                let entries = dict.entries();
                self.out.append(b"{");
                for (i, (key, value)) in entries.iter().enumerate() {
                    self.separator(i, depth + 1);
                    self.value(key, depth + 1);
                    self.out.append(b": ");
                    self.value(value, depth + 1);
                }
                self.close(entries.is_empty(), depth, b"}");
                self.path.pop();
            }
            Value::Userdata(u) => {
                let kind = if u.is_callable() { "Callable" } else { "Userdata" };
                match u.name() {
                    Some(name) => self.out.append_fmt(format_args!("<{} {}>", kind, name)),
                    None => self.out.append_fmt(format_args!("<{}>", kind)),
                };
            }
            Value::Exception(e) => {
                self.out
                    .append_fmt(format_args!("<Exception {}: {}>", e.errid(), e.message()));
            }
        }
    }

    fn separator(&mut self, index: usize, depth: usize) {
        if index > 0 {
            self.out.append(if self.config.pretty { b"," } else { b", " });
        }
        if self.config.pretty {
            self.newline(depth);
        }
    }

    fn close(&mut self, empty: bool, depth: usize, bracket: &'static [u8]) {
        if self.config.pretty && !empty {
            self.newline(depth);
        }
        self.out.append(bracket);
    }

    fn newline(&mut self, depth: usize) {
        let mut line = Vec::with_capacity(1 + depth * self.config.indent);
        line.push(b'\n');
        line.resize(1 + depth * self.config.indent, b' ');
        self.out.append_owned(line);
    }

    fn string(&mut self, s: &Str) {
        self.out.append(b"\"");
        if s.as_bytes().iter().any(|&b| needs_escape(b)) {
            self.out.append_owned(escape(s.as_bytes()));
        } else {
            // Shares the string's buffer instead of copying it
            self.out.append_str(s.clone());
        }
        self.out.append(b"\"");
    }
}

fn needs_escape(b: u8) -> bool {
    b == b'"' || b == b'\\' || b < 0x20 || b == 0x7f
}

fn escape(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 8);
    for &b in bytes {
        match b {
            b'"' => out.extend_from_slice(b"\\\""),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x0c => out.extend_from_slice(b"\\f"),
            b if b < 0x20 || b == 0x7f => {
                out.extend_from_slice(format!("\\u{:04x}", b).as_bytes());
            }
            b => out.push(b),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::Dict;
    use crate::error::{self, Exception};
    use crate::list::List;
    use crate::userdata::Userdata;

    fn text(v: &Value) -> String {
        v.repr().to_string_lossy().into_owned()
    }

    #[test]
    fn test_scalars() {
        assert_eq!(text(&Value::None), "null");
        assert_eq!(text(&Value::Undefined), "undefined");
        assert_eq!(text(&Value::from(true)), "true");
        assert_eq!(text(&Value::from(-12)), "-12");
        assert_eq!(text(&Value::from(2.5)), "2.5");
        assert_eq!(text(&Value::from(3.0)), "3.0");
        assert_eq!(text(&Value::from(1e100)), "1e100");
        assert_eq!(text(&Value::from(f64::INFINITY)), "inf");
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(text(&Value::from("plain")), "\"plain\"");
        assert_eq!(
            text(&Value::from("a\"b\\c\nd\u{1}")),
            "\"a\\\"b\\\\c\\nd\\u0001\""
        );
    }

    #[test]
    fn test_str_is_identity_for_strings() {
        let s = Value::from("raw \"text\"");
        let out = s.str();
        assert!(out.ptr_eq(s.as_str().unwrap()));
        assert_eq!(text(&Value::from(4)), Value::from(4).str().to_string());
    }

    #[test]
    fn test_list_and_dict() {
        let list: List = vec![Value::from(1), Value::from("x"), Value::None].into();
        assert_eq!(text(&Value::from(list)), "[1, \"x\", null]");

        let d = Dict::new();
        d.set_str("k", Value::from(false));
        assert_eq!(text(&Value::from(d)), "{\"k\": false}");

        assert_eq!(text(&Value::new_list()), "[]");
        assert_eq!(text(&Value::new_dict()), "{}");
    }

    #[test]
    fn test_cycle_is_elided() {
        let list = List::new();
        list.append(Value::from(1)).unwrap();
        list.append(Value::from(list.clone())).unwrap();
        assert_eq!(text(&Value::from(list.clone())), "[1, [...]]");
        // Break the cycle so the list is released
        list.clear();
    }

    #[test]
    fn test_shared_non_cyclic_is_printed_twice() {
        let inner: List = vec![Value::from(0)].into();
        let outer: List = vec![Value::from(inner.clone()), Value::from(inner)].into();
        assert_eq!(text(&Value::from(outer)), "[[0], [0]]");
    }

    #[test]
    fn test_userdata_and_exception() {
        let u = Userdata::builder().with_name("handle").build();
        assert_eq!(text(&Value::from(u)), "<Userdata handle>");
        let f = Userdata::callable0(|_| Ok(Value::None));
        assert_eq!(text(&Value::from(f)), "<Callable>");
        let e = Exception::new(error::KEY_ERROR, "gone");
        assert_eq!(text(&Value::from(e)), "<Exception dy.KeyError: gone>");
    }

    #[test]
    fn test_pretty() {
        let d = Dict::new();
        d.set_str("a", Value::from(vec![Value::from(1), Value::from(2)].into_iter().collect::<List>()));
        let out = repr_with(&Value::from(d), &ReprConfig::pretty());
        assert_eq!(out.to_str(), Some("{\n  \"a\": [\n    1,\n    2\n  ]\n}"));
    }

    #[test]
    fn test_display_uses_repr() {
        let list: List = vec![Value::from(1.5)].into();
        assert_eq!(format!("{}", Value::from(list)), "[1.5]");
    }
}
