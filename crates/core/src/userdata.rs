//! Userdata - opaque native data, optionally callable
//!
//! A userdata wraps whatever the embedding program needs to hang on a value:
//! arbitrary data, a native function, or both. Callables come in three
//! arities, checked on every call:
//!
//! - nullary: `Fn(receiver)`
//! - unary: `Fn(receiver, arg)`
//! - variadic: `Fn(receiver, args: &List)`
//!
//! `receiver` is the optional "self" value: [`crate::Value::call_member`]
//! passes the dict the callable was looked up on.
//!
//! # Example
//!
//! ```rust
//! use dy_core::{List, Userdata, Value};
//!
//! let double = Userdata::callable1(|_, arg| Ok(Value::from(arg.integer()? * 2)));
//! let args: List = vec![Value::from(21)].into();
//! assert_eq!(double.call(None, &args).unwrap(), Value::from(42));
//! ```

use crate::error::{self, Exception, Result};
use crate::list::List;
use crate::value::{Type, Value};
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

type Nullary = dyn Fn(Option<&Value>) -> Result<Value>;
type Unary = dyn Fn(Option<&Value>, &Value) -> Result<Value>;
type Variadic = dyn Fn(Option<&Value>, &List) -> Result<Value>;
type Destructor = Box<dyn FnOnce(Option<Box<dyn Any>>)>;

enum Callback {
    Nullary(Box<Nullary>),
    Unary(Box<Unary>),
    Variadic(Box<Variadic>),
}

pub struct UserdataObject {
    name: Option<Cow<'static, str>>,
    data: Option<Box<dyn Any>>,
    call: Option<Callback>,
    destructor: Option<Destructor>,
}

impl Drop for UserdataObject {
    fn drop(&mut self) {
        if let Some(destructor) = self.destructor.take() {
            destructor(self.data.take());
        }
    }
}

/// Handle to a userdata object
#[derive(Clone)]
pub struct Userdata(Rc<UserdataObject>);

/// Assembles a [`Userdata`]
#[derive(Default)]
pub struct UserdataBuilder {
    name: Option<Cow<'static, str>>,
    data: Option<Box<dyn Any>>,
    call: Option<Callback>,
    destructor: Option<Destructor>,
}

impl UserdataBuilder {
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_data<T: Any>(mut self, data: T) -> Self {
        self.data = Some(Box::new(data));
        self
    }

    pub fn with_call0(
        mut self,
        f: impl Fn(Option<&Value>) -> Result<Value> + 'static,
    ) -> Self {
        self.call = Some(Callback::Nullary(Box::new(f)));
        self
    }

    pub fn with_call1(
        mut self,
        f: impl Fn(Option<&Value>, &Value) -> Result<Value> + 'static,
    ) -> Self {
        self.call = Some(Callback::Unary(Box::new(f)));
        self
    }

    pub fn with_call(
        mut self,
        f: impl Fn(Option<&Value>, &List) -> Result<Value> + 'static,
    ) -> Self {
        self.call = Some(Callback::Variadic(Box::new(f)));
        self
    }

    /// Run `f` with the data (if any) when the last handle is dropped
    pub fn with_destructor(mut self, f: impl FnOnce(Option<Box<dyn Any>>) + 'static) -> Self {
        self.destructor = Some(Box::new(f));
        self
    }

    pub fn build(self) -> Userdata {
        Userdata(Rc::new(UserdataObject {
            name: self.name,
            data: self.data,
            call: self.call,
            destructor: self.destructor,
        }))
    }
}

fn count_error(message: String) -> Exception {
    Exception::new(error::ARGUMENT_COUNT_ERROR, message)
}

fn takes_none(given: usize) -> Exception {
    count_error(format!(
        "Callable takes no arguments, {} arguments given",
        given
    ))
}

fn takes_one(given: usize) -> Exception {
    count_error(format!("Callable takes 1 argument, {} arguments given", given))
}

impl Userdata {
    pub fn builder() -> UserdataBuilder {
        UserdataBuilder::default()
    }

    /// Plain data with no call behaviour
    pub fn new<T: Any>(data: T) -> Userdata {
        Userdata::builder().with_data(data).build()
    }

    pub fn callable0(f: impl Fn(Option<&Value>) -> Result<Value> + 'static) -> Userdata {
        Userdata::builder().with_call0(f).build()
    }

    pub fn callable1(f: impl Fn(Option<&Value>, &Value) -> Result<Value> + 'static) -> Userdata {
        Userdata::builder().with_call1(f).build()
    }

    pub fn callable(f: impl Fn(Option<&Value>, &List) -> Result<Value> + 'static) -> Userdata {
        Userdata::builder().with_call(f).build()
    }

    /// A nullary callable that runs `f` for its side effect and returns None
    pub fn callback(f: impl Fn() + 'static) -> Userdata {
        Userdata::callable0(move |_| {
            f();
            Ok(Value::None)
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn is_callable(&self) -> bool {
        self.0.call.is_some()
    }

    pub fn data<T: Any>(&self) -> Option<&T> {
        self.0.data.as_ref()?.downcast_ref::<T>()
    }

    fn not_callable(&self) -> Exception {
        Exception::argument("call", 0, "callable Userdata", Type::Userdata)
    }

    /// Invoke with an argument list, enforcing the callable's arity
    pub fn call(&self, receiver: Option<&Value>, args: &List) -> Result<Value> {
        match &self.0.call {
            None => Err(self.not_callable()),
            Some(Callback::Nullary(f)) => match args.len() {
                0 => f(receiver),
                n => Err(takes_none(n)),
            },
            Some(Callback::Unary(f)) => match args.len() {
                1 => {
                    let arg = args.get(0)?;
                    f(receiver, &arg)
                }
                n => Err(takes_one(n)),
            },
            Some(Callback::Variadic(f)) => f(receiver, args),
        }
    }

    pub fn call0(&self, receiver: Option<&Value>) -> Result<Value> {
        match &self.0.call {
            None => Err(self.not_callable()),
            Some(Callback::Nullary(f)) => f(receiver),
            Some(Callback::Unary(_)) => Err(takes_one(0)),
            Some(Callback::Variadic(f)) => f(receiver, &List::new()),
        }
    }

    pub fn call1(&self, receiver: Option<&Value>, arg: &Value) -> Result<Value> {
        match &self.0.call {
            None => Err(self.not_callable()),
            Some(Callback::Nullary(_)) => Err(takes_none(1)),
            Some(Callback::Unary(f)) => f(receiver, arg),
            Some(Callback::Variadic(f)) => f(receiver, &List::from_vec(vec![arg.clone()])),
        }
    }

    pub fn ptr_eq(&self, other: &Userdata) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl fmt::Debug for Userdata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Userdata")
            .field("name", &self.name())
            .field("callable", &self.is_callable())
            .finish()
    }
}
