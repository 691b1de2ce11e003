//! Exceptions and thread-local error state
//!
//! Every fallible operation in this crate returns [`Result<T>`], whose error
//! is an [`Exception`]: a reference-counted object carrying a dotted error id,
//! a message, optional user data and an optional cause.
//!
//! Error ids form a hierarchy matched by prefix: `dy.TypeError` matches
//! `dy.TypeError.ArgumentError` but not `dy.TypeErrorX`. See
//! [`Exception::matches`].
//!
//! # Usage
//!
//! Operations return errors directly:
//! ```ignore
//! let value = dict.get_required(&key)?;
//! ```
//!
//! Callers that propagate errors through a "current error" protocol (for
//! example across a callback boundary that cannot return a `Result`) use the
//! thread-local slot. Raising while an error is already active chains the
//! active one as the new error's cause:
//! ```ignore
//! error::set(error::TYPE_ERROR, "first");
//! let second = error::set(error::KEY_ERROR, "second");
//! assert_eq!(second.cause().unwrap().message(), "first");
//! ```

use crate::value::Type;
use std::any::Any;
use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

// Error ids
pub const TYPE_ERROR: &str = "dy.TypeError";
pub const ARGUMENT_ERROR: &str = "dy.TypeError.ArgumentError";
pub const UNHASHABLE_ERROR: &str = "dy.TypeError.UnhashableError";
/// Reserved for binding layers that convert to and from host-language types
pub const CONVERSION_ERROR: &str = "dy.TypeError.CXXConversionError";
pub const CALL_ERROR: &str = "dy.CallError";
pub const ARGUMENT_COUNT_ERROR: &str = "dy.CallError.ArgumentCountError";
pub const KEY_ERROR: &str = "dy.KeyError";
pub const INDEX_ERROR: &str = "dy.KeyError.IndexError";
pub const MEMORY_ERROR: &str = "dy.MemoryError";

/// Result type used throughout the runtime
pub type Result<T, E = Exception> = std::result::Result<T, E>;

/// Backing record of an [`Exception`]
pub struct ExceptionObject {
    errid: &'static str,
    message: String,
    cause: OnceCell<Exception>,
    data: RefCell<Option<Box<dyn Any>>>,
}

impl Drop for ExceptionObject {
    // Unlinks the cause chain one link at a time instead of recursing
    fn drop(&mut self) {
        let mut next = self.cause.take();
        while let Some(exc) = next {
            next = match Rc::try_unwrap(exc.0) {
                Ok(mut object) => object.cause.take(),
                Err(_) => None,
            };
        }
    }
}

/// A raised error
#[derive(Clone)]
pub struct Exception(Rc<ExceptionObject>);

impl Exception {
    pub fn new(errid: &'static str, message: impl Into<String>) -> Self {
        Exception(Rc::new(ExceptionObject {
            errid,
            message: message.into(),
            cause: OnceCell::new(),
            data: RefCell::new(None),
        }))
    }

    /// `Exception::new` with a formatted message
    pub fn format(errid: &'static str, args: fmt::Arguments<'_>) -> Self {
        Exception::new(errid, fmt::format(args))
    }

    /// "fname(): Argument N: expected X but got Y object."
    pub fn argument(fname: &str, index: usize, expected: &str, got: Type) -> Self {
        Exception::new(
            ARGUMENT_ERROR,
            format!(
                "{}(): Argument {}: expected {} but got {} object.",
                fname,
                index,
                expected,
                got.name()
            ),
        )
    }

    /// The per-thread out-of-memory exception.
    ///
    /// Allocated once per thread so that reporting an allocation failure
    /// never needs to allocate.
    pub fn memory_error() -> Self {
        MEMORY_ERROR_INSTANCE.with(|e| e.clone())
    }

    pub fn errid(&self) -> &'static str {
        self.0.errid
    }

    pub fn message(&self) -> &str {
        &self.0.message
    }

    /// The error that was active when this one was raised
    pub fn cause(&self) -> Option<Exception> {
        self.0.cause.get().cloned()
    }

    /// This exception followed by its causes, newest first
    pub fn chain(&self) -> Chain {
        Chain {
            next: Some(self.clone()),
        }
    }

    /// Attach `cause` unless a cause is already set or the link would
    /// close a cycle. Returns whether the cause was attached.
    ///
    /// The shared memory error never takes a cause.
    pub fn attach_cause(&self, cause: Exception) -> bool {
        if self.0.errid == MEMORY_ERROR || self.0.cause.get().is_some() {
            return false;
        }
        // Every link holds a strong reference, so a sole owner is not in
        // any chain
        let unshared = Rc::strong_count(&self.0) == 1;
        if !unshared && cause.chain().any(|e| e.ptr_eq(self)) {
            return false;
        }
        self.0.cause.set(cause).is_ok()
    }

    /// Hierarchical id match: exact, or `errid` followed by a `.` segment
    pub fn matches(&self, errid: &str) -> bool {
        filter(self, errid)
    }

    /// Attach user data, dropping any previous data
    pub fn set_data<T: Any>(&self, data: T) {
        let previous = self.0.data.replace(Some(Box::new(data)));
        drop(previous);
    }

    /// Borrow the user data as `T`
    pub fn with_data<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let data = self.0.data.borrow();
        data.as_ref()?.downcast_ref::<T>().map(f)
    }

    pub fn take_data(&self) -> Option<Box<dyn Any>> {
        self.0.data.borrow_mut().take()
    }

    pub fn ptr_eq(&self, other: &Exception) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

/// Iterator over an exception and its causes
pub struct Chain {
    next: Option<Exception>,
}

impl Iterator for Chain {
    type Item = Exception;

    fn next(&mut self) -> Option<Exception> {
        let current = self.next.take()?;
        self.next = current.cause();
        Some(current)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.errid(), self.message())?;
        if f.alternate() {
            for cause in self.chain().skip(1) {
                write!(f, "\n  caused by {}: {}", cause.errid(), cause.message())?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exception")
            .field("errid", &self.errid())
            .field("message", &self.message())
            .field("cause", &self.0.cause.get().map(|c| c.errid()))
            .finish()
    }
}

impl std::error::Error for Exception {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0
            .cause
            .get()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}

/// Whether `exc`'s id is `errid` or a descendant of it
pub fn filter(exc: &Exception, errid: &str) -> bool {
    let id = exc.errid();
    match id.strip_prefix(errid) {
        Some("") => true,
        Some(rest) => rest.starts_with('.') && rest.len() > 1,
        None => false,
    }
}

thread_local! {
    /// The current error of this thread
    static CURRENT: RefCell<Option<Exception>> = const { RefCell::new(None) };

    static MEMORY_ERROR_INSTANCE: Exception = Exception::new(MEMORY_ERROR, "Out of memory");
}

/// The current error, if any
pub fn occurred() -> Option<Exception> {
    CURRENT.with(|c| c.borrow().clone())
}

pub fn has_error() -> bool {
    CURRENT.with(|c| c.borrow().is_some())
}

/// Take (and clear) the current error
pub fn take() -> Option<Exception> {
    CURRENT.with(|c| c.borrow_mut().take())
}

/// Release the current error
pub fn clear() {
    // Dropped outside the borrow: user data destructors may raise
    let previous = take();
    drop(previous);
}

/// Raise a new error, chaining the current one as its cause
pub fn set(errid: &'static str, message: impl Into<String>) -> Exception {
    set_object(Exception::new(errid, message))
}

/// `set` with a formatted message
pub fn set_fmt(errid: &'static str, args: fmt::Arguments<'_>) -> Exception {
    set_object(Exception::format(errid, args))
}

/// Raise the standard argument type error
pub fn set_argument_error(fname: &str, index: usize, expected: &str, got: Type) -> Exception {
    set_object(Exception::argument(fname, index, expected, got))
}

/// Make `exc` current, chaining the previously current error as its cause
pub fn set_object(exc: Exception) -> Exception {
    let previous = take();
    if let Some(previous) = previous {
        if !previous.ptr_eq(&exc) && !exc.attach_cause(previous.clone()) {
            tracing::trace!(
                superseded = previous.errid(),
                "active error not chained as cause"
            );
        }
    }
    install(exc)
}

/// Make `exc` current, releasing the previous error without chaining
pub fn discard_and_set_object(exc: Exception) -> Exception {
    let previous = take();
    drop(previous);
    install(exc)
}

/// Make the pre-allocated memory error current
pub fn set_memory_error() -> Exception {
    discard_and_set_object(Exception::memory_error())
}

fn install(exc: Exception) -> Exception {
    tracing::debug!(errid = exc.errid(), message = exc.message(), "error raised");
    let displaced = CURRENT.with(|c| c.borrow_mut().replace(exc.clone()));
    drop(displaced);
    exc
}

/// Move an `Err` into the error slot (chaining), yielding the `Ok` value
pub fn report<T>(result: Result<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            set_object(e);
            None
        }
    }
}
