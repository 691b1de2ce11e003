//! dy Core: a reference-counted dynamic object runtime
//!
//! A closed set of dynamically typed values (none, bool, integer, float,
//! string, list, dict, userdata, exception) with one protocol for
//! subscription, hashing, equality and representation.
//!
//! Key design principles:
//! - Value: an enum whose heap variants are `Rc` handles; clone retains,
//!   drop releases, and the backing object's `Drop` does the type-specific
//!   cleanup exactly once
//! - Containers consume the values stored in them
//! - Fallible operations return [`Result`] carrying an [`Exception`]; the
//!   thread-local error slot in [`error`] is there for callers that want
//!   the propagation protocol with cause chaining
//! - A value graph belongs to one thread (`Value` is `!Send`)
//!
//! # Modules
//!
//! - `value`: The `Value` enum, type tags, equality, hashing, length
//! - `subscript`: `get_item`/`set_item`/`remove_item`/`contains` and calls
//! - `dict`: Open-chaining hash table with parent delegation
//! - `list`: Growable array with negative indexing
//! - `string`: Immutable byte strings with cached hashes
//! - `intern`: Per-thread string intern table
//! - `freelist`: Generation-checked slot blocks backing dict and intern buckets
//! - `builder`: Deferred string concatenation
//! - `repr`: Textual representation, cycle-safe
//! - `userdata`: Opaque native data and callables
//! - `error`: Exceptions, error ids, thread-local error slot
//! - `host`: Process-wide table sizes and hash selection
//! - `arena`: Thread-local bump allocation for scratch buffers
//! - `serialize`: serde support and bincode snapshots

pub mod arena;
pub mod builder;
pub mod dict;
pub mod error;
pub mod freelist;
pub mod host;
pub mod intern;
pub mod list;
pub mod repr;
pub mod serialize;
pub mod string;
pub mod subscript;
pub mod userdata;
pub mod value;

// Re-export key types and functions
pub use dict::{Dict, DictStats};
pub use list::List;
pub use string::{Hash, Str};
pub use userdata::{Userdata, UserdataBuilder};
pub use value::{Type, Value, equals, hash, length, release, retain, type_name, type_of};

// Representation
pub use builder::StringBuilder;
pub use repr::{ReprConfig, repr, repr_with, str};

// Error handling
pub use error::{Exception, Result, filter};

// Host configuration
pub use host::{ConfigError, HostConfig, StringHash};

// Serialization types (for persistence/exchange with external systems)
pub use serialize::{SerializeError, TypedKey, TypedValue, ValueSerialize, value_from_bytes};
