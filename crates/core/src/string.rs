//! Str - immutable, reference-counted byte strings
//!
//! A `Str` is fixed at construction. Its hash is computed on first use and
//! cached; the cache is an `Option` so that a hash of zero is still
//! distinguishable from "not computed yet".
//!
//! Strings may be interned (see [`crate::intern`]). An interned string is
//! registered in the per-thread intern table and removes itself from that
//! table when its last handle is dropped.

use crate::host::{self, StringHash};
use crate::intern;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Hash value used by dictionaries and the intern table
pub type Hash = i64;

/// Backing record of a [`Str`]
pub struct StrObject {
    bytes: Box<[u8]>,
    hash: Cell<Option<Hash>>,
    interned: Cell<bool>,
}

impl StrObject {
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn hash(&self) -> Hash {
        if let Some(h) = self.hash.get() {
            return h;
        }
        let h = hash_bytes(&self.bytes);
        self.hash.set(Some(h));
        h
    }

    pub(crate) fn mark_interned(&self) {
        self.interned.set(true);
    }
}

impl Drop for StrObject {
    fn drop(&mut self) {
        if self.interned.get() {
            let hash = self.hash();
            intern::unintern(self as *const StrObject, hash);
        }
    }
}

/// Handle to an immutable byte string
#[derive(Clone)]
pub struct Str(Rc<StrObject>);

impl Str {
    /// Create a new (not interned) string holding a copy of `bytes`
    pub fn new(bytes: &[u8]) -> Self {
        Str::from_boxed(bytes.into())
    }

    pub(crate) fn from_boxed(bytes: Box<[u8]>) -> Self {
        Str(Rc::new(StrObject {
            bytes,
            hash: Cell::new(None),
            interned: Cell::new(false),
        }))
    }

    pub(crate) fn from_rc(rc: Rc<StrObject>) -> Self {
        Str(rc)
    }

    pub(crate) fn object(&self) -> &Rc<StrObject> {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0.bytes
    }

    /// The contents as `&str` if they are valid UTF-8
    pub fn to_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0.bytes).ok()
    }

    pub fn to_string_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0.bytes)
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.bytes.is_empty()
    }

    /// Content hash, computed once and cached
    pub fn hash(&self) -> Hash {
        self.0.hash()
    }

    pub fn is_interned(&self) -> bool {
        self.0.interned.get()
    }

    /// Whether both handles refer to the same string object
    pub fn ptr_eq(&self, other: &Str) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// The canonical interned string with the given contents, creating and
    /// registering one if none exists yet.
    pub fn intern(bytes: &[u8]) -> Str {
        intern::intern_bytes(bytes)
    }

    /// The canonical interned string equal to `self`.
    ///
    /// If no equal string is interned yet, `self` becomes the canonical
    /// instance. The result is always an owned handle.
    pub fn interned(&self) -> Str {
        intern::intern_str(self)
    }

    /// Look up an interned string without registering anything
    pub fn lookup_interned(bytes: &[u8]) -> Option<Str> {
        intern::lookup(bytes)
    }
}

// Content equality; identity is `ptr_eq`
impl PartialEq for Str {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0) || self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Str {}

impl fmt::Debug for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl fmt::Display for Str {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl From<&str> for Str {
    fn from(s: &str) -> Self {
        Str::new(s.as_bytes())
    }
}

impl From<String> for Str {
    fn from(s: String) -> Self {
        Str::from_boxed(s.into_bytes().into_boxed_slice())
    }
}

impl From<Vec<u8>> for Str {
    fn from(bytes: Vec<u8>) -> Self {
        Str::from_boxed(bytes.into_boxed_slice())
    }
}

/// Hash `bytes` with the host-selected string hash
pub fn hash_bytes(bytes: &[u8]) -> Hash {
    match host::config().string_hash {
        StringHash::Fnv1 => fnv1(bytes),
        StringHash::Murmur3 => murmur3_32(bytes, 0) as Hash,
    }
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1 (multiply, then xor)
pub fn fnv1(bytes: &[u8]) -> Hash {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash = hash.wrapping_mul(FNV_PRIME);
        hash ^= b as u64;
    }
    hash as Hash
}

/// MurmurHash3, x86 32-bit variant
pub fn murmur3_32(bytes: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    let mut h = seed;
    let mut chunks = bytes.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
        h ^= k;
        h = h.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k: u32 = 0;
        for (i, &b) in tail.iter().enumerate() {
            k |= (b as u32) << (8 * i);
        }
        k = k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
        h ^= k;
    }

    h ^= bytes.len() as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}
