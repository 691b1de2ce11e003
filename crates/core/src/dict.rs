//! Dict - open-chaining hash table with prototype delegation
//!
//! Representation:
//!
//! - a fixed primary table of chain heads, sized by the host configuration
//! - overflow buckets allocated from a [`BlockChain`] whose blocks double in
//!   size, so colliding entries never cost a heap allocation of their own
//! - an optional parent dict; lookups that miss locally continue in the
//!   parent, then its parent, and so on
//!
//! A bucket stores the key's hash, the key, the value and the handle of the
//! next bucket in its chain. Removing a chain head pulls the next chained
//! bucket into the head slot and returns that bucket's block slot to the
//! free-list; removing a sole head just empties the slot.
//!
//! Entries displaced by `set`, `remove` and `clear` are dropped only after
//! the dict's interior borrow ends, so a destructor that reaches back into
//! the same dict sees a consistent, unborrowed table.

use crate::error::{self, Exception, Result};
use crate::freelist::{BlockChain, BlockStats, FreeList, Growth, SlotRef};
use crate::host;
use crate::string::{Hash, Str};
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

struct Bucket {
    hash: Hash,
    key: Value,
    value: Value,
    next: Option<SlotRef>,
}

impl Bucket {
    fn holds(&self, hash: Hash, key: &Value) -> bool {
        self.hash == hash && self.key.equals(key)
    }
}

enum Link {
    Head,
    Slot(SlotRef),
}

pub struct DictObject {
    table: Box<[Option<Bucket>]>,
    blocks: BlockChain<Bucket>,
    len: usize,
    parent: Option<Dict>,
}

/// Handle to a shared, mutable dictionary
#[derive(Clone)]
pub struct Dict(Rc<RefCell<DictObject>>);

/// Dictionary usage, for diagnostics and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictStats {
    pub entries: usize,
    pub table_size: usize,
    pub blocks: BlockStats,
}

/// Storage taken out of a dict, dropped by the caller once unborrowed
type Displaced = (Box<[Option<Bucket>]>, Vec<FreeList<Bucket>>);

fn empty_table(size: usize) -> Box<[Option<Bucket>]> {
    (0..size).map(|_| None).collect()
}

impl DictObject {
    fn new(parent: Option<Dict>) -> Self {
        let config = host::config();
        DictObject {
            table: empty_table(config.dict_table_size),
            blocks: BlockChain::new(config.dict_block_size, Growth::Doubling, "dict"),
            len: 0,
            parent,
        }
    }

    fn index(&self, hash: Hash) -> usize {
        (hash as u64 % self.table.len() as u64) as usize
    }

    fn lookup(&self, hash: Hash, key: &Value) -> Option<&Bucket> {
        let head = self.table[self.index(hash)].as_ref()?;
        if head.holds(hash, key) {
            return Some(head);
        }
        let mut next = head.next;
        while let Some(at) = next {
            let bucket = self.blocks.get(at)?;
            if bucket.holds(hash, key) {
                return Some(bucket);
            }
            next = bucket.next;
        }
        None
    }

    /// Insert or overwrite; returns the displaced key and value
    fn insert(&mut self, hash: Hash, key: Value, value: Value) -> Option<(Value, Value)> {
        let idx = self.index(hash);
        let DictObject {
            table,
            blocks,
            len,
            ..
        } = self;

        let Some(head) = table[idx].as_mut() else {
            table[idx] = Some(Bucket {
                hash,
                key,
                value,
                next: None,
            });
            *len += 1;
            return None;
        };

        if head.holds(hash, &key) {
            let old_key = std::mem::replace(&mut head.key, key);
            let old_value = std::mem::replace(&mut head.value, value);
            return Some((old_key, old_value));
        }

        let mut next = head.next;
        while let Some(at) = next {
            let Some(bucket) = blocks.get_mut(at) else {
                break;
            };
            if bucket.holds(hash, &key) {
                let old_key = std::mem::replace(&mut bucket.key, key);
                let old_value = std::mem::replace(&mut bucket.value, value);
                return Some((old_key, old_value));
            }
            next = bucket.next;
        }

        // New entries go directly behind the head
        let at = blocks.alloc(Bucket {
            hash,
            key,
            value,
            next: head.next,
        });
        head.next = Some(at);
        *len += 1;
        None
    }

    /// Unlink the local entry for `key`
    fn remove(&mut self, hash: Hash, key: &Value) -> Option<Bucket> {
        let idx = self.index(hash);
        let head = self.table[idx].as_ref()?;

        if head.holds(hash, key) {
            let replacement = match head.next {
                Some(at) => self.blocks.free(at),
                None => None,
            };
            self.len -= 1;
            return std::mem::replace(&mut self.table[idx], replacement);
        }

        let mut prev = Link::Head;
        let mut cur = head.next;
        while let Some(at) = cur {
            let bucket = self.blocks.get(at)?;
            let next = bucket.next;
            if bucket.holds(hash, key) {
                let removed = self.blocks.free(at);
                match prev {
                    Link::Head => {
                        if let Some(head) = self.table[idx].as_mut() {
                            head.next = next;
                        }
                    }
                    Link::Slot(p) => {
                        if let Some(prev_bucket) = self.blocks.get_mut(p) {
                            prev_bucket.next = next;
                        }
                    }
                }
                self.len -= 1;
                return removed;
            }
            prev = Link::Slot(at);
            cur = next;
        }
        None
    }

    fn take_storage(&mut self) -> Displaced {
        let size = self.table.len();
        let table = std::mem::replace(&mut self.table, empty_table(size));
        let blocks = self.blocks.take_blocks();
        self.len = 0;
        (table, blocks)
    }

    fn for_each_local(&self, mut f: impl FnMut(&Bucket)) {
        for head in self.table.iter().flatten() {
            f(head);
            let mut next = head.next;
            while let Some(at) = next {
                let Some(bucket) = self.blocks.get(at) else {
                    break;
                };
                f(bucket);
                next = bucket.next;
            }
        }
    }
}

impl Dict {
    pub fn new() -> Self {
        Dict(Rc::new(RefCell::new(DictObject::new(None))))
    }

    /// A dict whose lookups fall back to `parent`
    pub fn with_parent(parent: Dict) -> Self {
        Dict(Rc::new(RefCell::new(DictObject::new(Some(parent)))))
    }

    pub fn parent(&self) -> Option<Dict> {
        self.0.borrow().parent.clone()
    }

    /// Look `key` up here, then along the parent chain.
    ///
    /// Absent keys yield `Value::Undefined`; only an unhashable key is an error.
    pub fn get(&self, key: &Value) -> Result<Value> {
        let hash = key.hash()?;
        Ok(self.find(hash, key).unwrap_or(Value::Undefined))
    }

    /// Like [`Dict::get`] but an absent key raises `dy.KeyError`
    pub fn get_required(&self, key: &Value) -> Result<Value> {
        let hash = key.hash()?;
        self.find(hash, key).ok_or_else(|| {
            Exception::new(error::KEY_ERROR, key.repr().to_string_lossy().into_owned())
        })
    }

    fn find(&self, hash: Hash, key: &Value) -> Option<Value> {
        let mut current = self.clone();
        loop {
            let parent = {
                let dict = current.0.borrow();
                if let Some(bucket) = dict.lookup(hash, key) {
                    return Some(bucket.value.clone());
                }
                dict.parent.clone()
            };
            current = parent?;
        }
    }

    /// Insert or overwrite a local entry.
    ///
    /// Takes ownership of both `key` and `value`. On error (unhashable key)
    /// the dict is unchanged and both are dropped.
    pub fn set(&self, key: Value, value: Value) -> Result<()> {
        let hash = key.hash()?;
        let displaced = self.0.borrow_mut().insert(hash, key, value);
        drop(displaced);
        Ok(())
    }

    /// Remove a local entry, returning its value. Parents are never touched.
    pub fn remove(&self, key: &Value) -> Result<Option<Value>> {
        let hash = key.hash()?;
        let removed = self.0.borrow_mut().remove(hash, key);
        Ok(removed.map(|bucket| bucket.value))
    }

    /// Whether `key` is present here or along the parent chain
    pub fn contains(&self, key: &Value) -> Result<bool> {
        let hash = key.hash()?;
        let mut current = self.clone();
        loop {
            let parent = {
                let dict = current.0.borrow();
                if dict.lookup(hash, key).is_some() {
                    return Ok(true);
                }
                dict.parent.clone()
            };
            match parent {
                Some(p) => current = p,
                None => return Ok(false),
            }
        }
    }

    pub fn get_str(&self, key: &str) -> Value {
        let key = Str::intern(key.as_bytes());
        self.find(key.hash(), &Value::String(key))
            .unwrap_or(Value::Undefined)
    }

    pub fn set_str(&self, key: &str, value: Value) {
        self.set_string(Str::intern(key.as_bytes()), value);
    }

    /// Insert under a string key as given; strings always hash, so this
    /// cannot fail.
    pub fn set_string(&self, key: Str, value: Value) {
        let hash = key.hash();
        let displaced = self.0.borrow_mut().insert(hash, Value::String(key), value);
        drop(displaced);
    }

    pub fn contains_str(&self, key: &str) -> bool {
        let key = Str::intern(key.as_bytes());
        self.find(key.hash(), &Value::String(key)).is_some()
    }

    pub fn remove_str(&self, key: &str) -> Option<Value> {
        let key = Str::intern(key.as_bytes());
        let removed = self.0.borrow_mut().remove(key.hash(), &Value::String(key));
        removed.map(|bucket| bucket.value)
    }

    pub fn get_int(&self, key: i64) -> Value {
        self.find(key, &Value::Integer(key))
            .unwrap_or(Value::Undefined)
    }

    pub fn set_int(&self, key: i64, value: Value) {
        let displaced = self.0.borrow_mut().insert(key, Value::Integer(key), value);
        drop(displaced);
    }

    /// Release every local entry. The parent link is kept.
    pub fn clear(&self) {
        let displaced = self.0.borrow_mut().take_storage();
        drop(displaced);
    }

    /// Number of local entries
    pub fn len(&self) -> usize {
        self.0.borrow().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Local entries in table order
    pub fn entries(&self) -> Vec<(Value, Value)> {
        let mut out = Vec::with_capacity(self.len());
        self.0
            .borrow()
            .for_each_local(|b| out.push((b.key.clone(), b.value.clone())));
        out
    }

    pub fn keys(&self) -> Vec<Value> {
        let mut out = Vec::with_capacity(self.len());
        self.0.borrow().for_each_local(|b| out.push(b.key.clone()));
        out
    }

    pub fn values(&self) -> Vec<Value> {
        let mut out = Vec::with_capacity(self.len());
        self.0.borrow().for_each_local(|b| out.push(b.value.clone()));
        out
    }

    pub fn stats(&self) -> DictStats {
        let dict = self.0.borrow();
        DictStats {
            entries: dict.len,
            table_size: dict.table.len(),
            blocks: dict.blocks.stats(),
        }
    }

    pub fn ptr_eq(&self, other: &Dict) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub(crate) fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}

impl Default for Dict {
    fn default() -> Self {
        Dict::new()
    }
}
