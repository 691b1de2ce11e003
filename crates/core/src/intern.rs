//! String interning
//!
//! Canonicalizes equal strings to one shared [`Str`] so that repeated keys
//! (dictionary keys, JSON object keys) share storage and compare by identity.
//!
//! The table is thread-local, like the error slot: `Str` is built on `Rc`,
//! so an interned string can never be observed from another thread anyway.
//!
//! Layout mirrors the dictionary: a fixed array of chain heads, with overflow
//! entries allocated from fixed-size free-list blocks. Entries hold *weak*
//! references, so the table never keeps a string alive. When an interned
//! string's last handle drops, its destructor calls [`unintern`], which
//! unlinks the entry by identity and returns its slot to the free-list.
//!
//! Every entry point returns an owned handle; callers never have to guess
//! whether a reference was retained for them.

use crate::freelist::{BlockChain, BlockStats, Growth, SlotRef};
use crate::host;
use crate::string::{Hash, Str, StrObject, hash_bytes};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

struct Entry {
    hash: Hash,
    string: Weak<StrObject>,
    next: Option<SlotRef>,
}

impl Entry {
    fn holds(&self, ptr: *const StrObject) -> bool {
        std::ptr::eq(self.string.as_ptr(), ptr)
    }

    fn upgrade_if_equal(&self, hash: Hash, bytes: &[u8]) -> Option<Rc<StrObject>> {
        if self.hash != hash {
            return None;
        }
        let rc = self.string.upgrade()?;
        (rc.as_bytes() == bytes).then_some(rc)
    }
}

struct InternTable {
    heads: Box<[Option<Entry>]>,
    blocks: BlockChain<Entry>,
    len: usize,
}

/// Intern table usage, for diagnostics and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternStats {
    /// Live interned strings
    pub entries: usize,
    /// Chain heads in the primary table
    pub table_size: usize,
    /// Overflow bucket blocks
    pub blocks: BlockStats,
}

thread_local! {
    static INTERNED: RefCell<InternTable> = RefCell::new(InternTable::new());

    /// Removals that arrived while the table was borrowed
    static DEFERRED: RefCell<Vec<(*const StrObject, Hash)>> = const { RefCell::new(Vec::new()) };
}

/// Apply removals deferred by [`unintern`]
fn settle(table: &mut InternTable) {
    let pending = DEFERRED.with(|d| std::mem::take(&mut *d.borrow_mut()));
    for (ptr, hash) in pending {
        if !table.remove(ptr, hash) {
            tracing::warn!(hash, "deferred string missing from intern table");
        }
    }
}

enum Link {
    Head,
    Slot(SlotRef),
}

impl InternTable {
    fn new() -> Self {
        let config = host::config();
        InternTable {
            heads: (0..config.intern_table_size).map(|_| None).collect(),
            blocks: BlockChain::new(config.intern_block_size, Growth::Fixed, "intern"),
            len: 0,
        }
    }

    fn index(&self, hash: Hash) -> usize {
        (hash as u64 % self.heads.len() as u64) as usize
    }

    fn find(&self, hash: Hash, bytes: &[u8]) -> Option<Rc<StrObject>> {
        let head = self.heads[self.index(hash)].as_ref()?;
        if let Some(rc) = head.upgrade_if_equal(hash, bytes) {
            return Some(rc);
        }
        let mut next = head.next;
        while let Some(at) = next {
            let entry = self.blocks.get(at)?;
            if let Some(rc) = entry.upgrade_if_equal(hash, bytes) {
                return Some(rc);
            }
            next = entry.next;
        }
        None
    }

    fn insert(&mut self, string: &Rc<StrObject>, hash: Hash) {
        let idx = self.index(hash);
        let entry = Entry {
            hash,
            string: Rc::downgrade(string),
            next: None,
        };
        match self.heads[idx].as_mut() {
            None => self.heads[idx] = Some(entry),
            Some(head) => {
                let at = self.blocks.alloc(Entry {
                    next: head.next,
                    ..entry
                });
                head.next = Some(at);
            }
        }
        self.len += 1;
    }

    /// Unlink the entry for `ptr`; true if it was found
    fn remove(&mut self, ptr: *const StrObject, hash: Hash) -> bool {
        let idx = self.index(hash);
        let Some(head) = self.heads[idx].as_ref() else {
            return false;
        };

        if head.holds(ptr) {
            // Pull the first chained entry into the head slot
            self.heads[idx] = match head.next {
                Some(at) => self.blocks.free(at),
                None => None,
            };
            self.len -= 1;
            return true;
        }

        let mut prev = Link::Head;
        let mut cur = head.next;
        while let Some(at) = cur {
            let Some(entry) = self.blocks.get(at) else {
                return false;
            };
            let next = entry.next;
            if entry.holds(ptr) {
                self.blocks.free(at);
                match prev {
                    Link::Head => {
                        if let Some(head) = self.heads[idx].as_mut() {
                            head.next = next;
                        }
                    }
                    Link::Slot(p) => {
                        if let Some(prev_entry) = self.blocks.get_mut(p) {
                            prev_entry.next = next;
                        }
                    }
                }
                self.len -= 1;
                return true;
            }
            prev = Link::Slot(at);
            cur = next;
        }
        false
    }
}

/// Look up an interned string by content
pub fn lookup(bytes: &[u8]) -> Option<Str> {
    let hash = hash_bytes(bytes);
    INTERNED
        .with(|t| t.borrow().find(hash, bytes))
        .map(Str::from_rc)
}

/// Return the canonical string for `bytes`, creating it if needed
pub fn intern_bytes(bytes: &[u8]) -> Str {
    let hash = hash_bytes(bytes);
    INTERNED.with(|t| {
        let mut table = t.borrow_mut();
        settle(&mut table);
        if let Some(rc) = table.find(hash, bytes) {
            return Str::from_rc(rc);
        }
        let s = Str::new(bytes);
        register(&mut table, &s, hash);
        s
    })
}

/// Return the canonical string equal to `s`, registering `s` if it is the first
pub fn intern_str(s: &Str) -> Str {
    if s.is_interned() {
        return s.clone();
    }
    let hash = s.hash();
    INTERNED.with(|t| {
        let mut table = t.borrow_mut();
        settle(&mut table);
        if let Some(rc) = table.find(hash, s.as_bytes()) {
            return Str::from_rc(rc);
        }
        register(&mut table, s, hash);
        s.clone()
    })
}

fn register(table: &mut InternTable, s: &Str, hash: Hash) {
    s.object().mark_interned();
    table.insert(s.object(), hash);
    tracing::trace!(len = s.len(), hash, "interned string");
}

/// Remove a dying string from the table. Called from the string destructor.
pub(crate) fn unintern(ptr: *const StrObject, hash: Hash) {
    // The table may already be gone during thread teardown
    let _ = INTERNED.try_with(|t| {
        let Ok(mut table) = t.try_borrow_mut() else {
            // The dead weak entry stays until the next mutable access
            tracing::warn!(hash, "intern table busy, deferring removal");
            DEFERRED.with(|d| d.borrow_mut().push((ptr, hash)));
            return;
        };
        if !table.remove(ptr, hash) {
            tracing::warn!(hash, "interned string missing from intern table");
        } else {
            tracing::trace!(hash, "uninterned string");
        }
    });
}

/// Current table usage on this thread
pub fn stats() -> InternStats {
    INTERNED.with(|t| {
        let mut table = t.borrow_mut();
        settle(&mut table);
        InternStats {
            entries: table.len,
            table_size: table.heads.len(),
            blocks: table.blocks.stats(),
        }
    })
}
