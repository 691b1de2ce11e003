//! List - a growable array of values
//!
//! Indices are `i64`; negative indices count from the end (`-1` is the last
//! element). Storage follows an over-allocation policy that keeps appends
//! amortized O(1) and avoids reallocating on small insert/remove cycles:
//!
//! ```text
//! new_allocated = n + n / 8 + (if n < 9 { 3 } else { 6 })
//! ```
//!
//! applied when an insert no longer fits, or when a removal leaves `n`
//! below half of the current allocation.

use crate::error::{self, Exception, Result};
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

pub struct ListObject {
    items: Vec<Value>,
}

/// Handle to a shared, mutable list
#[derive(Clone)]
pub struct List(Rc<RefCell<ListObject>>);

/// Capacity the growth policy picks for `new_size` elements
fn over_allocate(new_size: usize) -> Option<usize> {
    if new_size == 0 {
        return Some(0);
    }
    let extra = if new_size < 9 { 3 } else { 6 };
    new_size.checked_add(new_size >> 3)?.checked_add(extra)
}

/// Make room for `new_size` elements. Never shrinks, so a capacity given to
/// [`List::with_capacity`] survives the first appends.
fn grow_storage(items: &mut Vec<Value>, new_size: usize) -> Result<()> {
    let allocated = items.capacity();
    if allocated >= new_size {
        return Ok(());
    }
    let new_allocated = over_allocate(new_size).ok_or_else(Exception::memory_error)?;
    items
        .try_reserve_exact(new_allocated - items.len())
        .map_err(|_| Exception::memory_error())
}

/// Give back memory once the list has fallen below half its allocation
fn shrink_storage(items: &mut Vec<Value>) {
    let len = items.len();
    if len >= (items.capacity() >> 1) {
        return;
    }
    // Within half of the allocation the policy never overflows
    let target = over_allocate(len).unwrap_or(len);
    if target < items.capacity() {
        items.shrink_to(target);
    }
}

/// Resolve a possibly negative index against `len`
fn resolve(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { index + len } else { index };
    (0..len).contains(&i).then_some(i as usize)
}

fn out_of_range(message: &str) -> Exception {
    Exception::new(error::INDEX_ERROR, message)
}

impl List {
    pub fn new() -> Self {
        List(Rc::new(RefCell::new(ListObject { items: Vec::new() })))
    }

    pub fn with_capacity(capacity: usize) -> Self {
        List(Rc::new(RefCell::new(ListObject {
            items: Vec::with_capacity(capacity),
        })))
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        List(Rc::new(RefCell::new(ListObject { items })))
    }

    pub fn len(&self) -> usize {
        self.0.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().items.is_empty()
    }

    /// Slots currently allocated
    pub fn capacity(&self) -> usize {
        self.0.borrow().items.capacity()
    }

    pub fn get(&self, index: i64) -> Result<Value> {
        let list = self.0.borrow();
        resolve(index, list.items.len())
            .map(|i| list.items[i].clone())
            .ok_or_else(|| out_of_range("List index out of range"))
    }

    /// Like [`List::get`] but out-of-range indices yield `Undefined`
    pub fn get_or_undefined(&self, index: i64) -> Value {
        let list = self.0.borrow();
        resolve(index, list.items.len())
            .map(|i| list.items[i].clone())
            .unwrap_or(Value::Undefined)
    }

    /// Replace the element at `index`
    pub fn set(&self, index: i64, value: Value) -> Result<()> {
        let old = {
            let mut list = self.0.borrow_mut();
            let i = resolve(index, list.items.len())
                .ok_or_else(|| out_of_range("List assignment out of range"))?;
            std::mem::replace(&mut list.items[i], value)
        };
        // Released after the borrow: its destructor may reach this list
        drop(old);
        Ok(())
    }

    /// Insert before `index`, clamping it into `[0, len]`
    pub fn insert(&self, index: i64, value: Value) -> Result<()> {
        let mut list = self.0.borrow_mut();
        let len = list.items.len();
        let mut i = index;
        if i < 0 {
            i = (i + len as i64).max(0);
        }
        let i = (i as usize).min(len);
        grow_storage(&mut list.items, len + 1)?;
        list.items.insert(i, value);
        Ok(())
    }

    pub fn append(&self, value: Value) -> Result<()> {
        let mut list = self.0.borrow_mut();
        let len = list.items.len();
        grow_storage(&mut list.items, len + 1)?;
        list.items.push(value);
        Ok(())
    }

    /// Remove and return the element at `index`
    pub fn remove(&self, index: i64) -> Result<Value> {
        let mut list = self.0.borrow_mut();
        let i = resolve(index, list.items.len())
            .ok_or_else(|| out_of_range("List index out of range"))?;
        let value = list.items.remove(i);
        shrink_storage(&mut list.items);
        Ok(value)
    }

    /// Release every element and the storage
    pub fn clear(&self) {
        let items = std::mem::take(&mut self.0.borrow_mut().items);
        drop(items);
    }

    /// Snapshot of the elements
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().items.clone()
    }

    /// Iterate over a snapshot, so the list may be mutated while iterating
    pub fn iter(&self) -> std::vec::IntoIter<Value> {
        self.to_vec().into_iter()
    }

    pub fn ptr_eq(&self, other: &List) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub(crate) fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}

impl Default for List {
    fn default() -> Self {
        List::new()
    }
}

impl FromIterator<Value> for List {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        List::from_vec(iter.into_iter().collect())
    }
}

impl From<Vec<Value>> for List {
    fn from(items: Vec<Value>) -> Self {
        List::from_vec(items)
    }
}
