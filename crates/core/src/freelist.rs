//! Free-list slab allocation for fixed-size records
//!
//! Dictionary overflow buckets and intern-table buckets are small records
//! that come and go constantly. Instead of one heap allocation per record
//! they live in slabs:
//!
//! - [`FreeList`]: one fixed-capacity slab. Vacant slots form an intrusive
//!   singly-linked chain threaded through the slots themselves, so
//!   allocation and release are O(1) pointer swaps.
//! - [`BlockChain`]: a growing list of slabs. A new block is only added when
//!   every existing block is full, either doubling in size or at a fixed size.
//!
//! Every slot carries a generation counter that is bumped on release. A
//! [`SlotRef`] remembers the generation it was issued with, so a stale handle
//! to a recycled slot reads as `None` instead of aliasing the new occupant.

/// Handle to an occupied slot in a [`BlockChain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef {
    block: u32,
    slot: u32,
    generation: u32,
}

enum Slot<T> {
    Vacant { next: Option<u32>, generation: u32 },
    Occupied { value: T, generation: u32 },
}

/// A fixed-capacity slab with an intrusive vacancy chain
pub struct FreeList<T> {
    slots: Box<[Slot<T>]>,
    head: Option<u32>,
    vacant: usize,
}

impl<T> FreeList<T> {
    /// Create a slab with every slot threaded onto the vacancy chain
    pub fn with_capacity(capacity: usize) -> Self {
        let slots: Box<[Slot<T>]> = (0..capacity)
            .map(|i| Slot::Vacant {
                next: if i + 1 < capacity {
                    Some((i + 1) as u32)
                } else {
                    None
                },
                generation: 0,
            })
            .collect();
        FreeList {
            slots,
            head: if capacity > 0 { Some(0) } else { None },
            vacant: capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of vacant slots
    pub fn vacant(&self) -> usize {
        self.vacant
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.vacant
    }

    pub fn is_empty(&self) -> bool {
        self.vacant == self.slots.len()
    }

    pub fn is_full(&self) -> bool {
        self.head.is_none()
    }

    /// Pop a slot off the vacancy chain and store `value` in it.
    ///
    /// Returns the slot index and its generation, or gives the value back
    /// when the slab is full.
    pub fn insert(&mut self, value: T) -> Result<(u32, u32), T> {
        let Some(index) = self.head else {
            return Err(value);
        };
        let slot = &mut self.slots[index as usize];
        let (next, generation) = match *slot {
            Slot::Vacant { next, generation } => (next, generation),
            // The chain only ever links vacant slots
            Slot::Occupied { .. } => unreachable!("vacancy chain points at an occupied slot"),
        };
        *slot = Slot::Occupied { value, generation };
        self.head = next;
        self.vacant -= 1;
        Ok((index, generation))
    }

    /// Release a slot back onto the vacancy chain, returning its value
    pub fn remove(&mut self, index: u32, generation: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        match slot {
            Slot::Occupied { generation: g, .. } if *g == generation => {}
            _ => return None,
        }
        let vacated = std::mem::replace(
            slot,
            Slot::Vacant {
                next: self.head,
                generation: generation.wrapping_add(1),
            },
        );
        self.head = Some(index);
        self.vacant += 1;
        match vacated {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    pub fn get(&self, index: u32, generation: u32) -> Option<&T> {
        match self.slots.get(index as usize)? {
            Slot::Occupied { value, generation: g } if *g == generation => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, index: u32, generation: u32) -> Option<&mut T> {
        match self.slots.get_mut(index as usize)? {
            Slot::Occupied { value, generation: g } if *g == generation => Some(value),
            _ => None,
        }
    }
}

/// How a [`BlockChain`] sizes the blocks it adds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    /// Each new block is twice the size of the previous one
    Doubling,
    /// Every block has the base size
    Fixed,
}

/// Usage snapshot of a [`BlockChain`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStats {
    pub blocks: usize,
    pub slots: usize,
    pub live: usize,
    pub vacant: usize,
}

/// A list of [`FreeList`] blocks that grows on demand
pub struct BlockChain<T> {
    blocks: Vec<FreeList<T>>,
    base: usize,
    growth: Growth,
    label: &'static str,
}

impl<T> BlockChain<T> {
    /// `label` names the owner in diagnostics ("dict", "intern")
    pub fn new(base: usize, growth: Growth, label: &'static str) -> Self {
        BlockChain {
            blocks: Vec::new(),
            base: base.max(1),
            growth,
            label,
        }
    }

    fn next_block_size(&self) -> usize {
        match (self.growth, self.blocks.last()) {
            (Growth::Doubling, Some(last)) => last.capacity().saturating_mul(2),
            _ => self.base,
        }
    }

    /// Store a record, reusing any vacant slot before adding a block
    pub fn alloc(&mut self, value: T) -> SlotRef {
        // Newest blocks are the most likely to have room
        let mut value = value;
        for (block, list) in self.blocks.iter_mut().enumerate().rev() {
            if list.is_full() {
                continue;
            }
            match list.insert(value) {
                Ok((slot, generation)) => {
                    return SlotRef {
                        block: block as u32,
                        slot,
                        generation,
                    };
                }
                Err(v) => value = v,
            }
        }

        let size = self.next_block_size();
        tracing::debug!(
            owner = self.label,
            block = self.blocks.len(),
            size,
            "allocating bucket block"
        );
        let mut list = FreeList::with_capacity(size);
        let (slot, generation) = match list.insert(value) {
            Ok(placed) => placed,
            // A fresh block always has at least one slot
            Err(_) => unreachable!("fresh block rejected an insert"),
        };
        self.blocks.push(list);
        SlotRef {
            block: (self.blocks.len() - 1) as u32,
            slot,
            generation,
        }
    }

    /// Return a slot to its block's vacancy chain
    pub fn free(&mut self, at: SlotRef) -> Option<T> {
        self.blocks
            .get_mut(at.block as usize)?
            .remove(at.slot, at.generation)
    }

    pub fn get(&self, at: SlotRef) -> Option<&T> {
        self.blocks.get(at.block as usize)?.get(at.slot, at.generation)
    }

    pub fn get_mut(&mut self, at: SlotRef) -> Option<&mut T> {
        self.blocks
            .get_mut(at.block as usize)?
            .get_mut(at.slot, at.generation)
    }

    /// Drop every block at once, handing the blocks back to the caller so
    /// the records they hold can be dropped outside any borrow.
    pub fn take_blocks(&mut self) -> Vec<FreeList<T>> {
        std::mem::take(&mut self.blocks)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn stats(&self) -> BlockStats {
        self.blocks.iter().fold(BlockStats::default(), |mut acc, b| {
            acc.blocks += 1;
            acc.slots += b.capacity();
            acc.live += b.len();
            acc.vacant += b.vacant();
            acc
        })
    }
}
