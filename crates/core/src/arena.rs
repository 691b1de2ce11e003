//! Scratch arena - thread-local bump allocation for short-lived buffers
//!
//! Decoders that need many small temporary buffers (the JSON string
//! decoder's escape fragments, for instance) allocate them here instead of
//! on the heap, then copy the finished result into a [`crate::Str`].
//! Nothing allocated in the arena may outlive the closure passed to
//! [`with_arena`].
//!
//! Design:
//! - One `bumpalo::Bump` per thread
//! - Reset automatically once usage passes
//!   [`crate::HostConfig::arena_reset_threshold`], but only when no
//!   `with_arena` call is still running on this thread
//! - [`arena_reset`] for callers that finish a large batch

use crate::host;
use bumpalo::Bump;
use std::cell::{Cell, RefCell};

thread_local! {
    static ARENA: RefCell<Bump> = RefCell::new(Bump::new());
    static ARENA_BYTES_ALLOCATED: Cell<usize> = const { Cell::new(0) };
    static ARENA_RESETS: Cell<usize> = const { Cell::new(0) };
}

/// Run `f` with the thread-local arena.
///
/// Calls may nest; the automatic reset is deferred until the outermost
/// call returns.
///
/// # Example
/// ```rust
/// use dy_core::arena::with_arena;
///
/// let len = with_arena(|arena| arena.alloc_str("scratch").len());
/// assert_eq!(len, 7);
/// ```
pub fn with_arena<F, R>(f: F) -> R
where
    F: FnOnce(&Bump) -> R,
{
    let result = ARENA.with(|arena| {
        let bump = arena.borrow();
        let result = f(&bump);
        ARENA_BYTES_ALLOCATED.with(|bytes| bytes.set(bump.allocated_bytes()));
        result
    });

    if should_reset() {
        arena_reset();
    }
    result
}

/// Release everything allocated in this thread's arena.
///
/// Does nothing while a [`with_arena`] closure is running on this thread.
pub fn arena_reset() {
    ARENA.with(|arena| {
        let Ok(mut bump) = arena.try_borrow_mut() else {
            tracing::trace!("arena reset skipped: arena in use");
            return;
        };
        let released = bump.allocated_bytes();
        // reset() keeps the largest chunk; drop it too once it alone is over the limit
        if released > host::config().arena_reset_threshold {
            *bump = Bump::new();
        } else {
            bump.reset();
        }
        ARENA_BYTES_ALLOCATED.with(|bytes| bytes.set(0));
        ARENA_RESETS.with(|resets| resets.set(resets.get() + 1));
        tracing::trace!(released, "arena reset");
    });
}

fn should_reset() -> bool {
    ARENA_BYTES_ALLOCATED.with(|bytes| bytes.get()) > host::config().arena_reset_threshold
}

pub fn arena_stats() -> ArenaStats {
    ArenaStats {
        allocated_bytes: ARENA_BYTES_ALLOCATED.with(|bytes| bytes.get()),
        resets: ARENA_RESETS.with(|resets| resets.get()),
    }
}

/// Arena usage on the current thread
#[derive(Debug, Clone, Copy)]
pub struct ArenaStats {
    pub allocated_bytes: usize,
    /// Resets since the thread started, automatic ones included
    pub resets: usize,
}
