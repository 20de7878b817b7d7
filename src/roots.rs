//! Cross-runtime reference tracker.
//!
//! The registry is the single edge between the two reachability domains:
//! each entry pairs an engine heap handle with the host-side guard that
//! owns the matching engine root slot. A value crossing more than once
//! reuses its live entry, so referential identity on the engine side maps
//! to one tracked root no matter how many host references exist.
//!
//! Re-entrancy: entries are inserted during crossings and removed from
//! guard drops; both take short, non-overlapping borrows, so removal may
//! happen between any two insertions without corrupting the table. No
//! finalization order across entries is assumed.

use crate::engine::heap::RootSlot;
use crate::engine::value::{HeapRef, ScriptValue};
use crate::engine::EngineContext;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

pub struct RootTable {
    ctx: Weak<RefCell<EngineContext>>,
    entries: RefCell<HashMap<HeapRef, Weak<RootGuard>>>,
}

impl RootTable {
    pub(crate) fn new(ctx: &Rc<RefCell<EngineContext>>) -> Rc<Self> {
        Rc::new(Self {
            ctx: Rc::downgrade(ctx),
            entries: RefCell::new(HashMap::new()),
        })
    }

    /// Root `key` against the engine collector and return the owning
    /// guard, reusing the live entry when this value crossed before.
    pub(crate) fn acquire(self: &Rc<Self>, key: HeapRef) -> Rc<RootGuard> {
        if let Some(existing) = self.entries.borrow().get(&key).and_then(Weak::upgrade) {
            return existing;
        }
        let ctx = self
            .ctx
            .upgrade()
            .expect("root table outlived its engine context");
        let slot = ctx.borrow_mut().heap_mut().root(ScriptValue::Ref(key));
        let guard = Rc::new(RootGuard {
            table: Rc::downgrade(self),
            key,
            slot,
        });
        self.entries.borrow_mut().insert(key, Rc::downgrade(&guard));
        tracing::trace!(slot_index = key.index(), "rooted engine value");
        guard
    }

    /// Number of live tracked entries.
    pub fn len(&self) -> usize {
        self.entries
            .borrow()
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop bookkeeping for entries whose guards are gone. Guards remove
    /// themselves eagerly, so this only sweeps stragglers left by a torn
    /// down context.
    pub(crate) fn prune(&self) {
        self.entries
            .borrow_mut()
            .retain(|_, w| w.strong_count() > 0);
    }
}

/// Host-side owner of one engine root slot.
///
/// Shared by every host value derived from the same engine value; when the
/// last clone drops, the engine root is released and the registry entry
/// removed, in that order.
pub struct RootGuard {
    table: Weak<RootTable>,
    key: HeapRef,
    slot: RootSlot,
}

impl RootGuard {
    pub(crate) fn heap_ref(&self) -> HeapRef {
        self.key
    }

    /// Whether this guard was issued by `table`. Guards from another
    /// bridge, or from one already torn down, must not be dereferenced.
    pub(crate) fn belongs_to(&self, table: &Rc<RootTable>) -> bool {
        self.table.as_ptr() == Rc::as_ptr(table)
    }
}

impl Drop for RootGuard {
    fn drop(&mut self) {
        let Some(table) = self.table.upgrade() else {
            // Context and table are gone; the engine heap died with them.
            return;
        };
        if let Some(ctx) = table.ctx.upgrade() {
            ctx.borrow_mut().heap_mut().unroot(self.slot);
        }
        let mut entries = table.entries.borrow_mut();
        if let Some(w) = entries.get(&self.key) {
            if w.strong_count() == 0 {
                entries.remove(&self.key);
            }
        }
        tracing::trace!(slot_index = self.key.index(), "released engine root");
    }
}

impl fmt::Debug for RootGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootGuard")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::heap::HeapCell;
    use crate::engine::string::EngineString;

    fn setup() -> (Rc<RefCell<EngineContext>>, Rc<RootTable>, HeapRef) {
        let ctx = Rc::new(RefCell::new(EngineContext::new()));
        let table = RootTable::new(&ctx);
        let key = ctx
            .borrow_mut()
            .heap_mut()
            .alloc(HeapCell::Str(EngineString::narrow(b"x".to_vec())));
        (ctx, table, key)
    }

    #[test]
    fn guard_keeps_value_alive_and_releases_on_drop() {
        let (ctx, table, key) = setup();
        let guard = table.acquire(key);
        assert_eq!(table.len(), 1);

        ctx.borrow_mut().collect();
        assert!(ctx.borrow().heap().contains(key));

        drop(guard);
        assert_eq!(table.len(), 0);
        ctx.borrow_mut().collect();
        assert!(!ctx.borrow().heap().contains(key));
    }

    #[test]
    fn repeated_crossings_share_one_entry() {
        let (_ctx, table, key) = setup();
        let a = table.acquire(key);
        let b = table.acquire(key);
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(table.len(), 1);

        drop(a);
        // Still rooted through the second owner.
        assert_eq!(table.len(), 1);
        drop(b);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn reacquire_after_release_creates_a_fresh_entry() {
        let (ctx, table, key) = setup();
        drop(table.acquire(key));
        assert_eq!(table.len(), 0);
        // Value was never collected, so rooting it again is legal.
        let guard = table.acquire(key);
        assert_eq!(guard.heap_ref(), key);
        assert_eq!(ctx.borrow().heap().root_count(), 1);
    }

    #[test]
    fn guard_outliving_its_context_is_inert() {
        let (ctx, table, key) = setup();
        let guard = table.acquire(key);
        drop(table);
        drop(ctx);
        drop(guard); // must not panic
    }

    #[test]
    fn insert_and_remove_interleave_within_one_pass() {
        let (ctx, table, _key) = setup();
        let mut guards = Vec::new();
        for i in 0..64 {
            let key = ctx
                .borrow_mut()
                .heap_mut()
                .alloc(HeapCell::Str(EngineString::narrow(vec![i as u8])));
            guards.push(table.acquire(key));
            if i % 3 == 0 {
                guards.remove(0);
            }
        }
        let expected = guards.len();
        assert_eq!(table.len(), expected);
        ctx.borrow_mut().collect();
        for g in &guards {
            assert!(ctx.borrow().heap().contains(g.heap_ref()));
        }
    }
}
