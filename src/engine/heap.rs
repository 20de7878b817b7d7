//! Handle-based engine heap with an explicit mark-sweep collector.
//!
//! Values are reached through generation-checked slot indices rather than
//! pointers, so a collection only ever touches this table and root slots
//! are plain value locations. Allocation never triggers a collection; the
//! heap grows and reclaims only when [`Heap::collect`] is invoked.
//!
//! Invariants:
//! - A slot generation increments exactly when its cell is reclaimed, so a
//!   stale [`HeapRef`] can never alias a recycled slot.
//! - Root slots are the only collection roots; every value reachable from
//!   outside the engine must be registered in one.

use crate::engine::eval::Expr;
use crate::engine::string::EngineString;
use crate::engine::value::{HeapRef, ScriptValue};
use std::rc::Rc;

/// A heap-allocated engine value.
#[derive(Clone, Debug)]
pub enum HeapCell {
    Str(EngineString),
    /// Milliseconds since the epoch, truncated to millisecond resolution.
    Date(f64),
    BoxedBool(bool),
    BoxedNumber(f64),
    /// Boxed string; wraps the primitive string cell it was built from.
    BoxedStr(HeapRef),
    Function(FunctionData),
    Object(ObjectData),
}

#[derive(Clone, Debug)]
pub struct FunctionData {
    pub params: Vec<String>,
    pub body: Rc<Expr>,
}

#[derive(Clone, Debug, Default)]
pub struct ObjectData {
    pub props: Vec<(String, ScriptValue)>,
}

struct Slot {
    gen: u32,
    marked: bool,
    cell: Option<HeapCell>,
}

/// Index of an engine-side root slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RootSlot(u32);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub live: usize,
    pub freed: usize,
}

#[derive(Default)]
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    roots: Vec<Option<ScriptValue>>,
    roots_free: Vec<u32>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, cell: HeapCell) -> HeapRef {
        if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx as usize];
            debug_assert!(slot.cell.is_none());
            slot.cell = Some(cell);
            return HeapRef { idx, gen: slot.gen };
        }
        let idx = self.slots.len() as u32;
        self.slots.push(Slot {
            gen: 0,
            marked: false,
            cell: Some(cell),
        });
        HeapRef { idx, gen: 0 }
    }

    /// Panics on a stale or freed handle: that means a value escaped the
    /// rooting layer, which is a tracker bug, not a runtime condition.
    pub fn get(&self, r: HeapRef) -> &HeapCell {
        let slot = self
            .slots
            .get(r.idx as usize)
            .unwrap_or_else(|| panic!("heap handle {} out of bounds", r.idx));
        if slot.gen != r.gen {
            panic!("stale heap handle {} (gen {} != {})", r.idx, r.gen, slot.gen);
        }
        slot.cell
            .as_ref()
            .unwrap_or_else(|| panic!("heap handle {} points at a freed cell", r.idx))
    }

    /// Whether the handle still names a live cell.
    pub fn contains(&self, r: HeapRef) -> bool {
        self.slots
            .get(r.idx as usize)
            .is_some_and(|s| s.gen == r.gen && s.cell.is_some())
    }

    pub fn live(&self) -> usize {
        self.slots.iter().filter(|s| s.cell.is_some()).count()
    }

    /// Register an engine-side root holding `val` alive across collections.
    pub fn root(&mut self, val: ScriptValue) -> RootSlot {
        if let Some(idx) = self.roots_free.pop() {
            debug_assert!(self.roots[idx as usize].is_none());
            self.roots[idx as usize] = Some(val);
            return RootSlot(idx);
        }
        let idx = self.roots.len() as u32;
        self.roots.push(Some(val));
        RootSlot(idx)
    }

    pub fn unroot(&mut self, slot: RootSlot) {
        let entry = &mut self.roots[slot.0 as usize];
        assert!(entry.is_some(), "double release of root slot {}", slot.0);
        *entry = None;
        self.roots_free.push(slot.0);
    }

    pub fn root_count(&self) -> usize {
        self.roots.iter().filter(|r| r.is_some()).count()
    }

    /// Mark from the root slots, sweep everything unreachable, and bump the
    /// generation of every reclaimed slot. Runs to completion before
    /// returning; root slots may be added or released between collections
    /// in any order.
    pub fn collect(&mut self) -> CollectStats {
        let mut worklist: Vec<HeapRef> = self
            .roots
            .iter()
            .flatten()
            .filter_map(|v| v.heap_ref())
            .collect();

        while let Some(r) = worklist.pop() {
            let slot = &mut self.slots[r.idx as usize];
            if slot.gen != r.gen {
                panic!("root names a reclaimed cell: slot {}", r.idx);
            }
            if slot.marked {
                continue;
            }
            slot.marked = true;
            match slot.cell.as_ref() {
                Some(HeapCell::BoxedStr(inner)) => worklist.push(*inner),
                Some(HeapCell::Object(obj)) => {
                    for (_, v) in &obj.props {
                        if let ScriptValue::Ref(r) = v {
                            worklist.push(*r);
                        }
                    }
                }
                Some(_) => {}
                None => panic!("root names a freed cell: slot {}", r.idx),
            }
        }

        let mut stats = CollectStats::default();
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if slot.cell.is_none() {
                continue;
            }
            if slot.marked {
                slot.marked = false;
                stats.live += 1;
            } else {
                slot.cell = None;
                slot.gen = slot.gen.wrapping_add(1);
                self.free.push(idx as u32);
                stats.freed += 1;
            }
        }
        stats
    }
}
