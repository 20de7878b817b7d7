//! Tagged engine values.
//!
//! Scalars are immediate; everything else lives in the engine heap and is
//! reached through a generation-checked [`HeapRef`]. A `HeapRef` is only
//! safely dereferenced while the value it names is rooted.

/// Handle into the engine heap.
///
/// The generation counter detects use of a handle whose slot was reclaimed
/// and reused; dereferencing a stale handle is a contract violation in the
/// rooting layer, not a recoverable condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HeapRef {
    pub(crate) idx: u32,
    pub(crate) gen: u32,
}

impl HeapRef {
    /// Raw slot index, exposed for diagnostics.
    pub fn index(self) -> u32 {
        self.idx
    }
}

/// An engine value: the engine's half of every crossing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScriptValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Ref(HeapRef),
}

impl ScriptValue {
    pub fn is_undefined(self) -> bool {
        matches!(self, ScriptValue::Undefined)
    }

    pub fn is_null(self) -> bool {
        matches!(self, ScriptValue::Null)
    }

    pub fn heap_ref(self) -> Option<HeapRef> {
        match self {
            ScriptValue::Ref(r) => Some(r),
            _ => None,
        }
    }
}
