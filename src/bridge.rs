//! Evaluation entry point and session state.

use crate::convert;
use crate::engine::EngineContext;
use crate::error::BridgeError;
use crate::host::HostValue;
use crate::roots::RootTable;
use std::cell::RefCell;
use std::rc::Rc;

/// State shared between the bridge and the wrappers it hands out.
pub(crate) struct BridgeShared {
    pub(crate) ctx: Rc<RefCell<EngineContext>>,
    pub(crate) roots: Rc<RootTable>,
}

/// One engine instance plus the marshalling layer around it.
///
/// Single-threaded by construction; dropping the bridge tears down the
/// engine, after which wrappers that outlived it (functions, objects)
/// fail with [`BridgeError::DetachedContext`] at use.
pub struct Bridge {
    shared: Rc<BridgeShared>,
}

impl Bridge {
    pub fn new() -> Self {
        let ctx = Rc::new(RefCell::new(EngineContext::new()));
        let roots = RootTable::new(&ctx);
        Self {
            shared: Rc::new(BridgeShared { ctx, roots }),
        }
    }

    /// Compile and run `source` in the engine, returning the fully coerced
    /// result. Engine exceptions come back as [`BridgeError::Engine`] with
    /// the original message.
    pub fn evaluate(&self, source: &str) -> Result<HostValue, BridgeError> {
        tracing::debug!(source_len = source.len(), "evaluating source");
        let value = self.shared.ctx.borrow_mut().evaluate(source)?;
        convert::script_to_host(&self.shared, value)
    }

    /// Explicitly run the engine-side collector to completion and sweep
    /// stale registry bookkeeping. Never fails; values still referenced
    /// from the host stay rooted and survive.
    pub fn collect(&self) {
        let stats = self.shared.ctx.borrow_mut().collect();
        self.shared.roots.prune();
        tracing::debug!(
            live = stats.live,
            freed = stats.freed,
            tracked = self.shared.roots.len(),
            "engine collection finished"
        );
    }

    /// The exported null singleton, distinguishable from
    /// [`HostValue::Absent`].
    pub fn null(&self) -> HostValue {
        HostValue::Null
    }

    /// Number of live cross-runtime roots; bounded under repeated
    /// crossings of the same engine values.
    pub fn tracked_roots(&self) -> usize {
        self.shared.roots.len()
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}
