//! Function bridge: engine functions as host-callable objects.

use crate::bridge::BridgeShared;
use crate::convert;
use crate::error::BridgeError;
use crate::host::HostValue;
use crate::roots::RootGuard;
use std::fmt;
use std::rc::{Rc, Weak};

/// An engine function value wrapped for host invocation.
///
/// Holds a weak reference to the owning context and a strong root on the
/// callable value: liveness is checked at call time, so calling after the
/// context is torn down fails with [`BridgeError::DetachedContext`]
/// instead of dereferencing a dead engine.
#[derive(Clone)]
pub struct BoundFunction {
    pub(crate) shared: Weak<BridgeShared>,
    pub(crate) guard: Rc<RootGuard>,
}

impl BoundFunction {
    /// Coerce `args` into engine values in order, perform the engine call,
    /// and coerce the result back, preserving the null/undefined
    /// distinction.
    pub fn call(&self, args: &[HostValue]) -> Result<HostValue, BridgeError> {
        let shared = self.shared.upgrade().ok_or(BridgeError::DetachedContext)?;
        if !self.guard.belongs_to(&shared.roots) {
            return Err(BridgeError::DetachedContext);
        }
        let mut engine_args = Vec::with_capacity(args.len());
        for arg in args {
            engine_args.push(convert::host_to_script(&shared, arg)?);
        }
        tracing::trace!(argc = args.len(), "calling engine function");
        let result = shared
            .ctx
            .borrow_mut()
            .call(self.guard.heap_ref(), &engine_args)?;
        convert::script_to_host(&shared, result)
    }
}

impl PartialEq for BoundFunction {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.guard, &other.guard)
    }
}

impl fmt::Debug for BoundFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundFunction")
            .field("slot_index", &self.guard.heap_ref().index())
            .field("detached", &(self.shared.upgrade().is_none()))
            .finish()
    }
}
