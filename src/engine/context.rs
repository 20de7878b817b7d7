//! Engine context: heap ownership and the evaluation entry point.

use crate::engine::eval;
use crate::engine::heap::{CollectStats, Heap};
use crate::engine::value::{HeapRef, ScriptValue};
use crate::engine::EngineError;

/// One engine instance: a heap, its collector, and the evaluator.
///
/// The context is the boundary the bridge talks to; nothing host-side leaks
/// in here.
#[derive(Default)]
pub struct EngineContext {
    heap: Heap,
}

impl EngineContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and run a source text, returning the raw engine value.
    pub fn evaluate(&mut self, source: &str) -> Result<ScriptValue, EngineError> {
        let expr = eval::parse(source)?;
        eval::eval_expr(&mut self.heap, &expr, &[], &[])
    }

    /// Call an engine function value with already-converted arguments.
    pub fn call(&mut self, f: HeapRef, args: &[ScriptValue]) -> Result<ScriptValue, EngineError> {
        eval::call_function(&mut self.heap, f, args)
    }

    /// Run the engine collector to completion.
    pub fn collect(&mut self) -> CollectStats {
        self.heap.collect()
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }
}
