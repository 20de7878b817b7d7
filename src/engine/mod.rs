//! Minimal embedded script engine.
//!
//! The engine owns its own handle-based heap and mark-sweep collector and
//! knows nothing about the host runtime on the other side of the bridge.
//! Its evaluation surface is deliberately small: literal expressions,
//! `new Boolean/Number/String/Date/Object(...)`, and arrow functions with
//! positional parameters and arithmetic bodies. Anything else raises an
//! [`EngineError`].

pub mod context;
pub mod eval;
pub mod heap;
pub mod string;
pub mod value;

pub use context::EngineContext;
pub use heap::{CollectStats, Heap, HeapCell, RootSlot};
pub use string::{EngineString, StringData};
pub use value::{HeapRef, ScriptValue};

use core::fmt;

/// An exception raised by the engine while compiling or executing source.
///
/// The bridge forwards the message without interpreting it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EngineError {}
