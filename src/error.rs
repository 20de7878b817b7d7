//! Error taxonomy for the bridge layer.
//!
//! Every crossing surfaces its failure to the immediate caller; nothing is
//! swallowed. Collector invocation never returns an error: an inconsistency
//! discovered during collection is a tracker bug and panics instead.

use crate::engine::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// A string conversion would change length or corrupt code units.
    /// Fatal to the triggering call; the codec never truncates silently.
    #[error("string conversion would corrupt code units: {0}")]
    EncodingInvariantViolation(String),

    /// A host integer exceeds the exactly representable double range
    /// (|n| > 2^53). Only raised by the checked conversion path; the
    /// crossing path approximates and logs instead.
    #[error("integer {0} exceeds the exactly representable double range")]
    PrecisionLoss(i64),

    /// A function or tracked value was used after its owning engine
    /// context was torn down.
    #[error("engine context for this value has been torn down")]
    DetachedContext,

    /// Propagated verbatim from the engine; the bridge does not interpret
    /// the message, only forwards it.
    #[error("engine exception: {0}")]
    Engine(#[from] EngineError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_message_is_forwarded_verbatim() {
        let err = BridgeError::from(EngineError::new("boom"));
        assert_eq!(err.to_string(), "engine exception: boom");
    }

    #[test]
    fn detached_context_formats() {
        let msg = BridgeError::DetachedContext.to_string();
        assert!(msg.contains("torn down"));
    }
}
