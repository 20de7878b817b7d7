//! In-process value marshalling between a reference-counted host runtime
//! and an embedded script engine with its own heap and garbage collector.
//!
//! The bridge evaluates engine source and exchanges primitive and boxed
//! values across the boundary without violating either runtime's memory
//! safety or string-encoding invariants:
//!
//! - scalars, dates, and boxed primitives convert through [`convert`];
//! - strings negotiate among three storage widths in [`codec`], preserving
//!   byte-for-byte round trips including unpaired surrogates;
//! - the [`roots`] registry keeps every engine value reachable from a live
//!   host value rooted against the engine collector, and releases the root
//!   exactly when the last host reference drops;
//! - engine functions become host-callable [`BoundFunction`]s that fail
//!   with [`BridgeError::DetachedContext`] once their context is gone.
//!
//! ```
//! use mjsbridge::{Bridge, HostValue};
//!
//! let bridge = Bridge::new();
//! assert_eq!(bridge.evaluate("true").unwrap(), HostValue::Bool(true));
//! assert_eq!(bridge.evaluate("new Boolean(false)").unwrap(), HostValue::Bool(false));
//!
//! let s = bridge.evaluate(r"'a\x00©'").unwrap();
//! assert_eq!(s.as_str().unwrap().len(), 3);
//!
//! // Engine `undefined` is host absence; engine `null` is a separate singleton.
//! assert!(bridge.evaluate("undefined").unwrap().is_absent());
//! assert_eq!(bridge.evaluate("null").unwrap(), bridge.null());
//! ```

pub mod bridge;
pub mod codec;
pub mod convert;
pub mod engine;
pub mod error;
pub mod function;
pub mod host;
pub mod roots;

pub use bridge::Bridge;
pub use codec::{StringRepr, StringWidth};
pub use convert::{checked_int_to_number, MAX_SAFE_INTEGER};
pub use error::BridgeError;
pub use function::BoundFunction;
pub use host::{HostString, HostValue, ObjectHandle};
