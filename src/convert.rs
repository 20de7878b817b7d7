//! Scalar and boxed-object coercion between the two type systems.
//!
//! Boxed boolean/number/string unwrap here: the host never sees a "boxed"
//! type, only the primitive. Non-scalar values are registered with the
//! root tracker on every outbound crossing; inbound crossings reuse the
//! tracked engine value when the host value still carries its guard.

use crate::bridge::BridgeShared;
use crate::codec::{self, StringRepr};
use crate::engine::heap::HeapCell;
use crate::engine::value::{HeapRef, ScriptValue};
use crate::engine::EngineError;
use crate::error::BridgeError;
use crate::function::BoundFunction;
use crate::host::{HostString, HostValue, ObjectHandle};
use chrono::DateTime;
use std::rc::Rc;

/// Largest integer magnitude exactly representable in a 53-bit-mantissa
/// double.
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Checked host-integer conversion for callers that need exactness:
/// magnitudes beyond [`MAX_SAFE_INTEGER`] fail with
/// [`BridgeError::PrecisionLoss`] instead of approximating.
pub fn checked_int_to_number(value: i64) -> Result<f64, BridgeError> {
    if value.unsigned_abs() > MAX_SAFE_INTEGER as u64 {
        return Err(BridgeError::PrecisionLoss(value));
    }
    Ok(value as f64)
}

/// Engine number to host: integral values in the exactly representable
/// range come back as `Int`, everything else (including `-0.0`, which
/// would lose its sign) as `Float`.
pub(crate) fn number_to_host(n: f64) -> HostValue {
    let integral = n.is_finite() && n.fract() == 0.0;
    let negative_zero = n == 0.0 && n.is_sign_negative();
    if integral && !negative_zero && n.abs() <= MAX_SAFE_INTEGER as f64 {
        HostValue::Int(n as i64)
    } else {
        HostValue::Float(n)
    }
}

enum Crossing {
    Str(StringRepr, HeapRef),
    Date(i64),
    Bool(bool),
    Number(f64),
    Function,
    Object,
}

/// Convert an engine value into its host representation, rooting every
/// non-scalar against the engine collector.
pub(crate) fn script_to_host(
    shared: &Rc<BridgeShared>,
    value: ScriptValue,
) -> Result<HostValue, BridgeError> {
    let r = match value {
        ScriptValue::Undefined => return Ok(HostValue::Absent),
        ScriptValue::Null => return Ok(HostValue::Null),
        ScriptValue::Bool(b) => return Ok(HostValue::Bool(b)),
        ScriptValue::Number(n) => return Ok(number_to_host(n)),
        ScriptValue::Ref(r) => r,
    };

    // Read what we need under a short borrow, then root without any
    // engine borrow held.
    let crossing = {
        let ctx = shared.ctx.borrow();
        let heap = ctx.heap();
        match heap.get(r) {
            HeapCell::Str(s) => Crossing::Str(codec::decode(s), r),
            HeapCell::BoxedStr(inner) => match heap.get(*inner) {
                HeapCell::Str(s) => Crossing::Str(codec::decode(s), *inner),
                _ => panic!("boxed string wraps a non-string cell"),
            },
            HeapCell::Date(ms) => Crossing::Date(*ms as i64),
            HeapCell::BoxedBool(b) => Crossing::Bool(*b),
            HeapCell::BoxedNumber(n) => Crossing::Number(*n),
            HeapCell::Function(_) => Crossing::Function,
            HeapCell::Object(_) => Crossing::Object,
        }
    };

    match crossing {
        Crossing::Str(repr, sref) => {
            let guard = shared.roots.acquire(sref);
            Ok(HostValue::Str(HostString::rooted(repr, guard)))
        }
        Crossing::Date(ms) => {
            let dt = DateTime::from_timestamp_millis(ms).ok_or_else(|| {
                BridgeError::Engine(EngineError::new("RangeError: date value out of range"))
            })?;
            Ok(HostValue::Date(dt.naive_utc()))
        }
        Crossing::Bool(b) => Ok(HostValue::Bool(b)),
        Crossing::Number(n) => Ok(number_to_host(n)),
        Crossing::Function => Ok(HostValue::Function(BoundFunction {
            shared: Rc::downgrade(shared),
            guard: shared.roots.acquire(r),
        })),
        Crossing::Object => Ok(HostValue::Object(ObjectHandle {
            guard: shared.roots.acquire(r),
        })),
    }
}

/// Convert a host value into its engine representation. Values that still
/// carry a guard from this bridge re-cross by identity; everything else is
/// encoded fresh.
pub(crate) fn host_to_script(
    shared: &Rc<BridgeShared>,
    value: &HostValue,
) -> Result<ScriptValue, BridgeError> {
    match value {
        HostValue::Absent => Ok(ScriptValue::Undefined),
        HostValue::Null => Ok(ScriptValue::Null),
        HostValue::Bool(b) => Ok(ScriptValue::Bool(*b)),
        HostValue::Int(i) => {
            if i.unsigned_abs() > MAX_SAFE_INTEGER as u64 {
                tracing::warn!(
                    value = *i,
                    "integer exceeds the exact double range; approximating"
                );
            }
            Ok(ScriptValue::Number(*i as f64))
        }
        HostValue::Float(f) => Ok(ScriptValue::Number(*f)),
        HostValue::Str(s) => {
            if let Some(guard) = s.root() {
                if guard.belongs_to(&shared.roots) {
                    return Ok(ScriptValue::Ref(guard.heap_ref()));
                }
            }
            let engine = codec::to_engine(s.repr())?;
            let r = shared
                .ctx
                .borrow_mut()
                .heap_mut()
                .alloc(HeapCell::Str(engine));
            Ok(ScriptValue::Ref(r))
        }
        HostValue::Date(dt) => {
            let ms = dt.and_utc().timestamp_millis();
            let r = shared
                .ctx
                .borrow_mut()
                .heap_mut()
                .alloc(HeapCell::Date(ms as f64));
            Ok(ScriptValue::Ref(r))
        }
        HostValue::Function(f) => {
            if f.guard.belongs_to(&shared.roots) {
                Ok(ScriptValue::Ref(f.guard.heap_ref()))
            } else {
                Err(BridgeError::DetachedContext)
            }
        }
        HostValue::Object(o) => {
            if o.guard.belongs_to(&shared.roots) {
                Ok(ScriptValue::Ref(o.guard.heap_ref()))
            } else {
                Err(BridgeError::DetachedContext)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_come_back_as_ints() {
        assert_eq!(number_to_host(42.0), HostValue::Int(42));
        assert_eq!(number_to_host(-1_000_000.0), HostValue::Int(-1_000_000));
        assert_eq!(number_to_host(0.5), HostValue::Float(0.5));
    }

    #[test]
    fn negative_zero_keeps_its_sign() {
        match number_to_host(-0.0) {
            HostValue::Float(f) => {
                assert_eq!(f, 0.0);
                assert!(f.is_sign_negative());
            }
            other => panic!("expected float, got {other:?}"),
        }
    }

    #[test]
    fn nan_and_infinities_stay_floats() {
        assert!(matches!(number_to_host(f64::NAN), HostValue::Float(f) if f.is_nan()));
        assert_eq!(
            number_to_host(f64::INFINITY),
            HostValue::Float(f64::INFINITY)
        );
    }

    #[test]
    fn safe_range_boundary() {
        assert_eq!(
            number_to_host(MAX_SAFE_INTEGER as f64),
            HostValue::Int(MAX_SAFE_INTEGER)
        );
        assert!(matches!(
            number_to_host(MAX_SAFE_INTEGER as f64 + 2.0),
            HostValue::Float(_)
        ));
    }

    #[test]
    fn checked_conversion_flags_precision_loss() {
        assert_eq!(checked_int_to_number(1 << 53).ok(), None);
        assert!(matches!(
            checked_int_to_number((1 << 53) + 1),
            Err(BridgeError::PrecisionLoss(_))
        ));
        assert_eq!(checked_int_to_number(MAX_SAFE_INTEGER).unwrap(), 2f64.powi(53) - 1.0);
        assert_eq!(checked_int_to_number(-1_000_000).unwrap(), -1_000_000.0);
    }
}
