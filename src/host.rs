//! Host-side value model.
//!
//! [`HostValue`] mirrors the engine's tag set with two deliberate
//! asymmetries: the host has both an absence value ([`HostValue::Absent`],
//! engine `undefined`) and a distinguishable null singleton
//! ([`HostValue::Null`], engine `null`), and boxed primitives never appear
//! as a host-visible type — they unwrap at the crossing.

use crate::codec::{self, StringRepr, StringWidth};
use crate::error::BridgeError;
use crate::function::BoundFunction;
use crate::roots::RootGuard;
use chrono::NaiveDateTime;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Debug)]
pub enum HostValue {
    /// The host's absence value; maps to and from engine `undefined`.
    Absent,
    /// The null singleton; maps to and from engine `null`. Never collapses
    /// into [`HostValue::Absent`].
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(HostString),
    Date(NaiveDateTime),
    Function(BoundFunction),
    Object(ObjectHandle),
}

impl HostValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, HostValue::Absent)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    pub fn as_str(&self) -> Option<&HostString> {
        match self {
            HostValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&BoundFunction> {
        match self {
            HostValue::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Numeric view across the int/float family.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Int(i) => Some(*i as f64),
            HostValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Absent, HostValue::Absent) => true,
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            (HostValue::Float(a), HostValue::Float(b)) => a == b,
            // The numeric family compares across representations, the way
            // host `3 == 3.0` holds.
            (HostValue::Int(a), HostValue::Float(b)) | (HostValue::Float(b), HostValue::Int(a)) => {
                *a as f64 == *b
            }
            (HostValue::Str(a), HostValue::Str(b)) => a == b,
            (HostValue::Date(a), HostValue::Date(b)) => a == b,
            (HostValue::Function(a), HostValue::Function(b)) => a == b,
            (HostValue::Object(a), HostValue::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<i64> for HostValue {
    fn from(i: i64) -> Self {
        HostValue::Int(i)
    }
}

impl From<f64> for HostValue {
    fn from(f: f64) -> Self {
        HostValue::Float(f)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Str(HostString::from_text(s))
    }
}

/// A host string carrying its storage width.
///
/// Strings decoded from the engine keep their engine storage width and a
/// guard that roots the engine-side original; re-crossing such a string
/// reuses the rooted value instead of copying. Host-born strings carry no
/// guard.
#[derive(Clone)]
pub struct HostString {
    repr: StringRepr,
    root: Option<Rc<RootGuard>>,
}

impl HostString {
    /// Encode host text; width is selected by the codec policy.
    pub fn from_text(s: &str) -> Self {
        let cps: Vec<u32> = s.chars().map(|c| c as u32).collect();
        Self {
            repr: codec::encode_unchecked(&cps),
            root: None,
        }
    }

    /// Encode an arbitrary code-point sequence, including surrogate values.
    pub fn from_code_points(cps: &[u32]) -> Result<Self, BridgeError> {
        Ok(Self {
            repr: codec::encode_code_points(cps)?,
            root: None,
        })
    }

    /// Wrap raw 16-bit units as-is; unpaired surrogates are preserved.
    pub fn from_wide16(units: Vec<u16>) -> Self {
        Self {
            repr: StringRepr::Wide16(units),
            root: None,
        }
    }

    pub(crate) fn rooted(repr: StringRepr, guard: Rc<RootGuard>) -> Self {
        Self {
            repr,
            root: Some(guard),
        }
    }

    pub fn repr(&self) -> &StringRepr {
        &self.repr
    }

    pub fn width(&self) -> StringWidth {
        self.repr.width()
    }

    /// Length in storage units of the string's own width.
    pub fn len(&self) -> usize {
        self.repr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repr.is_empty()
    }

    /// Diagnostic conversion to the canonical full-code-point form.
    pub fn to_full_code_points(&self) -> Vec<u32> {
        codec::to_full_code_point_form(&self.repr)
    }

    /// The string as a canonical wide-32 [`HostString`], the form whose
    /// unit count matches host-native length.
    pub fn as_full_code_point_form(&self) -> HostString {
        HostString {
            repr: StringRepr::Wide32(self.to_full_code_points()),
            root: None,
        }
    }

    pub(crate) fn root(&self) -> Option<&Rc<RootGuard>> {
        self.root.as_ref()
    }
}

impl PartialEq for HostString {
    /// Equality over storage units widened to 32 bits: narrow and wide-16
    /// strings with the same unit sequence compare equal, but a surrogate
    /// pair never equals the supplementary code point it encodes. Compare
    /// through [`HostString::as_full_code_point_form`] for that.
    fn eq(&self, other: &Self) -> bool {
        codec::widen_units(&self.repr) == codec::widen_units(&other.repr)
    }
}

impl PartialEq<str> for HostString {
    fn eq(&self, other: &str) -> bool {
        codec::widen_units(&self.repr)
            .into_iter()
            .eq(other.chars().map(|c| c as u32))
    }
}

impl PartialEq<&str> for HostString {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl fmt::Debug for HostString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostString")
            .field("width", &self.width())
            .field("len", &self.len())
            .field("rooted", &self.root.is_some())
            .finish()
    }
}

/// Opaque handle to an engine object; identity-preserving, no property
/// marshalling.
#[derive(Clone)]
pub struct ObjectHandle {
    pub(crate) guard: Rc<RootGuard>,
}

impl PartialEq for ObjectHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.guard, &other.guard)
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("slot_index", &self.guard.heap_ref().index())
            .finish()
    }
}
