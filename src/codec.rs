//! String codec: the three storage widths and the conversions between them.
//!
//! Every string crossing the bridge is carried in a [`StringRepr`] tagged
//! with its storage width. Encode selects narrow storage when every code
//! point fits a byte, otherwise 16-bit units with surrogate pairs for
//! supplementary-plane code points, matching the engine's own convention.
//! Wide-32 is an inspection form only and never crosses into the engine.
//!
//! Invariants:
//! - Round trips that do not change width preserve unit count and unit
//!   content exactly, including embedded NUL and unpaired surrogates.
//! - Conversions never truncate; an unrepresentable unit is an error, not
//!   a substitution.

use crate::engine::string::{pair_units, EngineString, StringData};
use crate::error::BridgeError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringWidth {
    /// One byte per code point; Latin-1 superset of ASCII.
    Narrow,
    /// UTF-16 code units; may contain unpaired surrogates.
    Wide16,
    /// One code point per unit; inspection form, never engine interchange.
    Wide32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StringRepr {
    Narrow(Vec<u8>),
    Wide16(Vec<u16>),
    Wide32(Vec<u32>),
}

impl StringRepr {
    pub fn width(&self) -> StringWidth {
        match self {
            StringRepr::Narrow(_) => StringWidth::Narrow,
            StringRepr::Wide16(_) => StringWidth::Wide16,
            StringRepr::Wide32(_) => StringWidth::Wide32,
        }
    }

    /// Length in storage units of the current width.
    pub fn len(&self) -> usize {
        match self {
            StringRepr::Narrow(b) => b.len(),
            StringRepr::Wide16(u) => u.len(),
            StringRepr::Wide32(u) => u.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Width-selection policy over a code-point sequence. Infallible: callers
/// guarantee every code point is `<= 0x10FFFF`.
pub(crate) fn encode_unchecked(cps: &[u32]) -> StringRepr {
    if cps.iter().all(|cp| *cp <= 0xff) {
        return StringRepr::Narrow(cps.iter().map(|cp| *cp as u8).collect());
    }
    let mut units = Vec::with_capacity(cps.len());
    for &cp in cps {
        debug_assert!(cp <= 0x10ffff);
        if cp <= 0xffff {
            units.push(cp as u16);
        } else {
            let v = cp - 0x10000;
            units.push(0xd800 + (v >> 10) as u16);
            units.push(0xdc00 + (v & 0x3ff) as u16);
        }
    }
    StringRepr::Wide16(units)
}

/// Encode a code-point sequence, choosing the storage width.
///
/// Surrogate code points in the input are valid and stored as single
/// units. A value above U+10FFFF cannot be represented in any width and
/// fails rather than being substituted.
pub fn encode_code_points(cps: &[u32]) -> Result<StringRepr, BridgeError> {
    if let Some(bad) = cps.iter().find(|cp| **cp > 0x10ffff) {
        return Err(BridgeError::EncodingInvariantViolation(format!(
            "code point {bad:#x} is above U+10FFFF"
        )));
    }
    Ok(encode_unchecked(cps))
}

/// Copy an engine string out in its own storage width. Total; unit count
/// and content are preserved exactly.
pub fn decode(s: &EngineString) -> StringRepr {
    let repr = match s.data() {
        StringData::Narrow(b) => StringRepr::Narrow(b.clone()),
        StringData::Wide(u) => StringRepr::Wide16(u.clone()),
    };
    debug_assert_eq!(repr.len(), s.len());
    repr
}

/// Convert a bridge representation into engine storage. Narrow and wide-16
/// carry over unit-for-unit; wide-32 re-applies the width-selection policy
/// since the engine has no 32-bit form.
pub fn to_engine(repr: &StringRepr) -> Result<EngineString, BridgeError> {
    match repr {
        StringRepr::Narrow(b) => Ok(EngineString::narrow(b.clone())),
        StringRepr::Wide16(u) => Ok(EngineString::wide(u.clone())),
        StringRepr::Wide32(cps) => {
            if let Some(bad) = cps.iter().find(|cp| **cp > 0x10ffff) {
                return Err(BridgeError::EncodingInvariantViolation(format!(
                    "code point {bad:#x} is above U+10FFFF"
                )));
            }
            Ok(EngineString::from_code_points(cps))
        }
    }
}

/// The unit sequence widened to 32 bits per unit, pairing nothing. This is
/// positional unit content: a surrogate pair stays two units and never
/// collapses into the code point it encodes. Equality between bridge
/// strings is defined over this sequence.
pub(crate) fn widen_units(repr: &StringRepr) -> Vec<u32> {
    match repr {
        StringRepr::Narrow(b) => b.iter().map(|b| *b as u32).collect(),
        StringRepr::Wide16(u) => u.iter().map(|u| *u as u32).collect(),
        StringRepr::Wide32(u) => u.clone(),
    }
}

/// One-directional inspection conversion to the full-code-point form.
///
/// Surrogate pairs combine into supplementary-plane code points; unpaired
/// surrogates pass through as single preserved units. Used for equality
/// against host-native strings whose natural unit is a whole code point,
/// never for engine interchange.
pub fn to_full_code_point_form(repr: &StringRepr) -> Vec<u32> {
    match repr {
        StringRepr::Narrow(b) => b.iter().map(|b| *b as u32).collect(),
        StringRepr::Wide16(u) => pair_units(u),
        StringRepr::Wide32(u) => u.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_encodes_narrow() {
        let repr = encode_code_points(&[0x61, 0x00, 0xa9]).unwrap();
        assert_eq!(repr, StringRepr::Narrow(vec![0x61, 0x00, 0xa9]));
        assert_eq!(repr.width(), StringWidth::Narrow);
        assert_eq!(repr.len(), 3);
    }

    #[test]
    fn bmp_encodes_wide16() {
        let repr = encode_code_points(&[0x544, 0x61]).unwrap();
        assert_eq!(repr, StringRepr::Wide16(vec![0x544, 0x61]));
    }

    #[test]
    fn supplementary_plane_uses_surrogate_pairs() {
        let repr = encode_code_points(&[0x1f004, 0x1f01b, 0x1f722]).unwrap();
        match &repr {
            StringRepr::Wide16(u) => assert_eq!(u.len(), 6),
            other => panic!("expected wide-16, got {other:?}"),
        }
        assert_eq!(
            to_full_code_point_form(&repr),
            vec![0x1f004, 0x1f01b, 0x1f722]
        );
    }

    #[test]
    fn unpaired_surrogate_survives_both_directions() {
        let cps = [0x54b, 0xa9, 0xd8fe];
        let repr = encode_code_points(&cps).unwrap();
        assert_eq!(repr.len(), 3);
        let engine = to_engine(&repr).unwrap();
        assert_eq!(engine.len(), 3);
        assert_eq!(decode(&engine), repr);
        assert_eq!(to_full_code_point_form(&repr), cps);
    }

    #[test]
    fn widened_units_do_not_pair_surrogates() {
        let repr = StringRepr::Wide16(vec![0xd800, 0xdc00]);
        assert_eq!(widen_units(&repr), vec![0xd800, 0xdc00]);
        assert_eq!(to_full_code_point_form(&repr), vec![0x10000]);
    }

    #[test]
    fn out_of_range_code_point_is_rejected() {
        let err = encode_code_points(&[0x110000]).unwrap_err();
        assert!(matches!(err, BridgeError::EncodingInvariantViolation(_)));
        let err = to_engine(&StringRepr::Wide32(vec![0x110000])).unwrap_err();
        assert!(matches!(err, BridgeError::EncodingInvariantViolation(_)));
    }

    #[test]
    fn zero_length_strings_convert_in_every_width() {
        for repr in [
            StringRepr::Narrow(Vec::new()),
            StringRepr::Wide16(Vec::new()),
            StringRepr::Wide32(Vec::new()),
        ] {
            assert!(repr.is_empty());
            let engine = to_engine(&repr).unwrap();
            assert_eq!(engine.len(), 0);
            assert!(to_full_code_point_form(&repr).is_empty());
        }
    }

    #[test]
    fn wide32_to_engine_reselects_width() {
        let engine = to_engine(&StringRepr::Wide32(vec![0x61, 0x62])).unwrap();
        assert_eq!(decode(&engine), StringRepr::Narrow(vec![0x61, 0x62]));

        let engine = to_engine(&StringRepr::Wide32(vec![0x1f004])).unwrap();
        assert_eq!(decode(&engine), StringRepr::Wide16(vec![0xd83c, 0xdc04]));
    }
}
