//! Engine-internal string storage.
//!
//! The engine stores strings in one of two widths, following the usual
//! engine convention: narrow (one byte per code point, Latin-1 superset)
//! when every code point fits, otherwise 16-bit code units with surrogate
//! pairs for supplementary-plane code points. Unpaired surrogates are valid
//! opaque data and pass through every operation unchanged. There is no
//! 32-bit storage on the engine side; that form exists only in the codec's
//! inspection path.

use bitflags::bitflags;

bitflags! {
    /// Classification bits computed once at construction.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct StringFlags: u8 {
        /// Every unit is 7-bit ASCII.
        const ASCII = 1 << 0;
        /// At least one unit is a surrogate code unit (paired or not).
        const SURROGATES = 1 << 1;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StringData {
    Narrow(Vec<u8>),
    Wide(Vec<u16>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineString {
    flags: StringFlags,
    data: StringData,
}

pub(crate) fn is_surrogate(unit: u32) -> bool {
    (0xd800..=0xdfff).contains(&unit)
}

fn is_high_surrogate(unit: u16) -> bool {
    (0xd800..=0xdbff).contains(&unit)
}

fn is_low_surrogate(unit: u16) -> bool {
    (0xdc00..=0xdfff).contains(&unit)
}

impl EngineString {
    pub fn narrow(bytes: Vec<u8>) -> Self {
        let mut flags = StringFlags::empty();
        if bytes.iter().all(|b| *b <= 0x7f) {
            flags |= StringFlags::ASCII;
        }
        Self {
            flags,
            data: StringData::Narrow(bytes),
        }
    }

    pub fn wide(units: Vec<u16>) -> Self {
        let mut flags = StringFlags::empty();
        if units.iter().any(|u| is_surrogate(*u as u32)) {
            flags |= StringFlags::SURROGATES;
        }
        Self {
            flags,
            data: StringData::Wide(units),
        }
    }

    /// Build a string from a code-point sequence, selecting the storage
    /// width: narrow when every code point fits a byte, otherwise 16-bit
    /// units with supplementary-plane code points written as surrogate
    /// pairs. Surrogate code points in the input are kept as single units.
    pub fn from_code_points(cps: &[u32]) -> Self {
        if cps.iter().all(|cp| *cp <= 0xff) {
            return Self::narrow(cps.iter().map(|cp| *cp as u8).collect());
        }
        let mut units = Vec::with_capacity(cps.len());
        for &cp in cps {
            debug_assert!(cp <= 0x10ffff, "code point out of range: {cp:#x}");
            if cp <= 0xffff {
                units.push(cp as u16);
            } else {
                let v = cp - 0x10000;
                units.push(0xd800 + (v >> 10) as u16);
                units.push(0xdc00 + (v & 0x3ff) as u16);
            }
        }
        Self::wide(units)
    }

    /// Length in storage units of the current width.
    pub fn len(&self) -> usize {
        match &self.data {
            StringData::Narrow(b) => b.len(),
            StringData::Wide(u) => u.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_ascii(&self) -> bool {
        self.flags.contains(StringFlags::ASCII)
    }

    pub fn has_surrogates(&self) -> bool {
        self.flags.contains(StringFlags::SURROGATES)
    }

    pub fn data(&self) -> &StringData {
        &self.data
    }

    /// The string as 16-bit code units, widening narrow storage.
    pub fn units16(&self) -> Vec<u16> {
        match &self.data {
            StringData::Narrow(b) => b.iter().map(|b| *b as u16).collect(),
            StringData::Wide(u) => u.clone(),
        }
    }

    /// The string as full code points: surrogate pairs combine, unpaired
    /// surrogates pass through as single invalid-but-preserved units.
    pub fn code_points(&self) -> Vec<u32> {
        match &self.data {
            StringData::Narrow(b) => b.iter().map(|b| *b as u32).collect(),
            StringData::Wide(u) => {
                if !self.has_surrogates() {
                    return u.iter().map(|u| *u as u32).collect();
                }
                pair_units(u)
            }
        }
    }

    /// Concatenation in code-unit space, so a trailing unpaired high
    /// surrogate never merges with a leading low surrogate.
    pub fn concat(&self, other: &EngineString) -> EngineString {
        if let (StringData::Narrow(a), StringData::Narrow(b)) = (&self.data, &other.data) {
            let mut out = Vec::with_capacity(a.len() + b.len());
            out.extend_from_slice(a);
            out.extend_from_slice(b);
            return EngineString::narrow(out);
        }
        let mut units = self.units16();
        units.extend(other.units16());
        if units.iter().all(|u| *u <= 0xff) {
            EngineString::narrow(units.into_iter().map(|u| u as u8).collect())
        } else {
            EngineString::wide(units)
        }
    }
}

/// Combine surrogate pairs in a 16-bit unit sequence into code points,
/// passing unpaired surrogates through unchanged.
pub(crate) fn pair_units(units: &[u16]) -> Vec<u32> {
    let mut out = Vec::with_capacity(units.len());
    let mut i = 0;
    while i < units.len() {
        let u = units[i];
        if is_high_surrogate(u) && i + 1 < units.len() && is_low_surrogate(units[i + 1]) {
            let hi = (u as u32 - 0xd800) << 10;
            let lo = units[i + 1] as u32 - 0xdc00;
            out.push(0x10000 + hi + lo);
            i += 2;
        } else {
            out.push(u as u32);
            i += 1;
        }
    }
    out
}
