//! Integration tests for the host/engine bridge.
//!
//! These tests validate the public API by evaluating engine source and
//! checking the coerced results: string round trips across all three
//! storage widths (with both collectors invoked mid-loop), boxed/unboxed
//! equality, the null/undefined distinction, numbers, dates, and the
//! function bridge.

use chrono::NaiveDate;
use mjsbridge::{BoundFunction, Bridge, HostString, HostValue, StringWidth};
use rand::Rng;

/// Render a code-point sequence as a single-quoted engine string literal,
/// escaping every unit so the Rust source stays valid UTF-8 even when the
/// sequence contains unpaired surrogates.
fn literal(cps: &[u32]) -> String {
    let mut out = String::with_capacity(cps.len() * 6 + 2);
    out.push('\'');
    for &cp in cps {
        if cp <= 0xffff {
            out.push_str(&format!("\\u{cp:04x}"));
        } else {
            out.push_str(&format!("\\u{{{cp:x}}}"));
        }
    }
    out.push('\'');
    out
}

fn eval_str(bridge: &Bridge, source: &str) -> HostString {
    match bridge.evaluate(source).expect("evaluation failed") {
        HostValue::Str(s) => s,
        other => panic!("expected a string result, got {other:?}"),
    }
}

fn eval_fn(bridge: &Bridge, source: &str) -> BoundFunction {
    bridge
        .evaluate(source)
        .expect("evaluation failed")
        .as_function()
        .cloned()
        .expect("expected a function result")
}

// ---------------------------------------------------------------------------
// String crossings
// ---------------------------------------------------------------------------

#[test]
fn eval_ascii_string() {
    let bridge = Bridge::new();
    let s = eval_str(&bridge, "'abc'");
    assert_eq!(s.width(), StringWidth::Narrow);
    assert_eq!(s, "abc");
}

#[test]
fn eval_latin1_string() {
    let bridge = Bridge::new();
    let s = eval_str(&bridge, "'a©Ð'");
    assert_eq!(s.width(), StringWidth::Narrow);
    assert_eq!(s.len(), 3);
    assert_eq!(s, "a©Ð");
}

#[test]
fn eval_string_with_embedded_nul() {
    let bridge = Bridge::new();
    let s = eval_str(&bridge, r"'a\x00©'");
    assert_eq!(s.len(), 3);
    assert_eq!(s, "a\u{0}©");
}

#[test]
fn eval_ucs2_string() {
    let bridge = Bridge::new();
    let s = eval_str(&bridge, "'ՄԸՋ'");
    assert_eq!(s.width(), StringWidth::Wide16);
    assert_eq!(s.len(), 3);
    assert_eq!(s, "ՄԸՋ");
}

#[test]
fn eval_string_with_unpaired_surrogate() {
    let bridge = Bridge::new();
    // "Ջ©" followed by a lone high surrogate
    let expected = [0x54b, 0xa9, 0xd8fe];
    let s = eval_str(&bridge, &literal(&expected));
    assert_eq!(s.len(), 3);
    assert_eq!(s.to_full_code_points(), expected);
    assert_eq!(s, HostString::from_code_points(&expected).unwrap());
}

#[test]
fn eval_supplementary_string_and_its_inspection_form() {
    let bridge = Bridge::new();
    let s = eval_str(&bridge, "'🀄🀛🜢'");
    // Engine interchange is 16-bit: three characters, six units. Without
    // the inspection step the pairs stay units and host text is unequal.
    assert_eq!(s.width(), StringWidth::Wide16);
    assert_eq!(s.len(), 6);
    assert_ne!(s, "🀄🀛🜢");

    let full = s.as_full_code_point_form();
    assert_eq!(full.width(), StringWidth::Wide32);
    assert_eq!(full.len(), 3);
    assert_eq!(full, "🀄🀛🜢");
}

/// Round-trip random strings drawn from `min_cp..=max_cp`, re-crossing the
/// previous result each iteration with both collectors run in between.
/// One round uses the largest demonstrated length (0xFFFF code points).
fn string_fuzz_roundtrip(bridge: &Bridge, min_cp: u32, max_cp: u32, boxed: bool) {
    let mut rng = rand::thread_rng();
    for round in 0..8 {
        let length: usize = if round == 0 {
            0xffff
        } else {
            rng.gen_range(0..0x1000)
        };
        let initial: Vec<u32> = (0..length)
            .map(|_| rng.gen_range(min_cp..=max_cp))
            .collect();

        let mut current = HostString::from_code_points(&initial).unwrap();
        let unit_len = current.len();
        let width = current.width();
        for _ in 0..8 {
            let lit = literal(&current.to_full_code_points());
            let source = if boxed {
                format!("new String({lit})")
            } else {
                lit
            };
            let next = eval_str(bridge, &source);
            assert_eq!(next.len(), unit_len);
            assert_eq!(next.width(), width);
            assert_eq!(next, current);

            // Both collectors: engine mark-sweep plus the host's
            // reference-counted reclamation of the previous crossing.
            drop(current);
            bridge.collect();

            assert_eq!(next.len(), unit_len);
            assert_eq!(next, HostString::from_code_points(&initial).unwrap());
            current = next;
        }
    }
}

#[test]
fn eval_latin1_string_fuzztest() {
    let bridge = Bridge::new();
    string_fuzz_roundtrip(&bridge, 0x00, 0xff, false);
}

#[test]
fn eval_ucs2_string_fuzztest() {
    let bridge = Bridge::new();
    string_fuzz_roundtrip(&bridge, 0x00, 0xffff, false);
}

#[test]
fn eval_ucs4_string_fuzztest() {
    let bridge = Bridge::new();
    string_fuzz_roundtrip(&bridge, 0x010000, 0x10ffff, false);
}

// ---------------------------------------------------------------------------
// Boxed primitives collapse to their unboxed counterparts
// ---------------------------------------------------------------------------

#[test]
fn eval_boxed_booleans() {
    let bridge = Bridge::new();
    assert_eq!(
        bridge.evaluate("new Boolean(true)").unwrap(),
        HostValue::Bool(true)
    );
    assert_eq!(
        bridge.evaluate("new Boolean(false)").unwrap(),
        HostValue::Bool(false)
    );
}

#[test]
fn eval_boxed_numbers_match_unboxed() {
    let bridge = Bridge::new();
    let mut rng = rand::thread_rng();
    for _ in 0..10 {
        let n: i64 = rng.gen_range(-1_000_000..=1_000_000);
        let boxed = bridge.evaluate(&format!("new Number({n})")).unwrap();
        let unboxed = bridge.evaluate(&format!("{n}")).unwrap();
        assert_eq!(boxed, HostValue::Int(n));
        assert_eq!(boxed, unboxed);
    }
    for _ in 0..10 {
        let f: f64 = rng.gen_range(-1_000_000.0..1_000_000.0);
        let boxed = bridge.evaluate(&format!("new Number({f:?})")).unwrap();
        assert_eq!(boxed.as_f64().unwrap(), f);
    }
}

#[test]
fn eval_boxed_strings_match_unboxed() {
    let bridge = Bridge::new();
    for cps in [
        vec![0x61, 0x62, 0x63],    // "abc"
        vec![0x61, 0xa9, 0xd0],    // latin-1
        vec![0x61, 0x00, 0xa9],    // embedded NUL
        vec![0x544, 0x538, 0x54b], // BMP beyond latin-1
        vec![0x54b, 0xa9, 0xd8fe], // unpaired surrogate
    ] {
        let lit = literal(&cps);
        let boxed = eval_str(&bridge, &format!("new String({lit})"));
        let unboxed = eval_str(&bridge, &lit);
        assert_eq!(boxed.to_full_code_points().len(), cps.len());
        assert_eq!(boxed, unboxed);
    }

    let boxed = eval_str(&bridge, "new String('🀄🀛🜢')");
    assert_eq!(boxed.as_full_code_point_form().len(), 3);
    assert_eq!(boxed, eval_str(&bridge, "'🀄🀛🜢'"));
}

#[test]
fn eval_boxed_string_fuzztest() {
    let bridge = Bridge::new();
    string_fuzz_roundtrip(&bridge, 0x00, 0xff, true);
    string_fuzz_roundtrip(&bridge, 0x00, 0xffff, true);
    string_fuzz_roundtrip(&bridge, 0x010000, 0x10ffff, true);
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

#[test]
fn eval_booleans() {
    let bridge = Bridge::new();
    assert_eq!(bridge.evaluate("true").unwrap(), HostValue::Bool(true));
    assert_eq!(bridge.evaluate("false").unwrap(), HostValue::Bool(false));
}

#[test]
fn eval_integers() {
    let bridge = Bridge::new();
    let mut rng = rand::thread_rng();
    for _ in 0..10 {
        let n: i64 = rng.gen_range(-1_000_000..=1_000_000);
        assert_eq!(bridge.evaluate(&format!("{n}")).unwrap(), HostValue::Int(n));
    }
}

#[test]
fn eval_floats() {
    let bridge = Bridge::new();
    let mut rng = rand::thread_rng();
    for _ in 0..10 {
        let f: f64 = rng.gen_range(-1_000_000.0..1_000_000.0);
        // `{f:?}` prints enough digits to round-trip the exact bits.
        let result = bridge.evaluate(&format!("{f:?}")).unwrap();
        assert_eq!(result.as_f64().unwrap(), f);
    }
}

#[test]
fn eval_undefined_is_absence() {
    let bridge = Bridge::new();
    let v = bridge.evaluate("undefined").unwrap();
    assert!(v.is_absent());
    assert_ne!(v, bridge.null());
}

#[test]
fn eval_null_is_the_singleton() {
    let bridge = Bridge::new();
    let v = bridge.evaluate("null").unwrap();
    assert_eq!(v, bridge.null());
    assert_eq!(v, HostValue::Null);
    assert!(!v.is_absent());
}

#[test]
fn null_and_undefined_round_trip_through_the_engine() {
    let bridge = Bridge::new();
    let identity = eval_fn(&bridge, "(x) => { return x }");

    let back = identity.call(&[HostValue::Null]).unwrap();
    assert_eq!(back, bridge.null());

    let back = identity.call(&[HostValue::Absent]).unwrap();
    assert!(back.is_absent());
}

#[test]
fn eval_dates() {
    let bridge = Bridge::new();
    let mut rng = rand::thread_rng();
    for _ in 0..10 {
        let year = rng.gen_range(1..=2023);
        let month = rng.gen_range(1..=12u32);
        let day = rng.gen_range(1..=28u32);
        let hour = rng.gen_range(0..24u32);
        let minute = rng.gen_range(0..60u32);
        let second = rng.gen_range(0..60u32);
        let ms = rng.gen_range(0..1000u32);

        let expected = NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_milli_opt(hour, minute, second, ms)
            .unwrap();
        // The constructor takes a zero-based month.
        let source = format!(
            "new Date({year}, {}, {day}, {hour}, {minute}, {second}, {ms})",
            month - 1
        );
        assert_eq!(bridge.evaluate(&source).unwrap(), HostValue::Date(expected));
    }
}

// ---------------------------------------------------------------------------
// Function bridge
// ---------------------------------------------------------------------------

#[test]
fn eval_functions() {
    let bridge = Bridge::new();
    let mut rng = rand::thread_rng();

    let f = eval_fn(&bridge, "() => { return undefined }");
    assert!(f.call(&[]).unwrap().is_absent());

    let g = eval_fn(&bridge, "() => { return null }");
    assert_eq!(g.call(&[]).unwrap(), bridge.null());

    let sum = eval_fn(&bridge, "(a, b) => {return a + b}");
    for _ in 0..10 {
        let a: i64 = rng.gen_range(-1000..=1000);
        let b: i64 = rng.gen_range(-1000..=1000);
        assert_eq!(
            sum.call(&[HostValue::Int(a), HostValue::Int(b)]).unwrap(),
            HostValue::Int(a + b)
        );
    }
    for _ in 0..10 {
        let a: f64 = rng.gen_range(-1000.0..1000.0);
        let b: f64 = rng.gen_range(-1000.0..1000.0);
        let out = sum
            .call(&[HostValue::Float(a), HostValue::Float(b)])
            .unwrap();
        assert_eq!(out.as_f64().unwrap(), a + b);
    }
}

#[test]
fn function_arguments_cross_through_the_string_codec() {
    let bridge = Bridge::new();
    let join = eval_fn(&bridge, "(a, b) => { return a + b }");
    let out = join
        .call(&[HostValue::from("Ջ©"), HostValue::from("🀄")])
        .unwrap();
    let s = out.as_str().expect("string result");
    assert_eq!(s.to_full_code_points(), vec![0x54b, 0xa9, 0x1f004]);
}

#[test]
fn calling_into_a_torn_down_engine_is_an_error() {
    let bridge = Bridge::new();
    let f = eval_fn(&bridge, "(a, b) => { return a + b }");
    drop(bridge);
    assert!(matches!(
        f.call(&[HostValue::Int(1), HostValue::Int(2)]),
        Err(mjsbridge::BridgeError::DetachedContext)
    ));
}

// ---------------------------------------------------------------------------
// Collector coordination
// ---------------------------------------------------------------------------

#[test]
fn values_survive_explicit_collection_on_both_sides() {
    let bridge = Bridge::new();
    let mut kept = Vec::new();
    for i in 0..100 {
        let s = eval_str(&bridge, &format!("'payload-{i}' + '©'"));
        kept.push((s, format!("payload-{i}©")));
        if i % 7 == 0 {
            bridge.collect();
        }
    }
    bridge.collect();
    bridge.collect();
    for (s, expected) in &kept {
        assert_eq!(s, expected.as_str());
    }
}

#[test]
fn registry_growth_is_bounded_under_repeated_crossings() {
    let bridge = Bridge::new();
    for _ in 0..1000 {
        let v = bridge.evaluate("'short lived'").unwrap();
        assert!(v.as_str().is_some());
        drop(v);
    }
    assert_eq!(bridge.tracked_roots(), 0);
    bridge.collect();

    // Re-crossing one live value by identity shares a single root.
    let identity = eval_fn(&bridge, "(x) => { return x }");
    let s = eval_str(&bridge, "'sticky'");
    let before = bridge.tracked_roots();
    let mut out = Vec::new();
    for _ in 0..50 {
        out.push(identity.call(&[HostValue::Str(s.clone())]).unwrap());
    }
    assert_eq!(bridge.tracked_roots(), before);
    bridge.collect();
    for v in &out {
        assert_eq!(v.as_str().unwrap(), &s);
    }
}

#[test]
fn object_handles_preserve_identity_across_crossings() {
    let bridge = Bridge::new();
    let identity = eval_fn(&bridge, "(x) => { return x }");
    let obj = bridge.evaluate("new Object()").unwrap();
    let back = identity.call(&[obj.clone()]).unwrap();
    assert_eq!(back, obj);

    bridge.collect();
    let again = identity.call(&[obj.clone()]).unwrap();
    assert_eq!(again, obj);
}
