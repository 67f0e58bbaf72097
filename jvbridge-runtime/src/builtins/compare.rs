//! Equality, identity, ordering and hashing
//!
//! Three notions of sameness:
//! - `==` compares values, propagates `missing`, and treats `NaN` as unequal
//! - `isequal` is total: `missing` equals `missing`, `NaN` equals `NaN`,
//!   `-0.0` differs from `0.0`; `hash` is consistent with it
//! - `===` is identity for mutable objects and bitwise equality otherwise

use std::cmp::Ordering;
use std::rc::Rc;

use crate::error::{RuntimeError, RuntimeResult};
use crate::objects::Value;

use super::iter::array_like;
use super::operations::{promote, Num, Promoted};

// ============================================================================
// ==
// ============================================================================

/// Result of `a == b`: `true`, `false` or `missing`
pub fn equals(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Missing, _) | (_, Value::Missing) => Value::Missing,
        _ => {
            if let (Some(x), Some(y)) = (Num::from_value(a), Num::from_value(b)) {
                return Value::Bool(num_eq(x, y));
            }
            match (a, b) {
                (Value::Str(x), Value::Str(y)) => Value::Bool(x == y),
                (Value::Symbol(x), Value::Symbol(y)) => Value::Bool(x == y),
                (Value::Type(x), Value::Type(y)) => Value::Bool(x == y),
                (Value::Tuple(xs), Value::Tuple(ys)) => {
                    if xs.len() != ys.len() {
                        return Value::Bool(false);
                    }
                    all_equal(xs.iter().zip(ys.iter()))
                }
                (Value::Pair(x), Value::Pair(y)) => {
                    all_equal([(&x.0, &y.0), (&x.1, &y.1)].into_iter())
                }
                (Value::Dict(x), Value::Dict(y)) => {
                    if Rc::ptr_eq(x, y) {
                        return Value::Bool(true);
                    }
                    if x.len() != y.len() {
                        return Value::Bool(false);
                    }
                    let entries = x.entries();
                    let mut others = Vec::with_capacity(entries.len());
                    for (key, _) in &entries {
                        match y.get(key) {
                            Some(other) => others.push(other),
                            None => return Value::Bool(false),
                        }
                    }
                    all_equal(entries.iter().map(|(_, v)| v).zip(others.iter()))
                }
                _ => match (array_like(a), array_like(b)) {
                    (Some((dx, xs)), Some((dy, ys))) => {
                        if dx != dy {
                            return Value::Bool(false);
                        }
                        all_equal(xs.iter().zip(ys.iter()))
                    }
                    _ => Value::Bool(egal(a, b)),
                },
            }
        }
    }
}

/// Three-valued conjunction of elementwise `==`
fn all_equal<'a>(pairs: impl Iterator<Item = (&'a Value, &'a Value)>) -> Value {
    let mut saw_missing = false;
    for (x, y) in pairs {
        match equals(x, y) {
            Value::Bool(false) => return Value::Bool(false),
            Value::Missing => saw_missing = true,
            _ => {}
        }
    }
    if saw_missing {
        Value::Missing
    } else {
        Value::Bool(true)
    }
}

fn num_eq(x: Num, y: Num) -> bool {
    match promote(x, y) {
        Promoted::Bool(p, q) => p == q,
        Promoted::Int(p, q, _) => p == q,
        Promoted::Float(p, q, _) => p == q,
        Promoted::Complex((a, b), (c, d), _) => a == c && b == d,
    }
}

// ============================================================================
// isequal
// ============================================================================

pub fn isequal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (Num::from_value(a), Num::from_value(b)) {
        return match promote(x, y) {
            Promoted::Float(p, q, _) => float_isequal(p, q),
            Promoted::Complex((a, b), (c, d), _) => float_isequal(a, c) && float_isequal(b, d),
            _ => num_eq(x, y),
        };
    }
    match (a, b) {
        (Value::Missing, Value::Missing) | (Value::Nothing, Value::Nothing) => true,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Symbol(x), Value::Symbol(y)) => x == y,
        (Value::Type(x), Value::Type(y)) => x == y,
        (Value::Tuple(xs), Value::Tuple(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(x, y)| isequal(x, y))
        }
        (Value::Pair(x), Value::Pair(y)) => isequal(&x.0, &y.0) && isequal(&x.1, &y.1),
        (Value::Dict(x), Value::Dict(y)) => {
            Rc::ptr_eq(x, y)
                || (x.len() == y.len()
                    && x.entries()
                        .iter()
                        .all(|(k, v)| y.get(k).map_or(false, |w| isequal(v, &w))))
        }
        _ => match (array_like(a), array_like(b)) {
            (Some((dx, xs)), Some((dy, ys))) => {
                dx == dy && xs.len() == ys.len() && xs.iter().zip(&ys).all(|(x, y)| isequal(x, y))
            }
            _ => egal(a, b),
        },
    }
}

fn float_isequal(p: f64, q: f64) -> bool {
    if p.is_nan() || q.is_nan() {
        return p.is_nan() && q.is_nan();
    }
    p == q && p.is_sign_negative() == q.is_sign_negative()
}

// ============================================================================
// ===
// ============================================================================

pub fn egal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Nothing, Value::Nothing) | (Value::Missing, Value::Missing) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int8(x), Value::Int8(y)) => x == y,
        (Value::Int16(x), Value::Int16(y)) => x == y,
        (Value::Int32(x), Value::Int32(y)) => x == y,
        (Value::Int64(x), Value::Int64(y)) => x == y,
        (Value::UInt8(x), Value::UInt8(y)) => x == y,
        (Value::UInt16(x), Value::UInt16(y)) => x == y,
        (Value::UInt32(x), Value::UInt32(y)) => x == y,
        (Value::UInt64(x), Value::UInt64(y)) => x == y,
        (Value::Float32(x), Value::Float32(y)) => x.to_bits() == y.to_bits(),
        (Value::Float64(x), Value::Float64(y)) => x.to_bits() == y.to_bits(),
        (Value::ComplexF32(x), Value::ComplexF32(y)) => {
            x.re.to_bits() == y.re.to_bits() && x.im.to_bits() == y.im.to_bits()
        }
        (Value::ComplexF64(x), Value::ComplexF64(y)) => {
            x.re.to_bits() == y.re.to_bits() && x.im.to_bits() == y.im.to_bits()
        }
        (Value::Irrational(x), Value::Irrational(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Symbol(x), Value::Symbol(y)) => x == y,
        (Value::Tuple(xs), Value::Tuple(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(x, y)| egal(x, y))
        }
        (Value::Pair(x), Value::Pair(y)) => egal(&x.0, &y.0) && egal(&x.1, &y.1),
        (Value::Range(a0, a1), Value::Range(b0, b1)) => a0 == b0 && a1 == b1,
        (Value::Type(x), Value::Type(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => Rc::ptr_eq(x, y),
        (Value::BitVector(x), Value::BitVector(y)) => Rc::ptr_eq(x, y),
        (Value::Dict(x), Value::Dict(y)) => Rc::ptr_eq(x, y),
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Module(x), Value::Module(y)) => Rc::ptr_eq(x, y),
        (Value::Struct(x), Value::Struct(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            !x.def.mutable
                && x.def == y.def
                && x.field_values()
                    .iter()
                    .zip(y.field_values().iter())
                    .all(|(p, q)| egal(p, q))
        }
        _ => false,
    }
}

// ============================================================================
// Ordering
// ============================================================================

/// Order of two values under `<`; `None` when unordered (`NaN`)
pub fn ordering(name: &str, a: &Value, b: &Value) -> RuntimeResult<Option<Ordering>> {
    if let (Some(x), Some(y)) = (Num::from_value(a), Num::from_value(b)) {
        return match promote(x, y) {
            Promoted::Bool(p, q) => Ok(Some(p.cmp(&q))),
            Promoted::Int(p, q, _) => Ok(Some(p.cmp(&q))),
            Promoted::Float(p, q, _) => Ok(p.partial_cmp(&q)),
            Promoted::Complex(..) => Err(RuntimeError::method(name, &[a.clone(), b.clone()])),
        };
    }
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(Some(x.cmp(y))),
        (Value::Symbol(x), Value::Symbol(y)) => Ok(Some(x.as_str().cmp(y.as_str()))),
        (Value::Tuple(xs), Value::Tuple(ys)) => {
            for (x, y) in xs.iter().zip(ys.iter()) {
                match ordering(name, x, y)? {
                    Some(Ordering::Equal) => continue,
                    other => return Ok(other),
                }
            }
            Ok(Some(xs.len().cmp(&ys.len())))
        }
        _ => Err(RuntimeError::method(name, &[a.clone(), b.clone()])),
    }
}

// ============================================================================
// hash
// ============================================================================

const INT_SEED: u64 = 0x5bd1_e995_c6a4_a793;
const FLOAT_SEED: u64 = 0x27d4_eb2f_1656_67c5;
const STR_SEED: u64 = 0x71b1_a19b_907d_6e33;
const SYMBOL_SEED: u64 = 0x4cf5_ad43_2745_937f;
const TUPLE_SEED: u64 = 0x77cf_a1ee_f01b_ca90;
const ARRAY_SEED: u64 = 0x7e2a_3c7c_e3b4_f2a0;
const DICT_SEED: u64 = 0xa3e1_7b2c_5d9f_0e11;
const PAIR_SEED: u64 = 0x2b5f_03a1_9c3d_11e7;
const NOTHING_HASH: u64 = 0x6b2f_c3d1_0a4e_8f52;
const MISSING_HASH: u64 = 0x1d8e_4e27_c47d_124f;

/// splitmix64 finalizer over a running state
pub(crate) fn mix(state: u64, x: u64) -> u64 {
    let mut z = state
        ^ x.wrapping_add(0x9e37_79b9_7f4a_7c15)
            .wrapping_add(state << 6)
            .wrapping_add(state >> 2);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

fn hash_bytes(seed: u64, bytes: &[u8]) -> u64 {
    let mut fnv: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        fnv ^= u64::from(*byte);
        fnv = fnv.wrapping_mul(0x0100_0000_01b3);
    }
    mix(seed, fnv)
}

fn hash_int(v: i128) -> u64 {
    mix(INT_SEED, v as u64) ^ ((v >> 64) as u64)
}

fn hash_real(x: f64) -> u64 {
    if x.is_nan() {
        return mix(FLOAT_SEED, 0x7ff8_0000_0000_0000);
    }
    if x.fract() == 0.0 && x.abs() < 1.7e38 {
        return hash_int(x as i128);
    }
    mix(FLOAT_SEED, x.to_bits())
}

fn hash_num(n: Num) -> u64 {
    match n {
        Num::Bool(b) => hash_int(b.into()),
        Num::Int(v, _) => hash_int(v),
        Num::Complex(re, im, _) if im != 0.0 => mix(hash_real(re), hash_real(im)),
        other => hash_real(other.real()),
    }
}

fn hash_sequence<'a>(seed: u64, dims: &[usize], items: impl Iterator<Item = &'a Value>) -> u64 {
    let mut state = dims.iter().fold(seed, |h, d| mix(h, *d as u64));
    for item in items {
        state = mix(state, hash_value(item));
    }
    state
}

/// Hash consistent with `isequal`
pub fn hash_value(value: &Value) -> u64 {
    if let Some(n) = Num::from_value(value) {
        return hash_num(n);
    }
    match value {
        Value::Nothing => NOTHING_HASH,
        Value::Missing => MISSING_HASH,
        Value::Str(s) => hash_bytes(STR_SEED, s.as_bytes()),
        Value::Symbol(s) => hash_bytes(SYMBOL_SEED, s.as_str().as_bytes()),
        Value::Tuple(items) => hash_sequence(TUPLE_SEED, &[], items.iter()),
        Value::Pair(p) => mix(mix(PAIR_SEED, hash_value(&p.0)), hash_value(&p.1)),
        Value::Dict(d) => {
            let folded = d
                .entries()
                .iter()
                .fold(0u64, |acc, (k, v)| acc ^ mix(hash_value(k), hash_value(v)));
            mix(mix(DICT_SEED, d.len() as u64), folded)
        }
        Value::Type(t) => hash_bytes(SYMBOL_SEED ^ TUPLE_SEED, t.to_string().as_bytes()),
        Value::Struct(s) if !s.def.mutable => {
            let seed = hash_bytes(TUPLE_SEED, s.def.name.as_bytes());
            hash_sequence(seed, &[], s.field_values().iter())
        }
        Value::Struct(s) => mix(TUPLE_SEED, Rc::as_ptr(s) as usize as u64),
        Value::Function(f) => mix(SYMBOL_SEED, Rc::as_ptr(f) as usize as u64),
        Value::Module(m) => mix(SYMBOL_SEED, Rc::as_ptr(m) as usize as u64),
        other => match array_like(other) {
            Some((dims, items)) => hash_sequence(ARRAY_SEED, &dims, items.iter()),
            None => 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::Irrational;
    use proptest::prelude::*;

    #[test]
    fn test_equals_across_numeric_types() {
        assert!(matches!(equals(&Value::Int8(1), &Value::Float64(1.0)), Value::Bool(true)));
        assert!(matches!(equals(&Value::Bool(true), &Value::Int64(1)), Value::Bool(true)));
        assert!(matches!(
            equals(&Value::Float64(f64::NAN), &Value::Float64(f64::NAN)),
            Value::Bool(false)
        ));
    }

    #[test]
    fn test_equals_propagates_missing() {
        assert!(matches!(equals(&Value::Missing, &Value::Int64(1)), Value::Missing));
        let t1 = Value::tuple(vec![Value::Int64(1), Value::Missing]);
        let t2 = Value::tuple(vec![Value::Int64(2), Value::Missing]);
        assert!(matches!(equals(&t1, &t2), Value::Bool(false)));
        assert!(matches!(equals(&t1, &t1), Value::Missing));
    }

    #[test]
    fn test_isequal_special_floats() {
        assert!(isequal(&Value::Float64(f64::NAN), &Value::Float64(f64::NAN)));
        assert!(!isequal(&Value::Float64(0.0), &Value::Float64(-0.0)));
        assert!(isequal(&Value::Missing, &Value::Missing));
    }

    #[test]
    fn test_hash_consistent_with_isequal() {
        assert_eq!(hash_value(&Value::Int64(1)), hash_value(&Value::Float64(1.0)));
        assert_eq!(hash_value(&Value::UInt8(7)), hash_value(&Value::Int32(7)));
        assert_ne!(hash_value(&Value::str("1")), hash_value(&Value::Int64(1)));
        let pi = Value::Irrational(Irrational::Pi);
        assert_eq!(hash_value(&pi), hash_value(&Value::Float64(std::f64::consts::PI)));
    }

    #[test]
    fn test_egal_distinguishes_widths() {
        assert!(!egal(&Value::Int32(1), &Value::Int64(1)));
        assert!(egal(&Value::str("a"), &Value::str("a")));
        let t = Value::tuple(vec![Value::Int64(1), Value::str("x")]);
        assert!(egal(&t, &t.clone()));
    }

    #[test]
    fn test_ordering() {
        let ord = ordering("<", &Value::Int64(1), &Value::Float64(1.5)).unwrap();
        assert_eq!(ord, Some(Ordering::Less));
        let ord = ordering("<", &Value::Float64(f64::NAN), &Value::Float64(1.0)).unwrap();
        assert_eq!(ord, None);
        assert!(ordering("<", &Value::str("a"), &Value::Int64(1)).is_err());
    }

    proptest! {
        #[test]
        fn prop_hash_agrees_with_isequal_across_widths(n in any::<i32>()) {
            let wide = Value::Int64(n as i64);
            for narrow in [Value::Int32(n), Value::Float64(n as f64)] {
                prop_assert!(isequal(&wide, &narrow));
                prop_assert_eq!(hash_value(&wide), hash_value(&narrow));
            }
        }

        #[test]
        fn prop_distinct_integers_differ(a in any::<i64>(), b in any::<i64>()) {
            prop_assume!(a != b);
            prop_assert!(!isequal(&Value::Int64(a), &Value::Int64(b)));
        }
    }
}
