//! Polymorphic operations - type-generic arithmetic and bitwise operators
//!
//! Design: Operands are normalized into `Num`, promoted pairwise to a common
//! domain, computed there and re-boxed with the promoted type:
//! - Integer arithmetic wraps at the promoted width
//! - `/` always produces a float
//! - Irrationals stay exact until they meet another number
//! - `missing` propagates through every operator

use crate::error::{RuntimeError, RuntimeResult};
use crate::objects::{Irrational, Type, Value};

use super::string;

// ============================================================================
// Numeric normalization
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IntKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntKind {
    pub(crate) fn of(ty: &Type) -> Option<IntKind> {
        Some(match ty {
            Type::Int8 => IntKind::I8,
            Type::Int16 => IntKind::I16,
            Type::Int32 => IntKind::I32,
            Type::Int64 => IntKind::I64,
            Type::UInt8 => IntKind::U8,
            Type::UInt16 => IntKind::U16,
            Type::UInt32 => IntKind::U32,
            Type::UInt64 => IntKind::U64,
            _ => return None,
        })
    }

    pub(crate) fn bits(self) -> u32 {
        match self {
            IntKind::I8 | IntKind::U8 => 8,
            IntKind::I16 | IntKind::U16 => 16,
            IntKind::I32 | IntKind::U32 => 32,
            IntKind::I64 | IntKind::U64 => 64,
        }
    }

    pub(crate) fn signed(self) -> bool {
        matches!(self, IntKind::I8 | IntKind::I16 | IntKind::I32 | IntKind::I64)
    }

    pub(crate) fn min(self) -> i128 {
        if self.signed() {
            -(1i128 << (self.bits() - 1))
        } else {
            0
        }
    }

    pub(crate) fn max(self) -> i128 {
        if self.signed() {
            (1i128 << (self.bits() - 1)) - 1
        } else {
            (1i128 << self.bits()) - 1
        }
    }

    /// Reduce modulo 2^bits into this kind's range
    pub(crate) fn wrap(self, v: i128) -> i128 {
        match self {
            IntKind::I8 => v as i8 as i128,
            IntKind::I16 => v as i16 as i128,
            IntKind::I32 => v as i32 as i128,
            IntKind::I64 => v as i64 as i128,
            IntKind::U8 => v as u8 as i128,
            IntKind::U16 => v as u16 as i128,
            IntKind::U32 => v as u32 as i128,
            IntKind::U64 => v as u64 as i128,
        }
    }

    /// Box an in-range value
    pub(crate) fn value(self, v: i128) -> Value {
        let v = self.wrap(v);
        match self {
            IntKind::I8 => Value::Int8(v as i8),
            IntKind::I16 => Value::Int16(v as i16),
            IntKind::I32 => Value::Int32(v as i32),
            IntKind::I64 => Value::Int64(v as i64),
            IntKind::U8 => Value::UInt8(v as u8),
            IntKind::U16 => Value::UInt16(v as u16),
            IntKind::U32 => Value::UInt32(v as u32),
            IntKind::U64 => Value::UInt64(v as u64),
        }
    }

    fn promote(self, other: IntKind) -> IntKind {
        if self == other {
            return self;
        }
        match (self.signed(), other.signed()) {
            (true, true) | (false, false) => {
                if self.bits() >= other.bits() {
                    self
                } else {
                    other
                }
            }
            (true, false) => {
                if other.bits() >= self.bits() {
                    other
                } else {
                    self
                }
            }
            (false, true) => other.promote(self),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FloatKind {
    F32,
    F64,
}

impl FloatKind {
    pub(crate) fn value(self, x: f64) -> Value {
        match self {
            FloatKind::F32 => Value::Float32(x as f32),
            FloatKind::F64 => Value::Float64(x),
        }
    }

    pub(crate) fn complex(self, re: f64, im: f64) -> Value {
        use crate::objects::Complex;
        match self {
            FloatKind::F32 => Value::ComplexF32(Complex::new(re as f32, im as f32)),
            FloatKind::F64 => Value::ComplexF64(Complex::new(re, im)),
        }
    }

    fn widest(self, other: FloatKind) -> FloatKind {
        if self == FloatKind::F64 || other == FloatKind::F64 {
            FloatKind::F64
        } else {
            FloatKind::F32
        }
    }
}

/// A number stripped down to what arithmetic needs
#[derive(Debug, Clone, Copy)]
pub(crate) enum Num {
    Bool(bool),
    Int(i128, IntKind),
    Irr(Irrational),
    Float(f64, FloatKind),
    Complex(f64, f64, FloatKind),
}

impl Num {
    pub(crate) fn from_value(value: &Value) -> Option<Num> {
        Some(match *value {
            Value::Bool(b) => Num::Bool(b),
            Value::Int8(v) => Num::Int(v.into(), IntKind::I8),
            Value::Int16(v) => Num::Int(v.into(), IntKind::I16),
            Value::Int32(v) => Num::Int(v.into(), IntKind::I32),
            Value::Int64(v) => Num::Int(v.into(), IntKind::I64),
            Value::UInt8(v) => Num::Int(v.into(), IntKind::U8),
            Value::UInt16(v) => Num::Int(v.into(), IntKind::U16),
            Value::UInt32(v) => Num::Int(v.into(), IntKind::U32),
            Value::UInt64(v) => Num::Int(v.into(), IntKind::U64),
            Value::Irrational(c) => Num::Irr(c),
            Value::Float32(x) => Num::Float(x.into(), FloatKind::F32),
            Value::Float64(x) => Num::Float(x, FloatKind::F64),
            Value::ComplexF32(z) => Num::Complex(z.re.into(), z.im.into(), FloatKind::F32),
            Value::ComplexF64(z) => Num::Complex(z.re, z.im, FloatKind::F64),
            _ => return None,
        })
    }

    /// Real part as a float
    pub(crate) fn real(self) -> f64 {
        match self {
            Num::Bool(b) => f64::from(u8::from(b)),
            Num::Int(v, _) => v as f64,
            Num::Irr(c) => c.value(),
            Num::Float(x, _) => x,
            Num::Complex(re, _, _) => re,
        }
    }

    pub(crate) fn imag(self) -> f64 {
        match self {
            Num::Complex(_, im, _) => im,
            _ => 0.0,
        }
    }

    pub(crate) fn is_complex(self) -> bool {
        matches!(self, Num::Complex(..))
    }

    fn float_kind(self) -> Option<FloatKind> {
        match self {
            Num::Float(_, k) | Num::Complex(_, _, k) => Some(k),
            _ => None,
        }
    }
}

/// Two numbers moved into a shared domain
pub(crate) enum Promoted {
    Bool(bool, bool),
    Int(i128, i128, IntKind),
    Float(f64, f64, FloatKind),
    Complex((f64, f64), (f64, f64), FloatKind),
}

pub(crate) fn promote(a: Num, b: Num) -> Promoted {
    match (a, b) {
        (Num::Bool(x), Num::Bool(y)) => Promoted::Bool(x, y),
        (Num::Bool(x), Num::Int(y, k)) => Promoted::Int(x.into(), y, k),
        (Num::Int(x, k), Num::Bool(y)) => Promoted::Int(x, y.into(), k),
        (Num::Int(x, kx), Num::Int(y, ky)) => Promoted::Int(x, y, kx.promote(ky)),
        _ => {
            let kind = match (a.float_kind(), b.float_kind()) {
                (Some(x), Some(y)) => x.widest(y),
                (Some(k), None) | (None, Some(k)) => k,
                (None, None) => FloatKind::F64,
            };
            if a.is_complex() || b.is_complex() {
                Promoted::Complex((a.real(), a.imag()), (b.real(), b.imag()), kind)
            } else {
                Promoted::Float(a.real(), b.real(), kind)
            }
        }
    }
}

fn operands(name: &str, a: &Value, b: &Value) -> RuntimeResult<(Num, Num)> {
    match (Num::from_value(a), Num::from_value(b)) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(RuntimeError::method(name, &[a.clone(), b.clone()])),
    }
}

/// `missing` op number (or missing) is missing
fn propagates_missing(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Missing, other) | (other, Value::Missing) => {
            matches!(other, Value::Missing) || other.is_number()
        }
        _ => false,
    }
}

// ============================================================================
// Arithmetic
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    IntDiv,
    Fld,
    Rem,
    Mod,
}

impl Arith {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Arith::Add => "+",
            Arith::Sub => "-",
            Arith::Mul => "*",
            Arith::Div => "/",
            Arith::Pow => "^",
            Arith::IntDiv => "div",
            Arith::Fld => "fld",
            Arith::Rem => "rem",
            Arith::Mod => "mod",
        }
    }
}

pub(crate) fn arith(op: Arith, a: &Value, b: &Value) -> RuntimeResult<Value> {
    if propagates_missing(a, b) {
        return Ok(Value::Missing);
    }
    match (op, a, b) {
        (Arith::Mul, Value::Str(_), Value::Str(_)) => return string::concat(&[a.clone(), b.clone()]),
        (Arith::Pow, Value::Str(s), count) => return string::repeat(s, count),
        (Arith::Rem, value, Value::Type(ty)) => return reinterpret(value, ty),
        _ => {}
    }

    let (x, y) = operands(op.name(), a, b)?;
    if op == Arith::Pow {
        if let (Num::Int(base, kind), Num::Int(..) | Num::Bool(_)) = (x, y) {
            return int_pow(base, integer_of(y), kind);
        }
        if let (Num::Bool(base), Num::Int(..) | Num::Bool(_)) = (x, y) {
            return int_pow(base.into(), integer_of(y), IntKind::I64);
        }
    }

    match promote(x, y) {
        Promoted::Bool(p, q) => match op {
            Arith::Mul => Ok(Value::Bool(p && q)),
            _ => int_arith(op, p.into(), q.into(), IntKind::I64),
        },
        Promoted::Int(p, q, kind) => int_arith(op, p, q, kind),
        Promoted::Float(p, q, kind) => float_arith(op, p, q, kind),
        Promoted::Complex(p, q, kind) => complex_arith(op, p, q, kind, a, b),
    }
}

fn integer_of(n: Num) -> i128 {
    match n {
        Num::Int(v, _) => v,
        Num::Bool(b) => b.into(),
        _ => 0,
    }
}

fn int_arith(op: Arith, p: i128, q: i128, kind: IntKind) -> RuntimeResult<Value> {
    let result = match op {
        Arith::Add => p.wrapping_add(q),
        Arith::Sub => p.wrapping_sub(q),
        Arith::Mul => p.wrapping_mul(q),
        Arith::Div => return Ok(Value::Float64(p as f64 / q as f64)),
        Arith::Pow => return int_pow(p, q, kind),
        Arith::IntDiv | Arith::Fld | Arith::Rem | Arith::Mod if q == 0 => {
            return Err(RuntimeError::DivideByZero)
        }
        Arith::IntDiv => p / q,
        Arith::Fld => floor_div(p, q),
        Arith::Rem => p % q,
        Arith::Mod => {
            let r = p % q;
            if r != 0 && ((r < 0) != (q < 0)) {
                r + q
            } else {
                r
            }
        }
    };
    Ok(kind.value(result))
}

fn floor_div(p: i128, q: i128) -> i128 {
    let d = p / q;
    if p % q != 0 && ((p < 0) != (q < 0)) {
        d - 1
    } else {
        d
    }
}

fn int_pow(base: i128, exp: i128, kind: IntKind) -> RuntimeResult<Value> {
    if exp < 0 {
        return match base {
            1 => Ok(kind.value(1)),
            -1 => Ok(kind.value(if exp % 2 == 0 { 1 } else { -1 })),
            _ => Err(RuntimeError::Domain {
                value: exp.to_string(),
                message: format!(
                    "Cannot raise an integer x to a negative power {exp}. \
                     Make x or {exp} a float by adding a zero decimal (e.g., 2.0^{exp} or 2^{exp}.0 instead of 2^{exp})"
                ),
            }),
        };
    }
    let mut acc: i128 = 1;
    let mut factor = kind.wrap(base);
    let mut remaining = exp as u128;
    while remaining > 0 {
        if remaining & 1 == 1 {
            acc = kind.wrap(acc.wrapping_mul(factor));
        }
        factor = kind.wrap(factor.wrapping_mul(factor));
        remaining >>= 1;
    }
    Ok(kind.value(acc))
}

fn float_arith(op: Arith, p: f64, q: f64, kind: FloatKind) -> RuntimeResult<Value> {
    let result = match op {
        Arith::Add => p + q,
        Arith::Sub => p - q,
        Arith::Mul => p * q,
        Arith::Div => p / q,
        Arith::Pow => {
            if p < 0.0 && q.fract() != 0.0 {
                return Err(RuntimeError::Domain {
                    value: format!("{p}"),
                    message: "Exponentiation yielding a complex result requires a complex argument."
                        .to_string(),
                });
            }
            if q.fract() == 0.0 && q.abs() < i32::MAX as f64 {
                p.powi(q as i32)
            } else {
                p.powf(q)
            }
        }
        Arith::IntDiv => (p / q).trunc(),
        Arith::Fld => (p / q).floor(),
        Arith::Rem => p % q,
        Arith::Mod => {
            let r = p % q;
            if r != 0.0 && ((r < 0.0) != (q < 0.0)) {
                r + q
            } else {
                r
            }
        }
    };
    Ok(kind.value(result))
}

fn complex_arith(
    op: Arith,
    (a, b): (f64, f64),
    (c, d): (f64, f64),
    kind: FloatKind,
    lhs: &Value,
    rhs: &Value,
) -> RuntimeResult<Value> {
    let (re, im) = match op {
        Arith::Add => (a + c, b + d),
        Arith::Sub => (a - c, b - d),
        Arith::Mul => (a * c - b * d, a * d + b * c),
        Arith::Div => {
            let denom = c * c + d * d;
            ((a * c + b * d) / denom, (b * c - a * d) / denom)
        }
        Arith::Pow => complex_pow((a, b), (c, d)),
        _ => return Err(RuntimeError::method(op.name(), &[lhs.clone(), rhs.clone()])),
    };
    Ok(kind.complex(re, im))
}

fn complex_pow((a, b): (f64, f64), (c, d): (f64, f64)) -> (f64, f64) {
    if a == 0.0 && b == 0.0 {
        return if c == 0.0 && d == 0.0 { (1.0, 0.0) } else { (0.0, 0.0) };
    }
    let log_modulus = a.hypot(b).ln();
    let arg = b.atan2(a);
    // w * log(z)
    let re = c * log_modulus - d * arg;
    let im = c * arg + d * log_modulus;
    let scale = re.exp();
    (scale * im.cos(), scale * im.sin())
}

/// `x % T`: wrapping conversion of an integer to another integer type
fn reinterpret(value: &Value, ty: &Type) -> RuntimeResult<Value> {
    match (Num::from_value(value), IntKind::of(ty)) {
        (Some(Num::Int(v, _)), Some(kind)) => Ok(kind.value(v)),
        (Some(Num::Bool(b)), Some(kind)) => Ok(kind.value(b.into())),
        _ => Err(RuntimeError::method("rem", &[value.clone(), Value::Type(ty.clone())])),
    }
}

// ============================================================================
// Bitwise
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bitwise {
    And,
    Or,
    Xor,
}

impl Bitwise {
    fn name(self) -> &'static str {
        match self {
            Bitwise::And => "&",
            Bitwise::Or => "|",
            Bitwise::Xor => "xor",
        }
    }
}

pub(crate) fn bitwise(op: Bitwise, a: &Value, b: &Value) -> RuntimeResult<Value> {
    // Three-valued logic decides some results despite `missing`
    match (op, a, b) {
        (Bitwise::And, Value::Bool(false), Value::Missing)
        | (Bitwise::And, Value::Missing, Value::Bool(false)) => return Ok(Value::Bool(false)),
        (Bitwise::Or, Value::Bool(true), Value::Missing)
        | (Bitwise::Or, Value::Missing, Value::Bool(true)) => return Ok(Value::Bool(true)),
        _ if propagates_missing(a, b) => return Ok(Value::Missing),
        _ => {}
    }

    let (x, y) = operands(op.name(), a, b)?;
    match promote(x, y) {
        Promoted::Bool(p, q) => Ok(Value::Bool(match op {
            Bitwise::And => p & q,
            Bitwise::Or => p | q,
            Bitwise::Xor => p ^ q,
        })),
        Promoted::Int(p, q, kind) => Ok(kind.value(match op {
            Bitwise::And => p & q,
            Bitwise::Or => p | q,
            Bitwise::Xor => p ^ q,
        })),
        _ => Err(RuntimeError::method(op.name(), &[a.clone(), b.clone()])),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shift {
    Left,
    Right,
    LogicalRight,
}

impl Shift {
    fn name(self) -> &'static str {
        match self {
            Shift::Left => "<<",
            Shift::Right => ">>",
            Shift::LogicalRight => ">>>",
        }
    }

    fn reversed(self) -> Shift {
        match self {
            Shift::Left => Shift::Right,
            Shift::Right | Shift::LogicalRight => Shift::Left,
        }
    }
}

pub(crate) fn shift(op: Shift, a: &Value, b: &Value) -> RuntimeResult<Value> {
    if propagates_missing(a, b) {
        return Ok(Value::Missing);
    }
    let amount = match Num::from_value(b) {
        Some(Num::Int(n, _)) => n,
        Some(Num::Bool(bit)) => bit.into(),
        _ => return Err(RuntimeError::method(op.name(), &[a.clone(), b.clone()])),
    };
    if let Value::BitVector(bits) = a {
        return Ok(super::list::shift_bits(&bits.borrow(), op == Shift::Left, amount));
    }
    let (value, kind) = match Num::from_value(a) {
        Some(Num::Int(v, kind)) => (v, kind),
        Some(Num::Bool(bit)) => (bit.into(), IntKind::I64),
        _ => return Err(RuntimeError::method(op.name(), &[a.clone(), b.clone()])),
    };
    Ok(kind.value(shift_int(op, value, amount, kind)))
}

fn shift_int(op: Shift, value: i128, amount: i128, kind: IntKind) -> i128 {
    if amount < 0 {
        return shift_int(op.reversed(), value, -amount, kind);
    }
    let bits = i128::from(kind.bits());
    match op {
        Shift::Left if amount >= bits => 0,
        Shift::Left => kind.wrap(value.wrapping_shl(amount as u32)),
        Shift::Right if amount >= bits => {
            if value < 0 {
                -1
            } else {
                0
            }
        }
        Shift::Right => value >> amount,
        Shift::LogicalRight if amount >= bits => 0,
        Shift::LogicalRight => {
            let unsigned = value & ((1i128 << bits) - 1);
            kind.wrap(unsigned >> amount)
        }
    }
}

// ============================================================================
// Unary
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Unary {
    Neg,
    Pos,
    Not,
    Invert,
    Abs,
}

impl Unary {
    fn name(self) -> &'static str {
        match self {
            Unary::Neg => "-",
            Unary::Pos => "+",
            Unary::Not => "!",
            Unary::Invert => "~",
            Unary::Abs => "abs",
        }
    }
}

pub(crate) fn unary(op: Unary, a: &Value) -> RuntimeResult<Value> {
    if matches!(a, Value::Missing) {
        return Ok(Value::Missing);
    }
    let fail = || RuntimeError::method(op.name(), std::slice::from_ref(a));
    match (op, a) {
        (Unary::Not, Value::Bool(b)) | (Unary::Invert, Value::Bool(b)) => {
            return Ok(Value::Bool(!b))
        }
        (Unary::Not, _) => return Err(fail()),
        (Unary::Invert, Value::BitVector(bits)) => {
            return Ok(Value::bitvector(!bits.borrow().clone()))
        }
        (Unary::Pos | Unary::Abs, Value::Irrational(_)) => return Ok(a.clone()),
        (Unary::Abs, Value::Bool(_)) => return Ok(a.clone()),
        _ => {}
    }

    match Num::from_value(a).ok_or_else(fail)? {
        Num::Bool(b) => match op {
            Unary::Neg => Ok(Value::Int64(-i64::from(b))),
            Unary::Pos => Ok(Value::Int64(i64::from(b))),
            _ => Err(fail()),
        },
        Num::Int(v, kind) => Ok(kind.value(match op {
            Unary::Neg => v.wrapping_neg(),
            Unary::Pos => v,
            Unary::Invert => !v,
            Unary::Abs => v.abs(),
            Unary::Not => return Err(fail()),
        })),
        Num::Irr(c) => match op {
            Unary::Neg => Ok(Value::Float64(-c.value())),
            _ => Err(fail()),
        },
        Num::Float(x, kind) => match op {
            Unary::Neg => Ok(kind.value(-x)),
            Unary::Pos => Ok(a.clone()),
            Unary::Abs => Ok(kind.value(x.abs())),
            _ => Err(fail()),
        },
        Num::Complex(re, im, kind) => match op {
            Unary::Neg => Ok(kind.complex(-re, -im)),
            Unary::Pos => Ok(a.clone()),
            Unary::Abs => Ok(kind.value(re.hypot(im))),
            _ => Err(fail()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_promotion_widths() {
        assert_eq!(IntKind::I8.promote(IntKind::I32), IntKind::I32);
        assert_eq!(IntKind::I64.promote(IntKind::U64), IntKind::U64);
        assert_eq!(IntKind::U8.promote(IntKind::I16), IntKind::I16);
        assert_eq!(IntKind::U32.promote(IntKind::I32), IntKind::U32);
    }

    #[test]
    fn test_wrapping_add() {
        let result = arith(Arith::Add, &Value::Int8(127), &Value::Int8(1)).unwrap();
        assert!(matches!(result, Value::Int8(-128)));
    }

    #[test]
    fn test_division_is_float() {
        let result = arith(Arith::Div, &Value::Int32(7), &Value::Int32(2)).unwrap();
        assert!(matches!(result, Value::Float64(x) if x == 3.5));
    }

    #[test]
    fn test_floor_and_truncating_division() {
        let fld = arith(Arith::Fld, &Value::Int64(-7), &Value::Int64(2)).unwrap();
        let div = arith(Arith::IntDiv, &Value::Int64(-7), &Value::Int64(2)).unwrap();
        let rem = arith(Arith::Rem, &Value::Int64(-7), &Value::Int64(2)).unwrap();
        let modulo = arith(Arith::Mod, &Value::Int64(-7), &Value::Int64(2)).unwrap();
        assert!(matches!(fld, Value::Int64(-4)));
        assert!(matches!(div, Value::Int64(-3)));
        assert!(matches!(rem, Value::Int64(-1)));
        assert!(matches!(modulo, Value::Int64(1)));
    }

    #[test]
    fn test_divide_by_zero() {
        let err = arith(Arith::IntDiv, &Value::Int64(1), &Value::Int64(0)).unwrap_err();
        assert_eq!(err, RuntimeError::DivideByZero);
    }

    #[test]
    fn test_irrational_meets_float32() {
        let pi = Value::Irrational(Irrational::Pi);
        let result = arith(Arith::Mul, &pi, &Value::Float32(2.0)).unwrap();
        assert!(matches!(result, Value::Float32(_)));
        let result = arith(Arith::Add, &pi, &Value::Int64(1)).unwrap();
        assert!(matches!(result, Value::Float64(_)));
    }

    #[test]
    fn test_int_pow_keeps_base_type() {
        let result = arith(Arith::Pow, &Value::Int32(2), &Value::Int64(10)).unwrap();
        assert!(matches!(result, Value::Int32(1024)));
        assert!(arith(Arith::Pow, &Value::Int64(2), &Value::Int64(-1)).is_err());
    }

    #[test]
    fn test_missing_propagates() {
        let result = arith(Arith::Add, &Value::Missing, &Value::Int64(1)).unwrap();
        assert!(matches!(result, Value::Missing));
        let result = bitwise(Bitwise::Or, &Value::Bool(true), &Value::Missing).unwrap();
        assert!(matches!(result, Value::Bool(true)));
        let result = bitwise(Bitwise::And, &Value::Missing, &Value::Int64(3)).unwrap();
        assert!(matches!(result, Value::Missing));
    }

    #[test]
    fn test_shifts() {
        let left = shift(Shift::Left, &Value::Int64(1), &Value::Int64(3)).unwrap();
        assert!(matches!(left, Value::Int64(8)));
        let right = shift(Shift::Right, &Value::Int8(-8), &Value::Int64(1)).unwrap();
        assert!(matches!(right, Value::Int8(-4)));
        let logical = shift(Shift::LogicalRight, &Value::Int8(-8), &Value::Int64(1)).unwrap();
        assert!(matches!(logical, Value::Int8(124)));
        let negative = shift(Shift::Left, &Value::Int64(8), &Value::Int64(-2)).unwrap();
        assert!(matches!(negative, Value::Int64(2)));
    }

    #[test]
    fn test_unary_on_unsigned() {
        let inverted = unary(Unary::Invert, &Value::UInt8(5)).unwrap();
        assert!(matches!(inverted, Value::UInt8(250)));
        let negated = unary(Unary::Neg, &Value::UInt8(1)).unwrap();
        assert!(matches!(negated, Value::UInt8(255)));
    }

    #[test]
    fn test_complex_arithmetic() {
        use crate::objects::Complex;
        let z = Value::ComplexF32(Complex::new(1.0, 2.0));
        let result = arith(Arith::Mul, &z, &Value::Float64(2.0)).unwrap();
        assert!(matches!(result, Value::ComplexF64(c) if c.re == 2.0 && c.im == 4.0));
        assert!(arith(Arith::Mod, &z, &z).is_err());
    }
}
