//! Math functions
//!
//! Real arguments keep their float width (`sqrt(4f0)` is a `Float32`),
//! integers compute in `Float64`, complex arguments stay complex.

use std::cmp::Ordering;

use crate::error::{RuntimeError, RuntimeResult};
use crate::interop::Engine;
use crate::objects::{Kwargs, Type, Value};

use super::compare::ordering;
use super::convert::{convert_value, promote_type};
use super::kwarg;
use super::operations::{FloatKind, IntKind, Num};
use super::print::repr;

pub(crate) fn is_nan(value: &Value) -> bool {
    match value {
        Value::Float32(x) => x.is_nan(),
        Value::Float64(x) => x.is_nan(),
        Value::ComplexF32(z) => z.re.is_nan() || z.im.is_nan(),
        Value::ComplexF64(z) => z.re.is_nan() || z.im.is_nan(),
        _ => false,
    }
}

fn single<'a>(name: &str, args: &'a [Value]) -> RuntimeResult<&'a Value> {
    match args {
        [x] => Ok(x),
        _ => Err(RuntimeError::method(name, args)),
    }
}

fn number(name: &str, args: &[Value]) -> RuntimeResult<Num> {
    let x = single(name, args)?;
    Num::from_value(x).ok_or_else(|| RuntimeError::method(name, args))
}

// ============================================================================
// Elementary functions
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Elementary {
    Sqrt,
    Exp,
    Log,
    Sin,
    Cos,
}

impl Elementary {
    fn name(self) -> &'static str {
        match self {
            Elementary::Sqrt => "sqrt",
            Elementary::Exp => "exp",
            Elementary::Log => "log",
            Elementary::Sin => "sin",
            Elementary::Cos => "cos",
        }
    }

    fn real(self, x: f64) -> f64 {
        match self {
            Elementary::Sqrt => x.sqrt(),
            Elementary::Exp => x.exp(),
            Elementary::Log => x.ln(),
            Elementary::Sin => x.sin(),
            Elementary::Cos => x.cos(),
        }
    }

    fn complex(self, a: f64, b: f64) -> (f64, f64) {
        match self {
            Elementary::Sqrt => {
                let r = a.hypot(b).sqrt();
                let theta = b.atan2(a) / 2.0;
                (r * theta.cos(), r * theta.sin())
            }
            Elementary::Exp => {
                let scale = a.exp();
                (scale * b.cos(), scale * b.sin())
            }
            Elementary::Log => (a.hypot(b).ln(), b.atan2(a)),
            Elementary::Sin => (a.sin() * b.cosh(), a.cos() * b.sinh()),
            Elementary::Cos => (a.cos() * b.cosh(), -(a.sin() * b.sinh())),
        }
    }

    /// Real inputs outside the real domain
    fn domain_error(self, x: f64) -> Option<&'static str> {
        match self {
            Elementary::Sqrt if x < 0.0 => Some(
                "sqrt was called with a negative real argument but will only return a complex result if called with a complex argument. Try sqrt(Complex(x)).",
            ),
            Elementary::Log if x < 0.0 => Some(
                "log was called with a negative real argument but will only return a complex result if called with a complex argument. Try log(Complex(x)).",
            ),
            Elementary::Sin | Elementary::Cos if x.is_infinite() => {
                Some("sin(x) is only defined for finite x.")
            }
            _ => None,
        }
    }
}

fn elementary(op: Elementary, args: &[Value]) -> RuntimeResult<Value> {
    if matches!(args, [Value::Missing]) {
        return Ok(Value::Missing);
    }
    match number(op.name(), args)? {
        Num::Complex(re, im, kind) => {
            let (a, b) = op.complex(re, im);
            Ok(kind.complex(a, b))
        }
        n => {
            let x = n.real();
            if let Some(message) = op.domain_error(x) {
                return Err(RuntimeError::Domain {
                    value: repr(&args[0]),
                    message: message.to_string(),
                });
            }
            let kind = match n {
                Num::Float(_, kind) => kind,
                _ => FloatKind::F64,
            };
            Ok(kind.value(op.real(x)))
        }
    }
}

pub(super) fn sqrt(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    elementary(Elementary::Sqrt, args)
}

pub(super) fn exp(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    elementary(Elementary::Exp, args)
}

pub(super) fn log(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    elementary(Elementary::Log, args)
}

pub(super) fn sin(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    elementary(Elementary::Sin, args)
}

pub(super) fn cos(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    elementary(Elementary::Cos, args)
}

// ============================================================================
// Rounding
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Rounding {
    Floor,
    Ceil,
    Nearest,
}

impl Rounding {
    fn name(self) -> &'static str {
        match self {
            Rounding::Floor => "floor",
            Rounding::Ceil => "ceil",
            Rounding::Nearest => "round",
        }
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Rounding::Floor => x.floor(),
            Rounding::Ceil => x.ceil(),
            Rounding::Nearest => x.round_ties_even(),
        }
    }
}

/// `floor(x)`, `floor(T, x)` and `round(x; digits = n)`
fn rounding(op: Rounding, args: &[Value], kwargs: &Kwargs) -> RuntimeResult<Value> {
    let digits = match kwarg(kwargs, "digits") {
        None => 0,
        Some(d) => d
            .as_i64()
            .filter(|_| !matches!(d, Value::Bool(_)))
            .ok_or_else(|| RuntimeError::method(op.name(), args))?,
    };
    let (target, value) = match args {
        [Value::Type(target), value] => (Some(target), value),
        [value] => (None, value),
        _ => return Err(RuntimeError::method(op.name(), args)),
    };
    let rounded = match Num::from_value(value) {
        Some(Num::Int(..) | Num::Bool(_)) => value.clone(),
        Some(n @ (Num::Float(..) | Num::Irr(_))) => {
            let scale = 10f64.powi(digits as i32);
            let x = if digits == 0 {
                op.apply(n.real())
            } else {
                op.apply(n.real() * scale) / scale
            };
            match n {
                Num::Float(_, kind) => kind.value(x),
                _ => Value::Float64(x),
            }
        }
        _ => return Err(RuntimeError::method(op.name(), args)),
    };
    match target {
        Some(target) => convert_value(target, &rounded),
        None => Ok(rounded),
    }
}

pub(super) fn floor(_: &Engine, args: &[Value], kwargs: &Kwargs) -> RuntimeResult<Value> {
    rounding(Rounding::Floor, args, kwargs)
}

pub(super) fn ceil(_: &Engine, args: &[Value], kwargs: &Kwargs) -> RuntimeResult<Value> {
    rounding(Rounding::Ceil, args, kwargs)
}

pub(super) fn round(_: &Engine, args: &[Value], kwargs: &Kwargs) -> RuntimeResult<Value> {
    rounding(Rounding::Nearest, args, kwargs)
}

// ============================================================================
// min / max
// ============================================================================

fn pick_extreme(name: &str, want: Ordering, args: &[Value]) -> RuntimeResult<Value> {
    let Some((first, rest)) = args.split_first() else {
        return Err(RuntimeError::method(name, args));
    };
    let mut best = first.clone();
    let mut common = Some(first.type_of());
    for item in rest {
        common = common.and_then(|t| promote_type(&t, &item.type_of()));
        if is_nan(&best) {
            continue;
        }
        best = match ordering(name, item, &best)? {
            Some(order) if order == want => item.clone(),
            None => item.clone(),
            _ => best,
        };
    }
    match common {
        Some(ty) if best.is_number() => convert_value(&ty, &best),
        _ => Ok(best),
    }
}

pub(super) fn min(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    pick_extreme("min", Ordering::Less, args)
}

pub(super) fn max(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    pick_extreme("max", Ordering::Greater, args)
}

// ============================================================================
// Complex parts
// ============================================================================

fn float_kind(n: &Num) -> Option<FloatKind> {
    match n {
        Num::Float(_, k) | Num::Complex(_, _, k) => Some(*k),
        _ => None,
    }
}

/// `complex(z)` and `complex(re, im)`
pub(super) fn make_complex(args: &[Value]) -> RuntimeResult<Value> {
    let parts: Option<Vec<Num>> = args.iter().map(Num::from_value).collect();
    match parts.as_deref() {
        Some([z]) => Ok(float_kind(z)
            .unwrap_or(FloatKind::F64)
            .complex(z.real(), z.imag())),
        Some([re, im]) if !re.is_complex() && !im.is_complex() => {
            let kind = match (float_kind(re), float_kind(im)) {
                (Some(FloatKind::F64), _) | (_, Some(FloatKind::F64)) => FloatKind::F64,
                (Some(FloatKind::F32), _) | (_, Some(FloatKind::F32)) => FloatKind::F32,
                _ => FloatKind::F64,
            };
            Ok(kind.complex(re.real(), im.real()))
        }
        _ => Err(RuntimeError::method("complex", args)),
    }
}

pub(super) fn complex(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    make_complex(args)
}

pub(super) fn real(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match number("real", args)? {
        Num::Complex(re, _, kind) => Ok(kind.value(re)),
        _ => Ok(args[0].clone()),
    }
}

pub(super) fn imag(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match number("imag", args)? {
        Num::Complex(_, im, kind) => Ok(kind.value(im)),
        Num::Float(_, kind) => Ok(kind.value(0.0)),
        Num::Int(_, kind) => Ok(kind.value(0)),
        Num::Bool(_) => Ok(Value::Bool(false)),
        Num::Irr(_) => Ok(Value::Float64(0.0)),
    }
}

pub(super) fn conj(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match number("conj", args)? {
        Num::Complex(re, im, kind) => Ok(kind.complex(re, -im)),
        _ => Ok(args[0].clone()),
    }
}

// ============================================================================
// Predicates and limits
// ============================================================================

fn integer(name: &str, args: &[Value]) -> RuntimeResult<i128> {
    match number(name, args)? {
        Num::Int(v, _) => Ok(v),
        Num::Bool(b) => Ok(b.into()),
        _ => Err(RuntimeError::method(name, args)),
    }
}

pub(super) fn iseven(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    Ok(Value::Bool(integer("iseven", args)? % 2 == 0))
}

pub(super) fn isodd(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    Ok(Value::Bool(integer("isodd", args)? % 2 != 0))
}

pub(super) fn isnan(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    number("isnan", args)?;
    Ok(Value::Bool(is_nan(&args[0])))
}

pub(super) fn isinf(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let n = number("isinf", args)?;
    Ok(Value::Bool(n.real().is_infinite() || n.imag().is_infinite()))
}

fn limit(name: &str, args: &[Value], upper: bool) -> RuntimeResult<Value> {
    let ty = match single(name, args)? {
        Value::Type(ty) => ty.clone(),
        value => value.type_of(),
    };
    if let Some(kind) = IntKind::of(&ty) {
        return Ok(kind.value(if upper { kind.max() } else { kind.min() }));
    }
    let infinity = if upper { f64::INFINITY } else { f64::NEG_INFINITY };
    match ty {
        Type::Bool => Ok(Value::Bool(upper)),
        Type::Float32 => Ok(FloatKind::F32.value(infinity)),
        Type::Float64 => Ok(FloatKind::F64.value(infinity)),
        _ => Err(RuntimeError::method(name, args)),
    }
}

pub(super) fn typemax(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    limit("typemax", args, true)
}

pub(super) fn typemin(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    limit("typemin", args, false)
}

fn unit(name: &str, args: &[Value], value: i64) -> RuntimeResult<Value> {
    let ty = match single(name, args)? {
        Value::Type(ty) => ty.clone(),
        other => other.type_of(),
    };
    if !ty.is_bits() {
        return Err(RuntimeError::method(name, args));
    }
    convert_value(&ty, &Value::Int64(value))
}

pub(super) fn zero(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    unit("zero", args, 0)
}

pub(super) fn one(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    unit("one", args, 1)
}
