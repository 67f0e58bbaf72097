//! Conversion and type promotion
//!
//! `convert_value` is the single path by which values are stored into typed
//! slots: array buffers, dict entries and struct fields all go through it.

use std::rc::Rc;

use crate::error::{RuntimeError, RuntimeResult};
use crate::objects::{ArrayObj, Buffer, Type, Value};

use super::operations::{FloatKind, IntKind, Num};

fn inexact(target: &Type, value: &Value) -> RuntimeError {
    RuntimeError::Inexact {
        func: "convert".to_string(),
        target: target.to_string(),
        value: super::print::repr(value),
    }
}

/// Convert `value` to `target`, failing with `InexactError` on lossy numeric
/// input and `MethodError` when no conversion exists
pub fn convert_value(target: &Type, value: &Value) -> RuntimeResult<Value> {
    if matches!(target, Type::Any) {
        return Ok(value.clone());
    }
    if let Some(num) = Num::from_value(value) {
        if let Some(converted) = convert_number(target, num, value)? {
            return Ok(converted);
        }
    }
    match (target, value) {
        (Type::Array(elem, ndims), Value::Array(array)) if array.ndims() == *ndims => {
            if array.elem_type() == **elem {
                return Ok(value.clone());
            }
            let buffer = Buffer::from_values(elem, &array.to_values())?;
            return Ok(Value::Array(Rc::new(ArrayObj::new(buffer, array.dims()))));
        }
        (Type::Array(elem, 1), Value::BitVector(bits)) => {
            let items: Vec<Value> = bits.borrow().iter().map(|b| Value::Bool(*b)).collect();
            return Value::vector(elem, &items);
        }
        (Type::Tuple(types), Value::Tuple(items)) if types.len() == items.len() => {
            let converted = types
                .iter()
                .zip(items.iter())
                .map(|(t, v)| convert_value(t, v))
                .collect::<RuntimeResult<Vec<_>>>()?;
            return Ok(Value::tuple(converted));
        }
        _ => {}
    }
    if value.isa(target) {
        return Ok(value.clone());
    }
    Err(RuntimeError::Method {
        function: "convert".to_string(),
        arg_types: vec![format!("Type{{{target}}}"), value.type_of().to_string()],
    })
}

/// Numeric conversion; `None` when `target` is not a concrete number type
fn convert_number(target: &Type, num: Num, value: &Value) -> RuntimeResult<Option<Value>> {
    if let Some(kind) = IntKind::of(target) {
        let integer = match num {
            Num::Bool(b) => i128::from(b),
            Num::Int(v, _) => v,
            Num::Irr(_) => return Err(inexact(target, value)),
            Num::Float(x, _) => exact_integer(x).ok_or_else(|| inexact(target, value))?,
            Num::Complex(re, im, _) if im == 0.0 => {
                exact_integer(re).ok_or_else(|| inexact(target, value))?
            }
            Num::Complex(..) => return Err(inexact(target, value)),
        };
        if integer < kind.min() || integer > kind.max() {
            return Err(inexact(target, value));
        }
        return Ok(Some(kind.value(integer)));
    }
    let converted = match target {
        Type::Bool => match num {
            Num::Bool(b) => Value::Bool(b),
            _ if num.imag() == 0.0 && (num.real() == 0.0 || num.real() == 1.0) => {
                Value::Bool(num.real() == 1.0)
            }
            _ => return Err(inexact(target, value)),
        },
        Type::Float32 | Type::Float64 => {
            if num.imag() != 0.0 {
                return Err(inexact(target, value));
            }
            let kind = if *target == Type::Float32 {
                FloatKind::F32
            } else {
                FloatKind::F64
            };
            kind.value(num.real())
        }
        Type::ComplexF32 => FloatKind::F32.complex(num.real(), num.imag()),
        Type::ComplexF64 => FloatKind::F64.complex(num.real(), num.imag()),
        _ => return Ok(None),
    };
    Ok(Some(converted))
}

fn exact_integer(x: f64) -> Option<i128> {
    (x.is_finite() && x.fract() == 0.0 && x.abs() < 1.7e38).then(|| x as i128)
}

#[derive(Clone, Copy, PartialEq)]
enum NumClass {
    Bool,
    Int(IntKind),
    Irrational,
    Float(FloatKind),
    Complex(FloatKind),
}

fn classify(ty: &Type) -> Option<NumClass> {
    if let Some(kind) = IntKind::of(ty) {
        return Some(NumClass::Int(kind));
    }
    Some(match ty {
        Type::Bool => NumClass::Bool,
        Type::Irrational(_) => NumClass::Irrational,
        Type::Float32 => NumClass::Float(FloatKind::F32),
        Type::Float64 => NumClass::Float(FloatKind::F64),
        Type::ComplexF32 => NumClass::Complex(FloatKind::F32),
        Type::ComplexF64 => NumClass::Complex(FloatKind::F64),
        _ => return None,
    })
}

/// A sample value of each class, used to reuse the value-level promotion
fn sample(class: NumClass) -> Num {
    match class {
        NumClass::Bool => Num::Bool(false),
        NumClass::Int(kind) => Num::Int(0, kind),
        NumClass::Irrational => Num::Irr(crate::objects::Irrational::Pi),
        NumClass::Float(kind) => Num::Float(0.0, kind),
        NumClass::Complex(kind) => Num::Complex(0.0, 0.0, kind),
    }
}

/// Common type of two types, `None` when only `Any` holds both
pub fn promote_type(a: &Type, b: &Type) -> Option<Type> {
    use super::operations::{promote, Promoted};
    if a == b {
        return Some(a.clone());
    }
    let (x, y) = (classify(a)?, classify(b)?);
    let promoted = match promote(sample(x), sample(y)) {
        Promoted::Bool(..) => Type::Bool,
        Promoted::Int(_, _, kind) => int_type(kind),
        Promoted::Float(_, _, FloatKind::F32) => Type::Float32,
        Promoted::Float(_, _, FloatKind::F64) => Type::Float64,
        Promoted::Complex(_, _, FloatKind::F32) => Type::ComplexF32,
        Promoted::Complex(_, _, FloatKind::F64) => Type::ComplexF64,
    };
    Some(promoted)
}

pub(crate) fn int_type(kind: IntKind) -> Type {
    match kind {
        IntKind::I8 => Type::Int8,
        IntKind::I16 => Type::Int16,
        IntKind::I32 => Type::Int32,
        IntKind::I64 => Type::Int64,
        IntKind::U8 => Type::UInt8,
        IntKind::U16 => Type::UInt16,
        IntKind::U32 => Type::UInt32,
        IntKind::U64 => Type::UInt64,
    }
}

/// Element type of a `[a, b, ...]` literal
pub fn infer_elem_type(values: &[Value]) -> Type {
    let mut types = values.iter().map(Value::type_of);
    let Some(first) = types.next() else {
        return Type::Any;
    };
    types
        .try_fold(first, |acc, ty| promote_type(&acc, &ty))
        .unwrap_or(Type::Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_exact_float_to_int() {
        let v = convert_value(&Type::Int8, &Value::Float64(3.0)).unwrap();
        assert!(matches!(v, Value::Int8(3)));
        let err = convert_value(&Type::Int8, &Value::Float64(3.5)).unwrap_err();
        assert_eq!(err.kind(), "InexactError");
    }

    #[test]
    fn test_convert_to_abstract_keeps_value() {
        let v = convert_value(&Type::Abstract(crate::objects::Abstract::Real), &Value::Int8(3)).unwrap();
        assert!(matches!(v, Value::Int8(3)));
    }

    #[test]
    fn test_convert_string_to_int_fails() {
        let err = convert_value(&Type::Int64, &Value::str("1")).unwrap_err();
        assert_eq!(err.kind(), "MethodError");
    }

    #[test]
    fn test_infer_elem_type() {
        assert_eq!(infer_elem_type(&[Value::Int64(1), Value::Float64(2.0)]), Type::Float64);
        assert_eq!(infer_elem_type(&[Value::Int64(1), Value::Bool(true)]), Type::Int64);
        assert_eq!(infer_elem_type(&[Value::Int64(1), Value::str("2")]), Type::Any);
        assert_eq!(infer_elem_type(&[]), Type::Any);
        assert_eq!(
            infer_elem_type(&[Value::Int32(1), Value::Float32(2.0)]),
            Type::Float32
        );
    }
}
