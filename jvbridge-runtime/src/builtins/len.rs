//! Length and shape queries
//!
//! Design: One `length_of` helper shared by `length`, `isempty`,
//! `lastindex` and the host-facing `len`.

use crate::error::{RuntimeError, RuntimeResult};
use crate::interop::Engine;
use crate::objects::{Kwargs, Type, Value};

use super::iter::range_len;

/// Number of elements, `None` for values without a length
pub(crate) fn length_of(value: &Value) -> Option<usize> {
    Some(match value {
        Value::Array(array) => array.len(),
        Value::BitVector(bits) => bits.borrow().len(),
        Value::Range(start, stop) => range_len(*start, *stop),
        Value::Tuple(items) => items.len(),
        Value::Str(s) => s.chars().count(),
        Value::Dict(dict) => dict.len(),
        Value::Pair(_) => 2,
        v if v.is_number() => 1,
        _ => return None,
    })
}

pub(crate) fn dims_of(value: &Value) -> Option<Vec<usize>> {
    match value {
        Value::Array(array) => Some(array.dims()),
        Value::BitVector(_) | Value::Range(..) => length_of(value).map(|n| vec![n]),
        v if v.is_number() => Some(Vec::new()),
        _ => None,
    }
}

pub(super) fn length(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [value] => length_of(value)
            .map(|n| Value::Int64(n as i64))
            .ok_or_else(|| RuntimeError::method("length", args)),
        _ => Err(RuntimeError::method("length", args)),
    }
}

pub(super) fn isempty(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [value] => length_of(value)
            .map(|n| Value::Bool(n == 0))
            .ok_or_else(|| RuntimeError::method("isempty", args)),
        _ => Err(RuntimeError::method("isempty", args)),
    }
}

/// Extent along dimension `d` (1-based); trailing dimensions are singleton
pub(crate) fn size_along(value: &Value, d: &Value) -> RuntimeResult<i64> {
    let fail = || RuntimeError::method("size", &[value.clone(), d.clone()]);
    let dims = dims_of(value).ok_or_else(fail)?;
    let d = d.as_i64().ok_or_else(fail)?;
    if d < 1 {
        return Err(RuntimeError::Argument(format!(
            "dimension out of range (got {d})"
        )));
    }
    Ok(dims.get(d as usize - 1).map_or(1, |n| *n as i64))
}

/// `size(x)` and `size(x, d)`
pub(super) fn size(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [value] => {
            let dims = dims_of(value).ok_or_else(|| RuntimeError::method("size", args))?;
            Ok(Value::tuple(dims.into_iter().map(|d| Value::Int64(d as i64)).collect()))
        }
        [value, d] => size_along(value, d).map(Value::Int64),
        _ => Err(RuntimeError::method("size", args)),
    }
}

pub(super) fn ndims(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [value] => dims_of(value)
            .map(|dims| Value::Int64(dims.len() as i64))
            .ok_or_else(|| RuntimeError::method("ndims", args)),
        _ => Err(RuntimeError::method("ndims", args)),
    }
}

/// Element type of a collection; `Any` for values that do not declare one
pub(crate) fn elem_type_of(value: &Value) -> Type {
    match value {
        Value::Array(array) => array.elem_type(),
        Value::BitVector(_) => Type::Bool,
        Value::Range(..) => Type::Int64,
        Value::Dict(dict) => Type::Pair(
            Box::new(dict.key_type.clone()),
            Box::new(dict.value_type.clone()),
        ),
        Value::Tuple(items) => {
            let mut types = items.iter().map(Value::type_of);
            match types.next() {
                Some(first) if types.all(|t| t == first) => first,
                _ => Type::Any,
            }
        }
        Value::Type(Type::Array(elem, _)) => (**elem).clone(),
        v if v.is_number() => v.type_of(),
        _ => Type::Any,
    }
}

pub(super) fn eltype(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [value] => Ok(Value::Type(elem_type_of(value))),
        _ => Err(RuntimeError::method("eltype", args)),
    }
}

pub(super) fn lastindex(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [value] => length_of(value)
            .map(|n| Value::Int64(n as i64))
            .ok_or_else(|| RuntimeError::method("lastindex", args)),
        [value, d] => size_along(value, d).map(Value::Int64),
        _ => Err(RuntimeError::method("lastindex", args)),
    }
}

pub(super) fn firstindex(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [value] | [value, _] if length_of(value).is_some() => Ok(Value::Int64(1)),
        _ => Err(RuntimeError::method("firstindex", args)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_of_common_values() {
        assert_eq!(length_of(&Value::str("héllo")), Some(5));
        assert_eq!(length_of(&Value::Range(2, 4)), Some(3));
        assert_eq!(length_of(&Value::Int64(7)), Some(1));
        assert_eq!(length_of(&Value::Nothing), None);
    }

    #[test]
    fn test_elem_type_of_tuple() {
        let uniform = Value::tuple(vec![Value::Int64(1), Value::Int64(2)]);
        assert_eq!(elem_type_of(&uniform), Type::Int64);
        let mixed = Value::tuple(vec![Value::Int64(1), Value::str("2")]);
        assert_eq!(elem_type_of(&mixed), Type::Any);
    }
}
