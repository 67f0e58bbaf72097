//! Conversion Engine
//!
//! Applies the type mapping table in both directions. `to_host` never
//! fails: anything without a lossless host form becomes a
//! `ForeignHandle`. `to_foreign` fails only for host values the runtime
//! cannot represent, such as integers wider than 64 bits.

use std::rc::Rc;

use jvbridge_runtime::objects::DictObj;
use jvbridge_runtime::{Complex, Engine, Type, Value};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use super::handle::ForeignHandle;
use crate::core::mapping::host_kind;
use crate::core::{ArrayView, HostKind, HostValue};
use crate::errors::{BridgeError, BridgeResult};
use crate::infrastructure::logging::log_conversion;

/// Native form of a foreign bits scalar
///
/// `Bool` is matched on its own variant before any integer, so `true`
/// never becomes `1`.
pub(crate) fn scalar_to_host(value: &Value) -> Option<HostValue> {
    let host = match value {
        Value::Bool(b) => HostValue::Bool(*b),
        Value::Int8(x) => HostValue::from(*x),
        Value::Int16(x) => HostValue::from(*x),
        Value::Int32(x) => HostValue::from(*x),
        Value::Int64(x) => HostValue::from(*x),
        Value::UInt8(x) => HostValue::from(*x),
        Value::UInt16(x) => HostValue::from(*x),
        Value::UInt32(x) => HostValue::from(*x),
        Value::UInt64(x) => HostValue::from(*x),
        Value::Float32(x) => HostValue::Float(f64::from(*x)),
        Value::Float64(x) => HostValue::Float(*x),
        Value::ComplexF32(z) => HostValue::Complex(f64::from(z.re), f64::from(z.im)),
        Value::ComplexF64(z) => HostValue::Complex(z.re, z.im),
        _ => return None,
    };
    Some(host)
}

fn int_to_foreign(value: &BigInt) -> BridgeResult<Value> {
    if let Some(v) = value.to_i64() {
        return Ok(Value::Int64(v));
    }
    if let Some(v) = value.to_u64() {
        return Ok(Value::UInt64(v));
    }
    Err(BridgeError::Conversion(format!(
        "integer {value} does not fit in a 64-bit foreign integer"
    )))
}

/// Foreign form of a host scalar
pub(crate) fn scalar_to_foreign(value: &HostValue) -> BridgeResult<Value> {
    match value {
        HostValue::Bool(b) => Ok(Value::Bool(*b)),
        HostValue::Int(i) => int_to_foreign(i),
        HostValue::Float(x) => Ok(Value::Float64(*x)),
        HostValue::Complex(re, im) => Ok(Value::ComplexF64(Complex::new(*re, *im))),
        other => Err(BridgeError::Conversion(format!(
            "expected a scalar, got {}",
            other.type_name()
        ))),
    }
}

/// Convert a foreign value for the host
pub fn to_host(engine: &Rc<Engine>, value: &Value) -> HostValue {
    let ty = value.type_of();
    let kind = host_kind(&ty);
    let host = match (kind, value) {
        (HostKind::Unit, _) => HostValue::Unit,
        (HostKind::Text, Value::Str(s)) => HostValue::Text(s.to_string()),
        (HostKind::Array, Value::Array(array)) => ArrayView::from_foreign(engine, array)
            .map_or_else(|| handle(engine, value), HostValue::Array),
        (HostKind::Tuple, Value::Tuple(items)) => {
            HostValue::Tuple(items.iter().map(|item| to_host(engine, item)).collect())
        }
        (HostKind::Bool | HostKind::Int | HostKind::Float | HostKind::Complex, _) => {
            scalar_to_host(value).unwrap_or_else(|| handle(engine, value))
        }
        _ => handle(engine, value),
    };
    log_conversion("to_host", &ty.to_string(), host.type_name());
    host
}

fn handle(engine: &Rc<Engine>, value: &Value) -> HostValue {
    HostValue::Handle(ForeignHandle::new(engine, value))
}

/// Convert a host value for the runtime
///
/// Lists become `Vector{Any}` and maps `Dict{Any, Any}`; a tuple map key
/// stays one composite key.
pub fn to_foreign(engine: &Rc<Engine>, value: &HostValue) -> BridgeResult<Value> {
    let foreign = match value {
        HostValue::Unit => Value::Nothing,
        HostValue::Text(s) => Value::str(s),
        HostValue::Tuple(items) => Value::tuple(
            items
                .iter()
                .map(|item| to_foreign(engine, item))
                .collect::<BridgeResult<Vec<_>>>()?,
        ),
        HostValue::List(items) => {
            let items = items
                .iter()
                .map(|item| to_foreign(engine, item))
                .collect::<BridgeResult<Vec<_>>>()?;
            Value::vector(&Type::Any, &items)?
        }
        HostValue::Map(entries) => {
            let dict = DictObj::new(Type::Any, Type::Any);
            for (key, item) in entries {
                dict.insert(&to_foreign(engine, key)?, &to_foreign(engine, item)?)?;
            }
            Value::Dict(Rc::new(dict))
        }
        HostValue::Array(view) => view.foreign(),
        HostValue::Handle(handle) => {
            if !Rc::ptr_eq(handle.engine(), engine) {
                return Err(BridgeError::Conversion(
                    "handle belongs to a different runtime".to_string(),
                ));
            }
            handle.value()
        }
        scalar => scalar_to_foreign(scalar)?,
    };
    log_conversion("to_foreign", value.type_name(), &foreign.type_of().to_string());
    Ok(foreign)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Rc<Engine> {
        Rc::new(Engine::new())
    }

    #[test]
    fn test_bool_is_not_an_integer() {
        let engine = engine();
        assert_eq!(to_host(&engine, &Value::Bool(true)), HostValue::Bool(true));
        assert_eq!(to_host(&engine, &Value::Int8(1)), HostValue::from(1));
        let back = to_foreign(&engine, &HostValue::Bool(false)).unwrap();
        assert!(matches!(back, Value::Bool(false)));
    }

    #[test]
    fn test_integers_widen_and_narrow() {
        let engine = engine();
        assert_eq!(to_host(&engine, &Value::UInt64(u64::MAX)), HostValue::from(u64::MAX));
        assert!(matches!(
            to_foreign(&engine, &HostValue::from(u64::MAX)),
            Ok(Value::UInt64(u64::MAX))
        ));
        assert!(matches!(
            to_foreign(&engine, &HostValue::from(-5)),
            Ok(Value::Int64(-5))
        ));
        let err = to_foreign(&engine, &HostValue::from(u128::MAX)).unwrap_err();
        assert_eq!(err.kind(), "ConversionError");
    }

    #[test]
    fn test_float32_widens_to_host_float() {
        let engine = engine();
        assert_eq!(to_host(&engine, &Value::Float32(0.5)), HostValue::Float(0.5));
    }

    #[test]
    fn test_tuples_need_native_elements() {
        let engine = engine();
        let native = engine.eval("(2, \"2\", (1.0, 2.0), ComplexF32[])").unwrap();
        let HostValue::Tuple(items) = to_host(&engine, &native) else {
            panic!("expected a tuple");
        };
        assert_eq!(items.len(), 4);
        assert_eq!(items[2], HostValue::Tuple(vec![1.0.into(), 2.0.into()]));
        assert_eq!(items[3].as_array().map(ArrayView::dtype), Some("complex64"));

        let mixed = engine.eval("(1, String[])").unwrap();
        assert!(matches!(to_host(&engine, &mixed), HostValue::Handle(_)));
    }

    #[test]
    fn test_unmapped_values_become_handles() {
        let engine = engine();
        for source in ["String[]", "missing", "pi", "Dict()", "BitArray([1, 0])", "1:3", ":a"] {
            let value = engine.eval(source).unwrap();
            assert!(to_host(&engine, &value).as_handle().is_some(), "{source}");
        }
    }

    #[test]
    fn test_lists_and_maps_use_general_containers() {
        let engine = engine();
        let list = to_foreign(&engine, &HostValue::List(vec![1.into(), "a".into()])).unwrap();
        assert_eq!(engine.repr(&list), "Any[1, \"a\"]");

        let key = HostValue::Tuple(vec![1.into(), 2.into()]);
        let map = to_foreign(&engine, &HostValue::Map(vec![(key, 3.into())])).unwrap();
        assert_eq!(engine.type_of(&map).to_string(), "Dict{Any, Any}");
        let Value::Dict(dict) = &map else {
            panic!("expected a dict");
        };
        let stored = dict.get(&Value::tuple(vec![Value::Int64(1), Value::Int64(2)]));
        assert!(matches!(stored, Some(Value::Int64(3))));
    }

    #[test]
    fn test_handles_stay_with_their_runtime() {
        let first = engine();
        let second = engine();
        let value = first.eval("String[]").unwrap();
        let handle = to_host(&first, &value);
        assert!(to_foreign(&first, &handle).is_ok());
        assert!(to_foreign(&second, &handle).is_err());
    }
}
