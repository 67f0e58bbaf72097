//! Field and property access

use crate::error::{RuntimeError, RuntimeResult};
use crate::interop::Engine;
use crate::objects::{Kwargs, Type, Value};

/// `x.name`
pub(crate) fn get_property(value: &Value, name: &str) -> RuntimeResult<Value> {
    let no_field = || RuntimeError::Field {
        type_name: value.type_of().to_string(),
        field: name.to_string(),
    };
    match value {
        Value::Struct(obj) => obj.get_field(name),
        Value::Module(module) => module.get(name).ok_or_else(|| RuntimeError::UndefVar {
            name: format!("{}.{name}", module.path),
        }),
        Value::Pair(pair) => match name {
            "first" => Ok(pair.0.clone()),
            "second" => Ok(pair.1.clone()),
            _ => Err(no_field()),
        },
        Value::ComplexF32(z) => match name {
            "re" => Ok(Value::Float32(z.re)),
            "im" => Ok(Value::Float32(z.im)),
            _ => Err(no_field()),
        },
        Value::ComplexF64(z) => match name {
            "re" => Ok(Value::Float64(z.re)),
            "im" => Ok(Value::Float64(z.im)),
            _ => Err(no_field()),
        },
        Value::Range(start, stop) => match name {
            "start" => Ok(Value::Int64(*start)),
            "stop" => Ok(Value::Int64(*stop)),
            _ => Err(no_field()),
        },
        Value::Type(Type::Struct(def)) if name == "name" => Ok(Value::symbol(&def.name)),
        _ => Err(no_field()),
    }
}

/// `x.name = v`
pub(crate) fn set_property(target: &Value, name: &str, value: &Value) -> RuntimeResult<()> {
    match target {
        Value::Struct(obj) => obj.set_field(name, value),
        Value::Module(module) => {
            if module.path != "Main" {
                return Err(RuntimeError::Error(format!(
                    "cannot assign variables in other modules ({})",
                    module.path
                )));
            }
            module.set(name, value.clone());
            Ok(())
        }
        other if property_names(other).iter().any(|field| field == name) => {
            Err(RuntimeError::ImmutableField {
                type_name: other.type_of().to_string(),
                field: name.to_string(),
            })
        }
        other => Err(RuntimeError::Field {
            type_name: other.type_of().to_string(),
            field: name.to_string(),
        }),
    }
}

pub(crate) fn property_names(value: &Value) -> Vec<String> {
    let fixed: &[&str] = match value {
        Value::Struct(obj) => return obj.def.field_names(),
        Value::Module(module) => return module.names(),
        Value::Pair(_) => &["first", "second"],
        Value::ComplexF32(_) | Value::ComplexF64(_) => &["re", "im"],
        Value::Range(..) => &["start", "stop"],
        _ => &[],
    };
    fixed.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn has_property(value: &Value, name: &str) -> bool {
    match value {
        Value::Module(module) => module.contains(name),
        other => property_names(other).iter().any(|field| field == name),
    }
}

fn symbol_arg<'a>(name: &str, args: &'a [Value], position: usize) -> RuntimeResult<&'a str> {
    match args.get(position) {
        Some(Value::Symbol(s)) => Ok(s.as_str()),
        _ => Err(RuntimeError::method(name, args)),
    }
}

fn symbols(names: Vec<String>) -> Value {
    Value::tuple(names.iter().map(|n| Value::symbol(n)).collect())
}

pub(super) fn getproperty(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [value, _] => get_property(value, symbol_arg("getproperty", args, 1)?),
        _ => Err(RuntimeError::method("getproperty", args)),
    }
}

pub(super) fn setproperty(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [target, _, value] => {
            set_property(target, symbol_arg("setproperty!", args, 1)?, value)?;
            Ok(value.clone())
        }
        _ => Err(RuntimeError::method("setproperty!", args)),
    }
}

pub(super) fn hasproperty(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [value, _] => Ok(Value::Bool(has_property(value, symbol_arg("hasproperty", args, 1)?))),
        _ => Err(RuntimeError::method("hasproperty", args)),
    }
}

pub(super) fn propertynames(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [value] => Ok(symbols(property_names(value))),
        _ => Err(RuntimeError::method("propertynames", args)),
    }
}

/// `fieldnames(T)` takes the type, not an instance
pub(super) fn fieldnames(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [Value::Type(Type::Struct(def))] => Ok(symbols(def.field_names())),
        [Value::Type(Type::Pair(..))] => Ok(symbols(vec!["first".into(), "second".into()])),
        [Value::Type(Type::ComplexF32 | Type::ComplexF64)] => {
            Ok(symbols(vec!["re".into(), "im".into()]))
        }
        [Value::Type(_)] => Ok(Value::tuple(Vec::new())),
        _ => Err(RuntimeError::method("fieldnames", args)),
    }
}

/// `isdefined(m, :name)` and `isdefined(x, :field)`
pub(super) fn isdefined(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [value, _] => Ok(Value::Bool(has_property(value, symbol_arg("isdefined", args, 1)?))),
        _ => Err(RuntimeError::method("isdefined", args)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{StructDef, StructObj};
    use std::rc::Rc;

    fn point(mutable: bool) -> Value {
        let def = Rc::new(StructDef {
            name: "Point".to_string(),
            mutable,
            fields: vec![("x".to_string(), Type::Int64), ("y".to_string(), Type::Float64)],
        });
        Value::Struct(Rc::new(StructObj::new(def, &[Value::Int64(1), Value::Int64(2)]).unwrap()))
    }

    #[test]
    fn test_struct_fields_are_converted() {
        let p = point(false);
        assert!(matches!(get_property(&p, "y").unwrap(), Value::Float64(y) if y == 2.0));
        assert_eq!(get_property(&p, "z").unwrap_err().kind(), "FieldError");
    }

    #[test]
    fn test_mutable_struct_set() {
        let p = point(true);
        set_property(&p, "x", &Value::Int64(10)).unwrap();
        assert!(matches!(get_property(&p, "x").unwrap(), Value::Int64(10)));
        let err = set_property(&p, "x", &Value::str("no")).unwrap_err();
        assert_eq!(err.kind(), "MethodError");
    }

    #[test]
    fn test_immutable_struct_set() {
        let err = set_property(&point(false), "x", &Value::Int64(10)).unwrap_err();
        assert!(matches!(err, RuntimeError::ImmutableField { .. }));
    }

    #[test]
    fn test_pair_properties() {
        let pair = Value::pair(Value::Int64(1), Value::str("a"));
        assert!(has_property(&pair, "second"));
        assert!(!has_property(&pair, "third"));
        assert!(matches!(
            set_property(&pair, "first", &Value::Int64(2)).unwrap_err(),
            RuntimeError::ImmutableField { .. }
        ));
    }
}
