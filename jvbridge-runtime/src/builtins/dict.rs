//! Dictionaries
//!
//! Several indices address one composite key: `d[1, 2]` is `d[(1, 2)]`.

use std::rc::Rc;

use crate::error::{RuntimeError, RuntimeResult};
use crate::interop::Engine;
use crate::objects::{DictObj, Kwargs, Type, Value};

use super::convert::infer_elem_type;
use super::iter::collect_values;
use super::print::repr;

fn composite_key(indices: &[Value]) -> Value {
    match indices {
        [key] => key.clone(),
        keys => Value::tuple(keys.to_vec()),
    }
}

fn missing_key(key: &Value) -> RuntimeError {
    RuntimeError::Key { key: repr(key) }
}

pub(crate) fn lookup(dict: &DictObj, indices: &[Value]) -> RuntimeResult<Value> {
    let key = composite_key(indices);
    dict.get(&key).ok_or_else(|| missing_key(&key))
}

pub(crate) fn store(dict: &DictObj, value: &Value, indices: &[Value]) -> RuntimeResult<()> {
    dict.insert(&composite_key(indices), value)
}

/// `pop!(d, key[, default])`
pub(crate) fn take(dict: &DictObj, key: &Value, default: Option<&Value>) -> RuntimeResult<Value> {
    match (dict.remove(key), default) {
        (Some(value), _) => Ok(value),
        (None, Some(default)) => Ok(default.clone()),
        (None, None) => Err(missing_key(key)),
    }
}

pub(crate) fn duplicate(dict: &DictObj) -> RuntimeResult<DictObj> {
    let copy = DictObj::new(dict.key_type.clone(), dict.value_type.clone());
    for (key, value) in dict.entries() {
        copy.insert(&key, &value)?;
    }
    Ok(copy)
}

/// Entries given as pairs, or as one iterable of pairs
fn entry_pairs(args: &[Value]) -> RuntimeResult<Vec<(Value, Value)>> {
    let items = match args {
        [single] if !matches!(single, Value::Pair(_)) => collect_values(single)?,
        _ => args.to_vec(),
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Pair(pair) => Ok((pair.0.clone(), pair.1.clone())),
            Value::Tuple(ref kv) if kv.len() == 2 => Ok((kv[0].clone(), kv[1].clone())),
            other => Err(RuntimeError::Argument(format!(
                "Dict(kv): kv needs to be an iterator of 2-tuples or pairs, got {}",
                repr(&other)
            ))),
        })
        .collect()
}

/// `Dict(...)` and `Dict{K, V}(...)`; an untyped call infers `K` and `V`
pub(crate) fn construct(types: Option<(Type, Type)>, args: &[Value]) -> RuntimeResult<Value> {
    let entries = entry_pairs(args)?;
    let (key_type, value_type) = match types {
        Some(types) => types,
        None => {
            let keys: Vec<Value> = entries.iter().map(|(k, _)| k.clone()).collect();
            let values: Vec<Value> = entries.iter().map(|(_, v)| v.clone()).collect();
            (infer_elem_type(&keys), infer_elem_type(&values))
        }
    };
    let dict = DictObj::new(key_type, value_type);
    for (key, value) in &entries {
        dict.insert(key, value)?;
    }
    Ok(Value::Dict(Rc::new(dict)))
}

pub(super) fn haskey(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [Value::Dict(d), key] => Ok(Value::Bool(d.contains_key(key))),
        _ => Err(RuntimeError::method("haskey", args)),
    }
}

/// `get(d, key, default)`; collections with integer keys work too
pub(super) fn get(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [Value::Dict(d), key, default] => Ok(d.get(key).unwrap_or_else(|| default.clone())),
        [collection, index, default] => {
            match super::list::index_value(collection, std::slice::from_ref(index)) {
                Ok(value) => Ok(value),
                Err(RuntimeError::Bounds { .. }) => Ok(default.clone()),
                Err(err) => Err(err),
            }
        }
        _ => Err(RuntimeError::method("get", args)),
    }
}

/// `get!(d, key, default)` stores the default when the key is absent
pub(super) fn get_or_insert(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let [Value::Dict(d), key, default] = args else {
        return Err(RuntimeError::method("get!", args));
    };
    if let Some(value) = d.get(key) {
        return Ok(value);
    }
    d.insert(key, default)?;
    lookup(d, std::slice::from_ref(key))
}

pub(super) fn delete(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [Value::Dict(d), key] => {
            d.remove(key);
            Ok(args[0].clone())
        }
        _ => Err(RuntimeError::method("delete!", args)),
    }
}

pub(super) fn keys(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [Value::Dict(d)] => {
            let keys: Vec<Value> = d.entries().into_iter().map(|(k, _)| k).collect();
            Value::vector(&d.key_type, &keys)
        }
        [collection] => {
            let n = super::len::length_of(collection)
                .ok_or_else(|| RuntimeError::method("keys", args))?;
            Ok(Value::Range(1, n as i64))
        }
        _ => Err(RuntimeError::method("keys", args)),
    }
}

pub(super) fn values(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [Value::Dict(d)] => {
            let values: Vec<Value> = d.entries().into_iter().map(|(_, v)| v).collect();
            Value::vector(&d.value_type, &values)
        }
        [collection] => Ok(collection.clone()),
        _ => Err(RuntimeError::method("values", args)),
    }
}
