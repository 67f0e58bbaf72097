//! Iteration protocol
//!
//! Design: `iterate(x)` / `iterate(x, state)` with an integer state, so any
//! caller can walk a collection one element at a time. Internally the
//! interpreter collects finite iterables eagerly through `collect_values`.

use std::rc::Rc;

use crate::error::{RuntimeError, RuntimeResult};
use crate::interop::Engine;
use crate::objects::{ArrayObj, Buffer, Kwargs, Type, Value};

use super::compare::equals;
use super::convert::infer_elem_type;

/// Number of elements in a unit range
pub(crate) fn range_len(start: i64, stop: i64) -> usize {
    if stop < start {
        0
    } else {
        (stop - start) as usize + 1
    }
}

/// Shape and elements of array-like values (arrays, bit vectors, ranges)
pub(crate) fn array_like(value: &Value) -> Option<(Vec<usize>, Vec<Value>)> {
    match value {
        Value::Array(array) => Some((array.dims(), array.to_values())),
        Value::BitVector(bits) => {
            let bits = bits.borrow();
            Some((vec![bits.len()], bits.iter().map(|b| Value::Bool(*b)).collect()))
        }
        Value::Range(start, stop) => Some((
            vec![range_len(*start, *stop)],
            (*start..=*stop).map(Value::Int64).collect(),
        )),
        _ => None,
    }
}

/// Elements of any finite iterable, in iteration order
pub fn collect_values(value: &Value) -> RuntimeResult<Vec<Value>> {
    if let Some((_, items)) = array_like(value) {
        return Ok(items);
    }
    match value {
        Value::Tuple(items) => Ok(items.to_vec()),
        Value::Pair(p) => Ok(vec![p.0.clone(), p.1.clone()]),
        Value::Dict(dict) => Ok(dict
            .entries()
            .into_iter()
            .map(|(k, v)| Value::pair(k, v))
            .collect()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::str(&c.to_string())).collect()),
        v if v.is_number() => Ok(vec![v.clone()]),
        other => Err(RuntimeError::method("iterate", std::slice::from_ref(other))),
    }
}

/// `iterate(x)` and `iterate(x, state)`
pub(super) fn iterate(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let (collection, next) = match args {
        [collection] => (collection, 1),
        [collection, state] => {
            let state = state
                .as_i64()
                .ok_or_else(|| RuntimeError::method("iterate", args))?;
            (collection, state)
        }
        _ => return Err(RuntimeError::method("iterate", args)),
    };
    let items = collect_values(collection)?;
    if next < 1 {
        return Ok(Value::Nothing);
    }
    match items.get((next - 1) as usize) {
        Some(item) => Ok(Value::tuple(vec![item.clone(), Value::Int64(next + 1)])),
        None => Ok(Value::Nothing),
    }
}

/// `x in collection`, using `==` with `missing` propagation
pub(crate) fn contains(item: &Value, collection: &Value) -> RuntimeResult<Value> {
    match collection {
        Value::Dict(dict) => {
            let Value::Pair(pair) = item else {
                return Err(RuntimeError::Argument(
                    "AbstractDict collections only contain Pairs; use `haskey` for keys".to_string(),
                ));
            };
            Ok(match dict.get(&pair.0) {
                Some(stored) => equals(&stored, &pair.1),
                None => Value::Bool(false),
            })
        }
        Value::Range(start, stop) => Ok(match item.as_i64() {
            Some(v) if !matches!(item, Value::Bool(_)) => Value::Bool(*start <= v && v <= *stop),
            _ => Value::Bool(
                (*start..=*stop).any(|v| matches!(equals(&Value::Int64(v), item), Value::Bool(true))),
            ),
        }),
        Value::Str(_) => Err(RuntimeError::method("in", &[item.clone(), collection.clone()])),
        _ => {
            let mut saw_missing = false;
            for candidate in collect_values(collection)? {
                match equals(&candidate, item) {
                    Value::Bool(true) => return Ok(Value::Bool(true)),
                    Value::Missing => saw_missing = true,
                    _ => {}
                }
            }
            Ok(if saw_missing {
                Value::Missing
            } else {
                Value::Bool(false)
            })
        }
    }
}

pub(super) fn in_(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [item, collection] => contains(item, collection),
        _ => Err(RuntimeError::method("in", args)),
    }
}

/// `collect(x)`: a fresh vector of the elements
pub(super) fn collect(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let [source] = args else {
        return Err(RuntimeError::method("collect", args));
    };
    match source {
        Value::Array(array) => Ok(Value::Array(Rc::new(array.duplicate()))),
        Value::BitVector(_) => Value::vector(&Type::Bool, &collect_values(source)?),
        Value::Range(..) => Value::vector(&Type::Int64, &collect_values(source)?),
        Value::Dict(dict) => {
            let elem = Type::Pair(
                Box::new(dict.key_type.clone()),
                Box::new(dict.value_type.clone()),
            );
            Value::vector(&elem, &collect_values(source)?)
        }
        other => {
            let items = collect_values(other)?;
            let elem = infer_elem_type(&items);
            Ok(Value::Array(Rc::new(ArrayObj::vector(Buffer::from_values(
                &elem, &items,
            )?))))
        }
    }
}

/// `a:b` and `a:step:b` over integers
pub(super) fn colon(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let ints: Option<Vec<i64>> = args
        .iter()
        .map(|a| match a {
            Value::Bool(_) => None,
            other => other.as_i64(),
        })
        .collect();
    match ints.as_deref() {
        Some(&[start, stop]) => Ok(Value::Range(start, stop)),
        Some(&[start, step, stop]) => {
            if step == 0 {
                return Err(RuntimeError::Argument("step cannot be zero".to_string()));
            }
            let mut items = Vec::new();
            let mut x = start;
            while (step > 0 && x <= stop) || (step < 0 && x >= stop) {
                items.push(Value::Int64(x));
                x += step;
            }
            Value::vector(&Type::Int64, &items)
        }
        _ => Err(RuntimeError::method(":", args)),
    }
}

/// `map(f, xs)`
pub(super) fn map(engine: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let [f, source] = args else {
        return Err(RuntimeError::method("map", args));
    };
    let items = collect_values(source)?
        .iter()
        .map(|item| engine.call(f, std::slice::from_ref(item), &[]))
        .collect::<RuntimeResult<Vec<_>>>()?;
    match source {
        Value::Tuple(_) => Ok(Value::tuple(items)),
        _ => Value::vector(&infer_elem_type(&items), &items),
    }
}

/// `filter(pred, xs)`; the predicate must return a `Bool`
pub(super) fn filter(engine: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let [pred, source] = args else {
        return Err(RuntimeError::method("filter", args));
    };
    let mut kept = Vec::new();
    for item in collect_values(source)? {
        let verdict = engine.call(pred, std::slice::from_ref(&item), &[])?;
        match verdict {
            Value::Bool(true) => kept.push(item),
            Value::Bool(false) => {}
            other => return Err(RuntimeError::not_boolean("filter", &other)),
        }
    }
    let elem = match source {
        Value::Array(array) => array.elem_type(),
        Value::Range(..) => Type::Int64,
        _ => infer_elem_type(&kept),
    };
    Value::vector(&elem, &kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_len() {
        assert_eq!(range_len(1, 3), 3);
        assert_eq!(range_len(3, 1), 0);
        assert_eq!(range_len(5, 5), 1);
    }

    #[test]
    fn test_collect_values_of_tuple_and_dict() {
        let t = Value::tuple(vec![Value::Int64(1), Value::str("2")]);
        assert_eq!(collect_values(&t).unwrap().len(), 2);
        let d = crate::objects::DictObj::new(Type::Any, Type::Any);
        d.insert(&Value::Int64(1), &Value::Int64(2)).unwrap();
        let items = collect_values(&Value::Dict(Rc::new(d))).unwrap();
        assert!(matches!(items[0], Value::Pair(_)));
    }

    #[test]
    fn test_contains_range_and_vector() {
        let r = Value::Range(1, 5);
        assert!(matches!(contains(&Value::Int64(3), &r).unwrap(), Value::Bool(true)));
        assert!(matches!(contains(&Value::Int64(6), &r).unwrap(), Value::Bool(false)));
        let v = Value::vector(&Type::Any, &[Value::Int64(1), Value::Missing]).unwrap();
        assert!(matches!(contains(&Value::Int64(1), &v).unwrap(), Value::Bool(true)));
        assert!(matches!(contains(&Value::Int64(2), &v).unwrap(), Value::Missing));
    }

    #[test]
    fn test_stepped_colon() {
        let engine = Engine::new();
        let v = colon(&engine, &[Value::Int64(1), Value::Int64(2), Value::Int64(6)], &[]).unwrap();
        assert_eq!(collect_values(&v).unwrap().len(), 3);
        let down = colon(&engine, &[Value::Int64(3), Value::Int64(-1), Value::Int64(1)], &[]).unwrap();
        assert_eq!(collect_values(&down).unwrap().len(), 3);
        assert!(colon(&engine, &[Value::Int64(1), Value::Int64(0), Value::Int64(3)], &[]).is_err());
        assert!(matches!(
            colon(&engine, &[Value::Int64(1), Value::Int64(4)], &[]).unwrap(),
            Value::Range(1, 4)
        ));
    }

    #[test]
    fn test_nothing_is_not_iterable() {
        assert!(collect_values(&Value::Nothing).is_err());
    }
}
