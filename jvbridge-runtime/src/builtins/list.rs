//! Arrays, bit vectors and ranges
//!
//! Design: Every indexed access resolves its indices against the container's
//! shape into a `Selection` of zero-based column-major offsets. Reads gather
//! those offsets, writes scatter into them. Trailing indices collapse into the
//! last one the way linear indexing does, so `A[i]`, `A[i, j]` and
//! `A[i, j, 1]` all go through the same path.

use std::rc::Rc;

use bitvec::vec::BitVec;

use crate::error::{RuntimeError, RuntimeResult};
use crate::interop::Engine;
use crate::objects::{ArrayObj, Buffer, Kwargs, Type, Value};

use super::compare::ordering;
use super::convert::{convert_value, infer_elem_type};
use super::iter::{array_like, collect_values};
use super::len::elem_type_of;
use super::operations::{arith, Arith};
use super::print::repr;
use super::{dict, kwarg};

// ============================================================================
// Index resolution
// ============================================================================

/// One resolved index position
enum Pick {
    One(usize),
    Many(Vec<usize>),
}

/// Offsets addressed by a full index tuple
struct Selection {
    shape: Vec<usize>,
    offsets: Vec<usize>,
    scalar: bool,
}

fn invalid_index(index: &Value) -> RuntimeError {
    RuntimeError::Argument(format!(
        "invalid index: {} of type {}",
        repr(index),
        index.type_of()
    ))
}

/// Resolve one index against an extent; `Ok(None)` when out of bounds
fn pick(index: &Value, extent: usize) -> RuntimeResult<Option<Pick>> {
    let in_range = |i: i64| (i >= 1 && (i as usize) <= extent).then(|| i as usize - 1);
    match index {
        Value::Bool(_) => Err(invalid_index(index)),
        Value::Range(start, stop) => Ok((*start..=*stop)
            .map(in_range)
            .collect::<Option<Vec<_>>>()
            .map(Pick::Many)),
        Value::BitVector(mask) => Ok(mask_pick(mask.borrow().iter().map(|b| *b), extent)),
        Value::Array(array) if array.elem_type() == Type::Bool => Ok(mask_pick(
            array.to_values().iter().map(|v| v.as_bool() == Some(true)),
            extent,
        )),
        Value::Array(array) => {
            let mut offsets = Vec::with_capacity(array.len());
            for item in array.to_values() {
                let i = match item {
                    Value::Bool(_) => return Err(invalid_index(&item)),
                    ref other => other.as_i64().ok_or_else(|| invalid_index(other))?,
                };
                match in_range(i) {
                    Some(offset) => offsets.push(offset),
                    None => return Ok(None),
                }
            }
            Ok(Some(Pick::Many(offsets)))
        }
        other => match other.as_i64() {
            Some(i) => Ok(in_range(i).map(Pick::One)),
            None => Err(invalid_index(other)),
        },
    }
}

fn mask_pick(mask: impl ExactSizeIterator<Item = bool>, extent: usize) -> Option<Pick> {
    if mask.len() != extent {
        return None;
    }
    Some(Pick::Many(
        mask.enumerate().filter(|(_, b)| *b).map(|(i, _)| i).collect(),
    ))
}

/// Extent seen by each of `count` indices
fn index_extents(dims: &[usize], count: usize) -> Vec<usize> {
    match count {
        0 => Vec::new(),
        1 => vec![dims.iter().product()],
        n if n >= dims.len() => {
            let mut extents = dims.to_vec();
            extents.resize(n, 1);
            extents
        }
        n => {
            let mut extents = dims[..n - 1].to_vec();
            extents.push(dims[n - 1..].iter().product());
            extents
        }
    }
}

fn index_text(indices: &[Value]) -> String {
    indices.iter().map(repr).collect::<Vec<_>>().join(", ")
}

fn select(
    dims: &[usize],
    indices: &[Value],
    out_of_bounds: &dyn Fn(String) -> RuntimeError,
) -> RuntimeResult<Selection> {
    if indices.is_empty() {
        return match dims.iter().product::<usize>() {
            1 => Ok(Selection {
                shape: Vec::new(),
                offsets: vec![0],
                scalar: true,
            }),
            _ => Err(out_of_bounds(String::new())),
        };
    }
    let extents = index_extents(dims, indices.len());
    let mut picks = Vec::with_capacity(indices.len());
    for (index, extent) in indices.iter().zip(&extents) {
        match pick(index, *extent)? {
            Some(p) => picks.push(p),
            None => return Err(out_of_bounds(index_text(indices))),
        }
    }

    let mut offsets = vec![0usize];
    let mut stride = 1usize;
    let mut shape = Vec::new();
    for (p, extent) in picks.iter().zip(&extents) {
        let choices: &[usize] = match p {
            Pick::One(i) => std::slice::from_ref(i),
            Pick::Many(v) => {
                shape.push(v.len());
                v
            }
        };
        let previous = std::mem::take(&mut offsets);
        offsets = choices
            .iter()
            .flat_map(|c| previous.iter().map(move |o| o + c * stride))
            .collect();
        stride *= extent;
    }
    let scalar = picks.iter().all(|p| matches!(p, Pick::One(_)));
    Ok(Selection {
        shape,
        offsets,
        scalar,
    })
}

fn sequence_bounds(collection: &Value, len: usize) -> impl Fn(String) -> RuntimeError + '_ {
    move |index| RuntimeError::Bounds {
        container: format!("{len}-element {}", collection.type_of()),
        index,
    }
}

// ============================================================================
// getindex / setindex!
// ============================================================================

/// `collection[indices...]`
pub(crate) fn index_value(collection: &Value, indices: &[Value]) -> RuntimeResult<Value> {
    match collection {
        Value::Array(array) => index_array(array, indices),
        Value::Dict(d) => dict::lookup(d, indices),
        Value::Type(elem) => Value::vector(elem, indices),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let selection = select(&[chars.len()], indices, &sequence_bounds(collection, chars.len()))?;
            let text: String = selection.offsets.iter().map(|o| chars[*o]).collect();
            Ok(Value::str(&text))
        }
        Value::Tuple(items) => {
            let selection = select(&[items.len()], indices, &sequence_bounds(collection, items.len()))?;
            if selection.scalar {
                return Ok(items[selection.offsets[0]].clone());
            }
            Ok(Value::tuple(
                selection.offsets.iter().map(|o| items[*o].clone()).collect(),
            ))
        }
        Value::Pair(pair) => {
            let items = [pair.0.clone(), pair.1.clone()];
            let selection = select(&[2], indices, &sequence_bounds(collection, 2))?;
            match selection.offsets.as_slice() {
                [o] if selection.scalar => Ok(items[*o].clone()),
                _ => Err(RuntimeError::method("getindex", &[collection.clone(), indices[0].clone()])),
            }
        }
        Value::BitVector(_) | Value::Range(..) => {
            let Some((dims, items)) = array_like(collection) else {
                return Err(RuntimeError::method("getindex", collection_and(collection, indices).as_slice()));
            };
            let selection = select(&dims, indices, &sequence_bounds(collection, items.len()))?;
            if selection.scalar {
                return Ok(items[selection.offsets[0]].clone());
            }
            let picked: Vec<Value> = selection.offsets.iter().map(|o| items[*o].clone()).collect();
            match (collection, indices) {
                (Value::BitVector(_), _) => bits_from_values(&picked),
                (Value::Range(..), [Value::Range(..)]) => Ok(match (picked.first(), picked.last()) {
                    (Some(first), Some(last)) => {
                        Value::Range(first.as_i64().unwrap_or(1), last.as_i64().unwrap_or(0))
                    }
                    _ => Value::Range(1, 0),
                }),
                _ => Value::vector(&Type::Int64, &picked),
            }
        }
        _ => Err(RuntimeError::method(
            "getindex",
            collection_and(collection, indices).as_slice(),
        )),
    }
}

fn collection_and(collection: &Value, rest: &[Value]) -> Vec<Value> {
    std::iter::once(collection.clone()).chain(rest.iter().cloned()).collect()
}

fn index_array(array: &ArrayObj, indices: &[Value]) -> RuntimeResult<Value> {
    let selection = select(&array.dims(), indices, &|index| array.out_of_bounds(index))?;
    if selection.scalar {
        return array
            .get(selection.offsets[0])
            .ok_or_else(|| array.out_of_bounds(index_text(indices)));
    }
    let buffer = array.buffer();
    let picked = selection
        .offsets
        .iter()
        .map(|o| buffer.get(*o))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| array.out_of_bounds(index_text(indices)))?;
    let elem = buffer.elem_type();
    drop(buffer);
    Ok(Value::Array(Rc::new(ArrayObj::new(
        Buffer::from_values(&elem, &picked)?,
        selection.shape,
    ))))
}

/// `collection[indices...] = value`
pub(crate) fn assign_index(collection: &Value, value: &Value, indices: &[Value]) -> RuntimeResult<()> {
    match collection {
        Value::Array(array) => {
            let selection = select(&array.dims(), indices, &|index| array.out_of_bounds(index))?;
            scatter(&selection, value, |offset, item| array.set(offset, item))
        }
        Value::BitVector(bits) => {
            let len = bits.borrow().len();
            let selection = select(&[len], indices, &sequence_bounds(collection, len))?;
            scatter(&selection, value, |offset, item| {
                let bit = convert_value(&Type::Bool, item)?;
                bits.borrow_mut().set(offset, bit.as_bool() == Some(true));
                Ok(())
            })
        }
        Value::Dict(d) => dict::store(d, value, indices),
        _ => {
            let mut args = vec![collection.clone(), value.clone()];
            args.extend(indices.iter().cloned());
            Err(RuntimeError::method("setindex!", &args))
        }
    }
}

fn scatter(
    selection: &Selection,
    value: &Value,
    mut write: impl FnMut(usize, &Value) -> RuntimeResult<()>,
) -> RuntimeResult<()> {
    if selection.scalar {
        return write(selection.offsets[0], value);
    }
    let items = match value {
        Value::Array(_) | Value::BitVector(_) | Value::Range(..) | Value::Tuple(_) => collect_values(value)?,
        _ => {
            return Err(RuntimeError::Argument(
                "indexed assignment with a single value to possibly many locations is not supported; perhaps use broadcasting `.=` instead?".to_string(),
            ))
        }
    };
    if items.len() != selection.offsets.len() {
        return Err(RuntimeError::DimensionMismatch(format!(
            "tried to assign {} elements to {} destinations",
            items.len(),
            selection.offsets.len()
        )));
    }
    for (offset, item) in selection.offsets.iter().zip(&items) {
        write(*offset, item)?;
    }
    Ok(())
}

pub(super) fn getindex(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [collection, indices @ ..] => index_value(collection, indices),
        [] => Err(RuntimeError::method("getindex", args)),
    }
}

pub(super) fn setindex(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [collection, value, indices @ ..] => {
            assign_index(collection, value, indices)?;
            Ok(collection.clone())
        }
        _ => Err(RuntimeError::method("setindex!", args)),
    }
}

// ============================================================================
// Bit vectors
// ============================================================================

pub(super) fn bits_from_values(values: &[Value]) -> RuntimeResult<Value> {
    let mut bits = BitVec::with_capacity(values.len());
    for value in values {
        let bit = convert_value(&Type::Bool, value)?;
        bits.push(bit.as_bool() == Some(true));
    }
    Ok(Value::bitvector(bits))
}

/// `B << n` moves elements towards lower indices, `B >> n` towards higher
/// ones; vacated positions are `false`
pub(crate) fn shift_bits(bits: &BitVec, left: bool, amount: i128) -> Value {
    if amount < 0 {
        return shift_bits(bits, !left, -amount);
    }
    let len = bits.len();
    let amount = usize::try_from(amount).unwrap_or(usize::MAX);
    let mut shifted = BitVec::repeat(false, len);
    for i in 0..len {
        let source = if left {
            i.checked_add(amount)
        } else {
            i.checked_sub(amount)
        };
        if let Some(bit) = source.and_then(|s| bits.get(s)) {
            shifted.set(i, *bit);
        }
    }
    Value::bitvector(shifted)
}

/// `BitArray(collection)`
pub(super) fn bitarray(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [source] => bits_from_values(&collect_values(source)?),
        _ => Err(RuntimeError::method("BitArray", args)),
    }
}

/// Rows and columns of a matrix operand; vectors are columns
fn matrix_shape(array: &ArrayObj) -> RuntimeResult<(usize, usize)> {
    match array.dims().as_slice() {
        [n] => Ok((*n, 1)),
        [m, n] => Ok((*m, *n)),
        dims => Err(RuntimeError::DimensionMismatch(format!(
            "cannot multiply arrays of dimensions {}",
            crate::objects::format_dims(dims)
        ))),
    }
}

/// `A * B` for matrices and matrix-vector products
pub(super) fn matmul(a: &ArrayObj, b: &ArrayObj) -> RuntimeResult<Value> {
    let (m, k) = matrix_shape(a)?;
    let (inner, n) = matrix_shape(b)?;
    if k != inner {
        return Err(RuntimeError::DimensionMismatch(format!(
            "matrix A has dimensions ({m},{k}), matrix B has dimensions ({inner},{n})"
        )));
    }
    let elem = super::convert::promote_type(&a.elem_type(), &b.elem_type()).unwrap_or(Type::Any);
    let (lhs, rhs) = (a.to_values(), b.to_values());
    let mut out = Vec::with_capacity(m * n);
    for j in 0..n {
        for i in 0..m {
            let mut acc: Option<Value> = None;
            for p in 0..k {
                let product = arith(Arith::Mul, &lhs[p * m + i], &rhs[j * k + p])?;
                acc = Some(match acc {
                    Some(sum) => arith(Arith::Add, &sum, &product)?,
                    None => product,
                });
            }
            out.push(match acc {
                Some(sum) => sum,
                None => convert_value(&elem, &Value::Int64(0))?,
            });
        }
    }
    let dims = if b.ndims() == 1 { vec![m] } else { vec![m, n] };
    Ok(Value::Array(Rc::new(ArrayObj::new(
        Buffer::from_values(&elem, &out)?,
        dims,
    ))))
}

// ============================================================================
// Mutation
// ============================================================================

pub(super) fn push(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let [collection, items @ ..] = args else {
        return Err(RuntimeError::method("push!", args));
    };
    match collection {
        Value::Array(array) => {
            for item in items {
                array.push(item)?;
            }
        }
        Value::BitVector(bits) => {
            for item in items {
                let bit = convert_value(&Type::Bool, item)?;
                bits.borrow_mut().push(bit.as_bool() == Some(true));
            }
        }
        Value::Dict(d) => {
            for item in items {
                let Value::Pair(pair) = item else {
                    return Err(RuntimeError::method("push!", &[collection.clone(), item.clone()]));
                };
                d.insert(&pair.0, &pair.1)?;
            }
        }
        _ => return Err(RuntimeError::method("push!", args)),
    }
    Ok(collection.clone())
}

pub(super) fn pop(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [Value::Array(array)] => array.pop(),
        [Value::BitVector(bits)] => bits
            .borrow_mut()
            .pop()
            .map(Value::Bool)
            .ok_or_else(|| RuntimeError::Argument("array must be non-empty".to_string())),
        [Value::Dict(d), key] => dict::take(d, key, None),
        [Value::Dict(d), key, default] => dict::take(d, key, Some(default)),
        _ => Err(RuntimeError::method("pop!", args)),
    }
}

pub(super) fn append(engine: &Engine, args: &[Value], kwargs: &Kwargs) -> RuntimeResult<Value> {
    let [collection, sources @ ..] = args else {
        return Err(RuntimeError::method("append!", args));
    };
    let mut items = vec![collection.clone()];
    for source in sources {
        items.extend(collect_values(source)?);
    }
    push(engine, &items, kwargs)
}

// ============================================================================
// Construction and shape
// ============================================================================

/// Dimensions given either as integers or as one tuple of integers
fn dims_arg(name: &str, args: &[Value]) -> RuntimeResult<Vec<usize>> {
    let dims: Vec<Value> = match args {
        [Value::Tuple(items)] => items.to_vec(),
        _ => args.to_vec(),
    };
    dims.iter()
        .map(|d| match d {
            Value::Bool(_) => None,
            other => other.as_i64(),
        })
        .map(|d| match d {
            Some(n) if n >= 0 => Ok(n as usize),
            Some(n) => Err(RuntimeError::Argument(format!(
                "invalid Array dimensions: negative dimension {n}"
            ))),
            None => Err(RuntimeError::method(name, args)),
        })
        .collect()
}

fn filled(elem: &Type, value: &Value, dims: Vec<usize>) -> RuntimeResult<Value> {
    let count: usize = dims.iter().product();
    let items = vec![value.clone(); count];
    Ok(Value::Array(Rc::new(ArrayObj::new(
        Buffer::from_values(elem, &items)?,
        dims,
    ))))
}

fn constant_array(name: &str, unit: i64, args: &[Value]) -> RuntimeResult<Value> {
    let (elem, dims) = match args {
        [Value::Type(elem), rest @ ..] => (elem.clone(), rest),
        _ => (Type::Float64, args),
    };
    if !elem.is_bits() {
        return Err(RuntimeError::method(name, args));
    }
    filled(&elem, &Value::Int64(unit), dims_arg(name, dims)?)
}

pub(super) fn zeros(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    constant_array("zeros", 0, args)
}

pub(super) fn ones(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    constant_array("ones", 1, args)
}

pub(super) fn fill(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [value, dims @ ..] => filled(&value.type_of(), value, dims_arg("fill", dims)?),
        [] => Err(RuntimeError::method("fill", args)),
    }
}

pub(super) fn reshape(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let [source, dims @ ..] = args else {
        return Err(RuntimeError::method("reshape", args));
    };
    let dims = dims_arg("reshape", dims)?;
    match source {
        Value::Array(array) => Ok(Value::Array(Rc::new(array.reshape(dims)?))),
        Value::BitVector(_) | Value::Range(..) => {
            let elem = elem_type_of(source);
            let vector = ArrayObj::vector(Buffer::from_values(&elem, &collect_values(source)?)?);
            Ok(Value::Array(Rc::new(vector.reshape(dims)?)))
        }
        _ => Err(RuntimeError::method("reshape", args)),
    }
}

/// `vec(A)`: one-dimensional view over the same data
pub(super) fn vec(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [Value::Array(array)] if array.ndims() == 1 => Ok(args[0].clone()),
        [Value::Array(array)] => Ok(Value::Array(Rc::new(array.reshape(vec![array.len()])?))),
        [source @ (Value::BitVector(_) | Value::Range(..) | Value::Tuple(_))] => {
            let items = collect_values(source)?;
            let elem = match source {
                Value::Tuple(_) => infer_elem_type(&items),
                other => elem_type_of(other),
            };
            Value::vector(&elem, &items)
        }
        _ => Err(RuntimeError::method("vec", args)),
    }
}

pub(super) fn copy(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [Value::Array(array)] => Ok(Value::Array(Rc::new(array.duplicate()))),
        [Value::BitVector(bits)] => Ok(Value::bitvector(bits.borrow().clone())),
        [Value::Dict(d)] => Ok(Value::Dict(Rc::new(dict::duplicate(d)?))),
        [other] => Ok(other.clone()),
        _ => Err(RuntimeError::method("copy", args)),
    }
}

// ============================================================================
// Ordering and reversal
// ============================================================================

/// Elements and element type of a sortable collection
fn sequence_items(name: &str, args: &[Value]) -> RuntimeResult<(Type, Vec<Value>)> {
    match args {
        [source @ (Value::Array(_) | Value::BitVector(_) | Value::Range(..))] => {
            Ok((elem_type_of(source), collect_values(source)?))
        }
        _ => Err(RuntimeError::method(name, args)),
    }
}

fn sorted(mut items: Vec<Value>, reverse: bool) -> RuntimeResult<Vec<Value>> {
    let mut failure = None;
    items.sort_by(|a, b| match ordering("isless", a, b) {
        Ok(Some(order)) => order,
        // NaN sorts last
        Ok(None) => super::math::is_nan(a).cmp(&super::math::is_nan(b)),
        Err(err) => {
            failure.get_or_insert(err);
            std::cmp::Ordering::Equal
        }
    });
    if let Some(err) = failure {
        return Err(err);
    }
    if reverse {
        items.reverse();
    }
    Ok(items)
}

fn rev_flag(kwargs: &Kwargs) -> RuntimeResult<bool> {
    match kwarg(kwargs, "rev") {
        None => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(RuntimeError::not_boolean("sort", other)),
    }
}

pub(super) fn sort(_: &Engine, args: &[Value], kwargs: &Kwargs) -> RuntimeResult<Value> {
    let (elem, items) = sequence_items("sort", args)?;
    let items = sorted(items, rev_flag(kwargs)?)?;
    match &args[0] {
        Value::BitVector(_) => bits_from_values(&items),
        _ => Value::vector(&elem, &items),
    }
}

/// `sort!(v)` rewrites the vector in place
pub(super) fn sort_in_place(_: &Engine, args: &[Value], kwargs: &Kwargs) -> RuntimeResult<Value> {
    let [Value::Array(array)] = args else {
        return Err(RuntimeError::method("sort!", args));
    };
    let items = sorted(array.to_values(), rev_flag(kwargs)?)?;
    for (offset, item) in items.iter().enumerate() {
        array.set(offset, item)?;
    }
    Ok(args[0].clone())
}

pub(super) fn reverse(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [Value::Tuple(items)] => Ok(Value::tuple(items.iter().rev().cloned().collect())),
        [Value::Str(s)] => Ok(Value::str(&s.chars().rev().collect::<String>())),
        [Value::BitVector(bits)] => Ok(Value::bitvector(bits.borrow().iter().rev().map(|b| *b).collect())),
        _ => {
            let (elem, mut items) = sequence_items("reverse", args)?;
            items.reverse();
            Value::vector(&elem, &items)
        }
    }
}

// ============================================================================
// Reductions
// ============================================================================

/// Small integers accumulate at machine width
fn widen(value: &Value) -> Value {
    match *value {
        Value::Bool(b) => Value::Int64(b.into()),
        Value::Int8(v) => Value::Int64(v.into()),
        Value::Int16(v) => Value::Int64(v.into()),
        Value::Int32(v) => Value::Int64(v.into()),
        Value::UInt8(v) => Value::UInt64(v.into()),
        Value::UInt16(v) => Value::UInt64(v.into()),
        Value::UInt32(v) => Value::UInt64(v.into()),
        _ => value.clone(),
    }
}

fn reduce(name: &str, op: Arith, unit: i64, args: &[Value]) -> RuntimeResult<Value> {
    let [source] = args else {
        return Err(RuntimeError::method(name, args));
    };
    let items = collect_values(source)?;
    let mut items = items.iter();
    let Some(first) = items.next() else {
        let elem = elem_type_of(source);
        if elem.is_bits() {
            return Ok(widen(&convert_value(&elem, &Value::Int64(unit))?));
        }
        return Err(RuntimeError::Argument(
            "reducing over an empty collection is not allowed".to_string(),
        ));
    };
    items.try_fold(widen(first), |acc, item| arith(op, &acc, &widen(item)))
}

pub(super) fn sum(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    reduce("sum", Arith::Add, 0, args)
}

pub(super) fn prod(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    reduce("prod", Arith::Mul, 1, args)
}

fn extremum(name: &str, want: std::cmp::Ordering, args: &[Value]) -> RuntimeResult<Value> {
    let [source] = args else {
        return Err(RuntimeError::method(name, args));
    };
    let mut items = collect_values(source)?.into_iter();
    let first = items.next().ok_or_else(|| {
        RuntimeError::Argument("reducing over an empty collection is not allowed".to_string())
    })?;
    items.try_fold(first, |best, item| {
        Ok(match ordering(name, &item, &best)? {
            Some(order) if order == want => item,
            None if super::math::is_nan(&item) => item,
            _ => best,
        })
    })
}

pub(super) fn maximum(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    extremum("maximum", std::cmp::Ordering::Greater, args)
}

pub(super) fn minimum(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    extremum("minimum", std::cmp::Ordering::Less, args)
}

fn end_element(name: &str, args: &[Value], last: bool) -> RuntimeResult<Value> {
    let [source] = args else {
        return Err(RuntimeError::method(name, args));
    };
    let items = collect_values(source)?;
    let item = if last { items.last() } else { items.first() };
    item.cloned().ok_or_else(|| RuntimeError::Bounds {
        container: format!("0-element {}", source.type_of()),
        index: if last { "0" } else { "1" }.to_string(),
    })
}

pub(super) fn first(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    end_element("first", args, false)
}

pub(super) fn last(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    end_element("last", args, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_vector(items: &[i64]) -> Value {
        Value::Array(Rc::new(ArrayObj::vector(Buffer::Int64(items.to_vec()))))
    }

    #[test]
    fn test_linear_and_cartesian_indexing_agree() {
        let array = ArrayObj::vector(Buffer::Int64(vec![1, 2, 3, 4, 5, 6]));
        let matrix = Value::Array(Rc::new(array.reshape(vec![2, 3]).unwrap()));
        let linear = index_value(&matrix, &[Value::Int64(4)]).unwrap();
        let cartesian = index_value(&matrix, &[Value::Int64(2), Value::Int64(2)]).unwrap();
        assert!(matches!(linear, Value::Int64(4)));
        assert!(matches!(cartesian, Value::Int64(4)));
    }

    #[test]
    fn test_range_index_keeps_element_type() {
        let v = Value::vector(&Type::Int8, &[Value::Int64(1), Value::Int64(2), Value::Int64(3)]).unwrap();
        let slice = index_value(&v, &[Value::Range(2, 3)]).unwrap();
        assert_eq!(slice.type_of(), Type::vector(Type::Int8));
        assert_eq!(repr(&slice), "Int8[2, 3]");
    }

    #[test]
    fn test_out_of_bounds_index() {
        let err = index_value(&int_vector(&[1, 2, 3]), &[Value::Int64(4)]).unwrap_err();
        assert_eq!(err.kind(), "BoundsError");
        assert!(err.to_string().contains("[4]"));
    }

    #[test]
    fn test_bool_index_is_rejected() {
        let err = index_value(&int_vector(&[1]), &[Value::Bool(true)]).unwrap_err();
        assert_eq!(err.kind(), "ArgumentError");
    }

    #[test]
    fn test_typed_vector_literal_through_type_index() {
        let v = index_value(&Value::Type(Type::Int32), &[]).unwrap();
        assert_eq!(v.type_of(), Type::vector(Type::Int32));
    }

    #[test]
    fn test_assign_many_requires_matching_length() {
        let v = int_vector(&[1, 2, 3]);
        assign_index(&v, &int_vector(&[7, 8]), &[Value::Range(1, 2)]).unwrap();
        assert_eq!(repr(&v), "[7, 8, 3]");
        let err = assign_index(&v, &Value::Int64(0), &[Value::Range(1, 2)]).unwrap_err();
        assert_eq!(err.kind(), "ArgumentError");
    }

    #[test]
    fn test_shift_bits_direction() {
        let bits: BitVec = [true, false, true, false, false].iter().copied().collect();
        let right = shift_bits(&bits, false, 1);
        let left = shift_bits(&bits, true, 1);
        assert_eq!(repr(&right), "Bool[0, 1, 0, 1, 0]");
        assert_eq!(repr(&left), "Bool[0, 1, 0, 0, 0]");
        let cleared = shift_bits(&bits, false, 9);
        assert_eq!(repr(&cleared), "Bool[0, 0, 0, 0, 0]");
    }

    #[test]
    fn test_index_extents_collapse_trailing_dims() {
        assert_eq!(index_extents(&[2, 3, 4], 1), vec![24]);
        assert_eq!(index_extents(&[2, 3, 4], 2), vec![2, 12]);
        assert_eq!(index_extents(&[2, 3], 3), vec![2, 3, 1]);
    }

    #[test]
    fn test_matmul_column_major() {
        let a = ArrayObj::vector(Buffer::Int64(vec![1, 2, 3, 4])).reshape(vec![2, 2]).unwrap();
        let b = ArrayObj::vector(Buffer::Int64(vec![1, 1]));
        let product = matmul(&a, &b).unwrap();
        assert_eq!(repr(&product), "[4, 6]");
        let wrong = ArrayObj::vector(Buffer::Int64(vec![1, 2, 3]));
        assert_eq!(matmul(&a, &wrong).unwrap_err().kind(), "DimensionMismatch");
    }

    #[test]
    fn test_sorted_with_reverse() {
        let items = vec![Value::Int64(3), Value::Int64(1), Value::Int64(2)];
        let out = sorted(items, true).unwrap();
        let ints: Vec<i64> = out.iter().filter_map(Value::as_i64).collect();
        assert_eq!(ints, vec![3, 2, 1]);
        let mixed = vec![Value::Int64(1), Value::str("a")];
        assert!(sorted(mixed, false).is_err());
    }
}
