//! Foreign Value Handle
//!
//! Opaque host proxy for a foreign value with no lossless native form.
//! A handle pins its value through an `Anchor`; several handles may alias
//! one foreign object. Field access, indexing and operators are resolved
//! by the runtime on every use, never cached on the host.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FusedIterator;
use std::rc::Rc;

use jvbridge_runtime::{Engine, Value};

use super::convert::to_host;
use super::dispatch::{self, call_foreign_named, Operator};
use crate::core::{Anchor, HostValue};
use crate::errors::{BridgeError, BridgeResult};
use crate::infrastructure::logging::{log_handle_created, warn};

/// Prefix of every handle's `repr`
pub const REPR_PREFIX: &str = "<JV(";

#[derive(Clone)]
pub struct ForeignHandle {
    anchor: Anchor,
    type_name: Rc<str>,
    mutable: bool,
    callable: bool,
}

fn expect_bool(function: &str, value: Value) -> BridgeResult<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(BridgeError::Conversion(format!(
            "`{function}` returned {} where a Bool was expected",
            other.type_of()
        ))),
    }
}

/// Spread a host tuple key into separate foreign indices
///
/// Every tuple is spread, so `(k,)` addresses the same slot as `k`.
fn spread_key(engine: &Rc<Engine>, key: &HostValue) -> BridgeResult<Vec<Value>> {
    match key {
        HostValue::Tuple(parts) => parts
            .iter()
            .map(|part| super::convert::to_foreign(engine, part))
            .collect(),
        single => Ok(vec![super::convert::to_foreign(engine, single)?]),
    }
}

impl ForeignHandle {
    pub fn new(engine: &Rc<Engine>, value: &Value) -> Self {
        let type_name: Rc<str> = Rc::from(value.type_of().to_string());
        log_handle_created(&type_name);
        Self {
            anchor: Anchor::pin(engine, value),
            type_name,
            mutable: value.is_mutable(),
            callable: value.is_callable(),
        }
    }

    pub fn engine(&self) -> &Rc<Engine> {
        self.anchor.engine()
    }

    /// The pinned foreign value
    pub fn value(&self) -> Value {
        self.anchor.value()
    }

    pub fn anchor_id(&self) -> u64 {
        self.anchor.id()
    }

    /// Foreign type name captured when the handle was created
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn is_callable(&self) -> bool {
        self.callable
    }

    /// `<JV(` + the runtime's own display form + `)>`
    pub fn repr(&self) -> String {
        format!("{REPR_PREFIX}{})>", self.engine().repr(&self.value()))
    }

    pub fn call(&self, args: &[HostValue], kwargs: &[(String, HostValue)]) -> BridgeResult<HostValue> {
        dispatch::invoke(self.engine(), &self.value(), args, kwargs)
    }

    pub fn get_field(&self, name: &str) -> BridgeResult<HostValue> {
        dispatch::get_field(self, name)
    }

    pub fn set_field(&self, name: &str, value: &HostValue) -> BridgeResult<()> {
        dispatch::set_field(self, name, value)
    }

    pub fn has_field(&self, name: &str) -> BridgeResult<bool> {
        let result = call_foreign_named(
            self.engine(),
            "hasproperty",
            &[self.value(), Value::symbol(name)],
        )?;
        expect_bool("hasproperty", result)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.engine().property_names(&self.value())
    }

    /// `getindex(x, key...)`; indices are the runtime's own (1-based)
    ///
    /// A tuple key becomes separate indices: `(i, j)` is `x[i, j]` and a
    /// one-element `(k,)` is plain `x[k]`. A dictionary folds several
    /// indices back into one tuple key, so `(a, b)` stays a composite key
    /// there, while a key that is itself a one-element tuple cannot be
    /// reached through this method.
    pub fn get_item(&self, key: &HostValue) -> BridgeResult<HostValue> {
        let engine = self.engine();
        let mut args = vec![self.value()];
        args.extend(spread_key(engine, key)?);
        let result = call_foreign_named(engine, "getindex", &args)?;
        Ok(to_host(engine, &result))
    }

    /// `setindex!(x, value, key...)`, spreading tuple keys like `get_item`
    pub fn set_item(&self, key: &HostValue, value: &HostValue) -> BridgeResult<()> {
        let engine = self.engine();
        let mut args = vec![self.value(), super::convert::to_foreign(engine, value)?];
        args.extend(spread_key(engine, key)?);
        call_foreign_named(engine, "setindex!", &args)?;
        Ok(())
    }

    /// `item in x`
    pub fn contains(&self, item: &HostValue) -> BridgeResult<bool> {
        let engine = self.engine();
        let item = super::convert::to_foreign(engine, item)?;
        let result = call_foreign_named(engine, Operator::Contains.foreign_name(), &[item, self.value()])?;
        expect_bool("in", result)
    }

    /// Host truthiness: numbers are true when non-zero, collections when
    /// non-empty, everything else is true
    pub fn truthy(&self) -> BridgeResult<bool> {
        let engine = self.engine();
        let value = self.value();
        match &value {
            Value::Bool(b) => Ok(*b),
            number if number.is_number() => {
                let result = call_foreign_named(engine, "!=", &[value.clone(), Value::Int64(0)])?;
                expect_bool("!=", result)
            }
            Value::Str(_)
            | Value::Tuple(_)
            | Value::Array(_)
            | Value::BitVector(_)
            | Value::Range(..)
            | Value::Dict(_) => {
                let result = call_foreign_named(engine, "isempty", &[value.clone()])?;
                Ok(!expect_bool("isempty", result)?)
            }
            _ => Ok(true),
        }
    }

    pub fn len(&self) -> BridgeResult<usize> {
        let result = call_foreign_named(self.engine(), "length", &[self.value()])?;
        result
            .as_i64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| BridgeError::Conversion(format!("invalid length {}", self.engine().repr(&result))))
    }

    pub fn is_empty(&self) -> BridgeResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Foreign `hash`, reinterpreted as a signed 64-bit value
    pub fn hash(&self) -> BridgeResult<i64> {
        match call_foreign_named(self.engine(), "hash", &[self.value()])? {
            Value::UInt64(h) => Ok(h as i64),
            other => Err(BridgeError::Conversion(format!(
                "`hash` returned {} where a UInt64 was expected",
                other.type_of()
            ))),
        }
    }

    /// Foreign `isequal`
    pub fn isequal(&self, other: &HostValue) -> BridgeResult<bool> {
        let engine = self.engine();
        let other = super::convert::to_foreign(engine, other)?;
        let result = call_foreign_named(engine, "isequal", &[self.value(), other])?;
        expect_bool("isequal", result)
    }

    /// Foreign identity (`===`)
    pub fn same_object(&self, other: &ForeignHandle) -> BridgeResult<bool> {
        let result = call_foreign_named(self.engine(), "===", &[self.value(), other.value()])?;
        expect_bool("===", result)
    }

    /// `self op other`
    pub fn binary(&self, op: Operator, other: &HostValue) -> BridgeResult<HostValue> {
        dispatch::operator(self.engine(), op, &[HostValue::Handle(self.clone()), other.clone()])
    }

    /// `other op self`, for host operators where the handle is on the right
    pub fn reflected(&self, op: Operator, other: &HostValue) -> BridgeResult<HostValue> {
        dispatch::operator(self.engine(), op, &[other.clone(), HostValue::Handle(self.clone())])
    }

    pub fn unary(&self, op: Operator) -> BridgeResult<HostValue> {
        dispatch::operator(self.engine(), op, &[HostValue::Handle(self.clone())])
    }

    /// Lazy iteration through the foreign `iterate` protocol
    pub fn iter(&self) -> HandleIter {
        HandleIter {
            handle: self.clone(),
            state: None,
            done: false,
        }
    }
}

/// Equality is the runtime's `isequal`; use `same_object` for identity
impl PartialEq for ForeignHandle {
    fn eq(&self, other: &Self) -> bool {
        match self.isequal(&HostValue::Handle(other.clone())) {
            Ok(equal) => equal,
            Err(err) => {
                warn!(
                    target: "handles",
                    type_name = %self.type_name,
                    error = %err,
                    "isequal failed; handles compare unequal"
                );
                false
            }
        }
    }
}

/// `isequal` is reflexive, NaN included
impl Eq for ForeignHandle {}

/// Consistent with `PartialEq`: `isequal` values share a foreign hash
impl Hash for ForeignHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match ForeignHandle::hash(self) {
            Ok(h) => state.write_i64(h),
            Err(_) => self.type_name.hash(state),
        }
    }
}

impl fmt::Debug for ForeignHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignHandle")
            .field("type", &self.type_name())
            .field("anchor", &self.anchor.id())
            .finish()
    }
}

impl fmt::Display for ForeignHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

/// Finite, non-restartable walk over a foreign iterable; each element is
/// converted on its own
pub struct HandleIter {
    handle: ForeignHandle,
    state: Option<Value>,
    done: bool,
}

impl Iterator for HandleIter {
    type Item = BridgeResult<HostValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let engine = self.handle.engine();
        let mut args = vec![self.handle.value()];
        args.extend(self.state.take());
        match call_foreign_named(engine, "iterate", &args) {
            Ok(Value::Nothing) => {
                self.done = true;
                None
            }
            Ok(Value::Tuple(step)) if step.len() == 2 => {
                self.state = Some(step[1].clone());
                Some(Ok(to_host(engine, &step[0])))
            }
            Ok(other) => {
                self.done = true;
                Some(Err(BridgeError::Conversion(format!(
                    "`iterate` returned {} where a tuple or nothing was expected",
                    other.type_of()
                ))))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for HandleIter {}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(engine: &Rc<Engine>, source: &str) -> ForeignHandle {
        let value = engine.eval(source).unwrap();
        ForeignHandle::new(engine, &value)
    }

    #[test]
    fn test_repr_shows_foreign_contents() {
        let engine = Rc::new(Engine::new());
        let h = handle(&engine, "String[\"1\"]");
        assert!(h.repr().starts_with(REPR_PREFIX));
        assert!(h.repr().contains("[\"1\"]"));
        assert_eq!(h.type_name(), "Vector{String}");
        assert!(h.is_mutable());
        assert!(!h.is_callable());
    }

    #[test]
    fn test_iteration_is_finite_and_ordered() {
        let engine = Rc::new(Engine::new());
        let h = handle(&engine, "Any[1, \"2\", []]");
        let items: Vec<HostValue> = h.iter().collect::<BridgeResult<_>>().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], HostValue::from(1));
        assert_eq!(items[1], HostValue::from("2"));
        let nested = items[2].as_handle().unwrap();
        assert_eq!(nested.iter().count(), 0);

        let mut walk = h.iter();
        assert!(walk.by_ref().take(3).all(|item| item.is_ok()));
        assert!(walk.next().is_none());
        assert!(walk.next().is_none());
    }

    #[test]
    fn test_truthiness() {
        let engine = Rc::new(Engine::new());
        assert!(handle(&engine, "pi").truthy().unwrap());
        assert!(!handle(&engine, "String[]").truthy().unwrap());
        assert!(handle(&engine, "Dict(1 => 2)").truthy().unwrap());
        assert!(!handle(&engine, "BitArray([])").truthy().unwrap());
        assert!(handle(&engine, "missing").truthy().unwrap());
    }

    #[test]
    fn test_equality_and_identity() {
        let engine = Rc::new(Engine::new());
        let a = handle(&engine, "x = String[\"a\"]");
        let b = handle(&engine, "x");
        let c = handle(&engine, "String[\"a\"]");
        assert!(a.same_object(&b).unwrap());
        assert!(!a.same_object(&c).unwrap());
        assert_eq!(a, c);
        assert_eq!(a.hash().unwrap(), c.hash().unwrap());
    }

    #[test]
    fn test_items_and_length() {
        let engine = Rc::new(Engine::new());
        let h = handle(&engine, "[\"a\", \"b\"]");
        assert_eq!(h.len().unwrap(), 2);
        assert_eq!(h.get_item(&1.into()).unwrap(), HostValue::from("a"));
        h.set_item(&2.into(), &"z".into()).unwrap();
        assert_eq!(h.get_item(&2.into()).unwrap(), HostValue::from("z"));
        assert!(h.contains(&"z".into()).unwrap());
        assert_eq!(h.get_item(&3.into()).unwrap_err().kind(), "BoundsError");
    }
}
