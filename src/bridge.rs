//! Bridge session
//!
//! One embedded runtime together with its evaluator cache and the
//! configuration it was started with. A `Bridge` is not `Send`: every call
//! into the runtime runs on the thread that created it.

use std::rc::Rc;

use jvbridge_runtime::objects::Element;
use jvbridge_runtime::{Engine, Value};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::core::{ArrayView, HostValue};
use crate::errors::{BridgeError, BridgeResult};
use crate::frontend::config::{self, Environment};
use crate::infrastructure::logging::info;
use crate::interop::{dispatch, to_foreign, to_host, Namespace, Operator};
use crate::performance::{EvalKey, Evaluator};

pub struct Bridge {
    engine: Rc<Engine>,
    evaluator: Evaluator,
    environment: Environment,
}

impl Bridge {
    /// Start a session with the process-wide environment
    pub fn new() -> BridgeResult<Self> {
        Ok(Self::with_environment(config::current()?))
    }

    pub fn with_environment(environment: Environment) -> Self {
        let engine = Rc::new(Engine::new());
        let evaluator = Evaluator::new(&engine, environment.evaluator_capacity);
        info!(
            capacity = environment.evaluator_capacity,
            executable = %environment.executable,
            "bridge session started"
        );
        Self {
            engine,
            evaluator,
            environment,
        }
    }

    pub fn engine(&self) -> &Rc<Engine> {
        &self.engine
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Evaluate one source string through the evaluator cache
    pub fn eval(&self, source: &str) -> BridgeResult<HostValue> {
        self.evaluator.get(source)
    }

    /// Evaluate fragments as one cache key; the last fragment gives the result
    pub fn eval_all<S: AsRef<str>>(&self, fragments: &[S]) -> BridgeResult<HostValue> {
        let key = EvalKey::Fragments(fragments.iter().map(|s| s.as_ref().to_string()).collect());
        self.evaluator.get(key)
    }

    /// Namespace for a dotted module path
    pub fn import(&self, path: &str) -> BridgeResult<Namespace> {
        Namespace::open(&self.engine, path)
    }

    pub fn base(&self) -> BridgeResult<Namespace> {
        self.import("Base")
    }

    pub fn to_foreign(&self, value: &HostValue) -> BridgeResult<Value> {
        to_foreign(&self.engine, value)
    }

    pub fn to_host(&self, value: &Value) -> HostValue {
        to_host(&self.engine, value)
    }

    /// Call a callable host value (usually a handle) with host arguments
    pub fn invoke(
        &self,
        callable: &HostValue,
        args: &[HostValue],
        kwargs: &[(String, HostValue)],
    ) -> BridgeResult<HostValue> {
        let callable = self.to_foreign(callable)?;
        dispatch::invoke(&self.engine, &callable, args, kwargs)
    }

    /// Call a function by dotted name, e.g. `Base.length`
    pub fn invoke_named(
        &self,
        name: &str,
        args: &[HostValue],
        kwargs: &[(String, HostValue)],
    ) -> BridgeResult<HostValue> {
        dispatch::invoke_named(&self.engine, name, args, kwargs)
    }

    pub fn operator(&self, op: Operator, operands: &[HostValue]) -> BridgeResult<HostValue> {
        dispatch::operator(&self.engine, op, operands)
    }

    /// Foreign `hash` of any convertible host value, as a signed 64-bit value
    pub fn hash(&self, value: &HostValue) -> BridgeResult<i64> {
        match value {
            HostValue::Handle(handle) => handle.hash(),
            other => match self.operator(Operator::Hash, std::slice::from_ref(other))? {
                HostValue::Int(h) => reinterpret_hash(&h),
                other => Err(BridgeError::Conversion(format!(
                    "`hash` returned {} where an integer was expected",
                    other.type_name()
                ))),
            },
        }
    }

    /// Column-major array owned by the runtime, viewed from the host
    pub fn array<T: Element>(&self, data: Vec<T>, dims: &[usize]) -> BridgeResult<ArrayView> {
        ArrayView::from_vec(&self.engine, data, dims)
    }

    /// Foreign values currently pinned by host references
    pub fn live_anchors(&self) -> usize {
        self.engine.anchors().live()
    }

    /// Text printed by the runtime since the last call
    pub fn take_output(&self) -> String {
        self.engine.take_output()
    }
}

/// `UInt64` hashes wrap into the signed range, as `hash(x) % Int64` does
fn reinterpret_hash(h: &BigInt) -> BridgeResult<i64> {
    h.to_i64()
        .or_else(|| h.to_u64().map(|u| u as i64))
        .ok_or_else(|| BridgeError::Conversion(format!("hash {h} does not fit in 64 bits")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> Bridge {
        Bridge::with_environment(Environment::default())
    }

    #[test]
    fn test_eval_and_fragments() {
        let bridge = bridge();
        assert_eq!(bridge.eval("1 + 2").unwrap(), HostValue::from(3));
        let value = bridge.eval_all(&["x = 4", "x * x"]).unwrap();
        assert_eq!(value, HostValue::from(16));
        assert_eq!(bridge.evaluator().len(), 2);
    }

    #[test]
    fn test_hash_matches_handle_hash() {
        let bridge = bridge();
        let pi = bridge.eval("pi").unwrap();
        let expected = bridge.eval("hash(pi) % Int64").unwrap();
        assert_eq!(HostValue::from(bridge.hash(&pi).unwrap()), expected);

        let native = bridge.hash(&HostValue::text("abc")).unwrap();
        assert_eq!(HostValue::from(native), bridge.eval("hash(\"abc\") % Int64").unwrap());
    }

    #[test]
    fn test_handles_release_anchors() {
        let bridge = bridge();
        let before = bridge.live_anchors();
        let handle = bridge.eval("String[]").unwrap();
        assert!(bridge.live_anchors() > before);
        bridge.evaluator().clear();
        drop(handle);
        assert_eq!(bridge.live_anchors(), before);
    }

    #[test]
    fn test_invoke_and_output() {
        let bridge = bridge();
        let println = bridge.base().unwrap().get("println").unwrap();
        bridge.invoke(&println, &["hi".into()], &[]).unwrap();
        assert_eq!(bridge.take_output(), "hi\n");
        let n = bridge.invoke_named("Base.length", &[HostValue::text("abc")], &[]).unwrap();
        assert_eq!(n, HostValue::from(3));
    }

    #[test]
    fn test_hash_reinterpretation() {
        assert_eq!(reinterpret_hash(&BigInt::from(u64::MAX)).unwrap(), -1);
        assert_eq!(reinterpret_hash(&BigInt::from(-5)).unwrap(), -5);
        let wide = BigInt::from(u64::MAX) * 4;
        assert_eq!(reinterpret_hash(&wide).unwrap_err().kind(), "ConversionError");
    }
}
