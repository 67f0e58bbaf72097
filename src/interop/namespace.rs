//! Namespace Proxy
//!
//! Maps a dotted host import path onto a foreign module. Member access is
//! a `getproperty` on the module, routed through the dispatcher like any
//! handle field access; the module is looked up again on every access.

use std::rc::Rc;

use jvbridge_runtime::{Engine, Value};

use super::convert::to_host;
use super::dispatch::{self, call_foreign_named};
use crate::core::HostValue;
use crate::errors::BridgeResult;

#[derive(Clone)]
pub struct Namespace {
    engine: Rc<Engine>,
    path: String,
}

impl Namespace {
    /// Resolve `path` (`Base`, `Main`, `Base.Multimedia`, ...)
    pub fn open(engine: &Rc<Engine>, path: &str) -> BridgeResult<Self> {
        let module = engine.module(path)?;
        Ok(Self {
            engine: Rc::clone(engine),
            path: module.path.clone(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn module_value(&self) -> BridgeResult<Value> {
        Ok(Value::Module(self.engine.module(&self.path)?))
    }

    /// A binding converted for the host
    pub fn get(&self, name: &str) -> BridgeResult<HostValue> {
        let args = [self.module_value()?, Value::symbol(name)];
        let value = call_foreign_named(&self.engine, "getproperty", &args)?;
        Ok(to_host(&self.engine, &value))
    }

    /// Nested namespace, e.g. `Base` -> `Base.Multimedia`
    pub fn namespace(&self, name: &str) -> BridgeResult<Namespace> {
        Namespace::open(&self.engine, &format!("{}.{name}", self.path))
    }

    /// Call a function binding of this namespace
    pub fn call(
        &self,
        name: &str,
        args: &[HostValue],
        kwargs: &[(String, HostValue)],
    ) -> BridgeResult<HostValue> {
        dispatch::invoke_named(&self.engine, &format!("{}.{name}", self.path), args, kwargs)
    }

    /// Bound names, sorted
    pub fn names(&self) -> BridgeResult<Vec<String>> {
        Ok(self.engine.module_names(&self.path)?)
    }

    /// Resolve every binding on its own; one failure does not stop the rest
    pub fn wildcard(&self) -> BridgeResult<Vec<(String, BridgeResult<HostValue>)>> {
        Ok(self
            .names()?
            .into_iter()
            .map(|name| {
                let value = self.get(&name);
                (name, value)
            })
            .collect())
    }

    pub fn repr(&self) -> String {
        format!("<JV({})>", self.path)
    }
}
