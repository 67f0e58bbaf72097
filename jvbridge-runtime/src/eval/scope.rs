//! Local scopes
//!
//! Module globals live in `Module`; a `Scope` only ever holds locals. Each
//! function call opens a root scope chained to the scope the function was
//! defined in, and every loop iteration or comprehension opens a child.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::objects::Value;

pub struct Scope {
    vars: RefCell<HashMap<String, Value>>,
    /// Names declared `global` in this scope
    globals: RefCell<HashSet<String>>,
    parent: Option<Rc<Scope>>,
    function_root: bool,
}

impl Scope {
    /// Scope of a function call
    pub fn function(parent: Option<Rc<Scope>>) -> Rc<Scope> {
        Rc::new(Self::with_parent(parent, true))
    }

    /// Scope of a loop iteration or comprehension
    pub fn block(parent: Option<Rc<Scope>>) -> Rc<Scope> {
        Rc::new(Self::with_parent(parent, false))
    }

    fn with_parent(parent: Option<Rc<Scope>>, function_root: bool) -> Self {
        Self {
            vars: RefCell::new(HashMap::new()),
            globals: RefCell::new(HashSet::new()),
            parent,
            function_root,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if self.globals.borrow().contains(name) {
            return None;
        }
        if let Some(value) = self.vars.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    /// Overwrite the nearest existing binding; false when there is none
    pub fn assign_existing(&self, name: &str, value: &Value) -> bool {
        if let Some(slot) = self.vars.borrow_mut().get_mut(name) {
            *slot = value.clone();
            return true;
        }
        match &self.parent {
            Some(parent) => parent.assign_existing(name, value),
            None => false,
        }
    }

    pub fn declare(&self, name: &str, value: Value) {
        self.vars.borrow_mut().insert(name.to_string(), value);
    }

    pub fn declare_global(&self, name: &str) {
        self.globals.borrow_mut().insert(name.to_string());
    }

    /// Declared `global` anywhere up to the enclosing function frame
    pub fn is_global(&self, name: &str) -> bool {
        if self.globals.borrow().contains(name) {
            return true;
        }
        if self.function_root {
            return false;
        }
        self.parent.as_ref().map_or(false, |p| p.is_global(name))
    }

    pub fn in_function(&self) -> bool {
        self.function_root || self.parent.as_ref().map_or(false, |p| p.in_function())
    }

    /// Function bound in this very scope, for adding local methods
    pub fn local_value(&self, name: &str) -> Option<Value> {
        self.vars.borrow().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_parents() {
        let outer = Scope::function(None);
        outer.declare("x", Value::Int64(1));
        let inner = Scope::block(Some(Rc::clone(&outer)));
        assert!(matches!(inner.lookup("x"), Some(Value::Int64(1))));
        assert!(inner.lookup("y").is_none());
    }

    #[test]
    fn test_assign_existing_updates_outer_binding() {
        let outer = Scope::function(None);
        outer.declare("n", Value::Int64(0));
        let inner = Scope::block(Some(Rc::clone(&outer)));
        assert!(inner.assign_existing("n", &Value::Int64(5)));
        assert!(matches!(outer.lookup("n"), Some(Value::Int64(5))));
        assert!(!inner.assign_existing("m", &Value::Int64(1)));
    }

    #[test]
    fn test_global_declaration_stops_at_function_frame() {
        let outer = Scope::function(None);
        outer.declare_global("g");
        let loop_scope = Scope::block(Some(Rc::clone(&outer)));
        assert!(loop_scope.is_global("g"));
        let nested = Scope::function(Some(Rc::clone(&loop_scope)));
        assert!(!nested.is_global("g"));
        assert!(nested.in_function());
        assert!(!Scope::block(None).in_function());
    }
}
