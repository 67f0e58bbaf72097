//! Lifetime anchors for foreign values held by the host
//!
//! An `Anchor` pins one foreign value in the runtime's root table. Clones
//! share the pin through the table's reference count; the last drop
//! releases it. Finalization of the foreign object itself is left to the
//! runtime's collector.

use std::fmt;
use std::rc::Rc;

use jvbridge_runtime::{AnchorId, Engine, Value};

pub struct Anchor {
    engine: Rc<Engine>,
    id: AnchorId,
}

impl Anchor {
    pub fn pin(engine: &Rc<Engine>, value: &Value) -> Self {
        Self {
            engine: Rc::clone(engine),
            id: engine.pin(value),
        }
    }

    pub fn id(&self) -> AnchorId {
        self.id
    }

    pub fn engine(&self) -> &Rc<Engine> {
        &self.engine
    }

    /// The pinned value; always present while this anchor is alive
    pub fn value(&self) -> Value {
        self.engine.anchors().get(self.id).unwrap_or(Value::Nothing)
    }
}

impl Clone for Anchor {
    fn clone(&self) -> Self {
        self.engine.anchors().retain(self.id);
        Self {
            engine: Rc::clone(&self.engine),
            id: self.id,
        }
    }
}

impl Drop for Anchor {
    fn drop(&mut self) {
        self.engine.release(self.id);
    }
}

impl fmt::Debug for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Anchor").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_one_pin() {
        let engine = Rc::new(Engine::new());
        let value = engine.eval("[1, 2]").unwrap();
        let first = Anchor::pin(&engine, &value);
        let second = first.clone();
        assert_eq!(first.id(), second.id());
        assert_eq!(engine.anchors().count(first.id()), 2);

        drop(first);
        assert_eq!(engine.anchors().live(), 1);
        assert_eq!(engine.repr(&second.value()), "[1, 2]");
        drop(second);
        assert_eq!(engine.anchors().live(), 0);
    }
}
