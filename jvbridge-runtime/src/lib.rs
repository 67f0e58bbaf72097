//! jvbridge runtime - embedded Julia-flavoured language engine
//!
//! This crate is the foreign side of the bridge: a small dynamic language
//! with its own object model, multiple-dispatch builtins, a global
//! definitional scope and an anchor table for values held by the host.

pub mod builtins;
pub mod error;
pub mod eval;
pub mod frontend;
pub mod gc;
pub mod intern;
pub mod interop;
pub mod logging;
pub mod objects;

// Re-export core types
pub use error::{RuntimeError, RuntimeResult};
pub use gc::{AnchorId, AnchorTable};
pub use interop::{Engine, Program};
pub use objects::{Abstract, ArrayObj, Complex, Ctor, Type, Value};
