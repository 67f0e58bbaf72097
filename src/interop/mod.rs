//! Host <-> runtime interop
//!
//! Architecture:
//! - `convert`: the Conversion Engine (`to_host`, `to_foreign`)
//! - `dispatch`: the Call Dispatcher (calls, operators, field access)
//! - `handle`: the Foreign Value Handle and its iterator
//! - `namespace`: module proxies for dotted import paths

pub mod convert;
pub mod dispatch;
pub mod handle;
pub mod namespace;

pub use convert::{to_foreign, to_host};
pub use dispatch::{get_field, invoke, invoke_named, operator, set_field, Operator};
pub use handle::{ForeignHandle, HandleIter, REPR_PREFIX};
pub use namespace::Namespace;
