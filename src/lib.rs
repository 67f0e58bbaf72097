//! jvbridge: values and calls across the boundary between a host program
//! and an embedded Julia-flavoured runtime.
//!
//! Native values (numbers, strings, tuples, bits arrays) cross by value or
//! as shared buffers; everything else stays in the runtime behind a
//! `ForeignHandle`. Every call, operator and field access is resolved by
//! the runtime's multiple dispatch.

// Core modules
pub mod bridge;
pub mod core;
pub mod errors;
pub mod ffi;
pub mod frontend;
pub mod infrastructure;
pub mod interop;
pub mod performance;

// Re-export commonly used items
pub use bridge::Bridge;
pub use crate::core::{ArrayView, ElemTag, HostKind, HostValue};
pub use errors::{BridgeError, BridgeResult};
pub use frontend::{cli_main, Environment, Overrides};
pub use infrastructure::{init_dev_logging, init_logging, init_prod_logging, LogConfig, LogFormat, LogOutput};
pub use interop::{ForeignHandle, HandleIter, Namespace, Operator, REPR_PREFIX};
pub use performance::{CacheStats, EvalKey, Evaluator};

pub use jvbridge_runtime as runtime;
