//! Logging utilities for the jvbridge runtime
//!
//! Provides lightweight logging for anchor bookkeeping, builtin dispatch and
//! evaluation. Uses `tracing` for structured logging with minimal overhead;
//! the embedding host installs the subscriber.

// Re-export tracing macros for use throughout the runtime
pub use tracing::{debug, info, trace, trace_span};

/// Log an anchor being created for a value
#[inline]
pub fn log_anchor_pin(id: u64, type_name: &str) {
    trace!(
        target: "anchors",
        id,
        type_name,
        "anchor pinned"
    );
}

/// Log an anchor reaching a zero count
#[inline]
pub fn log_anchor_release(id: u64, live: usize) {
    trace!(
        target: "anchors",
        id,
        live,
        "anchor released"
    );
}

/// Log a call of a builtin function
#[inline]
pub fn log_builtin_call(name: &str, args_count: usize) {
    trace!(
        target: "builtins",
        name,
        args_count,
        "builtin function called"
    );
}

/// Log a call of a user-defined generic function
#[inline]
pub fn log_method_call(name: &str, args_count: usize) {
    trace!(
        target: "eval",
        name,
        args_count,
        "method called"
    );
}

/// Log a program compiled from source fragments
#[inline]
pub fn log_compile(fragments: usize, statements: usize) {
    debug!(
        target: "eval",
        fragments,
        statements,
        "program compiled"
    );
}

/// Log a parse failure
#[inline]
pub fn log_parse_error(line: usize, column: usize, message: &str) {
    debug!(
        target: "eval",
        line,
        column,
        message,
        "parse failed"
    );
}

/// Log an exception escaping to the embedding host
#[inline]
pub fn log_runtime_error(kind: &str, message: &str) {
    debug!(
        target: "interop",
        kind,
        message,
        "exception raised to host"
    );
}

/// Log runtime initialization
#[inline]
pub fn log_runtime_init(base_bindings: usize) {
    info!(target: "runtime", base_bindings, "jvbridge runtime initialized");
}

/// Macro for creating a traced function span
///
/// Usage:
/// ```ignore
/// let _span = traced_fn!("compile");
/// ```
#[macro_export]
macro_rules! traced_fn {
    ($name:expr) => {
        tracing::debug_span!($name).entered()
    };
}

/// Macro for timing a block of code
///
/// Usage:
/// ```ignore
/// time_block!("operation_name", {
///     // code to time
/// });
/// ```
#[macro_export]
macro_rules! time_block {
    ($name:expr, $block:block) => {{
        let _span = tracing::debug_span!($name).entered();
        let start = std::time::Instant::now();
        let result = $block;
        let duration = start.elapsed();
        tracing::debug!(
            operation = $name,
            duration_us = duration.as_micros(),
            "operation complete"
        );
        result
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_functions() {
        // These should not panic
        log_anchor_pin(1, "Vector{Int64}");
        log_anchor_release(1, 0);
        log_builtin_call("+", 2);
        log_method_call("f", 1);
        log_compile(2, 3);
        log_parse_error(1, 4, "unexpected token");
        log_runtime_error("MethodError", "no method matching f()");
        log_runtime_init(10);
    }

    #[test]
    fn test_time_block_returns_value() {
        let value = crate::time_block!("sum", { 1 + 2 });
        assert_eq!(value, 3);
    }
}
