//! Standardized logging infrastructure for jvbridge
//!
//! Structured logging through the `tracing` crate with configurable format
//! and destination. Bridge events use fixed targets so they can be
//! filtered one by one: `convert`, `dispatch`, `evaluator`, `anchors`,
//! `bootstrap` and `config`.

use std::path::Path;

use tracing::Level;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

pub use tracing::{debug, error, info, trace, warn};

use crate::frontend::config::Environment;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with timestamps
    Pretty,
    /// Compact format for production
    Compact,
    /// JSON format for structured logging
    Json,
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Daily rotated file
    File { directory: String, prefix: String },
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Whether to include span events
    pub span_events: bool,
    /// Extra filter directives (e.g. "evaluator=trace,convert=off")
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Level and filter from the process-wide environment; an unknown
    /// level name keeps the default
    pub fn from_environment(env: &Environment) -> Self {
        let config = Self::new();
        match env.log_level.parse::<Level>() {
            Ok(level) => config.with_level(level),
            Err(_) => config.with_filter(env.log_level.clone()),
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Initialize the global logging system
///
/// Returns the writer's `WorkerGuard`; keep it alive until exit so that
/// buffered events are flushed. Returns `None` if a global subscriber was
/// already installed.
pub fn init_logging(config: LogConfig) -> Option<WorkerGuard> {
    let (writer, guard) = match &config.output {
        LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogOutput::File { directory, prefix } => {
            tracing_appender::non_blocking(rolling::daily(directory, prefix))
        }
    };
    install(writer, &config).then_some(guard)
}

fn install<W>(writer: W, config: &LogConfig) -> bool
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let filter = build_filter(config);
    let layer = fmt::layer()
        .with_writer(writer)
        .with_span_events(span_events_config(config.span_events));

    let installed = match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(layer.pretty().with_filter(filter))
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(layer.compact().with_filter(filter))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(layer.json().with_filter(filter))
            .try_init(),
    };
    installed.is_ok()
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base_filter = EnvFilter::from_default_env().add_directive(config.level.into());

    match &config.filter {
        Some(filter_str) => filter_str.split(',').fold(base_filter, |filter, directive| {
            filter.add_directive(directive.trim().parse().unwrap_or_else(|_| {
                tracing::warn!("Invalid filter directive: {}", directive);
                config.level.into()
            }))
        }),
        None => base_filter,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Initialize logging with defaults for development
pub fn init_dev_logging() -> Option<WorkerGuard> {
    init_logging(LogConfig {
        level: Level::DEBUG,
        format: LogFormat::Pretty,
        output: LogOutput::Stderr,
        span_events: true,
        filter: Some("jvbridge=debug,jvbridge_runtime=debug".to_string()),
    })
}

/// Initialize logging with defaults for production
pub fn init_prod_logging(log_dir: impl AsRef<Path>) -> Option<WorkerGuard> {
    init_logging(LogConfig {
        level: Level::INFO,
        format: LogFormat::Json,
        output: LogOutput::File {
            directory: log_dir.as_ref().to_string_lossy().to_string(),
            prefix: "jvbridge".to_string(),
        },
        span_events: false,
        filter: Some("jvbridge=info,warn".to_string()),
    })
}

// ============================================================================
// Bridge events
// ============================================================================

/// Log one value crossing the boundary
#[inline]
pub fn log_conversion(direction: &str, from: &str, to: &str) {
    trace!(target: "convert", direction, from, to, "value converted");
}

#[inline]
pub fn log_dispatch(function: &str, args_count: usize) {
    trace!(target: "dispatch", function, args_count, "forwarding call");
}

#[inline]
pub fn log_dispatch_error(function: &str, kind: &str) {
    debug!(target: "dispatch", function, kind, "foreign call raised");
}

/// Log a foreign value wrapped in a handle
#[inline]
pub fn log_handle_created(type_name: &str) {
    trace!(target: "anchors", type_name, "handle created");
}

#[inline]
pub fn log_evaluator_hit(key: &str) {
    trace!(target: "evaluator", key, "cache hit");
}

#[inline]
pub fn log_evaluator_miss(key: &str, fragments: usize) {
    debug!(target: "evaluator", key, fragments, "cache miss compiled");
}

#[inline]
pub fn log_evaluator_eviction(key: &str) {
    debug!(target: "evaluator", key, "entry evicted");
}

#[inline]
pub fn log_bootstrap_launch(executable: &str, args_count: usize) {
    info!(target: "bootstrap", executable, args_count, "launching runtime process");
}

#[inline]
pub fn log_bootstrap_failure(executable: &str, status: Option<i32>, suppressed: bool) {
    warn!(target: "bootstrap", executable, ?status, suppressed, "runtime process failed");
}

#[inline]
pub fn log_config_loaded(source: &str) {
    debug!(target: "config", source, "configuration loaded");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = LogConfig::new()
            .with_level(Level::DEBUG)
            .with_format(LogFormat::Json)
            .with_span_events(true)
            .with_filter("evaluator=trace");

        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.span_events);
        assert_eq!(config.filter, Some("evaluator=trace".to_string()));
    }

    #[test]
    fn test_config_from_environment() {
        let env = Environment {
            log_level: "debug".to_string(),
            ..Environment::default()
        };
        assert_eq!(LogConfig::from_environment(&env).level, Level::DEBUG);

        let env = Environment {
            log_level: "dispatch=trace".to_string(),
            ..Environment::default()
        };
        let config = LogConfig::from_environment(&env);
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.filter.as_deref(), Some("dispatch=trace"));
    }

    #[test]
    fn test_event_helpers() {
        // These should not panic without a subscriber
        log_conversion("to_host", "Int64", "int");
        log_dispatch("+", 2);
        log_dispatch_error("push!", "DispatchError");
        log_handle_created("Vector{String}");
        log_evaluator_hit("00ff");
        log_evaluator_miss("00ff", 2);
        log_evaluator_eviction("00ff");
        log_bootstrap_launch("julia", 2);
        log_bootstrap_failure("julia", Some(1), true);
        log_config_loaded("defaults");
    }
}
