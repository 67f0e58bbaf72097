//! Infrastructure shared by the whole bridge: logging and runtime bootstrap

pub mod bootstrap;
pub mod logging;

pub use logging::{init_dev_logging, init_logging, init_prod_logging, LogConfig, LogFormat, LogOutput};
