//! Foreign Function Interface
//!
//! Python bindings for the bridge, built with the `python` feature.

#[cfg(feature = "python")]
pub mod python;
