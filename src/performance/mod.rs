//! Performance layer
//!
//! Compiled foreign source is cached per syntactic key so that repeated
//! evaluator lookups skip parsing and evaluation entirely.

pub mod cache;

pub use cache::{CacheEntry, CacheKey, CacheStats, EvalKey, Evaluator, ShapeHint};

/// Default number of evaluator entries kept before LRU eviction
pub const DEFAULT_EVALUATOR_CAPACITY: usize = 256;
