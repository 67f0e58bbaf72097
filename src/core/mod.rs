//! Core host-side value model
//!
//! This module contains the host value representation, the static type
//! mapping table, shared array views and the anchors that pin foreign
//! values for as long as the host holds them.

pub mod anchor;
pub mod array;
pub mod mapping;
pub mod value;

pub use anchor::Anchor;
pub use array::ArrayView;
pub use mapping::{ElemTag, HostKind, MappingEntry, SCALAR_MAPPINGS};
pub use value::HostValue;
