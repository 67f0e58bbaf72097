//! Type Mapping Table
//!
//! Static rules between host value kinds and foreign type tags. Several
//! foreign numeric types collapse onto one host kind (every fixed-width
//! integer becomes a host integer); arrays keep the foreign element tag so
//! re-exporting them rebuilds the original element type.

use jvbridge_runtime::Type;

/// Host side of a mapping rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostKind {
    Unit,
    Bool,
    Int,
    Float,
    Complex,
    Text,
    Tuple,
    /// Host sequence without an element type; exports as `Vector{Any}`
    List,
    /// Host mapping; exports as `Dict{Any, Any}`
    Map,
    Array,
    /// No native counterpart; the value stays behind a foreign handle
    Handle,
}

/// Element type of a shared numeric buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElemTag {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Complex64,
    Complex128,
}

/// One `(host kind <-> foreign tag)` rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingEntry {
    pub tag: ElemTag,
    pub host: HostKind,
    /// Host representation is wider than the foreign one
    pub widens: bool,
    /// Host values outside the foreign range fail to export
    pub narrows: bool,
}

const fn entry(tag: ElemTag, host: HostKind, widens: bool, narrows: bool) -> MappingEntry {
    MappingEntry {
        tag,
        host,
        widens,
        narrows,
    }
}

/// Scalar rules; the first entry for a host kind is its export tag
pub const SCALAR_MAPPINGS: &[MappingEntry] = &[
    entry(ElemTag::Bool, HostKind::Bool, false, false),
    entry(ElemTag::Int64, HostKind::Int, true, true),
    entry(ElemTag::UInt64, HostKind::Int, true, true),
    entry(ElemTag::Int8, HostKind::Int, true, true),
    entry(ElemTag::Int16, HostKind::Int, true, true),
    entry(ElemTag::Int32, HostKind::Int, true, true),
    entry(ElemTag::UInt8, HostKind::Int, true, true),
    entry(ElemTag::UInt16, HostKind::Int, true, true),
    entry(ElemTag::UInt32, HostKind::Int, true, true),
    entry(ElemTag::Float64, HostKind::Float, false, false),
    entry(ElemTag::Float32, HostKind::Float, true, true),
    entry(ElemTag::Complex128, HostKind::Complex, false, false),
    entry(ElemTag::Complex64, HostKind::Complex, true, true),
];

impl ElemTag {
    pub const ALL: [ElemTag; 13] = [
        ElemTag::Bool,
        ElemTag::Int8,
        ElemTag::Int16,
        ElemTag::Int32,
        ElemTag::Int64,
        ElemTag::UInt8,
        ElemTag::UInt16,
        ElemTag::UInt32,
        ElemTag::UInt64,
        ElemTag::Float32,
        ElemTag::Float64,
        ElemTag::Complex64,
        ElemTag::Complex128,
    ];

    pub fn from_foreign(ty: &Type) -> Option<ElemTag> {
        let tag = match ty {
            Type::Bool => ElemTag::Bool,
            Type::Int8 => ElemTag::Int8,
            Type::Int16 => ElemTag::Int16,
            Type::Int32 => ElemTag::Int32,
            Type::Int64 => ElemTag::Int64,
            Type::UInt8 => ElemTag::UInt8,
            Type::UInt16 => ElemTag::UInt16,
            Type::UInt32 => ElemTag::UInt32,
            Type::UInt64 => ElemTag::UInt64,
            Type::Float32 => ElemTag::Float32,
            Type::Float64 => ElemTag::Float64,
            Type::ComplexF32 => ElemTag::Complex64,
            Type::ComplexF64 => ElemTag::Complex128,
            _ => return None,
        };
        Some(tag)
    }

    pub fn foreign_type(self) -> Type {
        match self {
            ElemTag::Bool => Type::Bool,
            ElemTag::Int8 => Type::Int8,
            ElemTag::Int16 => Type::Int16,
            ElemTag::Int32 => Type::Int32,
            ElemTag::Int64 => Type::Int64,
            ElemTag::UInt8 => Type::UInt8,
            ElemTag::UInt16 => Type::UInt16,
            ElemTag::UInt32 => Type::UInt32,
            ElemTag::UInt64 => Type::UInt64,
            ElemTag::Float32 => Type::Float32,
            ElemTag::Float64 => Type::Float64,
            ElemTag::Complex64 => Type::ComplexF32,
            ElemTag::Complex128 => Type::ComplexF64,
        }
    }

    /// Array-library dtype name (`int8`, `float32`, `complex64`, ...)
    pub fn dtype(self) -> &'static str {
        match self {
            ElemTag::Bool => "bool",
            ElemTag::Int8 => "int8",
            ElemTag::Int16 => "int16",
            ElemTag::Int32 => "int32",
            ElemTag::Int64 => "int64",
            ElemTag::UInt8 => "uint8",
            ElemTag::UInt16 => "uint16",
            ElemTag::UInt32 => "uint32",
            ElemTag::UInt64 => "uint64",
            ElemTag::Float32 => "float32",
            ElemTag::Float64 => "float64",
            ElemTag::Complex64 => "complex64",
            ElemTag::Complex128 => "complex128",
        }
    }

    pub fn from_dtype(name: &str) -> Option<ElemTag> {
        ElemTag::ALL.into_iter().find(|tag| tag.dtype() == name)
    }

    /// Bytes per element
    pub fn itemsize(self) -> usize {
        match self {
            ElemTag::Bool | ElemTag::Int8 | ElemTag::UInt8 => 1,
            ElemTag::Int16 | ElemTag::UInt16 => 2,
            ElemTag::Int32 | ElemTag::UInt32 | ElemTag::Float32 => 4,
            ElemTag::Int64 | ElemTag::UInt64 | ElemTag::Float64 | ElemTag::Complex64 => 8,
            ElemTag::Complex128 => 16,
        }
    }

    pub fn host_kind(self) -> HostKind {
        SCALAR_MAPPINGS
            .iter()
            .find(|rule| rule.tag == self)
            .map_or(HostKind::Handle, |rule| rule.host)
    }
}

/// Host kind a foreign value of type `ty` converts to
///
/// Tuples are `Tuple` only when every element type is itself native.
pub fn host_kind(ty: &Type) -> HostKind {
    match ty {
        Type::Nothing => HostKind::Unit,
        Type::String => HostKind::Text,
        Type::Array(elem, _) if ElemTag::from_foreign(elem).is_some() => HostKind::Array,
        Type::Tuple(items) if items.iter().all(|t| host_kind(t) != HostKind::Handle) => {
            HostKind::Tuple
        }
        other => ElemTag::from_foreign(other).map_or(HostKind::Handle, ElemTag::host_kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tag_round_trips_through_foreign_type() {
        for tag in ElemTag::ALL {
            assert_eq!(ElemTag::from_foreign(&tag.foreign_type()), Some(tag));
            assert_eq!(ElemTag::from_dtype(tag.dtype()), Some(tag));
        }
    }

    #[test]
    fn test_bool_is_its_own_kind() {
        assert_eq!(host_kind(&Type::Bool), HostKind::Bool);
        assert_eq!(host_kind(&Type::Int8), HostKind::Int);
        assert_eq!(host_kind(&Type::Float32), HostKind::Float);
    }

    #[test]
    fn test_narrow_tags_are_flagged() {
        for rule in SCALAR_MAPPINGS {
            let exact = matches!(rule.tag, ElemTag::Bool | ElemTag::Float64 | ElemTag::Complex128);
            assert_eq!(rule.narrows, !exact, "{:?}", rule.tag);
        }
        assert_eq!(ElemTag::Complex64.host_kind(), HostKind::Complex);
    }

    #[test]
    fn test_containers() {
        assert_eq!(host_kind(&Type::vector(Type::Int32)), HostKind::Array);
        assert_eq!(host_kind(&Type::vector(Type::String)), HostKind::Handle);
        assert_eq!(
            host_kind(&Type::Tuple(vec![Type::Int64, Type::String])),
            HostKind::Tuple
        );
        assert_eq!(
            host_kind(&Type::Tuple(vec![Type::Int64, Type::vector(Type::Any)])),
            HostKind::Handle
        );
        assert_eq!(host_kind(&Type::Missing), HostKind::Handle);
        assert_eq!(host_kind(&Type::BitVector), HostKind::Handle);
    }
}
