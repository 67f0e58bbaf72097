//! Host-side value model
//!
//! `HostValue` is what the host sees after conversion: native scalars,
//! text, tuples, shared array views, or an opaque `ForeignHandle` for
//! anything without a lossless native form. Host integers are unbounded,
//! so every foreign fixed-width integer fits without loss.

use std::fmt;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde_json::json;

use super::array::ArrayView;
use super::mapping::HostKind;
use crate::interop::ForeignHandle;

#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Unit,
    Bool(bool),
    Int(BigInt),
    Float(f64),
    Complex(f64, f64),
    Text(String),
    Tuple(Vec<HostValue>),
    /// Sequence with no declared element type
    List(Vec<HostValue>),
    /// Insertion-ordered mapping; keys may be tuples
    Map(Vec<(HostValue, HostValue)>),
    Array(ArrayView),
    Handle(ForeignHandle),
}

impl HostValue {
    pub fn int(value: impl Into<BigInt>) -> Self {
        HostValue::Int(value.into())
    }

    pub fn text(value: impl Into<String>) -> Self {
        HostValue::Text(value.into())
    }

    pub fn kind(&self) -> HostKind {
        match self {
            HostValue::Unit => HostKind::Unit,
            HostValue::Bool(_) => HostKind::Bool,
            HostValue::Int(_) => HostKind::Int,
            HostValue::Float(_) => HostKind::Float,
            HostValue::Complex(..) => HostKind::Complex,
            HostValue::Text(_) => HostKind::Text,
            HostValue::Tuple(_) => HostKind::Tuple,
            HostValue::List(_) => HostKind::List,
            HostValue::Map(_) => HostKind::Map,
            HostValue::Array(_) => HostKind::Array,
            HostValue::Handle(_) => HostKind::Handle,
        }
    }

    /// Short host type name, as used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Unit => "unit",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::Complex(..) => "complex",
            HostValue::Text(_) => "str",
            HostValue::Tuple(_) => "tuple",
            HostValue::List(_) => "list",
            HostValue::Map(_) => "dict",
            HostValue::Array(_) => "array",
            HostValue::Handle(_) => "handle",
        }
    }

    pub fn is_native(&self) -> bool {
        !matches!(self, HostValue::Handle(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HostValue::Int(i) => i.to_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Float(x) => Some(*x),
            HostValue::Int(i) => i.to_f64(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            HostValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayView> {
        match self {
            HostValue::Array(view) => Some(view),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&ForeignHandle> {
        match self {
            HostValue::Handle(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn into_handle(self) -> Option<ForeignHandle> {
        match self {
            HostValue::Handle(handle) => Some(handle),
            _ => None,
        }
    }

    /// JSON description for machine-readable output
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            HostValue::Unit => serde_json::Value::Null,
            HostValue::Bool(b) => json!(b),
            HostValue::Int(i) => match (i.to_i64(), i.to_u64()) {
                (Some(v), _) => json!(v),
                (None, Some(v)) => json!(v),
                _ => json!(i.to_string()),
            },
            HostValue::Float(x) => json!(x),
            HostValue::Complex(re, im) => json!({ "re": re, "im": im }),
            HostValue::Text(s) => json!(s),
            HostValue::Tuple(items) | HostValue::List(items) => {
                serde_json::Value::Array(items.iter().map(HostValue::to_json).collect())
            }
            HostValue::Map(entries) => serde_json::Value::Array(
                entries
                    .iter()
                    .map(|(k, v)| json!([k.to_json(), v.to_json()]))
                    .collect(),
            ),
            HostValue::Array(view) => json!({
                "dtype": view.dtype(),
                "shape": view.shape(),
                "data": view.tolist().iter().map(HostValue::to_json).collect::<Vec<_>>(),
            }),
            HostValue::Handle(handle) => json!({
                "type": handle.type_name(),
                "repr": handle.repr(),
            }),
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[HostValue]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
        write!(f, "{x:.1}")
    } else {
        write!(f, "{x}")
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Unit => write!(f, "None"),
            HostValue::Bool(true) => write!(f, "True"),
            HostValue::Bool(false) => write!(f, "False"),
            HostValue::Int(i) => write!(f, "{i}"),
            HostValue::Float(x) => write_float(f, *x),
            HostValue::Complex(re, im) => {
                write!(f, "(")?;
                write_float(f, *re)?;
                write!(f, "{}", if *im < 0.0 { "-" } else { "+" })?;
                write_float(f, im.abs())?;
                write!(f, "j)")
            }
            HostValue::Text(s) => write!(f, "{s:?}"),
            HostValue::Tuple(items) => {
                write!(f, "(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            HostValue::List(items) => {
                write!(f, "[")?;
                write_items(f, items)?;
                write!(f, "]")
            }
            HostValue::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            HostValue::Array(view) => {
                write!(f, "array([")?;
                write_items(f, &view.tolist())?;
                write!(f, "], dtype={}, shape={:?})", view.dtype(), view.shape())
            }
            HostValue::Handle(handle) => write!(f, "{}", handle.repr()),
        }
    }
}

impl From<()> for HostValue {
    fn from(_: ()) -> Self {
        HostValue::Unit
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Bool(v)
    }
}

macro_rules! from_int {
    ($($ty:ty),*) => {$(
        impl From<$ty> for HostValue {
            fn from(v: $ty) -> Self {
                HostValue::Int(BigInt::from(v))
            }
        }
    )*};
}

from_int!(i8, i16, i32, i64, u8, u16, u32, u64, i128, u128);

impl From<BigInt> for HostValue {
    fn from(v: BigInt) -> Self {
        HostValue::Int(v)
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Float(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        HostValue::Text(v.to_string())
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        HostValue::Text(v)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(v: Vec<HostValue>) -> Self {
        HostValue::List(v)
    }
}

impl From<ArrayView> for HostValue {
    fn from(v: ArrayView) -> Self {
        HostValue::Array(v)
    }
}

impl From<ForeignHandle> for HostValue {
    fn from(v: ForeignHandle) -> Self {
        HostValue::Handle(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_follows_host_conventions() {
        let value = HostValue::Tuple(vec![
            HostValue::Unit,
            true.into(),
            2.into(),
            1.0.into(),
            "a".into(),
            HostValue::Complex(1.0, -2.5),
        ]);
        assert_eq!(value.to_string(), "(None, True, 2, 1.0, \"a\", (1.0-2.5j))");
        assert_eq!(HostValue::Tuple(vec![1.into()]).to_string(), "(1,)");
        assert_eq!(
            HostValue::Map(vec![(HostValue::Tuple(vec![1.into(), 2.into()]), 3.into())]).to_string(),
            "{(1, 2): 3}"
        );
    }

    #[test]
    fn test_wide_integers_stay_exact() {
        let big = HostValue::from(u64::MAX);
        assert_eq!(big.to_string(), "18446744073709551615");
        assert_eq!(big.as_i64(), None);
        assert_eq!(big.to_json(), json!(u64::MAX));
        let huge = HostValue::from(i128::MAX);
        assert_eq!(huge.to_json(), json!(i128::MAX.to_string()));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(HostValue::from(false).kind(), HostKind::Bool);
        assert_eq!(HostValue::from(vec![]).kind(), HostKind::List);
        assert_eq!(HostValue::Map(vec![]).type_name(), "dict");
        assert!(HostValue::Unit.is_native());
    }
}
