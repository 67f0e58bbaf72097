//! Shared-buffer array views
//!
//! An `ArrayView` reads and writes the foreign array's own buffer; nothing
//! is copied in either direction. The view pins the array through an
//! anchor, so the buffer outlives every host view derived from it.
//! Indexing is zero-based over the column-major linear layout.

use std::fmt;
use std::rc::Rc;

use jvbridge_runtime::objects::Element;
use jvbridge_runtime::{ArrayObj, Engine, Value};

use super::anchor::Anchor;
use super::mapping::ElemTag;
use super::value::HostValue;
use crate::errors::{BridgeError, BridgeResult};
use crate::interop::convert::{scalar_to_foreign, scalar_to_host};

#[derive(Clone)]
pub struct ArrayView {
    array: Rc<ArrayObj>,
    tag: ElemTag,
    anchor: Anchor,
}

impl ArrayView {
    /// View over a foreign array; `None` unless its elements are bits
    pub fn from_foreign(engine: &Rc<Engine>, array: &Rc<ArrayObj>) -> Option<Self> {
        let tag = ElemTag::from_foreign(&array.elem_type())?;
        let anchor = Anchor::pin(engine, &Value::Array(Rc::clone(array)));
        Some(Self {
            array: Rc::clone(array),
            tag,
            anchor,
        })
    }

    /// Move host data into a new foreign array of shape `dims`
    pub fn from_vec<T: Element>(engine: &Rc<Engine>, data: Vec<T>, dims: &[usize]) -> BridgeResult<Self> {
        let expected: usize = dims.iter().product();
        if expected != data.len() {
            return Err(BridgeError::Conversion(format!(
                "shape {dims:?} needs {expected} elements, got {}",
                data.len()
            )));
        }
        let array = Rc::new(ArrayObj::new(T::wrap(data), dims.to_vec()));
        Self::from_foreign(engine, &array).ok_or_else(|| {
            BridgeError::Conversion(format!("{} is not a bits element type", T::TYPE))
        })
    }

    pub fn tag(&self) -> ElemTag {
        self.tag
    }

    pub fn dtype(&self) -> &'static str {
        self.tag.dtype()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.array.dims()
    }

    pub fn ndim(&self) -> usize {
        self.array.ndims()
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    pub fn nbytes(&self) -> usize {
        self.len() * self.tag.itemsize()
    }

    pub fn get(&self, index: usize) -> Option<HostValue> {
        self.array.get(index).as_ref().and_then(scalar_to_host)
    }

    /// Store a host scalar, converted to the element type
    pub fn set(&self, index: usize, value: &HostValue) -> BridgeResult<()> {
        let value = scalar_to_foreign(value)?;
        self.array.set(index, &value)?;
        Ok(())
    }

    /// Borrow the typed buffer; `None` when `T` is not the element type
    pub fn with_slice<T: Element, R>(&self, f: impl FnOnce(&[T]) -> R) -> Option<R> {
        let buffer = self.array.buffer();
        T::slice(&buffer).map(|items| f(&items[..self.len()]))
    }

    pub fn with_slice_mut<T: Element, R>(&self, f: impl FnOnce(&mut [T]) -> R) -> Option<R> {
        let len = self.len();
        let mut buffer = self.array.buffer_mut();
        T::slice_mut(&mut buffer).map(|items| f(&mut items[..len]))
    }

    pub fn to_vec<T: Element>(&self) -> Option<Vec<T>> {
        self.with_slice(|items: &[T]| items.to_vec())
    }

    /// Elements in memory order
    pub fn tolist(&self) -> Vec<HostValue> {
        self.array
            .to_values()
            .iter()
            .take(self.len())
            .filter_map(scalar_to_host)
            .collect()
    }

    pub fn shares_memory(&self, other: &ArrayView) -> bool {
        self.array.shares_buffer_with(&other.array)
    }

    pub fn foreign(&self) -> Value {
        Value::Array(Rc::clone(&self.array))
    }
}

impl PartialEq for ArrayView {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.shape() == other.shape() && self.tolist() == other.tolist()
    }
}

impl fmt::Debug for ArrayView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayView")
            .field("dtype", &self.dtype())
            .field("shape", &self.shape())
            .field("anchor", &self.anchor.id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jvbridge_runtime::objects::Complex32;

    fn engine() -> Rc<Engine> {
        Rc::new(Engine::new())
    }

    #[test]
    fn test_view_writes_through_to_foreign_array() {
        let engine = engine();
        let value = engine.eval("v = Int32[1, 2, 3]").unwrap();
        let Value::Array(array) = value else {
            panic!("expected an array");
        };
        let view = ArrayView::from_foreign(&engine, &array).unwrap();
        assert_eq!(view.dtype(), "int32");

        view.set(0, &HostValue::from(10)).unwrap();
        view.with_slice_mut(|items: &mut [i32]| items[2] = 30).unwrap();
        assert_eq!(engine.repr(&engine.eval("v").unwrap()), "Int32[10, 2, 30]");
        assert_eq!(view.get(1), Some(HostValue::from(2)));
        assert!(view.set(0, &HostValue::from(1.5)).is_err());
    }

    #[test]
    fn test_from_vec_keeps_shape_and_tag() {
        let engine = engine();
        let view = ArrayView::from_vec(&engine, vec![1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        assert_eq!(view.shape(), vec![2, 2]);
        assert_eq!(view.tag(), ElemTag::Float32);
        assert_eq!(view.nbytes(), 16);
        assert_eq!(engine.type_of(&view.foreign()).to_string(), "Matrix{Float32}");
        assert!(ArrayView::from_vec(&engine, vec![1u8, 2, 3], &[2, 2]).is_err());
    }

    #[test]
    fn test_slices_are_typed() {
        let engine = engine();
        let view = ArrayView::from_vec(&engine, vec![Complex32::new(1.0, 2.0)], &[1]).unwrap();
        assert_eq!(view.dtype(), "complex64");
        assert!(view.to_vec::<f32>().is_none());
        assert_eq!(view.to_vec::<Complex32>(), Some(vec![Complex32::new(1.0, 2.0)]));
        assert_eq!(view.tolist(), vec![HostValue::Complex(1.0, 2.0)]);
    }

    #[test]
    fn test_view_pins_its_array() {
        let engine = engine();
        let view = ArrayView::from_vec(&engine, vec![1i64], &[1]).unwrap();
        assert_eq!(engine.anchors().live(), 1);
        let copy = view.clone();
        drop(view);
        assert_eq!(engine.anchors().live(), 1);
        drop(copy);
        assert_eq!(engine.anchors().live(), 0);
    }
}
