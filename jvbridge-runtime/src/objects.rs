//! Object system - unified representation for all runtime values
//!
//! Design: A single `Value` enum with immediate scalars and `Rc`-shared heap
//! objects:
//! - Scalars carry their exact width and signedness (`Int8` is not `Int64`)
//! - Arrays of bits types own a typed buffer shared by every reshaped view
//! - Mutable objects (arrays, dicts, bit vectors, mutable structs) have
//!   identity; everything else compares structurally
//! - Reference counting decides when a heap object is finalized

use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use bitvec::vec::BitVec;
use indexmap::IndexMap;

use crate::builtins::{convert_value, hash_value, isequal, print};
use crate::error::{RuntimeError, RuntimeResult};
use crate::eval::Scope;
use crate::frontend::ast::Expr;
use crate::intern::Symbol;
use crate::interop::Engine;

// ============================================================================
// Scalars
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

impl<T> Complex<T> {
    pub const fn new(re: T, im: T) -> Self {
        Self { re, im }
    }
}

pub type Complex32 = Complex<f32>;
pub type Complex64 = Complex<f64>;

/// Exact mathematical constants that only round when mixed with floats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Irrational {
    Pi,
    Euler,
}

impl Irrational {
    pub fn value(self) -> f64 {
        match self {
            Irrational::Pi => std::f64::consts::PI,
            Irrational::Euler => std::f64::consts::E,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Irrational::Pi => "π",
            Irrational::Euler => "ℯ",
        }
    }
}

// ============================================================================
// Types
// ============================================================================

/// Abstract types usable with `isa` and `<:`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abstract {
    Number,
    Real,
    Integer,
    Signed,
    Unsigned,
    AbstractFloat,
    AbstractString,
    AbstractArray,
    AbstractDict,
    Tuple,
}

/// Parametric type constructors awaiting `{...}` parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ctor {
    Array,
    Vector,
    Matrix,
    Dict,
    Pair,
    Complex,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Any,
    Nothing,
    Missing,
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
    ComplexF32,
    ComplexF64,
    Irrational(Irrational),
    String,
    Symbol,
    Tuple(Vec<Type>),
    Pair(Box<Type>, Box<Type>),
    Array(Box<Type>, usize),
    BitVector,
    UnitRange,
    Dict(Box<Type>, Box<Type>),
    Struct(Rc<StructDef>),
    Function,
    DataType,
    Module,
    Abstract(Abstract),
    UnionAll(Ctor),
}

impl Type {
    pub fn vector(elem: Type) -> Type {
        Type::Array(Box::new(elem), 1)
    }

    pub fn dict(key: Type, value: Type) -> Type {
        Type::Dict(Box::new(key), Box::new(value))
    }

    /// Direct supertype; `None` only for `Any`
    pub fn supertype(&self) -> Option<Type> {
        use Abstract as A;
        let parent = match self {
            Type::Any => return None,
            Type::Bool | Type::Abstract(A::Signed) | Type::Abstract(A::Unsigned) => {
                Type::Abstract(A::Integer)
            }
            Type::Int8 | Type::Int16 | Type::Int32 | Type::Int64 => Type::Abstract(A::Signed),
            Type::UInt8 | Type::UInt16 | Type::UInt32 | Type::UInt64 => {
                Type::Abstract(A::Unsigned)
            }
            Type::Float32 | Type::Float64 => Type::Abstract(A::AbstractFloat),
            Type::Abstract(A::Integer) | Type::Abstract(A::AbstractFloat) | Type::Irrational(_) => {
                Type::Abstract(A::Real)
            }
            Type::Abstract(A::Real) | Type::ComplexF32 | Type::ComplexF64 => {
                Type::Abstract(A::Number)
            }
            Type::UnionAll(Ctor::Complex) => Type::Abstract(A::Number),
            Type::String => Type::Abstract(A::AbstractString),
            Type::Array(..) | Type::BitVector | Type::UnitRange => Type::Abstract(A::AbstractArray),
            Type::UnionAll(Ctor::Array | Ctor::Vector | Ctor::Matrix) => {
                Type::Abstract(A::AbstractArray)
            }
            Type::Dict(..) | Type::UnionAll(Ctor::Dict) => Type::Abstract(A::AbstractDict),
            Type::Tuple(_) => Type::Abstract(A::Tuple),
            _ => Type::Any,
        };
        Some(parent)
    }

    /// Subtype relation `self <: other`
    pub fn is_subtype(&self, other: &Type) -> bool {
        if matches!(other, Type::Any) || self == other {
            return true;
        }
        match (self, other) {
            (Type::Tuple(xs), Type::Tuple(ys)) => {
                xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| x.is_subtype(y))
            }
            (Type::Array(_, n), Type::UnionAll(Ctor::Vector)) => *n == 1,
            (Type::Array(_, n), Type::UnionAll(Ctor::Matrix)) => *n == 2,
            (Type::Array(..), Type::UnionAll(Ctor::Array)) => true,
            (Type::UnionAll(Ctor::Vector | Ctor::Matrix), Type::UnionAll(Ctor::Array)) => true,
            (Type::Dict(..), Type::UnionAll(Ctor::Dict)) => true,
            (Type::Pair(..), Type::UnionAll(Ctor::Pair)) => true,
            (Type::ComplexF32 | Type::ComplexF64, Type::UnionAll(Ctor::Complex)) => true,
            _ => self
                .supertype()
                .map_or(false, |parent| parent.is_subtype(other)),
        }
    }

    /// Whether values of this type can be stored unboxed in an array buffer
    pub fn is_bits(&self) -> bool {
        matches!(
            self,
            Type::Bool
                | Type::Int8
                | Type::Int16
                | Type::Int32
                | Type::Int64
                | Type::UInt8
                | Type::UInt16
                | Type::UInt32
                | Type::UInt64
                | Type::Float32
                | Type::Float64
                | Type::ComplexF32
                | Type::ComplexF64
        )
    }

    pub fn is_concrete(&self) -> bool {
        match self {
            Type::Any | Type::Abstract(_) | Type::UnionAll(_) | Type::Function => false,
            Type::Tuple(items) => items.iter().all(Type::is_concrete),
            _ => true,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => f.write_str("Any"),
            Type::Nothing => f.write_str("Nothing"),
            Type::Missing => f.write_str("Missing"),
            Type::Bool => f.write_str("Bool"),
            Type::Int8 => f.write_str("Int8"),
            Type::Int16 => f.write_str("Int16"),
            Type::Int32 => f.write_str("Int32"),
            Type::Int64 => f.write_str("Int64"),
            Type::UInt8 => f.write_str("UInt8"),
            Type::UInt16 => f.write_str("UInt16"),
            Type::UInt32 => f.write_str("UInt32"),
            Type::UInt64 => f.write_str("UInt64"),
            Type::Float32 => f.write_str("Float32"),
            Type::Float64 => f.write_str("Float64"),
            Type::ComplexF32 => f.write_str("ComplexF32"),
            Type::ComplexF64 => f.write_str("ComplexF64"),
            Type::Irrational(c) => write!(f, "Irrational{{:{}}}", c.symbol()),
            Type::String => f.write_str("String"),
            Type::Symbol => f.write_str("Symbol"),
            Type::Tuple(items) => {
                f.write_str("Tuple{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
            Type::Pair(a, b) => write!(f, "Pair{{{a}, {b}}}"),
            Type::Array(elem, 1) => write!(f, "Vector{{{elem}}}"),
            Type::Array(elem, 2) => write!(f, "Matrix{{{elem}}}"),
            Type::Array(elem, n) => write!(f, "Array{{{elem}, {n}}}"),
            Type::BitVector => f.write_str("BitVector"),
            Type::UnitRange => f.write_str("UnitRange{Int64}"),
            Type::Dict(k, v) => write!(f, "Dict{{{k}, {v}}}"),
            Type::Struct(def) => f.write_str(&def.name),
            Type::Function => f.write_str("Function"),
            Type::DataType => f.write_str("DataType"),
            Type::Module => f.write_str("Module"),
            Type::Abstract(a) => {
                let name = match a {
                    Abstract::Number => "Number",
                    Abstract::Real => "Real",
                    Abstract::Integer => "Integer",
                    Abstract::Signed => "Signed",
                    Abstract::Unsigned => "Unsigned",
                    Abstract::AbstractFloat => "AbstractFloat",
                    Abstract::AbstractString => "AbstractString",
                    Abstract::AbstractArray => "AbstractArray",
                    Abstract::AbstractDict => "AbstractDict",
                    Abstract::Tuple => "Tuple",
                };
                f.write_str(name)
            }
            Type::UnionAll(c) => {
                let name = match c {
                    Ctor::Array => "Array",
                    Ctor::Vector => "Vector",
                    Ctor::Matrix => "Matrix",
                    Ctor::Dict => "Dict",
                    Ctor::Pair => "Pair",
                    Ctor::Complex => "Complex",
                };
                f.write_str(name)
            }
        }
    }
}

// ============================================================================
// Values
// ============================================================================

#[derive(Clone)]
pub enum Value {
    Nothing,
    Missing,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    ComplexF32(Complex32),
    ComplexF64(Complex64),
    Irrational(Irrational),
    Str(Rc<str>),
    Symbol(Symbol),
    Tuple(Rc<[Value]>),
    Pair(Rc<(Value, Value)>),
    Array(Rc<ArrayObj>),
    BitVector(Rc<RefCell<BitVec>>),
    Range(i64, i64),
    Dict(Rc<DictObj>),
    Struct(Rc<StructObj>),
    Function(Rc<Function>),
    Type(Type),
    Module(Rc<Module>),
}

impl Value {
    pub fn str(text: &str) -> Value {
        Value::Str(Rc::from(text))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Symbol::new(name))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(Rc::from(items))
    }

    pub fn pair(first: Value, second: Value) -> Value {
        Value::Pair(Rc::new((first, second)))
    }

    /// Vector with the given element type; elements are converted to it
    pub fn vector(elem: &Type, items: &[Value]) -> RuntimeResult<Value> {
        Ok(Value::Array(Rc::new(ArrayObj::vector(Buffer::from_values(
            elem, items,
        )?))))
    }

    pub fn bitvector(bits: BitVec) -> Value {
        Value::BitVector(Rc::new(RefCell::new(bits)))
    }

    pub fn type_of(&self) -> Type {
        match self {
            Value::Nothing => Type::Nothing,
            Value::Missing => Type::Missing,
            Value::Bool(_) => Type::Bool,
            Value::Int8(_) => Type::Int8,
            Value::Int16(_) => Type::Int16,
            Value::Int32(_) => Type::Int32,
            Value::Int64(_) => Type::Int64,
            Value::UInt8(_) => Type::UInt8,
            Value::UInt16(_) => Type::UInt16,
            Value::UInt32(_) => Type::UInt32,
            Value::UInt64(_) => Type::UInt64,
            Value::Float32(_) => Type::Float32,
            Value::Float64(_) => Type::Float64,
            Value::ComplexF32(_) => Type::ComplexF32,
            Value::ComplexF64(_) => Type::ComplexF64,
            Value::Irrational(c) => Type::Irrational(*c),
            Value::Str(_) => Type::String,
            Value::Symbol(_) => Type::Symbol,
            Value::Tuple(items) => Type::Tuple(items.iter().map(Value::type_of).collect()),
            Value::Pair(p) => Type::Pair(Box::new(p.0.type_of()), Box::new(p.1.type_of())),
            Value::Array(a) => Type::Array(Box::new(a.elem_type()), a.ndims()),
            Value::BitVector(_) => Type::BitVector,
            Value::Range(..) => Type::UnitRange,
            Value::Dict(d) => Type::dict(d.key_type.clone(), d.value_type.clone()),
            Value::Struct(s) => Type::Struct(Rc::clone(&s.def)),
            Value::Function(_) => Type::Function,
            Value::Type(_) => Type::DataType,
            Value::Module(_) => Type::Module,
        }
    }

    pub fn isa(&self, ty: &Type) -> bool {
        match (self, ty) {
            (Value::Function(_), Type::Function) => true,
            _ => self.type_of().is_subtype(ty),
        }
    }

    /// Whether the value has identity and can be changed in place
    pub fn is_mutable(&self) -> bool {
        match self {
            Value::Array(_) | Value::BitVector(_) | Value::Dict(_) => true,
            Value::Struct(s) => s.def.mutable,
            _ => false,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Type(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::Bool(_)
                | Value::Int8(_)
                | Value::Int16(_)
                | Value::Int32(_)
                | Value::Int64(_)
                | Value::UInt8(_)
                | Value::UInt16(_)
                | Value::UInt32(_)
                | Value::UInt64(_)
                | Value::Float32(_)
                | Value::Float64(_)
                | Value::ComplexF32(_)
                | Value::ComplexF64(_)
                | Value::Irrational(_)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer value of any integer-typed scalar that fits in `i64`
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Bool(b) => Some(b as i64),
            Value::Int8(v) => Some(v.into()),
            Value::Int16(v) => Some(v.into()),
            Value::Int32(v) => Some(v.into()),
            Value::Int64(v) => Some(v),
            Value::UInt8(v) => Some(v.into()),
            Value::UInt16(v) => Some(v.into()),
            Value::UInt32(v) => Some(v.into()),
            Value::UInt64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&Type> {
        match self {
            Value::Type(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&print::repr(self))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&print::string(self))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::str(v)
    }
}

// ============================================================================
// Typed array storage
// ============================================================================

/// Bits types that can live unboxed in a `Buffer`
pub trait Element: Copy + PartialEq + 'static {
    const TYPE: Type;

    fn into_value(self) -> Value;
    fn extract(value: &Value) -> Option<Self>;
    fn slice(buffer: &Buffer) -> Option<&[Self]>;
    fn slice_mut(buffer: &mut Buffer) -> Option<&mut Vec<Self>>;
    fn wrap(items: Vec<Self>) -> Buffer;

    /// Convert any value to this element type, failing on inexact input
    fn convert(value: &Value) -> RuntimeResult<Self> {
        let converted = convert_value(&Self::TYPE, value)?;
        Self::extract(&converted)
            .ok_or_else(|| RuntimeError::method("convert", &[Value::Type(Self::TYPE), value.clone()]))
    }
}

macro_rules! impl_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl Element for $ty {
            const TYPE: Type = Type::$variant;

            #[inline]
            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            #[inline]
            fn extract(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(x) => Some(*x),
                    _ => None,
                }
            }

            fn slice(buffer: &Buffer) -> Option<&[Self]> {
                match buffer {
                    Buffer::$variant(items) => Some(items),
                    _ => None,
                }
            }

            fn slice_mut(buffer: &mut Buffer) -> Option<&mut Vec<Self>> {
                match buffer {
                    Buffer::$variant(items) => Some(items),
                    _ => None,
                }
            }

            fn wrap(items: Vec<Self>) -> Buffer {
                Buffer::$variant(items)
            }
        }
    )*};
}

impl_element! {
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    Complex32 => ComplexF32,
    Complex64 => ComplexF64,
}

/// Dispatch on a bits element type, binding `$t` to the Rust element type.
macro_rules! with_elem_type {
    ($elem:expr, $t:ident => $typed:expr, _ => $other:expr) => {
        match $elem {
            Type::Bool => { type $t = bool; $typed }
            Type::Int8 => { type $t = i8; $typed }
            Type::Int16 => { type $t = i16; $typed }
            Type::Int32 => { type $t = i32; $typed }
            Type::Int64 => { type $t = i64; $typed }
            Type::UInt8 => { type $t = u8; $typed }
            Type::UInt16 => { type $t = u16; $typed }
            Type::UInt32 => { type $t = u32; $typed }
            Type::UInt64 => { type $t = u64; $typed }
            Type::Float32 => { type $t = f32; $typed }
            Type::Float64 => { type $t = f64; $typed }
            Type::ComplexF32 => { type $t = Complex32; $typed }
            Type::ComplexF64 => { type $t = Complex64; $typed }
            _ => $other,
        }
    };
}

/// Dispatch on a buffer, binding the typed `Vec` or the boxed items.
macro_rules! with_buffer {
    ($buffer:expr, $v:ident => $typed:expr, $items:ident => $boxed:expr) => {
        match $buffer {
            Buffer::Bool($v) => $typed,
            Buffer::Int8($v) => $typed,
            Buffer::Int16($v) => $typed,
            Buffer::Int32($v) => $typed,
            Buffer::Int64($v) => $typed,
            Buffer::UInt8($v) => $typed,
            Buffer::UInt16($v) => $typed,
            Buffer::UInt32($v) => $typed,
            Buffer::UInt64($v) => $typed,
            Buffer::Float32($v) => $typed,
            Buffer::Float64($v) => $typed,
            Buffer::ComplexF32($v) => $typed,
            Buffer::ComplexF64($v) => $typed,
            Buffer::Boxed { items: $items, .. } => $boxed,
        }
    };
}

/// Contiguous element storage, typed for bits elements
#[derive(Debug, Clone)]
pub enum Buffer {
    Bool(Vec<bool>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    ComplexF32(Vec<Complex32>),
    ComplexF64(Vec<Complex64>),
    Boxed { elem: Type, items: Vec<Value> },
}

fn collect_typed<T: Element>(values: &[Value]) -> RuntimeResult<Buffer> {
    values
        .iter()
        .map(T::convert)
        .collect::<RuntimeResult<Vec<T>>>()
        .map(T::wrap)
}

fn store<T: Element>(items: &mut [T], index: usize, value: &Value) -> RuntimeResult<()> {
    let converted = T::convert(value)?;
    match items.get_mut(index) {
        Some(slot) => {
            *slot = converted;
            Ok(())
        }
        None => Err(RuntimeError::Bounds {
            container: format!("{}-element buffer", items.len()),
            index: (index + 1).to_string(),
        }),
    }
}

fn append<T: Element>(items: &mut Vec<T>, value: &Value) -> RuntimeResult<()> {
    items.push(T::convert(value)?);
    Ok(())
}

fn slice_type<T: Element>(_items: &[T]) -> Type {
    T::TYPE
}

impl Buffer {
    pub fn empty(elem: &Type) -> Buffer {
        with_elem_type!(elem, T => T::wrap(Vec::new()), _ => Buffer::Boxed {
            elem: elem.clone(),
            items: Vec::new(),
        })
    }

    pub fn from_values(elem: &Type, values: &[Value]) -> RuntimeResult<Buffer> {
        with_elem_type!(elem, T => collect_typed::<T>(values), _ => {
            let items = values
                .iter()
                .map(|v| convert_value(elem, v))
                .collect::<RuntimeResult<Vec<_>>>()?;
            Ok(Buffer::Boxed { elem: elem.clone(), items })
        })
    }

    pub fn len(&self) -> usize {
        with_buffer!(self, v => v.len(), items => items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn elem_type(&self) -> Type {
        match self {
            Buffer::Boxed { elem, .. } => elem.clone(),
            typed => with_buffer!(typed, v => slice_type(v), _items => Type::Any),
        }
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        with_buffer!(self, v => v.get(index).map(|x| x.into_value()), items => items.get(index).cloned())
    }

    pub fn set(&mut self, index: usize, value: &Value) -> RuntimeResult<()> {
        match self {
            Buffer::Boxed { elem, items } => {
                let converted = convert_value(elem, value)?;
                let len = items.len();
                match items.get_mut(index) {
                    Some(slot) => {
                        *slot = converted;
                        Ok(())
                    }
                    None => Err(RuntimeError::Bounds {
                        container: format!("{len}-element buffer"),
                        index: (index + 1).to_string(),
                    }),
                }
            }
            typed => with_buffer!(typed, v => store(v, index, value), _items => Ok(())),
        }
    }

    pub fn push(&mut self, value: &Value) -> RuntimeResult<()> {
        match self {
            Buffer::Boxed { elem, items } => {
                items.push(convert_value(elem, value)?);
                Ok(())
            }
            typed => with_buffer!(typed, v => append(v, value), _items => Ok(())),
        }
    }

    pub fn pop(&mut self) -> Option<Value> {
        with_buffer!(self, v => v.pop().map(|x| x.into_value()), items => items.pop())
    }

    pub fn to_values(&self) -> Vec<Value> {
        with_buffer!(self, v => v.iter().map(|x| x.into_value()).collect(), items => items.clone())
    }
}

// ============================================================================
// Heap objects
// ============================================================================

/// N-dimensional column-major array over a shareable buffer
pub struct ArrayObj {
    buffer: Rc<RefCell<Buffer>>,
    dims: RefCell<Vec<usize>>,
}

impl ArrayObj {
    pub fn new(buffer: Buffer, dims: Vec<usize>) -> Self {
        Self {
            buffer: Rc::new(RefCell::new(buffer)),
            dims: RefCell::new(dims),
        }
    }

    pub fn vector(buffer: Buffer) -> Self {
        let len = buffer.len();
        Self::new(buffer, vec![len])
    }

    pub fn buffer(&self) -> Ref<'_, Buffer> {
        self.buffer.borrow()
    }

    pub fn buffer_mut(&self) -> RefMut<'_, Buffer> {
        self.buffer.borrow_mut()
    }

    pub fn dims(&self) -> Vec<usize> {
        self.dims.borrow().clone()
    }

    pub fn ndims(&self) -> usize {
        self.dims.borrow().len()
    }

    pub fn len(&self) -> usize {
        self.dims.borrow().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn elem_type(&self) -> Type {
        self.buffer.borrow().elem_type()
    }

    /// Element at a zero-based linear offset
    pub fn get(&self, offset: usize) -> Option<Value> {
        if offset >= self.len() {
            return None;
        }
        self.buffer.borrow().get(offset)
    }

    pub fn set(&self, offset: usize, value: &Value) -> RuntimeResult<()> {
        if offset >= self.len() {
            return Err(self.out_of_bounds(offset + 1));
        }
        self.buffer.borrow_mut().set(offset, value)
    }

    pub fn push(&self, value: &Value) -> RuntimeResult<()> {
        self.ensure_resizable()?;
        self.buffer.borrow_mut().push(value)?;
        self.dims.borrow_mut()[0] += 1;
        Ok(())
    }

    pub fn pop(&self) -> RuntimeResult<Value> {
        self.ensure_resizable()?;
        let value = self
            .buffer
            .borrow_mut()
            .pop()
            .ok_or_else(|| RuntimeError::Argument("array must be non-empty".to_string()))?;
        self.dims.borrow_mut()[0] -= 1;
        Ok(value)
    }

    /// New array header over the same buffer
    pub fn reshape(&self, dims: Vec<usize>) -> RuntimeResult<ArrayObj> {
        let requested: usize = dims.iter().product();
        if requested != self.len() {
            return Err(RuntimeError::DimensionMismatch(format!(
                "new dimensions {} must be consistent with array size {}",
                format_dims(&dims),
                self.len()
            )));
        }
        Ok(ArrayObj {
            buffer: Rc::clone(&self.buffer),
            dims: RefCell::new(dims),
        })
    }

    pub fn shares_buffer_with(&self, other: &ArrayObj) -> bool {
        Rc::ptr_eq(&self.buffer, &other.buffer)
    }

    pub fn to_values(&self) -> Vec<Value> {
        self.buffer.borrow().to_values()
    }

    /// Independent copy with its own buffer
    pub fn duplicate(&self) -> ArrayObj {
        ArrayObj::new(self.buffer.borrow().clone(), self.dims())
    }

    pub(crate) fn out_of_bounds(&self, index: impl fmt::Display) -> RuntimeError {
        RuntimeError::Bounds {
            container: format!("{}-element {}", format_dims(&self.dims()), self.elem_description()),
            index: index.to_string(),
        }
    }

    fn elem_description(&self) -> String {
        Type::Array(Box::new(self.elem_type()), self.ndims()).to_string()
    }

    fn ensure_resizable(&self) -> RuntimeResult<()> {
        if self.ndims() != 1 {
            return Err(RuntimeError::Argument(
                "only one-dimensional arrays can be resized".to_string(),
            ));
        }
        if Rc::strong_count(&self.buffer) > 1 {
            return Err(RuntimeError::Error(
                "cannot resize array with shared data".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn format_dims(dims: &[usize]) -> String {
    dims.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("×")
}

/// Dictionary key: hashed with `hash`, compared with `isequal`
#[derive(Clone)]
pub struct DictKey(pub Value);

impl Hash for DictKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(hash_value(&self.0));
    }
}

impl PartialEq for DictKey {
    fn eq(&self, other: &Self) -> bool {
        isequal(&self.0, &other.0)
    }
}

impl Eq for DictKey {}

/// Insertion-ordered hash dictionary keyed by `isequal`
pub struct DictObj {
    pub key_type: Type,
    pub value_type: Type,
    entries: RefCell<IndexMap<DictKey, Value>>,
}

impl DictObj {
    pub fn new(key_type: Type, value_type: Type) -> Self {
        Self {
            key_type,
            value_type,
            entries: RefCell::new(IndexMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.entries.borrow().get(&DictKey(key.clone())).cloned()
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.entries.borrow().contains_key(&DictKey(key.clone()))
    }

    pub fn insert(&self, key: &Value, value: &Value) -> RuntimeResult<()> {
        let key = convert_value(&self.key_type, key)?;
        let value = convert_value(&self.value_type, value)?;
        self.entries.borrow_mut().insert(DictKey(key), value);
        Ok(())
    }

    /// Remaining entries keep their insertion order
    pub fn remove(&self, key: &Value) -> Option<Value> {
        self.entries.borrow_mut().shift_remove(&DictKey(key.clone()))
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.entries
            .borrow()
            .iter()
            .map(|(key, value)| (key.0.clone(), value.clone()))
            .collect()
    }
}

/// Layout of a user-defined struct
#[derive(Debug)]
pub struct StructDef {
    pub name: String,
    pub mutable: bool,
    pub fields: Vec<(String, Type)>,
}

impl PartialEq for StructDef {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl StructDef {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(field, _)| field == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Redefinitions are accepted only when nothing observable changes
    pub fn same_layout(&self, other: &StructDef) -> bool {
        self.name == other.name
            && self.mutable == other.mutable
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|((a, ta), (b, tb))| a == b && ta == tb)
    }
}

pub struct StructObj {
    pub def: Rc<StructDef>,
    fields: RefCell<Vec<Value>>,
}

impl StructObj {
    /// Instance with each argument converted to its declared field type
    pub fn new(def: Rc<StructDef>, args: &[Value]) -> RuntimeResult<Self> {
        let fields = def
            .fields
            .iter()
            .zip(args)
            .map(|((_, ty), arg)| convert_value(ty, arg))
            .collect::<RuntimeResult<Vec<_>>>()?;
        Ok(Self {
            def,
            fields: RefCell::new(fields),
        })
    }

    pub fn get_field(&self, name: &str) -> RuntimeResult<Value> {
        let slot = self.slot(name)?;
        Ok(self.fields.borrow()[slot].clone())
    }

    pub fn set_field(&self, name: &str, value: &Value) -> RuntimeResult<()> {
        if !self.def.mutable {
            return Err(RuntimeError::ImmutableField {
                type_name: self.def.name.clone(),
                field: name.to_string(),
            });
        }
        let slot = self.slot(name)?;
        let converted = convert_value(&self.def.fields[slot].1, value)?;
        self.fields.borrow_mut()[slot] = converted;
        Ok(())
    }

    pub fn field_values(&self) -> Vec<Value> {
        self.fields.borrow().clone()
    }

    fn slot(&self, name: &str) -> RuntimeResult<usize> {
        self.def.field_index(name).ok_or_else(|| RuntimeError::Field {
            type_name: self.def.name.clone(),
            field: name.to_string(),
        })
    }
}

// ============================================================================
// Functions and modules
// ============================================================================

pub type Kwargs = [(String, Value)];
pub type BuiltinFn = fn(&Engine, &[Value], &Kwargs) -> RuntimeResult<Value>;

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

/// One method of a user-defined generic function
pub struct Method {
    pub params: Vec<Param>,
    pub body: Rc<Vec<Expr>>,
    pub env: Option<Rc<Scope>>,
}

impl Method {
    pub fn accepts(&self, args: &[Value]) -> bool {
        self.params.len() == args.len()
            && self.params.iter().zip(args).all(|(p, a)| a.isa(&p.ty))
    }

    pub fn more_specific_than(&self, other: &Method) -> bool {
        self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.ty.is_subtype(&b.ty))
    }

    fn same_signature(&self, other: &Method) -> bool {
        self.params.len() == other.params.len()
            && self.params.iter().zip(&other.params).all(|(a, b)| a.ty == b.ty)
    }
}

pub enum FunctionKind {
    Builtin(BuiltinFn),
    Generic(RefCell<Vec<Rc<Method>>>),
}

pub struct Function {
    pub name: String,
    pub kind: FunctionKind,
}

impl Function {
    pub fn builtin(name: &str, f: BuiltinFn) -> Self {
        Self {
            name: name.to_string(),
            kind: FunctionKind::Builtin(f),
        }
    }

    pub fn generic(name: &str, method: Method) -> Self {
        Self {
            name: name.to_string(),
            kind: FunctionKind::Generic(RefCell::new(vec![Rc::new(method)])),
        }
    }

    /// Add a method, replacing one with an identical signature
    pub fn add_method(&self, method: Method) -> RuntimeResult<()> {
        match &self.kind {
            FunctionKind::Generic(methods) => {
                let mut methods = methods.borrow_mut();
                methods.retain(|existing| !existing.same_signature(&method));
                methods.push(Rc::new(method));
                Ok(())
            }
            FunctionKind::Builtin(_) => Err(RuntimeError::Error(format!(
                "cannot add methods to builtin function {}",
                self.name
            ))),
        }
    }

    /// Most specific applicable method; later definitions win ties
    pub fn select(&self, args: &[Value]) -> Option<Rc<Method>> {
        let FunctionKind::Generic(methods) = &self.kind else {
            return None;
        };
        let mut best: Option<Rc<Method>> = None;
        for method in methods.borrow().iter().filter(|m| m.accepts(args)) {
            best = match best {
                Some(current) if !method.more_specific_than(&current) => Some(current),
                _ => Some(Rc::clone(method)),
            };
        }
        best
    }

    pub fn method_count(&self) -> usize {
        match &self.kind {
            FunctionKind::Builtin(_) => 1,
            FunctionKind::Generic(methods) => methods.borrow().len(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.starts_with('#')
    }
}

/// Named global scope
pub struct Module {
    pub path: String,
    bindings: RefCell<BTreeMap<String, Value>>,
}

impl Module {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            bindings: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.bindings.borrow().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.bindings.borrow_mut().insert(name.to_string(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.bindings.borrow().keys().cloned().collect()
    }

    pub fn short_name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtype_lattice() {
        assert!(Type::Int8.is_subtype(&Type::Abstract(Abstract::Signed)));
        assert!(Type::Bool.is_subtype(&Type::Abstract(Abstract::Integer)));
        assert!(!Type::Bool.is_subtype(&Type::Abstract(Abstract::Signed)));
        assert!(Type::Float32.is_subtype(&Type::Abstract(Abstract::Real)));
        assert!(Type::ComplexF64.is_subtype(&Type::Abstract(Abstract::Number)));
        assert!(!Type::ComplexF64.is_subtype(&Type::Abstract(Abstract::Real)));
        assert!(Type::vector(Type::Int32).is_subtype(&Type::UnionAll(Ctor::Vector)));
        assert!(!Type::vector(Type::Int32).is_subtype(&Type::vector(Type::Any)));
        assert!(Type::Tuple(vec![Type::Int64, Type::String])
            .is_subtype(&Type::Tuple(vec![Type::Abstract(Abstract::Integer), Type::Any])));
        assert!(Type::Tuple(vec![]).is_subtype(&Type::Abstract(Abstract::Tuple)));
    }

    #[test]
    fn test_type_display() {
        assert_eq!(Type::vector(Type::String).to_string(), "Vector{String}");
        assert_eq!(Type::Array(Box::new(Type::Int64), 2).to_string(), "Matrix{Int64}");
        assert_eq!(Type::dict(Type::Any, Type::Any).to_string(), "Dict{Any, Any}");
        assert_eq!(
            Type::Tuple(vec![Type::Int64, Type::String]).to_string(),
            "Tuple{Int64, String}"
        );
        assert_eq!(Type::Irrational(Irrational::Pi).to_string(), "Irrational{:π}");
    }

    #[test]
    fn test_buffer_is_typed_for_bits() {
        let buffer = Buffer::from_values(&Type::Int8, &[Value::Int64(1), Value::Int64(-2)]).unwrap();
        assert!(matches!(buffer, Buffer::Int8(ref v) if v == &[1, -2]));
        assert_eq!(buffer.elem_type(), Type::Int8);
    }

    #[test]
    fn test_buffer_rejects_inexact_element() {
        let err = Buffer::from_values(&Type::Int8, &[Value::Int64(300)]).unwrap_err();
        assert_eq!(err.kind(), "InexactError");
    }

    #[test]
    fn test_reshape_shares_buffer_and_blocks_resize() {
        let array = ArrayObj::vector(Buffer::Float64(vec![1.0, 2.0, 3.0, 4.0]));
        let matrix = array.reshape(vec![2, 2]).unwrap();
        assert!(matrix.shares_buffer_with(&array));
        matrix.set(3, &Value::Float64(9.0)).unwrap();
        assert!(matches!(array.get(3), Some(Value::Float64(x)) if x == 9.0));
        assert!(array.push(&Value::Float64(5.0)).is_err());
    }

    #[test]
    fn test_reshape_size_mismatch() {
        let array = ArrayObj::vector(Buffer::Int64(vec![1, 2, 3]));
        let err = array.reshape(vec![2, 2]).unwrap_err();
        assert_eq!(err.kind(), "DimensionMismatch");
    }

    #[test]
    fn test_dict_uses_isequal_keys() {
        let dict = DictObj::new(Type::Any, Type::Any);
        dict.insert(&Value::Int64(1), &Value::str("one")).unwrap();
        dict.insert(&Value::Float64(1.0), &Value::str("uno")).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get(&Value::Int64(1)).unwrap().as_str(), Some("uno"));
        assert!(dict.remove(&Value::Int64(1)).is_some());
        assert!(dict.is_empty());
    }

    #[test]
    fn test_immutable_struct_rejects_set() {
        let def = Rc::new(StructDef {
            name: "P".to_string(),
            mutable: false,
            fields: vec![("x".to_string(), Type::Int64)],
        });
        let obj = StructObj::new(def, &[Value::Int64(1)]).unwrap();
        let err = obj.set_field("x", &Value::Int64(2)).unwrap_err();
        assert!(matches!(err, RuntimeError::ImmutableField { .. }));
    }
}
