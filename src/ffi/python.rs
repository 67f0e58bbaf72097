//! Python extension module
//!
//! Exposes the bridge to Python: `JV` wraps a foreign handle and forwards
//! every dunder method to the call dispatcher, `JuliaEvaluator` is the
//! subscript entry point and `SharedArray` views runtime-owned buffers.
//! All objects are unsendable; they stay on the thread that created them.

use std::cell::RefCell;
use std::rc::Rc;

use num_bigint::BigInt;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use pyo3::basic::CompareOp;
use pyo3::create_exception;
use pyo3::exceptions::{
    PyAttributeError, PyException, PyIndexError, PyKeyError, PyRuntimeError, PyTypeError,
    PyValueError,
};
use pyo3::prelude::*;
use pyo3::types::{
    PyBool, PyBytes, PyComplex, PyDict, PyFloat, PyList, PyLong, PyString, PyTuple, PyType,
};
use tracing_appender::non_blocking::WorkerGuard;

use crate::bridge::Bridge;
use crate::core::{ArrayView, HostValue};
use crate::errors::BridgeError;
use crate::frontend::config;
use crate::infrastructure::bootstrap;
use crate::infrastructure::logging::{init_logging, warn, LogConfig};
use crate::interop::{ForeignHandle, HandleIter, Namespace, Operator, REPR_PREFIX};

create_exception!(jvbridge, InvalidKeyError, PyTypeError);
create_exception!(jvbridge, EvaluationError, PyException);
create_exception!(jvbridge, DispatchError, PyException);
create_exception!(jvbridge, ImmutableFieldError, PyAttributeError);
create_exception!(jvbridge, ConversionError, PyTypeError);
create_exception!(jvbridge, ForeignError, PyException);
create_exception!(jvbridge, BootstrapError, PyRuntimeError);
create_exception!(jvbridge, ConfigError, PyValueError);

impl From<BridgeError> for PyErr {
    fn from(err: BridgeError) -> PyErr {
        let message = err.to_string();
        match &err {
            BridgeError::InvalidKey { .. } => InvalidKeyError::new_err(message),
            BridgeError::Evaluation { .. } => EvaluationError::new_err(message),
            BridgeError::Dispatch { .. } => DispatchError::new_err(message),
            BridgeError::ImmutableField { .. } => ImmutableFieldError::new_err(message),
            BridgeError::Conversion(_) => ConversionError::new_err(message),
            BridgeError::Bootstrap(_) => BootstrapError::new_err(message),
            BridgeError::Config(_) => ConfigError::new_err(message),
            BridgeError::Foreign { kind, .. } => match kind.as_str() {
                "KeyError" => PyKeyError::new_err(message),
                "BoundsError" => PyIndexError::new_err(message),
                "UndefVarError" => PyAttributeError::new_err(message),
                _ => ForeignError::new_err(message),
            },
        }
    }
}

thread_local! {
    static SESSION: RefCell<Option<Rc<Bridge>>> = RefCell::new(None);
}

static LOG_GUARD: Lazy<Mutex<Option<WorkerGuard>>> = Lazy::new(|| Mutex::new(None));

/// The calling thread's bridge, started on first use
fn session() -> PyResult<Rc<Bridge>> {
    SESSION.with(|cell| {
        if let Some(bridge) = cell.borrow().as_ref() {
            return Ok(Rc::clone(bridge));
        }
        let bridge = Rc::new(Bridge::new()?);
        *cell.borrow_mut() = Some(Rc::clone(&bridge));
        Ok(bridge)
    })
}

// ============================================================================
// Conversion
// ============================================================================

fn to_host_value(obj: &PyAny) -> PyResult<HostValue> {
    if obj.is_none() {
        return Ok(HostValue::Unit);
    }
    if let Ok(jv) = obj.extract::<PyRef<'_, JV>>() {
        return Ok(HostValue::Handle(jv.handle.clone()));
    }
    if let Ok(array) = obj.extract::<PyRef<'_, SharedArray>>() {
        return Ok(HostValue::Array(array.view.clone()));
    }
    // bool is a subclass of int
    if obj.is_instance_of::<PyBool>() {
        return Ok(HostValue::Bool(obj.extract()?));
    }
    if obj.is_instance_of::<PyLong>() {
        return Ok(HostValue::Int(obj.extract::<BigInt>()?));
    }
    if obj.is_instance_of::<PyFloat>() {
        return Ok(HostValue::Float(obj.extract()?));
    }
    if let Ok(z) = obj.downcast::<PyComplex>() {
        return Ok(HostValue::Complex(z.real(), z.imag()));
    }
    if obj.is_instance_of::<PyString>() {
        return Ok(HostValue::Text(obj.extract()?));
    }
    if let Ok(tuple) = obj.downcast::<PyTuple>() {
        return Ok(HostValue::Tuple(
            tuple.iter().map(to_host_value).collect::<PyResult<_>>()?,
        ));
    }
    if let Ok(list) = obj.downcast::<PyList>() {
        return Ok(HostValue::List(
            list.iter().map(to_host_value).collect::<PyResult<_>>()?,
        ));
    }
    if let Ok(dict) = obj.downcast::<PyDict>() {
        return Ok(HostValue::Map(
            dict.iter()
                .map(|(k, v)| Ok((to_host_value(k)?, to_host_value(v)?)))
                .collect::<PyResult<_>>()?,
        ));
    }
    Err(ConversionError::new_err(format!(
        "cannot pass a {} to the runtime",
        obj.get_type().name()?
    )))
}

fn to_py(py: Python<'_>, value: HostValue) -> PyResult<PyObject> {
    let obj = match value {
        HostValue::Unit => py.None(),
        HostValue::Bool(b) => b.into_py(py),
        HostValue::Int(i) => i.into_py(py),
        HostValue::Float(x) => x.into_py(py),
        HostValue::Complex(re, im) => PyComplex::from_doubles(py, re, im).into_py(py),
        HostValue::Text(s) => s.into_py(py),
        HostValue::Tuple(items) => PyTuple::new(py, to_py_all(py, items)?).into_py(py),
        HostValue::List(items) => PyList::new(py, to_py_all(py, items)?).into_py(py),
        HostValue::Map(entries) => {
            let dict = PyDict::new(py);
            for (key, item) in entries {
                dict.set_item(to_py(py, key)?, to_py(py, item)?)?;
            }
            dict.into_py(py)
        }
        HostValue::Array(view) => Py::new(py, SharedArray { view })?.into_py(py),
        HostValue::Handle(handle) => Py::new(py, JV { handle })?.into_py(py),
    };
    Ok(obj)
}

fn to_py_all(py: Python<'_>, items: Vec<HostValue>) -> PyResult<Vec<PyObject>> {
    items.into_iter().map(|item| to_py(py, item)).collect()
}

fn to_kwargs(kwargs: Option<&PyDict>) -> PyResult<Vec<(String, HostValue)>> {
    kwargs
        .map(|dict| {
            dict.iter()
                .map(|(k, v)| Ok((k.extract::<String>()?, to_host_value(v)?)))
                .collect()
        })
        .unwrap_or_else(|| Ok(Vec::new()))
}

// ============================================================================
// JV
// ============================================================================

/// Handle to a foreign value
#[pyclass(unsendable, name = "JV")]
pub struct JV {
    handle: ForeignHandle,
}

impl JV {
    fn binary(&self, py: Python<'_>, op: Operator, other: &PyAny) -> PyResult<PyObject> {
        let other = to_host_value(other)?;
        to_py(py, self.handle.binary(op, &other)?)
    }

    fn reflected(&self, py: Python<'_>, op: Operator, other: &PyAny) -> PyResult<PyObject> {
        let other = to_host_value(other)?;
        to_py(py, self.handle.reflected(op, &other)?)
    }

    fn unary(&self, py: Python<'_>, op: Operator) -> PyResult<PyObject> {
        to_py(py, self.handle.unary(op)?)
    }
}

#[pymethods]
impl JV {
    fn __repr__(&self) -> String {
        self.handle.repr()
    }

    fn __str__(&self) -> String {
        self.handle.repr()
    }

    #[pyo3(signature = (*args, **kwargs))]
    fn __call__(&self, py: Python<'_>, args: &PyTuple, kwargs: Option<&PyDict>) -> PyResult<PyObject> {
        let args = args.iter().map(to_host_value).collect::<PyResult<Vec<_>>>()?;
        let kwargs = to_kwargs(kwargs)?;
        to_py(py, self.handle.call(&args, &kwargs)?)
    }

    fn __getattr__(&self, py: Python<'_>, name: &str) -> PyResult<PyObject> {
        to_py(py, self.handle.get_field(name)?)
    }

    fn __setattr__(&self, name: &str, value: &PyAny) -> PyResult<()> {
        Ok(self.handle.set_field(name, &to_host_value(value)?)?)
    }

    fn __dir__(&self) -> Vec<String> {
        self.handle.field_names()
    }

    fn __getitem__(&self, py: Python<'_>, key: &PyAny) -> PyResult<PyObject> {
        to_py(py, self.handle.get_item(&to_host_value(key)?)?)
    }

    fn __setitem__(&self, key: &PyAny, value: &PyAny) -> PyResult<()> {
        Ok(self.handle.set_item(&to_host_value(key)?, &to_host_value(value)?)?)
    }

    fn __contains__(&self, item: &PyAny) -> PyResult<bool> {
        Ok(self.handle.contains(&to_host_value(item)?)?)
    }

    fn __len__(&self) -> PyResult<usize> {
        Ok(self.handle.len()?)
    }

    fn __bool__(&self) -> PyResult<bool> {
        Ok(self.handle.truthy()?)
    }

    fn __hash__(&self) -> PyResult<isize> {
        Ok(self.handle.hash()? as isize)
    }

    fn __iter__(&self) -> JVIter {
        JVIter {
            iter: self.handle.iter(),
        }
    }

    fn __richcmp__(&self, py: Python<'_>, other: &PyAny, op: CompareOp) -> PyResult<PyObject> {
        let op = match op {
            CompareOp::Lt => Operator::Lt,
            CompareOp::Le => Operator::Le,
            CompareOp::Eq => Operator::Eq,
            CompareOp::Ne => Operator::Ne,
            CompareOp::Gt => Operator::Gt,
            CompareOp::Ge => Operator::Ge,
        };
        // unconvertible operands let Python try the reflected comparison
        let other = match to_host_value(other) {
            Ok(other) => other,
            Err(err) if err.is_instance_of::<ConversionError>(py) => {
                return Ok(py.NotImplemented())
            }
            Err(err) => return Err(err),
        };
        to_py(py, self.handle.binary(op, &other)?)
    }

    fn __add__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.binary(py, Operator::Add, other)
    }

    fn __radd__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.reflected(py, Operator::Add, other)
    }

    fn __sub__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.binary(py, Operator::Sub, other)
    }

    fn __rsub__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.reflected(py, Operator::Sub, other)
    }

    fn __mul__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.binary(py, Operator::Mul, other)
    }

    fn __rmul__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.reflected(py, Operator::Mul, other)
    }

    fn __matmul__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.binary(py, Operator::MatMul, other)
    }

    fn __rmatmul__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.reflected(py, Operator::MatMul, other)
    }

    fn __truediv__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.binary(py, Operator::Div, other)
    }

    fn __rtruediv__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.reflected(py, Operator::Div, other)
    }

    fn __floordiv__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.binary(py, Operator::FloorDiv, other)
    }

    fn __rfloordiv__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.reflected(py, Operator::FloorDiv, other)
    }

    fn __mod__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.binary(py, Operator::Mod, other)
    }

    fn __rmod__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.reflected(py, Operator::Mod, other)
    }

    fn __pow__(&self, py: Python<'_>, other: &PyAny, _modulo: Option<&PyAny>) -> PyResult<PyObject> {
        self.binary(py, Operator::Pow, other)
    }

    fn __rpow__(&self, py: Python<'_>, other: &PyAny, _modulo: Option<&PyAny>) -> PyResult<PyObject> {
        self.reflected(py, Operator::Pow, other)
    }

    fn __and__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.binary(py, Operator::BitAnd, other)
    }

    fn __rand__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.reflected(py, Operator::BitAnd, other)
    }

    fn __or__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.binary(py, Operator::BitOr, other)
    }

    fn __ror__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.reflected(py, Operator::BitOr, other)
    }

    fn __xor__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.binary(py, Operator::BitXor, other)
    }

    fn __rxor__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.reflected(py, Operator::BitXor, other)
    }

    fn __lshift__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.binary(py, Operator::Shl, other)
    }

    fn __rlshift__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.reflected(py, Operator::Shl, other)
    }

    fn __rshift__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.binary(py, Operator::Shr, other)
    }

    fn __rrshift__(&self, py: Python<'_>, other: &PyAny) -> PyResult<PyObject> {
        self.reflected(py, Operator::Shr, other)
    }

    fn __neg__(&self, py: Python<'_>) -> PyResult<PyObject> {
        self.unary(py, Operator::Neg)
    }

    fn __pos__(&self, py: Python<'_>) -> PyResult<PyObject> {
        self.unary(py, Operator::Pos)
    }

    fn __abs__(&self, py: Python<'_>) -> PyResult<PyObject> {
        self.unary(py, Operator::Abs)
    }

    fn __invert__(&self, py: Python<'_>) -> PyResult<PyObject> {
        self.unary(py, Operator::Invert)
    }
}

#[pyclass(unsendable)]
pub struct JVIter {
    iter: HandleIter,
}

#[pymethods]
impl JVIter {
    fn __iter__(slf: PyRef<'_, Self>) -> PyRef<'_, Self> {
        slf
    }

    fn __next__(&mut self, py: Python<'_>) -> PyResult<Option<PyObject>> {
        match self.iter.next() {
            Some(item) => Ok(Some(to_py(py, item?)?)),
            None => Ok(None),
        }
    }
}

// ============================================================================
// Evaluator, modules and arrays
// ============================================================================

/// `JuliaEvaluator()[source]` or `JuliaEvaluator()[(stmt, ..., expr)]`
#[pyclass(unsendable)]
pub struct JuliaEvaluator {
    bridge: Rc<Bridge>,
}

#[pymethods]
impl JuliaEvaluator {
    #[new]
    fn new() -> PyResult<Self> {
        Ok(Self { bridge: session()? })
    }

    fn __getitem__(&self, py: Python<'_>, key: &PyAny) -> PyResult<PyObject> {
        let key = to_host_value(key)?;
        to_py(py, self.bridge.evaluator().get_host(&key)?)
    }

    /// `JuliaEvaluator["..."]` on the class uses the session evaluator
    #[classmethod]
    fn __class_getitem__(_cls: &PyType, py: Python<'_>, key: &PyAny) -> PyResult<PyObject> {
        let key = to_host_value(key)?;
        to_py(py, session()?.evaluator().get_host(&key)?)
    }

    fn __len__(&self) -> usize {
        self.bridge.evaluator().len()
    }

    /// `(hits, misses, evictions, failures)`
    fn cache_info(&self) -> (usize, usize, usize, usize) {
        let stats = self.bridge.evaluator().stats();
        (stats.hits, stats.misses, stats.evictions, stats.failures)
    }
}

#[pyclass(unsendable)]
pub struct JuliaModule {
    namespace: Namespace,
}

#[pymethods]
impl JuliaModule {
    fn __getattr__(&self, py: Python<'_>, name: &str) -> PyResult<PyObject> {
        to_py(py, self.namespace.get(name)?)
    }

    fn __dir__(&self) -> PyResult<Vec<String>> {
        Ok(self.namespace.names()?)
    }

    fn __repr__(&self) -> String {
        self.namespace.repr()
    }
}

/// Host view of a runtime-owned array buffer
#[pyclass(unsendable)]
pub struct SharedArray {
    view: ArrayView,
}

impl SharedArray {
    fn offset(&self, index: isize) -> PyResult<usize> {
        let len = self.view.len() as isize;
        let resolved = if index < 0 { index + len } else { index };
        if (0..len).contains(&resolved) {
            Ok(resolved as usize)
        } else {
            Err(PyIndexError::new_err(format!(
                "index {index} out of range for {len} elements"
            )))
        }
    }
}

#[pymethods]
impl SharedArray {
    #[getter]
    fn shape<'py>(&self, py: Python<'py>) -> &'py PyTuple {
        PyTuple::new(py, self.view.shape())
    }

    #[getter]
    fn dtype(&self) -> &'static str {
        self.view.dtype()
    }

    #[getter]
    fn ndim(&self) -> usize {
        self.view.ndim()
    }

    #[getter]
    fn nbytes(&self) -> usize {
        self.view.nbytes()
    }

    /// Elements in memory order
    fn tolist(&self, py: Python<'_>) -> PyResult<PyObject> {
        Ok(PyList::new(py, to_py_all(py, self.view.tolist())?).into_py(py))
    }

    fn __len__(&self) -> usize {
        self.view.len()
    }

    fn __getitem__(&self, py: Python<'_>, index: isize) -> PyResult<PyObject> {
        let offset = self.offset(index)?;
        match self.view.get(offset) {
            Some(value) => to_py(py, value),
            None => Err(PyIndexError::new_err(format!("index {index} out of range"))),
        }
    }

    fn __setitem__(&self, index: isize, value: &PyAny) -> PyResult<()> {
        let offset = self.offset(index)?;
        Ok(self.view.set(offset, &to_host_value(value)?)?)
    }

    fn __repr__(&self) -> String {
        HostValue::Array(self.view.clone()).to_string()
    }
}

// ============================================================================
// Module functions
// ============================================================================

#[pyfunction]
fn evaluator() -> PyResult<JuliaEvaluator> {
    JuliaEvaluator::new()
}

#[pyfunction]
fn import_module(path: &str) -> PyResult<JuliaModule> {
    Ok(JuliaModule {
        namespace: session()?.import(path)?,
    })
}

/// Every binding of a module that resolves; the rest are skipped
#[pyfunction]
fn wildcard(py: Python<'_>, module: PyRef<'_, JuliaModule>) -> PyResult<PyObject> {
    let dict = PyDict::new(py);
    for (name, value) in module.namespace.wildcard()? {
        match value {
            Ok(value) => dict.set_item(name, to_py(py, value)?)?,
            Err(err) => warn!(name = %name, kind = err.kind(), "binding not imported"),
        }
    }
    Ok(dict.into_py(py))
}

/// Foreign type name of a handle
#[pyfunction]
fn jl_typeof(x: PyRef<'_, JV>) -> String {
    x.handle.type_name().to_string()
}

/// Foreign identity (`===`) of two handles
#[pyfunction]
fn same_object(a: PyRef<'_, JV>, b: PyRef<'_, JV>) -> PyResult<bool> {
    Ok(a.handle.same_object(&b.handle)?)
}

#[pyfunction]
#[pyo3(signature = (executable, args, suppress_errors = true))]
fn invoke_julia(
    py: Python<'_>,
    executable: &str,
    args: Vec<String>,
    suppress_errors: bool,
) -> PyResult<Option<PyObject>> {
    let output = bootstrap::invoke(executable, args.as_slice(), suppress_errors)?;
    Ok(output.map(|bytes| PyBytes::new(py, &bytes).into_py(py)))
}

#[pyfunction]
fn use_sysimage(path: &str) -> PyResult<()> {
    bootstrap::use_sysimage(path)?;
    Ok(())
}

/// Forget the resolved environment; the next read re-reads variables
#[pyfunction]
fn reset_environment() {
    config::reset();
}

#[pyfunction]
fn environment(py: Python<'_>) -> PyResult<PyObject> {
    let env = config::current()?;
    let dict = PyDict::new(py);
    dict.set_item(config::ENV_EXECUTABLE, &env.executable)?;
    dict.set_item(config::ENV_OPTIONS, &env.options)?;
    dict.set_item(
        config::ENV_SYSIMAGE,
        env.sysimage.as_ref().map(|p| p.to_string_lossy().into_owned()),
    )?;
    dict.set_item("evaluator_capacity", env.evaluator_capacity)?;
    dict.set_item("log_level", &env.log_level)?;
    Ok(dict.into_py(py))
}

#[pymodule]
fn jvbridge(py: Python<'_>, m: &PyModule) -> PyResult<()> {
    let env = config::current()?;
    *LOG_GUARD.lock() = init_logging(LogConfig::from_environment(&env));

    m.add_class::<JV>()?;
    m.add_class::<JVIter>()?;
    m.add_class::<JuliaEvaluator>()?;
    m.add_class::<JuliaModule>()?;
    m.add_class::<SharedArray>()?;

    m.add("InvalidKeyError", py.get_type::<InvalidKeyError>())?;
    m.add("EvaluationError", py.get_type::<EvaluationError>())?;
    m.add("DispatchError", py.get_type::<DispatchError>())?;
    m.add("ImmutableFieldError", py.get_type::<ImmutableFieldError>())?;
    m.add("ConversionError", py.get_type::<ConversionError>())?;
    m.add("ForeignError", py.get_type::<ForeignError>())?;
    m.add("BootstrapError", py.get_type::<BootstrapError>())?;
    m.add("ConfigError", py.get_type::<ConfigError>())?;
    m.add("REPR_PREFIX", REPR_PREFIX)?;

    m.add_function(wrap_pyfunction!(evaluator, m)?)?;
    m.add_function(wrap_pyfunction!(import_module, m)?)?;
    m.add_function(wrap_pyfunction!(wildcard, m)?)?;
    m.add_function(wrap_pyfunction!(jl_typeof, m)?)?;
    m.add_function(wrap_pyfunction!(same_object, m)?)?;
    m.add_function(wrap_pyfunction!(invoke_julia, m)?)?;
    m.add_function(wrap_pyfunction!(use_sysimage, m)?)?;
    m.add_function(wrap_pyfunction!(reset_environment, m)?)?;
    m.add_function(wrap_pyfunction!(environment, m)?)?;
    Ok(())
}
