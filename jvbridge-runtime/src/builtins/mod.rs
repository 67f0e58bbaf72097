//! Built-in functions - the `Base` library of the runtime
//!
//! Design: Every builtin is a plain `BuiltinFn` registered by name into the
//! `Base` module. A builtin inspects the runtime types of all its arguments
//! and either handles the combination or raises `MethodError`, so the
//! caller never pre-selects behaviour. Each family lives in a focused module.

mod compare;
mod convert;
mod dict;
mod iter;
mod len;
mod list;
mod math;
mod operations;
pub mod print;
mod props;
mod string;


use std::cmp::Ordering;
use std::rc::Rc;

pub use compare::{egal, equals, hash_value, isequal};
pub use convert::{convert_value, infer_elem_type, promote_type};
pub use iter::collect_values;
pub(crate) use len::{length_of, size_along};
pub(crate) use list::{assign_index, index_value};
pub(crate) use props::{get_property, has_property, property_names, set_property};
pub(crate) use string::concat;

use crate::error::{RuntimeError, RuntimeResult};
use crate::interop::Engine;
use crate::logging::debug;
use crate::objects::{
    Abstract, BuiltinFn, Ctor, Function, Irrational, Kwargs, Module, StructObj, Type, Value,
};
use operations::{Arith, Bitwise, Shift, Unary};

/// Keyword argument by name
pub(crate) fn kwarg<'a>(kwargs: &'a Kwargs, name: &str) -> Option<&'a Value> {
    kwargs.iter().find(|(key, _)| key == name).map(|(_, value)| value)
}

// ============================================================================
// Operators
// ============================================================================

/// Left fold for variadic `+` and `*`
fn fold(op: Arith, args: &[Value]) -> RuntimeResult<Value> {
    let Some((first, rest)) = args.split_first() else {
        return Err(RuntimeError::method(op.name(), args));
    };
    rest.iter()
        .try_fold(first.clone(), |acc, x| operations::arith(op, &acc, x))
}

fn add(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [x] => operations::unary(Unary::Pos, x),
        _ => fold(Arith::Add, args),
    }
}

fn sub(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [x] => operations::unary(Unary::Neg, x),
        [a, b] => operations::arith(Arith::Sub, a, b),
        _ => Err(RuntimeError::method("-", args)),
    }
}

fn mul(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let Some((first, rest)) = args.split_first() else {
        return Err(RuntimeError::method("*", args));
    };
    rest.iter().try_fold(first.clone(), |acc, x| match (&acc, x) {
        (Value::Array(a), Value::Array(b)) => list::matmul(a, b),
        _ => operations::arith(Arith::Mul, &acc, x),
    })
}

macro_rules! binary_builtins {
    ($($name:ident($label:literal) => $family:ident($op:expr);)*) => {$(
        fn $name(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
            match args {
                [a, b] => operations::$family($op, a, b),
                _ => Err(RuntimeError::method($label, args)),
            }
        }
    )*};
}

binary_builtins! {
    divide("/") => arith(Arith::Div);
    power("^") => arith(Arith::Pow);
    div("div") => arith(Arith::IntDiv);
    fld("fld") => arith(Arith::Fld);
    rem("rem") => arith(Arith::Rem);
    modulo("mod") => arith(Arith::Mod);
    bitand("&") => bitwise(Bitwise::And);
    bitor("|") => bitwise(Bitwise::Or);
    xor("xor") => bitwise(Bitwise::Xor);
    shl("<<") => shift(Shift::Left);
    shr(">>") => shift(Shift::Right);
    lshr(">>>") => shift(Shift::LogicalRight);
}

macro_rules! unary_builtins {
    ($($name:ident($label:literal) => $op:expr;)*) => {$(
        fn $name(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
            match args {
                [x] => operations::unary($op, x),
                _ => Err(RuntimeError::method($label, args)),
            }
        }
    )*};
}

unary_builtins! {
    not("!") => Unary::Not;
    invert("~") => Unary::Invert;
    abs("abs") => Unary::Abs;
}

fn missing_operand(a: &Value, b: &Value) -> bool {
    matches!(a, Value::Missing) || matches!(b, Value::Missing)
}

fn eq(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [a, b] => Ok(equals(a, b)),
        _ => Err(RuntimeError::method("==", args)),
    }
}

fn ne(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [a, b] => Ok(match equals(a, b) {
            Value::Bool(same) => Value::Bool(!same),
            other => other,
        }),
        _ => Err(RuntimeError::method("!=", args)),
    }
}

fn compare_with(
    name: &str,
    args: &[Value],
    accept: fn(Ordering) -> bool,
) -> RuntimeResult<Value> {
    let [a, b] = args else {
        return Err(RuntimeError::method(name, args));
    };
    if missing_operand(a, b) {
        return Ok(Value::Missing);
    }
    Ok(Value::Bool(
        compare::ordering(name, a, b)?.map_or(false, accept),
    ))
}

fn lt(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    compare_with("<", args, Ordering::is_lt)
}

fn le(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    compare_with("<=", args, Ordering::is_le)
}

fn gt(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    compare_with(">", args, Ordering::is_gt)
}

fn ge(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    compare_with(">=", args, Ordering::is_ge)
}

/// Total order: `missing` sorts last, `NaN` after other floats
fn isless(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [Value::Missing, _] => Ok(Value::Bool(false)),
        [_, Value::Missing] => Ok(Value::Bool(true)),
        [a, b] => Ok(Value::Bool(match compare::ordering("isless", a, b)? {
            Some(order) => order.is_lt(),
            None => !math::is_nan(a) && math::is_nan(b),
        })),
        _ => Err(RuntimeError::method("isless", args)),
    }
}

fn isequal_builtin(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [a, b] => Ok(Value::Bool(isequal(a, b))),
        _ => Err(RuntimeError::method("isequal", args)),
    }
}

fn identical(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [a, b] => Ok(Value::Bool(egal(a, b))),
        _ => Err(RuntimeError::method("===", args)),
    }
}

fn not_identical(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [a, b] => Ok(Value::Bool(!egal(a, b))),
        _ => Err(RuntimeError::method("!==", args)),
    }
}

fn not_in(engine: &Engine, args: &[Value], kwargs: &Kwargs) -> RuntimeResult<Value> {
    match iter::in_(engine, args, kwargs)? {
        Value::Bool(found) => Ok(Value::Bool(!found)),
        other => Ok(other),
    }
}

fn hash(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [x] => Ok(Value::UInt64(hash_value(x))),
        [x, Value::UInt64(h)] => Ok(Value::UInt64(compare::mix(*h, hash_value(x)))),
        _ => Err(RuntimeError::method("hash", args)),
    }
}

// ============================================================================
// Types and reflection
// ============================================================================

fn type_arg<'a>(name: &str, args: &'a [Value], position: usize) -> RuntimeResult<&'a Type> {
    args.get(position)
        .and_then(Value::as_type)
        .ok_or_else(|| RuntimeError::method(name, args))
}

fn type_of(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [x] => Ok(Value::Type(x.type_of())),
        _ => Err(RuntimeError::method("typeof", args)),
    }
}

fn isa(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [x, _] => Ok(Value::Bool(x.isa(type_arg("isa", args, 1)?))),
        _ => Err(RuntimeError::method("isa", args)),
    }
}

fn subtype(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let (a, b) = (type_arg("<:", args, 0)?, type_arg("<:", args, 1)?);
    Ok(Value::Bool(args.len() == 2 && a.is_subtype(b)))
}

fn supertype(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let ty = type_arg("supertype", args, 0)?;
    Ok(Value::Type(ty.supertype().unwrap_or(Type::Any)))
}

fn convert(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [_, x] => convert_value(type_arg("convert", args, 0)?, x),
        _ => Err(RuntimeError::method("convert", args)),
    }
}

fn identity(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [x] => Ok(x.clone()),
        _ => Err(RuntimeError::method("identity", args)),
    }
}

fn isnothing(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [x] => Ok(Value::Bool(matches!(x, Value::Nothing))),
        _ => Err(RuntimeError::method("isnothing", args)),
    }
}

fn ismissing(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [x] => Ok(Value::Bool(matches!(x, Value::Missing))),
        _ => Err(RuntimeError::method("ismissing", args)),
    }
}

fn error(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let text: String = args.iter().map(print::string).collect();
    Err(RuntimeError::Error(text))
}

fn tuple(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    Ok(Value::tuple(args.to_vec()))
}

fn pair(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [a, b] => Ok(Value::pair(a.clone(), b.clone())),
        _ => Err(RuntimeError::method("Pair", args)),
    }
}

fn method_count(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [Value::Function(f)] => Ok(Value::Int64(f.method_count() as i64)),
        _ => Err(RuntimeError::method("methodcount", args)),
    }
}

/// Calling a type value: `Int8(3)`, `S1(1, 2, "3")`, `Dict()`, `Vector{T}()`
pub(crate) fn construct(ty: &Type, args: &[Value]) -> RuntimeResult<Value> {
    let fail = || RuntimeError::method(&ty.to_string(), args);
    match ty {
        Type::Struct(def) => {
            if args.len() != def.fields.len() {
                return Err(fail());
            }
            Ok(Value::Struct(Rc::new(StructObj::new(Rc::clone(def), args)?)))
        }
        t if t.is_bits() => match args {
            [x] => convert_value(t, x),
            [_, _] if matches!(t, Type::ComplexF32 | Type::ComplexF64) => {
                convert_value(t, &math::make_complex(args)?)
            }
            _ => Err(fail()),
        },
        Type::String => concat(args),
        Type::Symbol => Ok(Value::symbol(&args.iter().map(print::string).collect::<String>())),
        Type::Dict(k, v) => dict::construct(Some(((**k).clone(), (**v).clone())), args),
        Type::UnionAll(Ctor::Dict) => dict::construct(None, args),
        Type::Pair(..) | Type::UnionAll(Ctor::Pair) => match args {
            [a, b] => Ok(Value::pair(a.clone(), b.clone())),
            _ => Err(fail()),
        },
        Type::UnionAll(Ctor::Complex) => math::make_complex(args),
        Type::Array(elem, 1) => match args {
            [] => Value::vector(elem, &[]),
            [source] => Value::vector(elem, &collect_values(source)?),
            _ => Err(fail()),
        },
        Type::UnionAll(Ctor::Vector | Ctor::Array) => match args {
            [source] => {
                let items = collect_values(source)?;
                Value::vector(&len::elem_type_of(source), &items)
            }
            _ => Err(fail()),
        },
        Type::BitVector => match args {
            [source] => list::bits_from_values(&collect_values(source)?),
            _ => Err(fail()),
        },
        Type::Tuple(_) | Type::Abstract(Abstract::Tuple) => match args {
            [source] => {
                let tuple = Value::tuple(collect_values(source)?);
                convert_value(ty, &tuple)
            }
            _ => Err(fail()),
        },
        Type::UnitRange => match args {
            [start, stop] => match (start.as_i64(), stop.as_i64()) {
                (Some(a), Some(b)) => Ok(Value::Range(a, b)),
                _ => Err(fail()),
            },
            _ => Err(fail()),
        },
        _ => Err(fail()),
    }
}

// ============================================================================
// Multimedia
// ============================================================================

fn display(engine: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [x] => {
            engine.write_output(&format!("{}\n", print::display(x)));
            Ok(Value::Nothing)
        }
        _ => Err(RuntimeError::method("display", args)),
    }
}

fn showable(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [mime, _] => {
            let mime = mime.as_str().ok_or_else(|| RuntimeError::method("showable", args))?;
            Ok(Value::Bool(mime == "text/plain"))
        }
        _ => Err(RuntimeError::method("showable", args)),
    }
}

// ============================================================================
// Registration
// ============================================================================

const BUILTINS: &[(&str, BuiltinFn)] = &[
    // operators
    ("+", add),
    ("-", sub),
    ("*", mul),
    ("/", divide),
    ("^", power),
    ("%", rem),
    ("÷", div),
    ("div", div),
    ("fld", fld),
    ("rem", rem),
    ("mod", modulo),
    ("&", bitand),
    ("|", bitor),
    ("xor", xor),
    ("⊻", xor),
    ("<<", shl),
    (">>", shr),
    (">>>", lshr),
    ("!", not),
    ("~", invert),
    ("abs", abs),
    ("==", eq),
    ("!=", ne),
    ("<", lt),
    ("<=", le),
    (">", gt),
    (">=", ge),
    ("isless", isless),
    ("isequal", isequal_builtin),
    ("===", identical),
    ("!==", not_identical),
    ("in", iter::in_),
    ("∈", iter::in_),
    ("∉", not_in),
    ("hash", hash),
    ("=>", pair),
    // reflection
    ("typeof", type_of),
    ("isa", isa),
    ("<:", subtype),
    ("supertype", supertype),
    ("convert", convert),
    ("identity", identity),
    ("isnothing", isnothing),
    ("ismissing", ismissing),
    ("error", error),
    ("tuple", tuple),
    ("methodcount", method_count),
    // containers
    ("length", len::length),
    ("isempty", len::isempty),
    ("size", len::size),
    ("ndims", len::ndims),
    ("eltype", len::eltype),
    ("lastindex", len::lastindex),
    ("firstindex", len::firstindex),
    ("iterate", iter::iterate),
    (":", iter::colon),
    ("map", iter::map),
    ("filter", iter::filter),
    ("collect", iter::collect),
    ("getindex", list::getindex),
    ("setindex!", list::setindex),
    ("push!", list::push),
    ("pop!", list::pop),
    ("append!", list::append),
    ("reshape", list::reshape),
    ("vec", list::vec),
    ("zeros", list::zeros),
    ("ones", list::ones),
    ("fill", list::fill),
    ("copy", list::copy),
    ("sort", list::sort),
    ("sort!", list::sort_in_place),
    ("reverse", list::reverse),
    ("sum", list::sum),
    ("prod", list::prod),
    ("maximum", list::maximum),
    ("minimum", list::minimum),
    ("first", list::first),
    ("last", list::last),
    ("BitArray", list::bitarray),
    ("haskey", dict::haskey),
    ("get", dict::get),
    ("get!", dict::get_or_insert),
    ("delete!", dict::delete),
    ("keys", dict::keys),
    ("values", dict::values),
    // properties
    ("getproperty", props::getproperty),
    ("setproperty!", props::setproperty),
    ("getfield", props::getproperty),
    ("setfield!", props::setproperty),
    ("hasproperty", props::hasproperty),
    ("propertynames", props::propertynames),
    ("fieldnames", props::fieldnames),
    ("isdefined", props::isdefined),
    // text
    ("string", string::string),
    ("repr", string::repr),
    ("print", string::print),
    ("println", string::println),
    ("uppercase", string::uppercase),
    ("lowercase", string::lowercase),
    ("join", string::join),
    ("startswith", string::startswith),
    ("endswith", string::endswith),
    ("occursin", string::occursin),
    ("split", string::split),
    ("parse", string::parse),
    // math
    ("sqrt", math::sqrt),
    ("exp", math::exp),
    ("log", math::log),
    ("sin", math::sin),
    ("cos", math::cos),
    ("floor", math::floor),
    ("ceil", math::ceil),
    ("round", math::round),
    ("min", math::min),
    ("max", math::max),
    ("complex", math::complex),
    ("real", math::real),
    ("imag", math::imag),
    ("conj", math::conj),
    ("iseven", math::iseven),
    ("isodd", math::isodd),
    ("isnan", math::isnan),
    ("isinf", math::isinf),
    ("typemax", math::typemax),
    ("typemin", math::typemin),
    ("zero", math::zero),
    ("one", math::one),
    // multimedia
    ("display", display),
];

const MULTIMEDIA: &[(&str, BuiltinFn)] = &[("display", display), ("showable", showable)];

fn types() -> Vec<(&'static str, Type)> {
    use Abstract as A;
    vec![
        ("Any", Type::Any),
        ("Nothing", Type::Nothing),
        ("Missing", Type::Missing),
        ("Bool", Type::Bool),
        ("Int8", Type::Int8),
        ("Int16", Type::Int16),
        ("Int32", Type::Int32),
        ("Int64", Type::Int64),
        ("Int", Type::Int64),
        ("UInt8", Type::UInt8),
        ("UInt16", Type::UInt16),
        ("UInt32", Type::UInt32),
        ("UInt64", Type::UInt64),
        ("UInt", Type::UInt64),
        ("Float32", Type::Float32),
        ("Float64", Type::Float64),
        ("ComplexF32", Type::ComplexF32),
        ("ComplexF64", Type::ComplexF64),
        ("String", Type::String),
        ("Symbol", Type::Symbol),
        ("BitVector", Type::BitVector),
        ("UnitRange", Type::UnitRange),
        ("Function", Type::Function),
        ("DataType", Type::DataType),
        ("Module", Type::Module),
        ("Number", Type::Abstract(A::Number)),
        ("Real", Type::Abstract(A::Real)),
        ("Integer", Type::Abstract(A::Integer)),
        ("Signed", Type::Abstract(A::Signed)),
        ("Unsigned", Type::Abstract(A::Unsigned)),
        ("AbstractFloat", Type::Abstract(A::AbstractFloat)),
        ("AbstractString", Type::Abstract(A::AbstractString)),
        ("AbstractArray", Type::Abstract(A::AbstractArray)),
        ("AbstractDict", Type::Abstract(A::AbstractDict)),
        ("Tuple", Type::Abstract(A::Tuple)),
        ("Array", Type::UnionAll(Ctor::Array)),
        ("Vector", Type::UnionAll(Ctor::Vector)),
        ("Matrix", Type::UnionAll(Ctor::Matrix)),
        ("Dict", Type::UnionAll(Ctor::Dict)),
        ("Pair", Type::UnionAll(Ctor::Pair)),
        ("Complex", Type::UnionAll(Ctor::Complex)),
    ]
}

fn register(module: &Module, table: &[(&str, BuiltinFn)]) {
    for (name, f) in table {
        module.set(name, Value::Function(Rc::new(Function::builtin(name, *f))));
    }
}

/// Populate `Base` with builtin functions, types and constants
pub fn install(base: &Module) {
    register(base, BUILTINS);
    for (name, ty) in types() {
        base.set(name, Value::Type(ty));
    }
    base.set("pi", Value::Irrational(Irrational::Pi));
    base.set("π", Value::Irrational(Irrational::Pi));
    base.set("ℯ", Value::Irrational(Irrational::Euler));
    base.set("nothing", Value::Nothing);
    base.set("missing", Value::Missing);
    base.set("Inf", Value::Float64(f64::INFINITY));
    base.set("NaN", Value::Float64(f64::NAN));
    base.set("Inf32", Value::Float32(f32::INFINITY));
    base.set("NaN32", Value::Float32(f32::NAN));
    base.set("im", Value::ComplexF64(crate::objects::Complex::new(0.0, 1.0)));

    let multimedia = Module::new("Base.Multimedia");
    register(&multimedia, MULTIMEDIA);
    base.set("Multimedia", Value::Module(Rc::new(multimedia)));

    debug!(
        target: "builtins",
        functions = BUILTINS.len(),
        "Base installed"
    );
}
