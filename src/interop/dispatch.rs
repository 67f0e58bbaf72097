//! Call Dispatcher
//!
//! Every host call into the runtime passes through here: arguments are
//! converted with `to_foreign`, the runtime selects the method from the
//! types of all arguments, and the result comes back through `to_host`.
//! The host never pre-resolves a method; operators are plain calls of the
//! operator's foreign function name.

use std::rc::Rc;

use jvbridge_runtime::{Engine, Value};
use smallvec::SmallVec;

use super::convert::{to_foreign, to_host};
use super::handle::ForeignHandle;
use crate::core::HostValue;
use crate::errors::{BridgeError, BridgeResult};
use crate::infrastructure::logging::{log_dispatch, log_dispatch_error};

/// Converted positional arguments; most calls take few
pub(crate) type ForeignArgs = SmallVec<[Value; 4]>;

/// Host operators and the foreign functions they forward to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    MatMul,
    BitOr,
    BitAnd,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `item in container`; operands are `[container, item]`
    Contains,
    Neg,
    Pos,
    Abs,
    Invert,
    Hash,
}

impl Operator {
    pub const BINARY: [Operator; 20] = [
        Operator::Add,
        Operator::Sub,
        Operator::Mul,
        Operator::Div,
        Operator::FloorDiv,
        Operator::Mod,
        Operator::Pow,
        Operator::MatMul,
        Operator::BitOr,
        Operator::BitAnd,
        Operator::BitXor,
        Operator::Shl,
        Operator::Shr,
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Le,
        Operator::Gt,
        Operator::Ge,
        Operator::Contains,
    ];

    pub const UNARY: [Operator; 5] = [
        Operator::Neg,
        Operator::Pos,
        Operator::Abs,
        Operator::Invert,
        Operator::Hash,
    ];

    /// Name of the generic function the runtime resolves
    pub fn foreign_name(self) -> &'static str {
        match self {
            Operator::Add | Operator::Pos => "+",
            Operator::Sub | Operator::Neg => "-",
            Operator::Mul | Operator::MatMul => "*",
            Operator::Div => "/",
            Operator::FloorDiv => "fld",
            Operator::Mod => "mod",
            Operator::Pow => "^",
            Operator::BitOr => "|",
            Operator::BitAnd => "&",
            Operator::BitXor => "xor",
            Operator::Shl => "<<",
            Operator::Shr => ">>",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Contains => "in",
            Operator::Abs => "abs",
            Operator::Invert => "~",
            Operator::Hash => "hash",
        }
    }

    /// Host spelling of the operator
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add | Operator::Pos => "+",
            Operator::Sub | Operator::Neg => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::FloorDiv => "//",
            Operator::Mod => "%",
            Operator::Pow => "**",
            Operator::MatMul => "@",
            Operator::BitOr => "|",
            Operator::BitAnd => "&",
            Operator::BitXor => "^",
            Operator::Shl => "<<",
            Operator::Shr => ">>",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Contains => "in",
            Operator::Abs => "abs",
            Operator::Invert => "~",
            Operator::Hash => "hash",
        }
    }

    pub fn arity(self) -> usize {
        if Operator::UNARY.contains(&self) {
            1
        } else {
            2
        }
    }

    /// Operator from its host spelling; `-` and `+` depend on the arity
    pub fn from_symbol(symbol: &str, arity: usize) -> Option<Operator> {
        let table: &[Operator] = if arity == 1 {
            &Operator::UNARY
        } else {
            &Operator::BINARY
        };
        table.iter().copied().find(|op| op.symbol() == symbol)
    }
}

/// Raw foreign call; errors are classified but results stay foreign
pub(crate) fn call_foreign(engine: &Engine, f: &Value, args: &[Value]) -> BridgeResult<Value> {
    engine.call(f, args, &[]).map_err(|err| {
        let err = BridgeError::from(err);
        log_dispatch_error(&function_name(f), err.kind());
        err
    })
}

pub(crate) fn call_foreign_named(engine: &Engine, name: &str, args: &[Value]) -> BridgeResult<Value> {
    let f = engine.resolve(name)?;
    call_foreign(engine, &f, args)
}

fn function_name(f: &Value) -> String {
    match f {
        Value::Function(func) => func.name.clone(),
        other => other.type_of().to_string(),
    }
}

fn convert_args(engine: &Rc<Engine>, args: &[HostValue]) -> BridgeResult<ForeignArgs> {
    args.iter().map(|arg| to_foreign(engine, arg)).collect()
}

/// Call a foreign callable with host arguments
pub fn invoke(
    engine: &Rc<Engine>,
    callable: &Value,
    args: &[HostValue],
    kwargs: &[(String, HostValue)],
) -> BridgeResult<HostValue> {
    let foreign_args = convert_args(engine, args)?;
    let foreign_kwargs = kwargs
        .iter()
        .map(|(name, value)| Ok((name.clone(), to_foreign(engine, value)?)))
        .collect::<BridgeResult<Vec<_>>>()?;
    log_dispatch(&function_name(callable), foreign_args.len());

    let result = engine
        .call(callable, &foreign_args, &foreign_kwargs)
        .map_err(|err| {
            let err = BridgeError::from(err);
            log_dispatch_error(&function_name(callable), err.kind());
            err
        })?;
    Ok(to_host(engine, &result))
}

/// Call a function resolved by (possibly dotted) name at call time
pub fn invoke_named(
    engine: &Rc<Engine>,
    name: &str,
    args: &[HostValue],
    kwargs: &[(String, HostValue)],
) -> BridgeResult<HostValue> {
    let f = engine.resolve(name)?;
    invoke(engine, &f, args, kwargs)
}

/// Forward an operator to the runtime's generic function of the same name
pub fn operator(engine: &Rc<Engine>, op: Operator, operands: &[HostValue]) -> BridgeResult<HostValue> {
    if operands.len() != op.arity() {
        return Err(BridgeError::Dispatch {
            function: op.foreign_name().to_string(),
            message: format!(
                "operator `{}` takes {} operand(s), got {}",
                op.symbol(),
                op.arity(),
                operands.len()
            ),
        });
    }
    match (op, operands) {
        (Operator::Contains, [container, item]) => {
            invoke_named(engine, op.foreign_name(), &[item.clone(), container.clone()], &[])
        }
        _ => invoke_named(engine, op.foreign_name(), operands, &[]),
    }
}

/// `getproperty(x, :name)`, resolved when called
pub fn get_field(handle: &ForeignHandle, name: &str) -> BridgeResult<HostValue> {
    let engine = handle.engine();
    let args = [handle.value(), Value::symbol(name)];
    log_dispatch("getproperty", args.len());
    let result = call_foreign_named(engine, "getproperty", &args)?;
    Ok(to_host(engine, &result))
}

/// `setproperty!(x, :name, value)`; immutable targets fail with
/// `ImmutableFieldError`
pub fn set_field(handle: &ForeignHandle, name: &str, value: &HostValue) -> BridgeResult<()> {
    let engine = handle.engine();
    let args = [handle.value(), Value::symbol(name), to_foreign(engine, value)?];
    log_dispatch("setproperty!", args.len());
    call_foreign_named(engine, "setproperty!", &args)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_round_trip() {
        for op in Operator::BINARY.into_iter().chain(Operator::UNARY) {
            assert_eq!(Operator::from_symbol(op.symbol(), op.arity()), Some(op));
        }
        assert_eq!(Operator::from_symbol("-", 1), Some(Operator::Neg));
        assert_eq!(Operator::from_symbol("-", 2), Some(Operator::Sub));
        assert_eq!(Operator::from_symbol("<>", 2), None);
    }

    #[test]
    fn test_operator_checks_arity() {
        let engine = Rc::new(Engine::new());
        let err = operator(&engine, Operator::Add, &[HostValue::from(1)]).unwrap_err();
        assert_eq!(err.kind(), "DispatchError");
    }

    #[test]
    fn test_runtime_selects_the_method() {
        let engine = Rc::new(Engine::new());
        let sum = operator(&engine, Operator::Add, &[1.into(), 2.into()]).unwrap();
        assert_eq!(sum, HostValue::from(3));
        let ratio = operator(&engine, Operator::Div, &[1.into(), 2.into()]).unwrap();
        assert_eq!(ratio, HostValue::Float(0.5));
        let floor = operator(&engine, Operator::FloorDiv, &[(-7).into(), 2.into()]).unwrap();
        assert_eq!(floor, HostValue::from(-4));
        let modulo = operator(&engine, Operator::Mod, &[(-7).into(), 2.into()]).unwrap();
        assert_eq!(modulo, HostValue::from(1));
    }

    #[test]
    fn test_contains_swaps_operands() {
        let engine = Rc::new(Engine::new());
        let list = HostValue::List(vec![1.into(), 2.into()]);
        let found = operator(&engine, Operator::Contains, &[list, 2.into()]).unwrap();
        assert_eq!(found, HostValue::Bool(true));
    }

    #[test]
    fn test_keywords_are_forwarded() {
        let engine = Rc::new(Engine::new());
        let rounded = invoke_named(
            &engine,
            "round",
            &[HostValue::Float(3.14159)],
            &[("digits".to_string(), 2.into())],
        )
        .unwrap();
        assert_eq!(rounded, HostValue::Float(3.14));
    }

    #[test]
    fn test_no_method_is_dispatch_error() {
        let engine = Rc::new(Engine::new());
        let err = invoke_named(&engine, "length", &[1.into()], &[]).unwrap_err();
        assert!(matches!(err, BridgeError::Dispatch { ref function, .. } if function == "length"));
    }
}
