//! Text builtins
//!
//! Strings are immutable UTF-8 shared behind `Rc<str>`; every operation
//! here builds a new one.

use crate::error::{RuntimeError, RuntimeResult};
use crate::interop::Engine;
use crate::objects::{Kwargs, Type, Value};

use super::convert::convert_value;
use super::iter::collect_values;
use super::print;

/// Print forms of all values joined without a separator
pub(crate) fn concat(values: &[Value]) -> RuntimeResult<Value> {
    let text: String = values.iter().map(print::string).collect();
    Ok(Value::str(&text))
}

/// `s ^ n`
pub(crate) fn repeat(s: &str, count: &Value) -> RuntimeResult<Value> {
    match count {
        Value::Bool(_) => Err(RuntimeError::method("repeat", &[Value::str(s), count.clone()])),
        other => match other.as_i64() {
            Some(n) if n >= 0 => Ok(Value::str(&s.repeat(n as usize))),
            Some(n) => Err(RuntimeError::Argument(format!(
                "can't repeat a string {n} times"
            ))),
            None => Err(RuntimeError::method("repeat", &[Value::str(s), count.clone()])),
        },
    }
}

fn text_arg<'a>(name: &str, args: &'a [Value], position: usize) -> RuntimeResult<&'a str> {
    args.get(position)
        .and_then(Value::as_str)
        .ok_or_else(|| RuntimeError::method(name, args))
}

pub(super) fn string(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    concat(args)
}

pub(super) fn repr(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [value] => Ok(Value::str(&print::repr(value))),
        _ => Err(RuntimeError::method("repr", args)),
    }
}

pub(super) fn print(engine: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let text: String = args.iter().map(print::string).collect();
    engine.write_output(&text);
    Ok(Value::Nothing)
}

pub(super) fn println(engine: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let mut text: String = args.iter().map(print::string).collect();
    text.push('\n');
    engine.write_output(&text);
    Ok(Value::Nothing)
}

pub(super) fn uppercase(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [Value::Str(s)] => Ok(Value::str(&s.to_uppercase())),
        _ => Err(RuntimeError::method("uppercase", args)),
    }
}

pub(super) fn lowercase(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    match args {
        [Value::Str(s)] => Ok(Value::str(&s.to_lowercase())),
        _ => Err(RuntimeError::method("lowercase", args)),
    }
}

/// `join(items[, delim[, last]])`
pub(super) fn join(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let (items, delim, last) = match args {
        [items] => (items, "", None),
        [items, _] => (items, text_arg("join", args, 1)?, None),
        [items, _, _] => (items, text_arg("join", args, 1)?, Some(text_arg("join", args, 2)?)),
        _ => return Err(RuntimeError::method("join", args)),
    };
    let parts: Vec<String> = collect_values(items)?.iter().map(print::string).collect();
    let text = match (last, parts.split_last()) {
        (Some(last), Some((final_part, init))) if !init.is_empty() => {
            format!("{}{last}{final_part}", init.join(delim))
        }
        _ => parts.join(delim),
    };
    Ok(Value::str(&text))
}

pub(super) fn startswith(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let (s, prefix) = (text_arg("startswith", args, 0)?, text_arg("startswith", args, 1)?);
    Ok(Value::Bool(args.len() == 2 && s.starts_with(prefix)))
}

pub(super) fn endswith(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let (s, suffix) = (text_arg("endswith", args, 0)?, text_arg("endswith", args, 1)?);
    Ok(Value::Bool(args.len() == 2 && s.ends_with(suffix)))
}

/// `occursin(needle, haystack)`
pub(super) fn occursin(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let (needle, haystack) = (text_arg("occursin", args, 0)?, text_arg("occursin", args, 1)?);
    Ok(Value::Bool(haystack.contains(needle)))
}

/// `split(s[, delim])`; without a delimiter splits on whitespace runs
pub(super) fn split(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let s = text_arg("split", args, 0)?;
    let parts: Vec<Value> = match args.len() {
        1 => s.split_whitespace().map(Value::str).collect(),
        2 => s.split(text_arg("split", args, 1)?).map(Value::str).collect(),
        _ => return Err(RuntimeError::method("split", args)),
    };
    Value::vector(&Type::String, &parts)
}

/// `parse(T, s)` for integer, float and bool types
pub(super) fn parse(_: &Engine, args: &[Value], _: &Kwargs) -> RuntimeResult<Value> {
    let [Value::Type(target), Value::Str(s)] = args else {
        return Err(RuntimeError::method("parse", args));
    };
    let text = s.trim();
    let invalid = || RuntimeError::Argument(format!("invalid base 10 digit in {}", print::repr(&args[1])));
    let parsed = match target {
        Type::Bool => match text {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(invalid()),
        },
        Type::Float32 | Type::Float64 => {
            let x: f64 = text.parse().map_err(|_| {
                RuntimeError::Argument(format!("cannot parse {} as {target}", print::repr(&args[1])))
            })?;
            Value::Float64(x)
        }
        ty if super::operations::IntKind::of(ty).is_some() => {
            let v: i128 = text.replace('_', "").parse().map_err(|_| invalid())?;
            let kind = super::operations::IntKind::of(ty).ok_or_else(invalid)?;
            if v < kind.min() || v > kind.max() {
                return Err(RuntimeError::Argument(format!(
                    "overflow parsing {}",
                    print::repr(&args[1])
                )));
            }
            return Ok(kind.value(v));
        }
        _ => return Err(RuntimeError::method("parse", args)),
    };
    convert_value(target, &parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_uses_print_forms() {
        let joined = concat(&[Value::str("a"), Value::Int64(1), Value::UInt8(2)]).unwrap();
        assert_eq!(joined.as_str(), Some("a12"));
    }

    #[test]
    fn test_repeat() {
        assert_eq!(repeat("ab", &Value::Int64(3)).unwrap().as_str(), Some("ababab"));
        assert_eq!(repeat("ab", &Value::Int64(-1)).unwrap_err().kind(), "ArgumentError");
    }
}
