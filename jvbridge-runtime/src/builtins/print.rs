//! Text forms of values
//!
//! Design: Three renderings, matching what user code sees:
//! - `repr` is the parseable form (`"a"`, `Int8[1, 2]`, `Dict{Any, Any}()`)
//! - `string` is the print form (strings unquoted, everything else `repr`)
//! - `display` is the multi-line `text/plain` form used by `display`

use crate::objects::{format_dims, ArrayObj, Type, Value};

use super::iter::collect_values;

/// Julia float formatting: shortest round-trip digits, with an exponent
/// outside `[1e-4, 1e6)`
pub fn format_f64(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "Inf" } else { "-Inf" }.to_string();
    }
    let magnitude = x.abs();
    if magnitude == 0.0 || (1e-4..1e6).contains(&magnitude) {
        format!("{x:?}")
    } else {
        exponent_form(&format!("{x:e}"), "e")
    }
}

pub fn format_f32(x: f32) -> String {
    if x.is_nan() {
        return "NaN32".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "Inf32" } else { "-Inf32" }.to_string();
    }
    let magnitude = x.abs();
    if magnitude == 0.0 || (1e-4..1e6).contains(&magnitude) {
        format!("{x:?}f0")
    } else {
        exponent_form(&format!("{x:e}"), "f")
    }
}

/// Rewrite Rust's `1e-7` as `1.0e-7` with the given exponent marker
fn exponent_form(text: &str, marker: &str) -> String {
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let mantissa = if mantissa.contains('.') {
                mantissa.to_string()
            } else {
                format!("{mantissa}.0")
            };
            format!("{mantissa}{marker}{exponent}")
        }
        None => text.to_string(),
    }
}

fn format_complex(re: String, im: f64, im_text: impl Fn(f64) -> String) -> String {
    if im.is_sign_negative() && !im.is_nan() {
        format!("{re} - {}im", im_text(-im))
    } else {
        format!("{re} + {}im", im_text(im))
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '$' => out.push_str("\\$"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Parseable representation
pub fn repr(value: &Value) -> String {
    match value {
        Value::Nothing => "nothing".to_string(),
        Value::Missing => "missing".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int8(v) => v.to_string(),
        Value::Int16(v) => v.to_string(),
        Value::Int32(v) => v.to_string(),
        Value::Int64(v) => v.to_string(),
        Value::UInt8(v) => format!("0x{v:02x}"),
        Value::UInt16(v) => format!("0x{v:04x}"),
        Value::UInt32(v) => format!("0x{v:08x}"),
        Value::UInt64(v) => format!("0x{v:016x}"),
        Value::Float32(x) => format_f32(*x),
        Value::Float64(x) => format_f64(*x),
        Value::ComplexF32(z) => format_complex(format_f32(z.re), z.im.into(), |im| format_f32(im as f32)),
        Value::ComplexF64(z) => format_complex(format_f64(z.re), z.im, format_f64),
        Value::Irrational(c) => c.symbol().to_string(),
        Value::Str(s) => escape(s),
        Value::Symbol(s) => format!(":{s}"),
        Value::Tuple(items) => {
            let parts: Vec<String> = items.iter().map(repr).collect();
            if parts.len() == 1 {
                format!("({},)", parts[0])
            } else {
                format!("({})", parts.join(", "))
            }
        }
        Value::Pair(p) => format!("{} => {}", repr(&p.0), repr(&p.1)),
        Value::Array(array) => repr_array(array),
        Value::BitVector(bits) => {
            let parts: Vec<&str> = bits.borrow().iter().map(|b| if *b { "1" } else { "0" }).collect();
            format!("Bool[{}]", parts.join(", "))
        }
        Value::Range(start, stop) => format!("{start}:{stop}"),
        Value::Dict(dict) => {
            let entries = dict.entries();
            let head = if entries.is_empty() || !dict.key_type.is_concrete() || !dict.value_type.is_concrete() {
                value.type_of().to_string()
            } else {
                "Dict".to_string()
            };
            let parts: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{} => {}", repr(k), repr(v)))
                .collect();
            format!("{head}({})", parts.join(", "))
        }
        Value::Struct(obj) => {
            let parts: Vec<String> = obj.field_values().iter().map(repr).collect();
            format!("{}({})", obj.def.name, parts.join(", "))
        }
        Value::Function(f) => f.name.clone(),
        Value::Type(t) => t.to_string(),
        Value::Module(m) => m.path.clone(),
    }
}

/// Print form: strings and symbols unquoted, numbers in decimal
pub fn string(value: &Value) -> String {
    match value {
        Value::Str(s) => s.to_string(),
        Value::Symbol(s) => s.to_string(),
        Value::UInt8(v) => v.to_string(),
        Value::UInt16(v) => v.to_string(),
        Value::UInt32(v) => v.to_string(),
        Value::UInt64(v) => v.to_string(),
        other => repr(other),
    }
}

/// Whether `[..]` needs an element type prefix to read back the same type
fn needs_prefix(elem: &Type) -> bool {
    !matches!(elem, Type::Int64 | Type::Float64 | Type::String | Type::Array(..))
}

/// Element inside a container whose type is already stated
fn repr_element(elem: &Type, value: &Value) -> String {
    match (elem, value) {
        (Type::Float32, Value::Float32(x)) => format_f32(*x).trim_end_matches("f0").to_string(),
        (Type::Bool, Value::Bool(b)) => if *b { "1" } else { "0" }.to_string(),
        _ => repr(value),
    }
}

fn repr_array(array: &ArrayObj) -> String {
    let elem = array.elem_type();
    let dims = array.dims();
    let values = array.to_values();
    let prefix = if values.is_empty() || needs_prefix(&elem) {
        elem.to_string()
    } else {
        String::new()
    };
    match dims.as_slice() {
        [_] => {
            let parts: Vec<String> = values.iter().map(|v| repr_element(&elem, v)).collect();
            format!("{prefix}[{}]", parts.join(", "))
        }
        [rows, cols] if *rows > 0 && *cols > 0 => {
            let lines: Vec<String> = (0..*rows)
                .map(|r| {
                    (0..*cols)
                        .map(|c| repr_element(&elem, &values[c * rows + r]))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect();
            format!("{prefix}[{}]", lines.join("; "))
        }
        _ => {
            let flat: Vec<String> = values.iter().map(|v| repr_element(&elem, v)).collect();
            let dims: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
            format!("reshape({}[{}], {})", elem, flat.join(", "), dims.join(", "))
        }
    }
}

/// `text/plain` rendering used by `display`
pub fn display(value: &Value) -> String {
    match value {
        Value::Array(array) => {
            let elem = array.elem_type();
            let header = match array.dims().as_slice() {
                [n] => format!("{n}-element {}", value.type_of()),
                dims => format!("{} {}", format_dims(dims), value.type_of()),
            };
            list_body(header, &elem, &array.to_values())
        }
        Value::BitVector(_) | Value::Range(..) => {
            let items = collect_values(value).unwrap_or_default();
            let elem = if matches!(value, Value::BitVector(_)) {
                Type::Bool
            } else {
                Type::Int64
            };
            list_body(format!("{}-element {}", items.len(), value.type_of()), &elem, &items)
        }
        Value::Dict(dict) => {
            let entries = dict.entries();
            let noun = if entries.len() == 1 { "entry" } else { "entries" };
            let header = format!("{} with {} {noun}", value.type_of(), entries.len());
            if entries.is_empty() {
                return header;
            }
            let body: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("  {} => {}", repr(k), repr(v)))
                .collect();
            format!("{header}:\n{}", body.join("\n"))
        }
        other => repr(other),
    }
}

fn list_body(header: String, elem: &Type, items: &[Value]) -> String {
    if items.is_empty() {
        return header;
    }
    let body: Vec<String> = items
        .iter()
        .map(|v| format!(" {}", repr_element(elem, v)))
        .collect();
    format!("{header}:\n{}", body.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{Buffer, Complex, DictObj};
    use std::rc::Rc;

    #[test]
    fn test_float_formatting() {
        assert_eq!(format_f64(1.0), "1.0");
        assert_eq!(format_f64(0.1), "0.1");
        assert_eq!(format_f64(1e-7), "1.0e-7");
        assert_eq!(format_f64(1.5e20), "1.5e20");
        assert_eq!(format_f32(1.5), "1.5f0");
        assert_eq!(format_f32(2.0), "2.0f0");
        assert_eq!(format_f64(1e6), "1.0e6");
        assert_eq!(format_f64(123456.0), "123456.0");
    }

    #[test]
    fn test_repr_scalars() {
        assert_eq!(repr(&Value::UInt8(1)), "0x01");
        assert_eq!(string(&Value::UInt8(1)), "1");
        assert_eq!(repr(&Value::str("a\"b")), "\"a\\\"b\"");
        assert_eq!(repr(&Value::ComplexF64(Complex::new(1.0, -2.0))), "1.0 - 2.0im");
        assert_eq!(repr(&Value::tuple(vec![Value::Int64(1)])), "(1,)");
    }

    #[test]
    fn test_repr_vectors() {
        let strings = Value::vector(&Type::String, &[Value::str("1")]).unwrap();
        assert_eq!(repr(&strings), "[\"1\"]");
        let empty = Value::vector(&Type::String, &[]).unwrap();
        assert_eq!(repr(&empty), "String[]");
        let bytes = Value::vector(&Type::Int8, &[Value::Int64(1), Value::Int64(2)]).unwrap();
        assert_eq!(repr(&bytes), "Int8[1, 2]");
        let any = Value::vector(&Type::Any, &[Value::Int64(1), Value::str("2")]).unwrap();
        assert_eq!(repr(&any), "Any[1, \"2\"]");
    }

    #[test]
    fn test_repr_matrix_is_column_major() {
        let array = ArrayObj::vector(Buffer::Int64(vec![1, 2, 3, 4]));
        let matrix = array.reshape(vec![2, 2]).unwrap();
        assert_eq!(repr(&Value::Array(Rc::new(matrix))), "[1 3; 2 4]");
    }

    #[test]
    fn test_repr_dict() {
        let dict = DictObj::new(Type::Any, Type::Any);
        assert_eq!(repr(&Value::Dict(Rc::new(dict))), "Dict{Any, Any}()");
        let typed = DictObj::new(Type::String, Type::Int64);
        typed.insert(&Value::str("a"), &Value::Int64(1)).unwrap();
        assert_eq!(repr(&Value::Dict(Rc::new(typed))), "Dict(\"a\" => 1)");
    }
}
