use proptest::prelude::*;

use super::ast::Expr;
use super::*;
use crate::objects::Value;

fn single(source: &str) -> Expr {
    let mut program = parse(source).unwrap();
    assert_eq!(program.len(), 1, "expected one statement in {source:?}");
    program.remove(0)
}

fn call_name(expr: &Expr) -> &str {
    match expr {
        Expr::Call { callee, .. } => match callee.as_ref() {
            Expr::Ident(name) => name,
            other => panic!("callee is not a name: {other:?}"),
        },
        other => panic!("not a call: {other:?}"),
    }
}

fn call_args(expr: &Expr) -> &[Expr] {
    match expr {
        Expr::Call { args, .. } => args,
        other => panic!("not a call: {other:?}"),
    }
}

#[test]
fn test_precedence() {
    let expr = single("1 + 2 * 3");
    assert_eq!(call_name(&expr), "+");
    assert_eq!(call_name(&call_args(&expr)[1]), "*");

    // `^` binds tighter than unary minus and is right associative
    let expr = single("-2^3^2");
    assert_eq!(call_name(&expr), "-");
    let power = &call_args(&expr)[0];
    assert_eq!(call_name(power), "^");
    assert_eq!(call_name(&call_args(power)[1]), "^");

    let expr = single("1 << 2 * 3");
    assert_eq!(call_name(&expr), "*");
}

#[test]
fn test_sum_and_product_chains_are_flat() {
    let expr = single("a + b + c + d");
    assert_eq!(call_name(&expr), "+");
    assert_eq!(call_args(&expr).len(), 4);

    let expr = single("(a + b) + c");
    assert_eq!(call_args(&expr).len(), 2);

    let expr = single("a + b - c");
    assert_eq!(call_name(&expr), "-");
    assert_eq!(call_args(&call_args(&expr)[0]).len(), 2);

    let expr = single("a * b * c");
    assert_eq!(call_args(&expr).len(), 3);
}

#[test]
fn test_nesting_limit() {
    let nested = |depth: usize| format!("{}x{}", "[".repeat(depth), "]".repeat(depth));
    assert!(parse(&nested(parser::MAX_PARSE_DEPTH - 1)).is_ok());
    let err = parse(&nested(parser::MAX_PARSE_DEPTH + 1)).unwrap_err();
    assert!(err.message.contains("nested deeper"), "{}", err.message);
}

#[test]
fn test_numeric_juxtaposition() {
    let expr = single("2x + 1");
    assert_eq!(call_name(&expr), "+");
    assert_eq!(call_name(&call_args(&expr)[0]), "*");

    let expr = single("3(a + b)");
    assert_eq!(call_name(&expr), "*");
}

#[test]
fn test_comparison_chain() {
    match &single("1 < x <= 3") {
        Expr::Comparison { operands, ops } => {
            assert_eq!(operands.len(), 3);
            assert_eq!(*ops, vec!["<", "<="]);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(call_name(&single("x in xs")), "in");
    assert_eq!(call_name(&single("x isa Int")), "isa");
}

#[test]
fn test_range_and_ternary_colons() {
    assert_eq!(call_name(&single("1:10")), ":");
    assert_eq!(call_args(&single("1:2:10")).len(), 3);
    match &single("c ? a : b") {
        Expr::If {
            branches,
            otherwise,
        } => {
            assert_eq!(branches.len(), 1);
            assert!(otherwise.is_some());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_calls_with_keywords_and_splat() {
    match &single("f(a, xs...; sep = \", \")") {
        Expr::Call { args, kwargs, .. } => {
            assert_eq!(args.len(), 2);
            assert!(matches!(args[1], Expr::Splat(_)));
            assert_eq!(kwargs.len(), 1);
            assert_eq!(kwargs[0].0, "sep");
        }
        other => panic!("unexpected {other:?}"),
    }
    match &single("f(x, base = 2)") {
        Expr::Call { args, kwargs, .. } => {
            assert_eq!(args.len(), 1);
            assert_eq!(kwargs[0].0, "base");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_spaced_paren_is_not_a_call() {
    assert!(parse("f (x)").is_err());
    assert!(matches!(single("f(x)"), Expr::Call { .. }));
}

#[test]
fn test_indexing_end_and_colon() {
    match &single("A[end, :]") {
        Expr::Index { indices, .. } => {
            assert!(matches!(indices[0], Expr::End));
            assert!(matches!(indices[1], Expr::Colon));
        }
        other => panic!("unexpected {other:?}"),
    }
    match &single("xs[2:end-1]") {
        Expr::Index { indices, .. } => assert_eq!(call_name(&indices[0]), ":"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(parse("end").is_err());
}

#[test]
fn test_field_curly_and_type_assert() {
    match &single("Base.length") {
        Expr::Field { name, .. } => assert_eq!(name, "length"),
        other => panic!("unexpected {other:?}"),
    }
    match &single("Vector{Int64}(undef, 3)") {
        Expr::Call { callee, args, .. } => {
            assert!(matches!(**callee, Expr::Curly { .. }));
            assert_eq!(args.len(), 2);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(single("x::Int"), Expr::TypeAssert { .. }));
}

#[test]
fn test_assignments() {
    match &single("a, b = b, a") {
        Expr::Assign { target, value } => {
            assert!(matches!(**target, Expr::Tuple(ref items) if items.len() == 2));
            assert!(matches!(**value, Expr::Tuple(ref items) if items.len() == 2));
        }
        other => panic!("unexpected {other:?}"),
    }
    match &single("x += 1") {
        Expr::Assign { value, .. } => assert_eq!(call_name(value), "+"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(single("xs[1] = 2"), Expr::Assign { .. }));
    assert!(parse("1 = 2").is_err());
}

#[test]
fn test_function_forms() {
    match &single("f(x::Int, y) = x + y") {
        Expr::FunctionDef { name, params, body } => {
            assert_eq!(name, "f");
            assert_eq!(params.len(), 2);
            assert!(params[0].ty.is_some());
            assert!(params[1].ty.is_none());
            assert_eq!(body.len(), 1);
        }
        other => panic!("unexpected {other:?}"),
    }
    match &single("function g(n)\n  n < 2 && return n\n  g(n - 1)\nend") {
        Expr::FunctionDef { body, .. } => assert_eq!(body.len(), 2),
        other => panic!("unexpected {other:?}"),
    }
    match &single("(x, y) -> x * y") {
        Expr::Lambda { params, .. } => assert_eq!(params.len(), 2),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(single("function (x)\n x\nend"), Expr::Lambda { .. }));
    assert!(matches!(single("() -> 1"), Expr::Lambda { ref params, .. } if params.is_empty()));
}

#[test]
fn test_control_flow() {
    let source = "if x > 0\n  1\nelseif x < 0\n  -1\nelse\n  0\nend";
    match &single(source) {
        Expr::If {
            branches,
            otherwise,
        } => {
            assert_eq!(branches.len(), 2);
            assert_eq!(otherwise.as_ref().map(|body| body.len()), Some(1));
        }
        other => panic!("unexpected {other:?}"),
    }
    match &single("for (k, v) in d\n  println(k)\nend") {
        Expr::For { var, body, .. } => {
            assert!(matches!(**var, Expr::Tuple(_)));
            assert_eq!(body.len(), 1);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(single("for i = 1:3; end"), Expr::For { .. }));
    assert!(matches!(
        single("while true\n break\nend"),
        Expr::While { .. }
    ));
    assert!(parse("while true\n x = 1").is_err());
}

#[test]
fn test_struct_and_declarations() {
    match &single("mutable struct Point\n  x::Float64\n  y\nend") {
        Expr::StructDef {
            name,
            mutable,
            fields,
        } => {
            assert_eq!(name, "Point");
            assert!(*mutable);
            assert_eq!(fields.len(), 2);
        }
        other => panic!("unexpected {other:?}"),
    }
    match &single("global counter = 0") {
        Expr::Block(items) => {
            assert!(matches!(items[0], Expr::Global(ref names) if names == &["counter"]));
            assert!(matches!(items[1], Expr::Assign { .. }));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(single("const N = 3"), Expr::Const(_)));
    assert!(parse("const N").is_err());
}

#[test]
fn test_collections() {
    assert!(matches!(single("[]"), Expr::Vector(ref items) if items.is_empty()));
    assert!(matches!(single("[1, 2, 3,]"), Expr::Vector(ref items) if items.len() == 3));
    assert!(matches!(single("()"), Expr::Tuple(ref items) if items.is_empty()));
    assert!(matches!(single("(1,)"), Expr::Tuple(ref items) if items.len() == 1));
    assert!(matches!(single("(1)"), Expr::Literal(_)));
    match &single("[x^2 for x in 1:10 if isodd(x)]") {
        Expr::Comprehension { filter, .. } => assert!(filter.is_some()),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(call_name(&single("\"a\" => 1")), "=>");
    assert!(parse("[1 2; 3 4]").is_err());
}

#[test]
fn test_multiline_inside_brackets() {
    let program = parse("xs = [\n  1,\n  2,\n]\nf(a,\n  b)").unwrap();
    assert_eq!(program.len(), 2);
    let program = parse("y = 1 +\n  2").unwrap();
    assert_eq!(program.len(), 1);
}

#[test]
fn test_string_interpolation() {
    match &single("\"x = $x, sum = $(a + b)\"") {
        Expr::Interpolate(parts) => {
            assert_eq!(parts.len(), 4);
            assert!(matches!(parts[1], Expr::Ident(ref name) if name == "x"));
            assert_eq!(call_name(&parts[3]), "+");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(single("\"plain\""), Expr::Literal(_)));
}

#[test]
fn test_error_positions() {
    let err = parse("x = 1\ny = (2 +").unwrap_err();
    assert_eq!(err.line, 2);
    assert!(err.message.contains("end of input"), "{}", err.message);

    let err = parse("f(x) = \ng(").unwrap_err();
    assert_eq!(err.line, 2);

    let converted: RuntimeError = parse(")").unwrap_err().into();
    assert_eq!(converted.kind(), "ParseError");
}

proptest! {
    #[test]
    fn prop_integer_literals(n in 0..i64::MAX) {
        let expr = single(&n.to_string());
        prop_assert!(matches!(expr, Expr::Literal(Value::Int64(v)) if v == n));
    }

    #[test]
    fn prop_sum_chains_stay_flat(len in 2usize..64) {
        let source = vec!["x"; len].join(" + ");
        prop_assert_eq!(call_args(&single(&source)).len(), len);
    }
}
