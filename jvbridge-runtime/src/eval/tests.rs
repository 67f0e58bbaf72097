//! Interpreter tests, run end to end through an `Engine`

use crate::error::RuntimeError;
use crate::interop::{Engine, MAX_CALL_DEPTH};

fn repr_of(source: &str) -> String {
    let engine = Engine::new();
    let value = engine.eval(source).unwrap();
    engine.repr(&value)
}

fn error_of(source: &str) -> RuntimeError {
    Engine::new().eval(source).unwrap_err()
}

#[test]
fn test_arithmetic_and_precedence() {
    assert_eq!(repr_of("1 + 2 * 3"), "7");
    assert_eq!(repr_of("2^10"), "1024");
    assert_eq!(repr_of("7 / 2"), "3.5");
    assert_eq!(repr_of("x = 3; 2x + 1"), "7");
    assert_eq!(repr_of("+(1, 2, 3)"), "6");
    assert_eq!(repr_of("-(5)"), "-5");
}

#[test]
fn test_multiple_dispatch_picks_most_specific() {
    let source = r#"
        f(x::Int) = "int"
        f(x::String) = "string"
        f(x::Number) = "number"
        f(x) = "any"
        (f(1), f("a"), f(1.5), f(nothing))
    "#;
    assert_eq!(repr_of(source), r#"("int", "string", "number", "any")"#);
}

#[test]
fn test_redefining_a_method_replaces_it() {
    let engine = Engine::new();
    engine.eval("g(x) = 1").unwrap();
    engine.eval("g(x) = 2").unwrap();
    let value = engine.eval("(g(0), methodcount(g))").unwrap();
    assert_eq!(engine.repr(&value), "(2, 1)");
}

#[test]
fn test_recursion_and_early_return() {
    let source = "
        function fib(n)
            n < 2 && return n
            fib(n - 1) + fib(n - 2)
        end
        fib(15)
    ";
    assert_eq!(repr_of(source), "610");
}

#[test]
fn test_closures_capture_their_scope() {
    let source = "
        function counter()
            n = 0
            () -> (n += 1)
        end
        c = counter()
        c(); c()
    ";
    assert_eq!(repr_of(source), "2");
}

#[test]
fn test_top_level_loop_updates_globals() {
    let engine = Engine::new();
    let value = engine
        .eval("total = 0\nfor i in 1:4\n  total += i\n  tmp = i\nend\ntotal")
        .unwrap();
    assert_eq!(engine.repr(&value), "10");
    // loop variables and new names stay local to the loop
    assert!(!engine.main().contains("i"));
    assert!(!engine.main().contains("tmp"));
}

#[test]
fn test_global_declaration_inside_function() {
    let source = "
        count = 0
        function bump()
            global count
            count += 1
        end
        bump(); bump(); count
    ";
    assert_eq!(repr_of(source), "2");
}

#[test]
fn test_function_locals_do_not_leak() {
    let engine = Engine::new();
    engine.eval("function h()\n  inner = 5\n  inner * 2\nend").unwrap();
    assert_eq!(engine.repr(&engine.eval("h()").unwrap()), "10");
    assert!(matches!(
        engine.eval("inner").unwrap_err(),
        RuntimeError::UndefVar { .. }
    ));
}

#[test]
fn test_while_break_continue() {
    let source = "
        s = 0
        i = 0
        while true
            i += 1
            i > 10 && break
            iseven(i) && continue
            s += i
        end
        s
    ";
    assert_eq!(repr_of(source), "25");
}

#[test]
fn test_comprehension_and_higher_order_builtins() {
    assert_eq!(repr_of("[x^2 for x in 1:5 if isodd(x)]"), "[1, 9, 25]");
    assert_eq!(repr_of("map(x -> x * 2, [1, 2, 3])"), "[2, 4, 6]");
    assert_eq!(repr_of("filter(iseven, 1:6)"), "[2, 4, 6]");
    assert_eq!(repr_of("[(k, v) for (k, v) in [(1, 2), (3, 4)]]"), "[(1, 2), (3, 4)]");
}

#[test]
fn test_end_inside_indexing() {
    assert_eq!(repr_of("v = [10, 20, 30]\n(v[end], v[end - 1])"), "(30, 20)");
    assert_eq!(
        repr_of("A = reshape(collect(1:6), 2, 3)\n(A[end, 1], A[2, end])"),
        "(2, 6)"
    );
    assert!(matches!(
        error_of("[1, 2][3]"),
        RuntimeError::Bounds { .. }
    ));
}

#[test]
fn test_structs() {
    let engine = Engine::new();
    engine
        .eval("struct Point\n  x::Int\n  y::Int\nend\np = Point(1, 2)")
        .unwrap();
    assert_eq!(engine.repr(&engine.eval("p.x + p.y").unwrap()), "3");
    assert!(matches!(
        engine.eval("p.x = 5").unwrap_err(),
        RuntimeError::ImmutableField { .. }
    ));

    // identical redefinition is accepted, a different layout is not
    engine.eval("struct Point\n  x::Int\n  y::Int\nend").unwrap();
    assert!(matches!(
        engine.eval("struct Point\n  x::Float64\nend").unwrap_err(),
        RuntimeError::Redefinition(_)
    ));
}

#[test]
fn test_mutable_struct_fields() {
    let source = "
        mutable struct Counter
            n::Int
        end
        c = Counter(0)
        c.n += 1
        c.n += 1
        c
    ";
    assert_eq!(repr_of(source), "Counter(2)");
}

#[test]
fn test_destructuring_assignment() {
    assert_eq!(repr_of("a, b = 1, 2\na, b = b, a\n(a, b)"), "(2, 1)");
    assert!(matches!(
        error_of("a, b, c = (1, 2)"),
        RuntimeError::Bounds { .. }
    ));
}

#[test]
fn test_string_interpolation() {
    assert_eq!(
        repr_of("name = \"world\"\n\"hello $name, $(1 + 1)\""),
        "\"hello world, 2\""
    );
}

#[test]
fn test_typed_literals_and_type_application() {
    assert_eq!(repr_of("Int32[1, 2]"), "Int32[1, 2]");
    assert_eq!(repr_of("Vector{Float64}()"), "Float64[]");
    assert_eq!(repr_of("Dict{String, Int}()"), "Dict{String, Int64}()");
    assert_eq!(repr_of("Tuple{Int, String}"), "Tuple{Int64, String}");
    assert_eq!(repr_of("Complex{Float32}"), "ComplexF32");
    assert!(error_of("Vector{1}").to_string().contains("invalid type application"));
}

#[test]
fn test_composite_dict_keys() {
    let source = "
        d = Dict()
        d[1, 2] = \"x\"
        (d[1, 2], haskey(d, (1, 2)))
    ";
    assert_eq!(repr_of(source), "(\"x\", true)");
}

#[test]
fn test_conditions_must_be_boolean() {
    assert!(matches!(
        error_of("if 1\n  2\nend"),
        RuntimeError::TypeMismatch { .. }
    ));
    assert!(matches!(
        error_of("1 && true"),
        RuntimeError::TypeMismatch { .. }
    ));
    assert_eq!(repr_of("x = 5\n(1 < x <= 5, x > 3 ? \"big\" : \"small\")"), "(true, \"big\")");
    assert_eq!(repr_of("3 < 2 < error(\"unreached\")"), "false");
}

#[test]
fn test_type_assertions() {
    assert_eq!(repr_of("(1 + 1)::Int"), "2");
    assert!(matches!(
        error_of("1.5::Int"),
        RuntimeError::TypeMismatch { .. }
    ));
}

#[test]
fn test_errors_surface_as_runtime_errors() {
    assert!(matches!(error_of("undefined_name"), RuntimeError::UndefVar { .. }));
    assert!(matches!(
        error_of("k(x::Int) = x\nk(\"a\")"),
        RuntimeError::Method { .. }
    ));
    assert!(matches!(error_of("error(\"boom \", 1)"), RuntimeError::Error(msg) if msg == "boom 1"));
    assert!(error_of("break").to_string().contains("outside loop"));
    assert!(matches!(error_of("f(x) = x\nf(1; k = 2)"), RuntimeError::Method { .. }));
}

#[test]
fn test_unbounded_recursion_is_caught() {
    let err = error_of("g(n) = g(n + 1)\ng(1)");
    assert!(err.to_string().contains("StackOverflowError"), "{err}");
}

#[test]
fn test_non_tail_recursion_up_to_the_call_limit() {
    let engine = Engine::new();
    engine.eval("f(n) = n == 0 ? 0 : 1 + f(n - 1)").unwrap();
    let deepest = MAX_CALL_DEPTH - 1;
    let value = engine.eval(&format!("f({deepest})")).unwrap();
    assert_eq!(engine.repr(&value), deepest.to_string());

    let err = engine.eval(&format!("f({})", MAX_CALL_DEPTH + 50)).unwrap_err();
    assert!(err.to_string().contains("StackOverflowError"), "{err}");
}

#[test]
fn test_long_operator_chains() {
    assert_eq!(repr_of(&vec!["1"; 5000].join(" + ")), "5000");
    assert_eq!(repr_of(&vec!["1"; 5000].join(" - ")), "-4998");
    assert_eq!(repr_of(&vec!["2"; 10].join(" * ")), "1024");
}

#[test]
fn test_deep_nesting_is_a_parse_error() {
    let nested = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
    assert_eq!(repr_of(&nested(100)), "1");
    let err = error_of(&nested(500));
    assert_eq!(err.kind(), "ParseError");
    let err = error_of(&format!("{}1", "- ".repeat(1000)));
    assert!(err.to_string().contains("nested deeper"), "{err}");
}

#[test]
fn test_const_bindings() {
    let engine = Engine::new();
    engine.eval("const K = 1").unwrap();
    engine.eval("const K = 1").unwrap();
    assert!(matches!(
        engine.eval("const K = 2").unwrap_err(),
        RuntimeError::Redefinition(_)
    ));
}

#[test]
fn test_splat_and_keywords() {
    assert_eq!(repr_of("xs = [1, 2, 3]\ntuple(xs...)"), "(1, 2, 3)");
    assert_eq!(repr_of("round(3.14159; digits = 2)"), "3.14");
}

#[test]
fn test_module_names_resolve() {
    assert_eq!(repr_of("Base.length([1, 2])"), "2");
    assert_eq!(repr_of("Core.typeof(1)"), "Int64");
    assert_eq!(repr_of("x = 1\nMain.x"), "1");
    assert_eq!(repr_of("Base.Multimedia.showable(\"text/plain\", 1)"), "true");
}
