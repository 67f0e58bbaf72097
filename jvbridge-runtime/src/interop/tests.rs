use super::*;

#[test]
fn test_compile_joins_fragments() {
    let engine = Engine::new();
    let program = engine
        .compile(&["square(x) = x * x", "y = square(4)\ny + 1"])
        .unwrap();
    assert_eq!(program.fragment_count(), 2);
    assert_eq!(program.statement_count(), 3);
    let value = engine.run(&program).unwrap();
    assert!(matches!(value, Value::Int64(17)));
    assert!(matches!(engine.main().get("y"), Some(Value::Int64(16))));
}

#[test]
fn test_compile_reports_syntax_errors() {
    let engine = Engine::new();
    let err = engine.compile(&["x = 1", "f(x"]).unwrap_err();
    assert_eq!(err.kind(), "ParseError");
    assert!(matches!(err, RuntimeError::Parse { line: 1, .. }));
    // nothing from a failed compile is evaluated
    assert!(engine.main().get("x").is_none());
}

#[test]
fn test_program_can_run_twice() {
    let engine = Engine::new();
    engine.eval("n = 0").unwrap();
    let program = engine.compile(&["n += 1"]).unwrap();
    engine.run(&program).unwrap();
    let value = engine.run(&program).unwrap();
    assert!(matches!(value, Value::Int64(2)));
}

#[test]
fn test_call_with_dispatch_and_keywords() {
    let engine = Engine::new();
    engine.eval("describe(x::Int) = \"int\"\ndescribe(x) = \"other\"").unwrap();
    let f = engine.main().get("describe").unwrap();
    let int = engine.call(&f, &[Value::Int64(1)], &[]).unwrap();
    let other = engine.call(&f, &[Value::str("a")], &[]).unwrap();
    assert_eq!(engine.repr(&int), "\"int\"");
    assert_eq!(engine.repr(&other), "\"other\"");

    let rounded = engine
        .call_named(
            "round",
            &[Value::Float64(2.71828)],
            &[("digits".to_string(), Value::Int64(1))],
        )
        .unwrap();
    assert_eq!(engine.repr(&rounded), "2.7");
}

#[test]
fn test_call_non_function_is_method_error() {
    let engine = Engine::new();
    let err = engine.call(&Value::Int64(3), &[], &[]).unwrap_err();
    assert_eq!(err.kind(), "MethodError");
}

#[test]
fn test_resolve_dotted_names() {
    let engine = Engine::new();
    engine.eval("helper() = 42").unwrap();
    assert!(matches!(engine.resolve("length"), Ok(Value::Function(_))));
    assert!(matches!(engine.resolve("helper"), Ok(Value::Function(_))));
    assert!(matches!(engine.resolve("Main.helper"), Ok(Value::Function(_))));
    assert!(matches!(
        engine.resolve("Base.Multimedia.display"),
        Ok(Value::Function(_))
    ));
    assert!(matches!(
        engine.resolve("Base.Nope.display"),
        Err(RuntimeError::UndefVar { .. })
    ));
    assert!(matches!(
        engine.resolve("missing_name"),
        Err(RuntimeError::UndefVar { .. })
    ));
}

#[test]
fn test_base_names_shadow_main_in_resolve() {
    let engine = Engine::new();
    engine.eval("length = 3").unwrap();
    assert!(matches!(engine.resolve("length"), Ok(Value::Function(_))));
    assert!(matches!(engine.resolve("Main.length"), Ok(Value::Int64(3))));
}

#[test]
fn test_module_lookup() {
    let engine = Engine::new();
    engine.eval("a = 1\nb = 2").unwrap();
    assert_eq!(engine.module_names("Main").unwrap(), vec!["a", "b"]);
    assert!(engine.module_names("Base").unwrap().contains(&"push!".to_string()));
    assert_eq!(engine.module("Core").unwrap().path, "Base");
    assert_eq!(engine.module("Base.Multimedia").unwrap().path, "Base.Multimedia");
    assert!(engine.module("Elsewhere").is_err());
    assert!(engine.module("Base.length").is_err());
}

#[test]
fn test_property_helpers() {
    let engine = Engine::new();
    let point = engine
        .eval("mutable struct P\n  x::Int\n  y::Float64\nend\nP(1, 2.0)")
        .unwrap();
    assert_eq!(engine.property_names(&point), vec!["x", "y"]);
    assert!(engine.has_property(&point, "x"));
    assert!(!engine.has_property(&point, "z"));

    engine.set_property(&point, "x", &Value::Int64(5)).unwrap();
    assert!(matches!(engine.get_property(&point, "x"), Ok(Value::Int64(5))));
    assert!(matches!(
        engine.get_property(&point, "z"),
        Err(RuntimeError::Field { .. })
    ));
    assert!(engine.set_property(&point, "x", &Value::str("no")).is_err());
}

#[test]
fn test_output_is_captured() {
    let engine = Engine::new();
    engine.eval("println(\"hi\")\nprint(1, 2)").unwrap();
    assert_eq!(engine.take_output(), "hi\n12");
    assert_eq!(engine.take_output(), "");
}

#[test]
fn test_type_of_and_repr() {
    let engine = Engine::new();
    let value = engine.eval("[1.0, 2.0]").unwrap();
    assert_eq!(engine.type_of(&value).to_string(), "Vector{Float64}");
    assert_eq!(engine.repr(&value), "[1.0, 2.0]");
}

#[test]
fn test_pins_survive_reassignment() {
    let engine = Engine::new();
    let value = engine.eval("v = [1, 2, 3]").unwrap();
    let id = engine.pin(&value);
    engine.eval("v = nothing").unwrap();

    let held = engine.anchors().get(id).unwrap();
    engine.eval("nothing").unwrap();
    assert_eq!(engine.repr(&held), "[1, 2, 3]");
    assert!(engine.release(id));
    assert!(!engine.release(id));
    assert_eq!(engine.anchors().live(), 0);
}

#[test]
fn test_call_depth_resets_after_overflow() {
    let engine = Engine::new();
    engine.eval("down(n) = n == 0 ? 0 : down(n - 1)").unwrap();
    assert!(engine.eval(&format!("down({})", MAX_CALL_DEPTH * 2)).is_err());
    let value = engine.eval("down(10)").unwrap();
    assert!(matches!(value, Value::Int64(0)));
}
