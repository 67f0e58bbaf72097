use jvbridge::{Bridge, BridgeError, Environment, EvalKey, HostValue};

fn bridge_with_capacity(capacity: usize) -> Bridge {
    Bridge::with_environment(Environment {
        evaluator_capacity: capacity,
        ..Environment::default()
    })
}

#[test]
fn test_invalid_keys_fail_before_evaluation() {
    let bridge = bridge_with_capacity(8);
    let evaluator = bridge.evaluator();
    for key in [
        HostValue::from(1),
        HostValue::Tuple(vec![1.into(), 2.into()]),
        HostValue::Tuple(vec![]),
    ] {
        let err = evaluator.get_host(&key).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidKey { .. }), "{key}");
        assert!(err.to_string().starts_with("TypeError"));
    }
    assert_eq!(evaluator.stats().misses, 0);
}

#[test]
fn test_definitions_persist_across_keys() {
    let bridge = bridge_with_capacity(8);
    let xs = bridge.eval("zs = String[]").unwrap();
    let push = bridge.eval("push!").unwrap();
    bridge.invoke(&push, &[xs.clone(), "2".into()], &[]).unwrap();
    assert_eq!(bridge.eval("length(zs)").unwrap(), HostValue::from(1));
    assert_eq!(xs.as_handle().unwrap().len().unwrap(), 1);
}

#[test]
fn test_fragment_keys_define_then_evaluate() {
    let bridge = bridge_with_capacity(8);
    let s1 = bridge
        .eval_all(&[
            "struct S1\n    x::Int\n    y::Int\n    z::String\nend",
            "S1(1, 2, \"3\")",
        ])
        .unwrap();
    let s1 = s1.as_handle().unwrap();
    assert_eq!(s1.get_field("x").unwrap(), HostValue::from(1));
    assert_eq!(s1.get_field("z").unwrap(), HostValue::text("3"));

    let key = EvalKey::from(["struct S1\n    x::Int\n    y::Int\n    z::String\nend", "S1(1, 2, \"3\")"]);
    assert!(bridge.evaluator().contains(key));
}

#[test]
fn test_text_identical_keys_hit() {
    let bridge = bridge_with_capacity(8);
    bridge.eval("n = 0").unwrap();
    let first = bridge.eval_all(&["n += 1", "n"]).unwrap();
    let second = bridge.eval_all(&["n += 1", "n"]).unwrap();
    assert_eq!(first, second);
    assert_eq!(bridge.eval("n").unwrap(), HostValue::from(1));

    // whitespace changes the key
    bridge.eval_all(&["n += 1 ", "n"]).unwrap();
    assert_eq!(bridge.eval("n + 0").unwrap(), HostValue::from(2));
}

#[test]
fn test_evaluation_errors_keep_the_foreign_message() {
    let bridge = bridge_with_capacity(8);
    bridge.eval("kept = 1").unwrap();
    match bridge.eval("error(\"a\")").unwrap_err() {
        BridgeError::Evaluation { message, .. } => assert_eq!(message, "a"),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(bridge.evaluator().contains("kept = 1"));
    assert_eq!(bridge.eval("kept").unwrap(), HostValue::from(1));
}

#[test]
fn test_eviction_recompiles_on_next_use() {
    let bridge = bridge_with_capacity(1);
    bridge.eval("hits = 0").unwrap();
    bridge.eval("hits += 1").unwrap();
    bridge.eval("1").unwrap();
    bridge.eval("hits += 1").unwrap();
    assert_eq!(bridge.eval("hits").unwrap(), HostValue::from(2));
    assert!(bridge.evaluator().stats().evictions >= 3);
    assert_eq!(bridge.evaluator().len(), 1);
}
