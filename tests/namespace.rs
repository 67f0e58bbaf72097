use jvbridge::{Bridge, Environment, HostValue};

fn bridge() -> Bridge {
    Bridge::with_environment(Environment::default())
}

#[test]
fn test_multimedia_namespace() {
    let bridge = bridge();
    let multimedia = bridge.import("Base.Multimedia").unwrap();
    assert!(multimedia.names().unwrap().iter().any(|name| name == "display"));
    assert_eq!(multimedia.repr(), "<JV(Base.Multimedia)>");

    let display = multimedia.get("display").unwrap();
    bridge.invoke(&display, &["shown".into()], &[]).unwrap();
    assert!(bridge.take_output().contains("shown"));
}

#[test]
fn test_wildcard_resolves_members_independently() {
    let bridge = bridge();
    let multimedia = bridge.import("Base.Multimedia").unwrap();
    let resolved = multimedia.wildcard().unwrap();
    assert_eq!(resolved.len(), multimedia.names().unwrap().len());
    assert!(resolved.iter().any(|(name, value)| name == "display" && value.is_ok()));
}

#[test]
fn test_members_are_resolved_on_every_access() {
    let bridge = bridge();
    let main = bridge.import("Main").unwrap();
    assert_eq!(main.get("late").unwrap_err().kind(), "UndefVarError");
    bridge.eval("late = \"bound\"").unwrap();
    assert_eq!(main.get("late").unwrap(), HostValue::text("bound"));
}

#[test]
fn test_unknown_modules_fail() {
    let bridge = bridge();
    assert!(bridge.import("Base.Nowhere").is_err());
    let base = bridge.base().unwrap();
    assert!(base.namespace("Multimedia").is_ok());
    assert_eq!(
        base.call("identity", &[HostValue::List(vec![])], &[])
            .unwrap()
            .as_handle()
            .map(|h| h.type_name().to_string()),
        Some("Vector{Any}".to_string())
    );
}
