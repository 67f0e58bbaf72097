//! Tests for the anchor table

use super::*;
use crate::objects::{Type, Value};
use std::rc::Rc;

fn vector() -> Value {
    Value::vector(&Type::Int64, &[Value::Int64(1), Value::Int64(2)]).unwrap()
}

#[test]
fn test_pin_and_get() {
    let table = AnchorTable::new();
    let id = table.pin(&Value::str("abc"));
    assert_eq!(table.live(), 1);
    assert_eq!(table.count(id), 1);
    assert!(matches!(table.get(id), Some(Value::Str(s)) if &*s == "abc"));
}

#[test]
fn test_ids_are_unique() {
    let table = AnchorTable::new();
    let a = table.pin(&Value::Int64(1));
    let b = table.pin(&Value::Int64(1));
    assert_ne!(a, b);
    assert_eq!(table.live(), 2);
}

#[test]
fn test_retain_release_counts() {
    let table = AnchorTable::new();
    let id = table.pin(&Value::Nothing);
    assert!(table.retain(id));
    assert_eq!(table.count(id), 2);

    assert!(table.release(id));
    assert_eq!(table.live(), 1);
    assert!(table.release(id));
    assert_eq!(table.live(), 0);
    assert_eq!(table.count(id), 0);

    // released anchors are gone for good
    assert!(!table.release(id));
    assert!(!table.retain(id));
    assert!(table.get(id).is_none());
}

#[test]
fn test_anchor_keeps_value_alive() {
    let table = AnchorTable::new();
    let value = vector();
    let Value::Array(array) = &value else {
        panic!("expected an array");
    };
    let weak = Rc::downgrade(array);
    let id = table.pin(&value);
    drop(value);
    assert!(weak.upgrade().is_some());

    table.release(id);
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_clear_and_stats() {
    let before = stats();
    let table = AnchorTable::new();
    table.pin(&Value::Int64(1));
    table.pin(&Value::Int64(2));
    table.clear();
    assert_eq!(table.live(), 0);

    let after = stats();
    assert!(after.pinned >= before.pinned + 2);
    assert!(after.released >= before.released + 2);
}
