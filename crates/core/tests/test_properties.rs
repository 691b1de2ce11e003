//! End-to-end behaviour of the object model through the public API

use dy_core::error::{self, Exception};
use dy_core::{Dict, List, Str, StringBuilder, Userdata, Value, intern};
use std::cell::Cell;
use std::rc::Rc;

/// A userdata whose destructor bumps `counter`
fn tracked(counter: &Rc<Cell<usize>>) -> Value {
    let counter = counter.clone();
    Value::from(
        Userdata::builder()
            .with_name("tracked")
            .with_destructor(move |_| counter.set(counter.get() + 1))
            .build(),
    )
}

#[test]
fn test_refcount_balances_and_destroys_once() {
    let destroyed = Rc::new(Cell::new(0));
    let v = tracked(&destroyed);
    assert_eq!(v.ref_count(), Some(1));

    let retained: Vec<Value> = (0..5).map(|_| dy_core::retain(&v)).collect();
    assert_eq!(v.ref_count(), Some(6));

    let mut retained = retained.into_iter();
    for r in retained.by_ref().take(3) {
        dy_core::release(r);
    }
    assert_eq!(v.ref_count(), Some(3));
    assert_eq!(destroyed.get(), 0);

    for r in retained {
        dy_core::release(r);
    }
    assert_eq!(v.ref_count(), Some(1));
    assert_eq!(destroyed.get(), 0);

    dy_core::release(v);
    assert_eq!(destroyed.get(), 1);
}

#[test]
fn test_destructor_runs_once_through_containers() {
    let destroyed = Rc::new(Cell::new(0));
    {
        let v = tracked(&destroyed);
        let list = List::new();
        let dict = Dict::new();
        list.append(v.clone()).unwrap();
        dict.set_str("a", v.clone());
        dict.set_int(1, v.clone());
        v.release();

        list.clear();
        assert_eq!(destroyed.get(), 0);
        dict.remove_str("a");
        assert_eq!(destroyed.get(), 0);
    }
    // dict dropped with its last entry
    assert_eq!(destroyed.get(), 1);
}

#[test]
fn test_scalars_have_no_lifetime() {
    assert_eq!(Value::None.ref_count(), None);
    assert_eq!(Value::from(true).ref_count(), None);
    assert_eq!(Value::from(3).ref_count(), None);
    assert_eq!(Value::Undefined.ref_count(), None);
}

#[test]
fn test_dict_round_trip() {
    let d = Dict::new();
    let mut expected = Vec::new();
    for i in 0..200i64 {
        let key = if i % 2 == 0 {
            Value::from(format!("key{}", i))
        } else {
            Value::from(i)
        };
        d.set(key.clone(), Value::from(i * 10)).unwrap();
        expected.push((key, i * 10));
    }
    assert_eq!(d.len(), 200);
    for (key, value) in &expected {
        assert_eq!(d.get(key).unwrap(), Value::from(*value));
    }
    assert!(d.get(&Value::from("nope")).unwrap().is_undefined());
    assert!(d.get(&Value::from(-1)).unwrap().is_undefined());

    // Overwrite keeps the count
    d.set(Value::from(1), Value::from("one")).unwrap();
    assert_eq!(d.len(), 200);
    assert_eq!(d.get_int(1), Value::from("one"));
}

#[test]
fn test_dict_colliding_keys_chain_and_remove() {
    let d = Dict::new();
    let table = d.stats().table_size as i64;
    // Every key lands in the same chain
    let keys: Vec<i64> = (0..20).map(|i| i * table).collect();
    for &k in &keys {
        d.set_int(k, Value::from(k));
    }
    assert!(d.stats().blocks.live > 0);

    // Remove the head, a middle entry and the tail
    for &k in &[keys[0], keys[10], keys[19]] {
        assert_eq!(d.remove(&Value::from(k)).unwrap(), Some(Value::from(k)));
    }
    assert_eq!(d.len(), 17);
    for &k in &keys {
        let removed = k == keys[0] || k == keys[10] || k == keys[19];
        assert_eq!(d.get_int(k).is_undefined(), removed, "key {}", k);
    }

    d.clear();
    assert!(d.is_empty());
    assert_eq!(d.stats().blocks.live, 0);
    d.set_int(keys[3], Value::None);
    assert!(d.get_int(keys[3]).is_none());
}

#[test]
fn test_dict_parent_delegation() {
    let parent = Dict::new();
    parent.set_str("k", Value::from("parent"));
    parent.set_str("only_parent", Value::from(1));

    let child = Dict::with_parent(parent.clone());
    assert_eq!(child.get_str("k"), Value::from("parent"));

    child.set_str("k", Value::from("child"));
    assert_eq!(child.get_str("k"), Value::from("child"));
    assert_eq!(parent.get_str("k"), Value::from("parent"));

    // Removing from the child never reaches the parent
    assert_eq!(child.remove_str("only_parent"), None);
    assert_eq!(parent.get_str("only_parent"), Value::from(1));
    assert_eq!(child.get_str("only_parent"), Value::from(1));

    child.remove_str("k");
    assert_eq!(child.get_str("k"), Value::from("parent"));

    // Chains are transitive
    let grandchild = Dict::with_parent(child.clone());
    assert_eq!(grandchild.get_str("only_parent"), Value::from(1));
    assert!(grandchild.contains_str("k"));
    assert_eq!(grandchild.len(), 0);
}

#[test]
fn test_dict_keeps_parent_alive() {
    let destroyed = Rc::new(Cell::new(0));
    let child = {
        let parent = Dict::new();
        parent.set_str("tracked", tracked(&destroyed));
        Dict::with_parent(parent)
    };
    assert_eq!(destroyed.get(), 0);
    assert!(child.contains_str("tracked"));
    child.clear();
    assert!(child.contains_str("tracked"));
    drop(child);
    assert_eq!(destroyed.get(), 1);
}

#[test]
fn test_list_index_semantics() {
    let list: List = (0..5).map(Value::from).collect();
    let len = list.len() as i64;
    assert_eq!(list.get(-1).unwrap(), list.get(len - 1).unwrap());
    assert_eq!(list.get(len).unwrap_err().errid(), error::INDEX_ERROR);
    assert_eq!(list.get(-len - 1).unwrap_err().errid(), error::INDEX_ERROR);

    let before = list.to_vec();
    list.insert(2, Value::from("new")).unwrap();
    assert_eq!(list.get(2).unwrap(), Value::from("new"));
    for (i, v) in before.iter().enumerate() {
        let shifted = if i < 2 { i } else { i + 1 };
        assert_eq!(&list.get(shifted as i64).unwrap(), v);
    }
}

#[test]
fn test_string_equality_hash_and_interning() {
    let a = Value::from("same bytes");
    let b = Value::string(b"same bytes");
    assert!(dy_core::equals(&a, &b));
    assert_eq!(dy_core::hash(&a).unwrap(), dy_core::hash(&b).unwrap());
    assert!(!a.as_str().unwrap().ptr_eq(b.as_str().unwrap()));

    let x = Str::intern(b"canonical");
    let y = Str::from("canonical").interned();
    assert!(x.ptr_eq(&y));
    assert!(x.is_interned());

    drop(x);
    drop(y);
    assert!(intern::lookup(b"canonical").is_none());
}

#[test]
fn test_builder_concatenation() {
    let mut bs = StringBuilder::new();
    bs.append(b"foo").append(b"bar");
    let s = bs.build();
    assert_eq!(s.as_bytes(), b"foobar");
    assert_eq!(s.len(), 6);
}

#[test]
fn test_error_cause_chain() {
    error::clear();
    let a = error::set(error::KEY_ERROR, "first");
    let b = error::set(error::ARGUMENT_ERROR, "second");

    let current = error::occurred().unwrap();
    assert!(current.ptr_eq(&b));
    assert!(current.cause().unwrap().ptr_eq(&a));
    assert!(error::filter(&b, "dy.TypeError"));
    assert!(!error::filter(&b, "dy.KeyError"));

    let ids: Vec<&str> = current.chain().map(|e| e.errid()).collect();
    assert_eq!(ids, vec![error::ARGUMENT_ERROR, error::KEY_ERROR]);

    error::clear();
    assert!(!error::has_error());
}

#[test]
fn test_report_moves_errors_into_slot() {
    error::clear();
    let d = Dict::new();
    assert_eq!(error::report(d.get_required(&Value::from("x"))), None);
    let exc = error::take().unwrap();
    assert_eq!(exc.errid(), error::KEY_ERROR);
    assert_eq!(exc.message(), "\"x\"");
}

#[test]
fn test_unhashable_key_leaves_dict_unchanged() {
    let d = Dict::new();
    d.set_str("keep", Value::from(1));

    let key = List::new();
    let value = Value::from("x");
    let err = d.set(Value::from(key.clone()), value.clone()).unwrap_err();
    assert_eq!(err.errid(), error::UNHASHABLE_ERROR);
    assert_eq!(err.message(), "Cannot use unhashable type List as object key.");

    assert_eq!(d.len(), 1);
    assert_eq!(key.ref_count(), 1);
    assert_eq!(value.ref_count(), Some(1));
}

#[test]
fn test_memory_error_is_shared() {
    let a = Exception::memory_error();
    let b = Exception::memory_error();
    assert!(a.ptr_eq(&b));
    assert_eq!(a.errid(), error::MEMORY_ERROR);

    error::clear();
    error::set(error::TYPE_ERROR, "pending");
    let installed = error::set_memory_error();
    assert!(installed.ptr_eq(&a));
    assert!(installed.cause().is_none());
    error::clear();
}

#[test]
fn test_self_referencing_list_prints() {
    let list = List::new();
    list.append(Value::from("x")).unwrap();
    list.append(Value::from(list.clone())).unwrap();
    assert_eq!(Value::from(list.clone()).to_string(), "[\"x\", [...]]");
    list.clear();
    assert_eq!(list.ref_count(), 1);
}
