//! Long chains of uncleared errors

use dy_core::error::{self, Exception, KEY_ERROR, TYPE_ERROR};
use std::time::{Duration, Instant};

const LINKS: usize = 100_000;

#[test]
fn test_long_chain_raises_and_clears() {
    error::clear();
    let started = Instant::now();
    for i in 0..LINKS {
        error::set(KEY_ERROR, format!("e{}", i));
    }
    // Linear chaining keeps this well under a second
    assert!(started.elapsed() < Duration::from_secs(10));

    let current = error::occurred().unwrap();
    assert_eq!(current.message(), format!("e{}", LINKS - 1));
    assert_eq!(current.chain().count(), LINKS);
    assert_eq!(current.chain().last().unwrap().message(), "e0");
    drop(current);

    error::clear();
    assert!(!error::has_error());
}

#[test]
fn test_long_chain_built_by_report() {
    error::clear();
    for i in 0..LINKS {
        let failed: error::Result<()> = Err(Exception::new(TYPE_ERROR, format!("r{}", i)));
        assert!(error::report(failed).is_none());
    }
    let chain = error::take().unwrap();
    assert_eq!(chain.chain().count(), LINKS);
    drop(chain);
    assert!(!error::has_error());
}

#[test]
fn test_dropping_chain_keeps_shared_tail() {
    error::clear();
    let root = error::set(TYPE_ERROR, "root");
    for i in 0..LINKS {
        error::set(KEY_ERROR, format!("e{}", i));
    }
    error::clear();
    // The caller's handle outlives the chain that referenced it
    assert_eq!(root.ref_count(), 1);
    assert_eq!(root.message(), "root");
    assert!(root.cause().is_none());
}

#[test]
fn test_reraising_a_shared_exception_still_rejects_cycles() {
    error::clear();
    let a = error::set(TYPE_ERROR, "A");
    for i in 0..1000 {
        error::set(KEY_ERROR, format!("e{}", i));
    }
    error::set_object(a.clone());
    assert!(a.cause().is_none());
    assert_eq!(error::occurred().unwrap().chain().count(), 1);
    error::clear();
}
