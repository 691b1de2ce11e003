//! Host configuration installed for the whole test process
//!
//! Every test installs the same configuration; whichever runs first wins
//! and the rest observe it.

use dy_core::host::{self, HostConfig, StringHash};
use dy_core::string::murmur3_32;
use dy_core::{Dict, Str, Value, intern};
use serial_test::serial;

fn small_tables() -> HostConfig {
    HostConfig::from_toml_str(
        r#"
        string_hash = "murmur3"
        dict_table_size = 2
        dict_block_size = 1
        intern_table_size = 4
        intern_block_size = 2
        "#,
    )
    .unwrap()
}

fn install() {
    let wanted = small_tables();
    if let Err(rejected) = host::configure(wanted) {
        assert_eq!(&rejected, host::config());
    }
    assert_eq!(host::config(), &small_tables());
}

#[test]
#[serial]
fn test_second_configure_is_rejected() {
    install();
    let other = HostConfig::new().with_dict_table_size(64);
    let rejected = host::configure(other.clone()).unwrap_err();
    assert_eq!(rejected, other);
    assert_eq!(host::config().dict_table_size, 2);
}

#[test]
#[serial]
fn test_dicts_use_configured_sizes() {
    install();
    let d = Dict::new();
    assert_eq!(d.stats().table_size, 2);

    for i in 0..50i64 {
        d.set_int(i, Value::from(i));
    }
    let stats = d.stats();
    assert_eq!(stats.entries, 50);
    // 2 heads, the rest in blocks of 1, 2, 4, 8, 16, 32
    assert_eq!(stats.blocks.live, 48);
    assert_eq!(stats.blocks.blocks, 6);
    for i in 0..50i64 {
        assert_eq!(d.get_int(i), Value::from(i));
    }
}

#[test]
#[serial]
fn test_strings_hash_with_murmur3() {
    install();
    let s = Str::from("test");
    assert_eq!(s.hash(), murmur3_32(b"test", 0) as i64);
}

#[test]
#[serial]
fn test_intern_table_with_tiny_blocks() {
    install();
    let names: Vec<Str> = (0..40).map(|i| Str::intern(format!("n{}", i).as_bytes())).collect();
    let stats = intern::stats();
    assert_eq!(stats.table_size, 4);
    assert!(stats.entries >= 40);
    for (i, s) in names.iter().enumerate() {
        let again = Str::intern(format!("n{}", i).as_bytes());
        assert!(again.ptr_eq(s));
    }
    drop(names);
    assert!(Str::lookup_interned(b"n7").is_none());
}

#[test]
fn test_invalid_configs_are_refused() {
    assert!(HostConfig::from_toml_str("dict_table_size = 0").is_err());
    assert!(HostConfig::from_toml_str("unknown_knob = 1").is_err());
    assert!(HostConfig::from_toml_str("string_hash = \"sha1\"").is_err());
}
