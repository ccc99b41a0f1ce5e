#![allow(missing_docs)]
#![cfg(feature = "config-file")]

#[macro_use]
mod common;

use common::init_test_logging;
use launchspan::{ConfigError, TracerConfig};
use std::io::Write;
use std::net::Ipv4Addr;

#[test]
fn partial_file_keeps_defaults() {
    init_test_logging();
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(
        file,
        r#"
service_name = "trainer"
endpoint_addr = "10.1.2.3"
max_stack_depth = 64
"#
    )
    .expect("write");

    let config = TracerConfig::from_file(file.path()).expect("load");
    assert_with_log!(
        config.service_name == "trainer",
        "service name",
        "trainer",
        config.service_name
    );
    assert_eq!(config.endpoint_addr, Ipv4Addr::new(10, 1, 2, 3));
    assert_eq!(config.max_stack_depth, 64);
    assert_eq!(config.endpoint_port, 9411);
    assert_eq!(config.root_span_name, "global");
    test_complete!("partial_file_keeps_defaults");
}

#[test]
fn invalid_values_are_rejected_on_load() {
    init_test_logging();
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "batch_size = 0").expect("write");
    let err = TracerConfig::from_file(file.path()).unwrap_err();
    assert!(
        matches!(err, ConfigError::Invalid { field: "batch_size", .. }),
        "{err}"
    );
    test_complete!("invalid_values_are_rejected_on_load");
}

#[test]
fn malformed_toml_is_a_parse_error() {
    init_test_logging();
    let err = TracerConfig::from_toml_str("max_stack_depth = \"deep\"").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)), "{err}");

    let missing = TracerConfig::from_file("/nonexistent/launchspan.toml").unwrap_err();
    assert!(matches!(missing, ConfigError::Io(_)), "{missing}");
    test_complete!("malformed_toml_is_a_parse_error");
}

#[test]
fn file_then_overrides_layering() {
    init_test_logging();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tracer.toml");
    std::fs::write(&path, "service_name = \"from-file\"\nendpoint_port = 9000\n").expect("write");

    let config = TracerConfig::from_file(&path)
        .expect("load")
        .with_overrides_from(|var| {
            (var == launchspan::config::ENV_SERVICE_NAME).then(|| "from-env".to_string())
        })
        .expect("overrides");
    assert_eq!(config.service_name, "from-env");
    assert_eq!(config.endpoint_port, 9000);
    test_complete!("file_then_overrides_layering");
}
