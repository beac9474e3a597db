//! Integration tests for configuration-driven logging setup

use bridge_traits::time::LogLevel;
use core_runtime::config::CoreConfig;
use core_runtime::logging::{init_logging, redact_url_credentials, LogFormat};

#[test]
fn test_logging_initializes_once_from_config() {
    let config = CoreConfig::from_json_str(
        r#"{ "logging": { "format": "json", "level": "debug", "filter": "core_sync=trace" } }"#,
    )
    .unwrap();

    let logging = config.logging.to_logging_config();
    assert_eq!(logging.format, LogFormat::Json);
    assert_eq!(logging.level, LogLevel::Debug);

    // Only one global subscriber per process.
    assert!(init_logging(logging.clone()).is_ok());
    assert!(init_logging(logging).is_err());

    tracing::info!(
        database = %redact_url_credentials("postgres://kptv:secret@db/kptv"),
        "logging initialized"
    );
}

#[test]
fn test_blank_filter_rejected_by_config() {
    let result = CoreConfig::from_json_str(r#"{ "logging": { "filter": "   " } }"#);
    assert!(result.is_err());
}
