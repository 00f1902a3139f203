//! Tests for loading and building index configurations

use jsonindex::{IndexConfig, IndexError, Priority, ResolutionMode, StrategyKind, StrategyRule};
use std::io::Write;
use tempfile::NamedTempFile;

mod common;

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(json.as_bytes()).expect("write config");
    file
}

#[test]
fn json_file_overrides_only_the_keys_it_names() {
    let file = write_config(
        r#"{
            "worker_threads": 3,
            "max_inflight_cost": 500,
            "convert_priority": "low",
            "identity_field": "meta.key",
            "resolution_mode": "dotted",
            "detect_dates": false,
            "strategies": [
                { "field": "sku", "strategy": "term" },
                { "content_type": "invoice", "field": "secret", "strategy": "null" }
            ]
        }"#,
    );

    let config = IndexConfig::from_json_file(file.path()).expect("valid config");
    assert_eq!(config.worker_count(), 3);
    assert_eq!(config.max_inflight_cost(), Some(500));
    assert_eq!(config.convert_priority(), Priority::Low);
    assert_eq!(config.identity_field(), "meta.key");
    assert_eq!(config.content_type_field(), "contentType");
    assert_eq!(config.resolution_mode(), ResolutionMode::Dotted);
    assert!(!config.classify_options().detect_dates);
    assert!(config.classify_options().detect_guids);
    assert_eq!(
        config.strategies()[1],
        StrategyRule {
            content_type: Some("invoice".to_string()),
            field: "secret".to_string(),
            strategy: StrategyKind::Null,
        }
    );

    let registry = config.strategy_registry();
    assert_eq!(registry.kind_for("invoice", "secret"), StrategyKind::Null);
    assert_eq!(registry.kind_for("refund", "secret"), StrategyKind::Default);
    assert_eq!(registry.kind_for("refund", "sku"), StrategyKind::Term);
}

#[test]
fn empty_object_yields_defaults() {
    let file = write_config("{}");
    let config = IndexConfig::from_json_file(file.path()).expect("valid config");
    assert_eq!(config, IndexConfig::default());
    assert!(config.worker_count() >= 1);
}

#[test]
fn malformed_and_invalid_files_are_config_errors() {
    let malformed = write_config("{ not json");
    assert!(matches!(
        IndexConfig::from_json_file(malformed.path()),
        Err(IndexError::Config(_))
    ));

    let invalid = write_config(r#"{ "writer_memory_limit": 1024 }"#);
    assert!(matches!(
        IndexConfig::from_json_file(invalid.path()),
        Err(IndexError::Config(_))
    ));

    let missing = tempfile::tempdir().expect("tempdir");
    assert!(matches!(
        IndexConfig::from_json_file(missing.path().join("absent.json")),
        Err(IndexError::Io(_))
    ));
}

#[test]
fn builder_round_trips_through_serde() {
    let config = IndexConfig::builder()
        .default_content_type(Some("doc"))
        .content_type_field("")
        .strategy(StrategyRule {
            content_type: None,
            field: "price".to_string(),
            strategy: StrategyKind::Numeric,
        })
        .build()
        .expect("valid config");

    let json = serde_json::to_string(&config).expect("serialize");
    let file = write_config(&json);
    assert_eq!(IndexConfig::from_json_file(file.path()).expect("reload"), config);
}
