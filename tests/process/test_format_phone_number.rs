use migrate_tools::core::destination::{EntityValueMap, InMemoryDestination};
use migrate_tools::core::process::plugins::format_phone_number::{
    PhonePattern, ValueFormatter, DEFAULT_FORMAT,
};
use migrate_tools::core::process::{PluginDeps, PluginRegistry, RowContext, StageOutcome};
use migrate_tools::core::row::SourceRow;
use serde_json::{json, Value};
use std::sync::Arc;

fn formatter(pattern: &str, invalid_return_empty: bool) -> ValueFormatter {
    ValueFormatter::new(PhonePattern::parse(pattern).unwrap(), invalid_return_empty)
}

fn transform(config: Value, input: Option<Value>) -> StageOutcome {
    let deps = PluginDeps::from_store(Arc::new(InMemoryDestination::new()));
    let plugin = PluginRegistry::with_builtins()
        .create(
            "format_phone_number",
            config.as_object().unwrap(),
            &deps,
        )
        .unwrap();
    let row = SourceRow::default();
    let destination = EntityValueMap::new();
    let ctx = RowContext::new(&row, "field_phone", &destination);
    plugin.transform(input, &ctx).unwrap()
}

#[test]
fn formats_ten_digit_numbers_with_default_pattern() {
    let formatter = formatter(DEFAULT_FORMAT, false);
    assert_eq!(
        formatter.format("(555) 123-4567"),
        Some("555-123-4567".to_string())
    );
    assert_eq!(formatter.format("555.123.4567"), Some("555-123-4567".to_string()));
    assert_eq!(formatter.format("5551234567"), Some("555-123-4567".to_string()));
}

#[test]
fn custom_pattern_regroups_digits() {
    let formatter = formatter("($1) $2-$3", false);
    assert_eq!(
        formatter.format("555 123 4567"),
        Some("(555) 123-4567".to_string())
    );
}

#[test]
fn invalid_numbers_pass_through_unchanged() {
    let formatter = formatter(DEFAULT_FORMAT, false);
    assert_eq!(formatter.format("12345"), Some("12345".to_string()));
    assert_eq!(
        formatter.format("+1 (555) 123-4567"),
        Some("+1 (555) 123-4567".to_string())
    );
    assert_eq!(formatter.format("call me"), Some("call me".to_string()));
}

#[test]
fn invalid_numbers_become_empty_when_configured() {
    let formatter = formatter(DEFAULT_FORMAT, true);
    assert_eq!(formatter.format("12345"), Some(String::new()));
    assert_eq!(
        formatter.format("(555) 123-4567"),
        Some("555-123-4567".to_string())
    );
}

#[test]
fn empty_input_yields_no_value() {
    assert_eq!(formatter(DEFAULT_FORMAT, false).format(""), None);
    assert_eq!(formatter(DEFAULT_FORMAT, true).format(""), None);
}

#[test]
fn formatting_is_idempotent_for_default_pattern() {
    let formatter = formatter(DEFAULT_FORMAT, false);
    let once = formatter.format("(555) 123-4567").unwrap();
    assert_eq!(formatter.format(&once), Some(once.clone()));
}

#[test]
fn plugin_formats_string_and_number_values() {
    let config = json!({"format": "($1) $2-$3"});
    assert_eq!(
        transform(config.clone(), Some(json!("555-123-4567"))),
        StageOutcome::Value(json!("(555) 123-4567"))
    );
    assert_eq!(
        transform(config, Some(json!(5551234567u64))),
        StageOutcome::Value(json!("(555) 123-4567"))
    );
}

#[test]
fn plugin_keeps_original_value_on_pass_through() {
    assert_eq!(
        transform(json!({}), Some(json!(12345))),
        StageOutcome::Value(json!(12345))
    );
    assert_eq!(
        transform(json!({}), Some(json!(555.5))),
        StageOutcome::Value(json!(555.5))
    );
}

#[test]
fn plugin_formats_numbers_as_strings() {
    assert_eq!(
        transform(json!({}), Some(json!(5551234567.0))),
        StageOutcome::Value(json!("555-123-4567"))
    );
    assert_eq!(
        transform(json!({"format": "$0"}), Some(json!(5551234567u64))),
        StageOutcome::Value(json!("5551234567"))
    );
}

#[test]
fn plugin_blanks_invalid_values_when_configured() {
    assert_eq!(
        transform(json!({"invalid_return_empty": true}), Some(json!("12345"))),
        StageOutcome::Value(json!(""))
    );
}

#[test]
fn plugin_leaves_missing_and_empty_values_unset() {
    assert_eq!(transform(json!({}), None), StageOutcome::Unset);
    assert_eq!(transform(json!({}), Some(Value::Null)), StageOutcome::Unset);
    assert_eq!(transform(json!({}), Some(json!(""))), StageOutcome::Unset);
}

#[test]
fn plugin_treats_false_as_empty_and_true_as_invalid() {
    assert_eq!(transform(json!({}), Some(json!(false))), StageOutcome::Unset);
    assert_eq!(
        transform(json!({}), Some(json!(true))),
        StageOutcome::Value(json!(true))
    );
    assert_eq!(
        transform(json!({"invalid_return_empty": true}), Some(json!(true))),
        StageOutcome::Value(json!(""))
    );
}

#[test]
fn plugin_passes_structured_values_through() {
    assert_eq!(
        transform(json!({}), Some(json!({"number": "5551234567"}))),
        StageOutcome::Value(json!({"number": "5551234567"}))
    );
    assert_eq!(transform(json!({}), Some(json!({}))), StageOutcome::Unset);
}

#[test]
fn invalid_patterns_are_configuration_errors() {
    let deps = PluginDeps::from_store(Arc::new(InMemoryDestination::new()));
    let registry = PluginRegistry::with_builtins();
    for config in [json!({"format": ""}), json!({"format": "$4-$5"})] {
        let err = registry
            .create("format_phone_number", config.as_object().unwrap(), &deps)
            .err()
            .unwrap();
        assert!(err.is_configuration());
        assert_eq!(err.code, "MIG-CFG-003");
    }
}

#[test]
fn unknown_options_are_rejected() {
    let deps = PluginDeps::from_store(Arc::new(InMemoryDestination::new()));
    let err = PluginRegistry::with_builtins()
        .create(
            "format_phone_number",
            json!({"formatt": "$1"}).as_object().unwrap(),
            &deps,
        )
        .err()
        .unwrap();
    assert_eq!(err.code, "MIG-CFG-002");
}
