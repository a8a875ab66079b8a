use migrate_tools::core::destination::{EntityValueMap, InMemoryDestination};
use migrate_tools::core::process::plugins::entity_generate::{
    materialize, BundleTag, DefaultValueRule, EntityLookup,
};
use migrate_tools::core::process::{PluginDeps, PluginRegistry, ProcessPlugin, RowContext, StageOutcome};
use migrate_tools::core::row::SourceRow;
use serde_json::{json, Value};
use std::sync::Arc;

fn tag_lookup() -> EntityLookup {
    EntityLookup {
        entity_type: "taxonomy_term".to_string(),
        value_key: "field_tag_id".to_string(),
        bundle: Some(BundleTag {
            key: "vid".to_string(),
            bundle: "tags".to_string(),
        }),
    }
}

fn generator(store: Arc<InMemoryDestination>, config: Value) -> Arc<dyn ProcessPlugin> {
    PluginRegistry::with_builtins()
        .create(
            "compro_entity_generate",
            config.as_object().unwrap(),
            &PluginDeps::from_store(store),
        )
        .unwrap()
}

fn transform(plugin: &Arc<dyn ProcessPlugin>, row: &SourceRow, value: Option<Value>) -> StageOutcome {
    let destination = EntityValueMap::new();
    let ctx = RowContext::new(row, "field_tags", &destination);
    plugin.transform(value, &ctx).unwrap()
}

#[test]
fn lookup_and_bundle_produce_exact_keys() {
    let values = materialize(json!(42), &tag_lookup(), &[], &SourceRow::default());
    let keys: Vec<_> = values.keys().cloned().collect();
    assert_eq!(keys, vec!["field_tag_id", "vid"]);
    assert_eq!(values["field_tag_id"], json!(42));
    assert_eq!(values["vid"], json!("tags"));
}

#[test]
fn default_rules_resolve_references_and_literals() {
    let row = SourceRow::from_json(json!({"desc": "hello"})).unwrap();
    let rules = vec![
        DefaultValueRule::new("description", "desc"),
        DefaultValueRule::new("status_label", "Archived"),
    ];
    let values = materialize(json!("Rust"), &tag_lookup(), &rules, &row);
    assert_eq!(values["description"], json!("hello"));
    assert_eq!(values["status_label"], json!("Archived"));
}

#[test]
fn literal_equal_to_a_field_name_reads_the_field() {
    let row = SourceRow::from_json(json!({"Archived": "no"})).unwrap();
    let rules = vec![DefaultValueRule::new("status_label", "Archived")];
    let values = materialize(json!(1), &tag_lookup(), &rules, &row);
    assert_eq!(values["status_label"], json!("no"));
}

#[test]
fn default_rules_may_override_the_lookup_key() {
    let row = SourceRow::from_json(json!({"code": "RS"})).unwrap();
    let rules = vec![DefaultValueRule::new("field_tag_id", "code")];
    let values = materialize(json!("Rust"), &tag_lookup(), &rules, &row);
    assert_eq!(values["field_tag_id"], json!("RS"));
}

#[test]
fn materialize_is_deterministic() {
    let row = SourceRow::from_json(json!({"desc": "hello"})).unwrap();
    let rules = vec![DefaultValueRule::new("description", "desc")];
    let first = materialize(json!(1), &tag_lookup(), &rules, &row);
    let second = materialize(json!(1), &tag_lookup(), &rules, &row);
    assert_eq!(first, second);
}

#[test]
fn plugin_creates_entity_once_and_reuses_it() {
    let store = Arc::new(InMemoryDestination::new().with_id_key("taxonomy_term", "tid"));
    let plugin = generator(
        store.clone(),
        json!({
            "entity_type": "taxonomy_term",
            "value_key": "name",
            "bundle_key": "vid",
            "bundle": "tags",
            "default_values": {"description": "desc", "weight": 0}
        }),
    );
    let row = SourceRow::from_json(json!({"desc": "A systems language"})).unwrap();

    let first = transform(&plugin, &row, Some(json!("Rust")));
    let second = transform(&plugin, &row, Some(json!("Rust")));
    assert_eq!(first, StageOutcome::Value(json!(1)));
    assert_eq!(second, StageOutcome::Value(json!(1)));

    let terms = store.entities("taxonomy_term");
    assert_eq!(terms.len(), 1);
    assert_eq!(terms[0]["name"], json!("Rust"));
    assert_eq!(terms[0]["vid"], json!("tags"));
    assert_eq!(terms[0]["description"], json!("A systems language"));
    assert_eq!(terms[0]["weight"], json!(0));
    assert_eq!(terms[0]["tid"], json!(1));
}

#[test]
fn plugin_finds_existing_entities() {
    let store = Arc::new(
        InMemoryDestination::from_fixture(json!({
            "entity_keys": {"taxonomy_term": "tid"},
            "entities": {"taxonomy_term": [{"tid": 12, "name": "Go", "vid": "tags"}]}
        }))
        .unwrap(),
    );
    let plugin = generator(
        store.clone(),
        json!({"entity_type": "taxonomy_term", "value_key": "name", "bundle_key": "vid", "bundle": "tags"}),
    );
    let outcome = transform(&plugin, &SourceRow::default(), Some(json!("Go")));
    assert_eq!(outcome, StageOutcome::Value(json!(12)));
    assert_eq!(store.entities("taxonomy_term").len(), 1);
}

#[test]
fn plugin_generates_each_element_of_multiple_values() {
    use migrate_tools::core::process::{PipelineOutcome, ProcessPipeline, ProcessStage, SourceSelector};

    let store = Arc::new(InMemoryDestination::new());
    let plugin = generator(
        store.clone(),
        json!({"entity_type": "taxonomy_term", "value_key": "name"}),
    );
    let pipeline = ProcessPipeline::new(
        "field_tags",
        vec![ProcessStage::new(plugin, Some(SourceSelector::parse("tags")))],
    );
    let row = SourceRow::from_json(json!({"tags": ["Rust", "", "Go", "Rust"]})).unwrap();
    let outcome = pipeline.run(&row, &EntityValueMap::new()).unwrap();
    assert_eq!(outcome, PipelineOutcome::Completed(Some(json!([1, 2, 1]))));
    assert_eq!(store.entities("taxonomy_term").len(), 2);
}

#[test]
fn empty_input_generates_nothing() {
    let store = Arc::new(InMemoryDestination::new());
    let plugin = generator(
        store.clone(),
        json!({"entity_type": "taxonomy_term", "value_key": "name"}),
    );
    assert_eq!(
        transform(&plugin, &SourceRow::default(), None),
        StageOutcome::Unset
    );
    assert_eq!(
        transform(&plugin, &SourceRow::default(), Some(json!(""))),
        StageOutcome::Unset
    );
    assert!(store.entities("taxonomy_term").is_empty());
}

#[test]
fn configuration_is_validated_when_built() {
    let registry = PluginRegistry::with_builtins();
    let deps = PluginDeps::from_store(Arc::new(InMemoryDestination::new()));
    let cases = [
        (json!({"value_key": "name"}), "MIG-CFG-002"),
        (json!({"entity_type": "", "value_key": "name"}), "MIG-CFG-005"),
        (
            json!({"entity_type": "taxonomy_term", "value_key": "name", "bundle": "tags"}),
            "MIG-CFG-005",
        ),
    ];
    for (config, code) in cases {
        let err = registry
            .create("compro_entity_generate", config.as_object().unwrap(), &deps)
            .err()
            .unwrap();
        assert!(err.is_configuration());
        assert_eq!(err.code, code);
    }
}
