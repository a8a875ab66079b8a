use migrate_tools::core::destination::{
    DestinationQuery, EntityValueMap, ExistenceChecker, ExistenceQuery, InMemoryDestination,
};
use migrate_tools::core::error::AppError;
use migrate_tools::core::process::plugins::skip_row::{evaluate, GateDecision, RowGate};
use migrate_tools::core::process::{PluginDeps, PluginRegistry, ProcessPlugin, RowContext, StageOutcome};
use migrate_tools::core::row::SourceRow;
use migrate_tools::core::types::ErrorCategory;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

fn destination() -> Arc<InMemoryDestination> {
    let store = InMemoryDestination::from_fixture(json!({
        "entities": {
            "node": [{"nid": 7, "title": "Existing"}],
            "user": [{"uid": 3, "name": "ada"}]
        }
    }))
    .unwrap();
    Arc::new(store)
}

fn plugin(id: &str, config: Value) -> Arc<dyn ProcessPlugin> {
    PluginRegistry::with_builtins()
        .create(
            id,
            config.as_object().unwrap(),
            &PluginDeps::from_store(destination()),
        )
        .unwrap()
}

fn run(plugin: &Arc<dyn ProcessPlugin>, value: Option<Value>) -> StageOutcome {
    let row = SourceRow::default();
    let destination = EntityValueMap::new();
    let ctx = RowContext::new(&row, "uid", &destination);
    plugin.transform(value, &ctx).unwrap()
}

struct FailingQuery;

impl DestinationQuery for FailingQuery {
    fn count(&self, _query: &ExistenceQuery) -> Result<u64, AppError> {
        Err(AppError::new(ErrorCategory::QueryError, "destination unavailable")
            .with_code("MIG-QRY-001"))
    }
}

struct FixedCount {
    count: u64,
    seen: Mutex<Vec<ExistenceQuery>>,
}

impl DestinationQuery for FixedCount {
    fn count(&self, query: &ExistenceQuery) -> Result<u64, AppError> {
        self.seen.lock().unwrap().push(query.clone());
        Ok(self.count)
    }
}

#[test]
fn polarity_truth_table() {
    assert_eq!(evaluate(1, false), GateDecision::Skip);
    assert_eq!(evaluate(3, false), GateDecision::Skip);
    assert_eq!(evaluate(0, false), GateDecision::Pass);
    assert_eq!(evaluate(1, true), GateDecision::Pass);
    assert_eq!(evaluate(0, true), GateDecision::Skip);
}

#[test]
fn exists_gate_skips_when_entity_matches() {
    let gate = plugin(
        "skip_row_if_entity_exists",
        json!({"message": "Node already migrated."}),
    );
    assert_eq!(
        run(&gate, Some(json!(7))),
        StageOutcome::SkipRow {
            message: "Node already migrated.".to_string()
        }
    );
    assert_eq!(run(&gate, Some(json!(8))), StageOutcome::Value(json!(8)));
}

#[test]
fn exists_gate_matches_numeric_strings() {
    let gate = plugin("skip_row_if_entity_exists", json!({}));
    assert!(run(&gate, Some(json!("7"))).is_skip());
}

#[test]
fn inverse_exists_gate_passes_existing_values_unchanged() {
    let gate = plugin(
        "skip_row_if_entity_exists",
        json!({"entity_type": "user", "property_name": "uid", "inverse_check": true}),
    );
    assert_eq!(run(&gate, Some(json!(3))), StageOutcome::Value(json!(3)));
    assert_eq!(
        run(&gate, Some(json!(4))),
        StageOutcome::SkipRow {
            message: String::new()
        }
    );
}

#[test]
fn not_exist_gate_skips_missing_entities() {
    let gate = plugin(
        "skip_row_if_entity_not_exist",
        json!({"entity_type": "user", "property_name": "uid", "message": "User entity not found."}),
    );
    assert_eq!(
        run(&gate, Some(json!(99))),
        StageOutcome::SkipRow {
            message: "User entity not found.".to_string()
        }
    );
    assert_eq!(run(&gate, Some(json!(3))), StageOutcome::Value(json!(3)));
}

#[test]
fn user_uid_inverse_with_zero_matches_skips_and_passes_on_match() {
    let query = Arc::new(FixedCount {
        count: 0,
        seen: Mutex::new(Vec::new()),
    });
    let gate = RowGate::new(ExistenceChecker::new(query.clone(), "user", "uid"), true, "");
    assert_eq!(gate.decide(&json!(12)).unwrap(), GateDecision::Skip);

    let seen = query.seen.lock().unwrap();
    assert_eq!(seen[0].entity_type, "user");
    assert_eq!(seen[0].property_name, "uid");
    assert_eq!(seen[0].value, json!(12));
}

#[test]
fn non_inverse_gate_with_zero_matches_passes_value_through() {
    let query = Arc::new(FixedCount {
        count: 0,
        seen: Mutex::new(Vec::new()),
    });
    let gate = RowGate::new(ExistenceChecker::new(query, "user", "uid"), false, "");
    assert_eq!(
        gate.apply(Some(json!("abc"))).unwrap(),
        StageOutcome::Value(json!("abc"))
    );
}

#[test]
fn defaults_target_node_nid() {
    let query = Arc::new(FixedCount {
        count: 0,
        seen: Mutex::new(Vec::new()),
    });
    let deps = PluginDeps::new(query.clone(), Arc::new(InMemoryDestination::new()));
    let gate = PluginRegistry::with_builtins()
        .create(
            "skip_row_if_entity_exists",
            json!({"entity_type": "", "property_name": " "}).as_object().unwrap(),
            &deps,
        )
        .unwrap();
    run(&gate, Some(json!(1)));
    let seen = query.seen.lock().unwrap();
    assert_eq!(seen[0].entity_type, "node");
    assert_eq!(seen[0].property_name, "nid");
}

#[test]
fn missing_value_is_checked_as_null() {
    let query = Arc::new(FixedCount {
        count: 0,
        seen: Mutex::new(Vec::new()),
    });
    let gate = RowGate::new(ExistenceChecker::new(query.clone(), "node", "nid"), true, "gone");
    assert!(gate.apply(None).unwrap().is_skip());
    assert_eq!(query.seen.lock().unwrap()[0].value, Value::Null);
}

#[test]
fn query_failure_is_an_error_not_a_count() {
    let gate = RowGate::new(
        ExistenceChecker::new(Arc::new(FailingQuery), "user", "uid"),
        true,
        "",
    );
    let err = gate.apply(Some(json!(1))).unwrap_err();
    assert_eq!(err.category, ErrorCategory::QueryError);
    assert_eq!(err.code, "MIG-QRY-001");
}

#[test]
fn legacy_option_names_are_rejected() {
    let deps = PluginDeps::from_store(destination());
    let registry = PluginRegistry::with_builtins();
    for (id, config) in [
        ("skip_row_if_entity_exists", json!({"entity": "user"})),
        ("skip_row_if_entity_not_exist", json!({"property": "uid"})),
    ] {
        let err = registry
            .create(id, config.as_object().unwrap(), &deps)
            .err()
            .unwrap();
        assert_eq!(err.code, "MIG-CFG-004");
    }
}

#[test]
fn not_exist_gate_does_not_accept_inverse_check() {
    let deps = PluginDeps::from_store(destination());
    let err = PluginRegistry::with_builtins()
        .create(
            "skip_row_if_entity_not_exist",
            json!({"inverse_check": true}).as_object().unwrap(),
            &deps,
        )
        .err()
        .unwrap();
    assert_eq!(err.code, "MIG-CFG-002");
}

#[test]
fn gate_checks_multiple_values_in_one_query() {
    use migrate_tools::core::process::{
        PipelineOutcome, ProcessPipeline, ProcessStage, SourceSelector,
    };

    let gate = plugin(
        "skip_row_if_entity_not_exist",
        json!({"entity_type": "user", "property_name": "uid"}),
    );
    let pipeline = ProcessPipeline::new(
        "uid",
        vec![ProcessStage::new(gate, Some(SourceSelector::parse("authors")))],
    );

    let row = SourceRow::from_json(json!({"authors": [3, 4]})).unwrap();
    assert_eq!(
        pipeline.run(&row, &EntityValueMap::new()).unwrap(),
        PipelineOutcome::Completed(Some(json!([3, 4])))
    );

    let row = SourceRow::from_json(json!({"authors": [4, 5]})).unwrap();
    assert!(matches!(
        pipeline.run(&row, &EntityValueMap::new()).unwrap(),
        PipelineOutcome::SkipRow { .. }
    ));
}
