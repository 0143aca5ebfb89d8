mod support;

use std::fs;
use std::sync::Arc;

use model_vault::{
    ClassPathModelStore, DeleteOptions, FileSystemModelStore, InMemoryModelStore, Model,
    ModelError, ModelStore, ModelType, MultiModelStore, RoutingTable,
};
use serde_json::json;
use support::fixtures::{alice, init_tracing};

fn bundled(dir: &std::path::Path, key: &str, name: &str) {
    let path = dir.join("models/bpmn");
    fs::create_dir_all(&path).unwrap();
    fs::write(
        path.join(format!("{}.json", key)),
        serde_json::to_vec(&json!({"name": name, "modelEditorJson": {}})).unwrap(),
    )
    .unwrap();
}

// ============================================================================
// Routing
// ============================================================================

#[test]
fn ids_stick_to_the_backend_that_served_them() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    bundled(&dir.path().join("cp"), "shipped", "Shipped");

    let files = Arc::new(FileSystemModelStore::new(dir.path().join("fs")));
    let class_path = Arc::new(ClassPathModelStore::new(vec![dir.path().join("cp")], "models"));
    let store = MultiModelStore::new(vec![files.clone() as Arc<dyn ModelStore>, class_path]);

    let shipped = store.get_model("{bpmn-shipped}").unwrap();
    assert_eq!(shipped.name, "Shipped");

    // a colliding model appears in the default backend later
    files
        .create_model(Model::new(ModelType::Process, "shipped", "Local copy"), &alice())
        .unwrap();

    assert_eq!(store.get_model("{bpmn-shipped}").unwrap().name, "Shipped");
    assert!(matches!(
        store.save_model(shipped),
        Err(ModelError::ReadOnly { .. })
    ));
    assert_eq!(store.routing_table().route("{bpmn-shipped}").unwrap(), Some(1));
}

#[test]
fn new_models_go_to_the_default_backend() {
    let first = Arc::new(InMemoryModelStore::new());
    let second = Arc::new(InMemoryModelStore::new());
    let store = MultiModelStore::new(vec![first.clone() as Arc<dyn ModelStore>, second.clone()]);

    let created = store
        .create_model(
            Model::new(ModelType::Form, "invoice", "Invoice").with_id("{form-invoice}"),
            &alice(),
        )
        .unwrap();

    assert_eq!(first.len().unwrap(), 1);
    assert!(second.is_empty().unwrap());
    assert_eq!(store.get_model(created.id().unwrap()).unwrap().name, "Invoice");
}

#[test]
fn listings_claim_ids_and_counts_add_up() {
    let first = Arc::new(InMemoryModelStore::new());
    let second = Arc::new(InMemoryModelStore::new());
    second
        .save_model(Model::new(ModelType::Form, "b", "B").with_id("{form-b}"))
        .unwrap();
    first
        .save_model(Model::new(ModelType::Form, "a", "A").with_id("{form-a}"))
        .unwrap();
    let routing = Arc::new(RoutingTable::new());
    let store = MultiModelStore::with_routing_table(vec![first as Arc<dyn ModelStore>, second.clone()], routing.clone());

    let keys: Vec<_> = store
        .get_models_by_type(ModelType::Form, None)
        .unwrap()
        .into_iter()
        .map(|m| m.key)
        .collect();
    assert_eq!(keys, vec!["a", "b"]);
    assert_eq!(routing.route("{form-b}").unwrap(), Some(1));
    assert_eq!(store.model_count(ModelType::Form).unwrap(), 2);

    store
        .delete_model("{form-b}", &DeleteOptions::default(), &alice())
        .unwrap();
    assert!(second.is_empty().unwrap());
}

#[test]
fn key_check_reports_a_holder_in_any_backend() {
    let first = Arc::new(InMemoryModelStore::new());
    let second = Arc::new(InMemoryModelStore::new());
    second
        .save_model(Model::new(ModelType::App, "crm", "CRM").with_id("{app-crm}"))
        .unwrap();
    let store = MultiModelStore::new(vec![first as Arc<dyn ModelStore>, second]);

    let check = store.validate_model_key(None, ModelType::App, "crm").unwrap();
    assert!(check.key_already_exists);
    assert_eq!(check.name.as_deref(), Some("CRM"));
    assert!(!store
        .validate_model_key(None, ModelType::App, "erp")
        .unwrap()
        .key_already_exists);
}

#[test]
fn without_backends_every_call_fails() {
    let store = MultiModelStore::new(Vec::new());
    assert_eq!(store.get_model("{form-a}").unwrap_err(), ModelError::NoBackend);
    assert_eq!(
        store.validate_model_key(None, ModelType::Form, "a").unwrap_err(),
        ModelError::NoBackend
    );
}
