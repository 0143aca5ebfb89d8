use model_vault::{DeployError, Model, ModelStore, ModelType};

use crate::deployer;
use crate::support::fixtures::{alice, app_json, seed_order_app, PROCESS_ID};

fn text(bytes: &[u8]) -> String {
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ============================================================================
// Bundle contents
// ============================================================================

#[test]
fn bundle_holds_process_form_table_and_texts() {
    let dir = tempfile::tempdir().unwrap();
    let (deployer, service) = deployer(dir.path());
    let app = seed_order_app(deployer.store().as_ref(), &alice());

    let deployment = deployer.deploy(&app, &alice()).unwrap().unwrap();
    assert_eq!(deployment.key, "order");
    assert_eq!(
        deployment.resources,
        vec![
            "order-process.bpmn",
            "form-approval.form",
            "dmn-risk.dmn",
            "translations.json"
        ]
    );

    let bundle = service.latest_bundle("order").unwrap().unwrap();
    let bpmn = text(&bundle.resource("order-process.bpmn").unwrap().bytes);
    assert!(bpmn.contains(r#"<process id="orderProcess""#));
    assert!(bpmn.contains(r#"activiti:initiator="initiator""#));
    assert!(bpmn.contains(r#"activiti:assignee="${initiator}""#));
    assert!(bpmn.contains(r#"activiti:formKey="approval""#));
    assert!(bpmn.contains("decisionTableReferenceKey"));

    let form: serde_json::Value =
        serde_json::from_slice(&bundle.resource("form-approval.form").unwrap().bytes).unwrap();
    assert_eq!(form["fields"][0]["id"], "amount");

    let dmn = text(&bundle.resource("dmn-risk.dmn").unwrap().bytes);
    assert!(dmn.contains(r#"<decision id="risk""#));

    let texts: serde_json::Value =
        serde_json::from_slice(&bundle.resource("translations.json").unwrap().bytes).unwrap();
    assert_eq!(texts["order-process.approve"]["default"], "Approve order");
    assert_eq!(texts["approval.decision.option_1"]["default"], "Reject");
}

#[test]
fn missing_process_deploys_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (deployer, service) = deployer(dir.path());
    let app = deployer
        .store()
        .create_model(
            Model::new(ModelType::App, "broken", "Broken").with_editor_json(app_json(&["{bpmn-ghost}"])),
            &alice(),
        )
        .unwrap();

    let err = deployer.deploy(&app, &alice()).unwrap_err();
    assert_eq!(
        err,
        DeployError::MissingModel {
            model_id: "{bpmn-ghost}".into(),
            app_id: "{app-broken}".into(),
        }
    );
    assert!(service.deployments().unwrap().is_empty());
}

#[test]
fn app_without_models_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let (deployer, service) = deployer(dir.path());
    let app = deployer
        .store()
        .create_model(
            Model::new(ModelType::App, "empty", "Empty").with_editor_json(app_json(&[])),
            &alice(),
        )
        .unwrap();

    assert!(deployer.build_bundle(&app, &alice()).unwrap().is_none());
    assert!(deployer.deploy(&app, &alice()).unwrap().is_none());
    assert!(service.deployments().unwrap().is_empty());
}

#[test]
fn deploy_all_skips_failing_apps() {
    let dir = tempfile::tempdir().unwrap();
    let (deployer, service) = deployer(dir.path());
    let store = deployer.store().as_ref();
    seed_order_app(store, &alice());
    store
        .create_model(
            Model::new(ModelType::App, "broken", "Broken")
                .with_editor_json(app_json(&[PROCESS_ID, "{bpmn-ghost}"])),
            &alice(),
        )
        .unwrap();

    let deployments = deployer.deploy_all(&alice()).unwrap();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].key, "order");
    assert_eq!(service.deployments().unwrap().len(), 1);
}

// ============================================================================
// Stored editor JSON
// ============================================================================

#[test]
fn app_without_inline_json_reads_texts_from_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let (deployer, service) = deployer(dir.path());
    let mut app = seed_order_app(deployer.store().as_ref(), &alice());
    app.editor_json = None;

    deployer.deploy(&app, &alice()).unwrap().unwrap();

    let bundle = service.latest_bundle("order").unwrap().unwrap();
    let texts: serde_json::Value =
        serde_json::from_slice(&bundle.resource("translations.json").unwrap().bytes).unwrap();
    assert!(!texts.is_null());
    assert_eq!(texts["order-process.approve"]["default"], "Approve order");
}

#[test]
fn building_a_bundle_records_texts_but_deploys_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (deployer, service) = deployer(dir.path());
    let store = deployer.store().as_ref();
    let app = seed_order_app(store, &alice());
    assert_eq!(store.model_count(ModelType::Translation).unwrap(), 0);

    let bundle = deployer.build_bundle(&app, &alice()).unwrap().unwrap();

    assert!(bundle.resource("translations.json").is_some());
    assert_eq!(store.model_count(ModelType::Translation).unwrap(), 1);
    assert!(service.deployments().unwrap().is_empty());
}
