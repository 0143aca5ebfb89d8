//! Models shared by the integration suites.
//!
//! The order app bundles one process, `order-process`, whose approval task
//! uses the `approval` form and whose decision task uses the `risk` table.

#![allow(dead_code)]

use model_vault::{Model, ModelStore, ModelType, User};
use serde_json::{json, Value};

pub const FORM_ID: &str = "{form-approval}";
pub const TABLE_ID: &str = "{decisiontable-risk}";
pub const PROCESS_ID: &str = "{bpmn-order-process}";
pub const APP_ID: &str = "{app-order}";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn alice() -> User {
    User::new("alice").with_password("secret")
}

pub fn bob() -> User {
    User::new("bob")
}

fn shape(id: &str, stencil: &str, properties: Value, outgoing: &[&str]) -> Value {
    json!({
        "resourceId": id,
        "stencil": {"id": stencil},
        "properties": properties,
        "outgoing": outgoing.iter().map(|o| json!({"resourceId": o})).collect::<Vec<_>>(),
        "childShapes": []
    })
}

fn flow(id: &str, target: &str) -> Value {
    json!({
        "resourceId": id,
        "stencil": {"id": "SequenceFlow"},
        "properties": {},
        "outgoing": [{"resourceId": target}],
        "target": {"resourceId": target}
    })
}

pub fn order_process_json() -> Value {
    json!({
        "resourceId": "canvas",
        "properties": {
            "process_id": "orderProcess",
            "name": "Order process",
            "documentation": "Handles incoming orders"
        },
        "stencil": {"id": "BPMNDiagram"},
        "childShapes": [
            shape("sid-start", "StartNoneEvent", json!({"name": "Order received"}), &["sid-f1"]),
            shape("sid-approve", "UserTask", json!({
                "overrideid": "approve",
                "name": "Approve order",
                "documentation": "Check the amount",
                "usertaskassignment": {"assignment": {"assignee": "$INITIATOR"}},
                "formreference": {"id": FORM_ID, "name": "Approval"}
            }), &["sid-f2"]),
            shape("sid-risk", "DecisionTask", json!({
                "overrideid": "rate",
                "name": "Rate risk",
                "decisiontaskdecisiontablereference": {"id": TABLE_ID, "name": "Risk"}
            }), &["sid-f3"]),
            shape("sid-end", "EndNoneEvent", json!({}), &[]),
            flow("sid-f1", "sid-approve"),
            flow("sid-f2", "sid-risk"),
            flow("sid-f3", "sid-end"),
        ]
    })
}

pub fn approval_form_json() -> Value {
    json!({
        "name": "Approval",
        "fields": [
            {"id": "amount", "name": "Amount", "type": "integer"},
            {"id": "decision", "name": "Decision", "type": "radio-buttons", "options": [
                {"name": "Accept"},
                {"name": "Reject"}
            ]}
        ]
    })
}

pub fn risk_table_json() -> Value {
    json!({
        "hitIndicator": "FIRST",
        "inputExpressions": [{"id": "in1", "label": "Amount", "variableId": "amount", "type": "number"}],
        "outputExpressions": [{"id": "out1", "label": "Risk", "variableId": "risk", "type": "string"}],
        "rules": [{"in1": "> 1000", "out1": "\"high\""}, {"in1": "<= 1000", "out1": "\"low\""}]
    })
}

pub fn app_json(model_ids: &[&str]) -> Value {
    json!({
        "models": model_ids.iter().map(|id| json!({"id": id})).collect::<Vec<_>>(),
        "theme": "theme-1"
    })
}

/// Create form, table, process and app; returns the app.
pub fn seed_order_app(store: &dyn ModelStore, user: &User) -> Model {
    store
        .create_model(
            Model::new(ModelType::Form, "approval", "Approval")
                .with_id(FORM_ID)
                .with_editor_json(approval_form_json()),
            user,
        )
        .unwrap();
    store
        .create_model(
            Model::new(ModelType::DecisionTable, "risk", "Risk")
                .with_id(TABLE_ID)
                .with_editor_json(risk_table_json()),
            user,
        )
        .unwrap();
    store
        .create_model(
            Model::new(ModelType::Process, "order-process", "Order process")
                .with_id(PROCESS_ID)
                .with_editor_json(order_process_json()),
            user,
        )
        .unwrap();
    store
        .create_model(
            Model::new(ModelType::App, "order", "Order")
                .with_id(APP_ID)
                .with_editor_json(app_json(&[PROCESS_ID])),
            user,
        )
        .unwrap()
}
