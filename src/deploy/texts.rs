//! Translation texts of an app.
//!
//! Every named or documented element of the app's processes and of the
//! forms they reference contributes an entry keyed by its dotted path:
//!
//! ```text
//! "order-process.approve": { "default": "Approve", "help.default": "..." }
//! "approval-form.amount.option_0": { "default": "Small" }
//! ```

use serde_json::{Map, Value};
use tracing::debug;

use super::{editor_json, AppDefinition, DeployError};
use crate::bpmn::node_text;
use crate::model::{Model, ModelStore, ModelStoreExt, ModelType, SaveRequest, User};

/// Comment of the version created when the texts of an app changed.
pub const TEXTS_VERIFICATION: &str = "Texts verification";

/// Collect the texts of `app` into its translation model.
///
/// The translation model has type `Translation` and the app's key. It is
/// created when missing, stored as a new version when the gathered texts
/// differ, and returned untouched otherwise. Apps without models yield
/// `None`.
pub fn gather_texts<S>(store: &S, app: &Model, user: &User) -> Result<Option<Model>, DeployError>
where
    S: ModelStore + ?Sized,
{
    let app_id = app.id_or_derived()?;
    let definition = AppDefinition::from_json(&editor_json(store, app)?)?;
    if definition.is_empty() {
        return Ok(None);
    }

    let translation = store
        .get_models_by_type(ModelType::Translation, Some(&app.key))?
        .into_iter()
        .find(|m| m.key == app.key);

    let mut texts = match &translation {
        Some(model) => match editor_json(store, model)? {
            Value::Object(map) => map,
            _ => Map::new(),
        },
        None => Map::new(),
    };
    let mut changed = translation.is_none();

    for model_def in &definition.models {
        let process = store
            .get_model(&model_def.id)
            .map_err(|e| DeployError::missing(e, &app_id))?;
        let diagram = editor_json(store, &process)?;
        changed |= gather_diagram_texts(&process.key, &diagram, &mut texts);

        let referenced = store
            .get_referenced_models(&process.id_or_derived()?)
            .map_err(|e| DeployError::missing(e, &app_id))?;
        for child in referenced.iter().filter(|m| m.model_type == ModelType::Form) {
            let form = editor_json(store, child)?;
            changed |= gather_form_texts(&child.key, &form, &mut texts);
        }
    }

    let saved = match translation {
        None => {
            let mut model = Model::new(ModelType::Translation, app.key.clone(), app.name.clone())
                .with_editor_json(Value::Object(texts));
            model.comment = Some(format!("Translations for {}", app.name));
            store.create_model(model, user)?
        }
        Some(model) if changed => {
            debug!(app = %app.key, "texts changed");
            let request = SaveRequest::new(user.clone())
                .editor_json(Value::Object(texts))
                .new_version(TEXTS_VERIFICATION);
            store.save_model_with(model, request)?
        }
        Some(model) => model,
    };
    Ok(Some(saved))
}

fn add_text(key: &str, entry: &mut Map<String, Value>, text: Option<String>) -> bool {
    match text {
        None => entry.remove(key).is_some(),
        Some(text) => {
            if entry.get(key).and_then(Value::as_str) == Some(text.as_str()) {
                return false;
            }
            entry.insert(key.to_string(), Value::String(text));
            true
        }
    }
}

fn add_texts(path: &str, properties: Option<&Value>, texts: &mut Map<String, Value>) -> bool {
    let name = node_text(properties, "name");
    let documentation = node_text(properties, "documentation");
    if name.is_none() && documentation.is_none() {
        return texts.remove(path).is_some();
    }

    let mut changed = false;
    if !texts.get(path).map_or(false, Value::is_object) {
        texts.insert(path.to_string(), Value::Object(Map::new()));
        changed = true;
    }
    if let Some(Value::Object(entry)) = texts.get_mut(path) {
        changed |= add_text("default", entry, name);
        changed |= add_text("help.default", entry, documentation);
    }
    changed
}

fn shapes(node: &Value) -> impl Iterator<Item = &Value> {
    node.get("childShapes")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn gather_diagram_texts(key: &str, diagram: &Value, texts: &mut Map<String, Value>) -> bool {
    let mut changed = add_texts(key, diagram.get("properties"), texts);
    for shape in shapes(diagram) {
        changed |= gather_shape_texts(key, shape, texts);
    }
    changed
}

fn gather_shape_texts(path: &str, shape: &Value, texts: &mut Map<String, Value>) -> bool {
    let properties = shape.get("properties");
    let id = node_text(properties, "overrideid")
        .or_else(|| node_text(Some(shape), "resourceId"))
        .unwrap_or_default();
    let path = format!("{}.{}", path, id);

    let mut changed = add_texts(&path, properties, texts);
    for child in shapes(shape) {
        changed |= gather_shape_texts(&path, child, texts);
    }
    changed
}

fn gather_form_texts(path: &str, form: &Value, texts: &mut Map<String, Value>) -> bool {
    let mut changed = add_texts(path, Some(form), texts);

    let fields = form.get("fields").and_then(Value::as_array);
    for field in fields.into_iter().flatten() {
        let id = node_text(Some(field), "id").unwrap_or_default();
        changed |= gather_form_texts(&format!("{}.{}", path, id), field, texts);
    }

    let options = form.get("options").and_then(Value::as_array);
    for (i, option) in options.into_iter().flatten().enumerate() {
        let id = node_text(Some(option), "id").unwrap_or_else(|| format!("option_{}", i));
        changed |= gather_form_texts(&format!("{}.{}", path, id), option, texts);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diagram_paths_use_override_id_then_resource_id() {
        let diagram = json!({
            "properties": {"name": "Order"},
            "childShapes": [
                {"resourceId": "sid-1", "properties": {"overrideid": "approve", "name": "Approve", "documentation": "Check it"}},
                {"resourceId": "sid-2", "properties": {"name": "Sub"}, "childShapes": [
                    {"resourceId": "sid-3", "properties": {"name": "Inner"}}
                ]},
                {"resourceId": "sid-4", "properties": {}}
            ]
        });
        let mut texts = Map::new();
        assert!(gather_diagram_texts("order", &diagram, &mut texts));
        assert_eq!(
            Value::Object(texts.clone()),
            json!({
                "order": {"default": "Order"},
                "order.approve": {"default": "Approve", "help.default": "Check it"},
                "order.sid-2": {"default": "Sub"},
                "order.sid-2.sid-3": {"default": "Inner"}
            })
        );
        assert!(!gather_diagram_texts("order", &diagram, &mut texts));
    }

    #[test]
    fn form_options_fall_back_to_index() {
        let form = json!({
            "name": "Approval",
            "fields": [{"id": "size", "name": "Size", "options": [{"name": "Small"}, {"id": "l", "name": "Large"}]}]
        });
        let mut texts = Map::new();
        gather_form_texts("approval", &form, &mut texts);
        assert_eq!(texts["approval.size.option_0"], json!({"default": "Small"}));
        assert_eq!(texts["approval.size.l"], json!({"default": "Large"}));
    }

    #[test]
    fn removed_texts_count_as_change() {
        let mut texts = Map::new();
        texts.insert("p.a".into(), json!({"default": "A"}));
        let diagram = json!({"childShapes": [{"resourceId": "a", "properties": {}}]});
        assert!(gather_diagram_texts("p", &diagram, &mut texts));
        assert!(!texts.contains_key("p.a"));

        let mut entry = Map::new();
        entry.insert("default".into(), json!("A"));
        entry.insert("help.default".into(), json!("old"));
        assert!(add_text("help.default", &mut entry, None));
        assert!(!add_text("default", &mut entry, Some("A".into())));
    }
}
