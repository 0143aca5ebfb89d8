use model_vault::deploy::TEXTS_VERIFICATION;
use model_vault::{ModelStore, ModelStoreExt, ModelType, SaveRequest};

use crate::deployer;
use crate::support::fixtures::{alice, bob, seed_order_app, FORM_ID};

#[test]
fn texts_are_created_once_then_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let (deployer, _) = deployer(dir.path());
    let app = seed_order_app(deployer.store().as_ref(), &alice());

    let first = deployer.gather_texts(&app, &alice()).unwrap().unwrap();
    assert_eq!(first.model_type, ModelType::Translation);
    assert_eq!(first.key, "order");
    assert_eq!(first.comment.as_deref(), Some("Translations for Order"));

    let second = deployer.gather_texts(&app, &bob()).unwrap().unwrap();
    assert_eq!(second, first);
    assert_eq!(
        deployer.store().model_count(ModelType::Translation).unwrap(),
        1
    );
}

#[test]
fn changed_labels_produce_a_new_version() {
    let dir = tempfile::tempdir().unwrap();
    let (deployer, _) = deployer(dir.path());
    let store = deployer.store();
    let app = seed_order_app(store.as_ref(), &alice());
    deployer.gather_texts(&app, &alice()).unwrap();

    store
        .save_model_by_id(FORM_ID, SaveRequest::new(alice()).name("Order approval"))
        .unwrap();

    let updated = deployer.gather_texts(&app, &bob()).unwrap().unwrap();
    assert_eq!(updated.comment.as_deref(), Some(TEXTS_VERIFICATION));
    assert_eq!(updated.last_updated_by.as_deref(), Some("bob"));
    assert_eq!(
        updated.editor_json.unwrap()["approval"]["default"],
        "Order approval"
    );
}
