use std::fs::File;
use std::io::Read;
use std::sync::Arc;

use model_vault::deploy::DeploymentResource;
use model_vault::{
    ArchiveDeploymentService, DeployError, Deployer, DeploymentBundle, DeploymentService,
    FileSystemModelStore, Model, ModelStore, ModelStoreExt, ModelType, SaveRequest,
};

use crate::support::fixtures::{alice, app_json, order_process_json, seed_order_app, APP_ID};

fn archive_deployer(
    root: &std::path::Path,
) -> (
    Deployer<Arc<FileSystemModelStore>>,
    ArchiveDeploymentService,
    Arc<FileSystemModelStore>,
) {
    crate::support::fixtures::init_tracing();
    let store = Arc::new(FileSystemModelStore::new(root.join("models")));
    let service = ArchiveDeploymentService::new(root.join("deployments"));
    let deployer = Deployer::new(store.clone(), Arc::new(service.clone()));
    (deployer, service, store)
}

#[test]
fn deployment_is_written_as_business_archive() {
    let dir = tempfile::tempdir().unwrap();
    let (deployer, service, store) = archive_deployer(dir.path());
    let app = seed_order_app(store.as_ref(), &alice());

    deployer.deploy(&app, &alice()).unwrap().unwrap();

    let path = service.archive_path("order");
    let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
    assert_eq!(archive.len(), 4);
    let mut bpmn = String::new();
    archive
        .by_name("order-process.bpmn")
        .unwrap()
        .read_to_string(&mut bpmn)
        .unwrap();
    assert!(bpmn.starts_with("<?xml"));

    // redeploying replaces the archive
    deployer.deploy(&app, &alice()).unwrap().unwrap();
    assert_eq!(std::fs::read_dir(service.dir()).unwrap().count(), 1);
}

#[test]
fn colliding_resource_names_keep_the_previous_archive() {
    let dir = tempfile::tempdir().unwrap();
    let (deployer, service, store) = archive_deployer(dir.path());
    let app = seed_order_app(store.as_ref(), &alice());
    deployer.deploy(&app, &alice()).unwrap().unwrap();
    let deployed = std::fs::read(service.archive_path("order")).unwrap();

    for key in ["order process", "orderprocess"] {
        store
            .create_model(
                Model::new(ModelType::Process, key, key).with_editor_json(order_process_json()),
                &alice(),
            )
            .unwrap();
    }
    let app = store
        .save_model_by_id(
            APP_ID,
            SaveRequest::new(alice())
                .editor_json(app_json(&["{bpmn-order process}", "{bpmn-orderprocess}"])),
        )
        .unwrap();

    match deployer.deploy(&app, &alice()) {
        Err(DeployError::DuplicateResource { app_key, name }) => {
            assert_eq!(app_key, "order");
            assert_eq!(name, "orderprocess.bpmn");
        }
        other => panic!("expected a duplicate resource, got {:?}", other),
    }
    assert_eq!(std::fs::read(service.archive_path("order")).unwrap(), deployed);
    assert_eq!(std::fs::read_dir(service.dir()).unwrap().count(), 1);
}

#[test]
fn failed_archive_write_leaves_the_old_archive_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let service = ArchiveDeploymentService::new(dir.path());

    let mut bundle = DeploymentBundle::new("Order", "order");
    bundle.add("order.bpmn", b"<definitions/>".to_vec()).unwrap();
    service.deploy(bundle.clone()).unwrap();
    let deployed = std::fs::read(service.archive_path("order")).unwrap();

    // bypass `add` so the writer meets the same entry twice
    bundle.resources.push(DeploymentResource {
        name: "order.bpmn".into(),
        bytes: b"<definitions id=\"second\"/>".to_vec(),
    });
    assert!(matches!(service.deploy(bundle), Err(DeployError::Sink(_))));

    assert_eq!(std::fs::read(service.archive_path("order")).unwrap(), deployed);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}
