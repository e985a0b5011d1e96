//! # Controllers
//!
//! One kube-runtime `Controller` per watched kind, with the related kinds
//! that re-trigger its keys:
//!
//! | controller | primary | also triggered by |
//! |---|---|---|
//! | secretexport | SecretExport | Secret of the same name |
//! | secretimport, secretrequest, secretexportapproval | requester | see below |
//! | placeholder | Secret | docker config Secrets, SecretExports, Namespaces |
//! | secrettemplate | SecretTemplate | owned Secrets |
//! | password | Password | owned Secrets |
//!
//! Requesters are also triggered by owned Secrets, SecretExports, source
//! Secrets and Namespaces.

use super::initialization::InitializationResult;
use super::watch_loop::{dispatcher_config, primary_watch, run_watch_loop, ControllerContext};
use super::watches::{
    export_for_secret, placeholders_for_export, placeholders_for_secret, placeholders_in_namespace,
    requesters_for_export, requesters_for_secret, requesters_in_namespace,
};
use crate::constants::DOCKER_CONFIG_JSON_TYPE;
use crate::controller::generator::RandomPasswordGenerator;
use crate::controller::reconciler::{
    ExportReconciler, PasswordReconciler, PlaceholderReconciler, RequesterReconciler,
    SecretRequester, TemplateReconciler,
};
use crate::crd::{
    Password, SecretExport, SecretExportApproval, SecretImport, SecretRequest, SecretTemplate,
};
use crate::store::KubeStore;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::api::Api;
use kube::Client;
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use tracing::info;

fn export_controller(client: &Client, init: &InitializationResult) -> Controller<SecretExport> {
    Controller::new(Api::<SecretExport>::all(client.clone()), primary_watch())
        .with_config(dispatcher_config(&init.controller_config))
        .watches(
            Api::<Secret>::all(client.clone()),
            watcher::Config::default(),
            |secret| export_for_secret(&secret),
        )
}

fn requester_controller<K: SecretRequester>(
    client: &Client,
    init: &InitializationResult,
) -> Controller<K> {
    let controller = Controller::new(Api::<K>::all(client.clone()), primary_watch())
        .with_config(dispatcher_config(&init.controller_config));
    let by_export = controller.store();
    let by_secret = by_export.clone();
    let by_namespace = by_export.clone();

    controller
        .owns(Api::<Secret>::all(client.clone()), watcher::Config::default())
        .watches(
            Api::<SecretExport>::all(client.clone()),
            watcher::Config::default(),
            move |export| requesters_for_export(&export, &by_export.state()),
        )
        .watches(
            Api::<Secret>::all(client.clone()),
            watcher::Config::default(),
            move |secret| requesters_for_secret(&secret, &by_secret.state()),
        )
        .watches(
            Api::<Namespace>::all(client.clone()),
            watcher::Config::default(),
            move |namespace| requesters_in_namespace(&namespace, &by_namespace.state()),
        )
}

fn placeholder_controller(client: &Client, init: &InitializationResult) -> Controller<Secret> {
    let controller = Controller::new(Api::<Secret>::all(client.clone()), primary_watch())
        .with_config(dispatcher_config(&init.controller_config));
    let by_secret = controller.store();
    let by_export = by_secret.clone();
    let by_namespace = by_secret.clone();

    controller
        .watches(
            Api::<Secret>::all(client.clone()),
            watcher::Config::default().fields(&format!("type={DOCKER_CONFIG_JSON_TYPE}")),
            move |secret| placeholders_for_secret(&secret, &by_secret.state()),
        )
        .watches(
            Api::<SecretExport>::all(client.clone()),
            watcher::Config::default(),
            move |export| placeholders_for_export(&export, &by_export.state()),
        )
        .watches(
            Api::<Namespace>::all(client.clone()),
            watcher::Config::default(),
            move |namespace| placeholders_in_namespace(&namespace, &by_namespace.state()),
        )
}

fn owning_controller<K>(client: &Client, init: &InitializationResult) -> Controller<K>
where
    K: crate::store::StoredObject,
{
    Controller::new(Api::<K>::all(client.clone()), primary_watch())
        .with_config(dispatcher_config(&init.controller_config))
        .owns(Api::<Secret>::all(client.clone()), watcher::Config::default())
}

async fn run_requester<K: SecretRequester>(init: &InitializationResult) {
    let ctx = Arc::new(ControllerContext::new(
        RequesterReconciler::<KubeStore, K>::new(Arc::clone(&init.store), Arc::clone(&init.warmed)),
        &init.controller_config,
    ));
    run_watch_loop(
        || requester_controller::<K>(&init.client, init),
        ctx,
        Arc::clone(&init.server_state),
        init.controller_config.clone(),
    )
    .await;
}

/// Run every controller until shutdown
pub async fn run_controllers(init: InitializationResult) {
    let config = &init.controller_config;
    let server_state = &init.server_state;
    let client = &init.client;

    let export_ctx = Arc::new(ControllerContext::new(
        ExportReconciler::new(Arc::clone(&init.store), Arc::clone(init.warmed.exports())),
        config,
    ));
    let placeholder_ctx = Arc::new(ControllerContext::new(
        PlaceholderReconciler::new(
            Arc::clone(&init.store),
            Arc::clone(&init.warmed),
            config.placeholder_resync(),
        ),
        config,
    ));
    let template_ctx = Arc::new(ControllerContext::new(
        TemplateReconciler::new(Arc::clone(&init.store), config.template_resync()),
        config,
    ));
    let password_ctx = Arc::new(ControllerContext::new(
        PasswordReconciler::new(Arc::clone(&init.store), Arc::new(RandomPasswordGenerator)),
        config,
    ));

    info!("Starting controllers");
    tokio::join!(
        run_watch_loop(
            || export_controller(client, &init),
            export_ctx,
            Arc::clone(server_state),
            config.clone(),
        ),
        run_requester::<SecretImport>(&init),
        run_requester::<SecretRequest>(&init),
        run_requester::<SecretExportApproval>(&init),
        run_watch_loop(
            || placeholder_controller(client, &init),
            placeholder_ctx,
            Arc::clone(server_state),
            config.clone(),
        ),
        run_watch_loop(
            || owning_controller::<SecretTemplate>(client, &init),
            template_ctx,
            Arc::clone(server_state),
            config.clone(),
        ),
        run_watch_loop(
            || owning_controller::<Password>(client, &init),
            password_ctx,
            Arc::clone(server_state),
            config.clone(),
        ),
    );
    info!("All controllers stopped");
}
