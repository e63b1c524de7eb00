//! KubeSnooze reconciler
//!
//! Each KubeSnooze becomes a runner ServiceAccount with its Role and
//! RoleBinding, a sleep CronJob and (optionally) a wake CronJob in the
//! resource's namespace. Everything is server-side applied and owned by
//! the KubeSnooze, so deleting it cleans up through garbage collection.


use crate::config::ControllerConfig;
use crate::resources::{
    self, condition, set_condition, CONDITION_READY, REASON_INVALID_SELECTOR, REASON_RECONCILED,
};
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector as KubeLabelSelector;
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use snooze_lib::crd::{KubeSnooze, KubeSnoozeStatus};
use snooze_lib::{Action as SnoozeAction, LabelSelector, SnoozeLogger, PROTECTED_NAMESPACE};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const FIELD_MANAGER: &str = "kubesnooze-controller";

/// Periodic resync of healthy resources
const RESYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Delay before a failed reconcile is retried
pub const ERROR_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("KubeSnooze is missing {0}")]
    MissingMetadata(&'static str),
}

/// Shared reconciler state
pub struct Context {
    pub client: Client,
    pub config: ControllerConfig,
    pub logger: SnoozeLogger,
}

impl Context {
    pub fn new(client: Client, config: ControllerConfig) -> Self {
        Self {
            client,
            config,
            logger: SnoozeLogger::new("controller"),
        }
    }
}

/// Convert the resource selector into the runner's selector string form.
/// An empty selector would match every workload and is rejected.
pub fn runner_selector(selector: &KubeLabelSelector) -> Result<LabelSelector, Error> {
    let selector =
        LabelSelector::from_kube(selector).map_err(|e| Error::InvalidSelector(e.to_string()))?;
    if selector.is_empty() {
        return Err(Error::InvalidSelector("selector must not be empty".to_string()));
    }
    Ok(selector)
}

pub async fn reconcile(snooze: Arc<KubeSnooze>, ctx: Arc<Context>) -> Result<Action, Error> {
    let namespace = snooze
        .namespace()
        .ok_or(Error::MissingMetadata("namespace"))?;
    let name = snooze.name_any();

    if namespace == PROTECTED_NAMESPACE {
        ctx.logger.log_ignored_namespace(&namespace);
        return Ok(Action::await_change());
    }

    let snoozes: Api<KubeSnooze> = Api::namespaced(ctx.client.clone(), &namespace);

    let selector = match runner_selector(&snooze.spec.selector) {
        Ok(selector) => selector,
        Err(e) => {
            let mut status = snooze.status.clone().unwrap_or_default();
            set_condition(
                &mut status.conditions,
                condition(
                    CONDITION_READY,
                    false,
                    REASON_INVALID_SELECTOR,
                    e.to_string(),
                    snooze.metadata.generation,
                ),
            );
            if let Err(status_err) = patch_status(&snoozes, &name, &status).await {
                warn!(
                    name = %name,
                    namespace = %namespace,
                    error = %status_err,
                    "Failed to record selector error"
                );
            }
            return Err(e);
        }
    };

    let owner = snooze
        .controller_owner_ref(&())
        .ok_or(Error::MissingMetadata("uid"))?;

    ensure_rbac(&ctx.client, &namespace, &owner).await?;

    let cron_jobs: Api<CronJob> = Api::namespaced(ctx.client.clone(), &namespace);
    let sleep = resources::runner_cron_job(
        &snooze,
        SnoozeAction::Sleep,
        &snooze.spec.sleep_cron,
        &selector,
        &ctx.config.runner_image,
        &owner,
    );
    apply(&cron_jobs, &resources::cron_job_name(&name, SnoozeAction::Sleep), &sleep).await?;

    let wake_name = resources::cron_job_name(&name, SnoozeAction::Wake);
    match snooze.spec.wake_schedule() {
        Some(schedule) => {
            let wake = resources::runner_cron_job(
                &snooze,
                SnoozeAction::Wake,
                schedule,
                &selector,
                &ctx.config.runner_image,
                &owner,
            );
            apply(&cron_jobs, &wake_name, &wake).await?;
        }
        None => delete_if_present(&cron_jobs, &wake_name).await?,
    }

    let mut status = snooze.status.clone().unwrap_or_default();
    status.observed_generation = snooze.metadata.generation;
    set_condition(
        &mut status.conditions,
        condition(
            CONDITION_READY,
            true,
            REASON_RECONCILED,
            "CronJobs are configured",
            snooze.metadata.generation,
        ),
    );
    patch_status(&snoozes, &name, &status).await?;

    info!(
        name = %name,
        namespace = %namespace,
        selector = %selector,
        wake = snooze.spec.wake_schedule().is_some(),
        "KubeSnooze reconciled"
    );
    Ok(Action::requeue(RESYNC_INTERVAL))
}

pub fn error_policy(snooze: Arc<KubeSnooze>, error: &Error, _ctx: Arc<Context>) -> Action {
    warn!(
        name = %snooze.name_any(),
        namespace = %snooze.namespace().unwrap_or_default(),
        error = %error,
        "Reconcile failed, retrying"
    );
    Action::requeue(ERROR_BACKOFF)
}

async fn ensure_rbac(
    client: &Client,
    namespace: &str,
    owner: &k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference,
) -> Result<(), Error> {
    let accounts: Api<ServiceAccount> = Api::namespaced(client.clone(), namespace);
    apply(
        &accounts,
        resources::RUNNER_NAME,
        &resources::runner_service_account(namespace, owner),
    )
    .await?;

    let roles: Api<Role> = Api::namespaced(client.clone(), namespace);
    apply(&roles, resources::RUNNER_NAME, &resources::runner_role(namespace, owner)).await?;

    let bindings: Api<RoleBinding> = Api::namespaced(client.clone(), namespace);
    apply(
        &bindings,
        resources::RUNNER_NAME,
        &resources::runner_role_binding(namespace, owner),
    )
    .await?;

    Ok(())
}

/// Server-side apply `object` under the controller's field manager
async fn apply<K>(api: &Api<K>, name: &str, object: &K) -> Result<K, Error>
where
    K: Clone + DeserializeOwned + Serialize + Debug,
{
    let params = PatchParams::apply(FIELD_MANAGER).force();
    let applied = api.patch(name, &params, &Patch::Apply(object)).await?;
    debug!(name = %name, "Applied object");
    Ok(applied)
}

async fn delete_if_present(api: &Api<CronJob>, name: &str) -> Result<(), Error> {
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            info!(name = %name, "Deleted stale CronJob");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn patch_status(
    api: &Api<KubeSnooze>,
    name: &str,
    status: &KubeSnoozeStatus,
) -> Result<(), Error> {
    let patch = json!({ "status": status });
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}
