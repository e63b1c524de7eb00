//! Objects the controller owns for each KubeSnooze
//!
//! Pure renderers: everything here is built from the KubeSnooze and
//! applied as-is by the reconciler.

use chrono::Utc;
use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, JobSpec, JobTemplateSpec};
use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec, PodTemplateSpec, ServiceAccount};
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, ObjectMeta, OwnerReference, Time};
use kube::ResourceExt;
use snooze_lib::config::{
    ENV_ACTION, ENV_LABEL_SELECTOR, ENV_NAMESPACE, ENV_SLEEP_HPA_MIN_REPLICAS,
    ENV_SLEEP_REPLICAS, ENV_SLEEP_SUSPEND_CRONJOBS, ENV_WAKE_HPA_MIN_REPLICAS,
    ENV_WAKE_REPLICAS, ENV_WAKE_SUSPEND_CRONJOBS,
};
use snooze_lib::crd::KubeSnooze;
use snooze_lib::{Action, LabelSelector, LABEL_SNOOZE_NAME};
use std::collections::BTreeMap;

/// Name shared by the runner ServiceAccount, Role, RoleBinding and container
pub const RUNNER_NAME: &str = "kubesnooze-runner";

pub const LABEL_APP_NAME: &str = "app.kubernetes.io/name";
pub const LABEL_PART_OF: &str = "app.kubernetes.io/part-of";
pub const LABEL_ACTION: &str = "kubesnooze.io/action";

pub const CONDITION_READY: &str = "Ready";
pub const REASON_RECONCILED: &str = "Reconciled";
pub const REASON_INVALID_SELECTOR: &str = "InvalidSelector";

pub fn cron_job_name(snooze_name: &str, action: Action) -> String {
    format!("kubesnooze-{}-{}", snooze_name, action)
}

fn common_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_APP_NAME.to_string(), "kubesnooze".to_string()),
        (LABEL_PART_OF.to_string(), "kubesnooze".to_string()),
    ])
}

pub fn cron_job_labels(snooze_name: &str, action: Action) -> BTreeMap<String, String> {
    let mut labels = common_labels();
    labels.insert(LABEL_SNOOZE_NAME.to_string(), snooze_name.to_string());
    labels.insert(LABEL_ACTION.to_string(), action.to_string());
    labels
}

fn owned_meta(
    name: &str,
    namespace: &str,
    labels: BTreeMap<String, String>,
    owner: &OwnerReference,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(labels),
        owner_references: Some(vec![owner.clone()]),
        ..Default::default()
    }
}

fn count_value(value: Option<i32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn flag_value(value: Option<bool>, default: bool) -> String {
    value.unwrap_or(default).to_string()
}

fn env_var(name: &str, value: String) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value),
        value_from: None,
    }
}

/// Environment of a runner container. Unset counts are empty strings,
/// which the runner reads as "no override".
pub fn runner_env(snooze: &KubeSnooze, action: Action, selector: &LabelSelector) -> Vec<EnvVar> {
    let spec = &snooze.spec;
    vec![
        env_var(ENV_ACTION, action.to_string()),
        env_var(ENV_NAMESPACE, snooze.namespace().unwrap_or_default()),
        env_var(ENV_LABEL_SELECTOR, selector.to_string()),
        env_var(ENV_SLEEP_REPLICAS, count_value(spec.sleep.replicas)),
        env_var(ENV_WAKE_REPLICAS, count_value(spec.wake.replicas)),
        env_var(ENV_SLEEP_HPA_MIN_REPLICAS, count_value(spec.sleep.hpa_min_replicas)),
        env_var(ENV_WAKE_HPA_MIN_REPLICAS, count_value(spec.wake.hpa_min_replicas)),
        env_var(ENV_SLEEP_SUSPEND_CRONJOBS, flag_value(spec.sleep.suspend_cron_jobs, true)),
        env_var(ENV_WAKE_SUSPEND_CRONJOBS, flag_value(spec.wake.suspend_cron_jobs, false)),
    ]
}

/// The CronJob that runs `action` on `schedule`
pub fn runner_cron_job(
    snooze: &KubeSnooze,
    action: Action,
    schedule: &str,
    selector: &LabelSelector,
    default_image: &str,
    owner: &OwnerReference,
) -> CronJob {
    let namespace = snooze.namespace().unwrap_or_default();
    let name = snooze.name_any();
    let image = snooze
        .spec
        .runner_image
        .as_deref()
        .filter(|i| !i.trim().is_empty())
        .unwrap_or(default_image);
    let time_zone = snooze
        .spec
        .timezone
        .clone()
        .filter(|tz| !tz.trim().is_empty());

    CronJob {
        metadata: owned_meta(
            &cron_job_name(&name, action),
            &namespace,
            cron_job_labels(&name, action),
            owner,
        ),
        spec: Some(CronJobSpec {
            schedule: schedule.to_string(),
            time_zone,
            concurrency_policy: Some("Forbid".to_string()),
            job_template: JobTemplateSpec {
                metadata: None,
                spec: Some(JobSpec {
                    template: PodTemplateSpec {
                        metadata: None,
                        spec: Some(PodSpec {
                            service_account_name: Some(RUNNER_NAME.to_string()),
                            restart_policy: Some("Never".to_string()),
                            containers: vec![Container {
                                name: RUNNER_NAME.to_string(),
                                image: Some(image.to_string()),
                                env: Some(runner_env(snooze, action, selector)),
                                ..Default::default()
                            }],
                            ..Default::default()
                        }),
                    },
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

pub fn runner_service_account(namespace: &str, owner: &OwnerReference) -> ServiceAccount {
    ServiceAccount {
        metadata: owned_meta(RUNNER_NAME, namespace, common_labels(), owner),
        ..Default::default()
    }
}

fn rule(api_group: &str, resources: &[&str]) -> PolicyRule {
    PolicyRule {
        api_groups: Some(vec![api_group.to_string()]),
        resources: Some(resources.iter().map(|r| r.to_string()).collect()),
        verbs: ["get", "list", "watch", "update", "patch"]
            .iter()
            .map(|v| v.to_string())
            .collect(),
        ..Default::default()
    }
}

/// Access to exactly the workloads a runner may adjust
pub fn runner_role(namespace: &str, owner: &OwnerReference) -> Role {
    Role {
        metadata: owned_meta(RUNNER_NAME, namespace, common_labels(), owner),
        rules: Some(vec![
            rule("apps", &["deployments", "statefulsets"]),
            rule("autoscaling", &["horizontalpodautoscalers"]),
            rule("batch", &["cronjobs"]),
        ]),
    }
}

pub fn runner_role_binding(namespace: &str, owner: &OwnerReference) -> RoleBinding {
    RoleBinding {
        metadata: owned_meta(RUNNER_NAME, namespace, common_labels(), owner),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "Role".to_string(),
            name: RUNNER_NAME.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: RUNNER_NAME.to_string(),
            namespace: Some(namespace.to_string()),
            api_group: None,
        }]),
    }
}

/// Build a condition stamped with the current time
pub fn condition(
    type_: &str,
    ready: bool,
    reason: &str,
    message: impl Into<String>,
    observed_generation: Option<i64>,
) -> Condition {
    Condition {
        type_: type_.to_string(),
        status: if ready { "True" } else { "False" }.to_string(),
        reason: reason.to_string(),
        message: message.into(),
        observed_generation,
        last_transition_time: Time(Utc::now()),
    }
}

/// Insert or replace the condition of the same type. The transition
/// time is kept when the status did not change.
pub fn set_condition(conditions: &mut Vec<Condition>, mut new: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == new.type_) {
        Some(existing) => {
            if existing.status == new.status {
                new.last_transition_time = existing.last_transition_time.clone();
            }
            *existing = new;
        }
        None => conditions.push(new),
    }
}
