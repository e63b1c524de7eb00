//! Pipeline tests against the in-memory cluster

use super::*;
use crate::cluster::InMemoryCluster;
use crate::error::ClusterError;
use crate::memory::{ANNOTATION_ORIGINAL_HPA_MIN, ANNOTATION_ORIGINAL_REPLICAS};
use crate::models::{DesiredState, SleepWakeTargets};
use crate::workload::Workload;

const NS: &str = "dev";

fn trigger(action: Action) -> Trigger {
    Trigger::new(action, NS, "env=dev", ActionTargets::default()).unwrap()
}

fn pipeline(cluster: &Arc<InMemoryCluster>) -> Pipeline {
    Pipeline::new(cluster.clone(), SnoozeLogger::new("test"))
}

fn deployment_ref(name: &str) -> WorkloadRef {
    WorkloadRef::new(WorkloadKind::Deployment, NS, name)
}

async fn state_of(cluster: &InMemoryCluster, workload: &WorkloadRef) -> Option<DesiredState> {
    cluster.get(workload).await.unwrap().current_state()
}

async fn annotation_of(
    cluster: &InMemoryCluster,
    workload: &WorkloadRef,
    key: &str,
) -> Option<String> {
    cluster
        .get(workload)
        .await
        .unwrap()
        .annotations()
        .and_then(|a| a.get(key).cloned())
}

async fn seeded_cluster() -> Arc<InMemoryCluster> {
    let cluster = Arc::new(InMemoryCluster::new());
    cluster
        .insert(Workload::new_deployment(NS, "web", Some(4)).with_labels([("env", "dev")]))
        .await;
    cluster
        .insert(Workload::new_stateful_set(NS, "db", Some(2)).with_labels([("env", "dev")]))
        .await;
    cluster
        .insert(Workload::new_autoscaler(NS, "web", Some(3), 10).with_labels([("env", "dev")]))
        .await;
    cluster
        .insert(
            Workload::new_periodic_job(NS, "report", "0 6 * * *", Some(false))
                .with_labels([("env", "dev")]),
        )
        .await;
    cluster
}

#[tokio::test]
async fn test_sleep_then_wake_scenario() {
    let cluster = seeded_cluster().await;
    let pipeline = pipeline(&cluster);
    let web = deployment_ref("web");

    let outcome = pipeline.run(&trigger(Action::Sleep)).await.unwrap();
    let RunOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(report.applied.len(), 4);
    assert!(report.unchanged.is_empty());

    assert_eq!(state_of(&cluster, &web).await, Some(DesiredState::Replicas(0)));
    assert_eq!(
        annotation_of(&cluster, &web, ANNOTATION_ORIGINAL_REPLICAS).await.as_deref(),
        Some("4")
    );

    pipeline.run(&trigger(Action::Wake)).await.unwrap();

    assert_eq!(state_of(&cluster, &web).await, Some(DesiredState::Replicas(4)));
    assert_eq!(
        annotation_of(&cluster, &web, ANNOTATION_ORIGINAL_REPLICAS).await.as_deref(),
        Some("4")
    );
}

#[tokio::test]
async fn test_every_kind_round_trips() {
    let cluster = seeded_cluster().await;
    let pipeline = pipeline(&cluster);
    let db = WorkloadRef::new(WorkloadKind::StatefulSet, NS, "db");
    let hpa = WorkloadRef::new(WorkloadKind::Autoscaler, NS, "web");
    let job = WorkloadRef::new(WorkloadKind::PeriodicJob, NS, "report");

    pipeline.run(&trigger(Action::Sleep)).await.unwrap();

    assert_eq!(state_of(&cluster, &db).await, Some(DesiredState::Replicas(0)));
    assert_eq!(
        state_of(&cluster, &hpa).await,
        Some(DesiredState::AutoscalerMinReplicas(1))
    );
    assert_eq!(
        annotation_of(&cluster, &hpa, ANNOTATION_ORIGINAL_HPA_MIN).await.as_deref(),
        Some("3")
    );
    assert_eq!(state_of(&cluster, &job).await, Some(DesiredState::Suspend(true)));

    pipeline.run(&trigger(Action::Wake)).await.unwrap();

    assert_eq!(state_of(&cluster, &db).await, Some(DesiredState::Replicas(2)));
    assert_eq!(
        state_of(&cluster, &hpa).await,
        Some(DesiredState::AutoscalerMinReplicas(3))
    );
    assert_eq!(state_of(&cluster, &job).await, Some(DesiredState::Suspend(false)));
}

#[tokio::test]
async fn test_repeated_sleep_keeps_original_baseline() {
    let cluster = seeded_cluster().await;
    let pipeline = pipeline(&cluster);
    let web = deployment_ref("web");

    pipeline.run(&trigger(Action::Sleep)).await.unwrap();
    pipeline.run(&trigger(Action::Sleep)).await.unwrap();

    assert_eq!(
        annotation_of(&cluster, &web, ANNOTATION_ORIGINAL_REPLICAS).await.as_deref(),
        Some("4")
    );

    pipeline.run(&trigger(Action::Wake)).await.unwrap();
    assert_eq!(state_of(&cluster, &web).await, Some(DesiredState::Replicas(4)));
}

#[tokio::test]
async fn test_wake_override_beats_baseline() {
    let cluster = seeded_cluster().await;
    let pipeline = pipeline(&cluster);
    let web = deployment_ref("web");

    pipeline.run(&trigger(Action::Sleep)).await.unwrap();

    let targets = ActionTargets {
        wake: SleepWakeTargets {
            replicas: Some(1),
            ..Default::default()
        },
        ..Default::default()
    };
    let wake = Trigger::new(Action::Wake, NS, "env=dev", targets).unwrap();
    pipeline.run(&wake).await.unwrap();

    assert_eq!(state_of(&cluster, &web).await, Some(DesiredState::Replicas(1)));
}

#[tokio::test]
async fn test_wake_without_baseline_writes_nothing() {
    let cluster = Arc::new(InMemoryCluster::new());
    cluster
        .insert(Workload::new_deployment(NS, "web", Some(3)).with_labels([("env", "dev")]))
        .await;
    let pipeline = pipeline(&cluster);

    let outcome = pipeline.run(&trigger(Action::Wake)).await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Completed(RunReport {
            applied: vec![],
            unchanged: vec![deployment_ref("web")],
        })
    );
    assert_eq!(cluster.update_calls().await, 0);
}

#[tokio::test]
async fn test_protected_namespace_is_never_read() {
    let cluster = seeded_cluster().await;
    let pipeline = pipeline(&cluster);

    let trigger = Trigger::new(Action::Sleep, "kube-system", "env=dev", ActionTargets::default())
        .unwrap();
    let outcome = pipeline.run(&trigger).await.unwrap();

    assert_eq!(outcome, RunOutcome::Ignored);
    assert_eq!(cluster.list_calls().await, 0);
    assert_eq!(cluster.update_calls().await, 0);
}

#[tokio::test]
async fn test_only_selected_workloads_change() {
    let cluster = seeded_cluster().await;
    cluster
        .insert(Workload::new_deployment(NS, "shared", Some(5)).with_labels([("env", "staging")]))
        .await;
    cluster
        .insert(Workload::new_deployment("other", "web", Some(5)).with_labels([("env", "dev")]))
        .await;
    let pipeline = pipeline(&cluster);

    pipeline.run(&trigger(Action::Sleep)).await.unwrap();

    assert_eq!(
        state_of(&cluster, &deployment_ref("shared")).await,
        Some(DesiredState::Replicas(5))
    );
    assert_eq!(
        state_of(&cluster, &WorkloadRef::new(WorkloadKind::Deployment, "other", "web")).await,
        Some(DesiredState::Replicas(5))
    );
}

#[tokio::test]
async fn test_runner_cron_jobs_are_never_suspended() {
    let cluster = Arc::new(InMemoryCluster::new());
    cluster
        .insert(Workload::new_periodic_job(NS, "report", "0 6 * * *", Some(false)))
        .await;
    cluster
        .insert(
            Workload::new_periodic_job(NS, "kubesnooze-nightly-wake", "0 7 * * *", Some(false))
                .with_labels([("kubesnooze.io/name", "nightly")]),
        )
        .await;
    let pipeline = pipeline(&cluster);

    let trigger = Trigger::new(Action::Sleep, NS, "!legacy", ActionTargets::default()).unwrap();
    let outcome = pipeline.run(&trigger).await.unwrap();

    let report_ref = WorkloadRef::new(WorkloadKind::PeriodicJob, NS, "report");
    let runner_ref = WorkloadRef::new(WorkloadKind::PeriodicJob, NS, "kubesnooze-nightly-wake");
    assert_eq!(
        outcome,
        RunOutcome::Completed(RunReport {
            applied: vec![report_ref.clone()],
            unchanged: vec![],
        })
    );
    assert_eq!(state_of(&cluster, &report_ref).await, Some(DesiredState::Suspend(true)));
    assert_eq!(state_of(&cluster, &runner_ref).await, Some(DesiredState::Suspend(false)));
}

#[tokio::test]
async fn test_apply_failure_stops_the_batch() {
    let cluster = Arc::new(InMemoryCluster::new());
    for name in ["a-web", "b-api", "c-worker"] {
        cluster
            .insert(Workload::new_deployment(NS, name, Some(2)).with_labels([("env", "dev")]))
            .await;
    }
    cluster
        .insert(Workload::new_stateful_set(NS, "db", Some(1)).with_labels([("env", "dev")]))
        .await;
    cluster.fail_updates_for(deployment_ref("b-api")).await;
    let pipeline = pipeline(&cluster);

    let err = pipeline.run(&trigger(Action::Sleep)).await.unwrap_err();

    match err {
        SnoozeError::Apply { workload, .. } => assert_eq!(workload, deployment_ref("b-api")),
        other => panic!("unexpected error: {other}"),
    }
    // earlier writes stay, later objects are untouched
    assert_eq!(
        state_of(&cluster, &deployment_ref("a-web")).await,
        Some(DesiredState::Replicas(0))
    );
    assert_eq!(
        state_of(&cluster, &deployment_ref("c-worker")).await,
        Some(DesiredState::Replicas(2))
    );
    assert_eq!(
        state_of(&cluster, &WorkloadRef::new(WorkloadKind::StatefulSet, NS, "db")).await,
        Some(DesiredState::Replicas(1))
    );
    // only the deployment list ran
    assert_eq!(cluster.list_calls().await, 1);
}

#[tokio::test]
async fn test_listing_failure_is_a_selection_error() {
    let cluster = seeded_cluster().await;
    cluster.fail_lists_for(WorkloadKind::Autoscaler).await;
    let pipeline = pipeline(&cluster);

    let err = pipeline.run(&trigger(Action::Sleep)).await.unwrap_err();

    assert!(matches!(
        err,
        SnoozeError::Selection {
            kind: WorkloadKind::Autoscaler,
            ..
        }
    ));
    assert_eq!(err.category(), "selection");
    // kinds before the failing one were already processed
    assert_eq!(
        state_of(&cluster, &deployment_ref("web")).await,
        Some(DesiredState::Replicas(0))
    );
}

/// A client that hands out a stale copy so every write conflicts
struct StaleClient {
    inner: InMemoryCluster,
}

#[async_trait::async_trait]
impl WorkloadClient for StaleClient {
    async fn list(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<crate::workload::Workload>, ClusterError> {
        let mut items = self.inner.list(kind, namespace, selector).await?;
        for item in &mut items {
            item.metadata_mut().resource_version = Some("0".to_string());
        }
        Ok(items)
    }

    async fn update(
        &self,
        workload: &crate::workload::Workload,
    ) -> Result<crate::workload::Workload, ClusterError> {
        self.inner.update(workload).await
    }
}

#[tokio::test]
async fn test_conflict_is_surfaced_not_retried() {
    let inner = InMemoryCluster::new();
    inner
        .insert(Workload::new_deployment(NS, "web", Some(4)).with_labels([("env", "dev")]))
        .await;
    let client = Arc::new(StaleClient { inner });
    let pipeline = Pipeline::new(client.clone(), SnoozeLogger::new("test"));

    let err = pipeline.run(&trigger(Action::Sleep)).await.unwrap_err();

    assert!(matches!(
        err,
        SnoozeError::Apply {
            source: ClusterError::Conflict(_),
            ..
        }
    ));
    assert_eq!(client.inner.update_calls().await, 1);
    assert_eq!(
        client
            .inner
            .get(&deployment_ref("web"))
            .await
            .unwrap()
            .current_state(),
        Some(DesiredState::Replicas(4))
    );
}

#[test]
fn test_trigger_rejects_bad_input() {
    assert!(matches!(
        Trigger::new(Action::Sleep, NS, "env in dev", ActionTargets::default()),
        Err(SnoozeError::InvalidSelector { .. })
    ));
    assert!(matches!(
        Trigger::new(Action::Sleep, " ", "env=dev", ActionTargets::default()),
        Err(SnoozeError::Configuration(_))
    ));

    let negative = ActionTargets {
        sleep: SleepWakeTargets {
            replicas: Some(-1),
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(matches!(
        Trigger::new(Action::Sleep, NS, "env=dev", negative),
        Err(SnoozeError::Configuration(_))
    ));
}
