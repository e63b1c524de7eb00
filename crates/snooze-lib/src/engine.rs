//! Transition engine
//!
//! One decision function per workload kind. Precedence is the same for
//! every kind: an explicit per-action target beats the remembered
//! baseline, and the remembered baseline beats "no change".

use crate::memory::{Slot, SlotStore};
use crate::models::{Action, ActionTargets, DesiredState, SleepWakeTargets, Transition};
use crate::workload::Workload;

/// Replica count assumed when a scalable workload leaves it unset
pub const DEFAULT_REPLICAS: i32 = 1;

/// Autoscaler minimum applied on sleep without an explicit target
pub const DEFAULT_SLEEP_AUTOSCALER_MIN: i32 = 1;

/// Deployments and StatefulSets
pub fn scalable(
    action: Action,
    current_replicas: Option<i32>,
    targets: &SleepWakeTargets,
    memory: &mut impl SlotStore,
) -> Transition {
    match action {
        Action::Sleep => {
            let current = current_replicas.unwrap_or(DEFAULT_REPLICAS);
            memory.write_slot_if_absent(Slot::OriginalReplicas, current);
            Transition::Apply(DesiredState::Replicas(targets.replicas.unwrap_or(0)))
        }
        Action::Wake => targets
            .replicas
            .or_else(|| memory.read_slot(Slot::OriginalReplicas))
            .map_or(Transition::NoChange, |n| {
                Transition::Apply(DesiredState::Replicas(n))
            }),
    }
}

/// HorizontalPodAutoscalers
pub fn autoscaler(
    action: Action,
    current_min: Option<i32>,
    targets: &SleepWakeTargets,
    memory: &mut impl SlotStore,
) -> Transition {
    match action {
        Action::Sleep => {
            if let Some(current) = current_min {
                memory.write_slot_if_absent(Slot::OriginalAutoscalerMin, current);
            }
            let target = targets
                .autoscaler_min_replicas
                .unwrap_or(DEFAULT_SLEEP_AUTOSCALER_MIN);
            Transition::Apply(DesiredState::AutoscalerMinReplicas(target))
        }
        Action::Wake => targets
            .autoscaler_min_replicas
            .or_else(|| memory.read_slot(Slot::OriginalAutoscalerMin))
            .map_or(Transition::NoChange, |n| {
                Transition::Apply(DesiredState::AutoscalerMinReplicas(n))
            }),
    }
}

/// CronJobs: the suspend flag is always overwritten
pub fn periodic_job(action: Action, targets: &SleepWakeTargets) -> Transition {
    let suspend = targets
        .suspend_periodic_jobs
        .unwrap_or(action == Action::Sleep);
    Transition::Apply(DesiredState::Suspend(suspend))
}

/// Decide the transition for `workload` and write it onto the object.
///
/// On [`Transition::Apply`] the workload carries the new spec value and any
/// newly remembered baseline, ready to be sent back. On
/// [`Transition::NoChange`] the object is left untouched.
pub fn plan(workload: &mut Workload, action: Action, targets: &ActionTargets) -> Transition {
    let targets = targets.for_action(action);

    match workload {
        Workload::Deployment(o) => {
            let current = o.spec.as_ref().and_then(|s| s.replicas);
            let transition = scalable(action, current, targets, &mut o.metadata);
            if let Transition::Apply(DesiredState::Replicas(n)) = transition {
                o.spec.get_or_insert_with(Default::default).replicas = Some(n);
            }
            transition
        }
        Workload::StatefulSet(o) => {
            let current = o.spec.as_ref().and_then(|s| s.replicas);
            let transition = scalable(action, current, targets, &mut o.metadata);
            if let Transition::Apply(DesiredState::Replicas(n)) = transition {
                o.spec.get_or_insert_with(Default::default).replicas = Some(n);
            }
            transition
        }
        Workload::Autoscaler(o) => {
            let current = o.spec.as_ref().and_then(|s| s.min_replicas);
            let transition = autoscaler(action, current, targets, &mut o.metadata);
            if let Transition::Apply(DesiredState::AutoscalerMinReplicas(n)) = transition {
                o.spec.get_or_insert_with(Default::default).min_replicas = Some(n);
            }
            transition
        }
        Workload::PeriodicJob(o) => {
            let transition = periodic_job(action, targets);
            if let Transition::Apply(DesiredState::Suspend(suspend)) = transition {
                o.spec.get_or_insert_with(Default::default).suspend = Some(suspend);
            }
            transition
        }
    }
}
