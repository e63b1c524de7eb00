//! Remembered pre-sleep state
//!
//! A workload's original replica count (or autoscaler minimum) is kept in
//! an annotation on the workload itself. The engine only sees the narrow
//! [`SlotStore`] interface, so the backing store can change without
//! touching the decision logic.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use tracing::warn;

/// Annotation holding the pre-sleep replica count
pub const ANNOTATION_ORIGINAL_REPLICAS: &str = "kubesnooze.io/original-replicas";

/// Annotation holding the pre-sleep autoscaler minimum
pub const ANNOTATION_ORIGINAL_HPA_MIN: &str = "kubesnooze.io/original-hpa-min-replicas";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    OriginalReplicas,
    OriginalAutoscalerMin,
}

impl Slot {
    pub fn annotation(&self) -> &'static str {
        match self {
            Slot::OriginalReplicas => ANNOTATION_ORIGINAL_REPLICAS,
            Slot::OriginalAutoscalerMin => ANNOTATION_ORIGINAL_HPA_MIN,
        }
    }
}

/// Key/value store for remembered baselines
pub trait SlotStore {
    /// The remembered value, or `None` when absent or unparseable
    fn read_slot(&self, slot: Slot) -> Option<i32>;

    /// Store `value` unless the slot already exists. Returns true when written.
    ///
    /// An existing slot is never overwritten: re-running sleep on an
    /// already sleeping workload must keep the original baseline.
    fn write_slot_if_absent(&mut self, slot: Slot, value: i32) -> bool;
}

impl SlotStore for BTreeMap<String, String> {
    fn read_slot(&self, slot: Slot) -> Option<i32> {
        let raw = self.get(slot.annotation())?;
        match raw.trim().parse::<i32>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    annotation = slot.annotation(),
                    value = %raw,
                    error = %e,
                    "Ignoring malformed remembered value"
                );
                None
            }
        }
    }

    fn write_slot_if_absent(&mut self, slot: Slot, value: i32) -> bool {
        if self.contains_key(slot.annotation()) {
            return false;
        }
        self.insert(slot.annotation().to_string(), value.to_string());
        true
    }
}

impl SlotStore for ObjectMeta {
    fn read_slot(&self, slot: Slot) -> Option<i32> {
        self.annotations.as_ref()?.read_slot(slot)
    }

    fn write_slot_if_absent(&mut self, slot: Slot, value: i32) -> bool {
        self.annotations
            .get_or_insert_with(BTreeMap::new)
            .write_slot_if_absent(slot, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let mut meta = ObjectMeta::default();
        assert_eq!(meta.read_slot(Slot::OriginalReplicas), None);

        assert!(meta.write_slot_if_absent(Slot::OriginalReplicas, 4));
        assert_eq!(meta.read_slot(Slot::OriginalReplicas), Some(4));
        assert_eq!(
            meta.annotations.as_ref().unwrap()[ANNOTATION_ORIGINAL_REPLICAS],
            "4"
        );
    }

    #[test]
    fn test_existing_slot_is_never_overwritten() {
        let mut meta = ObjectMeta::default();
        meta.write_slot_if_absent(Slot::OriginalReplicas, 4);

        assert!(!meta.write_slot_if_absent(Slot::OriginalReplicas, 0));
        assert_eq!(meta.read_slot(Slot::OriginalReplicas), Some(4));
    }

    #[test]
    fn test_slots_are_independent() {
        let mut meta = ObjectMeta::default();
        meta.write_slot_if_absent(Slot::OriginalReplicas, 3);
        assert!(meta.write_slot_if_absent(Slot::OriginalAutoscalerMin, 2));

        assert_eq!(meta.read_slot(Slot::OriginalReplicas), Some(3));
        assert_eq!(meta.read_slot(Slot::OriginalAutoscalerMin), Some(2));
    }

    #[test]
    fn test_malformed_value_reads_as_absent_but_is_kept() {
        let mut annotations = BTreeMap::new();
        annotations.insert(ANNOTATION_ORIGINAL_REPLICAS.to_string(), "four".to_string());

        assert_eq!(annotations.read_slot(Slot::OriginalReplicas), None);
        assert!(!annotations.write_slot_if_absent(Slot::OriginalReplicas, 1));
        assert_eq!(annotations[ANNOTATION_ORIGINAL_REPLICAS], "four");
    }

    #[test]
    fn test_other_annotations_untouched() {
        let mut meta = ObjectMeta {
            annotations: Some(
                [("team".to_string(), "payments".to_string())]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        };
        meta.write_slot_if_absent(Slot::OriginalAutoscalerMin, 2);

        let annotations = meta.annotations.unwrap();
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations["team"], "payments");
    }
}
