//! Step/status tracker seam
//!
//! Manual step reporting lives in the embedding framework integration; the
//! coordinator only consults it at item-finish time and keeps it informed of
//! the current parent item.

use beacon_common::ItemStatus;

use crate::deferred::DeferredId;

/// Collaborator tracking manual steps reported inside items
pub trait StepTracker: Send + Sync {
    /// True when step-level tracking already marked this item as failed; the
    /// coordinator then overrides the reported finish status
    fn is_marked_failed(&self, item: &DeferredId) -> bool;

    /// A finish request implies the previously reported manual step ended
    /// with `status`
    fn previous_step_finished(&self, status: Option<ItemStatus>);

    /// A new item became the current parent for manual steps
    fn set_current_parent(&self, item: &DeferredId);

    /// The item finished and stops being a step parent
    fn clear_parent(&self, item: &DeferredId);
}

/// Default tracker for integrations without manual step reporting
pub struct NoopStepTracker;

impl StepTracker for NoopStepTracker {
    fn is_marked_failed(&self, _item: &DeferredId) -> bool {
        false
    }

    fn previous_step_finished(&self, _status: Option<ItemStatus>) {}

    fn set_current_parent(&self, _item: &DeferredId) {}

    fn clear_parent(&self, _item: &DeferredId) {}
}
