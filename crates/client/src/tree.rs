//! Execution tree coordinator
//!
//! Concurrent map from deferred-identifier keys to tree nodes. A node tracks
//! one entity's parent link and the completion signals of work that must
//! settle before the entity's own finish request may be sent. Nodes are
//! created lazily on first access and removed once their owner's finish has
//! settled; a lookup after invalidation yields a fresh, empty node so that
//! erroneous double-finish calls degrade to "no children to wait for" rather
//! than reusing stale state.

use std::sync::Arc;

use dashmap::DashMap;

use crate::deferred::{DeferredId, Signal};

/// Per-entity record: parent link plus outstanding child completions
#[derive(Clone, Default)]
pub struct TreeNode {
    parent: Option<DeferredId>,
    children: Vec<Signal>,
}

impl TreeNode {
    pub fn parent(&self) -> Option<&DeferredId> {
        self.parent.as_ref()
    }

    pub fn children(&self) -> &[Signal] {
        &self.children
    }

    /// Consume the snapshot, yielding the signals to wait on
    pub fn into_children(self) -> Vec<Signal> {
        self.children
    }
}

/// Concurrent identifier→node map owned by one launch coordinator
#[derive(Clone, Default)]
pub struct ExecutionTree {
    nodes: Arc<DashMap<u64, TreeNode>>,
}

impl ExecutionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completion signal to `owner`'s node, creating the node if
    /// absent. Safe under concurrent appends from sibling items.
    pub fn attach_child(&self, owner: &DeferredId, signal: Signal) {
        self.nodes.entry(owner.key()).or_default().children.push(signal);
    }

    /// Record the parent relation, once, at item-creation time
    pub fn set_parent(&self, item: &DeferredId, parent: &DeferredId) {
        self.nodes.entry(item.key()).or_default().parent = Some(parent.clone());
    }

    /// Snapshot of the node if the coordinator tracks it. `None` signals a
    /// lifecycle bug in the caller; the façade substitutes an empty node.
    pub fn get_if_present(&self, id: &DeferredId) -> Option<TreeNode> {
        self.nodes.get(&id.key()).map(|node| node.value().clone())
    }

    /// Snapshot of the node, creating an empty one if absent. Signals
    /// attached after the snapshot belong to the next generation and are not
    /// part of it.
    pub fn node_snapshot(&self, id: &DeferredId) -> TreeNode {
        self.nodes.entry(id.key()).or_default().value().clone()
    }

    /// Drop the node once its owner's finish has settled, reclaiming memory
    pub fn invalidate(&self, id: &DeferredId) {
        self.nodes.remove(&id.key());
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::Deferred;

    fn ready_signal() -> Signal {
        use futures::FutureExt;
        async {}.boxed().shared()
    }

    #[tokio::test]
    async fn test_nodes_are_created_lazily() {
        let tree = ExecutionTree::new();
        let id: DeferredId = Deferred::new();

        assert!(tree.get_if_present(&id).is_none());
        let node = tree.node_snapshot(&id);
        assert!(node.parent().is_none());
        assert!(node.children().is_empty());
        assert_eq!(tree.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_excludes_later_appends() {
        let tree = ExecutionTree::new();
        let id: DeferredId = Deferred::new();

        tree.attach_child(&id, ready_signal());
        let snapshot = tree.node_snapshot(&id);
        tree.attach_child(&id, ready_signal());

        assert_eq!(snapshot.children().len(), 1);
        assert_eq!(tree.node_snapshot(&id).children().len(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_yields_fresh_node() {
        let tree = ExecutionTree::new();
        let id: DeferredId = Deferred::new();
        let parent: DeferredId = Deferred::new();

        tree.set_parent(&id, &parent);
        tree.attach_child(&id, ready_signal());
        tree.invalidate(&id);

        assert!(tree.get_if_present(&id).is_none());
        let fresh = tree.node_snapshot(&id);
        assert!(fresh.parent().is_none());
        assert!(fresh.children().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_appends_lose_nothing() {
        let tree = ExecutionTree::new();
        let id: DeferredId = Deferred::new();

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let tree = tree.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    tree.attach_child(&id, ready_signal());
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(tree.node_snapshot(&id).children().len(), 64);
    }

    #[tokio::test]
    async fn test_parent_recorded_once_at_creation() {
        let tree = ExecutionTree::new();
        let item: DeferredId = Deferred::new();
        let parent: DeferredId = Deferred::new();

        tree.set_parent(&item, &parent);
        let node = tree.node_snapshot(&item);
        assert_eq!(node.parent().unwrap().key(), parent.key());
    }
}
