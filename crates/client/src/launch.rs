//! Launch/item lifecycle façade
//!
//! Composes the deferred handles, retry policies, scheduler and execution
//! tree into the user-visible reporting protocol: start launch, start item,
//! finish item, finish launch. Every operation except [`Launch::finish`] is
//! non-blocking; network calls and their retries run on the scheduler, never
//! on the caller's thread. Reporting failures are logged and surfaced as
//! failed handles; they never abort the test run itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use beacon_common::{
    Error, FinishItemRequest, FinishLaunchRequest, ItemAttribute, ItemStatus, OperationAck,
    ReportingConfig, StartItemRequest, StartLaunchRequest, TruncationConfig, NOT_ISSUE,
};
use futures::future::join_all;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::deferred::{Deferred, DeferredId};
use crate::retry::RetryPolicy;
use crate::scheduler::{Scheduler, SchedulerRegistry, WorkerPool};
use crate::steps::{NoopStepTracker, StepTracker};
use crate::telemetry::{NoopTelemetry, TelemetrySink};
use crate::transport::TransportClient;
use crate::tree::{ExecutionTree, TreeNode};

/// Identifier of the most recently created launch in this process. Read by
/// unrelated parts of the embedding system (log correlation), which is why it
/// is process-visible rather than coordinator-internal.
static CURRENT_LAUNCH: Lazy<RwLock<Option<String>>> = Lazy::new(|| RwLock::new(None));

/// Identifier of the most recently created launch, if any
pub fn current_launch_id() -> Option<String> {
    CURRENT_LAUNCH.read().clone()
}

fn set_current_launch_id(id: &str) {
    *CURRENT_LAUNCH.write() = Some(id.to_string());
}

struct LaunchInner {
    client: Arc<dyn TransportClient>,
    config: ReportingConfig,
    scheduler: Arc<Scheduler>,
    tree: ExecutionTree,
    launch_id: DeferredId,
    start_rq: StartLaunchRequest,
    steps: Arc<dyn StepTracker>,
    telemetry: Arc<dyn TelemetrySink>,
    started: AtomicBool,
    /// Attached to an externally created launch; start() issues no create call
    external_id: bool,
}

/// Coordinator for one launch session. Cheap to clone; all clones share the
/// same session state.
#[derive(Clone)]
pub struct Launch {
    inner: Arc<LaunchInner>,
}

/// Builder wiring a [`Launch`] to its transport, configuration and optional
/// collaborators
pub struct LaunchBuilder {
    client: Arc<dyn TransportClient>,
    config: ReportingConfig,
    start_rq: StartLaunchRequest,
    steps: Arc<dyn StepTracker>,
    telemetry: Arc<dyn TelemetrySink>,
    existing_id: Option<DeferredId>,
}

impl LaunchBuilder {
    pub fn new(client: Arc<dyn TransportClient>, start_rq: StartLaunchRequest) -> Self {
        Self {
            client,
            config: ReportingConfig::default(),
            start_rq,
            steps: Arc::new(NoopStepTracker),
            telemetry: Arc::new(NoopTelemetry),
            existing_id: None,
        }
    }

    pub fn config(mut self, config: ReportingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn step_tracker(mut self, steps: Arc<dyn StepTracker>) -> Self {
        self.steps = steps;
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Attach to a launch created elsewhere (rerun or secondary client); the
    /// coordinator reports items under it but never issues the create call
    pub fn attach_to(mut self, launch_id: DeferredId) -> Self {
        self.existing_id = Some(launch_id);
        self.start_rq = attached_start_request();
        self
    }

    pub fn build(self, pool: &Arc<WorkerPool>, registry: &SchedulerRegistry) -> Launch {
        let scheduler = registry.get_or_create(pool);
        info!(rerun = self.config.rerun, "starting launch coordinator");
        let external_id = self.existing_id.is_some();
        Launch {
            inner: Arc::new(LaunchInner {
                client: self.client,
                config: self.config,
                scheduler,
                tree: ExecutionTree::new(),
                launch_id: self.existing_id.unwrap_or_default(),
                start_rq: self.start_rq,
                steps: self.steps,
                telemetry: self.telemetry,
                started: AtomicBool::new(false),
                external_id,
            }),
        }
    }
}

fn attached_start_request() -> StartLaunchRequest {
    StartLaunchRequest::new("attached")
        .with_attributes(vec![ItemAttribute::system("agent", "custom")])
}

fn truncate_name(rq: &mut StartItemRequest, truncation: &TruncationConfig) {
    if !truncation.enabled {
        return;
    }
    let length = rq.name.chars().count();
    if length > truncation.limit {
        let keep = truncation.limit.saturating_sub(truncation.replacement.chars().count());
        let mut name: String = rq.name.chars().take(keep).collect();
        name.push_str(&truncation.replacement);
        rq.name = name;
    }
}

impl Launch {
    pub fn builder(client: Arc<dyn TransportClient>, start_rq: StartLaunchRequest) -> LaunchBuilder {
        LaunchBuilder::new(client, start_rq)
    }

    /// The root identifier handle for this session
    pub fn launch_id(&self) -> &DeferredId {
        &self.inner.launch_id
    }

    pub fn config(&self) -> &ReportingConfig {
        &self.inner.config
    }

    /// Number of identifiers with pending tracked work
    pub fn pending_nodes(&self) -> usize {
        self.inner.tree.len()
    }

    /// Create the launch on the server. Non-blocking and idempotent; returns
    /// the root identifier handle immediately. A creation failure settles the
    /// handle as failed instead of surfacing to the caller.
    pub fn start(&self) -> DeferredId {
        let inner = &self.inner;
        if inner.started.swap(true, Ordering::SeqCst) {
            return inner.launch_id.clone();
        }

        if inner.external_id {
            debug!("attached to an externally created launch, skipping create call");
        } else {
            let client = inner.client.clone();
            let rq = inner.start_rq.clone();
            let launch_id = inner.launch_id.clone();
            inner.scheduler.spawn(async move {
                let outcome = RetryPolicy::transport()
                    .run(|| {
                        let client = client.clone();
                        let rq = rq.clone();
                        async move { client.create_launch(&rq).await }
                    })
                    .await;
                match outcome {
                    Ok(rs) => {
                        info!(id = %rs.id, "launch created");
                        set_current_launch_id(&rs.id);
                        launch_id.resolve(rs.id);
                    }
                    Err(e) => {
                        error!(error = %e, "unable to create launch, reporting is abandoned");
                        launch_id.fail(e);
                    }
                }
            });
        }

        inner.telemetry.record_launch(&inner.launch_id, &inner.start_rq);
        inner.launch_id.clone()
    }

    /// Start an item, optionally under `parent`. Returns the item's
    /// identifier handle immediately; the create call is dispatched once the
    /// launch identifier (and the parent identifier, when given) resolves.
    pub fn start_item(&self, parent: Option<&DeferredId>, mut rq: StartItemRequest) -> DeferredId {
        let inner = &self.inner;
        truncate_name(&mut rq, &inner.config.truncation);

        let item: DeferredId = Deferred::new();
        if let Some(parent) = parent {
            inner.tree.set_parent(&item, parent);
        }
        // The item's own creation signal joins its wait set, so its finish
        // cannot outrun its create.
        inner.tree.attach_child(&item, item.signal());

        let client = inner.client.clone();
        let launch_id = inner.launch_id.clone();
        let parent_id = parent.cloned();
        let handle = item.clone();
        inner.scheduler.spawn(async move {
            let launch_id = match launch_id.settled().await {
                Ok(id) => id,
                Err(error) => {
                    debug!(error = %error, "launch unavailable, abandoning item");
                    handle.fail(error);
                    return;
                }
            };
            let parent_remote = match &parent_id {
                Some(parent) => match parent.settled().await {
                    Ok(id) => Some(id),
                    Err(error) => {
                        debug!(error = %error, "parent unavailable, abandoning item");
                        handle.fail(error);
                        return;
                    }
                },
                None => None,
            };
            rq.launch_id = Some(launch_id);
            let outcome = RetryPolicy::transport()
                .run(|| {
                    let client = client.clone();
                    let rq = rq.clone();
                    let parent_remote = parent_remote.clone();
                    async move { client.create_item(parent_remote.as_deref(), &rq).await }
                })
                .await;
            match outcome {
                Ok(rs) => {
                    debug!(id = %rs.id, "item created");
                    handle.resolve(rs.id);
                }
                Err(error) => {
                    error!(error = %error, "unable to create item");
                    handle.fail(error);
                }
            }
        });

        inner.steps.set_current_parent(&item);
        item
    }

    /// Start an item that retries a previous execution: the whole start is
    /// deferred until `retry_of` settles, and the request is marked as a
    /// retry. A failed `retry_of` fails the returned handle.
    pub fn start_retried_item(
        &self,
        parent: Option<&DeferredId>,
        retry_of: &DeferredId,
        mut rq: StartItemRequest,
    ) -> DeferredId {
        rq.retry = true;
        let result: DeferredId = Deferred::new();
        let this = self.clone();
        let parent = parent.cloned();
        let retry_of = retry_of.clone();
        let handle = result.clone();
        self.inner.scheduler.spawn(async move {
            if let Err(error) = retry_of.settled().await {
                debug!(error = %error, "retried-of item unavailable, abandoning retry item");
                handle.fail(error);
                return;
            }
            let item = this.start_item(parent.as_ref(), rq);
            match item.settled().await {
                Ok(id) => handle.resolve(id),
                Err(error) => handle.fail(error),
            }
        });
        result
    }

    /// Finish an item. Non-blocking; the finish call is sequenced after every
    /// child signal attached before this call, and the item's own finish
    /// signal joins its parent's wait set (or the launch's, when unparented).
    /// Returns a handle to the eventual acknowledgement.
    pub fn finish_item(
        &self,
        item: &DeferredId,
        mut rq: FinishItemRequest,
    ) -> Deferred<OperationAck> {
        let inner = &self.inner;
        let ack: Deferred<OperationAck> = Deferred::new();

        if item.key() == inner.launch_id.key() {
            warn!("finish_item called with the launch handle");
            ack.fail(Error::InvalidRequest(
                "the launch cannot be finished as an item".to_string(),
            ));
            return ack;
        }

        inner.steps.previous_step_finished(rq.status);

        if rq.status == Some(ItemStatus::Skipped) && !inner.config.skipped_is_issue {
            rq.issue = Some(NOT_ISSUE.to_string());
        }

        let node = match inner.tree.get_if_present(item) {
            Some(node) => node,
            None => {
                // Lifecycle bug in the caller; proceed without child ordering
                // rather than refusing to report at all.
                error!(key = item.key(), "item not tracked by the coordinator, finishing degraded");
                TreeNode::default()
            }
        };

        if inner.steps.is_marked_failed(item) {
            rq.status = Some(ItemStatus::Failed);
        }

        // Join the parent's wait set before dispatch so a concurrently
        // finishing parent observes this finish.
        match node.parent() {
            Some(parent) => inner.tree.attach_child(parent, ack.signal()),
            None => inner.tree.attach_child(&inner.launch_id, ack.signal()),
        }

        let children = node.into_children();
        let client = inner.client.clone();
        let launch_id = inner.launch_id.clone();
        let tree = inner.tree.clone();
        let item_handle = item.clone();
        let handle = ack.clone();
        inner.scheduler.spawn(async move {
            join_all(children).await;
            let outcome = match launch_id.settled().await {
                Err(error) => Err(error),
                Ok(launch_id) => match item_handle.settled().await {
                    Err(error) => Err(error),
                    Ok(item_id) => {
                        rq.launch_id = Some(launch_id);
                        RetryPolicy::item_finish()
                            .run(|| {
                                let client = client.clone();
                                let rq = rq.clone();
                                let item_id = item_id.clone();
                                async move { client.finish_item(&item_id, &rq).await }
                            })
                            .await
                    }
                },
            };
            // Reclaim the node before settling so a waiting parent never
            // observes stale children.
            tree.invalidate(&item_handle);
            match outcome {
                Ok(rs) => {
                    debug!("item finished");
                    handle.resolve(rs);
                }
                Err(error) => {
                    error!(error = %error, "unable to finish item");
                    handle.fail(error);
                }
            }
        });

        inner.steps.clear_parent(item);
        ack
    }

    /// Finish the launch. The one blocking boundary: waits, bounded by the
    /// configured reporting timeout, for every root-level signal and then the
    /// finish call itself. Timeout or failure is logged and swallowed;
    /// finishing always returns.
    pub async fn finish(&self, rq: FinishLaunchRequest) {
        let inner = &self.inner;
        let children = inner.tree.node_snapshot(&inner.launch_id).into_children();
        let client = inner.client.clone();
        let launch_id = inner.launch_id.clone();

        let finish_flow = async move {
            join_all(children).await;
            let id = launch_id.settled().await?;
            RetryPolicy::transport()
                .run(|| {
                    let client = client.clone();
                    let rq = rq.clone();
                    let id = id.clone();
                    async move { client.finish_launch(&id, &rq).await }
                })
                .await
        };

        let timeout = inner.config.reporting_timeout();
        match tokio::time::timeout(timeout, finish_flow).await {
            Ok(Ok(_)) => info!("launch finished"),
            Ok(Err(error)) => error!(error = %error, "unable to finish launch"),
            Err(_) => {
                let error = Error::Timeout {
                    seconds: timeout.as_secs(),
                };
                error!(error = %error, "launch finish did not drain in time");
            }
        }

        inner.tree.invalidate(&inner.launch_id);
        inner.telemetry.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_rq(name: &str) -> StartItemRequest {
        StartItemRequest::new(name, beacon_common::ItemType::Test)
    }

    #[test]
    fn test_truncation_exact_limit() {
        let truncation = TruncationConfig {
            enabled: true,
            limit: 10,
            replacement: "...".to_string(),
        };
        let mut rq = item_rq("abcdefghijklmnopqrst");
        assert_eq!(rq.name.chars().count(), 20);

        truncate_name(&mut rq, &truncation);
        assert_eq!(rq.name.chars().count(), 10);
        assert!(rq.name.ends_with("..."));
        assert_eq!(rq.name, "abcdefg...");
    }

    #[test]
    fn test_truncation_leaves_short_names_alone() {
        let truncation = TruncationConfig {
            enabled: true,
            limit: 10,
            replacement: "...".to_string(),
        };
        let mut rq = item_rq("short");
        truncate_name(&mut rq, &truncation);
        assert_eq!(rq.name, "short");
    }

    #[test]
    fn test_truncation_disabled() {
        let truncation = TruncationConfig {
            enabled: false,
            limit: 10,
            replacement: "...".to_string(),
        };
        let mut rq = item_rq("abcdefghijklmnopqrst");
        truncate_name(&mut rq, &truncation);
        assert_eq!(rq.name.chars().count(), 20);
    }

    #[test]
    fn test_truncation_counts_chars_not_bytes() {
        let truncation = TruncationConfig {
            enabled: true,
            limit: 10,
            replacement: "...".to_string(),
        };
        let mut rq = item_rq("αααααααααααααααααααα");
        truncate_name(&mut rq, &truncation);
        assert_eq!(rq.name.chars().count(), 10);
        assert!(rq.name.ends_with("..."));
    }

    #[test]
    fn test_attached_start_request_carries_agent_attribute() {
        let rq = attached_start_request();
        assert!(rq.attributes.iter().any(|a| a.system));
    }
}
