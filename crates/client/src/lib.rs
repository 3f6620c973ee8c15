//! Beacon Client Library
//!
//! Client-side coordinator that reports the hierarchical execution of a test
//! run (a launch containing nested items) to a remote Beacon recording
//! service while the run keeps executing.
//!
//! The hard part is not the transport, it is ordering: every lifecycle call
//! returns a [`Deferred`] identifier before the network call that resolves it
//! completes, and the [`ExecutionTree`] guarantees that an entity's finish
//! request is sent only after every child started before that finish was
//! requested has settled. Network calls run under bounded [`RetryPolicy`]
//! budgets on schedulers obtained from a [`SchedulerRegistry`], never on the
//! caller's thread; the single blocking boundary is [`Launch::finish`].

pub mod deferred;
pub mod launch;
pub mod mock;
pub mod retry;
pub mod scheduler;
pub mod steps;
pub mod telemetry;
pub mod transport;
pub mod tree;

// Re-export core types for convenience
pub use deferred::{Deferred, DeferredId, Signal};
pub use launch::{current_launch_id, Launch, LaunchBuilder};
pub use retry::RetryPolicy;
pub use scheduler::{Scheduler, SchedulerRegistry, WorkerPool};
pub use steps::{NoopStepTracker, StepTracker};
pub use telemetry::{NoopTelemetry, TelemetrySink};
pub use transport::TransportClient;
pub use tree::{ExecutionTree, TreeNode};
