//! Tool-usage telemetry seam
//!
//! Fire-and-forget reporting about the reporting tool itself. Failures are
//! ignored by contract; a telemetry outage must never affect the run.

use beacon_common::StartLaunchRequest;

use crate::deferred::DeferredId;

/// Collaborator receiving tool-usage events
pub trait TelemetrySink: Send + Sync {
    /// A launch was started; `launch` may not be resolved yet
    fn record_launch(&self, launch: &DeferredId, rq: &StartLaunchRequest);

    /// The owning launch is finishing; flush and release resources
    fn shutdown(&self);
}

/// Default sink that records nothing
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn record_launch(&self, _launch: &DeferredId, _rq: &StartLaunchRequest) {}

    fn shutdown(&self) {}
}
