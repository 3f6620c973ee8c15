//! Transport seam to the Beacon recording service
//!
//! The coordinator never talks HTTP itself; it drives an implementation of
//! [`TransportClient`] supplied by the embedding application. Every call may
//! fail with a transport error or a structured server rejection, and retries
//! reuse the original request body unchanged.

use async_trait::async_trait;
use beacon_common::{
    FinishItemRequest, FinishLaunchRequest, ItemCreatedResponse, LaunchCreatedResponse,
    OperationAck, Result, StartItemRequest, StartLaunchRequest,
};

/// Client for the Beacon recording service
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Create the launch record, returning its remote-assigned identifier
    async fn create_launch(&self, rq: &StartLaunchRequest) -> Result<LaunchCreatedResponse>;

    /// Finish the launch record
    async fn finish_launch(&self, id: &str, rq: &FinishLaunchRequest) -> Result<OperationAck>;

    /// Create an item, nested under `parent` when given
    async fn create_item(
        &self,
        parent: Option<&str>,
        rq: &StartItemRequest,
    ) -> Result<ItemCreatedResponse>;

    /// Finish an item
    async fn finish_item(&self, id: &str, rq: &FinishItemRequest) -> Result<OperationAck>;
}
