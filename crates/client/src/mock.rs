//! In-memory transports for tests and disabled reporting
//!
//! [`StubTransport`] records every call in arrival order and can be scripted
//! to fail upcoming calls, which is how the retry and ordering properties are
//! exercised without a server. [`NoopTransport`] acknowledges everything
//! without recording, for runs where reporting is turned off.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use beacon_common::{
    Error, FinishItemRequest, FinishLaunchRequest, ItemCreatedResponse, LaunchCreatedResponse,
    OperationAck, Result, StartItemRequest, StartLaunchRequest,
};
use parking_lot::Mutex;
use tokio::time::sleep;
use uuid::Uuid;

use crate::transport::TransportClient;

/// One recorded transport call, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    CreateLaunch { name: String },
    FinishLaunch { id: String },
    CreateItem { name: String, parent: Option<String> },
    FinishItem { id: String },
}

/// Recording transport with scripted failures
#[derive(Default)]
pub struct StubTransport {
    latency: Duration,
    calls: Mutex<Vec<TransportCall>>,
    create_item_bodies: Mutex<Vec<StartItemRequest>>,
    finish_item_bodies: Mutex<Vec<(String, FinishItemRequest)>>,
    create_launch_failures: Mutex<VecDeque<Error>>,
    create_item_failures: Mutex<VecDeque<Error>>,
    finish_item_failures: Mutex<VecDeque<Error>>,
    finish_item_failures_by_id: Mutex<HashMap<String, VecDeque<Error>>>,
    finish_launch_failures: Mutex<VecDeque<Error>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate network latency on every call
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Recorded calls, in the order they reached the transport
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Request bodies seen by create-item calls, in arrival order
    pub fn create_item_bodies(&self) -> Vec<StartItemRequest> {
        self.create_item_bodies.lock().clone()
    }

    /// Item id and request body seen by finish-item calls, in arrival order
    pub fn finish_item_bodies(&self) -> Vec<(String, FinishItemRequest)> {
        self.finish_item_bodies.lock().clone()
    }

    /// Queue a failure for the next create-launch call. Repeated queuing
    /// fails consecutive calls.
    pub fn fail_next_create_launch(&self, error: Error) {
        self.create_launch_failures.lock().push_back(error);
    }

    pub fn fail_next_create_item(&self, error: Error) {
        self.create_item_failures.lock().push_back(error);
    }

    pub fn fail_next_finish_item(&self, error: Error) {
        self.finish_item_failures.lock().push_back(error);
    }

    /// Queue a failure for the next finish call of one specific item,
    /// leaving finishes of other items untouched
    pub fn fail_next_finish_item_for(&self, id: impl Into<String>, error: Error) {
        self.finish_item_failures_by_id
            .lock()
            .entry(id.into())
            .or_default()
            .push_back(error);
    }

    pub fn fail_next_finish_launch(&self, error: Error) {
        self.finish_launch_failures.lock().push_back(error);
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().push(call);
    }

    fn scripted(queue: &Mutex<VecDeque<Error>>) -> Option<Error> {
        queue.lock().pop_front()
    }
}

#[async_trait]
impl TransportClient for StubTransport {
    async fn create_launch(&self, rq: &StartLaunchRequest) -> Result<LaunchCreatedResponse> {
        self.record(TransportCall::CreateLaunch {
            name: rq.name.clone(),
        });
        sleep(self.latency).await;
        match Self::scripted(&self.create_launch_failures) {
            Some(error) => Err(error),
            None => Ok(LaunchCreatedResponse {
                id: Uuid::new_v4().to_string(),
                number: Some(1),
            }),
        }
    }

    async fn finish_launch(&self, id: &str, _rq: &FinishLaunchRequest) -> Result<OperationAck> {
        self.record(TransportCall::FinishLaunch { id: id.to_string() });
        sleep(self.latency).await;
        match Self::scripted(&self.finish_launch_failures) {
            Some(error) => Err(error),
            None => Ok(OperationAck::default()),
        }
    }

    async fn create_item(
        &self,
        parent: Option<&str>,
        rq: &StartItemRequest,
    ) -> Result<ItemCreatedResponse> {
        self.record(TransportCall::CreateItem {
            name: rq.name.clone(),
            parent: parent.map(str::to_string),
        });
        self.create_item_bodies.lock().push(rq.clone());
        sleep(self.latency).await;
        match Self::scripted(&self.create_item_failures) {
            Some(error) => Err(error),
            None => Ok(ItemCreatedResponse {
                id: Uuid::new_v4().to_string(),
            }),
        }
    }

    async fn finish_item(&self, id: &str, rq: &FinishItemRequest) -> Result<OperationAck> {
        self.record(TransportCall::FinishItem { id: id.to_string() });
        self.finish_item_bodies
            .lock()
            .push((id.to_string(), rq.clone()));
        sleep(self.latency).await;
        let keyed = self
            .finish_item_failures_by_id
            .lock()
            .get_mut(id)
            .and_then(VecDeque::pop_front);
        match keyed.or_else(|| Self::scripted(&self.finish_item_failures)) {
            Some(error) => Err(error),
            None => Ok(OperationAck::default()),
        }
    }
}

/// Transport for disabled reporting: acknowledges everything, records nothing
pub struct NoopTransport;

#[async_trait]
impl TransportClient for NoopTransport {
    async fn create_launch(&self, _rq: &StartLaunchRequest) -> Result<LaunchCreatedResponse> {
        Ok(LaunchCreatedResponse {
            id: Uuid::new_v4().to_string(),
            number: None,
        })
    }

    async fn finish_launch(&self, _id: &str, _rq: &FinishLaunchRequest) -> Result<OperationAck> {
        Ok(OperationAck::default())
    }

    async fn create_item(
        &self,
        _parent: Option<&str>,
        _rq: &StartItemRequest,
    ) -> Result<ItemCreatedResponse> {
        Ok(ItemCreatedResponse {
            id: Uuid::new_v4().to_string(),
        })
    }

    async fn finish_item(&self, _id: &str, _rq: &FinishItemRequest) -> Result<OperationAck> {
        Ok(OperationAck::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_in_order() {
        let transport = StubTransport::new();
        let launch = transport
            .create_launch(&StartLaunchRequest::new("smoke"))
            .await
            .unwrap();
        transport
            .finish_launch(&launch.id, &FinishLaunchRequest::new())
            .await
            .unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0],
            TransportCall::CreateLaunch {
                name: "smoke".into()
            }
        );
        assert_eq!(calls[1], TransportCall::FinishLaunch { id: launch.id });
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed_in_order() {
        let transport = StubTransport::new();
        transport.fail_next_create_launch(Error::Transport("first".into()));
        transport.fail_next_create_launch(Error::Transport("second".into()));

        let rq = StartLaunchRequest::new("smoke");
        assert!(matches!(
            transport.create_launch(&rq).await,
            Err(Error::Transport(msg)) if msg == "first"
        ));
        assert!(matches!(
            transport.create_launch(&rq).await,
            Err(Error::Transport(msg)) if msg == "second"
        ));
        assert!(transport.create_launch(&rq).await.is_ok());
        // Failed attempts are still recorded
        assert_eq!(transport.call_count(), 3);
    }
}
