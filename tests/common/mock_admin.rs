//! Mock ReplicationAdmin for testing.
//!
//! Records every resend request. Can be configured to fail or to respond
//! slowly so that the driver's deadline fires.

use replication_recovery::resend::{BoxFuture, ReplicationAdmin, ResendRequest};
use replication_recovery::RecoveryError;
use std::sync::Mutex;
use std::time::Duration;

/// Mock admin client that records all calls.
///
/// # Example
/// ```rust,ignore
/// let mock = MockAdmin::new("cluster-a").with_delay(Duration::from_secs(60));
/// let driver = ResendDriver::new(mock, Duration::from_millis(10));
/// ```
pub struct MockAdmin {
    cluster: String,
    requests: Mutex<Vec<ResendRequest>>,
    delay: Option<Duration>,
    failure: Option<String>,
}

impl MockAdmin {
    pub fn new(cluster: &str) -> Self {
        Self {
            cluster: cluster.to_string(),
            requests: Mutex::new(Vec::new()),
            delay: None,
            failure: None,
        }
    }

    /// Respond only after `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Reject every request with `message`.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn requests(&self) -> Vec<ResendRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ReplicationAdmin for MockAdmin {
    fn cluster(&self) -> &str {
        &self.cluster
    }

    fn resend_replication_tasks(&self, request: &ResendRequest) -> BoxFuture<'_, ()> {
        self.requests.lock().unwrap().push(request.clone());
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.failure {
                Some(message) => Err(RecoveryError::resend(&self.cluster, message)),
                None => Ok(()),
            }
        })
    }
}
