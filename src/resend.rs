// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cross-cluster resend of a workflow's history.
//!
//! The target cluster's admin service is asked to re-fetch the replication
//! tasks of one workflow run from a remote (source) cluster. A resend is a
//! single awaited call bounded by a timeout; it is never retried here.
//!
//! The remote side sits behind [`ReplicationAdmin`] so the driver can be
//! tested with a mock. [`HttpAdminClient`] is the real transport.
//!
//! # Example
//!
//! ```rust,no_run
//! use replication_recovery::resend::{HttpAdminClient, ResendDriver, ResendRequest};
//! use std::time::Duration;
//!
//! # async fn run() -> replication_recovery::Result<()> {
//! let admin = HttpAdminClient::new("http://cluster-a:7933", "/admin/resend-replication-tasks")?;
//! let request = ResendRequest::new("domain-id", "order-1234", "run-id", "cluster-b")
//!     .with_max_event_id(100)?;
//! ResendDriver::new(admin, Duration::from_secs(30)).resend(&request).await
//! # }
//! ```

use crate::error::{RecoveryError, Result};
use crate::metrics;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Type alias for boxed async futures (keeps the trait object-safe).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Default deadline for one resend call.
pub const DEFAULT_RESEND_TIMEOUT: Duration = Duration::from_secs(30);

/// A resend request. Built once per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResendRequest {
    #[serde(rename = "domainID")]
    pub domain_id: String,
    #[serde(rename = "workflowID")]
    pub workflow_id: String,
    #[serde(rename = "runID")]
    pub run_id: String,
    /// Cluster to re-fetch the history from.
    #[serde(rename = "remoteCluster")]
    pub remote_cluster: String,
    /// Exclusive upper bound on event ids. `None` resends up to the latest
    /// event.
    #[serde(rename = "endEventID", default, skip_serializing_if = "Option::is_none")]
    pub end_event_id: Option<i64>,
    #[serde(
        rename = "endEventVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub end_event_version: Option<i64>,
}

impl ResendRequest {
    pub fn new(
        domain_id: impl Into<String>,
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
        remote_cluster: impl Into<String>,
    ) -> Self {
        Self {
            domain_id: domain_id.into(),
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
            remote_cluster: remote_cluster.into(),
            end_event_id: None,
            end_event_version: None,
        }
    }

    /// Resend events up to and including `max_event_id`.
    ///
    /// Stored as the exclusive bound `max_event_id + 1`.
    pub fn with_max_event_id(mut self, max_event_id: i64) -> Result<Self> {
        let end = max_event_id.checked_add(1).ok_or_else(|| {
            RecoveryError::Config(format!("max event id {} is out of range", max_event_id))
        })?;
        self.end_event_id = Some(end);
        Ok(self)
    }

    pub fn with_end_event_version(mut self, version: i64) -> Self {
        self.end_event_version = Some(version);
        self
    }

    /// Reject requests with missing identifiers.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("domain id", &self.domain_id),
            ("workflow id", &self.workflow_id),
            ("run id", &self.run_id),
            ("source cluster", &self.remote_cluster),
        ];
        for (name, value) in required {
            if value.is_empty() {
                return Err(RecoveryError::Config(format!("{} is required", name)));
            }
        }
        Ok(())
    }
}

/// Admin interface of the cluster that performs the resend.
pub trait ReplicationAdmin: Send + Sync {
    /// Name of the cluster this client talks to (for logs and errors).
    fn cluster(&self) -> &str;

    /// Ask the cluster to re-fetch the request's history from its remote
    /// cluster. Completes when the cluster has accepted or failed it.
    fn resend_replication_tasks(&self, request: &ResendRequest) -> BoxFuture<'_, ()>;
}

impl<T: ReplicationAdmin + ?Sized> ReplicationAdmin for Arc<T> {
    fn cluster(&self) -> &str {
        (**self).cluster()
    }

    fn resend_replication_tasks(&self, request: &ResendRequest) -> BoxFuture<'_, ()> {
        (**self).resend_replication_tasks(request)
    }
}

/// Issues one resend with a deadline.
pub struct ResendDriver<A> {
    admin: A,
    timeout: Duration,
}

impl<A: ReplicationAdmin> ResendDriver<A> {
    pub fn new(admin: A, timeout: Duration) -> Self {
        Self { admin, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Perform the resend. Any remote failure or an expired deadline fails
    /// the call.
    pub async fn resend(&self, request: &ResendRequest) -> Result<()> {
        request.validate()?;
        let cluster = self.admin.cluster().to_string();
        info!(
            cluster = %cluster,
            domain_id = %request.domain_id,
            workflow_id = %request.workflow_id,
            run_id = %request.run_id,
            remote_cluster = %request.remote_cluster,
            end_event_id = ?request.end_event_id,
            end_event_version = ?request.end_event_version,
            "Starting resend"
        );

        let start = Instant::now();
        let outcome = tokio::time::timeout(
            self.timeout,
            self.admin.resend_replication_tasks(request),
        )
        .await;
        let elapsed = start.elapsed();

        match outcome {
            Ok(Ok(())) => {
                metrics::record_resend(&cluster, "success", elapsed);
                info!(cluster = %cluster, elapsed_ms = elapsed.as_millis() as u64, "Resend complete");
                Ok(())
            }
            Ok(Err(e)) => {
                metrics::record_resend(&cluster, "failure", elapsed);
                warn!(cluster = %cluster, error = %e, "Resend failed");
                Err(e)
            }
            Err(_) => {
                metrics::record_resend(&cluster, "timeout", elapsed);
                warn!(cluster = %cluster, timeout = ?self.timeout, "Resend timed out");
                Err(RecoveryError::ResendTimeout {
                    cluster,
                    timeout: self.timeout,
                })
            }
        }
    }
}

/// [`ReplicationAdmin`] over HTTP: POSTs the JSON request to the admin
/// endpoint. Any non-success status is a remote rejection.
pub struct HttpAdminClient {
    client: reqwest::Client,
    url: String,
    cluster: String,
}

impl HttpAdminClient {
    /// Client for the cluster whose frontend is at `address`.
    pub fn new(address: &str, endpoint_path: &str) -> Result<Self> {
        let address = address.trim_end_matches('/');
        if address.is_empty() {
            return Err(RecoveryError::Config("admin address is empty".into()));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| RecoveryError::Config(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            url: format!("{}{}", address, endpoint_path),
            cluster: address.to_string(),
        })
    }

    /// Label used in logs and errors instead of the address.
    pub fn with_cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster = name.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ReplicationAdmin for HttpAdminClient {
    fn cluster(&self) -> &str {
        &self.cluster
    }

    fn resend_replication_tasks(&self, request: &ResendRequest) -> BoxFuture<'_, ()> {
        let call = self.client.post(&self.url).json(request).send();
        Box::pin(async move {
            let response = call
                .await
                .map_err(|e| RecoveryError::resend(&self.cluster, e.to_string()))?;
            let status = response.status();
            if status.is_success() {
                return Ok(());
            }
            let message = match response.text().await {
                Ok(body) => rejection_message(status, &body),
                Err(e) => format!("{}: body read failed: {}", status, e),
            };
            Err(RecoveryError::resend(&self.cluster, message))
        })
    }
}

fn rejection_message(status: reqwest::StatusCode, body: &str) -> String {
    match body.trim() {
        "" => status.to_string(),
        body => format!("{}: {}", status, body),
    }
}
