//! Configuration for dump parsing and resend runs.
//!
//! Configuration can be constructed programmatically, built by the CLI from
//! its flags, or deserialized from JSON.
//!
//! # Quick Start
//!
//! ```rust
//! use replication_recovery::config::ParseConfig;
//! use replication_recovery::message::MessageKind;
//!
//! let config = ParseConfig {
//!     message_kind: MessageKind::Visibility,
//!     skip_errors: true,
//!     workflow_id: Some("order-1234".into()),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! ParseConfig
//! ├── input / output: Option<PathBuf>   # None means stdin / stdout
//! ├── message_kind: MessageKind         # history | visibility
//! ├── skip_errors, header_only: bool
//! ├── workflow_id, run_id: Option<String>
//! ├── chunk_size: usize                 # read size (8192)
//! └── queue_capacity: usize             # stage queue bound (10000)
//!
//! ResendConfig
//! ├── timeout: String                   # humantime, "30s"
//! └── endpoint_path: String             # admin endpoint on the target cluster
//!
//! ClusterMetadata                       # replication group topology
//! ├── current_cluster_name, primary_cluster_name
//! ├── failover_version_increment
//! └── cluster_information: name -> ClusterInformation
//! ```
//!
//! # JSON Example (cluster metadata)
//!
//! ```json
//! {
//!   "failoverVersionIncrement": 10,
//!   "primaryClusterName": "cluster-a",
//!   "currentClusterName": "cluster-a",
//!   "clusterInformation": {
//!     "cluster-a": { "enabled": true, "initialFailoverVersion": 0, "rpcAddress": "http://a:7933" },
//!     "cluster-b": { "enabled": true, "initialFailoverVersion": 2, "rpcAddress": "http://b:7933" }
//!   }
//! }
//! ```

use crate::decoder::ErrorPolicy;
use crate::error::{RecoveryError, Result};
use crate::filter::MessageFilter;
use crate::message::MessageKind;
use crate::reader::DEFAULT_CHUNK_SIZE;
use crate::sink::OutputFormat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

// ═══════════════════════════════════════════════════════════════════════════════
// ParseConfig: one dump-parsing run
// ═══════════════════════════════════════════════════════════════════════════════

/// Settings for one parse run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseConfig {
    /// Dump file to read. `None` reads stdin.
    #[serde(default)]
    pub input: Option<PathBuf>,

    /// File to write. `None` writes stdout.
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Which message kind every payload in the dump is decoded as.
    #[serde(default)]
    pub message_kind: MessageKind,

    /// Count and drop undecodable messages instead of aborting.
    #[serde(default = "default_false")]
    pub skip_errors: bool,

    /// Write one summary line per message instead of JSON.
    #[serde(default = "default_false")]
    pub header_only: bool,

    #[serde(default)]
    pub workflow_id: Option<String>,

    #[serde(default)]
    pub run_id: Option<String>,

    /// Bytes requested per input read.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Capacity of each inter-stage queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_false() -> bool {
    false
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_queue_capacity() -> usize {
    10_000
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            message_kind: MessageKind::default(),
            skip_errors: false,
            header_only: false,
            workflow_id: None,
            run_id: None,
            chunk_size: default_chunk_size(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl ParseConfig {
    /// Small buffers so that tests exercise chunk boundaries and backpressure.
    pub fn for_testing(message_kind: MessageKind) -> Self {
        Self {
            message_kind,
            chunk_size: 7,
            queue_capacity: 2,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RecoveryError::Config("chunk_size must be positive".into()));
        }
        if self.queue_capacity == 0 {
            return Err(RecoveryError::Config(
                "queue_capacity must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn policy(&self) -> ErrorPolicy {
        ErrorPolicy::from_skip_errors(self.skip_errors)
    }

    pub fn format(&self) -> OutputFormat {
        OutputFormat::from_header_only(self.header_only)
    }

    pub fn filter(&self) -> MessageFilter {
        MessageFilter::new(self.workflow_id.clone(), self.run_id.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ResendConfig: cross-cluster resend
// ═══════════════════════════════════════════════════════════════════════════════

/// Settings for a resend call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResendConfig {
    /// Deadline for the whole remote call (humantime: "30s", "2m").
    #[serde(default = "default_resend_timeout")]
    pub timeout: String,

    /// Path of the resend endpoint, appended to the cluster's rpc address.
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,
}

fn default_resend_timeout() -> String {
    "30s".to_string()
}

fn default_endpoint_path() -> String {
    "/admin/resend-replication-tasks".to_string()
}

impl Default for ResendConfig {
    fn default() -> Self {
        Self {
            timeout: default_resend_timeout(),
            endpoint_path: default_endpoint_path(),
        }
    }
}

impl ResendConfig {
    /// Config with an explicit timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: humantime::format_duration(timeout).to_string(),
            ..Default::default()
        }
    }

    /// Parse the timeout. Falls back to 30s on an unparsable value.
    pub fn timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.timeout).unwrap_or(Duration::from_secs(30))
    }

    pub fn validate(&self) -> Result<()> {
        let timeout = humantime::parse_duration(&self.timeout).map_err(|e| {
            RecoveryError::Config(format!("invalid resend timeout '{}': {}", self.timeout, e))
        })?;
        if timeout.is_zero() {
            return Err(RecoveryError::Config("resend timeout must be positive".into()));
        }
        if !self.endpoint_path.starts_with('/') {
            return Err(RecoveryError::Config(format!(
                "endpoint path '{}' must start with '/'",
                self.endpoint_path
            )));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ClusterMetadata: replication group topology
// ═══════════════════════════════════════════════════════════════════════════════

/// Default rpc service name filled in for clusters that omit one.
pub const DEFAULT_RPC_NAME: &str = "cadence-frontend";

/// All clusters participating in a replication group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMetadata {
    /// Each cluster's failover version advances by this step. Also bounds the
    /// number of clusters in the group.
    #[serde(default)]
    pub failover_version_increment: i64,

    #[serde(default)]
    pub primary_cluster_name: String,

    /// Deprecated alias of `primary_cluster_name`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub master_cluster_name: String,

    #[serde(default)]
    pub current_cluster_name: String,

    #[serde(default)]
    pub cluster_information: BTreeMap<String, ClusterInformation>,
}

/// One cluster of the replication group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInformation {
    #[serde(default)]
    pub enabled: bool,

    /// Identifier of the cluster, `0 <= value < failover_version_increment`.
    #[serde(default)]
    pub initial_failover_version: i64,

    #[serde(default)]
    pub rpc_name: String,

    /// Base URL of the cluster's frontend.
    #[serde(default)]
    pub rpc_address: String,
}

impl ClusterMetadata {
    /// Load, fill defaults and validate a JSON metadata file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| RecoveryError::io(format!("read {}", path.display()), e))?;
        let mut metadata: Self = serde_json::from_slice(&bytes).map_err(|e| {
            RecoveryError::Config(format!("invalid cluster metadata {}: {}", path.display(), e))
        })?;
        metadata.fill_defaults();
        metadata.validate()?;
        Ok(metadata)
    }

    pub fn fill_defaults(&mut self) {
        if self.primary_cluster_name.is_empty() && !self.master_cluster_name.is_empty() {
            warn!("masterClusterName is deprecated, use primaryClusterName");
            self.primary_cluster_name = self.master_cluster_name.clone();
        }
        for info in self.cluster_information.values_mut() {
            if info.rpc_name.is_empty() {
                info.rpc_name = DEFAULT_RPC_NAME.to_string();
            }
        }
    }

    /// Check the topology. Every problem found is reported in one error.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.primary_cluster_name.is_empty() {
            problems.push("primary cluster name is empty".to_string());
        }
        if self.current_cluster_name.is_empty() {
            problems.push("current cluster name is empty".to_string());
        }
        if self.failover_version_increment == 0 {
            problems.push("version increment is 0".to_string());
        }
        if self.cluster_information.is_empty() {
            problems.push("empty cluster information".to_string());
        }
        if !self.primary_cluster_name.is_empty()
            && !self.cluster_information.contains_key(&self.primary_cluster_name)
        {
            problems.push("primary cluster is not specified in cluster info".to_string());
        }
        if !self.current_cluster_name.is_empty()
            && !self.cluster_information.contains_key(&self.current_cluster_name)
        {
            problems.push("current cluster is not specified in cluster info".to_string());
        }

        let mut versions = HashSet::new();
        for (name, info) in &self.cluster_information {
            if name.is_empty() {
                problems.push("cluster with empty name defined".to_string());
            }
            versions.insert(info.initial_failover_version);
            if info.initial_failover_version < 0
                || self.failover_version_increment <= info.initial_failover_version
            {
                problems.push(format!(
                    "cluster {}: version increment {} is smaller than initial version: {}",
                    name, self.failover_version_increment, info.initial_failover_version
                ));
            }
            if info.enabled && (info.rpc_name.is_empty() || info.rpc_address.is_empty()) {
                problems.push(format!("cluster {}: rpc name / address is empty", name));
            }
        }
        if versions.len() != self.cluster_information.len() {
            problems.push("cluster info initial versions have duplicates".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(RecoveryError::Config(problems.join("; ")))
        }
    }

    /// Look up a cluster by name.
    pub fn cluster(&self, name: &str) -> Option<&ClusterInformation> {
        self.cluster_information.get(name)
    }

    /// RPC address of an enabled cluster.
    pub fn rpc_address(&self, name: &str) -> Result<&str> {
        match self.cluster(name) {
            Some(info) if info.enabled => Ok(info.rpc_address.as_str()),
            Some(_) => Err(RecoveryError::Config(format!("cluster {} is disabled", name))),
            None => Err(RecoveryError::Config(format!("unknown cluster {}", name))),
        }
    }
}
