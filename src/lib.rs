//! # Replication Recovery
//!
//! Operational recovery tooling for cross-cluster workflow replication.
//!
//! When replication between clusters breaks, operators capture a raw tail
//! dump of the replication log and need the individual events back out of
//! it. This crate turns such a dump into typed, filterable messages, and
//! separately drives a targeted resend of one workflow's history from a
//! source cluster.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                          replication-recovery                             │
//! │                                                                           │
//! │  ┌─────────────┐    ┌──────────────────┐    ┌──────────────────────────┐  │
//! │  │ Reader      │───►│ FrameSplitter    │───►│ Filter + SinkWriter      │  │
//! │  │ (chunks)    │    │ + MessageDecoder │    │ (NDJSON / summary lines) │  │
//! │  └─────────────┘    └──────────────────┘    └──────────────────────────┘  │
//! │                              │                          │                 │
//! │                              ▼                          ▼                 │
//! │                     ┌──────────────────┐      ┌──────────────────┐        │
//! │                     │ PipelineCounters │      │ EventBlobDecoder │        │
//! │                     │ (skip count)     │      │ (history events) │        │
//! │                     └──────────────────┘      └──────────────────┘        │
//! │                                                                           │
//! │  ┌─────────────┐    ┌──────────────────┐                                  │
//! │  │ ResendDriver│───►│ ReplicationAdmin │  (single call with a deadline)   │
//! │  └─────────────┘    └──────────────────┘                                  │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use replication_recovery::{ParseConfig, ParsePipeline};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ParseConfig {
//!         skip_errors: true,
//!         ..Default::default()
//!     };
//!     let pipeline = ParsePipeline::new(config).expect("valid config");
//!     let report = pipeline
//!         .run(tokio::io::stdin(), tokio::io::stdout())
//!         .await
//!         .expect("parse failed");
//!     eprintln!("{} messages were skipped due to errors in parsing", report.skipped);
//! }
//! ```

pub mod config;
pub mod counters;
pub mod decoder;
pub mod error;
pub mod events;
pub mod filter;
pub mod message;
pub mod metrics;
pub mod pipeline;
pub mod reader;
pub mod resend;
pub mod sink;
pub mod splitter;
pub mod wire;

// Re-exports for convenience
pub use config::{ClusterInformation, ClusterMetadata, ParseConfig, ResendConfig};
pub use counters::{ParseReport, PipelineCounters};
pub use decoder::{ErrorPolicy, MessageDecoder};
pub use error::{FramingError, PipelineError, RecoveryError, Result, Stage};
pub use events::{EventBlobDecoder, HistoryEvent, HistoryProjection, PayloadSerializer};
pub use filter::MessageFilter;
pub use message::{MessageKind, ReplicationMessage, ReplicationTask, VisibilityMessage};
pub use pipeline::ParsePipeline;
pub use resend::{HttpAdminClient, ReplicationAdmin, ResendDriver, ResendRequest};
pub use sink::{OutputFormat, SinkWriter};
pub use splitter::{FrameSplitter, RawFrame};
