// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "replication-recovery",
    about = "Recover replication messages from log dumps and resend workflow history between clusters",
    author,
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Parse a raw replication log dump into JSON or summary lines.
    Parse {
        /// Dump file to read (default: stdin).
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// File to write (default: stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Only emit messages of this workflow.
        #[arg(short, long = "workflow-id")]
        workflow_id: Option<String>,
        /// Only emit messages of this run.
        #[arg(short, long = "run-id")]
        run_id: Option<String>,
        /// Skip messages that fail to decode and report how many were skipped.
        #[arg(long)]
        skip_errors: bool,
        /// Print only domainID, workflowID and runID of each message.
        #[arg(long)]
        headers: bool,
        /// Payload kind: 0 for replication tasks, 1 for visibility messages.
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(i64).range(0..=1))]
        message_type: i64,
        /// Bytes per input read.
        #[arg(long, default_value_t = replication_recovery::reader::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
    /// Ask a cluster to re-fetch a workflow's history from a source cluster.
    Rereplicate {
        #[arg(long = "domain-id")]
        domain_id: String,
        #[arg(long = "workflow-id")]
        workflow_id: String,
        #[arg(long = "run-id")]
        run_id: String,
        /// Cluster to re-fetch the history from.
        #[arg(long = "source-cluster")]
        source_cluster: String,
        /// Last event id to resend (inclusive). Default: latest event.
        #[arg(long = "max-event-id")]
        max_event_id: Option<i64>,
        /// Version of the last event to resend.
        #[arg(long = "end-event-version")]
        end_event_version: Option<i64>,
        /// Deadline for the resend call in seconds.
        #[arg(long = "context-timeout", default_value_t = 30)]
        context_timeout: u64,
        /// Cluster metadata JSON; the current cluster's rpc address is used.
        #[arg(long = "clusters-config", conflicts_with = "address")]
        clusters_config: Option<PathBuf>,
        /// Admin address of the cluster performing the resend.
        #[arg(long, required_unless_present = "clusters_config")]
        address: Option<String>,
        /// Resend endpoint path on the admin address.
        #[arg(long = "endpoint-path", default_value = "/admin/resend-replication-tasks")]
        endpoint_path: String,
    },
}
