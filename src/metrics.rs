//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Frames cut from a dump and frames skipped in permissive mode
//! - Messages emitted and filtered out
//! - Resend requests and their latency
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `recovery_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Histograms track distributions (duration)
//!
//! No exporter is installed by this crate. Without a recorder these calls
//! are no-ops; an embedding process may install one.
//!
//! # Usage
//!
//! ```rust,no_run
//! use replication_recovery::metrics;
//! use std::time::Duration;
//!
//! metrics::record_frame_skipped("decode");
//! metrics::record_resend("cluster-b", "success", Duration::from_millis(120));
//! ```

use metrics::{counter, histogram};
use std::time::Duration;

/// Record a frame cut from the dump.
pub fn record_frame() {
    counter!("recovery_frames_total").increment(1);
}

/// Record a frame or message skipped in permissive mode.
pub fn record_frame_skipped(stage: &str) {
    counter!("recovery_frames_skipped_total", "stage" => stage.to_string()).increment(1);
}

/// Record a message written to the sink.
pub fn record_message_emitted() {
    counter!("recovery_messages_emitted_total").increment(1);
}

/// Record a message rejected by the filter.
pub fn record_message_filtered() {
    counter!("recovery_messages_filtered_total").increment(1);
}

/// Record a resend outcome ("success", "failure", "timeout") and latency.
pub fn record_resend(cluster: &str, outcome: &str, duration: Duration) {
    counter!(
        "recovery_resend_total",
        "cluster" => cluster.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("recovery_resend_duration_seconds", "cluster" => cluster.to_string())
        .record(duration.as_secs_f64());
}
