// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Integration Tests for Replication Recovery
//!
//! Drive the full pipeline over in-memory dumps and the resend driver over a
//! mock admin client. No external services required.
//!
//! # Running Tests
//! ```bash
//! cargo test --test integration
//!
//! # Run specific group
//! cargo test --test integration pipeline_
//! ```
//!
//! # Test Organization
//! - `pipeline_*` - End-to-end parsing, filtering and output formats
//! - `file_*` - File input and output
//! - `resend_*` - Resend request building and the driver's deadline

mod common;

use common::{history_message, visibility_message, DumpBuilder, MockAdmin, SharedSink};
use replication_recovery::config::ParseConfig;
use replication_recovery::error::{RecoveryError, Stage};
use replication_recovery::message::{
    DataBlob, EncodingType, HistoryTaskV2Attributes, MessageKind, ReplicationMessage,
    ReplicationTask,
};
use replication_recovery::pipeline::ParsePipeline;
use replication_recovery::{ParseReport, PipelineError};
use replication_recovery::resend::{ResendDriver, ResendRequest};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

fn config(kind: MessageKind) -> ParseConfig {
    ParseConfig::for_testing(kind)
}

async fn run(config: ParseConfig, dump: Vec<u8>) -> (SharedSink, Result<ParseReport, PipelineError>) {
    let sink = SharedSink::new();
    let pipeline = ParsePipeline::new(config).unwrap();
    let result = pipeline.run(Cursor::new(dump), sink.clone()).await;
    (sink, result)
}

// =============================================================================
// Pipeline Tests
// =============================================================================

#[tokio::test]
async fn pipeline_emits_json_projection_per_message() {
    let dump = DumpBuilder::new()
        .message(&history_message("wf-1", "run-1", 1))
        .message(&history_message("wf-2", "run-2", 2))
        .build();

    let (sink, result) = run(config(MessageKind::History), dump).await;
    let report = result.unwrap();

    assert_eq!(report.frames, 2);
    assert_eq!(report.emitted, 2);
    let lines = sink.json_lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["Task"]["historyTaskV2Attributes"]["workflowId"], "wf-1");
    assert_eq!(lines[0]["Events"][0]["eventId"], 1);
    assert!(lines[0]["Task"]["historyTaskV2Attributes"].get("events").is_none());
    assert_eq!(lines[1]["Events"][0]["eventId"], 2);
}

#[tokio::test]
async fn pipeline_visibility_summary_lines() {
    let mut config = config(MessageKind::Visibility);
    config.header_only = true;
    let dump = DumpBuilder::new()
        .message(&visibility_message("wf-1", "run-1", 5))
        .message(&visibility_message("wf-2", "run-2", 6))
        .build();

    let (sink, result) = run(config, dump).await;
    result.unwrap();
    assert_eq!(
        sink.lines(),
        vec![
            "domain-1, wf-1, run-1, Index, 5",
            "domain-1, wf-2, run-2, Index, 6"
        ]
    );
}

#[tokio::test]
async fn pipeline_permissive_skips_corrupt_frames() {
    // N = 6 groups, K = 2 corrupt.
    let dump = DumpBuilder::new()
        .message(&history_message("a", "r", 1))
        .corrupt()
        .message(&history_message("b", "r", 2))
        .message(&history_message("c", "r", 3))
        .corrupt()
        .message(&history_message("d", "r", 4))
        .build();
    let mut config = config(MessageKind::History);
    config.skip_errors = true;
    config.header_only = true;

    let (sink, result) = run(config, dump).await;
    let report = result.unwrap();

    assert_eq!(report.frames, 6);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.emitted, 4);
    assert_eq!(
        sink.lines(),
        vec![
            "domain-1, a, r",
            "domain-1, b, r",
            "domain-1, c, r",
            "domain-1, d, r"
        ]
    );
}

#[tokio::test]
async fn pipeline_strict_aborts_at_first_corrupt_frame() {
    let dump = DumpBuilder::new()
        .message(&history_message("a", "r", 1))
        .message(&history_message("b", "r", 2))
        .corrupt()
        .message(&history_message("c", "r", 3))
        .build();
    let mut config = config(MessageKind::History);
    config.header_only = true;

    let (sink, result) = run(config, dump).await;
    let err = result.unwrap_err();

    assert_eq!(err.stage, Stage::Parser);
    assert!(matches!(err.source, RecoveryError::Decode { .. }));
    // Only messages before the corrupt frame, nothing after it.
    assert_eq!(sink.lines(), vec!["domain-1, a, r", "domain-1, b, r"]);
}

#[tokio::test]
async fn pipeline_filter_is_conjunctive() {
    let dump = DumpBuilder::new()
        .message(&history_message("A", "X", 1))
        .message(&history_message("A", "Y", 2))
        .message(&history_message("B", "X", 3))
        .message(&history_message("B", "Y", 4))
        .build();

    let mut both = config(MessageKind::History);
    both.header_only = true;
    both.workflow_id = Some("A".into());
    both.run_id = Some("X".into());
    let (sink, result) = run(both, dump.clone()).await;
    let report = result.unwrap();
    assert_eq!(sink.lines(), vec!["domain-1, A, X"]);
    assert_eq!(report.filtered_out, 3);

    let mut workflow_only = config(MessageKind::History);
    workflow_only.header_only = true;
    workflow_only.workflow_id = Some("B".into());
    let (sink, result) = run(workflow_only, dump).await;
    result.unwrap();
    assert_eq!(sink.lines(), vec!["domain-1, B, X", "domain-1, B, Y"]);
}

#[tokio::test]
async fn pipeline_preserves_order_in_both_formats() {
    let mut builder = DumpBuilder::new();
    for i in 0..50 {
        builder = builder.message(&history_message(&format!("wf-{i}"), "r", i));
        if i % 7 == 3 {
            builder = builder.corrupt();
        }
    }
    let dump = builder.build();

    let mut summary = config(MessageKind::History);
    summary.header_only = true;
    summary.skip_errors = true;
    let (sink, result) = run(summary, dump.clone()).await;
    result.unwrap();
    let expected: Vec<String> = (0..50).map(|i| format!("domain-1, wf-{i}, r")).collect();
    assert_eq!(sink.lines(), expected);

    let mut json = config(MessageKind::History);
    json.skip_errors = true;
    let (sink, result) = run(json, dump).await;
    result.unwrap();
    let ids: Vec<i64> = sink
        .json_lines()
        .iter()
        .map(|v| v["Events"][0]["eventId"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, (0..50).collect::<Vec<_>>());
}

#[tokio::test]
async fn pipeline_lookalike_header_in_payload_is_not_a_boundary() {
    let mut attrs = HistoryTaskV2Attributes::new("domain-1", "tricky", "r");
    attrs.events = Some(DataBlob::new(
        EncodingType::Json,
        br#"[{"eventId":1,"note":"Partition: 7, Offset: 8, Key: nine"}]"#.to_vec(),
    ));
    let tricky = ReplicationMessage::History(ReplicationTask::history_v2(attrs));
    let dump = DumpBuilder::new()
        .message(&tricky)
        .message(&history_message("after", "r", 2))
        .build();

    // Whole dump in one chunk: look-alike and next real header arrive together.
    let mut config = config(MessageKind::History);
    config.chunk_size = dump.len();
    let (sink, result) = run(config, dump).await;
    let report = result.unwrap();

    assert_eq!(report.frames, 2);
    let lines = sink.json_lines();
    assert_eq!(lines[0]["Events"][0]["note"], "Partition: 7, Offset: 8, Key: nine");
    assert_eq!(lines[1]["Task"]["historyTaskV2Attributes"]["workflowId"], "after");
}

#[tokio::test]
async fn pipeline_non_v2_tasks_pass_through() {
    let dump = DumpBuilder::new()
        .raw(&ReplicationMessage::History(ReplicationTask {
            task_type: Some(replication_recovery::message::ReplicationTaskType::SyncActivity),
            source_task_id: Some(77),
            ..Default::default()
        })
        .to_frame())
        .build();

    let (sink, result) = run(config(MessageKind::History), dump).await;
    result.unwrap();
    let lines = sink.json_lines();
    assert_eq!(lines[0]["taskType"], "SyncActivity");
    assert_eq!(lines[0]["sourceTaskId"], 77);
}

#[tokio::test]
async fn pipeline_missing_marker_is_fatal_even_when_permissive() {
    let dump = DumpBuilder::new()
        .message(&history_message("a", "r", 1))
        .raw(b"text without marker")
        .message(&history_message("b", "r", 2))
        .build();
    let mut config = config(MessageKind::History);
    config.skip_errors = true;

    let (_, result) = run(config, dump).await;
    let err = result.unwrap_err();
    assert_eq!(err.stage, Stage::Parser);
    assert!(matches!(err.source, RecoveryError::Framing(_)));
}

#[tokio::test]
async fn pipeline_input_without_headers_fails() {
    let (_, result) = run(config(MessageKind::History), b"just some bytes\n".to_vec()).await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("header not found"));
}

#[tokio::test]
async fn pipeline_wrong_kind_is_decode_error() {
    // A history-v2 task type (5) is not a valid visibility message type.
    let dump = DumpBuilder::new()
        .message(&history_message("wf", "r", 1))
        .build();
    let (_, result) = run(config(MessageKind::Visibility), dump).await;
    assert!(matches!(
        result.unwrap_err().source,
        RecoveryError::Decode { .. }
    ));
}

// =============================================================================
// File I/O Tests
// =============================================================================

#[tokio::test]
async fn file_input_to_file_output() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("dump.bin");
    let output_path = dir.path().join("out.jsonl");
    let dump = DumpBuilder::new()
        .message(&history_message("wf-1", "r", 1))
        .message(&history_message("wf-2", "r", 2))
        .build();
    std::fs::write(&input_path, &dump).unwrap();

    let config = ParseConfig {
        input: Some(input_path.clone()),
        output: Some(output_path.clone()),
        header_only: true,
        ..Default::default()
    };
    let pipeline = ParsePipeline::new(config).unwrap();
    let input = tokio::fs::File::open(&input_path).await.unwrap();
    let output = tokio::fs::File::create(&output_path).await.unwrap();
    let report = pipeline.run(input, output).await.unwrap();

    assert_eq!(report.emitted, 2);
    let written = std::fs::read_to_string(&output_path).unwrap();
    assert_eq!(written, "domain-1, wf-1, r\ndomain-1, wf-2, r\n");
}

// =============================================================================
// Resend Tests
// =============================================================================

#[tokio::test]
async fn resend_max_event_id_is_sent_exclusive() {
    let admin = Arc::new(MockAdmin::new("cluster-a"));
    let driver = ResendDriver::new(Arc::clone(&admin), Duration::from_secs(30));
    let request = ResendRequest::new("d", "w", "r", "cluster-b")
        .with_max_event_id(100)
        .unwrap();

    driver.resend(&request).await.unwrap();

    let sent = admin.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].end_event_id, Some(101));
    assert_eq!(sent[0].remote_cluster, "cluster-b");
}

#[tokio::test]
async fn resend_without_max_event_id_leaves_bound_absent() {
    let admin = Arc::new(MockAdmin::new("cluster-a"));
    let driver = ResendDriver::new(Arc::clone(&admin), Duration::from_secs(30));
    driver
        .resend(&ResendRequest::new("d", "w", "r", "cluster-b"))
        .await
        .unwrap();
    assert_eq!(admin.requests()[0].end_event_id, None);
    assert_eq!(admin.requests()[0].end_event_version, None);
}

#[tokio::test(start_paused = true)]
async fn resend_times_out_without_retry() {
    let admin = Arc::new(MockAdmin::new("cluster-a").with_delay(Duration::from_secs(120)));
    let driver = ResendDriver::new(Arc::clone(&admin), Duration::from_secs(30));

    let err = driver
        .resend(&ResendRequest::new("d", "w", "r", "cluster-b"))
        .await
        .unwrap_err();

    assert!(matches!(err, RecoveryError::ResendTimeout { .. }));
    assert_eq!(admin.call_count(), 1);
}

#[tokio::test]
async fn resend_remote_error_propagates() {
    let admin = Arc::new(MockAdmin::new("cluster-a").failing("workflow not found"));
    let driver = ResendDriver::new(Arc::clone(&admin), Duration::from_secs(30));

    let err = driver
        .resend(&ResendRequest::new("d", "w", "r", "cluster-b"))
        .await
        .unwrap_err();

    assert!(matches!(err, RecoveryError::Resend { .. }));
    assert!(err.to_string().contains("workflow not found"));
    assert_eq!(admin.call_count(), 1);
}
