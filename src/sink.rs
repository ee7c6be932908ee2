// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Output stage: filter, render and write decoded messages.
//!
//! Two output formats:
//!
//! - [`OutputFormat::Json`]: one JSON object per line. History-v2 tasks are
//!   written as a [`HistoryProjection`] with decoded events.
//! - [`OutputFormat::Summary`]: `domainID, workflowID, runID` per history
//!   task, plus `, messageType, version` for visibility messages.
//!
//! Render failures follow the [`ErrorPolicy`]. Write failures are always
//! fatal.

use crate::counters::PipelineCounters;
use crate::decoder::ErrorPolicy;
use crate::error::{RecoveryError, Result};
use crate::events::{EventBlobDecoder, HistoryProjection};
use crate::filter::MessageFilter;
use crate::message::{ReplicationMessage, VisibilityMessageType};
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tracing::trace;

/// Rendering of each emitted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Summary,
}

impl OutputFormat {
    pub fn from_header_only(header_only: bool) -> Self {
        if header_only {
            OutputFormat::Summary
        } else {
            OutputFormat::Json
        }
    }
}

/// Writes messages from the typed-message queue to an output.
pub struct SinkWriter<W> {
    writer: BufWriter<W>,
    format: OutputFormat,
    filter: MessageFilter,
    events: Arc<dyn EventBlobDecoder>,
    policy: ErrorPolicy,
    counters: Arc<PipelineCounters>,
}

impl<W: AsyncWrite + Unpin> SinkWriter<W> {
    pub fn new(
        output: W,
        format: OutputFormat,
        filter: MessageFilter,
        events: Arc<dyn EventBlobDecoder>,
        policy: ErrorPolicy,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            writer: BufWriter::new(output),
            format,
            filter,
            events,
            policy,
            counters,
        }
    }

    /// Drain the queue until it closes, then flush.
    ///
    /// On a fatal error, whatever was already written is flushed before the
    /// error is returned.
    pub async fn run(mut self, mut rx: mpsc::Receiver<ReplicationMessage>) -> Result<()> {
        let result = self.drain(&mut rx).await;
        let flushed = self
            .writer
            .flush()
            .await
            .map_err(|e| RecoveryError::io("flush output", e));
        result.and(flushed)
    }

    async fn drain(&mut self, rx: &mut mpsc::Receiver<ReplicationMessage>) -> Result<()> {
        while let Some(message) = rx.recv().await {
            self.write_message(message).await?;
        }
        Ok(())
    }

    /// Filter, render and write one message.
    pub async fn write_message(&mut self, message: ReplicationMessage) -> Result<()> {
        if !self.filter.matches(&message) {
            self.counters.record_filtered();
            return Ok(());
        }

        let rendered = render(&message, self.format, self.events.as_ref());
        let Some(mut line) = self.policy.handle(rendered, &self.counters, "writer")? else {
            return Ok(());
        };
        line.push(b'\n');

        self.writer
            .write_all(&line)
            .await
            .map_err(|e| RecoveryError::io("write output", e))?;
        self.counters.record_emitted();
        trace!(kind = %message.kind(), bytes = line.len(), "Wrote message");
        Ok(())
    }
}

/// Render one message without the trailing newline.
pub fn render(
    message: &ReplicationMessage,
    format: OutputFormat,
    events: &dyn EventBlobDecoder,
) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Json => render_json(message, events),
        OutputFormat::Summary => Ok(summary_line(message).into_bytes()),
    }
}

fn render_json(message: &ReplicationMessage, events: &dyn EventBlobDecoder) -> Result<Vec<u8>> {
    match message {
        ReplicationMessage::History(task) if task.is_history_v2() => {
            let projection = HistoryProjection::build(task.clone(), events)?;
            Ok(serde_json::to_vec(&projection)?)
        }
        other => Ok(other.to_json()?),
    }
}

fn summary_line(message: &ReplicationMessage) -> String {
    match message {
        ReplicationMessage::History(task) => {
            let (domain_id, workflow_id, run_id) = task
                .history_task_v2_attributes
                .as_ref()
                .map(|a| (a.domain_id.as_str(), a.workflow_id.as_str(), a.run_id.as_str()))
                .unwrap_or_default();
            format!("{domain_id}, {workflow_id}, {run_id}")
        }
        ReplicationMessage::Visibility(msg) => format!(
            "{}, {}, {}, {}, {}",
            msg.domain_id,
            msg.workflow_id,
            msg.run_id,
            msg.message_type.unwrap_or(VisibilityMessageType::Index),
            msg.version.unwrap_or_default()
        ),
    }
}
