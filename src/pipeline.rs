// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Three-stage parse pipeline.
//!
//! ```text
//!  input ──► Reader ──chunks──► Parser ──messages──► Writer ──► output
//!            (read)            (split+decode)        (filter+render)
//! ```
//!
//! Each stage is its own tokio task; queues are bounded `mpsc` channels, so
//! a slow writer back-pressures the reader. Order is preserved end to end.
//!
//! # Termination
//!
//! A stage finishes by dropping its sender, which closes the next stage's
//! input. A failing stage returns its error and drops both channel ends:
//! downstream drains and stops, upstream sees a closed queue and stops
//! quietly. The writer's completion is the end of the run; afterwards the
//! other stages are collected and the first failure in pipeline order
//! (reader, parser, writer) is reported.

use crate::config::ParseConfig;
use crate::counters::{ParseReport, PipelineCounters};
use crate::decoder::MessageDecoder;
use crate::error::{PipelineError, RecoveryError, Result, Stage};
use crate::events::{EventBlobDecoder, PayloadSerializer};
use crate::message::ReplicationMessage;
use crate::reader::run_reader;
use crate::sink::SinkWriter;
use crate::splitter::FrameSplitter;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

/// Dump parsing pipeline.
pub struct ParsePipeline {
    config: ParseConfig,
    events: Arc<dyn EventBlobDecoder>,
}

impl ParsePipeline {
    /// Pipeline using the built-in event blob decoder.
    pub fn new(config: ParseConfig) -> Result<Self> {
        Self::with_event_decoder(config, Arc::new(PayloadSerializer))
    }

    pub fn with_event_decoder(
        config: ParseConfig,
        events: Arc<dyn EventBlobDecoder>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, events })
    }

    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    /// Run the pipeline to completion.
    ///
    /// Output written before a fatal error stays written (and flushed).
    pub async fn run<R, W>(&self, input: R, output: W) -> std::result::Result<ParseReport, PipelineError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let counters = Arc::new(PipelineCounters::new());
        let (chunk_tx, chunk_rx) = mpsc::channel(self.config.queue_capacity);
        let (message_tx, message_rx) = mpsc::channel(self.config.queue_capacity);
        let (aborted_tx, aborted_rx) = watch::channel(false);

        info!(
            kind = %self.config.message_kind,
            skip_errors = self.config.skip_errors,
            header_only = self.config.header_only,
            "Starting parse"
        );

        let reader = tokio::spawn(
            run_reader(input, self.config.chunk_size, chunk_tx, aborted_tx)
                .instrument(info_span!("reader")),
        );

        let decoder = MessageDecoder::new(
            self.config.message_kind,
            self.config.policy(),
            Arc::clone(&counters),
        );
        let parser = tokio::spawn(
            run_parser(chunk_rx, aborted_rx, decoder, Arc::clone(&counters), message_tx)
                .instrument(info_span!("parser")),
        );

        let sink = SinkWriter::new(
            output,
            self.config.format(),
            self.config.filter(),
            Arc::clone(&self.events),
            self.config.policy(),
            Arc::clone(&counters),
        );
        let writer = tokio::spawn(sink.run(message_rx).instrument(info_span!("writer")));

        let writer_result = join_stage(writer).await;
        let parser_result = join_stage(parser).await;
        let reader_result = join_stage(reader).await;

        reader_result.map_err(|e| PipelineError::new(Stage::Reader, e))?;
        parser_result.map_err(|e| PipelineError::new(Stage::Parser, e))?;
        writer_result.map_err(|e| PipelineError::new(Stage::Writer, e))?;

        let report = counters.report();
        if report.skipped > 0 {
            warn!(skipped = report.skipped, "Messages skipped due to parse errors");
        }
        info!(
            frames = report.frames,
            emitted = report.emitted,
            filtered_out = report.filtered_out,
            "Parse complete"
        );
        Ok(report)
    }
}

async fn join_stage(handle: JoinHandle<Result<()>>) -> Result<()> {
    match handle.await {
        Ok(result) => result,
        Err(e) => Err(RecoveryError::Internal(format!("stage task failed: {}", e))),
    }
}

/// Parser stage: split chunks into frames and decode them in order.
///
/// The carried tail is only parsed when the input ended normally; after a
/// read failure (`aborted` raised) it may be a truncated group and is dropped.
pub async fn run_parser(
    mut rx: mpsc::Receiver<Vec<u8>>,
    aborted: watch::Receiver<bool>,
    decoder: MessageDecoder,
    counters: Arc<PipelineCounters>,
    tx: mpsc::Sender<ReplicationMessage>,
) -> Result<()> {
    let mut splitter = FrameSplitter::new()?;

    while let Some(chunk) = rx.recv().await {
        let frames = splitter.push(&chunk)?;
        for frame in frames {
            counters.record_frame();
            let Some(message) = decoder.decode(&frame)? else {
                continue;
            };
            if tx.send(message).await.is_err() {
                debug!("Message queue closed, parser stopping");
                return Ok(());
            }
        }
    }

    if *aborted.borrow() {
        debug!(carried = splitter.buffered(), "Input failed, dropping carried tail");
        return Ok(());
    }

    for frame in splitter.finish()? {
        counters.record_frame();
        if let Some(message) = decoder.decode(&frame)? {
            if tx.send(message).await.is_err() {
                debug!("Message queue closed, parser stopping");
                return Ok(());
            }
        }
    }
    Ok(())
}
