// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Shared pipeline counters.
//!
//! The skip counter is the only state shared across pipeline stages. All
//! counters are monotonic atomics; the final values are read once, after the
//! writer stage has finished, via [`PipelineCounters::report()`].

use crate::metrics;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated concurrently by the parser and writer stages.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    frames: AtomicU64,
    skipped: AtomicU64,
    emitted: AtomicU64,
    filtered_out: AtomicU64,
}

impl PipelineCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// A frame was cut from the dump.
    pub fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        metrics::record_frame();
    }

    /// A frame or message was dropped in permissive mode.
    pub fn record_skip(&self, stage: &str) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
        metrics::record_frame_skipped(stage);
    }

    /// A message was written to the sink.
    pub fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        metrics::record_message_emitted();
    }

    /// A message was rejected by the filter.
    pub fn record_filtered(&self) {
        self.filtered_out.fetch_add(1, Ordering::Relaxed);
        metrics::record_message_filtered();
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Snapshot of all counters.
    pub fn report(&self) -> ParseReport {
        ParseReport {
            frames: self.frames.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            filtered_out: self.filtered_out.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Outcome of a completed parse run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ParseReport {
    /// Frames cut from the dump.
    pub frames: u64,
    /// Messages written to the sink.
    pub emitted: u64,
    /// Messages rejected by the filter.
    pub filtered_out: u64,
    /// Frames or messages dropped due to errors (permissive mode only).
    pub skipped: u64,
}
