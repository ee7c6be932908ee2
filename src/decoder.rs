// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Frame decoding under a strict or permissive error policy.

use crate::counters::PipelineCounters;
use crate::error::{RecoveryError, Result};
use crate::message::{MessageKind, ReplicationMessage};
use crate::splitter::RawFrame;
use crate::wire::WireError;
use std::sync::Arc;
use tracing::debug;

/// What to do with a frame or message that fails to decode or render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Abort the run on the first failure.
    #[default]
    Strict,
    /// Count the failure, drop the item and continue.
    Permissive,
}

impl ErrorPolicy {
    pub fn from_skip_errors(skip_errors: bool) -> Self {
        if skip_errors {
            ErrorPolicy::Permissive
        } else {
            ErrorPolicy::Strict
        }
    }

    /// Apply the policy to a failed step. Returns `Ok(None)` when the
    /// failure was swallowed.
    pub(crate) fn handle<T>(
        self,
        result: Result<T>,
        counters: &PipelineCounters,
        stage: &str,
    ) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if self == ErrorPolicy::Permissive && e.is_skippable() => {
                debug!(stage, error = %e, "Skipping message");
                counters.record_skip(stage);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Decodes raw frames into typed messages of one kind.
pub struct MessageDecoder {
    kind: MessageKind,
    policy: ErrorPolicy,
    counters: Arc<PipelineCounters>,
}

impl MessageDecoder {
    pub fn new(kind: MessageKind, policy: ErrorPolicy, counters: Arc<PipelineCounters>) -> Self {
        Self {
            kind,
            policy,
            counters,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Decode one frame. `Ok(None)` means the frame was skipped.
    pub fn decode(&self, frame: &RawFrame) -> Result<Option<ReplicationMessage>> {
        let result = decode_frame(self.kind, frame);
        self.policy.handle(result, &self.counters, "decode")
    }
}

fn decode_frame(kind: MessageKind, frame: &RawFrame) -> Result<ReplicationMessage> {
    let to_error = |source| RecoveryError::Decode {
        offset: frame.offset,
        source,
    };
    if !frame.has_marker() {
        let found = frame.bytes.first().copied().unwrap_or_default();
        return Err(to_error(WireError::InvalidPreamble { found }));
    }
    ReplicationMessage::decode(kind, frame.payload()).map_err(to_error)
}
