// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for replication recovery.
//!
//! Errors are categorized by the stage that produced them and by whether
//! permissive (skip-errors) mode may swallow them.
//!
//! # Error Categories
//!
//! | Error Type | Skippable | Description |
//! |------------|-----------|-------------|
//! | `Framing` | No | Dump is not a valid header+payload stream |
//! | `Decode` | Yes | Payload does not decode as the selected message kind |
//! | `Projection` | Yes | History event blobs could not be decoded for output |
//! | `Serialization` | Yes | JSON rendering of a message failed |
//! | `Io` | No | Reading input or writing output failed |
//! | `Resend` | No | Remote cluster rejected the resend or transport failed |
//! | `ResendTimeout` | No | Resend did not complete within the deadline |
//! | `Config` | No | Configuration invalid |
//! | `Internal` | No | Unexpected internal error (task panic, etc.) |
//!
//! # Skip Behavior
//!
//! Use [`RecoveryError::is_skippable()`] to decide whether a failure may be
//! counted and dropped in permissive mode. Structural framing errors are never
//! skippable: a lost boundary cannot be recovered by dropping one frame.

use crate::wire::WireError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for recovery operations.
pub type Result<T> = std::result::Result<T, RecoveryError>;

/// Structural problems with the dump itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    /// Not a single header was found in a non-empty input.
    #[error("header not found, was the dump generated with message headers enabled?")]
    HeaderNotFound,

    /// Data before the first header in a chunk handed to group parsing.
    #[error("data at offset {offset} does not start with a valid header ({len} leading bytes)")]
    LeadingGarbage { offset: u64, len: usize },

    /// Two headers with nothing between them.
    #[error("empty message between valid headers at offset {offset}")]
    EmptyGroup { offset: u64 },

    /// A group without the format marker byte.
    #[error("failed to find message preamble in group at offset {offset}")]
    MissingMarker { offset: u64 },
}

/// Errors that can occur while recovering replication data.
#[derive(Error, Debug)]
pub enum RecoveryError {
    /// The input is not a well-formed dump.
    ///
    /// Always fatal, also in permissive mode.
    #[error("Input was malformed: {0}")]
    Framing(#[from] FramingError),

    /// A frame's binary payload failed to decode.
    ///
    /// Fatal in strict mode, counted and skipped in permissive mode.
    #[error("Decode error (frame at offset {offset}): {source}")]
    Decode {
        offset: u64,
        #[source]
        source: WireError,
    },

    /// Event batch blobs of a history task could not be decoded.
    #[error("Projection error: {0}")]
    Projection(String),

    /// JSON rendering failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading the dump or writing the output failed.
    #[error("I/O error ({operation}): {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// The remote cluster failed the resend request.
    #[error("Resend error ({cluster}): {message}")]
    Resend { cluster: String, message: String },

    /// The resend call did not finish before the deadline.
    #[error("Resend to {cluster} timed out after {timeout:?}")]
    ResendTimeout { cluster: String, timeout: Duration },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecoveryError {
    /// Create an I/O error tagged with the operation that failed.
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a resend error for a cluster.
    pub fn resend(cluster: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resend {
            cluster: cluster.into(),
            message: message.into(),
        }
    }

    /// Check if permissive mode may count and drop this error.
    pub fn is_skippable(&self) -> bool {
        match self {
            Self::Decode { .. } => true,
            Self::Projection(_) => true,
            Self::Serialization(_) => true,
            Self::Framing(_) => false, // Boundary lost, nothing to skip
            Self::Io { .. } => false,
            Self::Resend { .. } => false,
            Self::ResendTimeout { .. } => false,
            Self::Config(_) => false,
            Self::Internal(_) => false,
        }
    }
}

/// A pipeline stage, used to report where a fatal error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Byte reader.
    Reader,
    /// Frame splitter and message decoder.
    Parser,
    /// Filter and sink writer.
    Writer,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Reader => write!(f, "reader"),
            Stage::Parser => write!(f, "parser"),
            Stage::Writer => write!(f, "writer"),
        }
    }
}

/// A fatal pipeline failure with the stage that produced it.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: RecoveryError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: RecoveryError) -> Self {
        Self { stage, source }
    }
}
