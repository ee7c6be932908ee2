// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Header-marker framing of a raw log dump.
//!
//! A dump is a sequence of groups, each a human-readable header line
//! (`Partition: <p>, Offset: <o>, Key: <k>`) followed by a binary payload
//! that starts with the format marker byte ([`FORMAT_MARKER`]).
//!
//! # Chunk Handling
//!
//! Bytes arrive in arbitrary chunks. After each chunk the splitter looks for
//! header matches in its accumulated buffer and cuts at the *last* real
//! header: everything before it is a run of complete groups, everything from
//! it onwards is carried into the next round. At end of stream the carried
//! tail is parsed as the final group.
//!
//! # Look-alike Headers
//!
//! Binary payloads can contain bytes that happen to match the header
//! pattern. When the payload after a group's marker measures as one complete
//! struct, matches inside that extent are ignored. When it does not measure
//! (corrupt, or cut off by a chunk boundary) the next match is taken as the
//! boundary. A look-alike that ends up as the last match while its payload is
//! still incomplete will therefore split a frame; the damaged frame then
//! fails to decode.

use crate::error::{FramingError, RecoveryError, Result};
use crate::message::FORMAT_MARKER;
use crate::wire;
use regex::bytes::Regex;
use std::ops::Range;
use tracing::trace;

/// Header pattern. `.` does not cross newlines.
const HEADER_PATTERN: &str = r"(?-u)Partition: .*?, Offset: .*?, Key: ";

/// One group's bytes, starting at the format marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Absolute offset of the group's header in the dump.
    pub offset: u64,
    /// Marker byte followed by the payload (and any trailing bytes up to the
    /// next header).
    pub bytes: Vec<u8>,
}

impl RawFrame {
    /// Payload without the marker byte.
    pub fn payload(&self) -> &[u8] {
        self.bytes.get(1..).unwrap_or_default()
    }

    /// Whether the frame starts with the format marker.
    pub fn has_marker(&self) -> bool {
        self.bytes.first() == Some(&FORMAT_MARKER)
    }
}

/// Incremental frame splitter.
pub struct FrameSplitter {
    header: Regex,
    buffer: Vec<u8>,
    /// Absolute offset of `buffer[0]`.
    consumed: u64,
}

impl FrameSplitter {
    pub fn new() -> Result<Self> {
        let header = Regex::new(HEADER_PATTERN)
            .map_err(|e| RecoveryError::Internal(format!("header pattern: {e}")))?;
        Ok(Self {
            header,
            buffer: Vec::new(),
            consumed: 0,
        })
    }

    /// Split a complete in-memory dump.
    pub fn split_all(data: &[u8]) -> Result<Vec<RawFrame>> {
        let mut splitter = Self::new()?;
        let mut frames = splitter.push(data)?;
        frames.extend(splitter.finish()?);
        Ok(frames)
    }

    /// Bytes carried forward, waiting for the next header.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Append a chunk and return every frame that is now known complete.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<RawFrame>> {
        self.buffer.extend_from_slice(chunk);

        let headers = self.boundaries();
        let Some(last) = headers.last() else {
            return Ok(Vec::new());
        };
        let split = last.start;
        if split == 0 {
            return Ok(Vec::new());
        }

        let complete = &headers[..headers.len() - 1];
        let frames = parse_groups(&self.buffer[..split], complete, self.consumed)?;
        self.buffer.drain(..split);
        self.consumed += split as u64;
        trace!(frames = frames.len(), carried = self.buffer.len(), "Split chunk");
        Ok(frames)
    }

    /// Parse the carried tail as the final group.
    ///
    /// Empty input yields no frames. Non-empty input that never contained a
    /// header is a framing error.
    pub fn finish(mut self) -> Result<Vec<RawFrame>> {
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }
        let headers = self.boundaries();
        if headers.is_empty() {
            return Err(FramingError::HeaderNotFound.into());
        }
        let buffer = std::mem::take(&mut self.buffer);
        Ok(parse_groups(&buffer, &headers, self.consumed)?)
    }

    /// Real header positions in the buffer, skipping matches that fall
    /// inside a measured payload.
    fn boundaries(&self) -> Vec<Range<usize>> {
        let matches: Vec<Range<usize>> = self
            .header
            .find_iter(&self.buffer)
            .map(|m| m.range())
            .collect();
        real_headers(&self.buffer, &matches)
    }
}

fn real_headers(buf: &[u8], matches: &[Range<usize>]) -> Vec<Range<usize>> {
    let mut headers = Vec::with_capacity(matches.len());
    let mut i = 0;
    while i < matches.len() {
        let header = matches[i].clone();
        let naive_end = matches.get(i + 1).map_or(buf.len(), |m| m.start);
        let mut next = i + 1;

        if let Some(rel) = find_marker(&buf[header.end..naive_end]) {
            let payload_start = header.end + rel + 1;
            if let Ok(len) = wire::struct_len(&buf[payload_start..]) {
                let extent = payload_start + len;
                while next < matches.len() && matches[next].start < extent {
                    next += 1;
                }
            }
        }

        headers.push(header);
        i = next;
    }
    headers
}

/// Cut `slice` into frames. `headers` are the real header ranges within it,
/// in order; `base` is the absolute offset of `slice[0]`.
fn parse_groups(
    slice: &[u8],
    headers: &[Range<usize>],
    base: u64,
) -> std::result::Result<Vec<RawFrame>, FramingError> {
    let Some(first) = headers.first() else {
        return Err(FramingError::HeaderNotFound);
    };
    if first.start != 0 {
        return Err(FramingError::LeadingGarbage {
            offset: base,
            len: first.start,
        });
    }

    let mut frames = Vec::with_capacity(headers.len());
    for (i, header) in headers.iter().enumerate() {
        let end = headers.get(i + 1).map_or(slice.len(), |h| h.start);
        let offset = base + header.start as u64;
        let body = &slice[header.end..end];
        if body.is_empty() {
            return Err(FramingError::EmptyGroup { offset });
        }
        let Some(marker) = find_marker(body) else {
            return Err(FramingError::MissingMarker { offset });
        };
        frames.push(RawFrame {
            offset,
            bytes: body[marker..].to_vec(),
        });
    }
    Ok(frames)
}

fn find_marker(bytes: &[u8]) -> Option<usize> {
    bytes.iter().position(|&b| b == FORMAT_MARKER)
}
