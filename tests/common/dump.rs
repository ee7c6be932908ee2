//! Dump builders and in-memory I/O for pipeline tests.

use replication_recovery::message::{
    DataBlob, EncodingType, HistoryTaskV2Attributes, ReplicationMessage, ReplicationTask,
    VisibilityMessage, VisibilityMessageType, FORMAT_MARKER,
};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// A payload that carries the marker but never decodes (invalid type id).
pub const CORRUPT_PAYLOAD: &[u8] = &[FORMAT_MARKER, 0xFF, 0xFF, 0xFF];

/// History-v2 task with one JSON-encoded event.
pub fn history_message(workflow_id: &str, run_id: &str, event_id: i64) -> ReplicationMessage {
    let mut attrs = HistoryTaskV2Attributes::new("domain-1", workflow_id, run_id);
    attrs.task_id = Some(event_id);
    attrs.events = Some(DataBlob::new(
        EncodingType::Json,
        format!(r#"[{{"eventId":{event_id},"eventType":"WorkflowExecutionStarted"}}]"#)
            .into_bytes(),
    ));
    ReplicationMessage::History(ReplicationTask::history_v2(attrs))
}

pub fn visibility_message(workflow_id: &str, run_id: &str, version: i64) -> ReplicationMessage {
    let mut msg =
        VisibilityMessage::new(VisibilityMessageType::Index, "domain-1", workflow_id, run_id);
    msg.version = Some(version);
    ReplicationMessage::Visibility(msg)
}

/// Builds a dump in the `Partition: .., Offset: .., Key: ..` format.
#[derive(Debug, Default, Clone)]
pub struct DumpBuilder {
    bytes: Vec<u8>,
    groups: u64,
}

impl DumpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn header(&mut self, key: &str) {
        let header = format!("Partition: 3, Offset: {}, Key: {}\n", 1000 + self.groups, key);
        self.bytes.extend(header.into_bytes());
        self.groups += 1;
    }

    /// Append a well-formed group.
    pub fn message(mut self, message: &ReplicationMessage) -> Self {
        self.header(message.workflow_id().unwrap_or("key"));
        self.bytes.extend(message.to_frame());
        self.bytes.push(b'\n');
        self
    }

    /// Append a group whose payload fails to decode.
    pub fn corrupt(self) -> Self {
        self.raw(CORRUPT_PAYLOAD)
    }

    /// Append a group with an arbitrary body after the header line.
    pub fn raw(mut self, body: &[u8]) -> Self {
        self.header("raw");
        self.bytes.extend_from_slice(body);
        self.bytes.push(b'\n');
        self
    }

    pub fn groups(&self) -> u64 {
        self.groups
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

/// In-memory sink that stays readable after the pipeline consumed it.
#[derive(Debug, Clone, Default)]
pub struct SharedSink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl SharedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8(self.buffer.lock().unwrap().clone()).unwrap()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn json_lines(&self) -> Vec<serde_json::Value> {
        self.lines()
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

impl AsyncWrite for SharedSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Sink that rejects every write.
#[derive(Debug, Default)]
pub struct BrokenSink;

impl AsyncWrite for BrokenSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed")))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Reader that hands out its data in a fixed sequence of read sizes,
/// cycling through `sizes`.
#[derive(Debug)]
pub struct ChunkedReader {
    data: Vec<u8>,
    sizes: Vec<usize>,
    pos: usize,
    reads: usize,
}

impl ChunkedReader {
    pub fn new(data: Vec<u8>, sizes: Vec<usize>) -> Self {
        assert!(!sizes.is_empty() && sizes.iter().all(|&s| s > 0));
        Self {
            data,
            sizes,
            pos: 0,
            reads: 0,
        }
    }
}

impl AsyncRead for ChunkedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let want = self.sizes[self.reads % self.sizes.len()];
        let n = want
            .min(buf.remaining())
            .min(self.data.len() - self.pos);
        let start = self.pos;
        buf.put_slice(&self.data[start..start + n]);
        self.pos += n;
        self.reads += 1;
        Poll::Ready(Ok(()))
    }
}

/// Reader that yields `data` and then fails.
#[derive(Debug)]
pub struct FailingReader {
    data: Vec<u8>,
    done: bool,
}

impl FailingReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, done: false }
    }
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.done {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "input went away",
            )));
        }
        let n = self.data.len().min(buf.remaining());
        buf.put_slice(&self.data[..n]);
        self.data.drain(..n);
        if self.data.is_empty() {
            self.done = true;
        }
        Poll::Ready(Ok(()))
    }
}
