// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Input stage: fixed-size chunks from any async byte source.

use crate::error::{RecoveryError, Result};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

/// Default read size.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Read `input` in chunks of at most `chunk_size` bytes and forward each
/// non-empty chunk. Returns when the input is exhausted or the receiver is
/// gone; dropping `tx` closes the queue.
///
/// On a read error `aborted` is raised before `tx` is dropped, so the
/// consumer can tell a failed input from a finished one.
pub async fn run_reader<R>(
    mut input: R,
    chunk_size: usize,
    tx: mpsc::Sender<Vec<u8>>,
    aborted: watch::Sender<bool>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let chunk_size = chunk_size.max(1);
    let mut total: u64 = 0;
    loop {
        let mut chunk = vec![0u8; chunk_size];
        let n = match input.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                aborted.send_replace(true);
                return Err(RecoveryError::io("read input", e));
            }
        };
        chunk.truncate(n);
        total += n as u64;
        trace!(bytes = n, "Read chunk");

        if tx.send(chunk).await.is_err() {
            debug!(total, "Chunk queue closed, reader stopping");
            return Ok(());
        }
    }
    debug!(total, "Input exhausted");
    Ok(())
}
