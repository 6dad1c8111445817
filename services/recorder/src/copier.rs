//! Stream copier: opens the media GET, gates file creation on a successful
//! initial read, then copies in cancellable fixed-size segments.
//!
//! Grounded on the reference client's `CopyLiveStream`: the file is never
//! created unless the initial prefix read succeeds, and the byte counter
//! is shared with a 30s progress activity via a plain atomic, no lock.

use futures_util::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::{TaskError, TaskErrorKind};
use crate::platform::{PlatformClient, PlatformError};

/// Initial prefix size read before the output file is created.
pub const INIT_READ_BYTES: usize = 4096;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(30);

pub enum CopyOutcome {
    /// The broadcast ended normally (EOF on the response body).
    Eof,
    Cancelled,
}

/// A thunk invoked exactly once, after the initial-prefix read succeeds,
/// to create the output file. Never invoked on any other path.
pub type FileCreator = Box<dyn FnOnce() -> std::io::Result<std::fs::File> + Send>;

pub async fn copy_stream(
    platform: &PlatformClient,
    room_id: u64,
    media_url: &str,
    file_creator: FileCreator,
    buf_size: usize,
    cancel: CancellationToken,
) -> Result<CopyOutcome, TaskError> {
    let response = match platform.open_media_stream(room_id, media_url).await {
        Ok(r) => r,
        Err(PlatformError::RoomNotOpen) => return Err(TaskError::new(TaskErrorKind::LiveEnded)),
        Err(e) => return Err(TaskError::with_cause(TaskErrorKind::StreamCopy, e.to_string())),
    };

    let mut stream = response.bytes_stream();
    let mut prefix = Vec::with_capacity(INIT_READ_BYTES);
    while prefix.len() < INIT_READ_BYTES {
        match stream.next().await {
            Some(Ok(chunk)) => prefix.extend_from_slice(&chunk),
            Some(Err(e)) => {
                return Err(TaskError::with_cause(TaskErrorKind::StreamCopy, e.to_string()))
            }
            None => {
                return Err(TaskError::with_cause(
                    TaskErrorKind::StreamCopy,
                    "stream ended before initial prefix was read",
                ))
            }
        }
    }

    let file = file_creator()
        .map_err(|e| TaskError::with_cause(TaskErrorKind::FileCreation, e.to_string()))?;
    let mut file = tokio::fs::File::from_std(file);

    file.write_all(&prefix[..INIT_READ_BYTES])
        .await
        .map_err(|e| TaskError::with_cause(TaskErrorKind::FileCreation, e.to_string()))?;
    // Any bytes read past the exact prefix size belong to the body proper.
    let overrun = &prefix[INIT_READ_BYTES..];
    if !overrun.is_empty() {
        file.write_all(overrun)
            .await
            .map_err(|e| TaskError::with_cause(TaskErrorKind::StreamCopy, e.to_string()))?;
    }

    let counter = Arc::new(AtomicU64::new(prefix.len() as u64));
    let progress_cancel = CancellationToken::new();
    let progress_handle = spawn_progress_reporter(room_id, counter.clone(), progress_cancel.clone());

    let outcome = copy_loop(&mut file, &mut stream, buf_size, &counter, &cancel).await;

    progress_cancel.cancel();
    let _ = progress_handle.await;

    outcome
}

async fn copy_loop(
    file: &mut tokio::fs::File,
    stream: &mut (impl futures_util::Stream<Item = reqwest::Result<bytes::Bytes>> + Unpin),
    buf_size: usize,
    counter: &Arc<AtomicU64>,
    cancel: &CancellationToken,
) -> Result<CopyOutcome, TaskError> {
    let mut pending = Vec::with_capacity(buf_size);

    loop {
        if cancel.is_cancelled() {
            return Ok(CopyOutcome::Cancelled);
        }

        tokio::select! {
            biased;

            () = cancel.cancelled() => return Ok(CopyOutcome::Cancelled),

            chunk = stream.next() => {
                match chunk {
                    None => {
                        if !pending.is_empty() {
                            flush_segment(file, &mut pending, counter).await?;
                        }
                        return Ok(CopyOutcome::Eof);
                    }
                    Some(Err(e)) => {
                        return Err(TaskError::with_cause(TaskErrorKind::StreamCopy, e.to_string()))
                    }
                    Some(Ok(chunk)) => {
                        pending.extend_from_slice(&chunk);
                        if pending.len() >= buf_size {
                            flush_segment(file, &mut pending, counter).await?;
                        }
                    }
                }
            }
        }
    }
}

async fn flush_segment(
    file: &mut tokio::fs::File,
    pending: &mut Vec<u8>,
    counter: &Arc<AtomicU64>,
) -> Result<(), TaskError> {
    file.write_all(pending)
        .await
        .map_err(|e| TaskError::with_cause(TaskErrorKind::StreamCopy, e.to_string()))?;
    counter.fetch_add(pending.len() as u64, Ordering::Relaxed);
    pending.clear();
    Ok(())
}

fn spawn_progress_reporter(
    room_id: u64,
    counter: Arc<AtomicU64>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
        ticker.tick().await; // consume the immediate first tick
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let bytes = counter.load(Ordering::Acquire);
                    info!(room_id, bytes, "copier: progress");
                }
            }
        }
    })
}
