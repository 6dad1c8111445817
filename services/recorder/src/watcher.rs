//! Watcher: consumes notification-channel frames, maintains live/not-live
//! state, and returns once a broadcast start is observed.
//!
//! One watcher session cannot serve two consecutive broadcasts: the
//! platform does not re-emit `LIVE` on the same connection after
//! `PREPARING`, so the watcher always hands control back to the supervisor
//! after the first start.

use rec_protocol::{AppDataEnvelope, AuthPayload, ConnectReply, Frame, Operation, WatchCommand};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{TaskError, TaskErrorKind};
use crate::notify::NotifyClient;
use crate::platform::PlatformClient;
use crate::retry::{self, RetryConfig};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Outcome of a watch session. `Cancelled` is distinct from any `TaskError`
/// so cancellation always takes precedence over classification.
pub enum WatchOutcome {
    Start,
    Cancelled,
}

/// Run one watch session to completion: authenticate, establish initial
/// live state, then wait for a start transition.
pub async fn watch(
    platform: &PlatformClient,
    mut notify: NotifyClient,
    room_id: u64,
    auth: AuthPayload,
    probe_retry: RetryConfig,
    cancel: CancellationToken,
) -> Result<WatchOutcome, TaskError> {
    authenticate(&mut notify, auth).await?;

    // One heartbeat immediately after auth.
    notify
        .send(&Frame::heartbeat_ping())
        .await
        .map_err(|e| TaskError::with_cause(TaskErrorKind::Heartbeat, e.to_string()))?;

    let mut living = probe_initial_living(platform, room_id, &probe_retry, &cancel).await?;

    if living {
        info!(room_id, "watcher: already live, fast path start");
        return Ok(WatchOutcome::Start);
    }

    let mut heartbeat_timer = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat_timer.tick().await; // first tick fires immediately; consume it

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                return Ok(WatchOutcome::Cancelled);
            }

            _ = heartbeat_timer.tick() => {
                if let Err(e) = notify.send(&Frame::heartbeat_ping()).await {
                    warn!(room_id, error = %e, "watcher: heartbeat send failed, continuing");
                }
            }

            frame = notify.recv() => {
                let frame = frame.map_err(|e| {
                    TaskError::with_cause(TaskErrorKind::DanmakuExchangeRead, e.to_string())
                })?;

                if frame.operation != Operation::AppData {
                    debug!(room_id, ?frame.operation, "watcher: ignoring non-AppData frame");
                    continue;
                }

                let inflated = frame
                    .inflate()
                    .map_err(|e| TaskError::with_cause(TaskErrorKind::MessageDecompression, e.to_string()))?;

                for inner in inflated {
                    if let Some(outcome) = handle_app_data(room_id, &inner, &mut living)? {
                        return Ok(outcome);
                    }
                }
            }
        }
    }
}

async fn authenticate(notify: &mut NotifyClient, auth: AuthPayload) -> Result<(), TaskError> {
    let frame = Frame::plain_json(Operation::Connect, &auth)
        .map_err(|e| TaskError::with_cause(TaskErrorKind::InvalidAuthProtocol, e.to_string()))?;
    notify
        .send(&frame)
        .await
        .map_err(|e| TaskError::with_cause(TaskErrorKind::DanmakuServerConnection, e.to_string()))?;

    let reply = notify
        .recv()
        .await
        .map_err(|e| TaskError::with_cause(TaskErrorKind::DanmakuServerConnection, e.to_string()))?;

    if reply.operation != Operation::ConnectOk {
        return Err(TaskError::new(TaskErrorKind::InvalidAuthProtocol));
    }
    let body: ConnectReply = serde_json::from_slice(&reply.body)
        .map_err(|e| TaskError::with_cause(TaskErrorKind::JsonDecode, e.to_string()))?;
    if !body.is_ok() {
        return Err(TaskError::new(TaskErrorKind::InvalidAuthProtocol));
    }
    Ok(())
}

async fn probe_initial_living(
    platform: &PlatformClient,
    room_id: u64,
    retry_cfg: &RetryConfig,
    cancel: &CancellationToken,
) -> Result<bool, TaskError> {
    let outcome = retry::retry(retry_cfg, cancel, || async {
        platform.get_room_profile(room_id).await
    })
    .await;

    match outcome {
        retry::RetryOutcome::Ok(profile) => Ok(profile.live_status.is_streaming()),
        retry::RetryOutcome::Cancelled => Err(TaskError::new(TaskErrorKind::InitialLiveStatus)),
        retry::RetryOutcome::ExhaustedWith(e) => {
            Err(TaskError::with_cause(TaskErrorKind::InitialLiveStatus, e.to_string()))
        }
    }
}

/// Dispatch one inflated AppData frame. Returns `Some(outcome)` when the
/// watch session should end (a `LIVE` transition was observed).
fn handle_app_data(
    room_id: u64,
    frame: &Frame,
    living: &mut bool,
) -> Result<Option<WatchOutcome>, TaskError> {
    let envelope: AppDataEnvelope = serde_json::from_slice(&frame.body)
        .map_err(|e| TaskError::with_cause(TaskErrorKind::JsonDecode, e.to_string()))?;

    match WatchCommand::parse(&envelope.cmd) {
        Some(WatchCommand::Live) => {
            *living = true;
            info!(room_id, "watcher: LIVE observed, broadcast starting");
            Ok(Some(WatchOutcome::Start))
        }
        Some(WatchCommand::Preparing) => {
            *living = false;
            debug!(room_id, "watcher: PREPARING, broadcaster between segments");
            Ok(None)
        }
        Some(_informational) => {
            debug!(room_id, cmd = %envelope.cmd, "watcher: informational command");
            Ok(None)
        }
        None => {
            debug!(room_id, cmd = %envelope.cmd, "watcher: unknown command, ignoring");
            Ok(None)
        }
    }
}
