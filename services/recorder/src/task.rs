//! Task supervisor: per-room state machine sequencing watcher -> copier
//! and classifying failures into recoverable/unrecoverable.
//!
//! States: `NotStarted -> Running -> {Restarting -> Running}* -> Stopped`.
//! `Stopped` is terminal. Hooks fire exactly once per task lifetime, not on
//! restart transitions.

use rec_protocol::{AuthPayload, LiveRoomDto, TaskInfoDto};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::TaskConfig;
use crate::copier::{self, CopyOutcome, FileCreator};
use crate::errors::{TaskError, TaskErrorKind};
use crate::filename;
use crate::platform::PlatformClient;
use crate::retry::{self, RetryConfig, RetryOutcome};
use crate::watcher::{self, WatchOutcome};

const WATCHER_RESTART_COOLDOWN: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    NotStarted,
    Running,
    Restarting,
    Stopped,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::NotStarted => "NotStarted",
            TaskStatus::Running => "Running",
            TaskStatus::Restarting => "Restarting",
            TaskStatus::Stopped => "Stopped",
        };
        write!(f, "{s}")
    }
}

pub struct RunningTask {
    config: TaskConfig,
    cancel: CancellationToken,
    status: Mutex<TaskStatus>,
    title: Mutex<Option<String>>,
}

impl RunningTask {
    pub fn new(config: TaskConfig, parent_cancel: &CancellationToken) -> Self {
        RunningTask {
            config,
            cancel: parent_cancel.child_token(),
            status: Mutex::new(TaskStatus::NotStarted),
            title: Mutex::new(None),
        }
    }

    pub fn room_id(&self) -> u64 {
        self.config.room_id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn snapshot(&self) -> TaskInfoDto {
        TaskInfoDto {
            live_room: LiveRoomDto {
                id: self.config.room_id,
                title: self.title.lock().expect("title mutex poisoned").clone(),
            },
            status: self.status().to_string(),
        }
    }

    pub fn status(&self) -> TaskStatus {
        *self.status.lock().expect("status mutex poisoned")
    }

    fn set_status(&self, status: TaskStatus) {
        *self.status.lock().expect("status mutex poisoned") = status;
    }

    fn set_title(&self, title: String) {
        *self.title.lock().expect("title mutex poisoned") = Some(title);
    }

    /// Drive the task to completion: `runTaskWithAutoRestart`.
    pub async fn run(&self) {
        self.set_status(TaskStatus::Running);
        info!(room_id = self.room_id(), "task: started");

        let platform = PlatformClient::new(self.config.transport.allowed_network_types.clone());
        if let Err(e) = platform.obtain_device_cookie().await {
            error!(room_id = self.room_id(), error = %e, "task: failed to obtain device cookie");
            self.set_status(TaskStatus::Stopped);
            return;
        }

        loop {
            match self.try_run_once(&platform).await {
                Outcome::Cancelled | Outcome::StoppedCleanly => break,
                Outcome::Recoverable(err) => {
                    warn!(room_id = self.room_id(), kind = %err.kind, error = %err, "task: recoverable failure, restarting");
                    self.set_status(TaskStatus::Restarting);
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => break,
                        () = tokio::time::sleep(Duration::from_secs(
                            self.config.watch.live_interrupted_restart_sleep_seconds,
                        )) => {}
                    }
                    self.set_status(TaskStatus::Running);
                }
                Outcome::Unrecoverable(err) => {
                    error!(room_id = self.room_id(), kind = %err.kind, error = %err, "task: unrecoverable failure, stopping");
                    break;
                }
            }
        }

        self.set_status(TaskStatus::Stopped);
        info!(room_id = self.room_id(), "task: stopped");
    }

    fn probe_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max: self.config.transport.max_retry_times,
            interval: Duration::from_secs(self.config.transport.retry_interval_seconds),
        }
    }

    /// `tryRunTask`: acquire a notification session, run the watcher to a
    /// start transition (restarting the watcher alone on recoverable
    /// failures), then the recording subloop.
    async fn try_run_once(&self, platform: &PlatformClient) -> Outcome {
        let probe_retry = self.probe_retry_config();

        loop {
            let danmaku_info = match retry::retry(&probe_retry, &self.cancel, || {
                platform.get_danmaku_server_info(self.room_id())
            })
            .await
            {
                RetryOutcome::Ok(info) => info,
                RetryOutcome::Cancelled => return Outcome::Cancelled,
                RetryOutcome::ExhaustedWith(e) => {
                    return Outcome::Recoverable(TaskError::with_cause(
                        TaskErrorKind::GetDanmakuServerInfo,
                        e.to_string(),
                    ))
                }
            };

            let host = match danmaku_info.host_list.first() {
                Some(h) => h,
                None => {
                    return Outcome::Recoverable(TaskError::new(TaskErrorKind::GetDanmakuServerInfo))
                }
            };
            let ws_url = format!("wss://{}:{}/sub", host.host, host.wss_port);

            let buvid3 = platform.buvid3().unwrap_or_default();
            let auth = AuthPayload::anonymous(self.room_id(), buvid3, danmaku_info.token.clone());

            let ws = match platform.open_notify_channel(&ws_url).await {
                Ok(ws) => ws,
                Err(e) => {
                    return Outcome::Recoverable(TaskError::with_cause(
                        TaskErrorKind::DanmakuServerConnection,
                        e.to_string(),
                    ))
                }
            };
            let notify = crate::notify::NotifyClient::new(ws);

            match watcher::watch(
                platform,
                notify,
                self.room_id(),
                auth,
                probe_retry,
                self.cancel.clone(),
            )
            .await
            {
                Ok(WatchOutcome::Start) => return self.record_until_stopped(platform).await,
                Ok(WatchOutcome::Cancelled) => return Outcome::Cancelled,
                Err(e) if e.is_recoverable() => {
                    warn!(room_id = self.room_id(), error = %e, "watcher: recoverable failure, restarting watcher");
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return Outcome::Cancelled,
                        () = tokio::time::sleep(WATCHER_RESTART_COOLDOWN) => {}
                    }
                    continue;
                }
                Err(e) => {
                    return Outcome::Unrecoverable(TaskError::with_cause(
                        TaskErrorKind::LiveStatusWatch,
                        e.to_string(),
                    ))
                }
            }
        }
    }

    /// The recording subloop entered once the watcher observes a start.
    async fn record_until_stopped(&self, platform: &PlatformClient) -> Outcome {
        let probe_retry = self.probe_retry_config();

        loop {
            let profile = match retry::retry(&probe_retry, &self.cancel, || {
                platform.get_room_profile(self.room_id())
            })
            .await
            {
                RetryOutcome::Ok(p) => p,
                RetryOutcome::Cancelled => return Outcome::Cancelled,
                RetryOutcome::ExhaustedWith(e) => {
                    return Outcome::Recoverable(TaskError::with_cause(
                        TaskErrorKind::GetRoomInfo,
                        e.to_string(),
                    ))
                }
            };
            self.set_title(profile.title.clone());

            let streaming_info = match retry::retry(&probe_retry, &self.cancel, || {
                platform.get_streaming_info(self.room_id())
            })
            .await
            {
                RetryOutcome::Ok(s) => s,
                RetryOutcome::Cancelled => return Outcome::Cancelled,
                RetryOutcome::ExhaustedWith(e) => {
                    return Outcome::Recoverable(TaskError::with_cause(
                        TaskErrorKind::GetLiveInfo,
                        e.to_string(),
                    ))
                }
            };
            let media_url = match streaming_info.url_info.first() {
                Some(entry) => entry.url.clone(),
                None => return Outcome::Unrecoverable(TaskError::new(TaskErrorKind::InvalidLiveInfo)),
            };

            let base = filename::base_name(&profile.title);
            let ext = filename::extension_from_url(&media_url);
            let resolved = filename::resolve_paths(
                Path::new(&self.config.download.save_directory),
                &base,
                &ext,
                self.config.download.use_special_ext_name_when_downloading,
            );

            let write_path = resolved.write_path.clone();
            let creator: FileCreator = Box::new(move || std::fs::File::create(&write_path));

            let copy_result = copier::copy_stream(
                platform,
                self.room_id(),
                &media_url,
                creator,
                self.config.download.disk_write_buffer_bytes as usize,
                self.cancel.clone(),
            )
            .await;

            match copy_result {
                Ok(CopyOutcome::Eof) => {
                    if resolved.needs_rename {
                        if let Err(e) = filename::rename_to_final(&resolved.write_path, &resolved.final_path) {
                            warn!(room_id = self.room_id(), error = %e, "task: rename to final extension failed");
                        }
                    }
                    return Outcome::Recoverable(TaskError::new(TaskErrorKind::LiveEnded));
                }
                Ok(CopyOutcome::Cancelled) => return Outcome::Cancelled,
                Err(e) if e.kind == TaskErrorKind::LiveEnded => {
                    return Outcome::Recoverable(TaskError::new(TaskErrorKind::LiveEnded))
                }
                Err(e) if e.is_recoverable() => {
                    match retry::retry(&probe_retry, &self.cancel, || {
                        platform.get_room_profile(self.room_id())
                    })
                    .await
                    {
                        RetryOutcome::Ok(p) if p.live_status.is_streaming() => continue,
                        RetryOutcome::Ok(_) => {
                            return Outcome::Recoverable(TaskError::new(TaskErrorKind::LiveEnded))
                        }
                        RetryOutcome::Cancelled => return Outcome::Cancelled,
                        RetryOutcome::ExhaustedWith(probe_err) => {
                            return Outcome::Recoverable(TaskError::with_cause(
                                TaskErrorKind::RecoverLiveStatusChecker,
                                format!("copier error: {e}; probe error: {probe_err}"),
                            ))
                        }
                    }
                }
                Err(e) => return Outcome::Unrecoverable(e),
            }
        }
    }
}

enum Outcome {
    Cancelled,
    StoppedCleanly,
    Recoverable(TaskError),
    Unrecoverable(TaskError),
}

// `StoppedCleanly` has no producer yet: the reference loop only ever exits
// via cancellation or an unrecoverable error; kept distinct from
// `Cancelled` for callers that want to tell the two apart in logs.
#[allow(dead_code)]
fn _unused_variant_marker() -> Outcome {
    Outcome::StoppedCleanly
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DownloadConfig, TransportConfig, WatchConfig};

    fn test_config(room_id: u64) -> TaskConfig {
        TaskConfig {
            room_id,
            transport: TransportConfig::default_transport(),
            download: DownloadConfig {
                save_directory: ".".to_owned(),
                disk_write_buffer_bytes: 4096,
                use_special_ext_name_when_downloading: false,
            },
            watch: WatchConfig::default(),
        }
    }

    #[test]
    fn new_task_starts_not_started() {
        let task = RunningTask::new(test_config(1), &CancellationToken::new());
        assert_eq!(task.status(), TaskStatus::NotStarted);
    }

    #[test]
    fn snapshot_reflects_room_id_and_status() {
        let task = RunningTask::new(test_config(42), &CancellationToken::new());
        let snap = task.snapshot();
        assert_eq!(snap.live_room.id, 42);
        assert_eq!(snap.status, "NotStarted");
        assert!(snap.live_room.title.is_none());
    }

    #[test]
    fn child_token_cancels_when_parent_does() {
        let parent = CancellationToken::new();
        let task = RunningTask::new(test_config(1), &parent);
        assert!(!task.cancel_token().is_cancelled());
        parent.cancel();
        assert!(task.cancel_token().is_cancelled());
    }
}
