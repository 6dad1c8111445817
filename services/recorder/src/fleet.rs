//! Fleet: owns the set of running tasks and the root cancellation scope.
//!
//! Each task is spawned independently; a crash or unrecoverable stop in one
//! never affects the others. The fleet's only shared state is the
//! introspection snapshot, read without blocking the tasks themselves.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::TaskConfig;
use crate::task::RunningTask;

pub struct Fleet {
    tasks: Arc<Vec<Arc<RunningTask>>>,
    handles: Vec<tokio::task::JoinHandle<()>>,
    root_cancel: CancellationToken,
}

/// A cheap, cloneable read handle onto a fleet's tasks. Shared with the
/// introspection HTTP server as `axum` state; holds no join handles, so
/// cloning it never affects shutdown.
#[derive(Clone)]
pub struct FleetHandle {
    tasks: Arc<Vec<Arc<RunningTask>>>,
}

impl FleetHandle {
    pub fn snapshot(&self) -> Vec<rec_protocol::TaskInfoDto> {
        self.tasks.iter().map(|t| t.snapshot()).collect()
    }
}

impl Fleet {
    /// Build a fleet from validated task configs. Tasks are not started
    /// until [`Fleet::spawn_all`] is called.
    pub fn new(configs: Vec<TaskConfig>) -> Self {
        let root_cancel = CancellationToken::new();
        let tasks = configs
            .into_iter()
            .map(|cfg| Arc::new(RunningTask::new(cfg, &root_cancel)))
            .collect();
        Fleet {
            tasks: Arc::new(tasks),
            handles: Vec::new(),
            root_cancel,
        }
    }

    /// Start every task's supervisor loop as an independent `tokio` task.
    pub fn spawn_all(&mut self) {
        for task in self.tasks.iter() {
            let task = task.clone();
            self.handles.push(tokio::spawn(async move {
                task.run().await;
            }));
        }
    }

    pub fn snapshot(&self) -> Vec<rec_protocol::TaskInfoDto> {
        self.tasks.iter().map(|t| t.snapshot()).collect()
    }

    pub fn handle(&self) -> FleetHandle {
        FleetHandle {
            tasks: self.tasks.clone(),
        }
    }

    pub fn root_cancel(&self) -> CancellationToken {
        self.root_cancel.clone()
    }

    /// Cancel every task and wait for all supervisor loops to return.
    pub async fn shutdown_and_wait(mut self) {
        self.root_cancel.cancel();
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
    }
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
    fn new_fleet_snapshot_has_one_entry_per_task() {
        let fleet = Fleet::new(vec![test_config(1), test_config(2)]);
        let snap = fleet.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].live_room.id, 1);
        assert_eq!(snap[1].live_room.id, 2);
    }

    #[tokio::test]
    async fn shutdown_cancels_root_token() {
        let fleet = Fleet::new(vec![test_config(1)]);
        let root = fleet.root_cancel();
        assert!(!root.is_cancelled());
        fleet.shutdown_and_wait().await;
        assert!(root.is_cancelled());
    }
}
