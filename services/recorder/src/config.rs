//! Recorder configuration loading.
//!
//! TOML is the sole config-file source. A config can also be synthesized
//! directly from CLI flags (`-s/-o/-b`) without ever touching a file; see
//! [`GlobalConfig::from_cli`].
//!
//! # Config schema
//! ```toml
//! api_server = "0.0.0.0:8080"
//!
//! [[tasks]]
//! room_id = 12345
//!
//! [tasks.transport]
//! socket_timeout_seconds = 10
//! retry_interval_seconds = 2
//! max_retry_times = 5
//! allowed_network_types = ["ipv4", "ipv6"]
//!
//! [tasks.download]
//! save_directory = "/var/recordings"
//! disk_write_buffer_bytes = 4194304
//! use_special_ext_name_when_downloading = true
//!
//! [tasks.watch]
//! live_interrupted_restart_sleep_seconds = 10
//! ```

use serde::Deserialize;
use std::path::Path;

use crate::net_probe::NetworkType;

// ---------------------------------------------------------------------------
// Validated config types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GlobalConfig {
    pub tasks: Vec<TaskConfig>,
    /// Listen address for the introspection endpoint; empty means disabled.
    pub api_server: String,
}

#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub room_id: u64,
    pub transport: TransportConfig,
    pub download: DownloadConfig,
    pub watch: WatchConfig,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub socket_timeout_seconds: u64,
    pub retry_interval_seconds: u64,
    pub max_retry_times: u32,
    pub allowed_network_types: Vec<NetworkType>,
}

impl TransportConfig {
    pub fn default_transport() -> Self {
        TransportConfig {
            socket_timeout_seconds: 10,
            retry_interval_seconds: 2,
            max_retry_times: 5,
            allowed_network_types: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub save_directory: String,
    pub disk_write_buffer_bytes: u64,
    pub use_special_ext_name_when_downloading: bool,
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub live_interrupted_restart_sleep_seconds: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        WatchConfig {
            live_interrupted_restart_sleep_seconds: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw TOML deserialization types (Option for every optional field)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawGlobalConfig {
    tasks: Option<Vec<RawTaskConfig>>,
    api_server: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTaskConfig {
    room_id: Option<u64>,
    transport: Option<RawTransportConfig>,
    download: Option<RawDownloadConfig>,
    watch: Option<RawWatchConfig>,
}

#[derive(Debug, Deserialize)]
struct RawTransportConfig {
    socket_timeout_seconds: Option<u64>,
    retry_interval_seconds: Option<u64>,
    max_retry_times: Option<u32>,
    allowed_network_types: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawDownloadConfig {
    save_directory: Option<String>,
    disk_write_buffer_bytes: Option<u64>,
    use_special_ext_name_when_downloading: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawWatchConfig {
    live_interrupted_restart_sleep_seconds: Option<u64>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn load_config_from_path(path: &Path) -> Result<GlobalConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
    load_config_from_str(&toml_str)
}

pub fn load_config_from_str(toml_str: &str) -> Result<GlobalConfig, ConfigError> {
    let raw: RawGlobalConfig =
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let raw_tasks = raw
        .tasks
        .ok_or_else(|| ConfigError::MissingField("tasks".to_owned()))?;
    if raw_tasks.is_empty() {
        return Err(ConfigError::InvalidValue(
            "at least one [[tasks]] entry is required".to_owned(),
        ));
    }

    let mut tasks = Vec::with_capacity(raw_tasks.len());
    for (i, t) in raw_tasks.into_iter().enumerate() {
        tasks.push(validate_task(t, i)?);
    }

    Ok(GlobalConfig {
        tasks,
        api_server: raw.api_server.unwrap_or_default(),
    })
}

fn validate_task(raw: RawTaskConfig, index: usize) -> Result<TaskConfig, ConfigError> {
    let room_id = raw
        .room_id
        .ok_or_else(|| ConfigError::MissingField(format!("tasks[{index}].room_id")))?;

    let transport = match raw.transport {
        Some(t) => TransportConfig {
            socket_timeout_seconds: t.socket_timeout_seconds.unwrap_or(10),
            retry_interval_seconds: t.retry_interval_seconds.unwrap_or(2),
            max_retry_times: t.max_retry_times.unwrap_or(5),
            allowed_network_types: parse_network_types(t.allowed_network_types, index)?,
        },
        None => TransportConfig::default_transport(),
    };

    let download = match raw.download {
        Some(d) => DownloadConfig {
            save_directory: d.save_directory.unwrap_or_else(|| ".".to_owned()),
            disk_write_buffer_bytes: d.disk_write_buffer_bytes.unwrap_or(4 * 1024 * 1024),
            use_special_ext_name_when_downloading: d
                .use_special_ext_name_when_downloading
                .unwrap_or(false),
        },
        None => DownloadConfig {
            save_directory: ".".to_owned(),
            disk_write_buffer_bytes: 4 * 1024 * 1024,
            use_special_ext_name_when_downloading: false,
        },
    };

    let watch = match raw.watch {
        Some(w) => WatchConfig {
            live_interrupted_restart_sleep_seconds: w
                .live_interrupted_restart_sleep_seconds
                .unwrap_or(10),
        },
        None => WatchConfig::default(),
    };

    Ok(TaskConfig {
        room_id,
        transport,
        download,
        watch,
    })
}

fn parse_network_types(
    raw: Option<Vec<String>>,
    task_index: usize,
) -> Result<Vec<NetworkType>, ConfigError> {
    let raw = match raw {
        Some(v) => v,
        None => return Ok(Vec::new()),
    };
    raw.into_iter()
        .map(|s| {
            NetworkType::parse(&s).ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "tasks[{task_index}].transport.allowed_network_types: unknown network type '{s}'"
                ))
            })
        })
        .collect()
}

/// Synthesize a config directly from CLI flags, applying the same defaults
/// the TOML loader applies for omitted sections.
pub fn config_from_cli(rooms: &[u64], save_to: &str, disk_write_buffer: u64) -> GlobalConfig {
    let tasks = rooms
        .iter()
        .map(|&room_id| TaskConfig {
            room_id,
            transport: TransportConfig::default_transport(),
            download: DownloadConfig {
                save_directory: save_to.to_owned(),
                disk_write_buffer_bytes: disk_write_buffer,
                use_special_ext_name_when_downloading: false,
            },
            watch: WatchConfig::default(),
        })
        .collect();
    GlobalConfig {
        tasks,
        api_server: String::new(),
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    MissingField(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {s}"),
            ConfigError::Parse(s) => write!(f, "parse error: {s}"),
            ConfigError::MissingField(s) => write!(f, "missing required field: {s}"),
            ConfigError::InvalidValue(s) => write!(f, "invalid config value: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_task_with_defaults() {
        let toml = r#"
            [[tasks]]
            room_id = 12345
        "#;
        let cfg = load_config_from_str(toml).unwrap();
        assert_eq!(cfg.tasks.len(), 1);
        assert_eq!(cfg.tasks[0].room_id, 12345);
        assert_eq!(cfg.tasks[0].transport.max_retry_times, 5);
        assert_eq!(cfg.tasks[0].download.disk_write_buffer_bytes, 4 * 1024 * 1024);
        assert!(cfg.tasks[0].transport.allowed_network_types.is_empty());
    }

    #[test]
    fn rejects_empty_tasks_list() {
        let toml = "tasks = []";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn rejects_missing_tasks_key() {
        let toml = "api_server = \"0.0.0.0:8080\"";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn rejects_unknown_network_type() {
        let toml = r#"
            [[tasks]]
            room_id = 1

            [tasks.transport]
            allowed_network_types = ["carrier-pigeon"]
        "#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn config_from_cli_disables_introspection_endpoint() {
        let cfg = config_from_cli(&[1, 2], "/tmp", 4 * 1024 * 1024);
        assert_eq!(cfg.tasks.len(), 2);
        assert!(cfg.api_server.is_empty());
    }
}
