//! Command-line interface: either point at a TOML config file, or describe
//! a single ad-hoc recording directly with flags. The two modes are
//! mutually exclusive.

use clap::{ArgGroup, Parser};

#[derive(Debug, Parser)]
#[command(
    name = "recorder",
    version,
    about = "Supervises live-stream recording tasks for one or more rooms",
    group(
        ArgGroup::new("mode")
            .required(true)
            .args(["config", "room"])
    )
)]
pub struct Cli {
    /// Path to a TOML config file describing one or more recording tasks.
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<std::path::PathBuf>,

    /// Room id to record. Repeatable; only valid without `--config`.
    #[arg(short = 's', long = "room", value_name = "ROOM_ID")]
    pub room: Vec<u64>,

    /// Output directory for ad-hoc recordings given via `--room`.
    #[arg(short = 'o', long = "save-to", value_name = "DIR", default_value = ".")]
    pub save_to: String,

    /// Disk write buffer size in bytes for ad-hoc recordings.
    #[arg(short = 'b', long = "disk-write-buffer", value_name = "BYTES", default_value_t = 4 * 1024 * 1024)]
    pub disk_write_buffer: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_mode() {
        let cli = Cli::parse_from(["recorder", "-c", "recorder.toml"]);
        assert_eq!(cli.config, Some(std::path::PathBuf::from("recorder.toml")));
        assert!(cli.room.is_empty());
    }

    #[test]
    fn parses_room_mode_with_repeated_flag() {
        let cli = Cli::parse_from(["recorder", "-s", "123", "-s", "456", "-o", "/tmp/out"]);
        assert_eq!(cli.room, vec![123, 456]);
        assert_eq!(cli.save_to, "/tmp/out");
    }

    #[test]
    fn rejects_both_config_and_room() {
        let result = Cli::try_parse_from(["recorder", "-c", "recorder.toml", "-s", "123"]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_neither_config_nor_room() {
        let result = Cli::try_parse_from(["recorder"]);
        assert!(result.is_err());
    }
}
