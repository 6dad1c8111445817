//! File-naming policy: derives the recording's base name from room title
//! and wall-clock time, resolves the extension from the media URL, and
//! handles the optional "write under .partial, rename on completion" flow.

use chrono::Local;
use std::path::{Path, PathBuf};

const FALLBACK_EXTENSION: &str = "flv";
const PARTIAL_EXTENSION: &str = "partial";

/// `"<title>_YYYY-MM-DD-hh-mm-ss"`, using the local wall clock at call time.
pub fn base_name(title: &str) -> String {
    let now = Local::now();
    format!("{title}_{}", now.format("%Y-%m-%d-%H-%M-%S"))
}

/// Extension from the media URL's final path segment after the last `.`,
/// discarding any query string. Falls back to `"flv"`.
pub fn extension_from_url(media_url: &str) -> String {
    let without_query = media_url.split('?').next().unwrap_or(media_url);
    let last_segment = without_query.rsplit('/').next().unwrap_or(without_query);
    match last_segment.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_owned(),
        _ => FALLBACK_EXTENSION.to_owned(),
    }
}

/// Resolves the path the copier should write to, plus the final path it
/// should end up at once the attempt completes gracefully.
///
/// When `use_partial` is set, the write path carries the `.partial`
/// extension and differs from the final path; otherwise both are the
/// same path and no rename is ever needed.
pub struct ResolvedPaths {
    pub write_path: PathBuf,
    pub final_path: PathBuf,
    pub needs_rename: bool,
}

pub fn resolve_paths(save_directory: &Path, base: &str, resolved_ext: &str, use_partial: bool) -> ResolvedPaths {
    let final_path = save_directory.join(format!("{base}.{resolved_ext}"));
    if use_partial {
        let write_path = save_directory.join(format!("{base}.{PARTIAL_EXTENSION}"));
        ResolvedPaths {
            write_path,
            final_path,
            needs_rename: true,
        }
    } else {
        ResolvedPaths {
            write_path: final_path.clone(),
            final_path,
            needs_rename: false,
        }
    }
}

/// Atomically rename the partial file to its resolved extension. Only
/// called when the file was actually created and the attempt completed
/// gracefully; skipped on every other exit path, including cancellation
/// and errors.
pub fn rename_to_final(write_path: &Path, final_path: &Path) -> std::io::Result<()> {
    std::fs::rename(write_path, final_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_from_url_strips_query_string() {
        assert_eq!(extension_from_url("https://cdn.example/live.flv?x=1"), "flv");
    }

    #[test]
    fn extension_from_url_falls_back_when_no_dot_in_last_segment() {
        assert_eq!(extension_from_url("https://cdn.example/live"), "flv");
    }

    #[test]
    fn extension_from_url_handles_non_flv_extensions() {
        assert_eq!(extension_from_url("https://cdn.example/chunk.m3u8?t=2"), "m3u8");
    }

    #[test]
    fn resolve_paths_uses_partial_extension_when_enabled() {
        let dir = PathBuf::from("/recordings");
        let resolved = resolve_paths(&dir, "room_2026-01-01-00-00-00", "flv", true);
        assert_eq!(
            resolved.write_path,
            PathBuf::from("/recordings/room_2026-01-01-00-00-00.partial")
        );
        assert_eq!(
            resolved.final_path,
            PathBuf::from("/recordings/room_2026-01-01-00-00-00.flv")
        );
        assert!(resolved.needs_rename);
    }

    #[test]
    fn resolve_paths_skips_rename_when_partial_disabled() {
        let dir = PathBuf::from("/recordings");
        let resolved = resolve_paths(&dir, "room_x", "flv", false);
        assert_eq!(resolved.write_path, resolved.final_path);
        assert!(!resolved.needs_rename);
    }

    #[test]
    fn rename_moves_partial_file_to_final_name() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("out.partial");
        let final_path = dir.path().join("out.flv");
        std::fs::write(&partial, b"data").unwrap();

        rename_to_final(&partial, &final_path).unwrap();

        assert!(!partial.exists());
        assert_eq!(std::fs::read(&final_path).unwrap(), b"data");
    }
}
