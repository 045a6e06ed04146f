//! Logging Infrastructure
//!
//! `RUST_LOG` takes precedence over the configured level when set.

use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Rolling file name prefix
const LOG_FILE_PREFIX: &str = "collection-editor";

/// Where log lines go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    /// Daily rolling files in this directory
    File(PathBuf),
}

/// Initialize the logger
pub fn init_logger() {
    init_logger_with_file(None, false, None);
}

/// Initialize the logger with optional JSON format and file output.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_logger_with_file(log_level: Option<&str>, json: bool, log_dir: Option<&str>) -> bool {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let writer = match resolve_target(log_dir) {
        LogTarget::File(dir) => {
            BoxMakeWriter::new(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX))
        }
        LogTarget::Stdout => BoxMakeWriter::new(std::io::stdout),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.is_ok()
}

/// File output only when the directory exists
pub fn resolve_target(log_dir: Option<&str>) -> LogTarget {
    match log_dir.map(Path::new) {
        Some(dir) if dir.is_dir() => LogTarget::File(dir.to_path_buf()),
        _ => LogTarget::Stdout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target(None), LogTarget::Stdout);
        assert_eq!(
            resolve_target(Some("/definitely/not/here")),
            LogTarget::Stdout
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();
        assert_eq!(
            resolve_target(Some(path)),
            LogTarget::File(dir.path().to_path_buf())
        );
    }

    #[test]
    fn test_second_init_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();
        // a test harness may already have installed one
        init_logger_with_file(Some("debug"), false, Some(path));
        assert!(!init_logger_with_file(Some("debug"), true, None));
    }
}
