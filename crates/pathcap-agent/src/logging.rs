//! Tracing setup: human-readable console output, plus an optional plain-text
//! log file rotated daily.

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LogFile;

/// Rotated log files kept on disk, the active one included.
pub const LOG_FILES_KEPT: usize = 5;

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the level; otherwise `info`, or `debug` when
/// `verbose`. The returned guard flushes the file writer on drop and must
/// live until the process exits.
pub fn init(verbose: bool, log_file: Option<&LogFile>) -> anyhow::Result<Option<WorkerGuard>> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (file_layer, guard) = match log_file {
        Some(target) => {
            let appender = file_appender(target).with_context(|| {
                format!("cannot open log file in {}", target.directory.display())
            })?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()?;
    Ok(guard)
}

/// Daily-rotating appender for `target`, creating its directory if needed.
pub fn file_appender(target: &LogFile) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&target.file_name)
        .max_log_files(LOG_FILES_KEPT)
        .build(&target.directory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn appender_creates_directory_and_prefixed_file() {
        let dir = std::env::temp_dir().join(format!("pathcap-log-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let target = LogFile {
            directory: dir.join("nested"),
            file_name: "application.log".into(),
        };

        let mut appender = file_appender(&target).unwrap();
        appender.write_all(b"circuit updated\n").unwrap();
        appender.flush().unwrap();

        let names: Vec<String> = std::fs::read_dir(&target.directory)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1, "{names:?}");
        assert!(names[0].starts_with("application.log"), "{names:?}");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
