//! provides logging helpers

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

pub const LOG_PATH_ENV_VAR: &str = "LOG_PATH";

const DEFAULT_LOG_PREFIX: &str = "k8s-bark.log";

/// initiate the global tracing subscriber
///
/// Events always go to stderr. When `log_path` is given, they are also written to a
/// daily-rotated file next to it; the returned guard must be kept alive to flush it.
pub fn init<P: AsRef<Path>>(log_path: Option<P>) -> Option<WorkerGuard> {
    let env_filter = filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy();

    let stderr_layer = layer().with_writer(std::io::stderr).with_target(true);

    let mut appender_error = None;
    let (file_layer, guard) = match log_path {
        Some(path) => {
            let (dir, prefix) = rotation_target(path.as_ref());
            match RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(prefix)
                .max_log_files(3)
                .build(dir)
            {
                Ok(appender) => {
                    let (writer, guard) = tracing_appender::non_blocking(appender);
                    let file_layer = layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(true);
                    (Some(file_layer), Some(guard))
                }
                Err(err) => {
                    appender_error = Some(format!(
                        "failed to create rolling file appender at {}: {err}",
                        dir.display()
                    ));
                    (None, None)
                }
            }
        }
        None => (None, None),
    };

    registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(message) = appender_error {
        tracing::warn!("{message}; logging to stderr only");
    }

    guard
}

/// Splits a log file path into the rotation directory and the file name prefix.
fn rotation_target(path: &Path) -> (&Path, &str) {
    if path.is_dir() {
        return (path, DEFAULT_LOG_PREFIX);
    }
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(DEFAULT_LOG_PREFIX);
    (dir, prefix)
}
