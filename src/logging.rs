//! File-based logging for vibe-rs
//!
//! The binary reads commands from stdin and prints the now-playing state to
//! stdout, so tracing output goes to a rolling file instead.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_DIR: &str = ".logs";
const LOG_FILE_PREFIX: &str = "vibe-rs";

/// Used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "vibe_rs=debug,reqwest=info,warn";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Sends tracing output to `<dir>/vibe-rs.YYYY-MM-DD.log`, rotated daily.
///
/// Buffered lines are flushed when the returned guard is dropped, so the
/// caller keeps it alive until shutdown.
pub fn init_logging(dir: &Path) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(dir)?;

    let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter())
        .with(file_layer)
        .try_init()?;

    tracing::info!(dir = %dir.display(), "Logging initialized");
    Ok(guard)
}

/// Log the outcome of a native session call
#[macro_export]
macro_rules! log_session_result {
    ($operation:expr, $result:expr) => {
        match &$result {
            Ok(_) => tracing::debug!(operation = $operation, "Session call succeeded"),
            Err(e) => tracing::error!(operation = $operation, error = %e, "Session call failed"),
        }
    };
}
