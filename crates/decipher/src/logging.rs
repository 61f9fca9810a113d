use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// File name used inside `logging.directory`.
pub const LOG_FILE: &str = "decipher.log";

/// Install the global subscriber: stderr always, plus `decipher.log` when a
/// directory is configured. `RUST_LOG` overrides the configured level.
///
/// Keep the returned guard alive for the life of the process or buffered file
/// output is lost.
pub fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match &config.directory {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            let subscriber = builder
                .with_ansi(false)
                .with_writer(std::io::stderr.and(file_writer))
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
            Some(guard)
        }
        None => {
            let subscriber = builder.with_writer(std::io::stderr).finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
            None
        }
    }
}
