use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

/// Install the global subscriber.
///
/// Everything at `level` (or `RUST_LOG`) goes to stderr. Warnings and errors
/// are also appended to `error_log`, which serves as the diagnostic log.
/// Keep the returned guard alive until shutdown so the file writer flushes.
pub fn init(level: &str, error_log: &str) -> anyhow::Result<WorkerGuard> {
    let path = Path::new(error_log);
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("invalid error log path: {}", error_log))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(env_filter),
        )
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(false)
                .with_filter(LevelFilter::from_level(Level::WARN)),
        )
        .try_init()?;

    Ok(guard)
}
