use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn rotation(name: &str) -> Rotation {
    match name {
        "hourly" => Rotation::HOURLY,
        "daily" => Rotation::DAILY,
        _ => Rotation::NEVER,
    }
}

/// Install the global subscriber: rolling file output (JSON or text) plus
/// colored stdout in text mode. `RUST_LOG` overrides `log_level`.
///
/// Keep the returned guard alive until exit, dropping it flushes the file
/// writer.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let file_appender =
        RollingFileAppender::new(rotation(&config.rotation), &config.log_dir, &config.log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.use_json {
        let file_layer = fmt::layer()
            .json()
            .with_target(true) // Keep target in JSON for structured queries
            .with_current_span(true)
            .with_writer(non_blocking)
            .with_ansi(false);
        registry.with(file_layer).try_init()
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
        registry.with(file_layer).with(stdout_layer).try_init()
    };

    if let Err(e) = installed {
        eprintln!("Logging already initialized: {}", e);
    }

    guard
}
