use std::path::Path;

use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with file and console logging
///
/// Two layers share one registry:
/// 1. Console (stdout): INFO and above, or whatever `RUST_LOG` asks for
/// 2. File: DEBUG and above, rotated daily as `mastery_hub.log.YYYY-MM-DD`
///    under `log_dir`
///
/// The returned WorkerGuard owns the background writer; keep it alive for
/// the whole program or buffered lines are lost on exit.
pub fn init_tracing(log_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    // daily() opens a new file per day; older files are left in place.
    // The directory is created on the first write if it does not exist.
    let file_appender = rolling::daily(log_dir, "mastery_hub.log");

    // Writes are handed to a background thread; `guard` owns that thread
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    // File layer: no ANSI escapes, everything from DEBUG up

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_filter(EnvFilter::new("debug"));

    // Console layer: RUST_LOG wins when set, otherwise INFO and above
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(false)
        .with_filter(console_filter);

    // Both layers see every event; each filter decides what it keeps.
    // try_init: a second call (e.g. from an embedding test harness) keeps
    // the first subscriber instead of panicking
    if let Err(e) = tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("tracing already initialized: {}", e);
    }

    tracing::info!(log_dir = %log_dir.display(), "Tracing initialized (console=INFO+, file=DEBUG+)");

    guard
}
