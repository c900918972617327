//! Logging bootstrap shared by the binary and the tests.

use tracing::Level;

/// Maps a textual level (as found in `logging.level`) to a tracing level.
/// Unknown strings fall back to `INFO`.
pub fn parse_level(level: &str) -> Level {
    match level.trim().to_ascii_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" | "warning" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}

/// Installs a `fmt` subscriber capped at `level`.
///
/// Uses `try_init`, so calling it again (tests, embedders that already set a
/// global subscriber) is a no-op rather than a panic.
pub fn init(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(parse_level(level))
        .with_target(false)
        .with_thread_names(true)
        .try_init();
}
