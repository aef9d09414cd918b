use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Env var holding a full `tracing` filter directive; wins over the config level.
pub const LOG_ENV: &str = "JIRA_REST_LOG";

/// Maps a syslog-style level name (as used by `log_level` in the config) to a
/// `tracing` filter directive. Unknown names fall back to `warn`.
pub fn directive_for(level: &str) -> &'static str {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "INFO" | "NOTICE" => "info",
        "WARNING" | "WARN" => "warn",
        "ERROR" | "CRITICAL" | "ALERT" | "EMERGENCY" => "error",
        _ => "warn",
    }
}

/// Installs the global subscriber on stderr. Safe to call more than once.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(directive_for(level)));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
