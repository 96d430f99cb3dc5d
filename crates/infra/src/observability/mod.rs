//! Tracing subscriber setup
//!
//! Filter directives come from `TRACELANE_LOG`, then `RUST_LOG`, then fall
//! back to `info`. `TRACELANE_LOG_FORMAT=json` switches to one JSON object per
//! line. All output goes to stderr.

use std::io::IsTerminal;

use tracelane_domain::{Result, TracelaneError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "TRACELANE_LOG";
pub const LOG_FORMAT_ENV: &str = "TRACELANE_LOG_FORMAT";
const DEFAULT_DIRECTIVE: &str = "info";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl LogFormat {
    /// Read [`LOG_FORMAT_ENV`]; anything but `json` means human output.
    pub fn from_env() -> Self {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(value) if value.trim().eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Human,
        }
    }
}

/// Filter directives in effect for this process.
pub fn env_directives() -> String {
    [LOG_ENV, "RUST_LOG"]
        .into_iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_string())
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let directives = env_directives();
    let filter = EnvFilter::try_new(&directives)
        .map_err(|e| TracelaneError::Config(format!("invalid log filter '{directives}': {e}")))?;

    let installed = match format {
        LogFormat::Human => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_ansi(std::io::stderr().is_terminal()),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr).with_current_span(true))
            .try_init(),
    };
    installed.map_err(|e| TracelaneError::Internal(format!("tracing already initialised: {e}")))
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn tracelane_log_wins_over_rust_log() {
        std::env::set_var(LOG_ENV, "tracelane_core=debug");
        std::env::set_var("RUST_LOG", "warn");
        assert_eq!(env_directives(), "tracelane_core=debug");

        std::env::remove_var(LOG_ENV);
        assert_eq!(env_directives(), "warn");

        std::env::remove_var("RUST_LOG");
        assert_eq!(env_directives(), "info");
    }

    #[test]
    #[serial]
    fn json_format_is_opt_in() {
        std::env::set_var(LOG_FORMAT_ENV, "JSON");
        assert_eq!(LogFormat::from_env(), LogFormat::Json);
        std::env::set_var(LOG_FORMAT_ENV, "pretty");
        assert_eq!(LogFormat::from_env(), LogFormat::Human);
        std::env::remove_var(LOG_FORMAT_ENV);
    }

    #[test]
    #[serial]
    fn invalid_filter_is_a_config_error() {
        std::env::set_var(LOG_ENV, "tracelane=notalevel[");
        assert!(matches!(init_tracing(LogFormat::Human), Err(TracelaneError::Config(_))));
        std::env::remove_var(LOG_ENV);
    }
}
