//! Logging initialisation via tracing-subscriber.
//!
//! The effective filter is resolved from three sources: `-v` flags on the
//! command line, `RUST_LOG`, and `service.log_level` from the config file.
//! Call [`init`] once at startup with the result of [`resolve`].

use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Filter selection after CLI flags and config have been considered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLevel {
    pub directive: String,
    /// `true` when the directive came from the command line and must win over
    /// `RUST_LOG`.
    pub forced: bool,
}

/// Map `-v` repetitions to a level. Zero means "no CLI override".
pub fn verbosity_level(verbosity: u8) -> Option<&'static str> {
    match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Combine the CLI verbosity with the configured level.
pub fn resolve(verbosity: u8, configured: &str) -> LogLevel {
    match verbosity_level(verbosity) {
        Some(level) => LogLevel { directive: level.to_string(), forced: true },
        None => LogLevel { directive: configured.to_string(), forced: false },
    }
}

/// Install the global subscriber (stderr, env-filtered).
///
/// A forced level takes precedence and `RUST_LOG` is only consulted when the
/// directive does not parse. Otherwise `RUST_LOG` wins and the directive is
/// the fallback.
pub fn init(level: &LogLevel) -> Result<(), AppError> {
    let directive = level.directive.as_str();
    let filter = if level.forced {
        EnvFilter::try_new(directive).or_else(|level_err| {
            EnvFilter::try_from_default_env().map_err(|env_err| {
                AppError::Logger(format!(
                    "invalid log level '{directive}': {level_err}; RUST_LOG parse failed: {env_err}"
                ))
            })
        })?
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(directive))
            .map_err(|e| AppError::Logger(format!("invalid log level '{directive}': {e}")))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_tiers() {
        assert_eq!(verbosity_level(0), None);
        assert_eq!(verbosity_level(1), Some("warn"));
        assert_eq!(verbosity_level(3), Some("debug"));
        assert_eq!(verbosity_level(9), Some("trace"));
    }

    #[test]
    fn cli_verbosity_forces_level() {
        let l = resolve(2, "warn");
        assert_eq!(l, LogLevel { directive: "info".into(), forced: true });
    }

    #[test]
    fn config_level_is_fallback() {
        let l = resolve(0, "debug");
        assert_eq!(l.directive, "debug");
        assert!(!l.forced);
    }

    #[test]
    fn init_succeeds_or_already_init() {
        // Another test in this process may have installed the subscriber first.
        match init(&resolve(0, "info")) {
            Ok(()) => {}
            Err(AppError::Logger(msg)) if msg.contains("set subscriber") => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
