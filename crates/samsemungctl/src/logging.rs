//! Tracing setup for samsemungctl
//!
//! Filter precedence, first match wins:
//! 1. $SAMSEMUNG_LOG
//! 2. $RUST_LOG
//! 3. `-v` (info), `-vv` (debug), `-vvv` (trace)
//! 4. `log_level` from the settings file

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "SAMSEMUNG_LOG";

const FALLBACK_LEVEL: &str = "warn";

/// Pick the filter directive from the sources above
pub fn filter_directive(
    verbose: u8,
    configured: &str,
    samsemung_log: Option<String>,
    rust_log: Option<String>,
) -> String {
    let from_env = samsemung_log
        .filter(|v| !v.trim().is_empty())
        .or_else(|| rust_log.filter(|v| !v.trim().is_empty()));
    if let Some(directive) = from_env {
        return directive;
    }

    match verbose {
        0 if configured.trim().is_empty() => FALLBACK_LEVEL.to_string(),
        0 => configured.trim().to_string(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the stderr subscriber
pub fn init(verbose: u8, configured: &str) {
    let directive = filter_directive(
        verbose,
        configured,
        std::env::var(LOG_ENV).ok(),
        std::env::var("RUST_LOG").ok(),
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(FALLBACK_LEVEL));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_beats_flags_and_config() {
        assert_eq!(
            filter_directive(2, "error", Some("samsemung_common=trace".into()), Some("info".into())),
            "samsemung_common=trace"
        );
        assert_eq!(filter_directive(2, "error", None, Some("info".into())), "info");
        assert_eq!(filter_directive(0, "error", Some("  ".into()), None), "error");
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(filter_directive(0, "", None, None), "warn");
        assert_eq!(filter_directive(0, "warn", None, None), "warn");
        assert_eq!(filter_directive(1, "warn", None, None), "info");
        assert_eq!(filter_directive(2, "warn", None, None), "debug");
        assert_eq!(filter_directive(5, "warn", None, None), "trace");
    }
}
