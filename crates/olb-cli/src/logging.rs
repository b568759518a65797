//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Environment variable that takes precedence over `RUST_LOG`.
pub const LOG_ENV: &str = "OLB_LOG";

/// Pick the filter directive: `OLB_LOG`, then `RUST_LOG`, then the setting.
pub fn filter_directive(
    olb_log: Option<String>,
    rust_log: Option<String>,
    verbose: bool,
    configured: &str,
) -> String {
    let set = |d: &String| !d.trim().is_empty();
    olb_log
        .filter(set)
        .or_else(|| rust_log.filter(set))
        .unwrap_or_else(|| {
            if verbose {
                "debug".to_string()
            } else {
                configured.to_string()
            }
        })
}

/// Install the global `fmt` subscriber. Call once, from `main`.
pub fn init(verbose: bool, configured: &str) {
    let directive = filter_directive(
        std::env::var(LOG_ENV).ok(),
        std::env::var("RUST_LOG").ok(),
        verbose,
        configured,
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        assert_eq!(
            filter_directive(Some("trace".into()), Some("warn".into()), false, "info"),
            "trace"
        );
        assert_eq!(filter_directive(None, Some("warn".into()), true, "info"), "warn");
        assert_eq!(filter_directive(None, None, true, "info"), "debug");
        assert_eq!(filter_directive(None, None, false, "error"), "error");
    }

    #[test]
    fn test_blank_env_falls_back() {
        assert_eq!(filter_directive(Some("  ".into()), None, false, "info"), "info");
        assert_eq!(
            filter_directive(Some(String::new()), Some("warn".into()), false, "info"),
            "warn"
        );
    }
}
