//! Tracing subscriber setup for the binary.
//!
//! Log output goes to stderr so JSON and SARIF on stdout stay parseable.
//! Precedence: `--verbose`, then `--quiet`, then `RUST_LOG`, then warnings only.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("codestrata=debug")
    } else if quiet {
        EnvFilter::new("codestrata=error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("codestrata=warn"))
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(verbose: bool, quiet: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(filter(verbose, quiet))
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_precedence() {
        assert_eq!(filter(true, true).to_string(), "codestrata=debug");
        assert_eq!(filter(false, true).to_string(), "codestrata=error");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(false, true);
        init(true, false);
    }
}
