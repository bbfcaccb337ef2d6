//! Tracing subscriber bootstrap.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `level` is the default filter when
/// `RUST_LOG` is unset; `json` switches to line-oriented JSON output.
/// Safe to call more than once — later calls are ignored.
pub fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    if json {
        let _ = fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_does_not_panic() {
        init_logging("info", false);
        init_logging("debug", true);
    }
}
