//! Subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor the configured level parses.
const FALLBACK_LEVEL: &str = "info";

/// Build the filter: `RUST_LOG` wins, then `level`, then [`FALLBACK_LEVEL`].
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_LEVEL))
}

/// Install the global compact subscriber on stderr. Stdout stays free for
/// transcripts. A second call is a no-op.
pub fn init_subscriber(level: &str) {
    let _ = tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter(level))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_applies_without_rust_log() {
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(env_filter("debug").to_string().contains("debug"));
        }
    }

    #[test]
    fn init_twice_is_harmless() {
        init_subscriber("warn");
        init_subscriber("warn");
    }
}
