//! Tracing subscriber setup for binaries, benches and tests

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "outline_query_core=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to `filter`
/// (or [`DEFAULT_FILTER`])
///
/// Returns `false` when a global subscriber was already installed, so calling
/// this from several tests is harmless.
pub fn init_logging(filter: Option<&str>) -> bool {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(filter.unwrap_or(DEFAULT_FILTER))
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        init_logging(Some("outline_query_core=debug"));
        assert!(!init_logging(None));
    }
}
