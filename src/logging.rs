//! Logging setup for the CLI.
//!
//! Logs go to stderr so that the dump itself can be written to stdout.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Level for a verbosity count (0=INFO, 1=DEBUG, 2+=TRACE); `quiet` wins
pub fn level_for(verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

/// Initializes structured logging based on verbosity level.
///
/// `RUST_LOG`, when set, overrides the level derived from the flags.
pub fn init_logging(verbose: u8, quiet: bool) -> anyhow::Result<()> {
    let level = level_for(verbose, quiet);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for(0, true), Level::ERROR);
        assert_eq!(level_for(5, true), Level::ERROR);
        assert_eq!(level_for(0, false), Level::INFO);
        assert_eq!(level_for(1, false), Level::DEBUG);
        assert_eq!(level_for(2, false), Level::TRACE);
        assert_eq!(level_for(10, false), Level::TRACE);
    }
}
