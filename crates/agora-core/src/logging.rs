//! Tracing subscriber setup.
//!
//! Logs go to stderr so they never interleave with streamed answer text on stdout.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Build the filter directive: `RUST_LOG` wins, then the config level plus
/// per-crate filters, then `debug`/`warn` depending on `verbose`.
pub fn filter_directive(config: Option<&LoggingConfig>, verbose: bool) -> String {
    let base = config
        .and_then(|c| c.level.clone())
        .unwrap_or_else(|| if verbose { "debug" } else { "warn" }.to_string());

    let mut directive = base;
    if let Some(config) = config {
        for filter in &config.filters {
            directive.push(',');
            directive.push_str(filter);
        }
    }
    directive
}

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init_logging(config: Option<&LoggingConfig>, verbose: bool) {
    let directive = filter_directive(config, verbose);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let json = config.map(|c| c.format == "json").unwrap_or(false);
    let result = if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("logging already initialized: {e}");
    }
}
