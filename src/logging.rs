//! Log output for the command-line shell.

use tracing_subscriber::EnvFilter;

/// Default directive for a verbosity count: `info`, then `debug` for
/// docshelf crates, then `trace`.
pub fn directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "info,docshelf=debug,docshelf_library=debug,docshelf_client=debug,docshelf_storage=debug",
        _ => "trace",
    }
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays clean; `RUST_LOG` overrides the verbosity flag.
pub fn init(verbose: u8) {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(directive(verbose)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose > 0)
        .init();
}
