use std::sync::Once;

use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

/// Crates of the HTTP stack whose own diagnostics are cut down to errors.
pub const QUIET_TARGETS: &[&str] = &["reqwest", "hyper", "hyper_util", "h2", "rustls"];

static INIT: Once = Once::new();

pub fn quiet_directives() -> Vec<Directive> {
    QUIET_TARGETS
        .iter()
        .filter_map(|target| format!("{}=error", target).parse().ok())
        .collect()
}

pub fn build_filter(debug: bool) -> EnvFilter {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    quiet_directives()
        .into_iter()
        .fold(filter, |filter, directive| filter.add_directive(directive))
}

/// Installs the global subscriber with the client libraries silenced.
/// Returns whether this call installed it. Later calls are no-ops, and a
/// subscriber installed by the embedding application is left in place.
pub fn init(debug: bool) -> bool {
    let mut installed = false;
    INIT.call_once(|| {
        let result = tracing_subscriber::fmt()
            .with_env_filter(build_filter(debug))
            .with_file(true)
            .with_line_number(true)
            .try_init();
        match result {
            Ok(()) => installed = true,
            Err(err) if debug => eprintln!("Keeping the existing tracing subscriber: {}", err),
            Err(_) => {}
        }
    });
    installed
}
