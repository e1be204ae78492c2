//! Tracing setup for the command-line tool.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the binary. Filtering follows `RUST_LOG`:
//! - `RUST_LOG=debug` - everything the reader and editor log
//! - `RUST_LOG=docpack::zip=trace` - container internals only

use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the console subscriber.
///
/// An explicit `level` wins over `RUST_LOG`; without either the filter is `warn`.
/// Output goes to stderr so piped entry data on stdout stays clean.
pub fn init(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .with_filter(filter);

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry().with(console_layer).try_init();
}
