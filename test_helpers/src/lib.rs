//! Utilities shared by the workspace's tests.

#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

use std::sync::Once;

use tracing_log::LogTracer;
use tracing_subscriber::{fmt, EnvFilter};

static LOG_SETUP: Once = Once::new();

/// Enables debug logging regardless of the value of RUST_LOG environment
/// variable. If RUST_LOG isn't specified, defaults to "debug".
pub fn start_logging() {
    // ensure the global has been initialized
    LOG_SETUP.call_once(|| {
        // honor any existing RUST_LOG level
        if std::env::var("RUST_LOG").is_err() {
            std::env::set_var("RUST_LOG", "debug");
        }

        // Configure the logger to write to stderr and install it
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .finish();

        observability_deps::tracing::subscriber::set_global_default(subscriber)
            .expect("setting tracing subscriber failed");

        // send log events to the tracing subscriber as well
        LogTracer::init().expect("tracing log init failed");
    });
}

/// Enables debug logging if the RUST_LOG environment variable is set
pub fn maybe_start_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        start_logging()
    }
}

/// Asserts that the value of `$ACTUAL` (anything implementing `ToString`)
/// contains the substring `$EXPECTED`, with a readable failure message.
#[macro_export]
macro_rules! assert_contains {
    ($ACTUAL: expr, $EXPECTED: expr) => {
        let actual_value: String = $ACTUAL.to_string();
        let expected_value: String = $EXPECTED.to_string();
        assert!(
            actual_value.contains(&expected_value),
            "Can not find expected value in actual.\n\nExpected:\n{}\n\nActual:\n{}",
            expected_value,
            actual_value,
        );
    };
}
