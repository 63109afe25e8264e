//! Test-only helpers shared across unit tests.

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a `tracing` subscriber that prints to stderr, once per process.
/// Cheap to call from every test's setup; later calls are no-ops.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}
