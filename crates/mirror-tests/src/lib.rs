//! Integration test infrastructure for httpmirror.
//!
//! Provides recording fakes for the store and origin ports, helpers to run
//! the server on a random port, and a MinIO container for S3 tests.
//!
//! # Usage
//!
//! ```ignore
//! use mirror_tests::{RecordingStore, ScriptedOrigin, coordinator};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let store = RecordingStore::new();
//!     let origin = ScriptedOrigin::new(b"payload");
//!     let cache = coordinator(store.clone(), origin.clone(), Default::default());
//!     // cache.serve(...), then inspect store.puts() and origin.gets()
//! }
//! ```

pub mod containers;
pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,mirror_cache=debug,mirror_server=debug")),
        )
        .with_test_writer()
        .try_init();
}
