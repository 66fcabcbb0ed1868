//! EventStream Integration Test Suite
//!
//! Exercises the public `factlog` API end to end against both backends:
//! append preconditions, concurrent writers, deletion, replay and
//! notifications.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test eventstream
//!
//! # One area only
//! cargo test --test eventstream concurrency::
//! ```

use factlog::{
    Factlog, MemoryTransport, NotificationTransport, StreamIdentity, APPEND_LOG_BACKEND,
    TABLE_BACKEND,
};
use std::sync::{Arc, Once};

// Test modules
pub mod append;
pub mod bank;
pub mod concurrency;
pub mod delete;
pub mod durable;
pub mod notifications;
pub mod properties;
pub mod scenarios;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Every backend name the engine ships with
pub const BACKENDS: [&str; 2] = [APPEND_LOG_BACKEND, TABLE_BACKEND];

static TRACING: Once = Once::new();

/// Route `tracing` output to the test harness
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// In-memory store on `backend`, collecting notifications
pub fn open(backend: &str) -> (Factlog, Arc<MemoryTransport>) {
    init_tracing();
    let memory = Arc::new(MemoryTransport::new());
    let transport: Arc<dyn NotificationTransport> = memory.clone();
    let log = Factlog::builder()
        .default_backend(backend)
        .transport(transport)
        .open()
        .expect("failed to open store");
    (log, memory)
}

/// Run `test` once per backend
pub fn each_backend(test: impl Fn(&str, &Factlog, &MemoryTransport)) {
    for backend in BACKENDS {
        let (log, memory) = open(backend);
        test(backend, &log, &memory);
    }
}

/// `Bank/Account/<key>`
pub fn account(key: &str) -> StreamIdentity {
    StreamIdentity::new("Bank", "Account", key).expect("valid identity")
}
