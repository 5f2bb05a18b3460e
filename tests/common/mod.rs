//! Shared utilities for probe integration tests.

use std::sync::Arc;

use kvprobe::config::{ProbeSettings, ReconnectConfig};
use kvprobe::store::{MemoryStore, StoreClient};

/// Probe settings tuned for test speed; key/value/TTL semantics keep the
/// production defaults.
#[allow(dead_code)]
pub fn probe_settings() -> ProbeSettings {
    ProbeSettings {
        interval_ms: 20,
        ..ProbeSettings::default()
    }
}

/// A reconnect schedule short enough to exercise exhaustion in-process.
#[allow(dead_code)]
pub fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig {
        base_delay_ms: 10,
        cap_delay_ms: 50,
        max_attempts: 3,
    }
}

/// An in-memory store with an established session.
#[allow(dead_code)]
pub async fn ready_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.establish().await.expect("establish in-memory store");
    store
}
