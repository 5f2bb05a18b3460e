//! Store client seam.
//!
//! # Data Flow
//! ```text
//! ProbeExecutor ──set/get/delete──▶ StoreClient ──TCP──▶ master replica
//!
//! FailoverMonitor ◀──StoreEvent feed── StoreClient ◀── discovery tier
//!                                       (lifecycle + topology announcements)
//! ```
//!
//! The probe core is generic over [`StoreClient`]: the binary wires in the
//! sentinel-backed client, tests wire in the scriptable in-memory store.
//! Only the failover monitor drives `establish`; the executor issues
//! commands over the shared session and never manages its lifecycle.

pub mod memory;
pub mod resp;
pub mod sentinel;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

pub use memory::MemoryStore;
pub use sentinel::SentinelClient;

/// Network address of a store replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterAddr {
    pub host: String,
    pub port: u16,
}

impl MasterAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for MasterAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Connection-lifecycle and topology events delivered to the subscriber.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// TCP session to the master established.
    Connected,
    /// Ready-check passed; the master is accepting commands.
    Ready,
    /// Transient command or connection error.
    Error { detail: String },
    /// The client scheduled its own reconnect attempt.
    ReconnectScheduled { delay_ms: u64 },
    /// The command session closed.
    Closed,
    /// The discovery tier promoted a different replica.
    MasterSwitched {
        previous: MasterAddr,
        current: MasterAddr,
    },
}

/// Errors surfaced by store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("discovery failed for group {group}: {detail}")]
    Discovery { group: String, detail: String },

    #[error("not connected to a master")]
    NotConnected,

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("protocol: {0}")]
    Protocol(String),

    #[error("server: {0}")]
    Server(String),
}

/// A connected session against the replicated store.
///
/// `set_with_ttl`/`get`/`delete` are synchronous per call: each returns
/// once the store acknowledges. Individual operations are bounded by the
/// client's own timeout policy.
#[async_trait]
pub trait StoreClient: Send + Sync + 'static {
    /// Resolve the current master through discovery and open a session,
    /// emitting `Connected` and `Ready` on the event feed.
    async fn establish(&self) -> Result<(), StoreError>;

    /// Write `key → value` with a relative expiry.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Read a key; `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Delete a key.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Subscribe to the lifecycle/topology event feed.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}
