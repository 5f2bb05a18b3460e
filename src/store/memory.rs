//! Scriptable in-memory store.
//!
//! Stands in for a live master in tests: honors write TTLs and lets a test
//! inject command failures, corrupted reads, added latency, and topology
//! announcements. Also tracks the peak number of concurrently executing
//! commands, which the scheduler tests use to verify that probe cycles
//! never overlap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time;

use super::{MasterAddr, StoreClient, StoreError, StoreEvent};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    established: bool,
    /// Error the next N commands.
    fail_ops: u32,
    /// Return a stale value for the next N reads.
    corrupt_reads: u32,
    /// Fail the next N `establish` calls.
    refuse_establishes: u32,
    op_delay: Duration,
}

struct Entry {
    value: String,
    expires_at: Instant,
}

pub struct MemoryStore {
    state: Mutex<State>,
    events: broadcast::Sender<StoreEvent>,
    active_ops: AtomicU32,
    peak_ops: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(State::default()),
            events,
            active_ops: AtomicU32::new(0),
            peak_ops: AtomicU32::new(0),
        }
    }

    /// Error the next `n` commands with an injected failure.
    pub fn fail_next_ops(&self, n: u32) {
        self.locked().fail_ops = n;
    }

    /// Serve a stale value for the next `n` reads.
    pub fn corrupt_next_reads(&self, n: u32) {
        self.locked().corrupt_reads = n;
    }

    /// Fail the next `n` `establish` calls.
    pub fn refuse_establishes(&self, n: u32) {
        self.locked().refuse_establishes = n;
    }

    /// Add a fixed delay to every command.
    pub fn set_op_delay(&self, delay: Duration) {
        self.locked().op_delay = delay;
    }

    /// Publish a `MasterSwitched` announcement on the event feed.
    pub fn announce_master_switch(&self, previous: MasterAddr, current: MasterAddr) {
        self.emit(StoreEvent::MasterSwitched { previous, current });
    }

    /// Close the session: commands fail with `NotConnected` until the next
    /// `establish`.
    pub fn drop_connection(&self) {
        self.locked().established = false;
        self.emit(StoreEvent::Closed);
    }

    /// Whether a live (unexpired) entry exists for `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        let mut state = self.locked();
        let live = state
            .entries
            .get(key)
            .is_some_and(|entry| entry.expires_at > Instant::now());
        if !live {
            state.entries.remove(key);
        }
        live
    }

    /// Peak number of commands that were in flight at the same time.
    pub fn peak_concurrent_ops(&self) -> u32 {
        self.peak_ops.load(Ordering::Relaxed)
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }

    /// Common front half of every command: concurrency accounting, the
    /// configured delay, connection and fault checks.
    async fn begin_op(&self) -> Result<OpGuard<'_>, StoreError> {
        let active = self.active_ops.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_ops.fetch_max(active, Ordering::SeqCst);
        let guard = OpGuard { store: self };

        let delay = self.locked().op_delay;
        if !delay.is_zero() {
            time::sleep(delay).await;
        }

        let mut state = self.locked();
        if !state.established {
            return Err(StoreError::NotConnected);
        }
        if state.fail_ops > 0 {
            state.fail_ops -= 1;
            drop(state);
            self.emit(StoreEvent::Error {
                detail: "injected fault".into(),
            });
            return Err(StoreError::Server("injected fault".into()));
        }
        Ok(guard)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter when a command settles.
struct OpGuard<'a> {
    store: &'a MemoryStore,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.store.active_ops.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn establish(&self) -> Result<(), StoreError> {
        {
            let mut state = self.locked();
            if state.refuse_establishes > 0 {
                state.refuse_establishes -= 1;
                drop(state);
                self.emit(StoreEvent::Error {
                    detail: "no discovery node reachable".into(),
                });
                return Err(StoreError::Discovery {
                    group: "test".into(),
                    detail: "no discovery node reachable".into(),
                });
            }
            state.established = true;
        }
        self.emit(StoreEvent::Connected);
        self.emit(StoreEvent::Ready);
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let _op = self.begin_op().await?;
        self.locked().entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _op = self.begin_op().await?;
        let mut state = self.locked();
        let value = match state.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            _ => None,
        };
        if value.is_none() {
            state.entries.remove(key);
        }
        if state.corrupt_reads > 0 {
            state.corrupt_reads -= 1;
            return Ok(value.map(|v| format!("{}-stale", v)));
        }
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _op = self.begin_op().await?;
        self.locked().entries.remove(key);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete_round_trip() {
        let store = MemoryStore::new();
        store.establish().await.unwrap();

        store
            .set_with_ttl("k", "v", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let store = MemoryStore::new();
        store.establish().await.unwrap();

        store
            .set_with_ttl("k", "v", Duration::from_millis(10))
            .await
            .unwrap();
        time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.contains_key("k"));
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let store = MemoryStore::new();
        store.establish().await.unwrap();
        store.fail_next_ops(1);

        assert!(store
            .set_with_ttl("k", "v", Duration::from_secs(10))
            .await
            .is_err());
        assert!(store
            .set_with_ttl("k", "v", Duration::from_secs(10))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_corrupt_read_returns_stale_value() {
        let store = MemoryStore::new();
        store.establish().await.unwrap();
        store
            .set_with_ttl("k", "v", Duration::from_secs(10))
            .await
            .unwrap();

        store.corrupt_next_reads(1);
        assert_eq!(store.get("k").await.unwrap(), Some("v-stale".to_string()));
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_commands_require_session() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get("k").await,
            Err(StoreError::NotConnected)
        ));

        store.establish().await.unwrap();
        store.drop_connection();
        assert!(matches!(
            store.get("k").await,
            Err(StoreError::NotConnected)
        ));
    }
}
