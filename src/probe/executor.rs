//! Single probe cycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use uuid::Uuid;

use crate::config::ProbeSettings;
use crate::store::StoreClient;

const HEX_CHARS: &[u8] = b"0123456789abcdef";

/// How one probe cycle settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The read returned exactly what was written.
    Success,
    /// The read returned something else.
    Mismatch,
    /// A store operation failed before the comparison.
    Error,
}

impl ProbeResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeResult::Success => "success",
            ProbeResult::Mismatch => "mismatch",
            ProbeResult::Error => "error",
        }
    }
}

/// Result of one write→read→compare→delete cycle. Created fresh per cycle
/// and handed to the aggregator; never retained.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub key: String,
    pub expected: String,
    pub observed: Option<String>,
    /// Write + read time; the cleanup delete is not measured.
    pub latency: Duration,
    pub result: ProbeResult,
    pub error_detail: Option<String>,
}

/// Executes exactly one correctness-and-latency probe per call.
pub struct ProbeExecutor<S> {
    store: Arc<S>,
    key_prefix: String,
    value_len: usize,
    ttl: Duration,
}

impl<S: StoreClient> ProbeExecutor<S> {
    pub fn new(store: Arc<S>, settings: &ProbeSettings) -> Self {
        Self {
            store,
            key_prefix: settings.key_prefix.clone(),
            value_len: settings.value_len,
            ttl: Duration::from_secs(settings.ttl_secs),
        }
    }

    /// Run one cycle. Never fails: every store error is folded into the
    /// returned outcome.
    pub async fn execute(&self) -> ProbeOutcome {
        let key = self.generate_key();
        let expected = self.generate_value();
        let start = Instant::now();

        // The write carries an expiry so an interrupted cycle cannot leak
        // the key even when the delete below never runs.
        if let Err(e) = self.store.set_with_ttl(&key, &expected, self.ttl).await {
            return Self::errored(key, expected, start.elapsed(), e.to_string());
        }

        let observed = match self.store.get(&key).await {
            Ok(observed) => observed,
            Err(e) => return Self::errored(key, expected, start.elapsed(), e.to_string()),
        };
        let latency = start.elapsed();

        let result = if observed.as_deref() == Some(expected.as_str()) {
            ProbeResult::Success
        } else {
            ProbeResult::Mismatch
        };

        // Best-effort cleanup on both outcomes; a failed delete is logged
        // and the TTL reaps the key.
        if let Err(e) = self.store.delete(&key).await {
            tracing::warn!(key = %key, error = %e, "Probe cleanup delete failed");
        }

        ProbeOutcome {
            key,
            expected,
            observed,
            latency,
            result,
            error_detail: None,
        }
    }

    fn errored(key: String, expected: String, latency: Duration, detail: String) -> ProbeOutcome {
        ProbeOutcome {
            key,
            expected,
            observed: None,
            latency,
            result: ProbeResult::Error,
            error_detail: Some(detail),
        }
    }

    /// Namespaced unique key: the fixed prefix keeps probe traffic out of
    /// unrelated key space, the v4 UUID keeps cycles from colliding with
    /// each other or with external writers.
    fn generate_key(&self) -> String {
        format!("{}{}", self.key_prefix, Uuid::new_v4().simple())
    }

    /// Fixed-size random hex payload, independent of the key.
    fn generate_value(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.value_len)
            .map(|_| HEX_CHARS[rng.gen_range(0..HEX_CHARS.len())] as char)
            .collect()
    }
}
