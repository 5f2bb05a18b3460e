//! Sentinel-backed store client.
//!
//! Consumes the discovery tier the way any store client does: asks each
//! discovery node in order for the current master of the configured group,
//! connects, authenticates, runs a ready-check, and listens for
//! `+switch-master` announcements. Quorum bookkeeping, failure voting and
//! promotion all stay on the sentinel side.

use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::DiscoveryConfig;

use super::resp::{self, ParseError, Reply};
use super::{MasterAddr, StoreClient, StoreError, StoreEvent};

const EVENT_CHANNEL_CAPACITY: usize = 64;
const SWITCH_CHANNEL: &str = "+switch-master";

/// One RESP session over TCP.
struct Session {
    stream: TcpStream,
    buf: BytesMut,
}

impl Session {
    async fn open(addr: &str, connect_timeout: Duration) -> Result<Self, StoreError> {
        let stream = time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| StoreError::Timeout(connect_timeout))??;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            buf: BytesMut::with_capacity(4096),
        })
    }

    async fn command(&mut self, args: &[&str]) -> Result<Reply, StoreError> {
        let mut out = BytesMut::new();
        resp::encode_command(args, &mut out);
        self.stream.write_all(&out).await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<Reply, StoreError> {
        loop {
            match resp::parse_reply(&self.buf) {
                Ok((reply, consumed)) => {
                    let _ = self.buf.split_to(consumed);
                    return Ok(reply);
                }
                Err(ParseError::Incomplete) => {
                    let n = self.stream.read_buf(&mut self.buf).await?;
                    if n == 0 {
                        return Err(StoreError::Io(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "connection closed by peer",
                        )));
                    }
                }
                Err(ParseError::Invalid(detail)) => {
                    return Err(StoreError::Protocol(detail));
                }
            }
        }
    }
}

struct Inner {
    discovery: DiscoveryConfig,
    connect_timeout: Duration,
    command_timeout: Duration,
    session: Mutex<Option<Session>>,
    master: StdMutex<Option<MasterAddr>>,
    watcher: StdMutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Inner {
    fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut watcher) = self.watcher.lock() {
            if let Some(handle) = watcher.take() {
                handle.abort();
            }
        }
    }
}

/// Sentinel-backed [`StoreClient`].
///
/// Cheap to clone; clones share the command session and the event feed.
#[derive(Clone)]
pub struct SentinelClient {
    inner: Arc<Inner>,
}

impl SentinelClient {
    pub fn new(discovery: DiscoveryConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let connect_timeout = Duration::from_millis(discovery.connect_timeout_ms);
        let command_timeout = Duration::from_millis(discovery.command_timeout_ms);
        Self {
            inner: Arc::new(Inner {
                discovery,
                connect_timeout,
                command_timeout,
                session: Mutex::new(None),
                master: StdMutex::new(None),
                watcher: StdMutex::new(None),
                events,
            }),
        }
    }

    /// The master address the client currently believes in.
    pub fn current_master(&self) -> Option<MasterAddr> {
        self.inner
            .master
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Ask each discovery node in order for the current master. The first
    /// node that answers wins; its address is kept for the switch watcher.
    async fn discover(inner: &Inner) -> Result<(MasterAddr, String), StoreError> {
        let mut last_error = String::from("no discovery nodes configured");
        for node in &inner.discovery.nodes {
            let mut session = match Session::open(node, inner.connect_timeout).await {
                Ok(session) => session,
                Err(e) => {
                    tracing::debug!(node = %node, error = %e, "Discovery node unreachable");
                    last_error = e.to_string();
                    continue;
                }
            };
            let reply = time::timeout(
                inner.command_timeout,
                session.command(&[
                    "SENTINEL",
                    "get-master-addr-by-name",
                    inner.discovery.master_name.as_str(),
                ]),
            )
            .await;
            match reply {
                Ok(Ok(Reply::Array(items))) if items.len() == 2 => {
                    let host = items[0].as_utf8().map(str::to_owned);
                    let port = items[1].as_utf8().and_then(|p| p.parse::<u16>().ok());
                    match (host, port) {
                        (Some(host), Some(port)) => {
                            return Ok((MasterAddr { host, port }, node.clone()));
                        }
                        _ => last_error = format!("malformed master address from {}", node),
                    }
                }
                Ok(Ok(Reply::Null)) => {
                    last_error = format!(
                        "group {} unknown to {}",
                        inner.discovery.master_name, node
                    );
                }
                Ok(Ok(other)) => {
                    last_error = format!("unexpected discovery reply from {}: {:?}", node, other);
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => last_error = format!("discovery query to {} timed out", node),
            }
            tracing::debug!(node = %node, detail = %last_error, "Discovery attempt failed");
        }
        Err(StoreError::Discovery {
            group: inner.discovery.master_name.clone(),
            detail: last_error,
        })
    }

    async fn establish_session(&self) -> Result<(), StoreError> {
        let inner = &*self.inner;
        let (addr, discovery_node) = Self::discover(inner).await?;

        // A re-discovery that resolves elsewhere is a topology change.
        let previous = inner
            .master
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(addr.clone());
        if let Some(previous) = previous {
            if previous != addr {
                inner.emit(StoreEvent::MasterSwitched {
                    previous,
                    current: addr.clone(),
                });
            }
        }

        let mut session = Session::open(&addr.to_string(), inner.connect_timeout).await?;
        inner.emit(StoreEvent::Connected);

        if let Some(password) = &inner.discovery.password {
            match bounded(
                inner.command_timeout,
                session.command(&["AUTH", password.as_str()]),
            )
            .await?
            {
                Reply::Simple(_) => {}
                Reply::Error(message) => return Err(StoreError::Server(message)),
                other => {
                    return Err(StoreError::Protocol(format!(
                        "unexpected AUTH reply: {:?}",
                        other
                    )))
                }
            }
        }

        // Ready-check: the master must answer before probes start.
        match bounded(inner.command_timeout, session.command(&["PING"])).await? {
            Reply::Simple(pong) if pong == "PONG" => {}
            Reply::Error(message) => return Err(StoreError::Server(message)),
            other => {
                return Err(StoreError::Protocol(format!(
                    "unexpected PING reply: {:?}",
                    other
                )))
            }
        }

        *inner.session.lock().await = Some(session);
        tracing::debug!(master = %addr, via = %discovery_node, "Master session established");
        inner.emit(StoreEvent::Ready);

        self.spawn_switch_watcher(discovery_node);
        Ok(())
    }

    /// (Re)start the announcement watcher against the discovery node that
    /// answered.
    fn spawn_switch_watcher(&self, node: String) {
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            if let Err(e) = watch_switch_channel(weak, &node).await {
                tracing::debug!(node = %node, error = %e, "Switch watcher stopped");
            }
        });
        let mut watcher = self
            .inner
            .watcher
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(old) = watcher.replace(handle) {
            old.abort();
        }
    }

    async fn command(&self, args: &[&str]) -> Result<Reply, StoreError> {
        let inner = &*self.inner;
        let mut guard = inner.session.lock().await;
        let session = guard.as_mut().ok_or(StoreError::NotConnected)?;

        let result = match time::timeout(inner.command_timeout, session.command(args)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(inner.command_timeout)),
        };
        match result {
            // A server-side error leaves the session usable.
            Ok(Reply::Error(message)) => Err(StoreError::Server(message)),
            Ok(reply) => Ok(reply),
            Err(e) => {
                // Session state is unknown after an i/o failure; drop it.
                guard.take();
                drop(guard);
                inner.emit(StoreEvent::Error {
                    detail: e.to_string(),
                });
                inner.emit(StoreEvent::Closed);
                Err(e)
            }
        }
    }
}

async fn bounded<F>(limit: Duration, fut: F) -> Result<Reply, StoreError>
where
    F: std::future::Future<Output = Result<Reply, StoreError>>,
{
    match time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

/// Listen on a discovery node's `+switch-master` channel and translate
/// announcements for our group into events. Exits when the client is
/// dropped or the subscription connection fails; a failed watcher is
/// restarted by the next `establish`.
async fn watch_switch_channel(inner: Weak<Inner>, node: &str) -> Result<(), StoreError> {
    let (connect_timeout, command_timeout, master_name) = match inner.upgrade() {
        Some(inner) => (
            inner.connect_timeout,
            inner.command_timeout,
            inner.discovery.master_name.clone(),
        ),
        None => return Ok(()),
    };

    let mut session = Session::open(node, connect_timeout).await?;
    bounded(command_timeout, session.command(&["SUBSCRIBE", SWITCH_CHANNEL])).await?;

    loop {
        let reply = session.read_reply().await?;
        let Some(inner) = inner.upgrade() else {
            return Ok(());
        };
        let Reply::Array(items) = reply else { continue };
        // Push message shape: ["message", channel, payload].
        if items.len() != 3 || items[0].as_utf8() != Some("message") {
            continue;
        }
        let Some(payload) = items[2].as_utf8() else {
            continue;
        };
        // Payload shape: "<group> <old-host> <old-port> <new-host> <new-port>".
        let fields: Vec<&str> = payload.split_whitespace().collect();
        if fields.len() != 5 || fields[0] != master_name {
            continue;
        }
        let (Ok(old_port), Ok(new_port)) = (fields[2].parse::<u16>(), fields[4].parse::<u16>())
        else {
            continue;
        };
        let previous = MasterAddr::new(fields[1], old_port);
        let current = MasterAddr::new(fields[3], new_port);
        tracing::debug!(previous = %previous, current = %current, "Switch announcement received");

        *inner.master.lock().unwrap_or_else(|e| e.into_inner()) = Some(current.clone());
        // Drop the command session so the in-flight cycle fails over.
        inner.session.lock().await.take();
        inner.emit(StoreEvent::MasterSwitched { previous, current });
        inner.emit(StoreEvent::Closed);
    }
}

#[async_trait]
impl StoreClient for SentinelClient {
    async fn establish(&self) -> Result<(), StoreError> {
        match self.establish_session().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.inner.emit(StoreEvent::Error {
                    detail: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let ttl_ms = ttl.as_millis().max(1).to_string();
        match self
            .command(&["SET", key, value, "PX", ttl_ms.as_str()])
            .await?
        {
            Reply::Simple(_) => Ok(()),
            other => Err(StoreError::Protocol(format!(
                "unexpected SET reply: {:?}",
                other
            ))),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.command(&["GET", key]).await? {
            Reply::Bulk(data) => String::from_utf8(data.to_vec())
                .map(Some)
                .map_err(|_| StoreError::Protocol("non-utf8 value".into())),
            Reply::Null => Ok(None),
            other => Err(StoreError::Protocol(format!(
                "unexpected GET reply: {:?}",
                other
            ))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.command(&["DEL", key]).await? {
            Reply::Integer(_) => Ok(()),
            other => Err(StoreError::Protocol(format!(
                "unexpected DEL reply: {:?}",
                other
            ))),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }
}
