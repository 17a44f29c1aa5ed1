//! Reconnecting WebSocket transport.
//!
//! The transport task owns the socket and exchanges [`Event`]s with the
//! engine over two channels: outbound events in, [`TransportEvent`]s out.
//!
//! DESIGN
//! ======
//! Each connection attempt is bounded by the connect timeout. After a
//! failure or a drop the task waits a fixed delay and tries again, up to
//! the configured number of attempts, then reports [`ConnectionStatus::Offline`]
//! and exits. A successful connection resets the attempt count.
//!
//! Outbound events queued while disconnected are discarded when the next
//! connection opens; the engine re-sends its join on `Connected`, and the
//! next local edit carries the full document anyway.
//!
//! ERROR HANDLING
//! ==============
//! Inbound frames that fail to decode are logged and skipped. The socket
//! stays up.

#[cfg(test)]
#[path = "transport_test.rs"]
mod transport_test;

use std::time::Duration;

use frames::{Event, decode_event, encode_event};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;

const OUTBOUND_CAPACITY: usize = 256;
const EVENTS_CAPACITY: usize = 256;

/// Connectivity as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Connected,
    /// Dropped; a reconnect is pending.
    Disconnected,
    /// Reconnect attempts exhausted. Stays here until restarted.
    Offline,
}

/// What the transport reports to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Status(ConnectionStatus),
    Inbound(Event),
}

/// Errors produced by one connection attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket connect timed out after {0:?}")]
    Timeout(Duration),
}

/// Fixed-delay, bounded reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl ReconnectPolicy {
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self { attempts: config.reconnect_attempts, delay: config.reconnect_delay }
    }

    /// Delay before reconnect attempt number `attempt` (1-based), or `None`
    /// once attempts are exhausted.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        (attempt >= 1 && attempt <= self.attempts).then_some(self.delay)
    }
}

/// Channels and task handle for a running transport.
pub struct TransportHandle {
    pub outbound: mpsc::Sender<Event>,
    pub events: mpsc::Receiver<TransportEvent>,
    pub task: JoinHandle<()>,
}

/// Spawn the transport task for `url`.
#[must_use]
pub fn spawn_transport(url: String, config: &SyncConfig) -> TransportHandle {
    let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let (events_tx, events) = mpsc::channel(EVENTS_CAPACITY);
    let policy = ReconnectPolicy::from_config(config);
    let connect_timeout = config.connect_timeout;
    let task = tokio::spawn(run_transport(url, policy, connect_timeout, outbound_rx, events_tx));
    TransportHandle { outbound, events, task }
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum PumpEnd {
    /// The socket closed or errored; reconnect.
    Dropped,
    /// The engine went away; stop.
    Shutdown,
}

async fn run_transport(
    url: String,
    policy: ReconnectPolicy,
    connect_timeout: Duration,
    mut outbound_rx: mpsc::Receiver<Event>,
    events_tx: mpsc::Sender<TransportEvent>,
) {
    let mut failures = 0_u32;
    loop {
        if events_tx.send(TransportEvent::Status(ConnectionStatus::Connecting)).await.is_err() {
            return;
        }
        match connect(&url, connect_timeout).await {
            Ok(socket) => {
                failures = 0;
                let stale = drain(&mut outbound_rx);
                info!(%url, stale, "transport connected");
                if events_tx.send(TransportEvent::Status(ConnectionStatus::Connected)).await.is_err() {
                    return;
                }
                if let PumpEnd::Shutdown = pump(socket, &mut outbound_rx, &events_tx).await {
                    return;
                }
                warn!(%url, "transport disconnected");
            }
            Err(e) => warn!(%url, error = %e, "transport connect failed"),
        }

        if events_tx.send(TransportEvent::Status(ConnectionStatus::Disconnected)).await.is_err() {
            return;
        }
        failures += 1;
        let Some(delay) = policy.delay_before(failures) else {
            warn!(%url, attempts = policy.attempts, "reconnect attempts exhausted; offline");
            if events_tx.send(TransportEvent::Status(ConnectionStatus::Offline)).await.is_err() {
                debug!("engine gone before offline status");
            }
            return;
        };
        debug!(attempt = failures, delay_ms = delay.as_millis(), "reconnecting");
        tokio::time::sleep(delay).await;
    }
}

async fn connect(url: &str, timeout: Duration) -> Result<Socket, TransportError> {
    match tokio::time::timeout(timeout, connect_async(url)).await {
        Ok(Ok((socket, _))) => Ok(socket),
        Ok(Err(e)) => Err(TransportError::Connect(Box::new(e))),
        Err(_) => Err(TransportError::Timeout(timeout)),
    }
}

/// Discard outbound events queued while no socket was open.
fn drain(outbound_rx: &mut mpsc::Receiver<Event>) -> usize {
    let mut count = 0;
    while outbound_rx.try_recv().is_ok() {
        count += 1;
    }
    count
}

async fn pump(socket: Socket, outbound_rx: &mut mpsc::Receiver<Event>, events_tx: &mpsc::Sender<TransportEvent>) -> PumpEnd {
    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            out = outbound_rx.recv() => {
                let Some(event) = out else {
                    if let Err(e) = sink.close().await {
                        debug!(error = %e, "websocket close failed");
                    }
                    return PumpEnd::Shutdown;
                };
                let text = match encode_event(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(event = event.name(), error = %e, "outbound encode failed");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    warn!(error = %e, "websocket send failed");
                    return PumpEnd::Dropped;
                }
            }
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => match decode_event(text.as_str()) {
                    Ok(event) => {
                        if events_tx.send(TransportEvent::Inbound(event)).await.is_err() {
                            return PumpEnd::Shutdown;
                        }
                    }
                    Err(e) => warn!(error = %e, "inbound frame rejected"),
                },
                Some(Ok(Message::Close(_))) | None => return PumpEnd::Dropped,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "websocket receive failed");
                    return PumpEnd::Dropped;
                }
            },
        }
    }
}
