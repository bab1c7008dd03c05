use std::sync::Arc;
use std::time::Duration;

use graphview::Snapshot;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::codec::{self, Inbound};
use crate::error::StreamError;
use crate::transport::{Connection, Endpoint, Incoming, Transport, WebSocketTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
    Error,
}

#[derive(Debug, Clone)]
pub enum StreamEvent {
    Connected,
    Snapshot(Arc<Snapshot>),
    Status { connected_clients: u64 },
    Disconnected { reason: String },
    Error { cause: String },
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Wait before reconnecting after the server closed the session.
    pub close_retry: Duration,
    /// Wait before reconnecting after a transport failure.
    pub error_retry: Duration,
    pub connect_timeout: Duration,
    /// Request path appended to `ws://host:port`.
    pub path: String,
    /// Events buffered per subscriber before it starts lagging.
    pub event_buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            close_retry: Duration::from_secs(3),
            error_retry: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            path: "/ws".to_string(),
            event_buffer: 64,
        }
    }
}

struct Session {
    endpoint: Endpoint,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Keeps a session with the snapshot server alive and republishes what it
/// receives as [`StreamEvent`]s.
///
/// The session runs on a spawned task, so [`StreamClient::connect`] must be
/// called from within a tokio runtime. Reconnection is unbounded until
/// [`StreamClient::close`].
pub struct StreamClient<T: Transport> {
    transport: Arc<T>,
    config: StreamConfig,
    events: broadcast::Sender<StreamEvent>,
    status: watch::Sender<ConnectionStatus>,
    session: Option<Session>,
}

impl StreamClient<WebSocketTransport> {
    pub fn websocket(config: StreamConfig) -> Self {
        Self::new(WebSocketTransport, config)
    }
}

impl<T: Transport> StreamClient<T> {
    pub fn new(transport: T, config: StreamConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            transport: Arc::new(transport),
            config,
            events,
            status,
            session: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn current_status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Start the session loop. Does nothing while a session is already running.
    pub fn connect(&mut self, endpoint: Endpoint) {
        if let Some(session) = &self.session {
            if !session.handle.is_finished() {
                debug!(endpoint = %session.endpoint, "already connected");
                return;
            }
        }
        let (shutdown, shutdown_rx) = watch::channel(false);
        let url = endpoint.url(&self.config.path);
        info!(%url, "starting stream session");
        let span = info_span!("stream", endpoint = %endpoint);
        let handle = tokio::spawn(
            run(
                self.transport.clone(),
                url,
                self.config.clone(),
                self.events.clone(),
                self.status.clone(),
                shutdown_rx,
            )
            .instrument(span),
        );
        self.session = Some(Session {
            endpoint,
            shutdown,
            handle,
        });
    }

    /// Close the session and cancel any pending reconnect.
    pub async fn close(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let _ = session.shutdown.send(true);
        if let Err(err) = session.handle.await {
            warn!(error = %err, "stream session task failed");
        }
        self.status.send_replace(ConnectionStatus::Disconnected);
        info!(endpoint = %session.endpoint, "stream closed");
    }
}

impl<T: Transport> Drop for StreamClient<T> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            let _ = session.shutdown.send(true);
            session.handle.abort();
        }
    }
}

enum SessionEnd {
    Shutdown,
    Closed(String),
    Failed(StreamError),
}

async fn run<T: Transport>(
    transport: Arc<T>,
    url: String,
    config: StreamConfig,
    events: broadcast::Sender<StreamEvent>,
    status: watch::Sender<ConnectionStatus>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt: u64 = 0;
    loop {
        attempt += 1;
        debug!(%url, attempt, "connecting");
        let connecting = tokio::time::timeout(config.connect_timeout, transport.connect(&url));
        let outcome = tokio::select! {
            _ = shutdown.changed() => None,
            res = connecting => Some(res),
        };
        let Some(outcome) = outcome else {
            break;
        };

        let end = match outcome {
            Ok(Ok(conn)) => session(conn, &events, &status, &mut shutdown).await,
            Ok(Err(err)) => SessionEnd::Failed(err),
            Err(_) => SessionEnd::Failed(StreamError::ConnectTimeout { url: url.clone() }),
        };
        let delay = match end {
            SessionEnd::Shutdown => break,
            SessionEnd::Closed(reason) => {
                info!(%reason, "stream disconnected");
                status.send_replace(ConnectionStatus::Disconnected);
                let _ = events.send(StreamEvent::Disconnected { reason });
                config.close_retry
            }
            SessionEnd::Failed(err) => {
                warn!(error = %err, attempt, "stream error");
                status.send_replace(ConnectionStatus::Error);
                let _ = events.send(StreamEvent::Error {
                    cause: err.to_string(),
                });
                config.error_retry
            }
        };

        info!(delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        let cancelled = tokio::select! {
            _ = shutdown.changed() => true,
            _ = tokio::time::sleep(delay) => false,
        };
        if cancelled {
            debug!("pending reconnect cancelled");
            break;
        }
    }
    status.send_replace(ConnectionStatus::Disconnected);
}

async fn session<C: Connection>(
    mut conn: C,
    events: &broadcast::Sender<StreamEvent>,
    status: &watch::Sender<ConnectionStatus>,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let hello = match codec::encode_request_data() {
        Ok(text) => text,
        Err(err) => return SessionEnd::Failed(err),
    };
    if let Err(err) = conn.send_text(hello).await {
        return SessionEnd::Failed(err);
    }
    status.send_replace(ConnectionStatus::Connected);
    let _ = events.send(StreamEvent::Connected);
    info!("stream connected");

    loop {
        let incoming = tokio::select! {
            _ = shutdown.changed() => None,
            msg = conn.recv() => Some(msg),
        };
        match incoming {
            None => {
                conn.close().await;
                return SessionEnd::Shutdown;
            }
            Some(Ok(Incoming::Text(text))) => dispatch(&text, events),
            Some(Ok(Incoming::Closed(reason))) => return SessionEnd::Closed(reason),
            Some(Err(err)) => return SessionEnd::Failed(err),
        }
    }
}

fn dispatch(text: &str, events: &broadcast::Sender<StreamEvent>) {
    match codec::decode(text) {
        Ok(Inbound::Snapshot(snapshot)) => {
            debug!(
                aps = snapshot.aps.len(),
                alerts = snapshot.alerts.len(),
                "snapshot received"
            );
            let _ = events.send(StreamEvent::Snapshot(Arc::new(snapshot)));
        }
        Ok(Inbound::Status(report)) => {
            let _ = events.send(StreamEvent::Status {
                connected_clients: report.clients,
            });
        }
        Ok(Inbound::Discarded { event }) => {
            warn!(%event, "discarded payload without aps field");
        }
        Ok(Inbound::Unknown { event }) => {
            debug!(%event, "ignoring unknown event");
        }
        Err(err) => {
            warn!(error = %err, "ignoring unreadable message");
        }
    }
}
