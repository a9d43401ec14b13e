//! Push-stream connection lifecycle: connect, detect close, reconnect, teardown.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::SyncError;
use crate::event_log::EventLevel;

use super::transport::{Connector, FrameSink, Transport};

/// Whether live data can currently be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConnectionState {
    #[default]
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ConnectionState {
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            _ => Self::Disconnected,
        }
    }

    #[inline]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything the connection manager reports, in transport order.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    State(ConnectionState),
    Notice { message: String, level: EventLevel },
    Frame(String),
}

/// Owns the single push-stream connection.
///
/// Callers only see lifecycle (`connect`, `teardown`, `state`) and the
/// send/receive contracts; the raw transport never leaves the connection task.
pub struct ConnectionManager {
    url: String,
    connector: Arc<dyn Connector>,
    reconnect_delay: Duration,
    state: Arc<AtomicU8>,
    event_sender: mpsc::Sender<LinkEvent>,
    command_sender: mpsc::Sender<String>,
    command_receiver: Option<mpsc::Receiver<String>>,
    wake: Arc<Notify>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    pub fn new(
        url: impl Into<String>,
        connector: Arc<dyn Connector>,
        reconnect_delay: Duration,
        event_sender: mpsc::Sender<LinkEvent>,
        command_capacity: usize,
    ) -> Self {
        let (command_sender, command_receiver) = mpsc::channel(command_capacity.max(1));

        Self {
            url: url.into(),
            connector,
            reconnect_delay,
            state: Arc::new(AtomicU8::new(ConnectionState::Disconnected.as_u8())),
            event_sender,
            command_sender,
            command_receiver: Some(command_receiver),
            wake: Arc::new(Notify::new()),
            shutdown: CancellationToken::new(),
            task: None,
        }
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub fn is_torn_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Establish the connection unless already Connected or Connecting.
    ///
    /// While a reconnect is pending this attempts immediately instead of
    /// waiting out the delay. Never fails from the caller's perspective:
    /// an unusable URL is reported as an error notice and leaves the
    /// manager Disconnected.
    pub fn connect(&mut self) {
        if self.is_torn_down() {
            debug!("connect() after teardown ignored");
            return;
        }

        match self.state() {
            ConnectionState::Connected | ConnectionState::Connecting => return,
            ConnectionState::Disconnected => {}
        }

        if let Some(task) = &self.task {
            if !task.is_finished() {
                // Reconnect pending: cut the wait short
                self.wake.notify_one();
                return;
            }
        }

        let url = match parse_stream_url(&self.url) {
            Ok(url) => url,
            Err(e) => {
                error!("Invalid stream URL {}: {}", self.url, e);
                let notice = LinkEvent::Notice {
                    message: format!("Failed to connect to market stream: {}", e),
                    level: EventLevel::Error,
                };
                if let Err(e) = self.event_sender.try_send(notice) {
                    warn!("Connect failure notice not delivered: {}", e);
                }
                return;
            }
        };

        let Some(commands) = self.command_receiver.take() else {
            // The previous task ended because the event consumer went away
            debug!("Connection task already consumed its command channel");
            return;
        };

        self.state
            .store(ConnectionState::Connecting.as_u8(), Ordering::Relaxed);

        let link = Link {
            url,
            connector: Arc::clone(&self.connector),
            reconnect_delay: self.reconnect_delay,
            state: Arc::clone(&self.state),
            events: self.event_sender.clone(),
            commands,
            wake: Arc::clone(&self.wake),
            shutdown: self.shutdown.clone(),
        };

        self.task = Some(tokio::spawn(link.run()));
    }

    /// Queue an outbound text frame for the live connection.
    pub async fn send(&self, payload: String) -> Result<(), SyncError> {
        self.command_sender
            .send(payload)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }

    /// Cancel any pending reconnect, close an open connection and wait for the
    /// connection task to finish. No further attempts happen afterwards.
    pub async fn teardown(&mut self) {
        self.shutdown.cancel();

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Connection task ended abnormally: {}", e);
            }
        }

        self.state
            .store(ConnectionState::Disconnected.as_u8(), Ordering::Relaxed);
        info!("Connection manager torn down");
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// How a live session ended.
enum SessionEnd {
    Closed,
    Shutdown,
    ConsumerGone,
}

/// State moved into the connection task.
struct Link {
    url: Url,
    connector: Arc<dyn Connector>,
    reconnect_delay: Duration,
    state: Arc<AtomicU8>,
    events: mpsc::Sender<LinkEvent>,
    commands: mpsc::Receiver<String>,
    wake: Arc<Notify>,
    shutdown: CancellationToken,
}

impl Link {
    // Runs until teardown or until nobody consumes events anymore.
    async fn run(mut self) {
        loop {
            if !self.set_state(ConnectionState::Connecting).await {
                return;
            }
            info!("Connecting to {}...", self.url);

            let attempt = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    self.store_state(ConnectionState::Disconnected);
                    return;
                }
                attempt = self.connector.connect(&self.url) => attempt,
            };

            match attempt {
                Ok(transport) => {
                    info!("Connected to market stream");
                    if !self.set_state(ConnectionState::Connected).await
                        || !self
                            .notice("Connected to market stream", EventLevel::Success)
                            .await
                    {
                        return;
                    }

                    match self.session(transport).await {
                        SessionEnd::Closed => {}
                        SessionEnd::Shutdown | SessionEnd::ConsumerGone => {
                            self.store_state(ConnectionState::Disconnected);
                            return;
                        }
                    }
                }
                Err(e) => {
                    error!("Connection failed: {}", e);
                    if !self
                        .notice(format!("Stream error: {}", e), EventLevel::Error)
                        .await
                    {
                        return;
                    }
                }
            }

            // Exactly one reconnect attempt per closure
            if !self.set_state(ConnectionState::Disconnected).await {
                return;
            }
            let delay_secs = self.reconnect_delay.as_secs_f64();
            warn!("Disconnected, reconnecting in {:.1}s", delay_secs);
            if !self
                .notice(
                    format!(
                        "Disconnected from market stream - reconnecting in {}s...",
                        format_delay(self.reconnect_delay)
                    ),
                    EventLevel::Warn,
                )
                .await
            {
                return;
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = sleep(self.reconnect_delay) => {}
                _ = self.wake.notified() => debug!("Reconnect requested early"),
            }
        }
    }

    async fn session(&mut self, transport: Transport) -> SessionEnd {
        let Transport {
            mut frames,
            mut sink,
        } = transport;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    if let Err(e) = sink.close().await {
                        debug!("Close on teardown failed: {}", e);
                    }
                    return SessionEnd::Shutdown;
                }
                frame = frames.next() => {
                    match frame {
                        Some(Ok(text)) => {
                            if !self.emit(LinkEvent::Frame(text)).await {
                                return self.abandon(sink).await;
                            }
                        }
                        Some(Err(e)) => {
                            error!("WebSocket error: {}", e);
                            if !self.notice(format!("Stream error: {}", e), EventLevel::Error).await {
                                return self.abandon(sink).await;
                            }
                            return SessionEnd::Closed;
                        }
                        None => {
                            warn!("Stream ended unexpectedly");
                            return SessionEnd::Closed;
                        }
                    }
                }
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(payload) => {
                            if let Err(e) = sink.send(payload).await {
                                error!("Failed to send frame: {}", e);
                                return SessionEnd::Closed;
                            }
                        }
                        None => {
                            info!("Command channel closed, shutting down...");
                            return SessionEnd::Shutdown;
                        }
                    }
                }
            }
        }
    }

    fn store_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::Relaxed);
    }

    /// Deliver one event, giving up on teardown or once the consumer is gone.
    /// A full channel never blocks teardown.
    async fn emit(&self, event: LinkEvent) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => false,
            sent = self.events.send(event) => sent.is_ok(),
        }
    }

    // Emit failed mid-session: close the sink and report why.
    async fn abandon(&self, mut sink: FrameSink) -> SessionEnd {
        if let Err(e) = sink.close().await {
            debug!("Close after abandoned session failed: {}", e);
        }
        if self.shutdown.is_cancelled() {
            SessionEnd::Shutdown
        } else {
            debug!("Event consumer dropped, stopping link");
            SessionEnd::ConsumerGone
        }
    }

    async fn set_state(&self, state: ConnectionState) -> bool {
        self.store_state(state);
        self.emit(LinkEvent::State(state)).await
    }

    async fn notice(&self, message: impl Into<String>, level: EventLevel) -> bool {
        self.emit(LinkEvent::Notice {
            message: message.into(),
            level,
        })
        .await
    }
}

fn parse_stream_url(raw: &str) -> Result<Url, SyncError> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(SyncError::ConnectionError(format!(
            "unsupported stream URL scheme '{}'",
            other
        ))),
    }
}

fn format_delay(delay: Duration) -> String {
    if delay.subsec_millis() == 0 {
        delay.as_secs().to_string()
    } else {
        format!("{:.1}", delay.as_secs_f64())
    }
}
