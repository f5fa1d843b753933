//! TCP transport for a session.
//!
//! [`SessionLink`] runs its own small tokio runtime so the synchronous tick
//! loop can use it without being async itself. Connecting, reading and
//! writing all happen on that runtime; the caller sends frames and polls
//! [`TransportEvent`]s without ever blocking. State changes are broadcast via
//! a [`watch`] channel so any number of consumers can react without polling.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::framing::{FrameConfig, FrameError, read_text_frame, write_text_frame};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Attempting to establish a TCP connection.
    Connecting,
    /// TCP connection established, ready for communication.
    Connected,
    /// Connection lost or intentionally closed.
    Disconnected,
}

/// Observable connection state backed by a [`watch`] channel.
pub struct ConnectionStateWatch {
    tx: watch::Sender<ConnectionState>,
    rx: watch::Receiver<ConnectionState>,
}

impl Default for ConnectionStateWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStateWatch {
    /// Create a new watch initialized to [`ConnectionState::Disconnected`].
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx, rx }
    }

    /// Set the current connection state, notifying all subscribers.
    pub fn set(&self, state: ConnectionState) {
        let _ = self.tx.send(state);
    }

    /// Return a new subscriber receiver.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.rx.clone()
    }

    /// Return the current state without blocking.
    pub fn current(&self) -> ConnectionState {
        *self.rx.borrow()
    }
}

/// Something that happened on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is open.
    Opened,
    /// One inbound text frame.
    Frame(String),
    /// The connection failed. Always followed by [`TransportEvent::Closed`].
    Error(String),
    /// The connection is closed. No further events follow.
    Closed,
}

/// Errors raised by [`SessionLink`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The I/O runtime could not be started.
    #[error("failed to start network runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// The connection is already closed.
    #[error("connection closed")]
    Closed,
}

/// Handle to one server connection.
///
/// Created via [`SessionLink::connect`], which returns immediately; the
/// outcome arrives as [`TransportEvent::Opened`] or
/// [`TransportEvent::Error`]. Dropping the link closes the connection.
pub struct SessionLink {
    outbound: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    state: Arc<ConnectionStateWatch>,
    /// Sending `true` causes the connection task to exit.
    shutdown_tx: watch::Sender<bool>,
    runtime: Runtime,
}

impl SessionLink {
    /// Start connecting to `endpoint` (`host:port`).
    pub fn connect(endpoint: impl Into<String>, config: FrameConfig) -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("session-io")
            .enable_all()
            .build()?;

        let endpoint = endpoint.into();
        let state = Arc::new(ConnectionStateWatch::new());
        state.set(ConnectionState::Connecting);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task_state = Arc::clone(&state);
        runtime.spawn(async move {
            Self::run(
                endpoint,
                config,
                outbound_rx,
                event_tx,
                &task_state,
                shutdown_rx,
            )
            .await;
            task_state.set(ConnectionState::Disconnected);
        });

        Ok(Self {
            outbound: outbound_tx,
            events: event_rx,
            state,
            shutdown_tx,
            runtime,
        })
    }

    /// Queue one frame for sending.
    pub fn send(&self, frame: String) -> Result<(), TransportError> {
        self.outbound.send(frame).map_err(|_| TransportError::Closed)
    }

    /// Next pending event, if any.
    pub fn try_recv(&mut self) -> Option<TransportEvent> {
        self.events.try_recv().ok()
    }

    /// All pending events.
    pub fn drain(&mut self) -> Vec<TransportEvent> {
        let mut out = Vec::new();
        while let Some(event) = self.try_recv() {
            out.push(event);
        }
        out
    }

    /// Block up to `timeout` for the next event.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<TransportEvent> {
        let events = &mut self.events;
        self.runtime
            .block_on(async { tokio::time::timeout(timeout, events.recv()).await })
            .ok()
            .flatten()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.current()
    }

    /// Return the connection state watch.
    pub fn state_watch(&self) -> &Arc<ConnectionStateWatch> {
        &self.state
    }

    /// Close the connection. Transitions to
    /// [`ConnectionState::Disconnected`] immediately.
    pub fn disconnect(&self) {
        let _ = self.shutdown_tx.send(true);
        self.state.set(ConnectionState::Disconnected);
    }

    async fn run(
        endpoint: String,
        config: FrameConfig,
        outbound: mpsc::UnboundedReceiver<String>,
        events: mpsc::UnboundedSender<TransportEvent>,
        state: &ConnectionStateWatch,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let connected = tokio::select! {
            result = TcpStream::connect(endpoint.as_str()) => result,
            _ = shutdown_rx.changed() => return,
        };
        let stream = match connected.and_then(|s| s.set_nodelay(true).map(|()| s)) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to connect to {}: {}", endpoint, e);
                let _ = events.send(TransportEvent::Error(e.to_string()));
                let _ = events.send(TransportEvent::Closed);
                return;
            }
        };

        info!("Connected to {}", endpoint);
        state.set(ConnectionState::Connected);
        let _ = events.send(TransportEvent::Opened);

        let (reader, writer) = stream.into_split();
        let writer_config = config.clone();
        let writer_task = tokio::spawn(async move {
            Self::write_loop(writer, outbound, &writer_config).await
        });

        let read_result = tokio::select! {
            result = Self::read_loop(reader, &config, &events) => Some(result),
            _ = Self::wait_for_shutdown(&mut shutdown_rx) => None,
        };
        writer_task.abort();

        match read_result {
            Some(Err(FrameError::ConnectionClosed)) => {
                info!("Server closed the connection");
            }
            Some(Err(e)) => {
                warn!("Connection to {} failed: {}", endpoint, e);
                let _ = events.send(TransportEvent::Error(e.to_string()));
            }
            Some(Ok(())) | None => debug!("Connection to {} shut down", endpoint),
        }
        let _ = events.send(TransportEvent::Closed);
    }

    /// Forward inbound frames until the stream fails.
    async fn read_loop(
        mut reader: OwnedReadHalf,
        config: &FrameConfig,
        events: &mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<(), FrameError> {
        loop {
            let frame = read_text_frame(&mut reader, config).await?;
            if events.send(TransportEvent::Frame(frame)).is_err() {
                return Ok(());
            }
        }
    }

    /// Write queued frames until the queue closes or a write fails.
    async fn write_loop(
        mut writer: OwnedWriteHalf,
        mut outbound: mpsc::UnboundedReceiver<String>,
        config: &FrameConfig,
    ) {
        while let Some(frame) = outbound.recv().await {
            if let Err(e) = write_text_frame(&mut writer, &frame, config).await {
                match e {
                    FrameError::PayloadTooLarge { size, max } => {
                        warn!("Dropping outbound frame of {} bytes (max {})", size, max);
                    }
                    other => {
                        warn!("Write failed: {}", other);
                        return;
                    }
                }
            }
        }
    }

    async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
        while !*shutdown_rx.borrow() {
            if shutdown_rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Drop for SessionLink {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        self.state.set(ConnectionState::Disconnected);
    }
}
