#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::{SinkExt as _, StreamExt as _};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use super::backoff;
use super::config::Options;
use super::dispatch::{Dispatcher, HandlerId};
use super::error::WsError;
use super::traits::MessageParser;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection has been attempted yet
    NotConnected,
    /// Attempting to connect
    Connecting,
    /// Successfully connected
    Open {
        /// When the connection was established
        since: Instant,
    },
    /// An intentional close is in progress
    Closing,
    /// Connection is closed; terminal once intentionally closed or the
    /// reconnect budget is exhausted
    Closed,
    /// A reconnect timer is pending. Takes precedence over the transport
    /// state until the timer fires.
    Reconnecting {
        /// Current reconnection attempt number, starting at 1
        attempt: u32,
    },
}

impl ConnectionState {
    /// Check if the connection is currently open.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

/// Manages WebSocket connection lifecycle, reconnection, and heartbeat.
///
/// This generic connection manager handles all WebSocket connection
/// concerns:
/// - Establishing and maintaining a connection to one endpoint
/// - Automatic reconnection with bounded, jittered exponential backoff
/// - Idle-liveness probing (a heartbeat probe is sent only when no
///   traffic has been observed for a full interval)
/// - Decoding inbound frames and fanning them out to subscribers
/// - Terminal, idempotent close
///
/// # Type Parameters
///
/// - `M`: Message type produced by the parser
/// - `P`: Parser type that implements [`MessageParser<M>`]
///
/// All state transitions are driven by a single spawned task that owns
/// the transport; callers interact through channels and never block.
#[derive(Clone)]
pub struct ConnectionManager<M, P>
where
    M: DeserializeOwned + Debug + Send + 'static,
    P: MessageParser<M>,
{
    /// Watch channel sender for state changes
    state_tx: watch::Sender<ConnectionState>,
    /// Watch channel receiver for state changes
    state_rx: watch::Receiver<ConnectionState>,
    /// Sender channel for outgoing messages
    sender_tx: mpsc::UnboundedSender<String>,
    /// Subscriber registry for decoded inbound messages
    dispatcher: Arc<Dispatcher<M>>,
    /// Cancelled exactly once, by an intentional close
    shutdown: CancellationToken,
    /// Set once [`Self::close`] has run
    closed: Arc<AtomicBool>,
    /// Verbose diagnostics flag, copied out of the options
    debug: bool,
    /// Phantom data for unused type parameters
    _phantom: PhantomData<P>,
}

impl<M, P> ConnectionManager<M, P>
where
    M: DeserializeOwned + Debug + Send + 'static,
    P: MessageParser<M>,
{
    /// Create a new connection manager and start the connection loop.
    ///
    /// The `parser` is used to decode incoming WebSocket frames. The
    /// connection loop runs in a background task and handles
    /// reconnection according to `options`; a failure to establish the
    /// very first connection is retried exactly like a later disconnect.
    #[must_use]
    pub fn new(endpoint: String, options: Options, parser: P) -> Self {
        let (sender_tx, sender_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::NotConnected);
        let dispatcher = Arc::new(Dispatcher::default());
        let shutdown = CancellationToken::new();
        let closed = Arc::new(AtomicBool::new(false));
        let debug = options.debug;

        tokio::spawn(Self::connection_loop(
            endpoint,
            options,
            sender_rx,
            Arc::clone(&dispatcher),
            parser,
            state_tx.clone(),
            shutdown.clone(),
            Arc::clone(&closed),
        ));

        Self {
            state_tx,
            state_rx,
            sender_tx,
            dispatcher,
            shutdown,
            closed,
            debug,
            _phantom: PhantomData,
        }
    }

    /// Main connection loop with automatic reconnection.
    #[expect(
        clippy::too_many_arguments,
        reason = "The loop exclusively owns every mutable piece of connection state"
    )]
    async fn connection_loop(
        endpoint: String,
        options: Options,
        mut sender_rx: mpsc::UnboundedReceiver<String>,
        dispatcher: Arc<Dispatcher<M>>,
        parser: P,
        state_tx: watch::Sender<ConnectionState>,
        shutdown: CancellationToken,
        closed: Arc<AtomicBool>,
    ) {
        let mut attempt = 0_u32;

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            Self::publish(&state_tx, &closed, ConnectionState::Connecting);
            if options.debug {
                tracing::debug!(%endpoint, "Opening WebSocket connection");
            }

            let connect = tokio::select! {
                () = shutdown.cancelled() => break,
                result = connect_async(&endpoint) => result,
            };

            match connect {
                Ok((ws_stream, _)) => {
                    attempt = 0;
                    Self::publish(
                        &state_tx,
                        &closed,
                        ConnectionState::Open {
                            since: Instant::now(),
                        },
                    );
                    if options.debug {
                        tracing::debug!(%endpoint, "WebSocket connection established");
                    }
                    if let Some(on_open) = &options.on_open {
                        on_open();
                    }

                    if let Err(e) =
                        Self::run_connection(ws_stream, &mut sender_rx, &dispatcher, &options, &parser, &shutdown)
                            .await
                    {
                        tracing::warn!(%endpoint, error = %e, "Connection lost");
                        if let Some(on_error) = &options.on_error {
                            on_error(&e);
                        }
                    }
                }
                Err(e) => {
                    // A connect failure is handled exactly like a
                    // post-open close: report, then retry with backoff.
                    let error = WsError::Connection(e);
                    tracing::warn!(%endpoint, error = %error, "Unable to connect");
                    if let Some(on_error) = &options.on_error {
                        on_error(&error);
                    }
                }
            }

            if shutdown.is_cancelled() {
                break;
            }

            Self::publish(&state_tx, &closed, ConnectionState::Closed);
            if let Some(on_close) = &options.on_close {
                on_close();
            }

            if attempt >= options.max_reconnect_attempts {
                let error = WsError::RetriesExhausted { attempts: attempt };
                tracing::warn!(
                    %endpoint,
                    max_attempts = options.max_reconnect_attempts,
                    "Reconnect budget exhausted; connection stays closed"
                );
                if let Some(on_error) = &options.on_error {
                    on_error(&error);
                }
                break;
            }

            // The counter is incremented before computing the delay, so
            // the first retry uses attempt = 1.
            attempt = attempt.saturating_add(1);
            let delay = backoff::next_delay(
                attempt,
                options.reconnect_base_delay,
                options.max_reconnect_delay,
            );
            if options.debug {
                tracing::debug!(attempt, ?delay, "Scheduling reconnect");
            }
            Self::publish(&state_tx, &closed, ConnectionState::Reconnecting { attempt });

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = sleep(delay) => {}
            }
        }
    }

    /// Handle an active WebSocket connection until it drops or the
    /// manager is closed.
    async fn run_connection(
        ws_stream: WsStream,
        sender_rx: &mut mpsc::UnboundedReceiver<String>,
        dispatcher: &Dispatcher<M>,
        options: &Options,
        parser: &P,
        shutdown: &CancellationToken,
    ) -> Result<(), WsError> {
        let (mut write, mut read) = ws_stream.split();

        // Liveness clock shared with the heartbeat task; refreshed on
        // every inbound frame, heartbeat replies included.
        let (traffic_tx, traffic_rx) = watch::channel(Instant::now());
        let (probe_tx, mut probe_rx) = mpsc::unbounded_channel::<()>();

        let heartbeat_handle = options.heartbeat_enabled().then(|| {
            let heartbeat_interval = options.heartbeat_interval;
            let debug = options.debug;
            tokio::spawn(async move {
                Self::heartbeat_loop(heartbeat_interval, traffic_rx, probe_tx, debug).await;
            })
        });

        let probe_payload = options.heartbeat_payload.to_string();

        let result = loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    // Intentional close: best-effort close frame.
                    let _ = write.send(Message::Close(None)).await;
                    break Ok(());
                }

                // Handle incoming frames
                message = read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            _ = traffic_tx.send(Instant::now());
                            match parser.parse(text.as_bytes()) {
                                Ok(messages) => {
                                    for message in messages {
                                        dispatcher.dispatch(&message);
                                    }
                                }
                                Err(e) => {
                                    tracing::warn!(%text, error = %e, "Dropping undecodable frame");
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break Err(WsError::ConnectionClosed),
                        Some(Ok(_)) => {
                            // Binary and control frames still prove liveness.
                            _ = traffic_tx.send(Instant::now());
                        }
                        Some(Err(e)) => break Err(WsError::Connection(e)),
                    }
                }

                // Handle outgoing messages from callers
                Some(text) = sender_rx.recv() => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        break Err(WsError::Connection(e));
                    }
                }

                // Handle probe requests from the heartbeat task
                Some(()) = probe_rx.recv() => {
                    if options.debug {
                        tracing::debug!("Sending heartbeat probe");
                    }
                    if let Err(e) = write.send(Message::Text(probe_payload.clone().into())).await {
                        break Err(WsError::Connection(e));
                    }
                }
            }
        };

        // The heartbeat must never outlive its connection.
        if let Some(handle) = heartbeat_handle {
            handle.abort();
        }

        result
    }

    /// Heartbeat loop that requests a probe when the connection has been
    /// silent for a full interval.
    async fn heartbeat_loop(
        heartbeat_interval: Duration,
        traffic_rx: watch::Receiver<Instant>,
        probe_tx: mpsc::UnboundedSender<()>,
        debug: bool,
    ) {
        let mut ticker = interval(heartbeat_interval);

        loop {
            ticker.tick().await;

            let last_seen = *traffic_rx.borrow();
            if last_seen.elapsed() > heartbeat_interval {
                if probe_tx.send(()).is_err() {
                    // Connection loop has terminated
                    break;
                }
            } else if debug {
                tracing::debug!("Recent traffic observed, skipping heartbeat probe");
            }
        }
    }

    /// Publish a state change unless the manager has been intentionally
    /// closed; [`Self::close`] owns the terminal `Closed` transition.
    fn publish(
        state_tx: &watch::Sender<ConnectionState>,
        closed: &AtomicBool,
        state: ConnectionState,
    ) {
        if !closed.load(Ordering::SeqCst) {
            _ = state_tx.send(state);
        }
    }

    /// Serialize a structured payload and send it over the connection.
    ///
    /// Returns `false` without side effects when the connection is not
    /// open or the payload cannot be serialized; callers must not assume
    /// a retry.
    pub fn send<R: Serialize>(&self, payload: &R) -> bool {
        match serde_json::to_string(payload) {
            Ok(json) => self.send_text(json),
            Err(e) => {
                tracing::warn!(error = %e, "Unable to serialize outgoing message");
                false
            }
        }
    }

    /// Send a raw text frame over the connection.
    ///
    /// Returns `false` when the connection is not in the open state.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        if !self.state_rx.borrow().is_open() {
            if self.debug {
                tracing::debug!("Not connected, dropping outgoing message");
            }
            return false;
        }
        self.sender_tx.send(text.into()).is_ok()
    }

    /// Get the current connection state.
    #[must_use]
    pub fn status(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Register a subscriber for decoded inbound messages.
    ///
    /// Subscribers are invoked in registration order; a panicking
    /// subscriber never affects the others or the connection.
    pub fn add_handler(&self, handler: impl Fn(&M) + Send + Sync + 'static) -> HandlerId {
        self.dispatcher.add(handler)
    }

    /// Remove a previously registered subscriber.
    pub fn remove_handler(&self, id: HandlerId) {
        self.dispatcher.remove(id)
    }

    /// Close the connection permanently.
    ///
    /// Cancels any pending reconnect and heartbeat timers, closes the
    /// transport if it is open or connecting, and discards all
    /// subscribers. Idempotent; the manager cannot be reconnected and
    /// must be re-created to connect again.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        _ = self.state_tx.send(ConnectionState::Closing);
        self.shutdown.cancel();
        self.dispatcher.clear();
        _ = self.state_tx.send(ConnectionState::Closed);
        if self.debug {
            tracing::debug!("Connection closed");
        }
    }

    /// Whether [`Self::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
