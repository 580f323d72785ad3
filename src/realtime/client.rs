use url::Url;

use super::types::{Envelope, PlayerUpdate, UPDATE_TYPE, parse_envelopes};
use crate::error::Error;
use crate::ws::config::Options;
use crate::ws::connection::{ConnectionManager, ConnectionState};
use crate::ws::dispatch::HandlerId;
use crate::ws::traits::MessageParser;
use crate::{API_URL_VAR, DEBUG_VAR, Result};

/// Number of reconnect attempts the facade allows by default; more
/// patient than the bare connection default because playback sessions
/// are long-lived.
const FACADE_RECONNECT_ATTEMPTS: u32 = 15;

#[non_exhaustive]
#[derive(Clone)]
pub struct EnvelopeParser;

impl MessageParser<Envelope> for EnvelopeParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<Envelope>> {
        parse_envelopes(bytes)
    }
}

/// Entry point for realtime playback sessions.
///
/// A `Client` holds the validated base API origin; each call to
/// [`Client::open`] derives the WebSocket target for one routing key and
/// starts an independent, self-healing connection.
///
/// # Examples
///
/// ```rust, no_run
/// use playback_client_sdk::realtime::Client;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = Client::new("https://api.example.com")?;
///
///     let session = client.open("271828", |update| {
///         println!("queue length: {}", update.queue.len());
///     })?;
///
///     // ... later
///     session.close();
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    /// Validated base API origin
    base: Url,
    /// Default verbose-diagnostics flag for opened sessions
    debug: bool,
}

impl Client {
    /// Create a client for the given base HTTP(S) API origin.
    ///
    /// Fails fast with a configuration error, before any connection
    /// attempt, when the origin is empty, unparsable, or uses an
    /// unsupported scheme.
    pub fn new(base_origin: &str) -> Result<Self> {
        let trimmed = base_origin.trim();
        if trimmed.is_empty() {
            return Err(Error::configuration(
                "base API origin is not set; configure the playback API URL",
            ));
        }

        let base = Url::parse(trimmed).map_err(|e| {
            Error::configuration(format!("base API origin {trimmed:?} is not a valid URL: {e}"))
        })?;

        match base.scheme() {
            "http" | "https" | "ws" | "wss" => {}
            other => {
                return Err(Error::configuration(format!(
                    "base API origin has unsupported scheme {other:?}; expected http(s) or ws(s)"
                )));
            }
        }

        Ok(Self { base, debug: false })
    }

    /// Create a client from the process environment.
    ///
    /// Reads the base origin from [`API_URL_VAR`] and the verbose
    /// diagnostics flag from [`DEBUG_VAR`]. A missing origin is a fatal
    /// configuration error, raised here rather than on first use.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::var(API_URL_VAR).ok(), std::env::var(DEBUG_VAR).ok())
    }

    fn from_vars(origin: Option<String>, debug: Option<String>) -> Result<Self> {
        let origin = origin.ok_or_else(|| {
            Error::configuration(format!(
                "{API_URL_VAR} is not set; the playback API origin is required"
            ))
        })?;

        let client = Self::new(&origin)?;
        Ok(client.with_debug(debug.is_some_and(|v| is_truthy(&v))))
    }

    /// Enable or disable verbose diagnostics for sessions opened by this
    /// client.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Default connection options for sessions opened by this client.
    ///
    /// Callers tweak these and pass the result to [`Client::open_with`].
    #[must_use]
    pub fn options(&self) -> Options {
        Options::default()
            .with_max_reconnect_attempts(FACADE_RECONNECT_ATTEMPTS)
            .with_debug(self.debug)
    }

    /// Open a realtime session for `routing_key` with default options.
    ///
    /// `on_update` receives the decoded payload of every envelope whose
    /// type is `"update"`; all other envelope types are ignored here but
    /// remain visible through [`Session::subscribe_raw`].
    pub fn open(
        &self,
        routing_key: &str,
        on_update: impl Fn(PlayerUpdate) + Send + Sync + 'static,
    ) -> Result<Session> {
        self.open_with(routing_key, on_update, self.options())
    }

    /// Open a realtime session with explicit connection options.
    pub fn open_with(
        &self,
        routing_key: &str,
        on_update: impl Fn(PlayerUpdate) + Send + Sync + 'static,
        options: Options,
    ) -> Result<Session> {
        let endpoint = self.endpoint_for(routing_key)?;

        let connection = ConnectionManager::new(endpoint.clone(), options, EnvelopeParser);

        connection.add_handler(move |envelope: &Envelope| {
            if envelope.msg_type != UPDATE_TYPE {
                return;
            }
            match serde_json::from_value::<PlayerUpdate>(envelope.data.clone()) {
                Ok(update) => on_update(update),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping update envelope with malformed payload");
                }
            }
        });

        Ok(Session {
            connection,
            endpoint,
        })
    }

    /// Derive the WebSocket target for a routing key by upgrading the
    /// base origin's scheme and appending the channel path.
    fn endpoint_for(&self, routing_key: &str) -> Result<String> {
        if routing_key.is_empty() {
            return Err(Error::validation("routing key must not be empty"));
        }

        let mut target = self.base.clone();
        let scheme = match target.scheme() {
            "http" | "ws" => "ws",
            // Checked in the constructor; anything else is https/wss.
            _ => "wss",
        };
        target.set_scheme(scheme).map_err(|()| {
            Error::configuration(format!(
                "base API origin {} cannot address a WebSocket endpoint",
                self.base
            ))
        })?;

        target
            .path_segments_mut()
            .map_err(|()| {
                Error::configuration(format!(
                    "base API origin {} cannot carry a channel path",
                    self.base
                ))
            })?
            .pop_if_empty()
            .push("ws")
            .push(routing_key);

        Ok(target.to_string())
    }
}

/// A live realtime session for one routing key.
///
/// The session owns its connection: dropping the handle does not close
/// the channel; call [`Session::close`] for the terminal disconnect.
#[derive(Clone)]
pub struct Session {
    connection: ConnectionManager<Envelope, EnvelopeParser>,
    endpoint: String,
}

impl Session {
    /// The derived WebSocket target this session connects to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Current connection state.
    #[must_use]
    pub fn status(&self) -> ConnectionState {
        self.connection.status()
    }

    /// Serialize and send a structured payload.
    ///
    /// Fire-and-forget: returns `false` when the connection is not open,
    /// with no side effects and no retry.
    pub fn send<R: serde::Serialize>(&self, payload: &R) -> bool {
        self.connection.send(payload)
    }

    /// Send a raw text frame.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.connection.send_text(text)
    }

    /// Register a subscriber for every decoded envelope, regardless of
    /// type. Subscribers run in registration order.
    pub fn subscribe_raw(&self, handler: impl Fn(&Envelope) + Send + Sync + 'static) -> HandlerId {
        self.connection.add_handler(handler)
    }

    /// Remove a subscriber registered with [`Session::subscribe_raw`].
    pub fn unsubscribe(&self, id: HandlerId) {
        self.connection.remove_handler(id);
    }

    /// Close the session permanently.
    ///
    /// Idempotent. Cancels pending reconnect and heartbeat timers,
    /// closes the transport, and discards all subscribers; open a new
    /// session to connect again.
    pub fn close(&self) {
        self.connection.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("status", &self.connection.status())
            .finish_non_exhaustive()
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
