use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use super::error::WsError;

const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;
const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_millis(1000);
const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_millis(30_000);
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(30_000);

/// Callback invoked on connection lifecycle events.
pub type LifecycleCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback invoked when the connection observes a transport error.
pub type ErrorCallback = Arc<dyn Fn(&WsError) + Send + Sync>;

/// Configuration for a managed WebSocket connection.
///
/// Every field has a default; callers override only what they need via
/// the `with_*` methods and keep the rest.
#[non_exhaustive]
#[derive(Clone)]
pub struct Options {
    /// Maximum number of reconnection attempts before giving up
    pub max_reconnect_attempts: u32,
    /// Delay before the first reconnection attempt
    pub reconnect_base_delay: Duration,
    /// Upper bound on the delay between reconnection attempts
    pub max_reconnect_delay: Duration,
    /// Interval for idle-liveness probing. [`Duration::ZERO`] disables
    /// the heartbeat entirely.
    pub heartbeat_interval: Duration,
    /// Message sent as the liveness probe
    pub heartbeat_payload: Value,
    /// Invoked each time the connection is established
    pub on_open: Option<LifecycleCallback>,
    /// Invoked each time the connection is lost or closed
    pub on_close: Option<LifecycleCallback>,
    /// Invoked when the transport reports an error
    pub on_error: Option<ErrorCallback>,
    /// Enables verbose connection-lifecycle diagnostics
    pub debug: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            max_reconnect_delay: DEFAULT_MAX_RECONNECT_DELAY,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_payload: json!({"type": "ping"}),
            on_open: None,
            on_close: None,
            on_error: None,
            debug: false,
        }
    }
}

impl Options {
    /// Set the maximum number of reconnection attempts.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the delay before the first reconnection attempt.
    #[must_use]
    pub fn with_reconnect_base_delay(mut self, delay: Duration) -> Self {
        self.reconnect_base_delay = delay;
        self
    }

    /// Set the upper bound on reconnection delays.
    #[must_use]
    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Set the heartbeat interval. [`Duration::ZERO`] disables probing.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the message sent as the liveness probe.
    #[must_use]
    pub fn with_heartbeat_payload(mut self, payload: Value) -> Self {
        self.heartbeat_payload = payload;
        self
    }

    /// Set the callback invoked when the connection is established.
    #[must_use]
    pub fn with_on_open(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(callback));
        self
    }

    /// Set the callback invoked when the connection is lost or closed.
    #[must_use]
    pub fn with_on_close(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(callback));
        self
    }

    /// Set the callback invoked on transport errors.
    #[must_use]
    pub fn with_on_error(mut self, callback: impl Fn(&WsError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Enable or disable verbose diagnostics.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Whether the heartbeat monitor is active for these options.
    #[must_use]
    pub fn heartbeat_enabled(&self) -> bool {
        self.heartbeat_interval > Duration::ZERO
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("reconnect_base_delay", &self.reconnect_base_delay)
            .field("max_reconnect_delay", &self.max_reconnect_delay)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("heartbeat_payload", &self.heartbeat_payload)
            .field("on_open", &self.on_open.as_ref().map(|_| "Fn"))
            .field("on_close", &self.on_close.as_ref().map(|_| "Fn"))
            .field("on_error", &self.on_error.as_ref().map(|_| "Fn"))
            .field("debug", &self.debug)
            .finish()
    }
}
