//! Core WebSocket infrastructure.
//!
//! This module provides generic connection management that can be
//! specialized for different realtime endpoints via the parser trait.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: connection state machine with bounded,
//!   jittered reconnection and idle-liveness probing
//! - [`Dispatcher`]: ordered, failure-isolated subscriber fan-out
//! - [`MessageParser`]: trait for decoding incoming frames
//! - [`backoff`]: pure retry-delay policy
//!
//! # Example
//!
//! ```ignore
//! let connection = ConnectionManager::new(endpoint, Options::default(), EnvelopeParser);
//! let id = connection.add_handler(|envelope| println!("{envelope:?}"));
//! ```

pub mod backoff;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod traits;

pub use connection::{ConnectionManager, ConnectionState};
pub use dispatch::{Dispatcher, HandlerId};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use traits::*;
