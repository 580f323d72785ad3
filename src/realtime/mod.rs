//! Realtime playback channel.
//!
//! This module provides the public facade over the generic WebSocket
//! infrastructure in [`crate::ws`]: it derives the channel endpoint for
//! a routing key, opens a self-healing connection, and decodes the
//! playback-state envelopes the service emits.
//!
//! # Example
//!
//! ```rust, no_run
//! use playback_client_sdk::realtime::Client;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Client::from_env()?;
//!
//!     let session = client.open("271828", |update| {
//!         println!("now playing: {:?}", update.current_track);
//!     })?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     session.close();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod types;

// Re-export commonly used types
pub use client::{Client, EnvelopeParser, Session};
pub use types::{Envelope, PlayerUpdate, QueueItem, Track, User};
