//! Core traits for generic WebSocket infrastructure.

use serde::de::DeserializeOwned;

/// Message parser trait for converting raw bytes to messages.
///
/// This abstracts the wire schema away from the connection machinery:
/// the connection owns framing, reconnection, and dispatch, while the
/// parser decides what a frame means.
///
/// # Example
///
/// ```ignore
/// pub struct EnvelopeParser;
///
/// impl MessageParser<Envelope> for EnvelopeParser {
///     fn parse(&self, bytes: &[u8]) -> crate::Result<Vec<Envelope>> {
///         parse_envelopes(bytes)
///     }
/// }
/// ```
pub trait MessageParser<M: DeserializeOwned>: Send + Sync + 'static {
    /// Parse incoming bytes into messages.
    ///
    /// May return an empty vec for frames that carry no messages (e.g.
    /// server keepalives). Handles both single objects and arrays.
    fn parse(&self, bytes: &[u8]) -> crate::Result<Vec<M>>;
}
