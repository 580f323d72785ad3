use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope `type` for playback state snapshots.
pub const UPDATE_TYPE: &str = "update";

/// Envelope `type` for heartbeat probes and replies.
pub const PING_TYPE: &str = "ping";

/// Top-level wire message wrapper.
///
/// All messages on the realtime channel, in both directions, are carried
/// in this envelope. Only recognized `type` values are unwrapped by the
/// facade; everything else is still visible to raw subscribers.
#[non_exhaustive]
#[derive(Debug, Clone, Deserialize, Serialize, Builder)]
pub struct Envelope {
    /// The message category (e.g. `update`, `ping`)
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Category-specific payload
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Try to extract the payload as a playback state snapshot.
    #[must_use]
    pub fn as_player_update(&self) -> Option<PlayerUpdate> {
        if self.msg_type == UPDATE_TYPE {
            serde_json::from_value(self.data.clone()).ok()
        } else {
            None
        }
    }
}

/// Full playback state snapshot carried by `update` envelopes.
///
/// The server sends a complete snapshot on every change (and one on
/// connect), so each update replaces any previously held state.
#[non_exhaustive]
#[derive(Debug, Clone, Default, Deserialize, Serialize, Builder)]
pub struct PlayerUpdate {
    /// Track currently being played, if any
    #[serde(default)]
    pub current_track: Option<Track>,
    /// Upcoming tracks in play order
    #[serde(default)]
    pub queue: Vec<QueueItem>,
    /// Whether playback is active
    #[serde(default)]
    pub is_playing: bool,
    /// Recently played tracks, most recent first
    #[serde(default)]
    pub history: Vec<Track>,
    /// Server-side state version, monotonically increasing per session
    #[serde(default)]
    pub version: u64,
    /// Snapshot timestamp in Unix milliseconds
    #[serde(default)]
    pub timestamp: i64,
}

/// A single playable track.
#[non_exhaustive]
#[derive(Debug, Clone, Deserialize, Serialize, Builder)]
pub struct Track {
    /// Track title
    pub title: String,
    /// Artist name
    pub artist: String,
    /// Thumbnail image URL
    #[serde(default)]
    pub thumbnail: String,
    /// Source URL
    pub url: String,
    /// User who queued the track, when known
    #[serde(default)]
    pub added_by: Option<User>,
}

/// Queue entry: a track plus its position.
#[non_exhaustive]
#[derive(Debug, Clone, Deserialize, Serialize, Builder)]
pub struct QueueItem {
    /// The queued track
    pub track: Track,
    /// Zero-based position in the queue
    pub position: usize,
    /// Whether this entry is the one currently playing
    #[serde(rename = "isCurrent", default)]
    pub is_current: bool,
}

/// User attribution for queued tracks.
#[non_exhaustive]
#[derive(Debug, Clone, Deserialize, Serialize, Builder)]
pub struct User {
    /// Opaque user id
    pub id: String,
    /// Display name
    pub name: String,
    /// Avatar image URL
    #[serde(default)]
    pub image: String,
}

/// Deserialize envelopes from a frame's byte slice.
///
/// Handles both single objects and arrays of envelopes. Returns an empty
/// vector for empty or whitespace-only frames (server keepalives).
pub fn parse_envelopes(bytes: &[u8]) -> crate::Result<Vec<Envelope>> {
    let trimmed = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(&[][..], |start| &bytes[start..]);

    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.first() == Some(&b'[') {
        Ok(serde_json::from_slice(trimmed)?)
    } else {
        let envelope: Envelope = serde_json::from_slice(trimmed)?;
        Ok(vec![envelope])
    }
}
