#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod error;
pub mod realtime;
pub mod ws;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Environment variable naming the base HTTP(S) API origin of the
/// playback service. Required by [`realtime::Client::from_env`].
pub const API_URL_VAR: &str = "PLAYBACK_API_URL";

/// Environment variable enabling verbose connection diagnostics when set
/// to a truthy value (`1`, `true`, `yes`, `on`).
pub const DEBUG_VAR: &str = "PLAYBACK_DEBUG";
