//! Error handling for the talk-box engine.
//!
//! The runtime surface is infallible: the audio and analysis entry points
//! always return normally, and parameter setters clamp out-of-range input
//! instead of rejecting it. Only construction can fail.

#![allow(missing_docs)]

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, TalkBoxError>;

/// Errors surfaced by the engine's fallible surface.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TalkBoxError {
    /// Sample rate unusable for filter design.
    #[error("invalid sample rate: {rate} Hz (must be finite and > 0)")]
    InvalidSampleRate { rate: f64 },
}
