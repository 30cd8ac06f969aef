//! # talkbox-core: fixed-point cross-synthesis vocoder engine
//!
//! A real-time "talk-box" effect operating entirely in 32-bit fixed-point
//! arithmetic. Two synchronous mono streams go in: a **carrier** (synth or
//! other excitation) and a **modulator** (a voice). The engine continuously
//! estimates a short-term all-pole model of the modulator's spectral
//! envelope and filters the carrier through it, so the carrier appears to
//! speak.
//!
//! The work is split across two threads. The audio thread calls
//! [`TalkBox::process`] per sample (or [`TalkBox::process_frame`] per
//! frame); it never allocates and blocks only on a short coefficient lock.
//! A worker thread calls [`LpcAnalyzer::calculate_lpc_coefficients`] in a
//! loop; every 512-sample block it re-runs the analysis chain (pre-emphasis,
//! envelope gating, autocorrelation, Levinson-Durbin) and publishes a fresh
//! coefficient vector.
//!
//! ## Usage
//!
//! ```rust
//! use talkbox_core::TalkBox;
//!
//! let (mut talkbox, mut analyzer) = TalkBox::new(48_000.0)?;
//! talkbox.set_gate_level(0.02);
//! talkbox.set_smoothing_time(0.03);
//!
//! // audio thread: carrier in samples[0] (rewritten), modulator in samples[1]
//! let mut samples = [0i32; 2];
//! talkbox.process(&mut samples);
//!
//! // worker thread: returns immediately when no block is pending
//! analyzer.calculate_lpc_coefficients();
//! # Ok::<(), talkbox_core::TalkBoxError>(())
//! ```
//!
//! ## Conventions
//!
//! Samples are signed 32-bit in Q1.31: full scale is `±0x7FFF_FFFF` and
//! `0x7FFF_FFFF` is treated as unity. Prediction coefficients are Q8.24.
//! All per-sample and per-block signal processing is pure integer; floating
//! point appears only in parameter derivation (filter design, meters).
//!
//! ## Diagnostics
//!
//! When the analysis thread does not keep up with block production, the
//! stale block is dropped and a `tracing` warning ("timing error") is
//! emitted; [`TalkBox::overrun_count`] exposes the same event as a meter.
//! Hosts control routing by installing their own `tracing` subscriber, or
//! call [`init`] for a plain stderr logger.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod math;
pub mod types;

pub use engine::{LpcAnalyzer, TalkBox};
pub use error::{Result, TalkBoxError};

/// Version of the engine library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Installs a default `tracing` subscriber for the engine's diagnostics.
///
/// Safe to call multiple times; later calls (or a subscriber installed by
/// the host) win. Hosts with their own telemetry should skip this and route
/// the `tracing` events themselves.
pub fn init() {
    let _ = tracing_subscriber::fmt::try_init();
    tracing::debug!("talkbox-core v{} initialized", VERSION);
}
