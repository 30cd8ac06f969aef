//! Block and per-sample signal processing.
//!
//! The analysis side of the engine runs [`autocorrelate`] and [`durbin`]
//! once per block; the synthesis side runs [`filter_one`] once per sample.
//! [`HighPass`] is the allpass-derived pre-emphasis applied to the voice
//! signal before autocorrelation.

mod autocorr;
mod durbin;
mod filter;

pub use autocorr::autocorrelate;
pub use durbin::durbin;
pub use filter::{filter_one, HighPass};
