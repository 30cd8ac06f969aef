//! Fixed-point word types shared by the signal path.
//!
//! Samples, coefficients and intermediate values all travel as 32-bit words;
//! the Q-format of each value is stated where it is used. Products are
//! accumulated in 64 bits before shifting back down.

/// 32-bit signed fixed-point word.
pub type Word32 = i32;

/// 64-bit accumulator for products of [`Word32`]s.
pub type Word64 = i64;
