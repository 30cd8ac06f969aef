//! Fixed-point math kernels.
//!
//! Pure functions with no state: a signed leading-zero count and the
//! logarithm/exponential pair used for gain computation.

mod log_exp;

pub use log_exp::{
    exp_fixed, log_fixed, signed_leading_zeros, E_10LOG10, E_20LOG10, E_LOG, E_LOG10, E_LOG2,
    L_10LOG10, L_20LOG10, L_LOG, L_LOG10, L_LOG2,
};
