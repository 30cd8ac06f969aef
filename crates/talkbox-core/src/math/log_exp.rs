//! 32-bit fixed-point logarithm and exponential.
//!
//! [`log_fixed`] maps a Q1.31 magnitude to a Q16.16 logarithm and
//! [`exp_fixed`] maps a Q16.16 logarithm back to Q1.31. The base is selected
//! by a Q8.24 conversion coefficient; the paired `L_*` / `E_*` constants
//! below invert each other and must be used together for a round trip.
//!
//! Internally both functions work in base 2: the leading-zero count supplies
//! the integer part of the logarithm and a short Taylor series supplies the
//! fraction. The only failure mode is underflow, which returns 0.

use crate::constants::Q31_ONE;
use crate::types::{Word32, Word64};

/// y = 20*log10(x)
pub const L_20LOG10: Word32 = 0x0605_4609;
/// y = 10*log10(x)
pub const L_10LOG10: Word32 = 0x0302_A305;
/// y = log10(x)
pub const L_LOG10: Word32 = 0x004D_104D;
/// y = log(x)
pub const L_LOG: Word32 = 0x00B1_7218;
/// y = log2(x)
pub const L_LOG2: Word32 = 0x0100_0000;

/// y = 10^(x/20)
pub const E_20LOG10: Word32 = 0x002A_854B;
/// y = 10^(x/10)
pub const E_10LOG10: Word32 = 0x0055_0A97;
/// y = 10^x
pub const E_LOG10: Word32 = 0x0352_69E1;
/// y = e^x
pub const E_LOG: Word32 = 0x0171_5476;
/// y = 2^x
pub const E_LOG2: Word32 = 0x0100_0000;

/// Taylor coefficients of log2(1 + u) around u = 0, Q2.14.
const LOG_TAYLOR: [i16; 10] = [
    23637, -11819, 7879, -5909, 4727, -3940, 3377, -2955, 2626, -2364,
];

/// Taylor tail of exp, orders 3..5, Q0.16.
const EXP_TAYLOR: [i16; 3] = [10923, 2731, 546];

/// ln(2) in Q1.15.
const LN2_Q15: i16 = 0x58B9;

/// Number of leading zeros of `x` not counting the sign bit.
///
/// Zero reports 31 redundant sign bits; negative values report -1.
#[inline]
pub fn signed_leading_zeros(x: Word32) -> i32 {
    if x == 0 {
        31
    } else {
        (x as u32).leading_zeros() as i32 - 1
    }
}

/// Fixed-point logarithm: `x` in Q1.31 to `log(x) * conv` in Q16.16.
///
/// `conv` is one of the `L_*` constants (Q8.24) selecting the base. The
/// domain is `x > 0`; non-positive input yields the encoding of
/// `log(2^-32)`, the smallest magnitude the normalization can express.
pub fn log_fixed(x: Word32, conv: Word32) -> Word32 {
    if x <= 0 {
        return ((((-32 as Word64) << 16) * conv as Word64) >> 24) as Word32;
    }

    let shift = signed_leading_zeros(x);
    let mantissa = x << shift; // normalized into [0.5, 1.0)

    let mut out = -(shift << 16); // base-2 exponent in Q16.16

    // mantissa - 1 in Q1.15, in [-0.5, 0)
    let x1 = ((mantissa >> 16) as i16).wrapping_add(i16::MIN);

    let mut product = x1; // x1^n, Q1.15
    for &c in &LOG_TAYLOR {
        // Q1.15 * Q2.14 = Q3.29, >> 13 = Q16.16
        out += (product as Word32 * c as Word32) >> 13;
        // Q1.15 * Q1.15 = Q2.30, >> 15 = Q1.15
        product = ((product as Word32 * x1 as Word32) >> 15) as i16;
    }

    // Q16.16 * Q8.24 >> 24 = Q16.16
    ((out as Word64 * conv as Word64) >> 24) as Word32
}

/// Fixed-point exponential: `y` in Q16.16 to `base^y` in Q1.31.
///
/// `conv` is one of the `E_*` constants (Q8.24), the inverse of the `L_*`
/// constant the logarithm was taken with. An integer exponent below -31
/// underflows to 0; a positive exponent saturates at Q1.31 one.
pub fn exp_fixed(y: Word32, conv: Word32) -> Word32 {
    // Q16.16 * Q8.24 >> 24 = Q16.16, now in the base-2 domain
    let y = ((y as Word64 * conv as Word64) >> 24) as Word32;

    let hi = y >> 16; // integer part of the exponent
    let lo = (y & 0xFFFF) as u32; // fractional part, Q0.16

    if hi > 0 {
        return Q31_ONE;
    }
    let shift = -hi;
    if shift > 31 {
        return 0;
    }

    let x = (lo >> 1) as i16; // fraction in Q1.15

    // 2^x = e^(x*ln2), seeded with 1 + x' + x'^2/2 where x' = x*ln2
    let mut out = Q31_ONE as u32; // 1.0
    let t = x as Word32 * LN2_Q15 as Word32; // Q1.15 * Q1.15 = Q2.30
    out = out.wrapping_add((t << 1) as u32); // + x' in Q1.31
    let xp = (t >> 15) as i16; // x' in Q1.15
    let t = xp as Word32 * xp as Word32; // x'^2 in Q2.30
    out = out.wrapping_add(t as u32); // + x'^2/2 in Q1.31
    let mut product = (t >> 15) as i16; // x'^2 in Q1.15

    for &c in &EXP_TAYLOR {
        // x'^n, Q1.15
        product = ((product as Word32 * xp as Word32) >> 15) as i16;
        // Q1.15 * Q0.16 = Q1.31
        out = out.wrapping_add((product as Word32 * c as Word32) as u32);
    }

    // apply the integer exponent
    let out = out >> shift;
    if out > Q31_ONE as u32 {
        Q31_ONE
    } else {
        out as Word32
    }
}
