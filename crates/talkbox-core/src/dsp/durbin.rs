//! Levinson-Durbin recursion on a normalized autocorrelation vector.

use crate::constants::Q31_ONE;
use crate::types::{Word32, Word64};

/// Solves the normal equations for `a.len()` prediction coefficients.
///
/// `acf` holds one more lag than there are coefficients, in Q1.31 with
/// `acf[0]` treated as unity. Coefficients come out in
/// Q(32-fractional_digits).fractional_digits, signed so that the synthesis
/// filter computes `x - sum of a[i] * mem[i]`. Every reflection coefficient
/// is clamped to `|k| <= k_max`, which keeps all poles inside the unit
/// circle. Returns the residual prediction error power in Q1.31, clamped to
/// `[0, 0x7FFF_FFFF]`.
pub fn durbin(acf: &[Word32], a: &mut [Word32], fractional_digits: u32, k_max: Word32) -> Word32 {
    let order = a.len();
    debug_assert_eq!(acf.len(), order + 1);

    let q = fractional_digits;
    let one = Q31_ONE as Word64;

    for c in a.iter_mut() {
        *c = 0;
    }

    let mut error: Word64 = acf[0] as Word64; // Q1.31

    for m in 1..=order {
        if error == 0 {
            break;
        }

        // acf[m] + sum of a[j] * acf[m-j], Q1.31
        // (Qx.q * Q1.31 >> q = Q1.31, accumulated in 64 bits)
        let mut acc: Word64 = acf[m] as Word64;
        for j in 1..m {
            acc += (a[j - 1] as Word64 * acf[m - j] as Word64) >> q;
        }
        let acc = acc.clamp(-(1 << 31), (1 << 31) - 1);

        // k = -acc / error in Q1.31: Q1.62 / Q1.31 = Q1.31
        let k = (-(acc << 31) / error).clamp(-(k_max as Word64), k_max as Word64);

        // a[j] += k * a[m-j]; pairwise so both sides use pre-update values
        let half = (m - 1) / 2;
        for j in 1..=half {
            let aj = a[j - 1] as Word64;
            let amj = a[m - j - 1] as Word64;
            a[j - 1] = (aj + ((k * amj) >> 31)) as Word32;
            a[m - j - 1] = (amj + ((k * aj) >> 31)) as Word32;
        }
        if (m - 1) & 1 == 1 {
            let mid = a[half] as Word64;
            a[half] = (mid + ((k * mid) >> 31)) as Word32;
        }

        // Q1.31 -> Qx.q
        a[m - 1] = (k >> (31 - q)) as Word32;

        // error *= 1 - k^2
        let k2 = (k * k) >> 31;
        error = ((error * (one - k2)) >> 31).clamp(0, one);
    }

    error as Word32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::K_MAX;
    use crate::dsp::{autocorrelate, filter_one};
    use proptest::prelude::*;

    fn q24(x: f64) -> i32 {
        (x * (1 << 24) as f64) as i32
    }

    fn q31(x: f64) -> i32 {
        (x * Q31_ONE as f64) as i32
    }

    #[test]
    fn test_first_order_process() {
        // acf of an AR(1) process with pole 0.5: r[k] = 0.5^k
        let acf = [Q31_ONE, q31(0.5), q31(0.25), q31(0.125), q31(0.0625)];
        let mut a = [0; 4];
        let error = durbin(&acf, &mut a, 24, K_MAX);

        // a[0] = -0.5, everything else vanishes, E = 1 - 0.25
        assert!((a[0] - q24(-0.5)).abs() <= 1 << 12, "a[0] = {}", a[0]);
        for (i, &c) in a.iter().enumerate().skip(1) {
            assert!(c.abs() <= 1 << 12, "a[{i}] = {c}");
        }
        assert!((error - q31(0.75)).abs() <= 1 << 19, "E = {error}");
    }

    #[test]
    fn test_identity_acf_gives_zero_predictor() {
        let mut acf = [0; 11];
        acf[0] = Q31_ONE;
        let mut a = [99; 10];
        let error = durbin(&acf, &mut a, 24, K_MAX);
        assert_eq!(a, [0; 10]);
        assert_eq!(error, Q31_ONE);
    }

    #[test]
    fn test_reflection_clamp_engages() {
        // |r[1]| == r[0] would demand |k| = 1; the clamp keeps it at k_max
        let acf = [Q31_ONE, Q31_ONE, Q31_ONE];
        let mut a = [0; 2];
        let error = durbin(&acf, &mut a, 24, K_MAX);
        assert!((0..=Q31_ONE).contains(&error));
        // a[0] carries -k_max brought down to Q8.24
        assert_eq!(a[0], ((-(K_MAX as i64)) >> 7) as i32);
    }

    #[test]
    fn test_error_decreases_with_order() {
        let mut signal: Vec<i32> = (0..512)
            .map(|n| {
                let t = n as f64 / 48_000.0;
                let s = (2.0 * std::f64::consts::PI * 500.0 * t).sin() * 0.4
                    + (2.0 * std::f64::consts::PI * 1700.0 * t).sin() * 0.3;
                (s * Q31_ONE as f64) as i32
            })
            .collect();
        let mut acf = [0; 13];
        autocorrelate(&mut acf, &mut signal);

        let mut a2 = [0; 2];
        let mut a12 = [0; 12];
        let e2 = durbin(&acf[..3], &mut a2, 24, K_MAX);
        let e12 = durbin(&acf, &mut a12, 24, K_MAX);
        assert!(e12 <= e2, "longer predictor must not do worse: {e12} vs {e2}");
    }

    /// Impulse response energy of the synthesis filter must die out when all
    /// reflection coefficients are clamped inside the unit circle.
    fn impulse_response_decays(a: &[i32]) -> bool {
        let mut mem = vec![0; a.len()];
        let mut first = 0i64;
        let mut last = 0i64;
        for n in 0..4096 {
            let x = if n == 0 { 1 << 24 } else { 0 };
            let y = filter_one(x, a, &mut mem, 24) as i64;
            if n < 1024 {
                first += y * y;
            } else if n >= 3072 {
                last += y * y;
            }
        }
        last < first.max(1)
    }

    #[test]
    fn test_stable_filter_from_speechlike_acf() {
        let mut signal: Vec<i32> = (0..512)
            .map(|n| {
                let t = n as f64 / 48_000.0;
                let s = (2.0 * std::f64::consts::PI * 200.0 * t).sin() * 0.3
                    + (2.0 * std::f64::consts::PI * 800.0 * t).sin() * 0.3
                    + (2.0 * std::f64::consts::PI * 1200.0 * t).sin() * 0.3;
                (s * Q31_ONE as f64) as i32
            })
            .collect();
        let mut acf = [0; 17];
        autocorrelate(&mut acf, &mut signal);
        let mut a = [0; 16];
        let error = durbin(&acf, &mut a, 24, K_MAX);
        assert!((0..=Q31_ONE).contains(&error));
        assert!(impulse_response_decays(&a));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_durbin_is_bounded_and_stable(samples in proptest::collection::vec(any::<i32>(), 64)) {
            let mut signal = samples;
            let mut acf = [0; 11];
            autocorrelate(&mut acf, &mut signal);
            let mut a = [0; 10];
            let error = durbin(&acf, &mut a, 24, K_MAX);
            prop_assert!((0..=Q31_ONE).contains(&error));
            prop_assert!(impulse_response_decays(&a));
        }
    }
}
