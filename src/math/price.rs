//! Bin-id to price conversion.
//!
//! Ported in spirit from `orca_whirlpools_core`'s tick/sqrt-price ladder
//! (`math/tick.rs`), but generalized to a plain binary-exponentiation loop:
//! Whirlpool's tick base is a fixed `1.0001`, so its per-bit multipliers
//! can be baked in as compile-time constants; a DLMM pool's `bin_step`
//! varies per pool, so the base has to be computed and squared at
//! runtime instead.

use ethnum::U256;

use crate::constants::{MAX_POW_EXPONENT, Q64_ONE};
use crate::error::{DlmmError, DlmmResult};

/// `price = (1 + bin_step / 10000) ^ id`, in Q64.64.
///
/// `bin_step` is in ten-thousandths (25 means 0.25%).
pub fn price_from_id(id: i32, bin_step: u16) -> DlmmResult<u128> {
    let bps = ((bin_step as u128) << 64) / 10_000;
    let base = Q64_ONE
        .checked_add(bps)
        .ok_or(DlmmError::LiquidityOverflow)?;
    pow_q64(base, id)
}

/// Binary exponentiation in Q64.64: `base^exp`, `base` itself Q64.64.
///
/// Uses the inversion trick: whenever `base >= 1<<64` the repeated
/// squaring below would overflow within a handful of bits, so the loop
/// instead squares `u128::MAX / base` and flips the final result.
pub fn pow_q64(mut base: u128, exp: i32) -> DlmmResult<u128> {
    if exp == 0 {
        return Ok(Q64_ONE);
    }
    if base == Q64_ONE {
        return Ok(Q64_ONE);
    }

    let mut invert = exp < 0;
    let abs_exp = exp.unsigned_abs();
    if abs_exp >= MAX_POW_EXPONENT {
        return Err(DlmmError::AmountOverflow);
    }

    if base >= Q64_ONE {
        base = u128::MAX / base;
        invert = !invert;
    }

    let mut result = Q64_ONE;
    for bit in 0..=18u32 {
        if abs_exp & (1 << bit) != 0 {
            result = mul_shift_64(result, base);
        }
        base = mul_shift_64(base, base);
    }

    if result == 0 {
        return Err(DlmmError::AmountOverflow);
    }

    if invert {
        result = u128::MAX / result;
    }

    Ok(result)
}

fn mul_shift_64(a: u128, b: u128) -> u128 {
    (U256::from(a) * U256::from(b) >> 64u32).as_u128()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pow_identity() {
        assert_eq!(pow_q64(Q64_ONE, 1).unwrap(), Q64_ONE);
        assert_eq!(pow_q64(Q64_ONE, 0).unwrap(), Q64_ONE);
    }

    #[test]
    fn price_at_step_25_id_0_is_one() {
        assert_eq!(price_from_id(0, 25).unwrap(), Q64_ONE);
    }

    #[test]
    fn price_rejects_out_of_range_exponent() {
        assert!(pow_q64(Q64_ONE + 1, i32::MAX).is_err());
    }

    #[test]
    fn inversion_identity_roundtrip() {
        let p_pos = price_from_id(1000, 25).unwrap();
        let p_neg = price_from_id(-1000, 25).unwrap();
        // p_pos * p_neg should be ~= 2^128 (i.e. ~= 1 in Q64.64 * Q64.64 cross terms)
        let product = U256::from(p_pos) * U256::from(p_neg);
        let one_sq = U256::from(Q64_ONE) * U256::from(Q64_ONE);
        let diff = if product > one_sq {
            product - one_sq
        } else {
            one_sq - product
        };
        // within a few ulp at the Q64.64 level
        assert!(diff < U256::from(1u128 << 20));
    }

    proptest! {
        #[test]
        fn price_is_monotonic(a in -443636i32..443636, step in 1u16..=1000u16) {
            let b = a.saturating_add(1).min(443636);
            prop_assume!(a != b);
            let pa = price_from_id(a, step).unwrap();
            let pb = price_from_id(b, step).unwrap();
            prop_assert!(pa <= pb);
        }

        #[test]
        fn pow_q64_never_panics(exp in -500000i32..500000, step in 1u16..=1000u16) {
            let bps = ((step as u128) << 64) / 10_000;
            let base = Q64_ONE + bps;
            let _ = pow_q64(base, exp);
        }
    }
}
