//! Per-bin swap-amount, fee, and growth math. All values are Q64.64
//! unless noted. Rounding is contractual, not incidental: anything owed
//! to the pool rounds up, anything owed from the pool rounds down.
//!
//! Grounded on the widened-then-shifted-back multiply/divide shape of
//! `orca_whirlpools_core::math::token` (`try_get_amount_delta_a/b`,
//! `adjust_amount`/`inverse_adjust_amount`), generalized from that
//! crate's continuous-range liquidity math to DLMM's per-bin constant
//! price.

use ethnum::U256;

use crate::constants::{FEE_PRECISION, MAX_COMPOSITION_FEE_RATE, Q64_RESOLUTION};
use crate::error::{DlmmError, DlmmResult};

fn mul_u256(a: u128, b: u128) -> U256 {
    U256::from(a) * U256::from(b)
}

fn checked_u128(v: U256) -> DlmmResult<u128> {
    if v > U256::from(u128::MAX) {
        Err(DlmmError::AmountOverflow)
    } else {
        Ok(v.as_u128())
    }
}

fn div_ceil_u256(numerator: U256, denominator: U256) -> U256 {
    let (q, r) = (numerator / denominator, numerator % denominator);
    if r.is_zero() {
        q
    } else {
        q + 1
    }
}

/// `floor(amount_in * price / 2^64)` for a2b, `floor(amount_in * 2^64 /
/// price)` for b2a.
pub fn amount_out_from_in(amount_in: u64, price: u128, a2b: bool) -> DlmmResult<u64> {
    if price == 0 {
        return Err(DlmmError::PriceZero);
    }
    let out = if a2b {
        mul_u256(amount_in as u128, price) >> Q64_RESOLUTION
    } else {
        (U256::from(amount_in as u128) << Q64_RESOLUTION) / U256::from(price)
    };
    let out = checked_u128(out)?;
    u64::try_from(out).map_err(|_| DlmmError::AmountOverflow)
}

/// Ceiling-rounded inverse of [`amount_out_from_in`].
pub fn amount_in_from_out(amount_out: u64, price: u128, a2b: bool) -> DlmmResult<u64> {
    if price == 0 {
        return Err(DlmmError::PriceZero);
    }
    if amount_out == 0 {
        return Ok(0);
    }
    let value = if a2b {
        // out = floor(in * price / 2^64)  =>  in = ceil(out * 2^64 / price)
        div_ceil_u256(U256::from(amount_out as u128) << Q64_RESOLUTION, U256::from(price))
    } else {
        // out = floor(in * 2^64 / price)  =>  in = ceil(out * price / 2^64)
        let num = mul_u256(amount_out as u128, price);
        let denom = U256::from(1u128) << Q64_RESOLUTION;
        div_ceil_u256(num, denom)
    };
    let value = checked_u128(value)?;
    u64::try_from(value).map_err(|_| DlmmError::AmountOverflow)
}

/// `liquidity_supply = price * amount_a + (amount_b << 64)`.
pub fn liquidity_from_amounts(amount_a: u64, amount_b: u64, price: u128) -> DlmmResult<u128> {
    let a_term = mul_u256(amount_a as u128, price);
    let b_term = U256::from(amount_b as u128) << Q64_RESOLUTION;
    checked_u128(a_term + b_term)
}

/// Proportional split of `(amount_a, amount_b)` for a `delta_l` slice of
/// `liquidity_supply`; floors both sides.
pub fn amounts_from_liquidity(
    amount_a: u64,
    amount_b: u64,
    delta_l: u128,
    liquidity_supply: u128,
) -> DlmmResult<(u64, u64)> {
    if liquidity_supply == 0 {
        return Ok((0, 0));
    }
    let a = checked_u128(mul_u256(amount_a as u128, delta_l) / U256::from(liquidity_supply))?;
    let b = checked_u128(mul_u256(amount_b as u128, delta_l) / U256::from(liquidity_supply))?;
    Ok((
        u64::try_from(a).map_err(|_| DlmmError::AmountOverflow)?,
        u64::try_from(b).map_err(|_| DlmmError::AmountOverflow)?,
    ))
}

/// `ceil(amount * rate / 10^9)`.
pub fn fee_inclusive(amount: u64, rate: u64) -> DlmmResult<u64> {
    if rate == 0 || amount == 0 {
        return Ok(0);
    }
    let value = div_ceil_u256(
        U256::from(amount as u128) * U256::from(rate as u128),
        U256::from(FEE_PRECISION as u128),
    );
    let value = checked_u128(value)?;
    u64::try_from(value).map_err(|_| DlmmError::AmountOverflow)
}

/// `ceil(amount * rate / (10^9 - rate))`, used when `amount` is the net
/// received and the gross (fee-inclusive) figure must be recovered.
pub fn fee_exclusive(amount: u64, rate: u64) -> DlmmResult<u64> {
    if rate == 0 || amount == 0 {
        return Ok(0);
    }
    if rate >= FEE_PRECISION {
        return Err(DlmmError::FeeRateInvalid);
    }
    let denom = FEE_PRECISION - rate;
    let value = div_ceil_u256(
        U256::from(amount as u128) * U256::from(rate as u128),
        U256::from(denom as u128),
    );
    let value = checked_u128(value)?;
    u64::try_from(value).map_err(|_| DlmmError::AmountOverflow)
}

/// `floor(amount * rate * (10^9 + rate) / 10^18)`: linear plus quadratic
/// surcharge levied on the side of a liquidity add that crosses the
/// active price. Strictly less than `amount` by construction as long as
/// `rate <= MAX_COMPOSITION_FEE_RATE`.
pub fn composition_fee(amount: u64, rate: u64) -> DlmmResult<u64> {
    if rate == 0 || amount == 0 {
        return Ok(0);
    }
    if rate > MAX_COMPOSITION_FEE_RATE {
        return Err(DlmmError::FeeRateInvalid);
    }
    let precision = U256::from(FEE_PRECISION as u128);
    let numerator =
        U256::from(amount as u128) * U256::from(rate as u128) * (precision + U256::from(rate as u128));
    let denominator = precision * precision;
    let value = checked_u128(numerator / denominator)?;
    let value = u64::try_from(value).map_err(|_| DlmmError::AmountOverflow)?;
    debug_assert!(value < amount || amount == 0);
    Ok(value)
}

/// `floor((amount << 64) * 2^64 / liquidity_supply)`: Q64.64 growth per
/// unit of liquidity contributed by a fee/reward amount.
pub fn growth_from_amount(amount: u64, liquidity_supply: u128) -> DlmmResult<u128> {
    if liquidity_supply == 0 {
        return Ok(0);
    }
    let numerator = (U256::from(amount as u128) << Q64_RESOLUTION) << Q64_RESOLUTION;
    checked_u128(numerator / U256::from(liquidity_supply))
}

/// `floor(delta_growth * liquidity_share / 2^128)`: inverse of
/// [`growth_from_amount`], used when settling a position's share of a
/// growth delta.
pub fn amount_from_growth(delta_growth: u128, liquidity_share: u128) -> u128 {
    let product = mul_u256(delta_growth, liquidity_share);
    (product >> 128u32).as_u128()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: u128 = 1u128 << 64;

    #[test]
    fn single_bin_exact_in_fee_and_output_at_unit_price() {
        let amount_remaining = 200_000u64;
        let rate = 30_000u64;
        let fee = fee_inclusive(amount_remaining, rate).unwrap();
        assert_eq!(fee, 6);
        let net = amount_remaining - fee;
        assert_eq!(net, 199_994);
        let out = amount_out_from_in(net, ONE, true).unwrap();
        assert_eq!(out, 199_994);
    }

    #[test]
    fn composition_fee_scenario() {
        // 50 at rate 10^8 (10%).
        let fee = composition_fee(50, 100_000_000).unwrap();
        assert_eq!(fee, 5);
    }

    #[test]
    fn round_trip_within_rounding() {
        let price = ONE + (ONE / 4);
        for x in [1u64, 7, 1000, 999_999] {
            let a2b = true;
            let needed_in = amount_in_from_out(x, price, a2b).unwrap();
            let got_out = amount_out_from_in(needed_in, price, a2b).unwrap();
            assert!(got_out <= x);
            let got_out_plus =
                amount_out_from_in(needed_in.saturating_add(1), price, a2b).unwrap();
            assert!(x <= got_out_plus);
        }
    }

    #[test]
    fn fee_inclusive_zero_rate_is_free() {
        assert_eq!(fee_inclusive(1_000, 0).unwrap(), 0);
    }

    #[test]
    fn composition_fee_rejects_rate_above_bound() {
        assert!(composition_fee(100, MAX_COMPOSITION_FEE_RATE + 1).is_err());
    }

    proptest::proptest! {
        #[test]
        fn liquidity_round_trip_is_conservative(
            amount_a in 0u64..1_000_000_000,
            amount_b in 0u64..1_000_000_000,
            price in 1u128..(1u128 << 100),
        ) {
            let l = liquidity_from_amounts(amount_a, amount_b, price).unwrap();
            let (a2, b2) = amounts_from_liquidity(amount_a, amount_b, l, l).unwrap();
            proptest::prop_assert!(a2 <= amount_a);
            proptest::prop_assert!(b2 <= amount_b);
        }
    }
}
