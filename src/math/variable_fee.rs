//! Pure formulas behind the dynamic-fee volatility state machine.
//!
//! Grounded on `orca_whirlpools_core::math::adaptive_fee`'s
//! `AdaptiveFeeVariablesFacade::update_reference` /
//! `update_volatility_accumulator`: Whirlpool tracks volatility over a
//! tick-group index, DLMM over the bin id directly, but the
//! filter/decay/reduction shape and the squared-volatility fee surcharge
//! are the same family of formula.

use crate::constants::{FEE_PRECISION, REDUCTION_FACTOR_DENOMINATOR, VARIABLE_FEE_SCALING_FACTOR};

/// `volatility_reference` after a filter-period rollover: full decay once
/// `elapsed >= decay_period`, scaled decay in between, held otherwise.
pub fn decayed_volatility_reference(
    volatility_accumulator: u32,
    elapsed: i64,
    decay_period: i64,
    reduction_factor: u32,
) -> u32 {
    if elapsed < decay_period {
        ((volatility_accumulator as u64 * reduction_factor as u64)
            / REDUCTION_FACTOR_DENOMINATOR as u64) as u32
    } else {
        0
    }
}

/// `min(volatility_reference + delta * 10000, max_volatility_accumulator)`.
pub fn next_volatility_accumulator(
    volatility_reference: u32,
    delta_id: u32,
    max_volatility_accumulator: u32,
) -> u32 {
    let candidate = volatility_reference as u64 + delta_id as u64 * 10_000;
    candidate.min(max_volatility_accumulator as u64) as u32
}

/// `rate = ceil(variable_fee_control * (volatility_accumulator *
/// bin_step)^2 / 10^11)`, the dynamic surcharge on top of the pool's
/// `base_fee_rate`.
pub fn variable_fee_rate(volatility_accumulator: u32, bin_step: u16, variable_fee_control: u64) -> u64 {
    let v = volatility_accumulator as u128 * bin_step as u128;
    let v_fee = variable_fee_control as u128 * v * v;
    let scaled = (v_fee + (VARIABLE_FEE_SCALING_FACTOR - 1)) / VARIABLE_FEE_SCALING_FACTOR;
    scaled.min(FEE_PRECISION as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_volatility_is_zero_rate() {
        assert_eq!(variable_fee_rate(0, 25, 40_000), 0);
    }

    #[test]
    fn decay_to_zero_past_decay_period() {
        assert_eq!(decayed_volatility_reference(50_000, 100, 60, 5_000), 0);
    }

    #[test]
    fn decay_scales_by_reduction_factor() {
        assert_eq!(decayed_volatility_reference(10_000, 10, 60, 5_000), 5_000);
    }

    #[test]
    fn accumulator_is_capped() {
        let v = next_volatility_accumulator(0, 100_000, 350_000);
        assert_eq!(v, 350_000);
    }
}
