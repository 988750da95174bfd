//! Dynamic-fee volatility state machine.
//!
//! Grounded on `orca_whirlpools_core::math::adaptive_fee`'s
//! `AdaptiveFeeVariablesFacade` (`update_reference`,
//! `update_volatility_accumulator`): same filter/decay-period branching
//! and accumulator-capping shape, rebased from a tick-group index onto
//! a bin id directly.

use crate::math::{decayed_volatility_reference, next_volatility_accumulator, variable_fee_rate};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VariableParamsConfig {
    pub filter_period: i64,
    pub decay_period: i64,
    pub reduction_factor: u32,
    pub base_factor: u64,
    pub bin_step: u16,
    pub variable_fee_control: u64,
    pub max_volatility_accumulator: u32,
    pub protocol_fee_rate: u64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VariableParams {
    pub volatility_accumulator: u32,
    pub volatility_reference: u32,
    pub index_reference: i32,
    pub last_update_timestamp: i64,
    pub config: VariableParamsConfig,
}

impl VariableParams {
    pub fn new(config: VariableParamsConfig, active_id: i32, now: i64) -> Self {
        Self {
            volatility_accumulator: 0,
            volatility_reference: 0,
            index_reference: active_id,
            last_update_timestamp: now,
            config,
        }
    }

    /// Step 1-2 of §4.5: run once per swap, before consuming any bin.
    pub fn update_references(&mut self, active_id: i32, now: i64) {
        let elapsed = now - self.last_update_timestamp;
        if elapsed >= self.config.filter_period {
            self.index_reference = active_id;
            self.volatility_reference = decayed_volatility_reference(
                self.volatility_accumulator,
                elapsed,
                self.config.decay_period,
                self.config.reduction_factor,
            );
        }
    }

    /// Step 3 of §4.5: run every time the active id changes mid-swap.
    pub fn update_volatility_accumulator(&mut self, active_id: i32) {
        let delta = (active_id - self.index_reference).unsigned_abs();
        self.volatility_accumulator = next_volatility_accumulator(
            self.volatility_reference,
            delta,
            self.config.max_volatility_accumulator,
        );
    }

    /// Step 4 of §4.5: run once the swap has finished.
    pub fn finish_swap(&mut self, now: i64) {
        self.last_update_timestamp = now;
    }

    /// Total fee rate: `min(base_fee_rate + variable_rate, 10%)`.
    pub fn total_fee_rate(&self) -> u64 {
        let variable_rate = variable_fee_rate(
            self.volatility_accumulator,
            self.config.bin_step,
            self.config.variable_fee_control,
        );
        (self.config.base_factor + variable_rate).min(crate::constants::MAX_TOTAL_FEE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> VariableParamsConfig {
        VariableParamsConfig {
            filter_period: 10,
            decay_period: 60,
            reduction_factor: 5_000,
            base_factor: 1_000,
            bin_step: 25,
            variable_fee_control: 40_000,
            max_volatility_accumulator: 350_000,
            protocol_fee_rate: 200_000_000,
        }
    }

    #[test]
    fn reference_rolls_over_after_filter_period() {
        let mut params = VariableParams::new(config(), 0, 0);
        params.volatility_accumulator = 100_000;
        params.update_references(5, 20);
        assert_eq!(params.index_reference, 5);
        assert_eq!(params.volatility_reference, 50_000);
    }

    #[test]
    fn reference_holds_within_filter_period() {
        let mut params = VariableParams::new(config(), 0, 0);
        params.volatility_accumulator = 100_000;
        params.update_references(5, 5);
        assert_eq!(params.index_reference, 0);
    }

    #[test]
    fn accumulator_tracks_distance_from_reference() {
        let mut params = VariableParams::new(config(), 0, 0);
        params.update_references(0, 100);
        params.update_volatility_accumulator(3);
        assert_eq!(params.volatility_accumulator, 30_000);
    }
}
