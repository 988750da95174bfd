//! Non-mutating swap preview.
//!
//! Grounded on `orca_whirlpools_core::quote::swap::swap_quote_by_input_token`
//! /`_by_output_token`, which computes a swap result purely against
//! facades passed in by the caller and never touches live state. This
//! crate's `Pool` is a single owned struct rather than a set of facades,
//! so the same non-mutation guarantee is achieved by running the real
//! traversal against a throwaway `Clone` of the pool and handing back
//! only the `SwapResult`; the clone (and any state it accumulated -
//! `active_id`, `VariableParams`, bin inventories) is dropped.
//!
//! This is also the answer to the Open Question in `spec.md` §9 about
//! `refresh_position_info_v2`'s "expected active id" parameter: callers
//! that want a what-if projection at a hypothetical active id should
//! clone a `Pool`, set `active_id` on the clone, and quote against that,
//! rather than the engine exposing any such parameter as mutable state.

use crate::error::DlmmResult;
use crate::types::{Pool, SwapResult};

/// Runs `swap_exact_in`/`swap_exact_out` against a cloned `Pool` and
/// discards the clone, so the caller can preview a swap's outcome
/// without committing it. `by_amount_in` selects exact-in vs exact-out,
/// matching `Pool::run_swap`'s private flag.
pub fn quote_swap(
    pool: &Pool,
    amount: u64,
    a2b: bool,
    by_amount_in: bool,
    now: i64,
    partner_fee_rate: u64,
) -> DlmmResult<SwapResult> {
    let mut preview = pool.clone();
    preview.run_swap(amount, a2b, by_amount_in, now, partner_fee_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::price_from_id;
    use crate::types::{Pool, PoolConfig, TokenId, VariableParamsConfig};

    fn config() -> VariableParamsConfig {
        VariableParamsConfig {
            filter_period: 10,
            decay_period: 60,
            reduction_factor: 5_000,
            base_factor: 1_000,
            bin_step: 25,
            variable_fee_control: 0,
            max_volatility_accumulator: 350_000,
            protocol_fee_rate: 0,
        }
    }

    #[test]
    fn quote_does_not_mutate_pool() {
        let cfg = PoolConfig::new(TokenId::new([1; 32]), TokenId::new([2; 32]), config()).unwrap();
        let mut pool = Pool::new(cfg, 0, 0).unwrap();
        let price0 = price_from_id(0, 25).unwrap();
        pool.bins.get_or_insert(0, price0).unwrap().amount_b = 500_000;

        let before_active = pool.active_id;
        let result = quote_swap(&pool, 1_000, true, true, 1, 0).unwrap();
        assert!(result.amount_out > 0);
        assert_eq!(pool.active_id, before_active);
        assert_eq!(pool.bins.get(0).unwrap().amount_b, 500_000);
    }
}
