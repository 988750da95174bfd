//! Swap result reporting: the per-step breakdown a multi-bin traversal
//! accumulates as it walks the ordered bin set.
//!
//! Shape grounded on `orca_whirlpools_core::quote::swap`'s
//! `ExactInSwapQuote` / `ExactOutSwapQuote` (aggregate totals returned to
//! the caller), widened here with a `steps` trail since `spec.md` §6
//! calls for a per-bin breakdown that the teacher's single-quote-facade
//! return type has no counterpart for — DLMM callers need to see which
//! bins a swap actually touched, not just the aggregate.

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SwapStep {
    pub bin_id: i32,
    pub amount_in: u64,
    pub amount_out: u64,
    pub fee: u64,
    pub var_fee_rate: u64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SwapResult {
    pub amount_in: u64,
    pub amount_out: u64,
    pub fee: u64,
    pub protocol_fee: u64,
    pub ref_fee: u64,
    pub steps: Vec<SwapStep>,
}
