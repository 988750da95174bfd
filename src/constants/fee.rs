/// Denominator fee rates are expressed against (10^9 precision).
pub const FEE_PRECISION: u64 = 1_000_000_000;

/// Fee rate cap after base + variable is summed: 10%.
pub const MAX_TOTAL_FEE_RATE: u64 = 100_000_000;

/// `protocol_fee_rate` cap: 30% of the LP fee.
pub const MAX_PROTOCOL_FEE_RATE: u64 = 300_000_000;

/// `composition_fee`'s rate argument must not exceed this (10%); the
/// linear + quadratic formula would otherwise let the fee exceed the
/// amount it is levied on.
pub const MAX_COMPOSITION_FEE_RATE: u64 = 100_000_000;

/// Scale factor the variable-fee formula divides by after squaring
/// `volatility_accumulator * bin_step`.
pub const VARIABLE_FEE_SCALING_FACTOR: u128 = 100_000_000_000;

/// Denominator for `reduction_factor` in the volatility decay step.
pub const REDUCTION_FACTOR_DENOMINATOR: u32 = 10_000;
