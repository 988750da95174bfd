/// Lowest valid bin id.
pub const MIN_BIN_ID: i32 = -443_636;

/// Highest valid bin id.
pub const MAX_BIN_ID: i32 = 443_636;

/// Offset that turns a signed bin id into a non-negative score for
/// group/offset addressing in `BinStore`.
pub const BIN_ID_OFFSET: i32 = 443_636;

/// Bins per `BinGroup`. Bounds the per-swap allocation footprint to one
/// group load per this many adjacent bins.
pub const BINS_PER_GROUP: u32 = 16;

/// Highest `bin_step` allowed, in ten-thousandths.
pub const MAX_BIN_STEP: u16 = 1000;

/// Bound used by `pow_q64`'s binary exponentiation loop; exponents with a
/// larger magnitude are rejected before the loop starts.
pub const MAX_POW_EXPONENT: u32 = 0x80000;
