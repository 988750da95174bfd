use thiserror::Error;

/// Every fallible outcome the engine can produce. Nothing in this crate
/// panics on caller-reachable input; all of it comes back through here.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DlmmError {
    #[error("bin store has no bin at the requested position")]
    BinMissing,
    #[error("bin id outside the valid range")]
    BinIdRange,
    #[error("liquidity value overflowed 128 bits")]
    LiquidityOverflow,
    #[error("amount value overflowed its representation")]
    AmountOverflow,
    #[error("liquidity removal exceeds the share held")]
    LiquidityUnderflow,
    #[error("price argument was zero")]
    PriceZero,
    #[error("swap produced zero input or zero output")]
    AmountZero,
    #[error("fee rate is outside its allowed bound")]
    FeeRateInvalid,
    #[error("reward slot table is full")]
    RewardSlotFull,
    #[error("reward slot is already initialized")]
    RewardExists,
    #[error("reward slot has not been initialized")]
    RewardMissing,
    #[error("reward duration is shorter than the minimum")]
    RewardDurationTooShort,
    #[error("position width is zero or exceeds the maximum")]
    PositionWidthInvalid,
    #[error("position or certificate does not belong to this pool")]
    PositionMismatch,
    #[error("repaid balance does not equal the certificate total")]
    CertAmountMismatch,
    #[error("active bin must be included but was not supplied")]
    ActiveIdExpected,
    #[error("operation is blocked by a permission, pause, or concurrency rule")]
    OpsBlocked,
    #[error("an off-active bin was given an amount on its disallowed side")]
    WrongSideAmount,
    #[error("position still holds liquidity, owed fees, or owed rewards")]
    PositionNotEmpty,
    #[error("token pair names the same coin type on both sides")]
    SameCoinType,
}

pub type DlmmResult<T> = Result<T, DlmmError>;
