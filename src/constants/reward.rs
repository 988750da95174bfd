/// Maximum number of simultaneous reward slots per pool.
pub const MAX_REWARD_SLOTS: usize = 5;

/// Maximum number of bins a single position may span.
pub const MAX_POSITION_WIDTH: u32 = 1000;

/// Epoch reward periods are measured against.
pub const REWARD_PERIOD_REFERENCE: i64 = 1_757_332_800;

/// Length, in seconds, of one reward period.
pub const REWARD_PERIOD_LENGTH: i64 = 604_800;

/// Shortest duration an `add_reward` schedule entry may span.
pub const MIN_REWARD_DURATION: i64 = REWARD_PERIOD_LENGTH;
