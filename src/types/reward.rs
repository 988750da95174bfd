//! Per-reward emission schedule and global growth accumulation.
//!
//! Shape borrowed from `orca_whirlpools_core::quote::rewards`'s
//! `collect_rewards_quote` (Q64.64 `emissions_per_second * Δt /
//! liquidity` growth, `checked_mul(...).unwrap_or(0)`-style
//! overflow-to-zero folding into owed amounts), but Whirlpool rewards
//! run at one flat per-second rate with no schedule and credit growth
//! across a tick *range*; a DLMM reward slot instead walks an ordered
//! schedule of rate deltas and credits growth exclusively to the single
//! currently active bin, so the segment walk in `settle` below has no
//! direct teacher counterpart and is built from the spec's own
//! description.

use std::collections::BTreeMap;

use ethnum::U256;

use crate::constants::{MAX_REWARD_SLOTS, MIN_REWARD_DURATION};
use crate::error::{DlmmError, DlmmResult};
use crate::types::token::TokenId;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewardSlot {
    pub token_type: TokenId,
    /// Q64.64 units per second.
    pub current_emission_rate: u128,
    /// Start-timestamp -> signed Q64.64 delta-rate. Summing deltas up to
    /// time `t` yields the rate in force at `t`.
    pub period_schedule: BTreeMap<i64, i128>,
    pub reward_released: U256,
    pub reward_refunded: u128,
    pub reward_harvested: u128,
    pub last_updated_time: i64,
}

impl RewardSlot {
    pub fn new(token_type: TokenId, now: i64) -> Self {
        Self {
            token_type,
            current_emission_rate: 0,
            period_schedule: BTreeMap::new(),
            reward_released: U256::ZERO,
            reward_refunded: 0,
            reward_harvested: 0,
            last_updated_time: now,
        }
    }

    /// Schedules `amount` (raw token units) to emit evenly between `start`
    /// (clamped up to `now`) and `end`. Vault deposit bookkeeping is the
    /// caller's responsibility — the vault is an opaque balance bag held
    /// off-instance (§3), out of scope for this type.
    pub fn add_reward(
        &mut self,
        amount: u128,
        start: Option<i64>,
        end: i64,
        now: i64,
    ) -> DlmmResult<()> {
        let start = start.unwrap_or(now).max(now);
        if end <= start || end - start < MIN_REWARD_DURATION {
            return Err(DlmmError::RewardDurationTooShort);
        }
        let duration = (end - start) as u128;
        let new_rate = amount
            .checked_shl(64)
            .ok_or(DlmmError::AmountOverflow)?
            / duration;
        if new_rate > u128::MAX / 2 {
            return Err(DlmmError::AmountOverflow);
        }

        *self.period_schedule.entry(start).or_insert(0) += new_rate as i128;
        *self.period_schedule.entry(end).or_insert(0) -= new_rate as i128;

        if start <= now && now < end {
            self.current_emission_rate = self.current_emission_rate.wrapping_add(new_rate);
        }
        Ok(())
    }

    /// Walks the schedule from `last_updated_time` to `now`, segment by
    /// segment, accumulating `reward_released`/`reward_refunded` and
    /// returning the Q64.64 growth delta to fold into the active bin's
    /// `rewards_growth_global` slot (zero when no segment elapsed).
    pub fn settle(&mut self, active_liquidity: u128, now: i64) -> DlmmResult<u128> {
        if now <= self.last_updated_time {
            return Ok(0);
        }

        let mut cursor = self.last_updated_time;
        let mut rate = self.current_emission_rate;
        let mut growth_delta: u128 = 0;

        let breakpoints: Vec<i64> = self
            .period_schedule
            .range((cursor + 1)..=now)
            .map(|(&t, _)| t)
            .collect();

        for breakpoint in breakpoints {
            self.apply_segment(cursor, breakpoint, rate, active_liquidity, &mut growth_delta)?;
            let delta = *self.period_schedule.get(&breakpoint).unwrap();
            rate = apply_signed_delta(rate, delta);
            cursor = breakpoint;
        }
        if cursor < now {
            self.apply_segment(cursor, now, rate, active_liquidity, &mut growth_delta)?;
        }

        self.current_emission_rate = rate;
        self.last_updated_time = now;
        Ok(growth_delta)
    }

    fn apply_segment(
        &mut self,
        from: i64,
        to: i64,
        rate: u128,
        active_liquidity: u128,
        growth_delta: &mut u128,
    ) -> DlmmResult<()> {
        if to <= from || rate == 0 {
            return Ok(());
        }
        let dt = (to - from) as u128;
        let released = U256::from(rate) * U256::from(dt);
        self.reward_released = self
            .reward_released
            .checked_add(released)
            .ok_or(DlmmError::AmountOverflow)?;

        if active_liquidity > 0 {
            let segment_growth = checked_u128(released / U256::from(active_liquidity))?;
            *growth_delta = growth_delta.wrapping_add(segment_growth);
        } else {
            let refund = checked_u128(released >> 64u32)?;
            self.reward_refunded = self
                .reward_refunded
                .checked_add(refund)
                .ok_or(DlmmError::AmountOverflow)?;
        }
        Ok(())
    }
}

fn checked_u128(value: U256) -> DlmmResult<u128> {
    if *value.high() != 0 {
        Err(DlmmError::AmountOverflow)
    } else {
        Ok(value.as_u128())
    }
}

fn apply_signed_delta(rate: u128, delta: i128) -> u128 {
    if delta >= 0 {
        rate.wrapping_add(delta as u128)
    } else {
        rate.wrapping_sub((-delta) as u128)
    }
}

/// Table of up to [`MAX_REWARD_SLOTS`] reward slots for a pool.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default)]
pub struct RewardEngine {
    pub slots: Vec<RewardSlot>,
}

impl RewardEngine {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Appends a reward slot. Reserved slots at the tail (beyond whatever
    /// count privileged callers have opened) are the caller's concern to
    /// gate; this type only enforces the hard `MAX_REWARD_SLOTS` cap.
    pub fn initialize(&mut self, token_type: TokenId, now: i64) -> DlmmResult<usize> {
        if self.slots.len() >= MAX_REWARD_SLOTS {
            return Err(DlmmError::RewardSlotFull);
        }
        if self.slots.iter().any(|s| s.token_type == token_type) {
            return Err(DlmmError::RewardExists);
        }
        self.slots.push(RewardSlot::new(token_type, now));
        Ok(self.slots.len() - 1)
    }

    pub fn slot_mut(&mut self, index: usize) -> DlmmResult<&mut RewardSlot> {
        self.slots.get_mut(index).ok_or(DlmmError::RewardMissing)
    }

    pub fn slot(&self, index: usize) -> DlmmResult<&RewardSlot> {
        self.slots.get(index).ok_or(DlmmError::RewardMissing)
    }

    /// Settles every slot against `active_liquidity`, returning the
    /// per-slot growth delta to apply to the active bin.
    pub fn settle_all(&mut self, active_liquidity: u128, now: i64) -> DlmmResult<Vec<u128>> {
        self.slots
            .iter_mut()
            .map(|slot| slot.settle(active_liquidity, now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(byte: u8) -> TokenId {
        TokenId::new([byte; 32])
    }

    #[test]
    fn reward_refund_scenario() {
        let t0 = 1_757_332_800i64;
        let mut slot = RewardSlot::new(token(1), t0);
        let amount = (604_800u128) << 64;
        slot.add_reward(amount, Some(t0), t0 + 604_800, t0).unwrap();
        assert_eq!(slot.current_emission_rate, 1u128 << 64);

        // 5s at L=0, then 5s at L = 2^64.
        let g1 = slot.settle(0, t0 + 5).unwrap();
        assert_eq!(g1, 0);
        assert_eq!(slot.reward_refunded, 5);

        let g2 = slot.settle(1u128 << 64, t0 + 10).unwrap();
        assert_eq!(g2, 5);
    }

    #[test]
    fn add_reward_rejects_short_duration() {
        let mut slot = RewardSlot::new(token(1), 0);
        assert!(slot.add_reward(1000, Some(0), 10, 0).is_err());
    }

    #[test]
    fn reward_engine_enforces_slot_cap() {
        let mut engine = RewardEngine::new();
        for i in 0..5u8 {
            engine.initialize(token(i), 0).unwrap();
        }
        assert!(engine.initialize(token(99), 0).is_err());
    }

    #[test]
    fn reward_engine_rejects_duplicate_token() {
        let mut engine = RewardEngine::new();
        engine.initialize(token(1), 0).unwrap();
        assert!(engine.initialize(token(1), 0).is_err());
    }
}
