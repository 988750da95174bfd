//! Multi-bin liquidity positions: per-bin share/growth-snapshot table,
//! composition-fee charge on active-bin adds, and the add/remove/settle
//! operations that keep them consistent with `BinStore` and
//! `RewardEngine`.
//!
//! The settlement shape (diff bin growth against a stored checkpoint,
//! wrapping-sub the delta, fold it into an owed total) is grounded on
//! `orca_whirlpools_core`'s `next_position_modify_liquidity_update`
//! (`programs/whirlpool/src/manager/position_manager.rs`) — read there
//! only for its arithmetic shape, since that file itself lives in the
//! excluded on-chain program tree.

use crate::constants::{MAX_POSITION_WIDTH, MAX_REWARD_SLOTS};
use crate::error::{DlmmError, DlmmResult};
use crate::math::{amount_out_from_in, amounts_from_liquidity, composition_fee, growth_from_amount, liquidity_from_amounts};
use crate::types::bin::{owed_from_growth_delta, BinStore};
use crate::types::reward::RewardEngine;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionBinStat {
    pub bin_id: i32,
    pub liquidity_share: u128,
    pub fee_a_growth_snapshot: u128,
    pub fee_b_growth_snapshot: u128,
    pub rewards_growth_snapshot: [u128; MAX_REWARD_SLOTS],
}

impl PositionBinStat {
    fn new(bin_id: i32) -> Self {
        Self {
            bin_id,
            liquidity_share: 0,
            fee_a_growth_snapshot: 0,
            fee_b_growth_snapshot: 0,
            rewards_growth_snapshot: [0; MAX_REWARD_SLOTS],
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    pub pool_id: u64,
    pub lower_id: i32,
    pub upper_id: i32,
    pub stats: Vec<PositionBinStat>,
    pub fee_owed_a: u64,
    pub fee_owed_b: u64,
    pub rewards_owed: [u128; MAX_REWARD_SLOTS],
    pub flash_count: u32,
    /// Recorded at `open_position` time: whether the caller asserted the
    /// active bin lies within this position's range. Checked by
    /// `Pool::add_liquidity` against `ActiveIdExpected` on the first add.
    pub active_included: bool,
}

impl Position {
    pub fn new(pool_id: u64, lower_id: i32, upper_id: i32, active_included: bool) -> DlmmResult<Self> {
        if upper_id < lower_id {
            return Err(DlmmError::PositionWidthInvalid);
        }
        let width = (upper_id - lower_id + 1) as u32;
        if width == 0 || width > MAX_POSITION_WIDTH {
            return Err(DlmmError::PositionWidthInvalid);
        }
        let stats = (lower_id..=upper_id).map(PositionBinStat::new).collect();
        Ok(Self {
            pool_id,
            lower_id,
            upper_id,
            stats,
            fee_owed_a: 0,
            fee_owed_b: 0,
            rewards_owed: [0; MAX_REWARD_SLOTS],
            flash_count: 0,
            active_included,
        })
    }

    pub fn width(&self) -> u32 {
        (self.upper_id - self.lower_id + 1) as u32
    }

    pub fn is_destroyable(&self) -> bool {
        self.stats.iter().all(|s| s.liquidity_share == 0)
            && self.fee_owed_a == 0
            && self.fee_owed_b == 0
            && self.rewards_owed.iter().all(|&r| r == 0)
    }

    fn stat_mut(&mut self, bin_id: i32) -> DlmmResult<&mut PositionBinStat> {
        self.stats
            .iter_mut()
            .find(|s| s.bin_id == bin_id)
            .ok_or(DlmmError::BinMissing)
    }

    /// Settlement per §4.7: run `RewardEngine.settle`, then diff every
    /// held bin's growth against this position's stored snapshot.
    pub fn settle(
        &mut self,
        bin_store: &mut BinStore,
        rewards: &mut RewardEngine,
        active_id: i32,
        now: i64,
    ) -> DlmmResult<()> {
        let active_liquidity = bin_store.get(active_id).map(|b| b.liquidity_supply).unwrap_or(0);
        let growth_deltas = rewards.settle_all(active_liquidity, now)?;
        if let Some(active_bin) = bin_store.get_mut(active_id) {
            for (slot, delta) in growth_deltas.iter().enumerate() {
                active_bin.rewards_growth_global[slot] =
                    active_bin.rewards_growth_global[slot].wrapping_add(*delta);
            }
        }

        for stat in self.stats.iter_mut() {
            let Some(bin) = bin_store.get(stat.bin_id) else {
                continue;
            };
            if stat.liquidity_share == 0 {
                stat.fee_a_growth_snapshot = bin.fee_a_growth_global;
                stat.fee_b_growth_snapshot = bin.fee_b_growth_global;
                stat.rewards_growth_snapshot = bin.rewards_growth_global;
                continue;
            }

            let owed_a = owed_from_growth_delta(
                bin.fee_a_growth_global,
                stat.fee_a_growth_snapshot,
                stat.liquidity_share,
            );
            let owed_b = owed_from_growth_delta(
                bin.fee_b_growth_global,
                stat.fee_b_growth_snapshot,
                stat.liquidity_share,
            );
            self.fee_owed_a = self
                .fee_owed_a
                .checked_add(u64::try_from(owed_a).map_err(|_| DlmmError::AmountOverflow)?)
                .ok_or(DlmmError::AmountOverflow)?;
            self.fee_owed_b = self
                .fee_owed_b
                .checked_add(u64::try_from(owed_b).map_err(|_| DlmmError::AmountOverflow)?)
                .ok_or(DlmmError::AmountOverflow)?;

            for slot in 0..MAX_REWARD_SLOTS {
                let owed_r = owed_from_growth_delta(
                    bin.rewards_growth_global[slot],
                    stat.rewards_growth_snapshot[slot],
                    stat.liquidity_share,
                );
                self.rewards_owed[slot] = self.rewards_owed[slot].wrapping_add(owed_r);
            }

            stat.fee_a_growth_snapshot = bin.fee_a_growth_global;
            stat.fee_b_growth_snapshot = bin.fee_b_growth_global;
            stat.rewards_growth_snapshot = bin.rewards_growth_global;
        }
        Ok(())
    }

    /// Adds `(delta_a, delta_b)` to bin `bin_id`. Caller must have run
    /// [`Position::settle`] first. When `is_active` the add is charged a
    /// composition fee on whatever side crosses the active price before
    /// shares are credited; `total_fee_rate` is the pool's current total
    /// fee rate used for that charge. Returns the liquidity share
    /// actually credited (net of any composition fee).
    pub fn add_liquidity(
        &mut self,
        bin_store: &mut BinStore,
        bin_id: i32,
        delta_a: u64,
        delta_b: u64,
        is_active: bool,
        total_fee_rate: u64,
    ) -> DlmmResult<u128> {
        let bin = bin_store.get_mut(bin_id).ok_or(DlmmError::BinMissing)?;
        let existing_a = bin.amount_a;
        let existing_b = bin.amount_b;
        let liquidity_before = bin.liquidity_supply;

        // When the add crosses the active price, the excess side's actual
        // deposit is reduced by the composition fee before it ever touches
        // inventory — §4.7 "apply composition fee on that excess ... proceed
        // with the net" — so inventory and `liquidity_supply` are derived
        // from the same net amounts and the constant-sum invariant holds
        // exactly, not just up to the fee's value.
        let charge = if is_active {
            composition_fee_charge(existing_a, existing_b, bin.price, delta_a, delta_b, total_fee_rate)?
        } else {
            None
        };

        let (net_a, net_b, fee_native, fee_on_a) = match charge {
            Some(CompositionCharge { side: ExcessSide::A, fee_native }) => {
                let net_a = delta_a.checked_sub(fee_native).ok_or(DlmmError::AmountOverflow)?;
                (net_a, delta_b, fee_native, true)
            }
            Some(CompositionCharge { side: ExcessSide::B, fee_native }) => {
                let net_b = delta_b.checked_sub(fee_native).ok_or(DlmmError::AmountOverflow)?;
                (delta_a, net_b, fee_native, false)
            }
            None => (delta_a, delta_b, 0, false),
        };

        let delta_l_credited = liquidity_from_amounts(net_a, net_b, bin.price)?;

        bin.amount_a = bin.amount_a.checked_add(net_a).ok_or(DlmmError::AmountOverflow)?;
        bin.amount_b = bin.amount_b.checked_add(net_b).ok_or(DlmmError::AmountOverflow)?;
        bin.liquidity_supply = bin
            .liquidity_supply
            .checked_add(delta_l_credited)
            .ok_or(DlmmError::LiquidityOverflow)?;

        if fee_native > 0 {
            let growth = growth_from_amount(fee_native, liquidity_before)?;
            if fee_on_a {
                bin.fee_a_growth_global = bin.fee_a_growth_global.wrapping_add(growth);
            } else {
                bin.fee_b_growth_global = bin.fee_b_growth_global.wrapping_add(growth);
            }
        }

        let stat = self.stat_mut(bin_id)?;
        stat.liquidity_share = stat
            .liquidity_share
            .checked_add(delta_l_credited)
            .ok_or(DlmmError::LiquidityOverflow)?;
        Ok(delta_l_credited)
    }

    /// Removes `delta_share` worth of liquidity from bin `bin_id`.
    /// Drops the bin from `bin_store` once its supply reaches zero.
    pub fn remove_liquidity(
        &mut self,
        bin_store: &mut BinStore,
        bin_id: i32,
        delta_share: u128,
    ) -> DlmmResult<(u64, u64)> {
        {
            let stat = self.stat_mut(bin_id)?;
            if delta_share > stat.liquidity_share {
                return Err(DlmmError::LiquidityUnderflow);
            }
        }

        let bin = bin_store.get_mut(bin_id).ok_or(DlmmError::BinMissing)?;
        let (delta_a, delta_b) =
            amounts_from_liquidity(bin.amount_a, bin.amount_b, delta_share, bin.liquidity_supply)?;
        bin.amount_a = bin
            .amount_a
            .checked_sub(delta_a)
            .ok_or(DlmmError::LiquidityUnderflow)?;
        bin.amount_b = bin
            .amount_b
            .checked_sub(delta_b)
            .ok_or(DlmmError::LiquidityUnderflow)?;
        bin.liquidity_supply = bin
            .liquidity_supply
            .checked_sub(delta_share)
            .ok_or(DlmmError::LiquidityUnderflow)?;
        let supply_left = bin.liquidity_supply;

        let stat = self.stat_mut(bin_id)?;
        stat.liquidity_share -= delta_share;

        if supply_left == 0 {
            bin_store.remove_if_empty(bin_id);
        }
        Ok((delta_a, delta_b))
    }
}

/// Which side of a liquidity add crossed the active price and so is the
/// one the composition fee is deducted from, in its own native units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExcessSide {
    A,
    B,
}

/// Composition fee charged when a liquidity add to the active bin
/// crosses the active price: `fee_native` is denominated in whichever
/// side `side` names, so it can be subtracted directly from that side's
/// deposit before it touches bin inventory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositionCharge {
    pub side: ExcessSide,
    pub fee_native: u64,
}

/// Computes the composition-fee charge (if any) for adding
/// `(delta_a, delta_b)` to the active bin currently holding
/// `(existing_a, existing_b)` at `price`. `None` if the bin was
/// previously empty (no ratio to preserve) or the add does not push
/// either side past its proportional target.
pub fn composition_fee_charge(
    existing_a: u64,
    existing_b: u64,
    price: u128,
    delta_a: u64,
    delta_b: u64,
    rate: u64,
) -> DlmmResult<Option<CompositionCharge>> {
    let val_a_old = amount_out_from_in(existing_a, price, true)? as u128;
    let total_old = val_a_old + existing_b as u128;
    if total_old == 0 {
        return Ok(None);
    }

    let new_a = existing_a.checked_add(delta_a).ok_or(DlmmError::AmountOverflow)?;
    let new_b = existing_b.checked_add(delta_b).ok_or(DlmmError::AmountOverflow)?;
    let val_a_new = amount_out_from_in(new_a, price, true)? as u128;
    let val_b_new = new_b as u128;
    let total_new = val_a_new + val_b_new;

    let target_a = (total_new * val_a_old) / total_old;
    let target_b = total_new - target_a;

    if val_a_new > target_a {
        // Excess is measured in b-equivalent value; convert back to native
        // `a` units (capped at what was actually deposited) before the fee
        // is charged and deducted on that same native side.
        let excess_value = u64::try_from(val_a_new - target_a).map_err(|_| DlmmError::AmountOverflow)?;
        let excess_native = crate::math::amount_in_from_out(excess_value, price, true)?.min(delta_a);
        let fee_native = composition_fee(excess_native, rate)?;
        Ok(Some(CompositionCharge {
            side: ExcessSide::A,
            fee_native,
        }))
    } else if val_b_new > target_b {
        // `b` carries no price conversion, so the excess is already in
        // native `b` units.
        let excess_native = u64::try_from(val_b_new - target_b)
            .map_err(|_| DlmmError::AmountOverflow)?
            .min(delta_b);
        let fee_native = composition_fee(excess_native, rate)?;
        Ok(Some(CompositionCharge {
            side: ExcessSide::B,
            fee_native,
        }))
    } else {
        Ok(None)
    }
}

/// Obligation returned by `Pool::open_position`: must be settled with
/// exactly matching balances before the call completes. Deliberately
/// carries no `Clone`/`Copy`/`Default` impl so a dropped certificate is
/// at least visible at the call site, even though this crate cannot
/// forbid the drop at compile time the way a linear-typed source
/// language would.
#[must_use]
#[derive(Debug, PartialEq, Eq)]
pub struct OpenCert {
    pub pool_id: u64,
    pub amount_a: u64,
    pub amount_b: u64,
}

#[must_use]
#[derive(Debug, PartialEq, Eq)]
pub struct AddCert {
    pub pool_id: u64,
    pub amount_a: u64,
    pub amount_b: u64,
}

#[must_use]
#[derive(Debug, PartialEq, Eq)]
pub struct ClosePositionCert {
    pub pool_id: u64,
    pub rewards_remaining: Vec<(usize, u128)>,
}

impl ClosePositionCert {
    /// Takes one reward type's remaining balance out of the cert.
    /// Rewards are claimed one type at a time per §6.
    pub fn take_reward(&mut self, slot: usize) -> DlmmResult<u128> {
        let position = self
            .rewards_remaining
            .iter()
            .position(|(s, _)| *s == slot)
            .ok_or(DlmmError::RewardMissing)?;
        Ok(self.rewards_remaining.remove(position).1)
    }

    pub fn is_settled(&self) -> bool {
        self.rewards_remaining.is_empty()
    }
}

impl OpenCert {
    pub fn repay(self, pool_id: u64, balance_a: u64, balance_b: u64) -> DlmmResult<()> {
        if pool_id != self.pool_id {
            return Err(DlmmError::PositionMismatch);
        }
        if balance_a != self.amount_a || balance_b != self.amount_b {
            return Err(DlmmError::CertAmountMismatch);
        }
        Ok(())
    }
}

impl AddCert {
    pub fn repay(self, pool_id: u64, balance_a: u64, balance_b: u64) -> DlmmResult<()> {
        if pool_id != self.pool_id {
            return Err(DlmmError::PositionMismatch);
        }
        if balance_a != self.amount_a || balance_b != self.amount_b {
            return Err(DlmmError::CertAmountMismatch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_rejects_invalid_width() {
        assert!(Position::new(1, 10, 9, false).is_err());
        assert!(Position::new(1, 0, 1000, false).is_err());
    }

    #[test]
    fn composition_fee_on_active_add_scenario() {
        let price = 1u128 << 64;
        let charge = composition_fee_charge(100, 100, price, 100, 0, 100_000_000)
            .unwrap()
            .unwrap();
        assert_eq!(charge.side, ExcessSide::A);
        assert_eq!(charge.fee_native, 5);
    }

    #[test]
    fn composition_fee_absent_on_balanced_add() {
        let price = 1u128 << 64;
        // Adding proportionally to the existing 1:1 ratio never crosses.
        let charge = composition_fee_charge(100, 100, price, 50, 50, 100_000_000).unwrap();
        assert!(charge.is_none());
    }

    #[test]
    fn add_liquidity_composition_fee_preserves_constant_sum() {
        // spec.md §8 scenario 6: active bin (100,100) at price 1, add
        // (100,0) at a 10% fee rate -> composition fee of 5 debited from
        // the `a` side itself, not just from the liquidity share credited.
        let price = 1u128 << 64;
        let mut bins = BinStore::new();
        {
            let bin = bins.get_or_insert(0, price).unwrap();
            bin.amount_a = 100;
            bin.amount_b = 100;
            bin.liquidity_supply = liquidity_from_amounts(100, 100, price).unwrap();
        }
        let mut position = Position::new(1, 0, 0, true).unwrap();
        position
            .add_liquidity(&mut bins, 0, 100, 0, true, 100_000_000)
            .unwrap();

        let bin = bins.get(0).unwrap();
        assert_eq!(bin.amount_a, 195);
        assert_eq!(bin.amount_b, 100);
        let expected_liquidity = liquidity_from_amounts(bin.amount_a, bin.amount_b, price).unwrap();
        assert_eq!(bin.liquidity_supply, expected_liquidity);
    }

    #[test]
    fn cert_repay_requires_exact_match() {
        let cert = OpenCert {
            pool_id: 1,
            amount_a: 10,
            amount_b: 20,
        };
        assert!(cert.repay(1, 10, 21).is_err());
    }
}
