//! A single price point and the ordered store that holds them.
//!
//! `BinStore`'s grouping is grounded on
//! `orca_whirlpools_core::math::bundle`'s bitmap helpers
//! (`first_unoccupied_position_in_bundle`, `is_position_bundle_full` /
//! `_empty`), scaled from a 256-bit position-bundle bitmap down to a
//! 16-bit per-group bitmap, and on that crate's `TickArraySequence`
//! (`math/tick_array.rs`) for the "seek past empty slots, stop at the
//! sequence boundary" traversal shape — generalized here from a small
//! fixed-size window of tick arrays to an unbounded `BTreeMap` of
//! groups, since a DLMM pool's populated bin ids can be sparse across
//! the whole `[-443636, 443636]` range rather than confined to whatever
//! handful of tick arrays a caller loaded.

use std::collections::BTreeMap;

use crate::constants::{BINS_PER_GROUP, BIN_ID_OFFSET, MAX_BIN_ID, MAX_REWARD_SLOTS, MIN_BIN_ID};
use crate::error::{DlmmError, DlmmResult};
use crate::math::{
    amount_from_growth, amount_in_from_out, amount_out_from_in, fee_inclusive, growth_from_amount,
};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bin {
    pub id: i32,
    pub price: u128,
    pub amount_a: u64,
    pub amount_b: u64,
    pub liquidity_supply: u128,
    pub fee_a_growth_global: u128,
    pub fee_b_growth_global: u128,
    pub rewards_growth_global: [u128; MAX_REWARD_SLOTS],
}

impl Bin {
    pub fn new(id: i32, price: u128) -> Self {
        Self {
            id,
            price,
            amount_a: 0,
            amount_b: 0,
            liquidity_supply: 0,
            fee_a_growth_global: 0,
            fee_b_growth_global: 0,
            rewards_growth_global: [0; MAX_REWARD_SLOTS],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.liquidity_supply == 0
    }

    /// `available_out` for a swap in the given direction: `amount_b` for
    /// a2b, `amount_a` for b2a.
    pub fn available_out(&self, a2b: bool) -> u64 {
        if a2b {
            self.amount_b
        } else {
            self.amount_a
        }
    }
}

/// Result of running one bin through a swap step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BinSwapResult {
    pub amount_in_used: u64,
    pub amount_out: u64,
    pub fee: u64,
    pub protocol_fee: u64,
}

/// `swap_one_bin` — single-bin exact-in / exact-out step.
///
/// Grounded on `shichen1iu-meteora-dlmm-sdk-note`'s `BinExtension::swap`
/// (`commons/src/extensions/bin.rs`): compute `max_amount_out` /
/// `max_amount_in`, branch on whether the bin is fully or partially
/// drained, then mutate inventory and accrue the LP fee into the
/// appropriate growth accumulator.
#[allow(clippy::too_many_arguments)]
pub fn swap_one_bin(
    bin: &mut Bin,
    amount_remaining: u64,
    a2b: bool,
    by_amount_in: bool,
    total_fee_rate: u64,
    protocol_fee_rate: u64,
) -> DlmmResult<BinSwapResult> {
    let available_out = bin.available_out(a2b);
    if available_out == 0 {
        return Ok(BinSwapResult::default());
    }

    let max_in = amount_in_from_out(available_out, bin.price, a2b)?;

    let (amount_in_used, amount_out, fee) = if by_amount_in {
        let fee = fee_inclusive(amount_remaining, total_fee_rate)?;
        let net = amount_remaining.saturating_sub(fee);
        if net >= max_in {
            let amount_in_used = max_in;
            let fee = fee_inclusive(
                amount_in_used
                    .checked_add(fee)
                    .ok_or(DlmmError::AmountOverflow)?,
                total_fee_rate,
            )?;
            (amount_in_used, available_out, fee)
        } else {
            let amount_out = amount_out_from_in(net, bin.price, a2b)?.min(available_out);
            (net, amount_out, fee)
        }
    } else {
        let desired_out = amount_remaining.min(available_out);
        let amount_in_used = amount_in_from_out(desired_out, bin.price, a2b)?;
        let fee = crate::math::fee_exclusive(amount_in_used, total_fee_rate)?;
        (amount_in_used, desired_out, fee)
    };

    let protocol_fee = fee_inclusive(fee, protocol_fee_rate)?;

    if a2b {
        bin.amount_a = bin
            .amount_a
            .checked_add(amount_in_used)
            .ok_or(DlmmError::AmountOverflow)?;
        bin.amount_b = bin
            .amount_b
            .checked_sub(amount_out)
            .ok_or(DlmmError::AmountOverflow)?;
    } else {
        bin.amount_b = bin
            .amount_b
            .checked_add(amount_in_used)
            .ok_or(DlmmError::AmountOverflow)?;
        bin.amount_a = bin
            .amount_a
            .checked_sub(amount_out)
            .ok_or(DlmmError::AmountOverflow)?;
    }

    Ok(BinSwapResult {
        amount_in_used,
        amount_out,
        fee,
        protocol_fee,
    })
}

/// Credits an already-net LP fee amount into the bin's growth
/// accumulator for the swapped-in side.
pub fn accrue_lp_fee(bin: &mut Bin, lp_fee: u64, a2b: bool) -> DlmmResult<()> {
    let delta = growth_from_amount(lp_fee, bin.liquidity_supply)?;
    if a2b {
        bin.fee_a_growth_global = bin.fee_a_growth_global.wrapping_add(delta);
    } else {
        bin.fee_b_growth_global = bin.fee_b_growth_global.wrapping_add(delta);
    }
    Ok(())
}

/// Settles a position's bin-level share against a growth delta; floors.
pub fn owed_from_growth_delta(growth_global: u128, growth_snapshot: u128, share: u128) -> u128 {
    let delta = growth_global.wrapping_sub(growth_snapshot);
    amount_from_growth(delta, share)
}

fn bin_score(id: i32) -> i64 {
    (id as i64) + (BIN_ID_OFFSET as i64)
}

fn group_index(id: i32) -> i64 {
    bin_score(id) / BINS_PER_GROUP as i64
}

fn group_offset(id: i32) -> usize {
    (bin_score(id) % BINS_PER_GROUP as i64) as usize
}

#[derive(Clone, Debug, Default)]
struct BinGroup {
    bins: [Option<Bin>; 16],
    used_mask: u16,
}

impl BinGroup {
    fn is_empty(&self) -> bool {
        self.used_mask == 0
    }
}

/// Ordered container of bins grouped in fixed-size groups of 16, keyed
/// by `group_idx = floor((id + 443636) / 16)`.
#[derive(Clone, Debug, Default)]
pub struct BinStore {
    groups: BTreeMap<i64, BinGroup>,
}

impl BinStore {
    pub fn new() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }

    pub fn get(&self, id: i32) -> Option<&Bin> {
        self.groups
            .get(&group_index(id))
            .and_then(|g| g.bins[group_offset(id)].as_ref())
    }

    pub fn get_mut(&mut self, id: i32) -> Option<&mut Bin> {
        self.groups
            .get_mut(&group_index(id))
            .and_then(|g| g.bins[group_offset(id)].as_mut())
    }

    /// Fetches a bin, inserting an empty one at `price` if none exists.
    pub fn get_or_insert(&mut self, id: i32, price: u128) -> DlmmResult<&mut Bin> {
        if !(MIN_BIN_ID..=MAX_BIN_ID).contains(&id) {
            return Err(DlmmError::BinIdRange);
        }
        let offset = group_offset(id);
        let group = self.groups.entry(group_index(id)).or_default();
        if group.bins[offset].is_none() {
            group.bins[offset] = Some(Bin::new(id, price));
            group.used_mask |= 1 << offset;
        }
        Ok(group.bins[offset].as_mut().unwrap())
    }

    /// Removes a bin once its liquidity supply and inventory are both
    /// zero; drops the owning group once its mask hits zero.
    pub fn remove_if_empty(&mut self, id: i32) {
        let gi = group_index(id);
        let offset = group_offset(id);
        if let Some(group) = self.groups.get_mut(&gi) {
            let drop_bin = matches!(&group.bins[offset], Some(b) if b.is_empty());
            if drop_bin {
                group.bins[offset] = None;
                group.used_mask &= !(1 << offset);
            }
            if group.is_empty() {
                self.groups.remove(&gi);
            }
        }
    }

    /// Finds the next occupied bin id strictly beyond `from` in the
    /// given direction (`ascending = true` looks upward).
    pub fn next_occupied(&self, from: i32, ascending: bool) -> Option<i32> {
        let from_score = bin_score(from);
        if ascending {
            let start_group = group_index(from);
            for (&gi, group) in self.groups.range(start_group..) {
                if group.is_empty() {
                    continue;
                }
                for offset in 0..16u32 {
                    if group.used_mask & (1 << offset) == 0 {
                        continue;
                    }
                    let score = gi * BINS_PER_GROUP as i64 + offset as i64;
                    if score > from_score {
                        return Some((score - BIN_ID_OFFSET as i64) as i32);
                    }
                }
            }
            None
        } else {
            let start_group = group_index(from);
            for (&gi, group) in self.groups.range(..=start_group).rev() {
                if group.is_empty() {
                    continue;
                }
                for offset in (0..16u32).rev() {
                    if group.used_mask & (1 << offset) == 0 {
                        continue;
                    }
                    let score = gi * BINS_PER_GROUP as i64 + offset as i64;
                    if score < from_score {
                        return Some((score - BIN_ID_OFFSET as i64) as i32);
                    }
                }
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_bin_exact_in_scenario() {
        let mut bin = Bin::new(0, 1u128 << 64);
        bin.amount_a = 1_000_000;
        bin.amount_b = 500_000;
        let result = swap_one_bin(&mut bin, 200_000, true, true, 30_000, 0).unwrap();
        assert_eq!(result.amount_out, 199_994);
        assert_eq!(result.fee, 6);
    }

    #[test]
    fn bin_store_seeks_next_occupied_ascending() {
        let mut store = BinStore::new();
        store.get_or_insert(5, 1u128 << 64).unwrap().amount_a = 1;
        store.get_or_insert(10, 1u128 << 64).unwrap().amount_a = 1;
        assert_eq!(store.next_occupied(5, true), Some(10));
        assert_eq!(store.next_occupied(10, true), None);
    }

    #[test]
    fn bin_store_seeks_next_occupied_descending() {
        let mut store = BinStore::new();
        store.get_or_insert(5, 1u128 << 64).unwrap().amount_a = 1;
        store.get_or_insert(-20, 1u128 << 64).unwrap().amount_a = 1;
        assert_eq!(store.next_occupied(5, false), Some(-20));
    }

    #[test]
    fn bin_store_drops_group_when_emptied() {
        let mut store = BinStore::new();
        store.get_or_insert(0, 1u128 << 64).unwrap();
        assert!(store.get(0).is_some());
        store.remove_if_empty(0);
        assert!(store.get(0).is_none());
        assert!(store.groups.is_empty());
    }

    use rstest::rstest;

    #[rstest]
    #[case(100_000, true, true, 0)]
    #[case(500_000, true, true, 0)]
    #[case(1_000_000, true, true, 0)]
    #[case(100_000, false, true, 0)]
    #[case(500_000, false, true, 0)]
    #[case(200_000, true, false, 0)]
    #[case(200_000, true, true, 30_000)]
    fn swap_one_bin_never_exceeds_available_liquidity(
        #[case] amount: u64,
        #[case] a2b: bool,
        #[case] by_amount_in: bool,
        #[case] fee_rate: u64,
    ) {
        let mut bin = Bin::new(0, 1u128 << 64);
        bin.amount_a = 1_000_000;
        bin.amount_b = 1_000_000;
        let available = bin.available_out(a2b);

        let result = swap_one_bin(&mut bin, amount, a2b, by_amount_in, fee_rate, 0).unwrap();
        assert!(result.amount_out <= available);
        if by_amount_in {
            assert!(result.amount_in_used + result.fee <= amount);
        } else {
            assert!(result.amount_out <= amount);
        }
    }
}
