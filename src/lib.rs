// SPDX-License-Identifier: CC0-1.0
//
//! Wallet coin selection library.
//!
//! This library composes a set of unspent transaction outputs (UTXOs) that funds a payment
//! while minimizing waste, the economic cost of the selection: the fees of a change output
//! now, the excess given up to fees when no change is made, and the opportunity cost of
//! spending inputs at today's feerate instead of the long-term consolidation feerate.
//!
//! Candidate [`Utxo`]s are aggregated into [`OutputGroup`]s per destination script so that
//! reused addresses are always spent atomically, filed into a [`GroupIndex`] keyed by
//! output type, filtered by increasingly permissive [`EligibilityFilter`]s and handed to
//! the solvers: branch and bound for changeless matches, knapsack and single random draw
//! for selections that make change. Results from different solvers compare by waste.
//!
//! The library performs no I/O and keeps no state; randomness enters exclusively through
//! the `rand` generator passed into each randomized operation, so every code path can be
//! driven deterministically from tests.

// Coding conventions.
#![deny(non_upper_case_globals)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(unused_mut)]
#![deny(missing_docs)]

mod branch_and_bound;
mod coin;
mod knapsack;
mod output_group;
mod params;
mod result;
mod single_random_draw;

use bitcoin::Amount;
use rand::Rng;

pub use crate::branch_and_bound::select_coins_bnb;
pub use crate::coin::{OutputType, Utxo};
pub use crate::knapsack::select_coins_knapsack;
pub use crate::output_group::{
    FilteredOutputGroups, GroupIndex, Groups, OutputGroup, OUTPUT_GROUP_MAX_ENTRIES,
};
pub use crate::params::{EligibilityFilter, SelectionParams};
pub use crate::result::{
    generate_change_target, selection_waste, SelectionAlgorithm, SelectionResult,
};
pub use crate::single_random_draw::select_coins_srd;

/// Lower bound for a randomly chosen target change amount.
pub const CHANGE_LOWER: Amount = Amount::from_sat(50_000);

/// Upper bound for a randomly chosen target change amount.
pub const CHANGE_UPPER: Amount = Amount::from_sat(1_000_000);

/// Runs every solver over the eligible groups and returns the least wasteful result.
///
/// Branch and bound searches the positive groups for a changeless match and scores its own
/// waste. Knapsack runs over the mixed groups, negative-value dust included, keeping its
/// legacy behavior of sweeping such outputs along. Single random draw selects from the
/// positive groups against a target inflated by the change fee and [`CHANGE_LOWER`] so the
/// draw always leaves a usable change output. The results of the latter two are scored with
/// the change parameters of `params`, and the earliest lowest-waste result wins.
///
/// Returns `None` when no solver finds a selection, which callers treat as the cue to retry
/// with a more permissive eligibility filter.
pub fn select_coins<R: Rng + ?Sized>(
    groups: &Groups,
    target_value: Amount,
    params: &SelectionParams,
    rng: &mut R,
) -> Option<SelectionResult> {
    let mut results = Vec::new();

    let mut positive = groups.positive_group.clone();
    if let Some(bnb_result) = select_coins_bnb(&mut positive, target_value, params.cost_of_change)
    {
        results.push(bnb_result);
    }

    let mut mixed = groups.mixed_group.clone();
    if let Some(mut knapsack_result) =
        select_coins_knapsack(&mut mixed, target_value, params.min_change_target, rng)
    {
        knapsack_result.compute_and_set_waste(
            params.min_viable_change,
            params.cost_of_change,
            params.change_fee,
        );
        results.push(knapsack_result);
    }

    let srd_target = target_value.checked_add(params.change_fee)?.checked_add(CHANGE_LOWER)?;
    if let Some(mut srd_result) = select_coins_srd(&groups.positive_group, srd_target, rng) {
        srd_result.compute_and_set_waste(
            params.min_viable_change,
            params.cost_of_change,
            params.change_fee,
        );
        results.push(srd_result);
    }

    results.into_iter().reduce(|best, candidate| {
        if candidate.cmp_waste(&best) == std::cmp::Ordering::Less {
            candidate
        } else {
            best
        }
    })
}
