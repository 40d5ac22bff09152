// SPDX-License-Identifier: CC0-1.0
//
//! Branch and bound coin selection.
//!
//! This module introduces the branch and bound selection algorithm, the only solver that
//! produces changeless transactions: it searches for a combination of inputs whose
//! effective value lands in the window between the target and the target plus the cost of
//! a change output, so the leftover can go to fees instead of creating change.

use bitcoin::{Amount, SignedAmount};

use crate::output_group::OutputGroup;
use crate::result::{SelectionAlgorithm, SelectionResult};

// Bound on the number of visited nodes before the search settles for the best candidate
// found so far.
const TOTAL_TRIES: usize = 100_000;

/// Performs a depth first branch and bound search for a combination of output groups whose
/// summed effective value falls within `[target, target + cost_of_change]`.
///
/// The search traverses a binary tree with a maximum depth of the pool size, where the left
/// branch of each node includes a group and the right branch excludes it. Branches are cut
/// when the remaining groups cannot reach the target anymore, when the running sum
/// overshoots the window (every group contributes positive value, so any superset would
/// overshoot too), and when the running waste can only get worse. Among the combinations
/// that land in the window, the one with the lowest waste wins.
///
/// Every group in `utxo_pool` must have a strictly positive selection amount; the pool is
/// reordered in place.
///
/// Returns `None` when no combination lands in the window within the node budget, or when
/// the pool cannot reach the target at all.
pub fn select_coins_bnb(
    utxo_pool: &mut [OutputGroup],
    selection_target: Amount,
    cost_of_change: Amount,
) -> Option<SelectionResult> {
    let target = selection_target.to_signed().ok()?;
    let upper_bound = target.checked_add(cost_of_change.to_signed().ok()?)?;

    let mut available_value = SignedAmount::ZERO;
    for group in utxo_pool.iter() {
        assert!(
            group.selection_amount() > SignedAmount::ZERO,
            "branch and bound requires positive-value groups"
        );
        available_value = available_value.checked_add(group.selection_amount())?;
    }
    if available_value < target {
        return None;
    }

    utxo_pool.sort_by(|a, b| b.selection_amount().cmp(&a.selection_amount()));

    // The waste of including a group is its fee minus its long term fee; in a low fee
    // environment that difference is negative and adding inputs can lower the total.
    let is_feerate_high = utxo_pool[0].fee > utxo_pool[0].long_term_fee;

    let mut curr_value = SignedAmount::ZERO;
    let mut curr_waste = SignedAmount::ZERO;
    let mut curr_selection: Vec<usize> = Vec::new();
    let mut best_selection: Vec<usize> = Vec::new();
    let mut best_waste = SignedAmount::MAX_MONEY;

    let mut index = 0;
    let mut tries = 0;
    while tries < TOTAL_TRIES {
        let mut backtrack = false;

        if curr_value + available_value < target
            // Exceeding the window cannot be repaired by descending further: every
            // remaining group only adds value.
            || curr_value > upper_bound
            // Once a candidate exists, a path whose waste already exceeds the best can
            // only improve in a low fee environment where utxo waste is negative.
            || (curr_waste > best_waste && is_feerate_high)
        {
            backtrack = true;
        } else if curr_value >= target {
            // The window is hit. The excess is what this candidate gives up to fees;
            // descending further could only burn more value, so record and backtrack.
            let excess = curr_value - target;
            curr_waste += excess;
            if curr_waste <= best_waste {
                best_selection.clone_from(&curr_selection);
                best_waste = curr_waste;
                if best_waste == SignedAmount::ZERO {
                    break;
                }
            }
            curr_waste -= excess;
            backtrack = true;
        }

        if backtrack {
            if curr_selection.is_empty() {
                // Every branch from the first group has been traversed.
                break;
            }

            // Restore the lookahead for the groups passed over since the last inclusion,
            // then turn that inclusion into an exclusion.
            loop {
                index -= 1;
                if index <= *curr_selection.last().unwrap() {
                    break;
                }
                available_value += utxo_pool[index].selection_amount();
            }
            debug_assert_eq!(index, *curr_selection.last().unwrap());

            let group = &utxo_pool[index];
            curr_value -= group.selection_amount();
            curr_waste -= group.fee - group.long_term_fee;
            curr_selection.pop();
        } else {
            let group = &utxo_pool[index];
            available_value -= group.selection_amount();

            // A group whose value and fee match the previously excluded sibling would
            // explore an equivalent subtree; skip straight to its exclusion branch.
            if curr_selection.last().map_or(true, |&last| {
                index - 1 == last
                    || utxo_pool[index].selection_amount() != utxo_pool[index - 1].selection_amount()
                    || utxo_pool[index].fee != utxo_pool[index - 1].fee
            }) {
                curr_selection.push(index);
                curr_value += group.selection_amount();
                curr_waste += group.fee - group.long_term_fee;
            }
        }

        index += 1;
        tries += 1;
    }

    if best_selection.is_empty() {
        return None;
    }

    let mut result = SelectionResult::new(selection_target, SelectionAlgorithm::Bnb);
    for i in &best_selection {
        result.add_input(&utxo_pool[*i]);
    }
    result.compute_and_set_waste(Amount::ZERO, Amount::ZERO, Amount::ZERO);
    debug_assert_eq!(best_waste, result.waste());

    Some(result)
}
