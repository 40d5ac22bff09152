// SPDX-License-Identifier: CC0-1.0
//
//! Knapsack coin selection.
//!
//! The oldest of the solvers, kept as a fallback for pools where branch and bound finds no
//! changeless combination. It aims above the target by a minimum change amount so the
//! change output that will be created is never dust, and approximates the smallest
//! overshooting subset with a randomized two-phase sweep.

use bitcoin::{Amount, SignedAmount};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::output_group::OutputGroup;
use crate::result::{SelectionAlgorithm, SelectionResult};

// Repetitions of the stochastic sweep within a single approximation run.
const APPROXIMATION_ITERATIONS: usize = 1_000;

// Approximates the smallest subset of `groups` whose summed selection amount reaches
// `target_value`, starting from the full pool (`total_lower`) as the incumbent.
//
// Each repetition sweeps the groups twice: the first phase includes each group on a coin
// flip, the second picks up whatever the first left out. Whenever the running sum crosses
// the target the candidate is scored, and the crossing group is taken back out so the
// sweep keeps probing cheaper combinations. The randomness serves no security purpose; it
// only prevents degenerate behavior when the wallet repeatedly selects over the same pool.
fn approximate_best_subset<R: Rng + ?Sized>(
    rng: &mut R,
    groups: &[OutputGroup],
    total_lower: SignedAmount,
    target_value: SignedAmount,
) -> (Vec<bool>, SignedAmount) {
    let mut best_selection = vec![true; groups.len()];
    let mut best_value = total_lower;

    let mut included = Vec::new();
    for _ in 0..APPROXIMATION_ITERATIONS {
        if best_value == target_value {
            break;
        }

        included.clear();
        included.resize(groups.len(), false);
        let mut total = SignedAmount::ZERO;
        let mut reached_target = false;
        for pass in 0..2 {
            if reached_target {
                break;
            }
            for (i, group) in groups.iter().enumerate() {
                let include = if pass == 0 { rng.gen_bool(0.5) } else { !included[i] };
                if !include {
                    continue;
                }
                total += group.selection_amount();
                included[i] = true;
                if total >= target_value {
                    reached_target = true;
                    if total < best_value {
                        best_value = total;
                        best_selection.clone_from(&included);
                    }
                    total -= group.selection_amount();
                    included[i] = false;
                }
            }
        }
    }

    (best_selection, best_value)
}

/// Selects output groups summing to at least `target_value + change_target`, preferring the
/// smallest total.
///
/// A single group matching the inflated target exactly wins outright. Otherwise the groups
/// below the inflated target are attacked with two independent runs of a stochastic
/// subset approximation, and the cheapest group at or above the inflated target is kept as
/// a fallback; whichever of the two reaches the inflated target with the lower total is
/// returned. Groups may have negative selection amounts; spending such dust along the way
/// is accepted for the sake of cleaning it up.
///
/// Returns `None` when the pool cannot reach `target_value + change_target`.
pub fn select_coins_knapsack<R: Rng + ?Sized>(
    groups: &mut Vec<OutputGroup>,
    target_value: Amount,
    change_target: Amount,
    rng: &mut R,
) -> Option<SelectionResult> {
    let total_target = target_value.checked_add(change_target)?.to_signed().ok()?;
    let mut result = SelectionResult::new(target_value, SelectionAlgorithm::Knapsack);

    groups.shuffle(rng);

    let mut lowest_larger: Option<OutputGroup> = None;
    let mut applicable_groups = Vec::new();
    let mut total_lower = SignedAmount::ZERO;

    for group in groups.iter() {
        let amount = group.selection_amount();
        if amount == total_target {
            result.add_input(group);
            return Some(result);
        } else if amount < total_target {
            applicable_groups.push(group.clone());
            total_lower += amount;
        } else if lowest_larger.as_ref().map_or(true, |l| amount < l.selection_amount()) {
            lowest_larger = Some(group.clone());
        }
    }

    if total_lower == total_target {
        for group in &applicable_groups {
            result.add_input(group);
        }
        return Some(result);
    }

    if total_lower < total_target {
        let group = lowest_larger?;
        result.add_input(&group);
        return Some(result);
    }

    applicable_groups.sort_by(|a, b| b.selection_amount().cmp(&a.selection_amount()));

    let (mut best_selection, mut best_value) =
        approximate_best_subset(rng, &applicable_groups, total_lower, total_target);
    if best_value != total_target {
        let (second_selection, second_value) =
            approximate_best_subset(rng, &applicable_groups, total_lower, total_target);
        if second_value < best_value {
            best_selection = second_selection;
            best_value = second_value;
        }
    }

    // Prefer the single larger group when the approximation overshot by more than the
    // larger group would.
    match lowest_larger {
        Some(ref group)
            if best_value != total_target && group.selection_amount() <= best_value =>
        {
            result.add_input(group);
        }
        _ => {
            for (i, group) in applicable_groups.iter().enumerate() {
                if best_selection[i] {
                    result.add_input(group);
                }
            }
        }
    }

    Some(result)
}

#[cfg(test)]
mod tests {
    use rand::rngs::mock::StepRng;
    use rand::thread_rng;

    use super::*;
    use crate::tests::{build_positive_groups, build_utxo_with_fees, selected_values};

    #[test]
    fn exact_single_group_match() {
        let mut pool = build_positive_groups(&[400, 300, 200]);
        let result = select_coins_knapsack(
            &mut pool,
            Amount::from_sat(300),
            Amount::ZERO,
            &mut thread_rng(),
        )
        .unwrap();

        assert_eq!(selected_values(&result), vec![300]);
        assert_eq!(result.algo(), SelectionAlgorithm::Knapsack);
    }

    #[test]
    fn exact_match_includes_change_target() {
        let mut pool = build_positive_groups(&[400, 300, 200]);
        let result = select_coins_knapsack(
            &mut pool,
            Amount::from_sat(300),
            Amount::from_sat(100),
            &mut thread_rng(),
        )
        .unwrap();

        assert_eq!(selected_values(&result), vec![400]);
    }

    #[test]
    fn whole_lower_pool_match() {
        let mut pool = build_positive_groups(&[100, 200, 300]);
        let result = select_coins_knapsack(
            &mut pool,
            Amount::from_sat(600),
            Amount::ZERO,
            &mut thread_rng(),
        )
        .unwrap();

        assert_eq!(selected_values(&result), vec![300, 200, 100]);
    }

    #[test]
    fn falls_back_to_lowest_larger() {
        let mut pool = build_positive_groups(&[50, 1_000, 2_000]);
        let result = select_coins_knapsack(
            &mut pool,
            Amount::from_sat(500),
            Amount::ZERO,
            &mut thread_rng(),
        )
        .unwrap();

        // the small group cannot reach the target; the cheaper of the two larger ones wins
        assert_eq!(selected_values(&result), vec![1_000]);
    }

    #[test]
    fn approximates_smallest_overshoot() {
        let mut pool = build_positive_groups(&[500, 400, 300, 200, 100]);
        let result = select_coins_knapsack(
            &mut pool,
            Amount::from_sat(550),
            Amount::ZERO,
            &mut thread_rng(),
        )
        .unwrap();

        // 500 + 100 hits 600, the smallest total at or above 550
        assert_eq!(result.selected_effective_value(), SignedAmount::from_sat(600));
    }

    #[test]
    fn insufficient_funds() {
        let mut pool = build_positive_groups(&[100, 200]);
        assert!(select_coins_knapsack(
            &mut pool,
            Amount::from_sat(1_000),
            Amount::ZERO,
            &mut thread_rng(),
        )
        .is_none());
    }

    #[test]
    fn empty_pool_fails() {
        let mut pool = build_positive_groups(&[]);
        assert!(select_coins_knapsack(
            &mut pool,
            Amount::from_sat(100),
            Amount::ZERO,
            &mut StepRng::new(0, 1),
        )
        .is_none());
    }

    #[test]
    fn spends_negative_value_dust_on_the_way() {
        // a group whose fee exceeds its value may still ride along
        let mut pool = build_positive_groups(&[300, 200]);
        let mut dust = OutputGroup::default();
        dust.insert(&build_utxo_with_fees(10, Amount::from_sat(5), 10, 10), 0, 0);
        pool.push(dust);

        let result = select_coins_knapsack(
            &mut pool,
            Amount::from_sat(495),
            Amount::ZERO,
            &mut thread_rng(),
        )
        .unwrap();

        // 300 + 200 - 5 = 495 exactly consumes the dust group as well
        assert_eq!(result.selected_effective_value(), SignedAmount::from_sat(495));
        assert_eq!(result.input_set().len(), 3);
    }

    #[test]
    fn selection_varies_between_runs() {
        let values: Vec<u64> = vec![100_000; 50];
        let target = Amount::from_sat(2_500_000);

        let mut first_pool = build_positive_groups(&values);
        let first = select_coins_knapsack(&mut first_pool, target, Amount::ZERO, &mut thread_rng())
            .unwrap();
        let mut second_pool = build_positive_groups(&values);
        let second =
            select_coins_knapsack(&mut second_pool, target, Amount::ZERO, &mut thread_rng())
                .unwrap();

        let first_outpoints: Vec<_> = first.input_set().iter().map(|c| c.outpoint).collect();
        let second_outpoints: Vec<_> = second.input_set().iter().map(|c| c.outpoint).collect();
        assert_ne!(first_outpoints, second_outpoints);
    }
}
