// SPDX-License-Identifier: CC0-1.0
//
//! Single random draw coin selection.

use bitcoin::{Amount, SignedAmount};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::output_group::OutputGroup;
use crate::result::{SelectionAlgorithm, SelectionResult};

/// Selects output groups uniformly at random, without replacement, until their summed
/// effective value meets `target_value`.
///
/// The caller is expected to have inflated the target with the change fee and a minimum
/// change amount, since a draw stops as soon as it crosses the target and therefore always
/// produces change. Every group in `utxo_pool` must have a positive selection amount.
///
/// Returns `None` when the pool is exhausted before the target is met.
pub fn select_coins_srd<R: Rng + ?Sized>(
    utxo_pool: &[OutputGroup],
    target_value: Amount,
    rng: &mut R,
) -> Option<SelectionResult> {
    let target = target_value.to_signed().ok()?;
    let mut result = SelectionResult::new(target_value, SelectionAlgorithm::Srd);

    let mut indexes: Vec<usize> = (0..utxo_pool.len()).collect();
    indexes.shuffle(rng);

    let mut selected_eff_value = SignedAmount::ZERO;
    for i in indexes {
        let group = &utxo_pool[i];
        debug_assert!(group.selection_amount() > SignedAmount::ZERO);

        selected_eff_value += group.selection_amount();
        result.add_input(group);
        if selected_eff_value >= target {
            return Some(result);
        }
    }

    None
}
