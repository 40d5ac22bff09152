// SPDX-License-Identifier: CC0-1.0
//
//! Selection results and the waste metric.
//!
//! Every solver reports its answer as a [`SelectionResult`]: the chosen input set plus
//! enough bookkeeping to compare answers from different algorithms. Comparison happens
//! through the waste metric, which trades the cost of creating and later spending a change
//! output against the excess given up to fees when no change is made, and in both cases
//! charges the difference between spending the inputs now and spending them at the
//! long-term consolidation feerate.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use bitcoin::{Amount, SignedAmount, Weight};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::coin::Utxo;
use crate::output_group::OutputGroup;
use crate::{CHANGE_LOWER, CHANGE_UPPER};

/// The algorithm that produced a selection. The discriminants are stable and suitable for
/// logging.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionAlgorithm {
    /// Branch and bound.
    Bnb = 0,
    /// Knapsack approximation.
    Knapsack = 1,
    /// Single random draw.
    Srd = 2,
    /// Inputs picked by the user.
    Manual = 3,
}

impl fmt::Display for SelectionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            SelectionAlgorithm::Bnb => "bnb",
            SelectionAlgorithm::Knapsack => "knapsack",
            SelectionAlgorithm::Srd => "srd",
            SelectionAlgorithm::Manual => "manual",
        };
        f.write_str(name)
    }
}

fn signed(amount: Amount) -> SignedAmount {
    amount.to_signed().expect("amount exceeds the maximum signed value")
}

/// Computes the waste for a selected input set given the cost of change and the opportunity
/// cost of spending these inputs now instead of in the future.
///
/// If change is made: `waste = change_cost + inputs * (fee - long_term_fee)`.
/// If no change is made: `waste = excess + inputs * (fee - long_term_fee)` where
/// `excess = selected value - target`, the selected value being effective when
/// `use_effective_value` and raw otherwise.
///
/// Whether change exists is the caller's decision, expressed through `change_cost`: zero
/// means no change. Waste can be negative when the current feerate is below the long-term
/// feerate.
///
/// # Panics
///
/// Panics on an empty input set, and when no change is made but the selection does not
/// reach the target.
pub fn selection_waste(
    inputs: &BTreeSet<Rc<Utxo>>,
    change_cost: Amount,
    target: Amount,
    use_effective_value: bool,
) -> SignedAmount {
    // An empty input set means the selection failed; it has no meaningful waste.
    assert!(!inputs.is_empty(), "waste of an empty selection");

    let mut waste = SignedAmount::ZERO;
    let mut selected_value = SignedAmount::ZERO;
    for coin in inputs {
        waste += coin.fee() - coin.long_term_fee();
        selected_value += if use_effective_value {
            coin.effective_value()
        } else {
            // raw value, recovered as effective value plus fee
            coin.effective_value() + coin.fee()
        };
    }

    if change_cost > Amount::ZERO {
        waste += signed(change_cost);
    } else {
        let excess = selected_value - signed(target);
        assert!(excess >= SignedAmount::ZERO, "changeless selection below target");
        waste += excess;
    }

    waste
}

/// Chooses a random change target to make it harder to fingerprint the wallet based on the
/// change output values of the transactions it creates.
///
/// The target covers at least the change fee and adds a random value on top, drawn between
/// [`CHANGE_LOWER`] and `min(2 * payment_value, `[`CHANGE_UPPER`]`)`. For payments at or
/// below half of [`CHANGE_LOWER`] the added value is fixed at [`CHANGE_LOWER`].
///
/// Making change amounts resemble the payment amount disguises which output is the payment
/// and breaks analysis heuristics that assume the selected coins are just sufficient to
/// cover the payment ("unnecessary input" heuristic), at the cost of sometimes requiring
/// more inputs.
pub fn generate_change_target<R: Rng + ?Sized>(
    payment_value: Amount,
    change_fee: Amount,
    rng: &mut R,
) -> Amount {
    if payment_value.checked_mul(2).map_or(false, |doubled| doubled <= CHANGE_LOWER) {
        return change_fee + CHANGE_LOWER;
    }

    let upper_bound =
        payment_value.checked_mul(2).map_or(CHANGE_UPPER, |doubled| doubled.min(CHANGE_UPPER));
    let added = rng.gen_range(CHANGE_LOWER.to_sat()..=upper_bound.to_sat());
    change_fee + Amount::from_sat(added)
}

/// The outcome of a selection attempt: the chosen inputs and the bookkeeping needed to
/// compare outcomes across algorithms.
///
/// A result moves through three states: empty, inputs added, waste computed. Merging two
/// results or clearing one drops it back to an earlier state and invalidates any cached
/// waste.
#[derive(Debug, Clone)]
pub struct SelectionResult {
    /// Set of inputs selected by the algorithm, ordered by outpoint.
    selected_inputs: BTreeSet<Rc<Utxo>>,
    /// The target the algorithm selected for. Equal to the recipient amount plus non-input
    /// fees.
    target: Amount,
    /// The algorithm that produced this result.
    algo: SelectionAlgorithm,
    /// Whether computations on this result use effective values (true) or raw values
    /// (false).
    use_effective: bool,
    /// The computed waste, if [`compute_and_set_waste`] ran since the inputs last changed.
    ///
    /// [`compute_and_set_waste`]: SelectionResult::compute_and_set_waste
    waste: Option<SignedAmount>,
    /// Total weight of the selected inputs.
    weight: Weight,
}

impl SelectionResult {
    /// Creates an empty result for the given target.
    pub fn new(target: Amount, algo: SelectionAlgorithm) -> SelectionResult {
        SelectionResult {
            selected_inputs: BTreeSet::new(),
            target,
            algo,
            use_effective: false,
            waste: None,
            weight: Weight::ZERO,
        }
    }

    fn insert_inputs<I: IntoIterator<Item = Rc<Utxo>>>(&mut self, inputs: I) {
        for coin in inputs {
            assert!(
                self.selected_inputs.insert(coin),
                "shared UTXOs among selection results"
            );
        }
    }

    /// Adds every UTXO of a group to this result.
    ///
    /// # Panics
    ///
    /// Panics when any of the group's UTXOs is already part of the result.
    pub fn add_input(&mut self, group: &OutputGroup) {
        self.insert_inputs(group.outputs.iter().map(Rc::clone));
        self.use_effective = !group.subtract_fee_outputs;
        self.weight += group.weight;
    }

    /// Adds a set of UTXOs to this result.
    ///
    /// # Panics
    ///
    /// Panics when any of the UTXOs is already part of the result.
    pub fn add_inputs(&mut self, inputs: &BTreeSet<Rc<Utxo>>, subtract_fee_outputs: bool) {
        self.insert_inputs(inputs.iter().map(Rc::clone));
        self.use_effective = !subtract_fee_outputs;
        self.weight += inputs
            .iter()
            .map(|coin| coin.input_weight.unwrap_or(Weight::ZERO))
            .fold(Weight::ZERO, |sum, weight| sum + weight);
    }

    /// Combines another selection result into this one: inputs are unioned, targets and
    /// weights are summed, and any cached waste is invalidated since it no longer describes
    /// the combined set. A manual receiver adopts the other result's algorithm tag.
    ///
    /// # Panics
    ///
    /// Panics when the two results share a UTXO.
    pub fn merge(&mut self, other: SelectionResult) {
        let SelectionResult { selected_inputs, target, algo, use_effective, waste: _, weight } =
            other;
        self.insert_inputs(selected_inputs);

        self.target += target;
        self.use_effective |= use_effective;
        if self.algo == SelectionAlgorithm::Manual {
            self.algo = algo;
        }
        self.weight += weight;
        self.waste = None;
    }

    /// Drops all inputs and cached values, leaving an empty result for the same target.
    pub fn clear(&mut self) {
        self.selected_inputs.clear();
        self.waste = None;
        self.weight = Weight::ZERO;
    }

    /// Returns the sum of the raw input values.
    pub fn selected_value(&self) -> Amount {
        self.selected_inputs.iter().map(|coin| coin.value()).fold(Amount::ZERO, |sum, v| sum + v)
    }

    /// Returns the sum of the effective input values.
    pub fn selected_effective_value(&self) -> SignedAmount {
        self.selected_inputs
            .iter()
            .map(|coin| coin.effective_value())
            .fold(SignedAmount::ZERO, |sum, v| sum + v)
    }

    /// Computes and caches the waste of this selection.
    ///
    /// Whether change is made is decided here: the change budget left after the target and
    /// the change fee must reach `min_viable_change`, otherwise the excess is given up to
    /// fees and the no-change branch of the waste formula applies.
    pub fn compute_and_set_waste(
        &mut self,
        min_viable_change: Amount,
        change_cost: Amount,
        change_fee: Amount,
    ) {
        let change = self.get_change(min_viable_change, change_fee);
        let change_cost = if change > Amount::ZERO { change_cost } else { Amount::ZERO };
        self.waste =
            Some(selection_waste(&self.selected_inputs, change_cost, self.target, self.use_effective));
    }

    /// Returns the computed waste.
    ///
    /// # Panics
    ///
    /// Panics when the waste has not been computed since the inputs last changed.
    pub fn waste(&self) -> SignedAmount {
        self.waste.expect("waste queried before computation")
    }

    /// Orders results by ascending waste. A result whose waste has not been computed sorts
    /// after every result whose waste has.
    pub fn cmp_waste(&self, other: &SelectionResult) -> Ordering {
        let own = self.waste.unwrap_or(SignedAmount::MAX_MONEY);
        let others = other.waste.unwrap_or(SignedAmount::MAX_MONEY);
        own.cmp(&others)
    }

    /// Returns the amount for the change output after paying the needed fees.
    ///
    /// The change amount is not fully precise due to discrepancies in fee calculation: the
    /// final change should be corrected once the final transaction fee is known, and most of
    /// the time ends up slightly bigger than estimated. Returns zero when the change budget
    /// falls below `min_viable_change`.
    pub fn get_change(&self, min_viable_change: Amount, change_fee: Amount) -> Amount {
        // With fees subtracted from the outputs the inputs pay no fees, so the raw value is
        // compared; otherwise the effective value already covers the input fees and the
        // change output pays for itself.
        let change = if self.use_effective {
            self.selected_effective_value() - signed(self.target) - signed(change_fee)
        } else {
            signed(self.selected_value()) - signed(self.target)
        };

        if change < signed(min_viable_change) {
            Amount::ZERO
        } else {
            change.to_unsigned().expect("change is non-negative")
        }
    }

    /// Returns the selected input set.
    pub fn input_set(&self) -> &BTreeSet<Rc<Utxo>> { &self.selected_inputs }

    /// Returns the selected inputs in a uniformly random order, ready to fill a
    /// transaction's input vector without leaking the selection order.
    pub fn shuffled_inputs<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Rc<Utxo>> {
        let mut coins: Vec<Rc<Utxo>> = self.selected_inputs.iter().map(Rc::clone).collect();
        coins.shuffle(rng);
        coins
    }

    /// Returns the target this result selected for.
    pub fn target(&self) -> Amount { self.target }

    /// Returns the algorithm that produced this result.
    pub fn algo(&self) -> SelectionAlgorithm { self.algo }

    /// Returns the total weight of the selected inputs.
    pub fn weight(&self) -> Weight { self.weight }
}

#[cfg(test)]
mod tests {
    use rand::rngs::mock::StepRng;

    use super::*;
    use crate::tests::{build_group_from, build_utxo_with_fees, utxo_params};

    fn group_of(values: &[u64]) -> OutputGroup {
        build_group_from(0, values.iter().map(|v| Amount::from_sat(*v)))
    }

    #[test]
    fn waste_with_change() {
        let params = utxo_params();
        let mut group = OutputGroup::new(&params);
        group.insert(&build_utxo_with_fees(0, Amount::from_sat(2_000), 100, 40), 0, 0);
        group.insert(&build_utxo_with_fees(1, Amount::from_sat(3_000), 100, 40), 0, 0);

        let mut result = SelectionResult::new(Amount::from_sat(3_000), SelectionAlgorithm::Manual);
        result.add_input(&group);

        // change = 4800 - 3000 - 0 >= min_viable, so waste = change_cost + fee diff
        result.compute_and_set_waste(Amount::from_sat(100), Amount::from_sat(250), Amount::ZERO);
        assert_eq!(result.waste(), SignedAmount::from_sat(250 + 2 * (100 - 40)));
    }

    #[test]
    fn waste_without_change_counts_excess() {
        let params = utxo_params();
        let mut group = OutputGroup::new(&params);
        group.insert(&build_utxo_with_fees(0, Amount::from_sat(2_000), 100, 40), 0, 0);

        let mut result = SelectionResult::new(Amount::from_sat(1_850), SelectionAlgorithm::Manual);
        result.add_input(&group);

        // change budget of 50 is below min_viable_change, excess goes to fees
        result.compute_and_set_waste(Amount::from_sat(100), Amount::from_sat(250), Amount::ZERO);
        assert_eq!(result.waste(), SignedAmount::from_sat(50 + (100 - 40)));
    }

    #[test]
    fn waste_can_be_negative_in_low_fee_environment() {
        let params = utxo_params();
        let mut group = OutputGroup::new(&params);
        group.insert(&build_utxo_with_fees(0, Amount::from_sat(2_000), 40, 100), 0, 0);

        let mut result = SelectionResult::new(Amount::from_sat(1_960), SelectionAlgorithm::Manual);
        result.add_input(&group);

        result.compute_and_set_waste(Amount::from_sat(100), Amount::from_sat(250), Amount::ZERO);
        assert_eq!(result.waste(), SignedAmount::from_sat(-60));
    }

    #[test]
    fn merge_unions_disjoint_results() {
        let mut a = SelectionResult::new(Amount::from_sat(100), SelectionAlgorithm::Bnb);
        a.add_input(&group_of(&[300]));
        a.compute_and_set_waste(Amount::ZERO, Amount::ZERO, Amount::ZERO);

        let mut b = SelectionResult::new(Amount::from_sat(200), SelectionAlgorithm::Srd);
        b.add_input(&build_group_from(10, [Amount::from_sat(400)]));

        let weight_before = a.weight() + b.weight();
        a.merge(b);

        assert_eq!(a.input_set().len(), 2);
        assert_eq!(a.target(), Amount::from_sat(300));
        assert_eq!(a.weight(), weight_before);

        // merging invalidated the cached waste
        let unordered = SelectionResult::new(Amount::ZERO, SelectionAlgorithm::Manual);
        assert_eq!(a.cmp_waste(&unordered), Ordering::Equal);
    }

    #[test]
    #[should_panic(expected = "shared UTXOs")]
    fn merge_rejects_shared_inputs() {
        let group = group_of(&[300]);

        let mut a = SelectionResult::new(Amount::from_sat(100), SelectionAlgorithm::Bnb);
        a.add_input(&group);

        let mut b = SelectionResult::new(Amount::from_sat(100), SelectionAlgorithm::Srd);
        b.add_input(&group.clone());

        a.merge(b);
    }

    #[test]
    #[should_panic(expected = "waste queried before computation")]
    fn waste_requires_computation() {
        let mut result = SelectionResult::new(Amount::from_sat(100), SelectionAlgorithm::Manual);
        result.add_input(&group_of(&[300]));
        result.waste();
    }

    #[test]
    fn get_change_deducts_fee() {
        let mut result = SelectionResult::new(Amount::from_sat(100), SelectionAlgorithm::Knapsack);
        result.add_input(&group_of(&[500]));

        assert_eq!(result.get_change(Amount::ZERO, Amount::from_sat(30)), Amount::from_sat(370));
        assert_eq!(result.get_change(Amount::from_sat(400), Amount::from_sat(30)), Amount::ZERO);
    }

    #[test]
    fn shuffled_inputs_is_a_permutation() {
        let mut result = SelectionResult::new(Amount::from_sat(100), SelectionAlgorithm::Srd);
        result.add_input(&group_of(&[100, 200, 300, 400]));

        let mut shuffled: Vec<_> =
            result.shuffled_inputs(&mut StepRng::new(0, 1)).iter().map(|c| c.outpoint).collect();
        shuffled.sort();
        let expected: Vec<_> = result.input_set().iter().map(|c| c.outpoint).collect();
        assert_eq!(shuffled, expected);
    }

    #[test]
    fn clear_resets_to_empty() {
        let mut result = SelectionResult::new(Amount::from_sat(100), SelectionAlgorithm::Manual);
        result.add_input(&group_of(&[300]));
        result.compute_and_set_waste(Amount::ZERO, Amount::ZERO, Amount::ZERO);

        result.clear();
        assert!(result.input_set().is_empty());
        assert_eq!(result.weight(), Weight::ZERO);
        assert_eq!(result.target(), Amount::from_sat(100));
    }

    #[test]
    fn change_target_is_deterministic_for_small_payments() {
        let mut rng = StepRng::new(0, 1);
        let target =
            generate_change_target(Amount::from_sat(20_000), Amount::from_sat(500), &mut rng);
        assert_eq!(target, Amount::from_sat(50_500));
    }

    #[test]
    fn change_target_stays_in_bounds() {
        let mut rng = StepRng::new(u64::MAX / 2, 12345);
        for payment in [30_000u64, 100_000, 600_000, 10_000_000] {
            let payment = Amount::from_sat(payment);
            let change_fee = Amount::from_sat(250);
            let target = generate_change_target(payment, change_fee, &mut rng);

            let upper = (payment * 2).min(CHANGE_UPPER);
            assert!(target >= change_fee + CHANGE_LOWER);
            assert!(target <= change_fee + upper);
        }
    }

    #[test]
    fn algorithm_encoding_is_stable() {
        assert_eq!(SelectionAlgorithm::Bnb as u8, 0);
        assert_eq!(SelectionAlgorithm::Knapsack as u8, 1);
        assert_eq!(SelectionAlgorithm::Srd as u8, 2);
        assert_eq!(SelectionAlgorithm::Manual as u8, 3);
        assert_eq!(SelectionAlgorithm::Knapsack.to_string(), "knapsack");
    }

    #[test]
    fn waste_depends_only_on_inputs_and_parameters() {
        let group = group_of(&[1_000, 2_000]);

        let mut a = SelectionResult::new(Amount::from_sat(2_500), SelectionAlgorithm::Bnb);
        a.add_input(&group);
        let mut b = SelectionResult::new(Amount::from_sat(2_500), SelectionAlgorithm::Srd);
        b.add_input(&group.clone());

        a.compute_and_set_waste(Amount::ZERO, Amount::ZERO, Amount::ZERO);
        b.compute_and_set_waste(Amount::ZERO, Amount::ZERO, Amount::ZERO);
        assert_eq!(a.waste(), b.waste());
    }
}
