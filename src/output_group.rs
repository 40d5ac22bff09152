// SPDX-License-Identifier: CC0-1.0
//
//! Grouping of UTXOs paid to the same output script.
//!
//! Outputs paid to an already-used address leak which coins belong together the moment one
//! of them is spent, so selection treats them atomically: either the whole group funds the
//! transaction or none of it does. The [`GroupIndex`] files finished groups per output type
//! and keeps a positive-value-only view next to the unrestricted one, because most solvers
//! only operate on groups that actually contribute value at the current feerate.

use std::cmp;
use std::collections::BTreeMap;
use std::rc::Rc;

use bitcoin::{Amount, SignedAmount, Weight};

use crate::coin::{OutputType, Utxo};
use crate::params::{EligibilityFilter, SelectionParams};

/// Maximum number of UTXOs a single group may hold.
pub const OUTPUT_GROUP_MAX_ENTRIES: usize = 100;

/// A group of UTXOs paid to the same output script.
#[derive(Debug, Clone)]
pub struct OutputGroup {
    /// The UTXOs contained in this group, in insertion order.
    pub outputs: Vec<Rc<Utxo>>,
    /// Whether every UTXO in the group was sent by the wallet to itself. Relevant because we
    /// may want a certain number of confirmations on outputs received from outside wallets
    /// while trusting our own.
    pub from_me: bool,
    /// The total raw value of the UTXOs.
    pub value: Amount,
    /// The minimum number of confirmations across the group. Unconfirmed is 0.
    pub depth: i32,
    /// The aggregated count of unconfirmed ancestors of all UTXOs in this group. Not
    /// deduplicated, so shared ancestors are overcounted.
    pub ancestors: usize,
    /// The maximum count of descendants of a single UTXO in this group.
    pub descendants: usize,
    /// The value of the UTXOs after deducting the cost of spending them at the target
    /// feerate.
    pub effective_value: SignedAmount,
    /// The fee to spend the UTXOs at the target feerate.
    pub fee: SignedAmount,
    /// The fee to spend the UTXOs at the consolidation feerate.
    pub long_term_fee: SignedAmount,
    /// Indicates that the fee is subtracted from the outputs. When set, the value used for
    /// selection is the group's raw value rather than its effective value.
    pub subtract_fee_outputs: bool,
    /// Total weight of the UTXOs in this group as fully-signed inputs.
    pub weight: Weight,
}

impl OutputGroup {
    /// Creates an empty group configured from the selection parameters.
    pub fn new(params: &SelectionParams) -> OutputGroup {
        OutputGroup { subtract_fee_outputs: params.subtract_fee_outputs, ..Default::default() }
    }

    /// Appends a UTXO to the group, folding its value, fees, weight and mempool statistics
    /// into the accumulators.
    ///
    /// `ancestors` is the number of unconfirmed ancestors the new coin ends up having; the
    /// group keeps the sum rather than the maximum, which overestimates when inputs share
    /// ancestors. `descendants` is the count as seen from the top ancestor, kept as the
    /// maximum across the group.
    ///
    /// # Panics
    ///
    /// Panics when the group is already at [`OUTPUT_GROUP_MAX_ENTRIES`].
    pub fn insert(&mut self, output: &Rc<Utxo>, ancestors: usize, descendants: usize) {
        assert!(self.outputs.len() < OUTPUT_GROUP_MAX_ENTRIES, "output group is full");
        self.outputs.push(Rc::clone(output));

        self.fee += output.fee();
        self.long_term_fee += output.long_term_fee();
        self.effective_value += output.effective_value();

        self.from_me &= output.from_me;
        self.value += output.value();
        self.depth = cmp::min(self.depth, output.depth);
        self.ancestors += ancestors;
        self.descendants = cmp::max(self.descendants, descendants);

        if let Some(weight) = output.input_weight {
            self.weight += weight;
        }
    }

    /// Returns whether every predicate of the eligibility filter holds for this group.
    pub fn eligible_for_spending(&self, filter: &EligibilityFilter) -> bool {
        let conf_required = if self.from_me { filter.conf_mine } else { filter.conf_theirs };
        self.depth >= conf_required
            && self.ancestors <= filter.max_ancestors
            && self.descendants <= filter.max_descendants
    }

    /// Returns the amount this group contributes towards a selection target: the raw value
    /// when fees are subtracted from the outputs, the effective value otherwise.
    pub fn selection_amount(&self) -> SignedAmount {
        if self.subtract_fee_outputs {
            // raw value, recovered as effective value plus fee
            self.effective_value + self.fee
        } else {
            self.effective_value
        }
    }
}

impl Default for OutputGroup {
    fn default() -> Self {
        OutputGroup {
            outputs: Vec::new(),
            from_me: true,
            value: Amount::ZERO,
            depth: 999,
            ancestors: 0,
            descendants: 0,
            effective_value: SignedAmount::ZERO,
            fee: SignedAmount::ZERO,
            long_term_fee: SignedAmount::ZERO,
            subtract_fee_outputs: false,
            weight: Weight::ZERO,
        }
    }
}

/// A pair of group lists: one restricted to groups that contribute positive value, one
/// unrestricted.
#[derive(Debug, Clone, Default)]
pub struct Groups {
    /// Groups whose selection amount is strictly positive.
    pub positive_group: Vec<OutputGroup>,
    /// Groups of any selection amount, negative-value dust included.
    pub mixed_group: Vec<OutputGroup>,
}

/// Finished groups, filed per output type and also into a type-agnostic union.
#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    /// Groups keyed by the output type of their script.
    pub groups_by_type: BTreeMap<OutputType, Groups>,
    /// Every inserted group, no type distinction.
    pub all_groups: Groups,
}

impl GroupIndex {
    /// Files a group into the per-type lists and the union, routed by the two insertion
    /// flags. A positive insertion only takes effect when the group's selection amount is
    /// strictly positive; empty groups are ignored entirely.
    pub fn push(
        &mut self,
        group: &OutputGroup,
        output_type: OutputType,
        insert_positive: bool,
        insert_mixed: bool,
    ) {
        if group.outputs.is_empty() {
            return;
        }

        let groups = self.groups_by_type.entry(output_type).or_default();
        if insert_positive && group.selection_amount() > SignedAmount::ZERO {
            groups.positive_group.push(group.clone());
            self.all_groups.positive_group.push(group.clone());
        }
        if insert_mixed {
            groups.mixed_group.push(group.clone());
            self.all_groups.mixed_group.push(group.clone());
        }
    }

    /// Returns how many distinct output types have been filed.
    pub fn types_count(&self) -> usize { self.groups_by_type.len() }
}

/// Eligible groups per filter, iterated from the strictest filter to the loosest.
pub type FilteredOutputGroups = BTreeMap<EligibilityFilter, GroupIndex>;
