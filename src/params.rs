// SPDX-License-Identifier: CC0-1.0
//
//! Parameters for one round of coin selection.

use bitcoin::Amount;

/// Parameters shared by every solver invocation of a selection round.
///
/// The driver fills this in once per transaction from the recipient set and the fee
/// estimates, then hands it to the selection entry points. Randomness is not carried here;
/// every randomized operation takes its RNG as an explicit argument so that tests can
/// substitute a deterministic generator.
#[derive(Debug, Clone)]
pub struct SelectionParams {
    /// Size of a change output in bytes, determined by the output type.
    pub change_output_size: usize,
    /// Size of the input to spend a change output in virtual bytes.
    pub change_spend_size: usize,
    /// Minimum change to target in the knapsack solver: select coins to cover the payment
    /// and at least this value of change.
    pub min_change_target: Amount,
    /// Minimum amount for creating a change output. If the change budget is smaller, we
    /// forgo the change output entirely.
    pub min_viable_change: Amount,
    /// Cost of creating the change output.
    pub change_fee: Amount,
    /// Cost of creating the change output plus the cost of spending it in the future.
    pub cost_of_change: Amount,
    /// Size of the transaction before coin selection, consisting of the header and
    /// recipient output(s), excluding the inputs and change output(s).
    pub tx_noinputs_size: usize,
    /// Indicates that the fee is subtracted from the outputs. When set, selection works on
    /// raw values instead of effective values.
    pub subtract_fee_outputs: bool,
    /// When true, always spend all (up to [`OUTPUT_GROUP_MAX_ENTRIES`]) or none of the
    /// outputs associated with the same address. This helps reduce privacy leaks resulting
    /// from address reuse.
    ///
    /// [`OUTPUT_GROUP_MAX_ENTRIES`]: crate::OUTPUT_GROUP_MAX_ENTRIES
    pub avoid_partial_spends: bool,
    /// When true, unsafe outputs may be selected: unconfirmed outputs received from other
    /// wallets, unconfirmed replacement transactions, and replaced transactions.
    pub include_unsafe_inputs: bool,
}

impl SelectionParams {
    /// Creates a parameter bundle with everything zeroed out.
    pub fn new() -> SelectionParams {
        SelectionParams {
            change_output_size: 0,
            change_spend_size: 0,
            min_change_target: Amount::ZERO,
            min_viable_change: Amount::ZERO,
            change_fee: Amount::ZERO,
            cost_of_change: Amount::ZERO,
            tx_noinputs_size: 0,
            subtract_fee_outputs: false,
            avoid_partial_spends: false,
            include_unsafe_inputs: false,
        }
    }
}

impl Default for SelectionParams {
    fn default() -> Self { Self::new() }
}

/// Parameters for filtering which [`OutputGroup`]s may be used in coin selection.
///
/// Selection starts very selective, requiring multiple confirmations, and gets more
/// permissive when the transaction cannot be funded. Filters are totally ordered
/// (lexicographically over the fields) so that a filter-to-groups map iterates from the
/// strictest filter to the loosest.
///
/// [`OutputGroup`]: crate::OutputGroup
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EligibilityFilter {
    /// Minimum number of confirmations for outputs that the wallet sent to itself. Spending
    /// our own unconfirmed change is allowed earlier than spending foreign outputs.
    pub conf_mine: i32,
    /// Minimum number of confirmations for outputs received from a different wallet.
    pub conf_theirs: i32,
    /// Maximum number of unconfirmed ancestors aggregated across all UTXOs in a group.
    pub max_ancestors: usize,
    /// Maximum number of descendants that a single UTXO in a group may have.
    pub max_descendants: usize,
    /// When address reuse is avoided and there are full groups, whether partial groups may
    /// be used as well. Consulted by the indexer, not by the filter predicate itself.
    pub include_partial_groups: bool,
}

impl EligibilityFilter {
    /// Creates a filter whose descendant limit equals the ancestor limit.
    pub fn new(conf_mine: i32, conf_theirs: i32, max_ancestors: usize) -> EligibilityFilter {
        EligibilityFilter {
            conf_mine,
            conf_theirs,
            max_ancestors,
            max_descendants: max_ancestors,
            include_partial_groups: false,
        }
    }
}
