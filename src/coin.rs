// SPDX-License-Identifier: CC0-1.0
//
//! Candidate outputs.
//!
//! This module introduces [`Utxo`], an unspent transaction output under consideration for
//! funding a new transaction, along with the [`OutputType`] classification used to key the
//! group index.

use std::cmp::Ordering;
use std::fmt;

use bitcoin::{Amount, FeeRate, OutPoint, SignedAmount, TxOut, Weight};

/// The script class an output pays to.
///
/// Selection keeps per-type group lists so that a transaction can be funded with inputs of a
/// single type, which avoids revealing that several script types belong to the same wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutputType {
    /// Pay-to-pubkey-hash and other pre-segwit scripts.
    Legacy,
    /// Segwit programs nested in pay-to-script-hash.
    P2shSegwit,
    /// Native segwit v0 programs.
    Bech32,
    /// Taproot (segwit v1) programs.
    Bech32m,
    /// Anything the wallet could not classify.
    Unknown,
}

/// A UTXO under consideration for use in funding a new transaction.
///
/// Constructed once from a wallet snapshot and treated as immutable afterwards; groups and
/// selection results share it by reference counting. Identity is the outpoint: two `Utxo`s
/// compare equal exactly when they refer to the same output on chain.
#[derive(Debug, Clone)]
pub struct Utxo {
    /// The outpoint identifying this UTXO.
    pub outpoint: OutPoint,
    /// The output itself.
    pub output: TxOut,
    /// Depth in the block chain.
    ///
    /// If > 0: the tx is on chain and has this many confirmations.
    /// If = 0: the tx is waiting for confirmation.
    /// If < 0: a conflicting tx is on chain and has this many confirmations.
    pub depth: i32,
    /// Pre-computed estimated weight of this output as a fully-signed input in a transaction,
    /// or `None` if it could not be calculated.
    pub input_weight: Option<Weight>,
    /// Whether the wallet holds the private keys to spend this output.
    pub spendable: bool,
    /// Whether the wallet knows how to spend this output, ignoring the lack of keys.
    pub solvable: bool,
    /// Whether this output is considered safe to spend. Unconfirmed transactions from outside
    /// keys and unconfirmed replacement transactions are considered unsafe and will not be
    /// used to fund new spending transactions.
    pub safe: bool,
    /// The smart time of the transaction containing this output.
    pub time: i64,
    /// Whether the transaction containing this output was sent from the owning wallet.
    pub from_me: bool,
    /// The fee required to spend this output at the transaction's target feerate.
    fee: SignedAmount,
    /// The fee required to spend this output at the consolidation feerate.
    long_term_fee: SignedAmount,
    /// The output's value minus the fee required to spend it.
    effective_value: SignedAmount,
}

impl Utxo {
    /// Creates a new `Utxo`, deriving both fees from the supplied feerates.
    ///
    /// An unknown `input_weight` yields zero fees, since the cost of spending the output
    /// cannot be estimated. Returns `None` if a fee computation overflows.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        outpoint: OutPoint,
        output: TxOut,
        depth: i32,
        input_weight: Option<Weight>,
        spendable: bool,
        solvable: bool,
        safe: bool,
        time: i64,
        from_me: bool,
        fee_rate: FeeRate,
        long_term_fee_rate: FeeRate,
    ) -> Option<Utxo> {
        let fee = match input_weight {
            Some(weight) => fee_rate.checked_mul_by_weight(weight)?,
            None => Amount::ZERO,
        };
        let long_term_fee = match input_weight {
            Some(weight) => long_term_fee_rate.checked_mul_by_weight(weight)?,
            None => Amount::ZERO,
        };
        let fee = fee.to_signed().ok()?;
        let long_term_fee = long_term_fee.to_signed().ok()?;
        let effective_value = output.value.to_signed().ok()?.checked_sub(fee)?;

        Some(Utxo {
            outpoint,
            output,
            depth,
            input_weight,
            spendable,
            solvable,
            safe,
            time,
            from_me,
            fee,
            long_term_fee,
            effective_value,
        })
    }

    /// Creates a new `Utxo` with explicit fees instead of feerates.
    ///
    /// # Panics
    ///
    /// Panics when a fee is given for an output whose input weight is unknown; without a
    /// weight estimate the spend fee cannot have been computed.
    #[allow(clippy::too_many_arguments)]
    pub fn with_fee(
        outpoint: OutPoint,
        output: TxOut,
        depth: i32,
        input_weight: Option<Weight>,
        spendable: bool,
        solvable: bool,
        safe: bool,
        time: i64,
        from_me: bool,
        fee: Amount,
        long_term_fee: Amount,
    ) -> Utxo {
        assert!(
            input_weight.is_some() || fee == Amount::ZERO,
            "fee given for an output with unknown input weight"
        );
        let fee = fee.to_signed().expect("fee exceeds the maximum amount");
        let long_term_fee = long_term_fee.to_signed().expect("fee exceeds the maximum amount");
        let effective_value =
            output.value.to_signed().expect("value exceeds the maximum amount") - fee;

        Utxo {
            outpoint,
            output,
            depth,
            input_weight,
            spendable,
            solvable,
            safe,
            time,
            from_me,
            fee,
            long_term_fee,
            effective_value,
        }
    }

    /// Returns the raw value of the output.
    pub fn value(&self) -> Amount { self.output.value }

    /// Returns the fee to spend this output at the target feerate.
    pub fn fee(&self) -> SignedAmount { self.fee }

    /// Returns the fee to spend this output at the consolidation feerate.
    pub fn long_term_fee(&self) -> SignedAmount { self.long_term_fee }

    /// Returns the value of the output after deducting the cost of spending it.
    pub fn effective_value(&self) -> SignedAmount { self.effective_value }
}

impl PartialEq for Utxo {
    fn eq(&self, other: &Self) -> bool { self.outpoint == other.outpoint }
}

impl Eq for Utxo {}

impl PartialOrd for Utxo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for Utxo {
    fn cmp(&self, other: &Self) -> Ordering { self.outpoint.cmp(&other.outpoint) }
}

impl fmt::Display for Utxo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}) [{}]",
            self.outpoint.txid, self.outpoint.vout, self.depth, self.output.value
        )
    }
}
