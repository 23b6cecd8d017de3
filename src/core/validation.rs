//! Transaction validation
//!
//! One pure check shared by mempool admission and block application. The
//! checks run in a fixed order and stop at the first failure:
//!
//! 1. structure (non-empty inputs and outputs, id matches content)
//! 2. every input is unspent in the view
//! 3. every input is signed by the key that owns the output
//! 4. no outpoint is spent twice inside the transaction
//! 5. outputs do not exceed inputs
//! 6. every amount and total stays within [`MAX_AMOUNT`]
//!
//! On success the fee (inputs minus outputs) is returned.

use std::collections::HashSet;

use log::debug;

use crate::core::address::Address;
use crate::core::error::{LedgerError, LedgerResult};
use crate::core::transaction::{Transaction, MAX_AMOUNT};
use crate::core::utxo::UtxoView;
use crate::crypto::SignatureVerifier;

/// Validate `tx` against a snapshot of spendable outputs
pub fn validate_transaction(
    tx: &Transaction,
    utxos: &dyn UtxoView,
    verifier: &dyn SignatureVerifier,
) -> LedgerResult<u64> {
    // 1. Structure
    if tx.inputs.is_empty() {
        return Err(LedgerError::InvalidTx("transaction has no inputs".to_string()));
    }
    if tx.outputs.is_empty() {
        return Err(LedgerError::InvalidTx("transaction has no outputs".to_string()));
    }
    if !tx.has_valid_id() {
        return Err(LedgerError::InvalidTx(format!(
            "id {} does not match transaction content",
            tx.id
        )));
    }

    // 2. Every referenced output is unspent
    let mut referenced = Vec::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        let utxo = utxos
            .get(&input.outpoint)
            .ok_or_else(|| LedgerError::DoubleSpendOrUnknownInput(input.outpoint.clone()))?;
        referenced.push(utxo);
    }

    // 3. Each input is authorized by the owner of the output it spends
    let signing_hash = tx.signing_hash();
    for (input, utxo) in tx.inputs.iter().zip(&referenced) {
        let owner_matches = Address::from_public_key_hex(&input.public_key)
            .map(|address| address == utxo.owner)
            .unwrap_or(false);

        if !owner_matches || !verifier.verify(&input.public_key, &signing_hash, &input.signature)
        {
            debug!("rejecting {}: bad signature on {}", tx.id, input.outpoint);
            return Err(LedgerError::InvalidSignature);
        }
    }

    // 4. No outpoint spent twice within the transaction
    let mut seen = HashSet::with_capacity(tx.inputs.len());
    for outpoint in tx.spent_outpoints() {
        if !seen.insert(outpoint) {
            return Err(LedgerError::InvalidTx(format!(
                "outpoint {} spent twice in one transaction",
                outpoint
            )));
        }
    }

    // 5. Conservation of value
    let total_in: u128 = referenced.iter().map(|utxo| utxo.amount as u128).sum();
    let total_out = tx.total_output();
    if total_out > total_in {
        return Err(LedgerError::InsufficientFunds {
            required: total_out,
            available: total_in,
        });
    }

    // 6. Amount range
    if let Some(output) = tx.outputs.iter().find(|o| o.amount > MAX_AMOUNT) {
        return Err(LedgerError::InvalidTx(format!(
            "output amount {} exceeds maximum {}",
            output.amount, MAX_AMOUNT
        )));
    }
    if total_in > MAX_AMOUNT as u128 || total_out > MAX_AMOUNT as u128 {
        return Err(LedgerError::InvalidTx(format!(
            "transaction total exceeds maximum {}",
            MAX_AMOUNT
        )));
    }

    Ok((total_in - total_out) as u64)
}
