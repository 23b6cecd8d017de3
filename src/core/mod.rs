//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Addresses (Base58Check over a public key hash)
//! - Transactions (UTXO model, signed per input)
//! - UTXO set and read-only views over it
//! - Transaction validation
//! - Blocks (merkle-committed, consensus sealed)
//! - Chain (atomic append, invariant checks)

pub mod address;
pub mod block;
pub mod blockchain;
pub mod error;
pub mod transaction;
pub mod utxo;
pub mod validation;

pub use address::Address;
pub use block::{
    compute_merkle_root, verify_inclusion, Block, BlockHeader, Seal, BLOCK_VERSION,
    GENESIS_PREVIOUS_HASH, MAX_BLOCK_TXS,
};
pub use blockchain::{Chain, ChainRecord, ChainStats};
pub use error::{InvariantViolation, LedgerError, LedgerResult};
pub use transaction::{
    Outpoint, Transaction, TransactionBuilder, TxInput, TxOutput, MAX_AMOUNT,
};
pub use utxo::{get_balance, PendingView, Utxo, UtxoSet, UtxoView};
pub use validation::validate_transaction;
