//! Error taxonomy of the ledger engine
//!
//! [`LedgerError`] covers every rejection a caller can recover from: bad
//! input never mutates shared state. [`InvariantViolation`] is reserved for
//! internal corruption and should be treated as fatal.

use thiserror::Error;

use crate::core::transaction::Outpoint;
use crate::crypto::KeyError;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Recoverable validation and submission failures
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Output {0} is already spent or does not exist")]
    DoubleSpendOrUnknownInput(Outpoint),
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u128, available: u128 },
    #[error("Invalid transaction: {0}")]
    InvalidTx(String),
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Stale tip: block builds on {found}, current tip is {expected}")]
    StaleTip { expected: String, found: String },
    #[error("Mempool full ({0} transactions)")]
    MempoolFull(usize),
    #[error("No validator with non-zero stake and a known key")]
    NoEligibleValidator,
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
}

/// Broken internal invariants (state disagreeing with itself)
#[derive(Error, Debug)]
pub enum InvariantViolation {
    #[error("UTXO set diverges from chain replay: {live} live entries vs {replayed} replayed")]
    UtxoSetDivergence { live: usize, replayed: usize },
    #[error("Block {height} does not link to its parent")]
    BrokenLink { height: u64 },
    #[error("Block {height} merkle root does not match its transactions")]
    MerkleMismatch { height: u64 },
    #[error("Chain has no genesis block")]
    MissingGenesis,
}
