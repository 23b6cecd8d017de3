//! utxo-ledger: a single-node UTXO ledger simulator in Rust
//!
//! This crate provides:
//! - secp256k1 keys, Base58Check addresses and merkle commitments
//! - UTXO-model transactions with per-input signatures
//! - A chain that appends blocks atomically and can replay its UTXO set
//! - Proof of work and a deterministic mock proof of stake
//! - A mempool that tracks the outputs pending transactions claim
//! - A ledger engine, a lock-protected shared handle and JSON snapshots
//!
//! # Example
//!
//! ```rust
//! use utxo_ledger::consensus::{Consensus, ProofOfWork};
//! use utxo_ledger::ledger::{BlockParams, Ledger, LedgerConfig};
//! use utxo_ledger::wallet::Wallet;
//!
//! let alice = Wallet::from_name("alice").unwrap();
//! let bob = Wallet::from_name("bob").unwrap();
//!
//! let config = LedgerConfig {
//!     consensus: Consensus::ProofOfWork(ProofOfWork::new(8)),
//!     ..LedgerConfig::default()
//! };
//! let mut ledger = Ledger::new(config, &[(alice.address(), 100)]).unwrap();
//!
//! let tx = ledger
//!     .create_transaction(&alice.address(), &bob.address(), 10, 1, alice.key_pair())
//!     .unwrap();
//! ledger.submit_transaction(tx).unwrap();
//! ledger.assemble_and_append_block(BlockParams::default()).unwrap();
//!
//! assert_eq!(ledger.balance(&alice.address()), 89);
//! assert_eq!(ledger.balance(&bob.address()), 10);
//! ```

pub mod cli;
pub mod consensus;
pub mod core;
pub mod crypto;
pub mod ledger;
pub mod mining;
pub mod storage;
pub mod wallet;

// Re-export commonly used types
pub use consensus::{Consensus, MockProofOfStake, ProofOfWork};
pub use core::{
    get_balance, validate_transaction, Address, Block, Chain, LedgerError, LedgerResult,
    Transaction, UtxoSet,
};
pub use crypto::KeyPair;
pub use ledger::{Ledger, LedgerConfig, SharedLedger};
pub use mining::Mempool;
pub use storage::{Snapshot, Storage};
pub use wallet::{Keyring, Wallet};
