//! Ledger engine and its concurrent wrapper

pub mod config;
pub mod engine;
pub mod shared;

pub use config::{BlockParams, LedgerConfig, SealPolicy};
pub use engine::{seed_from_tip, InclusionProof, Ledger, SubmitOutcome, TipSummary};
pub use shared::{SharedLedger, MAX_SEAL_ATTEMPTS};
