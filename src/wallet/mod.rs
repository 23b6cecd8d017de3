//! Wallet module for key and transaction management

pub mod keyring;
pub mod wallet;

pub use keyring::Keyring;
pub use wallet::{create_transaction, Wallet, WalletError};
