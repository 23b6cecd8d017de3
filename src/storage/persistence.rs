//! Ledger persistence layer
//!
//! A [`Snapshot`] is the JSON form of a ledger: its configuration, every
//! block, the pending transactions and the validator keys this node holds.
//! Derived state (the UTXO set, fees, claims) is never written; loading
//! replays the blocks through `Chain::append` and resubmits the pending
//! transactions, so a tampered file is rejected instead of trusted.

use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{Block, LedgerError, Transaction};
use crate::crypto::{KeyError, KeyPair};
use crate::ledger::{Ledger, LedgerConfig};
use crate::wallet::Keyring;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Snapshot rejected: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Invalid validator key: {0}")]
    Key(#[from] KeyError),
}

/// Serializable ledger contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub config: LedgerConfig,
    pub blocks: Vec<Block>,
    pub mempool: Vec<Transaction>,
    /// Hex private keys of registered validators
    pub validator_keys: Vec<String>,
}

impl Snapshot {
    /// Capture the persistent parts of a ledger
    pub fn capture(ledger: &Ledger) -> Self {
        let keyring = ledger.keyring();
        Self {
            config: ledger.config().clone(),
            blocks: ledger.chain().blocks().to_vec(),
            mempool: ledger.mempool().snapshot(),
            validator_keys: keyring
                .addresses()
                .iter()
                .filter_map(|address| keyring.get(address))
                .map(|key| key.private_key_hex())
                .collect(),
        }
    }

    /// Rebuild and re-validate the ledger
    pub fn restore(self) -> Result<Ledger, StorageError> {
        let mut keyring = Keyring::new();
        for hex_key in &self.validator_keys {
            keyring.insert(KeyPair::from_private_key_hex(hex_key)?);
        }

        Ok(Ledger::restore(
            self.config,
            self.blocks,
            self.mempool,
            keyring,
        )?)
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub path: PathBuf,
    pub backup_enabled: bool,
    pub max_backups: usize,
}

impl StorageConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ledger.json"),
            backup_enabled: true,
            max_backups: 3,
        }
    }
}

/// Snapshot file manager with rotating backups
pub struct Storage {
    config: StorageConfig,
}

impl Storage {
    /// Create a new storage manager
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { config })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Get a backup file path
    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.config.path.as_os_str().to_owned();
        name.push(format!(".backup.{}", index));
        PathBuf::from(name)
    }

    /// Save the ledger, keeping the previous file as a backup
    pub fn save(&self, ledger: &Ledger) -> Result<(), StorageError> {
        let path = &self.config.path;

        if self.config.backup_enabled && self.config.max_backups > 0 && path.exists() {
            self.rotate_backups()?;
            fs::copy(path, self.backup_path(0))?;
        }

        save_to_file(&Snapshot::capture(ledger), path)?;
        info!("Saved ledger at height {} to {}", ledger.chain().height(), path.display());
        Ok(())
    }

    /// Load and re-validate the ledger
    pub fn load(&self) -> Result<Ledger, StorageError> {
        if !self.exists() {
            return Err(StorageError::InvalidData(format!(
                "{} not found",
                self.config.path.display()
            )));
        }

        load_from_file(&self.config.path)?.restore()
    }

    /// Check if a saved ledger exists
    pub fn exists(&self) -> bool {
        self.config.path.exists()
    }

    /// Rotate backup files
    fn rotate_backups(&self) -> Result<(), StorageError> {
        // Delete oldest backup
        let oldest = self.backup_path(self.config.max_backups - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        // Shift existing backups
        for i in (0..self.config.max_backups - 1).rev() {
            let current = self.backup_path(i);
            if current.exists() {
                fs::rename(&current, self.backup_path(i + 1))?;
            }
        }

        Ok(())
    }

    /// Load a backup instead of the current file
    pub fn restore_backup(&self, backup_index: usize) -> Result<Ledger, StorageError> {
        let backup_path = self.backup_path(backup_index);

        if !backup_path.exists() {
            return Err(StorageError::InvalidData(format!(
                "Backup {} not found",
                backup_index
            )));
        }

        load_from_file(&backup_path)?.restore()
    }

    /// List available backups
    pub fn list_backups(&self) -> Vec<usize> {
        (0..self.config.max_backups)
            .filter(|i| self.backup_path(*i).exists())
            .collect()
    }
}

/// Write a snapshot through a temporary file and an atomic rename
pub fn save_to_file(snapshot: &Snapshot, path: &Path) -> Result<(), StorageError> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let file = fs::File::create(&temp_path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, snapshot)?;

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Read a snapshot without validating it
pub fn load_from_file(path: &Path) -> Result<Snapshot, StorageError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}
