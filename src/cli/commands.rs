//! CLI commands for the ledger simulator
//!
//! Implements all command handlers for the CLI interface. Wallets are named:
//! a name always maps to the same key, so no wallet files are needed.

use std::path::Path;

use crate::consensus::{Consensus, MockProofOfStake, ProofOfWork};
use crate::core::{verify_inclusion, Address, UtxoView};
use crate::ledger::{BlockParams, Ledger, LedgerConfig, SealPolicy, SharedLedger};
use crate::storage::{Storage, StorageConfig};
use crate::wallet::Wallet;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Options for `init`
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub difficulty: Option<u32>,
    pub pos: bool,
    pub validators: Vec<String>,
    pub faucet: Vec<(String, u64)>,
    /// Seal automatically once this many transactions are pending
    pub seal_after: Option<usize>,
    pub force: bool,
}

/// Application state
pub struct AppState {
    pub ledger: Ledger,
    pub storage: Storage,
}

impl AppState {
    /// Load the ledger persisted at `path`
    pub fn load(path: &Path) -> CliResult<Self> {
        let storage = Storage::new(StorageConfig::at(path))?;
        if !storage.exists() {
            return Err(format!(
                "no ledger at {}; create one with `utxo-ledger init`",
                path.display()
            )
            .into());
        }

        let ledger = storage.load()?;
        Ok(Self { ledger, storage })
    }

    /// Save the current state
    pub fn save(&self) -> CliResult<()> {
        self.storage.save(&self.ledger)?;
        Ok(())
    }
}

/// Parse a `NAME:AMOUNT` faucet allocation
pub fn parse_allocation(s: &str) -> Result<(String, u64), String> {
    let (name, amount) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("expected NAME:AMOUNT, got '{}'", s))?;
    if name.is_empty() {
        return Err("allocation name is empty".to_string());
    }
    let amount = amount
        .parse::<u64>()
        .map_err(|e| format!("invalid amount '{}': {}", amount, e))?;
    Ok((name.to_string(), amount))
}

/// An address literal, or else the address of the named wallet
pub fn resolve_address(name_or_address: &str) -> CliResult<Address> {
    match name_or_address.parse::<Address>() {
        Ok(address) => Ok(address),
        Err(_) => Ok(Wallet::from_name(name_or_address)?.address()),
    }
}

/// Build the ledger described by `options`
pub fn build_ledger(options: &InitOptions) -> CliResult<Ledger> {
    let validators = options
        .validators
        .iter()
        .map(|name| Wallet::from_name(name))
        .collect::<Result<Vec<_>, _>>()?;

    let consensus = if options.pos {
        if validators.is_empty() {
            return Err("--pos needs at least one --validator".into());
        }
        Consensus::MockProofOfStake(MockProofOfStake::new(
            validators.iter().map(|v| v.address()).collect(),
        ))
    } else {
        match options.difficulty {
            Some(d) => Consensus::ProofOfWork(ProofOfWork::new(d)),
            None => Consensus::default(),
        }
    };

    let config = LedgerConfig {
        consensus,
        seal_policy: match options.seal_after {
            Some(count) => SealPolicy::WhenPending { count },
            None => SealPolicy::Manual,
        },
        ..LedgerConfig::default()
    };

    let mut allocations = Vec::with_capacity(options.faucet.len());
    for (name, amount) in &options.faucet {
        allocations.push((resolve_address(name)?, *amount));
    }

    let mut ledger = Ledger::new(config, &allocations)?;
    for validator in &validators {
        ledger.register_validator(validator.key_pair().clone());
    }
    Ok(ledger)
}

/// Initialize a new ledger
pub fn cmd_init(path: &Path, options: &InitOptions) -> CliResult<()> {
    let storage = Storage::new(StorageConfig::at(path))?;

    if storage.exists() && !options.force {
        println!("⚠️  Ledger already exists at {}", path.display());
        println!("   Use --force to reinitialize (this will replace existing data)");
        return Ok(());
    }

    let ledger = build_ledger(options)?;
    storage.save(&ledger)?;

    let tip = ledger.tip();
    println!("✅ Ledger initialized!");
    println!("   📁 State file: {}", path.display());
    println!("   🔧 Consensus: {}", tip.consensus);
    println!("   🧱 Genesis block hash: {}", tip.hash);
    for (name, amount) in &options.faucet {
        println!("   💧 {} ← {} coins", name, amount);
    }

    Ok(())
}

/// Show the address of a named wallet
pub fn cmd_address(name: &str) -> CliResult<()> {
    let wallet = Wallet::from_name(name)?;
    println!("📍 {}: {}", name, wallet.address());
    println!("   🔑 Public Key: {}", wallet.public_key());
    Ok(())
}

/// Send coins
pub fn cmd_send(state: &mut AppState, from: &str, to: &str, amount: u64, fee: u64) -> CliResult<()> {
    let wallet = Wallet::from_name(from)?;
    let recipient = resolve_address(to)?;

    let tx = state.ledger.create_transaction(
        &wallet.address(),
        &recipient,
        amount,
        fee,
        wallet.key_pair(),
    )?;

    println!("📤 Transaction created:");
    println!("   ID: {}", tx.id);
    println!("   From: {} ({})", from, wallet.address());
    println!("   To: {}", recipient);
    println!("   Amount: {} coins (fee {})", amount, fee);

    let outcome = state.ledger.submit_with_policy(tx)?;
    match (&outcome.sealed_block, &outcome.seal_error) {
        (Some(hash), _) => println!("\n🧱 Sealed into block {}", &hash[..16]),
        (None, Some(e)) => {
            println!("\n✅ Transaction added to mempool");
            println!("⚠️  Automatic sealing failed: {}", e);
        }
        (None, None) => {
            println!("\n✅ Transaction added to mempool");
            println!("   It will be included in the next sealed block.");
        }
    }

    state.save()
}

/// Seal `count` blocks from the mempool
pub fn cmd_seal(state: AppState, seed: Option<u64>, count: u32) -> CliResult<()> {
    let AppState { ledger, storage } = state;
    let shared = SharedLedger::new(ledger);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        for _ in 0..count {
            let params = BlockParams {
                seed,
                ..BlockParams::default()
            };
            let hash = shared.mine_detached(params).await?;
            let tip = shared.tip().await;
            println!("\n   Block {} sealed!", tip.height);
            println!("   ├─ Hash: {}", &hash[..16]);
            println!("   ├─ Transactions: {}", tip.transactions);
            println!("   └─ Pending: {}", tip.pending);
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    let ledger = shared
        .into_ledger()
        .map_err(|_| "ledger still shared after sealing")?;
    let state = AppState { ledger, storage };
    state.save()
}

/// Get wallet balance
pub fn cmd_balance(state: &AppState, name: &str) -> CliResult<()> {
    let address = resolve_address(name)?;
    let confirmed = state.ledger.balance(&address);
    let spendable = state.ledger.spendable_balance(&address);
    let utxos = state.ledger.chain().utxo_set().owned_by(&address);

    println!("💰 Balance for {} ({})", name, address);
    println!("   Confirmed: {} coins", confirmed);
    println!("   Spendable: {} coins", spendable);
    println!("   UTXOs: {}", utxos.len());

    for utxo in utxos.iter().take(10) {
        println!("   └─ {} = {} coins", utxo.outpoint, utxo.amount);
    }
    if utxos.len() > 10 {
        println!("   ... and {} more", utxos.len() - 10);
    }

    Ok(())
}

/// Display the chain tip
pub fn cmd_tip(state: &AppState) -> CliResult<()> {
    let tip = state.ledger.tip();
    let stats = state.ledger.chain().stats();

    println!("⛓️  Ledger Tip");
    println!("   ├─ Height: {}", tip.height);
    println!("   ├─ Hash: {}", tip.hash);
    println!("   ├─ Sealed: {}", tip.timestamp.format("%Y-%m-%d %H:%M:%S"));
    println!("   ├─ Consensus: {}", tip.consensus);
    println!("   ├─ Total transactions: {}", stats.total_transactions);
    println!("   ├─ Coins in circulation: {}", stats.total_value);
    println!("   ├─ UTXOs: {}", tip.utxo_count);
    println!("   └─ Pending: {}", tip.pending);

    Ok(())
}

/// Show mempool status
pub fn cmd_mempool(state: &AppState) -> CliResult<()> {
    let stats = state.ledger.mempool().stats();
    println!("📬 Mempool Status");
    println!("   Pending transactions: {}", stats.tx_count);
    println!("   Total fees: {}", stats.total_fees);

    for summary in state.ledger.list_mempool() {
        println!(
            "   └─ {} | {} in / {} out | {} coins | fee {}",
            &summary.id[..16],
            summary.inputs,
            summary.outputs,
            summary.total_output,
            summary.fee
        );
    }

    Ok(())
}

/// Show the merkle path proving a transaction was confirmed
pub fn cmd_prove(state: &AppState, tx_id: &str) -> CliResult<()> {
    let found = state
        .ledger
        .inclusion_proof(tx_id)
        .ok_or_else(|| format!("transaction {} is not in any block", tx_id))?;

    println!("🧾 Inclusion proof for {}", tx_id);
    println!("   ├─ Block: {} (height {})", found.block_hash, found.height);
    println!("   ├─ Merkle root: {}", found.merkle_root);
    for (sibling, is_left) in &found.proof.siblings {
        let side = if *is_left { "left" } else { "right" };
        println!("   ├─ {} {}", side, hex::encode(sibling));
    }

    if !verify_inclusion(tx_id, &found.proof, &found.merkle_root) {
        return Err("inclusion proof does not verify".into());
    }
    println!("   └─ ✅ Verified");
    Ok(())
}

/// Re-check chain links, merkle roots and the UTXO set
pub fn cmd_validate(state: &AppState) -> CliResult<()> {
    println!("🔍 Validating ledger...");

    match state.ledger.check_invariants() {
        Ok(()) => {
            println!("✅ Ledger is valid!");
            println!("   {} blocks verified", state.ledger.chain().blocks().len());
        }
        Err(e) => {
            println!("❌ Ledger validation FAILED: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
