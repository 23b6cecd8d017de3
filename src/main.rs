//! UTXO ledger simulator CLI
//!
//! A command-line interface for driving a single-node ledger whose state is
//! kept in a JSON snapshot between invocations.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use utxo_ledger::cli::{self, AppState, InitOptions};

#[derive(Parser)]
#[command(name = "utxo-ledger")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "A single-node UTXO ledger simulator", long_about = None)]
struct Cli {
    /// Ledger snapshot file
    #[arg(short, long, default_value = "ledger.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new ledger with a genesis allocation
    Init {
        /// Mining difficulty (number of leading zero bits)
        #[arg(short, long)]
        difficulty: Option<u32>,

        /// Use mock proof of stake instead of proof of work
        #[arg(long)]
        pos: bool,

        /// Validator wallet name (repeatable, proof of stake only)
        #[arg(long = "validator")]
        validators: Vec<String>,

        /// Genesis allocation as NAME:AMOUNT (repeatable)
        #[arg(long, value_parser = cli::parse_allocation)]
        faucet: Vec<(String, u64)>,

        /// Seal a block automatically once this many transactions are pending
        #[arg(long)]
        seal_after: Option<usize>,

        /// Replace an existing ledger
        #[arg(long)]
        force: bool,
    },

    /// Show the address of a named wallet
    Address {
        name: String,
    },

    /// Send coins from a named wallet
    Send {
        /// Sender's wallet name
        from: String,

        /// Recipient wallet name or address
        to: String,

        /// Amount to send
        amount: u64,

        /// Fee burned by the transaction
        #[arg(short, long, default_value = "0")]
        fee: u64,
    },

    /// Seal pending transactions into new blocks
    Seal {
        /// Stake draw seed (proof of stake only)
        #[arg(long)]
        seed: Option<u64>,

        /// Number of blocks to seal
        #[arg(short, long, default_value = "1")]
        count: u32,
    },

    /// Show the balance of a wallet name or address
    Balance {
        name: String,
    },

    /// Display the chain tip
    Tip,

    /// Show mempool status
    Mempool,

    /// Prove a transaction is included in a block
    Prove {
        /// Transaction id
        tx_id: String,
    },

    /// Validate the ledger
    Validate,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            difficulty,
            pos,
            validators,
            faucet,
            seal_after,
            force,
        } => {
            let options = InitOptions {
                difficulty,
                pos,
                validators,
                faucet,
                seal_after,
                force,
            };
            cli::cmd_init(&cli.state, &options)?;
        }

        Commands::Address { name } => {
            cli::cmd_address(&name)?;
        }

        Commands::Send {
            from,
            to,
            amount,
            fee,
        } => {
            let mut state = AppState::load(&cli.state)?;
            cli::cmd_send(&mut state, &from, &to, amount, fee)?;
        }

        Commands::Seal { seed, count } => {
            let state = AppState::load(&cli.state)?;
            cli::cmd_seal(state, seed, count)?;
        }

        Commands::Balance { name } => {
            let state = AppState::load(&cli.state)?;
            cli::cmd_balance(&state, &name)?;
        }

        Commands::Tip => {
            let state = AppState::load(&cli.state)?;
            cli::cmd_tip(&state)?;
        }

        Commands::Mempool => {
            let state = AppState::load(&cli.state)?;
            cli::cmd_mempool(&state)?;
        }

        Commands::Prove { tx_id } => {
            let state = AppState::load(&cli.state)?;
            cli::cmd_prove(&state, &tx_id)?;
        }

        Commands::Validate => {
            let state = AppState::load(&cli.state)?;
            cli::cmd_validate(&state)?;
        }
    }

    Ok(())
}
