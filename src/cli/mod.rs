//! Command handlers for the simulator binary

pub mod commands;

pub use commands::{
    build_ledger, cmd_address, cmd_balance, cmd_init, cmd_mempool, cmd_prove, cmd_send, cmd_seal,
    cmd_tip, cmd_validate, parse_allocation, resolve_address, AppState, CliResult, InitOptions,
};
