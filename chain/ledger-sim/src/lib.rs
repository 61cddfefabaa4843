//! Ledger Simulator
//!
//! A deterministic in-memory ledger for fungible asset registries. It verifies
//! agent signatures, enforces replay protection, and executes registry,
//! holding-account, mint and transfer instructions.
//!
//! # Modules
//! - `events`: Append-only ledger event records
//! - `ledger`: The state machine
//! - `rpc`: `LedgerRpc` implementation for in-process clients

pub mod events;
pub mod ledger;
pub mod rpc;

pub use ledger::Ledger;
pub use rpc::{InMemoryLedger, RpcMethod};
