//! Shared types for the token workbench
//!
//! Core type definitions used by the wallet session, the ledger simulator and
//! the ledger gateway.
//!
//! # Modules
//! - `ids`: Ledger addresses (Identity, RegistryId, HoldingAccountId) and receipts
//! - `numeric`: Human amount <-> base unit conversion
//! - `ledger`: Raw ledger records and transaction outcomes
//! - `errors`: Error taxonomy

pub mod errors;
pub mod ids;
pub mod ledger;
pub mod numeric;

/// Library version constant
pub const LIB_VERSION: &str = "0.1.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::ledger::*;
    pub use crate::numeric::*;
}
