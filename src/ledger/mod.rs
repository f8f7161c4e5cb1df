//! Ledger module containing account resolution and transaction mapping

pub mod account;
pub mod transaction;

pub use account::*;
pub use transaction::*;
