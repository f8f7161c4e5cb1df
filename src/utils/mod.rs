//! Utility modules

pub mod fixture_parser;
pub mod memory_storage;
pub mod validation;

pub use fixture_parser::*;
pub use memory_storage::*;
pub use validation::*;
