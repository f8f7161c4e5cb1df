//! Statement import workflow and its building blocks

pub mod core;
pub mod duplicates;
pub mod fingerprint;
pub mod locks;
pub mod overlap;
pub mod result;

pub use self::core::*;
pub use duplicates::*;
pub use fingerprint::*;
pub use locks::*;
pub use overlap::*;
pub use result::*;
