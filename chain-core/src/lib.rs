//! Core blockchain data structures
//!
//! This crate provides the types shared by the execution layer:
//! - Basic types (Hash, Address, Gas, Wei, etc.)
//! - Signed transactions
//! - Block headers, receipts and logs

pub mod block;
pub mod error;
pub mod transaction;
pub mod types;

// Re-export commonly used types
pub use block::*;
pub use error::*;
pub use transaction::*;
pub use types::*;
