//! Utility modules for the vessel ledger.
//!
//! This module contains shared utilities used across the ledger:
//! - Hashing and account identifiers
//! - Fixed-point and 256-bit arithmetic
//! - Constants

pub mod constants;
pub mod crypto;
pub mod math;

pub use constants::*;
pub use crypto::*;
pub use math::*;
