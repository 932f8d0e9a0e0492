//! Core modules for the vessel ledger.
//!
//! This module contains the fundamental building blocks:
//! - Configuration and ledger parameters
//! - Debt token amounts and balances
//! - Vessels and their lazily settled interest
//! - Fee collector for settled interest

pub mod config;
pub mod fees;
pub mod interest;
pub mod token;
pub mod vessel;

pub use config::*;
pub use fees::*;
pub use interest::*;
pub use token::*;
pub use vessel::*;
