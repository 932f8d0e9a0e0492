//! Protocol module - ledger orchestration.
//!
//! The [`Ledger`] owns one book per collateral asset (vessels plus stability
//! pool) and the shared token balances, and applies every operation
//! atomically: either the whole state change lands or none of it does.

pub mod events;
pub mod ledger;
pub mod operations;

pub use events::*;
pub use ledger::*;
pub use operations::*;
