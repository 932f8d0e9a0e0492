//! Stability pool and liquidation.
//!
//! This module handles everything that happens to a pool of deposits:
//! - Community issuance of the reward token
//! - Stability pool accounting with the scale/epoch product factor
//! - Liquidation engine offsetting undercollateralized vessels

pub mod engine;
pub mod issuance;
pub mod stability_pool;

pub use engine::*;
pub use issuance::*;
pub use stability_pool::*;
