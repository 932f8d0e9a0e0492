//! # Vessel Ledger
//!
//! Collateralized debt positions ("vessels") with a Stability Pool that
//! absorbs liquidated debt, accruing simple interest on vessel debt and
//! streaming reward tokens to pool depositors.
//!
//! ## Architecture
//!
//! - **Core**: Token amounts, vessels, interest, fees and configuration
//! - **Liquidation**: Stability pool accounting (P, S, G with scale and
//!   epoch), reward issuance and the liquidation engine
//! - **Protocol**: The multi-asset [`protocol::Ledger`], its event log and
//!   a serializable operation format for replay
//! - **Storage**: Pluggable key-value backends and ledger persistence
//!
//! ## Example
//!
//! ```rust,ignore
//! use vessel_ledger::prelude::*;
//!
//! let ledger = Ledger::new(LedgerConfig::default())?;
//! let weth = Address::from_label("weth");
//! ledger.register_asset(weth, 0)?;
//!
//! let alice = Address::from_label("alice");
//! ledger.open_vessel(weth, alice, TokenAmount::from_tokens(10), TokenAmount::from_tokens(10_000), None, 0)?;
//! ledger.provide_to_sp(weth, alice, TokenAmount::from_tokens(5_000), 60)?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![warn(
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod core;
pub mod error;
pub mod liquidation;
pub mod protocol;
pub mod storage;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        config::{LedgerConfig, PoolParams, VesselParams},
        token::{TokenAmount, TokenLedger},
        vessel::{Vessel, VesselManager, VesselStatus},
    };
    pub use crate::error::{Error, Result};
    pub use crate::liquidation::{
        engine::{LiquidationEngine, LiquidationOutcome},
        issuance::CommunityIssuance,
        stability_pool::{DepositOutcome, StabilityPool},
    };
    pub use crate::protocol::{
        events::{EventKind, EventLog},
        ledger::Ledger,
        operations::{LedgerOperation, OperationResult},
    };
    pub use crate::storage::{FileStore, InMemoryStore, LedgerStore};
    pub use crate::utils::{
        crypto::{Address, AssetId, Hash},
        math::{FixedPoint, U256},
    };
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Ledger name
pub const LEDGER_NAME: &str = "vessel-ledger";
