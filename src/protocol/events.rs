//! Ledger events for state change notifications.
//!
//! Every operation the ledger applies appends one event describing what
//! moved. The log is append-only and hash-chained, so two replays of the
//! same operations produce the same digest.

use serde::{Deserialize, Serialize};

use crate::core::token::TokenAmount;
use crate::utils::crypto::{Address, AssetId, Hash};
use crate::utils::math::FixedPoint;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// What happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    // Pool administration
    /// A collateral asset and its pool were registered
    AssetRegistered,
    /// Weekly reward rate changed
    WeeklyRateChanged {
        /// New weekly rate
        rate: TokenAmount,
        /// Issued at the old rate before the change
        settled: TokenAmount,
    },
    /// Reward supply cap changed
    SupplyCapChanged {
        /// New cap
        cap: TokenAmount,
    },
    /// Issuance was triggered explicitly
    RewardsIssued {
        /// Rewards issued
        amount: TokenAmount,
    },

    // Vessel events
    /// Vessel opened
    VesselOpened {
        /// Vessel owner
        owner: Address,
        /// Collateral locked
        collateral: TokenAmount,
        /// Debt minted
        debt: TokenAmount,
    },
    /// Collateral added to a vessel
    CollateralAdded {
        /// Vessel owner
        owner: Address,
        /// Collateral added
        amount: TokenAmount,
        /// Interest settled
        interest: TokenAmount,
    },
    /// Collateral withdrawn from a vessel
    CollateralWithdrawn {
        /// Vessel owner
        owner: Address,
        /// Collateral withdrawn
        amount: TokenAmount,
        /// Interest settled
        interest: TokenAmount,
    },
    /// Debt borrowed against a vessel
    DebtBorrowed {
        /// Vessel owner
        owner: Address,
        /// Debt borrowed
        amount: TokenAmount,
        /// Interest settled
        interest: TokenAmount,
    },
    /// Debt repaid to a vessel
    DebtRepaid {
        /// Vessel owner
        owner: Address,
        /// Debt repaid
        amount: TokenAmount,
        /// Interest settled
        interest: TokenAmount,
    },
    /// Vessel closed
    VesselClosed {
        /// Vessel owner
        owner: Address,
        /// Debt burned
        debt: TokenAmount,
        /// Collateral released
        collateral: TokenAmount,
        /// Interest settled
        interest: TokenAmount,
    },
    /// Vessel liquidated
    VesselLiquidated {
        /// Vessel owner
        owner: Address,
        /// Collateral ratio at liquidation
        icr: FixedPoint,
        /// Debt absorbed by the pool
        debt_offset: TokenAmount,
        /// Collateral sent to the pool
        collateral_to_pool: TokenAmount,
        /// Debt the pool could not absorb
        unabsorbed_debt: TokenAmount,
        /// Interest settled
        interest: TokenAmount,
    },
    /// Interest settled across every vessel of the asset
    InterestCollected {
        /// Interest settled
        amount: TokenAmount,
    },

    // Stability pool events
    /// Deposit provided
    DepositProvided {
        /// Pool depositor
        depositor: Address,
        /// Debt tokens deposited
        amount: TokenAmount,
        /// Collateral gain paid out
        collateral_gain: TokenAmount,
        /// Reward gain paid out
        reward_gain: TokenAmount,
    },
    /// Deposit withdrawn
    DepositWithdrawn {
        /// Pool depositor
        depositor: Address,
        /// Debt tokens withdrawn
        amount: TokenAmount,
        /// Collateral gain paid out
        collateral_gain: TokenAmount,
        /// Reward gain paid out
        reward_gain: TokenAmount,
    },
}

impl EventKind {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AssetRegistered => "AssetRegistered",
            Self::WeeklyRateChanged { .. } => "WeeklyRateChanged",
            Self::SupplyCapChanged { .. } => "SupplyCapChanged",
            Self::RewardsIssued { .. } => "RewardsIssued",
            Self::VesselOpened { .. } => "VesselOpened",
            Self::CollateralAdded { .. } => "CollateralAdded",
            Self::CollateralWithdrawn { .. } => "CollateralWithdrawn",
            Self::DebtBorrowed { .. } => "DebtBorrowed",
            Self::DebtRepaid { .. } => "DebtRepaid",
            Self::VesselClosed { .. } => "VesselClosed",
            Self::VesselLiquidated { .. } => "VesselLiquidated",
            Self::InterestCollected { .. } => "InterestCollected",
            Self::DepositProvided { .. } => "DepositProvided",
            Self::DepositWithdrawn { .. } => "DepositWithdrawn",
        }
    }
}

/// One entry of the event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Position in the log
    pub sequence: u64,
    /// Caller-supplied timestamp of the operation
    pub timestamp: u64,
    /// Collateral asset the operation touched
    pub asset: AssetId,
    /// What happened
    pub kind: EventKind,
}

impl LedgerEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    /// Hash of the event's JSON encoding
    pub fn hash(&self) -> Hash {
        // Serializing plain data into a Vec cannot fail
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        Hash::sha256(&bytes)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Append-only log of applied operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<LedgerEvent>,
    digest: Hash,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, assigning the next sequence number
    pub fn record(&mut self, timestamp: u64, asset: AssetId, kind: EventKind) -> &LedgerEvent {
        let event = LedgerEvent {
            sequence: self.events.len() as u64,
            timestamp,
            asset,
            kind,
        };

        let mut chained = self.digest.as_bytes().to_vec();
        chained.extend_from_slice(event.hash().as_bytes());
        self.digest = Hash::sha256(&chained);

        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    /// Get all events
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Get events of a specific type
    pub fn filter_by_type(&self, event_type: &str) -> Vec<&LedgerEvent> {
        self.events.iter().filter(|e| e.event_type() == event_type).collect()
    }

    /// Get events for one asset
    pub fn for_asset(&self, asset: &AssetId) -> Vec<&LedgerEvent> {
        self.events.iter().filter(|e| e.asset == *asset).collect()
    }

    /// Get the number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Running hash over every event in order
    pub fn digest(&self) -> Hash {
        self.digest
    }
}
