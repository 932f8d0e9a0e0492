//! Vessel (collateralized debt position) management.
//!
//! This module implements the vessel lifecycle:
//! - Opening and closing vessels
//! - Adding and withdrawing collateral
//! - Borrowing and repaying debt
//! - Liquidation bookkeeping
//!
//! Every mutation settles pending interest first and reports the settled
//! amount so the caller can mint it to the fee collector.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::core::interest::{pending_interest, settle_interest};
use crate::core::token::TokenAmount;
use crate::error::{Error, Result};
use crate::utils::crypto::{Address, AssetId, Hash};
use crate::utils::math::{mul_div, FixedPoint};

// ═══════════════════════════════════════════════════════════════════════════════
// VESSEL STATUS
// ═══════════════════════════════════════════════════════════════════════════════

/// Status of a vessel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VesselStatus {
    /// Vessel is open
    Active,
    /// Vessel was closed by its owner
    Closed,
    /// Vessel was liquidated
    Liquidated,
}

impl VesselStatus {
    /// Check if vessel is closed or liquidated
    pub fn is_terminal(&self) -> bool {
        matches!(self, VesselStatus::Closed | VesselStatus::Liquidated)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VESSEL
// ═══════════════════════════════════════════════════════════════════════════════

/// A borrower's collateralized debt record for one collateral asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vessel {
    /// Borrower
    pub owner: Address,
    /// Collateral asset
    pub asset: AssetId,
    /// Debt including all interest settled so far
    pub principal_debt: TokenAmount,
    /// Collateral held
    pub collateral: TokenAmount,
    /// Interest rate applied against the 1e27 interest precision
    pub interest_rate_bps: u64,
    /// Timestamp of the last interest settlement
    pub last_interest_update: u64,
    /// Current status
    pub status: VesselStatus,
}

/// Amounts released when a vessel is closed or liquidated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VesselRelease {
    /// Interest settled as part of the release
    pub accrued_interest: TokenAmount,
    /// Entire debt at release time
    pub debt: TokenAmount,
    /// Entire collateral at release time
    pub collateral: TokenAmount,
}

impl Vessel {
    /// Open a new vessel
    pub fn open(
        owner: Address,
        asset: AssetId,
        collateral: TokenAmount,
        debt: TokenAmount,
        interest_rate_bps: u64,
        now: u64,
    ) -> Result<Self> {
        if collateral.is_zero() {
            return Err(Error::ZeroAmount);
        }

        Ok(Self {
            owner,
            asset,
            principal_debt: debt,
            collateral,
            interest_rate_bps,
            last_interest_update: now,
            status: VesselStatus::Active,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATE QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Check if vessel is open
    pub fn is_active(&self) -> bool {
        self.status == VesselStatus::Active
    }

    /// Principal plus interest pending at `now`
    pub fn entire_debt(&self, now: u64) -> Result<TokenAmount> {
        let pending = pending_interest(self, now)?;
        self.principal_debt.checked_add(pending).ok_or(Error::Overflow {
            operation: "entire_debt".into(),
        })
    }

    /// Individual collateral ratio at `price` (debt token per collateral unit).
    /// A vessel without debt has an unbounded ratio.
    pub fn icr(&self, price: FixedPoint) -> Result<FixedPoint> {
        if self.principal_debt.is_zero() {
            return Ok(FixedPoint::from_raw(u128::MAX));
        }
        let value = price.mul_amount(self.collateral.raw())?;
        FixedPoint::from_ratio(value, self.principal_debt.raw())
    }

    /// Fails with `InsufficientCollateral` if the vessel sits below `mcr`
    pub fn ensure_collateralized(&self, price: FixedPoint, mcr: FixedPoint) -> Result<()> {
        if self.icr(price)? >= mcr {
            return Ok(());
        }
        // required = debt * mcr / price
        let required = if price.is_zero() {
            u128::MAX
        } else {
            mul_div(self.principal_debt.raw(), mcr.raw(), price.raw())?
        };
        Err(Error::InsufficientCollateral {
            required,
            available: self.collateral.raw(),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STATE MUTATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Add collateral. Returns the interest settled.
    pub fn add_collateral(&mut self, amount: TokenAmount, now: u64) -> Result<TokenAmount> {
        self.ensure_active()?;
        if amount.is_zero() {
            return Err(Error::ZeroAmount);
        }

        let accrued = settle_interest(self, now)?;
        self.collateral = self.collateral.checked_add(amount).ok_or(Error::Overflow {
            operation: "add_collateral".into(),
        })?;
        debug!(owner = %self.owner, amount = %amount, collateral = %self.collateral, "collateral added");
        Ok(accrued)
    }

    /// Withdraw collateral. Returns the interest settled.
    pub fn withdraw_collateral(&mut self, amount: TokenAmount, now: u64) -> Result<TokenAmount> {
        self.ensure_active()?;
        if amount.is_zero() {
            return Err(Error::ZeroAmount);
        }
        if amount > self.collateral {
            return Err(Error::InsufficientCollateral {
                required: amount.raw(),
                available: self.collateral.raw(),
            });
        }

        let accrued = settle_interest(self, now)?;
        self.collateral = self.collateral.saturating_sub(amount);
        debug!(owner = %self.owner, amount = %amount, collateral = %self.collateral, "collateral withdrawn");
        Ok(accrued)
    }

    /// Increase debt. Returns the interest settled.
    pub fn borrow(&mut self, amount: TokenAmount, now: u64) -> Result<TokenAmount> {
        self.ensure_active()?;
        if amount.is_zero() {
            return Err(Error::ZeroAmount);
        }

        let accrued = settle_interest(self, now)?;
        self.principal_debt = self.principal_debt.checked_add(amount).ok_or(Error::Overflow {
            operation: "borrow".into(),
        })?;
        debug!(owner = %self.owner, amount = %amount, debt = %self.principal_debt, "debt increased");
        Ok(accrued)
    }

    /// Decrease debt. Returns the interest settled.
    pub fn repay(&mut self, amount: TokenAmount, now: u64) -> Result<TokenAmount> {
        self.ensure_active()?;
        if amount.is_zero() {
            return Err(Error::ZeroAmount);
        }

        let debt = self.entire_debt(now)?;
        if amount > debt {
            return Err(Error::RepaymentExceedsDebt {
                amount: amount.raw(),
                debt: debt.raw(),
            });
        }

        let accrued = settle_interest(self, now)?;
        self.principal_debt = self.principal_debt.saturating_sub(amount);
        debug!(owner = %self.owner, amount = %amount, debt = %self.principal_debt, "debt repaid");
        Ok(accrued)
    }

    /// Close the vessel, releasing its entire debt and collateral
    pub fn close(&mut self, now: u64) -> Result<VesselRelease> {
        self.release(VesselStatus::Closed, now)
    }

    /// Mark the vessel liquidated, releasing its entire debt and collateral
    pub fn liquidate(&mut self, now: u64) -> Result<VesselRelease> {
        self.release(VesselStatus::Liquidated, now)
    }

    fn release(&mut self, status: VesselStatus, now: u64) -> Result<VesselRelease> {
        self.ensure_active()?;

        let accrued_interest = settle_interest(self, now)?;
        let release = VesselRelease {
            accrued_interest,
            debt: self.principal_debt,
            collateral: self.collateral,
        };

        self.principal_debt = TokenAmount::ZERO;
        self.collateral = TokenAmount::ZERO;
        self.status = status;
        Ok(release)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::VesselNotActive(self.owner.to_hex()));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Serialize vessel to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize vessel from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VESSEL MANAGER
// ═══════════════════════════════════════════════════════════════════════════════

/// All vessels of one collateral asset, keyed by owner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VesselManager {
    vessels: BTreeMap<Address, Vessel>,
}

impl VesselManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly opened vessel. A closed or liquidated vessel of the
    /// same owner is replaced.
    pub fn insert_new(&mut self, vessel: Vessel) -> Result<()> {
        if let Some(existing) = self.vessels.get(&vessel.owner) {
            if existing.is_active() {
                return Err(Error::VesselAlreadyExists(vessel.owner.to_hex()));
            }
        }
        self.vessels.insert(vessel.owner, vessel);
        Ok(())
    }

    /// Insert or overwrite a vessel record
    pub fn upsert(&mut self, vessel: Vessel) {
        self.vessels.insert(vessel.owner, vessel);
    }

    /// Get a vessel by owner
    pub fn get(&self, owner: &Address) -> Option<&Vessel> {
        self.vessels.get(owner)
    }

    /// Get an active vessel by owner
    pub fn active(&self, owner: &Address) -> Result<&Vessel> {
        let vessel = self
            .vessels
            .get(owner)
            .ok_or_else(|| Error::VesselNotFound(owner.to_hex()))?;
        if !vessel.is_active() {
            return Err(Error::VesselNotActive(owner.to_hex()));
        }
        Ok(vessel)
    }

    /// Iterate over all vessels in owner order
    pub fn iter(&self) -> impl Iterator<Item = &Vessel> {
        self.vessels.values()
    }

    /// Number of vessel records
    pub fn len(&self) -> usize {
        self.vessels.len()
    }

    /// Check if there are no vessel records
    pub fn is_empty(&self) -> bool {
        self.vessels.is_empty()
    }

    /// Number of active vessels
    pub fn active_count(&self) -> usize {
        self.vessels.values().filter(|v| v.is_active()).count()
    }

    /// Settle interest on every active vessel. Returns the total accrued.
    pub fn collect_interests(&mut self, now: u64) -> Result<TokenAmount> {
        // Validate every timestamp first so a failure leaves no vessel settled
        for vessel in self.vessels.values().filter(|v| v.is_active()) {
            if now < vessel.last_interest_update {
                return Err(Error::InvalidTimestampOrder {
                    last: vessel.last_interest_update,
                    now,
                });
            }
        }

        let mut total = TokenAmount::ZERO;
        for vessel in self.vessels.values_mut().filter(|v| v.is_active()) {
            let accrued = settle_interest(vessel, now)?;
            total = total.checked_add(accrued).ok_or(Error::Overflow {
                operation: "collect_interests".into(),
            })?;
        }
        Ok(total)
    }

    /// Principal plus pending interest across active vessels
    pub fn entire_system_debt(&self, now: u64) -> Result<TokenAmount> {
        self.vessels
            .values()
            .filter(|v| v.is_active())
            .try_fold(TokenAmount::ZERO, |acc, v| {
                let debt = v.entire_debt(now)?;
                acc.checked_add(debt).ok_or(Error::Overflow {
                    operation: "entire_system_debt".into(),
                })
            })
    }

    /// Owners of active vessels whose ratio at `now` is below `mcr`
    pub fn liquidatable(&self, price: FixedPoint, mcr: FixedPoint, now: u64) -> Result<Vec<Address>> {
        let mut owners = Vec::new();
        for vessel in self.vessels.values().filter(|v| v.is_active()) {
            let mut settled = vessel.clone();
            settle_interest(&mut settled, now)?;
            if !settled.principal_debt.is_zero() && settled.icr(price)? < mcr {
                owners.push(vessel.owner);
            }
        }
        Ok(owners)
    }

    /// Aggregate statistics over active vessels
    pub fn statistics(&self, now: u64) -> Result<VesselStatistics> {
        let mut total_collateral = TokenAmount::ZERO;
        for vessel in self.vessels.values().filter(|v| v.is_active()) {
            total_collateral = total_collateral.saturating_add(vessel.collateral);
        }

        Ok(VesselStatistics {
            total_vessels: self.vessels.len() as u64,
            active_vessels: self.active_count() as u64,
            total_collateral,
            total_debt: self.entire_system_debt(now)?,
        })
    }

    /// Hash of all vessel records
    pub fn state_hash(&self) -> Result<Hash> {
        let bytes = bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(Hash::sha256(&bytes))
    }
}

/// Aggregate vessel statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VesselStatistics {
    /// Vessel records, including closed and liquidated
    pub total_vessels: u64,
    /// Open vessels
    pub active_vessels: u64,
    /// Collateral across open vessels
    pub total_collateral: TokenAmount,
    /// Debt across open vessels including pending interest
    pub total_debt: TokenAmount,
}
