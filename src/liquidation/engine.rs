//! Liquidation engine for undercollateralized vessels.
//!
//! A vessel whose collateral ratio sits below the MCR is closed out against
//! its asset's stability pool:
//! - Interest is settled into the debt first
//! - Debt up to the pool's deposits is offset, with a pro-rata share of collateral
//! - Whatever the pool cannot absorb is reported as unabsorbed

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::interest::settle_interest;
use crate::core::token::TokenAmount;
use crate::core::vessel::{Vessel, VesselManager};
use crate::error::{Error, Result};
use crate::liquidation::stability_pool::{OffsetOutcome, StabilityPool};
use crate::utils::crypto::{Address, AssetId};
use crate::utils::math::*;

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION OUTCOME
// ═══════════════════════════════════════════════════════════════════════════════

/// Record of one liquidation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationOutcome {
    /// Owner of the liquidated vessel
    pub owner: Address,
    /// Collateral asset
    pub asset: AssetId,
    /// Collateral ratio at liquidation, after interest
    pub icr: FixedPoint,
    /// Interest settled as part of the liquidation
    pub accrued_interest: TokenAmount,
    /// Entire debt of the vessel
    pub debt: TokenAmount,
    /// Entire collateral of the vessel
    pub collateral: TokenAmount,
    /// Debt cancelled against the stability pool
    pub debt_offset: TokenAmount,
    /// Collateral sent to the stability pool
    pub collateral_to_pool: TokenAmount,
    /// Debt the pool could not absorb
    pub unabsorbed_debt: TokenAmount,
    /// Collateral backing the unabsorbed debt
    pub unabsorbed_collateral: TokenAmount,
    /// What the offset did to the pool
    pub offset: OffsetOutcome,
}

impl LiquidationOutcome {
    /// Whether the pool absorbed the whole debt
    pub fn fully_absorbed(&self) -> bool {
        self.unabsorbed_debt.is_zero()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIQUIDATION ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Engine for liquidating undercollateralized vessels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEngine {
    /// Minimum collateral ratio
    mcr: FixedPoint,
    /// Total liquidations performed
    total_liquidations: u64,
    /// Debt cancelled against pools
    total_debt_offset: TokenAmount,
    /// Collateral sent to pools
    total_collateral_to_pool: TokenAmount,
    /// Debt left unabsorbed
    total_unabsorbed_debt: TokenAmount,
    /// Collateral left unabsorbed
    total_unabsorbed_collateral: TokenAmount,
}

impl LiquidationEngine {
    /// Create an engine liquidating below `mcr`
    pub fn new(mcr: FixedPoint) -> Self {
        Self {
            mcr,
            total_liquidations: 0,
            total_debt_offset: TokenAmount::ZERO,
            total_collateral_to_pool: TokenAmount::ZERO,
            total_unabsorbed_debt: TokenAmount::ZERO,
            total_unabsorbed_collateral: TokenAmount::ZERO,
        }
    }

    /// Minimum collateral ratio
    pub fn mcr(&self) -> FixedPoint {
        self.mcr
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIQUIDATION DETECTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Collateral ratio at `now`, counting pending interest
    pub fn icr_at(vessel: &Vessel, price: FixedPoint, now: u64) -> Result<FixedPoint> {
        let mut preview = vessel.clone();
        settle_interest(&mut preview, now)?;
        preview.icr(price)
    }

    /// Whether the vessel can be liquidated at `price`
    pub fn is_liquidatable(&self, vessel: &Vessel, price: FixedPoint, now: u64) -> Result<bool> {
        Ok(vessel.is_active() && Self::icr_at(vessel, price, now)? < self.mcr)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIQUIDATION EXECUTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Liquidate a single vessel against its pool.
    ///
    /// Nothing is modified unless the liquidation succeeds.
    pub fn liquidate(
        &mut self,
        vessel: &mut Vessel,
        pool: &mut StabilityPool,
        price: FixedPoint,
        now: u64,
    ) -> Result<LiquidationOutcome> {
        if !vessel.is_active() {
            return Err(Error::VesselNotActive(vessel.owner.to_hex()));
        }
        if vessel.asset != pool.asset() {
            return Err(Error::UnknownAsset(vessel.asset.to_hex()));
        }

        let mut preview = vessel.clone();
        settle_interest(&mut preview, now)?;
        let icr = preview.icr(price)?;
        if icr >= self.mcr {
            return Err(Error::VesselHealthy(vessel.owner.to_hex()));
        }

        let debt = preview.principal_debt;
        let collateral = preview.collateral;
        let debt_offset = debt.min(pool.total_deposits());
        let collateral_to_pool = if debt_offset == debt {
            collateral
        } else {
            TokenAmount::from_raw(mul_div(collateral.raw(), debt_offset.raw(), debt.raw())?)
        };

        // Close the vessel on a copy first so a failure leaves the pool untouched
        let mut closed = vessel.clone();
        let release = closed.liquidate(now)?;
        let offset = pool.offset(debt_offset, collateral_to_pool, now)?;
        *vessel = closed;

        let outcome = LiquidationOutcome {
            owner: vessel.owner,
            asset: vessel.asset,
            icr,
            accrued_interest: release.accrued_interest,
            debt,
            collateral,
            debt_offset,
            collateral_to_pool,
            unabsorbed_debt: debt.saturating_sub(debt_offset),
            unabsorbed_collateral: collateral.saturating_sub(collateral_to_pool),
            offset,
        };

        self.total_liquidations += 1;
        self.total_debt_offset = self.total_debt_offset.saturating_add(debt_offset);
        self.total_collateral_to_pool = self.total_collateral_to_pool.saturating_add(collateral_to_pool);
        self.total_unabsorbed_debt = self.total_unabsorbed_debt.saturating_add(outcome.unabsorbed_debt);
        self.total_unabsorbed_collateral = self
            .total_unabsorbed_collateral
            .saturating_add(outcome.unabsorbed_collateral);

        info!(
            owner = %outcome.owner,
            asset = %outcome.asset,
            icr = %icr,
            debt = %debt,
            offset = %debt_offset,
            unabsorbed = %outcome.unabsorbed_debt,
            "vessel liquidated"
        );
        if !outcome.fully_absorbed() {
            warn!(
                asset = %outcome.asset,
                unabsorbed_debt = %outcome.unabsorbed_debt,
                "stability pool could not absorb the entire debt"
            );
        }

        Ok(outcome)
    }

    /// Liquidate every vessel of the pool's asset that sits below the MCR.
    ///
    /// The batch is all or nothing: if any liquidation fails, the pool and the
    /// engine counters are restored and no vessel is touched. On success the
    /// liquidated vessels are returned with their outcomes for the caller to
    /// store.
    pub fn liquidate_batch(
        &mut self,
        vessels: &VesselManager,
        pool: &mut StabilityPool,
        price: FixedPoint,
        now: u64,
    ) -> Result<Vec<(Vessel, LiquidationOutcome)>> {
        let candidates = vessels.liquidatable(price, self.mcr, now)?;
        let header = pool.header().clone();
        let counters = self.clone();
        let mut liquidated = Vec::with_capacity(candidates.len());

        for owner in candidates {
            let Some(mut vessel) = vessels.get(&owner).cloned() else {
                continue;
            };
            match self.liquidate(&mut vessel, pool, price, now) {
                Ok(outcome) => liquidated.push((vessel, outcome)),
                Err(e) => {
                    warn!(
                        owner = %owner,
                        rolled_back = liquidated.len(),
                        error = %e,
                        "liquidation batch aborted"
                    );
                    pool.restore_header(header);
                    *self = counters;
                    return Err(e);
                }
            }
        }

        Ok(liquidated)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Total liquidations performed
    pub fn total_liquidations(&self) -> u64 {
        self.total_liquidations
    }

    /// Get statistics
    pub fn statistics(&self) -> LiquidationStats {
        LiquidationStats {
            mcr: self.mcr,
            total_liquidations: self.total_liquidations,
            total_debt_offset: self.total_debt_offset,
            total_collateral_to_pool: self.total_collateral_to_pool,
            total_unabsorbed_debt: self.total_unabsorbed_debt,
            total_unabsorbed_collateral: self.total_unabsorbed_collateral,
        }
    }
}

/// Liquidation statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationStats {
    /// Minimum collateral ratio
    pub mcr: FixedPoint,
    /// Liquidations performed
    pub total_liquidations: u64,
    /// Debt cancelled against the pool
    pub total_debt_offset: TokenAmount,
    /// Collateral sent to the pool
    pub total_collateral_to_pool: TokenAmount,
    /// Debt the pool could not absorb
    pub total_unabsorbed_debt: TokenAmount,
    /// Collateral left with unabsorbed debt
    pub total_unabsorbed_collateral: TokenAmount,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PoolParams;
    use crate::core::vessel::VesselStatus;
    use crate::utils::constants::ADDRESS_LENGTH;

    fn weth() -> AssetId {
        Address::from_label("weth")
    }

    fn tokens(n: u64) -> TokenAmount {
        TokenAmount::from_tokens(n)
    }

    fn price(n: u64) -> FixedPoint {
        FixedPoint::from_integer(n)
    }

    fn setup(deposit: u64) -> (LiquidationEngine, StabilityPool) {
        let mut pool = StabilityPool::new(weth(), &PoolParams::default(), 0).unwrap();
        if deposit > 0 {
            pool.provide_to_sp(Address::from_label("sp"), tokens(deposit), tokens(deposit), 0)
                .unwrap();
        }
        (LiquidationEngine::new(FixedPoint::from_percentage(110)), pool)
    }

    fn vessel(collateral: u64, debt: u64) -> Vessel {
        Vessel::open(Address::from_label("borrower"), weth(), tokens(collateral), tokens(debt), 0, 0).unwrap()
    }

    #[test]
    fn test_liquidate_fully_absorbed() {
        let (mut engine, mut pool) = setup(10_000);
        let mut v = vessel(10, 2_000);

        // 10 * 200 = 2000 collateral value, ICR 100%
        let outcome = engine.liquidate(&mut v, &mut pool, price(200), 0).unwrap();

        assert!(outcome.fully_absorbed());
        assert_eq!(outcome.icr, FixedPoint::ONE);
        assert_eq!(outcome.debt_offset, tokens(2_000));
        assert_eq!(outcome.collateral_to_pool, tokens(10));
        assert_eq!(pool.total_deposits(), tokens(8_000));
        assert_eq!(pool.total_collateral(), tokens(10));
        assert_eq!(v.status, VesselStatus::Liquidated);
        assert_eq!(engine.total_liquidations(), 1);
    }

    #[test]
    fn test_liquidate_partially_absorbed() {
        let (mut engine, mut pool) = setup(1_000);
        let mut v = vessel(10, 2_000);

        let outcome = engine.liquidate(&mut v, &mut pool, price(200), 0).unwrap();

        assert!(!outcome.fully_absorbed());
        assert_eq!(outcome.debt_offset, tokens(1_000));
        assert_eq!(outcome.collateral_to_pool, tokens(5));
        assert_eq!(outcome.unabsorbed_debt, tokens(1_000));
        assert_eq!(outcome.unabsorbed_collateral, tokens(5));
        assert!(pool.total_deposits().is_zero());
        assert_eq!(pool.current_epoch(), 1);
    }

    #[test]
    fn test_cannot_liquidate_healthy_vessel() {
        let (mut engine, mut pool) = setup(10_000);
        let mut v = vessel(10, 1_000);

        let result = engine.liquidate(&mut v, &mut pool, price(200), 0);
        assert!(matches!(result, Err(Error::VesselHealthy(_))));
        assert!(v.is_active());
        assert_eq!(pool.total_deposits(), tokens(10_000));
    }

    #[test]
    fn test_interest_can_push_below_mcr() {
        let (engine, _) = setup(0);
        let mut v = vessel(11, 1_000);
        // ten percent over the elapsed window
        v.interest_rate_bps = 100_000_000_000_000_000;

        assert!(!engine.is_liquidatable(&v, price(100), 0).unwrap());
        assert!(engine.is_liquidatable(&v, price(100), 1_000_000_000).unwrap());
    }

    #[test]
    fn test_liquidate_batch() {
        let (mut engine, mut pool) = setup(10_000);
        let mut vessels = VesselManager::new();
        for (label, debt) in [("a", 1_900u64), ("b", 1_000), ("c", 2_000)] {
            let v = Vessel::open(Address::from_label(label), weth(), tokens(10), tokens(debt), 0, 0).unwrap();
            vessels.insert_new(v).unwrap();
        }

        let liquidated = engine.liquidate_batch(&vessels, &mut pool, price(200), 0).unwrap();

        assert_eq!(liquidated.len(), 2);
        assert!(liquidated.iter().all(|(v, _)| v.status == VesselStatus::Liquidated));
        assert_eq!(pool.total_deposits(), tokens(6_100));

        // nothing is stored until the caller commits
        assert_eq!(vessels.active_count(), 3);
        for (v, _) in liquidated {
            vessels.upsert(v);
        }
        assert_eq!(vessels.active_count(), 1);
    }

    #[test]
    fn test_failed_batch_restores_pool_and_counters() {
        let (mut engine, mut pool) = setup(10_000);
        let mut vessels = VesselManager::new();
        let first = Address::new([0x01; ADDRESS_LENGTH]);
        let second = Address::new([0x02; ADDRESS_LENGTH]);
        vessels
            .insert_new(Vessel::open(first, weth(), tokens(10), tokens(2_000), 0, 0).unwrap())
            .unwrap();
        // Belongs to another asset, so its liquidation fails after the first offset
        let foreign = Address::from_label("reth");
        vessels
            .insert_new(Vessel::open(second, foreign, tokens(10), tokens(2_000), 0, 0).unwrap())
            .unwrap();

        let header = pool.header().clone();
        let result = engine.liquidate_batch(&vessels, &mut pool, price(200), 0);

        assert!(matches!(result, Err(Error::UnknownAsset(_))));
        assert_eq!(pool.header(), &header);
        assert_eq!(pool.total_deposits(), tokens(10_000));
        assert_eq!(engine.total_liquidations(), 0);
        assert!(engine.statistics().total_debt_offset.is_zero());
        assert_eq!(vessels.active_count(), 2);
    }
}
