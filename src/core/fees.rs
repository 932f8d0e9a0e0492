//! Fee collector for settled interest.
//!
//! Vessel operations settle interest into principal and hand the accrued
//! amount back to the caller. The ledger mints that amount in debt tokens to
//! the fee collector account and records it here, per collateral asset.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::core::token::TokenAmount;
use crate::error::{Error, Result};
use crate::utils::crypto::{Address, AssetId};

// ═══════════════════════════════════════════════════════════════════════════════
// FEE COLLECTOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Accumulates interest routed to the fee collector account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeCollector {
    /// Account credited with settled interest
    address: Address,
    /// Interest collected per collateral asset
    collected: BTreeMap<AssetId, TokenAmount>,
    /// Interest collected across all assets
    total_collected: TokenAmount,
    /// Number of non-zero settlements recorded
    settlements: u64,
}

impl FeeCollector {
    /// Create a collector crediting `address`
    pub fn new(address: Address) -> Self {
        Self {
            address,
            collected: BTreeMap::new(),
            total_collected: TokenAmount::ZERO,
            settlements: 0,
        }
    }

    /// Account credited with settled interest
    pub fn address(&self) -> Address {
        self.address
    }

    /// Record interest settled on `asset`. Zero amounts are ignored.
    pub fn record(&mut self, asset: AssetId, amount: TokenAmount) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }

        let per_asset = self
            .collected_for(&asset)
            .checked_add(amount)
            .ok_or(Error::Overflow {
                operation: "fee collector per asset".into(),
            })?;
        let total = self.total_collected.checked_add(amount).ok_or(Error::Overflow {
            operation: "fee collector total".into(),
        })?;

        self.collected.insert(asset, per_asset);
        self.total_collected = total;
        self.settlements += 1;

        debug!(asset = %asset, amount = %amount, total = %total, "interest routed to fee collector");
        Ok(())
    }

    /// Interest collected for one asset
    pub fn collected_for(&self, asset: &AssetId) -> TokenAmount {
        self.collected.get(asset).copied().unwrap_or(TokenAmount::ZERO)
    }

    /// Interest collected across all assets
    pub fn total_collected(&self) -> TokenAmount {
        self.total_collected
    }

    /// Get collector statistics
    pub fn statistics(&self) -> FeeStatistics {
        FeeStatistics {
            address: self.address,
            total_collected: self.total_collected,
            assets: self.collected.len(),
            settlements: self.settlements,
        }
    }
}

/// Fee collector statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeStatistics {
    /// Collector account
    pub address: Address,
    /// Interest collected across all assets
    pub total_collected: TokenAmount,
    /// Assets that produced interest
    pub assets: usize,
    /// Non-zero settlements recorded
    pub settlements: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_per_asset() {
        let weth = Address::from_label("weth");
        let reth = Address::from_label("reth");
        let mut collector = FeeCollector::new(Address::from_label("treasury"));

        collector.record(weth, TokenAmount::from_tokens(3)).unwrap();
        collector.record(weth, TokenAmount::from_tokens(2)).unwrap();
        collector.record(reth, TokenAmount::from_tokens(1)).unwrap();

        assert_eq!(collector.collected_for(&weth), TokenAmount::from_tokens(5));
        assert_eq!(collector.collected_for(&reth), TokenAmount::from_tokens(1));
        assert_eq!(collector.total_collected(), TokenAmount::from_tokens(6));
    }

    #[test]
    fn test_zero_amount_ignored() {
        let mut collector = FeeCollector::new(Address::from_label("treasury"));
        collector.record(Address::from_label("weth"), TokenAmount::ZERO).unwrap();

        let stats = collector.statistics();
        assert_eq!(stats.settlements, 0);
        assert_eq!(stats.assets, 0);
    }
}
