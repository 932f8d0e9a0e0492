//! Ledger operations - serializable, replayable state changes.
//!
//! An operation names its asset, its accounts and the caller's timestamp.
//! Amounts and prices are written as decimal strings (`"9999.9"`) and
//! accounts as either `0x` addresses or plain labels (`"alice"`).

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::token::TokenAmount;
use crate::core::vessel::{Vessel, VesselRelease};
use crate::error::{Error, Result};
use crate::liquidation::engine::LiquidationOutcome;
use crate::liquidation::stability_pool::DepositOutcome;
use crate::protocol::ledger::Ledger;
use crate::utils::crypto::{Address, AssetId};
use crate::utils::math::FixedPoint;

/// Serde adapter for decimal-string token amounts
pub mod decimal_amount {
    use super::TokenAmount;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as a decimal string
    pub fn serialize<S: Serializer>(amount: &TokenAmount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_decimal_string())
    }

    /// Deserialize from a decimal string
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TokenAmount, D::Error> {
        let s = String::deserialize(deserializer)?;
        TokenAmount::from_decimal_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for decimal-string prices and ratios
pub mod decimal_ratio {
    use super::{FixedPoint, TokenAmount};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as a decimal string
    pub fn serialize<S: Serializer>(value: &FixedPoint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&TokenAmount::from_raw(value.raw()).to_decimal_string())
    }

    /// Deserialize from a decimal string
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FixedPoint, D::Error> {
        let s = String::deserialize(deserializer)?;
        let parsed = TokenAmount::from_decimal_str(&s).map_err(serde::de::Error::custom)?;
        Ok(FixedPoint::from_raw(parsed.raw()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// All ledger operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LedgerOperation {
    /// Register a collateral asset and its pool
    RegisterAsset {
        /// Collateral asset
        asset: AssetId,
        /// Time the operation applies at
        timestamp: u64,
    },
    /// Open a vessel
    OpenVessel {
        /// Collateral asset
        asset: AssetId,
        /// Vessel owner
        owner: Address,
        /// Collateral locked
        #[serde(with = "decimal_amount")]
        collateral: TokenAmount,
        /// Debt minted to the owner
        #[serde(with = "decimal_amount")]
        debt: TokenAmount,
        /// Interest rate, or the configured default
        #[serde(default)]
        interest_rate_bps: Option<u64>,
        /// Time the operation applies at
        timestamp: u64,
    },
    /// Add collateral to a vessel
    AddCollateral {
        /// Collateral asset
        asset: AssetId,
        /// Vessel owner
        owner: Address,
        /// Collateral to add
        #[serde(with = "decimal_amount")]
        amount: TokenAmount,
        /// Time the operation applies at
        timestamp: u64,
    },
    /// Withdraw collateral from a vessel
    WithdrawCollateral {
        /// Collateral asset
        asset: AssetId,
        /// Vessel owner
        owner: Address,
        /// Collateral to withdraw
        #[serde(with = "decimal_amount")]
        amount: TokenAmount,
        /// Time the operation applies at
        timestamp: u64,
    },
    /// Borrow against a vessel
    Borrow {
        /// Collateral asset
        asset: AssetId,
        /// Vessel owner
        owner: Address,
        /// Debt to borrow
        #[serde(with = "decimal_amount")]
        amount: TokenAmount,
        /// Time the operation applies at
        timestamp: u64,
    },
    /// Repay vessel debt
    Repay {
        /// Collateral asset
        asset: AssetId,
        /// Vessel owner
        owner: Address,
        /// Debt to repay
        #[serde(with = "decimal_amount")]
        amount: TokenAmount,
        /// Time the operation applies at
        timestamp: u64,
    },
    /// Close a vessel
    CloseVessel {
        /// Collateral asset
        asset: AssetId,
        /// Vessel owner
        owner: Address,
        /// Time the operation applies at
        timestamp: u64,
    },
    /// Liquidate one vessel
    Liquidate {
        /// Collateral asset
        asset: AssetId,
        /// Vessel owner
        owner: Address,
        /// Collateral price in debt tokens
        #[serde(with = "decimal_ratio")]
        price: FixedPoint,
        /// Time the operation applies at
        timestamp: u64,
    },
    /// Liquidate every vessel below the MCR
    LiquidateAll {
        /// Collateral asset
        asset: AssetId,
        /// Collateral price in debt tokens
        #[serde(with = "decimal_ratio")]
        price: FixedPoint,
        /// Time the operation applies at
        timestamp: u64,
    },
    /// Settle interest across the asset's vessels
    CollectInterests {
        /// Collateral asset
        asset: AssetId,
        /// Time the operation applies at
        timestamp: u64,
    },
    /// Deposit into the stability pool
    ProvideToSp {
        /// Collateral asset
        asset: AssetId,
        /// Pool depositor
        depositor: Address,
        /// Debt tokens to deposit
        #[serde(with = "decimal_amount")]
        amount: TokenAmount,
        /// Time the operation applies at
        timestamp: u64,
    },
    /// Withdraw from the stability pool
    WithdrawFromSp {
        /// Collateral asset
        asset: AssetId,
        /// Pool depositor
        depositor: Address,
        /// Deposit to withdraw, zero to claim gains only
        #[serde(with = "decimal_amount")]
        amount: TokenAmount,
        /// Time the operation applies at
        timestamp: u64,
    },
    /// Issue pending rewards
    TriggerIssuance {
        /// Collateral asset
        asset: AssetId,
        /// Time the operation applies at
        timestamp: u64,
    },
    /// Change the weekly reward rate
    SetWeeklyRewardRate {
        /// Collateral asset
        asset: AssetId,
        /// New weekly reward rate
        #[serde(with = "decimal_amount")]
        rate: TokenAmount,
        /// Time the operation applies at
        timestamp: u64,
    },
    /// Change the reward supply cap
    SetRewardSupplyCap {
        /// Collateral asset
        asset: AssetId,
        /// New lifetime reward cap
        #[serde(with = "decimal_amount")]
        cap: TokenAmount,
        /// Time the operation applies at
        timestamp: u64,
    },
}

/// What an applied operation returned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationResult {
    /// Nothing to report
    Done,
    /// A newly opened vessel
    Vessel(Vessel),
    /// Interest settled
    Interest(TokenAmount),
    /// A closed vessel's release
    Release(VesselRelease),
    /// One liquidation
    Liquidation(LiquidationOutcome),
    /// A batch of liquidations
    Liquidations(Vec<LiquidationOutcome>),
    /// A deposit change
    Deposit(DepositOutcome),
    /// Rewards issued
    Issued(TokenAmount),
}

impl LedgerOperation {
    /// Get the operation type name
    pub fn operation_type(&self) -> &'static str {
        match self {
            Self::RegisterAsset { .. } => "RegisterAsset",
            Self::OpenVessel { .. } => "OpenVessel",
            Self::AddCollateral { .. } => "AddCollateral",
            Self::WithdrawCollateral { .. } => "WithdrawCollateral",
            Self::Borrow { .. } => "Borrow",
            Self::Repay { .. } => "Repay",
            Self::CloseVessel { .. } => "CloseVessel",
            Self::Liquidate { .. } => "Liquidate",
            Self::LiquidateAll { .. } => "LiquidateAll",
            Self::CollectInterests { .. } => "CollectInterests",
            Self::ProvideToSp { .. } => "ProvideToSp",
            Self::WithdrawFromSp { .. } => "WithdrawFromSp",
            Self::TriggerIssuance { .. } => "TriggerIssuance",
            Self::SetWeeklyRewardRate { .. } => "SetWeeklyRewardRate",
            Self::SetRewardSupplyCap { .. } => "SetRewardSupplyCap",
        }
    }

    /// Asset the operation touches
    pub fn asset(&self) -> AssetId {
        match self {
            Self::RegisterAsset { asset, .. }
            | Self::OpenVessel { asset, .. }
            | Self::AddCollateral { asset, .. }
            | Self::WithdrawCollateral { asset, .. }
            | Self::Borrow { asset, .. }
            | Self::Repay { asset, .. }
            | Self::CloseVessel { asset, .. }
            | Self::Liquidate { asset, .. }
            | Self::LiquidateAll { asset, .. }
            | Self::CollectInterests { asset, .. }
            | Self::ProvideToSp { asset, .. }
            | Self::WithdrawFromSp { asset, .. }
            | Self::TriggerIssuance { asset, .. }
            | Self::SetWeeklyRewardRate { asset, .. }
            | Self::SetRewardSupplyCap { asset, .. } => *asset,
        }
    }

    /// Caller-supplied timestamp
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::RegisterAsset { timestamp, .. }
            | Self::OpenVessel { timestamp, .. }
            | Self::AddCollateral { timestamp, .. }
            | Self::WithdrawCollateral { timestamp, .. }
            | Self::Borrow { timestamp, .. }
            | Self::Repay { timestamp, .. }
            | Self::CloseVessel { timestamp, .. }
            | Self::Liquidate { timestamp, .. }
            | Self::LiquidateAll { timestamp, .. }
            | Self::CollectInterests { timestamp, .. }
            | Self::ProvideToSp { timestamp, .. }
            | Self::WithdrawFromSp { timestamp, .. }
            | Self::TriggerIssuance { timestamp, .. }
            | Self::SetWeeklyRewardRate { timestamp, .. }
            | Self::SetRewardSupplyCap { timestamp, .. } => *timestamp,
        }
    }

    /// Apply the operation to `ledger`
    pub fn apply(&self, ledger: &Ledger) -> Result<OperationResult> {
        let now = self.timestamp();
        let result = match *self {
            Self::RegisterAsset { asset, .. } => {
                ledger.register_asset(asset, now)?;
                OperationResult::Done
            }
            Self::OpenVessel {
                asset,
                owner,
                collateral,
                debt,
                interest_rate_bps,
                ..
            } => OperationResult::Vessel(ledger.open_vessel(asset, owner, collateral, debt, interest_rate_bps, now)?),
            Self::AddCollateral { asset, owner, amount, .. } => {
                OperationResult::Interest(ledger.add_collateral(asset, owner, amount, now)?)
            }
            Self::WithdrawCollateral { asset, owner, amount, .. } => {
                OperationResult::Interest(ledger.withdraw_collateral(asset, owner, amount, now)?)
            }
            Self::Borrow { asset, owner, amount, .. } => OperationResult::Interest(ledger.borrow(asset, owner, amount, now)?),
            Self::Repay { asset, owner, amount, .. } => OperationResult::Interest(ledger.repay(asset, owner, amount, now)?),
            Self::CloseVessel { asset, owner, .. } => OperationResult::Release(ledger.close_vessel(asset, owner, now)?),
            Self::Liquidate { asset, owner, price, .. } => {
                OperationResult::Liquidation(ledger.liquidate(asset, owner, price, now)?)
            }
            Self::LiquidateAll { asset, price, .. } => OperationResult::Liquidations(ledger.liquidate_all(asset, price, now)?),
            Self::CollectInterests { asset, .. } => OperationResult::Interest(ledger.collect_interests(asset, now)?),
            Self::ProvideToSp {
                asset,
                depositor,
                amount,
                ..
            } => OperationResult::Deposit(ledger.provide_to_sp(asset, depositor, amount, now)?),
            Self::WithdrawFromSp {
                asset,
                depositor,
                amount,
                ..
            } => OperationResult::Deposit(ledger.withdraw_from_sp(asset, depositor, amount, now)?),
            Self::TriggerIssuance { asset, .. } => OperationResult::Issued(ledger.trigger_issuance(asset, now)?),
            Self::SetWeeklyRewardRate { asset, rate, .. } => {
                OperationResult::Issued(ledger.set_weekly_reward_rate(asset, rate, now)?)
            }
            Self::SetRewardSupplyCap { asset, cap, .. } => {
                ledger.set_reward_supply_cap(asset, cap, now)?;
                OperationResult::Done
            }
        };

        debug!(operation = self.operation_type(), asset = %self.asset(), now, "operation applied");
        Ok(result)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPLAY
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse a JSON array of operations
pub fn parse_operations(json: &str) -> Result<Vec<LedgerOperation>> {
    serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))
}

/// Apply `operations` in order, stopping at the first failure.
///
/// The error names the index of the failing operation.
pub fn replay(ledger: &Ledger, operations: &[LedgerOperation]) -> Result<Vec<OperationResult>> {
    let mut results = Vec::with_capacity(operations.len());
    for (index, operation) in operations.iter().enumerate() {
        match operation.apply(ledger) {
            Ok(result) => results.push(result),
            Err(e) => {
                warn!(index, operation = operation.operation_type(), error = %e, "replay stopped");
                return Err(Error::Internal(format!(
                    "operation {} ({}) failed: {}",
                    index,
                    operation.operation_type(),
                    e
                )));
            }
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LedgerConfig;

    const OPS: &str = r#"[
        {"op": "register_asset", "asset": "weth", "timestamp": 0},
        {"op": "open_vessel", "asset": "weth", "owner": "alice", "collateral": "10", "debt": "1000", "timestamp": 0},
        {"op": "provide_to_sp", "asset": "weth", "depositor": "alice", "amount": "999.5", "timestamp": 60}
    ]"#;

    #[test]
    fn test_parse_operations() {
        let ops = parse_operations(OPS).unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[1].operation_type(), "OpenVessel");
        assert_eq!(ops[2].timestamp(), 60);
        assert_eq!(ops[2].asset(), Address::from_label("weth"));

        match &ops[2] {
            LedgerOperation::ProvideToSp { amount, .. } => {
                assert_eq!(*amount, TokenAmount::from_decimal_str("999.5").unwrap());
            }
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[test]
    fn test_replay() {
        let ledger = Ledger::new(LedgerConfig::default()).unwrap();
        let results = replay(&ledger, &parse_operations(OPS).unwrap()).unwrap();

        assert_eq!(results.len(), 3);
        assert!(matches!(results[2], OperationResult::Deposit(_)));
        assert_eq!(
            ledger.debt_balance(&Address::from_label("alice")).unwrap(),
            TokenAmount::from_decimal_str("0.5").unwrap()
        );
    }

    #[test]
    fn test_replay_stops_at_failure() {
        let ops = parse_operations(
            r#"[
                {"op": "register_asset", "asset": "weth", "timestamp": 0},
                {"op": "withdraw_from_sp", "asset": "weth", "depositor": "bob", "amount": "1", "timestamp": 0},
                {"op": "trigger_issuance", "asset": "weth", "timestamp": 0}
            ]"#,
        )
        .unwrap();

        let ledger = Ledger::new(LedgerConfig::default()).unwrap();
        let err = replay(&ledger, &ops).unwrap_err();
        assert!(err.to_string().contains("operation 1"));
        assert_eq!(ledger.events().unwrap().len(), 1);
    }

    #[test]
    fn test_operation_roundtrip_through_json() {
        let op = LedgerOperation::Liquidate {
            asset: Address::from_label("weth"),
            owner: Address::from_label("bob"),
            price: FixedPoint::from_integer(100),
            timestamp: 7,
        };
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains("\"price\":\"100\""));
        assert_eq!(serde_json::from_str::<LedgerOperation>(&json).unwrap(), op);
    }
}
