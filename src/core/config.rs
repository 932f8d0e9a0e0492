//! Ledger configuration and parameters.
//!
//! Parameters are divided into:
//! - Pool: reward issuance schedule applied to every new stability pool
//! - Vessel: default interest rate and minimum collateral ratio
//! - Accounts: fee collector and token symbols
//!
//! A configuration is read from JSON, then `VESSEL_LEDGER_*` environment
//! variables override individual fields.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::token::TokenAmount;
use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::crypto::Address;
use crate::utils::math::FixedPoint;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "VESSEL_LEDGER_";

// ═══════════════════════════════════════════════════════════════════════════════
// POOL PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Reward issuance parameters for a stability pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParams {
    /// Maximum reward tokens the pool will ever issue
    pub reward_supply_cap: TokenAmount,

    /// Reward tokens issued per week
    pub weekly_reward_rate: TokenAmount,

    /// Issuance granularity in seconds
    pub issuance_period_secs: u64,
}

impl Default for PoolParams {
    fn default() -> Self {
        Self {
            reward_supply_cap: TokenAmount::from_raw(DEFAULT_REWARD_SUPPLY_CAP),
            weekly_reward_rate: TokenAmount::ZERO,
            issuance_period_secs: DEFAULT_ISSUANCE_PERIOD_SECS,
        }
    }
}

impl PoolParams {
    /// Validate pool parameters
    pub fn validate(&self) -> Result<()> {
        if self.issuance_period_secs == 0 {
            return Err(Error::InvalidParameter {
                name: "issuance_period_secs".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.issuance_period_secs > SECONDS_IN_ONE_WEEK {
            return Err(Error::InvalidParameter {
                name: "issuance_period_secs".into(),
                reason: format!("must not exceed one week ({}s)", SECONDS_IN_ONE_WEEK),
            });
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VESSEL PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Vessel parameters shared by all collateral assets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VesselParams {
    /// Interest rate given to vessels opened without an explicit rate
    pub default_interest_rate_bps: u64,

    /// Minimum collateralization ratio (MCR)
    /// Below this, vessels can be liquidated
    pub mcr: FixedPoint,
}

impl Default for VesselParams {
    fn default() -> Self {
        Self {
            default_interest_rate_bps: DEFAULT_INTEREST_RATE_BPS,
            mcr: FixedPoint::from_raw(DEFAULT_MCR),
        }
    }
}

impl VesselParams {
    /// Validate vessel parameters
    pub fn validate(&self) -> Result<()> {
        if self.mcr < FixedPoint::ONE {
            return Err(Error::InvalidParameter {
                name: "mcr".into(),
                reason: format!("{} is below 100%", self.mcr),
            });
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER CONFIG
// ═══════════════════════════════════════════════════════════════════════════════

/// Complete ledger configuration. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Issuance parameters for new pools
    pub pool: PoolParams,

    /// Vessel parameters
    pub vessel: VesselParams,

    /// Account credited with settled interest
    pub fee_collector: Address,

    /// Debt token symbol
    pub debt_token_symbol: String,

    /// Reward token symbol
    pub reward_token_symbol: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            pool: PoolParams::default(),
            vessel: VesselParams::default(),
            fee_collector: Address::from_label("fee-collector"),
            debt_token_symbol: "GRAI".to_string(),
            reward_token_symbol: "PRON".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Set the weekly reward rate for new pools
    pub fn with_weekly_reward_rate(mut self, rate: TokenAmount) -> Self {
        self.pool.weekly_reward_rate = rate;
        self
    }

    /// Set the reward supply cap for new pools
    pub fn with_reward_supply_cap(mut self, cap: TokenAmount) -> Self {
        self.pool.reward_supply_cap = cap;
        self
    }

    /// Set the issuance period
    pub fn with_issuance_period(mut self, secs: u64) -> Self {
        self.pool.issuance_period_secs = secs;
        self
    }

    /// Set the default vessel interest rate
    pub fn with_interest_rate(mut self, rate_bps: u64) -> Self {
        self.vessel.default_interest_rate_bps = rate_bps;
        self
    }

    /// Set the minimum collateral ratio
    pub fn with_mcr(mut self, mcr: FixedPoint) -> Self {
        self.vessel.mcr = mcr;
        self
    }

    /// Set the fee collector account
    pub fn with_fee_collector(mut self, fee_collector: Address) -> Self {
        self.fee_collector = fee_collector;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.pool.validate()?;
        self.vessel.validate()?;
        if self.debt_token_symbol.is_empty() || self.reward_token_symbol.is_empty() {
            return Err(Error::InvalidParameter {
                name: "token_symbol".into(),
                reason: "cannot be empty".into(),
            });
        }
        if self.debt_token_symbol == self.reward_token_symbol {
            return Err(Error::InvalidParameter {
                name: "token_symbol".into(),
                reason: "debt and reward tokens must differ".into(),
            });
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LOADING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Storage(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::Storage(e.to_string()))?;
            }
        }

        std::fs::write(path, content).map_err(|e| Error::Storage(e.to_string()))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    /// Apply overrides from an arbitrary lookup keyed by the unprefixed
    /// variable name (`WEEKLY_REWARD_RATE`, `MCR`, ...)
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("REWARD_SUPPLY_CAP") {
            self.pool.reward_supply_cap = TokenAmount::from_decimal_str(&value)?;
        }
        if let Some(value) = lookup("WEEKLY_REWARD_RATE") {
            self.pool.weekly_reward_rate = TokenAmount::from_decimal_str(&value)?;
        }
        if let Some(value) = lookup("ISSUANCE_PERIOD_SECS") {
            self.pool.issuance_period_secs = parse_number("ISSUANCE_PERIOD_SECS", &value)?;
        }
        if let Some(value) = lookup("INTEREST_RATE_BPS") {
            self.vessel.default_interest_rate_bps = parse_number("INTEREST_RATE_BPS", &value)?;
        }
        if let Some(value) = lookup("MCR") {
            // Decimal ratio, e.g. "1.1" for 110%
            let ratio = TokenAmount::from_decimal_str(&value)?;
            self.vessel.mcr = FixedPoint::from_raw(ratio.raw());
        }
        if let Some(value) = lookup("FEE_COLLECTOR") {
            self.fee_collector = value.parse()?;
        }
        Ok(self)
    }
}

fn parse_number(name: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| Error::InvalidParameter {
        name: name.to_lowercase(),
        reason: format!("not an integer: {}", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pool.reward_supply_cap.whole_tokens(), 32_000_000);
        assert_eq!(config.pool.issuance_period_secs, 60);
        assert_eq!(config.vessel.mcr, FixedPoint::from_percentage(110));
    }

    #[test]
    fn test_validation() {
        assert!(LedgerConfig::default().with_issuance_period(0).validate().is_err());
        assert!(LedgerConfig::default()
            .with_issuance_period(SECONDS_IN_ONE_WEEK + 1)
            .validate()
            .is_err());
        assert!(LedgerConfig::default()
            .with_mcr(FixedPoint::from_percentage(90))
            .validate()
            .is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("WEEKLY_REWARD_RATE", "204425"),
            ("ISSUANCE_PERIOD_SECS", "1"),
            ("MCR", "1.5"),
            ("FEE_COLLECTOR", "treasury"),
        ]
        .into_iter()
        .collect();

        let config = LedgerConfig::default()
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.pool.weekly_reward_rate, TokenAmount::from_tokens(204_425));
        assert_eq!(config.pool.issuance_period_secs, 1);
        assert_eq!(config.vessel.mcr, FixedPoint::from_percentage(150));
        assert_eq!(config.fee_collector, Address::from_label("treasury"));
    }

    #[test]
    fn test_bad_override_rejected() {
        let result = LedgerConfig::default().apply_overrides(|key| {
            (key == "ISSUANCE_PERIOD_SECS").then(|| "sixty".to_string())
        });
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = LedgerConfig::default().with_weekly_reward_rate(TokenAmount::from_tokens(7));
        config.save(&path).unwrap();

        let loaded = LedgerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
