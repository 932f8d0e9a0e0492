//! Token amounts and balance ledgers.
//!
//! The ledger tracks three kinds of balances:
//! - the debt token, minted on borrow and burned on repay
//! - the reward token, minted by community issuance and paid to depositors
//! - collateral, paid out of the stability pool as liquidation gains
//!
//! Each is a [`TokenLedger`]; all amounts carry 18 decimals.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::utils::constants::{DECIMAL_PRECISION, TOKEN_DECIMALS};
use crate::utils::crypto::{Address, Hash};

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN AMOUNT
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed token amount in 18-decimal base units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TokenAmount(u128);

impl TokenAmount {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Create from base units
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Create from whole tokens
    pub const fn from_tokens(tokens: u64) -> Self {
        Self(tokens as u128 * DECIMAL_PRECISION)
    }

    /// Get raw base units
    pub const fn raw(&self) -> u128 {
        self.0
    }

    /// Whole tokens (truncated)
    pub fn whole_tokens(&self) -> u128 {
        self.0 / DECIMAL_PRECISION
    }

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Saturating addition
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Saturating subtraction
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Smaller of two amounts
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    /// Parse a decimal string such as `"10000"` or `"9999.9"`.
    ///
    /// Digits beyond the 18th decimal are truncated.
    pub fn from_decimal_str(s: &str) -> Result<Self> {
        let value = Decimal::from_str(s.trim()).map_err(|e| Error::InvalidParameter {
            name: "amount".into(),
            reason: format!("{}: {}", s, e),
        })?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(Error::InvalidParameter {
                name: "amount".into(),
                reason: format!("{} is negative", s),
            });
        }

        let truncated = value.round_dp_with_strategy(TOKEN_DECIMALS, RoundingStrategy::ToZero);
        let mantissa = truncated.mantissa().unsigned_abs();
        let scale_up = 10u128.pow(TOKEN_DECIMALS - truncated.scale());

        mantissa
            .checked_mul(scale_up)
            .map(Self)
            .ok_or(Error::Overflow {
                operation: format!("parse amount {}", s),
            })
    }

    /// Format with trailing fractional zeros removed
    pub fn to_decimal_string(&self) -> String {
        let whole = self.0 / DECIMAL_PRECISION;
        let frac = self.0 % DECIMAL_PRECISION;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{:018}", frac);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal_string())
    }
}

impl FromStr for TokenAmount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_decimal_str(s)
    }
}

impl From<u128> for TokenAmount {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}

impl From<TokenAmount> for u128 {
    fn from(amount: TokenAmount) -> Self {
        amount.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Balance book for a single token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenLedger {
    /// Token symbol
    pub symbol: String,
    /// Total supply
    total_supply: TokenAmount,
    /// Balances by account
    balances: BTreeMap<Address, TokenAmount>,
}

impl TokenLedger {
    /// Create an empty ledger for `symbol`
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            total_supply: TokenAmount::ZERO,
            balances: BTreeMap::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SUPPLY MANAGEMENT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get total supply
    pub fn total_supply(&self) -> TokenAmount {
        self.total_supply
    }

    /// Get balance of an account
    pub fn balance_of(&self, owner: &Address) -> TokenAmount {
        self.balances.get(owner).copied().unwrap_or(TokenAmount::ZERO)
    }

    /// Mint new tokens. Minting zero is a no-op.
    pub fn mint(&mut self, to: Address, amount: TokenAmount) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }

        let (new_supply, new_balance) = self.minted(&to, amount)?;
        self.balances.insert(to, new_balance);
        self.total_supply = new_supply;
        Ok(())
    }

    /// Fails with `Overflow` if minting `amount` to `to` would overflow
    pub fn ensure_mintable(&self, to: &Address, amount: TokenAmount) -> Result<()> {
        self.minted(to, amount).map(|_| ())
    }

    /// Burn tokens from an account
    pub fn burn(&mut self, from: Address, amount: TokenAmount) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }

        let current_balance = self.ensure_balance(&from, amount)?;
        self.set_balance(from, current_balance.saturating_sub(amount));
        self.total_supply = self.total_supply.saturating_sub(amount);
        Ok(())
    }

    /// Transfer tokens between accounts
    pub fn transfer(&mut self, from: Address, to: Address, amount: TokenAmount) -> Result<()> {
        if amount.is_zero() || from == to {
            return Ok(());
        }

        let from_balance = self.ensure_balance(&from, amount)?;
        let new_to_balance = self.balance_of(&to).checked_add(amount).ok_or(Error::Overflow {
            operation: format!("transfer {} balance", self.symbol),
        })?;

        self.set_balance(from, from_balance.saturating_sub(amount));
        self.balances.insert(to, new_to_balance);
        Ok(())
    }

    /// Fails with `InsufficientBalance` unless `owner` holds at least `amount`
    pub fn ensure_balance(&self, owner: &Address, amount: TokenAmount) -> Result<TokenAmount> {
        let balance = self.balance_of(owner);
        if balance < amount {
            return Err(Error::InsufficientBalance {
                required: amount.raw(),
                available: balance.raw(),
            });
        }
        Ok(balance)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get number of token holders
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Iterate over all non-zero balances in address order
    pub fn balances(&self) -> impl Iterator<Item = (&Address, &TokenAmount)> {
        self.balances.iter()
    }

    /// Verify supply invariant (total_supply == sum of all balances)
    pub fn verify_supply_invariant(&self) -> bool {
        let sum = self
            .balances
            .values()
            .try_fold(0u128, |acc, b| acc.checked_add(b.raw()));
        sum == Some(self.total_supply.raw())
    }

    /// Compute state hash over supply and sorted balances
    pub fn state_hash(&self) -> Hash {
        let mut data = Vec::new();
        data.extend_from_slice(self.symbol.as_bytes());
        data.extend_from_slice(&self.total_supply.raw().to_be_bytes());
        for (owner, balance) in &self.balances {
            data.extend_from_slice(owner.as_bytes());
            data.extend_from_slice(&balance.raw().to_be_bytes());
        }
        Hash::sha256(&data)
    }

    fn minted(&self, to: &Address, amount: TokenAmount) -> Result<(TokenAmount, TokenAmount)> {
        let supply = self.total_supply.checked_add(amount).ok_or(Error::Overflow {
            operation: format!("mint {} total supply", self.symbol),
        })?;
        let balance = self.balance_of(to).checked_add(amount).ok_or(Error::Overflow {
            operation: format!("mint {} balance", self.symbol),
        })?;
        Ok((supply, balance))
    }

    fn set_balance(&mut self, owner: Address, balance: TokenAmount) {
        if balance.is_zero() {
            self.balances.remove(&owner);
        } else {
            self.balances.insert(owner, balance);
        }
    }
}
