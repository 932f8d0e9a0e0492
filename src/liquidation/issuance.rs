//! Community issuance of the reward token.
//!
//! Each stability pool owns an issuance schedule: a weekly rate, bounded by
//! a lifetime supply cap. Elapsed time is consumed in whole issuance periods,
//! so the timestamp only moves forward by the periods actually paid out and
//! no fraction of a period is ever lost.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::config::PoolParams;
use crate::core::token::TokenAmount;
use crate::error::{Error, Result};
use crate::utils::constants::SECONDS_IN_ONE_WEEK;
use crate::utils::math::mul_div;

// ═══════════════════════════════════════════════════════════════════════════════
// COMMUNITY ISSUANCE
// ═══════════════════════════════════════════════════════════════════════════════

/// Reward emission schedule for one pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityIssuance {
    /// Lifetime cap on issued rewards
    supply_cap: TokenAmount,
    /// Rewards per week
    weekly_rate: TokenAmount,
    /// Granularity of issuance in seconds
    period_secs: u64,
    /// Start of the first unconsumed period
    last_update_time: u64,
    /// Rewards issued so far
    total_issued: TokenAmount,
}

impl CommunityIssuance {
    /// Create a schedule starting at `now`
    pub fn new(params: &PoolParams, now: u64) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            supply_cap: params.reward_supply_cap,
            weekly_rate: params.weekly_reward_rate,
            period_secs: params.issuance_period_secs,
            last_update_time: now,
            total_issued: TokenAmount::ZERO,
        })
    }

    /// Rewards per week
    pub fn weekly_rate(&self) -> TokenAmount {
        self.weekly_rate
    }

    /// Lifetime cap on issued rewards
    pub fn supply_cap(&self) -> TokenAmount {
        self.supply_cap
    }

    /// Rewards issued so far
    pub fn total_issued(&self) -> TokenAmount {
        self.total_issued
    }

    /// Rewards that can still be issued
    pub fn remaining(&self) -> TokenAmount {
        self.supply_cap.saturating_sub(self.total_issued)
    }

    /// Start of the first unconsumed period
    pub fn last_update_time(&self) -> u64 {
        self.last_update_time
    }

    /// Amount `issue(now)` would return, and the timestamp it would move to
    pub fn pending(&self, now: u64) -> Result<(TokenAmount, u64)> {
        let elapsed = now
            .checked_sub(self.last_update_time)
            .ok_or(Error::InvalidTimestampOrder {
                last: self.last_update_time,
                now,
            })?;

        let consumed = (elapsed / self.period_secs) * self.period_secs;
        if consumed == 0 {
            return Ok((TokenAmount::ZERO, self.last_update_time));
        }

        let uncapped = mul_div(
            self.weekly_rate.raw(),
            consumed as u128,
            SECONDS_IN_ONE_WEEK as u128,
        )?;
        let amount = TokenAmount::from_raw(uncapped).min(self.remaining());
        Ok((amount, self.last_update_time + consumed))
    }

    /// Issue rewards for every whole period elapsed since the last update
    pub fn issue(&mut self, now: u64) -> Result<TokenAmount> {
        let (amount, next_update) = self.pending(now)?;
        self.last_update_time = next_update;

        if !amount.is_zero() {
            self.total_issued = self.total_issued.saturating_add(amount);
            debug!(
                amount = %amount,
                total_issued = %self.total_issued,
                cap = %self.supply_cap,
                "rewards issued"
            );
        }
        Ok(amount)
    }

    /// Settle issuance at the old rate, then switch to `rate`.
    /// Returns the amount settled.
    pub fn set_weekly_rate(&mut self, rate: TokenAmount, now: u64) -> Result<TokenAmount> {
        let issued = self.issue(now)?;
        self.weekly_rate = rate;
        Ok(issued)
    }

    /// Change the lifetime cap. It cannot drop below what was already issued.
    pub fn set_supply_cap(&mut self, cap: TokenAmount) -> Result<()> {
        if cap < self.total_issued {
            return Err(Error::SupplyCapBelowIssued {
                cap: cap.raw(),
                issued: self.total_issued.raw(),
            });
        }
        self.supply_cap = cap;
        Ok(())
    }
}
