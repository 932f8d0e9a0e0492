//! Stability Pool implementation (Liquity-style).
//!
//! Depositors provide debt tokens that are burned to cancel liquidated debt.
//! In return they receive the liquidated collateral and a stream of reward
//! tokens from community issuance, both pro-rata to their compounded deposit.
//!
//! Nothing loops over depositors. The pool keeps three running quantities:
//!
//! - `P`, the product of all `(1 - loss / deposits)` factors, so a deposit
//!   made at `P_0` is worth `d * P / P_0` today
//! - `S[epoch][scale]`, the sum of collateral gained per unit staked, weighted by `P`
//! - `G[epoch][scale]`, the same for reward tokens
//!
//! When `P` would drop below `1e9` it is multiplied by `1e9` and the scale
//! increments. When an offset empties the pool the epoch increments and `P`
//! resets to `1e18`. Each depositor stores a snapshot of these values and
//! computes everything owed from the difference.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::core::config::PoolParams;
use crate::core::token::TokenAmount;
use crate::error::{Error, Result};
use crate::liquidation::issuance::CommunityIssuance;
use crate::utils::constants::{DECIMAL_PRECISION, SCALE_FACTOR};
use crate::utils::crypto::{Address, AssetId, Hash};
use crate::utils::math::*;

/// Accumulator table keyed by epoch, then scale
pub type EpochScaleTable = BTreeMap<u64, BTreeMap<u64, U256>>;

fn table_get(table: &EpochScaleTable, epoch: u64, scale: u64) -> U256 {
    table
        .get(&epoch)
        .and_then(|scales| scales.get(&scale))
        .copied()
        .unwrap_or_default()
}

fn table_add(table: &mut EpochScaleTable, epoch: u64, scale: u64, delta: U256) -> Result<U256> {
    let slot = table.entry(epoch).or_default().entry(scale).or_default();
    *slot = add_wide(*slot, delta)?;
    Ok(*slot)
}

/// Splits `amount` across `total` units with error feedback.
///
/// Returns `(per_unit, residual)` where `per_unit = floor((amount * 1e18 + error) / total)`
/// and the residual is carried into the next call.
pub fn per_unit_share(amount: u128, total: u128, error: u128) -> Result<(u128, u128)> {
    if total == 0 {
        return Err(Error::InvalidParameter {
            name: "total".into(),
            reason: "cannot distribute over zero deposits".into(),
        });
    }
    let numerator = U256::from(amount) * U256::from(DECIMAL_PRECISION) + U256::from(error);
    let total = U256::from(total);
    let per_unit = numerator / total;
    let residual = numerator - per_unit * total;
    Ok((to_u128(per_unit, "per_unit_share")?, residual.as_u128()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// POOL EPOCH
// ═══════════════════════════════════════════════════════════════════════════════

/// Product factor together with the counters that keep it representable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEpoch {
    /// Incremented each time an offset empties the pool
    pub epoch: u64,
    /// Incremented each time `P` is rescaled by `1e9`
    pub scale: u64,
    /// Product factor `P`, always positive
    pub product: FixedPoint,
}

impl Default for PoolEpoch {
    fn default() -> Self {
        Self {
            epoch: 0,
            scale: 0,
            product: FixedPoint::ONE,
        }
    }
}

/// Result of applying one offset to a [`PoolEpoch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetTransition {
    /// State after the offset
    pub next: PoolEpoch,
    /// Debt lost per unit deposited, scaled by 1e18
    pub loss_per_unit: u128,
    /// Residual carried into the next loss computation
    pub loss_error: u128,
    /// Whether the offset emptied the pool
    pub emptied: bool,
}

impl PoolEpoch {
    /// Pure transition for cancelling `debt` against `total_deposits`.
    ///
    /// `debt` must not exceed `total_deposits`, which must be positive.
    pub fn apply_offset(&self, debt: u128, total_deposits: u128, loss_error: u128) -> Result<OffsetTransition> {
        if total_deposits == 0 || debt > total_deposits {
            return Err(Error::InsufficientStabilityPool {
                required: debt,
                available: total_deposits,
            });
        }

        if debt == total_deposits {
            return Ok(OffsetTransition {
                next: PoolEpoch {
                    epoch: self.epoch + 1,
                    scale: 0,
                    product: FixedPoint::ONE,
                },
                loss_per_unit: DECIMAL_PRECISION,
                loss_error: 0,
                emptied: true,
            });
        }

        let (mut loss_per_unit, loss_error) = per_unit_share(debt, total_deposits, loss_error)?;
        // A partial offset must leave P positive
        loss_per_unit = loss_per_unit.min(DECIMAL_PRECISION - 1);
        let new_product_factor = DECIMAL_PRECISION - loss_per_unit;

        let current = self.product.raw();
        let mut scale = self.scale;
        let mut product = mul_div(current, new_product_factor, DECIMAL_PRECISION)?;

        // At most two rescales: P >= 1e9 and the factor >= 1 keep the first
        // rescaled value at or above 1.
        if product < SCALE_FACTOR {
            product = mul_div(current * SCALE_FACTOR, new_product_factor, DECIMAL_PRECISION)?;
            scale += 1;
            if product < SCALE_FACTOR {
                product *= SCALE_FACTOR;
                scale += 1;
            }
        }

        if product == 0 {
            return Err(Error::InvariantViolation("product factor reached zero".into()));
        }

        Ok(OffsetTransition {
            next: PoolEpoch {
                epoch: self.epoch,
                scale,
                product: FixedPoint::from_raw(product),
            },
            loss_per_unit,
            loss_error,
            emptied: false,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEPOSITOR SNAPSHOT
// ═══════════════════════════════════════════════════════════════════════════════

/// Pool values recorded at a depositor's last interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositorSnapshot {
    /// Product factor
    pub p: FixedPoint,
    /// Collateral sum at (epoch, scale)
    pub s: U256,
    /// Reward sum at (epoch, scale)
    pub g: U256,
    /// Scale
    pub scale: u64,
    /// Epoch
    pub epoch: u64,
}

/// A depositor's record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Depositor {
    /// Deposit as of the last interaction
    pub initial_deposit: TokenAmount,
    /// Pool values at the last interaction
    pub snapshot: DepositorSnapshot,
}

/// What a provide or withdraw did to a depositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositOutcome {
    /// Compounded deposit before the operation
    pub compounded_before: TokenAmount,
    /// Compounded deposit after the operation
    pub deposit_after: TokenAmount,
    /// Debt tokens moved in (provide) or out (withdraw)
    pub amount: TokenAmount,
    /// Collateral gain paid out
    pub collateral_gain: TokenAmount,
    /// Reward gain paid out
    pub reward_gain: TokenAmount,
    /// Rewards issued by the issuance trigger of this operation
    pub rewards_issued: TokenAmount,
}

/// What an offset did to the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetOutcome {
    /// Debt cancelled against deposits
    pub debt_cancelled: TokenAmount,
    /// Collateral added for depositors
    pub collateral_added: TokenAmount,
    /// Rewards issued by the issuance trigger of this offset
    pub rewards_issued: TokenAmount,
    /// Pool state after the offset
    pub state: PoolEpoch,
    /// Whether the offset emptied the pool
    pub emptied: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STABILITY POOL
// ═══════════════════════════════════════════════════════════════════════════════

/// Pool-level state, everything except depositor records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolHeader {
    /// Collateral asset
    pub asset: AssetId,
    /// Sum of compounded deposits
    pub total_deposits: TokenAmount,
    /// Collateral held for depositors
    pub total_collateral: TokenAmount,
    /// Epoch, scale and P
    pub state: PoolEpoch,
    /// `S` accumulators
    pub epoch_to_scale_to_sum: EpochScaleTable,
    /// `G` accumulators
    pub epoch_to_scale_to_g: EpochScaleTable,
    /// Collateral distribution residual
    pub last_coll_error: u128,
    /// Debt loss residual
    pub last_debt_loss_error: u128,
    /// Reward distribution residual
    pub last_reward_error: u128,
    /// Reward issuance schedule
    pub issuance: CommunityIssuance,
    /// Offsets processed
    pub total_offsets: u64,
    /// Debt cancelled by offsets
    pub total_debt_absorbed: TokenAmount,
}

/// Stability pool for one collateral asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilityPool {
    header: PoolHeader,
    deposits: BTreeMap<Address, Depositor>,
}

impl StabilityPool {
    /// Create an empty pool whose issuance starts at `now`
    pub fn new(asset: AssetId, params: &PoolParams, now: u64) -> Result<Self> {
        Ok(Self {
            header: PoolHeader {
                asset,
                total_deposits: TokenAmount::ZERO,
                total_collateral: TokenAmount::ZERO,
                state: PoolEpoch::default(),
                epoch_to_scale_to_sum: EpochScaleTable::new(),
                epoch_to_scale_to_g: EpochScaleTable::new(),
                last_coll_error: 0,
                last_debt_loss_error: 0,
                last_reward_error: 0,
                issuance: CommunityIssuance::new(params, now)?,
                total_offsets: 0,
                total_debt_absorbed: TokenAmount::ZERO,
            },
            deposits: BTreeMap::new(),
        })
    }

    /// Reassemble a pool from persisted parts
    pub fn from_parts(header: PoolHeader, deposits: BTreeMap<Address, Depositor>) -> Self {
        Self { header, deposits }
    }

    /// Pool-level state
    pub fn header(&self) -> &PoolHeader {
        &self.header
    }

    /// Roll pool-level state back to an earlier header
    pub(crate) fn restore_header(&mut self, header: PoolHeader) {
        self.header = header;
    }

    /// Put back a depositor record taken before a failed operation
    pub(crate) fn restore_depositor(&mut self, depositor: Address, record: Option<Depositor>) {
        match record {
            Some(record) => {
                self.deposits.insert(depositor, record);
            }
            None => {
                self.deposits.remove(&depositor);
            }
        }
    }

    /// All depositor records in address order
    pub fn depositors(&self) -> &BTreeMap<Address, Depositor> {
        &self.deposits
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DEPOSITS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Add `amount` to a deposit, paying out pending gains.
    ///
    /// `balance` is the depositor's spendable debt token balance.
    pub fn provide_to_sp(
        &mut self,
        depositor: Address,
        amount: TokenAmount,
        balance: TokenAmount,
        now: u64,
    ) -> Result<DepositOutcome> {
        if amount.is_zero() {
            return Err(Error::ZeroAmount);
        }
        if amount > balance {
            return Err(Error::InsufficientBalance {
                required: amount.raw(),
                available: balance.raw(),
            });
        }
        self.header.issuance.pending(now)?;

        let rewards_issued = self.trigger_issuance(now)?;
        let compounded_before = self.compounded_deposit(&depositor)?;
        let (collateral_gain, reward_gain) = self.settle_gains(&depositor)?;

        let deposit_after = compounded_before.checked_add(amount).ok_or(Error::Overflow {
            operation: "provide_to_sp deposit".into(),
        })?;
        self.header.total_deposits = self
            .header
            .total_deposits
            .checked_add(amount)
            .ok_or(Error::Overflow {
                operation: "provide_to_sp total".into(),
            })?;
        self.update_deposit_and_snapshot(depositor, deposit_after);

        debug!(
            asset = %self.header.asset,
            depositor = %depositor,
            amount = %amount,
            deposit = %deposit_after,
            total = %self.header.total_deposits,
            "deposit provided"
        );

        Ok(DepositOutcome {
            compounded_before,
            deposit_after,
            amount,
            collateral_gain,
            reward_gain,
            rewards_issued,
        })
    }

    /// Remove `amount` from a deposit, paying out pending gains.
    /// A zero `amount` only claims gains.
    pub fn withdraw_from_sp(&mut self, depositor: Address, amount: TokenAmount, now: u64) -> Result<DepositOutcome> {
        if !self.deposits.contains_key(&depositor) {
            return Err(Error::DepositNotFound(depositor.to_hex()));
        }
        let compounded_before = self.compounded_deposit(&depositor)?;
        if amount > compounded_before {
            return Err(Error::InsufficientDeposit {
                requested: amount.raw(),
                available: compounded_before.raw(),
            });
        }
        self.header.issuance.pending(now)?;

        let rewards_issued = self.trigger_issuance(now)?;
        let (collateral_gain, reward_gain) = self.settle_gains(&depositor)?;

        // Floor rounding of the loss can leave compounded deposits a few
        // units above the pool total
        let paid = amount.min(self.header.total_deposits);
        let deposit_after = compounded_before.saturating_sub(amount);
        self.header.total_deposits = self.header.total_deposits.saturating_sub(paid);
        self.update_deposit_and_snapshot(depositor, deposit_after);

        debug!(
            asset = %self.header.asset,
            depositor = %depositor,
            amount = %paid,
            deposit = %deposit_after,
            total = %self.header.total_deposits,
            "deposit withdrawn"
        );

        Ok(DepositOutcome {
            compounded_before,
            deposit_after,
            amount: paid,
            collateral_gain,
            reward_gain,
            rewards_issued,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIQUIDATION ABSORPTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Cancel `debt` against deposits and distribute `collateral` to depositors
    pub fn offset(&mut self, debt: TokenAmount, collateral: TokenAmount, now: u64) -> Result<OffsetOutcome> {
        let total = self.header.total_deposits;
        if debt > total {
            return Err(Error::InsufficientStabilityPool {
                required: debt.raw(),
                available: total.raw(),
            });
        }
        self.header.issuance.pending(now)?;

        let rewards_issued = self.trigger_issuance(now)?;
        if debt.is_zero() {
            return Ok(OffsetOutcome {
                debt_cancelled: TokenAmount::ZERO,
                collateral_added: TokenAmount::ZERO,
                rewards_issued,
                state: self.header.state,
                emptied: false,
            });
        }

        let (coll_per_unit, coll_error) =
            per_unit_share(collateral.raw(), total.raw(), self.header.last_coll_error)?;
        let transition = self.header.state.apply_offset(
            debt.raw(),
            total.raw(),
            self.header.last_debt_loss_error,
        )?;

        // S is weighted by P before the offset
        let current = self.header.state;
        let marginal = U256::from(coll_per_unit) * U256::from(current.product.raw());
        let new_s = table_add(
            &mut self.header.epoch_to_scale_to_sum,
            current.epoch,
            current.scale,
            marginal,
        )?;

        let total_collateral = self
            .header
            .total_collateral
            .checked_add(collateral)
            .ok_or(Error::Overflow {
                operation: "offset collateral".into(),
            })?;

        self.header.last_coll_error = coll_error;
        self.header.last_debt_loss_error = transition.loss_error;
        self.header.state = transition.next;
        self.header.total_collateral = total_collateral;
        self.header.total_deposits = total.saturating_sub(debt);
        self.header.total_offsets += 1;
        self.header.total_debt_absorbed = self.header.total_debt_absorbed.saturating_add(debt);

        debug!(
            asset = %self.header.asset,
            debt = %debt,
            collateral = %collateral,
            s = %new_s,
            p = %transition.next.product,
            "offset applied"
        );
        if transition.emptied {
            info!(
                asset = %self.header.asset,
                epoch = transition.next.epoch,
                "stability pool emptied, epoch advanced"
            );
        } else if transition.next.scale != current.scale {
            info!(
                asset = %self.header.asset,
                scale = transition.next.scale,
                p = %transition.next.product,
                "product factor rescaled"
            );
        }

        Ok(OffsetOutcome {
            debt_cancelled: debt,
            collateral_added: collateral,
            rewards_issued,
            state: transition.next,
            emptied: transition.emptied,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // REWARD ISSUANCE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Issue pending rewards into `G`. Returns the amount issued.
    ///
    /// With no deposits the issued amount is not distributed and can never
    /// be claimed.
    pub fn trigger_issuance(&mut self, now: u64) -> Result<TokenAmount> {
        let issued = self.header.issuance.issue(now)?;
        let total = self.header.total_deposits;
        if issued.is_zero() || total.is_zero() {
            return Ok(issued);
        }

        let (per_unit, error) = per_unit_share(issued.raw(), total.raw(), self.header.last_reward_error)?;
        let state = self.header.state;
        let marginal = U256::from(per_unit) * U256::from(state.product.raw());
        table_add(&mut self.header.epoch_to_scale_to_g, state.epoch, state.scale, marginal)?;
        self.header.last_reward_error = error;

        debug!(
            asset = %self.header.asset,
            issued = %issued,
            per_unit,
            epoch = state.epoch,
            scale = state.scale,
            "reward sum updated"
        );
        Ok(issued)
    }

    /// Settle issuance at the old rate, then apply `rate` from `now` on
    pub fn set_weekly_reward_rate(&mut self, rate: TokenAmount, now: u64) -> Result<TokenAmount> {
        let issued = self.trigger_issuance(now)?;
        self.header.issuance.set_weekly_rate(rate, now)?;
        info!(asset = %self.header.asset, rate = %rate, "weekly reward rate changed");
        Ok(issued)
    }

    /// Change the lifetime reward cap
    pub fn set_reward_supply_cap(&mut self, cap: TokenAmount) -> Result<()> {
        self.header.issuance.set_supply_cap(cap)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Collateral asset
    pub fn asset(&self) -> AssetId {
        self.header.asset
    }

    /// Sum of compounded deposits
    pub fn total_deposits(&self) -> TokenAmount {
        self.header.total_deposits
    }

    /// Collateral held for depositors
    pub fn total_collateral(&self) -> TokenAmount {
        self.header.total_collateral
    }

    /// Epoch, scale and P
    pub fn state(&self) -> PoolEpoch {
        self.header.state
    }

    /// Product factor P
    pub fn p(&self) -> FixedPoint {
        self.header.state.product
    }

    /// Current scale
    pub fn current_scale(&self) -> u64 {
        self.header.state.scale
    }

    /// Current epoch
    pub fn current_epoch(&self) -> u64 {
        self.header.state.epoch
    }

    /// `S` at (epoch, scale)
    pub fn sum_s(&self, epoch: u64, scale: u64) -> U256 {
        table_get(&self.header.epoch_to_scale_to_sum, epoch, scale)
    }

    /// `G` at (epoch, scale)
    pub fn sum_g(&self, epoch: u64, scale: u64) -> U256 {
        table_get(&self.header.epoch_to_scale_to_g, epoch, scale)
    }

    /// Reward issuance schedule
    pub fn issuance(&self) -> &CommunityIssuance {
        &self.header.issuance
    }

    /// Get a depositor's record
    pub fn get_deposit(&self, depositor: &Address) -> Option<&Depositor> {
        self.deposits.get(depositor)
    }

    /// Number of depositors
    pub fn depositor_count(&self) -> usize {
        self.deposits.len()
    }

    /// Deposit after all losses since the depositor's snapshot
    pub fn compounded_deposit(&self, depositor: &Address) -> Result<TokenAmount> {
        let Some(record) = self.deposits.get(depositor) else {
            return Ok(TokenAmount::ZERO);
        };
        let initial = record.initial_deposit.raw();
        let snapshot = record.snapshot;
        let state = self.header.state;

        if initial == 0 || snapshot.epoch < state.epoch {
            return Ok(TokenAmount::ZERO);
        }

        let compounded = match state.scale.saturating_sub(snapshot.scale) {
            0 => mul_div(initial, state.product.raw(), snapshot.p.raw())?,
            1 => mul_div(initial, state.product.raw(), snapshot.p.raw())? / SCALE_FACTOR,
            _ => 0,
        };

        // Below one billionth of the initial deposit only rounding error is left
        if compounded < initial / SCALE_FACTOR {
            return Ok(TokenAmount::ZERO);
        }
        Ok(TokenAmount::from_raw(compounded))
    }

    /// Collateral owed to a depositor since their snapshot
    pub fn depositor_collateral_gain(&self, depositor: &Address) -> Result<TokenAmount> {
        self.gain_from(depositor, &self.header.epoch_to_scale_to_sum, |s| s.s)
    }

    /// Reward tokens owed to a depositor since their snapshot
    pub fn depositor_reward_gain(&self, depositor: &Address) -> Result<TokenAmount> {
        self.gain_from(depositor, &self.header.epoch_to_scale_to_g, |s| s.g)
    }

    /// Get pool statistics
    pub fn statistics(&self) -> StabilityPoolStats {
        StabilityPoolStats {
            asset: self.header.asset,
            total_deposits: self.header.total_deposits,
            total_collateral: self.header.total_collateral,
            depositor_count: self.deposits.len(),
            epoch: self.header.state.epoch,
            scale: self.header.state.scale,
            p: self.header.state.product,
            total_offsets: self.header.total_offsets,
            total_debt_absorbed: self.header.total_debt_absorbed,
            weekly_reward_rate: self.header.issuance.weekly_rate(),
            total_rewards_issued: self.header.issuance.total_issued(),
            remaining_rewards: self.header.issuance.remaining(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    fn gain_from<F>(&self, depositor: &Address, table: &EpochScaleTable, snapshot_sum: F) -> Result<TokenAmount>
    where
        F: Fn(&DepositorSnapshot) -> U256,
    {
        let Some(record) = self.deposits.get(depositor) else {
            return Ok(TokenAmount::ZERO);
        };
        if record.initial_deposit.is_zero() {
            return Ok(TokenAmount::ZERO);
        }
        let snapshot = record.snapshot;

        // Gains earned in the snapshot scale, plus those earned in the next
        // scale (weighted down by the rescale factor). Later scales hold none
        // because the deposit is gone by then.
        let first = sub_wide(table_get(table, snapshot.epoch, snapshot.scale), snapshot_sum(&snapshot))?;
        let second = table_get(table, snapshot.epoch, snapshot.scale + 1) / U256::from(SCALE_FACTOR);
        let portion = add_wide(first, second)?;

        let gain = mul_div_wide(U256::from(record.initial_deposit.raw()), portion, U256::from(snapshot.p.raw()))?
            / U256::from(DECIMAL_PRECISION);
        to_u128(gain, "depositor gain").map(TokenAmount::from_raw)
    }

    /// Pays out pending gains, bounded by what the pool holds
    fn settle_gains(&mut self, depositor: &Address) -> Result<(TokenAmount, TokenAmount)> {
        let collateral_gain = self
            .depositor_collateral_gain(depositor)?
            .min(self.header.total_collateral);
        let reward_gain = self.depositor_reward_gain(depositor)?;

        self.header.total_collateral = self.header.total_collateral.saturating_sub(collateral_gain);
        Ok((collateral_gain, reward_gain))
    }

    fn update_deposit_and_snapshot(&mut self, depositor: Address, deposit: TokenAmount) {
        if deposit.is_zero() {
            self.deposits.remove(&depositor);
            return;
        }

        let state = self.header.state;
        let snapshot = DepositorSnapshot {
            p: state.product,
            s: self.sum_s(state.epoch, state.scale),
            g: self.sum_g(state.epoch, state.scale),
            scale: state.scale,
            epoch: state.epoch,
        };
        self.deposits.insert(
            depositor,
            Depositor {
                initial_deposit: deposit,
                snapshot,
            },
        );
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Serialize pool header and depositors to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(&(&self.header, &self.deposits)).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes produced by [`StabilityPool::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (header, deposits): (PoolHeader, BTreeMap<Address, Depositor>) =
            bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))?;
        Ok(Self { header, deposits })
    }

    /// Compute state hash for audit comparisons
    pub fn state_hash(&self) -> Result<Hash> {
        Ok(Hash::sha256(&self.to_bytes()?))
    }
}

/// Stability pool statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityPoolStats {
    /// Collateral asset
    pub asset: AssetId,
    /// Sum of compounded deposits
    pub total_deposits: TokenAmount,
    /// Collateral held for depositors
    pub total_collateral: TokenAmount,
    /// Number of depositors
    pub depositor_count: usize,
    /// Current epoch
    pub epoch: u64,
    /// Current scale
    pub scale: u64,
    /// Product factor
    pub p: FixedPoint,
    /// Offsets processed
    pub total_offsets: u64,
    /// Debt cancelled by offsets
    pub total_debt_absorbed: TokenAmount,
    /// Reward tokens per week
    pub weekly_reward_rate: TokenAmount,
    /// Reward tokens issued
    pub total_rewards_issued: TokenAmount,
    /// Reward tokens left under the cap
    pub remaining_rewards: TokenAmount,
}
