//! Multi-asset ledger - orchestration of vessels, pools and balances.
//!
//! Each collateral asset owns an [`AssetBook`] (its stability pool, vessels
//! and liquidation engine) behind its own mutex, so every mutation for an
//! asset runs inside a single critical section. Token balances shared across
//! assets live in [`Accounts`], locked after the book.
//!
//! Lock order is always: asset book, then accounts, then the event log.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{info, warn};

use crate::core::config::{LedgerConfig, PoolParams};
use crate::core::fees::{FeeCollector, FeeStatistics};
use crate::core::token::{TokenAmount, TokenLedger};
use crate::core::vessel::{Vessel, VesselManager, VesselRelease, VesselStatistics};
use crate::error::{Error, Result};
use crate::liquidation::engine::{LiquidationEngine, LiquidationOutcome};
use crate::liquidation::stability_pool::{DepositOutcome, PoolHeader, StabilityPool, StabilityPoolStats};
use crate::protocol::events::{EventKind, EventLog};
use crate::utils::crypto::{Address, AssetId, Hash};
use crate::utils::math::FixedPoint;

/// Account holding the debt tokens deposited in an asset's pool
pub fn escrow_address(asset: &AssetId) -> Address {
    Address::from_label(&format!("stability-pool/{}", asset.to_hex()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET BOOK
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything the ledger tracks for one collateral asset
#[derive(Debug, Clone)]
pub struct AssetBook {
    pool: StabilityPool,
    vessels: VesselManager,
    liquidations: LiquidationEngine,
    last_timestamp: u64,
}

/// Book state that is neither pool nor vessel records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookMeta {
    /// Timestamp of the last applied operation
    pub last_timestamp: u64,
    /// Liquidation engine and its counters
    pub liquidations: LiquidationEngine,
}

impl AssetBook {
    /// Create an empty book for `asset`
    pub fn new(asset: AssetId, params: &PoolParams, mcr: FixedPoint, now: u64) -> Result<Self> {
        Ok(Self {
            pool: StabilityPool::new(asset, params, now)?,
            vessels: VesselManager::new(),
            liquidations: LiquidationEngine::new(mcr),
            last_timestamp: now,
        })
    }

    /// Reassemble a book from persisted parts
    pub fn from_parts(pool: StabilityPool, vessels: VesselManager, meta: BookMeta) -> Self {
        Self {
            pool,
            vessels,
            liquidations: meta.liquidations,
            last_timestamp: meta.last_timestamp,
        }
    }

    /// Collateral asset
    pub fn asset(&self) -> AssetId {
        self.pool.asset()
    }

    /// Stability pool
    pub fn pool(&self) -> &StabilityPool {
        &self.pool
    }

    /// Vessels of this asset
    pub fn vessels(&self) -> &VesselManager {
        &self.vessels
    }

    /// Liquidation engine
    pub fn liquidations(&self) -> &LiquidationEngine {
        &self.liquidations
    }

    /// Timestamp of the last applied operation
    pub fn last_timestamp(&self) -> u64 {
        self.last_timestamp
    }

    /// Persistable state besides pool and vessels
    pub fn meta(&self) -> BookMeta {
        BookMeta {
            last_timestamp: self.last_timestamp,
            liquidations: self.liquidations.clone(),
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            header: self.pool.header().clone(),
            liquidations: self.liquidations.clone(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.pool.restore_header(checkpoint.header);
        self.liquidations = checkpoint.liquidations;
    }

    fn check_clock(&self, now: u64) -> Result<()> {
        if now < self.last_timestamp {
            return Err(Error::InvalidTimestampOrder {
                last: self.last_timestamp,
                now,
            });
        }
        Ok(())
    }
}

/// Pool header and liquidation counters taken before an operation runs
struct Checkpoint {
    header: PoolHeader,
    liquidations: LiquidationEngine,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACCOUNTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Token balances shared by all assets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accounts {
    /// Debt token
    pub debt: TokenLedger,
    /// Reward token
    pub reward: TokenLedger,
    /// Collateral paid out by the ledger, per asset
    pub collateral: BTreeMap<AssetId, TokenLedger>,
    /// Interest routed to the fee collector
    pub fees: FeeCollector,
}

impl Accounts {
    /// Empty balances for the configured tokens
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            debt: TokenLedger::new(config.debt_token_symbol.clone()),
            reward: TokenLedger::new(config.reward_token_symbol.clone()),
            collateral: BTreeMap::new(),
            fees: FeeCollector::new(config.fee_collector),
        }
    }

    /// Collateral credited to `owner` for `asset`
    pub fn collateral_balance(&self, asset: &AssetId, owner: &Address) -> TokenAmount {
        self.collateral
            .get(asset)
            .map(|ledger| ledger.balance_of(owner))
            .unwrap_or(TokenAmount::ZERO)
    }

    fn credit_collateral(&mut self, asset: AssetId, to: Address, amount: TokenAmount) -> Result<()> {
        self.collateral
            .entry(asset)
            .or_insert_with(|| TokenLedger::new(format!("COLL-{}", asset.short())))
            .mint(to, amount)
    }

    fn ensure_collateral_creditable(&self, asset: &AssetId, to: &Address, amount: TokenAmount) -> Result<()> {
        match self.collateral.get(asset) {
            Some(ledger) => ledger.ensure_mintable(to, amount),
            None => Ok(()),
        }
    }

    // The helpers below either apply completely or leave balances untouched.

    fn route_interest(&mut self, asset: AssetId, amount: TokenAmount) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let collector = self.fees.address();
        self.debt.ensure_mintable(&collector, amount)?;
        self.fees.record(asset, amount)?;
        self.debt.mint(collector, amount)
    }

    fn pay_gains(&mut self, asset: AssetId, to: Address, outcome: &DepositOutcome) -> Result<()> {
        self.reward.ensure_mintable(&to, outcome.reward_gain)?;
        self.credit_collateral(asset, to, outcome.collateral_gain)?;
        self.reward.mint(to, outcome.reward_gain)
    }

    /// Burn the debt absorbed by `asset`'s pool from its escrow and route the
    /// interest the liquidated vessels settled
    fn settle_liquidations(&mut self, asset: AssetId, outcomes: &[LiquidationOutcome]) -> Result<()> {
        let overflow = |operation: &str| Error::Overflow {
            operation: operation.into(),
        };
        let mut absorbed = TokenAmount::ZERO;
        let mut interest = TokenAmount::ZERO;
        for outcome in outcomes {
            absorbed = absorbed
                .checked_add(outcome.debt_offset)
                .ok_or_else(|| overflow("liquidation debt offset"))?;
            interest = interest
                .checked_add(outcome.accrued_interest)
                .ok_or_else(|| overflow("liquidation interest"))?;
        }

        let escrow = escrow_address(&asset);
        self.debt.ensure_balance(&escrow, absorbed)?;
        self.route_interest(asset, interest)?;
        self.debt.burn(escrow, absorbed)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

type Effects<R> = (R, Vec<EventKind>);

/// Multi-asset vessel and stability pool ledger
pub struct Ledger {
    config: LedgerConfig,
    books: RwLock<BTreeMap<AssetId, Arc<Mutex<AssetBook>>>>,
    accounts: Mutex<Accounts>,
    events: Mutex<EventLog>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new(config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let accounts = Accounts::new(&config);
        Ok(Self::from_parts(config, accounts, Vec::new()))
    }

    /// Reassemble a ledger from persisted parts. The event log starts empty.
    pub fn from_parts(config: LedgerConfig, accounts: Accounts, books: Vec<AssetBook>) -> Self {
        let books = books
            .into_iter()
            .map(|book| (book.asset(), Arc::new(Mutex::new(book))))
            .collect();
        Self {
            config,
            books: RwLock::new(books),
            accounts: Mutex::new(accounts),
            events: Mutex::new(EventLog::new()),
        }
    }

    /// Ledger configuration
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Register a collateral asset with the configured pool parameters
    pub fn register_asset(&self, asset: AssetId, now: u64) -> Result<()> {
        self.register_asset_with(asset, &self.config.pool, now)
    }

    /// Register a collateral asset with its own pool parameters
    pub fn register_asset_with(&self, asset: AssetId, params: &PoolParams, now: u64) -> Result<()> {
        let mut books = self.books.write().map_err(|_| Error::Lock)?;
        if books.contains_key(&asset) {
            return Err(Error::AssetAlreadyRegistered(asset.to_hex()));
        }

        let book = AssetBook::new(asset, params, self.config.vessel.mcr, now)?;
        books.insert(asset, Arc::new(Mutex::new(book)));
        self.lock_events()?.record(now, asset, EventKind::AssetRegistered);

        info!(asset = %asset, weekly_rate = %params.weekly_reward_rate, "asset registered");
        Ok(())
    }

    /// Registered assets in address order
    pub fn assets(&self) -> Result<Vec<AssetId>> {
        Ok(self.books.read().map_err(|_| Error::Lock)?.keys().copied().collect())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // VESSEL OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Open a vessel and mint its debt to the owner.
    /// Without an explicit rate the configured default applies.
    pub fn open_vessel(
        &self,
        asset: AssetId,
        owner: Address,
        collateral: TokenAmount,
        debt: TokenAmount,
        interest_rate_bps: Option<u64>,
        now: u64,
    ) -> Result<Vessel> {
        let rate = interest_rate_bps.unwrap_or(self.config.vessel.default_interest_rate_bps);
        self.execute("open_vessel", asset, now, |book, accounts| {
            let vessel = Vessel::open(owner, asset, collateral, debt, rate, now)?;
            accounts.debt.ensure_mintable(&owner, debt)?;
            book.vessels.insert_new(vessel.clone())?;
            accounts.debt.mint(owner, debt)?;
            Ok((vessel, vec![EventKind::VesselOpened { owner, collateral, debt }]))
        })
    }

    /// Add collateral to a vessel. Returns the interest settled.
    pub fn add_collateral(&self, asset: AssetId, owner: Address, amount: TokenAmount, now: u64) -> Result<TokenAmount> {
        self.execute("add_collateral", asset, now, |book, accounts| {
            let mut vessel = book.vessels.active(&owner)?.clone();
            let interest = vessel.add_collateral(amount, now)?;
            accounts.route_interest(asset, interest)?;
            book.vessels.upsert(vessel);
            Ok((interest, vec![EventKind::CollateralAdded { owner, amount, interest }]))
        })
    }

    /// Withdraw collateral from a vessel to the owner. Returns the interest settled.
    pub fn withdraw_collateral(
        &self,
        asset: AssetId,
        owner: Address,
        amount: TokenAmount,
        now: u64,
    ) -> Result<TokenAmount> {
        self.execute("withdraw_collateral", asset, now, |book, accounts| {
            let mut vessel = book.vessels.active(&owner)?.clone();
            let interest = vessel.withdraw_collateral(amount, now)?;
            accounts.ensure_collateral_creditable(&asset, &owner, amount)?;
            accounts.route_interest(asset, interest)?;
            accounts.credit_collateral(asset, owner, amount)?;
            book.vessels.upsert(vessel);
            Ok((interest, vec![EventKind::CollateralWithdrawn { owner, amount, interest }]))
        })
    }

    /// Borrow more debt against a vessel. Returns the interest settled.
    pub fn borrow(&self, asset: AssetId, owner: Address, amount: TokenAmount, now: u64) -> Result<TokenAmount> {
        self.execute("borrow", asset, now, |book, accounts| {
            let mut vessel = book.vessels.active(&owner)?.clone();
            let interest = vessel.borrow(amount, now)?;
            let minted = amount.checked_add(interest).ok_or(Error::Overflow {
                operation: "borrow".into(),
            })?;
            accounts.debt.ensure_mintable(&owner, minted)?;
            accounts.route_interest(asset, interest)?;
            accounts.debt.mint(owner, amount)?;
            book.vessels.upsert(vessel);
            Ok((interest, vec![EventKind::DebtBorrowed { owner, amount, interest }]))
        })
    }

    /// Repay debt from the owner's balance. Returns the interest settled.
    pub fn repay(&self, asset: AssetId, owner: Address, amount: TokenAmount, now: u64) -> Result<TokenAmount> {
        self.execute("repay", asset, now, |book, accounts| {
            accounts.debt.ensure_balance(&owner, amount)?;
            let mut vessel = book.vessels.active(&owner)?.clone();
            let interest = vessel.repay(amount, now)?;
            accounts.route_interest(asset, interest)?;
            accounts.debt.burn(owner, amount)?;
            book.vessels.upsert(vessel);
            Ok((interest, vec![EventKind::DebtRepaid { owner, amount, interest }]))
        })
    }

    /// Close a vessel: burn its entire debt from the owner and release collateral
    pub fn close_vessel(&self, asset: AssetId, owner: Address, now: u64) -> Result<VesselRelease> {
        self.execute("close_vessel", asset, now, |book, accounts| {
            let mut vessel = book.vessels.active(&owner)?.clone();
            accounts.debt.ensure_balance(&owner, vessel.entire_debt(now)?)?;

            let release = vessel.close(now)?;
            accounts.ensure_collateral_creditable(&asset, &owner, release.collateral)?;
            accounts.route_interest(asset, release.accrued_interest)?;
            accounts.debt.burn(owner, release.debt)?;
            accounts.credit_collateral(asset, owner, release.collateral)?;
            book.vessels.upsert(vessel);
            Ok((
                release,
                vec![EventKind::VesselClosed {
                    owner,
                    debt: release.debt,
                    collateral: release.collateral,
                    interest: release.accrued_interest,
                }],
            ))
        })
    }

    /// Liquidate one vessel below the MCR at `price`
    pub fn liquidate(&self, asset: AssetId, owner: Address, price: FixedPoint, now: u64) -> Result<LiquidationOutcome> {
        self.execute("liquidate", asset, now, |book, accounts| {
            let mut vessel = book.vessels.active(&owner)?.clone();
            let outcome = book.liquidations.liquidate(&mut vessel, &mut book.pool, price, now)?;
            accounts.settle_liquidations(asset, std::slice::from_ref(&outcome))?;
            book.vessels.upsert(vessel);
            let event = liquidation_event(&outcome);
            Ok((outcome, vec![event]))
        })
    }

    /// Liquidate every vessel of the asset below the MCR at `price`
    pub fn liquidate_all(&self, asset: AssetId, price: FixedPoint, now: u64) -> Result<Vec<LiquidationOutcome>> {
        self.execute("liquidate_all", asset, now, |book, accounts| {
            let liquidated = book
                .liquidations
                .liquidate_batch(&book.vessels, &mut book.pool, price, now)?;
            let (vessels, outcomes): (Vec<_>, Vec<_>) = liquidated.into_iter().unzip();
            accounts.settle_liquidations(asset, &outcomes)?;

            for vessel in vessels {
                book.vessels.upsert(vessel);
            }
            let events = outcomes.iter().map(liquidation_event).collect();
            Ok((outcomes, events))
        })
    }

    /// Settle interest on every vessel of the asset
    pub fn collect_interests(&self, asset: AssetId, now: u64) -> Result<TokenAmount> {
        self.execute("collect_interests", asset, now, |book, accounts| {
            // Committed only once the interest is routed
            let mut vessels = book.vessels.clone();
            let amount = vessels.collect_interests(now)?;
            accounts.route_interest(asset, amount)?;
            book.vessels = vessels;
            Ok((amount, vec![EventKind::InterestCollected { amount }]))
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // STABILITY POOL OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Move `amount` of the depositor's debt tokens into the pool
    pub fn provide_to_sp(
        &self,
        asset: AssetId,
        depositor: Address,
        amount: TokenAmount,
        now: u64,
    ) -> Result<DepositOutcome> {
        self.execute("provide_to_sp", asset, now, |book, accounts| {
            let balance = accounts.debt.balance_of(&depositor);
            let previous = book.pool.get_deposit(&depositor).copied();
            let outcome = book.pool.provide_to_sp(depositor, amount, balance, now)?;
            let settled = accounts
                .pay_gains(asset, depositor, &outcome)
                .and_then(|()| accounts.debt.transfer(depositor, escrow_address(&asset), amount));
            if let Err(e) = settled {
                book.pool.restore_depositor(depositor, previous);
                return Err(e);
            }
            Ok((
                outcome,
                vec![EventKind::DepositProvided {
                    depositor,
                    amount,
                    collateral_gain: outcome.collateral_gain,
                    reward_gain: outcome.reward_gain,
                }],
            ))
        })
    }

    /// Withdraw `amount` of the compounded deposit. Zero claims gains only.
    pub fn withdraw_from_sp(
        &self,
        asset: AssetId,
        depositor: Address,
        amount: TokenAmount,
        now: u64,
    ) -> Result<DepositOutcome> {
        self.execute("withdraw_from_sp", asset, now, |book, accounts| {
            let previous = book.pool.get_deposit(&depositor).copied();
            let outcome = book.pool.withdraw_from_sp(depositor, amount, now)?;
            let settled = accounts
                .pay_gains(asset, depositor, &outcome)
                .and_then(|()| accounts.debt.transfer(escrow_address(&asset), depositor, outcome.amount));
            if let Err(e) = settled {
                book.pool.restore_depositor(depositor, previous);
                return Err(e);
            }
            Ok((
                outcome,
                vec![EventKind::DepositWithdrawn {
                    depositor,
                    amount: outcome.amount,
                    collateral_gain: outcome.collateral_gain,
                    reward_gain: outcome.reward_gain,
                }],
            ))
        })
    }

    /// Issue pending rewards into the pool
    pub fn trigger_issuance(&self, asset: AssetId, now: u64) -> Result<TokenAmount> {
        self.execute("trigger_issuance", asset, now, |book, _| {
            let amount = book.pool.trigger_issuance(now)?;
            Ok((amount, vec![EventKind::RewardsIssued { amount }]))
        })
    }

    /// Change the pool's weekly reward rate from `now` on
    pub fn set_weekly_reward_rate(&self, asset: AssetId, rate: TokenAmount, now: u64) -> Result<TokenAmount> {
        self.execute("set_weekly_reward_rate", asset, now, |book, _| {
            let settled = book.pool.set_weekly_reward_rate(rate, now)?;
            Ok((settled, vec![EventKind::WeeklyRateChanged { rate, settled }]))
        })
    }

    /// Change the pool's lifetime reward cap
    pub fn set_reward_supply_cap(&self, asset: AssetId, cap: TokenAmount, now: u64) -> Result<()> {
        self.execute("set_reward_supply_cap", asset, now, |book, _| {
            book.pool.set_reward_supply_cap(cap)?;
            Ok(((), vec![EventKind::SupplyCapChanged { cap }]))
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Run `f` against an asset's book under its lock
    pub fn inspect<R, F>(&self, asset: &AssetId, f: F) -> Result<R>
    where
        F: FnOnce(&AssetBook) -> R,
    {
        let book = self.book(asset)?;
        let guard = book.lock().map_err(|_| Error::Lock)?;
        Ok(f(&guard))
    }

    /// Depositor's compounded deposit
    pub fn compounded_deposit(&self, asset: &AssetId, depositor: &Address) -> Result<TokenAmount> {
        self.inspect(asset, |book| book.pool.compounded_deposit(depositor))?
    }

    /// Collateral the depositor would receive now
    pub fn pending_collateral_gain(&self, asset: &AssetId, depositor: &Address) -> Result<TokenAmount> {
        self.inspect(asset, |book| book.pool.depositor_collateral_gain(depositor))?
    }

    /// Reward tokens the depositor would receive, excluding unissued time
    pub fn pending_reward_gain(&self, asset: &AssetId, depositor: &Address) -> Result<TokenAmount> {
        self.inspect(asset, |book| book.pool.depositor_reward_gain(depositor))?
    }

    /// Pool statistics
    pub fn pool_statistics(&self, asset: &AssetId) -> Result<StabilityPoolStats> {
        self.inspect(asset, |book| book.pool.statistics())
    }

    /// Vessel statistics at `now`
    pub fn vessel_statistics(&self, asset: &AssetId, now: u64) -> Result<VesselStatistics> {
        self.inspect(asset, |book| book.vessels.statistics(now))?
    }

    /// Vessel record of `owner`
    pub fn vessel(&self, asset: &AssetId, owner: &Address) -> Result<Option<Vessel>> {
        self.inspect(asset, |book| book.vessels.get(owner).cloned())
    }

    /// Principal plus pending interest across the asset's vessels
    pub fn entire_system_debt(&self, asset: &AssetId, now: u64) -> Result<TokenAmount> {
        self.inspect(asset, |book| book.vessels.entire_system_debt(now))?
    }

    /// Pool state hash
    pub fn pool_state_hash(&self, asset: &AssetId) -> Result<Hash> {
        self.inspect(asset, |book| book.pool.state_hash())?
    }

    /// Debt token balance
    pub fn debt_balance(&self, owner: &Address) -> Result<TokenAmount> {
        Ok(self.lock_accounts()?.debt.balance_of(owner))
    }

    /// Reward token balance
    pub fn reward_balance(&self, owner: &Address) -> Result<TokenAmount> {
        Ok(self.lock_accounts()?.reward.balance_of(owner))
    }

    /// Collateral credited to `owner` for `asset`
    pub fn collateral_balance(&self, asset: &AssetId, owner: &Address) -> Result<TokenAmount> {
        Ok(self.lock_accounts()?.collateral_balance(asset, owner))
    }

    /// Fee collector statistics
    pub fn fee_statistics(&self) -> Result<FeeStatistics> {
        Ok(self.lock_accounts()?.fees.statistics())
    }

    /// Copy of the shared balances
    pub fn accounts(&self) -> Result<Accounts> {
        Ok(self.lock_accounts()?.clone())
    }

    /// Copy of the event log
    pub fn events(&self) -> Result<EventLog> {
        Ok(self.lock_events()?.clone())
    }

    /// Check cross-component invariants: every pool's escrow holds exactly
    /// its deposits, and token supplies match their balances.
    pub fn verify_invariants(&self) -> Result<()> {
        for asset in self.assets()? {
            let book = self.book(&asset)?;
            let book = book.lock().map_err(|_| Error::Lock)?;
            let accounts = self.lock_accounts()?;

            let escrow = accounts.debt.balance_of(&escrow_address(&asset));
            if escrow != book.pool.total_deposits() {
                return Err(Error::InvariantViolation(format!(
                    "escrow {} holds {} but pool deposits are {}",
                    asset,
                    escrow,
                    book.pool.total_deposits()
                )));
            }
        }

        let accounts = self.lock_accounts()?;
        if !accounts.debt.verify_supply_invariant() || !accounts.reward.verify_supply_invariant() {
            return Err(Error::InvariantViolation("token supply does not match balances".into()));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNAL
    // ═══════════════════════════════════════════════════════════════════════════

    fn book(&self, asset: &AssetId) -> Result<Arc<Mutex<AssetBook>>> {
        self.books
            .read()
            .map_err(|_| Error::Lock)?
            .get(asset)
            .cloned()
            .ok_or_else(|| Error::UnknownAsset(asset.to_hex()))
    }

    fn lock_accounts(&self) -> Result<MutexGuard<'_, Accounts>> {
        self.accounts.lock().map_err(|_| Error::Lock)
    }

    fn lock_events(&self) -> Result<MutexGuard<'_, EventLog>> {
        self.events.lock().map_err(|_| Error::Lock)
    }

    /// Run one operation inside the asset's critical section.
    ///
    /// The clock is checked before `f` runs and advanced only on success.
    /// When `f` fails, the pool header and liquidation counters are rolled
    /// back. Operations validate balances before writing vessel or
    /// depositor records, so those stay untouched as well.
    fn execute<R, F>(&self, operation: &'static str, asset: AssetId, now: u64, f: F) -> Result<R>
    where
        F: FnOnce(&mut AssetBook, &mut Accounts) -> Result<Effects<R>>,
    {
        let book = self.book(&asset).map_err(|e| {
            warn!(operation, asset = %asset, error = %e, "operation rejected");
            e
        })?;
        let mut book = book.lock().map_err(|_| Error::Lock)?;

        let result = book.check_clock(now).and_then(|_| {
            let mut accounts = self.lock_accounts()?;
            let checkpoint = book.checkpoint();
            f(&mut book, &mut accounts).map_err(|e| {
                book.restore(checkpoint);
                e
            })
        });

        match result {
            Ok((value, events)) => {
                book.last_timestamp = now;
                let mut log = self.lock_events()?;
                for kind in events {
                    log.record(now, asset, kind);
                }
                Ok(value)
            }
            Err(e) => {
                warn!(operation, asset = %asset, now, error = %e, "operation rejected");
                Err(e)
            }
        }
    }
}

fn liquidation_event(outcome: &LiquidationOutcome) -> EventKind {
    EventKind::VesselLiquidated {
        owner: outcome.owner,
        icr: outcome.icr,
        debt_offset: outcome.debt_offset,
        collateral_to_pool: outcome.collateral_to_pool,
        unabsorbed_debt: outcome.unabsorbed_debt,
        interest: outcome.accrued_interest,
    }
}
