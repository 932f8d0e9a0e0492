//! Integration tests for the vessel ledger.
//!
//! These tests drive the stability pool and the ledger through complete
//! scenarios: compounding losses across scales and epochs, reward issuance
//! under the supply cap, interest accrual and persistence.

use std::sync::Arc;

use proptest::prelude::*;

use vessel_ledger::core::config::{LedgerConfig, PoolParams};
use vessel_ledger::core::interest::accrued_interest;
use vessel_ledger::core::token::TokenAmount;
use vessel_ledger::liquidation::stability_pool::StabilityPool;
use vessel_ledger::protocol::ledger::Ledger;
use vessel_ledger::protocol::operations::{parse_operations, replay};
use vessel_ledger::storage::{FileStore, InMemoryStore, LedgerStore};
use vessel_ledger::utils::constants::{SECONDS_IN_ONE_MONTH, SECONDS_IN_ONE_WEEK};
use vessel_ledger::utils::crypto::{Address, AssetId};
use vessel_ledger::utils::math::FixedPoint;

// ═══════════════════════════════════════════════════════════════════════════════
// TEST HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

const E18: u128 = 1_000_000_000_000_000_000;

fn weth() -> AssetId {
    Address::from_label("weth")
}

fn user(name: &str) -> Address {
    Address::from_label(name)
}

fn tokens(n: u64) -> TokenAmount {
    TokenAmount::from_tokens(n)
}

fn pool_with_rate(weekly_tokens: u64) -> StabilityPool {
    let params = PoolParams {
        weekly_reward_rate: tokens(weekly_tokens),
        ..PoolParams::default()
    };
    StabilityPool::new(weth(), &params, 0).unwrap()
}

fn assert_close(actual: TokenAmount, expected: TokenAmount, tolerance: TokenAmount) {
    let diff = if actual > expected {
        actual.saturating_sub(expected)
    } else {
        expected.saturating_sub(actual)
    };
    assert!(
        diff <= tolerance,
        "{} differs from {} by more than {}",
        actual,
        expected,
        tolerance
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// STABILITY POOL SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_six_depositors_cross_scales_and_epoch() {
    let mut pool = pool_with_rate(0);
    let expected = [
        (10_000_000_000_000u128, 0u64, 0u64),
        (100_000_000_000_000_000, 1, 0),
        (1_000_000_000_000, 1, 0),
        (10_000_000_000_000_000, 2, 0),
        (100_000_000_000, 2, 0),
        (E18, 0, 1),
    ];

    for (i, (p, scale, epoch)) in expected.iter().enumerate() {
        let now = i as u64 * SECONDS_IN_ONE_MONTH;
        let depositor = user(&format!("depositor-{}", i));
        pool.provide_to_sp(depositor, tokens(10_000), tokens(10_000), now).unwrap();

        let total = pool.total_deposits();
        // Leave 1e-5 of the pool, except the last offset which empties it
        let debt = if i == expected.len() - 1 {
            total
        } else {
            total.saturating_sub(TokenAmount::from_raw(total.raw() / 100_000))
        };
        pool.offset(debt, tokens(1), now).unwrap();

        assert_eq!(pool.p(), FixedPoint::from_raw(*p), "P after liquidation {}", i + 1);
        assert_eq!(pool.current_scale(), *scale, "scale after liquidation {}", i + 1);
        assert_eq!(pool.current_epoch(), *epoch, "epoch after liquidation {}", i + 1);
    }

    for i in 0..expected.len() {
        let depositor = user(&format!("depositor-{}", i));
        assert!(pool.compounded_deposit(&depositor).unwrap().is_zero());
    }
    assert!(pool.total_deposits().is_zero());
}

/// Rewards issued over one month at 1M per week
const MONTHLY_ISSUANCE: u128 =
    1_000_000 * E18 * SECONDS_IN_ONE_MONTH as u128 / SECONDS_IN_ONE_WEEK as u128;

/// Six depositors, each the sole fresh deposit for a month of issuance that
/// ends in a liquidation leaving 1e-5 of the pool. The last one empties it.
/// With `stop_rewards_after`, the weekly rate drops to zero after that
/// liquidation.
fn six_depositors_with_rewards(stop_rewards_after: Option<usize>) -> (StabilityPool, Vec<Address>) {
    let mut pool = pool_with_rate(1_000_000);
    let depositors: Vec<Address> = (0..6).map(|i| user(&format!("depositor-{}", i))).collect();

    for (i, depositor) in depositors.iter().enumerate() {
        let start = i as u64 * SECONDS_IN_ONE_MONTH;
        pool.provide_to_sp(*depositor, tokens(10_000), tokens(10_000), start).unwrap();

        let end = start + SECONDS_IN_ONE_MONTH;
        let total = pool.total_deposits();
        let debt = if i == depositors.len() - 1 {
            total
        } else {
            total.saturating_sub(TokenAmount::from_raw(total.raw() / 100_000))
        };
        pool.offset(debt, tokens(1), end).unwrap();

        if stop_rewards_after == Some(i) {
            pool.set_weekly_reward_rate(TokenAmount::ZERO, end).unwrap();
        }
    }

    (pool, depositors)
}

fn withdraw_gains(pool: &mut StabilityPool, depositors: &[Address]) -> Vec<(TokenAmount, TokenAmount)> {
    let now = depositors.len() as u64 * SECONDS_IN_ONE_MONTH;
    depositors
        .iter()
        .map(|depositor| {
            let outcome = pool.withdraw_from_sp(*depositor, TokenAmount::ZERO, now).unwrap();
            (outcome.reward_gain, outcome.collateral_gain)
        })
        .collect()
}

#[test]
fn test_six_depositors_earn_their_month_across_scales_and_epoch() {
    let (mut pool, depositors) = six_depositors_with_rewards(None);
    assert_eq!(pool.current_epoch(), 1);
    assert_close(
        pool.issuance().total_issued(),
        TokenAmount::from_raw(6 * MONTHLY_ISSUANCE),
        tokens(1),
    );

    let gains = withdraw_gains(&mut pool, &depositors);

    // Each month's depositor holds all but 1e-5 of the pool, and the previous
    // one keeps 1e-5 of it for one more month. The first depositor has no
    // predecessor and the last one no successor.
    let carry = MONTHLY_ISSUANCE / 100_000;
    for (i, (reward, collateral)) in gains.iter().enumerate() {
        let expected = match i {
            0 => MONTHLY_ISSUANCE + carry,
            5 => MONTHLY_ISSUANCE - carry,
            _ => MONTHLY_ISSUANCE,
        };
        assert_close(*reward, TokenAmount::from_raw(expected), tokens(1));
        assert_close(*collateral, tokens(1), TokenAmount::from_raw(E18 / 1_000));
    }

    let paid = gains
        .iter()
        .fold(TokenAmount::ZERO, |sum, (reward, _)| sum.saturating_add(*reward));
    assert!(paid <= pool.issuance().total_issued());
}

#[test]
fn test_rewards_stop_after_rescale() {
    // The second liquidation moves the pool to scale 1, then issuance stops
    let (mut pool, depositors) = six_depositors_with_rewards(Some(1));
    assert_close(
        pool.issuance().total_issued(),
        TokenAmount::from_raw(2 * MONTHLY_ISSUANCE),
        tokens(1),
    );

    let gains = withdraw_gains(&mut pool, &depositors);
    let carry = MONTHLY_ISSUANCE / 100_000;

    assert_close(gains[0].0, TokenAmount::from_raw(MONTHLY_ISSUANCE + carry), tokens(1));
    assert_close(gains[1].0, TokenAmount::from_raw(MONTHLY_ISSUANCE - carry), tokens(1));
    for (reward, collateral) in &gains[2..] {
        assert!(reward.is_zero());
        assert_close(*collateral, tokens(1), TokenAmount::from_raw(E18 / 1_000));
    }
}

#[test]
fn test_epoch_reset_keeps_old_gains() {
    let mut pool = pool_with_rate(0);
    let alice = user("alice");
    let bob = user("bob");

    pool.provide_to_sp(alice, tokens(10_000), tokens(10_000), 0).unwrap();
    let outcome = pool.offset(tokens(10_000), tokens(100), 60).unwrap();
    assert!(outcome.emptied);
    assert_eq!(pool.current_epoch(), 1);

    pool.provide_to_sp(bob, tokens(10_000), tokens(10_000), 120).unwrap();

    assert!(pool.compounded_deposit(&alice).unwrap().is_zero());
    assert_eq!(pool.depositor_collateral_gain(&alice).unwrap(), tokens(100));
    assert_eq!(pool.compounded_deposit(&bob).unwrap(), tokens(10_000));
    assert!(pool.depositor_collateral_gain(&bob).unwrap().is_zero());
}

#[test]
fn test_pro_rata_loss_and_collateral() {
    let mut pool = pool_with_rate(0);
    let alice = user("alice");
    let bob = user("bob");

    pool.provide_to_sp(alice, tokens(10_000), tokens(10_000), 0).unwrap();
    pool.provide_to_sp(bob, tokens(30_000), tokens(30_000), 0).unwrap();
    pool.offset(tokens(20_000), tokens(40), 60).unwrap();

    assert_eq!(pool.compounded_deposit(&alice).unwrap(), tokens(5_000));
    assert_eq!(pool.compounded_deposit(&bob).unwrap(), tokens(15_000));
    assert_eq!(pool.depositor_collateral_gain(&alice).unwrap(), tokens(10));
    assert_eq!(pool.depositor_collateral_gain(&bob).unwrap(), tokens(30));
}

// ═══════════════════════════════════════════════════════════════════════════════
// REWARD ISSUANCE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_reward_supply_cap_is_never_exceeded() {
    // Four weeks of emission equal the 32M cap
    let mut pool = pool_with_rate(8_000_000);
    pool.provide_to_sp(user("alice"), tokens(1_000), tokens(1_000), 0).unwrap();

    pool.trigger_issuance(4 * SECONDS_IN_ONE_WEEK).unwrap();
    assert_eq!(pool.issuance().total_issued(), tokens(32_000_000));

    let more = pool.trigger_issuance(8 * SECONDS_IN_ONE_WEEK).unwrap();
    assert!(more.is_zero());
    assert_eq!(pool.issuance().total_issued(), tokens(32_000_000));
    assert!(pool.issuance().remaining().is_zero());

    // The sole depositor gets everything, less rounding
    assert_close(
        pool.depositor_reward_gain(&user("alice")).unwrap(),
        tokens(32_000_000),
        tokens(1),
    );
}

#[test]
fn test_rewards_split_pro_rata() {
    let mut pool = pool_with_rate(1_000_000);
    let alice = user("alice");
    let bob = user("bob");

    pool.provide_to_sp(alice, tokens(10_000), tokens(10_000), 0).unwrap();
    pool.provide_to_sp(bob, tokens(30_000), tokens(30_000), 0).unwrap();
    pool.trigger_issuance(SECONDS_IN_ONE_WEEK).unwrap();

    assert_eq!(pool.depositor_reward_gain(&alice).unwrap(), tokens(250_000));
    assert_eq!(pool.depositor_reward_gain(&bob).unwrap(), tokens(750_000));
}

#[test]
fn test_empty_pool_rewards_are_not_paid_later() {
    let mut pool = pool_with_rate(1_000_000);
    let alice = user("alice");

    // Nobody deposits for a month
    pool.provide_to_sp(alice, tokens(10_000), tokens(10_000), SECONDS_IN_ONE_MONTH).unwrap();
    let issued_while_empty = pool.issuance().total_issued();
    assert!(!issued_while_empty.is_zero());

    pool.trigger_issuance(SECONDS_IN_ONE_MONTH + SECONDS_IN_ONE_WEEK).unwrap();
    assert_eq!(pool.depositor_reward_gain(&alice).unwrap(), tokens(1_000_000));
}

#[test]
fn test_near_simultaneous_deposits_share_equally() {
    let mut pool = pool_with_rate(1_000_000);
    let alice = user("alice");
    let bob = user("bob");

    pool.provide_to_sp(alice, tokens(10_000), tokens(10_000), 0).unwrap();
    pool.provide_to_sp(bob, tokens(10_000), tokens(10_000), 30).unwrap();
    pool.trigger_issuance(SECONDS_IN_ONE_MONTH).unwrap();

    let half = TokenAmount::from_raw(pool.issuance().total_issued().raw() / 2);
    let tolerance = tokens(20);
    let alice_gain = pool.depositor_reward_gain(&alice).unwrap();
    let bob_gain = pool.depositor_reward_gain(&bob).unwrap();
    assert_close(alice_gain, half, tolerance);
    assert_close(bob_gain, half, tolerance);
    assert_close(alice_gain, bob_gain, tolerance);
}

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER LIFECYCLE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_interest_accrues_into_system_debt() {
    let ledger = Ledger::new(LedgerConfig::default()).unwrap();
    ledger.register_asset(weth(), 0).unwrap();

    ledger.open_vessel(weth(), user("alice"), tokens(20), tokens(15_000), Some(1), 0).unwrap();
    let before = ledger.entire_system_debt(&weth(), 0).unwrap();
    let after = ledger.entire_system_debt(&weth(), 1_000).unwrap();

    let accrued = accrued_interest(tokens(15_000), 1, 1_000).unwrap();
    assert_eq!(accrued.raw(), 15_000 * E18 * 1_000 / 1_000_000_000_000_000_000_000_000_000);
    assert_eq!(after, before.saturating_add(accrued));
}

#[test]
fn test_collected_interest_reaches_fee_collector() {
    let config = LedgerConfig::default();
    let collector = config.fee_collector;
    let ledger = Ledger::new(config).unwrap();
    ledger.register_asset(weth(), 0).unwrap();

    ledger
        .open_vessel(weth(), user("alice"), tokens(20), tokens(15_000), Some(E18 as u64), 0)
        .unwrap();
    let collected = ledger.collect_interests(weth(), 1_000).unwrap();

    assert_eq!(collected, TokenAmount::from_raw(15_000_000_000_000_000));
    assert_eq!(ledger.debt_balance(&collector).unwrap(), collected);
    assert_eq!(ledger.fee_statistics().unwrap().total_collected, collected);
    ledger.verify_invariants().unwrap();
}

#[test]
fn test_liquidation_lifecycle() {
    let ledger = Ledger::new(LedgerConfig::default()).unwrap();
    ledger.register_asset(weth(), 0).unwrap();
    let bob = user("bob");
    let carol = user("carol");

    ledger.open_vessel(weth(), bob, tokens(40), tokens(20_000), None, 0).unwrap();
    ledger.provide_to_sp(weth(), bob, tokens(20_000), 0).unwrap();
    ledger.open_vessel(weth(), carol, tokens(10), tokens(10_000), None, 0).unwrap();

    let price = FixedPoint::from_integer(1_000);
    let outcome = ledger.liquidate(weth(), carol, price, 60).unwrap();
    assert!(outcome.fully_absorbed());
    assert_eq!(outcome.debt_offset, tokens(10_000));
    assert_eq!(outcome.collateral_to_pool, tokens(10));

    assert_eq!(ledger.compounded_deposit(&weth(), &bob).unwrap(), tokens(10_000));
    assert_eq!(ledger.pending_collateral_gain(&weth(), &bob).unwrap(), tokens(10));

    ledger.withdraw_from_sp(weth(), bob, tokens(10_000), 120).unwrap();
    assert_eq!(ledger.collateral_balance(&weth(), &bob).unwrap(), tokens(10));
    assert_eq!(ledger.debt_balance(&bob).unwrap(), tokens(10_000));
    assert_eq!(ledger.pool_statistics(&weth()).unwrap().total_deposits, TokenAmount::ZERO);

    // Carol keeps the debt tokens she minted, her vessel is gone
    assert_eq!(ledger.debt_balance(&carol).unwrap(), tokens(10_000));
    ledger.verify_invariants().unwrap();
}

#[test]
fn test_assets_are_independent_across_threads() {
    let ledger = Arc::new(Ledger::new(LedgerConfig::default()).unwrap());
    let assets: Vec<AssetId> = (0..4).map(|i| Address::from_label(&format!("asset-{}", i))).collect();
    for asset in &assets {
        ledger.register_asset(*asset, 0).unwrap();
    }

    std::thread::scope(|scope| {
        for (i, asset) in assets.iter().enumerate() {
            let ledger = Arc::clone(&ledger);
            let asset = *asset;
            scope.spawn(move || {
                for t in 1..=50u64 {
                    let owner = user(&format!("user-{}-{}", i, t));
                    ledger.open_vessel(asset, owner, tokens(10), tokens(100), None, t).unwrap();
                    ledger.provide_to_sp(asset, owner, tokens(50), t).unwrap();
                }
            });
        }
    });

    for asset in &assets {
        let stats = ledger.pool_statistics(asset).unwrap();
        assert_eq!(stats.total_deposits, tokens(2_500));
        assert_eq!(stats.depositor_count, 50);
    }
    assert_eq!(ledger.events().unwrap().len(), 4 + 4 * 100);
    ledger.verify_invariants().unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPLAY AND PERSISTENCE
// ═══════════════════════════════════════════════════════════════════════════════

const SCENARIO: &str = r#"[
    {"op": "register_asset", "asset": "weth", "timestamp": 0},
    {"op": "set_weekly_reward_rate", "asset": "weth", "rate": "1000", "timestamp": 0},
    {"op": "open_vessel", "asset": "weth", "owner": "bob", "collateral": "40", "debt": "20000", "timestamp": 0},
    {"op": "provide_to_sp", "asset": "weth", "depositor": "bob", "amount": "20000", "timestamp": 60},
    {"op": "open_vessel", "asset": "weth", "owner": "carol", "collateral": "10", "debt": "10000", "timestamp": 120},
    {"op": "liquidate", "asset": "weth", "owner": "carol", "price": "1000", "timestamp": 3600},
    {"op": "trigger_issuance", "asset": "weth", "timestamp": 7200}
]"#;

#[test]
fn test_replay_then_persist_and_reload() {
    let ledger = Ledger::new(LedgerConfig::default()).unwrap();
    let results = replay(&ledger, &parse_operations(SCENARIO).unwrap()).unwrap();
    assert_eq!(results.len(), 7);

    let dir = tempfile::tempdir().unwrap();
    LedgerStore::new(FileStore::open(dir.path()).unwrap()).save(&ledger).unwrap();

    let reloaded = LedgerStore::new(FileStore::open(dir.path()).unwrap())
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(
        reloaded.pool_state_hash(&weth()).unwrap(),
        ledger.pool_state_hash(&weth()).unwrap()
    );
    assert_eq!(
        reloaded.pending_reward_gain(&weth(), &user("bob")).unwrap(),
        ledger.pending_reward_gain(&weth(), &user("bob")).unwrap()
    );

    // The reloaded ledger keeps its clock
    assert!(reloaded.trigger_issuance(weth(), 3_600).is_err());
    reloaded.withdraw_from_sp(weth(), user("bob"), tokens(10_000), 7_200).unwrap();
    reloaded.verify_invariants().unwrap();
}

#[test]
fn test_identical_replays_match() {
    let ops = parse_operations(SCENARIO).unwrap();
    let first = Ledger::new(LedgerConfig::default()).unwrap();
    let second = Ledger::new(LedgerConfig::default()).unwrap();
    replay(&first, &ops).unwrap();
    replay(&second, &ops).unwrap();

    assert_eq!(first.events().unwrap().digest(), second.events().unwrap().digest());

    let a = LedgerStore::new(InMemoryStore::new());
    let b = LedgerStore::new(InMemoryStore::new());
    a.save(&first).unwrap();
    b.save(&second).unwrap();
    assert_eq!(a.state_root().unwrap(), b.state_root().unwrap());
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROPERTIES
// ═══════════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn prop_interest_is_linear_up_to_rounding(
        principal in 0u128..1_000_000_000_000_000_000_000_000_000_000,
        rate in 0u64..1_000_000_000_000_000_000,
        t1 in 0u64..1_000_000_000,
        t2 in 0u64..1_000_000_000,
    ) {
        let principal = TokenAmount::from_raw(principal);
        let split = accrued_interest(principal, rate, t1).unwrap().raw()
            + accrued_interest(principal, rate, t2).unwrap().raw();
        let whole = accrued_interest(principal, rate, t1 + t2).unwrap().raw();
        prop_assert!(whole >= split);
        prop_assert!(whole <= split + 1);
    }

    #[test]
    fn prop_offsets_preserve_deposit_ratio(
        base in 1u64..1_000_000,
        k in 1u64..10,
        pct in 1u128..99,
    ) {
        let mut pool = pool_with_rate(0);
        let alice = user("alice");
        let bob = user("bob");
        pool.provide_to_sp(alice, tokens(base), tokens(base), 0).unwrap();
        pool.provide_to_sp(bob, tokens(base * k), tokens(base * k), 0).unwrap();

        let debt = TokenAmount::from_raw(pool.total_deposits().raw() * pct / 100);
        pool.offset(debt, tokens(1), 60).unwrap();

        let a = pool.compounded_deposit(&alice).unwrap().raw();
        let b = pool.compounded_deposit(&bob).unwrap().raw();
        let k = k as u128;
        prop_assert!(b + k >= k * a);
        prop_assert!(b <= k * a + k);
    }
}
