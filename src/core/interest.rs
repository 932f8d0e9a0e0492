//! Lazy linear interest accrual on vessel debt.
//!
//! There is no scheduler. Interest is computed from the elapsed time since a
//! vessel's last settlement whenever something touches the vessel:
//!
//! ```text
//! accrued = floor(principal * rate_bps * elapsed / 1e27)
//! ```
//!
//! Settlement folds `accrued` into principal and moves the timestamp forward.
//! Routing the accrued amount to the fee collector is the caller's job.

use tracing::debug;

use crate::core::token::TokenAmount;
use crate::core::vessel::Vessel;
use crate::error::{Error, Result};
use crate::utils::constants::INTEREST_PRECISION;
use crate::utils::math::{mul_div_wide, to_u128, U256};

/// Interest accrued on `principal` over `elapsed` seconds
pub fn accrued_interest(principal: TokenAmount, rate_bps: u64, elapsed: u64) -> Result<TokenAmount> {
    if rate_bps == 0 || elapsed == 0 || principal.is_zero() {
        return Ok(TokenAmount::ZERO);
    }

    let factor = U256::from(rate_bps) * U256::from(elapsed);
    let accrued = mul_div_wide(U256::from(principal.raw()), factor, U256::from(INTEREST_PRECISION))?;
    to_u128(accrued, "accrued_interest").map(TokenAmount::from_raw)
}

/// Interest `vessel` would accrue if settled at `now`, without mutating it
pub fn pending_interest(vessel: &Vessel, now: u64) -> Result<TokenAmount> {
    let elapsed = elapsed_since(vessel.last_interest_update, now)?;
    accrued_interest(vessel.principal_debt, vessel.interest_rate_bps, elapsed)
}

/// Settle interest into principal and return the accrued amount.
///
/// Calling twice with the same `now` accrues nothing the second time. A zero
/// rate still advances the timestamp.
pub fn settle_interest(vessel: &mut Vessel, now: u64) -> Result<TokenAmount> {
    let accrued = pending_interest(vessel, now)?;

    if !accrued.is_zero() {
        vessel.principal_debt = vessel
            .principal_debt
            .checked_add(accrued)
            .ok_or(Error::Overflow {
                operation: "settle_interest principal".into(),
            })?;
        debug!(
            owner = %vessel.owner,
            accrued = %accrued,
            principal = %vessel.principal_debt,
            "interest settled"
        );
    }
    vessel.last_interest_update = now;

    Ok(accrued)
}

fn elapsed_since(last: u64, now: u64) -> Result<u64> {
    now.checked_sub(last)
        .ok_or(Error::InvalidTimestampOrder { last, now })
}
