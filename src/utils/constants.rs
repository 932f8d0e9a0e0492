//! Ledger constants and magic numbers.
//!
//! All ledger-wide constants are defined here for easy auditing and modification.

// ═══════════════════════════════════════════════════════════════════════════════
// PRECISION CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed-point precision for token amounts, P and per-unit accumulators (1e18)
pub const DECIMAL_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Token decimals for the debt token, the reward token and collateral
pub const TOKEN_DECIMALS: u32 = 18;

/// Factor applied to P when a scale change occurs (1e9)
pub const SCALE_FACTOR: u128 = 1_000_000_000;

/// Divisor applied to `principal * rate_bps * elapsed` when accruing interest (1e27)
pub const INTEREST_PRECISION: u128 = 1_000_000_000_000_000_000_000_000_000;

// ═══════════════════════════════════════════════════════════════════════════════
// TIME CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Seconds in one minute
pub const SECONDS_IN_ONE_MINUTE: u64 = 60;

/// Seconds in one week, the denominator of the weekly reward rate
pub const SECONDS_IN_ONE_WEEK: u64 = 604_800;

/// Seconds in a 30 day month
pub const SECONDS_IN_ONE_MONTH: u64 = 2_592_000;

// ═══════════════════════════════════════════════════════════════════════════════
// ISSUANCE CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default reward token supply cap per pool: 32,000,000 tokens
pub const DEFAULT_REWARD_SUPPLY_CAP: u128 = 32_000_000 * DECIMAL_PRECISION;

/// Default issuance granularity. Elapsed time is consumed in whole periods.
pub const DEFAULT_ISSUANCE_PERIOD_SECS: u64 = SECONDS_IN_ONE_MINUTE;

// ═══════════════════════════════════════════════════════════════════════════════
// COLLATERALIZATION CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Minimum Collateralization Ratio (MCR) - 110%, as a 1e18 fixed-point value.
/// Below this ratio, a vessel can be liquidated.
pub const DEFAULT_MCR: u128 = 1_100_000_000_000_000_000;

/// Default vessel interest rate in basis points
pub const DEFAULT_INTEREST_RATE_BPS: u64 = 0;

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIER CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Length of an account address in bytes
pub const ADDRESS_LENGTH: usize = 20;

/// Length of a SHA-256 hash
pub const HASH_LENGTH: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_relationships() {
        assert_eq!(SCALE_FACTOR * SCALE_FACTOR, DECIMAL_PRECISION);
        assert_eq!(INTEREST_PRECISION, DECIMAL_PRECISION * SCALE_FACTOR);
        assert_eq!(10u128.pow(TOKEN_DECIMALS), DECIMAL_PRECISION);
    }

    #[test]
    fn test_time_constants() {
        assert_eq!(SECONDS_IN_ONE_WEEK, 7 * 24 * 60 * SECONDS_IN_ONE_MINUTE);
        assert_eq!(SECONDS_IN_ONE_WEEK % DEFAULT_ISSUANCE_PERIOD_SECS, 0);
    }

    #[test]
    fn test_mcr_above_one() {
        assert!(DEFAULT_MCR > DECIMAL_PRECISION);
    }
}
