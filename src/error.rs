//! Error types for the vessel ledger.
//!
//! This module defines all error types used throughout the ledger,
//! providing clear and actionable error messages.

use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the vessel ledger
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Vessel Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Vessel not found for the given owner
    #[error("Vessel not found: {0}")]
    VesselNotFound(String),

    /// Vessel already exists for the given owner
    #[error("Vessel already exists: {0}")]
    VesselAlreadyExists(String),

    /// Vessel is closed or liquidated
    #[error("Vessel is not active: {0}")]
    VesselNotActive(String),

    /// Insufficient collateral for the requested operation
    #[error("Insufficient collateral: required {required}, available {available}")]
    InsufficientCollateral {
        /// Required collateral amount
        required: u128,
        /// Available collateral amount
        available: u128,
    },

    /// Repayment larger than outstanding debt
    #[error("Repayment {amount} exceeds outstanding debt {debt}")]
    RepaymentExceedsDebt {
        /// Requested repayment
        amount: u128,
        /// Outstanding debt after interest settlement
        debt: u128,
    },

    /// Vessel is above the minimum collateral ratio
    #[error("Vessel {0} is healthy and cannot be liquidated")]
    VesselHealthy(String),

    // ═══════════════════════════════════════════════════════════════════
    // Stability Pool Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Depositor cannot fund the requested deposit
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Requested amount
        required: u128,
        /// Spendable balance
        available: u128,
    },

    /// Withdrawal larger than the compounded deposit
    #[error("Insufficient deposit: requested {requested}, available {available}")]
    InsufficientDeposit {
        /// Requested withdrawal
        requested: u128,
        /// Compounded deposit
        available: u128,
    },

    /// Account has no deposit in the pool
    #[error("No stability pool deposit for {0}")]
    DepositNotFound(String),

    /// Offset larger than the pool can absorb
    #[error("Insufficient stability pool balance: required {required}, available {available}")]
    InsufficientStabilityPool {
        /// Debt to cancel
        required: u128,
        /// Total deposits
        available: u128,
    },

    /// Collateral asset has no registered pool
    #[error("Unknown collateral asset: {0}")]
    UnknownAsset(String),

    /// Collateral asset registered twice
    #[error("Collateral asset already registered: {0}")]
    AssetAlreadyRegistered(String),

    // ═══════════════════════════════════════════════════════════════════
    // Issuance Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Reward supply cap below what has already been issued
    #[error("Reward supply cap {cap} below issued amount {issued}")]
    SupplyCapBelowIssued {
        /// Requested cap
        cap: u128,
        /// Already issued
        issued: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Time Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Clock went backwards
    #[error("Invalid timestamp order: {now} is before last update {last}")]
    InvalidTimestampOrder {
        /// Last recorded timestamp
        last: u64,
        /// Timestamp supplied by the caller
        now: u64,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Amount is zero
    #[error("Amount cannot be zero")]
    ZeroAmount,

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Underflow in calculation
    #[error("Arithmetic underflow in {operation}")]
    Underflow {
        /// Operation that underflowed
        operation: String,
    },

    /// Invariant violation detected
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // ═══════════════════════════════════════════════════════════════════
    // Serialization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ═══════════════════════════════════════════════════════════════════
    // Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Lock acquisition failed
    #[error("Failed to acquire lock")]
    Lock,

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientBalance { .. }
                | Error::InsufficientDeposit { .. }
                | Error::InsufficientCollateral { .. }
                | Error::RepaymentExceedsDebt { .. }
                | Error::InsufficientStabilityPool { .. }
                | Error::VesselHealthy(_)
                | Error::ZeroAmount
        )
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Error::InvalidTimestampOrder { .. }
                | Error::InvariantViolation(_)
                | Error::Internal(_)
                | Error::Overflow { .. }
                | Error::Underflow { .. }
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Vessel errors: 1xxx
            Error::VesselNotFound(_) => 1001,
            Error::VesselAlreadyExists(_) => 1002,
            Error::VesselNotActive(_) => 1003,
            Error::InsufficientCollateral { .. } => 1004,
            Error::RepaymentExceedsDebt { .. } => 1005,
            Error::VesselHealthy(_) => 1006,

            // Stability pool errors: 2xxx
            Error::InsufficientBalance { .. } => 2001,
            Error::InsufficientDeposit { .. } => 2002,
            Error::DepositNotFound(_) => 2003,
            Error::InsufficientStabilityPool { .. } => 2004,
            Error::UnknownAsset(_) => 2005,
            Error::AssetAlreadyRegistered(_) => 2006,

            // Issuance errors: 3xxx
            Error::SupplyCapBelowIssued { .. } => 3001,

            // Time errors: 4xxx
            Error::InvalidTimestampOrder { .. } => 4001,

            // Validation errors: 5xxx
            Error::InvalidParameter { .. } => 5001,
            Error::ZeroAmount => 5002,
            Error::Overflow { .. } => 5003,
            Error::Underflow { .. } => 5004,
            Error::InvariantViolation(_) => 5005,

            // Serialization errors: 7xxx
            Error::Serialization(_) => 7001,
            Error::Deserialization(_) => 7002,

            // Internal errors: 9xxx
            Error::Internal(_) => 9001,
            Error::Lock => 9002,
            Error::Storage(_) => 9003,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_unique() {
        let codes = vec![
            Error::VesselNotFound("".into()).code(),
            Error::VesselHealthy("".into()).code(),
            Error::InsufficientBalance { required: 0, available: 0 }.code(),
            Error::InsufficientDeposit { requested: 0, available: 0 }.code(),
            Error::SupplyCapBelowIssued { cap: 0, issued: 0 }.code(),
            Error::InvalidTimestampOrder { last: 0, now: 0 }.code(),
            Error::ZeroAmount.code(),
            Error::Internal("".into()).code(),
        ];

        let mut unique_codes = codes.clone();
        unique_codes.sort();
        unique_codes.dedup();

        assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");
    }

    #[test]
    fn test_error_display() {
        let err = Error::InsufficientDeposit {
            requested: 1000,
            available: 500,
        };
        assert!(err.to_string().contains("1000"));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::InsufficientBalance { required: 1, available: 0 }.is_recoverable());
        assert!(Error::InsufficientDeposit { requested: 1, available: 0 }.is_recoverable());
        assert!(!Error::InvalidTimestampOrder { last: 2, now: 1 }.is_recoverable());
    }

    #[test]
    fn test_is_critical() {
        assert!(Error::InvalidTimestampOrder { last: 2, now: 1 }.is_critical());
        assert!(Error::Overflow { operation: "test".into() }.is_critical());
        assert!(!Error::VesselNotFound("test".into()).is_critical());
    }
}
