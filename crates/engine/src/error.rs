//! The module contains the error the engine can throw.
//!
//! Every variant carries a human readable message and maps to a stable,
//! machine readable [`ErrorKind`] through [`EngineError::kind`]:
//!
//! - [`InsufficientFunds`] a hold or adjustment exceeds the spendable balance.
//! - [`InsufficientBalance`] a points redemption exceeds the points balance.
//! - [`InsufficientStock`] a requested, approved or shipped quantity exceeds
//!   the available stock.
//! - [`InvalidHoldState`] a release or capture exceeds the held balance.
//! - [`InvalidStateTransition`] a state machine precondition is violated.
//! - [`NotFound`] a referenced wallet, order, settlement or product is absent.
//! - [`Validation`] malformed input (empty reason, non-positive amount, ...).
//! - [`Conflict`] a concurrent writer changed the record first.
//!
//!  [`InsufficientFunds`]: EngineError::InsufficientFunds
//!  [`InsufficientBalance`]: EngineError::InsufficientBalance
//!  [`InsufficientStock`]: EngineError::InsufficientStock
//!  [`InvalidHoldState`]: EngineError::InvalidHoldState
//!  [`InvalidStateTransition`]: EngineError::InvalidStateTransition
//!  [`NotFound`]: EngineError::NotFound
//!  [`Validation`]: EngineError::Validation
//!  [`Conflict`]: EngineError::Conflict
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Insufficient points balance: {0}")]
    InsufficientBalance(String),
    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),
    #[error("Invalid hold state: {0}")]
    InvalidHoldState(String),
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

/// Machine readable error code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InsufficientFunds,
    InsufficientBalance,
    InsufficientStock,
    InvalidHoldState,
    InvalidStateTransition,
    NotFound,
    ValidationError,
    Conflict,
    Database,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsufficientFunds => "insufficient_funds",
            Self::InsufficientBalance => "insufficient_balance",
            Self::InsufficientStock => "insufficient_stock",
            Self::InvalidHoldState => "invalid_hold_state",
            Self::InvalidStateTransition => "invalid_state_transition",
            Self::NotFound => "not_found",
            Self::ValidationError => "validation_error",
            Self::Conflict => "conflict",
            Self::Database => "database",
        }
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientFunds(_) => ErrorKind::InsufficientFunds,
            Self::InsufficientBalance(_) => ErrorKind::InsufficientBalance,
            Self::InsufficientStock(_) => ErrorKind::InsufficientStock,
            Self::InvalidHoldState(_) => ErrorKind::InvalidHoldState,
            Self::InvalidStateTransition(_) => ErrorKind::InvalidStateTransition,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Database(_) => ErrorKind::Database,
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::InsufficientBalance(a), Self::InsufficientBalance(b)) => a == b,
            (Self::InsufficientStock(a), Self::InsufficientStock(b)) => a == b,
            (Self::InvalidHoldState(a), Self::InvalidHoldState(b)) => a == b,
            (Self::InvalidStateTransition(a), Self::InvalidStateTransition(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_are_snake_case() {
        let err = EngineError::InsufficientFunds("need 10, have 5".to_string());
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(err.kind().as_str(), "insufficient_funds");
        assert_eq!(err.to_string(), "Insufficient funds: need 10, have 5");

        let err = EngineError::Validation("reason must not be empty".to_string());
        assert_eq!(err.kind().as_str(), "validation_error");
    }
}
