//! Unified error type for the budget engine.
//!
//! Every fallible operation in the crate returns [`Result`], so callers only ever
//! have to match on a single [`Error`] enum.

use rust_decimal::Decimal;
use thiserror::Error;

/// All errors produced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of the problem
        message: String,
    },

    /// A monetary amount failed validation
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// Input failed validation for a reason other than the amount
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable description of the problem
        message: String,
    },

    /// No budget exists with the given id
    #[error("Budget not found: {id}")]
    BudgetNotFound {
        /// Requested budget id
        id: i64,
    },

    /// No income source exists with the given id
    #[error("Income not found: {id}")]
    IncomeNotFound {
        /// Requested income id
        id: i64,
    },

    /// No transaction exists with the given id
    #[error("Transaction not found: {id}")]
    TransactionNotFound {
        /// Requested transaction id
        id: i64,
    },

    /// No recurring template exists with the given id
    #[error("Recurring template not found: {id}")]
    TemplateNotFound {
        /// Requested template id
        id: i64,
    },

    /// Calendar arithmetic left the range chrono can represent
    #[error("Date out of range: {message}")]
    DateOutOfRange {
        /// Which computation overflowed
        message: String,
    },

    /// The background refresh worker has shut down
    #[error("Aggregate refresh worker is not running")]
    RefreshWorkerStopped,

    /// Database error from `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// JSON (de)serialization error for cached history
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Integer conversion error
    #[error("Integer conversion error: {0}")]
    TryFromInt(#[from] std::num::TryFromIntError),
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
