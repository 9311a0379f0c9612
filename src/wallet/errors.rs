//! Wallet error types.

use thiserror::Error;

use crate::catalog::UserId;
use crate::money::Money;
use crate::store::StoreError;

/// Wallet errors
#[derive(Debug, Error)]
pub enum WalletError {
    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Insufficient balance
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: Money, required: Money },

    /// Balance arithmetic overflow
    #[error("Balance overflow for user {0}")]
    BalanceOverflow(UserId),

    /// Invalid amount for the operation
    #[error("Invalid amount: {0}")]
    InvalidAmount(Money),
}

impl WalletError {
    /// Get a client-safe error message that doesn't leak sensitive
    /// information. Store errors are sanitized; the rest are written
    /// for callers.
    pub fn client_message(&self) -> String {
        match self {
            WalletError::Store(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;
