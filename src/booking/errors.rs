//! Booking error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::catalog::VenueId;
use crate::money::Money;
use crate::payment::ProviderError;
use crate::store::StoreError;
use crate::wallet::WalletError;

use super::models::BookingId;

/// Booking errors
#[derive(Debug, Error)]
pub enum BookingError {
    /// Malformed request (interval, duration, missing fields)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No court is free for the requested interval
    #[error("Slot unavailable at venue {venue_id} for {starts_at} .. {ends_at}")]
    SlotUnavailable {
        venue_id: VenueId,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    },

    /// The slot was taken (or the target booking withdrawn) while the
    /// payment session completed; the paid amount needs an out-of-band
    /// provider refund
    #[error("Slot taken during payment session {session_id}; {amount_paid} paid")]
    SlotTakenDuringPayment { session_id: String, amount_paid: Money },

    /// Wallet cannot cover the debit
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: Money, required: Money },

    /// Acting user is neither the booking creator nor the venue owner
    #[error("Not authorized to act on this booking")]
    Unauthorized,

    /// Booking is already cancelled
    #[error("Booking {0} is already cancelled")]
    AlreadyCancelled(BookingId),

    /// Player cancellation after the start time
    #[error("Too late to cancel: start passed {minutes_late} minutes ago")]
    TooLateToCancel { minutes_late: i64 },

    /// Missing entity
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payment provider failure or unpaid session
    #[error("Payment provider error: {0}")]
    Provider(String),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Get a client-safe error message that doesn't leak internals.
    ///
    /// Store and provider errors are sanitized; the rest of the taxonomy
    /// is already written for callers.
    pub fn client_message(&self) -> String {
        match self {
            BookingError::Store(_) => "Internal server error".to_string(),
            BookingError::Provider(_) => "Payment provider error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Transient store failures may be retried from the conflict-check
    /// step; everything else surfaces once.
    pub fn is_transient(&self) -> bool {
        matches!(self, BookingError::Store(e) if e.is_transient())
    }
}

impl From<ProviderError> for BookingError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::UnknownSession(id) => {
                BookingError::NotFound(format!("payment session {id}"))
            }
            other => BookingError::Provider(other.to_string()),
        }
    }
}

impl From<WalletError> for BookingError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::InsufficientBalance {
                available,
                required,
            } => BookingError::InsufficientFunds {
                available,
                required,
            },
            WalletError::Store(e) => BookingError::Store(e),
            other => BookingError::Validation(other.to_string()),
        }
    }
}

/// Result type for booking operations
pub type BookingResult<T> = Result<T, BookingError>;
