//! Storage contracts.
//!
//! Components never touch a global pool: they hold an injected
//! [`Store`] handle and open a [`StoreTx`] for every admitting or
//! settling write. Everything that reads availability and then writes
//! an admitting record does both through the same `StoreTx`, after
//! taking the per-venue-per-day admission lock.
//!
//! Two backends ship with the crate: [`PgStore`] over Postgres and
//! [`MemoryStore`], which serializes whole transactions behind one
//! mutex and backs the test suites and embedded use.

pub mod memory;
pub mod postgres;
pub mod schema;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::booking::models::{
    Booking, BookingId, BookingParticipant, BookingStatus, ParticipantId, ParticipantStatus,
    Party, Payment, PaymentStatus,
};
use crate::booking::{Resource, TimeRange};
use crate::catalog::{
    CancellationPolicy, Court, CourtId, PricingRule, SportId, UserId, Venue, VenueId,
};
use crate::money::Money;
use crate::wallet::models::{EntryCategory, EntryDirection, WalletTransaction};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Constraint conflict (unique/check violation)
    #[error("Constraint conflict: {0}")]
    Conflict(String),

    /// Status write rejected by the transition machine
    #[error("Invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Row referenced by a mutation does not exist
    #[error("Row not found: {0}")]
    RowNotFound(String),

    /// Stored data failed to decode
    #[error("Unexpected row data: {0}")]
    BadRow(String),

    /// Metadata (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Deadlocks, serialization failures and lock/pool timeouts may be
    /// retried by re-running the operation from its conflict check.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(db)) => matches!(
                db.code().as_deref(),
                Some("40001") | Some("40P01") | Some("55P03")
            ),
            StoreError::Database(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Insert payload for a booking row.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub venue_id: VenueId,
    pub court_id: Option<CourtId>,
    pub sport_id: Option<SportId>,
    pub created_by: UserId,
    pub range: TimeRange,
    pub total_amount: Money,
    pub points_used: Money,
    pub paid_amount: Money,
    pub status: BookingStatus,
    /// Policy snapshot taken at creation.
    pub policy: CancellationPolicy,
}

/// Insert payload for a participant row.
#[derive(Debug, Clone)]
pub struct NewParticipant {
    pub booking_id: BookingId,
    pub party: Party,
    pub share_amount: Money,
    pub is_initiator: bool,
    pub status: ParticipantStatus,
}

/// Insert payload for a payment row.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub booking_id: BookingId,
    pub amount: Money,
    pub points_used: Money,
    pub status: PaymentStatus,
    pub provider_ref: String,
}

/// Insert payload for a ledger entry.
#[derive(Debug, Clone)]
pub struct NewWalletEntry {
    pub user_id: UserId,
    pub booking_id: Option<BookingId>,
    /// Signed amount; the direction row mirrors its sign.
    pub amount: Money,
    pub balance_after: Money,
    pub direction: EntryDirection,
    pub category: EntryCategory,
    pub description: Option<String>,
}

/// Shared read handle plus transaction factory.
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a mutating transaction.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;

    async fn venue(&self, id: VenueId) -> StoreResult<Option<Venue>>;

    /// Courts of a venue with their supported sports, ordered by id.
    async fn courts(&self, venue_id: VenueId) -> StoreResult<Vec<Court>>;

    async fn pricing_rules(&self, venue_id: VenueId) -> StoreResult<Vec<PricingRule>>;

    async fn cancellation_policy(&self, venue_id: VenueId)
    -> StoreResult<Option<CancellationPolicy>>;

    /// Interval-blocking bookings of a venue overlapping `range`.
    async fn bookings_in_range(
        &self,
        venue_id: VenueId,
        range: TimeRange,
    ) -> StoreResult<Vec<Booking>>;

    async fn booking(&self, id: BookingId) -> StoreResult<Option<Booking>>;

    async fn participants(&self, booking_id: BookingId) -> StoreResult<Vec<BookingParticipant>>;

    async fn payments(&self, booking_id: BookingId) -> StoreResult<Vec<Payment>>;

    async fn payment_by_provider_ref(&self, provider_ref: &str) -> StoreResult<Option<Payment>>;

    /// Current balance; 0 when no wallet row exists.
    async fn wallet_balance(&self, user_id: UserId) -> StoreResult<Money>;

    /// Ledger entries newest first.
    async fn wallet_entries(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> StoreResult<Vec<WalletTransaction>>;

    /// Flips confirmed bookings whose interval fully passed to
    /// completed; returns how many were updated.
    async fn complete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

/// One mutating transaction. Dropping without commit rolls back.
#[async_trait]
pub trait StoreTx: Send {
    /// Serializes admissions for one venue and day. Taken before any
    /// conflict check that precedes an admitting write.
    async fn lock_resource(&mut self, venue_id: VenueId, date: NaiveDate) -> StoreResult<()>;

    /// Interval-blocking bookings clashing with `resource` over `range`,
    /// honoring `exclude` (a booking never conflicts with itself during
    /// reschedule).
    async fn find_blocking(
        &mut self,
        venue_id: VenueId,
        resource: Resource,
        range: TimeRange,
        exclude: Option<BookingId>,
    ) -> StoreResult<Vec<Booking>>;

    async fn insert_booking(&mut self, booking: NewBooking) -> StoreResult<Booking>;

    /// Status write validated by `BookingStatus::can_transition_to`.
    async fn update_booking_status(
        &mut self,
        id: BookingId,
        next: BookingStatus,
        cancelled_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    /// In-place interval/court move (reschedule).
    async fn update_booking_interval(
        &mut self,
        id: BookingId,
        court_id: Option<CourtId>,
        range: TimeRange,
    ) -> StoreResult<()>;

    /// Loads and write-locks a booking row.
    async fn get_booking_for_update(&mut self, id: BookingId) -> StoreResult<Option<Booking>>;

    async fn participants(&mut self, booking_id: BookingId)
    -> StoreResult<Vec<BookingParticipant>>;

    async fn insert_participant(
        &mut self,
        participant: NewParticipant,
    ) -> StoreResult<BookingParticipant>;

    /// Status write validated by `ParticipantStatus::can_transition_to`.
    async fn update_participant_status(
        &mut self,
        id: ParticipantId,
        next: ParticipantStatus,
    ) -> StoreResult<()>;

    /// Binds an unclaimed guest row to a registered user; `None` when no
    /// guest row carries the token.
    async fn claim_participant(
        &mut self,
        invite_token: &str,
        user_id: UserId,
    ) -> StoreResult<Option<BookingParticipant>>;

    /// Unique `provider_ref`; duplicate inserts surface as
    /// [`StoreError::Conflict`].
    async fn insert_payment(&mut self, payment: NewPayment) -> StoreResult<Payment>;

    /// Marks the booking's succeeded payments refunded.
    async fn refund_payments(&mut self, booking_id: BookingId) -> StoreResult<()>;

    async fn payment_by_provider_ref(&mut self, provider_ref: &str)
    -> StoreResult<Option<Payment>>;

    /// Balance under a write lock; lazily creates the wallet at 0.
    async fn wallet_for_update(&mut self, user_id: UserId) -> StoreResult<Money>;

    async fn set_wallet_balance(&mut self, user_id: UserId, balance: Money) -> StoreResult<()>;

    async fn insert_wallet_entry(&mut self, entry: NewWalletEntry)
    -> StoreResult<WalletTransaction>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
