//! Booking data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{CancellationPolicy, CourtId, SportId, UserId, VenueId};
use crate::money::Money;

use super::conflict::{Resource, TimeRange};

/// Booking ID type
pub type BookingId = i64;
/// Participant ID type
pub type ParticipantId = i64;
/// Payment ID type
pub type PaymentId = i64;

/// Booking lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Created but not yet settled.
    Pending,
    /// Settled and occupying its interval.
    Confirmed,
    /// Cancelled; frees the interval.
    Cancelled,
    /// Interval fully in the past.
    Completed,
    /// Owner hold: no payment, still occupies the interval.
    Blocked,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Option<BookingStatus> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "completed" => Some(BookingStatus::Completed),
            "blocked" => Some(BookingStatus::Blocked),
            _ => None,
        }
    }

    /// The one place lifecycle transitions are defined. Every status
    /// write goes through this check.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Completed)
                | (BookingStatus::Blocked, BookingStatus::Cancelled)
        )
    }

    /// Whether a booking in this state occupies its interval for
    /// conflict purposes.
    pub fn blocks_interval(&self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::Blocked
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Booking model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub venue_id: VenueId,
    /// `None` is a venue-wide booking blocking every court.
    pub court_id: Option<CourtId>,
    pub sport_id: Option<SportId>,
    pub created_by: UserId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// Full price in minor units.
    pub total_amount: Money,
    /// Portion funded from the creator's point wallet.
    pub points_used: Money,
    /// Portion charged through the external provider.
    pub paid_amount: Money,
    pub status: BookingStatus,
    /// Cancellation terms snapshotted at creation.
    pub refund_pct: i32,
    pub cutoff_hours: i32,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn resource(&self) -> Resource {
        Resource::from_court(self.court_id)
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.starts_at, self.ends_at)
    }

    pub fn policy(&self) -> CancellationPolicy {
        CancellationPolicy {
            refund_pct: self.refund_pct,
            cutoff_hours: self.cutoff_hours,
        }
    }
}

/// Who a participant row belongs to. Guests carry an invite token until
/// a registered user claims the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Party {
    Registered { user_id: UserId },
    Guest { email: String, invite_token: String },
}

impl Party {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Party::Registered { user_id } => Some(*user_id),
            Party::Guest { .. } => None,
        }
    }
}

/// Participant payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Pending,
    Paid,
    Refunded,
    Cancelled,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::Pending => "pending",
            ParticipantStatus::Paid => "paid",
            ParticipantStatus::Refunded => "refunded",
            ParticipantStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<ParticipantStatus> {
        match s {
            "pending" => Some(ParticipantStatus::Pending),
            "paid" => Some(ParticipantStatus::Paid),
            "refunded" => Some(ParticipantStatus::Refunded),
            "cancelled" => Some(ParticipantStatus::Cancelled),
            _ => None,
        }
    }

    pub fn can_transition_to(self, next: ParticipantStatus) -> bool {
        matches!(
            (self, next),
            (ParticipantStatus::Pending, ParticipantStatus::Paid)
                | (ParticipantStatus::Pending, ParticipantStatus::Cancelled)
                | (ParticipantStatus::Paid, ParticipantStatus::Refunded)
                | (ParticipantStatus::Paid, ParticipantStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Booking participant model (one row per cost share).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingParticipant {
    pub id: ParticipantId,
    pub booking_id: BookingId,
    pub party: Party,
    /// This participant's share in minor units. Shares of a booking sum
    /// to the booking total exactly.
    pub share_amount: Money,
    pub is_initiator: bool,
    pub status: ParticipantStatus,
    pub created_at: DateTime<Utc>,
}

/// Payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<PaymentStatus> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "succeeded" => Some(PaymentStatus::Succeeded),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Succeeded)
                | (PaymentStatus::Succeeded, PaymentStatus::Refunded)
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment model (one row per provider charge or point settlement).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub booking_id: BookingId,
    /// Amount this payment settled, in minor units.
    pub amount: Money,
    /// Wallet points applied alongside this payment.
    pub points_used: Money,
    pub status: PaymentStatus,
    /// Provider session id (or synthetic ref for point settlements);
    /// unique, backs confirmation idempotency.
    pub provider_ref: String,
    pub created_at: DateTime<Utc>,
}

/// A booking with its owned rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDetails {
    pub booking: Booking,
    pub participants: Vec<BookingParticipant>,
    pub payments: Vec<Payment>,
}
