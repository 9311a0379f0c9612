//! Checkout request and session types.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::{Booking, BookingId, ParticipantId};
use crate::catalog::{CourtId, SportId, UserId, VenueId};
use crate::money::Money;

/// A checkout attempt as the caller states it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    pub venue_id: VenueId,
    pub sport_id: SportId,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub duration_hours: u32,
    /// Emails to split the total with; unknown addresses become guest
    /// invites.
    pub invitee_emails: Vec<String>,
    /// Apply the requester's wallet balance before charging externally.
    pub use_wallet_points: bool,
}

/// How a checkout (or share payment) ended.
#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    /// Settled from the wallet; the booking exists and is confirmed.
    Confirmed { booking: Booking },
    /// An external charge is outstanding; the caller redirects the payer
    /// and later confirms the session.
    PaymentRequired {
        session_id: String,
        checkout_url: String,
        amount_due: Money,
    },
}

/// Everything needed to create a booking once its payment session
/// settles. Nothing is persisted before confirmation, so the session
/// metadata must reconstruct the booking on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSessionPlan {
    pub user_id: UserId,
    pub venue_id: VenueId,
    /// Court resolved when the session was created; re-checked for
    /// conflicts at confirmation.
    pub court_id: CourtId,
    pub sport_id: SportId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub total_amount: Money,
    /// Wallet portion, debited only once the session settles.
    pub points_used: Money,
    pub invitee_emails: Vec<String>,
    /// Cancellation policy snapshot taken at session creation.
    pub refund_pct: i32,
    pub cutoff_hours: i32,
}

/// An invitee share awaiting an external charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareSessionPlan {
    pub booking_id: BookingId,
    pub participant_id: ParticipantId,
    pub user_id: UserId,
    pub amount: Money,
}

/// Session metadata, round-tripped through the payment provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutMetadata {
    Booking(BookingSessionPlan),
    Share(ShareSessionPlan),
}
