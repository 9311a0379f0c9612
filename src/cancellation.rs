//! Cancellation and refunds.
//!
//! Refunds are computed from the policy snapshot the booking carries,
//! never from the venue's current policy. Outside the cutoff the player
//! gets everything back; inside it the snapshot percentage applies. The
//! venue owner can always cancel at full refund. All ledger movement for
//! one cancellation happens in one transaction, and the owner's wallet
//! is debited by exactly what the players get back.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::booking::{
    Booking, BookingError, BookingId, BookingResult, BookingStatus, ParticipantStatus, Party,
};
use crate::catalog::{UserId, Venue};
use crate::money::{self, Money};
use crate::settings::{BookingSettings, ConfigError};
use crate::store::Store;
use crate::wallet::{EntryCategory, WalletManager};

/// Cancellation manager
///
/// Owns the cancel operation and the expiry sweep. Reimbursement of
/// individual shares lives with the wallet; this manager distributes
/// refunds across participants and claws the owner's revenue back.
#[derive(Clone)]
pub struct CancellationManager {
    store: Arc<dyn Store>,
    wallet: WalletManager,
    settings: BookingSettings,
}

impl CancellationManager {
    /// Build the manager, rejecting settings that fail
    /// [`BookingSettings::validate`].
    pub fn new(
        store: Arc<dyn Store>,
        wallet: WalletManager,
        settings: BookingSettings,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            store,
            wallet,
            settings,
        })
    }

    /// Cancel a booking and distribute the refund.
    ///
    /// The acting user must be the booking's creator or the venue owner.
    /// Owner cancellations always refund 100% and may happen after the
    /// start; players are rejected once the start time has passed.
    /// Returns the total player-facing refund in minor units.
    ///
    /// # Errors
    ///
    /// * `BookingError::Unauthorized` - Acting user may not cancel this
    ///   booking
    /// * `BookingError::AlreadyCancelled` - Booking was already cancelled
    /// * `BookingError::TooLateToCancel` - Player cancelling after start
    /// * `BookingError::InsufficientFunds` - Owner wallet cannot cover
    ///   the refund; nothing is written
    pub async fn cancel(&self, booking_id: BookingId, acting_user: UserId) -> BookingResult<Money> {
        let booking = self
            .store
            .booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id}")))?;
        let venue = self
            .store
            .venue(booking.venue_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("venue {}", booking.venue_id)))?;
        if acting_user != booking.created_by && acting_user != venue.owner_id {
            return Err(BookingError::Unauthorized);
        }

        let mut attempt = 0;
        let refund = loop {
            match self
                .try_cancel(booking_id, &venue, acting_user, Utc::now())
                .await
            {
                Ok(refund) => break refund,
                Err(err) if err.is_transient() && attempt < self.settings.max_transient_retries => {
                    attempt += 1;
                    debug!(attempt, "retrying cancellation after transient store error");
                }
                Err(err) => return Err(err),
            }
        };
        info!(booking_id, acting_user, refund, "booking cancelled");
        Ok(refund)
    }

    /// One transaction: re-read the booking under a write lock, compute
    /// the refund from its policy snapshot, credit the players, debit
    /// the owner and flip every row.
    async fn try_cancel(
        &self,
        booking_id: BookingId,
        venue: &Venue,
        acting_user: UserId,
        now: DateTime<Utc>,
    ) -> BookingResult<Money> {
        let mut tx = self.store.begin().await?;
        let booking = tx
            .get_booking_for_update(booking_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id}")))?;

        match booking.status {
            BookingStatus::Cancelled => return Err(BookingError::AlreadyCancelled(booking_id)),
            BookingStatus::Completed => {
                return Err(BookingError::Validation(format!(
                    "cannot cancel completed booking {booking_id}"
                )));
            }
            BookingStatus::Blocked => {
                // Owner hold: cancelling only frees the interval.
                tx.update_booking_status(booking_id, BookingStatus::Cancelled, Some(now))
                    .await?;
                tx.commit().await?;
                return Ok(0);
            }
            BookingStatus::Pending | BookingStatus::Confirmed => {}
        }

        let is_owner = acting_user == venue.owner_id;
        let remaining = booking.starts_at - now;
        if !is_owner && remaining <= Duration::zero() {
            return Err(BookingError::TooLateToCancel {
                minutes_late: (-remaining).num_minutes(),
            });
        }

        let (refund_pct, refund_total) = refund_terms(&booking, is_owner, now);

        let participants = tx.participants(booking_id).await?;

        // Paid invitees get their own slice back; whatever the floor
        // divisions leave over goes to the creator, who fronted the
        // total. The two credits together equal refund_total exactly.
        let mut distributed: Money = 0;
        for participant in &participants {
            if participant.is_initiator || participant.status != ParticipantStatus::Paid {
                continue;
            }
            let payer = match &participant.party {
                Party::Registered { user_id } => *user_id,
                Party::Guest { .. } => continue,
            };
            let slice = money::pct_floor(participant.share_amount, refund_pct);
            if slice > 0 {
                self.wallet
                    .adjust(
                        tx.as_mut(),
                        payer,
                        slice,
                        EntryCategory::Refund,
                        &format!("refund for booking {booking_id}"),
                        Some(booking_id),
                    )
                    .await?;
                distributed += slice;
            }
        }

        let creator_refund = refund_total - distributed;
        if creator_refund > 0 {
            self.wallet
                .adjust(
                    tx.as_mut(),
                    booking.created_by,
                    creator_refund,
                    EntryCategory::Refund,
                    &format!("refund for booking {booking_id}"),
                    Some(booking_id),
                )
                .await?;
        }

        // The owner was credited the full total at settlement; claw the
        // player-facing refund back. A short owner wallet fails the whole
        // cancellation.
        if refund_total > 0 {
            self.wallet
                .adjust(
                    tx.as_mut(),
                    venue.owner_id,
                    -refund_total,
                    EntryCategory::RefundDeduction,
                    &format!("refund deduction for booking {booking_id}"),
                    Some(booking_id),
                )
                .await?;
        }

        for participant in &participants {
            let next = match (participant.status, refund_total > 0) {
                (ParticipantStatus::Paid, true) => ParticipantStatus::Refunded,
                (ParticipantStatus::Paid, false) => ParticipantStatus::Cancelled,
                (ParticipantStatus::Pending, _) => ParticipantStatus::Cancelled,
                _ => continue,
            };
            tx.update_participant_status(participant.id, next).await?;
        }

        if refund_total > 0 {
            tx.refund_payments(booking_id).await?;
        }
        tx.update_booking_status(booking_id, BookingStatus::Cancelled, Some(now))
            .await?;

        tx.commit().await?;
        Ok(refund_total)
    }

    /// Flip confirmed bookings whose interval has fully passed to
    /// completed. Meant to run periodically; returns how many changed.
    pub async fn complete_expired(&self) -> BookingResult<u64> {
        let flipped = self.store.complete_expired(Utc::now()).await?;
        if flipped > 0 {
            info!(flipped, "expired bookings completed");
        }
        Ok(flipped)
    }
}

/// Effective refund percentage and player-facing refund total for a
/// booking cancelled at `now`. Strictly more time than the cutoff means
/// a full refund; at or inside the cutoff the snapshot percentage
/// applies. Owners always refund in full.
pub fn refund_terms(booking: &Booking, is_owner: bool, now: DateTime<Utc>) -> (i32, Money) {
    let policy = booking.policy();
    let remaining = booking.starts_at - now;
    let refund_pct = if is_owner || remaining > Duration::hours(i64::from(policy.cutoff_hours)) {
        100
    } else {
        policy.refund_pct
    };
    (refund_pct, money::pct_floor(booking.total_amount, refund_pct))
}
