//! Checkout orchestrator.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::booking::{
    Booking, BookingDetails, BookingError, BookingId, BookingParticipant, BookingResult,
    BookingStatus, ParticipantStatus, Party, PaymentStatus, Resource, TimeRange,
};
use crate::catalog::{CancellationPolicy, Court, CourtId, SportId, UserId, Venue, VenueId};
use crate::directory::UserDirectory;
use crate::money::{self, Money};
use crate::notify::InviteNotifier;
use crate::payment::PaymentProvider;
use crate::pricing::PricingEngine;
use crate::settings::{BookingSettings, ConfigError};
use crate::store::{NewBooking, NewParticipant, NewPayment, Store, StoreError, StoreTx};
use crate::wallet::{EntryCategory, WalletManager};

use super::models::{
    BookingSessionPlan, CheckoutMetadata, CheckoutOutcome, CheckoutRequest, ShareSessionPlan,
};

/// Resolved invitees plus the guest invites to send after commit.
struct InvitePlan {
    parties: Vec<Party>,
    invites: Vec<(String, String)>,
}

/// Checkout orchestrator
///
/// Drives a booking attempt from request to settlement: interval
/// validation, pricing, court resolution, then wallet funding or an
/// external payment session. Every admitting write re-runs the conflict
/// check inside its own transaction.
#[derive(Clone)]
pub struct CheckoutManager {
    store: Arc<dyn Store>,
    wallet: WalletManager,
    pricing: PricingEngine,
    provider: Arc<dyn PaymentProvider>,
    directory: Arc<dyn UserDirectory>,
    notifier: Arc<dyn InviteNotifier>,
    settings: BookingSettings,
}

impl CheckoutManager {
    /// Build the orchestrator, rejecting settings that fail
    /// [`BookingSettings::validate`].
    pub fn new(
        store: Arc<dyn Store>,
        wallet: WalletManager,
        pricing: PricingEngine,
        provider: Arc<dyn PaymentProvider>,
        directory: Arc<dyn UserDirectory>,
        notifier: Arc<dyn InviteNotifier>,
        settings: BookingSettings,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            store,
            wallet,
            pricing,
            provider,
            directory,
            notifier,
            settings,
        })
    }

    /// Start a checkout for a slot.
    ///
    /// Validates the interval, prices it, resolves a free court for the
    /// sport and branches on funding: when the requester opted in and
    /// their wallet covers the total, the booking is settled in one
    /// transaction and comes back `Confirmed`; otherwise an external
    /// payment session is created (after an optional partial wallet
    /// deduction) and `PaymentRequired` is returned. No booking row
    /// exists until an external session is confirmed.
    ///
    /// # Errors
    ///
    /// * `BookingError::Validation` - Interval outside the rules
    /// * `BookingError::NotFound` - Unknown venue
    /// * `BookingError::SlotUnavailable` - No court free for the interval
    /// * `BookingError::InsufficientFunds` - Balance shrank below the
    ///   total between the pre-check and the settlement transaction
    pub async fn start_checkout(&self, request: CheckoutRequest) -> BookingResult<CheckoutOutcome> {
        let venue = self
            .store
            .venue(request.venue_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("venue {}", request.venue_id)))?;
        let range = self.validate_slot(
            &venue,
            request.date,
            request.start,
            request.duration_hours,
            Utc::now(),
        )?;

        let quote = self
            .pricing
            .quote(venue.id, range.starts_at, request.duration_hours)
            .await?;
        let court_id = self
            .resolve_court(&venue, request.sport_id, range, None)
            .await?;
        let policy = self
            .store
            .cancellation_policy(venue.id)
            .await?
            .unwrap_or_default();

        let balance = if request.use_wallet_points {
            self.wallet.balance(request.user_id).await?
        } else {
            0
        };

        if quote.total == 0 || (request.use_wallet_points && balance >= quote.total) {
            let plan = self.resolve_invitees(&request.invitee_emails).await;
            let new_booking = NewBooking {
                venue_id: venue.id,
                court_id: Some(court_id),
                sport_id: Some(request.sport_id),
                created_by: request.user_id,
                range,
                total_amount: quote.total,
                points_used: quote.total,
                paid_amount: 0,
                status: BookingStatus::Confirmed,
                policy,
            };

            let mut attempt = 0;
            let booking = loop {
                match self
                    .settle_from_wallet(&new_booking, venue.owner_id, &plan)
                    .await
                {
                    Ok(booking) => break booking,
                    Err(err)
                        if err.is_transient() && attempt < self.settings.max_transient_retries =>
                    {
                        attempt += 1;
                        debug!(attempt, "retrying wallet settlement after transient store error");
                    }
                    Err(err) => return Err(err),
                }
            };
            self.send_invites(&plan).await;
            info!(
                booking_id = booking.id,
                venue_id = venue.id,
                total = quote.total,
                "booking settled from wallet"
            );
            return Ok(CheckoutOutcome::Confirmed { booking });
        }

        // External funding, after an optional partial wallet deduction.
        // The wallet portion is only reserved here; it is debited once
        // the session is confirmed.
        let points_used = balance.min(quote.total);
        let amount_due = quote.total - points_used;
        let metadata = CheckoutMetadata::Booking(BookingSessionPlan {
            user_id: request.user_id,
            venue_id: venue.id,
            court_id,
            sport_id: request.sport_id,
            starts_at: range.starts_at,
            ends_at: range.ends_at,
            total_amount: quote.total,
            points_used,
            invitee_emails: request.invitee_emails.clone(),
            refund_pct: policy.refund_pct,
            cutoff_hours: policy.cutoff_hours,
        });
        let metadata = serde_json::to_value(&metadata).map_err(StoreError::from)?;
        let session = self
            .provider
            .create_session(amount_due, &self.settings.currency, metadata)
            .await?;

        info!(
            venue_id = venue.id,
            session_id = %session.session_id,
            amount_due,
            points_used,
            "checkout session created"
        );
        Ok(CheckoutOutcome::PaymentRequired {
            session_id: session.session_id,
            checkout_url: session.checkout_url,
            amount_due,
        })
    }

    /// Confirm a paid external session and settle whatever it carries: a
    /// new booking or an invitee share.
    ///
    /// Idempotent: once a payment row exists for `session_id`, repeat
    /// calls return the already-settled booking without touching the
    /// ledger again.
    ///
    /// # Errors
    ///
    /// * `BookingError::NotFound` - Unknown session
    /// * `BookingError::Validation` - Session not paid yet
    /// * `BookingError::SlotTakenDuringPayment` - The slot (or share) was
    ///   taken while the payer completed checkout; the charge needs an
    ///   out-of-band provider refund
    pub async fn confirm_checkout(&self, session_id: &str) -> BookingResult<Booking> {
        // Idempotency fast path; the settlement transaction re-checks
        // under the admission lock.
        if let Some(payment) = self.store.payment_by_provider_ref(session_id).await? {
            return self.booking_by_id(payment.booking_id).await;
        }

        let state = self.provider.get_session(session_id).await?;
        if !state.paid {
            return Err(BookingError::Validation(format!(
                "payment session {session_id} is not paid"
            )));
        }
        let metadata: CheckoutMetadata = serde_json::from_value(state.metadata)
            .map_err(|e| BookingError::Provider(format!("malformed session metadata: {e}")))?;

        match metadata {
            CheckoutMetadata::Booking(plan) => {
                self.settle_booking_session(session_id, state.amount_paid, &plan)
                    .await
            }
            CheckoutMetadata::Share(plan) => {
                self.settle_share_session(session_id, state.amount_paid, &plan)
                    .await
            }
        }
    }

    /// Pay the acting user's pending share of a split booking, from the
    /// wallet when it covers the share, otherwise through an external
    /// session. Shares settle whole; there is no partial deduction.
    ///
    /// # Errors
    ///
    /// * `BookingError::NotFound` - No share for the user on the booking
    /// * `BookingError::Validation` - Share not pending, or booking not
    ///   open for share payments
    /// * `BookingError::InsufficientFunds` - Wallet opted in but short
    pub async fn pay_split_share(
        &self,
        booking_id: BookingId,
        user_id: UserId,
        use_wallet_points: bool,
    ) -> BookingResult<CheckoutOutcome> {
        let booking = self.booking_by_id(booking_id).await?;
        if booking.status != BookingStatus::Confirmed {
            return Err(BookingError::Validation(format!(
                "booking {booking_id} is not open for share payments"
            )));
        }
        let participant = self.pending_share(booking_id, user_id).await?;
        let share = participant.share_amount;

        let wallet_covers = if use_wallet_points {
            self.wallet.balance(user_id).await? >= share
        } else {
            false
        };
        if share == 0 || wallet_covers {
            let mut attempt = 0;
            let booking = loop {
                match self.settle_share_from_wallet(&booking, &participant).await {
                    Ok(booking) => break booking,
                    Err(err)
                        if err.is_transient() && attempt < self.settings.max_transient_retries =>
                    {
                        attempt += 1;
                        debug!(attempt, "retrying share settlement after transient store error");
                    }
                    Err(err) => return Err(err),
                }
            };
            info!(booking_id, user_id, share, "share settled from wallet");
            return Ok(CheckoutOutcome::Confirmed { booking });
        }

        let metadata = CheckoutMetadata::Share(ShareSessionPlan {
            booking_id,
            participant_id: participant.id,
            user_id,
            amount: share,
        });
        let metadata = serde_json::to_value(&metadata).map_err(StoreError::from)?;
        let session = self
            .provider
            .create_session(share, &self.settings.currency, metadata)
            .await?;

        info!(
            booking_id,
            user_id,
            session_id = %session.session_id,
            amount_due = share,
            "share checkout session created"
        );
        Ok(CheckoutOutcome::PaymentRequired {
            session_id: session.session_id,
            checkout_url: session.checkout_url,
            amount_due: share,
        })
    }

    /// Place an owner hold on a court (or the whole venue) so the
    /// interval cannot be booked. Holds carry no money and no
    /// participants; cancelling one simply frees the interval.
    ///
    /// # Errors
    ///
    /// * `BookingError::Unauthorized` - Acting user does not own the venue
    /// * `BookingError::SlotUnavailable` - Interval already taken
    pub async fn block_slot(
        &self,
        acting_user: UserId,
        venue_id: VenueId,
        court_id: Option<CourtId>,
        date: NaiveDate,
        start: NaiveTime,
        duration_hours: u32,
    ) -> BookingResult<Booking> {
        let venue = self
            .store
            .venue(venue_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("venue {venue_id}")))?;
        if venue.owner_id != acting_user {
            return Err(BookingError::Unauthorized);
        }
        let range = self.validate_slot(&venue, date, start, duration_hours, Utc::now())?;
        if let Some(id) = court_id {
            let courts = self.store.courts(venue_id).await?;
            if !courts.iter().any(|court| court.id == id) {
                return Err(BookingError::NotFound(format!(
                    "court {id} at venue {venue_id}"
                )));
            }
        }

        let new_booking = NewBooking {
            venue_id,
            court_id,
            sport_id: None,
            created_by: acting_user,
            range,
            total_amount: 0,
            points_used: 0,
            paid_amount: 0,
            status: BookingStatus::Blocked,
            policy: CancellationPolicy::default(),
        };

        let mut attempt = 0;
        let booking = loop {
            match self.try_block(&new_booking).await {
                Ok(booking) => break booking,
                Err(err) if err.is_transient() && attempt < self.settings.max_transient_retries => {
                    attempt += 1;
                    debug!(attempt, "retrying block after transient store error");
                }
                Err(err) => return Err(err),
            }
        };
        info!(
            booking_id = booking.id,
            venue_id,
            court_id = ?court_id,
            "slot blocked"
        );
        Ok(booking)
    }

    /// Move a booking to a new interval in place. Validation matches
    /// checkout; the booking's own current interval is excluded from
    /// conflict consideration, and no money moves.
    ///
    /// # Errors
    ///
    /// * `BookingError::Unauthorized` - Acting user is neither the
    ///   creator nor the venue owner
    /// * `BookingError::SlotUnavailable` - No court free for the new
    ///   interval
    pub async fn reschedule(
        &self,
        booking_id: BookingId,
        acting_user: UserId,
        date: NaiveDate,
        start: NaiveTime,
        duration_hours: u32,
    ) -> BookingResult<Booking> {
        let booking = self.booking_by_id(booking_id).await?;
        let venue = self
            .store
            .venue(booking.venue_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("venue {}", booking.venue_id)))?;
        if acting_user != booking.created_by && acting_user != venue.owner_id {
            return Err(BookingError::Unauthorized);
        }
        reschedulable(&booking)?;
        let range = self.validate_slot(&venue, date, start, duration_hours, Utc::now())?;
        let courts = self.store.courts(venue.id).await?;

        let mut attempt = 0;
        let moved = loop {
            match self.try_reschedule(&booking, &venue, &courts, range).await {
                Ok(booking) => break booking,
                Err(err) if err.is_transient() && attempt < self.settings.max_transient_retries => {
                    attempt += 1;
                    debug!(attempt, "retrying reschedule after transient store error");
                }
                Err(err) => return Err(err),
            }
        };
        info!(
            booking_id,
            starts_at = %range.starts_at,
            court_id = ?moved.court_id,
            "booking rescheduled"
        );
        Ok(moved)
    }

    /// Bind a guest participant row to a registered user via its invite
    /// token. Returns the claimed row.
    ///
    /// # Errors
    ///
    /// * `BookingError::NotFound` - No unclaimed row carries the token
    pub async fn claim_invite(
        &self,
        invite_token: &str,
        user_id: UserId,
    ) -> BookingResult<BookingParticipant> {
        let mut tx = self.store.begin().await?;
        match tx.claim_participant(invite_token, user_id).await? {
            Some(participant) => {
                tx.commit().await?;
                info!(
                    participant_id = participant.id,
                    booking_id = participant.booking_id,
                    user_id,
                    "guest invite claimed"
                );
                Ok(participant)
            }
            None => {
                tx.rollback().await?;
                Err(BookingError::NotFound(format!(
                    "invite token {invite_token}"
                )))
            }
        }
    }

    /// A booking with its participant and payment rows.
    pub async fn booking_details(&self, booking_id: BookingId) -> BookingResult<BookingDetails> {
        let booking = self.booking_by_id(booking_id).await?;
        let participants = self.store.participants(booking_id).await?;
        let payments = self.store.payments(booking_id).await?;
        Ok(BookingDetails {
            booking,
            participants,
            payments,
        })
    }

    /// Validate a requested slot against the venue and engine rules and
    /// return its interval: aligned start, inside the operating window,
    /// duration within bounds, strictly in the future.
    fn validate_slot(
        &self,
        venue: &Venue,
        date: NaiveDate,
        start: NaiveTime,
        duration_hours: u32,
        now: DateTime<Utc>,
    ) -> BookingResult<TimeRange> {
        if start.second() != 0 || start.minute() % self.settings.slot_step_minutes != 0 {
            return Err(BookingError::Validation(format!(
                "start time must align to {} minute steps",
                self.settings.slot_step_minutes
            )));
        }

        let start_min = i64::from(start.hour() * 60 + start.minute());
        let end_min = start_min + i64::from(duration_hours) * 60;
        if start_min < i64::from(venue.open_hour) * 60 || end_min > i64::from(venue.close_hour) * 60
        {
            return Err(BookingError::Validation(format!(
                "slot falls outside venue hours {:02}:00..{:02}:00",
                venue.open_hour, venue.close_hour
            )));
        }

        if duration_hours < self.settings.min_duration_hours
            || duration_hours > self.settings.max_duration_hours
        {
            return Err(BookingError::Validation(format!(
                "duration must be between {} and {} hours",
                self.settings.min_duration_hours, self.settings.max_duration_hours
            )));
        }

        let starts_at = date.and_time(start).and_utc();
        if starts_at <= now {
            return Err(BookingError::Validation(
                "start time must be in the future".to_string(),
            ));
        }

        Ok(TimeRange {
            starts_at,
            ends_at: starts_at + Duration::hours(i64::from(duration_hours)),
        })
    }

    /// Pick the first court of the venue that supports the sport and has
    /// no blocking booking over `range`. This read is advisory; the
    /// admitting transaction re-checks the chosen court.
    async fn resolve_court(
        &self,
        venue: &Venue,
        sport_id: SportId,
        range: TimeRange,
        exclude: Option<BookingId>,
    ) -> BookingResult<CourtId> {
        let courts = self.store.courts(venue.id).await?;
        let blocking = self.store.bookings_in_range(venue.id, range).await?;
        courts
            .iter()
            .filter(|court| court.supports(sport_id))
            .find(|court| court_is_free(court.id, &blocking, range, exclude))
            .map(|court| court.id)
            .ok_or(BookingError::SlotUnavailable {
                venue_id: venue.id,
                starts_at: range.starts_at,
                ends_at: range.ends_at,
            })
    }

    /// Map invitee emails to parties: known addresses become registered
    /// participants, unknown ones guest rows with a fresh invite token.
    async fn resolve_invitees(&self, emails: &[String]) -> InvitePlan {
        let mut parties = Vec::with_capacity(emails.len());
        let mut invites = Vec::new();
        for email in emails {
            match self.directory.find_by_email(email).await {
                Some(user_id) => parties.push(Party::Registered { user_id }),
                None => {
                    let invite_token = Uuid::new_v4().simple().to_string();
                    invites.push((email.clone(), invite_token.clone()));
                    parties.push(Party::Guest {
                        email: email.clone(),
                        invite_token,
                    });
                }
            }
        }
        InvitePlan { parties, invites }
    }

    async fn send_invites(&self, plan: &InvitePlan) {
        for (email, token) in &plan.invites {
            self.notifier.send_invite(email, token).await;
        }
    }

    /// One transaction: re-check the conflict, debit the requester,
    /// insert the booking with its participants, credit the owner and
    /// record the settlement payment.
    async fn settle_from_wallet(
        &self,
        new_booking: &NewBooking,
        owner_id: UserId,
        plan: &InvitePlan,
    ) -> BookingResult<Booking> {
        let mut tx = self.store.begin().await?;
        tx.lock_resource(
            new_booking.venue_id,
            new_booking.range.starts_at.date_naive(),
        )
        .await?;

        let clashes = tx
            .find_blocking(
                new_booking.venue_id,
                Resource::from_court(new_booking.court_id),
                new_booking.range,
                None,
            )
            .await?;
        if !clashes.is_empty() {
            return Err(BookingError::SlotUnavailable {
                venue_id: new_booking.venue_id,
                starts_at: new_booking.range.starts_at,
                ends_at: new_booking.range.ends_at,
            });
        }

        let booking = tx.insert_booking(new_booking.clone()).await?;
        let total = booking.total_amount;

        if total > 0 {
            self.wallet
                .adjust(
                    tx.as_mut(),
                    booking.created_by,
                    -total,
                    EntryCategory::BookingPayment,
                    &format!("points payment for booking {}", booking.id),
                    Some(booking.id),
                )
                .await?;
        }

        self.insert_participants(tx.as_mut(), &booking, &plan.parties)
            .await?;

        if total > 0 {
            self.wallet
                .adjust(
                    tx.as_mut(),
                    owner_id,
                    total,
                    EntryCategory::BookingRevenue,
                    &format!("revenue for booking {}", booking.id),
                    Some(booking.id),
                )
                .await?;
        }

        tx.insert_payment(NewPayment {
            booking_id: booking.id,
            amount: total,
            points_used: total,
            status: PaymentStatus::Succeeded,
            provider_ref: format!("points_{}", Uuid::new_v4().simple()),
        })
        .await?;

        tx.commit().await?;
        Ok(booking)
    }

    /// Settle a paid booking session, retrying transient failures and
    /// folding a lost concurrent-confirmation race into the idempotent
    /// success path.
    async fn settle_booking_session(
        &self,
        session_id: &str,
        amount_paid: Money,
        plan: &BookingSessionPlan,
    ) -> BookingResult<Booking> {
        let venue = self
            .store
            .venue(plan.venue_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("venue {}", plan.venue_id)))?;
        let invites = self.resolve_invitees(&plan.invitee_emails).await;

        let mut attempt = 0;
        loop {
            match self
                .try_settle_booking_session(session_id, amount_paid, plan, &venue, &invites)
                .await
            {
                Ok(booking) => {
                    info!(
                        booking_id = booking.id,
                        session_id, "booking settled from payment session"
                    );
                    break Ok(booking);
                }
                Err(BookingError::Store(err)) if err.is_conflict() => {
                    // A concurrent confirmation of the same session won
                    // the payment-row race; its booking is the answer.
                    match self.store.payment_by_provider_ref(session_id).await? {
                        Some(payment) => break self.booking_by_id(payment.booking_id).await,
                        None => break Err(BookingError::Store(err)),
                    }
                }
                Err(err) if err.is_transient() && attempt < self.settings.max_transient_retries => {
                    attempt += 1;
                    debug!(
                        session_id,
                        attempt, "retrying session settlement after transient store error"
                    );
                }
                Err(err) => break Err(err),
            }
        }
    }

    async fn try_settle_booking_session(
        &self,
        session_id: &str,
        amount_paid: Money,
        plan: &BookingSessionPlan,
        venue: &Venue,
        invites: &InvitePlan,
    ) -> BookingResult<Booking> {
        let range = TimeRange {
            starts_at: plan.starts_at,
            ends_at: plan.ends_at,
        };
        let mut tx = self.store.begin().await?;
        tx.lock_resource(venue.id, range.starts_at.date_naive())
            .await?;

        // Authoritative idempotency check under the admission lock.
        if let Some(payment) = tx.payment_by_provider_ref(session_id).await? {
            let booking_id = payment.booking_id;
            tx.rollback().await?;
            return self.booking_by_id(booking_id).await;
        }

        let clashes = tx
            .find_blocking(venue.id, Resource::Court(plan.court_id), range, None)
            .await?;
        if !clashes.is_empty() {
            return Err(BookingError::SlotTakenDuringPayment {
                session_id: session_id.to_string(),
                amount_paid,
            });
        }

        let booking = tx
            .insert_booking(NewBooking {
                venue_id: venue.id,
                court_id: Some(plan.court_id),
                sport_id: Some(plan.sport_id),
                created_by: plan.user_id,
                range,
                total_amount: plan.total_amount,
                points_used: plan.points_used,
                paid_amount: amount_paid,
                status: BookingStatus::Confirmed,
                policy: CancellationPolicy {
                    refund_pct: plan.refund_pct,
                    cutoff_hours: plan.cutoff_hours,
                },
            })
            .await?;

        tx.insert_payment(NewPayment {
            booking_id: booking.id,
            amount: amount_paid,
            points_used: plan.points_used,
            status: PaymentStatus::Succeeded,
            provider_ref: session_id.to_string(),
        })
        .await?;

        if plan.points_used > 0 {
            self.wallet
                .adjust(
                    tx.as_mut(),
                    plan.user_id,
                    -plan.points_used,
                    EntryCategory::BookingPayment,
                    &format!("points applied to booking {}", booking.id),
                    Some(booking.id),
                )
                .await?;
        }

        self.insert_participants(tx.as_mut(), &booking, &invites.parties)
            .await?;

        if booking.total_amount > 0 {
            self.wallet
                .adjust(
                    tx.as_mut(),
                    venue.owner_id,
                    booking.total_amount,
                    EntryCategory::BookingRevenue,
                    &format!("revenue for booking {}", booking.id),
                    Some(booking.id),
                )
                .await?;
        }

        tx.commit().await?;
        self.send_invites(invites).await;
        Ok(booking)
    }

    /// Settle a paid share session: the participant goes to paid and the
    /// initiator is reimbursed. The payer's wallet is untouched.
    async fn settle_share_session(
        &self,
        session_id: &str,
        amount_paid: Money,
        plan: &ShareSessionPlan,
    ) -> BookingResult<Booking> {
        let mut attempt = 0;
        loop {
            match self
                .try_settle_share_session(session_id, amount_paid, plan)
                .await
            {
                Ok(booking) => {
                    info!(
                        booking_id = booking.id,
                        session_id, "share settled from payment session"
                    );
                    break Ok(booking);
                }
                Err(BookingError::Store(err)) if err.is_conflict() => {
                    match self.store.payment_by_provider_ref(session_id).await? {
                        Some(payment) => break self.booking_by_id(payment.booking_id).await,
                        None => break Err(BookingError::Store(err)),
                    }
                }
                Err(err) if err.is_transient() && attempt < self.settings.max_transient_retries => {
                    attempt += 1;
                    debug!(
                        session_id,
                        attempt, "retrying share settlement after transient store error"
                    );
                }
                Err(err) => break Err(err),
            }
        }
    }

    async fn try_settle_share_session(
        &self,
        session_id: &str,
        amount_paid: Money,
        plan: &ShareSessionPlan,
    ) -> BookingResult<Booking> {
        let mut tx = self.store.begin().await?;
        let booking = tx
            .get_booking_for_update(plan.booking_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("booking {}", plan.booking_id)))?;

        if let Some(payment) = tx.payment_by_provider_ref(session_id).await? {
            let booking_id = payment.booking_id;
            tx.rollback().await?;
            return self.booking_by_id(booking_id).await;
        }

        // The booking was cancelled, or the share settled another way,
        // while the payer completed checkout. The charge has to come
        // back through the provider.
        if booking.status != BookingStatus::Confirmed {
            return Err(BookingError::SlotTakenDuringPayment {
                session_id: session_id.to_string(),
                amount_paid,
            });
        }
        let participant = tx
            .participants(plan.booking_id)
            .await?
            .into_iter()
            .find(|p| p.id == plan.participant_id)
            .ok_or_else(|| {
                BookingError::NotFound(format!("participant {}", plan.participant_id))
            })?;
        if participant.status != ParticipantStatus::Pending {
            return Err(BookingError::SlotTakenDuringPayment {
                session_id: session_id.to_string(),
                amount_paid,
            });
        }

        tx.insert_payment(NewPayment {
            booking_id: booking.id,
            amount: amount_paid,
            points_used: 0,
            status: PaymentStatus::Succeeded,
            provider_ref: session_id.to_string(),
        })
        .await?;
        self.wallet
            .reimburse(tx.as_mut(), &booking, &participant, plan.amount)
            .await?;

        tx.commit().await?;
        Ok(booking)
    }

    /// One transaction: debit the payer's wallet for their share and
    /// reimburse the initiator.
    async fn settle_share_from_wallet(
        &self,
        booking: &Booking,
        participant: &BookingParticipant,
    ) -> BookingResult<Booking> {
        let mut tx = self.store.begin().await?;
        let current = tx
            .get_booking_for_update(booking.id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("booking {}", booking.id)))?;
        if current.status != BookingStatus::Confirmed {
            return Err(BookingError::Validation(format!(
                "booking {} is not open for share payments",
                booking.id
            )));
        }

        // Re-read the share row under the booking lock.
        let fresh = tx
            .participants(booking.id)
            .await?
            .into_iter()
            .find(|p| p.id == participant.id)
            .ok_or_else(|| BookingError::NotFound(format!("participant {}", participant.id)))?;
        if fresh.status != ParticipantStatus::Pending {
            return Err(BookingError::Validation(format!(
                "share for booking {} is not pending",
                booking.id
            )));
        }
        let payer = match &fresh.party {
            Party::Registered { user_id } => *user_id,
            Party::Guest { .. } => {
                return Err(BookingError::Validation(format!(
                    "guest share on booking {} must be claimed before wallet payment",
                    booking.id
                )));
            }
        };

        let share = fresh.share_amount;
        if share > 0 {
            self.wallet
                .adjust(
                    tx.as_mut(),
                    payer,
                    -share,
                    EntryCategory::BookingPayment,
                    &format!("share payment for booking {}", booking.id),
                    Some(booking.id),
                )
                .await?;
            self.wallet
                .reimburse(tx.as_mut(), &current, &fresh, share)
                .await?;
        } else {
            tx.update_participant_status(fresh.id, ParticipantStatus::Paid)
                .await?;
        }

        tx.commit().await?;
        Ok(current)
    }

    async fn try_block(&self, new_booking: &NewBooking) -> BookingResult<Booking> {
        let mut tx = self.store.begin().await?;
        tx.lock_resource(
            new_booking.venue_id,
            new_booking.range.starts_at.date_naive(),
        )
        .await?;

        let clashes = tx
            .find_blocking(
                new_booking.venue_id,
                Resource::from_court(new_booking.court_id),
                new_booking.range,
                None,
            )
            .await?;
        if !clashes.is_empty() {
            return Err(BookingError::SlotUnavailable {
                venue_id: new_booking.venue_id,
                starts_at: new_booking.range.starts_at,
                ends_at: new_booking.range.ends_at,
            });
        }

        let booking = tx.insert_booking(new_booking.clone()).await?;
        tx.commit().await?;
        Ok(booking)
    }

    /// One transaction: re-resolve a court for the new interval with the
    /// booking itself excluded, then move it in place.
    async fn try_reschedule(
        &self,
        booking: &Booking,
        venue: &Venue,
        courts: &[Court],
        range: TimeRange,
    ) -> BookingResult<Booking> {
        let mut tx = self.store.begin().await?;
        tx.lock_resource(venue.id, range.starts_at.date_naive())
            .await?;
        let current = tx
            .get_booking_for_update(booking.id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("booking {}", booking.id)))?;
        reschedulable(&current)?;

        let new_court = match current.sport_id {
            Some(sport_id) => {
                let mut found = None;
                for court in courts.iter().filter(|c| c.supports(sport_id)) {
                    let clashes = tx
                        .find_blocking(venue.id, Resource::Court(court.id), range, Some(booking.id))
                        .await?;
                    if clashes.is_empty() {
                        found = Some(court.id);
                        break;
                    }
                }
                match found {
                    Some(id) => Some(id),
                    None => {
                        return Err(BookingError::SlotUnavailable {
                            venue_id: venue.id,
                            starts_at: range.starts_at,
                            ends_at: range.ends_at,
                        });
                    }
                }
            }
            None => {
                // Owner holds keep their scope, court-bound or venue-wide.
                let clashes = tx
                    .find_blocking(
                        venue.id,
                        Resource::from_court(current.court_id),
                        range,
                        Some(booking.id),
                    )
                    .await?;
                if !clashes.is_empty() {
                    return Err(BookingError::SlotUnavailable {
                        venue_id: venue.id,
                        starts_at: range.starts_at,
                        ends_at: range.ends_at,
                    });
                }
                current.court_id
            }
        };

        tx.update_booking_interval(booking.id, new_court, range)
            .await?;
        tx.commit().await?;

        let mut moved = current;
        moved.court_id = new_court;
        moved.starts_at = range.starts_at;
        moved.ends_at = range.ends_at;
        Ok(moved)
    }

    /// Insert the initiator row (already settled) and one pending row per
    /// invitee. Shares split evenly; the initiator absorbs the rounding
    /// remainder, or the whole total when there are no invitees.
    async fn insert_participants(
        &self,
        tx: &mut dyn StoreTx,
        booking: &Booking,
        invitees: &[Party],
    ) -> BookingResult<()> {
        let invitee_count = invitees.len() as u32;
        let share = money::split_share(booking.total_amount, invitee_count);
        let initiator_share = money::initiator_share(booking.total_amount, invitee_count);

        tx.insert_participant(NewParticipant {
            booking_id: booking.id,
            party: Party::Registered {
                user_id: booking.created_by,
            },
            share_amount: initiator_share,
            is_initiator: true,
            status: ParticipantStatus::Paid,
        })
        .await?;

        for party in invitees {
            tx.insert_participant(NewParticipant {
                booking_id: booking.id,
                party: party.clone(),
                share_amount: share,
                is_initiator: false,
                status: ParticipantStatus::Pending,
            })
            .await?;
        }
        Ok(())
    }

    /// The acting user's pending non-initiator share on a booking.
    async fn pending_share(
        &self,
        booking_id: BookingId,
        user_id: UserId,
    ) -> BookingResult<BookingParticipant> {
        let participants = self.store.participants(booking_id).await?;
        let participant = participants
            .into_iter()
            .find(|p| {
                !p.is_initiator
                    && matches!(&p.party, Party::Registered { user_id: uid } if *uid == user_id)
            })
            .ok_or_else(|| {
                BookingError::NotFound(format!("no share for user {user_id} on booking {booking_id}"))
            })?;
        if participant.status != ParticipantStatus::Pending {
            return Err(BookingError::Validation(format!(
                "share for booking {booking_id} is not pending"
            )));
        }
        Ok(participant)
    }

    async fn booking_by_id(&self, id: BookingId) -> BookingResult<Booking> {
        self.store
            .booking(id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("booking {id}")))
    }
}

/// Bookings can move while they still hold their interval.
fn reschedulable(booking: &Booking) -> BookingResult<()> {
    match booking.status {
        BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::Blocked => Ok(()),
        status => Err(BookingError::Validation(format!(
            "cannot reschedule a {status} booking"
        ))),
    }
}

fn court_is_free(
    court_id: CourtId,
    blocking: &[Booking],
    range: TimeRange,
    exclude: Option<BookingId>,
) -> bool {
    blocking.iter().all(|booking| {
        Some(booking.id) == exclude
            || !booking.resource().clashes_with(&Resource::Court(court_id))
            || !booking.range().overlaps(&range)
    })
}
