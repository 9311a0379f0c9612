//! In-memory store backend.
//!
//! The whole state sits behind one mutex; `begin` takes the owned guard
//! and works on a copy, `commit` writes the copy back, dropping the
//! transaction discards it. Transactions are therefore strictly
//! serialized, which is stronger than the serializable isolation the
//! contract asks for. Backs the test suites and embedded use, and
//! carries seed helpers for the catalog rows the engine itself never
//! creates.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    NewBooking, NewParticipant, NewPayment, NewWalletEntry, Store, StoreError, StoreResult,
    StoreTx,
};
use crate::booking::models::{
    Booking, BookingId, BookingParticipant, BookingStatus, ParticipantId, ParticipantStatus,
    Party, Payment, PaymentId, PaymentStatus,
};
use crate::booking::{Resource, TimeRange};
use crate::catalog::{
    CancellationPolicy, Court, CourtId, PricingRule, RuleId, SportId, UserId, Venue, VenueId,
};
use crate::money::Money;
use crate::wallet::models::{Wallet, WalletTransaction};

#[derive(Debug, Clone, Default)]
struct MemState {
    venues: HashMap<VenueId, Venue>,
    courts: Vec<Court>,
    rules: Vec<PricingRule>,
    policies: HashMap<VenueId, CancellationPolicy>,
    bookings: HashMap<BookingId, Booking>,
    participants: HashMap<ParticipantId, BookingParticipant>,
    payments: HashMap<PaymentId, Payment>,
    wallets: HashMap<UserId, Wallet>,
    entries: Vec<WalletTransaction>,
    next_venue_id: i64,
    next_court_id: i64,
    next_rule_id: i64,
    next_booking_id: i64,
    next_participant_id: i64,
    next_payment_id: i64,
    next_entry_id: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl MemState {
    fn find_blocking(
        &self,
        venue_id: VenueId,
        resource: Resource,
        range: TimeRange,
        exclude: Option<BookingId>,
    ) -> Vec<Booking> {
        let mut hits: Vec<Booking> = self
            .bookings
            .values()
            .filter(|b| b.venue_id == venue_id && b.status.blocks_interval())
            .filter(|b| exclude != Some(b.id))
            .filter(|b| b.resource().clashes_with(&resource))
            .filter(|b| b.range().overlaps(&range))
            .cloned()
            .collect();
        hits.sort_by_key(|b| b.id);
        hits
    }

    fn participants_of(&self, booking_id: BookingId) -> Vec<BookingParticipant> {
        let mut rows: Vec<BookingParticipant> = self
            .participants
            .values()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.id);
        rows
    }
}

/// Store backend keeping everything in process memory.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemState::default())),
        }
    }

    /// Seed a venue.
    pub async fn add_venue(
        &self,
        name: &str,
        owner_id: UserId,
        base_price_per_hour: Money,
        open_hour: i32,
        close_hour: i32,
    ) -> Venue {
        let mut state = self.state.lock().await;
        let venue = Venue {
            id: next(&mut state.next_venue_id),
            name: name.to_string(),
            owner_id,
            base_price_per_hour,
            open_hour,
            close_hour,
            created_at: Utc::now(),
        };
        state.venues.insert(venue.id, venue.clone());
        venue
    }

    /// Seed a court with its supported sports.
    pub async fn add_court(&self, venue_id: VenueId, name: &str, sport_ids: &[SportId]) -> Court {
        let mut state = self.state.lock().await;
        let court = Court {
            id: next(&mut state.next_court_id),
            venue_id,
            name: name.to_string(),
            sport_ids: sport_ids.to_vec(),
        };
        state.courts.push(court.clone());
        court
    }

    /// Seed a pricing rule.
    pub async fn add_pricing_rule(
        &self,
        venue_id: VenueId,
        name: &str,
        start_hour: i32,
        end_hour: i32,
        days: &[Weekday],
        multiplier_bps: i32,
    ) -> PricingRule {
        let mut state = self.state.lock().await;
        let rule = PricingRule {
            id: next(&mut state.next_rule_id),
            venue_id,
            name: name.to_string(),
            start_hour,
            end_hour,
            days: days.to_vec(),
            multiplier_bps,
            active: true,
        };
        state.rules.push(rule.clone());
        rule
    }

    /// Seed or replace a venue's cancellation policy.
    pub async fn set_policy(&self, venue_id: VenueId, policy: CancellationPolicy) {
        let mut state = self.state.lock().await;
        state.policies.insert(venue_id, policy);
    }

    /// Deactivate a pricing rule (seed-side edit for tests).
    pub async fn deactivate_rule(&self, rule_id: RuleId) {
        let mut state = self.state.lock().await;
        if let Some(rule) = state.rules.iter_mut().find(|r| r.id == rule_id) {
            rule.active = false;
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemTx { working, guard }))
    }

    async fn venue(&self, id: VenueId) -> StoreResult<Option<Venue>> {
        Ok(self.state.lock().await.venues.get(&id).cloned())
    }

    async fn courts(&self, venue_id: VenueId) -> StoreResult<Vec<Court>> {
        let state = self.state.lock().await;
        let mut courts: Vec<Court> = state
            .courts
            .iter()
            .filter(|c| c.venue_id == venue_id)
            .cloned()
            .collect();
        courts.sort_by_key(|c| c.id);
        Ok(courts)
    }

    async fn pricing_rules(&self, venue_id: VenueId) -> StoreResult<Vec<PricingRule>> {
        let state = self.state.lock().await;
        Ok(state
            .rules
            .iter()
            .filter(|r| r.venue_id == venue_id)
            .cloned()
            .collect())
    }

    async fn cancellation_policy(
        &self,
        venue_id: VenueId,
    ) -> StoreResult<Option<CancellationPolicy>> {
        Ok(self.state.lock().await.policies.get(&venue_id).copied())
    }

    async fn bookings_in_range(
        &self,
        venue_id: VenueId,
        range: TimeRange,
    ) -> StoreResult<Vec<Booking>> {
        let state = self.state.lock().await;
        let mut hits: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.venue_id == venue_id && b.status.blocks_interval())
            .filter(|b| b.range().overlaps(&range))
            .cloned()
            .collect();
        hits.sort_by_key(|b| b.id);
        Ok(hits)
    }

    async fn booking(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        Ok(self.state.lock().await.bookings.get(&id).cloned())
    }

    async fn participants(&self, booking_id: BookingId) -> StoreResult<Vec<BookingParticipant>> {
        Ok(self.state.lock().await.participants_of(booking_id))
    }

    async fn payments(&self, booking_id: BookingId) -> StoreResult<Vec<Payment>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.id);
        Ok(rows)
    }

    async fn payment_by_provider_ref(&self, provider_ref: &str) -> StoreResult<Option<Payment>> {
        let state = self.state.lock().await;
        Ok(state
            .payments
            .values()
            .find(|p| p.provider_ref == provider_ref)
            .cloned())
    }

    async fn wallet_balance(&self, user_id: UserId) -> StoreResult<Money> {
        let state = self.state.lock().await;
        Ok(state.wallets.get(&user_id).map(|w| w.balance).unwrap_or(0))
    }

    async fn wallet_entries(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> StoreResult<Vec<WalletTransaction>> {
        let state = self.state.lock().await;
        let mut rows: Vec<WalletTransaction> = state
            .entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|e| std::cmp::Reverse(e.id));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn complete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        let mut updated = 0;
        for booking in state.bookings.values_mut() {
            if booking.status == BookingStatus::Confirmed && booking.ends_at <= now {
                booking.status = BookingStatus::Completed;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

/// One serialized transaction over a working copy of the state.
pub struct MemTx {
    working: MemState,
    guard: OwnedMutexGuard<MemState>,
}

#[async_trait]
impl StoreTx for MemTx {
    async fn lock_resource(&mut self, _venue_id: VenueId, _date: NaiveDate) -> StoreResult<()> {
        // Whole-store serialization already admits one writer at a time.
        Ok(())
    }

    async fn find_blocking(
        &mut self,
        venue_id: VenueId,
        resource: Resource,
        range: TimeRange,
        exclude: Option<BookingId>,
    ) -> StoreResult<Vec<Booking>> {
        Ok(self.working.find_blocking(venue_id, resource, range, exclude))
    }

    async fn insert_booking(&mut self, booking: NewBooking) -> StoreResult<Booking> {
        let id = next(&mut self.working.next_booking_id);
        let row = Booking {
            id,
            venue_id: booking.venue_id,
            court_id: booking.court_id,
            sport_id: booking.sport_id,
            created_by: booking.created_by,
            starts_at: booking.range.starts_at,
            ends_at: booking.range.ends_at,
            total_amount: booking.total_amount,
            points_used: booking.points_used,
            paid_amount: booking.paid_amount,
            status: booking.status,
            refund_pct: booking.policy.refund_pct,
            cutoff_hours: booking.policy.cutoff_hours,
            cancelled_at: None,
            created_at: Utc::now(),
        };
        self.working.bookings.insert(id, row.clone());
        Ok(row)
    }

    async fn update_booking_status(
        &mut self,
        id: BookingId,
        next: BookingStatus,
        cancelled_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let booking = self
            .working
            .bookings
            .get_mut(&id)
            .ok_or_else(|| StoreError::RowNotFound(format!("booking {id}")))?;
        if !booking.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                entity: "booking",
                from: booking.status.to_string(),
                to: next.to_string(),
            });
        }
        booking.status = next;
        if cancelled_at.is_some() {
            booking.cancelled_at = cancelled_at;
        }
        Ok(())
    }

    async fn update_booking_interval(
        &mut self,
        id: BookingId,
        court_id: Option<CourtId>,
        range: TimeRange,
    ) -> StoreResult<()> {
        let booking = self
            .working
            .bookings
            .get_mut(&id)
            .ok_or_else(|| StoreError::RowNotFound(format!("booking {id}")))?;
        booking.court_id = court_id;
        booking.starts_at = range.starts_at;
        booking.ends_at = range.ends_at;
        Ok(())
    }

    async fn get_booking_for_update(&mut self, id: BookingId) -> StoreResult<Option<Booking>> {
        Ok(self.working.bookings.get(&id).cloned())
    }

    async fn participants(
        &mut self,
        booking_id: BookingId,
    ) -> StoreResult<Vec<BookingParticipant>> {
        Ok(self.working.participants_of(booking_id))
    }

    async fn insert_participant(
        &mut self,
        participant: NewParticipant,
    ) -> StoreResult<BookingParticipant> {
        let id = next(&mut self.working.next_participant_id);
        let row = BookingParticipant {
            id,
            booking_id: participant.booking_id,
            party: participant.party,
            share_amount: participant.share_amount,
            is_initiator: participant.is_initiator,
            status: participant.status,
            created_at: Utc::now(),
        };
        self.working.participants.insert(id, row.clone());
        Ok(row)
    }

    async fn update_participant_status(
        &mut self,
        id: ParticipantId,
        next: ParticipantStatus,
    ) -> StoreResult<()> {
        let participant = self
            .working
            .participants
            .get_mut(&id)
            .ok_or_else(|| StoreError::RowNotFound(format!("participant {id}")))?;
        if !participant.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                entity: "participant",
                from: participant.status.to_string(),
                to: next.to_string(),
            });
        }
        participant.status = next;
        Ok(())
    }

    async fn claim_participant(
        &mut self,
        invite_token: &str,
        user_id: UserId,
    ) -> StoreResult<Option<BookingParticipant>> {
        let row = self.working.participants.values_mut().find(|p| {
            matches!(&p.party, Party::Guest { invite_token: t, .. } if t == invite_token)
        });
        match row {
            Some(participant) => {
                participant.party = Party::Registered { user_id };
                Ok(Some(participant.clone()))
            }
            None => Ok(None),
        }
    }

    async fn insert_payment(&mut self, payment: NewPayment) -> StoreResult<Payment> {
        if self
            .working
            .payments
            .values()
            .any(|p| p.provider_ref == payment.provider_ref)
        {
            return Err(StoreError::Conflict(format!(
                "payment provider_ref {} already exists",
                payment.provider_ref
            )));
        }
        let id = next(&mut self.working.next_payment_id);
        let row = Payment {
            id,
            booking_id: payment.booking_id,
            amount: payment.amount,
            points_used: payment.points_used,
            status: payment.status,
            provider_ref: payment.provider_ref,
            created_at: Utc::now(),
        };
        self.working.payments.insert(id, row.clone());
        Ok(row)
    }

    async fn refund_payments(&mut self, booking_id: BookingId) -> StoreResult<()> {
        for payment in self.working.payments.values_mut() {
            if payment.booking_id == booking_id && payment.status == PaymentStatus::Succeeded {
                payment.status = PaymentStatus::Refunded;
            }
        }
        Ok(())
    }

    async fn payment_by_provider_ref(
        &mut self,
        provider_ref: &str,
    ) -> StoreResult<Option<Payment>> {
        Ok(self
            .working
            .payments
            .values()
            .find(|p| p.provider_ref == provider_ref)
            .cloned())
    }

    async fn wallet_for_update(&mut self, user_id: UserId) -> StoreResult<Money> {
        let now = Utc::now();
        let wallet = self.working.wallets.entry(user_id).or_insert_with(|| Wallet {
            user_id,
            balance: 0,
            created_at: now,
            updated_at: now,
        });
        Ok(wallet.balance)
    }

    async fn set_wallet_balance(&mut self, user_id: UserId, balance: Money) -> StoreResult<()> {
        let wallet = self
            .working
            .wallets
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::RowNotFound(format!("wallet for user {user_id}")))?;
        wallet.balance = balance;
        wallet.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_wallet_entry(
        &mut self,
        entry: NewWalletEntry,
    ) -> StoreResult<WalletTransaction> {
        let id = next(&mut self.working.next_entry_id);
        let row = WalletTransaction {
            id,
            user_id: entry.user_id,
            booking_id: entry.booking_id,
            amount: entry.amount,
            balance_after: entry.balance_after,
            direction: entry.direction,
            category: entry.category,
            description: entry.description,
            created_at: Utc::now(),
        };
        self.working.entries.push(row.clone());
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemTx { working, mut guard } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
