//! Postgres store backend.
//!
//! Runtime sqlx queries with manual row mapping. Admission serializes on
//! a per-venue-per-day advisory transaction lock; wallet and booking
//! rows are locked `FOR UPDATE` inside mutating transactions; the unique
//! `provider_ref` column backs confirmation idempotency.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc, Weekday};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use super::{
    NewBooking, NewParticipant, NewPayment, NewWalletEntry, Store, StoreError, StoreResult,
    StoreTx, schema,
};
use crate::booking::models::{
    Booking, BookingId, BookingParticipant, BookingStatus, ParticipantId, ParticipantStatus,
    Party, Payment, PaymentStatus,
};
use crate::booking::{Resource, TimeRange};
use crate::catalog::{
    CancellationPolicy, Court, CourtId, PricingRule, UserId, Venue, VenueId,
};
use crate::money::Money;
use crate::wallet::models::{EntryCategory, EntryDirection, WalletTransaction};

/// Store backend over a Postgres pool.
#[derive(Clone)]
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Apply the schema DDL. Every statement is idempotent, so this is
    /// safe to run at startup and in integration test setup.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for ddl in schema::ALL.iter().copied() {
            sqlx::raw_sql(ddl).execute(self.pool.as_ref()).await?;
        }
        Ok(())
    }
}

fn weekday_from_i16(value: i16) -> StoreResult<Weekday> {
    match value {
        0 => Ok(Weekday::Mon),
        1 => Ok(Weekday::Tue),
        2 => Ok(Weekday::Wed),
        3 => Ok(Weekday::Thu),
        4 => Ok(Weekday::Fri),
        5 => Ok(Weekday::Sat),
        6 => Ok(Weekday::Sun),
        other => Err(StoreError::BadRow(format!("weekday {other}"))),
    }
}

fn venue_from_row(row: &PgRow) -> Venue {
    Venue {
        id: row.get("id"),
        name: row.get("name"),
        owner_id: row.get("owner_id"),
        base_price_per_hour: row.get("base_price_per_hour"),
        open_hour: row.get("open_hour"),
        close_hour: row.get("close_hour"),
        created_at: row.get::<NaiveDateTime, _>("created_at").and_utc(),
    }
}

fn rule_from_row(row: &PgRow) -> StoreResult<PricingRule> {
    let days: Vec<i16> = row.get("days");
    let days = days
        .into_iter()
        .map(weekday_from_i16)
        .collect::<StoreResult<Vec<Weekday>>>()?;
    Ok(PricingRule {
        id: row.get("id"),
        venue_id: row.get("venue_id"),
        name: row.get("name"),
        start_hour: row.get("start_hour"),
        end_hour: row.get("end_hour"),
        days,
        multiplier_bps: row.get("multiplier_bps"),
        active: row.get("active"),
    })
}

fn booking_from_row(row: &PgRow) -> StoreResult<Booking> {
    let status_str: String = row.get("status");
    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| StoreError::BadRow(format!("booking status {status_str}")))?;
    Ok(Booking {
        id: row.get("id"),
        venue_id: row.get("venue_id"),
        court_id: row.get("court_id"),
        sport_id: row.get("sport_id"),
        created_by: row.get("created_by"),
        starts_at: row.get::<NaiveDateTime, _>("starts_at").and_utc(),
        ends_at: row.get::<NaiveDateTime, _>("ends_at").and_utc(),
        total_amount: row.get("total_amount"),
        points_used: row.get("points_used"),
        paid_amount: row.get("paid_amount"),
        status,
        refund_pct: row.get("refund_pct"),
        cutoff_hours: row.get("cutoff_hours"),
        cancelled_at: row
            .get::<Option<NaiveDateTime>, _>("cancelled_at")
            .map(|dt| dt.and_utc()),
        created_at: row.get::<NaiveDateTime, _>("created_at").and_utc(),
    })
}

fn participant_from_row(row: &PgRow) -> StoreResult<BookingParticipant> {
    let id: i64 = row.get("id");
    let status_str: String = row.get("status");
    let status = ParticipantStatus::parse(&status_str)
        .ok_or_else(|| StoreError::BadRow(format!("participant status {status_str}")))?;
    let party = match row.get::<Option<i64>, _>("user_id") {
        Some(user_id) => Party::Registered { user_id },
        None => {
            let email: Option<String> = row.get("guest_email");
            let token: Option<String> = row.get("invite_token");
            match (email, token) {
                (Some(email), Some(invite_token)) => Party::Guest {
                    email,
                    invite_token,
                },
                _ => {
                    return Err(StoreError::BadRow(format!(
                        "participant {id} has neither user nor guest identity"
                    )));
                }
            }
        }
    };
    Ok(BookingParticipant {
        id,
        booking_id: row.get("booking_id"),
        party,
        share_amount: row.get("share_amount"),
        is_initiator: row.get("is_initiator"),
        status,
        created_at: row.get::<NaiveDateTime, _>("created_at").and_utc(),
    })
}

fn payment_from_row(row: &PgRow) -> StoreResult<Payment> {
    let status_str: String = row.get("status");
    let status = PaymentStatus::parse(&status_str)
        .ok_or_else(|| StoreError::BadRow(format!("payment status {status_str}")))?;
    Ok(Payment {
        id: row.get("id"),
        booking_id: row.get("booking_id"),
        amount: row.get("amount"),
        points_used: row.get("points_used"),
        status,
        provider_ref: row.get("provider_ref"),
        created_at: row.get::<NaiveDateTime, _>("created_at").and_utc(),
    })
}

fn entry_from_row(row: &PgRow) -> StoreResult<WalletTransaction> {
    let direction_str: String = row.get("direction");
    let direction = EntryDirection::parse(&direction_str)
        .ok_or_else(|| StoreError::BadRow(format!("entry direction {direction_str}")))?;
    let category_str: String = row.get("category");
    let category = EntryCategory::parse(&category_str)
        .ok_or_else(|| StoreError::BadRow(format!("entry category {category_str}")))?;
    Ok(WalletTransaction {
        id: row.get("id"),
        user_id: row.get("user_id"),
        booking_id: row.get("booking_id"),
        amount: row.get("amount"),
        balance_after: row.get("balance_after"),
        direction,
        category,
        description: row.get("description"),
        created_at: row.get::<NaiveDateTime, _>("created_at").and_utc(),
    })
}

const BOOKING_COLUMNS: &str = "id, venue_id, court_id, sport_id, created_by, starts_at, ends_at, \
     total_amount, points_used, paid_amount, status, refund_pct, cutoff_hours, \
     cancelled_at, created_at";

const PARTICIPANT_COLUMNS: &str =
    "id, booking_id, user_id, guest_email, invite_token, share_amount, is_initiator, status, \
     created_at";

const PAYMENT_COLUMNS: &str =
    "id, booking_id, amount, points_used, status, provider_ref, created_at";

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn venue(&self, id: VenueId) -> StoreResult<Option<Venue>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, owner_id, base_price_per_hour, open_hour, close_hour, created_at
            FROM venues
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.as_ref().map(venue_from_row))
    }

    async fn courts(&self, venue_id: VenueId) -> StoreResult<Vec<Court>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.venue_id, c.name,
                   COALESCE(ARRAY_AGG(cs.sport_id) FILTER (WHERE cs.sport_id IS NOT NULL), '{}')
                       AS sport_ids
            FROM courts c
            LEFT JOIN court_sports cs ON cs.court_id = c.id
            WHERE c.venue_id = $1
            GROUP BY c.id, c.venue_id, c.name
            ORDER BY c.id
            "#,
        )
        .bind(venue_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Court {
                id: row.get("id"),
                venue_id: row.get("venue_id"),
                name: row.get("name"),
                sport_ids: row.get("sport_ids"),
            })
            .collect())
    }

    async fn pricing_rules(&self, venue_id: VenueId) -> StoreResult<Vec<PricingRule>> {
        let rows = sqlx::query(
            r#"
            SELECT id, venue_id, name, start_hour, end_hour, days, multiplier_bps, active
            FROM pricing_rules
            WHERE venue_id = $1
            ORDER BY id
            "#,
        )
        .bind(venue_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(rule_from_row).collect()
    }

    async fn cancellation_policy(
        &self,
        venue_id: VenueId,
    ) -> StoreResult<Option<CancellationPolicy>> {
        let row = sqlx::query(
            r#"
            SELECT refund_pct, cutoff_hours
            FROM cancellation_policies
            WHERE venue_id = $1
            "#,
        )
        .bind(venue_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(|row| CancellationPolicy {
            refund_pct: row.get("refund_pct"),
            cutoff_hours: row.get("cutoff_hours"),
        }))
    }

    async fn bookings_in_range(
        &self,
        venue_id: VenueId,
        range: TimeRange,
    ) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE venue_id = $1
              AND status IN ('pending', 'confirmed', 'blocked')
              AND starts_at < $2 AND ends_at > $3
            ORDER BY id
            "#
        ))
        .bind(venue_id)
        .bind(range.ends_at.naive_utc())
        .bind(range.starts_at.naive_utc())
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(booking_from_row).collect()
    }

    async fn booking(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.as_ref().map(booking_from_row).transpose()
    }

    async fn participants(&self, booking_id: BookingId) -> StoreResult<Vec<BookingParticipant>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PARTICIPANT_COLUMNS}
            FROM booking_participants
            WHERE booking_id = $1
            ORDER BY id
            "#
        ))
        .bind(booking_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(participant_from_row).collect()
    }

    async fn payments(&self, booking_id: BookingId) -> StoreResult<Vec<Payment>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE booking_id = $1
            ORDER BY id
            "#
        ))
        .bind(booking_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(payment_from_row).collect()
    }

    async fn payment_by_provider_ref(&self, provider_ref: &str) -> StoreResult<Option<Payment>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE provider_ref = $1
            "#
        ))
        .bind(provider_ref)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.as_ref().map(payment_from_row).transpose()
    }

    async fn wallet_balance(&self, user_id: UserId) -> StoreResult<Money> {
        let row = sqlx::query("SELECT balance FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(row.map(|row| row.get("balance")).unwrap_or(0))
    }

    async fn wallet_entries(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> StoreResult<Vec<WalletTransaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, booking_id, amount, balance_after, direction, category,
                   description, created_at
            FROM wallet_transactions
            WHERE user_id = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn complete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'completed'
            WHERE status = 'confirmed' AND ends_at <= $1
            "#,
        )
        .bind(now.naive_utc())
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }
}

/// One Postgres transaction.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_resource(&mut self, venue_id: VenueId, date: NaiveDate) -> StoreResult<()> {
        // Advisory key (venue, day). Venue ids wider than 32 bits wrap,
        // which only coarsens the lock, never weakens it.
        sqlx::query("SELECT pg_advisory_xact_lock($1::INT, $2::INT)")
            .bind(venue_id as i32)
            .bind(date.num_days_from_ce())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn find_blocking(
        &mut self,
        venue_id: VenueId,
        resource: Resource,
        range: TimeRange,
        exclude: Option<BookingId>,
    ) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE venue_id = $1
              AND status IN ('pending', 'confirmed', 'blocked')
              AND starts_at < $2 AND ends_at > $3
              AND ($4::BIGINT IS NULL OR court_id IS NULL OR court_id = $4)
              AND ($5::BIGINT IS NULL OR id <> $5)
            ORDER BY id
            "#
        ))
        .bind(venue_id)
        .bind(range.ends_at.naive_utc())
        .bind(range.starts_at.naive_utc())
        .bind(resource.court_id())
        .bind(exclude)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(booking_from_row).collect()
    }

    async fn insert_booking(&mut self, booking: NewBooking) -> StoreResult<Booking> {
        let row = sqlx::query(
            r#"
            INSERT INTO bookings (venue_id, court_id, sport_id, created_by, starts_at, ends_at,
                                  total_amount, points_used, paid_amount, status, refund_pct,
                                  cutoff_hours)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, created_at
            "#,
        )
        .bind(booking.venue_id)
        .bind(booking.court_id)
        .bind(booking.sport_id)
        .bind(booking.created_by)
        .bind(booking.range.starts_at.naive_utc())
        .bind(booking.range.ends_at.naive_utc())
        .bind(booking.total_amount)
        .bind(booking.points_used)
        .bind(booking.paid_amount)
        .bind(booking.status.as_str())
        .bind(booking.policy.refund_pct)
        .bind(booking.policy.cutoff_hours)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(Booking {
            id: row.get("id"),
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
            created_at: row.get::<NaiveDateTime, _>("created_at").and_utc(),
        })
    }

    async fn update_booking_status(
        &mut self,
        id: BookingId,
        next: BookingStatus,
        cancelled_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let row = sqlx::query("SELECT status FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| StoreError::RowNotFound(format!("booking {id}")))?;

        let current_str: String = row.get("status");
        let current = BookingStatus::parse(&current_str)
            .ok_or_else(|| StoreError::BadRow(format!("booking status {current_str}")))?;
        if !current.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                entity: "booking",
                from: current.to_string(),
                to: next.to_string(),
            });
        }

        sqlx::query(
            "UPDATE bookings SET status = $1, cancelled_at = COALESCE($2, cancelled_at) WHERE id = $3",
        )
        .bind(next.as_str())
        .bind(cancelled_at.map(|dt| dt.naive_utc()))
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_booking_interval(
        &mut self,
        id: BookingId,
        court_id: Option<CourtId>,
        range: TimeRange,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE bookings SET court_id = $1, starts_at = $2, ends_at = $3 WHERE id = $4",
        )
        .bind(court_id)
        .bind(range.starts_at.naive_utc())
        .bind(range.ends_at.naive_utc())
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(format!("booking {id}")));
        }
        Ok(())
    }

    async fn get_booking_for_update(&mut self, id: BookingId) -> StoreResult<Option<Booking>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {BOOKING_COLUMNS}
            FROM bookings
            WHERE id = $1
            FOR UPDATE
            "#
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(booking_from_row).transpose()
    }

    async fn participants(
        &mut self,
        booking_id: BookingId,
    ) -> StoreResult<Vec<BookingParticipant>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PARTICIPANT_COLUMNS}
            FROM booking_participants
            WHERE booking_id = $1
            ORDER BY id
            "#
        ))
        .bind(booking_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(participant_from_row).collect()
    }

    async fn insert_participant(
        &mut self,
        participant: NewParticipant,
    ) -> StoreResult<BookingParticipant> {
        let (user_id, guest_email, invite_token) = match &participant.party {
            Party::Registered { user_id } => (Some(*user_id), None, None),
            Party::Guest {
                email,
                invite_token,
            } => (None, Some(email.clone()), Some(invite_token.clone())),
        };

        let row = sqlx::query(
            r#"
            INSERT INTO booking_participants (booking_id, user_id, guest_email, invite_token,
                                              share_amount, is_initiator, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, created_at
            "#,
        )
        .bind(participant.booking_id)
        .bind(user_id)
        .bind(guest_email)
        .bind(invite_token)
        .bind(participant.share_amount)
        .bind(participant.is_initiator)
        .bind(participant.status.as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(BookingParticipant {
            id: row.get("id"),
            booking_id: participant.booking_id,
            party: participant.party,
            share_amount: participant.share_amount,
            is_initiator: participant.is_initiator,
            status: participant.status,
            created_at: row.get::<NaiveDateTime, _>("created_at").and_utc(),
        })
    }

    async fn update_participant_status(
        &mut self,
        id: ParticipantId,
        next: ParticipantStatus,
    ) -> StoreResult<()> {
        let row = sqlx::query("SELECT status FROM booking_participants WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| StoreError::RowNotFound(format!("participant {id}")))?;

        let current_str: String = row.get("status");
        let current = ParticipantStatus::parse(&current_str)
            .ok_or_else(|| StoreError::BadRow(format!("participant status {current_str}")))?;
        if !current.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                entity: "participant",
                from: current.to_string(),
                to: next.to_string(),
            });
        }

        sqlx::query("UPDATE booking_participants SET status = $1 WHERE id = $2")
            .bind(next.as_str())
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn claim_participant(
        &mut self,
        invite_token: &str,
        user_id: UserId,
    ) -> StoreResult<Option<BookingParticipant>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE booking_participants
            SET user_id = $1, invite_token = NULL
            WHERE invite_token = $2 AND user_id IS NULL
            RETURNING {PARTICIPANT_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(invite_token)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(participant_from_row).transpose()
    }

    async fn insert_payment(&mut self, payment: NewPayment) -> StoreResult<Payment> {
        let provider_ref = payment.provider_ref.clone();
        let row = sqlx::query(
            r#"
            INSERT INTO payments (booking_id, amount, points_used, status, provider_ref)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, created_at
            "#,
        )
        .bind(payment.booking_id)
        .bind(payment.amount)
        .bind(payment.points_used)
        .bind(payment.status.as_str())
        .bind(&payment.provider_ref)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return StoreError::Conflict(format!(
                        "payment provider_ref {provider_ref} already exists"
                    ));
                }
            }
            StoreError::Database(e)
        })?;

        Ok(Payment {
            id: row.get("id"),
            booking_id: payment.booking_id,
            amount: payment.amount,
            points_used: payment.points_used,
            status: payment.status,
            provider_ref: payment.provider_ref,
            created_at: row.get::<NaiveDateTime, _>("created_at").and_utc(),
        })
    }

    async fn refund_payments(&mut self, booking_id: BookingId) -> StoreResult<()> {
        sqlx::query(
            "UPDATE payments SET status = 'refunded' WHERE booking_id = $1 AND status = 'succeeded'",
        )
        .bind(booking_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn payment_by_provider_ref(
        &mut self,
        provider_ref: &str,
    ) -> StoreResult<Option<Payment>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE provider_ref = $1
            "#
        ))
        .bind(provider_ref)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(payment_from_row).transpose()
    }

    async fn wallet_for_update(&mut self, user_id: UserId) -> StoreResult<Money> {
        // Lazily create, then lock. The insert is a no-op when the row
        // exists.
        sqlx::query(
            "INSERT INTO wallets (user_id, balance) VALUES ($1, 0) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;

        let row = sqlx::query("SELECT balance FROM wallets WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(row.get("balance"))
    }

    async fn set_wallet_balance(&mut self, user_id: UserId, balance: Money) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE wallets SET balance = $1, updated_at = NOW() WHERE user_id = $2")
                .bind(balance)
                .bind(user_id)
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(format!("wallet for user {user_id}")));
        }
        Ok(())
    }

    async fn insert_wallet_entry(
        &mut self,
        entry: NewWalletEntry,
    ) -> StoreResult<WalletTransaction> {
        let row = sqlx::query(
            r#"
            INSERT INTO wallet_transactions (user_id, booking_id, amount, balance_after,
                                             direction, category, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, created_at
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.booking_id)
        .bind(entry.amount)
        .bind(entry.balance_after)
        .bind(entry.direction.as_str())
        .bind(entry.category.as_str())
        .bind(&entry.description)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(WalletTransaction {
            id: row.get("id"),
            user_id: entry.user_id,
            booking_id: entry.booking_id,
            amount: entry.amount,
            balance_after: entry.balance_after,
            direction: entry.direction,
            category: entry.category,
            description: entry.description,
            created_at: row.get::<NaiveDateTime, _>("created_at").and_utc(),
        })
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
