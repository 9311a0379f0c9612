//! Cancellation tests: policy-driven refunds, the cutoff window, owner
//! overrides, split-refund distribution and the expiry sweep.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};

use courtbook::booking::{
    Booking, BookingError, BookingParticipant, BookingStatus, ParticipantStatus, Party,
    PaymentStatus, TimeRange,
};
use courtbook::cancellation::CancellationManager;
use courtbook::catalog::{CancellationPolicy, Court, Venue};
use courtbook::checkout::{CheckoutManager, CheckoutOutcome, CheckoutRequest};
use courtbook::directory::StaticDirectory;
use courtbook::money::Money;
use courtbook::notify::LogNotifier;
use courtbook::payment::MockPaymentProvider;
use courtbook::pricing::PricingEngine;
use courtbook::settings::BookingSettings;
use courtbook::store::{MemoryStore, NewBooking, NewParticipant, Store};
use courtbook::wallet::{EntryCategory, EntryDirection, WalletManager};

const OWNER: i64 = 1;
const ALICE: i64 = 2;
const BOB: i64 = 3;
const PADEL: i64 = 7;

struct Engine {
    store: Arc<MemoryStore>,
    wallet: WalletManager,
    checkout: CheckoutManager,
    cancellation: CancellationManager,
    venue: Venue,
    court: Court,
}

/// Helper to wire the stack around a round-the-clock venue at 4000
/// minor units per hour with a 50% refund policy inside 24 hours.
async fn setup() -> Engine {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn Store> = store.clone();
    let wallet = WalletManager::new(Arc::clone(&dyn_store));
    let settings = BookingSettings::default();
    let checkout = CheckoutManager::new(
        Arc::clone(&dyn_store),
        wallet.clone(),
        PricingEngine::new(Arc::clone(&dyn_store)),
        Arc::new(MockPaymentProvider::new()),
        Arc::new(StaticDirectory::new().with_user("bob@example.com", BOB)),
        Arc::new(LogNotifier),
        settings.clone(),
    )
    .expect("Default settings should validate");
    let cancellation = CancellationManager::new(Arc::clone(&dyn_store), wallet.clone(), settings)
        .expect("Default settings should validate");

    let venue = store.add_venue("Riverside Padel", OWNER, 4_000, 0, 24).await;
    let court = store.add_court(venue.id, "Court 1", &[PADEL]).await;
    store
        .set_policy(
            venue.id,
            CancellationPolicy {
                refund_pct: 50,
                cutoff_hours: 24,
            },
        )
        .await;

    Engine {
        store,
        wallet,
        checkout,
        cancellation,
        venue,
        court,
    }
}

/// Helper to build an on-the-hour start time.
fn at_hour(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).expect("Should be a valid time of day")
}

/// Helper to pick a date far enough out that every slot is in the future.
fn far_date() -> NaiveDate {
    (Utc::now() + Duration::days(30)).date_naive()
}

/// Helper to settle a one hour wallet booking roughly `hours_ahead`
/// hours out. The start is truncated to the hour, which is why the
/// venue operates around the clock.
async fn book_ahead_at(
    engine: &Engine,
    user_id: i64,
    venue_id: i64,
    hours_ahead: i64,
    invitee_emails: &[&str],
) -> Booking {
    engine
        .wallet
        .credit(user_id, 4_000, "top-up")
        .await
        .expect("Should credit the wallet");
    let start_dt = Utc::now() + Duration::hours(hours_ahead);
    let request = CheckoutRequest {
        user_id,
        venue_id,
        sport_id: PADEL,
        date: start_dt.date_naive(),
        start: at_hour(start_dt.hour()),
        duration_hours: 1,
        invitee_emails: invitee_emails.iter().map(|email| email.to_string()).collect(),
        use_wallet_points: true,
    };
    match engine
        .checkout
        .start_checkout(request)
        .await
        .expect("Should settle the booking")
    {
        CheckoutOutcome::Confirmed { booking } => booking,
        other => panic!("Expected a confirmed booking, got {other:?}"),
    }
}

/// Helper for the common case on the main venue.
async fn book_ahead(engine: &Engine, user_id: i64, hours_ahead: i64) -> Booking {
    book_ahead_at(engine, user_id, engine.venue.id, hours_ahead, &[]).await
}

/// Helper to insert a booking row directly, bypassing checkout. Seeded
/// rows move no money, so owner-side refunds need an explicit top-up.
async fn seed_booking(
    engine: &Engine,
    user_id: i64,
    starts_at: DateTime<Utc>,
    status: BookingStatus,
    total: Money,
) -> Booking {
    let mut tx = engine
        .store
        .begin()
        .await
        .expect("Should open a transaction");
    let booking = tx
        .insert_booking(NewBooking {
            venue_id: engine.venue.id,
            court_id: Some(engine.court.id),
            sport_id: Some(PADEL),
            created_by: user_id,
            range: TimeRange::new(starts_at, starts_at + Duration::hours(1)),
            total_amount: total,
            points_used: total,
            paid_amount: 0,
            status,
            policy: CancellationPolicy {
                refund_pct: 50,
                cutoff_hours: 24,
            },
        })
        .await
        .expect("Should insert the booking");
    if status != BookingStatus::Blocked {
        tx.insert_participant(NewParticipant {
            booking_id: booking.id,
            party: Party::Registered { user_id },
            share_amount: total,
            is_initiator: true,
            status: ParticipantStatus::Paid,
        })
        .await
        .expect("Should insert the participant");
    }
    tx.commit().await.expect("Should commit the seed");
    booking
}

/// Helper to re-read a booking's status.
async fn status_of(engine: &Engine, booking_id: i64) -> BookingStatus {
    engine
        .store
        .booking(booking_id)
        .await
        .expect("Should read the booking")
        .expect("Booking should exist")
        .status
}

/// Helper to find a user's participant row.
fn row_for(rows: &[BookingParticipant], user_id: i64) -> &BookingParticipant {
    rows.iter()
        .find(|row| row.party.user_id() == Some(user_id))
        .expect("Participant row should exist")
}

#[tokio::test]
async fn test_partial_refund_inside_cutoff() {
    let engine = setup().await;
    let booking = book_ahead(&engine, ALICE, 10).await;

    let refund = engine
        .cancellation
        .cancel(booking.id, ALICE)
        .await
        .expect("Should cancel the booking");
    assert_eq!(refund, 2_000, "50% of 4000 inside the cutoff");

    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 2_000);
    assert_eq!(engine.wallet.balance(OWNER).await.unwrap(), 2_000);

    let cancelled = engine.store.booking(booking.id).await.unwrap().unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());

    let participants = engine.store.participants(booking.id).await.unwrap();
    assert_eq!(participants[0].status, ParticipantStatus::Refunded);
    let payments = engine.store.payments(booking.id).await.unwrap();
    assert_eq!(payments[0].status, PaymentStatus::Refunded);

    let entry = &engine.wallet.history(ALICE, 1).await.unwrap()[0];
    assert_eq!(entry.category, EntryCategory::Refund);
    assert_eq!(entry.direction, EntryDirection::Credit);
    assert_eq!(entry.amount, 2_000);
    assert_eq!(entry.balance_after, 2_000);
    assert_eq!(entry.booking_id, Some(booking.id));

    let entry = &engine.wallet.history(OWNER, 1).await.unwrap()[0];
    assert_eq!(entry.category, EntryCategory::RefundDeduction);
    assert_eq!(entry.direction, EntryDirection::Debit);
    assert_eq!(entry.amount, -2_000);
}

#[tokio::test]
async fn test_full_refund_outside_cutoff() {
    let engine = setup().await;
    let booking = book_ahead(&engine, ALICE, 30).await;

    let refund = engine
        .cancellation
        .cancel(booking.id, ALICE)
        .await
        .expect("Should cancel the booking");
    assert_eq!(refund, 4_000, "More than 24h out refunds in full");
    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 4_000);
    assert_eq!(engine.wallet.balance(OWNER).await.unwrap(), 0);
}

#[tokio::test]
async fn test_owner_cancellation_always_refunds_fully() {
    let engine = setup().await;
    let booking = book_ahead(&engine, ALICE, 10).await;

    // Inside the cutoff, but the owner eats the full refund.
    let refund = engine
        .cancellation
        .cancel(booking.id, OWNER)
        .await
        .expect("The owner should cancel the booking");
    assert_eq!(refund, 4_000);
    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 4_000);
    assert_eq!(engine.wallet.balance(OWNER).await.unwrap(), 0);
}

#[tokio::test]
async fn test_player_cannot_cancel_after_start() {
    let engine = setup().await;
    let booking = seed_booking(
        &engine,
        ALICE,
        Utc::now() - Duration::hours(2),
        BookingStatus::Confirmed,
        4_000,
    )
    .await;

    let err = engine
        .cancellation
        .cancel(booking.id, ALICE)
        .await
        .expect_err("Players cannot cancel after the start");
    match err {
        BookingError::TooLateToCancel { minutes_late } => {
            assert!(minutes_late >= 120, "Started two hours ago, got {minutes_late}");
        }
        other => panic!("Expected TooLateToCancel, got {other:?}"),
    }
    assert_eq!(status_of(&engine, booking.id).await, BookingStatus::Confirmed);
    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 0);
}

#[tokio::test]
async fn test_owner_can_cancel_after_start() {
    let engine = setup().await;
    let booking = seed_booking(
        &engine,
        ALICE,
        Utc::now() - Duration::hours(2),
        BookingStatus::Confirmed,
        4_000,
    )
    .await;
    // Seeded bookings never paid the owner, so fund the clawback.
    engine
        .wallet
        .credit(OWNER, 4_000, "top-up")
        .await
        .expect("Should credit the wallet");

    let refund = engine
        .cancellation
        .cancel(booking.id, OWNER)
        .await
        .expect("The owner may cancel after the start");
    assert_eq!(refund, 4_000);
    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 4_000);
    assert_eq!(engine.wallet.balance(OWNER).await.unwrap(), 0);
    assert_eq!(status_of(&engine, booking.id).await, BookingStatus::Cancelled);
}

#[tokio::test]
async fn test_cancel_twice_is_rejected() {
    let engine = setup().await;
    let booking = book_ahead(&engine, ALICE, 30).await;
    engine
        .cancellation
        .cancel(booking.id, ALICE)
        .await
        .expect("Should cancel the booking");

    let err = engine
        .cancellation
        .cancel(booking.id, ALICE)
        .await
        .expect_err("A cancelled booking stays cancelled");
    match err {
        BookingError::AlreadyCancelled(id) => assert_eq!(id, booking.id),
        other => panic!("Expected AlreadyCancelled, got {other:?}"),
    }
    // No double refund.
    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 4_000);
}

#[tokio::test]
async fn test_cancel_requires_creator_or_owner() {
    let engine = setup().await;
    let booking = book_ahead(&engine, ALICE, 10).await;

    let err = engine
        .cancellation
        .cancel(booking.id, BOB)
        .await
        .expect_err("A third party may not cancel");
    assert!(matches!(err, BookingError::Unauthorized));
    assert_eq!(status_of(&engine, booking.id).await, BookingStatus::Confirmed);
}

#[tokio::test]
async fn test_completed_booking_cannot_be_cancelled() {
    let engine = setup().await;
    let booking = seed_booking(
        &engine,
        ALICE,
        Utc::now() - Duration::hours(3),
        BookingStatus::Confirmed,
        4_000,
    )
    .await;

    let flipped = engine
        .cancellation
        .complete_expired()
        .await
        .expect("Should sweep expired bookings");
    assert_eq!(flipped, 1);
    assert_eq!(status_of(&engine, booking.id).await, BookingStatus::Completed);

    let err = engine
        .cancellation
        .cancel(booking.id, OWNER)
        .await
        .expect_err("Completed bookings are final");
    assert!(matches!(err, BookingError::Validation(_)));

    // The sweep is idempotent.
    let flipped = engine.cancellation.complete_expired().await.unwrap();
    assert_eq!(flipped, 0);
}

#[tokio::test]
async fn test_complete_expired_flips_only_past_confirmed() {
    let engine = setup().await;
    let past = seed_booking(
        &engine,
        ALICE,
        Utc::now() - Duration::hours(3),
        BookingStatus::Confirmed,
        4_000,
    )
    .await;
    let hold = seed_booking(
        &engine,
        OWNER,
        Utc::now() - Duration::hours(6),
        BookingStatus::Blocked,
        0,
    )
    .await;
    let future = book_ahead(&engine, ALICE, 30).await;

    let flipped = engine
        .cancellation
        .complete_expired()
        .await
        .expect("Should sweep expired bookings");
    assert_eq!(flipped, 1);
    assert_eq!(status_of(&engine, past.id).await, BookingStatus::Completed);
    assert_eq!(status_of(&engine, hold.id).await, BookingStatus::Blocked);
    assert_eq!(status_of(&engine, future.id).await, BookingStatus::Confirmed);
}

#[tokio::test]
async fn test_zero_refund_policy_keeps_the_money() {
    let engine = setup().await;
    let strict = engine
        .store
        .add_venue("No Refund Hall", OWNER, 4_000, 0, 24)
        .await;
    engine.store.add_court(strict.id, "Court A", &[PADEL]).await;
    engine
        .store
        .set_policy(
            strict.id,
            CancellationPolicy {
                refund_pct: 0,
                cutoff_hours: 24,
            },
        )
        .await;
    let booking = book_ahead_at(&engine, ALICE, strict.id, 10, &[]).await;

    let refund = engine
        .cancellation
        .cancel(booking.id, ALICE)
        .await
        .expect("Should cancel the booking");
    assert_eq!(refund, 0);
    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 0);
    assert_eq!(engine.wallet.balance(OWNER).await.unwrap(), 4_000);
    assert_eq!(status_of(&engine, booking.id).await, BookingStatus::Cancelled);

    let participants = engine.store.participants(booking.id).await.unwrap();
    assert_eq!(participants[0].status, ParticipantStatus::Cancelled);
    // Nothing flowed back, so the payment stays settled.
    let payments = engine.store.payments(booking.id).await.unwrap();
    assert_eq!(payments[0].status, PaymentStatus::Succeeded);
}

#[tokio::test]
async fn test_cancelling_hold_frees_the_interval() {
    let engine = setup().await;
    let hold = engine
        .checkout
        .block_slot(OWNER, engine.venue.id, None, far_date(), at_hour(10), 2)
        .await
        .expect("Should place the hold");

    let refund = engine
        .cancellation
        .cancel(hold.id, OWNER)
        .await
        .expect("Should release the hold");
    assert_eq!(refund, 0);
    assert_eq!(status_of(&engine, hold.id).await, BookingStatus::Cancelled);

    // The interval is bookable again.
    engine
        .wallet
        .credit(ALICE, 4_000, "top-up")
        .await
        .expect("Should credit the wallet");
    let request = CheckoutRequest {
        user_id: ALICE,
        venue_id: engine.venue.id,
        sport_id: PADEL,
        date: far_date(),
        start: at_hour(10),
        duration_hours: 1,
        invitee_emails: vec![],
        use_wallet_points: true,
    };
    engine
        .checkout
        .start_checkout(request)
        .await
        .expect("The freed slot should be bookable");
}

#[tokio::test]
async fn test_split_cancellation_distributes_refund() {
    let engine = setup().await;
    let booking = book_ahead_at(&engine, ALICE, engine.venue.id, 10, &["bob@example.com"]).await;
    engine
        .wallet
        .credit(BOB, 2_000, "top-up")
        .await
        .expect("Should credit the wallet");
    engine
        .checkout
        .pay_split_share(booking.id, BOB, true)
        .await
        .expect("Should settle the share");
    assert_eq!(engine.wallet.balance(BOB).await.unwrap(), 0);
    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 2_000);

    let refund = engine
        .cancellation
        .cancel(booking.id, ALICE)
        .await
        .expect("Should cancel the booking");
    assert_eq!(refund, 2_000, "50% of the 4000 total");

    // Bob gets half his share back, the creator the rest of the pool.
    assert_eq!(engine.wallet.balance(BOB).await.unwrap(), 1_000);
    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 3_000);
    assert_eq!(engine.wallet.balance(OWNER).await.unwrap(), 2_000);

    let participants = engine.store.participants(booking.id).await.unwrap();
    assert_eq!(row_for(&participants, ALICE).status, ParticipantStatus::Refunded);
    assert_eq!(row_for(&participants, BOB).status, ParticipantStatus::Refunded);
}

#[tokio::test]
async fn test_pending_share_is_cancelled_without_refund() {
    let engine = setup().await;
    let booking = book_ahead_at(&engine, ALICE, engine.venue.id, 10, &["bob@example.com"]).await;

    let refund = engine
        .cancellation
        .cancel(booking.id, ALICE)
        .await
        .expect("Should cancel the booking");
    assert_eq!(refund, 2_000);

    // The unpaid invitee is owed nothing; the creator takes the pool.
    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 2_000);
    assert_eq!(engine.wallet.balance(BOB).await.unwrap(), 0);
    assert!(engine.wallet.history(BOB, 10).await.unwrap().is_empty());

    let participants = engine.store.participants(booking.id).await.unwrap();
    assert_eq!(row_for(&participants, ALICE).status, ParticipantStatus::Refunded);
    assert_eq!(row_for(&participants, BOB).status, ParticipantStatus::Cancelled);
}

#[tokio::test]
async fn test_short_owner_wallet_fails_cancellation_atomically() {
    let engine = setup().await;
    // Seeded directly, so the owner never received the settlement.
    let booking = seed_booking(
        &engine,
        ALICE,
        Utc::now() + Duration::hours(10),
        BookingStatus::Confirmed,
        4_000,
    )
    .await;

    let err = engine
        .cancellation
        .cancel(booking.id, ALICE)
        .await
        .expect_err("The owner wallet cannot cover the clawback");
    match err {
        BookingError::InsufficientFunds {
            available,
            required,
        } => {
            assert_eq!(available, 0);
            assert_eq!(required, 2_000);
        }
        other => panic!("Expected InsufficientFunds, got {other:?}"),
    }

    // Nothing moved and nothing flipped.
    assert_eq!(status_of(&engine, booking.id).await, BookingStatus::Confirmed);
    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 0);
    assert!(engine.wallet.history(ALICE, 10).await.unwrap().is_empty());
    let participants = engine.store.participants(booking.id).await.unwrap();
    assert_eq!(participants[0].status, ParticipantStatus::Paid);
}
