//! Wallet ledger tests: validation, audit entries, history order and
//! point conservation across a full split settlement and refund.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, Utc};

use courtbook::booking::Booking;
use courtbook::cancellation::CancellationManager;
use courtbook::catalog::Venue;
use courtbook::checkout::{CheckoutManager, CheckoutOutcome, CheckoutRequest};
use courtbook::directory::StaticDirectory;
use courtbook::notify::LogNotifier;
use courtbook::payment::MockPaymentProvider;
use courtbook::pricing::PricingEngine;
use courtbook::settings::BookingSettings;
use courtbook::store::{MemoryStore, Store};
use courtbook::wallet::{EntryCategory, EntryDirection, WalletError, WalletManager};

const OWNER: i64 = 1;
const ALICE: i64 = 2;
const BOB: i64 = 3;
const CARLA: i64 = 4;
const PADEL: i64 = 7;

struct Engine {
    store: Arc<MemoryStore>,
    wallet: WalletManager,
    checkout: CheckoutManager,
    cancellation: CancellationManager,
    venue: Venue,
}

/// Helper to wire the stack and seed one single-court padel venue at
/// 3000 minor units per hour.
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
        Arc::new(
            StaticDirectory::new()
                .with_user("bob@example.com", BOB)
                .with_user("carla@example.com", CARLA),
        ),
        Arc::new(LogNotifier),
        settings.clone(),
    )
    .expect("Default settings should validate");
    let cancellation = CancellationManager::new(Arc::clone(&dyn_store), wallet.clone(), settings)
        .expect("Default settings should validate");

    let venue = store.add_venue("Riverside Padel", OWNER, 3_000, 7, 22).await;
    store.add_court(venue.id, "Court 1", &[PADEL]).await;

    Engine {
        store,
        wallet,
        checkout,
        cancellation,
        venue,
    }
}

/// Helper to pick a date far enough out that every slot is in the future.
fn booking_date() -> NaiveDate {
    (Utc::now() + Duration::days(30)).date_naive()
}

/// Helper to settle a two hour wallet booking at 10:00, split with the
/// given invitees.
async fn book_split(engine: &Engine, invitee_emails: &[&str]) -> Booking {
    let request = CheckoutRequest {
        user_id: ALICE,
        venue_id: engine.venue.id,
        sport_id: PADEL,
        date: booking_date(),
        start: NaiveTime::from_hms_opt(10, 0, 0).expect("Should be a valid time of day"),
        duration_hours: 2,
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

#[tokio::test]
async fn test_new_wallet_starts_empty() {
    let engine = setup().await;
    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 0);
    assert!(engine.wallet.history(ALICE, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_credit_validates_and_records() {
    let engine = setup().await;

    let err = engine.wallet.credit(ALICE, 0, "nothing").await.expect_err("Zero credit");
    assert!(matches!(err, WalletError::InvalidAmount(0)));
    let err = engine.wallet.credit(ALICE, -5, "negative").await.expect_err("Negative credit");
    assert!(matches!(err, WalletError::InvalidAmount(-5)));
    assert!(engine.wallet.history(ALICE, 10).await.unwrap().is_empty());

    let balance = engine
        .wallet
        .credit(ALICE, 5_000, "welcome bonus")
        .await
        .expect("Should credit the wallet");
    assert_eq!(balance, 5_000);

    let entry = &engine.wallet.history(ALICE, 1).await.unwrap()[0];
    assert_eq!(entry.user_id, ALICE);
    assert_eq!(entry.amount, 5_000);
    assert_eq!(entry.balance_after, 5_000);
    assert_eq!(entry.direction, EntryDirection::Credit);
    assert_eq!(entry.category, EntryCategory::Adjustment);
    assert_eq!(entry.booking_id, None);
    assert_eq!(entry.description.as_deref(), Some("welcome bonus"));
}

#[tokio::test]
async fn test_history_is_newest_first_with_limit() {
    let engine = setup().await;
    for amount in [100, 200, 300] {
        engine
            .wallet
            .credit(ALICE, amount, "top-up")
            .await
            .expect("Should credit the wallet");
    }

    let recent = engine.wallet.history(ALICE, 2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].amount, 300);
    assert_eq!(recent[1].amount, 200);

    assert_eq!(engine.wallet.history(ALICE, 10).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_checkout_settlement_audit_trail() {
    let engine = setup().await;
    engine
        .wallet
        .credit(ALICE, 10_000, "top-up")
        .await
        .expect("Should credit the wallet");
    let booking = book_split(&engine, &[]).await;

    let entry = &engine.wallet.history(ALICE, 1).await.unwrap()[0];
    assert_eq!(entry.amount, -6_000);
    assert_eq!(entry.balance_after, 4_000);
    assert_eq!(entry.direction, EntryDirection::Debit);
    assert_eq!(entry.category, EntryCategory::BookingPayment);
    assert_eq!(entry.booking_id, Some(booking.id));

    let entry = &engine.wallet.history(OWNER, 1).await.unwrap()[0];
    assert_eq!(entry.amount, 6_000);
    assert_eq!(entry.balance_after, 6_000);
    assert_eq!(entry.direction, EntryDirection::Credit);
    assert_eq!(entry.category, EntryCategory::BookingRevenue);
    assert_eq!(entry.booking_id, Some(booking.id));
}

#[tokio::test]
async fn test_adjust_rejects_overdraft_inside_the_transaction() {
    let engine = setup().await;
    let mut tx = engine
        .store
        .begin()
        .await
        .expect("Should open a transaction");

    let err = engine
        .wallet
        .adjust(tx.as_mut(), ALICE, -500, EntryCategory::Adjustment, "manual", None)
        .await
        .expect_err("An empty wallet cannot be debited");
    match err {
        WalletError::InsufficientBalance {
            available,
            required,
        } => {
            assert_eq!(available, 0);
            assert_eq!(required, 500);
        }
        other => panic!("Expected InsufficientBalance, got {other:?}"),
    }
    tx.rollback().await.expect("Should roll back");

    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 0);
    assert!(engine.wallet.history(ALICE, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_split_settlement_conserves_points() {
    let engine = setup().await;
    // 10000 points enter the system and must survive every transfer.
    engine.wallet.credit(ALICE, 6_000, "top-up").await.unwrap();
    engine.wallet.credit(BOB, 2_000, "top-up").await.unwrap();
    engine.wallet.credit(CARLA, 2_000, "top-up").await.unwrap();

    let booking = book_split(&engine, &["bob@example.com", "carla@example.com"]).await;
    for user in [BOB, CARLA] {
        engine
            .checkout
            .pay_split_share(booking.id, user, true)
            .await
            .expect("Should settle the share");
    }

    let balances = [
        engine.wallet.balance(ALICE).await.unwrap(),
        engine.wallet.balance(BOB).await.unwrap(),
        engine.wallet.balance(CARLA).await.unwrap(),
        engine.wallet.balance(OWNER).await.unwrap(),
    ];
    assert_eq!(balances, [4_000, 0, 0, 6_000]);
    assert_eq!(balances.iter().sum::<i64>(), 10_000);

    // A full refund thirty days out moves everything back.
    engine
        .cancellation
        .cancel(booking.id, ALICE)
        .await
        .expect("Should cancel the booking");
    let balances = [
        engine.wallet.balance(ALICE).await.unwrap(),
        engine.wallet.balance(BOB).await.unwrap(),
        engine.wallet.balance(CARLA).await.unwrap(),
        engine.wallet.balance(OWNER).await.unwrap(),
    ];
    assert_eq!(balances, [6_000, 2_000, 2_000, 0]);
    assert_eq!(balances.iter().sum::<i64>(), 10_000);
}

#[tokio::test]
async fn test_share_amount_splits_evenly() {
    let engine = setup().await;
    assert_eq!(engine.wallet.share_amount(6_000, 2), 2_000);
    assert_eq!(engine.wallet.share_amount(100, 2), 33);
    assert_eq!(engine.wallet.share_amount(5_000, 0), 5_000);
}
