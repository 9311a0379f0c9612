//! Split payment tests: pending shares, wallet and card share
//! settlement, guest invites, and the races a share session can lose.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveTime, Utc};
use tokio::sync::Mutex;

use courtbook::booking::{
    Booking, BookingDetails, BookingError, BookingParticipant, ParticipantStatus, Party,
};
use courtbook::cancellation::CancellationManager;
use courtbook::catalog::Venue;
use courtbook::checkout::{CheckoutManager, CheckoutOutcome, CheckoutRequest};
use courtbook::directory::StaticDirectory;
use courtbook::money::Money;
use courtbook::notify::InviteNotifier;
use courtbook::payment::MockPaymentProvider;
use courtbook::pricing::PricingEngine;
use courtbook::settings::BookingSettings;
use courtbook::store::{MemoryStore, Store};
use courtbook::wallet::{EntryCategory, WalletManager};

const OWNER: i64 = 1;
const ALICE: i64 = 2;
const BOB: i64 = 3;
const CARLA: i64 = 4;
const DANA: i64 = 5;
const PADEL: i64 = 7;

/// Notifier that records every invite so tests can read the tokens.
#[derive(Default)]
struct RecordingNotifier {
    invites: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl InviteNotifier for RecordingNotifier {
    async fn send_invite(&self, email: &str, invite_token: &str) {
        self.invites
            .lock()
            .await
            .push((email.to_string(), invite_token.to_string()));
    }
}

struct Engine {
    provider: Arc<MockPaymentProvider>,
    notifier: Arc<RecordingNotifier>,
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
    let provider = Arc::new(MockPaymentProvider::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let wallet = WalletManager::new(Arc::clone(&dyn_store));
    let settings = BookingSettings::default();
    let directory = StaticDirectory::new()
        .with_user("bob@example.com", BOB)
        .with_user("carla@example.com", CARLA);
    let checkout = CheckoutManager::new(
        Arc::clone(&dyn_store),
        wallet.clone(),
        PricingEngine::new(Arc::clone(&dyn_store)),
        provider.clone(),
        Arc::new(directory),
        notifier.clone(),
        settings.clone(),
    )
    .expect("Default settings should validate");
    let cancellation = CancellationManager::new(Arc::clone(&dyn_store), wallet.clone(), settings)
        .expect("Default settings should validate");

    let venue = store.add_venue("Riverside Padel", OWNER, 3_000, 7, 22).await;
    store.add_court(venue.id, "Court 1", &[PADEL]).await;

    Engine {
        provider,
        notifier,
        wallet,
        checkout,
        cancellation,
        venue,
    }
}

/// Helper to settle a wallet-funded two hour booking split with
/// `invitees`. Total 6000; the initiator fronts everything.
async fn split_booking(engine: &Engine, invitees: &[&str]) -> Booking {
    engine
        .wallet
        .credit(ALICE, 6_000, "top-up")
        .await
        .expect("Should credit the wallet");
    let request = CheckoutRequest {
        user_id: ALICE,
        venue_id: engine.venue.id,
        sport_id: PADEL,
        date: (Utc::now() + Duration::days(30)).date_naive(),
        start: NaiveTime::from_hms_opt(10, 0, 0).expect("Should be a valid time of day"),
        duration_hours: 2,
        invitee_emails: invitees.iter().map(|email| email.to_string()).collect(),
        use_wallet_points: true,
    };
    match engine
        .checkout
        .start_checkout(request)
        .await
        .expect("Should settle the split booking")
    {
        CheckoutOutcome::Confirmed { booking } => booking,
        other => panic!("Expected a confirmed booking, got {other:?}"),
    }
}

/// Helper to unwrap a payment-required outcome into (session_id, amount_due).
fn expect_payment_required(outcome: CheckoutOutcome) -> (String, Money) {
    match outcome {
        CheckoutOutcome::PaymentRequired {
            session_id,
            amount_due,
            ..
        } => (session_id, amount_due),
        other => panic!("Expected a payment session, got {other:?}"),
    }
}

/// Helper to find a registered invitee's share row.
fn share_of(details: &BookingDetails, user_id: i64) -> &BookingParticipant {
    details
        .participants
        .iter()
        .find(|p| !p.is_initiator && p.party.user_id() == Some(user_id))
        .expect("Should have a share row for the user")
}

#[tokio::test]
async fn test_split_checkout_creates_pending_shares() {
    let engine = setup().await;
    let booking = split_booking(&engine, &["bob@example.com", "carla@example.com"]).await;

    // The initiator paid the full 6000 up front.
    assert_eq!(booking.points_used, 6_000);
    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 0);
    assert_eq!(engine.wallet.balance(OWNER).await.unwrap(), 6_000);

    let details = engine.checkout.booking_details(booking.id).await.unwrap();
    assert_eq!(details.participants.len(), 3);

    let initiator = details
        .participants
        .iter()
        .find(|p| p.is_initiator)
        .expect("Should have an initiator row");
    assert_eq!(initiator.party.user_id(), Some(ALICE));
    assert_eq!(initiator.share_amount, 2_000);
    assert_eq!(initiator.status, ParticipantStatus::Paid);

    for user in [BOB, CARLA] {
        let share = share_of(&details, user);
        assert_eq!(share.share_amount, 2_000);
        assert_eq!(share.status, ParticipantStatus::Pending);
    }
}

#[tokio::test]
async fn test_wallet_share_pays_and_reimburses() {
    let engine = setup().await;
    let booking = split_booking(&engine, &["bob@example.com"]).await;

    // One invitee: 3000 each for initiator and invitee.
    engine
        .wallet
        .credit(BOB, 3_500, "top-up")
        .await
        .expect("Should credit the wallet");
    let outcome = engine
        .checkout
        .pay_split_share(booking.id, BOB, true)
        .await
        .expect("Should settle the share from the wallet");
    assert!(matches!(outcome, CheckoutOutcome::Confirmed { .. }));

    assert_eq!(engine.wallet.balance(BOB).await.unwrap(), 500);
    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 3_000);
    // Share payments flow to the initiator, never the owner.
    assert_eq!(engine.wallet.balance(OWNER).await.unwrap(), 6_000);

    let details = engine.checkout.booking_details(booking.id).await.unwrap();
    assert_eq!(share_of(&details, BOB).status, ParticipantStatus::Paid);

    let bob_ledger = engine.wallet.history(BOB, 5).await.unwrap();
    assert_eq!(bob_ledger[0].category, EntryCategory::BookingPayment);
    assert_eq!(bob_ledger[0].amount, -3_000);
    let alice_ledger = engine.wallet.history(ALICE, 5).await.unwrap();
    assert_eq!(alice_ledger[0].category, EntryCategory::BookingReimbursement);
    assert_eq!(alice_ledger[0].amount, 3_000);

    // A settled share cannot be paid again.
    let err = engine
        .checkout
        .pay_split_share(booking.id, BOB, true)
        .await
        .expect_err("A paid share should not settle twice");
    assert!(matches!(err, BookingError::Validation(_)));
}

#[tokio::test]
async fn test_short_wallet_or_opt_out_falls_back_to_card() {
    let engine = setup().await;
    let booking = split_booking(&engine, &["bob@example.com"]).await;

    // Shares settle whole: 2999 points against a 3000 share still
    // routes the full share to the card.
    engine
        .wallet
        .credit(BOB, 2_999, "top-up")
        .await
        .expect("Should credit the wallet");
    let outcome = engine
        .checkout
        .pay_split_share(booking.id, BOB, true)
        .await
        .expect("Should create a share session");
    let (_, amount_due) = expect_payment_required(outcome);
    assert_eq!(amount_due, 3_000);
    assert_eq!(engine.wallet.balance(BOB).await.unwrap(), 2_999);

    // Without the wallet opt-in the card is used even when the balance
    // would cover the share.
    engine
        .wallet
        .credit(BOB, 5_000, "top-up")
        .await
        .expect("Should credit the wallet");
    let outcome = engine
        .checkout
        .pay_split_share(booking.id, BOB, false)
        .await
        .expect("Should create a share session");
    let (_, amount_due) = expect_payment_required(outcome);
    assert_eq!(amount_due, 3_000);
}

#[tokio::test]
async fn test_card_share_confirms_idempotently() {
    let engine = setup().await;
    let booking = split_booking(&engine, &["bob@example.com", "carla@example.com"]).await;

    let outcome = engine
        .checkout
        .pay_split_share(booking.id, CARLA, false)
        .await
        .expect("Should create a share session");
    let (session_id, amount_due) = expect_payment_required(outcome);
    assert_eq!(amount_due, 2_000);

    let err = engine
        .checkout
        .confirm_checkout(&session_id)
        .await
        .expect_err("An unpaid share session should not confirm");
    assert!(matches!(err, BookingError::Validation(_)));

    engine.provider.mark_paid(&session_id).await;
    let settled = engine
        .checkout
        .confirm_checkout(&session_id)
        .await
        .expect("Should settle the paid share");
    assert_eq!(settled.id, booking.id);

    let details = engine.checkout.booking_details(booking.id).await.unwrap();
    assert_eq!(share_of(&details, CARLA).status, ParticipantStatus::Paid);
    // Card money stays outside the wallet; only the reimbursement moves.
    assert_eq!(engine.wallet.balance(CARLA).await.unwrap(), 0);
    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 2_000);
    // Settlement payment plus the share payment.
    assert_eq!(details.payments.len(), 2);

    engine
        .checkout
        .confirm_checkout(&session_id)
        .await
        .expect("Repeat confirmation should succeed");
    let details = engine.checkout.booking_details(booking.id).await.unwrap();
    assert_eq!(details.payments.len(), 2);
    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 2_000);
}

#[tokio::test]
async fn test_share_payment_needs_a_pending_row() {
    let engine = setup().await;
    let booking = split_booking(&engine, &["bob@example.com"]).await;

    // Not a participant.
    let err = engine
        .checkout
        .pay_split_share(booking.id, CARLA, true)
        .await
        .expect_err("A non-participant has no share");
    assert!(matches!(err, BookingError::NotFound(_)));

    // The initiator settled at checkout and has no pending share.
    let err = engine
        .checkout
        .pay_split_share(booking.id, ALICE, true)
        .await
        .expect_err("The initiator has no share to pay");
    assert!(matches!(err, BookingError::NotFound(_)));

    let err = engine
        .checkout
        .pay_split_share(999, BOB, true)
        .await
        .expect_err("An unknown booking has no share");
    assert!(matches!(err, BookingError::NotFound(_)));
}

#[tokio::test]
async fn test_guest_invite_claim_and_pay() {
    let engine = setup().await;
    let booking = split_booking(&engine, &["bob@example.com", "guest@example.com"]).await;

    let details = engine.checkout.booking_details(booking.id).await.unwrap();
    let guest = details
        .participants
        .iter()
        .find(|p| matches!(p.party, Party::Guest { .. }))
        .expect("Should have a guest row");
    assert_eq!(guest.share_amount, 2_000);
    assert_eq!(guest.status, ParticipantStatus::Pending);
    let token = match &guest.party {
        Party::Guest {
            email,
            invite_token,
        } => {
            assert_eq!(email, "guest@example.com");
            invite_token.clone()
        }
        Party::Registered { .. } => unreachable!(),
    };

    // The invite went out exactly once, carrying the row's token.
    let invites = engine.notifier.invites.lock().await.clone();
    assert_eq!(invites.len(), 1);
    assert_eq!(invites[0].0, "guest@example.com");
    assert_eq!(invites[0].1, token);

    // Unclaimed guest rows are invisible to pay_split_share.
    let err = engine
        .checkout
        .pay_split_share(booking.id, DANA, true)
        .await
        .expect_err("An unclaimed guest share should not be payable");
    assert!(matches!(err, BookingError::NotFound(_)));

    let claimed = engine
        .checkout
        .claim_invite(&token, DANA)
        .await
        .expect("Should claim the invite");
    assert_eq!(claimed.party.user_id(), Some(DANA));
    assert_eq!(claimed.status, ParticipantStatus::Pending);
    assert_eq!(claimed.share_amount, 2_000);

    let err = engine
        .checkout
        .claim_invite(&token, DANA)
        .await
        .expect_err("A token should be consumed by the first claim");
    assert!(matches!(err, BookingError::NotFound(_)));

    engine
        .wallet
        .credit(DANA, 2_000, "top-up")
        .await
        .expect("Should credit the wallet");
    engine
        .checkout
        .pay_split_share(booking.id, DANA, true)
        .await
        .expect("Should settle the claimed share");
    assert_eq!(engine.wallet.balance(DANA).await.unwrap(), 0);
    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 2_000);
}

#[tokio::test]
async fn test_share_session_loses_to_cancellation() {
    let engine = setup().await;
    let booking = split_booking(&engine, &["bob@example.com"]).await;

    let outcome = engine
        .checkout
        .pay_split_share(booking.id, BOB, false)
        .await
        .expect("Should create a share session");
    let (session_id, _) = expect_payment_required(outcome);

    // The booking is withdrawn while the payer completes checkout.
    engine
        .cancellation
        .cancel(booking.id, ALICE)
        .await
        .expect("Should cancel the booking");

    engine.provider.mark_paid(&session_id).await;
    let err = engine
        .checkout
        .confirm_checkout(&session_id)
        .await
        .expect_err("A share on a cancelled booking should not settle");
    match err {
        BookingError::SlotTakenDuringPayment { amount_paid, .. } => {
            assert_eq!(amount_paid, 3_000);
        }
        other => panic!("Expected a slot-taken error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_share_session_loses_to_wallet_settlement() {
    let engine = setup().await;
    let booking = split_booking(&engine, &["bob@example.com"]).await;

    let outcome = engine
        .checkout
        .pay_split_share(booking.id, BOB, false)
        .await
        .expect("Should create a share session");
    let (session_id, _) = expect_payment_required(outcome);

    // The same share settles from the wallet before the card clears.
    engine
        .wallet
        .credit(BOB, 3_000, "top-up")
        .await
        .expect("Should credit the wallet");
    engine
        .checkout
        .pay_split_share(booking.id, BOB, true)
        .await
        .expect("Should settle the share from the wallet");

    engine.provider.mark_paid(&session_id).await;
    let err = engine
        .checkout
        .confirm_checkout(&session_id)
        .await
        .expect_err("A settled share should not settle again by card");
    match err {
        BookingError::SlotTakenDuringPayment { amount_paid, .. } => {
            assert_eq!(amount_paid, 3_000);
        }
        other => panic!("Expected a slot-taken error, got {other:?}"),
    }

    // The initiator was reimbursed exactly once.
    assert_eq!(engine.wallet.balance(ALICE).await.unwrap(), 3_000);
}
