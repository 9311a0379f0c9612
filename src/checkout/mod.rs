//! Checkout orchestration.
//!
//! The orchestrator owns the admission pipeline: validate the requested
//! interval, price it, resolve a court, then settle either from the
//! requester's wallet or through an external payment session. Admitting
//! writes always re-check the conflict inside their own transaction;
//! the external path additionally re-checks at confirmation time, since
//! the payment round-trip is long enough for the slot to be taken.

pub mod manager;
pub mod models;

pub use manager::CheckoutManager;
pub use models::{
    BookingSessionPlan, CheckoutMetadata, CheckoutOutcome, CheckoutRequest, ShareSessionPlan,
};
