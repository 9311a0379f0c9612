//! # Courtbook
//!
//! A booking engine for multi-court sports venues: availability,
//! time-based pricing, conflict-free admission, split payments over a
//! wallet ledger, and policy-driven cancellation refunds.
//!
//! Every admitting write (booking creation, reschedule, owner hold)
//! re-runs its conflict check inside the same transaction that performs
//! the write, so two concurrent requests for one slot can never both
//! succeed. Money is integer minor units end to end.
//!
//! ## Architecture
//!
//! A checkout attempt moves through fixed gates:
//!
//! - **Validate**: aligned start, inside the venue window, bounded
//!   duration, strictly in the future
//! - **Price**: base rate times hours, scaled by the highest applicable
//!   pricing rule
//! - **Admit**: resolve a free court and re-check the conflict inside
//!   the settling transaction
//! - **Settle**: debit the wallet or hand off to an external payment
//!   session; participants and the owner credit land in the same
//!   transaction
//! - **Confirm**: external sessions settle idempotently on callback,
//!   re-checking the slot after the payment round-trip
//!
//! Cancellations refund against the policy snapshot the booking carries
//! and claw the owner's revenue back in the same transaction.
//!
//! ## Core Modules
//!
//! - [`availability`]: slot grids and booked-slot listings
//! - [`pricing`]: quotes from venue rates and pricing rules
//! - [`checkout`]: the admission and settlement orchestrator
//! - [`cancellation`]: refunds and the expiry sweep
//! - [`wallet`]: balances and the immutable ledger
//! - [`store`]: the storage contract with Postgres and in-memory backends
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use courtbook::availability::AvailabilityManager;
//! use courtbook::store::{MemoryStore, Store};
//!
//! let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
//! let availability = AvailabilityManager::new(Arc::clone(&store));
//! ```

pub mod availability;
pub mod booking;
pub mod cancellation;
pub mod catalog;
pub mod checkout;
pub mod db;
pub mod directory;
pub mod logging;
pub mod money;
pub mod notify;
pub mod payment;
pub mod pricing;
pub mod settings;
pub mod store;
pub mod wallet;

pub use availability::AvailabilityManager;
pub use booking::{Booking, BookingError, BookingResult, BookingStatus};
pub use cancellation::CancellationManager;
pub use checkout::{CheckoutManager, CheckoutOutcome, CheckoutRequest};
pub use money::Money;
pub use pricing::PricingEngine;
pub use settings::{BookingSettings, ConfigError};
pub use store::{MemoryStore, PgStore, Store};
pub use wallet::WalletManager;
