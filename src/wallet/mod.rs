//! Wallet module providing the split ledger: per-user point balances
//! with an append-only transaction log.
//!
//! This module implements:
//! - Non-negative balances enforced under a write lock per adjustment
//! - An immutable audit entry (amount, direction, category,
//!   balance-after) for every balance change
//! - Equal cost splitting with the initiator absorbing the rounding
//!   remainder
//! - Reimbursement of the initiator when an invitee settles their share
//!
//! Balance mutations run inside a caller-supplied [`StoreTx`] so a
//! settlement's wallet writes commit or roll back with its booking
//! writes.
//!
//! [`StoreTx`]: crate::store::StoreTx

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{WalletError, WalletResult};
pub use manager::WalletManager;
pub use models::{EntryCategory, EntryDirection, Wallet, WalletTransaction};
