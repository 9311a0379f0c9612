//! Wallet manager implementation: balance reads, locked adjustments and
//! share arithmetic for split bookings.

use std::sync::Arc;

use tracing::debug;

use super::{
    errors::{WalletError, WalletResult},
    models::{EntryCategory, EntryDirection, WalletTransaction},
};
use crate::booking::models::{Booking, BookingId, BookingParticipant, ParticipantStatus};
use crate::catalog::UserId;
use crate::money::{self, Money};
use crate::store::{NewWalletEntry, Store, StoreTx};

/// Wallet manager
#[derive(Clone)]
pub struct WalletManager {
    store: Arc<dyn Store>,
}

impl WalletManager {
    /// Create a new wallet manager
    ///
    /// # Arguments
    ///
    /// * `store` - Storage handle shared with the other managers
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Get the current balance for a user; 0 when no wallet exists yet.
    pub async fn balance(&self, user_id: UserId) -> WalletResult<Money> {
        Ok(self.store.wallet_balance(user_id).await?)
    }

    /// Get ledger entries for a user, newest first.
    pub async fn history(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> WalletResult<Vec<WalletTransaction>> {
        Ok(self.store.wallet_entries(user_id, limit).await?)
    }

    /// Apply a signed balance change inside a caller-supplied transaction
    ///
    /// Lazily creates the wallet, re-reads the balance under a write
    /// lock, rejects debits that would go negative, and appends the
    /// immutable audit entry. Commits and rollbacks belong to the
    /// caller, so a settlement's wallet writes live and die with its
    /// booking writes.
    ///
    /// # Arguments
    ///
    /// * `tx` - Open transaction the adjustment joins
    /// * `user_id` - Wallet owner
    /// * `amount` - Signed amount; negative debits
    /// * `category` - Ledger category for the audit entry
    /// * `description` - Human-readable audit note
    /// * `booking_id` - Booking the change belongs to, if any
    ///
    /// # Returns
    ///
    /// * `WalletResult<Money>` - New balance or error
    ///
    /// # Errors
    ///
    /// * `WalletError::InsufficientBalance` - Debit exceeds the balance
    /// * `WalletError::BalanceOverflow` - Credit overflows the balance
    pub async fn adjust(
        &self,
        tx: &mut dyn StoreTx,
        user_id: UserId,
        amount: Money,
        category: EntryCategory,
        description: &str,
        booking_id: Option<BookingId>,
    ) -> WalletResult<Money> {
        if amount == 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        let balance = tx.wallet_for_update(user_id).await?;
        let new_balance = balance
            .checked_add(amount)
            .ok_or(WalletError::BalanceOverflow(user_id))?;
        if new_balance < 0 {
            return Err(WalletError::InsufficientBalance {
                available: balance,
                required: -amount,
            });
        }

        tx.set_wallet_balance(user_id, new_balance).await?;

        let direction = if amount < 0 {
            EntryDirection::Debit
        } else {
            EntryDirection::Credit
        };
        tx.insert_wallet_entry(NewWalletEntry {
            user_id,
            booking_id,
            amount,
            balance_after: new_balance,
            direction,
            category,
            description: Some(description.to_string()),
        })
        .await?;

        debug!(user_id, amount, new_balance, category = %category, "wallet adjusted");
        Ok(new_balance)
    }

    /// Per-invitee share of an evenly split total, floored to the minor
    /// unit. The initiator absorbs the remainder so shares sum to the
    /// total exactly.
    pub fn share_amount(&self, total: Money, invitee_count: u32) -> Money {
        money::split_share(total, invitee_count)
    }

    /// Settle an invitee's share: mark the participant row paid and
    /// credit the booking's initiator, atomically with whatever else the
    /// caller does in `tx`.
    ///
    /// # Errors
    ///
    /// * `WalletError::InvalidAmount` - Non-positive share amount
    /// * `WalletError::Store` - Participant row not pending
    pub async fn reimburse(
        &self,
        tx: &mut dyn StoreTx,
        booking: &Booking,
        participant: &BookingParticipant,
        amount: Money,
    ) -> WalletResult<Money> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        tx.update_participant_status(participant.id, ParticipantStatus::Paid)
            .await?;
        let balance = self
            .adjust(
                tx,
                booking.created_by,
                amount,
                EntryCategory::BookingReimbursement,
                &format!("share reimbursement for booking {}", booking.id),
                Some(booking.id),
            )
            .await?;

        debug!(
            booking_id = booking.id,
            participant_id = participant.id,
            amount,
            "initiator reimbursed"
        );
        Ok(balance)
    }

    /// Credit a wallet outside any settlement (top-up, promotion).
    ///
    /// # Errors
    ///
    /// * `WalletError::InvalidAmount` - Amount must be positive
    pub async fn credit(
        &self,
        user_id: UserId,
        amount: Money,
        description: &str,
    ) -> WalletResult<Money> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(amount));
        }

        let mut tx = self.store.begin().await?;
        let balance = self
            .adjust(
                tx.as_mut(),
                user_id,
                amount,
                EntryCategory::Adjustment,
                description,
                None,
            )
            .await?;
        tx.commit().await?;
        Ok(balance)
    }
}
