//! Wallet data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::models::BookingId;
use crate::catalog::UserId;
use crate::money::Money;

/// Wallet model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    /// Point balance in minor units; never negative.
    pub balance: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ledger entry model (append-only audit trail)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: i64,
    pub user_id: UserId,
    pub booking_id: Option<BookingId>,
    /// Signed amount; negative for debits.
    pub amount: Money,
    /// Balance after applying this entry.
    pub balance_after: Money,
    pub direction: EntryDirection,
    pub category: EntryCategory,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Entry direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryDirection {
    Debit,
    Credit,
}

impl EntryDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryDirection::Debit => "debit",
            EntryDirection::Credit => "credit",
        }
    }

    pub fn parse(s: &str) -> Option<EntryDirection> {
        match s {
            "debit" => Some(EntryDirection::Debit),
            "credit" => Some(EntryDirection::Credit),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Entry category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryCategory {
    /// Debit: points spent funding a booking or a split share.
    BookingPayment,
    /// Credit: venue owner's revenue at settlement.
    BookingRevenue,
    /// Credit: initiator reimbursed by an invitee's share payment.
    BookingReimbursement,
    /// Credit: cancellation refund to a participant.
    Refund,
    /// Debit: cancellation clawback from the venue owner.
    RefundDeduction,
    /// Manual or promotional balance change.
    Adjustment,
}

impl EntryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryCategory::BookingPayment => "booking_payment",
            EntryCategory::BookingRevenue => "booking_revenue",
            EntryCategory::BookingReimbursement => "booking_reimbursement",
            EntryCategory::Refund => "refund",
            EntryCategory::RefundDeduction => "refund_deduction",
            EntryCategory::Adjustment => "adjustment",
        }
    }

    pub fn parse(s: &str) -> Option<EntryCategory> {
        match s {
            "booking_payment" => Some(EntryCategory::BookingPayment),
            "booking_revenue" => Some(EntryCategory::BookingRevenue),
            "booking_reimbursement" => Some(EntryCategory::BookingReimbursement),
            "refund" => Some(EntryCategory::Refund),
            "refund_deduction" => Some(EntryCategory::RefundDeduction),
            "adjustment" => Some(EntryCategory::Adjustment),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
