//! Catalog data models.

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// User ID type
pub type UserId = i64;
/// Venue ID type
pub type VenueId = i64;
/// Court ID type
pub type CourtId = i64;
/// Sport ID type
pub type SportId = i64;
/// Pricing rule ID type
pub type RuleId = i64;

/// Venue model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub id: VenueId,
    pub name: String,
    pub owner_id: UserId,
    /// Base rate in minor units per hour.
    pub base_price_per_hour: Money,
    /// First bookable hour of day (inclusive).
    pub open_hour: i32,
    /// Hour of day at which bookings must have ended (exclusive).
    pub close_hour: i32,
    pub created_at: DateTime<Utc>,
}

/// Court model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Court {
    pub id: CourtId,
    pub venue_id: VenueId,
    pub name: String,
    /// Sports this court supports.
    pub sport_ids: Vec<SportId>,
}

impl Court {
    pub fn supports(&self, sport_id: SportId) -> bool {
        self.sport_ids.contains(&sport_id)
    }
}

/// Time-of-day pricing rule. The highest applicable multiplier wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRule {
    pub id: RuleId,
    pub venue_id: VenueId,
    pub name: String,
    /// Start hour of day (inclusive).
    pub start_hour: i32,
    /// End hour of day (exclusive).
    pub end_hour: i32,
    /// Days the rule applies on; empty means every day.
    pub days: Vec<Weekday>,
    /// Multiplier in basis points (10000 = 1.0x).
    pub multiplier_bps: i32,
    pub active: bool,
}

impl PricingRule {
    /// Whether the rule covers a booking starting at `hour` on `weekday`.
    pub fn applies_to(&self, weekday: Weekday, hour: i32) -> bool {
        self.active
            && (self.days.is_empty() || self.days.contains(&weekday))
            && self.start_hour <= hour
            && hour < self.end_hour
    }
}

/// Venue cancellation policy, snapshotted onto bookings at creation so
/// later edits never change the terms of an existing booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationPolicy {
    /// Percentage refunded when cancelling inside the cutoff window.
    pub refund_pct: i32,
    /// Hours before start at or below which the partial percentage applies.
    pub cutoff_hours: i32,
}

impl Default for CancellationPolicy {
    /// Full refund at any time; used when a venue configures no policy.
    fn default() -> Self {
        Self {
            refund_pct: 100,
            cutoff_hours: 0,
        }
    }
}
