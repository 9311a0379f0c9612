//! Pricing engine: base rate times duration, scaled by the highest
//! applicable time-of-day rule.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc};
use tracing::debug;

use crate::booking::{BookingError, BookingResult};
use crate::catalog::{PricingRule, Venue, VenueId};
use crate::money::{self, BPS_SCALE, Money};
use crate::store::Store;

/// Price breakdown for a requested interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    /// Base rate times duration, before rules.
    pub base_amount: Money,
    /// Winning multiplier; 10000 when no rule applies.
    pub multiplier_bps: i32,
    /// Final amount in minor units.
    pub total: Money,
}

/// Pricing engine
#[derive(Clone)]
pub struct PricingEngine {
    store: Arc<dyn Store>,
}

impl PricingEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Quote the price for an interval at a venue.
    ///
    /// # Errors
    ///
    /// * `BookingError::NotFound` - Unknown venue
    pub async fn quote(
        &self,
        venue_id: VenueId,
        starts_at: DateTime<Utc>,
        duration_hours: u32,
    ) -> BookingResult<Quote> {
        let venue = self
            .store
            .venue(venue_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("venue {venue_id}")))?;
        let rules = self.store.pricing_rules(venue_id).await?;
        let quote = Self::quote_with(&venue, &rules, starts_at, duration_hours)?;
        debug!(
            venue_id,
            %starts_at,
            duration_hours,
            multiplier_bps = quote.multiplier_bps,
            total = quote.total,
            "priced interval"
        );
        Ok(quote)
    }

    /// Pure computation over already-loaded catalog rows.
    ///
    /// A rule applies when it is active, its day set is empty or contains
    /// the start's weekday, and the start hour falls in
    /// `[start_hour, end_hour)`. The maximum multiplier among applicable
    /// rules wins.
    pub fn quote_with(
        venue: &Venue,
        rules: &[PricingRule],
        starts_at: DateTime<Utc>,
        duration_hours: u32,
    ) -> BookingResult<Quote> {
        let base_amount = venue
            .base_price_per_hour
            .checked_mul(i64::from(duration_hours))
            .ok_or_else(|| BookingError::Validation("price overflow".to_string()))?;

        let weekday = starts_at.weekday();
        let hour = starts_at.hour() as i32;
        let multiplier_bps = rules
            .iter()
            .filter(|rule| rule.applies_to(weekday, hour))
            .map(|rule| rule.multiplier_bps)
            .max()
            .unwrap_or(BPS_SCALE as i32);

        let total = money::mul_bps(base_amount, multiplier_bps)
            .ok_or_else(|| BookingError::Validation("price overflow".to_string()))?;

        Ok(Quote {
            base_amount,
            multiplier_bps,
            total,
        })
    }
}
