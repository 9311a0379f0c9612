//! Availability resolver: hour-aligned slot enumeration across a
//! venue's courts. Read-only and recomputed per call; admission itself
//! always re-checks inside a transaction.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::debug;

use crate::booking::models::{Booking, BookingId, BookingStatus};
use crate::booking::{BookingError, BookingResult, Resource, TimeRange};
use crate::catalog::{Court, CourtId, SportId, VenueId};
use crate::store::Store;

/// One candidate start time with its availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAvailability {
    pub starts_at: DateTime<Utc>,
    pub available: bool,
}

/// One active booking in a day's busy view.
#[derive(Debug, Clone)]
pub struct BookedSlot {
    pub booking_id: BookingId,
    pub court_id: Option<CourtId>,
    pub sport_id: Option<SportId>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: BookingStatus,
}

/// Availability manager
#[derive(Clone)]
pub struct AvailabilityManager {
    store: Arc<dyn Store>,
}

impl AvailabilityManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// List hour-aligned candidate starts for a date.
    ///
    /// A slot is available iff it starts strictly in the future and at
    /// least one court supporting the sport has no conflict for
    /// `[start, start + duration)`. Slots run from the venue's open hour
    /// while `start + duration` still fits before close.
    pub async fn list_slots(
        &self,
        venue_id: VenueId,
        sport_id: SportId,
        date: NaiveDate,
        duration_hours: u32,
    ) -> BookingResult<Vec<SlotAvailability>> {
        if duration_hours == 0 {
            return Err(BookingError::Validation(
                "duration must be at least one hour".to_string(),
            ));
        }

        let venue = self
            .store
            .venue(venue_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("venue {venue_id}")))?;
        let courts: Vec<Court> = self
            .store
            .courts(venue_id)
            .await?
            .into_iter()
            .filter(|court| court.supports(sport_id))
            .collect();

        // One fetch covers every slot of the day.
        let bookings = self
            .store
            .bookings_in_range(venue_id, day_window(date))
            .await?;

        let now = Utc::now();
        let duration = Duration::hours(i64::from(duration_hours));
        let mut slots = Vec::new();
        let mut hour = venue.open_hour;
        while hour + duration_hours as i32 <= venue.close_hour {
            let starts_at = slot_start(date, hour);
            let range = TimeRange::new(starts_at, starts_at + duration);
            let available = starts_at > now
                && courts
                    .iter()
                    .any(|court| court_is_free(&bookings, court.id, &range));
            slots.push(SlotAvailability {
                starts_at,
                available,
            });
            hour += 1;
        }

        debug!(
            venue_id,
            sport_id,
            %date,
            slots = slots.len(),
            available = slots.iter().filter(|s| s.available).count(),
            "resolved availability"
        );
        Ok(slots)
    }

    /// Busy view of a date: active bookings, optionally restricted to
    /// courts that support a sport. Venue-wide bookings always appear,
    /// they block every court.
    pub async fn booked_slots(
        &self,
        venue_id: VenueId,
        date: NaiveDate,
        sport_id: Option<SportId>,
    ) -> BookingResult<Vec<BookedSlot>> {
        self.store
            .venue(venue_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("venue {venue_id}")))?;

        let courts = self.store.courts(venue_id).await?;
        let bookings = self
            .store
            .bookings_in_range(venue_id, day_window(date))
            .await?;

        let mut slots: Vec<BookedSlot> = bookings
            .into_iter()
            .filter(|booking| match (sport_id, booking.court_id) {
                (None, _) | (_, None) => true,
                (Some(sport), Some(court_id)) => courts
                    .iter()
                    .any(|court| court.id == court_id && court.supports(sport)),
            })
            .map(|booking| BookedSlot {
                booking_id: booking.id,
                court_id: booking.court_id,
                sport_id: booking.sport_id,
                starts_at: booking.starts_at,
                ends_at: booking.ends_at,
                status: booking.status,
            })
            .collect();
        slots.sort_by_key(|slot| (slot.starts_at, slot.booking_id));
        Ok(slots)
    }
}

fn day_window(date: NaiveDate) -> TimeRange {
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
    TimeRange::new(start, start + Duration::days(1))
}

fn slot_start(date: NaiveDate, hour: i32) -> DateTime<Utc> {
    day_window(date).starts_at + Duration::hours(i64::from(hour))
}

fn court_is_free(bookings: &[Booking], court_id: CourtId, range: &TimeRange) -> bool {
    let resource = Resource::Court(court_id);
    !bookings
        .iter()
        .any(|b| b.resource().clashes_with(&resource) && b.range().overlaps(range))
}
