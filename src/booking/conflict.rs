//! Interval overlap and resource clash primitives.
//!
//! These predicates are the single admission authority: every admitting
//! write re-evaluates them inside its own transaction via
//! `StoreTx::find_blocking`. A check performed outside that transaction
//! is advisory only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::CourtId;

/// Half-open booking interval `[starts_at, ends_at)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Self {
        Self { starts_at, ends_at }
    }

    /// Interval overlap: `self.start < other.end && self.end > other.start`.
    /// Back-to-back intervals do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.starts_at < other.ends_at && self.ends_at > other.starts_at
    }
}

/// What a booking occupies: one court, or the whole venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resource {
    Court(CourtId),
    VenueWide,
}

impl Resource {
    pub fn from_court(court_id: Option<CourtId>) -> Self {
        match court_id {
            Some(id) => Resource::Court(id),
            None => Resource::VenueWide,
        }
    }

    pub fn court_id(&self) -> Option<CourtId> {
        match self {
            Resource::Court(id) => Some(*id),
            Resource::VenueWide => None,
        }
    }

    /// Venue-wide clashes with everything on the venue; a court clashes
    /// with itself and with venue-wide.
    pub fn clashes_with(&self, other: &Resource) -> bool {
        match (self, other) {
            (Resource::VenueWide, _) | (_, Resource::VenueWide) => true,
            (Resource::Court(a), Resource::Court(b)) => a == b,
        }
    }
}
