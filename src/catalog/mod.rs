//! Venue catalog models: venues, courts, pricing rules and cancellation
//! policies. The engine reads these; creating and editing them is the
//! caller's concern.

pub mod models;

pub use models::{
    CancellationPolicy, Court, CourtId, PricingRule, RuleId, SportId, UserId, Venue, VenueId,
};
