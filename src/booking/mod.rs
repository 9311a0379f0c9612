//! Booking domain: the central entity, its participants and payments,
//! the status machines, the interval conflict primitives and the error
//! taxonomy shared by every component.

pub mod conflict;
pub mod errors;
pub mod models;

pub use conflict::{Resource, TimeRange};
pub use errors::{BookingError, BookingResult};
pub use models::{
    Booking, BookingDetails, BookingId, BookingParticipant, BookingStatus, ParticipantId,
    ParticipantStatus, Party, Payment, PaymentId, PaymentStatus,
};
