//! Spa booking rules: time-of-day slots, per-date availability, the
//! appointment status machine and booking-time pricing.
//!
//! Nothing in here touches the database. Route handlers load rows, hand them
//! to these functions inside a transaction and persist the outcome.

pub mod availability;
pub mod calendar;
pub mod pricing;
pub mod status;

use chrono::{NaiveDate, NaiveTime};

pub use availability::DayAvailability;
pub use status::{AppointmentStatus, PaymentStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulingError {
    #[error("{0}")]
    Validation(String),

    #[error("no active time slot at {}", .0.format("%H:%M"))]
    SlotNotFound(NaiveTime),

    #[error("time slot {} on {date} is full ({booked}/{total} booked)", .time.format("%H:%M"))]
    CapacityExceeded {
        date: NaiveDate,
        time: NaiveTime,
        booked: i64,
        total: i64,
    },

    #[error("cannot change status from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("a {0} appointment cannot be moved")]
    NotMovable(AppointmentStatus),
}
