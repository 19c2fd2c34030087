use std::fmt;

use serde::{Deserialize, Serialize};

use super::SchedulingError;

/// Lifecycle of a spa booking.
///
/// ```text
/// pending ──► confirmed ──► completed
///    │            │
///    ├────────────┴──► cancelled ──► pending (restore)
///    └──────────────────────────────► completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum AppointmentStatus {
    Pending = 0,
    Confirmed = 1,
    Completed = 2,
    Cancelled = 3,
}

impl AppointmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    /// Cancelled bookings keep their row but free their seat.
    pub fn occupies_slot(self) -> bool {
        self != AppointmentStatus::Cancelled
    }

    /// Only bookings that have not finished or been cancelled can move.
    pub fn is_movable(self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;

        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Confirmed | Completed | Cancelled)
                | (Confirmed, Completed | Cancelled)
                | (Cancelled, Pending)
        )
    }

    pub fn check_transition(self, next: AppointmentStatus) -> Result<(), SchedulingError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(SchedulingError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// cancelled -> pending takes a seat again, so it is capacity-gated.
    pub fn is_restore(self, next: AppointmentStatus) -> bool {
        self == AppointmentStatus::Cancelled && next == AppointmentStatus::Pending
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Independent of [`AppointmentStatus`]; toggled freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum PaymentStatus {
    Pending = 0,
    Paid = 1,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::AppointmentStatus::*;
    use super::*;

    const ALL: [AppointmentStatus; 4] = [Pending, Confirmed, Completed, Cancelled];

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Cancelled));
    }

    #[test]
    fn completed_is_terminal() {
        for next in [Pending, Confirmed, Cancelled] {
            assert_eq!(
                Completed.check_transition(next),
                Err(SchedulingError::InvalidTransition {
                    from: Completed,
                    to: next
                })
            );
        }
    }

    #[test]
    fn cancelled_only_goes_back_to_pending() {
        assert!(Cancelled.can_transition_to(Pending));
        assert!(Cancelled.is_restore(Pending));
        assert!(!Cancelled.can_transition_to(Confirmed));
        assert!(!Cancelled.can_transition_to(Completed));
        assert!(!Confirmed.can_transition_to(Pending));
    }

    #[test]
    fn same_status_is_a_no_op() {
        for s in ALL {
            assert!(s.check_transition(s).is_ok());
            assert!(!s.is_restore(s));
        }
    }

    #[test]
    fn only_cancelled_frees_a_seat() {
        let occupying: Vec<_> = ALL.into_iter().filter(|s| s.occupies_slot()).collect();
        assert_eq!(occupying, vec![Pending, Confirmed, Completed]);
        assert!(Pending.is_movable() && Confirmed.is_movable());
        assert!(!Completed.is_movable() && !Cancelled.is_movable());
    }

    #[test]
    fn wire_names_are_lowercase() {
        assert_eq!(serde_json::to_string(&Cancelled).unwrap(), r#""cancelled""#);
        assert_eq!(
            serde_json::from_str::<PaymentStatus>(r#""paid""#).unwrap(),
            PaymentStatus::Paid
        );
        assert_eq!(Confirmed.to_string(), "confirmed");
    }
}
