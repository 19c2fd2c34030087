use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Serialize, Serializer, ser::SerializeMap};

use super::calendar::format_time_of_day;
use super::{AppointmentStatus, SchedulingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SlotAvailability {
    pub booked: i64,
    pub total: i64,
    pub available: i64,
}

impl SlotAvailability {
    fn recompute(&mut self) {
        // booked can exceed total when capacity was lowered after bookings existed
        self.available = (self.total - self.booked).max(0);
    }

    pub fn is_full(&self) -> bool {
        self.available <= 0
    }
}

/// Remaining capacity per time-of-day for one calendar date.
///
/// Built from the active slot definitions and the appointments booked on that
/// date. Several active slots at the same time pool their capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayAvailability {
    date: NaiveDate,
    slots: BTreeMap<NaiveTime, SlotAvailability>,
}

impl DayAvailability {
    pub fn compute<S, B>(date: NaiveDate, active_slots: S, bookings: B) -> Self
    where
        S: IntoIterator<Item = (NaiveTime, i32)>,
        B: IntoIterator<Item = (NaiveTime, AppointmentStatus)>,
    {
        let mut slots: BTreeMap<NaiveTime, SlotAvailability> = BTreeMap::new();
        for (time, capacity) in active_slots {
            slots.entry(time).or_default().total += i64::from(capacity);
        }

        for (time, status) in bookings {
            if !status.occupies_slot() {
                continue;
            }
            // Appointments at a time with no active slot are not counted anywhere.
            if let Some(slot) = slots.get_mut(&time) {
                slot.booked += 1;
            }
        }

        for slot in slots.values_mut() {
            slot.recompute();
        }

        Self { date, slots }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn get(&self, time: NaiveTime) -> Option<SlotAvailability> {
        self.slots.get(&time).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveTime, SlotAvailability)> + '_ {
        self.slots.iter().map(|(t, a)| (*t, *a))
    }

    /// Gate for putting an occupying appointment at `time` on this date.
    ///
    /// `current` is the appointment's existing (date, time) when it is being
    /// moved. Its own slot is always accepted, full or not.
    pub fn check_booking(
        &self,
        time: NaiveTime,
        current: Option<(NaiveDate, NaiveTime)>,
    ) -> Result<(), SchedulingError> {
        if current == Some((self.date, time)) {
            return Ok(());
        }

        let slot = self.get(time).ok_or(SchedulingError::SlotNotFound(time))?;
        if slot.is_full() {
            return Err(self.full(time, slot));
        }
        Ok(())
    }

    /// Gate for putting a cancelled appointment back to pending.
    ///
    /// Unlike a new booking, a time with no active slot is accepted: the
    /// appointment would not count against any capacity there.
    pub fn check_restore(&self, time: NaiveTime) -> Result<(), SchedulingError> {
        match self.get(time) {
            Some(slot) if slot.is_full() => Err(self.full(time, slot)),
            _ => Ok(()),
        }
    }

    fn full(&self, time: NaiveTime, slot: SlotAvailability) -> SchedulingError {
        SchedulingError::CapacityExceeded {
            date: self.date,
            time,
            booked: slot.booked,
            total: slot.total,
        }
    }
}

/// Serializes as `{"09:00": {"booked": 1, "total": 3, "available": 2}, ...}`.
impl Serialize for DayAvailability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.slots.len()))?;
        for (time, slot) in &self.slots {
            map.serialize_entry(&format_time_of_day(*time), slot)?;
        }
        map.end()
    }
}

/// Decides whether an appointment may move to `target` on the date that
/// `availability` describes.
pub fn check_move(
    status: AppointmentStatus,
    current: (NaiveDate, NaiveTime),
    target_time: NaiveTime,
    availability: &DayAvailability,
) -> Result<(), SchedulingError> {
    if !status.is_movable() {
        return Err(SchedulingError::NotMovable(status));
    }
    availability.check_booking(target_time, Some(current))
}

#[cfg(test)]
mod tests {
    use super::AppointmentStatus::*;
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn may_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()
    }

    fn day(slots: &[(NaiveTime, i32)], bookings: &[(NaiveTime, AppointmentStatus)]) -> DayAvailability {
        DayAvailability::compute(may_first(), slots.iter().copied(), bookings.iter().copied())
    }

    #[test]
    fn available_is_total_minus_non_cancelled() {
        let a = day(
            &[(t(9, 0), 3), (t(10, 0), 2)],
            &[
                (t(9, 0), Pending),
                (t(9, 0), Confirmed),
                (t(9, 0), Cancelled),
                (t(10, 0), Completed),
            ],
        );

        assert_eq!(
            a.get(t(9, 0)),
            Some(SlotAvailability { booked: 2, total: 3, available: 1 })
        );
        assert_eq!(
            a.get(t(10, 0)),
            Some(SlotAvailability { booked: 1, total: 2, available: 1 })
        );
    }

    #[test]
    fn overbooked_slot_floors_at_zero() {
        let a = day(
            &[(t(9, 0), 1)],
            &[(t(9, 0), Pending), (t(9, 0), Pending), (t(9, 0), Confirmed)],
        );
        let slot = a.get(t(9, 0)).unwrap();
        assert_eq!(slot.booked, 3);
        assert_eq!(slot.available, 0);
    }

    #[test]
    fn slots_sharing_a_time_pool_capacity() {
        let a = day(&[(t(9, 0), 2), (t(9, 0), 1)], &[(t(9, 0), Pending)]);
        assert_eq!(
            a.get(t(9, 0)),
            Some(SlotAvailability { booked: 1, total: 3, available: 2 })
        );
    }

    #[test]
    fn bookings_without_a_slot_are_ignored() {
        let a = day(&[(t(9, 0), 2)], &[(t(11, 0), Pending)]);
        assert_eq!(a.get(t(11, 0)), None);
        assert_eq!(a.get(t(9, 0)).unwrap().booked, 0);
    }

    #[test]
    fn full_day_scenario() {
        let slots = [(t(9, 0), 3)];
        let mut bookings = vec![(t(9, 0), Pending); 3];

        let a = day(&slots, &bookings);
        assert_eq!(
            a.get(t(9, 0)),
            Some(SlotAvailability { booked: 3, total: 3, available: 0 })
        );
        assert_eq!(
            a.check_booking(t(9, 0), None),
            Err(SchedulingError::CapacityExceeded {
                date: may_first(),
                time: t(9, 0),
                booked: 3,
                total: 3,
            })
        );

        bookings[0].1 = Cancelled;
        let a = day(&slots, &bookings);
        assert_eq!(a.get(t(9, 0)).unwrap().available, 1);
        assert!(a.check_booking(t(9, 0), None).is_ok());
    }

    #[test]
    fn cancelling_twice_only_frees_one_seat() {
        let slots = [(t(9, 0), 3)];
        let mut bookings = vec![(t(9, 0), Pending), (t(9, 0), Confirmed)];
        let before = day(&slots, &bookings).get(t(9, 0)).unwrap().booked;

        bookings[1].1 = Cancelled;
        let once = day(&slots, &bookings).get(t(9, 0)).unwrap().booked;
        bookings[1].1 = Cancelled;
        let twice = day(&slots, &bookings).get(t(9, 0)).unwrap().booked;

        assert_eq!(once, before - 1);
        assert_eq!(twice, once);
    }

    #[test]
    fn restore_takes_a_seat_and_respects_capacity() {
        let slots = [(t(9, 0), 2)];
        let mut bookings = vec![(t(9, 0), Pending), (t(9, 0), Cancelled)];

        let a = day(&slots, &bookings);
        assert!(a.check_restore(t(9, 0)).is_ok());
        bookings[1].1 = Pending;
        assert_eq!(day(&slots, &bookings).get(t(9, 0)).unwrap().booked, 2);

        // Slot filled by someone else while this one sat cancelled.
        let bookings = vec![(t(9, 0), Pending), (t(9, 0), Confirmed), (t(9, 0), Cancelled)];
        let a = day(&slots, &bookings);
        assert!(matches!(
            a.check_restore(t(9, 0)),
            Err(SchedulingError::CapacityExceeded { booked: 2, total: 2, .. })
        ));
    }

    #[test]
    fn restore_at_a_time_without_slot_is_allowed() {
        let a = day(&[(t(9, 0), 1)], &[]);
        assert!(a.check_restore(t(15, 0)).is_ok());
    }

    #[test]
    fn new_booking_needs_an_active_slot() {
        let a = day(&[(t(9, 0), 1)], &[]);
        assert_eq!(
            a.check_booking(t(9, 30), None),
            Err(SchedulingError::SlotNotFound(t(9, 30)))
        );
    }

    #[test]
    fn moving_into_a_full_slot_fails_unless_it_is_your_own() {
        let a = day(&[(t(9, 0), 1), (t(10, 0), 1)], &[(t(9, 0), Pending), (t(10, 0), Pending)]);

        assert!(matches!(
            check_move(Confirmed, (may_first(), t(10, 0)), t(9, 0), &a),
            Err(SchedulingError::CapacityExceeded { .. })
        ));
        assert!(check_move(Confirmed, (may_first(), t(9, 0)), t(9, 0), &a).is_ok());
    }

    #[test]
    fn own_slot_on_another_date_is_not_exempt() {
        let a = day(&[(t(9, 0), 1)], &[(t(9, 0), Pending)]);
        let other_day = NaiveDate::from_ymd_opt(2025, 5, 2).unwrap();
        assert!(check_move(Pending, (other_day, t(9, 0)), t(9, 0), &a).is_err());
    }

    #[test]
    fn finished_appointments_cannot_move() {
        let a = day(&[(t(9, 0), 5)], &[]);
        assert_eq!(
            check_move(Completed, (may_first(), t(10, 0)), t(9, 0), &a),
            Err(SchedulingError::NotMovable(Completed))
        );
        assert_eq!(
            check_move(Cancelled, (may_first(), t(10, 0)), t(9, 0), &a),
            Err(SchedulingError::NotMovable(Cancelled))
        );
    }

    #[test]
    fn serializes_keyed_by_hhmm() {
        let a = day(&[(t(14, 0), 2), (t(9, 30), 1)], &[(t(9, 30), Pending)]);
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "09:30": {"booked": 1, "total": 1, "available": 0},
                "14:00": {"booked": 0, "total": 2, "available": 2},
            })
        );
    }
}
