use chrono::{Duration, NaiveDate, NaiveTime};

use crate::models::{ShiftAvailability, ShiftRef, WorkScheduleRow, WorkScheduleStatus};

/// Bookings are accepted from today up to this many days ahead.
pub const BOOKING_HORIZON_DAYS: i64 = 30;

/// A date can be booked if it is not in the past and not beyond the booking
/// horizon.
pub fn is_date_bookable(date: NaiveDate, today: NaiveDate) -> bool {
    if date < today {
        return false;
    }
    date <= today + Duration::days(BOOKING_HORIZON_DAYS)
}

/// A shift can be selected if it still has availability and, for today only,
/// its end time has not already passed.
pub fn is_shift_selectable(
    shift: &ShiftAvailability,
    date: NaiveDate,
    today: NaiveDate,
    now: NaiveTime,
) -> bool {
    if shift.remaining == 0 {
        return false;
    }
    if date == today && shift.shift.end <= now {
        return false;
    }
    true
}

/// Group schedule rows by shift identity. Rows sharing a shift collapse into
/// one entry; only active rows count toward remaining availability. The
/// result is ordered by shift start time.
pub fn group_by_shift(rows: Vec<WorkScheduleRow>) -> Vec<ShiftAvailability> {
    let mut grouped: Vec<ShiftAvailability> = Vec::new();

    for row in rows {
        if row.status != WorkScheduleStatus::Active {
            continue;
        }

        match grouped.iter_mut().find(|entry| entry.shift.id == row.shift_id) {
            Some(entry) => {
                entry.work_schedule_ids.push(row.id);
                entry.remaining += 1;
            }
            None => {
                grouped.push(ShiftAvailability {
                    shift: ShiftRef {
                        id: row.shift_id,
                        label: row.shift_label,
                        start: row.start_time,
                        end: row.end_time,
                    },
                    work_schedule_ids: vec![row.id],
                    remaining: 1,
                });
            }
        }
    }

    grouped.sort_by_key(|entry| entry.shift.start);
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn row(shift_id: Uuid, label: &str, start: NaiveTime, end: NaiveTime, status: WorkScheduleStatus) -> WorkScheduleRow {
        WorkScheduleRow {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            shift_id,
            shift_label: label.to_string(),
            start_time: start,
            end_time: end,
            date: date(2025, 6, 15),
            status,
        }
    }

    #[test]
    fn dates_before_today_are_not_bookable() {
        let today = date(2025, 6, 15);
        assert!(!is_date_bookable(date(2025, 6, 14), today));
        assert!(!is_date_bookable(date(2024, 12, 31), today));
    }

    #[test]
    fn dates_beyond_horizon_are_not_bookable() {
        let today = date(2025, 6, 15);
        assert!(is_date_bookable(today + Duration::days(BOOKING_HORIZON_DAYS), today));
        assert!(!is_date_bookable(today + Duration::days(BOOKING_HORIZON_DAYS + 1), today));
    }

    #[test]
    fn today_and_near_future_are_bookable() {
        let today = date(2025, 6, 15);
        assert!(is_date_bookable(today, today));
        assert!(is_date_bookable(date(2025, 6, 16), today));
    }

    #[test]
    fn expired_shift_is_unselectable_today_but_fine_tomorrow() {
        let shift_id = Uuid::new_v4();
        let grouped = group_by_shift(vec![row(
            shift_id,
            "08:00-12:00",
            time(8, 0),
            time(12, 0),
            WorkScheduleStatus::Active,
        )]);
        let shift = &grouped[0];

        let today = date(2025, 6, 15);
        let after_noon = time(13, 30);

        assert!(!is_shift_selectable(shift, today, today, after_noon));
        assert!(is_shift_selectable(shift, date(2025, 6, 16), today, after_noon));
    }

    #[test]
    fn shift_with_no_availability_is_unselectable() {
        let shift_id = Uuid::new_v4();
        let grouped = group_by_shift(vec![row(
            shift_id,
            "08:00-12:00",
            time(8, 0),
            time(12, 0),
            WorkScheduleStatus::Inactive,
        )]);

        // The only row was inactive, so the shift never materializes.
        assert!(grouped.is_empty());
    }

    #[test]
    fn rows_sharing_a_shift_are_deduped() {
        let morning = Uuid::new_v4();
        let afternoon = Uuid::new_v4();
        let grouped = group_by_shift(vec![
            row(afternoon, "13:00-17:00", time(13, 0), time(17, 0), WorkScheduleStatus::Active),
            row(morning, "08:00-12:00", time(8, 0), time(12, 0), WorkScheduleStatus::Active),
            row(morning, "08:00-12:00", time(8, 0), time(12, 0), WorkScheduleStatus::Active),
            row(morning, "08:00-12:00", time(8, 0), time(12, 0), WorkScheduleStatus::Inactive),
        ]);

        assert_eq!(grouped.len(), 2);
        // Sorted by start time: morning first.
        assert_eq!(grouped[0].shift.id, morning);
        assert_eq!(grouped[0].remaining, 2);
        assert_eq!(grouped[0].work_schedule_ids.len(), 2);
        assert_eq!(grouped[1].shift.id, afternoon);
        assert_eq!(grouped[1].remaining, 1);
    }
}
