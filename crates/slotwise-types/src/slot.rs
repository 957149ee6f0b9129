//! Fixed-size slot grid over a provider's working day.
//!
//! All times are UTC. A slot is bookable when it starts in the future, sits on
//! the grid that begins at the opening time, and ends no later than closing.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::appointment::BookingError;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// A half-open `[start, end)` interval on the slot grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HoursError {
    #[error("slot length must be positive")]
    ZeroSlot,
    #[error("closing time {closing} is not after opening time {opening}")]
    EmptyWindow { opening: String, closing: String },
    #[error("{slot_minutes}-minute slots do not divide the {window_minutes}-minute working window")]
    Misaligned { slot_minutes: u32, window_minutes: u32 },
}

/// Working hours shared by every provider, in minutes after UTC midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingHours {
    opening: u32,
    closing: u32,
    slot_minutes: u32,
}

impl BookingHours {
    pub fn new(opening: NaiveTime, closing: NaiveTime, slot_minutes: u32) -> Result<Self, HoursError> {
        Self::from_minutes(minute_of_day(opening), minute_of_day(closing), slot_minutes)
    }

    /// Build from whole hours, e.g. `(9, 17, 30)`. A closing hour of 24 means
    /// the end of the day.
    pub fn from_hours(opening_hour: u32, closing_hour: u32, slot_minutes: u32) -> Result<Self, HoursError> {
        Self::from_minutes(
            opening_hour.saturating_mul(60).min(MINUTES_PER_DAY),
            closing_hour.saturating_mul(60).min(MINUTES_PER_DAY),
            slot_minutes,
        )
    }

    fn from_minutes(opening: u32, closing: u32, slot_minutes: u32) -> Result<Self, HoursError> {
        if slot_minutes == 0 {
            return Err(HoursError::ZeroSlot);
        }
        if closing <= opening {
            return Err(HoursError::EmptyWindow {
                opening: format_minute(opening),
                closing: format_minute(closing),
            });
        }
        let window_minutes = closing - opening;
        if window_minutes % slot_minutes != 0 {
            return Err(HoursError::Misaligned { slot_minutes, window_minutes });
        }
        Ok(Self { opening, closing, slot_minutes })
    }

    pub fn slot_minutes(&self) -> u32 {
        self.slot_minutes
    }

    pub fn slot_length(&self) -> Duration {
        Duration::minutes(i64::from(self.slot_minutes))
    }

    /// `"HH:MM-HH:MM UTC"`, for prompts and error messages.
    pub fn describe(&self) -> String {
        format!("{}-{} UTC", format_minute(self.opening), format_minute(self.closing))
    }

    /// Every slot of `date`, booked or not, in chronological order.
    pub fn day_slots(&self, date: NaiveDate) -> Vec<TimeSlot> {
        let midnight = date.and_time(NaiveTime::MIN).and_utc();
        let step = self.slot_length();
        (self.opening..self.closing)
            .step_by(self.slot_minutes as usize)
            .map(|minute| {
                let start = midnight + Duration::minutes(i64::from(minute));
                TimeSlot { start, end: start + step }
            })
            .collect()
    }

    /// Slots of `date` that start after `now` and are not in `booked`.
    pub fn free_slots(&self, date: NaiveDate, booked: &[DateTime<Utc>], now: DateTime<Utc>) -> Vec<TimeSlot> {
        self.day_slots(date)
            .into_iter()
            .filter(|s| s.start > now && !booked.contains(&s.start))
            .collect()
    }

    /// Validate a requested start time and return the slot it denotes.
    pub fn check_start(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> Result<TimeSlot, BookingError> {
        if start <= now {
            return Err(BookingError::InvalidSlot("start time is in the past".into()));
        }
        if start.second() != 0 || start.nanosecond() != 0 {
            return Err(BookingError::InvalidSlot("start time must be on a whole minute".into()));
        }
        let minute = minute_of_day(start.time());
        if minute < self.opening || minute + self.slot_minutes > self.closing {
            return Err(BookingError::InvalidSlot(format!(
                "outside opening hours {}",
                self.describe()
            )));
        }
        if (minute - self.opening) % self.slot_minutes != 0 {
            return Err(BookingError::InvalidSlot(format!(
                "start time must fall on the {}-minute grid starting at {}",
                self.slot_minutes,
                format_minute(self.opening),
            )));
        }
        Ok(TimeSlot { start, end: start + self.slot_length() })
    }
}

impl Default for BookingHours {
    fn default() -> Self {
        Self { opening: 9 * 60, closing: 17 * 60, slot_minutes: 30 }
    }
}

fn minute_of_day(t: NaiveTime) -> u32 {
    t.num_seconds_from_midnight() / 60
}

fn format_minute(minute: u32) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 3, 4).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, 4, h, m, 0).unwrap()
    }

    fn long_ago() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn default_day_has_sixteen_half_hour_slots() {
        let hours = BookingHours::default();
        let slots = hours.day_slots(day());
        assert_eq!(slots.len(), 16);
        assert_eq!(slots[0].start, at(9, 0));
        assert_eq!(slots[15].end, at(17, 0));
    }

    #[test]
    fn rejects_bad_hours() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let five = NaiveTime::from_hms_opt(17, 0, 0).unwrap();
        assert_eq!(BookingHours::new(nine, five, 0), Err(HoursError::ZeroSlot));
        assert!(matches!(BookingHours::new(five, nine, 30), Err(HoursError::EmptyWindow { .. })));
        assert!(matches!(BookingHours::new(nine, five, 45), Err(HoursError::Misaligned { .. })));
    }

    #[test]
    fn free_slots_skip_booked_and_past() {
        let hours = BookingHours::default();
        let booked = vec![at(9, 30), at(10, 0)];
        let free = hours.free_slots(day(), &booked, at(9, 0));
        // 09:00 is not after `now`; 09:30 and 10:00 are booked.
        assert_eq!(free.len(), 13);
        assert_eq!(free[0].start, at(10, 30));
    }

    #[test]
    fn check_start_enforces_grid_and_hours() {
        let hours = BookingHours::default();
        let ok = hours.check_start(at(16, 30), long_ago()).unwrap();
        assert_eq!(ok.end, at(17, 0));

        assert!(matches!(hours.check_start(at(17, 0), long_ago()), Err(BookingError::InvalidSlot(_))));
        assert!(matches!(hours.check_start(at(8, 30), long_ago()), Err(BookingError::InvalidSlot(_))));
        assert!(matches!(hours.check_start(at(9, 15), long_ago()), Err(BookingError::InvalidSlot(_))));
        assert!(matches!(hours.check_start(at(10, 0), at(11, 0)), Err(BookingError::InvalidSlot(_))));
    }

    #[test]
    fn from_hours_supports_end_of_day() {
        let hours = BookingHours::from_hours(22, 24, 60).unwrap();
        let slots = hours.day_slots(day());
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].start, at(23, 0));
        assert_eq!(hours.describe(), "22:00-24:00 UTC");
    }
}
