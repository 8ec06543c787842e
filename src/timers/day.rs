//! Calendar-day windows and local-midnight arithmetic.
//!
//! All instants are handled in UTC; a user's day is the UTC day shifted by
//! their offset in seconds (east of UTC is positive).

use serde::Serialize;
use time::{Date, Duration, OffsetDateTime, Time, UtcOffset};

const HALF_HOUR_EXCEPTION_UTC: (u8, u8) = (18, 30);
const HALF_HOUR_EXCEPTION_OFFSET: i32 = (5 * 60 + 30) * 60;

/// One calendar day, as an instant range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayWindow {
    date: Date,
    tz_offset: i32,
    #[serde(with = "time::serde::rfc3339")]
    start: OffsetDateTime,
}

impl DayWindow {
    /// The UTC day containing `at`.
    pub fn utc_containing(at: OffsetDateTime) -> Self {
        Self::for_date(at.to_offset(UtcOffset::UTC).date(), 0)
    }

    /// The day containing `at` for a user `tz_offset` seconds east of UTC.
    pub fn local_containing(at: OffsetDateTime, tz_offset: i32) -> Self {
        let local = at.to_offset(UtcOffset::UTC) + Duration::seconds(tz_offset.into());
        Self::for_date(local.date(), tz_offset)
    }

    /// `date` 00:00:00 for a user `tz_offset` seconds east of UTC.
    pub fn for_date(date: Date, tz_offset: i32) -> Self {
        let start = date.midnight().assume_utc() - Duration::seconds(tz_offset.into());
        Self {
            date,
            tz_offset,
            start,
        }
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn tz_offset(&self) -> i32 {
        self.tz_offset
    }

    pub fn start(&self) -> OffsetDateTime {
        self.start
    }

    /// Next day's 00:00:00; bound for half-open `[start, end)` queries.
    pub fn end_exclusive(&self) -> OffsetDateTime {
        self.start + Duration::DAY
    }

    /// 23:59:59 of this day; bound for closed `[start, end]` queries.
    pub fn end_inclusive(&self) -> OffsetDateTime {
        self.end_exclusive() - Duration::SECOND
    }

    pub fn previous(&self) -> Self {
        Self::for_date(self.date - Duration::DAY, self.tz_offset)
    }
}

/// Offset (seconds east of UTC) of the zone where it is 00:00 at the given
/// UTC wall time.
///
/// UTC hours 0..=10 map to UTC-0..UTC-10, hours 11..=23 map to UTC+13..UTC+1.
/// The single half-hour zone handled is UTC+05:30, whose midnight falls at
/// 18:30 UTC. Any other minute value is ignored and out-of-range hours wrap.
pub fn local_midnight_offset(utc_hour: u8, utc_minute: u8) -> i32 {
    let hour = i32::from(utc_hour % 24);
    if (utc_hour % 24, utc_minute) == HALF_HOUR_EXCEPTION_UTC {
        return HALF_HOUR_EXCEPTION_OFFSET;
    }
    if hour >= 11 {
        (24 - hour) * 3600
    } else {
        -hour * 3600
    }
}

/// Most recent local 00:00 at or before `now`, as a UTC instant.
pub fn last_local_midnight(now: OffsetDateTime, tz_offset: i32) -> OffsetDateTime {
    let shift = Duration::seconds(tz_offset.into());
    let local = now.to_offset(UtcOffset::UTC) + shift;
    local.replace_time(Time::MIDNIGHT) - shift
}
