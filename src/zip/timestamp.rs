//! Packed MS-DOS date/time codec.
//!
//! Date word: bits 15-9 year since 1980, 8-5 month, 4-0 day.
//! Time word: bits 15-11 hour, 10-5 minute, 4-0 seconds / 2.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// A packed date/time pair as stored in ZIP headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DosDateTime {
    pub date: u16,
    pub time: u16,
}

/// Encoding of the floor value 1980-01-01 00:00:00.
const FLOOR_DATE: u16 = (1 << 5) | 1;

impl DosDateTime {
    pub const fn new(date: u16, time: u16) -> Self {
        Self { date, time }
    }

    /// The earliest representable timestamp, 1980-01-01T00:00:00.
    pub fn floor() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(1980, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default()
    }

    /// The latest representable timestamp, 2107-12-31T23:59:58.
    pub fn ceiling() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2107, 12, 31)
            .and_then(|d| d.and_hms_opt(23, 59, 58))
            .unwrap_or_default()
    }

    /// Decode into a calendar timestamp.
    ///
    /// An all-zero pair, and any pair whose fields do not name a real date
    /// and time, decode to [`DosDateTime::floor`].
    pub fn to_datetime(self) -> NaiveDateTime {
        if self.date == 0 && self.time == 0 {
            return Self::floor();
        }

        let year = ((self.date >> 9) & 0x7F) as i32 + 1980;
        let month = ((self.date >> 5) & 0x0F) as u32;
        let day = (self.date & 0x1F) as u32;
        let hour = ((self.time >> 11) & 0x1F) as u32;
        let minute = ((self.time >> 5) & 0x3F) as u32;
        let second = ((self.time & 0x1F) * 2) as u32;

        match NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, second))
        {
            Some(dt) => dt,
            None => {
                log::debug!(
                    "invalid packed timestamp {:#06x}/{:#06x}, using floor",
                    self.date,
                    self.time
                );
                Self::floor()
            }
        }
    }

    /// Encode a calendar timestamp, clamping to the representable range
    /// and truncating to 2-second resolution.
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        if dt <= Self::floor() {
            return Self::new(FLOOR_DATE, 0);
        }
        let dt = dt.min(Self::ceiling());

        let date = (((dt.year() - 1980) as u16) << 9) | ((dt.month() as u16) << 5) | dt.day() as u16;
        let time = ((dt.hour() as u16) << 11) | ((dt.minute() as u16) << 5) | (dt.second() as u16 / 2);
        Self::new(date, time)
    }
}

impl From<NaiveDateTime> for DosDateTime {
    fn from(dt: NaiveDateTime) -> Self {
        Self::from_datetime(dt)
    }
}
