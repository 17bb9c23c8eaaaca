//! Native TIMESTAMP representation
//!
//! A native timestamp slot carries:
//! - Year as a signed 16-bit value
//! - Month (1-12), day (1-31)
//! - Hour (0-23), minute (0-59), second (0-59)
//! - Fractional seconds in nanoseconds
//! - Time zone hour offset and residual minute offset, both signed
//!
//! The offset is taken from the value being encoded; it is never normalized
//! to UTC, so the database receives the wall clock time the caller used.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Timelike};

use crate::error::{Error, Result};

/// Timestamp as written into a native data slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    /// Year (e.g., 2024)
    pub year: i16,
    /// Month (1-12)
    pub month: u8,
    /// Day (1-31)
    pub day: u8,
    /// Hour (0-23)
    pub hour: u8,
    /// Minute (0-59)
    pub minute: u8,
    /// Second (0-59)
    pub second: u8,
    /// Fractional seconds in nanoseconds
    pub fsecond: u32,
    /// Timezone hour offset (-12 to +14)
    pub tz_hour_offset: i8,
    /// Timezone minute offset (-59 to +59), same sign as the hour offset
    pub tz_minute_offset: i8,
}

impl Timestamp {
    /// Create a new timestamp without timezone
    pub fn new(
        year: i16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        fsecond: u32,
    ) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            fsecond,
            tz_hour_offset: 0,
            tz_minute_offset: 0,
        }
    }

    /// Set the timezone offset
    pub fn with_timezone(mut self, tz_hour_offset: i8, tz_minute_offset: i8) -> Self {
        self.tz_hour_offset = tz_hour_offset;
        self.tz_minute_offset = tz_minute_offset;
        self
    }

    /// Check if this timestamp has a timezone
    pub fn has_timezone(&self) -> bool {
        self.tz_hour_offset != 0 || self.tz_minute_offset != 0
    }

    /// Offset from UTC in seconds
    pub fn offset_seconds(&self) -> i32 {
        self.tz_hour_offset as i32 * 3600 + self.tz_minute_offset as i32 * 60
    }

    /// Decompose a point in time, keeping its own offset
    pub fn from_datetime(dt: &DateTime<FixedOffset>) -> Result<Self> {
        let year = i16::try_from(dt.year()).map_err(|_| {
            Error::DataConversionError(format!("year {} does not fit a native timestamp", dt.year()))
        })?;
        let offset = dt.offset().local_minus_utc();

        Ok(Self {
            year,
            month: dt.month() as u8,
            day: dt.day() as u8,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
            fsecond: dt.nanosecond(),
            tz_hour_offset: (offset / 3600) as i8,
            tz_minute_offset: ((offset % 3600) / 60) as i8,
        })
    }

    /// Rebuild the point in time this timestamp was decomposed from
    pub fn to_datetime(&self) -> Result<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(self.offset_seconds()).ok_or_else(|| {
            Error::DataConversionError(format!(
                "invalid timezone offset {}:{}",
                self.tz_hour_offset, self.tz_minute_offset
            ))
        })?;

        let naive = NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)
            .and_then(|d| {
                d.and_hms_nano_opt(
                    self.hour as u32,
                    self.minute as u32,
                    self.second as u32,
                    self.fsecond,
                )
            })
            .ok_or_else(|| Error::DataConversionError(format!("invalid timestamp {:?}", self)))?;

        offset
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| Error::DataConversionError(format!("ambiguous timestamp {:?}", self)))
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::new(1, 1, 1, 0, 0, 0, 0)
    }
}
