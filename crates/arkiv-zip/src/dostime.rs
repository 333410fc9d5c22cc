//! MS-DOS date/time conversion.
//!
//! ZIP stores modification times as two 16-bit words with 2-second
//! resolution and years 1980..=2107. Times are interpreted as UTC.

use chrono::{DateTime, Datelike, NaiveDate, Timelike};

/// First year representable in DOS format.
const DOS_EPOCH_YEAR: i32 = 1980;

/// 1980-01-01T00:00:00Z.
pub const DOS_EPOCH: u64 = 315_532_800;

/// 2107-12-31T23:59:58Z.
const DOS_MAX: u64 = 4_354_819_198;

/// Convert Unix seconds to a `(time, date)` pair.
///
/// Times outside the DOS range are clamped to its ends; odd seconds round down.
pub fn to_dos(unix_seconds: u64) -> (u16, u16) {
    let clamped = unix_seconds.clamp(DOS_EPOCH, DOS_MAX);
    let Some(dt) = DateTime::from_timestamp(clamped as i64, 0) else {
        return (0, 1 << 5 | 1);
    };

    let time = (dt.hour() << 11 | dt.minute() << 5 | dt.second() / 2) as u16;
    let date = (((dt.year() - DOS_EPOCH_YEAR) as u32) << 9 | dt.month() << 5 | dt.day()) as u16;
    (time, date)
}

/// Convert a `(time, date)` pair to Unix seconds.
///
/// Returns `None` when a field is out of range (month 0, second 60, ...).
pub fn from_dos(time: u16, date: u16) -> Option<u64> {
    let year = DOS_EPOCH_YEAR + (date >> 9) as i32;
    let month = ((date >> 5) & 0x0F) as u32;
    let day = (date & 0x1F) as u32;
    let hour = (time >> 11) as u32;
    let minute = ((time >> 5) & 0x3F) as u32;
    let second = ((time & 0x1F) * 2) as u32;

    let timestamp = NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(hour, minute, second)?
        .and_utc()
        .timestamp();
    u64::try_from(timestamp).ok()
}
