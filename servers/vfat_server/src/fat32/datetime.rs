//! DOS date/time fields to `SystemTime`.
//!
//! FAT stores no timezone; stamps are read as UTC.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn is_leap_year(y: u64) -> bool {
    (y % 4 == 0 && y % 100 != 0) || y % 400 == 0
}

/// Days from 1970-01-01 to (year, month 1-12, day 1-31).
fn days_from_civil(year: u64, month: u64, day: u64) -> u64 {
    const CUMUL: [u64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];
    let mut days = (1970..year)
        .map(|y| if is_leap_year(y) { 366 } else { 365 })
        .sum::<u64>();
    days += CUMUL[(month - 1) as usize];
    if month > 2 && is_leap_year(year) {
        days += 1;
    }
    days + day - 1
}

/// Convert a packed DOS date (7/4/5 bits year-since-1980/month/day) and time
/// (5/6/5 bits hour/minute/two-second units). A zero date means "unset" and
/// maps to the epoch, as does a date with an impossible month or day.
pub fn dos_to_system_time(date: u16, time: u16) -> SystemTime {
    if date == 0 {
        return UNIX_EPOCH;
    }
    let year  = 1980 + u64::from((date >> 9) & 0x7F);
    let month = u64::from((date >> 5) & 0x0F);
    let day   = u64::from(date & 0x1F);
    if !(1..=12).contains(&month) || day == 0 {
        return UNIX_EPOCH;
    }
    let hours = u64::from((time >> 11) & 0x1F);
    let mins  = u64::from((time >> 5) & 0x3F);
    let secs  = u64::from(time & 0x1F) * 2;

    let days = days_from_civil(year, month, day);
    UNIX_EPOCH + Duration::from_secs(days * 86_400 + hours * 3_600 + mins * 60 + secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dos_date(year: u16, month: u16, day: u16) -> u16 {
        ((year - 1980) << 9) | (month << 5) | day
    }

    fn dos_time(h: u16, m: u16, s: u16) -> u16 {
        (h << 11) | (m << 5) | (s / 2)
    }

    fn secs(t: SystemTime) -> u64 {
        t.duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    #[test]
    fn zero_date_is_epoch() {
        assert_eq!(dos_to_system_time(0, 0), UNIX_EPOCH);
        assert_eq!(dos_to_system_time(0, dos_time(12, 30, 0)), UNIX_EPOCH);
    }

    #[test]
    fn dos_epoch() {
        // 1980-01-01 00:00:00 UTC
        assert_eq!(secs(dos_to_system_time(dos_date(1980, 1, 1), 0)), 315_532_800);
    }

    #[test]
    fn date_and_time() {
        // 2024-02-29 13:45:58 UTC
        let t = dos_to_system_time(dos_date(2024, 2, 29), dos_time(13, 45, 58));
        assert_eq!(secs(t), 1_709_214_358);
    }

    #[test]
    fn leap_day_counted_after_february() {
        let feb28 = secs(dos_to_system_time(dos_date(2000, 2, 28), 0));
        let mar01 = secs(dos_to_system_time(dos_date(2000, 3, 1), 0));
        assert_eq!(mar01 - feb28, 2 * 86_400);
    }

    #[test]
    fn invalid_month_is_epoch() {
        assert_eq!(dos_to_system_time(dos_date(2000, 13, 1), 0), UNIX_EPOCH);
        assert_eq!(dos_to_system_time(dos_date(2000, 0, 1), 0), UNIX_EPOCH);
        assert_eq!(dos_to_system_time(dos_date(2000, 5, 0), 0), UNIX_EPOCH);
    }
}
