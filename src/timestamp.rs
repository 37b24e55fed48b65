//! Packed DOS date and time words.
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

/// First year representable in a FAT date.
pub const FAT_EPOCH_YEAR: u16 = 1980;
/// Last year representable in the 7-bit year field.
pub const FAT_MAX_YEAR: u16 = FAT_EPOCH_YEAR + 127;

/// Time of day with two-second resolution, packed as `(hour << 11) | (minute << 5) | (second / 2)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct FatTime {
    hour: u8,
    minute: u8,
    second: u8,
}

impl FatTime {
    /// Odd seconds are rounded down, the format cannot store them.
    pub fn new(hour: u8, minute: u8, second: u8) -> Option<FatTime> {
        if hour > 23 || minute > 59 || second > 59 {
            return None;
        }
        Some(FatTime {
            hour,
            minute,
            second: second & !1,
        })
    }

    pub fn from_bits(bits: u16) -> FatTime {
        FatTime {
            hour: (bits >> 11) as u8 & 0x1F,
            minute: (bits >> 5) as u8 & 0x3F,
            second: (bits & 0x1F) as u8 * 2,
        }
    }

    pub fn bits(&self) -> u16 {
        (self.hour as u16) << 11 | (self.minute as u16) << 5 | (self.second as u16 / 2)
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn second(&self) -> u8 {
        self.second
    }
}

/// Calendar date packed as `((year - 1980) << 9) | (month << 5) | day`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FatDate {
    year: u16,
    month: u8,
    day: u8,
}

impl Default for FatDate {
    fn default() -> Self {
        Self {
            year: FAT_EPOCH_YEAR,
            month: 1,
            day: 1,
        }
    }
}

impl FatDate {
    pub fn new(year: u16, month: u8, day: u8) -> Option<FatDate> {
        if !(FAT_EPOCH_YEAR..=FAT_MAX_YEAR).contains(&year)
            || !(1..=12).contains(&month)
            || !(1..=31).contains(&day)
        {
            return None;
        }
        Some(FatDate { year, month, day })
    }

    pub fn from_bits(bits: u16) -> FatDate {
        FatDate {
            year: FAT_EPOCH_YEAR + (bits >> 9),
            month: (bits >> 5) as u8 & 0x0F,
            day: bits as u8 & 0x1F,
        }
    }

    pub fn bits(&self) -> u16 {
        (self.year - FAT_EPOCH_YEAR) << 9 | (self.month as u16) << 5 | self.day as u16
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day(&self) -> u8 {
        self.day
    }
}

/// A UTC wall-clock instant used to stamp directory entries at construction time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateTime {
    pub date: FatDate,
    pub time: FatTime,
}

impl DateTime {
    pub fn new(date: FatDate, time: FatTime) -> DateTime {
        Self { date, time }
    }

    /// Converts seconds since the Unix epoch. Instants outside the FAT range saturate to its
    /// first or last representable day.
    pub fn from_unix_seconds(secs: u64) -> DateTime {
        let days = secs / 86_400;
        let rem = secs % 86_400;
        let (year, month, day) = civil_from_days(days);

        let date = if year < FAT_EPOCH_YEAR as u64 {
            FatDate::default()
        } else if year > FAT_MAX_YEAR as u64 {
            FatDate {
                year: FAT_MAX_YEAR,
                month: 12,
                day: 31,
            }
        } else {
            FatDate {
                year: year as u16,
                month,
                day,
            }
        };
        let time = FatTime {
            hour: (rem / 3600) as u8,
            minute: (rem % 3600 / 60) as u8,
            second: (rem % 60) as u8 & !1,
        };

        Self { date, time }
    }

    pub fn try_now() -> Result<DateTime, SystemTimeError> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?;
        Ok(DateTime::from_unix_seconds(now.as_secs()))
    }
}

// Howard Hinnant's days-to-civil for the proleptic Gregorian calendar.
fn civil_from_days(days: u64) -> (u64, u8, u8) {
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + u64::from(month <= 2);
    (year, month, day)
}

#[test]
fn packs_time_and_date() {
    let time = FatTime::new(13, 45, 31).unwrap();
    assert_eq!(time.second(), 30);
    assert_eq!(time.bits(), (13 << 11) | (45 << 5) | 15);
    assert_eq!(FatTime::from_bits(time.bits()), time);

    let date = FatDate::new(2024, 3, 9).unwrap();
    assert_eq!(date.bits(), (44 << 9) | (3 << 5) | 9);
    assert_eq!(FatDate::from_bits(date.bits()), date);
}

#[test]
fn rejects_out_of_range_fields() {
    assert!(FatTime::new(24, 0, 0).is_none());
    assert!(FatTime::new(0, 60, 0).is_none());
    assert!(FatDate::new(1979, 12, 31).is_none());
    assert!(FatDate::new(2000, 13, 1).is_none());
    assert!(FatDate::new(2000, 1, 0).is_none());
}

#[test]
fn converts_unix_seconds() {
    // 2024-02-29 23:59:59 UTC
    let dt = DateTime::from_unix_seconds(1_709_251_199);
    assert_eq!(dt.date, FatDate::new(2024, 2, 29).unwrap());
    assert_eq!(dt.time, FatTime::new(23, 59, 58).unwrap());

    // before the FAT epoch
    let dt = DateTime::from_unix_seconds(0);
    assert_eq!(dt.date, FatDate::default());
}
