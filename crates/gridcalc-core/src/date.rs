//! Serial date numbers
//!
//! Dates are stored as day counts from a base date. In the 1900 system serial 1
//! is 1900-01-01 and the calendar carries the historical phantom day
//! 1900-02-29 as serial 60. In the 1904 system serial 0 is 1904-01-01.

use chrono::{Days, NaiveDate};

/// Which base date serial numbers count from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DateSystem {
    #[default]
    Excel1900,
    Excel1904,
}

const PHANTOM_LEAP_DAY: i64 = 60;

/// Serial of 9999-12-31 in the 1900 system
const LAST_SERIAL_1900: i64 = 2_958_465;

/// Days between the 1900 and 1904 epochs
const EPOCH_GAP_1904: i64 = 1_462;

fn epoch_1900() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 31).unwrap_or(NaiveDate::MIN)
}

fn epoch_1904() -> NaiveDate {
    NaiveDate::from_ymd_opt(1904, 1, 1).unwrap_or(NaiveDate::MIN)
}

impl DateSystem {
    pub fn from_1904_flag(date_1904: bool) -> Self {
        if date_1904 {
            DateSystem::Excel1904
        } else {
            DateSystem::Excel1900
        }
    }

    /// Serial of the last supported day, 9999-12-31.
    pub fn max_serial(self) -> i64 {
        match self {
            DateSystem::Excel1900 => LAST_SERIAL_1900,
            DateSystem::Excel1904 => LAST_SERIAL_1900 - EPOCH_GAP_1904,
        }
    }

    /// Serial number of a calendar date.
    pub fn serial_from_date(self, date: NaiveDate) -> i64 {
        match self {
            DateSystem::Excel1900 => {
                let days = (date - epoch_1900()).num_days();
                if days >= PHANTOM_LEAP_DAY {
                    days + 1
                } else {
                    days
                }
            }
            DateSystem::Excel1904 => (date - epoch_1904()).num_days(),
        }
    }

    /// Calendar date of a serial number, ignoring any time fraction.
    ///
    /// Returns `None` for serials before the epoch, past the supported
    /// calendar, or for the phantom 1900-02-29.
    pub fn date_from_serial(self, serial: f64) -> Option<NaiveDate> {
        if !serial.is_finite() || serial >= (self.max_serial() + 1) as f64 {
            return None;
        }
        let serial = serial.floor() as i64;
        match self {
            DateSystem::Excel1900 => {
                if serial < 1 || serial == PHANTOM_LEAP_DAY {
                    return None;
                }
                let days = if serial > PHANTOM_LEAP_DAY {
                    serial - 1
                } else {
                    serial
                };
                epoch_1900().checked_add_days(Days::new(u64::try_from(days).ok()?))
            }
            DateSystem::Excel1904 => {
                let days = u64::try_from(serial).ok()?;
                epoch_1904().checked_add_days(Days::new(days))
            }
        }
    }
}
