//! OSC timetags
//!
//! A timetag is a 64-bit fixed-point timestamp: 32 bits of seconds since
//! 1900-01-01T00:00:00Z and 32 bits of fractional seconds in units of
//! 1/2^32 second. Arithmetic with real-number second offsets carries and
//! borrows between the two halves, wrapping at the end of the 32-bit era.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use chrono::{DateTime, TimeDelta, Utc};
use rosc::OscTime;

use crate::{Error, Result};

/// Fractional ticks per second
pub const FRAC_PER_SEC: u64 = 1 << 32;

/// Seconds between the OSC epoch (1900) and the Unix epoch (1970)
pub const JAN_1970: u32 = 2_208_988_800;

/// The "process immediately" timetag
pub const TT_IMMEDIATE: TimeTag = TimeTag { sec: 0, frac: 1 };

const NANOS_PER_SEC: u64 = 1_000_000_000;
const ERA: i128 = 1 << 64;

fn datetime_ticks(dt: &DateTime<Utc>) -> i128 {
    let secs = dt.timestamp() + JAN_1970 as i64;
    // Leap seconds report up to 2e9 nanos
    let nanos = (dt.timestamp_subsec_nanos() as u64).min(NANOS_PER_SEC - 1);
    let frac = ((nanos << 32) + NANOS_PER_SEC / 2) / NANOS_PER_SEC;
    ((secs as i128) << 32) + frac as i128
}

/// The OSC epoch, 1900-01-01T00:00:00Z
pub fn epoch_utc() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH - TimeDelta::seconds(JAN_1970 as i64)
}

/// Convert a Unix timestamp in seconds to an OSC timestamp in seconds
pub fn unix_timestamp_to_osc_timestamp(unix: f64) -> f64 {
    unix + JAN_1970 as f64
}

/// An OSC timetag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeTag {
    sec: u32,
    frac: u32,
}

impl TimeTag {
    pub const fn new(sec: u32, frac: u32) -> Self {
        Self { sec, frac }
    }

    /// The current wall-clock time
    pub fn now() -> Self {
        Self::from_datetime(&Utc::now())
    }

    pub const fn sec(&self) -> u32 {
        self.sec
    }

    pub const fn frac(&self) -> u32 {
        self.frac
    }

    pub fn is_immediate(&self) -> bool {
        *self == TT_IMMEDIATE
    }

    /// Seconds and fraction as one 64-bit tick count
    pub const fn ticks(&self) -> u64 {
        ((self.sec as u64) << 32) | self.frac as u64
    }

    pub const fn from_ticks(ticks: u64) -> Self {
        Self {
            sec: (ticks >> 32) as u32,
            frac: ticks as u32,
        }
    }

    fn from_ticks_wrapping(ticks: i128) -> Self {
        Self::from_ticks(ticks.rem_euclid(ERA) as u64)
    }

    /// Convert a datetime, wrapping outside the 1900-2036 era
    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        Self::from_ticks_wrapping(datetime_ticks(dt))
    }

    /// Convert a datetime; `Overflow` outside the 1900-2036 era
    pub fn try_from_datetime(dt: &DateTime<Utc>) -> Result<Self> {
        let ticks = datetime_ticks(dt);
        if !(0..ERA).contains(&ticks) {
            return Err(Error::Overflow(format!(
                "{} is outside the timetag range",
                dt.to_rfc3339()
            )));
        }
        Ok(Self::from_ticks(ticks as u64))
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        let mut secs = self.sec as i64 - JAN_1970 as i64;
        let mut nanos = ((self.frac as u64) * NANOS_PER_SEC + (1 << 31)) >> 32;
        if nanos >= NANOS_PER_SEC {
            secs += 1;
            nanos -= NANOS_PER_SEC;
        }
        DateTime::UNIX_EPOCH + TimeDelta::seconds(secs) + TimeDelta::nanoseconds(nanos as i64)
    }

    /// Build from seconds since 1900 (not a Unix timestamp)
    pub fn from_osc_timestamp(ts: f64) -> Result<Self> {
        if !ts.is_finite() || ts < 0.0 || ts >= FRAC_PER_SEC as f64 {
            return Err(Error::Overflow(format!(
                "OSC timestamp {} is outside the timetag range",
                ts
            )));
        }
        let ticks = (ts * FRAC_PER_SEC as f64).round();
        if ticks >= u64::MAX as f64 {
            return Err(Error::Overflow(format!(
                "OSC timestamp {} is outside the timetag range",
                ts
            )));
        }
        Ok(Self::from_ticks(ticks as u64))
    }

    /// Seconds since 1900
    pub fn osc_timestamp(&self) -> f64 {
        self.sec as f64 + self.frac as f64 / FRAC_PER_SEC as f64
    }

    /// Seconds since 1970
    pub fn unix_timestamp(&self) -> f64 {
        self.osc_timestamp() - JAN_1970 as f64
    }

    fn offset(self, secs: f64) -> Self {
        let delta = (secs * FRAC_PER_SEC as f64).round() as i128;
        Self::from_ticks_wrapping(self.ticks() as i128 + delta)
    }
}

impl Default for TimeTag {
    fn default() -> Self {
        TT_IMMEDIATE
    }
}

impl Add<f64> for TimeTag {
    type Output = TimeTag;

    fn add(self, secs: f64) -> TimeTag {
        self.offset(secs)
    }
}

impl Sub<f64> for TimeTag {
    type Output = TimeTag;

    fn sub(self, secs: f64) -> TimeTag {
        self.offset(-secs)
    }
}

impl AddAssign<f64> for TimeTag {
    fn add_assign(&mut self, secs: f64) {
        *self = self.offset(secs);
    }
}

impl SubAssign<f64> for TimeTag {
    fn sub_assign(&mut self, secs: f64) {
        *self = self.offset(-secs);
    }
}

/// Difference in seconds
impl Sub for TimeTag {
    type Output = f64;

    fn sub(self, other: TimeTag) -> f64 {
        (self.ticks() as i128 - other.ticks() as i128) as f64 / FRAC_PER_SEC as f64
    }
}

impl From<(u32, u32)> for TimeTag {
    fn from((sec, frac): (u32, u32)) -> Self {
        Self::new(sec, frac)
    }
}

impl From<TimeTag> for (u32, u32) {
    fn from(tt: TimeTag) -> Self {
        (tt.sec, tt.frac)
    }
}

impl From<DateTime<Utc>> for TimeTag {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_datetime(&dt)
    }
}

impl From<TimeTag> for DateTime<Utc> {
    fn from(tt: TimeTag) -> Self {
        tt.to_datetime()
    }
}

impl From<OscTime> for TimeTag {
    fn from(t: OscTime) -> Self {
        Self::new(t.seconds, t.fractional)
    }
}

impl From<TimeTag> for OscTime {
    fn from(tt: TimeTag) -> Self {
        OscTime {
            seconds: tt.sec,
            fractional: tt.frac,
        }
    }
}

impl PartialEq<(u32, u32)> for TimeTag {
    fn eq(&self, other: &(u32, u32)) -> bool {
        (self.sec, self.frac) == *other
    }
}

impl PartialEq<DateTime<Utc>> for TimeTag {
    fn eq(&self, other: &DateTime<Utc>) -> bool {
        *self == TimeTag::from_datetime(other)
    }
}

impl PartialOrd<DateTime<Utc>> for TimeTag {
    fn partial_cmp(&self, other: &DateTime<Utc>) -> Option<Ordering> {
        Some(self.cmp(&TimeTag::from_datetime(other)))
    }
}

impl fmt::Display for TimeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeTag({}, {})", self.sec, self.frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immediate_default() {
        assert_eq!(TimeTag::default(), TT_IMMEDIATE);
        assert_eq!(TT_IMMEDIATE, (0, 1));
        assert!(TimeTag::default().is_immediate());
    }

    #[test]
    fn test_frac_carry() {
        let tt = TimeTag::new(1, u32::MAX) + 1.0 / FRAC_PER_SEC as f64;
        assert_eq!(tt, (2, 0));
    }

    #[test]
    fn test_frac_borrow() {
        let tt = TimeTag::new(2, 0) - 1.0 / FRAC_PER_SEC as f64;
        assert_eq!(tt, (1, u32::MAX));
    }

    #[test]
    fn test_osc_timestamp_out_of_range() {
        assert!(matches!(TimeTag::from_osc_timestamp(-1.0), Err(Error::Overflow(_))));
        assert!(matches!(
            TimeTag::from_osc_timestamp(f64::NAN),
            Err(Error::Overflow(_))
        ));
    }
}
