// Copyright (c) 2024 DCHAIN LABS
//! Unsigned time management.
//!
//! Every consensus timestamp is a `ChainTime`: milliseconds since the UNIX epoch.
//! Replay windows and cadences work in whole minutes, see [`ChainTime::minutes`].
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

mod clock;
mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::TimeError;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Number of milliseconds in a minute.
pub const MILLIS_PER_MINUTE: u64 = 60_000;

/// Time structure used everywhere.
/// milliseconds since 01/01/1970.
#[derive(
    Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ChainTime(u64);

impl fmt::Display for ChainTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_millis())
    }
}

impl TryFrom<Duration> for ChainTime {
    type Error = TimeError;

    /// Conversion from `std::time::Duration`.
    /// ```
    /// # use std::time::Duration;
    /// # use dchain_time::*;
    /// let duration: Duration = Duration::from_millis(42);
    /// assert_eq!(ChainTime::from_millis(42), ChainTime::try_from(duration).unwrap());
    /// ```
    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Ok(ChainTime(
            value
                .as_millis()
                .try_into()
                .map_err(|_| TimeError::ConversionError)?,
        ))
    }
}

impl From<ChainTime> for Duration {
    fn from(value: ChainTime) -> Self {
        value.to_duration()
    }
}

impl FromStr for ChainTime {
    type Err = TimeError;

    /// Conversion from `&str`.
    ///
    /// ```
    /// # use dchain_time::*;
    /// # use std::str::FromStr;
    /// assert_eq!(ChainTime::from_millis(42), ChainTime::from_str("42").unwrap());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ChainTime(
            u64::from_str(s).map_err(|_| TimeError::ConversionError)?,
        ))
    }
}

impl ChainTime {
    /// Conversion from `u64`, representing timestamp in milliseconds.
    pub const fn from_millis(value: u64) -> Self {
        ChainTime(value)
    }

    /// Timestamp at the start of the given minute of the epoch.
    /// ```
    /// # use dchain_time::*;
    /// assert_eq!(ChainTime::from_minutes(2).to_millis(), 120_000);
    /// ```
    pub const fn from_minutes(minutes: u64) -> Self {
        ChainTime(minutes.saturating_mul(MILLIS_PER_MINUTE))
    }

    /// Gets current UNIX timestamp (resolution: milliseconds).
    pub fn now() -> Result<Self, TimeError> {
        let now: u64 = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| TimeError::TimeOverflowError)?
            .as_millis()
            .try_into()
            .map_err(|_| TimeError::TimeOverflowError)?;
        Ok(ChainTime(now))
    }

    /// Conversion to `std::time::Duration`.
    pub fn to_duration(&self) -> Duration {
        Duration::from_millis(self.0)
    }

    /// Conversion to `u64`, representing milliseconds.
    pub const fn to_millis(&self) -> u64 {
        self.0
    }

    /// Whole minutes since the epoch.
    /// ```
    /// # use dchain_time::*;
    /// assert_eq!(ChainTime::from_millis(119_999).minutes(), 1);
    /// ```
    pub const fn minutes(&self) -> u64 {
        self.0 / MILLIS_PER_MINUTE
    }

    /// ```
    /// # use dchain_time::*;
    /// let res = ChainTime::from_millis(42).saturating_sub(ChainTime::from_millis(7));
    /// assert_eq!(res, ChainTime::from_millis(35))
    /// ```
    #[must_use]
    pub fn saturating_sub(self, t: ChainTime) -> Self {
        ChainTime(self.0.saturating_sub(t.0))
    }

    /// ```
    /// # use dchain_time::*;
    /// let res = ChainTime::from_millis(42).saturating_add(ChainTime::from_millis(7));
    /// assert_eq!(res, ChainTime::from_millis(49))
    /// ```
    #[must_use]
    pub fn saturating_add(self, t: ChainTime) -> Self {
        ChainTime(self.0.saturating_add(t.0))
    }

    /// Checked subtraction.
    pub fn checked_sub(self, t: ChainTime) -> Result<Self, TimeError> {
        self.0
            .checked_sub(t.0)
            .ok_or_else(|| TimeError::CheckedOperationError("subtraction error".to_string()))
            .map(ChainTime)
    }

    /// Checked addition.
    pub fn checked_add(self, t: ChainTime) -> Result<Self, TimeError> {
        self.0
            .checked_add(t.0)
            .ok_or_else(|| TimeError::CheckedOperationError("addition error".to_string()))
            .map(ChainTime)
    }

    /// ```
    /// # use dchain_time::*;
    /// let res = ChainTime::from_millis(42).checked_div_u64(7).unwrap();
    /// assert_eq!(res, ChainTime::from_millis(6))
    /// ```
    pub fn checked_div_u64(self, n: u64) -> Result<ChainTime, TimeError> {
        self.0
            .checked_div(n)
            .ok_or_else(|| TimeError::CheckedOperationError("division error".to_string()))
            .map(ChainTime)
    }

    /// ```
    /// # use dchain_time::*;
    /// assert_eq!(ChainTime::from_millis(42).saturating_mul(7), ChainTime::from_millis(294))
    /// ```
    #[must_use]
    pub const fn saturating_mul(self, n: u64) -> ChainTime {
        ChainTime(self.0.saturating_mul(n))
    }

    /// Absolute difference between two timestamps.
    pub fn abs_diff(&self, t: ChainTime) -> ChainTime {
        ChainTime(self.0.abs_diff(t.0))
    }

    /// ```
    /// # use dchain_time::*;
    /// let t = ChainTime::from_millis(1_640_995_200_000);
    /// assert_eq!(t.format_instant().unwrap(), String::from("2022-01-01T00:00:00Z"))
    /// ```
    pub fn format_instant(&self) -> Result<String, TimeError> {
        let secs = i64::try_from(self.to_millis() / 1000).map_err(|_| TimeError::ConversionError)?;
        let date =
            OffsetDateTime::from_unix_timestamp(secs).map_err(|_| TimeError::ConversionError)?;
        date.format(&Rfc3339)
            .map_err(|_| TimeError::ConversionError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minutes_floor() {
        let t = ChainTime::from_minutes(10).saturating_add(ChainTime::from_millis(59_999));
        assert_eq!(t.minutes(), 10);
        assert_eq!(
            t.saturating_add(ChainTime::from_millis(1)).minutes(),
            11
        );
    }

    #[test]
    fn test_serde_is_transparent_millis() {
        let t = ChainTime::from_millis(1234);
        assert_eq!(serde_json::to_string(&t).unwrap(), "1234");
    }
}
