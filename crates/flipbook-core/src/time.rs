//! Exact timestamps for video sampling.
//!
//! Sample times are computed as `index * duration / count`; keeping them
//! rational means the last sample lands exactly where it should no matter
//! how long the clip is.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul};
use std::time::Duration;

/// A point in time, in seconds, as an exact fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RationalTime {
    value: Rational64,
}

impl RationalTime {
    pub const ZERO: Self = Self {
        value: Rational64::new_raw(0, 1),
    };

    /// `numerator / denominator` seconds.
    #[inline]
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self {
            value: Rational64::new(numerator, denominator),
        }
    }

    #[inline]
    pub fn from_millis(millis: i64) -> Self {
        Self::new(millis, 1000)
    }

    /// Start of frame `frames` at `rate`.
    #[inline]
    pub fn from_frames(frames: i64, rate: FrameRate) -> Self {
        Self::new(frames * rate.denominator as i64, rate.numerator as i64)
    }

    /// Exact to the nanosecond.
    pub fn from_duration(duration: Duration) -> Self {
        Self::new(duration.as_nanos() as i64, 1_000_000_000)
    }

    /// Microsecond precision, which is what container metadata carries.
    pub fn from_seconds_f64(seconds: f64) -> Self {
        Self::new((seconds * 1_000_000.0).round() as i64, 1_000_000)
    }

    #[inline]
    pub fn to_seconds_f64(self) -> f64 {
        *self.value.numer() as f64 / *self.value.denom() as f64
    }

    #[inline]
    pub fn as_millis_floor(self) -> i64 {
        (self.value * 1000).floor().to_integer()
    }

    /// Negative times clamp to zero.
    pub fn to_duration(self) -> Duration {
        if !self.is_positive() {
            return Duration::ZERO;
        }
        Duration::from_nanos((self.value * 1_000_000_000).floor().to_integer() as u64)
    }

    /// Whole frames that fit before this time at `rate`.
    #[inline]
    pub fn to_frames(self, rate: FrameRate) -> i64 {
        (self.value * Rational64::new(rate.numerator as i64, rate.denominator as i64))
            .floor()
            .to_integer()
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        *self.value.numer() == 0
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        *self.value.numer() > 0
    }
}

impl Default for RationalTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for RationalTime {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            value: self.value + rhs.value,
        }
    }
}

impl Mul<i64> for RationalTime {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        Self {
            value: self.value * rhs,
        }
    }
}

impl Div<i64> for RationalTime {
    type Output = Self;
    fn div(self, rhs: i64) -> Self {
        Self {
            value: self.value / rhs,
        }
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.to_seconds_f64())
    }
}

/// Half-open span `[start, start + duration)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: RationalTime,
    pub duration: RationalTime,
}

impl TimeRange {
    pub fn new(start: RationalTime, duration: RationalTime) -> Self {
        Self { start, duration }
    }

    pub fn end(self) -> RationalTime {
        self.start + self.duration
    }

    pub fn contains(self, time: RationalTime) -> bool {
        time >= self.start && time < self.end()
    }
}

/// Frames per second as `numerator / denominator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    pub numerator: u32,
    pub denominator: u32,
}

impl FrameRate {
    /// Sampling rate used for video exports unless the caller picks one.
    pub const FPS_10: Self = Self::new(10, 1);

    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    #[inline]
    pub const fn fps(fps: u32) -> Self {
        Self::new(fps, 1)
    }

    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_10
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator == 1 {
            write!(f, "{} fps", self.numerator)
        } else {
            write!(f, "{:.3} fps", self.to_fps_f64())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_round_trip() {
        let rate = FrameRate::fps(10);
        let time = RationalTime::from_frames(25, rate);
        assert_eq!(time, RationalTime::new(5, 2));
        assert_eq!(time.to_frames(rate), 25);
    }

    #[test]
    fn test_to_frames_floors() {
        assert_eq!(RationalTime::from_millis(1050).to_frames(FrameRate::FPS_10), 10);
        assert_eq!(RationalTime::from_millis(99).to_frames(FrameRate::FPS_10), 0);
    }

    #[test]
    fn test_even_spacing_is_exact() {
        let duration = RationalTime::new(7, 3);
        let step = duration / 70;
        assert_eq!(step * 70, duration);
        assert_eq!(step * 3, RationalTime::new(1, 10));
    }

    #[test]
    fn test_from_seconds_f64() {
        assert_eq!(RationalTime::from_seconds_f64(1.5), RationalTime::new(3, 2));
        assert!(RationalTime::from_seconds_f64(0.0).is_zero());
        assert!(!RationalTime::from_seconds_f64(-1.0).is_positive());
    }

    #[test]
    fn test_duration_conversions() {
        let t = RationalTime::from_duration(Duration::from_millis(1250));
        assert_eq!(t, RationalTime::new(5, 4));
        assert_eq!(t.as_millis_floor(), 1250);
        assert_eq!(t.to_duration(), Duration::from_millis(1250));
        assert_eq!(RationalTime::new(-1, 2).to_duration(), Duration::ZERO);
    }

    #[test]
    fn test_range_is_half_open() {
        let range = TimeRange::new(RationalTime::ZERO, RationalTime::new(2, 1));
        assert!(range.contains(RationalTime::ZERO));
        assert!(range.contains(RationalTime::new(19, 10)));
        assert!(!range.contains(range.end()));
    }

    #[test]
    fn test_display() {
        assert_eq!(RationalTime::new(1, 10).to_string(), "0.100s");
        assert_eq!(FrameRate::fps(30).to_string(), "30 fps");
        assert_eq!(FrameRate::new(30000, 1001).to_string(), "29.970 fps");
    }
}
