//! Signed second/nanosecond timestamps
//!
//! Timestamps cross the plugin boundary as a pair of 32-bit integers, so the
//! native type keeps the same representation instead of a float. Both fields
//! always carry the same sign after normalisation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A point or span in time, in seconds and nanoseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RealTime {
    pub sec: i32,
    pub nsec: i32,
}

impl RealTime {
    pub const ZERO: RealTime = RealTime { sec: 0, nsec: 0 };

    /// Create a normalised time from seconds and nanoseconds
    pub fn new(sec: i32, nsec: i32) -> Self {
        Self::from_nanos(sec as i64 * NANOS_PER_SEC + nsec as i64)
    }

    /// Create from a total nanosecond count
    pub fn from_nanos(total: i64) -> Self {
        Self {
            sec: (total / NANOS_PER_SEC) as i32,
            nsec: (total % NANOS_PER_SEC) as i32,
        }
    }

    pub fn from_seconds(seconds: f64) -> Self {
        Self::from_nanos((seconds * NANOS_PER_SEC as f64).round() as i64)
    }

    pub fn from_millis(millis: i64) -> Self {
        Self::from_nanos(millis * 1_000_000)
    }

    pub fn as_nanos(&self) -> i64 {
        self.sec as i64 * NANOS_PER_SEC + self.nsec as i64
    }

    pub fn to_seconds(&self) -> f64 {
        self.sec as f64 + self.nsec as f64 / NANOS_PER_SEC as f64
    }

    pub fn is_negative(&self) -> bool {
        self.sec < 0 || self.nsec < 0
    }

    /// Time of audio frame `frame` at `sample_rate`
    pub fn frame_to_real_time(frame: i64, sample_rate: f32) -> Self {
        if sample_rate <= 0.0 {
            return Self::ZERO;
        }
        Self::from_nanos((frame as f64 * NANOS_PER_SEC as f64 / sample_rate as f64).round() as i64)
    }

    /// Nearest audio frame to `time` at `sample_rate`
    pub fn real_time_to_frame(time: RealTime, sample_rate: f32) -> i64 {
        (time.to_seconds() * sample_rate as f64).round() as i64
    }
}

impl Add for RealTime {
    type Output = RealTime;

    fn add(self, rhs: RealTime) -> RealTime {
        RealTime::from_nanos(self.as_nanos() + rhs.as_nanos())
    }
}

impl Sub for RealTime {
    type Output = RealTime;

    fn sub(self, rhs: RealTime) -> RealTime {
        RealTime::from_nanos(self.as_nanos() - rhs.as_nanos())
    }
}

impl Neg for RealTime {
    type Output = RealTime;

    fn neg(self) -> RealTime {
        RealTime::from_nanos(-self.as_nanos())
    }
}

impl fmt::Display for RealTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = self.as_nanos();
        let sign = if nanos < 0 { "-" } else { "" };
        let nanos = nanos.abs();
        write!(
            f,
            "{}{}.{:09}",
            sign,
            nanos / NANOS_PER_SEC,
            nanos % NANOS_PER_SEC
        )
    }
}
