//! Wall-clock labels for the ruler and the scene inspector.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Seconds;

/// Minutes and seconds, displayed as `m:ss` with unpadded minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClockTime {
    pub minutes: u64,
    pub seconds: u64,
}

impl ClockTime {
    /// Truncates fractional seconds; negative input reads as zero.
    pub fn from_seconds(seconds: Seconds) -> Self {
        let whole = if seconds.is_finite() && seconds > 0.0 {
            seconds.floor() as u64
        } else {
            0
        };
        Self {
            minutes: whole / 60,
            seconds: whole % 60,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        self.minutes * 60 + self.seconds
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.minutes, self.seconds)
    }
}

pub fn label(seconds: Seconds) -> String {
    ClockTime::from_seconds(seconds).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_pad_seconds_only() {
        assert_eq!(label(0.0), "0:00");
        assert_eq!(label(70.0), "1:10");
        assert_eq!(label(605.9), "10:05");
        assert_eq!(label(-3.0), "0:00");
    }

    #[test]
    fn total_seconds_round_trips_whole_values() {
        assert_eq!(ClockTime::from_seconds(3599.0).total_seconds(), 3599);
    }
}
