use serde::{Deserialize, Serialize};

use crate::{clock, LayoutParams, Px, Seconds};

/// Seconds between ruler ticks.
pub const TICK_INTERVAL: u64 = 10;
/// Ruler keeps going this far past the last scene.
pub const RULER_PADDING: u64 = 60;
pub const MAJOR_INTERVAL: u64 = 60;
/// At or above this zoom every tick gets a label (one interval spans 60px).
pub const LABEL_ALL_ZOOM: f64 = 6.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub seconds: u64,
    pub x: Px,
    pub major: bool,
    pub label: Option<String>,
}

/// Tick generator for one zoom and duration. Cheap to copy; iterate as often
/// as needed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ruler {
    pub zoom: f64,
    pub total_duration: Seconds,
    pub params: LayoutParams,
}

impl Ruler {
    pub fn new(zoom: f64, total_duration: Seconds, params: LayoutParams) -> Self {
        Self {
            zoom,
            total_duration,
            params,
        }
    }

    /// Last tick time, inclusive.
    pub fn end_seconds(&self) -> u64 {
        let total = if self.total_duration.is_finite() && self.total_duration > 0.0 {
            self.total_duration
        } else {
            0.0
        };
        // Float to int casts saturate, so huge durations end at u64::MAX.
        (total + RULER_PADDING as f64).floor() as u64
    }

    pub fn labels_every_tick(&self) -> bool {
        self.zoom >= LABEL_ALL_ZOOM
    }

    pub fn ticks(&self) -> RulerTicks {
        RulerTicks {
            ruler: *self,
            next: Some(0),
        }
    }

    fn tick_at(&self, seconds: u64) -> Tick {
        let major = seconds % MAJOR_INTERVAL == 0;
        let label = if major || self.labels_every_tick() {
            Some(clock::label(seconds as f64))
        } else {
            None
        };
        Tick {
            seconds,
            x: self.params.x_at(seconds as f64, self.zoom),
            major,
            label,
        }
    }
}

impl IntoIterator for &Ruler {
    type Item = Tick;
    type IntoIter = RulerTicks;

    fn into_iter(self) -> Self::IntoIter {
        self.ticks()
    }
}

pub struct RulerTicks {
    ruler: Ruler,
    /// `None` once the tick time would overflow.
    next: Option<u64>,
}

impl Iterator for RulerTicks {
    type Item = Tick;

    fn next(&mut self) -> Option<Tick> {
        let at = self.next.filter(|at| *at <= self.ruler.end_seconds())?;
        self.next = at.checked_add(TICK_INTERVAL);
        Some(self.ruler.tick_at(at))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let end = self.ruler.end_seconds();
        let remaining = match self.next {
            Some(at) if at <= end => usize::try_from((end - at) / TICK_INTERVAL + 1).unwrap_or(usize::MAX),
            _ => 0,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RulerTicks {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_cover_duration_plus_padding() {
        let ruler = Ruler::new(1.0, 65.0, LayoutParams::default());
        let secs: Vec<_> = ruler.ticks().map(|t| t.seconds).collect();
        assert_eq!(secs.first(), Some(&0));
        assert_eq!(secs.last(), Some(&120));
        assert_eq!(secs.len(), 13);
        assert_eq!(ruler.ticks().len(), 13);
    }

    #[test]
    fn empty_timeline_still_has_padding_ticks() {
        let ruler = Ruler::new(5.0, 0.0, LayoutParams::default());
        assert_eq!(ruler.ticks().count(), 7);
    }

    #[test]
    fn major_ticks_every_minute_with_labels() {
        let ruler = Ruler::new(2.0, 200.0, LayoutParams::default());
        for tick in &ruler {
            assert_eq!(tick.major, tick.seconds % 60 == 0);
            assert_eq!(tick.label.is_some(), tick.major);
        }
        let minute = ruler.ticks().find(|t| t.seconds == 120).unwrap();
        assert_eq!(minute.label.as_deref(), Some("2:00"));
        assert_eq!(minute.x, 20.0 + 240.0);
    }

    #[test]
    fn high_zoom_labels_every_tick() {
        let ruler = Ruler::new(6.0, 30.0, LayoutParams::default());
        let tick = ruler.ticks().find(|t| t.seconds == 10).unwrap();
        assert!(!tick.major);
        assert_eq!(tick.label.as_deref(), Some("0:10"));
    }

    #[test]
    fn huge_duration_stops_instead_of_overflowing() {
        let ruler = Ruler::new(1.0, f64::MAX, LayoutParams::default());
        assert_eq!(ruler.end_seconds(), u64::MAX);
        let mut ticks = RulerTicks {
            ruler,
            next: Some(u64::MAX - 5),
        };
        assert_eq!(ticks.next().map(|t| t.seconds), Some(u64::MAX - 5));
        assert_eq!(ticks.len(), 0);
        assert!(ticks.next().is_none());
    }

    #[test]
    fn ruler_is_restartable() {
        let ruler = Ruler::new(3.0, 90.0, LayoutParams::default());
        let first: Vec<_> = ruler.ticks().collect();
        let second: Vec<_> = ruler.ticks().collect();
        assert_eq!(first, second);
    }
}
