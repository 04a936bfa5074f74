use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

// ---------------------------------------------------------------------------
// TimeUs
// ---------------------------------------------------------------------------

/// A point or span on the media timeline, in microseconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeUs(pub i64);

impl TimeUs {
    pub const ZERO: Self = Self(0);

    pub fn from_seconds(s: f64) -> Self {
        Self((s * 1_000_000.0).round() as i64)
    }

    pub fn as_seconds(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Scale `total` by a fraction in `[0, 1]`. Non-finite fractions count as 0.
    pub fn from_fraction(total: TimeUs, fraction: f64) -> Self {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self((total.0 as f64 * fraction).round() as i64)
    }

    /// `MM:SS.cc` with centiseconds truncated. Minutes are not wrapped into hours.
    pub fn display_label(&self) -> String {
        let total_us = self.0.unsigned_abs();
        let total_cs = total_us / 10_000;
        let cs = total_cs % 100;
        let total_secs = total_cs / 100;
        let secs = total_secs % 60;
        let mins = total_secs / 60;
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{sign}{mins:02}:{secs:02}.{cs:02}")
    }
}

impl Add for TimeUs {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for TimeUs {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Display for TimeUs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_label())
    }
}

// ---------------------------------------------------------------------------
// PositionInput
// ---------------------------------------------------------------------------

/// A time coming from a slider (normalized) or from a player / text field (absolute).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum PositionInput {
    Normalized(f64),
    Absolute(TimeUs),
}

impl PositionInput {
    pub fn resolve(self, total: TimeUs) -> TimeUs {
        match self {
            PositionInput::Normalized(fraction) => TimeUs::from_fraction(total, fraction),
            PositionInput::Absolute(time) => time,
        }
    }
}

// ---------------------------------------------------------------------------
// TrimEdge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TrimEdge {
    Leading,
    Trailing,
}

// ---------------------------------------------------------------------------
// TrimRange
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrimRange {
    pub start: TimeUs,
    pub end: TimeUs,
}

impl TrimRange {
    pub fn new(start: TimeUs, end: TimeUs) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> TimeUs {
        self.end - self.start
    }

    pub fn contains(&self, time: TimeUs) -> bool {
        self.start <= time && time <= self.end
    }
}

// ---------------------------------------------------------------------------
// Adjustment
// ---------------------------------------------------------------------------

/// How a trim update was applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Adjustment {
    /// The requested value was used as-is.
    Exact,
    /// The dragged edge stopped at the minimum selection distance from the other edge.
    RangeTooNarrow,
    /// The requested value fell outside the media and was pinned to its bounds.
    OutOfBounds,
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectionSnapshot {
    pub trim_start: TimeUs,
    pub trim_end: TimeUs,
    pub playback_position: TimeUs,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisplayLabels {
    pub trim_start: String,
    pub trim_end: String,
    pub duration: String,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Instructions for whatever is playing the media.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlayerCommand {
    Play,
    Pause,
    Seek(TimeUs),
    /// Playback stops (and the loop restarts) once this time is reached.
    SetForwardEnd(TimeUs),
}

/// Everything the selection model reports to its host, in emission order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimelineEvent {
    Ready { total: TimeUs },
    Player(PlayerCommand),
    SelectionChanged(TrimRange),
    TrimCommitted(TrimRange),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
