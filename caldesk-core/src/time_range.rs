//! Half-open instant intervals.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ScheduleError, ScheduleResult};

/// An interval `[start, end)` of UTC instants.
///
/// `start < end` always holds; the only way in is through `TimeRange::new`
/// (deserialization goes through the same check).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimeRange")]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawTimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawTimeRange> for TimeRange {
    type Error = ScheduleError;

    fn try_from(raw: RawTimeRange) -> ScheduleResult<Self> {
        TimeRange::new(raw.start, raw.end)
    }
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> ScheduleResult<Self> {
        if start >= end {
            return Err(ScheduleError::InvalidArgument(format!(
                "range start {} must be before end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(TimeRange { start, end })
    }

    /// Range of `days` whole 24h days from `start`. `days` must be positive.
    pub(crate) fn spanning_days(start: DateTime<Utc>, days: i64) -> ScheduleResult<Self> {
        let end = Duration::try_days(days)
            .and_then(|span| start.checked_add_signed(span))
            .ok_or_else(|| {
                ScheduleError::InvalidArgument(format!(
                    "{days} days from {} is outside the supported calendar",
                    start.to_rfc3339()
                ))
            })?;
        TimeRange::new(start, end)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// True when the two ranges share at least one instant.
    /// Ranges that only touch (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// The shared part of two ranges, if any.
    pub fn intersection(&self, other: &TimeRange) -> Option<TimeRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(TimeRange { start, end })
    }

    /// Split into consecutive 24h cells from `start`; the last cell is cut at `end`.
    ///
    /// For a view range this yields one cell per grid day.
    pub fn days(self) -> impl Iterator<Item = TimeRange> {
        let end = self.end;
        std::iter::successors(Some(self.start), |cursor| {
            cursor.checked_add_signed(Duration::days(1))
        })
        .take_while(move |cursor| *cursor < end)
        .map(move |cursor| TimeRange {
            start: cursor,
            end: cursor
                .checked_add_signed(Duration::days(1))
                .map_or(end, |next| next.min(end)),
        })
    }
}
