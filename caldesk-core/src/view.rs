//! Calendar view boundaries.
//!
//! All arithmetic counts whole days in UTC, so grid boundaries never drift
//! across daylight-saving transitions. Hosts re-project to a display zone.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{ScheduleError, ScheduleResult};
use crate::time_range::TimeRange;

/// Rows shown by the month grid, fixed so every month fits without a partial row.
pub const MONTH_GRID_WEEKS: i64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Month,
    Week,
    Day,
}

impl View {
    /// Move `focus` by `steps` view-sized pages (negative goes back).
    ///
    /// Month pages keep the day of month, clamped to the target month's length
    /// (Jan 31 + 1 month = Feb 29 in 2024).
    pub fn shift(self, focus: NaiveDate, steps: i32) -> ScheduleResult<NaiveDate> {
        let shifted = match self {
            View::Month => {
                let months = Months::new(steps.unsigned_abs());
                if steps >= 0 {
                    focus.checked_add_months(months)
                } else {
                    focus.checked_sub_months(months)
                }
            }
            View::Week => focus.checked_add_signed(Duration::days(7 * i64::from(steps))),
            View::Day => focus.checked_add_signed(Duration::days(i64::from(steps))),
        };

        shifted.ok_or_else(|| {
            ScheduleError::InvalidArgument(format!("cannot shift {focus} by {steps} {self} pages"))
        })
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            View::Month => "month",
            View::Week => "week",
            View::Day => "day",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for View {
    type Err = ScheduleError;

    fn from_str(s: &str) -> ScheduleResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "month" => Ok(View::Month),
            "week" => Ok(View::Week),
            "day" => Ok(View::Day),
            _ => Err(ScheduleError::InvalidArgument(format!(
                "unknown view '{s}', expected month, week or day"
            ))),
        }
    }
}

/// First day of the week in week and month grids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

impl WeekStart {
    pub fn weekday(self) -> Weekday {
        match self {
            WeekStart::Monday => Weekday::Mon,
            WeekStart::Sunday => Weekday::Sun,
        }
    }
}

impl FromStr for WeekStart {
    type Err = ScheduleError;

    fn from_str(s: &str) -> ScheduleResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monday" | "mon" => Ok(WeekStart::Monday),
            "sunday" | "sun" => Ok(WeekStart::Sunday),
            _ => Err(ScheduleError::InvalidArgument(format!(
                "unknown week start '{s}', expected monday or sunday"
            ))),
        }
    }
}

/// The range a view must display around `focus`.
///
/// - day: the focus day
/// - week: 7 days from the latest `week_start` on or before `focus`
/// - month: 42 days from the week boundary containing the 1st of the month
///
/// Fails with `InvalidArgument` when the range would leave the calendar
/// chrono can represent.
pub fn compute_view_range(
    view: View,
    focus: NaiveDate,
    week_start: WeekStart,
) -> ScheduleResult<TimeRange> {
    match view {
        View::Day => TimeRange::spanning_days(midnight(focus), 1),
        View::Week => TimeRange::spanning_days(midnight(start_of_week(focus, week_start)?), 7),
        View::Month => {
            let first_of_month = focus.with_day(1).unwrap_or(focus);
            TimeRange::spanning_days(
                midnight(start_of_week(first_of_month, week_start)?),
                MONTH_GRID_WEEKS * 7,
            )
        }
    }
}

/// Latest `week_start` weekday on or before `date`.
pub fn start_of_week(date: NaiveDate, week_start: WeekStart) -> ScheduleResult<NaiveDate> {
    let today = date.weekday().num_days_from_monday();
    let first = week_start.weekday().num_days_from_monday();
    let offset = (7 + today - first) % 7;
    date.checked_sub_signed(Duration::days(i64::from(offset)))
        .ok_or_else(|| {
            ScheduleError::InvalidArgument(format!(
                "the week containing {date} starts before the supported calendar"
            ))
        })
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
