//! Recurrence rules and their expansion into occurrences.
//!
//! Anchors are always computed from the template start (anchor `n` is
//! `start + n * interval` units), never from the previous anchor, so a
//! monthly rule on the 31st keeps returning to the 31st.
//!
//! Calendar irregularities:
//! - monthly: a month without the anchor's day of month is skipped, not
//!   shifted. Skipped months are not anchors: they take no sequence index
//!   and do not count towards `AfterCount`.
//! - yearly: Feb 29 falls back to Feb 28 in non-leap years.
//!
//! Exception anchors are dropped from the output but still take their
//! sequence index and count, matching RFC 5545 EXDATE behavior.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rrule::{RRule, Unvalidated};
use serde::{Deserialize, Serialize};

use crate::error::{ScheduleError, ScheduleResult};
use crate::event::{EventTemplate, Occurrence};
use crate::time_range::TimeRange;

/// RRULE parts this engine understands; anything else is refused on parse.
const SUPPORTED_RRULE_PARTS: [&str; 4] = ["FREQ", "INTERVAL", "COUNT", "UNTIL"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(Frequency::Daily),
            "weekly" => Some(Frequency::Weekly),
            "monthly" => Some(Frequency::Monthly),
            "yearly" => Some(Frequency::Yearly),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }

    /// Length of one step for frequencies with a fixed length.
    fn fixed_days(self) -> Option<i64> {
        match self {
            Frequency::Daily => Some(1),
            Frequency::Weekly => Some(7),
            Frequency::Monthly | Frequency::Yearly => None,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// When a recurrence stops producing anchors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceEnd {
    #[default]
    Never,
    /// Stop after this many anchors (at least 1)
    AfterCount(u32),
    /// No anchor later than this instant (inclusive)
    Until(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// Units of `frequency` between anchors, at least 1
    pub interval: u32,
    #[serde(default)]
    pub end: RecurrenceEnd,
    /// Anchor instants to skip. Instants that are not anchors have no effect.
    #[serde(default)]
    pub exceptions: BTreeSet<DateTime<Utc>>,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        RecurrenceRule {
            frequency,
            interval: 1,
            end: RecurrenceEnd::Never,
            exceptions: BTreeSet::new(),
        }
    }

    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.end = RecurrenceEnd::AfterCount(count);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.end = RecurrenceEnd::Until(until);
        self
    }

    pub fn except(mut self, anchor: DateTime<Utc>) -> Self {
        self.exceptions.insert(anchor);
        self
    }
}

/// Parses the RRULE text form, e.g. `FREQ=WEEKLY;INTERVAL=2;COUNT=5`.
///
/// An optional `RRULE:` prefix is accepted. Exceptions are not part of the
/// RRULE text and come back empty.
impl FromStr for RecurrenceRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        let trimmed = s.trim();
        let body = trimmed.strip_prefix("RRULE:").unwrap_or(trimmed);

        for part in body.split(';').filter(|p| !p.trim().is_empty()) {
            let key = part.split('=').next().unwrap_or_default().trim().to_ascii_uppercase();
            if !SUPPORTED_RRULE_PARTS.contains(&key.as_str()) {
                return Err(format!("unsupported RRULE part '{key}'"));
            }
        }

        let parsed: RRule<Unvalidated> = body
            .parse()
            .map_err(|e| format!("invalid RRULE '{body}': {e}"))?;

        let frequency = match parsed.get_freq() {
            rrule::Frequency::Daily => Frequency::Daily,
            rrule::Frequency::Weekly => Frequency::Weekly,
            rrule::Frequency::Monthly => Frequency::Monthly,
            rrule::Frequency::Yearly => Frequency::Yearly,
            other => return Err(format!("unsupported RRULE frequency {other:?}")),
        };

        let end = match (parsed.get_count(), parsed.get_until()) {
            (Some(_), Some(_)) => return Err("RRULE cannot have both COUNT and UNTIL".into()),
            (Some(count), None) => RecurrenceEnd::AfterCount(count),
            (None, Some(until)) => RecurrenceEnd::Until(until.with_timezone(&Utc)),
            (None, None) => RecurrenceEnd::Never,
        };

        Ok(RecurrenceRule {
            frequency,
            interval: u32::from(parsed.get_interval()),
            end,
            exceptions: BTreeSet::new(),
        })
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FREQ={}", self.frequency.name().to_ascii_uppercase())?;
        if self.interval != 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        match self.end {
            RecurrenceEnd::Never => Ok(()),
            RecurrenceEnd::AfterCount(count) => write!(f, ";COUNT={}", count),
            RecurrenceEnd::Until(until) => write!(f, ";UNTIL={}", until.format("%Y%m%dT%H%M%SZ")),
        }
    }
}

/// Expand `template` into its occurrences intersecting `query`.
///
/// The returned iterator is lazy, finite (it stops once anchors pass
/// `query.end()`), and yields occurrences in ascending start order. Call
/// again or clone it to restart.
///
/// A template without a recurrence rule yields its own interval once, if it
/// intersects `query`.
pub fn expand<'a>(template: &'a EventTemplate, query: &TimeRange) -> ScheduleResult<Occurrences<'a>> {
    let own = template.range()?;

    let state = match &template.recurrence {
        None => ExpansionState::Single,
        Some(rule) => {
            if rule.interval == 0 {
                return Err(ScheduleError::InvalidArgument(format!(
                    "recurrence interval must be at least 1 (template '{}')",
                    template.title
                )));
            }
            let first = first_useful_step(template, rule, own, query);
            ExpansionState::Stepping {
                step: first,
                sequence: first,
            }
        }
    };

    Ok(Occurrences {
        template,
        query: *query,
        duration: own.duration(),
        state,
    })
}

/// Lazy occurrence sequence produced by [`expand`].
#[derive(Debug, Clone)]
pub struct Occurrences<'a> {
    template: &'a EventTemplate,
    query: TimeRange,
    duration: Duration,
    state: ExpansionState,
}

#[derive(Debug, Clone, Copy)]
enum ExpansionState {
    Single,
    Stepping { step: u32, sequence: u32 },
    Done,
}

/// Where step `n` of a rule lands.
enum Anchor {
    At(DateTime<Utc>),
    /// The step falls on a month without the anchor's day; carries the
    /// start of that month so expansion still knows when to stop.
    Missing(DateTime<Utc>),
    /// Past the representable calendar
    OutOfRange,
}

impl Iterator for Occurrences<'_> {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Occurrence> {
        match self.state {
            ExpansionState::Done => None,
            ExpansionState::Single => {
                self.state = ExpansionState::Done;
                let range = TimeRange::new(self.template.start, self.template.end).ok()?;
                range.overlaps(&self.query).then(|| Occurrence {
                    template_id: self.template.id.clone(),
                    range,
                    sequence: 0,
                })
            }
            ExpansionState::Stepping { .. } => self.next_recurring(),
        }
    }
}

impl Occurrences<'_> {
    fn next_recurring(&mut self) -> Option<Occurrence> {
        let rule = self.template.recurrence.as_ref()?;

        while let ExpansionState::Stepping { step, sequence } = self.state {
            let Some(next_step) = step.checked_add(1) else {
                self.state = ExpansionState::Done;
                return None;
            };

            let anchor = match anchor_at(self.template.start, rule, step) {
                Anchor::OutOfRange => break,
                Anchor::Missing(month_start) => {
                    if month_start > self.query.end() {
                        break;
                    }
                    self.state = ExpansionState::Stepping { step: next_step, sequence };
                    continue;
                }
                Anchor::At(anchor) => anchor,
            };

            if anchor > self.query.end() {
                break;
            }
            match rule.end {
                RecurrenceEnd::Until(until) if anchor > until => break,
                RecurrenceEnd::AfterCount(count) if sequence >= count => break,
                _ => {}
            }

            self.state = ExpansionState::Stepping {
                step: next_step,
                sequence: sequence.saturating_add(1),
            };

            if rule.exceptions.contains(&anchor) {
                continue;
            }

            let Some(range) = anchor
                .checked_add_signed(self.duration)
                .and_then(|end| TimeRange::new(anchor, end).ok())
            else {
                break;
            };
            if range.overlaps(&self.query) {
                return Some(Occurrence {
                    template_id: self.template.id.clone(),
                    range,
                    sequence,
                });
            }
        }

        self.state = ExpansionState::Done;
        None
    }
}

/// For fixed-length steps, skip every anchor whose occurrence ends before the
/// query starts. Those frequencies never skip an anchor, so the step number
/// is also the sequence number.
fn first_useful_step(
    template: &EventTemplate,
    rule: &RecurrenceRule,
    own: TimeRange,
    query: &TimeRange,
) -> u32 {
    let Some(days) = rule.frequency.fixed_days() else {
        return 0;
    };

    let step_seconds = days * 86_400 * i64::from(rule.interval);
    // A query starting before the calendar can hold `start - duration` begins
    // before the first anchor anyway
    let Some(earliest_useful) = query.start().checked_sub_signed(own.duration()) else {
        return 0;
    };
    let lead = (earliest_useful - template.start).num_seconds();
    if lead <= 0 {
        return 0;
    }

    u32::try_from(lead / step_seconds).unwrap_or(u32::MAX)
}

fn anchor_at(start: DateTime<Utc>, rule: &RecurrenceRule, step: u32) -> Anchor {
    let Some(units) = i64::from(step).checked_mul(i64::from(rule.interval)) else {
        return Anchor::OutOfRange;
    };
    let date = start.date_naive();

    let anchor_date = match rule.frequency {
        Frequency::Daily | Frequency::Weekly => {
            let days = units.checked_mul(rule.frequency.fixed_days().unwrap_or(1));
            match days
                .and_then(Duration::try_days)
                .and_then(|d| date.checked_add_signed(d))
            {
                Some(d) => d,
                None => return Anchor::OutOfRange,
            }
        }
        Frequency::Monthly => {
            let Some(total) = (i64::from(date.year()) * 12 + i64::from(date.month0())).checked_add(units)
            else {
                return Anchor::OutOfRange;
            };
            let Ok(year) = i32::try_from(total.div_euclid(12)) else {
                return Anchor::OutOfRange;
            };
            let month = total.rem_euclid(12) as u32 + 1;
            match NaiveDate::from_ymd_opt(year, month, date.day()) {
                Some(d) => d,
                None => match NaiveDate::from_ymd_opt(year, month, 1) {
                    Some(first) => return Anchor::Missing(first.and_time(start.time()).and_utc()),
                    None => return Anchor::OutOfRange,
                },
            }
        }
        Frequency::Yearly => {
            let Some(Ok(year)) = i64::from(date.year()).checked_add(units).map(i32::try_from) else {
                return Anchor::OutOfRange;
            };
            let exact = NaiveDate::from_ymd_opt(year, date.month(), date.day());
            let clamped = exact.or_else(|| {
                (date.month() == 2 && date.day() == 29)
                    .then(|| NaiveDate::from_ymd_opt(year, 2, 28))
                    .flatten()
            });
            match clamped {
                Some(d) => d,
                None => return Anchor::OutOfRange,
            }
        }
    };

    Anchor::At(anchor_date.and_time(start.time()).and_utc())
}
