//! Event templates and their occurrences.
//!
//! A template is what storage keeps; occurrences are derived from it on
//! demand and never stored.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ScheduleResult;
use crate::recurrence::RecurrenceEnd;
use crate::recurrence::RecurrenceRule;
use crate::time_range::TimeRange;

/// Display color used when a draft does not name one.
pub const DEFAULT_COLOR: &str = "#1a73e8";

/// Opaque event identifier, assigned by storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        EventId(id.into())
    }

    /// A fresh random identifier, for stores without their own id scheme.
    pub fn generate() -> Self {
        EventId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        EventId(id.to_string())
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        EventId(id)
    }
}

/// A `#rgb` or `#rrggbb` color token. Opaque to scheduling, kept for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(String);

impl Color {
    /// Parse a color token, normalizing hex digits to lowercase.
    pub fn parse(token: &str) -> Option<Self> {
        let hex = token.trim().strip_prefix('#')?;
        let well_formed =
            matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit());
        well_formed.then(|| Color(format!("#{}", hex.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Color {
    fn default() -> Self {
        Color(DEFAULT_COLOR.to_string())
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(token: String) -> Result<Self, String> {
        Color::parse(&token).ok_or_else(|| format!("'{token}' is not a #rgb or #rrggbb color"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.0
    }
}

/// The stored definition of an event, single or recurring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTemplate {
    /// `None` until storage has committed the template
    pub id: Option<EventId>,
    pub title: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub color: Color,
    pub recurrence: Option<RecurrenceRule>,
    /// Opaque reference to whoever created the event
    pub created_by: Option<String>,

    // Maintained by storage
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl EventTemplate {
    /// The template's own interval, which is also its first occurrence.
    pub fn range(&self) -> ScheduleResult<TimeRange> {
        TimeRange::new(self.start, self.end)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// Whether any occurrence of this template could intersect `range`.
    ///
    /// Cheap and conservative: storage uses it to pick templates for a range
    /// query, expansion then decides exactly. Count-limited rules are assumed
    /// to reach the range.
    pub fn may_occur_within(&self, range: &TimeRange) -> bool {
        if self.start >= range.end() {
            return false;
        }

        match &self.recurrence {
            None => self.end > range.start(),
            Some(rule) => match rule.end {
                RecurrenceEnd::Until(until) => until
                    .checked_add_signed(self.duration())
                    .is_none_or(|last_end| last_end > range.start()),
                RecurrenceEnd::Never | RecurrenceEnd::AfterCount(_) => true,
            },
        }
    }
}

/// One concrete instance of a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Occurrence {
    pub template_id: Option<EventId>,
    pub range: TimeRange,
    /// 0 for single events and for the first anchor of a recurring one
    pub sequence: u32,
}

impl Occurrence {
    pub fn start(&self) -> DateTime<Utc> {
        self.range.start()
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.range.end()
    }
}

// Chronological: start, then template id, then sequence.
impl Ord for Occurrence {
    fn cmp(&self, other: &Self) -> Ordering {
        self.range
            .start()
            .cmp(&other.range.start())
            .then_with(|| self.template_id.cmp(&other.template_id))
            .then_with(|| self.sequence.cmp(&other.sequence))
            .then_with(|| self.range.end().cmp(&other.range.end()))
    }
}

impl PartialOrd for Occurrence {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
