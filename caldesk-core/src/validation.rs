//! Draft validation.
//!
//! `validate` is the only way from loosely-typed input (what a host parses
//! off the wire) to an `EventTemplate`. It checks every rule and reports all
//! failing fields together; nothing is partially accepted.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{Color, EventTemplate};
use crate::recurrence::{Frequency, RecurrenceEnd, RecurrenceRule};

const MSG_INTERVAL: &str = "must be at least 1";
const MSG_COUNT: &str = "must be a positive integer";
const MSG_UNTIL: &str = "must not be before the event start";

/// An event as submitted, before validation.
///
/// Instants are RFC 3339 text (`2024-01-01T09:00:00Z`); a bare
/// `YYYY-MM-DD` means midnight UTC.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(default)]
    pub all_day: bool,
    /// Blank or absent means the default color
    pub color: Option<String>,
    pub recurrence: Option<RecurrenceDraft>,
    pub created_by: Option<String>,
}

/// A recurrence as submitted: either RRULE text in `rule`, or the
/// individual fields. Exceptions apply to both forms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceDraft {
    pub rule: Option<String>,
    pub frequency: Option<String>,
    pub interval: Option<i64>,
    pub count: Option<i64>,
    pub until: Option<String>,
    #[serde(default)]
    pub exceptions: Vec<String>,
}

impl EventDraft {
    pub fn new(title: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        EventDraft {
            title: title.into(),
            start: Some(start.to_rfc3339()),
            end: Some(end.to_rfc3339()),
            ..Default::default()
        }
    }

    pub fn with_recurrence(mut self, recurrence: RecurrenceDraft) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

impl From<&EventTemplate> for EventDraft {
    fn from(template: &EventTemplate) -> Self {
        EventDraft {
            title: template.title.clone(),
            description: template.description.clone(),
            start: Some(template.start.to_rfc3339()),
            end: Some(template.end.to_rfc3339()),
            all_day: template.all_day,
            color: Some(template.color.as_str().to_string()),
            recurrence: template.recurrence.as_ref().map(RecurrenceDraft::from),
            created_by: template.created_by.clone(),
        }
    }
}

impl RecurrenceDraft {
    pub fn from_rrule(text: impl Into<String>) -> Self {
        RecurrenceDraft {
            rule: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn repeating(frequency: impl Into<String>) -> Self {
        RecurrenceDraft {
            frequency: Some(frequency.into()),
            ..Default::default()
        }
    }

    pub fn with_interval(mut self, interval: i64) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_count(mut self, count: i64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until.to_rfc3339());
        self
    }

    pub fn with_exception(mut self, anchor: DateTime<Utc>) -> Self {
        self.exceptions.push(anchor.to_rfc3339());
        self
    }

    fn has_fields(&self) -> bool {
        self.frequency.is_some()
            || self.interval.is_some()
            || self.count.is_some()
            || self.until.is_some()
    }
}

impl From<&RecurrenceRule> for RecurrenceDraft {
    fn from(rule: &RecurrenceRule) -> Self {
        let (count, until) = match rule.end {
            RecurrenceEnd::Never => (None, None),
            RecurrenceEnd::AfterCount(n) => (Some(i64::from(n)), None),
            RecurrenceEnd::Until(u) => (None, Some(u.to_rfc3339())),
        };
        RecurrenceDraft {
            rule: None,
            frequency: Some(rule.frequency.name().to_string()),
            interval: Some(i64::from(rule.interval)),
            count,
            until,
            exceptions: rule.exceptions.iter().map(|e| e.to_rfc3339()).collect(),
        }
    }
}

/// One failing field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        FieldError {
            field,
            message: message.into(),
        }
    }
}

/// Every field a draft failed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    failures: Vec<FieldError>,
}

impl ValidationError {
    pub fn failures(&self) -> &[FieldError] {
        &self.failures
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.failures.iter().any(|f| f.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let described: Vec<String> = self
            .failures
            .iter()
            .map(|failure| format!("{} {}", failure.field, failure.message))
            .collect();
        write!(f, "{}", described.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// Check a draft and build the template it describes.
///
/// The returned template has no id and no storage timestamps yet.
pub fn validate(draft: &EventDraft) -> Result<EventTemplate, ValidationError> {
    let mut failures = Vec::new();

    let title = draft.title.trim();
    if title.is_empty() {
        failures.push(FieldError::new("title", "must not be empty"));
    }

    let start = required_instant(draft.start.as_deref(), "start", &mut failures);
    let end = required_instant(draft.end.as_deref(), "end", &mut failures);
    if let (Some(start), Some(end)) = (start, end) {
        if end <= start {
            failures.push(FieldError::new("end", "must be after start"));
        }
    }

    let recurrence = draft
        .recurrence
        .as_ref()
        .and_then(|r| validate_recurrence(r, start, &mut failures));

    let color = match draft.color.as_deref().map(str::trim) {
        None | Some("") => Color::default(),
        Some(token) => Color::parse(token).unwrap_or_else(|| {
            failures.push(FieldError::new(
                "color",
                format!("'{token}' is not a #rgb or #rrggbb color"),
            ));
            Color::default()
        }),
    };

    match (start, end) {
        (Some(start), Some(end)) if failures.is_empty() => Ok(EventTemplate {
            id: None,
            title: title.to_string(),
            description: draft.description.clone(),
            start,
            end,
            all_day: draft.all_day,
            color,
            recurrence,
            created_by: draft.created_by.clone(),
            created: None,
            updated: None,
        }),
        _ => Err(ValidationError { failures }),
    }
}

fn validate_recurrence(
    draft: &RecurrenceDraft,
    start: Option<DateTime<Utc>>,
    failures: &mut Vec<FieldError>,
) -> Option<RecurrenceRule> {
    let exceptions = draft
        .exceptions
        .iter()
        .filter_map(|text| {
            let parsed = parse_instant(text);
            if parsed.is_none() {
                failures.push(FieldError::new(
                    "recurrence.exceptions",
                    format!("'{text}' is not an RFC 3339 instant"),
                ));
            }
            parsed
        })
        .collect();

    let rule = match &draft.rule {
        Some(text) => {
            if draft.has_fields() {
                failures.push(FieldError::new(
                    "recurrence",
                    "give either rule text or frequency/interval/count/until, not both",
                ));
            }
            rule_from_text(text, start, failures)
        }
        None => rule_from_fields(draft, start, failures),
    };

    rule.map(|rule| RecurrenceRule { exceptions, ..rule })
}

fn rule_from_text(
    text: &str,
    start: Option<DateTime<Utc>>,
    failures: &mut Vec<FieldError>,
) -> Option<RecurrenceRule> {
    let rule: RecurrenceRule = match text.parse() {
        Ok(rule) => rule,
        Err(message) => {
            failures.push(FieldError::new("recurrence.rule", message));
            return None;
        }
    };

    let before = failures.len();
    if rule.interval == 0 {
        failures.push(FieldError::new("recurrence.interval", MSG_INTERVAL));
    }
    match rule.end {
        RecurrenceEnd::AfterCount(0) => {
            failures.push(FieldError::new("recurrence.count", MSG_COUNT));
        }
        RecurrenceEnd::Until(until) if start.is_some_and(|s| until < s) => {
            failures.push(FieldError::new("recurrence.until", MSG_UNTIL));
        }
        _ => {}
    }

    (failures.len() == before).then_some(rule)
}

fn rule_from_fields(
    draft: &RecurrenceDraft,
    start: Option<DateTime<Utc>>,
    failures: &mut Vec<FieldError>,
) -> Option<RecurrenceRule> {
    let before = failures.len();

    let frequency = match draft.frequency.as_deref() {
        None => {
            failures.push(FieldError::new("recurrence.frequency", "is required"));
            None
        }
        Some(name) => {
            let parsed = Frequency::from_name(name);
            if parsed.is_none() {
                failures.push(FieldError::new(
                    "recurrence.frequency",
                    format!("'{name}' is not one of daily, weekly, monthly, yearly"),
                ));
            }
            parsed
        }
    };

    let interval = draft.interval.unwrap_or(1);
    let interval = match u32::try_from(interval) {
        Ok(n) if n >= 1 => n,
        _ => {
            failures.push(FieldError::new("recurrence.interval", MSG_INTERVAL));
            1
        }
    };

    let count = draft.count.map(|count| match u32::try_from(count) {
        Ok(n) if n >= 1 => n,
        _ => {
            failures.push(FieldError::new("recurrence.count", MSG_COUNT));
            1
        }
    });

    let until = draft.until.as_deref().and_then(|text| {
        let Some(until) = parse_instant(text) else {
            failures.push(FieldError::new(
                "recurrence.until",
                format!("'{text}' is not an RFC 3339 instant"),
            ));
            return None;
        };
        if start.is_some_and(|s| until < s) {
            failures.push(FieldError::new("recurrence.until", MSG_UNTIL));
        }
        Some(until)
    });

    let end = match (count, until) {
        (Some(_), Some(_)) => {
            failures.push(FieldError::new(
                "recurrence",
                "cannot end both after a count and at an instant",
            ));
            RecurrenceEnd::Never
        }
        (Some(n), None) => RecurrenceEnd::AfterCount(n),
        (None, Some(u)) => RecurrenceEnd::Until(u),
        (None, None) => RecurrenceEnd::Never,
    };

    let frequency = frequency?;
    (failures.len() == before).then(|| RecurrenceRule {
        frequency,
        interval,
        end,
        exceptions: Default::default(),
    })
}

fn required_instant(
    text: Option<&str>,
    field: &'static str,
    failures: &mut Vec<FieldError>,
) -> Option<DateTime<Utc>> {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        failures.push(FieldError::new(field, "is required"));
        return None;
    };

    let parsed = parse_instant(text);
    if parsed.is_none() {
        failures.push(FieldError::new(
            field,
            format!("'{text}' is not an RFC 3339 instant"),
        ));
    }
    parsed
}

/// RFC 3339 instant, or `YYYY-MM-DD` as midnight UTC.
pub fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn utc(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
    }

    fn make_test_draft() -> EventDraft {
        EventDraft::new("Planning", utc(1, 9), utc(1, 10))
    }

    #[test]
    fn test_valid_draft_is_accepted() {
        let template = validate(&make_test_draft()).unwrap();
        assert_eq!(template.title, "Planning");
        assert_eq!(template.start, utc(1, 9));
        assert_eq!(template.end, utc(1, 10));
        assert_eq!(template.color, Color::default());
        assert!(template.id.is_none());
        assert!(template.recurrence.is_none());
    }

    #[test]
    fn test_end_after_start_accepts_and_rejects() {
        for (offset, ok) in [(1, true), (60, true), (0, false), (-30, false)] {
            let mut draft = make_test_draft();
            draft.end = Some((utc(1, 9) + Duration::minutes(offset)).to_rfc3339());
            let result = validate(&draft);
            assert_eq!(result.is_ok(), ok, "offset {offset}");
            if let Err(err) = result {
                assert!(err.has_field("end"), "{err}");
            }
        }
    }

    #[test]
    fn test_title_is_trimmed_and_required() {
        let mut draft = make_test_draft();
        draft.title = "  Planning  ".to_string();
        assert_eq!(validate(&draft).unwrap().title, "Planning");

        draft.title = "   ".to_string();
        assert!(validate(&draft).unwrap_err().has_field("title"));
    }

    #[test]
    fn test_all_failures_are_reported_together() {
        let draft = EventDraft {
            title: String::new(),
            start: Some("not a date".to_string()),
            end: None,
            color: Some("blue".to_string()),
            recurrence: Some(RecurrenceDraft::repeating("hourly").with_interval(0)),
            ..Default::default()
        };

        let err = validate(&draft).unwrap_err();
        let fields: Vec<_> = err.failures().iter().map(|f| f.field).collect();
        assert_eq!(
            fields,
            [
                "title",
                "start",
                "end",
                "recurrence.frequency",
                "recurrence.interval",
                "color"
            ]
        );
    }

    #[test]
    fn test_bare_dates_and_offsets_are_normalized_to_utc() {
        let mut draft = make_test_draft();
        draft.start = Some("2024-01-01".to_string());
        draft.end = Some("2024-01-01T10:00:00+01:00".to_string());
        let template = validate(&draft).unwrap();
        assert_eq!(template.start, utc(1, 0));
        assert_eq!(template.end, utc(1, 9));
    }

    #[test]
    fn test_recurrence_fields() {
        let draft = make_test_draft().with_recurrence(
            RecurrenceDraft::repeating("Weekly")
                .with_interval(2)
                .with_count(4)
                .with_exception(utc(15, 9)),
        );
        let rule = validate(&draft).unwrap().recurrence.unwrap();
        assert_eq!(rule.frequency, Frequency::Weekly);
        assert_eq!(rule.interval, 2);
        assert_eq!(rule.end, RecurrenceEnd::AfterCount(4));
        assert!(rule.exceptions.contains(&utc(15, 9)));
    }

    #[test]
    fn test_recurrence_count_and_until_bounds() {
        let zero_count =
            make_test_draft().with_recurrence(RecurrenceDraft::repeating("daily").with_count(0));
        assert!(validate(&zero_count).unwrap_err().has_field("recurrence.count"));

        let early_until = make_test_draft()
            .with_recurrence(RecurrenceDraft::repeating("daily").with_until(utc(1, 8)));
        assert!(validate(&early_until).unwrap_err().has_field("recurrence.until"));

        let same_instant_until = make_test_draft()
            .with_recurrence(RecurrenceDraft::repeating("daily").with_until(utc(1, 9)));
        assert!(validate(&same_instant_until).is_ok());

        let both = make_test_draft().with_recurrence(
            RecurrenceDraft::repeating("daily")
                .with_count(2)
                .with_until(utc(5, 9)),
        );
        assert!(validate(&both).unwrap_err().has_field("recurrence"));
    }

    #[test]
    fn test_recurrence_rule_text() {
        let draft = make_test_draft()
            .with_recurrence(RecurrenceDraft::from_rrule("FREQ=MONTHLY;COUNT=6"));
        let rule = validate(&draft).unwrap().recurrence.unwrap();
        assert_eq!(rule, RecurrenceRule::new(Frequency::Monthly).count(6));

        let bad = make_test_draft().with_recurrence(RecurrenceDraft::from_rrule("FREQ=SOMETIMES"));
        assert!(validate(&bad).unwrap_err().has_field("recurrence.rule"));

        let early = make_test_draft().with_recurrence(RecurrenceDraft::from_rrule(
            "FREQ=DAILY;UNTIL=20231231T000000Z",
        ));
        assert!(validate(&early).unwrap_err().has_field("recurrence.until"));
    }

    #[test]
    fn test_misaligned_exceptions_are_accepted() {
        let draft = make_test_draft()
            .with_recurrence(RecurrenceDraft::repeating("daily").with_exception(utc(3, 17)));
        assert!(validate(&draft).is_ok());

        let mut bad = make_test_draft().with_recurrence(RecurrenceDraft::repeating("daily"));
        if let Some(r) = bad.recurrence.as_mut() {
            r.exceptions.push("yesterday".to_string());
        }
        assert!(validate(&bad).unwrap_err().has_field("recurrence.exceptions"));
    }

    #[test]
    fn test_color_default_and_validation() {
        let blank = make_test_draft().with_color("  ");
        assert_eq!(validate(&blank).unwrap().color, Color::default());

        let custom = make_test_draft().with_color("#FF8800");
        assert_eq!(validate(&custom).unwrap().color.as_str(), "#ff8800");

        let bad = make_test_draft().with_color("#ff88");
        assert!(validate(&bad).unwrap_err().has_field("color"));
    }

    #[test]
    fn test_template_round_trips_through_draft() {
        let draft = make_test_draft().with_recurrence(
            RecurrenceDraft::repeating("yearly").with_until(utc(1, 9) + Duration::days(800)),
        );
        let template = validate(&draft).unwrap();
        let again = validate(&EventDraft::from(&template)).unwrap();
        assert_eq!(template, again);
    }
}
