//! JSON shapes exchanged with the frontend.
//!
//! Field names follow the stored document layout the frontend was built
//! against (`_id`, `start_ts`, `end_ts`, `recurrence_rule`, ...).

use caldesk_core::{
    AgendaEntry, EventDraft, EventTemplate, FieldError, Occurrence, ProposalOutcome,
    RecurrenceDraft,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request body for creating or replacing an event
#[derive(Debug, Default, Deserialize)]
pub struct EventBody {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_ts: Option<String>,
    pub end_ts: Option<String>,
    #[serde(default)]
    pub all_day: bool,
    pub color: Option<String>,
    pub recurrence_rule: Option<String>,
    #[serde(default)]
    pub exceptions: Vec<String>,
    pub created_by: Option<String>,
}

impl From<EventBody> for EventDraft {
    fn from(body: EventBody) -> Self {
        let rule = body
            .recurrence_rule
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        // Exceptions without a rule still go through, so validation reports them
        let recurrence = (rule.is_some() || !body.exceptions.is_empty()).then(|| RecurrenceDraft {
            rule,
            exceptions: body.exceptions,
            ..Default::default()
        });

        EventDraft {
            title: body.title,
            description: body.description,
            start: body.start_ts,
            end: body.end_ts,
            all_day: body.all_day,
            color: body.color,
            recurrence,
            created_by: body.created_by,
        }
    }
}

/// Name of a draft field as the frontend knows it.
pub fn wire_field(field: &str) -> &str {
    match field {
        "start" => "start_ts",
        "end" => "end_ts",
        "recurrence.exceptions" => "exceptions",
        f if f.starts_with("recurrence") => "recurrence_rule",
        f => f,
    }
}

#[derive(Debug, Serialize)]
pub struct FieldDoc {
    pub field: String,
    pub message: String,
}

impl From<&FieldError> for FieldDoc {
    fn from(failure: &FieldError) -> Self {
        FieldDoc {
            field: wire_field(failure.field).to_string(),
            message: failure.message.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventDoc {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub all_day: bool,
    pub color: String,
    pub recurrence_rule: Option<String>,
    pub exceptions: Vec<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&EventTemplate> for EventDoc {
    fn from(template: &EventTemplate) -> Self {
        EventDoc {
            id: template.id.as_ref().map(|id| id.to_string()),
            title: template.title.clone(),
            description: template.description.clone(),
            start_ts: template.start,
            end_ts: template.end,
            all_day: template.all_day,
            color: template.color.as_str().to_string(),
            recurrence_rule: template.recurrence.as_ref().map(|r| r.to_string()),
            exceptions: template
                .recurrence
                .as_ref()
                .map(|r| r.exceptions.iter().copied().collect())
                .unwrap_or_default(),
            created_by: template.created_by.clone(),
            created_at: template.created,
            updated_at: template.updated,
        }
    }
}

/// One occurrence as listed for a calendar view.
///
/// `start_ts`/`end_ts` are the occurrence's own instants; the template's
/// first interval moves to `series_start_ts`/`series_end_ts`.
#[derive(Debug, Serialize)]
pub struct OccurrenceDoc {
    #[serde(flatten)]
    pub event: EventDoc,
    pub series_start_ts: DateTime<Utc>,
    pub series_end_ts: DateTime<Utc>,
    pub sequence: u32,
}

impl From<&AgendaEntry> for OccurrenceDoc {
    fn from(entry: &AgendaEntry) -> Self {
        let event = EventDoc {
            start_ts: entry.occurrence.start(),
            end_ts: entry.occurrence.end(),
            ..EventDoc::from(&entry.event)
        };
        OccurrenceDoc {
            event,
            series_start_ts: entry.event.start,
            series_end_ts: entry.event.end,
            sequence: entry.occurrence.sequence,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConflictDoc {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub sequence: u32,
}

impl From<&Occurrence> for ConflictDoc {
    fn from(occurrence: &Occurrence) -> Self {
        ConflictDoc {
            id: occurrence.template_id.as_ref().map(|id| id.to_string()),
            start_ts: occurrence.start(),
            end_ts: occurrence.end(),
            sequence: occurrence.sequence,
        }
    }
}

/// Response to a create or update
#[derive(Debug, Serialize)]
pub struct ProposalDoc {
    pub event: EventDoc,
    pub conflicts: Vec<ConflictDoc>,
}

impl From<&ProposalOutcome> for ProposalDoc {
    fn from(outcome: &ProposalOutcome) -> Self {
        ProposalDoc {
            event: EventDoc::from(&outcome.event),
            conflicts: outcome.conflicts.iter().map(ConflictDoc::from).collect(),
        }
    }
}
