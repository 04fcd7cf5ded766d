//! Event endpoints

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use caldesk_core::validation::parse_instant;
use caldesk_core::{EventDraft, EventId, ScheduleError, ScheduleResult, TimeRange, View};

use crate::routes::{AppError, OkResponse};
use crate::state::AppState;
use crate::wire::{EventBody, OccurrenceDoc, ProposalDoc};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/events", get(list_events).post(create_event))
        .route("/api/events/{id}", put(update_event).delete(delete_event))
}

/// Either an explicit `start`/`end` pair, or a `view` around `date`.
#[derive(Debug, Default, Deserialize)]
pub struct RangeParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub view: Option<String>,
    pub date: Option<String>,
}

impl RangeParams {
    fn resolve(&self, state: &AppState) -> ScheduleResult<TimeRange> {
        if self.start.is_some() || self.end.is_some() {
            let start = instant_param("start", self.start.as_deref())?;
            let end = instant_param("end", self.end.as_deref())?;
            return TimeRange::new(start, end);
        }

        let view = match self.view.as_deref() {
            Some(name) => name.parse()?,
            None => View::Month,
        };
        let focus = match self.date.as_deref() {
            Some(text) => NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|_| {
                ScheduleError::InvalidArgument(format!("date '{text}' is not YYYY-MM-DD"))
            })?,
            None => Utc::now().date_naive(),
        };

        state.service().view_range(view, focus)
    }
}

fn instant_param(name: &str, value: Option<&str>) -> ScheduleResult<chrono::DateTime<Utc>> {
    let text = value.ok_or_else(|| {
        ScheduleError::InvalidArgument(format!("'{name}' is required with a start/end range"))
    })?;
    parse_instant(text).ok_or_else(|| {
        ScheduleError::InvalidArgument(format!("'{name}' value '{text}' is not an RFC 3339 instant"))
    })
}

/// GET /api/events - Occurrences in a range or view
async fn list_events(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<OccurrenceDoc>>, AppError> {
    let range = params.resolve(&state)?;
    let entries = state.service().agenda(&range)?;

    tracing::debug!(start = %range.start(), end = %range.end(), count = entries.len(), "listed events");

    Ok(Json(entries.iter().map(OccurrenceDoc::from).collect()))
}

/// POST /api/events - Create an event
async fn create_event(
    State(state): State<AppState>,
    Json(body): Json<EventBody>,
) -> Result<(StatusCode, Json<ProposalDoc>), AppError> {
    let outcome = state.service().propose(&EventDraft::from(body))?;

    tracing::info!(
        id = ?outcome.event.id,
        conflicts = outcome.conflicts.len(),
        "created event"
    );

    Ok((StatusCode::CREATED, Json(ProposalDoc::from(&outcome))))
}

/// PUT /api/events/{id} - Replace an event
async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<EventBody>,
) -> Result<Json<ProposalDoc>, AppError> {
    let id = EventId::from(id);
    let outcome = state.service().update(&id, &EventDraft::from(body))?;

    tracing::info!(%id, conflicts = outcome.conflicts.len(), "updated event");

    Ok(Json(ProposalDoc::from(&outcome)))
}

/// DELETE /api/events/{id} - Delete an event and all its occurrences
async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, AppError> {
    let id = EventId::from(id);
    state.service().remove(&id)?;

    tracing::info!(%id, "deleted event");

    Ok(Json(OkResponse { ok: true }))
}
