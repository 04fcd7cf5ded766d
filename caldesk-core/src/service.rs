//! Request-level orchestration over an injected `Storage`.
//!
//! Every call stands alone: the service keeps no state between calls other
//! than its storage handle and configuration.

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::SchedulerConfig;
use crate::conflict::find_conflicts;
use crate::error::{ScheduleError, ScheduleResult};
use crate::event::{EventId, EventTemplate, Occurrence};
use crate::recurrence::expand;
use crate::storage::{Storage, StorageQuery};
use crate::time_range::TimeRange;
use crate::validation::{EventDraft, validate};
use crate::view::{View, compute_view_range};

/// Result of a create or update: the committed template plus whatever it
/// overlaps. Conflicts never prevent the write.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalOutcome {
    pub event: EventTemplate,
    pub conflicts: Vec<Occurrence>,
}

/// An occurrence together with the template it came from.
#[derive(Debug, Clone, Serialize)]
pub struct AgendaEntry {
    pub occurrence: Occurrence,
    pub event: EventTemplate,
}

pub struct SchedulingService<S> {
    storage: S,
    config: SchedulerConfig,
}

impl<S: Storage> SchedulingService<S> {
    pub fn new(storage: S, config: SchedulerConfig) -> Self {
        SchedulingService { storage, config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Range shown by `view` around `focus`, using the configured week start.
    pub fn view_range(&self, view: View, focus: NaiveDate) -> ScheduleResult<TimeRange> {
        compute_view_range(view, focus, self.config.week_starts_on)
    }

    /// All occurrences intersecting `range`, ordered by start then template id.
    pub fn query(&self, range: &TimeRange) -> ScheduleResult<Vec<Occurrence>> {
        Ok(self
            .agenda(range)?
            .into_iter()
            .map(|entry| entry.occurrence)
            .collect())
    }

    pub fn query_view(&self, view: View, focus: NaiveDate) -> ScheduleResult<Vec<Occurrence>> {
        self.query(&self.view_range(view, focus)?)
    }

    /// Like `query`, with each occurrence paired with its template.
    pub fn agenda(&self, range: &TimeRange) -> ScheduleResult<Vec<AgendaEntry>> {
        let templates = self.fetch(&StorageQuery::Overlapping(*range))?;

        let mut entries = Vec::new();
        for template in &templates {
            for occurrence in expand(template, range)? {
                entries.push(AgendaEntry {
                    occurrence,
                    event: template.clone(),
                });
            }
        }

        entries.sort_by(|a, b| a.occurrence.cmp(&b.occurrence));
        Ok(entries)
    }

    /// Validate and store a new event.
    pub fn propose(&self, draft: &EventDraft) -> ScheduleResult<ProposalOutcome> {
        let candidate = validate(draft)?;
        let conflicts = self.conflicts_for(&candidate, None)?;
        let event = self.commit(candidate)?;

        Ok(ProposalOutcome { event, conflicts })
    }

    /// Replace the event `id` with `draft`.
    pub fn update(&self, id: &EventId, draft: &EventDraft) -> ScheduleResult<ProposalOutcome> {
        let existing = self
            .fetch(&StorageQuery::Ids(vec![id.clone()]))?
            .into_iter()
            .find(|t| t.id.as_ref() == Some(id))
            .ok_or_else(|| ScheduleError::NotFound(id.clone()))?;

        let mut candidate = validate(draft)?;
        candidate.id = Some(id.clone());
        candidate.created = existing.created;

        let conflicts = self.conflicts_for(&candidate, Some(id))?;
        let event = self.commit(candidate)?;

        Ok(ProposalOutcome { event, conflicts })
    }

    /// Delete the event `id`, with all its occurrences and exceptions.
    pub fn remove(&self, id: &EventId) -> ScheduleResult<()> {
        let removed = self.storage.delete(id).map_err(ScheduleError::Storage)?;
        if removed {
            Ok(())
        } else {
            Err(ScheduleError::NotFound(id.clone()))
        }
    }

    /// Conflicts are checked for the candidate's own interval (its first
    /// occurrence) against every occurrence expanded into that interval.
    fn conflicts_for(
        &self,
        candidate: &EventTemplate,
        exclude: Option<&EventId>,
    ) -> ScheduleResult<Vec<Occurrence>> {
        let window = candidate.range()?;
        let existing = self.query(&window)?;
        Ok(find_conflicts(&window, &existing, exclude))
    }

    fn fetch(&self, query: &StorageQuery) -> ScheduleResult<Vec<EventTemplate>> {
        self.storage.find(query).map_err(ScheduleError::Storage)
    }

    fn commit(&self, template: EventTemplate) -> ScheduleResult<EventTemplate> {
        self.storage.commit(template).map_err(ScheduleError::Storage)
    }
}
