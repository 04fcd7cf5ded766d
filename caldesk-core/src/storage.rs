//! The storage capability the host provides.
//!
//! The core calls storage synchronously and passes its errors through
//! untouched. `MemoryStorage` is a ready-made implementation for tests and
//! for hosts that keep events in process.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;

use crate::error::StorageError;
use crate::event::{EventId, EventTemplate};
use crate::time_range::TimeRange;

/// Which templates a `find` call wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageQuery {
    Ids(Vec<EventId>),
    /// Every template that may have an occurrence in the range (see
    /// `EventTemplate::may_occur_within`). Extra templates are harmless,
    /// missing ones are not.
    Overlapping(TimeRange),
}

impl StorageQuery {
    pub fn matches(&self, template: &EventTemplate) -> bool {
        match self {
            StorageQuery::Ids(ids) => template.id.as_ref().is_some_and(|id| ids.contains(id)),
            StorageQuery::Overlapping(range) => template.may_occur_within(range),
        }
    }
}

pub trait Storage {
    fn find(&self, query: &StorageQuery) -> Result<Vec<EventTemplate>, StorageError>;

    /// Insert or fully replace a template. Assigns an id when it has none.
    fn commit(&self, template: EventTemplate) -> Result<EventTemplate, StorageError>;

    /// Returns false when nothing had that id.
    fn delete(&self, id: &EventId) -> Result<bool, StorageError>;
}

impl<T: Storage + ?Sized> Storage for &T {
    fn find(&self, query: &StorageQuery) -> Result<Vec<EventTemplate>, StorageError> {
        (**self).find(query)
    }

    fn commit(&self, template: EventTemplate) -> Result<EventTemplate, StorageError> {
        (**self).commit(template)
    }

    fn delete(&self, id: &EventId) -> Result<bool, StorageError> {
        (**self).delete(id)
    }
}

impl<T: Storage + ?Sized> Storage for Arc<T> {
    fn find(&self, query: &StorageQuery) -> Result<Vec<EventTemplate>, StorageError> {
        (**self).find(query)
    }

    fn commit(&self, template: EventTemplate) -> Result<EventTemplate, StorageError> {
        (**self).commit(template)
    }

    fn delete(&self, id: &EventId) -> Result<bool, StorageError> {
        (**self).delete(id)
    }
}

/// Stamp storage-owned fields on a template about to be written.
///
/// Keeps `created` from the version being replaced, if any.
pub fn stamp_for_commit(mut template: EventTemplate, previous: Option<&EventTemplate>) -> EventTemplate {
    let now = Utc::now();
    let id = template.id.take().unwrap_or_else(EventId::generate);
    template.id = Some(id);
    template.created = previous.and_then(|p| p.created).or(Some(now));
    template.updated = Some(now);
    template
}

/// Templates kept in a map in process memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    events: RwLock<BTreeMap<EventId, EventTemplate>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.read().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StorageError {
    "memory storage lock poisoned".into()
}

impl Storage for MemoryStorage {
    fn find(&self, query: &StorageQuery) -> Result<Vec<EventTemplate>, StorageError> {
        let events = self.events.read().map_err(|_| poisoned())?;
        Ok(events.values().filter(|t| query.matches(t)).cloned().collect())
    }

    fn commit(&self, template: EventTemplate) -> Result<EventTemplate, StorageError> {
        let mut events = self.events.write().map_err(|_| poisoned())?;
        let previous = template.id.as_ref().and_then(|id| events.get(id));
        let stamped = stamp_for_commit(template, previous);

        if let Some(id) = &stamped.id {
            events.insert(id.clone(), stamped.clone());
        }
        Ok(stamped)
    }

    fn delete(&self, id: &EventId) -> Result<bool, StorageError> {
        let mut events = self.events.write().map_err(|_| poisoned())?;
        Ok(events.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Color;
    use crate::recurrence::{Frequency, RecurrenceRule};
    use chrono::{DateTime, Duration, TimeZone};

    fn utc(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
    }

    fn make_test_template(start: DateTime<Utc>) -> EventTemplate {
        EventTemplate {
            id: None,
            title: "Focus".to_string(),
            description: String::new(),
            start,
            end: start + Duration::hours(2),
            all_day: false,
            color: Color::default(),
            recurrence: None,
            created_by: None,
            created: None,
            updated: None,
        }
    }

    #[test]
    fn test_commit_assigns_id_and_timestamps() {
        let storage = MemoryStorage::new();
        let stored = storage.commit(make_test_template(utc(1, 9))).unwrap();

        assert!(stored.id.is_some());
        assert!(stored.created.is_some());
        assert_eq!(stored.created, stored.updated);
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_commit_with_id_replaces_and_keeps_created() {
        let storage = MemoryStorage::new();
        let stored = storage.commit(make_test_template(utc(1, 9))).unwrap();

        let mut replacement = make_test_template(utc(2, 9));
        replacement.id = stored.id.clone();
        replacement.title = "Moved".to_string();
        let replaced = storage.commit(replacement).unwrap();

        assert_eq!(storage.len(), 1);
        assert_eq!(replaced.created, stored.created);
        let found = storage
            .find(&StorageQuery::Ids(vec![stored.id.clone().unwrap()]))
            .unwrap();
        assert_eq!(found[0].title, "Moved");
    }

    #[test]
    fn test_find_overlapping_includes_recurring_templates() {
        let storage = MemoryStorage::new();
        storage.commit(make_test_template(utc(1, 9))).unwrap();
        let mut weekly = make_test_template(utc(1, 12));
        weekly.recurrence = Some(RecurrenceRule::new(Frequency::Weekly));
        storage.commit(weekly).unwrap();

        let later = TimeRange::new(utc(20, 0), utc(27, 0)).unwrap();
        let found = storage.find(&StorageQuery::Overlapping(later)).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].is_recurring());
    }

    #[test]
    fn test_delete_reports_whether_anything_was_removed() {
        let storage = MemoryStorage::new();
        let stored = storage.commit(make_test_template(utc(1, 9))).unwrap();
        let id = stored.id.unwrap();

        assert!(storage.delete(&id).unwrap());
        assert!(!storage.delete(&id).unwrap());
        assert!(storage.is_empty());
    }
}
