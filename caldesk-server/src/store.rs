//! Event storage in a single JSON file.
//!
//! All templates are held in memory and the whole file is rewritten on every
//! change (write to a temporary file, then rename over the original).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use caldesk_core::storage::stamp_for_commit;
use caldesk_core::{EventId, EventTemplate, Storage, StorageError, StorageQuery};

pub struct JsonFileStorage {
    path: PathBuf,
    events: Mutex<BTreeMap<EventId, EventTemplate>>,
}

impl JsonFileStorage {
    /// Open the store at `path`, starting empty if the file does not exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        let events = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let templates: Vec<EventTemplate> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            templates
                .into_iter()
                .filter_map(|t| match check_stored(&t) {
                    Ok(id) => Some((id, t)),
                    Err(reason) => {
                        tracing::warn!(
                            path = %path.display(),
                            title = %t.title,
                            "skipping stored event: {reason}"
                        );
                        None
                    }
                })
                .collect()
        } else {
            BTreeMap::new()
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        Ok(JsonFileStorage {
            path: path.to_path_buf(),
            events: Mutex::new(events),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, events: &BTreeMap<EventId, EventTemplate>) -> Result<(), StorageError> {
        let templates: Vec<&EventTemplate> = events.values().collect();
        let content = serde_json::to_string_pretty(&templates)?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// A stored template must have an id and be expandable.
fn check_stored(template: &EventTemplate) -> Result<EventId, String> {
    let id = template.id.clone().ok_or("it has no id")?;
    template.range().map_err(|e| e.to_string())?;
    if template.recurrence.as_ref().is_some_and(|r| r.interval == 0) {
        return Err("its recurrence interval is 0".to_string());
    }
    Ok(id)
}

fn poisoned() -> StorageError {
    "event store lock poisoned".into()
}

impl Storage for JsonFileStorage {
    fn find(&self, query: &StorageQuery) -> Result<Vec<EventTemplate>, StorageError> {
        let events = self.events.lock().map_err(|_| poisoned())?;
        Ok(events.values().filter(|t| query.matches(t)).cloned().collect())
    }

    fn commit(&self, template: EventTemplate) -> Result<EventTemplate, StorageError> {
        let mut events = self.events.lock().map_err(|_| poisoned())?;

        let previous = template.id.as_ref().and_then(|id| events.get(id)).cloned();
        let stamped = stamp_for_commit(template, previous.as_ref());
        let Some(id) = stamped.id.clone() else {
            return Err("committed event has no id".into());
        };

        events.insert(id.clone(), stamped.clone());
        if let Err(e) = self.persist(&events) {
            // Keep memory in step with what is on disk
            match previous {
                Some(previous) => events.insert(id, previous),
                None => events.remove(&id),
            };
            return Err(e);
        }

        Ok(stamped)
    }

    fn delete(&self, id: &EventId) -> Result<bool, StorageError> {
        let mut events = self.events.lock().map_err(|_| poisoned())?;

        let Some(removed) = events.remove(id) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&events) {
            events.insert(id.clone(), removed);
            return Err(e);
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caldesk_core::validation::validate;
    use caldesk_core::{EventDraft, RecurrenceDraft, TimeRange};
    use chrono::{DateTime, TimeZone, Utc};

    fn utc(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
    }

    fn make_test_template(title: &str) -> EventTemplate {
        validate(&EventDraft::new(title, utc(1, 9), utc(1, 10))).unwrap()
    }

    #[test]
    fn test_events_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("events.json");

        let store = JsonFileStorage::open(&path).unwrap();
        let weekly = validate(
            &EventDraft::new("Standup", utc(1, 9), utc(1, 10))
                .with_recurrence(RecurrenceDraft::repeating("weekly").with_exception(utc(8, 9))),
        )
        .unwrap();
        let stored = store.commit(weekly).unwrap();
        store.commit(make_test_template("Lunch")).unwrap();
        drop(store);

        let reopened = JsonFileStorage::open(&path).unwrap();
        let id = stored.id.clone().unwrap();
        let found = reopened.find(&StorageQuery::Ids(vec![id])).unwrap();
        assert_eq!(found, vec![stored]);

        let january = TimeRange::new(utc(1, 0), utc(31, 0)).unwrap();
        assert_eq!(reopened.find(&StorageQuery::Overlapping(january)).unwrap().len(), 2);
    }

    #[test]
    fn test_delete_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");

        let store = JsonFileStorage::open(&path).unwrap();
        let id = store.commit(make_test_template("Lunch")).unwrap().id.unwrap();
        assert!(store.delete(&id).unwrap());
        assert!(!store.delete(&id).unwrap());
        drop(store);

        let reopened = JsonFileStorage::open(&path).unwrap();
        assert!(reopened.find(&StorageQuery::Ids(vec![id])).unwrap().is_empty());
    }

    #[test]
    fn test_unusable_records_are_skipped_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");

        let store = JsonFileStorage::open(&path).unwrap();
        let kept = store.commit(make_test_template("Lunch")).unwrap();
        store.commit(make_test_template("No id")).unwrap();
        store.commit(make_test_template("Backwards")).unwrap();
        store.commit(make_test_template("Stuck")).unwrap();
        drop(store);

        let content = std::fs::read_to_string(&path).unwrap();
        let mut records: Vec<serde_json::Value> = serde_json::from_str(&content).unwrap();
        for record in &mut records {
            let title = record["title"].as_str().unwrap().to_string();
            match title.as_str() {
                "No id" => record["id"] = serde_json::Value::Null,
                "Stuck" => {
                    record["recurrence"] = serde_json::json!({ "frequency": "daily", "interval": 0 })
                }
                "Backwards" => {
                    let start = record["start"].clone();
                    record["start"] = record["end"].clone();
                    record["end"] = start;
                }
                _ => {}
            }
        }
        std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

        let reopened = JsonFileStorage::open(&path).unwrap();
        let january = TimeRange::new(utc(1, 0), utc(31, 0)).unwrap();
        assert_eq!(
            reopened.find(&StorageQuery::Overlapping(january)).unwrap(),
            vec![kept]
        );
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(JsonFileStorage::open(&path).is_err());
    }
}
