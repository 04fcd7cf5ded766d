//! Scheduling core for caldesk.
//!
//! A pure, stateless layer over event data handed to it by a host:
//! - `view` computes the instant range a month/week/day grid displays
//! - `recurrence` expands recurring templates into occurrences
//! - `conflict` reports overlapping occurrences
//! - `validation` turns drafts into accepted templates
//! - `service` wires those together over an injected `Storage`

pub mod config;
pub mod conflict;
pub mod error;
pub mod event;
pub mod recurrence;
pub mod service;
pub mod storage;
pub mod time_range;
pub mod validation;
pub mod view;

pub use config::SchedulerConfig;
pub use error::{ScheduleError, ScheduleResult, StorageError};
pub use event::{Color, EventId, EventTemplate, Occurrence};
pub use recurrence::{Frequency, RecurrenceEnd, RecurrenceRule};
pub use service::{AgendaEntry, ProposalOutcome, SchedulingService};
pub use storage::{MemoryStorage, Storage, StorageQuery};
pub use time_range::TimeRange;
pub use validation::{EventDraft, FieldError, RecurrenceDraft, ValidationError};
pub use view::{View, WeekStart};
