//! Configuration consumed by the scheduling core.

use serde::{Deserialize, Serialize};

use crate::view::WeekStart;

/// The one tunable the core reads. Loading it from disk is up to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub week_starts_on: WeekStart,
}

impl SchedulerConfig {
    pub fn new(week_starts_on: WeekStart) -> Self {
        SchedulerConfig { week_starts_on }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_week_start_defaults_to_monday() {
        let config: SchedulerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.week_starts_on, WeekStart::Monday);
    }

    #[test]
    fn test_week_start_is_lowercase_on_the_wire() {
        let config: SchedulerConfig =
            serde_json::from_str(r#"{"week_starts_on":"sunday"}"#).unwrap();
        assert_eq!(config.week_starts_on, WeekStart::Sunday);
    }
}
