//! Overlap detection between a candidate range and existing occurrences.
//!
//! Conflicts are advisory: they are reported next to a write, never used to
//! refuse it.

use crate::event::{EventId, Occurrence};
use crate::time_range::TimeRange;

/// All occurrences in `existing` overlapping `candidate`.
///
/// Two intervals conflict iff `a.start < b.end && b.start < a.end`, so
/// back-to-back events do not. Occurrences of `exclude` are ignored, which
/// lets an update check against everything but the event being edited.
///
/// The result is ordered by start, then template id, without duplicates.
pub fn find_conflicts(
    candidate: &TimeRange,
    existing: &[Occurrence],
    exclude: Option<&EventId>,
) -> Vec<Occurrence> {
    let mut conflicts: Vec<Occurrence> = existing
        .iter()
        .filter(|occurrence| {
            !exclude.is_some_and(|id| occurrence.template_id.as_ref() == Some(id))
        })
        .filter(|occurrence| candidate.overlaps(&occurrence.range))
        .cloned()
        .collect();

    conflicts.sort();
    conflicts.dedup();
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, minute, 0).unwrap()
    }

    fn range(from: (u32, u32), to: (u32, u32)) -> TimeRange {
        TimeRange::new(at(from.0, from.1), at(to.0, to.1)).unwrap()
    }

    fn occurrence(id: &str, range: TimeRange) -> Occurrence {
        Occurrence {
            template_id: Some(EventId::from(id)),
            range,
            sequence: 0,
        }
    }

    #[test]
    fn test_overlapping_occurrence_conflicts() {
        let existing = vec![occurrence("review", range((9, 30), (10, 30)))];
        let conflicts = find_conflicts(&range((9, 0), (10, 0)), &existing, None);
        assert_eq!(conflicts, existing);
    }

    #[test]
    fn test_back_to_back_events_do_not_conflict() {
        let existing = vec![
            occurrence("before", range((8, 0), (9, 0))),
            occurrence("after", range((10, 0), (11, 0))),
        ];
        assert!(find_conflicts(&range((9, 0), (10, 0)), &existing, None).is_empty());
    }

    #[test]
    fn test_containment_conflicts_both_ways() {
        let outer = range((8, 0), (12, 0));
        let inner = range((9, 0), (9, 15));
        assert_eq!(find_conflicts(&outer, &[occurrence("x", inner)], None).len(), 1);
        assert_eq!(find_conflicts(&inner, &[occurrence("x", outer)], None).len(), 1);
    }

    #[test]
    fn test_conflicts_are_symmetric() {
        let ranges = [
            range((8, 0), (9, 0)),
            range((8, 30), (9, 30)),
            range((9, 0), (10, 0)),
            range((9, 59), (11, 0)),
            range((7, 0), (12, 0)),
            range((11, 0), (11, 1)),
        ];

        for a in &ranges {
            for b in &ranges {
                let forward = !find_conflicts(a, &[occurrence("b", *b)], None).is_empty();
                let backward = !find_conflicts(b, &[occurrence("a", *a)], None).is_empty();
                assert_eq!(forward, backward, "{a:?} vs {b:?}");
                assert_eq!(forward, a.start() < b.end() && b.start() < a.end());
            }
        }
    }

    #[test]
    fn test_excluded_template_is_ignored() {
        let existing = vec![
            occurrence("self", range((9, 0), (10, 0))),
            occurrence("other", range((9, 0), (10, 0))),
        ];
        let own = EventId::from("self");
        let conflicts = find_conflicts(&range((9, 0), (10, 0)), &existing, Some(&own));
        assert_eq!(conflicts, vec![occurrence("other", range((9, 0), (10, 0)))]);
    }

    #[test]
    fn test_conflicts_are_ordered_by_start_then_id() {
        let existing = vec![
            occurrence("c", range((9, 30), (10, 0))),
            occurrence("b", range((9, 0), (10, 0))),
            occurrence("a", range((9, 0), (9, 45))),
        ];
        let conflicts = find_conflicts(&range((8, 0), (12, 0)), &existing, None);
        let ids: Vec<_> = conflicts
            .iter()
            .map(|o| o.template_id.as_ref().unwrap().as_str())
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }
}
