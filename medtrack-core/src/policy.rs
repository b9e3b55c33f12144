//! Recurrence policies.
//!
//! A policy turns a task's completion log (and its dependencies' last
//! completions) into a *floor*: the earliest instant the next iteration may
//! happen. `Task` combines the floor with its start time to get the next due
//! instant.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::entry::CompletionEntry;
use crate::task::TaskId;
use crate::time::{Duration, Instant, Interval};

/// Read access to the tasks a policy depends on.
pub trait DependencyView {
    /// Timestamp of the task's most recent completion, if any.
    fn last_completed(&self, task: &TaskId) -> Option<Instant>;
}

/// For tasks evaluated on their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDependencies;

impl DependencyView for NoDependencies {
    fn last_completed(&self, _task: &TaskId) -> Option<Instant> {
        None
    }
}

impl DependencyView for HashMap<TaskId, Instant> {
    fn last_completed(&self, task: &TaskId) -> Option<Instant> {
        self.get(task).copied()
    }
}

impl DependencyView for BTreeMap<TaskId, Instant> {
    fn last_completed(&self, task: &TaskId) -> Option<Instant> {
        self.get(task).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum Policy {
    /// Due until completed once.
    Once,

    /// No sooner than `interval` after the last completion. With a `limit`,
    /// the recurrence is exhausted after that many completions.
    Every {
        interval: Duration,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<u32>,
    },

    /// At most `times` completions per UTC calendar day, each at least
    /// `min_gap` after the previous one.
    PerDay {
        times: u32,
        #[serde(default)]
        min_gap: Duration,
    },

    /// No sooner than `delay` after `task`'s last completion. A dependency
    /// that has never been completed imposes nothing.
    After { task: TaskId, delay: Duration },

    /// Every member must allow it: the latest floor wins.
    All { of: Vec<Policy> },
}

impl Policy {
    pub fn every(interval: Duration) -> Self {
        Policy::Every {
            interval,
            limit: None,
        }
    }

    pub fn after(task: impl Into<TaskId>, delay: Duration) -> Self {
        Policy::After {
            task: task.into(),
            delay,
        }
    }

    pub fn all(of: impl IntoIterator<Item = Policy>) -> Self {
        Policy::All {
            of: of.into_iter().collect(),
        }
    }

    /// Structural checks a policy must pass before a task may use it.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Policy::Once => Ok(()),
            Policy::Every { interval, limit } => {
                if interval.seconds() <= 0 {
                    return Err(format!("interval must be positive (got {}s)", interval.seconds()));
                }
                if *limit == Some(0) {
                    return Err("limit must be at least 1".to_string());
                }
                Ok(())
            }
            Policy::PerDay { times, min_gap } => {
                if *times == 0 {
                    return Err("times per day must be at least 1".to_string());
                }
                if min_gap.is_negative() {
                    return Err("min_gap must not be negative".to_string());
                }
                Ok(())
            }
            Policy::After { task, delay } => {
                if task.as_str().trim().is_empty() {
                    return Err("dependency task id must be non-empty".to_string());
                }
                if delay.is_negative() {
                    return Err(format!("delay after '{task}' must not be negative"));
                }
                Ok(())
            }
            Policy::All { of } => {
                if of.is_empty() {
                    return Err("'all' needs at least one member policy".to_string());
                }
                of.iter().try_for_each(Policy::validate)
            }
        }
    }

    /// Tasks this policy reads, in declaration order.
    pub fn dependencies(&self) -> Vec<&TaskId> {
        let mut out = Vec::new();
        self.collect_dependencies(&mut out);
        out
    }

    fn collect_dependencies<'a>(&'a self, out: &mut Vec<&'a TaskId>) {
        match self {
            Policy::After { task, .. } => {
                if !out.contains(&task) {
                    out.push(task);
                }
            }
            Policy::All { of } => of.iter().for_each(|p| p.collect_dependencies(out)),
            Policy::Once | Policy::Every { .. } | Policy::PerDay { .. } => {}
        }
    }

    /// Earliest instant this policy allows the next iteration.
    ///
    /// `None` means no constraint; `Some(Instant::NEVER)` means exhausted.
    /// `last` must be the latest timestamp in `entries`.
    pub fn floor(
        &self,
        now: Instant,
        entries: &[CompletionEntry],
        last: Option<Instant>,
        deps: &dyn DependencyView,
    ) -> Option<Instant> {
        match self {
            Policy::Once => (!entries.is_empty()).then_some(Instant::NEVER),

            Policy::Every { interval, limit } => {
                if limit.is_some_and(|n| entries.len() >= n as usize) {
                    return Some(Instant::NEVER);
                }
                last.map(|t| t + *interval)
            }

            Policy::PerDay { times, min_gap } => {
                let last = last?;
                let gap_floor = last + *min_gap;

                let today = Interval::day_of(now);
                let done_today = entries
                    .iter()
                    .filter(|e| today.contains(e.timestamp()))
                    .count();
                if done_today >= *times as usize {
                    let tomorrow = today.end() + Duration::from_seconds(1);
                    Some(gap_floor.max(tomorrow))
                } else {
                    Some(gap_floor)
                }
            }

            Policy::After { task, delay } => deps.last_completed(task).map(|t| t + *delay),

            Policy::All { of } => {
                let mut floor: Option<Instant> = None;
                for member in of {
                    match member.floor(now, entries, last, deps) {
                        Some(Instant::NEVER) => return Some(Instant::NEVER),
                        Some(t) => floor = Some(floor.map_or(t, |f| f.max(t))),
                        None => {}
                    }
                }
                floor
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> Instant {
        Instant::from_components(2026, 2, 20, h, m, 0).unwrap()
    }

    fn entries(times: &[Instant]) -> Vec<CompletionEntry> {
        times
            .iter()
            .map(|t| CompletionEntry::new(TaskId::new("t"), "tester", *t, ""))
            .collect()
    }

    #[test]
    fn validate_rejects_degenerate_policies() {
        assert!(Policy::every(Duration::ZERO).validate().is_err());
        assert!(Policy::Every { interval: Duration::from_hours(1), limit: Some(0) }
            .validate()
            .is_err());
        assert!(Policy::PerDay { times: 0, min_gap: Duration::ZERO }.validate().is_err());
        assert!(Policy::after("x", Duration::from_hours(-1)).validate().is_err());
        assert!(Policy::all([]).validate().is_err());
        assert!(Policy::all([Policy::Once, Policy::every(Duration::ZERO)])
            .validate()
            .is_err());
        assert!(Policy::all([Policy::Once, Policy::after("x", Duration::ZERO)])
            .validate()
            .is_ok());
    }

    #[test]
    fn dependencies_are_deduplicated() {
        let p = Policy::all([
            Policy::after("a", Duration::from_hours(1)),
            Policy::every(Duration::from_hours(6)),
            Policy::all([Policy::after("b", Duration::ZERO), Policy::after("a", Duration::ZERO)]),
        ]);
        let deps: Vec<&str> = p.dependencies().into_iter().map(TaskId::as_str).collect();
        assert_eq!(deps, vec!["a", "b"]);
    }

    #[test]
    fn once_is_exhausted_after_first_completion() {
        let log = entries(&[at(8, 0)]);
        assert_eq!(Policy::Once.floor(at(9, 0), &[], None, &NoDependencies), None);
        assert_eq!(
            Policy::Once.floor(at(9, 0), &log, Some(at(8, 0)), &NoDependencies),
            Some(Instant::NEVER)
        );
    }

    #[test]
    fn every_spaces_from_last_completion_and_honors_limit() {
        let p = Policy::Every { interval: Duration::from_hours(8), limit: Some(2) };
        let one = entries(&[at(1, 0)]);
        assert_eq!(p.floor(at(2, 0), &one, Some(at(1, 0)), &NoDependencies), Some(at(9, 0)));

        let two = entries(&[at(1, 0), at(9, 0)]);
        assert_eq!(
            p.floor(at(10, 0), &two, Some(at(9, 0)), &NoDependencies),
            Some(Instant::NEVER)
        );
    }

    #[test]
    fn per_day_waits_for_midnight_once_quota_is_used() {
        let p = Policy::PerDay { times: 2, min_gap: Duration::from_hours(6) };

        let one = entries(&[at(7, 0)]);
        assert_eq!(p.floor(at(8, 0), &one, Some(at(7, 0)), &NoDependencies), Some(at(13, 0)));

        let two = entries(&[at(7, 0), at(14, 0)]);
        let midnight = Instant::from_components(2026, 2, 21, 0, 0, 0).unwrap();
        assert_eq!(p.floor(at(15, 0), &two, Some(at(14, 0)), &NoDependencies), Some(midnight));
    }

    #[test]
    fn per_day_gap_can_outlast_midnight() {
        let p = Policy::PerDay { times: 1, min_gap: Duration::from_hours(12) };
        let late = entries(&[at(20, 0)]);
        let next = Instant::from_components(2026, 2, 21, 8, 0, 0).unwrap();
        assert_eq!(p.floor(at(21, 0), &late, Some(at(20, 0)), &NoDependencies), Some(next));
    }

    #[test]
    fn after_reads_dependency_completion() {
        let p = Policy::after("pill-abc", Duration::from_hours(4));
        let mut deps = HashMap::new();
        assert_eq!(p.floor(at(9, 0), &[], None, &deps), None);

        deps.insert(TaskId::new("pill-abc"), at(8, 0));
        assert_eq!(p.floor(at(9, 0), &[], None, &deps), Some(at(12, 0)));
    }

    #[test]
    fn all_takes_latest_floor_and_propagates_exhaustion() {
        let mut deps = BTreeMap::new();
        deps.insert(TaskId::new("a"), at(10, 0));

        let p = Policy::all([
            Policy::every(Duration::from_hours(6)),
            Policy::after("a", Duration::from_hours(4)),
        ]);
        let log = entries(&[at(6, 0)]);
        assert_eq!(p.floor(at(11, 0), &log, Some(at(6, 0)), &deps), Some(at(14, 0)));

        let done = Policy::all([Policy::Once, Policy::after("a", Duration::ZERO)]);
        assert_eq!(
            done.floor(at(11, 0), &log, Some(at(6, 0)), &deps),
            Some(Instant::NEVER)
        );
    }

    #[test]
    fn policy_deserializes_from_tagged_json() {
        let p: Policy = serde_json::from_str(
            r#"{"kind":"all","of":[{"kind":"every","interval":"6h"},{"kind":"after","task":"a","delay":"4h"}]}"#,
        )
        .unwrap();
        assert_eq!(
            p,
            Policy::all([
                Policy::every(Duration::from_hours(6)),
                Policy::after("a", Duration::from_hours(4)),
            ])
        );

        let per_day: Policy = serde_json::from_str(r#"{"kind":"per_day","times":2}"#).unwrap();
        assert_eq!(per_day, Policy::PerDay { times: 2, min_gap: Duration::ZERO });
    }
}
