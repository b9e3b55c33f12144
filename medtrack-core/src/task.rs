//! Task model and the scheduling contract.
//!
//! Status and next-due are never stored: every query recomputes them from
//! `now`, the completion log and the dependency view.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::entry::CompletionEntry;
use crate::error::EngineError;
use crate::policy::{DependencyView, Policy};
use crate::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    /// Required and due now.
    Needed,
    /// Optional and available now.
    Ready,
    /// Not available until a later instant.
    Waiting,
    /// No upcoming iterations.
    Done,
}

impl TaskStatus {
    pub fn classify(next: Instant, now: Instant, required: bool) -> Self {
        if next.is_never() {
            TaskStatus::Done
        } else if next > now {
            TaskStatus::Waiting
        } else if required {
            TaskStatus::Needed
        } else {
            TaskStatus::Ready
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Needed => "NEEDED",
            TaskStatus::Ready => "READY",
            TaskStatus::Waiting => "WAITING",
            TaskStatus::Done => "DONE",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recurring obligation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    id: TaskId,
    name: String,
    required: bool,
    starts_at: Option<Instant>,
    policy: Policy,
    entries: Vec<CompletionEntry>,
}

impl Task {
    /// Required by default; see [`Task::optional`].
    pub fn new(
        id: impl Into<TaskId>,
        name: impl Into<String>,
        policy: Policy,
    ) -> Result<Self, EngineError> {
        let id = id.into();
        policy
            .validate()
            .map_err(|reason| EngineError::InvalidPolicy {
                task: id.clone(),
                reason,
            })?;
        if policy.dependencies().contains(&&id) {
            return Err(EngineError::DependencyCycle {
                path: vec![id.clone(), id],
            });
        }

        Ok(Self {
            id,
            name: name.into(),
            required: true,
            starts_at: None,
            policy,
            entries: Vec::new(),
        })
    }

    pub fn optional(self) -> Self {
        self.with_required(false)
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Nothing is due before `at`.
    pub fn with_start(mut self, at: Instant) -> Result<Self, EngineError> {
        if at.is_never() {
            return Err(EngineError::SentinelInstant {
                task: self.id,
                field: "start time",
            });
        }
        self.starts_at = Some(at);
        Ok(self)
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn starts_at(&self) -> Option<Instant> {
        self.starts_at
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn dependencies(&self) -> Vec<&TaskId> {
        self.policy.dependencies()
    }

    /// Completion log in insertion order.
    pub fn entries(&self) -> &[CompletionEntry] {
        &self.entries
    }

    /// Latest completion timestamp; backdated entries don't move it back.
    pub fn last_completed(&self) -> Option<Instant> {
        self.entries.iter().map(CompletionEntry::timestamp).max()
    }

    /// Append a completion to the log.
    pub fn record(
        &mut self,
        author: impl Into<String>,
        timestamp: Instant,
        notes: impl Into<String>,
    ) -> Result<CompletionEntry, EngineError> {
        if timestamp.is_never() {
            return Err(EngineError::SentinelInstant {
                task: self.id.clone(),
                field: "completion time",
            });
        }
        let entry = CompletionEntry::new(self.id.clone(), author, timestamp, notes);
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Next instant this task becomes due.
    ///
    /// - `Instant::NEVER` once the recurrence is exhausted.
    /// - Otherwise the latest of the start time and the policy floor.
    /// - With neither (never completed, nothing gating it), `now`.
    pub fn next_iteration(&self, now: Instant, deps: &dyn DependencyView) -> Instant {
        let floor = self
            .policy
            .floor(now, &self.entries, self.last_completed(), deps);
        if floor == Some(Instant::NEVER) {
            return Instant::NEVER;
        }
        [self.starts_at, floor]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(now)
    }

    pub fn status(&self, now: Instant, deps: &dyn DependencyView) -> TaskStatus {
        TaskStatus::classify(self.next_iteration(now, deps), now, self.required)
    }

    pub fn is_due(&self, now: Instant, deps: &dyn DependencyView) -> bool {
        self.next_iteration(now, deps) <= now
    }

    /// Negative when overdue.
    pub fn time_until_due(&self, now: Instant, deps: &dyn DependencyView) -> Duration {
        self.next_iteration(now, deps) - now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::NoDependencies;

    fn at(h: u32, m: u32, s: u32) -> Instant {
        Instant::from_components(2026, 2, 20, h, m, s).unwrap()
    }

    #[test]
    fn new_rejects_invalid_policy() {
        let err = Task::new("t", "bad", Policy::every(Duration::ZERO)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPolicy { .. }));
    }

    #[test]
    fn new_rejects_self_dependency() {
        let err = Task::new("t", "loop", Policy::after("t", Duration::from_hours(1))).unwrap_err();
        assert_eq!(
            err,
            EngineError::DependencyCycle { path: vec![TaskId::new("t"), TaskId::new("t")] }
        );
    }

    #[test]
    fn never_completed_is_due_now() {
        let t = Task::new("pill", "Pill", Policy::every(Duration::from_hours(8))).unwrap();
        let now = at(9, 0, 0);
        assert_eq!(t.next_iteration(now, &NoDependencies), now);
        assert_eq!(t.status(now, &NoDependencies), TaskStatus::Needed);
        assert_eq!(t.time_until_due(now, &NoDependencies), Duration::ZERO);
    }

    #[test]
    fn start_time_holds_a_fresh_task_back() {
        let t = Task::new("pill", "Pill", Policy::Once)
            .unwrap()
            .with_start(at(12, 0, 0))
            .unwrap();
        assert_eq!(t.status(at(11, 0, 0), &NoDependencies), TaskStatus::Waiting);
        assert_eq!(t.status(at(12, 0, 0), &NoDependencies), TaskStatus::Needed);
        // Overdue since the start.
        assert_eq!(
            t.time_until_due(at(13, 0, 0), &NoDependencies),
            Duration::from_hours(-1)
        );
    }

    #[test]
    fn waiting_then_needed_at_exact_boundary() {
        let mut t = Task::new("pill", "Pill", Policy::every(Duration::from_hours(8))).unwrap();
        t.record("sam", at(1, 0, 0), "").unwrap();

        let before = at(8, 59, 59);
        assert_eq!(t.status(before, &NoDependencies), TaskStatus::Waiting);
        assert_eq!(t.time_until_due(before, &NoDependencies), Duration::from_seconds(1));
        assert!(!t.is_due(before, &NoDependencies));

        let due = at(9, 0, 0);
        assert_eq!(t.status(due, &NoDependencies), TaskStatus::Needed);
        assert!(t.is_due(due, &NoDependencies));
        assert_eq!(t.time_until_due(due, &NoDependencies), Duration::ZERO);
    }

    #[test]
    fn optional_task_is_ready_not_needed() {
        let mut t = Task::new("walk", "Walk", Policy::every(Duration::from_hours(8)))
            .unwrap()
            .optional();
        t.record("sam", at(1, 0, 0), "").unwrap();
        assert_eq!(t.status(at(9, 0, 0), &NoDependencies), TaskStatus::Ready);
        assert_eq!(t.status(at(2, 0, 0), &NoDependencies), TaskStatus::Waiting);
    }

    #[test]
    fn once_is_done_after_completion_regardless_of_now() {
        let mut t = Task::new("vaccine", "Vaccine", Policy::Once).unwrap();
        t.record("sam", at(10, 0, 0), "left arm").unwrap();
        for now in [at(0, 0, 0), at(10, 0, 0), Instant::from_offset(i64::MAX - 1)] {
            assert_eq!(t.status(now, &NoDependencies), TaskStatus::Done);
        }
    }

    #[test]
    fn backdated_entry_does_not_move_last_completion() {
        let mut t = Task::new("pill", "Pill", Policy::every(Duration::from_hours(8))).unwrap();
        t.record("sam", at(6, 0, 0), "").unwrap();
        t.record("sam", at(2, 0, 0), "forgot to log earlier dose").unwrap();
        assert_eq!(t.entries().len(), 2);
        assert_eq!(t.entries()[1].timestamp(), at(2, 0, 0));
        assert_eq!(t.last_completed(), Some(at(6, 0, 0)));
        assert_eq!(t.next_iteration(at(7, 0, 0), &NoDependencies), at(14, 0, 0));
    }

    #[test]
    fn overdue_time_is_negative() {
        let mut t = Task::new("pill", "Pill", Policy::every(Duration::from_hours(1))).unwrap();
        t.record("sam", at(1, 0, 0), "").unwrap();
        assert_eq!(
            t.time_until_due(at(3, 30, 0), &NoDependencies),
            Duration::from_minutes(-90)
        );
    }

    #[test]
    fn never_is_rejected_as_completion_or_start() {
        let mut t = Task::new("pill", "Pill", Policy::every(Duration::from_hours(8))).unwrap();
        assert!(matches!(
            t.record("sam", Instant::NEVER, ""),
            Err(EngineError::SentinelInstant { field: "completion time", .. })
        ));
        assert!(t.entries().is_empty());
        assert_eq!(t.status(at(8, 0, 0), &NoDependencies), TaskStatus::Needed);

        let err = t.clone().with_start(Instant::NEVER).unwrap_err();
        assert_eq!(
            err,
            EngineError::SentinelInstant { task: TaskId::new("pill"), field: "start time" }
        );
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&TaskStatus::Waiting).unwrap(), "\"WAITING\"");
        assert_eq!(TaskStatus::Needed.to_string(), "NEEDED");
    }
}
