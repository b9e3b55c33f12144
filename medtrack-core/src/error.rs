//! Error types surfaced by the core.
//!
//! Both enums are returned synchronously; nothing in the core logs or retries.

use crate::task::TaskId;
use crate::time::Instant;

/// Validation failures in the time layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    #[error("interval start {start} is after end {end}")]
    InvertedInterval { start: Instant, end: Instant },

    #[error(
        "invalid calendar date/time {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
    )]
    InvalidCalendar {
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    },

    #[error("invalid duration '{0}' (expected e.g. \"6h\", \"1d 12h\", \"90m\")")]
    InvalidDuration(String),

    #[error("invalid instant '{0}' (expected RFC 3339, e.g. 2026-02-20T08:00:00Z)")]
    InvalidInstant(String),

    #[error("unknown placeholder '{{{0}}}' in duration pattern")]
    UnknownPlaceholder(String),

    #[error("unbalanced braces in duration pattern '{0}'")]
    UnbalancedPattern(String),
}

/// Configuration and lookup failures in the task engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("duplicate task id '{0}'")]
    DuplicateTask(TaskId),

    #[error("unknown task '{0}'")]
    UnknownTask(TaskId),

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: TaskId, dependency: TaskId },

    #[error("dependency cycle: {}", join_path(.path))]
    DependencyCycle { path: Vec<TaskId> },

    #[error("task '{task}' has an invalid policy: {reason}")]
    InvalidPolicy { task: TaskId, reason: String },

    /// `Instant::NEVER` only marks an exhausted recurrence; it is not a time
    /// a task can start or be completed at.
    #[error("task '{task}': {field} must be a real point in time, not 'never'")]
    SentinelInstant { task: TaskId, field: &'static str },
}

fn join_path(path: &[TaskId]) -> String {
    path.iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
