//! Completion log entries.

use serde::{Deserialize, Serialize};

use crate::task::TaskId;
use crate::time::Instant;

/// One performed instance of a task.
///
/// Entries refer to their task by id only; the owning `Task` keeps them in an
/// append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEntry {
    task: TaskId,
    author: String,
    timestamp: Instant,
    #[serde(default)]
    notes: String,
}

impl CompletionEntry {
    pub fn new(
        task: TaskId,
        author: impl Into<String>,
        timestamp: Instant,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            task,
            author: author.into(),
            timestamp,
            notes: notes.into(),
        }
    }

    pub fn task(&self) -> &TaskId {
        &self.task
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }
}
