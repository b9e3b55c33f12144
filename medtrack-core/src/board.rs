//! TaskBoard: the set of tasks a caller queries together.
//!
//! The board owns its tasks and guarantees, from construction on:
//! - task ids are unique
//! - every dependency refers to a task on the board
//! - the dependency graph is acyclic
//!
//! so evaluation never has to guard against missing or circular references.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::entry::CompletionEntry;
use crate::error::EngineError;
use crate::policy::DependencyView;
use crate::task::{Task, TaskId, TaskStatus};
use crate::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct TaskBoard {
    tasks: BTreeMap<TaskId, Task>,
}

/// Evaluation of one task at one instant, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub id: TaskId,
    pub name: String,
    pub required: bool,
    pub status: TaskStatus,
    /// `None` when the task is done.
    pub next_due: Option<Instant>,
    /// Negative when overdue; `None` when done.
    pub seconds_until_due: Option<i64>,
    /// Human form of `seconds_until_due` (`in 2 hours` / `5 minutes ago`).
    pub due_in: String,
    pub completions: usize,
    pub last_completed: Option<Instant>,
}

impl TaskBoard {
    pub fn new(tasks: impl IntoIterator<Item = Task>) -> Result<Self, EngineError> {
        let mut map = BTreeMap::new();
        for task in tasks {
            if map.contains_key(task.id()) {
                return Err(EngineError::DuplicateTask(task.id().clone()));
            }
            map.insert(task.id().clone(), task);
        }
        validate_graph(&map)?;
        Ok(Self { tasks: map })
    }

    /// Add a task; the board is unchanged if the result would be invalid.
    pub fn insert(&mut self, task: Task) -> Result<(), EngineError> {
        if self.tasks.contains_key(task.id()) {
            return Err(EngineError::DuplicateTask(task.id().clone()));
        }
        let id = task.id().clone();
        self.tasks.insert(id.clone(), task);
        if let Err(err) = validate_graph(&self.tasks) {
            self.tasks.remove(&id);
            return Err(err);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &TaskId> {
        self.tasks.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    fn task(&self, id: &str) -> Result<&Task, EngineError> {
        self.tasks
            .get(id)
            .ok_or_else(|| EngineError::UnknownTask(TaskId::new(id)))
    }

    pub fn next_iteration(&self, id: &str, now: Instant) -> Result<Instant, EngineError> {
        Ok(self.task(id)?.next_iteration(now, self))
    }

    pub fn status(&self, id: &str, now: Instant) -> Result<TaskStatus, EngineError> {
        Ok(self.task(id)?.status(now, self))
    }

    pub fn is_due(&self, id: &str, now: Instant) -> Result<bool, EngineError> {
        Ok(self.task(id)?.is_due(now, self))
    }

    pub fn time_until_due(&self, id: &str, now: Instant) -> Result<Duration, EngineError> {
        Ok(self.task(id)?.time_until_due(now, self))
    }

    /// Append a completion to a task's log.
    pub fn record(
        &mut self,
        id: &str,
        author: impl Into<String>,
        timestamp: Instant,
        notes: impl Into<String>,
    ) -> Result<CompletionEntry, EngineError> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| EngineError::UnknownTask(TaskId::new(id)))?;
        task.record(author, timestamp, notes)
    }

    pub fn report(&self, id: &str, now: Instant) -> Result<TaskReport, EngineError> {
        Ok(self.report_for(self.task(id)?, now))
    }

    /// Reports for every task, soonest due first (done tasks last), ties by id.
    pub fn reports(&self, now: Instant) -> Vec<TaskReport> {
        let mut out: Vec<TaskReport> = self.iter().map(|t| self.report_for(t, now)).collect();
        out.sort_by(|a, b| {
            let ka = a.next_due.unwrap_or(Instant::NEVER);
            let kb = b.next_due.unwrap_or(Instant::NEVER);
            ka.cmp(&kb).then_with(|| a.id.cmp(&b.id))
        });
        out
    }

    fn report_for(&self, task: &Task, now: Instant) -> TaskReport {
        let next = task.next_iteration(now, self);
        let status = TaskStatus::classify(next, now, task.is_required());
        let (next_due, until) = if next.is_never() {
            (None, None)
        } else {
            (Some(next), Some(next - now))
        };

        TaskReport {
            id: task.id().clone(),
            name: task.name().to_string(),
            required: task.is_required(),
            status,
            next_due,
            seconds_until_due: until.map(|d| d.seconds()),
            due_in: until.map(describe_until).unwrap_or_default(),
            completions: task.entries().len(),
            last_completed: task.last_completed(),
        }
    }
}

impl DependencyView for TaskBoard {
    fn last_completed(&self, task: &TaskId) -> Option<Instant> {
        self.tasks.get(task).and_then(Task::last_completed)
    }
}

fn describe_until(until: Duration) -> String {
    if until.is_zero() {
        "now".to_string()
    } else if until.is_negative() {
        format!("{} ago", until.abs())
    } else {
        format!("in {until}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

fn validate_graph(tasks: &BTreeMap<TaskId, Task>) -> Result<(), EngineError> {
    for task in tasks.values() {
        for dep in task.dependencies() {
            if !tasks.contains_key(dep) {
                return Err(EngineError::UnknownDependency {
                    task: task.id().clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    let mut marks: HashMap<&TaskId, Mark> = HashMap::new();
    let mut path: Vec<&TaskId> = Vec::new();
    for id in tasks.keys() {
        visit(id, tasks, &mut marks, &mut path)?;
    }
    Ok(())
}

// Depth is bounded by the number of tasks: a task is re-entered only while
// `Visiting`, which is reported as a cycle.
fn visit<'a>(
    id: &'a TaskId,
    tasks: &'a BTreeMap<TaskId, Task>,
    marks: &mut HashMap<&'a TaskId, Mark>,
    path: &mut Vec<&'a TaskId>,
) -> Result<(), EngineError> {
    match marks.get(id) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = path.iter().position(|p| *p == id).unwrap_or(0);
            let mut cycle: Vec<TaskId> = path[start..].iter().map(|p| (*p).clone()).collect();
            cycle.push(id.clone());
            return Err(EngineError::DependencyCycle { path: cycle });
        }
        None => {}
    }

    marks.insert(id, Mark::Visiting);
    path.push(id);
    if let Some(task) = tasks.get(id) {
        for dep in task.dependencies() {
            visit(dep, tasks, marks, path)?;
        }
    }
    path.pop();
    marks.insert(id, Mark::Done);
    Ok(())
}
