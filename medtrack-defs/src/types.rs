use medtrack_core::{EngineError, Instant, Policy, Task};
use serde::{Deserialize, Serialize};

/// One `[[task]]` table in a definition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskDefinition {
    pub id: String,
    /// Display name; defaults to the id.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_required")]
    pub required: bool,
    /// RFC 3339, quoted.
    #[serde(default)]
    pub starts_at: Option<Instant>,
    pub policy: Policy,
}

fn default_required() -> bool {
    true
}

impl TaskDefinition {
    /// Validate and build the core task.
    pub fn into_task(self) -> Result<Task, EngineError> {
        let name = self.name.unwrap_or_else(|| self.id.clone());
        let mut task = Task::new(self.id, name, self.policy)?.with_required(self.required);
        if let Some(at) = self.starts_at {
            task = task.with_start(at)?;
        }
        Ok(task)
    }
}

/// Top level of a definition file: any number of `[[task]]` tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefinitionFile {
    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskDefinition>,
}
