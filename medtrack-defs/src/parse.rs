//! TOML task definitions.
//!
//! ```toml
//! [[task]]
//! id = "pill-xyz"
//! name = "Pill XYZ"
//!
//! [task.policy]
//! kind = "all"
//!
//! [[task.policy.of]]
//! kind = "every"
//! interval = "6h"
//!
//! [[task.policy.of]]
//! kind = "after"
//! task = "pill-abc"
//! delay = "4h"
//! ```

use anyhow::{Context, Result};
use medtrack_core::Task;

use crate::types::{DefinitionFile, TaskDefinition};

pub fn parse_definitions(text: &str) -> Result<Vec<TaskDefinition>> {
    let file: DefinitionFile = toml::from_str(text).context("invalid task definition TOML")?;
    Ok(file.tasks)
}

/// Parse and validate every task in `text`. Fails on the first invalid task.
pub fn parse_tasks(text: &str) -> Result<Vec<Task>> {
    parse_definitions(text)?
        .into_iter()
        .map(|def| {
            let id = def.id.clone();
            def.into_task().with_context(|| format!("task '{id}'"))
        })
        .collect()
}
