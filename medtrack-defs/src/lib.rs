//! medtrack-defs: declarative task definitions (TOML) and file loading.

pub mod loader;
pub mod parse;
pub mod types;

pub use loader::{LoadMode, LoadReport, SkippedFile, definition_files, load_dir, load_file, load_sources};
pub use parse::{parse_definitions, parse_tasks};
pub use types::{DefinitionFile, TaskDefinition};
