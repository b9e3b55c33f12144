//! medtrack-core: recurrence and status engine for recurring obligations.
//!
//! Pure library: no I/O, no logging. Callers supply `now` and read back a
//! status; the only mutation is appending completions.

pub mod board;
pub mod entry;
pub mod error;
pub mod policy;
pub mod task;
pub mod time;

pub use board::{TaskBoard, TaskReport};
pub use entry::CompletionEntry;
pub use error::{EngineError, TimeError};
pub use policy::{DependencyView, NoDependencies, Policy};
pub use task::{Task, TaskId, TaskStatus};
pub use time::{Components, Duration, Instant, Interval};
