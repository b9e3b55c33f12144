//! Locate definition files and load them into tasks.
//!
//! A directory is scanned non-recursively for `*.toml`, in file-name order so
//! repeated loads produce the same task order. Explicit files are loaded after
//! the directory; a path seen twice is loaded once.

use anyhow::{Context, Result, bail};
use medtrack_core::Task;
use std::fs;
use std::path::{Path, PathBuf};

use crate::parse::parse_tasks;

/// What to do with a definition file that fails to load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadMode {
    /// Fail the whole load.
    #[default]
    Strict,
    /// Skip the file and report it in [`LoadReport::skipped`].
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub tasks: Vec<Task>,
    /// Files that loaded successfully.
    pub files: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
}

pub fn load_file(path: &Path) -> Result<Vec<Task>> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_tasks(&text).with_context(|| format!("load {}", path.display()))
}

/// `*.toml` files directly inside `dir`, sorted by file name.
pub fn definition_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("task directory not found: {}", dir.display());
    }

    let mut out = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("read dir {}", dir.display()))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

pub fn load_dir(dir: &Path, mode: LoadMode) -> Result<LoadReport> {
    load_sources(Some(dir), &[], mode)
}

pub fn load_sources(dir: Option<&Path>, files: &[PathBuf], mode: LoadMode) -> Result<LoadReport> {
    let mut report = LoadReport::default();
    let mut paths: Vec<PathBuf> = Vec::new();

    if let Some(dir) = dir {
        match definition_files(dir) {
            Ok(found) => paths.extend(found),
            Err(err) if mode == LoadMode::Lenient => report.skipped.push(SkippedFile {
                path: dir.to_path_buf(),
                reason: format!("{err:#}"),
            }),
            Err(err) => return Err(err),
        }
    }
    let mut seen: Vec<PathBuf> = paths.iter().map(|p| same_file_key(p)).collect();
    for file in files {
        let key = same_file_key(file);
        if !seen.contains(&key) {
            seen.push(key);
            paths.push(file.clone());
        }
    }

    for path in paths {
        match load_file(&path) {
            Ok(tasks) => {
                report.tasks.extend(tasks);
                report.files.push(path);
            }
            Err(err) if mode == LoadMode::Lenient => report.skipped.push(SkippedFile {
                path,
                reason: format!("{err:#}"),
            }),
            Err(err) => return Err(err),
        }
    }

    Ok(report)
}

/// `tasks/a.toml` and `./tasks/a.toml` name the same file. Paths that cannot
/// be resolved (missing files) compare by their literal text.
fn same_file_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
