//! Repository file collection.
//!
//! Walks the repository (or the requested targets inside it) with the
//! `ignore` crate, so `.gitignore` and `.batchai_ignore` files apply with
//! full gitignore semantics. Files hidden by an ignore file are never seen.
//! Of the rest, a file is ignored when a configured exclude matches it or no
//! configured include does.

use anyhow::{Context, Result, bail};
use glob::{MatchOptions, Pattern};
use ignore::{DirEntry, WalkBuilder};
use log::{debug, warn};
use std::path::{Path, PathBuf};

pub const IGNORE_FILES: [&str; 2] = [".gitignore", ".batchai_ignore"];

const MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Result of a collection pass.
#[derive(Debug, Default)]
pub struct WorkingFiles {
    /// Files to process.
    pub targets: Vec<PathBuf>,
    /// Every eligible file of the repository, for the symbol pre-pass.
    pub repo_files: Vec<PathBuf>,
    pub ignored: usize,
    pub failed: Vec<(PathBuf, String)>,
}

#[derive(Debug, Default)]
struct Collected {
    files: Vec<PathBuf>,
    ignored: usize,
    failed: Vec<(PathBuf, String)>,
}

pub struct FileScanner {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).with_context(|| format!("Invalid glob pattern: {}", p)))
        .collect()
}

fn walker(dir: &Path) -> WalkBuilder {
    let mut builder = WalkBuilder::new(dir);
    builder
        .hidden(false)
        .follow_links(false)
        .parents(true)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(true)
        .require_git(false)
        .add_custom_ignore_filename(IGNORE_FILES[1])
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry: &DirEntry| entry.file_name() != ".git");
    builder
}

/// Path of an unreadable entry, when the walk error is an I/O failure on one.
fn unreadable_path(err: &ignore::Error) -> Option<PathBuf> {
    match err {
        ignore::Error::WithPath { path, err } => match err.as_ref() {
            ignore::Error::Io(_) => Some(path.clone()),
            inner => unreadable_path(inner),
        },
        ignore::Error::WithDepth { err, .. } => unreadable_path(err),
        _ => None,
    }
}

impl FileScanner {
    pub fn new(includes: &[String], excludes: &[String]) -> Result<Self> {
        Ok(Self {
            includes: compile(includes)?,
            excludes: compile(excludes)?,
        })
    }

    fn accepts(&self, rel: &Path) -> bool {
        if self.excludes.iter().any(|p| p.matches_path_with(rel, MATCH)) {
            return false;
        }
        self.includes.is_empty() || self.includes.iter().any(|p| p.matches_path_with(rel, MATCH))
    }

    /// Collects targets (the whole repository when `targets` is empty) plus
    /// the repository-wide file list. Every target must lie inside the
    /// repository.
    pub fn collect(&self, repository: &Path, targets: &[PathBuf]) -> Result<WorkingFiles> {
        let repo = self.collect_dir(repository, repository);

        if targets.is_empty() {
            return Ok(WorkingFiles {
                targets: repo.files.clone(),
                repo_files: repo.files,
                ignored: repo.ignored,
                failed: repo.failed,
            });
        }

        let mut picked = Collected::default();
        for target in targets {
            if !target.starts_with(repository) {
                bail!(
                    "{} is not inside repository {}",
                    target.display(),
                    repository.display()
                );
            }
            if target.is_dir() {
                let sub = self.collect_dir(repository, target);
                picked.files.extend(sub.files);
                picked.ignored += sub.ignored;
                picked.failed.extend(sub.failed);
            } else if target.is_file() {
                picked.files.push(target.clone());
            } else {
                bail!("Target not found: {}", target.display());
            }
        }
        picked.files.dedup();

        Ok(WorkingFiles {
            targets: picked.files,
            repo_files: repo.files,
            ignored: picked.ignored,
            failed: picked.failed,
        })
    }

    fn collect_dir(&self, repository: &Path, dir: &Path) -> Collected {
        let mut out = Collected::default();
        for entry in walker(dir).build() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    match unreadable_path(&e) {
                        Some(path) => {
                            warn!("Failed to read {}: {}", path.display(), e);
                            out.failed.push((path, e.to_string()));
                        }
                        None => warn!("Walking {}: {}", dir.display(), e),
                    }
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if IGNORE_FILES.iter().any(|n| entry.file_name() == *n) {
                continue;
            }

            let path = entry.path();
            let rel = path.strip_prefix(repository).unwrap_or(path);
            if !self.accepts(rel) {
                debug!("Ignored: {}", rel.display());
                out.ignored += 1;
                continue;
            }
            out.files.push(path.to_path_buf());
        }
        out
    }
}
