//! Deterministic cache locations.
//!
//! Every artifact path is a pure function of the cache directory, the
//! repository root and the file's path relative to that root, so later runs
//! over the same repository find what earlier runs stored.

use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

/// Task whose report is being stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Check,
    Review,
    Test,
}

impl ReportKind {
    pub fn suffix(self) -> &'static str {
        match self {
            ReportKind::Check => ".check.batchai.json",
            ReportKind::Review => ".review.json",
            ReportKind::Test => ".test.json",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ReportKind::Check => "check",
            ReportKind::Review => "review",
            ReportKind::Test => "test",
        }
    }
}

const SYMBOL_SUFFIX: &str = ".symbol.json";

#[derive(Debug, Clone)]
pub struct CacheLayout {
    cache_dir: PathBuf,
    repository: PathBuf,
}

fn with_suffix(path: PathBuf, suffix: &str) -> PathBuf {
    let mut s = path.into_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

impl CacheLayout {
    pub fn new(cache_dir: impl Into<PathBuf>, repository: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            repository: repository.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn repository(&self) -> &Path {
        &self.repository
    }

    /// Final component of the repository path.
    pub fn repo_name(&self) -> &str {
        self.repository
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("repository")
    }

    /// Path of `file` relative to the repository root.
    pub fn relative(&self, file: &Path) -> Result<PathBuf> {
        match file.strip_prefix(&self.repository) {
            Ok(rel) => Ok(rel.to_path_buf()),
            Err(_) => bail!(
                "{} is not inside repository {}",
                file.display(),
                self.repository.display()
            ),
        }
    }

    /// `<cache>/<repo>/<rel>`: snapshot of the content last seen.
    pub fn resolve_original(&self, file: &Path) -> Result<PathBuf> {
        Ok(self.cache_dir.join(self.repo_name()).join(self.relative(file)?))
    }

    pub fn resolve_report(&self, kind: ReportKind, file: &Path) -> Result<PathBuf> {
        let rel = self.relative(file)?;
        let base = match kind {
            ReportKind::Check => self.cache_dir.join(rel),
            ReportKind::Review | ReportKind::Test => self.cache_dir.join(self.repo_name()).join(rel),
        };
        Ok(with_suffix(base, kind.suffix()))
    }

    /// `<cache>/<repo>/<rel>.symbol.json`
    pub fn resolve_symbol(&self, file: &Path) -> Result<PathBuf> {
        Ok(with_suffix(self.resolve_original(file)?, SYMBOL_SUFFIX))
    }
}
