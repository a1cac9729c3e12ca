use anyhow::Result;
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::file_ops;
use crate::keyed_cache::KeyedCache;
use crate::paths::{CacheLayout, ReportKind};

/// Stores one JSON report per file for a single task kind.
pub struct ReportStore<R> {
    layout: CacheLayout,
    kind: ReportKind,
    reports: KeyedCache<PathBuf, R>,
    _marker: PhantomData<fn() -> R>,
}

impl<R> ReportStore<R>
where
    R: Serialize + DeserializeOwned + Clone,
{
    pub fn new(layout: CacheLayout, kind: ReportKind) -> Self {
        Self {
            layout,
            kind,
            reports: KeyedCache::new(),
            _marker: PhantomData,
        }
    }

    pub fn kind(&self) -> ReportKind {
        self.kind
    }

    pub fn report_path(&self, file: &Path) -> Result<PathBuf> {
        self.layout.resolve_report(self.kind, file)
    }

    /// The previously stored report, or `None` when there is none or it no
    /// longer parses.
    pub fn load_report(&self, file: &Path) -> Option<R> {
        let key = file.to_path_buf();
        let loaded = self.reports.get_or_try_load(&key, || {
            let path = self.report_path(file)?;
            if !file_ops::file_exists(&path) {
                return Ok(None);
            }
            match file_ops::read_json::<R, _>(&path) {
                Ok(report) => Ok(Some(report)),
                Err(e) => {
                    warn!("Ignoring unreadable {} report: {:#}", self.kind.name(), e);
                    Ok(None)
                }
            }
        });
        match loaded {
            Ok(report) => report,
            Err(e) => {
                debug!("No {} report for {}: {:#}", self.kind.name(), file.display(), e);
                None
            }
        }
    }

    /// Persists `report` and returns where it was written.
    pub fn save_report(&self, file: &Path, report: &R) -> Result<PathBuf> {
        let key = file.to_path_buf();
        let path = self.report_path(file)?;
        self.reports.try_update(&key, |_| {
            file_ops::write_json(&path, report)?;
            Ok(report.clone())
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        path: String,
        has_issue: bool,
        issues: Vec<String>,
    }

    fn sample() -> Sample {
        Sample {
            path: "src/a.go".to_string(),
            has_issue: true,
            issues: vec!["nil check".to_string()],
        }
    }

    #[test]
    fn test_round_trip_through_fresh_store() {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("demo");
        let file = repo.join("src/a.go");
        let layout = CacheLayout::new(dir.path().join("cache"), &repo);

        let store: ReportStore<Sample> = ReportStore::new(layout.clone(), ReportKind::Review);
        assert!(store.load_report(&file).is_none());
        let stored_at = store.save_report(&file, &sample()).unwrap();
        assert_eq!(stored_at, dir.path().join("cache/demo/src/a.go.review.json"));

        let fresh: ReportStore<Sample> = ReportStore::new(layout, ReportKind::Review);
        assert_eq!(fresh.load_report(&file), Some(sample()));
    }

    #[test]
    fn test_corrupt_report_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("demo");
        let file = repo.join("a.go");
        let layout = CacheLayout::new(dir.path().join("cache"), &repo);
        let store: ReportStore<Sample> = ReportStore::new(layout, ReportKind::Check);

        file_ops::write_file(store.report_path(&file).unwrap(), "{ truncated").unwrap();
        assert!(store.load_report(&file).is_none());
    }
}
