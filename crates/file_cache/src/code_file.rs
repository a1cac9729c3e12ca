use anyhow::Result;
use log::debug;
use std::path::{Path, PathBuf};

use crate::file_ops;
use crate::keyed_cache::KeyedCache;
use crate::paths::CacheLayout;

/// 缓存镜像中的原始内容与磁盘上的最新内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFile {
    pub original: String,
    pub latest: String,
}

impl CodeFile {
    pub fn is_changed(&self) -> bool {
        self.original != self.latest
    }
}

/// Per-run change detection over the `<cache>/<repo>/<rel>` mirror.
pub struct ContentCache {
    layout: CacheLayout,
    files: KeyedCache<PathBuf, CodeFile>,
}

impl ContentCache {
    pub fn new(layout: CacheLayout) -> Self {
        Self {
            layout,
            files: KeyedCache::new(),
        }
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    /// Reads the file and its mirror once per run. A missing mirror is seeded
    /// with the current content, so a first sighting counts as unchanged.
    pub fn load(&self, file: &Path) -> Result<CodeFile> {
        let key = file.to_path_buf();
        let loaded = self.files.get_or_try_load(&key, || {
            let latest = file_ops::read_file(file)?;
            let mirror = self.layout.resolve_original(file)?;

            let original = if file_ops::file_exists(&mirror) {
                file_ops::read_file(&mirror)?
            } else {
                debug!("Seeding mirror {}", mirror.display());
                file_ops::write_file(&mirror, &latest)?;
                latest.clone()
            };
            Ok(Some(CodeFile { original, latest }))
        })?;

        loaded.ok_or_else(|| anyhow::anyhow!("Failed to load {}", file.display()))
    }

    /// 同时写入源文件和镜像，写入后该文件视为未修改
    pub fn save(&self, file: &Path, content: &str) -> Result<()> {
        let key = file.to_path_buf();
        self.files.try_update(&key, |_| {
            file_ops::write_file(file, content)?;
            file_ops::write_file(self.layout.resolve_original(file)?, content)?;
            Ok(CodeFile {
                original: content.to_string(),
                latest: content.to_string(),
            })
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        repo: PathBuf,
        cache: ContentCache,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("demo");
        let cache = ContentCache::new(CacheLayout::new(dir.path().join("cache"), &repo));
        Fixture { _dir: dir, repo, cache }
    }

    #[test]
    fn test_first_load_seeds_mirror() {
        let f = fixture();
        let file = f.repo.join("a.go");
        file_ops::write_file(&file, "package a\n").unwrap();

        let code = f.cache.load(&file).unwrap();
        assert!(!code.is_changed());
        let mirror = f.cache.layout().resolve_original(&file).unwrap();
        assert_eq!(file_ops::read_file(mirror).unwrap(), "package a\n");
    }

    #[test]
    fn test_load_is_memoized() {
        let f = fixture();
        let file = f.repo.join("a.go");
        file_ops::write_file(&file, "v1").unwrap();

        let first = f.cache.load(&file).unwrap();
        file_ops::write_file(&file, "v2").unwrap();
        let second = f.cache.load(&file).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_change_detected_against_mirror() {
        let f = fixture();
        let file = f.repo.join("a.go");
        file_ops::write_file(&file, "v1").unwrap();
        f.cache.load(&file).unwrap();

        file_ops::write_file(&file, "v2").unwrap();
        let next_run = ContentCache::new(f.cache.layout().clone());
        let code = next_run.load(&file).unwrap();
        assert!(code.is_changed());
        assert_eq!(code.original, "v1");
        assert_eq!(code.latest, "v2");
    }

    #[test]
    fn test_save_collapses_diff() {
        let f = fixture();
        let file = f.repo.join("a.go");
        file_ops::write_file(&file, "v1").unwrap();
        f.cache.load(&file).unwrap();

        f.cache.save(&file, "fixed\n").unwrap();
        let code = f.cache.load(&file).unwrap();
        assert_eq!(code.latest, "fixed\n");
        assert!(!code.is_changed());
        assert_eq!(file_ops::read_file(&file).unwrap(), "fixed\n");

        let next_run = ContentCache::new(f.cache.layout().clone());
        assert!(!next_run.load(&file).unwrap().is_changed());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let f = fixture();
        assert!(f.cache.load(&f.repo.join("missing.go")).is_err());
    }
}
