//! Cross-file symbol index.
//!
//! Symbols are extracted per file by the symbol agent, cached in
//! `<cache>/<repo>/<rel>.symbol.json` sidecars and indexed twice: by owning
//! file and by simple name. [`SymbolIndex::lookup`] only sees files that were
//! loaded or saved before it runs, so callers prime the index with
//! [`SymbolIndex::load_all`] first.

use file_cache::{CacheLayout, read_json, write_json};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// JSON shape the symbol agent asks the model to produce for each symbol.
pub const SYMBOL_JSON_FORMAT: &str = r#"
{
	"name": name of this symbol,
	"lines": "content of lines that defines or initialize this symbol; don't include body of methods or functions"
}
"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub lines: String,
}

#[derive(Debug, Error)]
pub enum SymbolError {
    #[error("expect symbol path {expected} but got {actual}")]
    PathMismatch { expected: String, actual: String },

    #[error("symbol sidecar: {0:#}")]
    Io(anyhow::Error),

    #[error("cannot resolve symbol sidecar: {0:#}")]
    Layout(anyhow::Error),
}

#[derive(Default)]
struct Indexes {
    by_name: HashMap<String, Vec<Symbol>>,
    by_file: HashMap<PathBuf, Vec<Symbol>>,
}

impl Indexes {
    fn insert(&mut self, file: &Path, symbols: Vec<Symbol>) {
        for s in &symbols {
            let named = self.by_name.entry(s.name.clone()).or_default();
            if !named.contains(s) {
                named.push(s.clone());
            }
        }
        self.by_file.insert(file.to_path_buf(), symbols);
    }
}

pub struct SymbolIndex {
    layout: CacheLayout,
    indexes: RwLock<Indexes>,
}

fn owner_of(file: &Path) -> String {
    file.to_string_lossy().into_owned()
}

/// Every symbol must name `file` as its owner.
fn verify_owner(file: &Path, symbols: &[Symbol]) -> Result<(), SymbolError> {
    let expected = owner_of(file);
    match symbols.iter().find(|s| s.path != expected) {
        Some(s) => Err(SymbolError::PathMismatch {
            expected,
            actual: s.path.clone(),
        }),
        None => Ok(()),
    }
}

impl SymbolIndex {
    pub fn new(layout: CacheLayout) -> Self {
        Self {
            layout,
            indexes: RwLock::new(Indexes::default()),
        }
    }

    /// Owner path recorded in symbols extracted from `file`.
    pub fn owner_of(file: &Path) -> String {
        owner_of(file)
    }

    fn sidecar(&self, file: &Path) -> Result<PathBuf, SymbolError> {
        self.layout.resolve_symbol(file).map_err(SymbolError::Layout)
    }

    pub fn has_sidecar(&self, file: &Path) -> bool {
        self.sidecar(file).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Symbols of `file`, from memory or from its sidecar. `None` when the
    /// file has never been indexed.
    pub fn load(&self, file: &Path) -> Result<Option<Vec<Symbol>>, SymbolError> {
        let mut indexes = self.indexes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(symbols) = indexes.by_file.get(file) {
            return Ok(Some(symbols.clone()));
        }

        let path = self.sidecar(file)?;
        if !path.is_file() {
            return Ok(None);
        }
        let symbols: Vec<Symbol> = read_json(&path).map_err(SymbolError::Io)?;
        verify_owner(file, &symbols)?;

        indexes.insert(file, symbols.clone());
        Ok(Some(symbols))
    }

    /// Primes the index for `files`. A sidecar that cannot be used is skipped
    /// with a warning and its file stays unindexed.
    pub fn load_all<P: AsRef<Path>>(&self, files: &[P]) -> usize {
        let mut loaded = 0;
        for file in files {
            let file = file.as_ref();
            match self.load(file) {
                Ok(Some(_)) => loaded += 1,
                Ok(None) => {}
                Err(e) => warn!("Dropping symbols of {}: {}", file.display(), e),
            }
        }
        debug!("Primed symbols of {} of {} file(s)", loaded, files.len());
        loaded
    }

    /// Indexes `symbols` as the symbols of `file` and writes the sidecar.
    pub fn save(&self, file: &Path, symbols: Vec<Symbol>) -> Result<PathBuf, SymbolError> {
        verify_owner(file, &symbols)?;
        let path = self.sidecar(file)?;

        let mut indexes = self.indexes.write().unwrap_or_else(PoisonError::into_inner);
        write_json(&path, &symbols).map_err(SymbolError::Io)?;

        indexes.insert(file, symbols);
        Ok(path)
    }

    /// Symbols named in `names` that are owned by some file other than
    /// `excluded_file`.
    pub fn lookup<S: AsRef<str>>(&self, names: &[S], excluded_file: &Path) -> Vec<Symbol> {
        let indexes = self.indexes.read().unwrap_or_else(PoisonError::into_inner);
        let excluded = owner_of(excluded_file);

        let mut found: Vec<Symbol> = Vec::new();
        for name in names {
            let Some(candidates) = indexes.by_name.get(name.as_ref()) else {
                continue;
            };
            for s in candidates {
                if s.path != excluded && !found.contains(s) {
                    found.push(s.clone());
                }
            }
        }
        found
    }
}
