//! Prompt template loader
//!
//! Templates ship embedded in the binary. A configured prompts directory
//! replaces them file by file: `check.md`, `review.md`, `test.md`.

use anyhow::{Context, Result};
use log::debug;
use std::path::PathBuf;
use tokio::fs;

const DEFAULT_CHECK: &str = include_str!("../prompts/check.md");
const DEFAULT_REVIEW: &str = include_str!("../prompts/review.md");
const DEFAULT_TEST: &str = include_str!("../prompts/test.md");

/// Which task a template is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Check,
    Review,
    Test,
}

impl PromptKind {
    pub fn file_name(self) -> &'static str {
        match self {
            PromptKind::Check => "check.md",
            PromptKind::Review => "review.md",
            PromptKind::Test => "test.md",
        }
    }

    pub fn embedded(self) -> &'static str {
        match self {
            PromptKind::Check => DEFAULT_CHECK,
            PromptKind::Review => DEFAULT_REVIEW,
            PromptKind::Test => DEFAULT_TEST,
        }
    }
}

pub struct PromptLoader {
    prompts_dir: Option<PathBuf>,
}

impl PromptLoader {
    pub fn new(prompts_dir: Option<PathBuf>) -> Self {
        Self { prompts_dir }
    }

    /// Embedded templates only.
    pub fn embedded() -> Self {
        Self { prompts_dir: None }
    }

    /// Template text for `kind`. With a prompts directory configured, the
    /// file must exist there.
    pub async fn load(&self, kind: PromptKind) -> Result<String> {
        let Some(dir) = &self.prompts_dir else {
            return Ok(kind.embedded().to_string());
        };

        let path = dir.join(kind.file_name());
        debug!("Loading prompt from: {}", path.display());
        fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read prompt file: {}", path.display()))
    }

    pub fn prompt_exists(&self, kind: PromptKind) -> bool {
        match &self.prompts_dir {
            Some(dir) => dir.join(kind.file_name()).is_file(),
            None => true,
        }
    }
}
