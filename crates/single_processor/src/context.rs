//! Run-scoped state shared by every agent of one command invocation.

use anyhow::{Context, Result};
use file_cache::{CacheLayout, ContentCache, ReportKind};
use indicatif::ProgressBar;
use llm_requester::{ChatMemory, ModelService, UsageMetrics};
use log::info;
use prompt_builder::{PromptKind, PromptLoader, PromptTemplate};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use symbol_index::SymbolIndex;

use crate::console::AgentConsole;
use crate::pkg_config::{AppConfig, TaskConfig};

/// The model-backed commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Check,
    Review,
    Test,
}

impl Task {
    pub fn name(self) -> &'static str {
        match self {
            Task::Check => "check",
            Task::Review => "review",
            Task::Test => "test",
        }
    }

    pub fn prompt_kind(self) -> PromptKind {
        match self {
            Task::Check => PromptKind::Check,
            Task::Review => PromptKind::Review,
            Task::Test => PromptKind::Test,
        }
    }

    pub fn report_kind(self) -> ReportKind {
        match self {
            Task::Check => ReportKind::Check,
            Task::Review => ReportKind::Review,
            Task::Test => ReportKind::Test,
        }
    }
}

/// Command-line options that shape a run.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub repository: PathBuf,
    pub targets: Vec<PathBuf>,
    pub force: bool,
    pub verbose: bool,
    pub concurrent: bool,
    pub enable_symbol_reference: bool,
    pub num: Option<usize>,
    pub lang: Option<String>,
    /// Check/review: write the fixed code back.
    pub fix: bool,
    /// Test: preferred test libraries.
    pub libraries: Vec<String>,
}

pub struct RunContext {
    pub config: Arc<AppConfig>,
    pub args: RunArgs,
    pub task: Task,
    pub models: Arc<ModelService>,
    pub contents: ContentCache,
    pub symbols: SymbolIndex,
    pub prompt: PromptTemplate,
    pub progress: ProgressBar,
}

impl RunContext {
    /// Resolves the task's model and prompt template. Both failing is fatal
    /// for the whole run.
    pub async fn new(
        config: Arc<AppConfig>,
        args: RunArgs,
        task: Task,
        models: Arc<ModelService>,
    ) -> Result<Self> {
        let task_config = config.task(task);
        models
            .model(&task_config.model_id)
            .with_context(|| format!("[{}] refers to an unknown model", task.name()))?;

        let template = match &task_config.template {
            Some(inline) => inline.clone(),
            None => PromptLoader::new(config.prompts_dir.clone())
                .load(task.prompt_kind())
                .await?,
        };
        let prompt = PromptTemplate::new(&task_config.rules, &template)
            .with_context(|| format!("Invalid {} prompt template", task.name()))?;

        let layout = CacheLayout::new(&config.cache_dir, &args.repository);
        info!(
            "Run context: task={}, repository={}, cache={}",
            task.name(),
            args.repository.display(),
            config.cache_dir.display()
        );

        Ok(Self {
            contents: ContentCache::new(layout.clone()),
            symbols: SymbolIndex::new(layout),
            config,
            args,
            task,
            models,
            prompt,
            progress: ProgressBar::hidden(),
        })
    }

    pub fn task_config(&self) -> &TaskConfig {
        self.config.task(self.task)
    }

    pub fn model_id(&self) -> &str {
        &self.task_config().model_id
    }

    pub fn layout(&self) -> &CacheLayout {
        self.contents.layout()
    }

    pub fn lang(&self) -> &str {
        self.args.lang.as_deref().unwrap_or(&self.config.lang)
    }

    /// Path relative to the repository, as shown to the model and stored in
    /// reports.
    pub fn relative_path(&self, file: &Path) -> String {
        match self.layout().relative(file) {
            Ok(rel) => rel.to_string_lossy().into_owned(),
            Err(_) => file.to_string_lossy().into_owned(),
        }
    }

    /// A console for one agent: buffered in concurrent runs.
    pub fn console(&self) -> AgentConsole {
        AgentConsole::new(self.args.concurrent).with_progress(self.progress.clone())
    }

    /// Sends `memory` to the task model and records the answer in it.
    pub async fn chat(
        &self,
        memory: &mut ChatMemory,
        sink: Option<&mut (dyn Write + Send)>,
    ) -> Result<(String, UsageMetrics)> {
        let model_id = self.model_id();
        let (answer, usage) = self
            .models
            .chat(model_id, memory, sink)
            .await
            .with_context(|| format!("Chat with model {} failed", model_id))?;

        memory.add_assistant(answer.clone());
        Ok((answer, usage))
    }

    /// Echoes a chat message when running verbose.
    pub fn trace(&self, console: &mut AgentConsole, label: &str, text: &str) {
        if self.args.verbose {
            info!("{}: {}", label, text);
            console.line(format!("{}: {}", label, text));
        }
    }
}
