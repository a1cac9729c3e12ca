use anyhow::{Context, Result};
use async_trait::async_trait;
use file_cache::{CodeFile, ReportStore};
use llm_requester::{ChatMemory, UsageMetrics};
use log::info;
use prompt_builder::issue_vars;
use response_parser::{IssueReport, extract_issue_report};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::agent::{AgentResult, FileAgent};
use crate::console::AgentConsole;
use crate::context::{RunContext, Task};
use crate::symbol_aware::provide_symbols;

/// Checks or reviews one file, depending on the run's task.
pub struct IssueAgent {
    ctx: Arc<RunContext>,
    reports: Arc<ReportStore<IssueReport>>,
    file: PathBuf,
}

impl IssueAgent {
    pub fn new(ctx: Arc<RunContext>, reports: Arc<ReportStore<IssueReport>>, file: PathBuf) -> Self {
        Self { ctx, reports, file }
    }

    /// The cached report stands unless the file changed, `--force` is set, or
    /// `--fix` still has a pending fix to apply.
    fn cached_report(&self, code: &CodeFile) -> Option<IssueReport> {
        if code.is_changed() || self.ctx.args.force {
            return None;
        }
        let cached = self.reports.load_report(&self.file)?;
        let fix_pending = self.ctx.args.fix && cached.has_issue && cached.fixed_code != code.latest;
        (!fix_pending).then_some(cached)
    }

    fn request(&self) -> &'static str {
        let symbols = self.ctx.args.enable_symbol_reference;
        match (self.ctx.task, symbols) {
            (Task::Review, false) => "review the code",
            (Task::Review, true) => "review the code, with provided symbols as references",
            (_, false) => "check the code",
            (_, true) => "check the code, with provided symbols as references",
        }
    }

    async fn inspect(&self, code: &str, console: &mut AgentConsole) -> Result<IssueReport> {
        let ctx = &self.ctx;
        let path = ctx.relative_path(&self.file);
        let vars = issue_vars(&path, ctx.lang(), ctx.task_config().severity, code);

        let mut memory = ChatMemory::new();
        memory.add_system(ctx.prompt.render(&vars));

        let mut usage = UsageMetrics::default();
        if ctx.args.enable_symbol_reference {
            usage = provide_symbols(ctx, &mut memory, &self.file, console).await?;
        }

        let request = self.request();
        memory.add_user(request);
        ctx.trace(console, "chat", request);

        let (answer, main) = ctx.chat(&mut memory, None).await?;
        ctx.trace(console, "answer", &answer);
        usage.increase_usage(Some(&main));

        let mut report = extract_issue_report(&answer, code)
            .with_context(|| format!("Malformed {} answer for {}", ctx.task.name(), path))?;
        report.path = path;
        report.model_usage_metrics = usage;
        Ok(report)
    }
}

#[async_trait]
impl FileAgent for IssueAgent {
    type Report = IssueReport;

    fn file(&self) -> &Path {
        &self.file
    }

    async fn run(self) -> Result<AgentResult<IssueReport>> {
        let mut console = self.ctx.console();
        console.line(format!("▹▹▹▹▹ processing: {}", self.ctx.relative_path(&self.file)));

        let code = self.ctx.contents.load(&self.file)?;
        if let Some(cached) = self.cached_report(&code) {
            console.line("✔ no code changes, skipped");
            return Ok(AgentResult::Skipped(cached));
        }

        let report = self.inspect(&code.latest, &mut console).await?;
        report.print(&mut console)?;

        if report.has_issue && self.ctx.args.fix {
            self.ctx.contents.save(&self.file, &report.fixed_code)?;
            info!("Applied fix to {}", self.file.display());
            writeln!(console, "✔ fixed: {}", report.path)?;
        }

        let stored = self.reports.save_report(&self.file, &report)?;
        writeln!(console, "✔ report: {}", stored.display())?;
        Ok(AgentResult::Succeeded(report))
    }
}
