use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use file_cache::{ReportStore, read_file, write_file};
use llm_requester::{ChatMemory, UsageMetrics};
use log::{debug, info};
use prompt_builder::test_vars;
use response_parser::markers::{TEST_BEGIN, TEST_END};
use response_parser::{TestReport, extract_test_report};
use std::fmt::Write as _;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::agent::{AgentResult, FileAgent};
use crate::console::AgentConsole;
use crate::context::RunContext;
use crate::symbol_aware::provide_symbols;

/// Room left for the rest of the prompt when sizing the existing test code.
const PROMPT_RESERVE: usize = 1000;

/// Generates or extends the unit tests of one file.
pub struct TestAgent {
    ctx: Arc<RunContext>,
    reports: Arc<ReportStore<TestReport>>,
    file: PathBuf,
}

impl TestAgent {
    pub fn new(ctx: Arc<RunContext>, reports: Arc<ReportStore<TestReport>>, file: PathBuf) -> Self {
        Self { ctx, reports, file }
    }

    /// Test code generated by the previous run, if it still exists and fits
    /// into the model's context window next to `code`.
    fn existing_test_code(&self, previous: Option<&TestReport>, code: &str) -> Result<Option<String>> {
        let Some(previous) = previous.filter(|r| !r.test_file_path.is_empty()) else {
            return Ok(None);
        };
        let path = resolve_test_path(&self.ctx.args.repository, &previous.test_file_path)?;
        if !path.is_file() {
            return Ok(None);
        }
        let existing = read_file(&path)?;

        let window = self.ctx.models.context_window(self.ctx.model_id())?;
        let budget = window.saturating_sub(code.len() + PROMPT_RESERVE);
        if existing.len() > budget {
            debug!(
                "Existing tests of {} ({} bytes) exceed the prompt budget",
                self.file.display(),
                existing.len()
            );
            return Ok(None);
        }
        Ok(Some(existing))
    }

    async fn generate(
        &self,
        code: &str,
        existing: Option<&str>,
        console: &mut AgentConsole,
    ) -> Result<TestReport> {
        let ctx = &self.ctx;
        let path = ctx.relative_path(&self.file);
        let vars = test_vars(&path, ctx.lang(), code, &ctx.args.libraries, existing);

        let mut memory = ChatMemory::new();
        memory.add_system(ctx.prompt.render(&vars));

        let mut usage = UsageMetrics::default();
        let request = if ctx.args.enable_symbol_reference {
            usage = provide_symbols(ctx, &mut memory, &self.file, console).await?;
            "generates tests, with provided symbols as references"
        } else {
            "generates tests"
        };
        memory.add_user(request);
        ctx.trace(console, "chat", request);

        let (answer, main) = {
            let mut echo = TestCodeEcho::new(console);
            ctx.chat(&mut memory, Some(&mut echo)).await?
        };
        ctx.trace(console, "answer", &answer);
        usage.increase_usage(Some(&main));

        let mut report = extract_test_report(&answer)
            .with_context(|| format!("Malformed test answer for {}", path))?;
        if report.test_code.is_empty() {
            bail!("No test code generated for {}", path);
        }
        report.path = path;
        report.model_usage_metrics = usage;
        Ok(report)
    }
}

#[async_trait]
impl FileAgent for TestAgent {
    type Report = TestReport;

    fn file(&self) -> &Path {
        &self.file
    }

    async fn run(self) -> Result<AgentResult<TestReport>> {
        let mut console = self.ctx.console();
        console.line(format!("▹▹▹▹▹ processing: {}", self.ctx.relative_path(&self.file)));

        let code = self.ctx.contents.load(&self.file)?;
        let previous = self.reports.load_report(&self.file);
        if let Some(cached) = &previous {
            if !code.is_changed() && !self.ctx.args.force {
                console.line("✔ no code changes, skipped");
                return Ok(AgentResult::Skipped(cached.clone()));
            }
        }

        let existing = self.existing_test_code(previous.as_ref(), &code.latest)?;
        let report = self
            .generate(&code.latest, existing.as_deref(), &mut console)
            .await?;
        report.print(&mut console)?;

        let target = resolve_test_path(&self.ctx.args.repository, &report.test_file_path)?;
        write_file(&target, &report.test_code)?;
        info!("Wrote tests of {} to {}", self.file.display(), target.display());

        let stored = self.reports.save_report(&self.file, &report)?;
        writeln!(console, "✔ report: {}", stored.display())?;
        Ok(AgentResult::Succeeded(report))
    }
}

/// Joins a model-reported test path onto the repository, refusing anything
/// that would land outside it.
pub fn resolve_test_path(repository: &Path, test_file_path: &str) -> Result<PathBuf> {
    let relative = Path::new(test_file_path.trim());
    if relative.as_os_str().is_empty() {
        bail!("Empty test file path");
    }
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        bail!("Test file path {} is outside the repository", test_file_path);
    }
    Ok(repository.join(relative))
}

/// Streaming sink that echoes only the test code between the markers.
struct TestCodeEcho<'a> {
    console: &'a mut AgentConsole,
    in_test_code: bool,
}

impl<'a> TestCodeEcho<'a> {
    fn new(console: &'a mut AgentConsole) -> Self {
        Self {
            console,
            in_test_code: false,
        }
    }
}

impl io::Write for TestCodeEcho<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        for line in text.split_inclusive('\n') {
            if self.in_test_code {
                if line.contains(TEST_END) {
                    self.in_test_code = false;
                } else {
                    self.console.text(line);
                }
            } else if line.contains(TEST_BEGIN) {
                self.in_test_code = true;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
