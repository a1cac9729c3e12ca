//! Command-level orchestration.
//!
//! Collects the working files, optionally primes the symbol index for the
//! whole repository, fans the targets out to agents and folds their results
//! into run metrics.

pub mod metrics;
pub mod processor;

use anyhow::{Result, bail};
use file_cache::ReportStore;
use file_scanner::{FileScanner, WorkingFiles};
use log::{info, warn};
use single_processor::{AppConfig, IssueAgent, RunArgs, RunContext, SymbolAgent, Task, TestAgent};
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

pub use metrics::{BaseMetrics, IssueMetrics, TestMetrics};
pub use processor::dispatch;

/// Target files of a run, capped by `--num`.
pub fn collect_working_files(config: &AppConfig, args: &RunArgs) -> Result<WorkingFiles> {
    let scanner = FileScanner::new(&config.includes, &config.excludes)?;
    let mut files = scanner.collect(&args.repository, &args.targets)?;
    if let Some(num) = args.num {
        files.targets.truncate(num);
    }
    info!(
        "{} target file(s), {} ignored, {} unreadable",
        files.targets.len(),
        files.ignored,
        files.failed.len()
    );
    Ok(files)
}

/// Prints the target files without touching any model.
pub fn list(config: &AppConfig, args: &RunArgs, out: &mut impl Write) -> Result<WorkingFiles> {
    let files = collect_working_files(config, args)?;
    for file in &files.targets {
        writeln!(out, "{}", file.display())?;
    }
    for (file, reason) in &files.failed {
        writeln!(out, "error: {}: {}", file.display(), reason)?;
    }
    Ok(files)
}

fn base_metrics(files: &WorkingFiles) -> BaseMetrics {
    BaseMetrics {
        files: files.targets.len() + files.ignored + files.failed.len(),
        processed: files.targets.len(),
        ignored: files.ignored,
        failed: files.failed.len(),
        failures: files.failed.clone(),
        ..BaseMetrics::default()
    }
}

/// Extracts symbols of every repository file, after loading the sidecars
/// that already exist, so lookups during the main pass see the whole
/// repository.
pub async fn symbol_pre_pass(ctx: &Arc<RunContext>, repo_files: &[PathBuf]) -> usize {
    let loaded = ctx.symbols.load_all(repo_files);
    info!("Symbol index primed from {} sidecar(s)", loaded);

    let results = dispatch(ctx, "symbol", repo_files, |file| {
        SymbolAgent::new(ctx.clone(), file)
    })
    .await;

    let failed = results.iter().filter(|r| r.is_failed()).count();
    if failed > 0 {
        warn!("Symbol extraction failed for {} file(s)", failed);
    }
    results.len() - failed
}

/// `check` and `review`.
pub async fn run_issue_task(ctx: Arc<RunContext>) -> Result<IssueMetrics> {
    if ctx.task == Task::Test {
        bail!("{} is not a check or review task", ctx.task.name());
    }
    let files = collect_working_files(&ctx.config, &ctx.args)?;
    let mut metrics = IssueMetrics {
        base: base_metrics(&files),
        ..IssueMetrics::default()
    };
    if files.targets.is_empty() {
        return Ok(metrics);
    }

    if ctx.args.enable_symbol_reference {
        symbol_pre_pass(&ctx, &files.repo_files).await;
    }

    let store = Arc::new(ReportStore::new(ctx.layout().clone(), ctx.task.report_kind()));
    let results = dispatch(&ctx, ctx.task.name(), &files.targets, |file| {
        IssueAgent::new(ctx.clone(), store.clone(), file)
    })
    .await;

    for result in &results {
        metrics.add(result);
    }
    Ok(metrics)
}

/// `test`.
pub async fn run_test_task(ctx: Arc<RunContext>) -> Result<TestMetrics> {
    if ctx.task != Task::Test {
        bail!("{} is not a test task", ctx.task.name());
    }
    let files = collect_working_files(&ctx.config, &ctx.args)?;
    let mut metrics = TestMetrics {
        base: base_metrics(&files),
        ..TestMetrics::default()
    };
    if files.targets.is_empty() {
        return Ok(metrics);
    }

    if ctx.args.enable_symbol_reference {
        symbol_pre_pass(&ctx, &files.repo_files).await;
    }

    let store = Arc::new(ReportStore::new(ctx.layout().clone(), ctx.task.report_kind()));
    let results = dispatch(&ctx, ctx.task.name(), &files.targets, |file| {
        TestAgent::new(ctx.clone(), store.clone(), file)
    })
    .await;

    for result in &results {
        metrics.add(result);
    }
    Ok(metrics)
}
