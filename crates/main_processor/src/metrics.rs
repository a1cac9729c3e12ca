//! Run-level aggregation of agent results.
//!
//! Metrics are only touched after every agent of a run has been joined, so
//! they are plain values without locking.

use llm_requester::UsageMetrics;
use response_parser::{IssueReport, TestReport};
use single_processor::AgentResult;
use std::fmt::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct BaseMetrics {
    pub usage: UsageMetrics,
    pub files: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub ignored: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: Vec<(PathBuf, String)>,
}

impl BaseMetrics {
    /// 统计单个结果；仅在本次新生成报告时返回该报告
    fn record<'a, R>(&mut self, result: &'a AgentResult<R>) -> Option<&'a R> {
        match result {
            AgentResult::Succeeded(report) => {
                self.succeeded += 1;
                Some(report)
            }
            AgentResult::Skipped(_) => {
                self.skipped += 1;
                None
            }
            AgentResult::Failed { file, reason } => {
                self.failed += 1;
                self.failures.push((file.clone(), reason.clone()));
                None
            }
        }
    }

    pub fn average_time(&self) -> Duration {
        match u32::try_from(self.processed) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => self.usage.duration / n,
        }
    }

    fn print_usage(&self, out: &mut impl Write) -> fmt::Result {
        writeln!(out, "Duration: {:.2?}", self.usage.duration)?;
        writeln!(
            out,
            "Evaluated prompt tokens: {}",
            self.usage.evaluated_prompt_tokens.unwrap_or(0)
        )?;
        let provider = &self.usage.provider_usage;
        writeln!(out, "Prompt tokens: {}", provider.prompt_tokens)?;
        writeln!(out, "Completion tokens: {}", provider.completion_tokens)?;
        writeln!(out, "Total tokens: {}", provider.total_tokens)?;
        writeln!(out, "Average time: {:.2?}", self.average_time())?;
        for (file, reason) in &self.failures {
            writeln!(out, "failed: {}: {}", file.display(), reason)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct IssueMetrics {
    pub base: BaseMetrics,
    pub has_issue: usize,
    pub total_issues: usize,
}

impl IssueMetrics {
    pub fn add(&mut self, result: &AgentResult<IssueReport>) {
        if let Some(report) = self.base.record(result) {
            self.base.usage.increase_usage(Some(&report.model_usage_metrics));
            if report.has_issue {
                self.has_issue += 1;
                self.total_issues += report.issues.len();
            }
        }
    }

    pub fn print(&self, out: &mut impl Write) -> fmt::Result {
        self.base.print_usage(out)?;
        let b = &self.base;
        writeln!(
            out,
            "Files: {}, Processed: {}, Ignored: {}, Failed: {}, Has Issue: {}, Total Issues: {}, Skipped: {}",
            b.files, b.processed, b.ignored, b.failed, self.has_issue, self.total_issues, b.skipped
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestMetrics {
    pub base: BaseMetrics,
    pub total_test_cases: u64,
}

impl TestMetrics {
    pub fn add(&mut self, result: &AgentResult<TestReport>) {
        if let Some(report) = self.base.record(result) {
            self.base.usage.increase_usage(Some(&report.model_usage_metrics));
            self.total_test_cases += u64::from(report.amount_of_generated_test_cases);
        }
    }

    pub fn print(&self, out: &mut impl Write) -> fmt::Result {
        self.base.print_usage(out)?;
        let b = &self.base;
        writeln!(
            out,
            "Files: {}, Processed: {}, Ignored: {}, Failed: {}, Total Test Cases: {}, Skipped: {}",
            b.files, b.processed, b.ignored, b.failed, self.total_test_cases, b.skipped
        )
    }
}
