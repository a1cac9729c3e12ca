//! Report records produced from model answers and persisted per file.

use llm_requester::UsageMetrics;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Write};
use std::str::FromStr;

use crate::extract::{ExtractError, extract_delimited, normalize_code, parse_json_answer};
use crate::markers::{FIX_MARKERS, TEST_MARKERS};

/// JSON layout the check and review prompts ask for.
pub const ISSUE_REPORT_JSON_FORMAT: &str = r#"
{
  "has_issue": true or false,
  "issues": [
    {
      "short_description": "...",
      "detailed_explaination": "...",
      "suggestion": "...",
      "issue_line_begin": 9,
      "issue_line_end": 12,
      "issue_reference_urls": ["..."],
      "severity": "trivial" or "minor" or "major" or "critical",
      "severity_reason": "..."
    }
  ],
  "overall_severity": "trivial" or "minor" or "major" or "critical"
}"#;

/// JSON layout the test prompt asks for.
pub const TEST_REPORT_JSON_FORMAT: &str = r#"
{
  "test_file_path": "",
  "amount_of_generated_test_cases": 0,
  "single_test_run_command": ""
}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trivial,
    Minor,
    Major,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Trivial => "trivial",
            Severity::Minor => "minor",
            Severity::Major => "major",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trivial" => Ok(Severity::Trivial),
            "minor" => Ok(Severity::Minor),
            "major" => Ok(Severity::Major),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// Models are loose with casing and sometimes invent levels; anything
/// unrecognized reads as absent.
fn lenient_severity<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Severity>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

/// Absent severities are stored as an empty string.
fn severity_string<S: Serializer>(severity: &Option<Severity>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(severity.map(Severity::as_str).unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub detailed_explaination: String,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default)]
    pub issue_line_begin: i64,
    #[serde(default)]
    pub issue_line_end: i64,
    #[serde(default)]
    pub issue_reference_urls: Vec<String>,
    #[serde(default, deserialize_with = "lenient_severity", serialize_with = "severity_string")]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub severity_reason: String,
}

/// Outcome of a check or review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueReport {
    #[serde(default)]
    pub has_issue: bool,
    #[serde(default, deserialize_with = "lenient_severity", serialize_with = "severity_string")]
    pub overall_severity: Option<Severity>,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub fixed_code: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub model_usage_metrics: UsageMetrics,
}

impl IssueReport {
    /// Reconciles the flags the model set with the code it returned.
    pub fn normalize(&mut self, original_code: &str) {
        if !self.has_issue {
            self.issues.clear();
            self.fixed_code = original_code.to_string();
            return;
        }

        let fixed = self.fixed_code.trim();
        if fixed == original_code.trim() {
            self.has_issue = false;
            self.issues.clear();
            self.fixed_code = original_code.to_string();
            self.overall_severity = None;
        } else if fixed.is_empty() {
            self.fixed_code = original_code.to_string();
        } else if !self.fixed_code.ends_with('\n') {
            self.fixed_code.push('\n');
        }
    }

    pub fn print(&self, out: &mut impl Write) -> fmt::Result {
        if !self.has_issue {
            return writeln!(out, "no issue");
        }
        if let Some(severity) = self.overall_severity {
            writeln!(out, "Overall severity: {}", severity)?;
        }
        writeln!(out, "{}", self.model_usage_metrics)?;
        writeln!(out, "Total {} issues", self.issues.len())?;
        for (i, issue) in self.issues.iter().enumerate() {
            writeln!(out, "  #{}", i + 1)?;
            writeln!(out, "    Short Description: {}", issue.short_description)?;
            writeln!(out, "    Detailed Description: {}", issue.detailed_explaination)?;
            if let Some(severity) = issue.severity {
                writeln!(out, "    Severity: {}", severity)?;
            }
            writeln!(out, "    Severity Reason: {}", issue.severity_reason)?;
            writeln!(out, "    Suggestion: {}", issue.suggestion)?;
            writeln!(
                out,
                "    Lines: {}-{}",
                issue.issue_line_begin, issue.issue_line_end
            )?;
            if !issue.issue_reference_urls.is_empty() {
                writeln!(out, "    References: {}", issue.issue_reference_urls.join(", "))?;
            }
        }
        Ok(())
    }
}

/// Extracts a check/review report from `answer` for `original_code`.
pub fn extract_issue_report(answer: &str, original_code: &str) -> Result<IssueReport, ExtractError> {
    let extracted = extract_delimited(answer, FIX_MARKERS)?;
    let mut report: IssueReport = parse_json_answer(&extracted.remainder)?;
    report.fixed_code = extracted.payload;
    report.normalize(original_code);
    Ok(report)
}

/// Outcome of test generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub test_file_path: String,
    #[serde(default)]
    pub test_code: String,
    #[serde(default)]
    pub amount_of_generated_test_cases: u32,
    #[serde(default)]
    pub single_test_run_command: String,
    #[serde(default)]
    pub model_usage_metrics: UsageMetrics,
}

impl TestReport {
    pub fn print(&self, out: &mut impl Write) -> fmt::Result {
        writeln!(out, "{}", self.model_usage_metrics)?;
        writeln!(out, "Code Path: {}", self.path)?;
        writeln!(out, "Test File Path: {}", self.test_file_path)?;
        writeln!(
            out,
            "Amount of Generated Test Cases: {}",
            self.amount_of_generated_test_cases
        )?;
        writeln!(out, "Test Command: {}", self.single_test_run_command)
    }
}

pub fn extract_test_report(answer: &str) -> Result<TestReport, ExtractError> {
    let extracted = extract_delimited(answer, TEST_MARKERS)?;
    let mut report: TestReport = parse_json_answer(&extracted.remainder)?;
    report.test_code = normalize_code(&extracted.payload);
    Ok(report)
}
