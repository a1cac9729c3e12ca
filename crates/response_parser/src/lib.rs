//! Structured results out of semi-structured model answers.

pub mod extract;
pub mod markers;
pub mod report;

pub use extract::{
    ExtractError, Extracted, extract_delimited, extract_json_array, extract_json_block, extract_json_object,
    fix_json, normalize_code, parse_json_answer, parse_json_array_answer, unwrap_fenced,
};
pub use markers::{FIX_MARKERS, Markers, TEST_MARKERS};
pub use report::{
    ISSUE_REPORT_JSON_FORMAT, Issue, IssueReport, Severity, TEST_REPORT_JSON_FORMAT, TestReport,
    extract_issue_report, extract_test_report,
};
