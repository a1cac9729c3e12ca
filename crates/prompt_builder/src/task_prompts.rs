use response_parser::markers::{FIX_BEGIN, FIX_END, TEST_BEGIN, TEST_END};
use response_parser::{ISSUE_REPORT_JSON_FORMAT, Severity, TEST_REPORT_JSON_FORMAT};

use crate::template::PromptVars;

/// Variables for the check and review templates.
pub fn issue_vars(path: &str, lang: &str, severity: Severity, code: &str) -> PromptVars {
    PromptVars::new()
        .with("path", path)
        .with("lang", lang)
        .with("severity", severity.as_str())
        .with("code", code)
        .with("fix_begin", FIX_BEGIN)
        .with("fix_end", FIX_END)
        .with("report_json_format", ISSUE_REPORT_JSON_FORMAT)
}

/// Variables for the test template. `existing_test_code` is shown to the model
/// so it extends instead of rewriting what is already there.
pub fn test_vars(
    path: &str,
    lang: &str,
    code: &str,
    libraries: &[String],
    existing_test_code: Option<&str>,
) -> PromptVars {
    let libraries_hint = if libraries.is_empty() {
        String::new()
    } else {
        format!("Prefer these test libraries: {}.\n", libraries.join(", "))
    };

    let existing_test_section = match existing_test_code.filter(|c| !c.trim().is_empty()) {
        Some(existing) => format!(
            "\nThe existing test file; keep its passing tests and add what is missing:\n{}\n",
            existing
        ),
        None => String::new(),
    };

    PromptVars::new()
        .with("path", path)
        .with("lang", lang)
        .with("code", code)
        .with("test_begin", TEST_BEGIN)
        .with("test_end", TEST_END)
        .with("report_json_format", TEST_REPORT_JSON_FORMAT)
        .with("libraries_hint", libraries_hint)
        .with("existing_test_section", existing_test_section)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt_loader::PromptKind;
    use crate::template::PromptTemplate;

    #[test]
    fn test_check_prompt_carries_markers_and_code() {
        let t = PromptTemplate::new(&["be precise".to_string()], PromptKind::Check.embedded()).unwrap();
        let prompt = t.render(&issue_vars("src/a.go", "en", Severity::Major, "package a"));
        assert!(prompt.contains(FIX_BEGIN));
        assert!(prompt.contains(FIX_END));
        assert!(prompt.contains("package a"));
        assert!(prompt.contains("`major`"));
        assert!(prompt.contains("0) be precise."));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_existing_tests_only_when_present() {
        let t = PromptTemplate::new(&[], PromptKind::Test.embedded()).unwrap();
        let libs = vec!["testify".to_string()];

        let with = t.render(&test_vars("a.go", "en", "code", &libs, Some("func TestOld() {}")));
        assert!(with.contains("func TestOld() {}"));
        assert!(with.contains("testify"));

        let without = t.render(&test_vars("a.go", "en", "code", &[], Some("  ")));
        assert!(!without.contains("existing test file"));
        assert!(!without.contains("Prefer these"));
    }
}
