use response_parser::{
    ExtractError, FIX_MARKERS, IssueReport, Severity, extract_delimited, extract_issue_report,
    extract_test_report, parse_json_answer, unwrap_fenced,
};

const ORIGINAL: &str = "public class A {\n  int x;\n}\n";

#[test]
fn fix_block_after_leading_json_fence() {
    let answer = "```json\ntest\n```\n!!!!fix_begin!!!!\n```java\nabc\n```\n!!!!fix_end!!!!";
    let r = extract_delimited(answer, FIX_MARKERS).unwrap();
    assert_eq!(r.payload, "abc\n");
    assert_eq!(r.remainder, "```json\ntest\n```\n");
}

#[test]
fn fence_closed_after_end_marker() {
    // the closing fence lands after the end marker
    let answer = "!!!!fix_begin!!!!\n```java\nabc\n!!!!fix_end!!!!\n```\n";
    let r = extract_delimited(answer, FIX_MARKERS).unwrap();
    assert_eq!(r.payload, "abc\n");
    assert_eq!(r.remainder, "\n```\n");
}

#[test]
fn unwrap_fenced_keeps_text_outside_fence() {
    let (inner, outside) = unwrap_fenced("intro\n```rust\nfn a() {}\n```\ntrailing");
    assert_eq!(inner, "fn a() {}\n");
    assert_eq!(outside, "intro\n\ntrailing");
}

#[test]
fn realistic_review_answer() {
    let answer = r#"I found one problem with the field visibility.

!!!!fix_begin!!!!
```java
public class A {
  private int x;
}
```
!!!!fix_end!!!!

```json
{
  "has_issue": true,
  "overall_severity": "minor",
  "issues": [
    {
      "short_description": "Field should be private",
      "detailed_explaination": "x is package visible",
      "suggestion": "make x private",
      "issue_line_begin": 2,
      "issue_line_end": 2,
      "issue_reference_urls": [],
      "severity": "minor",
      "severity_reason": "encapsulation"
    }
  ]
}
```
Let me know if you need more."#;

    let report = extract_issue_report(answer, ORIGINAL).unwrap();
    assert!(report.has_issue);
    assert_eq!(report.overall_severity, Some(Severity::Minor));
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].issue_line_begin, 2);
    assert_eq!(report.fixed_code, "public class A {\n  private int x;\n}\n");
}

#[test]
fn prose_around_bare_object() {
    let answer = "Sure! Here is the report: {\"has_issue\": false} Hope it helps.";
    let report: IssueReport = parse_json_answer(answer).unwrap();
    assert!(!report.has_issue);
}

#[test]
fn unparseable_json_is_fatal() {
    let err = extract_issue_report("{\"has_issue\": tru}", ORIGINAL).unwrap_err();
    assert!(matches!(err, ExtractError::InvalidJson(_)));
}

#[test]
fn answer_without_json_is_fatal() {
    let err = extract_issue_report("Looks fine to me.", ORIGINAL).unwrap_err();
    assert!(matches!(err, ExtractError::MissingJsonObject(_)));
}

#[test]
fn test_answer_without_end_marker_is_fatal() {
    let answer = "!!!!test_file_begin!!!!\nfunc TestA(t *testing.T) {}\n{\"test_file_path\": \"a_test.go\"}";
    assert!(matches!(
        extract_test_report(answer),
        Err(ExtractError::UnmatchedDelimiter { .. })
    ));
}
