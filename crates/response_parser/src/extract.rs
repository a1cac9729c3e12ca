//! Pulls payloads and JSON out of free-form model answers.
//!
//! An answer is processed in two passes. The delimited pass cuts the payload
//! (fixed code or test code) out from between its markers and hands back the
//! surrounding text as the remainder. The JSON pass then looks for a fenced
//! ```` ```json ```` block in the remainder, falling back to the whole
//! remainder, and keeps the span from the first `{` to the last `}`.

use log::debug;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use thiserror::Error;

use crate::markers::Markers;

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json\n";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unmatched separator tag: found {begin} but no {end}")]
    UnmatchedDelimiter {
        begin: &'static str,
        end: &'static str,
    },

    #[error("invalid json format - missing {0} brace")]
    MissingJsonObject(&'static str),

    #[error("invalid json format - missing {0} bracket")]
    MissingJsonArray(&'static str),

    #[error("invalid json in answer: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Payload found between markers plus the text around it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub payload: String,
    pub remainder: String,
}

/// Cuts the block between the first begin line and the last end marker.
///
/// No begin marker means no payload: the whole input is the remainder. A begin
/// marker without an end marker is unusable output.
pub fn extract_delimited(input: &str, markers: Markers) -> Result<Extracted, ExtractError> {
    let Some(begin) = input.find(markers.begin_line) else {
        return Ok(Extracted {
            payload: String::new(),
            remainder: input.to_string(),
        });
    };
    let block = &input[begin + markers.begin_line.len()..];

    let Some(end) = block.rfind(markers.end) else {
        return Err(ExtractError::UnmatchedDelimiter {
            begin: markers.begin,
            end: markers.end,
        });
    };

    let mut payload = block[..end].to_string();
    if payload.trim_start().starts_with(FENCE) {
        payload = unwrap_fenced(&payload).0;
    }

    let remainder = format!("{}{}", &input[..begin], &block[end + markers.end.len()..]);
    Ok(Extracted { payload, remainder })
}

/// Strips one level of markdown code fence. Returns the fenced content and
/// the text outside the fence. A fence that is never closed runs to the end.
pub fn unwrap_fenced(input: &str) -> (String, String) {
    let Some(begin) = input.find(FENCE) else {
        return (input.to_string(), String::new());
    };
    let block = &input[begin + FENCE.len()..];

    // skip the info string, e.g. "rust" in ```rust
    let Some(line_end) = block.find('\n') else {
        return (String::new(), input.to_string());
    };
    let block = &block[line_end + 1..];

    match block.find(FENCE) {
        Some(end) if end > 0 => (
            block[..end].to_string(),
            format!("{}{}", &input[..begin], &block[end + FENCE.len()..]),
        ),
        _ => (block.to_string(), input[..begin].to_string()),
    }
}

/// The content of a ```` ```json ```` block and the text around it. Without
/// such a block the whole input is the candidate.
pub fn extract_json_block(input: &str) -> (&str, String) {
    let Some(begin) = input.find(JSON_FENCE) else {
        return (input, String::new());
    };
    let block = &input[begin + JSON_FENCE.len()..];

    match block.find(FENCE) {
        Some(end) if end > 0 => (
            &block[..end],
            format!("{}{}", &input[..begin], &block[end + FENCE.len()..]),
        ),
        _ => (block, input[..begin].to_string()),
    }
}

/// Span from the first `{` to the last `}`.
pub fn extract_json_object(input: &str) -> Result<&str, ExtractError> {
    let left = input
        .find('{')
        .ok_or(ExtractError::MissingJsonObject("left"))?;
    let candidate = &input[left..];
    let right = candidate
        .rfind('}')
        .ok_or(ExtractError::MissingJsonObject("right"))?;
    Ok(&candidate[..=right])
}

/// Span from the first `[` to the last `]`.
pub fn extract_json_array(input: &str) -> Result<&str, ExtractError> {
    let left = input
        .find('[')
        .ok_or(ExtractError::MissingJsonArray("left"))?;
    let candidate = &input[left..];
    let right = candidate
        .rfind(']')
        .ok_or(ExtractError::MissingJsonArray("right"))?;
    Ok(&candidate[..=right])
}

/// Repair hook applied before the second parse attempt. It currently leaves
/// the text untouched.
pub fn fix_json(input: &str) -> Cow<'_, str> {
    Cow::Borrowed(input)
}

/// Locates the JSON object in `answer` and deserializes it, retrying once
/// after [`fix_json`].
pub fn parse_json_answer<T: DeserializeOwned>(answer: &str) -> Result<T, ExtractError> {
    let (candidate, _) = extract_json_block(answer);
    let json = extract_json_object(candidate)?;

    match serde_json::from_str(json) {
        Ok(v) => Ok(v),
        Err(first) => {
            debug!("First json parse failed: {}", first);
            let fixed = fix_json(json);
            Ok(serde_json::from_str(&fixed)?)
        }
    }
}

/// Like [`parse_json_answer`] for answers that are a JSON array.
pub fn parse_json_array_answer<T: DeserializeOwned>(answer: &str) -> Result<Vec<T>, ExtractError> {
    let (candidate, _) = extract_json_block(answer);
    let json = extract_json_array(candidate)?;

    match serde_json::from_str(json) {
        Ok(v) => Ok(v),
        Err(first) => {
            debug!("First json array parse failed: {}", first);
            let fixed = fix_json(json);
            Ok(serde_json::from_str(&fixed)?)
        }
    }
}

/// Trimmed code with exactly one trailing newline; empty stays empty.
pub fn normalize_code(code: &str) -> String {
    let code = code.trim();
    if code.is_empty() {
        String::new()
    } else {
        format!("{}\n", code)
    }
}
