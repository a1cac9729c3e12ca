//! Two-round symbol exchange run before the main request.
//!
//! Round one asks the model which symbols the file uses but does not define.
//! Those found in other files' sidecars are sent back in round two, so the
//! model does not report them as missing.

use anyhow::Result;
use llm_requester::{ChatMemory, UsageMetrics};
use log::{debug, warn};
use prompt_builder::{SYMBOL_NAMES_REQUEST, strip_package_prefix, symbol_references_message};
use response_parser::parse_json_array_answer;
use std::path::Path;

use crate::console::AgentConsole;
use crate::context::RunContext;

/// Runs the exchange inside `memory` and returns the usage of both rounds.
pub async fn provide_symbols(
    ctx: &RunContext,
    memory: &mut ChatMemory,
    file: &Path,
    console: &mut AgentConsole,
) -> Result<UsageMetrics> {
    memory.add_user(SYMBOL_NAMES_REQUEST);
    ctx.trace(console, "chat", SYMBOL_NAMES_REQUEST);

    let (answer, mut usage) = ctx.chat(memory, None).await?;
    ctx.trace(console, "answer", &answer);

    let names: Vec<String> = match parse_json_array_answer(&answer) {
        Ok(names) => names,
        Err(e) => {
            warn!("No symbol names for {}: {}", file.display(), e);
            return Ok(usage);
        }
    };
    let names: Vec<&str> = names
        .iter()
        .map(|n| strip_package_prefix(n))
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        return Ok(usage);
    }

    let symbols = ctx.symbols.lookup(&names, file);
    debug!(
        "{}: {} referred symbol(s), {} defined elsewhere",
        file.display(),
        names.len(),
        symbols.len()
    );
    if symbols.is_empty() {
        return Ok(usage);
    }

    let references = symbol_references_message(&symbols);
    memory.add_user(references.clone());
    ctx.trace(console, "chat", &references);

    let (answer, second) = ctx.chat(memory, None).await?;
    ctx.trace(console, "answer", &answer);
    usage.increase_usage(Some(&second));

    Ok(usage)
}
