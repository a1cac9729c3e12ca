use anyhow::{Context, Result};
use async_trait::async_trait;
use llm_requester::ChatMemory;
use log::{debug, warn};
use prompt_builder::{symbol_extraction_request, symbol_extraction_system};
use response_parser::parse_json_array_answer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use symbol_index::{Symbol, SymbolIndex};

use crate::agent::{AgentResult, FileAgent};
use crate::context::RunContext;

/// Extracts the symbols one file defines and stores its sidecar.
pub struct SymbolAgent {
    ctx: Arc<RunContext>,
    file: PathBuf,
}

impl SymbolAgent {
    pub fn new(ctx: Arc<RunContext>, file: PathBuf) -> Self {
        Self { ctx, file }
    }

    fn cached_symbols(&self) -> Option<Vec<Symbol>> {
        match self.ctx.symbols.load(&self.file) {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Re-extracting symbols of {}: {}", self.file.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl FileAgent for SymbolAgent {
    type Report = Vec<Symbol>;

    fn file(&self) -> &Path {
        &self.file
    }

    async fn run(self) -> Result<AgentResult<Vec<Symbol>>> {
        let ctx = &self.ctx;
        let mut console = ctx.console();
        console.line(format!(
            "▹▹▹▹▹ processing symbols: {}",
            ctx.relative_path(&self.file)
        ));

        let code = ctx.contents.load(&self.file)?;
        if !code.is_changed() && !ctx.args.force {
            if let Some(cached) = self.cached_symbols() {
                return Ok(AgentResult::Skipped(cached));
            }
        }

        let owner = SymbolIndex::owner_of(&self.file);
        let mut memory = ChatMemory::new();
        memory.add_system(symbol_extraction_system(&owner, &code.latest));
        memory.add_user(symbol_extraction_request());
        ctx.trace(&mut console, "chat", &memory.format());

        let (answer, usage) = ctx.chat(&mut memory, None).await?;
        debug!("Symbol extraction of {}: {}", self.file.display(), usage);
        ctx.trace(&mut console, "answer", &answer);

        let mut symbols: Vec<Symbol> = parse_json_array_answer(&answer)
            .with_context(|| format!("Malformed symbol answer for {}", self.file.display()))?;
        for symbol in &mut symbols {
            symbol.path = owner.clone();
            symbol.lines = symbol.lines.trim().to_string();
        }

        let stored = ctx.symbols.save(&self.file, symbols.clone())?;
        console.line(format!("✔ {} symbol(s): {}", symbols.len(), stored.display()));
        Ok(AgentResult::Succeeded(symbols))
    }
}
