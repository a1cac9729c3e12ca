//! Agent seam and the per-file recovery boundary.

use anyhow::Result;
use async_trait::async_trait;
use log::error;
use std::path::{Path, PathBuf};
use tokio::task::JoinError;

/// How one file's task ended.
#[derive(Debug)]
pub enum AgentResult<R> {
    Succeeded(R),
    /// Unchanged since the last run; carries the cached report.
    Skipped(R),
    Failed { file: PathBuf, reason: String },
}

impl<R> AgentResult<R> {
    /// Turns whatever a spawned agent produced into a result. Errors and panics
    /// become `Failed`; this is the only place that does so.
    pub fn settle(file: &Path, joined: Result<Result<AgentResult<R>>, JoinError>) -> Self {
        let reason = match joined {
            Ok(Ok(result)) => return result,
            Ok(Err(e)) => format!("{:#}", e),
            Err(e) if e.is_panic() => format!("agent panicked: {}", e),
            Err(e) => format!("agent cancelled: {}", e),
        };
        error!("Failed: {}: {}", file.display(), reason);
        AgentResult::Failed {
            file: file.to_path_buf(),
            reason,
        }
    }

    pub fn report(&self) -> Option<&R> {
        match self {
            AgentResult::Succeeded(r) | AgentResult::Skipped(r) => Some(r),
            AgentResult::Failed { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, AgentResult::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, AgentResult::Failed { .. })
    }
}

/// One task over one file. Agents are consumed by `run`, so each file gets a
/// fresh conversation.
#[async_trait]
pub trait FileAgent: Send + 'static {
    type Report: Send + 'static;

    fn file(&self) -> &Path;

    async fn run(self) -> Result<AgentResult<Self::Report>>;
}
