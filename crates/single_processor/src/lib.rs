//! Per-file agents.
//!
//! Every target file gets its own agent with its own conversation. The check
//! and review tasks share [`IssueAgent`]; [`TestAgent`] generates unit tests;
//! [`SymbolAgent`] fills the symbol index that the two-round exchange in
//! [`symbol_aware`] draws on. Agents report through [`AgentResult`], and
//! [`AgentResult::settle`] is the boundary where a failing file becomes a
//! recorded failure instead of stopping the run.

pub mod agent;
pub mod console;
pub mod context;
pub mod issue_agent;
pub mod pkg_config;
pub mod symbol_agent;
pub mod symbol_aware;
pub mod test_agent;

pub use agent::{AgentResult, FileAgent};
pub use console::AgentConsole;
pub use context::{RunArgs, RunContext, Task};
pub use issue_agent::IssueAgent;
pub use pkg_config::{AppConfig, TaskConfig, load_app_config};
pub use symbol_agent::SymbolAgent;
pub use test_agent::TestAgent;
