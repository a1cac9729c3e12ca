//! Prompt construction for the check, review, test and symbol agents.

pub mod prompt_loader;
pub mod symbol_messages;
pub mod task_prompts;
pub mod template;

pub use prompt_loader::{PromptKind, PromptLoader};
pub use symbol_messages::{
    SYMBOL_NAMES_REQUEST, strip_package_prefix, symbol_extraction_request,
    symbol_extraction_system, symbol_references_message,
};
pub use task_prompts::{issue_vars, test_vars};
pub use template::{PromptTemplate, PromptVars};
