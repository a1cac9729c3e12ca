pub mod token_counter;

pub use token_counter::{estimate_prompt_tokens, estimate_token_count};
