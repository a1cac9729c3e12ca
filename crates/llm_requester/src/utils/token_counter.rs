use crate::chat_memory::ChatMemory;
use log::{debug, warn};

/// Per-message framing overhead added by chat completion APIs.
const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Approximate token count based on character count.
/// Uses a conservative 2.5 characters per token so the estimate errs high.
pub fn estimate_token_count(text: &str) -> usize {
    let char_count = text.chars().count();
    let tokens = (char_count as f64 / 2.5).ceil() as usize;

    if tokens > 100_000 {
        warn!(
            "Large token count estimated: {} tokens ({} chars)",
            tokens, char_count
        );
    } else if tokens > 50_000 {
        debug!(
            "Moderate token count: {} tokens ({} chars)",
            tokens, char_count
        );
    }

    tokens
}

/// Estimated prompt size of a whole conversation.
pub fn estimate_prompt_tokens(memory: &ChatMemory) -> usize {
    memory
        .messages()
        .iter()
        .map(|m| estimate_token_count(&m.content) + MESSAGE_OVERHEAD_TOKENS)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_rounds_up() {
        assert_eq!(estimate_token_count(""), 0);
        assert_eq!(estimate_token_count("abc"), 2);
        assert_eq!(estimate_token_count("abcde"), 2);
    }

    #[test]
    fn test_prompt_estimate_counts_overhead() {
        let mut memory = ChatMemory::new();
        memory.add_system("abcde").add_user("abcde");
        assert_eq!(estimate_prompt_tokens(&memory), 2 * (2 + MESSAGE_OVERHEAD_TOKENS));
    }
}
