//! Conversation history sent to a model.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChatMemory {
    messages: Vec<ChatMessage>,
}

impl ChatMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_system(&mut self, content: impl Into<String>) -> &mut Self {
        self.push(Role::System, content)
    }

    pub fn add_user(&mut self, content: impl Into<String>) -> &mut Self {
        self.push(Role::User, content)
    }

    pub fn add_assistant(&mut self, content: impl Into<String>) -> &mut Self {
        self.push(Role::Assistant, content)
    }

    fn push(&mut self, role: Role, content: impl Into<String>) -> &mut Self {
        self.messages.push(ChatMessage {
            role,
            content: content.into(),
        });
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Concatenated message bodies, used for local token estimation.
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Human readable dump for verbose logging.
    pub fn format(&self) -> String {
        let mut out = String::new();
        for m in &self.messages {
            let role = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            out.push_str(&format!("[{}]\n{}\n", role, m.content));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_order() {
        let mut memory = ChatMemory::new();
        memory.add_system("sys").add_user("hello").add_assistant("hi");
        let roles: Vec<Role> = memory.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(memory.prompt_text(), "sys\nhello\nhi");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage {
            role: Role::Assistant,
            content: "x".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"x"}"#);
    }
}
