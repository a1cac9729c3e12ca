//! `{{name}}` placeholder templates with numbered rules.

use anyhow::{Context, Result};
use log::debug;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

const PLACEHOLDER: &str = r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}";

/// Values substituted into a template.
#[derive(Debug, Clone, Default)]
pub struct PromptVars {
    values: BTreeMap<String, String>,
}

impl PromptVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    rules: Vec<String>,
    template: String,
    placeholder: Regex,
}

impl PromptTemplate {
    /// Rules are trimmed, empty ones dropped, and the rest numbered as
    /// `0) rule.` in order.
    pub fn new(rules: &[String], template: &str) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .enumerate()
            .map(|(i, r)| format!("{}) {}.", i, r.trim_end_matches('.')))
            .collect();
        let placeholder = Regex::new(PLACEHOLDER).context("Invalid placeholder pattern")?;

        Ok(Self {
            rules,
            template: template.trim().to_string(),
            placeholder,
        })
    }

    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    fn substitute(&self, text: &str, vars: &PromptVars) -> String {
        self.placeholder
            .replace_all(text, |caps: &Captures| match vars.get(&caps[1]) {
                Some(v) => v.to_string(),
                None => {
                    debug!("Prompt variable {} is not set", &caps[1]);
                    String::new()
                }
            })
            .into_owned()
    }

    /// Renders the rules with `vars`, exposes them as `{{rules}}`, then
    /// renders the template.
    pub fn render(&self, vars: &PromptVars) -> String {
        let mut vars = vars.clone();
        let rules: Vec<String> = self.rules.iter().map(|r| self.substitute(r, &vars)).collect();
        vars.set("rules", rules.join("\n"));
        self.substitute(&self.template, &vars)
    }
}
