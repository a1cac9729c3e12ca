use single_processor::{AppConfig, Task};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueLevel {
    Error,
    Warning,
}

impl fmt::Display for IssueLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueLevel::Error => write!(f, "ERROR"),
            IssueLevel::Warning => write!(f, "WARN"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub level: IssueLevel,
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.field, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigCheckReport {
    pub issues: Vec<ConfigIssue>,
}

impl ConfigCheckReport {
    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.level == IssueLevel::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ConfigIssue> {
        self.issues.iter().filter(|i| i.level == IssueLevel::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ConfigIssue> {
        self.issues.iter().filter(|i| i.level == IssueLevel::Warning)
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Validates the loaded configuration. `task` is the command about to run;
/// its prompt template must be resolvable.
pub fn check_app_config(config: &AppConfig, task: Option<Task>) -> ConfigCheckReport {
    let mut issues = Vec::new();

    if is_blank(&config.lang) {
        issues.push(ConfigIssue::warning("lang", "empty `lang`, answers may use any language"));
    }

    check_models(config, &mut issues);

    for t in [Task::Check, Task::Review, Task::Test] {
        let field = format!("{}.model_id", t.name());
        let model_id = &config.task(t).model_id;
        if is_blank(model_id) {
            issues.push(ConfigIssue::error(field, "missing model id"));
        } else if config.model(model_id).is_none() {
            issues.push(ConfigIssue::error(
                field,
                format!("model `{}` is not defined in [[models]]", model_id),
            ));
        }
    }

    if let Some(task) = task {
        check_prompt(config, task, &mut issues);
    }

    ConfigCheckReport { issues }
}

fn check_models(config: &AppConfig, issues: &mut Vec<ConfigIssue>) {
    if config.models.is_empty() {
        issues.push(ConfigIssue::error("models", "no model is configured"));
        return;
    }

    let mut seen = HashSet::new();
    for (i, model) in config.models.iter().enumerate() {
        let field = |name: &str| format!("models[{}].{}", i, name);

        if is_blank(&model.id) {
            issues.push(ConfigIssue::error(field("id"), "missing `id`"));
        } else if !seen.insert(model.id.as_str()) {
            issues.push(ConfigIssue::error(
                field("id"),
                format!("duplicate model id `{}`", model.id),
            ));
        }

        if is_blank(&model.name) {
            issues.push(ConfigIssue::error(field("name"), "missing `name`"));
        }

        if is_blank(&model.base_url) {
            issues.push(ConfigIssue::error(field("base_url"), "missing `base_url`"));
        } else if !model.base_url.starts_with("http://") && !model.base_url.starts_with("https://") {
            issues.push(ConfigIssue::warning(
                field("base_url"),
                format!("`{}` is not an http(s) url", model.base_url),
            ));
        }

        if model.context_window == 0 {
            issues.push(ConfigIssue::error(
                field("context_window"),
                "`context_window` must be greater than zero",
            ));
        }
        if model.timeout_secs == 0 {
            issues.push(ConfigIssue::error(
                field("timeout_secs"),
                "`timeout_secs` must be greater than zero",
            ));
        }
        if model.max_concurrency == 0 {
            issues.push(ConfigIssue::warning(
                field("max_concurrency"),
                "`max_concurrency` of zero is treated as one",
            ));
        }
        if !(0.0..=2.0).contains(&model.temperature) {
            issues.push(ConfigIssue::warning(
                field("temperature"),
                format!("unusual temperature {}", model.temperature),
            ));
        }
        if model.resolve_api_key().is_none() {
            let hint = match &model.api_key_env {
                Some(var) => format!("environment variable {} is not set", var),
                None => "no `api_key` or `api_key_env`".to_string(),
            };
            issues.push(ConfigIssue::warning(field("api_key"), hint));
        }
    }
}

fn check_prompt(config: &AppConfig, task: Task, issues: &mut Vec<ConfigIssue>) {
    if config.task(task).template.is_some() {
        return;
    }
    let Some(dir) = &config.prompts_dir else {
        return;
    };
    let kind = task.prompt_kind();
    if !dir.is_dir() {
        issues.push(ConfigIssue::error(
            "prompts_dir",
            format!("{} is not a directory", dir.display()),
        ));
    } else if !dir.join(kind.file_name()).is_file() {
        issues.push(ConfigIssue::error(
            "prompts_dir",
            format!("{} has no {}", dir.display(), kind.file_name()),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm_requester::ModelConfig;
    use response_parser::Severity;
    use single_processor::TaskConfig;

    fn config() -> AppConfig {
        let task = TaskConfig {
            model_id: "local".to_string(),
            severity: Severity::Minor,
            rules: vec![],
            template: None,
        };
        let mut model = ModelConfig::new("local", "qwen2.5-coder", "http://localhost:11434/v1");
        model.api_key = Some("ollama".to_string());
        AppConfig {
            cache_dir: "build/batchai".into(),
            lang: "en".to_string(),
            includes: vec![],
            excludes: vec![],
            prompts_dir: None,
            check: task.clone(),
            review: task.clone(),
            test: task,
            models: vec![model],
        }
    }

    #[test]
    fn valid_config_passes() {
        let report = check_app_config(&config(), Some(Task::Review));
        assert!(!report.has_errors(), "expected no errors: {:?}", report.issues);
        assert_eq!(report.warnings().count(), 0);
    }

    #[test]
    fn unknown_model_is_error() {
        let mut cfg = config();
        cfg.test.model_id = "missing".to_string();
        let report = check_app_config(&cfg, None);
        assert!(report.has_errors());
        assert!(report.errors().any(|issue| issue.field == "test.model_id"));
    }

    #[test]
    fn model_without_endpoint_is_error() {
        let mut cfg = config();
        cfg.models[0].base_url = " ".to_string();
        cfg.models.push(cfg.models[0].clone());
        let report = check_app_config(&cfg, None);
        let fields: Vec<_> = report.errors().map(|i| i.field.as_str()).collect();
        assert!(fields.contains(&"models[0].base_url"));
        assert!(fields.contains(&"models[1].id"));
    }

    #[test]
    fn prompts_dir_must_hold_template() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("check.md"), "{{code}}").unwrap();
        let mut cfg = config();
        cfg.prompts_dir = Some(dir.path().to_path_buf());

        assert!(!check_app_config(&cfg, Some(Task::Check)).has_errors());
        assert!(check_app_config(&cfg, Some(Task::Test)).has_errors());

        cfg.test.template = Some("inline {{code}}".to_string());
        assert!(!check_app_config(&cfg, Some(Task::Test)).has_errors());
    }
}
