pub mod cfg_checker;
pub mod git_checker;

use anyhow::{Result, bail};
use log::{error, warn};
use single_processor::{AppConfig, Task};
use std::path::Path;

pub use cfg_checker::{ConfigCheckReport, ConfigIssue, IssueLevel, check_app_config};
pub use git_checker::{ensure_fix_allowed, is_git_repository, unstaged_files};

/// Startup checks for one command: configuration, then the repository.
/// Warnings are logged; any error aborts the run.
pub fn check_all(
    config: &AppConfig,
    task: Option<Task>,
    repository: &Path,
    fix: bool,
) -> Result<ConfigCheckReport> {
    let report = check_app_config(config, task);
    for issue in report.warnings() {
        warn!("{}", issue);
    }
    if report.has_errors() {
        let errors: Vec<String> = report.errors().map(ToString::to_string).collect();
        for e in &errors {
            error!("{}", e);
        }
        bail!("invalid configuration:\n{}", errors.join("\n"));
    }

    if !is_git_repository(repository) {
        bail!("{} is NOT a git repository directory", repository.display());
    }
    if fix {
        ensure_fix_allowed(repository)?;
    }
    Ok(report)
}
