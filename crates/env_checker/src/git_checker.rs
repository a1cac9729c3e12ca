//! Git status checks run before any file is processed.

use anyhow::{Context, Result, bail};
use log::debug;
use std::path::Path;
use std::process::Command;

fn git(work_dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(work_dir)
        .output()
        .with_context(|| format!("Failed to run git {}", args.join(" ")))?;

    if !output.status.success() {
        bail!(
            "git {} failed in {}: {}",
            args.join(" "),
            work_dir.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// 判断目录是否位于 git 工作区内
pub fn is_git_repository(dir: &Path) -> bool {
    match git(dir, &["status"]) {
        Ok(_) => true,
        Err(e) => {
            debug!("{}", e);
            false
        }
    }
}

/// `git status --porcelain` lines: modified, untracked and unstaged files.
pub fn unstaged_files(dir: &Path) -> Result<Vec<String>> {
    let output = git(dir, &["status", "--porcelain"])?;
    Ok(output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Fix mode overwrites files, so local changes must be staged first.
pub fn ensure_fix_allowed(dir: &Path) -> Result<()> {
    let unstaged = unstaged_files(dir).context("Failed to check unstaged files")?;
    if !unstaged.is_empty() {
        bail!(
            "please stage your local changes before fix.\nunstaged files: \n{}",
            unstaged.join("\n")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    #[test]
    fn test_plain_directory_is_not_a_repository() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        assert!(!is_git_repository(dir.path()));
    }

    #[test]
    fn test_untracked_file_blocks_fix() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        git(dir.path(), &["init", "-q"]).unwrap();
        assert!(is_git_repository(dir.path()));
        assert!(ensure_fix_allowed(dir.path()).is_ok());

        std::fs::write(dir.path().join("main.go"), "package main\n").unwrap();
        let unstaged = unstaged_files(dir.path()).unwrap();
        assert_eq!(unstaged, vec!["?? main.go".to_string()]);
        let err = ensure_fix_allowed(dir.path()).unwrap_err();
        assert!(err.to_string().contains("main.go"));
    }
}
