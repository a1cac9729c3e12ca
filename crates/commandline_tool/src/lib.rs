use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use llm_requester::ModelService;
use single_processor::{AppConfig, RunArgs, RunContext, Task, load_app_config};

pub mod logging;

#[derive(Parser, Debug)]
#[command(name = "batchai")]
#[command(version)]
#[command(about = "uses AI to batch processing project files", long_about = None)]
pub struct Cli {
    /// 显示调试日志 (默认关闭)
    #[arg(long, short = 'd', global = true)]
    pub debug: bool,

    /// echo every chat message and answer
    #[arg(long, global = true)]
    pub verbose: bool,

    /// ignores the cache and processes unchanged files again
    #[arg(long, global = true)]
    pub force: bool,

    /// 并发处理文件
    #[arg(long, global = true)]
    pub concurrent: bool,

    /// looks up symbols defined in other files of the repository
    #[arg(long, global = true)]
    pub enable_symbol_reference: bool,

    /// language for generated text
    #[arg(long, short = 'l', global = true)]
    pub lang: Option<String>,

    /// config file, instead of the default search locations
    #[arg(long, short = 'c', global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// processes at most this many files
    #[arg(long, short = 'n', global = true)]
    pub num: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

/// `<repository directory> [target files/directories in the repository]`
#[derive(Args, Debug, Clone)]
pub struct Targets {
    #[arg(value_name = "REPOSITORY")]
    pub repository: PathBuf,

    #[arg(value_name = "TARGETS")]
    pub targets: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scans project code for issues; reports go to the console and the cache directory
    Check {
        /// replaces the target files with the fixed code
        #[arg(long, short = 'f')]
        fix: bool,
        #[command(flatten)]
        targets: Targets,
    },

    /// Reviews project code; reports go to the console and the cache directory
    Review {
        /// replaces the target files with the fixed code
        #[arg(long, short = 'f')]
        fix: bool,
        #[command(flatten)]
        targets: Targets,
    },

    /// Generates unit test code
    Test {
        /// preferred test libraries, comma separated
        #[arg(long, value_delimiter = ',')]
        libraries: Vec<String>,
        #[command(flatten)]
        targets: Targets,
    },

    /// Lists files to process
    List {
        #[command(flatten)]
        targets: Targets,
    },
}

impl Commands {
    pub fn task(&self) -> Option<Task> {
        match self {
            Commands::Check { .. } => Some(Task::Check),
            Commands::Review { .. } => Some(Task::Review),
            Commands::Test { .. } => Some(Task::Test),
            Commands::List { .. } => None,
        }
    }

    fn targets(&self) -> &Targets {
        match self {
            Commands::Check { targets, .. }
            | Commands::Review { targets, .. }
            | Commands::Test { targets, .. }
            | Commands::List { targets } => targets,
        }
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

fn absolute(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Resolves repository and targets against `cwd` and checks they exist.
pub fn run_args(cli: &Cli, cwd: &Path) -> Result<RunArgs> {
    let targets = cli.command.targets();
    let repository = absolute(&targets.repository, cwd);
    let repository = repository
        .canonicalize()
        .with_context(|| format!("Repository not found: {}", repository.display()))?;
    if !repository.is_dir() {
        bail!("{} is not a directory", repository.display());
    }

    let mut resolved = Vec::with_capacity(targets.targets.len());
    for target in &targets.targets {
        let path = absolute(target, cwd);
        let path = path
            .canonicalize()
            .with_context(|| format!("Target not found: {}", path.display()))?;
        if !path.starts_with(&repository) {
            bail!(
                "{} is not inside repository {}",
                path.display(),
                repository.display()
            );
        }
        resolved.push(path);
    }

    let (fix, libraries) = match &cli.command {
        Commands::Check { fix, .. } | Commands::Review { fix, .. } => (*fix, Vec::new()),
        Commands::Test { libraries, .. } => (false, libraries.clone()),
        Commands::List { .. } => (false, Vec::new()),
    };

    Ok(RunArgs {
        repository,
        targets: resolved,
        force: cli.force,
        verbose: cli.verbose,
        concurrent: cli.concurrent,
        enable_symbol_reference: cli.enable_symbol_reference,
        num: cli.num,
        lang: cli.lang.clone().filter(|l| !l.trim().is_empty()),
        fix,
        libraries,
    })
}

/// Validates the environment, runs the command and prints the metrics.
pub async fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let config: AppConfig = load_app_config(cli.config.as_deref(), &cwd)?;
    let args = run_args(&cli, &cwd)?;
    let task = cli.command.task();

    env_checker::check_all(&config, task, &args.repository, args.fix)?;

    let Some(task) = task else {
        let mut out = String::new();
        main_processor::list(&config, &args, &mut out)?;
        print!("{}", out);
        return Ok(());
    };

    let models = Arc::new(ModelService::new(&config.models)?);
    let ctx = Arc::new(RunContext::new(Arc::new(config), args, task, models).await?);
    info!("Running {} on {}", task.name(), ctx.args.repository.display());

    let mut summary = String::new();
    match task {
        Task::Check | Task::Review => {
            let metrics = main_processor::run_issue_task(ctx).await?;
            writeln!(summary)?;
            metrics.print(&mut summary)?;
        }
        Task::Test => {
            let metrics = main_processor::run_test_task(ctx).await?;
            writeln!(summary)?;
            metrics.print(&mut summary)?;
        }
    }
    print!("{}", summary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_review_with_global_flags() {
        let cli = Cli::try_parse_from([
            "batchai",
            "--concurrent",
            "review",
            "--fix",
            "--force",
            "repo",
            "repo/src",
        ])
        .unwrap();
        assert!(cli.concurrent);
        assert!(cli.force);
        assert_eq!(cli.command.task(), Some(Task::Review));
        match &cli.command {
            Commands::Review { fix, targets } => {
                assert!(*fix);
                assert_eq!(targets.repository, PathBuf::from("repo"));
                assert_eq!(targets.targets, vec![PathBuf::from("repo/src")]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_test_libraries() {
        let cli =
            Cli::try_parse_from(["batchai", "test", "--libraries", "testify,gomock", "."]).unwrap();
        match cli.command {
            Commands::Test { libraries, .. } => assert_eq!(libraries, vec!["testify", "gomock"]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_repository_is_required() {
        assert!(Cli::try_parse_from(["batchai", "list"]).is_err());
    }

    #[test]
    fn test_targets_resolved_inside_repository() {
        let dir = TempDir::new().unwrap();
        let repo = dir.path().join("repo");
        std::fs::create_dir_all(repo.join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("elsewhere")).unwrap();

        let cli = Cli::try_parse_from(["batchai", "-n", "3", "check", "repo", "repo/src"]).unwrap();
        let args = run_args(&cli, dir.path()).unwrap();
        let repo = repo.canonicalize().unwrap();
        assert_eq!(args.repository, repo);
        assert_eq!(args.targets, vec![repo.join("src")]);
        assert_eq!(args.num, Some(3));

        let outside = Cli::try_parse_from(["batchai", "check", "repo", "elsewhere"]).unwrap();
        assert!(run_args(&outside, dir.path()).is_err());

        let missing = Cli::try_parse_from(["batchai", "check", "repo", "repo/nope.go"]).unwrap();
        assert!(run_args(&missing, dir.path()).is_err());
    }
}
