use indicatif::{ProgressDrawTarget, ProgressStyle};
use log::{debug, error, info};
use single_processor::{AgentResult, FileAgent, RunContext};
use std::path::PathBuf;
use tokio::task::JoinSet;

fn progress_style_bar() -> ProgressStyle {
    ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// 在独立任务中运行单个 agent，panic 不会扩散，结束后统一结算结果
async fn run_isolated<A: FileAgent>(agent: A) -> AgentResult<A::Report> {
    let file = agent.file().to_path_buf();
    let joined = tokio::spawn(agent.run()).await;
    AgentResult::settle(&file, joined)
}

/// Launches one agent per file and returns once every agent has finished.
///
/// Concurrent runs put every agent into a `JoinSet` at once; the per-model
/// semaphores are what actually limits traffic. Sequential runs await each
/// agent before starting the next, which keeps console output in file order.
pub async fn dispatch<A, F>(
    ctx: &RunContext,
    label: &str,
    files: &[PathBuf],
    mut make_agent: F,
) -> Vec<AgentResult<A::Report>>
where
    A: FileAgent,
    F: FnMut(PathBuf) -> A,
{
    info!("Dispatching {} {} agent(s)", files.len(), label);
    let mut results = Vec::with_capacity(files.len());

    if !ctx.args.concurrent {
        for file in files {
            results.push(run_isolated(make_agent(file.clone())).await);
        }
        return results;
    }

    let progress = &ctx.progress;
    progress.reset();
    progress.set_length(files.len() as u64);
    progress.set_style(progress_style_bar());
    progress.set_message(label.to_string());
    progress.set_draw_target(ProgressDrawTarget::stderr());

    let mut agents = JoinSet::new();
    for file in files {
        agents.spawn(run_isolated(make_agent(file.clone())));
    }

    while let Some(joined) = agents.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => error!("Lost a {} agent: {}", label, e),
        }
        progress.inc(1);
    }

    progress.finish_and_clear();
    debug!("All {} agents joined", label);
    results
}
