use commandline_tool::logging::init_logging;
use commandline_tool::{parse_args, run};
use log::error;
use std::path::Path;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = parse_args();
    let _guard = init_logging(Path::new("log"), cli.debug);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), debug = cli.debug, "batchai starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
