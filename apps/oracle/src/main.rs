mod config;
mod deployments;
mod main_lib;
mod scheduler;

use std::process::ExitCode;

use config::Config;
use main_lib::{build_runner, init_tracing};

/// Snapshot persisted, even with failure markers.
const EXIT_OK: u8 = 0;
/// Fatal aggregation, persistence or startup failure.
const EXIT_CYCLE_FAILED: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // A missing .env is normal in deployed environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            return Ok(ExitCode::from(EXIT_CONFIG_ERROR));
        }
    };

    let runner = match build_runner(&config.oracle).await {
        Ok(runner) => runner,
        Err(e) => {
            tracing::error!("Startup failed: {:#}", e);
            return Ok(ExitCode::from(EXIT_CYCLE_FAILED));
        }
    };

    if let Some(every) = config.schedule_interval {
        scheduler::run_scheduled(&runner, every).await;
        return Ok(ExitCode::from(EXIT_OK));
    }

    match runner.run_once().await {
        Ok(_) => Ok(ExitCode::from(EXIT_OK)),
        Err(_) => Ok(ExitCode::from(EXIT_CYCLE_FAILED)),
    }
}
