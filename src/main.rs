//! # Threadsmith
//!
//! Entry point of the GitHub Action. Runs one pass of the thread pipeline over
//! the checked-out repository and reports the results as step outputs and a
//! job summary.
//!
//! ## Environment Variables
//!
//! - `GITHUB_WORKSPACE`: Repository checkout (defaults to the current directory)
//! - `RUST_LOG`: Log filter; `INPUT_LOG_LEVEL` is used when it is not set
//! - See [`threadsmith::ActionConfig::from_env`] for every other variable

use log::{error, info};
use std::path::PathBuf;

use threadsmith::metrics::{write_action_outputs, write_step_summary};
use threadsmith::{ActionConfig, Pipeline};

/// Main entry point for the action.
///
/// # Exit status
///
/// Non-zero when the configuration is invalid or a critical error (such as
/// rejected credentials) aborts the run. Individual posts that fail are
/// reported in the summary without failing the step.
///
/// # Example Usage
///
/// ```bash
/// # Preview threads for the last commit without opening PRs
/// OPENROUTER_API_KEY=... INPUT_DRY_RUN=true cargo run
///
/// # Run with debug logging
/// RUST_LOG=debug cargo run
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize the logging system
    let default_level = std::env::var("INPUT_LOG_LEVEL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let repo_root = std::env::var("GITHUB_WORKSPACE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));
    info!("Starting threadsmith in {}", repo_root.display());

    let config = ActionConfig::from_env()?;
    let pipeline = Pipeline::new(config, repo_root)?;

    let metrics = match pipeline.run().await {
        Ok(metrics) => metrics,
        Err(e) => {
            error!("Run aborted: {}", e);
            write_step_summary(&format!("## 🧵 Blog thread generator\n\n❌ Run aborted: {}\n", e))?;
            return Err(e.into());
        }
    };

    write_action_outputs(&metrics.action_outputs())?;
    write_step_summary(&metrics.render_summary())?;

    info!("Done");
    Ok(())
}
