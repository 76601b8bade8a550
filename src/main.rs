//! claw-agent - Marketplace Agent Entry Point
//!
//! Registers (or reuses) an agent identity, then runs the apply-and-deliver
//! workflow: a single cycle by default, or continuously with
//! `CLAW_RUN_LOOP=1`.

use claw_agent::{Config, Runner};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "claw_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: marketplace={}, agent={}, capabilities=[{}]",
        config.api_url,
        config.agent_name,
        config.capabilities.join(", ")
    );

    let run_loop = config.run_loop;
    let runner = Runner::bootstrap(config).await?;

    if run_loop {
        runner.run_loop().await;
    } else {
        let outcome = runner.run_once().await?;
        info!("Cycle finished: {}", outcome);
    }

    Ok(())
}
