//! threadlive: drive the live/polling connection manager from the command line.

use anyhow::Context;
use clap::Parser;

use threadlive_runtime::replay::{Scenario, run_scenario};

mod cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("THREADLIVE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        cli::Command::Replay(opts) => {
            let config = opts.live.to_config().context("invalid configuration")?;
            let scenario = Scenario::load(&opts.path).await?;
            let report = run_scenario(&scenario, &config).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        cli::Command::Config(opts) => {
            let config = opts.live.to_config().context("invalid configuration")?;
            let effective = serde_json::json!({
                "backendMode": config.backend_mode,
                "stalenessMs": config.staleness_ms(),
                "unsubscribeTimeoutMs": config.unsubscribe_timeout.as_millis() as u64,
                "teardownTimeoutMs": config.teardown_timeout.as_millis() as u64,
            });
            println!("{}", serde_json::to_string_pretty(&effective)?);
        }
    }

    Ok(())
}
