//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use threadlive_runtime::config::LiveArgs;

#[derive(Parser)]
#[command(name = "threadlive", about = "Live/polling connection manager for remote threads")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Replay a JSON scenario against a recording backend and print the report
    Replay(ReplayOpts),
    /// Print the effective configuration (defaults, env, flags)
    Config(ConfigOpts),
}

#[derive(clap::Args)]
pub struct ReplayOpts {
    /// Scenario file
    pub path: PathBuf,

    #[command(flatten)]
    pub live: LiveArgs,
}

#[derive(clap::Args)]
pub struct ConfigOpts {
    #[command(flatten)]
    pub live: LiveArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn replay_flags_parse() {
        let cli = Cli::try_parse_from([
            "threadlive",
            "replay",
            "scenario.json",
            "--backend-mode",
            "local",
            "--staleness-ms",
            "500",
        ])
        .expect("parse");
        let Command::Replay(opts) = cli.command else {
            panic!("expected replay");
        };
        assert_eq!(opts.path, PathBuf::from("scenario.json"));
        let config = opts.live.to_config().expect("config");
        assert_eq!(config.staleness_ms(), 500);
    }
}
