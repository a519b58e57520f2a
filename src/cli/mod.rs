//! Command-Line Interface
//!
//! Argument surface for the `omnisearch` binary: a positional query as
//! the default action plus the `credits` and `health` subcommands.
//! `--config` and `--json` are global so they work in any position.

pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "omnisearch",
    version,
    about = "Unified multi-engine web search",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Search query (the default action)
    pub query: Option<String>,

    /// Emit machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Explicit configuration file path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Raise log verbosity to debug
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Override the engine order (comma-separated ids)
    #[arg(long, value_delimiter = ',', value_name = "e1,e2,...")]
    pub engines: Vec<String>,

    /// Execution strategy: all | first-success
    #[arg(long, default_value = "all", value_name = "STRATEGY")]
    pub strategy: String,

    /// Maximum number of merged results (positive integer)
    #[arg(long, value_name = "N")]
    pub limit: Option<u32>,

    /// Include each provider's raw response in JSON output
    #[arg(long)]
    pub include_raw: bool,

    /// Query eligible engines concurrently (all strategy only)
    #[arg(long)]
    pub parallel: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print per-engine credit snapshots
    Credits,
    /// Probe every registered provider; exit 0 iff none are unhealthy
    Health,
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
    fn query_with_options_parses() {
        let cli = Cli::try_parse_from([
            "omnisearch",
            "rust async runtime",
            "--engines",
            "tavily,brave",
            "--strategy",
            "first-success",
            "--limit",
            "5",
            "--json",
        ])
        .unwrap();

        assert_eq!(cli.query.as_deref(), Some("rust async runtime"));
        assert_eq!(cli.engines, vec!["tavily", "brave"]);
        assert_eq!(cli.strategy, "first-success");
        assert_eq!(cli.limit, Some(5));
        assert!(cli.json);
        assert!(cli.command.is_none());
    }

    #[test]
    fn config_flag_works_before_and_after_subcommands() {
        let before = Cli::try_parse_from(["omnisearch", "--config", "/tmp/c.toml", "credits"]);
        let after = Cli::try_parse_from(["omnisearch", "credits", "--config", "/tmp/c.toml"]);
        assert!(before.is_ok());
        assert!(after.unwrap().config.is_some());
    }

    #[test]
    fn non_numeric_limit_is_a_parse_error() {
        assert!(Cli::try_parse_from(["omnisearch", "rust", "--limit", "many"]).is_err());
    }
}
