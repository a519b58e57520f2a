use clap::Parser;
use tracing_subscriber::EnvFilter;

use omnisearch::cli::{Cli, Command, output};
use omnisearch::config;
use omnisearch::orchestrator::SearchOrchestrator;
use omnisearch::registry::plugins::PluginRegistry;
use omnisearch::types::{SearchOptions, SearchQuery, StrategyKind};

#[tokio::main]
async fn main() {
    std::process::exit(run().await);
}

async fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            // Help and version requests are not failures.
            let code = if error.use_stderr() { 1 } else { 0 };
            let _ = error.print();
            return code;
        }
    };

    init_tracing(cli.verbose);

    let strategy = match cli.strategy.parse::<StrategyKind>() {
        Ok(strategy) => strategy,
        Err(message) => {
            eprintln!("error: {message}");
            return 1;
        }
    };
    if cli.limit == Some(0) {
        eprintln!("error: --limit must be a positive integer");
        return 1;
    }
    if cli.command.is_none() && cli.query.is_none() {
        eprintln!("error: missing search query (see --help)");
        return 1;
    }

    let config = match config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {error}");
            return 1;
        }
    };

    let plugins = PluginRegistry::with_builtins();
    let orchestrator = match SearchOrchestrator::bootstrap(config, &plugins).await {
        Ok(orchestrator) => orchestrator,
        Err(error) => {
            eprintln!("error: {error}");
            return 1;
        }
    };

    match cli.command {
        Some(Command::Credits) => {
            let snapshots = orchestrator.credits().list_snapshots().await;
            if cli.json {
                match serde_json::to_string_pretty(&snapshots) {
                    Ok(json) => println!("{json}"),
                    Err(error) => {
                        eprintln!("error: {error}");
                        return 1;
                    }
                }
            } else {
                output::print_credits(&snapshots);
            }
            0
        }
        Some(Command::Health) => {
            let results = orchestrator.healthcheck_all().await;
            if cli.json {
                let doc: Vec<serde_json::Value> = results
                    .iter()
                    .map(|(engine_id, healthy)| {
                        serde_json::json!({"engineId": engine_id, "healthy": healthy})
                    })
                    .collect();
                match serde_json::to_string_pretty(&doc) {
                    Ok(json) => println!("{json}"),
                    Err(error) => {
                        eprintln!("error: {error}");
                        return 1;
                    }
                }
            } else {
                output::print_health(&results);
            }
            if results.iter().all(|(_, healthy)| *healthy) {
                0
            } else {
                1
            }
        }
        None => {
            let Some(text) = cli.query else {
                eprintln!("error: missing search query (see --help)");
                return 1;
            };

            let mut query = SearchQuery::new(text).with_include_raw(cli.include_raw);
            query.limit = cli.limit;
            let options = SearchOptions {
                strategy,
                engine_order_override: cli.engines,
                parallel: cli.parallel,
            };

            match orchestrator.run(query, options).await {
                Ok(report) => {
                    if cli.json {
                        match serde_json::to_string_pretty(&report) {
                            Ok(json) => println!("{json}"),
                            Err(error) => {
                                eprintln!("error: {error}");
                                return 1;
                            }
                        }
                    } else {
                        let low_credit = orchestrator.credits().low_credit_engines().await;
                        output::print_report(&report, &low_credit);
                    }
                    0
                }
                Err(error) => {
                    eprintln!("error: {error}");
                    1
                }
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "omnisearch=debug" } else { "omnisearch=warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
