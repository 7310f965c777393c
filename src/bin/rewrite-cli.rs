use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

use rewrite_router::config::{load_config, ConfigError, RewriterConfig};
use rewrite_router::routing::{normalize_path, TableOptions};
use rewrite_router::RewriteTable;

#[derive(Parser)]
#[command(name = "rewrite-cli")]
#[command(about = "Inspect and test path rewrite tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TableArgs {
    /// Gateway config file. The built-in table is used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a path against the rewrite table
    Resolve {
        path: String,
        #[command(flatten)]
        table: TableArgs,
        /// Also list every later rule that matches
        #[arg(long)]
        all: bool,
    },
    /// Validate a config file and report every error
    Check {
        #[command(flatten)]
        table: TableArgs,
    },
    /// Print the ordered rewrite table
    Rules {
        #[command(flatten)]
        table: TableArgs,
    },
    /// Query a running gateway's admin API
    Remote {
        #[arg(short, long, default_value = "http://127.0.0.1:3081")]
        url: String,

        #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
        key: String,

        #[command(subcommand)]
        command: RemoteCommands,
    },
}

#[derive(Subcommand)]
enum RemoteCommands {
    /// Resolve a path on the running gateway
    Resolve { path: String },
    /// Gateway status
    Status,
    /// Per-destination hit counts
    Stats,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve { path, table, all } => {
            let table = load_table(table.config.as_deref())?;
            let (path, query) = match path.split_once('?') {
                Some((path, query)) => (path.to_string(), Some(query.to_string())),
                None => (path, None),
            };
            let normalized = normalize_path(&path);
            let mut matches = table.matches(&normalized).into_iter();

            let Some(winner) = matches.next() else {
                eprintln!("No rule matches {}", normalized);
                return Ok(ExitCode::FAILURE);
            };

            let uri = winner.rewritten_uri(query.as_deref());
            let mut output = json!({
                "path": path,
                "normalized": normalized,
                "uri": uri,
                "resolution": winner,
            });
            if all {
                output["shadowed"] = serde_json::to_value(matches.collect::<Vec<_>>())?;
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Check { table } => {
            let Some(path) = table.config else {
                let table = load_table(None)?;
                println!("Built-in table OK ({} rules)", table.len());
                return Ok(ExitCode::SUCCESS);
            };
            match load_config(&path) {
                Ok(config) => {
                    let rules = config.effective_rules().len();
                    println!("{} OK ({} rules)", path.display(), rules);
                }
                Err(ConfigError::Validation(errors)) => {
                    for error in &errors {
                        eprintln!("error: {}", error);
                    }
                    eprintln!("{}: {} error(s)", path.display(), errors.len());
                    return Ok(ExitCode::FAILURE);
                }
                Err(e) => {
                    eprintln!("error: {}", e);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Commands::Rules { table } => {
            let table = load_table(table.config.as_deref())?;
            for (index, rule) in table.rules().iter().enumerate() {
                println!("{:>3}  {}  ->  {}", index, rule.source(), rule.destination());
            }
        }
        Commands::Remote { url, key, command } => {
            let client = reqwest::Client::new();
            let mut headers = HeaderMap::new();
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", key))?,
            );

            let request = match command {
                RemoteCommands::Resolve { path } => client
                    .get(format!("{}/admin/resolve", url))
                    .query(&[("path", path)]),
                RemoteCommands::Status => client.get(format!("{}/admin/status", url)),
                RemoteCommands::Stats => client.get(format!("{}/admin/stats", url)),
            };
            let res = request.headers(headers).send().await?;
            return print_response(res).await;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_table(config: Option<&Path>) -> Result<RewriteTable, ConfigError> {
    let config = match config {
        Some(path) => load_config(path)?,
        None => RewriterConfig::default(),
    };
    Ok(RewriteTable::compile(
        &config.effective_rules(),
        &TableOptions::from(&config.rewriting),
    )?)
}

async fn print_response(res: reqwest::Response) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(ExitCode::FAILURE);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(ExitCode::SUCCESS)
}
