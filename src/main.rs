//! # Rosetta CLI (`rosetta`)
//!
//! ```bash
//! rosetta --repo ./my-project create
//! rosetta --repo ./my-project update
//! rosetta --repo ./my-project search "parser crash on empty input"
//! rosetta --repo ./my-project basic-search 'crash*'
//! rosetta --repo ./my-project tokens src/parser.rs
//! rosetta --repo ./my-project status --json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rosetta_search::{Config, IndexReport, RosettaClient, SearchResponse};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("GIT_COMMIT_HASH"),
    "\nbuilt: ",
    env!("BUILD_TIMESTAMP"),
    "\nsimilarity backends: ",
    env!("SIMILARITY_BACKENDS"),
);

/// Find files in a git repository by the commit messages that touched them
#[derive(Parser)]
#[command(name = "rosetta", version, long_version = LONG_VERSION)]
struct Cli {
    /// Repository to index or search (any path inside it)
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// SQLite index location (defaults to a per-repository file in the data dir)
    #[arg(long, global = true, env = "ROSETTA_INDEX_PATH")]
    index_path: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from the full history
    Create,

    /// Absorb commits made since the last run
    Update,

    /// Files whose history mentions tokens matching a wildcard pattern
    BasicSearch {
        /// Token pattern; `*` matches any run, `?` a single character
        pattern: String,
    },

    /// Rank files for a free-text query (lexical + semantic)
    Search {
        query: String,

        /// Maximum number of files
        #[arg(long)]
        limit: Option<usize>,

        /// Similar vocabulary tokens kept per query token
        #[arg(long)]
        similar: Option<usize>,
    },

    /// Show index state and the last update
    Status,

    /// List the vocabulary associated with a file
    Tokens {
        /// Repository-relative path
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "rosetta_search=debug,rosetta=debug"
    } else {
        "rosetta_search=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(index_path) = &cli.index_path {
        config.index.path = Some(index_path.clone());
    }

    let client = RosettaClient::open(&cli.repo, config)
        .await
        .with_context(|| format!("Failed to open index for {}", cli.repo.display()))?;

    match cli.command {
        Commands::Create => {
            let report = client.build().await?;
            print_report(&report, cli.json, "Initial indexing complete")?;
        }
        Commands::Update => {
            if !cli.json
                && let Some(last) = client.last_update().await?
            {
                println!("Most recent update was at {}", last.end_time);
            }
            let report = client.update().await?;
            print_report(&report, cli.json, "Update complete")?;
        }
        Commands::BasicSearch { pattern } => {
            let hits = client.basic_search(&pattern).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                println!("No files found for '{}'", pattern);
            } else {
                for hit in hits {
                    println!("{:>9.4}  {}  ({})", hit.score, hit.path, hit.token);
                }
            }
        }
        Commands::Search {
            query,
            limit,
            similar,
        } => {
            let response = client.similarity_search(&query, similar, limit).await?;
            print_search(&response, cli.json)?;
        }
        Commands::Status => {
            let status = client.status().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Index:    {}", status.index_path);
                println!(
                    "Contents: {} commits, {} tokens, {} files",
                    status.commits, status.tokens, status.files
                );
                println!("HEAD:     {}", status.head);
                match status.last_update {
                    Some(last) => {
                        println!("Last update: {} ({} commits)", last.end_time, last.commit_count);
                        println!("Watermark:   {}", last.last_rev);
                    }
                    None => println!("Not built yet; run `rosetta create`"),
                }
                if status.initialized && !status.up_to_date {
                    println!("Index is behind HEAD; run `rosetta update`");
                }
            }
        }
        Commands::Tokens { file } => {
            let tokens = client.tokens_for_file(&file).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&tokens)?);
            } else if tokens.is_empty() {
                println!("No history indexed for {}", file);
            } else {
                for token in tokens {
                    let score = token
                        .tf_idf
                        .map(|s| format!("{:.4}", s))
                        .unwrap_or_else(|| "unscored".to_string());
                    println!("{:>9}  {} (x{})", score, token.token, token.term_frequency);
                }
            }
        }
    }

    Ok(())
}

fn print_report(report: &IndexReport, json: bool, headline: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    if report.commits_indexed == 0 {
        println!("No new commits since {}", report.watermark.as_deref().unwrap_or("-"));
        return Ok(());
    }

    println!(
        "{}.\n {} commits indexed in {:.2} seconds",
        headline,
        report.commits_indexed,
        report.duration_ms as f64 / 1000.0
    );
    if report.resumed > 0 {
        println!(" {} commits recovered from an interrupted run", report.resumed);
    }
    Ok(())
}

fn print_search(response: &SearchResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }

    if response.results.is_empty() {
        println!("No files found for '{}'", response.query);
    }

    for (rank, file) in response.results.iter().enumerate() {
        let matched: Vec<String> = file
            .matched_tokens
            .iter()
            .map(|m| {
                if m.token == m.query_token {
                    m.token.clone()
                } else {
                    format!("{}~{} ({:.2})", m.query_token, m.token, m.similarity)
                }
            })
            .collect();
        println!(
            "{:>3}. {}  [{}/{} terms, tf-idf {:.4}]  {}",
            rank + 1,
            file.path,
            file.query_tokens.len(),
            distinct_query_tokens(response),
            file.tf_idf_sum,
            matched.join(", ")
        );
    }

    if response.semantic_partial {
        eprintln!(
            "note: semantic expansion partially unavailable ({} similarity calls failed)",
            response.degraded_pairs
        );
    }
    Ok(())
}

fn distinct_query_tokens(response: &SearchResponse) -> usize {
    let mut tokens: Vec<&String> = response.normalized_query.iter().collect();
    tokens.sort();
    tokens.dedup();
    tokens.len()
}
