//! # Shop Analyst CLI (`shopq`)
//!
//! The `shopq` binary answers plain-English questions about the e-commerce
//! store from the terminal and runs the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! shopq --config ./config/shopq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `shopq init` | Create the SQLite store and its tables |
//! | `shopq schema` | Print the schema description sent to the models |
//! | `shopq tiers` | Probe and list the translator tiers |
//! | `shopq ask "<question>"` | Answer a question |
//! | `shopq stats` | Show table counts and sales totals |
//! | `shopq serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! shopq init
//! shopq ask "What is my total sales?" --show-sql
//! shopq ask "Calculate the RoAS" --stream
//! shopq serve
//! ```
//!
//! Logs go to stderr (`RUST_LOG` overrides the level); command output goes
//! to stdout.

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shop_analyst::config::{self, Config};
use shop_analyst::pipeline::Pipeline;
use shop_analyst::schema::describe_store;
use shop_analyst::stream::answer_stream;
use shop_analyst::translate::TranslatorChain;
use shop_analyst::{db, migrate, server, stats};

/// Shop Analyst: ask questions about your e-commerce data in plain English.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/shopq.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "shopq",
    about = "Shop Analyst: plain-English questions over e-commerce sales and advertising data",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/shopq.toml")]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the store schema.
    ///
    /// Creates the SQLite file and the three business tables. Idempotent.
    Init,

    /// Print the schema description derived from the store catalog.
    Schema,

    /// Probe the configured translator tiers and list their availability.
    Tiers,

    /// Answer a question about the store.
    Ask {
        question: String,

        /// Also write a chart document for the result.
        #[arg(long)]
        chart: bool,

        /// Print the streaming event lines instead of the final answer.
        #[arg(long)]
        stream: bool,

        /// Print the generated query and the tier that produced it.
        #[arg(long)]
        show_sql: bool,
    },

    /// Show table counts and sales totals.
    Stats,

    /// Start the HTTP server.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,
}

fn init_logging(json: bool, serving: bool) {
    let default_level = if serving { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json, matches!(cli.command, Commands::Serve));

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Schema => {
            let pool = db::connect_read_only(&cfg).await?;
            let schema = describe_store(&pool).await?;
            println!("{}", schema.render());
            pool.close().await;
        }
        Commands::Tiers => {
            let chain = TranslatorChain::from_config(&cfg.translator).await;
            println!("{:<3} {:<8} {:<20} {:<11} DETAIL", "#", "TIER", "NAME", "STATUS");
            for (i, status) in chain.statuses().iter().enumerate() {
                println!(
                    "{:<3} {:<8} {:<20} {:<11} {}",
                    i + 1,
                    status.tier.as_str(),
                    status.name,
                    if status.available { "available" } else { "skipped" },
                    status.detail
                );
            }
        }
        Commands::Ask {
            question,
            chart,
            stream,
            show_sql,
        } => {
            run_ask(&cfg, question, chart, stream, show_sql).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

async fn run_ask(
    cfg: &Config,
    question: String,
    chart: bool,
    stream: bool,
    show_sql: bool,
) -> anyhow::Result<()> {
    let pipeline = Arc::new(Pipeline::from_config(cfg).await?);

    if stream {
        let delay = Duration::from_millis(cfg.streaming.token_delay_ms);
        let frames = answer_stream(pipeline, question, chart, delay);
        tokio::pin!(frames);

        let mut stdout = std::io::stdout();
        while let Some(frame) = frames.next().await {
            write!(stdout, "{}", frame.to_line())?;
            stdout.flush()?;
        }
        return Ok(());
    }

    let outcome = pipeline.run(&question).await;
    if show_sql {
        println!("Tier:  {}", outcome.translation.tier);
        println!("Query: {}", outcome.translation.query);
        println!();
    }

    if let Some(message) = outcome.result.error() {
        anyhow::bail!("Query failed: {}", message);
    }

    let response = pipeline.respond(outcome, &question, chart).await;
    println!("{}", response.answer);
    if !response.chart_url.is_empty() {
        println!();
        println!("Chart: {}", response.chart_url);
    }

    Ok(())
}
