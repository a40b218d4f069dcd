//! logtriage - ask questions about a window of operational logs.
//!
//! The `ask` command fetches the records in a time range, analyzes them
//! (in parallel chunks when the range is large) and prints the answer.
//! Small ranges take the triage route, which may also open automated fix
//! proposals for mechanically repairable errors.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::Level;

use logtriage_core::{
    init_tracing, parse_time_range, resolve_time_range, AskPipeline, AskRequest, CommandCodeFix,
    GitCli, GithubChangeHost, HttpAnalysisModel, InsightsRecordStore, RemediationOrchestrator,
    TriageConfig, DEFAULT_QUERY,
};

#[derive(Parser)]
#[command(name = "logtriage")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Log question answering with automated error remediation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question about the logs in a time range
    Ask {
        /// Log group to query
        #[arg(short, long)]
        group: String,

        /// The question to answer
        #[arg(short = 'Q', long)]
        question: String,

        /// Range start (e.g. 2025-01-15T12:00:00); requires --end or defaults to now
        #[arg(short, long, conflicts_with = "when")]
        start: Option<String>,

        /// Range end; defaults to now
        #[arg(short, long, requires = "start")]
        end: Option<String>,

        /// Natural-language range (e.g. "last 2 hours", "since yesterday")
        #[arg(short, long)]
        when: Option<String>,

        /// Record-store query to run
        #[arg(long, default_value = DEFAULT_QUERY)]
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Ask {
            group,
            question,
            start,
            end,
            when,
            query,
        } => ask(group, question, start, end, when, query).await,
    }
}

async fn ask(
    group: String,
    question: String,
    start: Option<String>,
    end: Option<String>,
    when: Option<String>,
    query: String,
) -> Result<()> {
    let now = Utc::now();
    let range = match (&when, &start) {
        (Some(text), _) => parse_time_range(text, now).context("invalid --when expression")?,
        (None, Some(start)) => {
            resolve_time_range(start, end.as_deref(), now).context("invalid time range")?
        }
        (None, None) => {
            anyhow::bail!("a time range is required: pass --when or --start [--end]")
        }
    };

    let config = TriageConfig::from_env().context("invalid configuration")?;

    let store = Arc::new(InsightsRecordStore::new(
        config.store_endpoint.clone(),
        group.clone(),
    ));
    let model = Arc::new(HttpAnalysisModel::new(config.model.clone()));
    let remediator = Arc::new(RemediationOrchestrator::new(
        config.remediation.clone(),
        Arc::new(GitCli::new()),
        Arc::new(CommandCodeFix::new(config.remediation.fix_command.clone())),
        Arc::clone(&model) as Arc<dyn logtriage_core::AnalysisModel>,
        Arc::new(GithubChangeHost::new(
            config.remediation.repo.clone(),
            config.remediation.token.clone(),
        )),
    ));

    let pipeline = AskPipeline::new(store, model, remediator, config.limits);
    let outcome = pipeline
        .ask(AskRequest {
            log_group: group,
            question,
            query,
            range,
        })
        .await
        .context("analysis failed")?;

    println!("{}", outcome.finding.summary);
    println!();
    println!("{}", outcome.metrics.summary_line());
    Ok(())
}
