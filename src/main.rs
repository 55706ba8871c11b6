use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

use reposcout::config::PipelineConfig;
use reposcout::pipeline;
use reposcout::scoring::methodology::Methodology;
use reposcout::PipelineContext;

#[derive(Parser)]
#[command(
    name = "reposcout",
    about = "Repository intelligence pipeline — mirror, analyze, and score a corpus of external repositories",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Data directory for the registry, mirrors, index, findings, and scores
    #[arg(long, env = "REPOSCOUT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "REPOSCOUT_LOG")]
    log: Option<String>,

    /// Suppress progress output. Errors still go to stderr; --json output is
    /// unaffected.
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Sync all registered repositories (or one with --id) to local mirrors.
    ///
    /// Per-repository failures are recorded in the index, not raised: the
    /// command exits 0 as long as every targeted repository reached a
    /// terminal state.
    Sync {
        /// Sync a single repository by id
        #[arg(long)]
        id: Option<String>,
    },
    /// Run the detector battery and score synced repositories.
    Analyze {
        /// Analyze a single repository by id
        #[arg(long)]
        id: Option<String>,
    },
    /// Full pipeline: sync, analyze, and print the run summary.
    Run,
    /// Recompute scores for all repositories from stored findings under a
    /// different methodology table. Never re-syncs or re-runs detectors.
    Rescore {
        /// TOML file with the replacement methodology (version, weights,
        /// penalties, caps)
        #[arg(long)]
        methodology: PathBuf,
    },
    /// Show per-repository sync and scoring state, including failures.
    Status {
        #[arg(long)]
        json: bool,
        /// Probe remote heads first and mark out-of-date entries stale
        #[arg(long)]
        refresh: bool,
    },
    /// Ranked leaderboard for the report generator.
    Rank {
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".reposcout")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.log.as_deref());

    // Unexpected internal errors exit non-zero; per-repo failures are data.
    if let Err(e) = run(args).await {
        error!(err = ?e, "fatal error");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let data_dir = args.data_dir.unwrap_or_else(default_data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("cannot create data dir {}", data_dir.display()))?;

    // Configuration errors (malformed TOML, bad weight table, malformed
    // registry entries) are fatal before any work starts.
    let config = PipelineConfig::load(&data_dir)?;
    let ctx = PipelineContext::initialize(config)?;
    pipeline::restore_local_paths(&ctx);
    let show_progress = !args.quiet;

    match args.command {
        Command::Sync { id } => {
            pipeline::register_all(&ctx)?;
            match id {
                Some(id) => {
                    let outcome = pipeline::sync_one(&ctx, &id).await?;
                    print_sync_line(&outcome);
                }
                None => {
                    let outcomes = pipeline::sync_all(&ctx, show_progress).await?;
                    for outcome in &outcomes {
                        print_sync_line(outcome);
                    }
                }
            }
        }
        Command::Analyze { id } => {
            let records = match id {
                Some(id) => {
                    let record = pipeline::analyze_repo(&ctx, &id).await?;
                    ctx.scores.persist()?;
                    vec![record]
                }
                None => pipeline::analyze_all(&ctx, show_progress).await?,
            };
            for record in &records {
                print_record_line(record);
            }
        }
        Command::Run => {
            pipeline::register_all(&ctx)?;
            let summary = pipeline::run_full(&ctx, show_progress).await?;
            println!(
                "run {} finished: {}/{} scored",
                summary.run_id,
                summary.scored_count(),
                summary.records.len()
            );
            for record in &summary.records {
                print_record_line(record);
            }
        }
        Command::Rescore { methodology } => {
            let table = Methodology::from_toml_file(&methodology)?;
            let appended = pipeline::rescore_all(&ctx, &table).await?;
            println!("appended {appended} scores under methodology {}", table.version);
        }
        Command::Status { json, refresh } => {
            if refresh {
                let stale = pipeline::refresh_all(&ctx).await?;
                if stale > 0 && show_progress {
                    eprintln!("{stale} repositories are out of date");
                }
            }
            let entries = ctx.index.list(None);
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in entries {
                    println!(
                        "{:<50} {:<8} {} {}",
                        entry.id,
                        entry.sync_status.as_str(),
                        entry.last_synced_revision.as_deref().unwrap_or("-"),
                        entry.failure_reason.as_deref().unwrap_or("")
                    );
                }
            }
        }
        Command::Rank { json } => {
            // Ranking only makes sense once the corpus is terminal; entries
            // still pending or stale show up with that status rather than
            // being dropped.
            let rows = pipeline::rank(&ctx);
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for row in rows {
                    match (row.rank, row.grade, row.weighted_total) {
                        (Some(rank), Some(grade), Some(total)) => {
                            println!("{rank:>4}. {:<50} {grade} {total:>6.2}", row.repo_id)
                        }
                        _ => println!("   -. {:<50} [{}]", row.repo_id, row.status),
                    }
                }
            }
        }
    }

    Ok(())
}

fn print_sync_line(outcome: &reposcout::sync::SyncOutcome) {
    match &outcome.failure_reason {
        Some(reason) => println!("{:<50} failed: {reason}", outcome.repo_id),
        None => println!(
            "{:<50} {} {}{}",
            outcome.repo_id,
            outcome.status.as_str(),
            outcome.new_revision.as_deref().unwrap_or("-"),
            if outcome.changed() { " (changed)" } else { "" }
        ),
    }
}

fn print_record_line(record: &reposcout::pipeline::RepoRunRecord) {
    use reposcout::pipeline::RunOutcome;
    let detail = match &record.outcome {
        RunOutcome::Scored {
            grade,
            weighted_total,
        } => format!("scored {grade} ({weighted_total:.2})"),
        RunOutcome::Unscorable => "unscorable (no applicable detector)".to_string(),
        RunOutcome::SyncFailed { reason } => format!("sync failed: {reason}"),
        RunOutcome::NotSynced => "not synced".to_string(),
        RunOutcome::TimedOut => "timed out (nothing recorded)".to_string(),
    };
    println!("{:<50} {detail}", record.repo_id);
}
