//! Command line front end for the crawl orchestrator.
//!
//! Sessions live in the configured SQLite database, so every invocation sees
//! the jobs created by earlier ones.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crawl_orchestrator::{
    start_sync_scheduler, ControlOutcome, CrawlOrchestrator, CrawlServiceClient, CrawlSession,
    OrchestratorConfig, SessionId, SessionStore, SqliteSessionRepository, SyncOutcome,
};
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Slack on top of the request timeout when waiting for a detached submission.
const SUBMIT_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "crawlctl")]
#[command(about = "Start, track and control remote crawl jobs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a new crawl job
    Create {
        url: String,
        #[arg(long, default_value_t = 1)]
        depth: u32,
        /// Local directory for downloaded artifacts
        #[arg(long)]
        output: Option<PathBuf>,
        /// Return once the session is recorded, without waiting for the service
        #[arg(long)]
        detach: bool,
    },

    /// List all sessions, newest first
    List,

    /// Show one session
    Show { id: SessionId },

    /// Refresh one session, or every active session
    Sync { id: Option<SessionId> },

    /// Keep syncing in the background and print changes until interrupted
    Watch {
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Pause a running crawl
    Pause { id: SessionId },

    /// Resume a paused crawl
    Resume { id: SessionId },

    /// Stop a crawl
    Stop { id: SessionId },

    /// List the files a crawl produced
    Report { id: SessionId },

    /// Print a content file
    Cat { id: SessionId, filename: String },

    /// Download a file into the session's output directory
    Fetch {
        id: SessionId,
        category: String,
        filename: String,
    },

    /// Forget every local session
    Clear,
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,crawl_orchestrator=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = OrchestratorConfig::from_env().context("Failed to load configuration")?;
    let orchestrator = Arc::new(build_orchestrator(&config).await?);

    match cli.command {
        Commands::Create {
            url,
            depth,
            output,
            detach,
        } => {
            let output = output.unwrap_or_else(|| config.output_dir.clone());
            // The submission is one request, bounded by the client timeout.
            let submit_timeout = config.request_timeout + SUBMIT_GRACE;
            cmd_create(&orchestrator, &url, depth, output, detach, submit_timeout).await
        }
        Commands::List => cmd_list(&orchestrator),
        Commands::Show { id } => cmd_show(&orchestrator, id),
        Commands::Sync { id } => cmd_sync(&orchestrator, id).await,
        Commands::Watch { interval } => {
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or(config.sync_interval);
            cmd_watch(orchestrator, interval).await
        }
        Commands::Pause { id } => cmd_control(orchestrator.pause(id).await, id),
        Commands::Resume { id } => cmd_control(orchestrator.resume(id).await, id),
        Commands::Stop { id } => cmd_control(orchestrator.stop(id).await, id),
        Commands::Report { id } => cmd_report(&orchestrator, id).await,
        Commands::Cat { id, filename } => {
            let text = orchestrator
                .get_file_content(id, &filename)
                .await
                .with_context(|| format!("Failed to read {filename}"))?;
            print!("{text}");
            Ok(())
        }
        Commands::Fetch {
            id,
            category,
            filename,
        } => {
            let path = orchestrator
                .download_artifact(id, &category, &filename)
                .await
                .with_context(|| format!("Failed to download {category}/{filename}"))?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Clear => {
            orchestrator.clear_all().await?;
            println!("Cleared all sessions");
            Ok(())
        }
    }
}

async fn build_orchestrator(config: &OrchestratorConfig) -> Result<CrawlOrchestrator> {
    let repository = SqliteSessionRepository::new(&config.database_url)
        .await
        .context("Failed to open session database")?;
    let store = Arc::new(SessionStore::new(Arc::new(repository)));
    let loaded = store.load().await.context("Failed to load sessions")?;
    tracing::debug!(sessions = loaded, "Loaded crawl sessions");

    let service = Arc::new(
        CrawlServiceClient::with_timeout(config.service_url.clone(), config.request_timeout)
            .context("Failed to build crawl service client")?,
    );

    Ok(CrawlOrchestrator::new(store, service).with_sync_concurrency(config.sync_concurrency))
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_create(
    orchestrator: &Arc<CrawlOrchestrator>,
    url: &str,
    depth: u32,
    output: PathBuf,
    detach: bool,
    submit_timeout: Duration,
) -> Result<()> {
    if detach {
        let id = orchestrator.create_detached(url, depth, output).await?;
        // The submission task dies with the runtime, so wait for it to settle.
        if orchestrator.wait_for_submission(id, submit_timeout).await.is_none() {
            eprintln!("Session {id} is still pending; check it later with `crawlctl show {id}`");
        }
        println!("{id}");
        return Ok(());
    }

    let session = orchestrator.create(url, depth, output).await?;
    print_session(&session);
    Ok(())
}

fn cmd_list(orchestrator: &CrawlOrchestrator) -> Result<()> {
    let sessions = orchestrator.store().snapshot();
    if sessions.is_empty() {
        println!("No sessions");
        return Ok(());
    }
    for session in &sessions {
        print_row(session);
    }
    Ok(())
}

fn cmd_show(orchestrator: &CrawlOrchestrator, id: SessionId) -> Result<()> {
    let session = orchestrator
        .get(id)
        .with_context(|| format!("Session {id} not found"))?;
    print_session(&session);
    if let Some(failure) = orchestrator.sync_health(id) {
        println!("last sync error: {} ({})", failure.message, failure.at.to_rfc3339());
    }
    Ok(())
}

async fn cmd_sync(orchestrator: &CrawlOrchestrator, id: Option<SessionId>) -> Result<()> {
    let Some(id) = id else {
        let summary = orchestrator.sync_all().await;
        println!(
            "synced {}, skipped {}, failed {}",
            summary.synced,
            summary.skipped,
            summary.failed.len()
        );
        return Ok(());
    };

    match orchestrator.sync(id).await? {
        SyncOutcome::Skipped(reason) => println!("skipped: {reason:?}"),
        SyncOutcome::Synced { .. } => {
            if let Some(session) = orchestrator.get(id) {
                print_session(&session);
            }
        }
    }
    Ok(())
}

async fn cmd_watch(orchestrator: Arc<CrawlOrchestrator>, interval: Duration) -> Result<()> {
    let mut scheduler = start_sync_scheduler(orchestrator.clone(), interval).await?;
    let mut updates = orchestrator.store().list();

    loop {
        tokio::select! {
            next = updates.next() => {
                let Some(sessions) = next else { break };
                println!("--");
                for session in &sessions {
                    print_row(session);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    scheduler.shutdown().await?;
    Ok(())
}

fn cmd_control(result: crawl_orchestrator::Result<ControlOutcome>, id: SessionId) -> Result<()> {
    match result? {
        ControlOutcome::Acknowledged(write) => println!("session {id}: {write:?}"),
        ControlOutcome::Skipped(reason) => println!("session {id}: skipped ({reason:?})"),
    }
    Ok(())
}

async fn cmd_report(orchestrator: &CrawlOrchestrator, id: SessionId) -> Result<()> {
    let report = orchestrator.get_report(id).await?;
    for (category, files) in [
        ("content", &report.content),
        ("images", &report.images),
        ("documents", &report.documents),
    ] {
        println!("{category} ({})", files.len());
        for file in files {
            println!("  {file}");
        }
    }
    Ok(())
}

// ============================================================================
// Output
// ============================================================================

fn print_row(session: &CrawlSession) {
    println!(
        "{:>4}  {:<14}  {:>5}/{:<5}  {}",
        session.id,
        session.status.label(),
        session.pages_crawled,
        session.pages_total,
        session.start_url
    );
}

fn print_session(session: &CrawlSession) {
    println!("id:        {}", session.id);
    println!(
        "remote id: {}",
        session
            .remote_id()
            .map(|r| r.as_str().to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("url:       {} (depth {})", session.start_url, session.depth);
    println!("status:    {}", session.status);
    println!(
        "pages:     {} crawled, {} total, {} queued",
        session.pages_crawled, session.pages_total, session.pages_queued
    );
    if let Some(url) = &session.current_url {
        println!("current:   {url}");
    }
    println!("started:   {}", session.start_time.to_rfc3339());
    if let Some(end) = session.end_time {
        println!("ended:     {}", end.to_rfc3339());
    }
    println!("output:    {}", session.output_path.display());
}
