use guide_overlay::cli::{Cli, Command};
use guide_overlay::config::Settings;
use guide_overlay::core::events::Event;
use guide_overlay::core::service::RecentBuilds;
use guide_overlay::core::templates::{
    format_detailed_build, format_diagnostics, format_leaderboard, MessageTemplate,
};
use guide_overlay::error::OverlayResult;
use guide_overlay::scheduler::{JobProcess, Scheduler};
use guide_overlay::storage::{CacheStore, FileStore, MemoryStore};

use clap::Parser;
use itertools::Itertools;
use minijinja::context;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli.overrides)?;

    // RUST_LOG, when set, takes precedence over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.get_trace_level().to_string()));
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let store: Arc<dyn CacheStore> = match &settings.cache_dir {
        Some(dir) => {
            info!("Persisting cache in {}", dir.display());
            Arc::new(FileStore::new(dir)?)
        }
        None => Arc::new(MemoryStore::new()),
    };
    let service = RecentBuilds::from_settings(&settings, store)?;

    match cli.command {
        Command::Leaderboard => {
            let players = service.leaderboard().await?;
            println!("{}", format_leaderboard(&players)?);
        }
        Command::Builds { json } => {
            let builds = report_failure(service.update_recent_builds().await)?;
            match json {
                true => println!("{}", serde_json::to_string_pretty(&builds)?),
                false => println!("{}", Event::from_builds(builds)),
            }
        }
        Command::Detailed => {
            let builds = service.detailed_builds().await;
            match builds.is_empty() {
                true => println!("{}", MessageTemplate::NoBuilds.render(context! {})?),
                false => println!(
                    "{}",
                    builds
                        .iter()
                        .map(format_detailed_build)
                        .collect::<OverlayResult<Vec<String>>>()?
                        .iter()
                        .join("\n\n")
                ),
            }
        }
        Command::Refresh => {
            let builds = report_failure(service.force_refresh().await)?;
            println!("{}", Event::from_builds(builds));
        }
        Command::ClearCache => {
            service.clear_cache();
            println!("🧹 Cache cleared.");
        }
        Command::Status => {
            println!("{}", format_diagnostics(&service.diagnostics())?);
        }
        Command::Watch => watch(&settings, service).await?,
    }

    Ok(())
}

// Users see the generic retry notice, the cause goes to the logs and exit status.
fn report_failure<T>(result: OverlayResult<T>) -> OverlayResult<T> {
    if let Err(e) = &result {
        if !e.is_contention() {
            println!("{}", Event::RefreshFailed(e.to_string()));
        }
    }
    result
}

async fn watch(settings: &Settings, service: RecentBuilds) -> OverlayResult<()> {
    // Capacity of 16 is plenty, refreshes are minutes apart.
    let (tx, mut rx) = mpsc::channel::<Event>(16);

    let sched = Scheduler::new(service, Arc::new(tx)).await?;
    let jobs = vec![
        JobProcess::InitialRefresh, // only ran once, at startup.
        JobProcess::RefreshBuilds(&settings.refresh_schedule),
    ];
    for job in jobs {
        sched.add_job(job).await?;
    }

    info!("Starting scheduler.");
    sched.start().await?;

    while let Some(event) = rx.recv().await {
        println!("{event}\n");
    }
    Ok(())
}
