//! Fairplay - Main entry point
//!
//! Thin command-line embedding of the sort controller: builds the web
//! client, runs the requested sort mode against one playlist, and logs the
//! controller's status events until it finishes or Ctrl+C arrives.

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fairplay_common::{config, SorterEvent};
use fairplay_sorter::{PlaylistSorter, SortMode, WebPlaylistClient};

/// Command-line arguments for fairplay
#[derive(Parser, Debug)]
#[command(name = "fairplay")]
#[command(about = "Keeps a shared playlist fairly ordered between its contributors")]
#[command(version)]
struct Args {
    /// Playlist to keep sorted
    playlist_id: String,

    /// Sort the whole playlist once and exit instead of monitoring playback
    #[arg(long)]
    one_shot: bool,

    /// OAuth access token for the streaming service
    #[arg(long, env = "FAIRPLAY_ACCESS_TOKEN")]
    access_token: Option<String>,

    /// Base URL of the streaming service API
    #[arg(long, env = "FAIRPLAY_API_BASE_URL")]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fairplay=info,fairplay_sorter=info,fairplay_common=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let access_token = config::resolve_access_token(args.access_token.as_deref())
        .context("Failed to resolve an access token")?;
    let base_url = config::resolve_base_url(args.base_url.as_deref());

    let mode = if args.one_shot {
        SortMode::OneShot
    } else {
        SortMode::Continuous
    };
    info!("Sorting playlist {} ({:?})", args.playlist_id, mode);

    let client = WebPlaylistClient::new(base_url, access_token)
        .context("Failed to build the service client")?;
    let sorter = PlaylistSorter::new(client, args.playlist_id, mode);

    let mut events = sorter.subscribe();
    sorter.start();

    let mut failure: Option<String> = None;
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Interrupted, stopping");
                sorter.stop();
                break;
            }
            event = events.recv() => match event {
                Ok(SorterEvent::StatusChanged { status, .. }) => info!("{status}"),
                Ok(SorterEvent::SortCompleted { operations_applied, .. }) => {
                    info!("Playlist sorted with {operations_applied} move(s)");
                }
                Ok(SorterEvent::SortFailed { reason, .. }) => {
                    error!("Sort failed: {reason}");
                    failure = Some(reason);
                }
                Ok(SorterEvent::ActiveChanged { active, .. }) => {
                    debug!("active: {active}");
                    if !active {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("dropped {skipped} event(s)");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    if let Some(reason) = failure {
        anyhow::bail!("sort failed: {reason}");
    }
    Ok(())
}
