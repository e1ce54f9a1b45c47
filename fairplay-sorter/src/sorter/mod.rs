//! Sort controller
//!
//! Owns the lifecycle of sorting one playlist: fetches authoritative state
//! from the streaming service, plans reorder operations with the planner,
//! and applies them through the rate-limited mutation endpoint. Two modes:
//!
//! - **One-shot**: fully even out the playlist once, then finish.
//! - **Continuous**: poll the playback position and keep the next few
//!   upcoming tracks even, forever, until stopped or the playlist has been
//!   inactive for too long.
//!
//! All work for one controller runs on a single logical task chain. A new
//! `start()` cancels the in-flight run and the fresh task waits for the old
//! one to wind down before touching the service, so two cycles never race.
//! Progress and failures are broadcast as [`SorterEvent`]s; cancellation is
//! reported as a quiet "stopped" status, never as an error.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fairplay_common::timing::{ensure_active, sleep};
use fairplay_common::{Error, EventBus, Result, SorterEvent};

use crate::planner::{plan_reorder_ops, PlaylistEntry, ReorderOp};
use crate::service::PlaylistService;

mod position;

/// How often to refresh the playback position in continuous mode
const PLAYBACK_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
/// How many upcoming songs to keep ordered in continuous mode
const SONGS_TO_REORDER: usize = 3;
/// Delay between successive mutation calls, skipped before the first
const REORDER_PACING: Duration = Duration::from_millis(200);
/// How long to keep polling an inactive playlist before shutting off
const INACTIVE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Which procedure a controller runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    /// Sort the whole playlist once and finish
    OneShot,
    /// Keep the upcoming tracks sorted against live playback
    Continuous,
}

/// Controller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SorterState {
    /// No run active; a finished run returns here
    Idle,
    /// A run is executing
    Running,
    /// Cancelled by `stop()` or a superseding `start()`
    Stopped,
    /// The last run halted on an error
    Failed,
}

/// Tunable knobs of the controller. The defaults match live service limits
/// and are what the binary uses; tests shrink them.
#[derive(Debug, Clone)]
pub struct SorterConfig {
    /// Continuous-mode poll interval
    pub poll_interval: Duration,
    /// Upcoming tracks kept in order in continuous mode
    pub lookahead: usize,
    /// Delay between successive mutation calls
    pub pacing: Duration,
    /// Continuous mode self-terminates after this much inactivity
    pub inactive_timeout: Duration,
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            poll_interval: PLAYBACK_REFRESH_INTERVAL,
            lookahead: SONGS_TO_REORDER,
            pacing: REORDER_PACING,
            inactive_timeout: INACTIVE_TIMEOUT,
        }
    }
}

/// Playlist state as fetched in one cycle. Owned by that cycle alone.
struct FetchedPlaylist {
    snapshot_id: String,
    entries: Vec<PlaylistEntry>,
}

struct RunHandle {
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

struct SorterInner<S> {
    service: S,
    playlist_id: String,
    mode: SortMode,
    config: SorterConfig,
    events: EventBus,
    state: Mutex<SorterState>,
}

impl<S> SorterInner<S> {
    fn emit(&self, event: SorterEvent) {
        self.events.emit_lossy(event);
    }

    fn set_state(&self, state: SorterState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    fn state(&self) -> SorterState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Keeps one playlist fairly ordered. Created per (service, playlist, mode)
/// selection and discarded when the selection changes.
pub struct PlaylistSorter<S> {
    inner: Arc<SorterInner<S>>,
    current: Mutex<Option<RunHandle>>,
}

impl<S: PlaylistService + 'static> PlaylistSorter<S> {
    pub fn new(service: S, playlist_id: impl Into<String>, mode: SortMode) -> Self {
        Self::with_config(service, playlist_id, mode, SorterConfig::default())
    }

    pub fn with_config(
        service: S,
        playlist_id: impl Into<String>,
        mode: SortMode,
        config: SorterConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SorterInner {
                service,
                playlist_id: playlist_id.into(),
                mode,
                config,
                events: EventBus::default(),
                state: Mutex::new(SorterState::Idle),
            }),
            current: Mutex::new(None),
        }
    }

    /// Subscribe to lifecycle, status, completion, and failure events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SorterEvent> {
        self.inner.events.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SorterState {
        self.inner.state()
    }

    pub fn playlist_id(&self) -> &str {
        &self.inner.playlist_id
    }

    pub fn mode(&self) -> SortMode {
        self.inner.mode
    }

    /// Begin a run, cancelling any run already in flight. Returns
    /// immediately; progress arrives through the event subscription.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());

        let previous = current.take();
        if let Some(previous) = &previous {
            previous.cancel_token.cancel();
        }

        info!(playlist_id = %self.inner.playlist_id, mode = ?self.inner.mode, "starting sort run");
        self.inner.emit(SorterEvent::status("initializing…"));

        let cancel_token = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let run_token = cancel_token.clone();
        let task = tokio::spawn(async move {
            // Serialize against the superseded run so its in-flight cycle
            // finishes observing its cancellation before ours begins
            if let Some(previous) = previous {
                let _ = previous.task.await;
            }
            run(inner, run_token).await;
        });

        *current = Some(RunHandle { cancel_token, task });
    }

    /// Cancel any in-flight work. Idempotent; with no run active it still
    /// emits the inactive notification so observers settle on a known state.
    pub fn stop(&self) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());

        info!(playlist_id = %self.inner.playlist_id, "stopping sort run");
        self.inner.emit(SorterEvent::status("stopped"));
        self.inner.emit(SorterEvent::active(false));

        if let Some(run) = current.take() {
            run.cancel_token.cancel();
        }
        self.inner.set_state(SorterState::Stopped);
    }
}

impl<S> Drop for PlaylistSorter<S> {
    fn drop(&mut self) {
        if let Some(run) = self
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            run.cancel_token.cancel();
        }
    }
}

/// Await `future`, bailing out with `Err(Error::Cancelled)` the moment the
/// token fires. Service calls have no cancellation channel of their own, so
/// every one of them is wrapped in this.
pub(crate) async fn with_cancel<T, F>(cancel_token: &CancellationToken, future: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    tokio::select! {
        _ = cancel_token.cancelled() => Err(Error::Cancelled),
        result = future => result,
    }
}

/// Top of the operation chain: runs the mode procedure and converts its
/// outcome into state + events. Nothing may escape this function.
async fn run<S: PlaylistService>(inner: Arc<SorterInner<S>>, cancel_token: CancellationToken) {
    inner.set_state(SorterState::Running);
    inner.emit(SorterEvent::active(true));

    let result = match ensure_active(&cancel_token) {
        Err(err) => Err(err),
        Ok(()) => match inner.mode {
            SortMode::OneShot => run_one_shot(&inner, &cancel_token).await,
            SortMode::Continuous => run_continuous(&inner, &cancel_token).await,
        },
    };

    match result {
        Ok(()) => {
            inner.set_state(SorterState::Idle);
        }
        Err(err) if err.is_cancelled() => {
            debug!(playlist_id = %inner.playlist_id, "sort run cancelled");
            inner.emit(SorterEvent::status("stopped"));
            inner.set_state(SorterState::Stopped);
        }
        Err(err) => {
            warn!(playlist_id = %inner.playlist_id, error = %err, "sort run failed");
            inner.emit(SorterEvent::failed(&inner.playlist_id, &err));
            inner.set_state(SorterState::Failed);
        }
    }

    inner.emit(SorterEvent::active(false));
}

async fn run_one_shot<S: PlaylistService>(
    inner: &SorterInner<S>,
    cancel_token: &CancellationToken,
) -> Result<()> {
    let fetched = retrieve_playlist(inner, cancel_token).await?;

    inner.emit(SorterEvent::status("planning operations…"));
    let ops = plan_reorder_ops(&fetched.entries, 1, None);
    debug!(
        playlist_id = %inner.playlist_id,
        operations = ops.len(),
        "planned full sort"
    );

    apply_ops(inner, cancel_token, &fetched, &ops).await?;
    ensure_active(cancel_token)?;

    inner.emit(SorterEvent::status("done!"));
    inner.emit(SorterEvent::completed(&inner.playlist_id, ops.len()));
    Ok(())
}

async fn run_continuous<S: PlaylistService>(
    inner: &SorterInner<S>,
    cancel_token: &CancellationToken,
) -> Result<()> {
    let lookahead = inner.config.lookahead;
    let mut last_active = Instant::now();

    loop {
        ensure_active(cancel_token)?;

        let fetched = retrieve_playlist(inner, cancel_token).await?;
        inner.emit(SorterEvent::status("checking current playback position…"));
        let playing_at = position::resolve(
            &inner.service,
            &inner.playlist_id,
            cancel_token,
            &fetched.entries,
        )
        .await?;

        if let Some(playing_at) = playing_at {
            last_active = Instant::now();

            // Sort the next few songs only; the distant tail gets replanned
            // before playback ever reaches it
            inner.emit(SorterEvent::status("planning operations…"));
            let ops = plan_reorder_ops(&fetched.entries, playing_at + 1, Some(playing_at + lookahead));
            debug!(
                playlist_id = %inner.playlist_id,
                playing_at,
                operations = ops.len(),
                "planned lookahead window"
            );

            apply_ops(inner, cancel_token, &fetched, &ops).await?;
            ensure_active(cancel_token)?;

            inner.emit(SorterEvent::status(format!(
                "playing #{}, next {} songs in order, monitoring…",
                playing_at + 1,
                lookahead
            )));
        } else if last_active.elapsed() > inner.config.inactive_timeout {
            info!(
                playlist_id = %inner.playlist_id,
                "playlist inactive past timeout, ending continuous sort"
            );
            inner.emit(SorterEvent::status("playlist inactive for too long, stopping…"));
            return Ok(());
        } else {
            inner.emit(SorterEvent::status("waiting for playback to return to playlist…"));
        }

        sleep(inner.config.poll_interval, cancel_token).await?;
    }
}

/// Fetch the playlist's version token and all of its entries, following the
/// page cursor until exhausted.
async fn retrieve_playlist<S: PlaylistService>(
    inner: &SorterInner<S>,
    cancel_token: &CancellationToken,
) -> Result<FetchedPlaylist> {
    ensure_active(cancel_token)?;
    inner.emit(SorterEvent::status("fetching playlist items…"));

    // The items endpoint has no way to return the snapshot token, so fetch
    // it up front and hope the playlist does not change in the meantime;
    // the mutation endpoint rejects the token if it did
    let snapshot_id = with_cancel(
        cancel_token,
        inner.service.playlist_version(&inner.playlist_id),
    )
    .await?;

    let mut entries = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        ensure_active(cancel_token)?;
        let page = with_cancel(
            cancel_token,
            inner.service.entries_page(&inner.playlist_id, cursor.as_deref()),
        )
        .await?;

        entries.extend(page.items);
        cursor = page.next;
        if cursor.is_none() {
            break;
        }
    }

    Ok(FetchedPlaylist {
        snapshot_id,
        entries,
    })
}

/// Apply planned operations one at a time, pacing successive mutations and
/// threading the version token through each response.
async fn apply_ops<S: PlaylistService>(
    inner: &SorterInner<S>,
    cancel_token: &CancellationToken,
    fetched: &FetchedPlaylist,
    ops: &[ReorderOp],
) -> Result<()> {
    let total = ops.len();
    let mut snapshot_id = fetched.snapshot_id.clone();

    for (completed, op) in ops.iter().enumerate() {
        ensure_active(cancel_token)?;
        if op.from >= fetched.entries.len() {
            // The planner only produces in-range moves from the data it was
            // given; anything else is a sequencing bug, not a service issue
            return Err(Error::InvalidState(format!(
                "planned move {} of {} is out of range",
                op.from,
                fetched.entries.len()
            )));
        }

        if completed > 0 {
            sleep(inner.config.pacing, cancel_token).await?;
        }
        inner.emit(SorterEvent::status(format!(
            "reordering {} of {}…",
            completed + 1,
            total
        )));

        let new_snapshot = with_cancel(
            cancel_token,
            inner.service.reorder(&inner.playlist_id, op, &snapshot_id),
        )
        .await?;

        // Keep the previous token when the response omits one
        if let Some(new_snapshot) = new_snapshot {
            snapshot_id = new_snapshot;
        }
    }

    Ok(())
}
