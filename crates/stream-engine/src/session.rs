//! Stream session control.
//!
//! [`StreamController`] owns the overlay store, the overlay cache and the
//! output publisher, and runs at most one frame loop at a time:
//!
//! ```text
//!            start                pause
//! Stopped ──────────▶ Running ◀──────────▶ Paused
//!    ▲                  │      resume/start   │
//!    └──── stop / read failure ───────────────┘
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use overlaycast_common::clock::RefreshTimer;
use overlaycast_common::config::StreamDefaults;
use overlaycast_common::error::{OverlaycastError, OverlaycastResult};
use overlaycast_overlay_model::{Overlay, OverlayPatch, OverlaySpec, OverlayStore};
use overlaycast_render_engine::{composite, OverlayCache, OverlayRenderer};

use crate::publisher::{FrameStream, OutputPublisher};
use crate::source::{FrameSource, SourceOpener};
use crate::url::{redact_credentials, validate_rtsp_url};

/// Name of the frame loop thread.
pub const STREAM_THREAD_NAME: &str = "overlaycast-stream";

/// Runtime knobs for a [`StreamController`].
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// JPEG quality (1-100).
    pub jpeg_quality: u8,

    /// Sleep between pause-flag checks while paused.
    pub pause_poll: Duration,

    /// Periodic overlay cache rebuild interval (never below one second).
    pub overlay_refresh: Duration,
}

impl StreamConfig {
    pub fn from_defaults(defaults: &StreamDefaults) -> Self {
        Self {
            jpeg_quality: defaults.jpeg_quality,
            pause_poll: Duration::from_millis(defaults.pause_poll_ms.max(1)),
            overlay_refresh: Duration::from_millis(defaults.overlay_refresh_ms),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::from_defaults(&StreamDefaults::default())
    }
}

/// Lifecycle state of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl StreamState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful [`StreamController::start`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A source was opened and a new frame loop spawned.
    Started,
    /// A paused session was resumed; nothing was reopened.
    Resumed,
}

/// Counters for the current (or most recent) session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub frames_published: u64,
    /// Frames dropped because JPEG encoding failed.
    pub frames_dropped: u64,
    pub cache_rebuilds: u64,
}

/// Flags and counters shared by the controller and one frame loop.
#[derive(Debug)]
struct SessionSignals {
    publish_session: u64,
    stop: AtomicBool,
    paused: AtomicBool,
    frames_published: AtomicU64,
    frames_dropped: AtomicU64,
    cache_rebuilds: AtomicU64,
}

impl SessionSignals {
    fn new(publish_session: u64) -> Self {
        Self {
            publish_session,
            stop: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            frames_published: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            cache_rebuilds: AtomicU64::new(0),
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn stats(&self) -> StreamStats {
        StreamStats {
            frames_published: self.frames_published.load(Ordering::SeqCst),
            frames_dropped: self.frames_dropped.load(Ordering::SeqCst),
            cache_rebuilds: self.cache_rebuilds.load(Ordering::SeqCst),
        }
    }
}

#[derive(Default)]
struct StreamSession {
    state: StreamState,
    url: Option<String>,
    /// Signals of the current session, or of the last one once stopped.
    signals: Option<Arc<SessionSignals>>,
    worker: Option<JoinHandle<()>>,
    /// Ticket of a `start` that is opening its source outside the lock.
    opening: Option<u64>,
    start_attempts: u64,
}

impl StreamSession {
    fn is_current(&self, signals: &Arc<SessionSignals>) -> bool {
        self.signals
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, signals))
    }
}

struct Shared {
    store: Arc<OverlayStore>,
    cache: OverlayCache,
    renderer: OverlayRenderer,
    publisher: OutputPublisher,
    opener: Box<dyn SourceOpener>,
    config: StreamConfig,
    session: Mutex<StreamSession>,
}

impl Shared {
    // Every transition writes state, url, and signals together, so a
    // poisoned lock still holds a consistent session.
    fn lock_session(&self) -> MutexGuard<'_, StreamSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Called by a frame loop whose source failed.
    fn end_failed_session(&self, signals: &Arc<SessionSignals>) {
        self.publisher.end_session(signals.publish_session);
        let mut session = self.lock_session();
        if session.is_current(signals) && session.state != StreamState::Stopped {
            session.state = StreamState::Stopped;
            session.url = None;
            // This is our own handle; dropping it detaches the exiting thread.
            session.worker = None;
        }
    }
}

/// Drives one stream session at a time and exposes overlay management.
///
/// Cloning is cheap; clones control the same session.
#[derive(Clone)]
pub struct StreamController {
    shared: Arc<Shared>,
}

impl StreamController {
    pub fn new(
        opener: impl SourceOpener + 'static,
        renderer: OverlayRenderer,
        config: StreamConfig,
    ) -> Self {
        Self::with_store(Arc::new(OverlayStore::new()), opener, renderer, config)
    }

    /// Like [`StreamController::new`] but sharing an existing store.
    pub fn with_store(
        store: Arc<OverlayStore>,
        opener: impl SourceOpener + 'static,
        renderer: OverlayRenderer,
        config: StreamConfig,
    ) -> Self {
        let publisher = OutputPublisher::new(config.jpeg_quality);
        Self {
            shared: Arc::new(Shared {
                store,
                cache: OverlayCache::new(),
                renderer,
                publisher,
                opener: Box::new(opener),
                config,
                session: Mutex::new(StreamSession::default()),
            }),
        }
    }

    /// Begin streaming from `url`, or resume a paused session.
    ///
    /// The source is opened without holding the session lock, so state
    /// queries stay responsive. While an open is in flight the state reads
    /// Stopped, other starts fail with `AlreadyRunning`, and a `stop()`
    /// cancels it: the opened source is closed and this call returns
    /// `NotRunning`.
    pub fn start(&self, url: &str) -> OverlaycastResult<StartOutcome> {
        validate_rtsp_url(url)?;

        let ticket = {
            let mut session = self.shared.lock_session();
            match session.state {
                StreamState::Running => return Err(OverlaycastError::AlreadyRunning),
                StreamState::Paused => {
                    if session.url.as_deref() != Some(url) {
                        tracing::warn!(
                            requested = %redact_credentials(url),
                            active = %session.url.as_deref().map(redact_credentials).unwrap_or_default(),
                            "Start while paused on another URL; resuming the open source"
                        );
                    }
                    if let Some(signals) = &session.signals {
                        signals.paused.store(false, Ordering::SeqCst);
                    }
                    session.state = StreamState::Running;
                    tracing::info!("Stream resumed");
                    return Ok(StartOutcome::Resumed);
                }
                StreamState::Stopped => {}
            }
            if session.opening.is_some() {
                return Err(OverlaycastError::AlreadyRunning);
            }
            if let Some(worker) = session.worker.take() {
                reap_worker(worker);
            }
            session.start_attempts += 1;
            session.opening = Some(session.start_attempts);
            session.start_attempts
        };

        let label = redact_credentials(url);
        tracing::info!(url = %label, "Starting stream");
        let opened = self.shared.opener.open(url);

        let mut session = self.shared.lock_session();
        if session.opening != Some(ticket) {
            drop(session);
            if let Ok(mut source) = opened {
                source.close();
            }
            tracing::info!(url = %label, "Start cancelled by stop while opening the source");
            return Err(OverlaycastError::NotRunning);
        }
        session.opening = None;
        let source = opened.map_err(|e| {
            tracing::error!(url = %label, error = %e, "Failed to open stream source");
            e
        })?;

        let publish_session = self.shared.publisher.begin_session();
        let signals = Arc::new(SessionSignals::new(publish_session));
        self.shared.cache.request_refresh();

        let worker = thread::Builder::new()
            .name(STREAM_THREAD_NAME.to_string())
            .spawn({
                let shared = Arc::clone(&self.shared);
                let signals = Arc::clone(&signals);
                move || run_frame_loop(shared, signals, source)
            })
            .map_err(|e| {
                self.shared.publisher.end_session(publish_session);
                e
            })?;

        session.state = StreamState::Running;
        session.url = Some(url.to_string());
        session.signals = Some(signals);
        session.worker = Some(worker);
        tracing::info!(url = %label, "Stream started");
        Ok(StartOutcome::Started)
    }

    /// Stop producing frames but keep the source open.
    pub fn pause(&self) -> OverlaycastResult<()> {
        let mut session = self.shared.lock_session();
        match session.state {
            StreamState::Stopped => Err(OverlaycastError::NotRunning),
            StreamState::Paused => Ok(()),
            StreamState::Running => {
                if let Some(signals) = &session.signals {
                    signals.paused.store(true, Ordering::SeqCst);
                }
                session.state = StreamState::Paused;
                tracing::info!("Stream paused");
                Ok(())
            }
        }
    }

    pub fn resume(&self) -> OverlaycastResult<()> {
        let mut session = self.shared.lock_session();
        match session.state {
            StreamState::Stopped => Err(OverlaycastError::NotRunning),
            StreamState::Running => Ok(()),
            StreamState::Paused => {
                if let Some(signals) = &session.signals {
                    signals.paused.store(false, Ordering::SeqCst);
                }
                session.state = StreamState::Running;
                tracing::info!("Stream resumed");
                Ok(())
            }
        }
    }

    /// Tear down the session. Always succeeds.
    ///
    /// Does not wait for a read in flight; the loop notices the stop flag
    /// when that read returns, publishes nothing more, and closes the source.
    pub fn stop(&self) {
        let mut session = self.shared.lock_session();
        let was = session.state;
        if let Some(signals) = &session.signals {
            signals.stop.store(true, Ordering::SeqCst);
            signals.paused.store(false, Ordering::SeqCst);
            self.shared.publisher.end_session(signals.publish_session);
        }
        session.state = StreamState::Stopped;
        session.url = None;
        session.opening = None;
        let worker = session.worker.take();
        drop(session);

        if let Some(worker) = worker {
            reap_worker(worker);
        }
        if was != StreamState::Stopped {
            tracing::info!(previous = %was, "Stream stopped");
        }
    }

    pub fn state(&self) -> StreamState {
        self.shared.lock_session().state
    }

    /// The active URL while Running or Paused.
    pub fn url(&self) -> Option<String> {
        self.shared.lock_session().url.clone()
    }

    /// Most recent encoded JPEG, if the session has produced one.
    pub fn latest_frame(&self) -> Option<Bytes> {
        self.shared.publisher.latest()
    }

    pub fn stats(&self) -> StreamStats {
        self.shared
            .lock_session()
            .signals
            .as_ref()
            .map(|signals| signals.stats())
            .unwrap_or_default()
    }

    /// A reader of the multipart output.
    pub fn stream_frames(&self) -> FrameStream {
        self.shared.publisher.subscribe()
    }

    pub fn store(&self) -> &Arc<OverlayStore> {
        &self.shared.store
    }

    pub fn cache(&self) -> &OverlayCache {
        &self.shared.cache
    }

    pub fn create_overlay(&self, spec: &OverlaySpec) -> OverlaycastResult<Overlay> {
        let overlay = self.shared.store.create(spec)?;
        self.shared.cache.request_refresh();
        tracing::info!(overlay_id = %overlay.id(), kind = %overlay.kind(), "Overlay added");
        Ok(overlay)
    }

    /// All overlays in creation order.
    pub fn list_overlays(&self) -> Vec<Overlay> {
        self.shared.store.snapshot()
    }

    pub fn get_overlay(&self, id: &str) -> OverlaycastResult<Overlay> {
        self.shared
            .store
            .get(id)
            .ok_or_else(|| OverlaycastError::not_found(id))
    }

    pub fn update_overlay(&self, id: &str, patch: &OverlayPatch) -> OverlaycastResult<Overlay> {
        let overlay = self.shared.store.update(id, patch)?;
        self.shared.cache.request_refresh();
        tracing::info!(overlay_id = %id, "Overlay updated");
        Ok(overlay)
    }

    pub fn delete_overlay(&self, id: &str) -> OverlaycastResult<()> {
        self.shared.store.delete(id)?;
        self.shared.cache.evict(id);
        self.shared.cache.request_refresh();
        tracing::info!(overlay_id = %id, "Overlay removed");
        Ok(())
    }
}

impl fmt::Debug for StreamController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamController")
            .field("state", &self.state())
            .field("overlays", &self.shared.store.len())
            .finish_non_exhaustive()
    }
}

fn reap_worker(worker: JoinHandle<()>) {
    if !worker.is_finished() {
        tracing::debug!("Frame loop is finishing an in-flight read; detaching");
        return;
    }
    if worker.join().is_err() {
        tracing::error!("Frame loop thread panicked");
    }
}

fn run_frame_loop(
    shared: Arc<Shared>,
    signals: Arc<SessionSignals>,
    mut source: Box<dyn FrameSource>,
) {
    let label = source.describe();
    let mut refresh = RefreshTimer::new(shared.config.overlay_refresh);
    tracing::info!(
        source = %label,
        refresh_ms = refresh.interval().as_millis() as u64,
        "Frame loop started"
    );

    loop {
        if signals.stop_requested() {
            break;
        }
        if signals.is_paused() {
            thread::sleep(shared.config.pause_poll);
            continue;
        }

        let mut frame = match source.read() {
            Ok(frame) => frame,
            Err(e) => {
                if !signals.stop_requested() {
                    match e {
                        OverlaycastError::EndOfStream => {
                            tracing::info!(source = %label, "Source reached end of stream")
                        }
                        _ => tracing::error!(source = %label, error = %e, "Frame read failed"),
                    }
                    shared.end_failed_session(&signals);
                }
                break;
            }
        };
        if signals.stop_requested() {
            break;
        }
        if signals.is_paused() {
            continue;
        }

        let now = Instant::now();
        let due = refresh.should_fire_at(now);
        if shared.cache.take_refresh_request() || due {
            refresh.mark_fired(now);
            shared.cache.rebuild(&shared.store, &shared.renderer);
            signals.cache_rebuilds.fetch_add(1, Ordering::SeqCst);
        }

        let entries = shared.cache.snapshot();
        composite(&mut frame, &entries, &shared.store);

        match shared.publisher.encode(&frame) {
            Ok(jpeg) => {
                if !shared.publisher.publish(signals.publish_session, jpeg) {
                    break;
                }
                let published = signals.frames_published.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::trace!(published, "Frame published");
            }
            Err(e) => {
                signals.frames_dropped.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(error = %e, "Dropping frame that failed to encode");
            }
        }
    }

    source.close();
    let stats = signals.stats();
    tracing::info!(
        source = %label,
        frames_published = stats.frames_published,
        frames_dropped = stats.frames_dropped,
        cache_rebuilds = stats.cache_rebuilds,
        "Frame loop exited"
    );
}
