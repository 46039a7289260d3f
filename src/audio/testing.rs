//! In-memory collaborators for session, player and idle tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{GuildId, UserId};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Notify;

use super::{
    session::{PlaybackSettings, SessionDeps, SessionSnapshot},
    signal::CompletionHandle,
    sink::AudioSink,
    track::{PlaylistEntry, StreamRef, Track},
};
use crate::{
    error::SinkError,
    sources::{MockTrackResolver, ResolveError, RetryPolicy, TrackResolver},
    ui::PanelRenderer,
};

pub(crate) fn settings() -> PlaybackSettings {
    PlaybackSettings {
        idle_timeout: Duration::from_secs(30),
        idle_poll_interval: Duration::from_secs(1),
        queue_poll_interval: Duration::from_millis(10),
        max_queue_size: 1000,
        max_playlist_size: 100,
        retry: RetryPolicy {
            max_attempts: 2,
            backoff_step: Duration::from_millis(10),
            backoff_cap: Duration::from_millis(20),
        },
    }
}

pub(crate) fn deps(resolver: MockTrackResolver) -> SessionDeps {
    SessionDeps {
        resolver: Arc::new(resolver),
        panel: Arc::new(RecordingPanel::default()),
        settings: settings(),
    }
}

/// Track ya resuelto, listo para el sink
pub(crate) fn track(title: &str) -> Track {
    Track::new(
        title.to_string(),
        format!("https://www.youtube.com/watch?v={}", title),
        UserId::new(1),
    )
    .with_stream(StreamRef::new(format!("https://cdn.example/{}", title)))
}

/// Track de playlist, sin stream
pub(crate) fn lazy_track(title: &str) -> Track {
    Track::unresolved(
        PlaylistEntry {
            title: title.to_string(),
            url: format!("https://www.youtube.com/watch?v={}", title),
        },
        UserId::new(1),
    )
}

/// Espera (en tiempo de tokio) hasta que se cumpla la condición
pub(crate) async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timeout esperando: {}", what);
}

/// Audio Sink en memoria. Los tracks "suenan" hasta que el test llama a
/// [`FakeSink::finish_current`] o alguien los detiene.
pub(crate) struct FakeSink {
    connected: AtomicBool,
    paused: AtomicBool,
    reject_play: AtomicBool,
    ends_before_stop: AtomicBool,
    disconnect_gate: Mutex<Option<Arc<Notify>>>,
    current: Mutex<Option<(Track, CompletionHandle)>>,
    played: Mutex<Vec<String>>,
}

impl FakeSink {
    pub(crate) fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            reject_play: AtomicBool::new(false),
            ends_before_stop: AtomicBool::new(false),
            disconnect_gate: Mutex::new(None),
            current: Mutex::new(None),
            played: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn played(&self) -> Vec<String> {
        self.played.lock().clone()
    }

    pub(crate) fn current_title(&self) -> Option<String> {
        self.current.lock().as_ref().map(|(t, _)| t.title().to_string())
    }

    /// Termina naturalmente el track actual
    pub(crate) fn finish_current(&self) -> bool {
        let active = self.current.lock().take();
        match active {
            Some((_, completion)) => {
                completion.complete(None);
                true
            }
            None => false,
        }
    }

    pub(crate) fn reject_plays(&self, reject: bool) {
        self.reject_play.store(reject, Ordering::SeqCst);
    }

    /// El track en curso termina solo justo antes de que llegue un skip
    pub(crate) fn end_before_stop(&self, ends: bool) {
        self.ends_before_stop.store(ends, Ordering::SeqCst);
    }

    /// `disconnect` queda colgado hasta que el test notifique la compuerta
    pub(crate) fn gate_disconnect(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.disconnect_gate.lock() = Some(gate.clone());
        gate
    }

    /// Simula que Discord cerró la conexión de voz
    pub(crate) fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl AudioSink for FakeSink {
    async fn play(&self, track: &Track, on_complete: CompletionHandle) -> Result<(), SinkError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SinkError::NotConnected);
        }
        if self.reject_play.load(Ordering::SeqCst) {
            return Err(SinkError::Driver("rechazado".into()));
        }
        if !track.is_resolved() {
            return Err(SinkError::Unresolved(track.title().to_string()));
        }

        self.played.lock().push(track.title().to_string());
        self.paused.store(false, Ordering::SeqCst);
        *self.current.lock() = Some((track.clone(), on_complete));
        Ok(())
    }

    async fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    async fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    async fn stop(&self) {
        let active = self.current.lock().take();
        self.paused.store(false, Ordering::SeqCst);
        if let Some((_, completion)) = active {
            completion.complete(Some(SinkError::Stopped));
        }
    }

    async fn stop_track(&self, epoch: u64) -> bool {
        if self.ends_before_stop.load(Ordering::SeqCst) {
            self.finish_current();
        }
        let active = {
            let mut current = self.current.lock();
            if !current.as_ref().is_some_and(|(_, completion)| completion.epoch() == epoch) {
                return false;
            }
            current.take()
        };
        self.paused.store(false, Ordering::SeqCst);
        match active {
            Some((_, completion)) => {
                completion.complete(Some(SinkError::Stopped));
                true
            }
            None => false,
        }
    }

    async fn is_playing(&self) -> bool {
        self.current.lock().is_some() && !self.paused.load(Ordering::SeqCst)
    }

    async fn is_paused(&self) -> bool {
        self.current.lock().is_some() && self.paused.load(Ordering::SeqCst)
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.stop().await;
        let gate = self.disconnect_gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Panel que solo cuenta las llamadas
#[derive(Default)]
pub(crate) struct RecordingPanel {
    renders: AtomicUsize,
    clears: AtomicUsize,
    last: Mutex<Option<SessionSnapshot>>,
}

impl RecordingPanel {
    pub(crate) fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub(crate) fn cleared(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub(crate) fn last(&self) -> Option<SessionSnapshot> {
        self.last.lock().clone()
    }
}

#[async_trait]
impl PanelRenderer for RecordingPanel {
    async fn render(&self, snapshot: SessionSnapshot) -> anyhow::Result<()> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some(snapshot);
        Ok(())
    }

    async fn clear(&self, _guild_id: GuildId) -> anyhow::Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Resolver cuya playlist no responde hasta que el test abre la compuerta
pub(crate) struct GatedResolver {
    entries: Vec<PlaylistEntry>,
    gate: Arc<Notify>,
}

impl GatedResolver {
    pub(crate) fn new(entries: Vec<PlaylistEntry>) -> Self {
        Self {
            entries,
            gate: Arc::new(Notify::new()),
        }
    }

    pub(crate) fn gate(&self) -> Arc<Notify> {
        self.gate.clone()
    }
}

#[async_trait]
impl TrackResolver for GatedResolver {
    async fn resolve(&self, query: &str, _requested_by: UserId) -> Result<Track, ResolveError> {
        Err(ResolveError::NotFound(query.to_string()))
    }

    async fn resolve_playlist(
        &self,
        _url: &str,
        limit: usize,
    ) -> Result<Vec<PlaylistEntry>, ResolveError> {
        self.gate.notified().await;
        Ok(self.entries.iter().take(limit).cloned().collect())
    }

    fn is_playlist(&self, _query: &str) -> bool {
        true
    }
}
