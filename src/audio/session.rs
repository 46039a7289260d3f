//! Per-guild playback session.
//!
//! A [`Session`] owns the queue, the playback flags and the handles of its
//! background workers (player loop, idle watcher and bulk import). Every field
//! lives behind a single lock; workers and command handlers only observe or
//! mutate state while holding it, and never across an `.await`.

use parking_lot::{Mutex, MutexGuard};
use serenity::model::id::{GuildId, UserId};
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    idle,
    ingest::{self, ImportTicket, IngestionGuard},
    player,
    queue::{PlaybackQueue, QueueListing},
    repeat::{self, RepeatMode},
    signal::CompletionSignal,
    sink::AudioSink,
    track::Track,
};
use crate::{
    error::{Result, SessionError},
    sources::{RetryPolicy, TrackResolver},
    ui::PanelRenderer,
};

/// Parámetros de reproducción compartidos por todas las sesiones
#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    pub idle_timeout: Duration,
    pub idle_poll_interval: Duration,
    pub queue_poll_interval: Duration,
    pub max_queue_size: usize,
    pub max_playlist_size: usize,
    pub retry: RetryPolicy,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            idle_poll_interval: Duration::from_secs(2),
            queue_poll_interval: Duration::from_millis(500),
            max_queue_size: 1000,
            max_playlist_size: 100,
            retry: RetryPolicy::default(),
        }
    }
}

/// Colaboradores externos de una sesión
#[derive(Clone)]
pub struct SessionDeps {
    pub resolver: Arc<dyn TrackResolver>,
    pub panel: Arc<dyn PanelRenderer>,
    pub settings: PlaybackSettings,
}

/// Dónde insertar un track nuevo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueuePosition {
    Back,
    /// Prioridad: suena a continuación
    Front,
}

/// Quién provoca el teardown; ese worker no se cancela a sí mismo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOrigin {
    Command,
    IdleWatcher,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Disconnected,
    Playing,
    Paused,
    Idle,
}

/// Copia del estado de la sesión para el panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub guild_id: GuildId,
    pub status: PlaybackStatus,
    pub now_playing: Option<Track>,
    pub next: Option<Track>,
    pub queue_len: usize,
    pub repeat_mode: RepeatMode,
    pub busy: bool,
}

pub(crate) struct Worker {
    pub(crate) token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Worker {
    pub(crate) fn new(token: CancellationToken, handle: JoinHandle<()>) -> Self {
        Self { token, handle }
    }

    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

pub(crate) struct SessionState {
    pub(crate) queue: PlaybackQueue,
    pub(crate) now_playing: Option<Track>,
    pub(crate) repeat_mode: RepeatMode,
    pub(crate) skip_requested: bool,
    pub(crate) busy: bool,
    pub(crate) last_activity: Instant,
    pub(crate) sink: Option<Arc<dyn AudioSink>>,
    player: Option<Worker>,
    idle: Option<Worker>,
    pub(crate) import: Option<Worker>,
    pub(crate) import_generation: u64,
}

impl SessionState {
    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

pub struct Session {
    guild_id: GuildId,
    state: Mutex<SessionState>,
    // serializa conectar contra stop + disconnect del teardown
    voice: tokio::sync::Mutex<()>,
    completion: Arc<CompletionSignal>,
    deps: SessionDeps,
}

impl Session {
    pub fn new(guild_id: GuildId, deps: SessionDeps) -> Self {
        Self {
            guild_id,
            state: Mutex::new(SessionState {
                queue: PlaybackQueue::new(deps.settings.max_queue_size),
                now_playing: None,
                repeat_mode: RepeatMode::Off,
                skip_requested: false,
                busy: false,
                last_activity: Instant::now(),
                sink: None,
                player: None,
                idle: None,
                import: None,
                import_generation: 0,
            }),
            voice: tokio::sync::Mutex::new(()),
            completion: Arc::new(CompletionSignal::new()),
            deps,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock()
    }

    pub(crate) fn deps(&self) -> &SessionDeps {
        &self.deps
    }

    pub(crate) fn settings(&self) -> &PlaybackSettings {
        &self.deps.settings
    }

    pub(crate) fn completion(&self) -> &Arc<CompletionSignal> {
        &self.completion
    }

    // Conexión de voz

    /// Asocia la conexión de voz abierta por el command handler
    pub fn attach_sink(&self, sink: Arc<dyn AudioSink>) {
        self.lock().sink = Some(sink);
        debug!("🔊 Audio sink asociado en guild {}", self.guild_id);
    }

    /// Exclusión frente al teardown para abrir o reutilizar la conexión de voz.
    ///
    /// Un teardown en curso la retiene hasta terminar de desconectar, así que
    /// quien la obtiene ve la llamada ya cerrada o una sesión intacta.
    pub async fn voice_lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.voice.lock().await
    }

    pub fn sink(&self) -> Option<Arc<dyn AudioSink>> {
        self.lock().sink.clone()
    }

    // Lecturas

    pub fn now_playing(&self) -> Option<Track> {
        self.lock().now_playing.clone()
    }

    pub fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn queued_titles(&self) -> Vec<String> {
        self.lock().queue.iter().map(|t| t.title().to_string()).collect()
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.lock().repeat_mode
    }

    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    pub fn skip_requested(&self) -> bool {
        self.lock().skip_requested
    }

    pub fn last_activity(&self) -> Instant {
        self.lock().last_activity
    }

    /// Registra actividad del usuario (reinicia el reloj de inactividad)
    pub fn touch(&self) {
        self.lock().touch();
    }

    // Comandos

    /// Aplica una mutación de comando: registra actividad y rechaza si hay
    /// una importación en curso.
    fn mutate<T>(&self, f: impl FnOnce(&mut SessionState) -> Result<T>) -> Result<T> {
        let mut state = self.lock();
        state.touch();
        if state.busy {
            return Err(SessionError::SessionBusy);
        }
        f(&mut state)
    }

    /// Encola un track; devuelve su posición 1-based en la cola
    pub fn enqueue(self: &Arc<Self>, track: Track, position: EnqueuePosition) -> Result<usize> {
        let pos = self.mutate(|state| match position {
            EnqueuePosition::Back => state.queue.enqueue_back(track),
            EnqueuePosition::Front => state.queue.enqueue_front(track).map(|_| 1),
        })?;
        self.render();
        Ok(pos)
    }

    /// Elimina de la cola por índice 1-based
    pub fn remove_at(self: &Arc<Self>, index: usize) -> Result<Track> {
        let removed = self.mutate(|state| state.queue.remove_at(index))?;
        info!("✅ Eliminado de la cola en guild {}: {}", self.guild_id, removed.title());
        self.render();
        Ok(removed)
    }

    pub fn shuffle(self: &Arc<Self>) -> Result<()> {
        self.mutate(|state| {
            if state.queue.len() < 2 {
                return Err(SessionError::NotEnoughToShuffle);
            }
            state.queue.shuffle();
            Ok(())
        })?;
        self.render();
        Ok(())
    }

    pub fn cycle_repeat(self: &Arc<Self>) -> Result<RepeatMode> {
        let mode = self.mutate(|state| {
            state.repeat_mode = state.repeat_mode.next();
            Ok(state.repeat_mode)
        })?;
        info!("{} en guild {}", mode.label(), self.guild_id);
        self.render();
        Ok(mode)
    }

    /// Salta el track actual: marca el skip y detiene el sink.
    ///
    /// El skip queda atado a la iteración del player loop en la que se pidió;
    /// si ese track ya terminó solo, no se detiene el siguiente y la marca no
    /// se filtra a su fin natural.
    pub async fn skip(self: &Arc<Self>) -> Result<()> {
        let (sink, epoch) = self.mutate(|state| {
            let sink = state.sink.clone().ok_or(SessionError::NothingPlaying)?;
            if state.now_playing.is_none() {
                return Err(SessionError::NothingPlaying);
            }
            state.skip_requested = true;
            Ok((sink, self.completion.epoch()))
        })?;

        if !sink.stop_track(epoch).await {
            let mut state = self.lock();
            // si el loop ya avanzó, finish_track consumió la marca
            if self.completion.epoch() == epoch {
                state.skip_requested = false;
            }
            return Err(SessionError::NothingPlaying);
        }

        info!("⏭️ Skip en guild {}", self.guild_id);
        self.render();
        Ok(())
    }

    pub async fn pause(self: &Arc<Self>) -> Result<()> {
        let sink = self.mutate(|state| state.sink.clone().ok_or(SessionError::BotNotInVoice))?;
        if sink.is_playing().await {
            sink.pause().await;
        }
        self.render();
        Ok(())
    }

    pub async fn resume(self: &Arc<Self>) -> Result<()> {
        let sink = self.mutate(|state| state.sink.clone().ok_or(SessionError::BotNotInVoice))?;
        if sink.is_paused().await {
            sink.resume().await;
        }
        self.render();
        Ok(())
    }

    /// Primeros `n` tracks en espera; permitido aunque haya importación en curso
    pub fn list(&self, n: usize) -> QueueListing {
        let mut state = self.lock();
        state.touch();
        state.queue.list_first(n)
    }

    /// Inicia la importación de una playlist en segundo plano
    pub fn start_import(self: &Arc<Self>, url: String, requested_by: UserId) -> Result<ImportTicket> {
        let ticket = {
            let mut state = self.lock();
            state.touch();
            let guard = IngestionGuard::acquire(self, &mut state)?;
            ingest::spawn(self.clone(), &mut state, guard, url, requested_by)
        };
        self.render();
        Ok(ticket)
    }

    // Workers

    /// Arranca el player loop y el idle watcher si no están corriendo
    pub fn ensure_workers(self: &Arc<Self>) {
        let mut state = self.lock();

        if !state.player.as_ref().is_some_and(Worker::is_running) {
            let token = CancellationToken::new();
            let handle = tokio::spawn(player::run(self.clone(), token.clone()));
            state.player = Some(Worker::new(token, handle));
            debug!("▶️ Player loop lanzado en guild {}", self.guild_id);
        }

        if !state.idle.as_ref().is_some_and(Worker::is_running) {
            let token = CancellationToken::new();
            let handle = tokio::spawn(idle::run(self.clone(), token.clone()));
            state.idle = Some(Worker::new(token, handle));
            debug!("⏱️ Idle watcher lanzado en guild {}", self.guild_id);
        }
    }

    // Transiciones del player loop

    /// Saca el siguiente track y lo marca como actual
    pub(crate) fn begin_next(&self, token: &CancellationToken) -> Option<Track> {
        let mut state = self.lock();
        if token.is_cancelled() {
            return None;
        }
        let track = state.queue.pop_first()?;
        state.now_playing = Some(track.clone());
        Some(track)
    }

    /// Reemplaza el track actual por su versión resuelta
    pub(crate) fn replace_now_playing(&self, resolved: &Track, token: &CancellationToken) {
        let mut state = self.lock();
        if token.is_cancelled() {
            return;
        }
        if state.now_playing.is_some() {
            state.now_playing = Some(resolved.clone());
        }
    }

    /// El track no se pudo reproducir (resolución fallida) y se descarta
    pub(crate) fn drop_current(&self) {
        let mut state = self.lock();
        state.now_playing = None;
        if state.queue.is_empty() {
            state.touch();
        }
    }

    /// La conexión se perdió antes de reproducir: el track vuelve al frente
    pub(crate) fn restore_unplayed(&self, track: Track, token: &CancellationToken) {
        let mut state = self.lock();
        if token.is_cancelled() {
            return;
        }
        state.now_playing = None;
        state.queue.reinsert_front(track);
    }

    /// Aplica la política de repetición al terminar un track.
    ///
    /// Devuelve `false` si el loop fue cancelado (teardown en curso).
    pub(crate) fn finish_track(&self, track: Track, token: &CancellationToken) -> bool {
        let mut state = self.lock();
        if token.is_cancelled() {
            return false;
        }

        let was_skipped = std::mem::take(&mut state.skip_requested);
        let directive = repeat::decide(state.repeat_mode, was_skipped);
        debug!(
            "Track terminado en guild {} (modo {:?}, skip={}): {:?}",
            self.guild_id, state.repeat_mode, was_skipped, directive
        );

        state.now_playing = None;
        directive.apply(&mut state.queue, track);

        if state.queue.is_empty() {
            // aquí empieza a contar el tiempo de inactividad
            state.touch();
            info!("📭 Cola terminada en guild {}", self.guild_id);
        }
        true
    }

    // Teardown

    /// Cierra la sesión: cancela importación y workers, vacía la cola y
    /// desconecta. La entrada queda en el registro para reutilizarse.
    pub async fn teardown(&self, origin: TeardownOrigin) {
        self.teardown_inner(origin, None).await;
    }

    /// Teardown por inactividad; se aborta si la sesión volvió a tener
    /// contenido o actividad desde el último chequeo.
    pub(crate) async fn teardown_if_idle(&self, timeout: Duration) -> bool {
        self.teardown_inner(TeardownOrigin::IdleWatcher, Some(timeout)).await
    }

    async fn teardown_inner(&self, origin: TeardownOrigin, idle_timeout: Option<Duration>) -> bool {
        let _voice = self.voice.lock().await;
        let sink = {
            let mut state = self.lock();

            if let Some(timeout) = idle_timeout {
                let still_idle = state.queue.is_empty()
                    && state.now_playing.is_none()
                    && !state.busy
                    && state.last_activity.elapsed() >= timeout;
                if !still_idle {
                    debug!("Teardown por inactividad abortado en guild {}", self.guild_id);
                    return false;
                }
            }

            // lo primero: la importación en curso, sin esperar a que lo note
            if let Some(import) = state.import.take() {
                import.token.cancel();
                info!("🛑 Importación cancelada en guild {}", self.guild_id);
            }
            state.busy = false;
            state.import_generation += 1;

            let player = state.player.take();
            let idle = state.idle.take();
            if let Some(player) = player {
                player.token.cancel();
            }
            if let Some(idle) = idle {
                if origin != TeardownOrigin::IdleWatcher {
                    idle.token.cancel();
                }
            }

            state.queue.clear();
            state.now_playing = None;
            state.skip_requested = false;
            state.sink.take()
        };

        // detener antes de desconectar
        if let Some(sink) = sink {
            sink.stop().await;
            sink.disconnect().await;
        }

        if let Err(e) = self.deps.panel.clear(self.guild_id).await {
            warn!("No se pudo borrar el panel en guild {}: {:?}", self.guild_id, e);
        }

        info!("👋 Sesión cerrada en guild {} ({:?})", self.guild_id, origin);
        true
    }

    // Panel

    pub async fn snapshot(&self) -> SessionSnapshot {
        let (sink, now_playing, next, queue_len, repeat_mode, busy) = {
            let state = self.lock();
            (
                state.sink.clone(),
                state.now_playing.clone(),
                state.queue.peek_first().cloned(),
                state.queue.len(),
                state.repeat_mode,
                state.busy,
            )
        };

        let status = match sink {
            None => PlaybackStatus::Disconnected,
            Some(sink) => {
                if !sink.is_connected().await {
                    PlaybackStatus::Disconnected
                } else if sink.is_paused().await {
                    PlaybackStatus::Paused
                } else if sink.is_playing().await {
                    PlaybackStatus::Playing
                } else {
                    PlaybackStatus::Idle
                }
            }
        };

        SessionSnapshot {
            guild_id: self.guild_id,
            status,
            now_playing,
            next,
            queue_len,
            repeat_mode,
            busy,
        }
    }

    /// Refresca el panel en segundo plano; los errores se descartan
    pub(crate) fn render(self: &Arc<Self>) {
        let session = self.clone();
        tokio::spawn(async move {
            let snapshot = session.snapshot().await;
            if let Err(e) = session.deps.panel.render(snapshot).await {
                warn!("No se pudo actualizar el panel en guild {}: {:?}", session.guild_id, e);
            }
        });
    }
}
