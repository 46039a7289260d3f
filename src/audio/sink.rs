use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serenity::model::id::GuildId;
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{signal::CompletionHandle, track::Track};
use crate::error::SinkError;

/// Destino de audio de una sesión (la conexión de voz).
///
/// `stop()` debe disparar el callback de fin del track actual antes de
/// retornar, para que el player loop nunca quede esperando. `stop()` y
/// `disconnect()` son no-ops si no hay nada que detener.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, track: &Track, on_complete: CompletionHandle) -> Result<(), SinkError>;
    async fn pause(&self);
    async fn resume(&self);
    async fn stop(&self);
    /// Como `stop()`, pero solo si el track en curso pertenece a la iteración
    /// `epoch` del player loop. Devuelve `true` si detuvo algo.
    async fn stop_track(&self, epoch: u64) -> bool;
    async fn is_playing(&self) -> bool;
    async fn is_paused(&self) -> bool;
    async fn is_connected(&self) -> bool;
    async fn disconnect(&self);
}

struct ActiveTrack {
    handle: TrackHandle,
    completion: CompletionHandle,
}

type ActiveSlot = Arc<SyncMutex<Option<ActiveTrack>>>;

/// Audio Sink sobre una llamada de songbird
pub struct SongbirdSink {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<Mutex<Call>>,
    http: reqwest::Client,
    current: ActiveSlot,
}

impl SongbirdSink {
    pub fn new(
        guild_id: GuildId,
        manager: Arc<Songbird>,
        call: Arc<Mutex<Call>>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            guild_id,
            manager,
            call,
            http,
            current: Arc::new(SyncMutex::new(None)),
        }
    }

    fn current_handle(&self) -> Option<TrackHandle> {
        self.current.lock().as_ref().map(|active| active.handle.clone())
    }

    fn halt(&self, active: ActiveTrack) {
        let _ = active.handle.stop();
        active.completion.complete(Some(SinkError::Stopped));
        info!("⏹️ Reproducción detenida en guild {}", self.guild_id);
    }

    async fn play_mode(&self) -> Option<PlayMode> {
        let handle = self.current_handle()?;
        handle.get_info().await.ok().map(|info| info.playing)
    }
}

#[async_trait]
impl AudioSink for SongbirdSink {
    async fn play(&self, track: &Track, on_complete: CompletionHandle) -> Result<(), SinkError> {
        let stream = track
            .stream()
            .ok_or_else(|| SinkError::Unresolved(track.title().to_string()))?;

        let mut call = self.call.lock().await;
        if call.current_connection().is_none() {
            return Err(SinkError::NotConnected);
        }

        let input: Input = HttpRequest::new(self.http.clone(), stream.as_str().to_string()).into();
        let handle = call.play_input(input);
        drop(call);

        for event in [TrackEvent::End, TrackEvent::Error] {
            let notifier = TrackFinished {
                handle: handle.clone(),
                completion: on_complete.clone(),
                slot: self.current.clone(),
            };
            if let Err(e) = handle.add_event(Event::Track(event), notifier) {
                let _ = handle.stop();
                return Err(SinkError::Driver(format!("No se pudo registrar el evento: {}", e)));
            }
        }

        *self.current.lock() = Some(ActiveTrack {
            handle,
            completion: on_complete,
        });

        info!("🎵 Reproduciendo en guild {}: {}", self.guild_id, track.title());
        Ok(())
    }

    async fn pause(&self) {
        if let Some(handle) = self.current_handle() {
            let _ = handle.pause();
            info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
        }
    }

    async fn resume(&self) {
        if let Some(handle) = self.current_handle() {
            let _ = handle.play();
            info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
        }
    }

    async fn stop(&self) {
        let active = self.current.lock().take();
        if let Some(active) = active {
            self.halt(active);
        }
    }

    async fn stop_track(&self, epoch: u64) -> bool {
        let active = {
            let mut slot = self.current.lock();
            if !slot.as_ref().is_some_and(|active| active.completion.epoch() == epoch) {
                return false;
            }
            slot.take()
        };
        match active {
            Some(active) => {
                self.halt(active);
                true
            }
            None => false,
        }
    }

    async fn is_playing(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Play))
    }

    async fn is_paused(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Pause))
    }

    async fn is_connected(&self) -> bool {
        self.call.lock().await.current_connection().is_some()
    }

    async fn disconnect(&self) {
        self.stop().await;
        match self.manager.remove(self.guild_id).await {
            Ok(()) => info!("👋 Desconectado del canal de voz en guild {}", self.guild_id),
            Err(e) => debug!("Desconexión ignorada en guild {}: {:?}", self.guild_id, e),
        }
    }
}

/// Avisa al player loop cuando songbird termina (o falla) un track
struct TrackFinished {
    handle: TrackHandle,
    completion: CompletionHandle,
    slot: ActiveSlot,
}

#[async_trait]
impl VoiceEventHandler for TrackFinished {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let mut error = None;
        if let EventContext::Track(tracks) = ctx {
            for (state, _) in tracks.iter() {
                if let PlayMode::Errored(e) = &state.playing {
                    warn!("❌ Error del driver: {:?}", e);
                    error = Some(SinkError::Driver(format!("{:?}", e)));
                }
            }
        }

        {
            let mut slot = self.slot.lock();
            if slot.as_ref().is_some_and(|active| active.handle.uuid() == self.handle.uuid()) {
                *slot = None;
            }
        }

        self.completion.complete(error);
        None
    }
}
