//! Idle watcher: tears the session down after a period with nothing queued
//! and nothing playing.

use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::session::Session;

/// Lo que el watcher observa en cada tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleInputs {
    pub connected: bool,
    /// El sink está sonando o en pausa
    pub playback_active: bool,
    pub queue_len: usize,
    pub has_now_playing: bool,
    pub busy: bool,
    pub idle_for: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleCheck {
    /// Sin conexión de voz: no hay nada que vigilar
    Disconnected,
    Active,
    /// Inactiva, pero sin llegar al límite
    Waiting,
    Expired,
}

/// Evalúa un tick. El contenido se revisa antes que el reloj, así un track
/// largo nunca cuenta como inactividad.
pub fn evaluate(inputs: &IdleInputs, timeout: Duration) -> IdleCheck {
    if !inputs.connected {
        return IdleCheck::Disconnected;
    }
    if inputs.playback_active || inputs.queue_len > 0 || inputs.has_now_playing || inputs.busy {
        return IdleCheck::Active;
    }
    if inputs.idle_for < timeout {
        IdleCheck::Waiting
    } else {
        IdleCheck::Expired
    }
}

async fn observe(session: &Session) -> IdleInputs {
    let (sink, queue_len, has_now_playing, busy, idle_for) = {
        let state = session.lock();
        (
            state.sink.clone(),
            state.queue.len(),
            state.now_playing.is_some(),
            state.busy,
            state.last_activity.elapsed(),
        )
    };

    let (connected, playback_active) = match sink {
        Some(sink) => (
            sink.is_connected().await,
            sink.is_playing().await || sink.is_paused().await,
        ),
        None => (false, false),
    };

    IdleInputs {
        connected,
        playback_active,
        queue_len,
        has_now_playing,
        busy,
        idle_for,
    }
}

pub(crate) async fn run(session: Arc<Session>, token: CancellationToken) {
    let guild_id = session.guild_id();
    let poll = session.settings().idle_poll_interval;
    let timeout = session.settings().idle_timeout;
    debug!("⏱️ Idle watcher iniciado en guild {} (límite {:?})", guild_id, timeout);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(poll) => {}
        }

        let inputs = observe(&session).await;
        match evaluate(&inputs, timeout) {
            IdleCheck::Disconnected => {
                debug!("Idle watcher sin conexión en guild {}", guild_id);
                break;
            }
            IdleCheck::Active | IdleCheck::Waiting => {}
            IdleCheck::Expired => {
                info!("💤 Sin actividad por {:?} en guild {}, desconectando", inputs.idle_for, guild_id);
                if session.teardown_if_idle(timeout).await {
                    break;
                }
            }
        }
    }

    debug!("⏱️ Idle watcher terminado en guild {}", guild_id);
}
