//! Player loop: takes tracks off the queue one at a time, resolves them if
//! needed, hands them to the audio sink and waits for completion.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{session::Session, track::Track};
use crate::{error::SessionError, sources::resolve_with_retry};

pub(crate) async fn run(session: Arc<Session>, token: CancellationToken) {
    let guild_id = session.guild_id();
    info!("▶️ Player loop iniciado en guild {}", guild_id);

    loop {
        let completion = session.completion().arm();

        let Some(track) = wait_for_next(&session, &token).await else {
            break;
        };

        // Sin conexión el loop termina; un comando posterior lanza otro
        let sink = match session.sink() {
            Some(sink) if sink.is_connected().await => sink,
            _ => {
                warn!("🔌 Conexión de voz perdida en guild {}, deteniendo el player loop", guild_id);
                session.restore_unplayed(track, &token);
                break;
            }
        };

        let track = if track.is_resolved() {
            track
        } else {
            match resolve_lazy(&session, &track, &token).await {
                Ok(resolved) => resolved,
                Err(SessionError::Cancelled) => break,
                Err(e) => {
                    warn!("❌ Descartando '{}' en guild {}: {}", track.title(), guild_id, e);
                    session.drop_current();
                    session.render();
                    continue;
                }
            }
        };

        if let Err(e) = sink.play(&track, completion.clone()).await {
            let err = SessionError::SinkSubmission(e.to_string());
            error!("❌ {} en guild {}", err, guild_id);
            completion.complete(Some(e));
        }
        session.render();

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = session.completion().wait() => {}
        }

        if !session.finish_track(track, &token) {
            break;
        }
        session.render();
    }

    info!("⏹️ Player loop terminado en guild {}", guild_id);
}

/// Espera hasta que haya algo en la cola y lo marca como actual
async fn wait_for_next(session: &Session, token: &CancellationToken) -> Option<Track> {
    let poll = session.settings().queue_poll_interval;
    loop {
        if let Some(track) = session.begin_next(token) {
            debug!("🎶 Siguiente en guild {}: {}", session.guild_id(), track.title());
            return Some(track);
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => return None,
            _ = tokio::time::sleep(poll) => {}
        }
    }
}

/// Resuelve un track de playlist justo antes de que suene
async fn resolve_lazy(
    session: &Session,
    track: &Track,
    token: &CancellationToken,
) -> Result<Track, SessionError> {
    let resolver = session.deps().resolver.clone();
    let resolved = resolve_with_retry(
        resolver.as_ref(),
        track.url(),
        track.requested_by(),
        session.settings().retry,
        token,
    )
    .await?;

    let resolved = track.resolved_from(resolved);
    session.replace_now_playing(&resolved, token);
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sink::AudioSink;
    use crate::audio::{
        repeat::RepeatMode,
        session::{EnqueuePosition, SessionDeps, TeardownOrigin},
        testing::{lazy_track, settings, track, wait_until, FakeSink, RecordingPanel},
    };
    use crate::sources::{MockTrackResolver, ResolveError};
    use pretty_assertions::assert_eq;
    use serenity::model::id::{GuildId, UserId};
    use std::time::Duration;
    use tokio::task::JoinHandle;

    struct Harness {
        session: Arc<Session>,
        sink: Arc<FakeSink>,
        panel: Arc<RecordingPanel>,
    }

    fn harness(resolver: MockTrackResolver) -> Harness {
        let panel = Arc::new(RecordingPanel::default());
        let session = Arc::new(Session::new(
            GuildId::new(7),
            SessionDeps {
                resolver: Arc::new(resolver),
                panel: panel.clone(),
                settings: settings(),
            },
        ));
        let sink = Arc::new(FakeSink::new());
        session.attach_sink(sink.clone());
        Harness { session, sink, panel }
    }

    fn start(session: &Arc<Session>) -> (CancellationToken, JoinHandle<()>) {
        let token = CancellationToken::new();
        let handle = tokio::spawn(run(session.clone(), token.clone()));
        (token, handle)
    }

    fn now_playing_title(session: &Session) -> Option<String> {
        session.now_playing().map(|t| t.title().to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_in_fifo_order_then_idles() {
        let h = harness(MockTrackResolver::new());
        for name in ["T1", "T2", "T3"] {
            h.session.enqueue(track(name), EnqueuePosition::Back).unwrap();
        }
        let (token, worker) = start(&h.session);

        for name in ["T1", "T2", "T3"] {
            wait_until(name, || h.sink.current_title().as_deref() == Some(name)).await;
            assert_eq!(now_playing_title(&h.session).as_deref(), Some(name));
            assert!(h.sink.finish_current());
        }

        wait_until("cola drenada", || {
            h.session.now_playing().is_none() && h.session.queue_len() == 0
        })
        .await;
        assert_eq!(h.sink.played(), vec!["T1", "T2", "T3"]);
        assert!(h.panel.renders() > 0);
        assert!(h.panel.last().is_some());

        token.cancel();
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_all_requeues_at_back() {
        let h = harness(MockTrackResolver::new());
        h.session.lock().repeat_mode = RepeatMode::All;
        h.session.enqueue(track("T1"), EnqueuePosition::Back).unwrap();
        h.session.enqueue(track("T2"), EnqueuePosition::Back).unwrap();

        // paso a paso: tras terminar T1 la cola queda [T2, T1]
        let token = CancellationToken::new();
        let current = h.session.begin_next(&token).unwrap();
        assert!(h.session.finish_track(current, &token));
        assert_eq!(h.session.queued_titles(), vec!["T2", "T1"]);

        let (token, worker) = start(&h.session);
        wait_until("T2", || h.sink.current_title().as_deref() == Some("T2")).await;
        assert_eq!(h.session.queued_titles(), vec!["T1"]);
        h.sink.finish_current();
        wait_until("T1 de nuevo", || h.sink.current_title().as_deref() == Some("T1")).await;
        assert_eq!(h.session.queued_titles(), vec!["T2"]);

        token.cancel();
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_one_replays_until_skipped() {
        let h = harness(MockTrackResolver::new());
        h.session.lock().repeat_mode = RepeatMode::One;
        h.session.enqueue(track("T1"), EnqueuePosition::Back).unwrap();
        h.session.enqueue(track("T2"), EnqueuePosition::Back).unwrap();
        let (token, worker) = start(&h.session);

        wait_until("T1", || h.sink.current_title().as_deref() == Some("T1")).await;
        h.sink.finish_current();
        wait_until("T1 repetido", || h.sink.played().len() == 2).await;
        assert_eq!(h.sink.played(), vec!["T1", "T1"]);

        h.session.skip().await.unwrap();
        assert!(h.session.skip_requested());

        wait_until("T2", || h.sink.current_title().as_deref() == Some("T2")).await;
        assert!(!h.session.skip_requested());
        assert!(h.session.queued_titles().is_empty());
        assert_eq!(h.sink.played(), vec!["T1", "T1", "T2"]);

        token.cancel();
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_rejection_advances_loop() {
        let h = harness(MockTrackResolver::new());
        h.sink.reject_plays(true);
        h.session.enqueue(track("T1"), EnqueuePosition::Back).unwrap();
        h.session.enqueue(track("T2"), EnqueuePosition::Back).unwrap();
        let (token, worker) = start(&h.session);

        wait_until("cola descartada", || {
            h.session.queue_len() == 0 && h.session.now_playing().is_none()
        })
        .await;
        assert!(h.sink.played().is_empty());

        h.sink.reject_plays(false);
        h.session.enqueue(track("T3"), EnqueuePosition::Back).unwrap();
        wait_until("T3", || h.sink.current_title().as_deref() == Some("T3")).await;

        token.cancel();
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_resolution_failure_drops_track() {
        let mut resolver = MockTrackResolver::new();
        resolver.expect_resolve().returning(|query, _| {
            if query.ends_with("bad") {
                Err(ResolveError::NotFound(query.to_string()))
            } else {
                Ok(track("good").with_requested_by(UserId::new(99)))
            }
        });
        let h = harness(resolver);
        h.session.enqueue(lazy_track("bad"), EnqueuePosition::Back).unwrap();
        h.session.enqueue(lazy_track("good"), EnqueuePosition::Back).unwrap();
        let (token, worker) = start(&h.session);

        wait_until("good", || h.sink.current_title().as_deref() == Some("good")).await;
        assert_eq!(h.sink.played(), vec!["good"]);

        let current = h.session.now_playing().unwrap();
        assert!(current.is_resolved());
        assert_eq!(current.requested_by(), UserId::new(1));

        token.cancel();
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_loss_ends_loop_and_keeps_track() {
        let h = harness(MockTrackResolver::new());
        h.sink.drop_connection();
        h.session.enqueue(track("T1"), EnqueuePosition::Back).unwrap();
        let (_token, worker) = start(&h.session);

        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .expect("el loop debe terminar solo")
            .unwrap();
        assert_eq!(h.session.queued_titles(), vec!["T1"]);
        assert_eq!(h.session.now_playing(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting_for_queue() {
        let h = harness(MockTrackResolver::new());
        let (token, worker) = start(&h.session);

        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("el loop respeta la cancelación")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_mid_track_stops_everything() {
        let h = harness(MockTrackResolver::new());
        h.session.lock().repeat_mode = RepeatMode::All;
        h.session.enqueue(track("T1"), EnqueuePosition::Back).unwrap();
        h.session.ensure_workers();

        wait_until("T1", || h.sink.current_title().as_deref() == Some("T1")).await;
        h.session.teardown(TeardownOrigin::Command).await;

        // el stop del teardown no debe reencolar T1
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.session.queue_len(), 0);
        assert_eq!(h.session.now_playing(), None);
        assert!(!h.sink.is_connected().await);
        assert_eq!(h.panel.cleared(), 1);
    }
}
