//! Bulk playlist import guarded against every other session mutation.

use serenity::model::id::UserId;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    session::{Session, SessionState, Worker},
    track::Track,
};
use crate::error::{Result, SessionError};

/// Exclusividad de importación de una sesión.
///
/// Mientras existe, `busy` es `true`. Al soltarse (fin normal, error,
/// cancelación o pánico) vuelve a `false`, salvo que un teardown ya haya
/// invalidado esta importación.
pub struct IngestionGuard {
    session: Arc<Session>,
    generation: u64,
}

impl IngestionGuard {
    /// Se toma con el lock de la sesión ya adquirido
    pub(crate) fn acquire(session: &Arc<Session>, state: &mut SessionState) -> Result<Self> {
        if state.busy {
            return Err(SessionError::SessionBusy);
        }
        state.busy = true;
        state.import_generation += 1;
        Ok(Self {
            session: session.clone(),
            generation: state.import_generation,
        })
    }
}

impl Drop for IngestionGuard {
    fn drop(&mut self) {
        let mut state = self.session.lock();
        if state.import_generation == self.generation {
            state.busy = false;
            state.import = None;
            debug!("🔓 Importación liberada en guild {}", self.session.guild_id());
        }
    }
}

/// Resultado de una importación en curso
pub struct ImportTicket {
    rx: oneshot::Receiver<Result<usize>>,
}

impl ImportTicket {
    /// Espera el número de tracks agregados
    pub async fn wait(self) -> Result<usize> {
        self.rx.await.unwrap_or(Err(SessionError::Cancelled))
    }
}

/// Lanza el worker de importación y lo registra en la sesión
pub(crate) fn spawn(
    session: Arc<Session>,
    state: &mut SessionState,
    guard: IngestionGuard,
    url: String,
    requested_by: UserId,
) -> ImportTicket {
    let (tx, rx) = oneshot::channel();
    let token = CancellationToken::new();

    let handle = tokio::spawn(run(session, guard, url, requested_by, token.clone(), tx));
    state.import = Some(Worker::new(token, handle));

    ImportTicket { rx }
}

async fn run(
    session: Arc<Session>,
    guard: IngestionGuard,
    url: String,
    requested_by: UserId,
    token: CancellationToken,
    tx: oneshot::Sender<Result<usize>>,
) {
    let guild_id = session.guild_id();
    info!("📋 Importando playlist en guild {}: {}", guild_id, url);

    let result = import(&session, &url, requested_by, &token).await;
    drop(guard);

    match &result {
        Ok(added) => info!("➕ Agregadas {} canciones de la playlist en guild {}", added, guild_id),
        Err(SessionError::Cancelled) => info!("🛑 Importación detenida en guild {}", guild_id),
        Err(e) => warn!("❌ Importación fallida en guild {}: {}", guild_id, e),
    }

    session.render();
    let _ = tx.send(result);
}

async fn import(
    session: &Arc<Session>,
    url: &str,
    requested_by: UserId,
    token: &CancellationToken,
) -> Result<usize> {
    let limit = session.settings().max_playlist_size;
    let resolver = session.deps().resolver.clone();

    let entries = tokio::select! {
        biased;
        _ = token.cancelled() => return Err(SessionError::Cancelled),
        result = resolver.resolve_playlist(url, limit) => {
            result.map_err(|e| SessionError::Resolution(e.to_string()))?
        }
    };

    let mut added = 0;
    for entry in entries.into_iter().take(limit) {
        {
            let mut state = session.lock();
            if token.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
            if let Err(e) = state.queue.enqueue_back(Track::unresolved(entry, requested_by)) {
                warn!("Importación cortada en guild {}: {}", session.guild_id(), e);
                break;
            }
        }
        added += 1;
        tokio::task::yield_now().await;
    }

    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        session::{EnqueuePosition, SessionDeps, TeardownOrigin},
        testing::{settings, track, FakeSink, GatedResolver, RecordingPanel},
        track::PlaylistEntry,
    };
    use crate::sources::{MockTrackResolver, ResolveError, TrackResolver};
    use serenity::model::id::GuildId;
    use std::time::Duration;

    fn entries(n: usize) -> Vec<PlaylistEntry> {
        (0..n)
            .map(|i| PlaylistEntry {
                title: format!("Song {}", i),
                url: format!("https://www.youtube.com/watch?v={}", i),
            })
            .collect()
    }

    fn session_with(resolver: impl TrackResolver + 'static) -> Arc<Session> {
        Arc::new(Session::new(
            GuildId::new(1),
            SessionDeps {
                resolver: Arc::new(resolver),
                panel: Arc::new(RecordingPanel::default()),
                settings: settings(),
            },
        ))
    }

    #[tokio::test]
    async fn test_playlist_is_capped_and_unresolved() {
        let mut resolver = MockTrackResolver::new();
        resolver
            .expect_resolve_playlist()
            .returning(|_, _| Ok(entries(150)));
        let session = session_with(resolver);

        let added = session
            .start_import("https://www.youtube.com/playlist?list=PL1".into(), UserId::new(5))
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(added, 100);
        assert_eq!(session.queue_len(), 100);
        assert!(session.lock().queue.iter().all(|t| !t.is_resolved()));
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_failed_playlist_releases_guard() {
        let mut resolver = MockTrackResolver::new();
        resolver
            .expect_resolve_playlist()
            .returning(|url, _| Err(ResolveError::NotFound(url.to_string())));
        let session = session_with(resolver);

        let result = session
            .start_import("https://www.youtube.com/playlist?list=PL1".into(), UserId::new(5))
            .unwrap()
            .wait()
            .await;

        assert!(matches!(result, Err(SessionError::Resolution(_))));
        assert!(!session.is_busy());
        assert_eq!(session.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_busy_for_whole_import() {
        let resolver = GatedResolver::new(entries(3));
        let gate = resolver.gate();
        let session = session_with(resolver);

        let ticket = session
            .start_import("https://www.youtube.com/playlist?list=PL1".into(), UserId::new(5))
            .unwrap();
        assert!(session.is_busy());

        // una segunda importación o un comando se rechazan mientras tanto
        assert!(matches!(
            session.start_import("https://www.youtube.com/playlist?list=PL2".into(), UserId::new(5)),
            Err(SessionError::SessionBusy)
        ));
        assert_eq!(
            session.enqueue(track("T"), EnqueuePosition::Back),
            Err(SessionError::SessionBusy)
        );
        assert!(session.is_busy());

        gate.notify_one();
        assert_eq!(ticket.wait().await, Ok(3));
        assert!(!session.is_busy());
        assert_eq!(session.queue_len(), 3);
    }

    #[tokio::test]
    async fn test_teardown_cancels_import() {
        let resolver = GatedResolver::new(entries(50));
        let gate = resolver.gate();
        let session = session_with(resolver);
        session.attach_sink(Arc::new(FakeSink::new()));

        let ticket = session
            .start_import("https://www.youtube.com/playlist?list=PL1".into(), UserId::new(5))
            .unwrap();
        assert!(session.is_busy());

        tokio::time::timeout(Duration::from_secs(5), session.teardown(TeardownOrigin::Command))
            .await
            .expect("el teardown no espera a la importación");

        assert!(!session.is_busy());
        assert_eq!(session.queue_len(), 0);

        // aunque la playlist llegue después, la cola no se toca
        gate.notify_one();
        assert_eq!(ticket.wait().await, Err(SessionError::Cancelled));
        assert_eq!(session.queue_len(), 0);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_teardown_mid_import_leaves_consistent_queue() {
        let mut resolver = MockTrackResolver::new();
        resolver
            .expect_resolve_playlist()
            .returning(|_, _| Ok(entries(100)));
        let session = session_with(resolver);
        session.attach_sink(Arc::new(FakeSink::new()));

        let ticket = session
            .start_import("https://www.youtube.com/playlist?list=PL1".into(), UserId::new(5))
            .unwrap();

        // dejar que entren algunas canciones, no todas
        for _ in 0..1000 {
            if session.queue_len() >= 3 {
                break;
            }
            tokio::task::yield_now().await;
        }
        let partial = session.queue_len();
        assert!((3..100).contains(&partial), "entraron {}", partial);
        assert!(session.is_busy());

        session.teardown(TeardownOrigin::Command).await;
        assert!(!session.is_busy());
        assert_eq!(session.queue_len(), 0);

        assert_eq!(ticket.wait().await, Err(SessionError::Cancelled));
        assert_eq!(session.queue_len(), 0);
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_stale_guard_does_not_release_new_import() {
        let session = session_with(MockTrackResolver::new());

        let stale = {
            let mut state = session.lock();
            IngestionGuard::acquire(&session, &mut state).unwrap()
        };
        session.teardown(TeardownOrigin::Command).await;

        let _current = {
            let mut state = session.lock();
            IngestionGuard::acquire(&session, &mut state).unwrap()
        };
        drop(stale);

        assert!(session.is_busy());
    }
}
