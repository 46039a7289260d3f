use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tracing::{debug, info};

use super::session::{Session, SessionDeps, TeardownOrigin};

/// Sesiones por guild. Se crean en el primer acceso y nunca se eliminan: un
/// teardown las deja vacías y el siguiente comando reutiliza el mismo objeto.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<Session>>,
    deps: SessionDeps,
}

impl SessionRegistry {
    pub fn new(deps: SessionDeps) -> Self {
        Self {
            sessions: DashMap::new(),
            deps,
        }
    }

    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<Session> {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("🆕 Nueva sesión para guild {}", guild_id);
                Arc::new(Session::new(guild_id, self.deps.clone()))
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Session>> {
        self.sessions.get(&guild_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Cierra todas las sesiones (apagado del proceso)
    pub async fn shutdown_all(&self) {
        let sessions: Vec<Arc<Session>> =
            self.sessions.iter().map(|entry| entry.value().clone()).collect();

        info!("🧹 Cerrando {} sesiones", sessions.len());
        for session in sessions {
            session.teardown(TeardownOrigin::Command).await;
        }
    }
}
