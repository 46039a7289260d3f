pub mod ytdlp;

use async_trait::async_trait;
use serenity::model::id::UserId;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    audio::track::{PlaylistEntry, Track},
    error::SessionError,
};

pub use ytdlp::YtDlpResolver;

/// Errores de un intento de resolución
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Error al ejecutar el extractor: {0}")]
    Process(String),

    #[error("No se encontraron resultados para: {0}")]
    NotFound(String),

    #[error("Respuesta inválida del extractor: {0}")]
    Parse(String),

    #[error("No se pudo obtener la URL del stream")]
    NoStream,
}

/// Convierte una consulta de texto o URL en algo reproducible (Track Resolver).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resuelve una URL directa o un término de búsqueda a un track con stream
    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Track, ResolveError>;

    /// Lista las entradas de una playlist sin resolverlas, hasta `limit`
    async fn resolve_playlist(
        &self,
        url: &str,
        limit: usize,
    ) -> Result<Vec<PlaylistEntry>, ResolveError>;

    /// Indica si la consulta es una URL de playlist
    fn is_playlist(&self, query: &str) -> bool;
}

/// Reintentos con backoff exponencial acotado
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
    pub backoff_cap: Duration,
}

impl RetryPolicy {
    /// Espera después del intento `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.backoff_step.saturating_mul(factor).min(self.backoff_cap)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_step: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(6),
        }
    }
}

/// Resuelve con reintentos. Revisa `cancel` en cada punto de espera.
pub async fn resolve_with_retry(
    resolver: &dyn TrackResolver,
    query: &str,
    requested_by: UserId,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Track, SessionError> {
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            result = resolver.resolve(query, requested_by) => result,
        };

        match result {
            Ok(track) => {
                if attempt > 1 {
                    info!("✅ Resuelto en el intento {}: {}", attempt, track.title());
                }
                return Ok(track);
            }
            Err(e) => {
                warn!("🔄 Intento {} de resolución falló para '{}': {}", attempt, query, e);
                last_error = Some(e);
            }
        }

        if attempt < policy.max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SessionError::Cancelled),
                _ = tokio::time::sleep(policy.backoff(attempt)) => {}
            }
        }
    }

    Err(SessionError::Resolution(
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "sin intentos".to_string()),
    ))
}
