//! Error types for session and playback operations.

use thiserror::Error;

/// Errores de una sesión de reproducción.
///
/// El `Display` de cada variante es el mensaje que se muestra al usuario.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// El resolver falló después de todos los reintentos
    #[error("No pude obtener el audio: {0}")]
    Resolution(String),

    /// Índice fuera de rango (1-based)
    #[error("Ese número no existe en la cola")]
    InvalidIndex(usize),

    #[error("La cola está vacía")]
    EmptyQueue,

    #[error("La cola está llena (máximo {0} canciones)")]
    QueueFull(usize),

    #[error("Hay una importación de playlist en curso, espera a que termine")]
    SessionBusy,

    #[error("Tienes que estar en el mismo canal de voz que el bot")]
    VoiceMismatch,

    #[error("Tienes que estar en un canal de voz")]
    NotInVoice,

    #[error("El bot no está en un canal de voz")]
    BotNotInVoice,

    #[error("No hay nada reproduciéndose")]
    NothingPlaying,

    #[error("Se necesitan al menos 2 canciones en la cola para mezclar")]
    NotEnoughToShuffle,

    /// El Audio Sink rechazó la reproducción
    #[error("No se pudo iniciar la reproducción: {0}")]
    SinkSubmission(String),

    /// Operación cancelada por un teardown
    #[error("Operación cancelada")]
    Cancelled,
}

impl SessionError {
    /// Errores causados por la entrada del usuario; no se registran como fallos internos.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidIndex(_)
                | SessionError::EmptyQueue
                | SessionError::QueueFull(_)
                | SessionError::SessionBusy
                | SessionError::VoiceMismatch
                | SessionError::NotInVoice
                | SessionError::BotNotInVoice
                | SessionError::NothingPlaying
                | SessionError::NotEnoughToShuffle
        )
    }
}

/// Errores reportados por el Audio Sink.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("Sin conexión de voz")]
    NotConnected,

    #[error("Track sin stream resuelto: {0}")]
    Unresolved(String),

    #[error("Reproducción detenida")]
    Stopped,

    #[error("Error del driver de audio: {0}")]
    Driver(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_errors_are_flagged() {
        assert!(SessionError::SessionBusy.is_user_error());
        assert!(SessionError::InvalidIndex(5).is_user_error());
        assert!(!SessionError::Cancelled.is_user_error());
        assert!(!SessionError::Resolution("timeout".into()).is_user_error());
    }
}
