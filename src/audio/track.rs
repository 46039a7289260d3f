use serenity::model::id::UserId;
use std::time::Duration;

/// Referencia a un stream de audio listo para reproducir (URL directa).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRef(String);

impl StreamRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Entrada ligera de una playlist: solo título y URL, sin resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub title: String,
    pub url: String,
}

/// Una canción en la cola o sonando.
///
/// Es un valor inmutable: resolverla produce un `Track` nuevo que reemplaza al
/// anterior en su posición.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    title: String,
    url: String,
    stream: Option<StreamRef>,
    requested_by: UserId,
    duration: Option<Duration>,
    thumbnail: Option<String>,
}

impl Track {
    pub fn new(title: String, url: String, requested_by: UserId) -> Self {
        Self {
            title,
            url,
            stream: None,
            requested_by,
            duration: None,
            thumbnail: None,
        }
    }

    /// Track importado de una playlist; se resuelve justo antes de sonar
    pub fn unresolved(entry: PlaylistEntry, requested_by: UserId) -> Self {
        Self::new(entry.title, entry.url, requested_by)
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn stream(&self) -> Option<&StreamRef> {
        self.stream.as_ref()
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn is_resolved(&self) -> bool {
        self.stream.is_some()
    }

    // Builders
    pub fn with_stream(mut self, stream: StreamRef) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: String) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    pub fn with_requested_by(mut self, user_id: UserId) -> Self {
        self.requested_by = user_id;
        self
    }

    /// Combina este track (sin resolver) con el resultado del resolver,
    /// conservando quién lo pidió.
    pub fn resolved_from(&self, resolved: Track) -> Track {
        resolved.with_requested_by(self.requested_by)
    }
}
