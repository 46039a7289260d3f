use super::{queue::PlaybackQueue, track::Track};

/// Modo de repetición de la sesión
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    /// OFF -> ALL -> ONE -> OFF
    pub fn next(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RepeatMode::Off => "Repetición desactivada",
            RepeatMode::All => "🔁 Repetir cola",
            RepeatMode::One => "🔂 Repetir canción",
        }
    }
}

/// Qué hacer con un track que acaba de terminar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatDirective {
    Drop,
    EnqueueBack,
    EnqueueFront,
}

/// Un track saltado nunca se repite, sin importar el modo.
pub fn decide(mode: RepeatMode, was_skipped: bool) -> RepeatDirective {
    match (mode, was_skipped) {
        (_, true) | (RepeatMode::Off, _) => RepeatDirective::Drop,
        (RepeatMode::All, false) => RepeatDirective::EnqueueBack,
        (RepeatMode::One, false) => RepeatDirective::EnqueueFront,
    }
}

impl RepeatDirective {
    pub fn apply(self, queue: &mut PlaybackQueue, track: Track) {
        match self {
            RepeatDirective::Drop => {}
            RepeatDirective::EnqueueBack => queue.reinsert_back(track),
            RepeatDirective::EnqueueFront => queue.reinsert_front(track),
        }
    }
}
