use rand::seq::SliceRandom;
use std::collections::VecDeque;
use tracing::{debug, info};

use super::track::Track;
use crate::error::{Result, SessionError};

/// Cola de reproducción de una sesión.
///
/// No es thread-safe por sí misma: vive dentro del estado de la sesión y solo
/// se toca con el lock de la sesión tomado.
#[derive(Debug)]
pub struct PlaybackQueue {
    items: VecDeque<Track>,
    max_size: usize,
}

/// Primeros elementos de la cola y cuántos quedan después de ellos
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueListing {
    pub items: Vec<Track>,
    pub remaining: usize,
}

impl PlaybackQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Agrega al final (FIFO). Devuelve la posición 1-based.
    pub fn enqueue_back(&mut self, track: Track) -> Result<usize> {
        self.ensure_space()?;
        info!("➕ Agregado a la cola: {}", track.title());
        self.items.push_back(track);
        Ok(self.items.len())
    }

    /// Agrega al frente: será lo próximo en sonar
    pub fn enqueue_front(&mut self, track: Track) -> Result<()> {
        self.ensure_space()?;
        info!("⏩ Agregado al frente de la cola: {}", track.title());
        self.items.push_front(track);
        Ok(())
    }

    /// Reinserción por repetición; nunca se rechaza por capacidad.
    pub fn reinsert_back(&mut self, track: Track) {
        debug!("🔁 Reinsertado al final: {}", track.title());
        self.items.push_back(track);
    }

    pub fn reinsert_front(&mut self, track: Track) {
        debug!("🔂 Reinsertado al frente: {}", track.title());
        self.items.push_front(track);
    }

    /// Elimina por índice 1-based
    pub fn remove_at(&mut self, index: usize) -> Result<Track> {
        if self.items.is_empty() {
            return Err(SessionError::EmptyQueue);
        }

        if index == 0 || index > self.items.len() {
            return Err(SessionError::InvalidIndex(index));
        }

        let removed = self
            .items
            .remove(index - 1)
            .ok_or(SessionError::InvalidIndex(index))?;
        debug!("❌ Track eliminado en posición {}", index);
        Ok(removed)
    }

    /// Mezcla solo lo que está en espera (Fisher-Yates); lo que suena no está aquí.
    pub fn shuffle(&mut self) {
        let mut rng = rand::thread_rng();
        self.items.make_contiguous().shuffle(&mut rng);
        info!("🔀 Cola mezclada");
    }

    pub fn peek_first(&self) -> Option<&Track> {
        self.items.front()
    }

    pub fn pop_first(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    pub fn list_first(&self, n: usize) -> QueueListing {
        let items: Vec<Track> = self.items.iter().take(n).cloned().collect();
        QueueListing {
            remaining: self.items.len() - items.len(),
            items,
        }
    }

    pub fn clear(&mut self) -> usize {
        let cleared = self.items.len();
        self.items.clear();
        if cleared > 0 {
            info!("🗑️ Cola limpiada: {} tracks removidos", cleared);
        }
        cleared
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.max_size
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }

    fn ensure_space(&self) -> Result<()> {
        if self.is_full() {
            return Err(SessionError::QueueFull(self.max_size));
        }
        Ok(())
    }
}
