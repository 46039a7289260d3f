use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::error::SinkError;

/// Señal de "el track terminó" entre el Audio Sink y el player loop.
///
/// Cada iteración del loop la rearma con [`CompletionSignal::arm`], que entrega
/// un [`CompletionHandle`] atado a esa iteración. Un handle de un track
/// anterior (por ejemplo un evento de fin que llega tarde) ya no la activa.
#[derive(Debug, Default)]
pub struct CompletionSignal {
    epoch: AtomicU64,
    // última iteración que recibió su aviso; solo avanza
    fired_epoch: AtomicU64,
    notify: Notify,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limpia la señal y abre una nueva iteración
    pub fn arm(self: &Arc<Self>) -> CompletionHandle {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        CompletionHandle {
            signal: self.clone(),
            epoch,
        }
    }

    /// Iteración abierta actualmente
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn fire(&self, epoch: u64) -> bool {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }
        // un aviso viejo que pasó el chequeo antes de un `arm` queda con un
        // epoch menor y no activa la iteración nueva
        self.fired_epoch.fetch_max(epoch, Ordering::SeqCst);
        self.notify.notify_waiters();
        true
    }

    pub fn is_set(&self) -> bool {
        let epoch = self.epoch.load(Ordering::SeqCst);
        epoch != 0 && self.fired_epoch.load(Ordering::SeqCst) == epoch
    }

    /// Espera hasta que la señal esté activa
    pub async fn wait(&self) {
        loop {
            // registrar el waiter antes de revisar el flag para no perder el aviso
            let notified = self.notify.notified();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}

/// Callback de fin de reproducción que se entrega al Audio Sink.
#[derive(Debug, Clone)]
pub struct CompletionHandle {
    signal: Arc<CompletionSignal>,
    epoch: u64,
}

impl CompletionHandle {
    /// Iteración del player loop a la que pertenece este handle
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn complete(&self, error: Option<SinkError>) {
        match &error {
            Some(SinkError::Stopped) => debug!("⏹️ Track detenido"),
            Some(e) => warn!("❌ Track terminó con error: {}", e),
            None => debug!("✅ Track terminado"),
        }
        if !self.signal.fire(self.epoch) {
            debug!("Aviso de fin ignorado (iteración {} ya cerrada)", self.epoch);
        }
    }
}
