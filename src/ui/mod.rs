pub mod buttons;
pub mod embeds;
pub mod panel;

use anyhow::Result;
use async_trait::async_trait;
use serenity::model::id::GuildId;

use crate::audio::session::SessionSnapshot;

pub use panel::DiscordPanel;

/// Hook de renderizado del panel de una sesión.
///
/// La sesión lo invoca después de cada transición visible y descarta sus
/// errores: un panel roto nunca detiene la reproducción.
#[async_trait]
pub trait PanelRenderer: Send + Sync {
    async fn render(&self, snapshot: SessionSnapshot) -> Result<()>;

    /// Elimina el panel de la guild (teardown)
    async fn clear(&self, guild_id: GuildId) -> Result<()>;
}
