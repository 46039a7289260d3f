use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serenity::{
    builder::{CreateMessage, EditMessage},
    http::Http,
    model::id::{ChannelId, GuildId, MessageId},
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{buttons, embeds, PanelRenderer};
use crate::audio::session::SessionSnapshot;

#[derive(Debug)]
struct PanelMessage {
    channel_id: ChannelId,
    message_id: Option<MessageId>,
}

/// Panel persistente (embed + botones) publicado en un canal de texto por guild.
///
/// El mensaje se edita en cada render; si alguien lo borró se publica de nuevo.
pub struct DiscordPanel {
    http: Arc<Http>,
    // un lock por guild para que dos renders no publiquen dos mensajes
    panels: DashMap<GuildId, Arc<Mutex<PanelMessage>>>,
}

impl DiscordPanel {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            panels: DashMap::new(),
        }
    }

    /// Canal de texto donde vive el panel de la guild
    pub async fn bind(&self, guild_id: GuildId, channel_id: ChannelId) {
        let panel = self
            .panels
            .entry(guild_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(PanelMessage {
                    channel_id,
                    message_id: None,
                }))
            })
            .clone();

        let mut panel = panel.lock().await;
        if panel.channel_id != channel_id {
            debug!("📌 Panel de guild {} movido a {}", guild_id, channel_id);
            panel.channel_id = channel_id;
            panel.message_id = None;
        }
    }

    fn panel(&self, guild_id: GuildId) -> Option<Arc<Mutex<PanelMessage>>> {
        self.panels.get(&guild_id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl PanelRenderer for DiscordPanel {
    async fn render(&self, snapshot: SessionSnapshot) -> Result<()> {
        let Some(panel) = self.panel(snapshot.guild_id) else {
            debug!("Guild {} sin canal de panel", snapshot.guild_id);
            return Ok(());
        };
        let mut panel = panel.lock().await;

        let embed = embeds::create_panel_embed(&snapshot);
        let components = buttons::create_panel_buttons(&snapshot);

        if let Some(message_id) = panel.message_id {
            let edit = EditMessage::new()
                .embed(embed.clone())
                .components(components.clone());
            match panel.channel_id.edit_message(&*self.http, message_id, edit).await {
                Ok(_) => return Ok(()),
                Err(e) => debug!("Panel anterior no disponible, publicando otro: {:?}", e),
            }
        }

        let message = panel
            .channel_id
            .send_message(&*self.http, CreateMessage::new().embed(embed).components(components))
            .await?;
        panel.message_id = Some(message.id);
        Ok(())
    }

    async fn clear(&self, guild_id: GuildId) -> Result<()> {
        let Some(panel) = self.panel(guild_id) else {
            return Ok(());
        };
        let mut panel = panel.lock().await;

        if let Some(message_id) = panel.message_id.take() {
            panel.channel_id.delete_message(&*self.http, message_id).await?;
            debug!("🗑️ Panel eliminado en guild {}", guild_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{repeat::RepeatMode, session::PlaybackStatus};

    fn panel() -> DiscordPanel {
        DiscordPanel::new(Arc::new(Http::new("token-de-prueba")))
    }

    #[tokio::test]
    async fn test_unbound_guild_is_a_noop() {
        let panel = panel();
        let snapshot = SessionSnapshot {
            guild_id: GuildId::new(1),
            status: PlaybackStatus::Idle,
            now_playing: None,
            next: None,
            queue_len: 0,
            repeat_mode: RepeatMode::Off,
            busy: false,
        };

        assert!(panel.render(snapshot).await.is_ok());
        assert!(panel.clear(GuildId::new(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_rebinding_forgets_old_message() {
        let panel = panel();
        let guild = GuildId::new(1);
        panel.bind(guild, ChannelId::new(10)).await;
        panel.panel(guild).unwrap().lock().await.message_id = Some(MessageId::new(99));

        panel.bind(guild, ChannelId::new(10)).await;
        assert_eq!(panel.panel(guild).unwrap().lock().await.message_id, Some(MessageId::new(99)));

        panel.bind(guild, ChannelId::new(20)).await;
        let current = panel.panel(guild).unwrap();
        let current = current.lock().await;
        assert_eq!(current.channel_id, ChannelId::new(20));
        assert_eq!(current.message_id, None);
        // sin mensaje publicado, clear no llama a Discord
        drop(current);
        assert!(panel.clear(guild).await.is_ok());
    }
}
