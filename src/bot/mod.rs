//! # Bot Module
//!
//! Discord glue for the guild player.
//!
//! This module contains:
//! - Slash command registration ([`commands`])
//! - Command and panel-button handling with voice-channel checks ([`handlers`])
//! - Voice connection setup, wiring songbird calls into session audio sinks
//!
//! ## Architecture
//!
//! [`GuildPlayerBot`] implements Serenity's [`EventHandler`]. Every command is
//! routed to the guild's session in the [`SessionRegistry`]; the bot itself
//! keeps no playback state.

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    audio::{
        registry::SessionRegistry,
        session::{Session, SessionDeps, TeardownOrigin},
        sink::SongbirdSink,
    },
    config::Config,
    sources::TrackResolver,
    ui::DiscordPanel,
};
use handlers::VoiceAccess;

/// Main Discord event handler.
///
/// ## Fields
///
/// - `config`: Bot configuration (token, limits, timeouts)
/// - `registry`: One playback session per guild
/// - `resolver`: Track Resolver shared by every session
/// - `panel`: Persistent panel messages per guild
pub struct GuildPlayerBot {
    config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    pub resolver: Arc<dyn TrackResolver>,
    pub panel: Arc<DiscordPanel>,
    /// Cliente HTTP para los streams de audio
    http_client: reqwest::Client,
}

impl GuildPlayerBot {
    pub fn new(
        config: Config,
        resolver: Arc<dyn TrackResolver>,
        panel: Arc<DiscordPanel>,
    ) -> Self {
        let deps = SessionDeps {
            resolver: resolver.clone(),
            panel: panel.clone(),
            settings: config.playback(),
        };

        Self {
            config: Arc::new(config),
            registry: Arc::new(SessionRegistry::new(deps)),
            resolver,
            panel,
            http_client: reqwest::Client::new(),
        }
    }

    /// Registers slash commands, per guild when `GUILD_ID` is set (instant
    /// propagation) or globally otherwise.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registrando comandos de guild: {:?}", e);
                        anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                    })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Deja la sesión con un Audio Sink conectado al canal indicado.
    ///
    /// Con [`VoiceAccess::Join`] el bot entra al canal; con
    /// [`VoiceAccess::Shared`] se reutiliza la llamada existente si la sesión
    /// todavía no tiene sink (por ejemplo tras un teardown por inactividad).
    /// Si un teardown estaba desconectando, se espera a que termine y se
    /// vuelve a entrar al canal.
    pub(crate) async fn ensure_connected(
        &self,
        ctx: &Context,
        session: &Arc<Session>,
        guild_id: GuildId,
        access: VoiceAccess,
    ) -> Result<()> {
        let _voice = session.voice_lock().await;

        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        let call = match access {
            VoiceAccess::Join(channel_id) => join(&manager, guild_id, channel_id).await?,
            VoiceAccess::Shared(channel_id) => {
                if session.sink().is_some() {
                    return Ok(());
                }
                let live = match manager.get(guild_id) {
                    Some(call) => {
                        let connected = call.lock().await.current_connection().is_some();
                        connected.then_some(call)
                    }
                    None => None,
                };
                match live {
                    Some(call) => call,
                    None => {
                        debug!("Llamada cerrada en guild {}, reconectando", guild_id);
                        join(&manager, guild_id, channel_id).await?
                    }
                }
            }
        };

        let sink = SongbirdSink::new(guild_id, manager.clone(), call, self.http_client.clone());
        session.attach_sink(Arc::new(sink));
        Ok(())
    }
}

async fn join(
    manager: &Arc<songbird::Songbird>,
    guild_id: GuildId,
    channel_id: ChannelId,
) -> Result<Arc<tokio::sync::Mutex<songbird::Call>>> {
    let call = manager.join(guild_id, channel_id).await.map_err(|e| {
        error!("Error al conectar al canal de voz: {:?}", e);
        anyhow::anyhow!("Error al conectar al canal de voz")
    })?;
    info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
    Ok(call)
}

#[async_trait]
impl EventHandler for GuildPlayerBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    /// Errors are logged but never crash the bot.
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command_interaction) => {
                if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            Interaction::Component(component_interaction) => {
                if let Err(e) = handlers::handle_component(&ctx, component_interaction, self).await {
                    error!("Error manejando componente: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Si alguien desconecta al bot a mano, la sesión se cierra igual que con `/leave`.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };

        match self.registry.get(guild_id) {
            Some(session) if session.sink().is_some() => {
                warn!("🔌 Bot desconectado externamente en guild {}", guild_id);
                session.teardown(TeardownOrigin::Command).await;
            }
            _ => debug!("Desconexión de voz en guild {} sin sesión activa", guild_id),
        }
    }
}
