use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponseFollowup, EditInteractionResponse,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    audio::session::{EnqueuePosition, Session, TeardownOrigin},
    bot::GuildPlayerBot,
    error::SessionError,
    sources::resolve_with_retry,
    ui::{
        buttons::PanelAction,
        embeds::{
            create_error_embed, create_info_embed, create_playlist_added_embed,
            create_queue_embed, create_success_embed, create_track_added_embed,
        },
    },
};

/// Qué necesita hacer el comando con la conexión de voz
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VoiceAccess {
    /// El bot no está conectado: unirse al canal del usuario
    Join(ChannelId),
    /// Usuario y bot comparten canal
    Shared(ChannelId),
}

/// Precondiciones de voz, evaluadas antes de tocar la sesión
pub(crate) fn check_voice(
    user_channel: Option<ChannelId>,
    bot_channel: Option<ChannelId>,
    may_join: bool,
) -> Result<VoiceAccess, SessionError> {
    let user_channel = user_channel.ok_or(SessionError::NotInVoice)?;
    match bot_channel {
        Some(bot_channel) if bot_channel == user_channel => Ok(VoiceAccess::Shared(bot_channel)),
        Some(_) => Err(SessionError::VoiceMismatch),
        None if may_join => Ok(VoiceAccess::Join(user_channel)),
        None => Err(SessionError::BotNotInVoice),
    }
}

/// Comandos de sesión compartidos por slash commands y botones del panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionCommand {
    Pause,
    Resume,
    Skip,
    Shuffle,
    Repeat,
    List,
    Remove(usize),
    Leave,
}

impl From<PanelAction> for SessionCommand {
    fn from(action: PanelAction) -> Self {
        match action {
            PanelAction::Pause => SessionCommand::Pause,
            PanelAction::Resume => SessionCommand::Resume,
            PanelAction::Skip => SessionCommand::Skip,
            PanelAction::Shuffle => SessionCommand::Shuffle,
            PanelAction::Repeat => SessionCommand::Repeat,
            PanelAction::List => SessionCommand::List,
            PanelAction::Leave => SessionCommand::Leave,
        }
    }
}

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &GuildPlayerBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    // Defer la respuesta ya que resolver puede tomar tiempo
    command.defer(&ctx.http).await?;

    let outcome = match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, guild_id, bot, EnqueuePosition::Back).await,
        "priority" => handle_play(ctx, &command, guild_id, bot, EnqueuePosition::Front).await,
        "pause" => run_session_command(ctx, bot, guild_id, command.user.id, SessionCommand::Pause).await,
        "resume" => run_session_command(ctx, bot, guild_id, command.user.id, SessionCommand::Resume).await,
        "skip" => run_session_command(ctx, bot, guild_id, command.user.id, SessionCommand::Skip).await,
        "shuffle" => run_session_command(ctx, bot, guild_id, command.user.id, SessionCommand::Shuffle).await,
        "repeat" => run_session_command(ctx, bot, guild_id, command.user.id, SessionCommand::Repeat).await,
        "list" => run_session_command(ctx, bot, guild_id, command.user.id, SessionCommand::List).await,
        "leave" => run_session_command(ctx, bot, guild_id, command.user.id, SessionCommand::Leave).await,
        "remove" => match remove_index(&command) {
            Ok(index) => {
                run_session_command(ctx, bot, guild_id, command.user.id, SessionCommand::Remove(index)).await
            }
            Err(e) => Err(e.into()),
        },
        _ => Ok(create_error_embed("Comando no reconocido", "Usa `/play` para empezar")),
    };

    let embed = outcome.unwrap_or_else(|e| error_embed(&e));
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

/// Maneja los botones del panel
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &GuildPlayerBot,
) -> Result<()> {
    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Componente usado fuera de un servidor"))?;

    info!(
        "🔘 Botón {} presionado por {} en guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    component.defer_ephemeral(&ctx.http).await?;

    let embed = match PanelAction::from_custom_id(&component.data.custom_id) {
        Some(action) => run_session_command(ctx, bot, guild_id, component.user.id, action.into())
            .await
            .unwrap_or_else(|e| error_embed(&e)),
        None => create_error_embed("Acción no reconocida", "Este botón ya no está disponible"),
    };

    component
        .create_followup(
            &ctx.http,
            CreateInteractionResponseFollowup::new().embed(embed).ephemeral(true),
        )
        .await?;

    Ok(())
}

fn error_embed(e: &anyhow::Error) -> CreateEmbed {
    match e.downcast_ref::<SessionError>() {
        Some(SessionError::Cancelled) => {
            create_info_embed("Operación detenida", "La sesión se cerró antes de terminar")
        }
        Some(err) => {
            if !err.is_user_error() {
                error!("❌ Error de sesión: {}", err);
            }
            create_error_embed("No se pudo completar", &err.to_string())
        }
        None => {
            error!("❌ Error manejando interacción: {:?}", e);
            create_error_embed("Error inesperado", "Inténtalo de nuevo en unos segundos")
        }
    }
}

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn remove_index(command: &CommandInteraction) -> Result<usize, SessionError> {
    let raw = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "index")
        .and_then(|opt| opt.value.as_i64())
        .unwrap_or(0);

    usize::try_from(raw)
        .ok()
        .filter(|index| *index >= 1)
        .ok_or(SessionError::InvalidIndex(0))
}

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

async fn bot_voice_channel(ctx: &Context, guild_id: GuildId) -> Option<ChannelId> {
    let manager = songbird::get(ctx).await?;
    let call = manager.get(guild_id)?;
    let channel = call.lock().await.current_channel()?;
    Some(ChannelId::from(channel.0))
}

async fn voice_access(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
    may_join: bool,
) -> Result<VoiceAccess, SessionError> {
    let user_channel = user_voice_channel(ctx, guild_id, user_id);
    let bot_channel = bot_voice_channel(ctx, guild_id).await;
    check_voice(user_channel, bot_channel, may_join)
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    guild_id: GuildId,
    bot: &GuildPlayerBot,
    position: EnqueuePosition,
) -> Result<CreateEmbed> {
    let query = option_str(command, "query")
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .trim();
    let user_id = command.user.id;

    let access = voice_access(ctx, guild_id, user_id, true).await?;
    let session = bot.registry.get_or_create(guild_id);
    bot.ensure_connected(ctx, &session, guild_id, access).await?;
    bot.panel.bind(guild_id, command.channel_id).await;

    if position == EnqueuePosition::Back && bot.resolver.is_playlist(query) {
        let ticket = session.start_import(query.to_string(), user_id)?;
        session.ensure_workers();
        let added = ticket.wait().await?;
        return Ok(create_playlist_added_embed(added));
    }

    // no vale la pena resolver si la sesión va a rechazar el encolado
    if session.is_busy() {
        return Err(SessionError::SessionBusy.into());
    }

    let track = resolve_with_retry(
        bot.resolver.as_ref(),
        query,
        user_id,
        session.settings().retry,
        &CancellationToken::new(),
    )
    .await?;

    let queue_position = session.enqueue(track.clone(), position)?;
    session.ensure_workers();
    info!("➕ '{}' agregado en guild {} (posición {})", track.title(), guild_id, queue_position);

    Ok(create_track_added_embed(
        &track,
        queue_position,
        position == EnqueuePosition::Front,
    ))
}

async fn run_session_command(
    ctx: &Context,
    bot: &GuildPlayerBot,
    guild_id: GuildId,
    user_id: UserId,
    command: SessionCommand,
) -> Result<CreateEmbed> {
    voice_access(ctx, guild_id, user_id, false).await?;
    let session: Arc<Session> = bot.registry.get_or_create(guild_id);

    let embed = match command {
        SessionCommand::Pause => {
            session.pause().await?;
            create_success_embed("Pausado", "⏸️ Música pausada")
        }
        SessionCommand::Resume => {
            session.resume().await?;
            create_success_embed("Reanudado", "▶️ Música reanudada")
        }
        SessionCommand::Skip => {
            session.skip().await?;
            create_success_embed("Saltado", "⏭️ Saltando a la siguiente canción")
        }
        SessionCommand::Shuffle => {
            session.shuffle()?;
            create_success_embed("Cola mezclada", "🔀 Las canciones en espera cambiaron de orden")
        }
        SessionCommand::Repeat => {
            let mode = session.cycle_repeat()?;
            create_info_embed("Modo de repetición", mode.label())
        }
        SessionCommand::List => {
            let listing = session.list(bot.config.list_page_size);
            create_queue_embed(&listing, session.now_playing().as_ref(), session.repeat_mode())
        }
        SessionCommand::Remove(index) => {
            let removed = session.remove_at(index)?;
            create_success_embed("Eliminada", &format!("🗑️ **{}** salió de la cola", removed.title()))
        }
        SessionCommand::Leave => {
            session.teardown(TeardownOrigin::Command).await;
            create_success_embed("Desconectado", "👋 Cola vaciada, hasta la próxima")
        }
    };

    Ok(embed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_must_be_in_voice() {
        assert_eq!(check_voice(None, None, true), Err(SessionError::NotInVoice));
        assert_eq!(
            check_voice(None, Some(ChannelId::new(1)), false),
            Err(SessionError::NotInVoice)
        );
    }

    #[test]
    fn test_play_joins_user_channel() {
        assert_eq!(
            check_voice(Some(ChannelId::new(5)), None, true),
            Ok(VoiceAccess::Join(ChannelId::new(5)))
        );
    }

    #[test]
    fn test_other_commands_need_bot_connected() {
        assert_eq!(
            check_voice(Some(ChannelId::new(5)), None, false),
            Err(SessionError::BotNotInVoice)
        );
    }

    #[test]
    fn test_channel_mismatch_is_rejected() {
        for may_join in [true, false] {
            assert_eq!(
                check_voice(Some(ChannelId::new(5)), Some(ChannelId::new(6)), may_join),
                Err(SessionError::VoiceMismatch)
            );
        }
        assert_eq!(
            check_voice(Some(ChannelId::new(5)), Some(ChannelId::new(5)), false),
            Ok(VoiceAccess::Shared(ChannelId::new(5)))
        );
    }

    #[test]
    fn test_panel_actions_map_to_commands() {
        assert_eq!(SessionCommand::from(PanelAction::Leave), SessionCommand::Leave);
        assert_eq!(SessionCommand::from(PanelAction::Repeat), SessionCommand::Repeat);
    }
}
