use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::audio::{
    queue::QueueListing,
    repeat::RepeatMode,
    session::{PlaybackStatus, SessionSnapshot},
    track::Track,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Guild Player";

fn repeat_field(mode: RepeatMode) -> &'static str {
    match mode {
        RepeatMode::Off => "➡️ Desactivada",
        RepeatMode::All => "🔁 Cola",
        RepeatMode::One => "🔂 Canción",
    }
}

fn duration_field(track: &Track) -> String {
    match track.duration() {
        Some(duration) => format_duration(duration),
        None => "🔴 En vivo".to_string(),
    }
}

/// Embed del panel persistente de la sesión
pub fn create_panel_embed(snapshot: &SessionSnapshot) -> CreateEmbed {
    let (title, colour) = match snapshot.status {
        PlaybackStatus::Playing => ("🎵 Reproduciendo Ahora", colors::SUCCESS_GREEN),
        PlaybackStatus::Paused => ("⏸️ En Pausa", colors::WARNING_ORANGE),
        PlaybackStatus::Idle => ("💤 Sin Reproducción", colors::NEUTRAL_GRAY),
        PlaybackStatus::Disconnected => ("🔌 Desconectado", colors::NEUTRAL_GRAY),
    };

    let mut embed = CreateEmbed::default().title(title).color(colour);

    match &snapshot.now_playing {
        Some(track) => {
            embed = embed
                .description(format!("**{}**", track.title()))
                .field("⏱️ Duración", duration_field(track), true)
                .field("👤 Solicitado por", format!("<@{}>", track.requested_by()), true)
                .url(track.url());

            if let Some(thumbnail) = track.thumbnail() {
                embed = embed.thumbnail(thumbnail);
            }
        }
        None => {
            embed = embed.description("😴 Nada sonando\n\n💡 Usa `/play <canción>` para agregar música");
        }
    }

    let next = snapshot
        .next
        .as_ref()
        .map_or_else(|| "Nada en cola".to_string(), |track| track.title().to_string());

    embed = embed
        .field("⏭️ Siguiente", next, false)
        .field("📋 En cola", snapshot.queue_len.to_string(), true)
        .field("🔁 Repetición", repeat_field(snapshot.repeat_mode), true);

    if snapshot.busy {
        embed = embed.field("📥 Importando", "Cargando playlist...", false);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que se agregó una canción
pub fn create_track_added_embed(track: &Track, position: usize, priority: bool) -> CreateEmbed {
    let description = if priority {
        format!("**{}** sonará a continuación", track.title())
    } else {
        format!("**{}** se ha agregado a la cola en la posición {}", track.title(), position)
    };

    let mut embed = CreateEmbed::default()
        .title("✅ Canción Agregada")
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duración", duration_field(track), true)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by()), true)
        .url(track.url());

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que una playlist fue agregada
pub fn create_playlist_added_embed(track_count: usize) -> CreateEmbed {
    let description = if track_count == 1 {
        "Se agregó **1 canción** de la playlist a la cola".to_string()
    } else {
        format!("Se agregaron **{} canciones** de la playlist a la cola", track_count)
    };

    CreateEmbed::default()
        .title("📋 Playlist Agregada")
        .description(description)
        .color(colors::MUSIC_PURPLE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(
            "🎵 Cada canción se resuelve justo antes de sonar",
        ))
}

/// Crea un embed con los primeros elementos de la cola
pub fn create_queue_embed(
    listing: &QueueListing,
    now_playing: Option<&Track>,
    mode: RepeatMode,
) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if let Some(current) = now_playing {
        embed = embed.field("▶️ Reproduciendo", format!("**{}**", current.title()), false);
    }

    if listing.items.is_empty() {
        return embed
            .description("😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música")
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    let mut description = String::new();
    for (i, item) in listing.items.iter().enumerate() {
        let duration = item
            .duration()
            .map(|d| format!(" `[{}]`", format_duration(d)))
            .unwrap_or_default();
        description.push_str(&format!("**{}**. {}{}\n", i + 1, item.title(), duration));
    }

    if listing.remaining > 0 {
        description.push_str(&format!("\n... y {} más", listing.remaining));
    }

    let total = listing.items.len() + listing.remaining;
    embed
        .description(description)
        .field(
            "Información",
            format!("**Total:** {} canciones • **Repetición:** {}", total, repeat_field(mode)),
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de éxito
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de información
pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("ℹ️ {}", title))
        .description(description)
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
