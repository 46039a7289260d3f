use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{audio::session::PlaybackSettings, sources::RetryPolicy};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Sesiones
    pub idle_timeout_secs: u64,
    pub idle_poll_secs: u64,
    pub queue_poll_ms: u64,
    pub max_queue_size: usize,
    pub max_playlist_size: usize,
    pub list_page_size: usize,

    // Resolver
    pub resolve_attempts: u32,
    pub resolve_backoff_step_secs: u64,
    pub resolve_backoff_cap_secs: u64,
    pub ytdlp_path: String,
}

fn env_or<T: std::str::FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Valor inválido para {}: {} ({})", key, raw, e))
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("La variable DISCORD_TOKEN no está definida"))?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Sesiones
            idle_timeout_secs: env_or("IDLE_TIMEOUT_SECS", "300")?, // 5 minutos
            idle_poll_secs: env_or("IDLE_POLL_SECS", "2")?,
            queue_poll_ms: env_or("QUEUE_POLL_MS", "500")?,
            max_queue_size: env_or("MAX_QUEUE_SIZE", "1000")?,
            max_playlist_size: env_or("MAX_PLAYLIST_SIZE", "100")?,
            list_page_size: env_or("LIST_PAGE_SIZE", "20")?,

            // Resolver
            resolve_attempts: env_or("RESOLVE_ATTEMPTS", "4")?,
            resolve_backoff_step_secs: env_or("RESOLVE_BACKOFF_STEP_SECS", "2")?,
            resolve_backoff_cap_secs: env_or("RESOLVE_BACKOFF_CAP_SECS", "6")?,
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Poll intervals and the idle timeout must be non-zero
    /// - The idle poll interval must not exceed the idle timeout
    /// - Queue, playlist and page sizes must be non-zero
    /// - At least one resolve attempt is required
    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout_secs == 0 {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.idle_poll_secs == 0 || self.idle_poll_secs > self.idle_timeout_secs {
            anyhow::bail!(
                "Idle poll interval must be between 1 and {}s, got: {}",
                self.idle_timeout_secs,
                self.idle_poll_secs
            );
        }

        if self.queue_poll_ms == 0 {
            anyhow::bail!("Queue poll interval must be greater than 0");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.list_page_size == 0 {
            anyhow::bail!("List page size must be greater than 0");
        }

        if self.resolve_attempts == 0 {
            anyhow::bail!("At least one resolve attempt is required");
        }

        Ok(())
    }

    /// Returns a token-free summary of the configuration for logging.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: guild {}\n  \
            Idle: {}s timeout, {}s poll\n  \
            Queue: {} max, {} playlist cap, {} per page\n  \
            Resolver: {} attempts, {}s step, {}s cap ({})",
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.idle_timeout_secs,
            self.idle_poll_secs,
            self.max_queue_size,
            self.max_playlist_size,
            self.list_page_size,
            self.resolve_attempts,
            self.resolve_backoff_step_secs,
            self.resolve_backoff_cap_secs,
            self.ytdlp_path
        )
    }

    /// Parámetros que consume el núcleo de reproducción
    pub fn playback(&self) -> PlaybackSettings {
        PlaybackSettings {
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            idle_poll_interval: Duration::from_secs(self.idle_poll_secs),
            queue_poll_interval: Duration::from_millis(self.queue_poll_ms),
            max_queue_size: self.max_queue_size,
            max_playlist_size: self.max_playlist_size,
            retry: RetryPolicy {
                max_attempts: self.resolve_attempts,
                backoff_step: Duration::from_secs(self.resolve_backoff_step_secs),
                backoff_cap: Duration::from_secs(self.resolve_backoff_cap_secs),
            },
        }
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            guild_id: None,

            idle_timeout_secs: 300,
            idle_poll_secs: 2,
            queue_poll_ms: 500,
            max_queue_size: 1000,
            max_playlist_size: 100,
            list_page_size: 20,

            resolve_attempts: 4,
            resolve_backoff_step_secs: 2,
            resolve_backoff_cap_secs: 6,
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}
