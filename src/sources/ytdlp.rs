use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serenity::model::id::UserId;
use std::{sync::OnceLock, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::{ResolveError, TrackResolver};
use crate::audio::track::{PlaylistEntry, StreamRef, Track};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Track Resolver basado en el binario `yt-dlp`
pub struct YtDlpResolver {
    binary: String,
    // Limitar procesos concurrentes para evitar rate limiting
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp (`--dump-json`)
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
}

/// Entrada de `--flat-playlist`
#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
}

fn playlist_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^https?://(www\.|m\.|music\.)?youtube\.com/(playlist\?|watch\?).*\blist=[\w-]+")
            .expect("regex de playlist válida")
    })
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            rate_limiter: Semaphore::new(3),
        }
    }

    fn is_url(query: &str) -> bool {
        url::Url::parse(query)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false)
    }

    async fn run(&self, args: &[&str]) -> Result<String, ResolveError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ResolveError::Process(e.to_string()))?;

        debug!("🔧 {} {}", self.binary, args.join(" "));

        // si el resolve se cancela, el proceso muere con el future
        let output = Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ResolveError::Process(format!("No se pudo ejecutar yt-dlp: {}", e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Process(error.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn info_to_track(info: YtDlpInfo, query: &str, requested_by: UserId) -> Result<Track, ResolveError> {
        let stream_url = info.url.filter(|u| !u.is_empty()).ok_or(ResolveError::NoStream)?;

        let mut track = Track::new(
            info.title.unwrap_or_else(|| "Unknown Title".to_string()),
            info.webpage_url.unwrap_or_else(|| query.to_string()),
            requested_by,
        )
        .with_stream(StreamRef::new(stream_url));

        if let Some(duration) = info.duration.filter(|d| d.is_finite() && *d >= 0.0) {
            track = track.with_duration(Duration::from_secs(duration as u64));
        }

        if let Some(thumbnail) = info.thumbnail {
            track = track.with_thumbnail(thumbnail);
        }

        Ok(track)
    }

    fn parse_playlist(stdout: &str, limit: usize) -> Vec<PlaylistEntry> {
        stdout
            .lines()
            .filter_map(|line| serde_json::from_str::<FlatEntry>(line).ok())
            .filter_map(|entry| {
                let url = match (entry.url, entry.id.as_deref()) {
                    (Some(url), _) if url.starts_with("http") => url,
                    (_, Some(id)) => format!("https://www.youtube.com/watch?v={}", id),
                    _ => return None,
                };
                Some(PlaylistEntry {
                    title: entry.title.unwrap_or_else(|| "Unknown Title".to_string()),
                    url,
                })
            })
            .take(limit)
            .collect()
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str, requested_by: UserId) -> Result<Track, ResolveError> {
        let target = if Self::is_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{}", query)
        };

        info!("🔍 Resolviendo: {}", query);

        let stdout = self
            .run(&[
                "--no-playlist",
                "--dump-json",
                "--format",
                "bestaudio/best",
                "--user-agent",
                USER_AGENT,
                "--retries",
                "3",
                "--no-warnings",
                &target,
            ])
            .await?;

        let line = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| ResolveError::NotFound(query.to_string()))?;

        let info: YtDlpInfo =
            serde_json::from_str(line).map_err(|e| ResolveError::Parse(e.to_string()))?;

        Self::info_to_track(info, query, requested_by)
    }

    async fn resolve_playlist(
        &self,
        url: &str,
        limit: usize,
    ) -> Result<Vec<PlaylistEntry>, ResolveError> {
        info!("📋 Obteniendo playlist: {}", url);

        let end = limit.to_string();
        let stdout = self
            .run(&[
                "--flat-playlist",
                "--dump-json",
                "--playlist-end",
                &end,
                "--no-warnings",
                url,
            ])
            .await?;

        let entries = Self::parse_playlist(&stdout, limit);
        if entries.is_empty() {
            return Err(ResolveError::NotFound(url.to_string()));
        }

        Ok(entries)
    }

    fn is_playlist(&self, query: &str) -> bool {
        playlist_regex().is_match(query.trim())
    }
}
