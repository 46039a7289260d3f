//! # Audio Module
//!
//! Per-guild playback control for the bot.
//!
//! ## Architecture
//!
//! Every guild gets one [`session::Session`], looked up through the
//! [`registry::SessionRegistry`]. A session owns its queue and flags behind a
//! single lock and runs up to three background workers:
//!
//! ### [`player`] - Player Loop
//! - Pops tracks in order and resolves playlist entries right before they play
//! - Hands them to the [`sink::AudioSink`] and waits on the completion signal
//! - Applies the [`repeat`] policy after every track
//!
//! ### [`idle`] - Idle Watcher
//! - Polls on a fixed interval and tears the session down after the idle timeout
//!
//! ### [`ingest`] - Bulk Import
//! - Adds a whole playlist while every other mutating command is rejected
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use guild_player::audio::{registry::SessionRegistry, session::{EnqueuePosition, SessionDeps}};
//! use serenity::all::GuildId;
//!
//! # fn example(deps: SessionDeps, track: guild_player::audio::track::Track) -> anyhow::Result<()> {
//! let registry = SessionRegistry::new(deps);
//! let session = registry.get_or_create(GuildId::new(123456789));
//!
//! session.enqueue(track, EnqueuePosition::Back)?;
//! session.ensure_workers();
//! # Ok(())
//! # }
//! ```

pub mod idle;
pub mod ingest;
pub mod player;
pub mod queue;
pub mod registry;
pub mod repeat;
pub mod session;
pub mod signal;
pub mod sink;
pub mod track;

#[cfg(test)]
pub(crate) mod testing;
