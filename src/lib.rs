//! Per-guild Discord music playback: queue, player loop, idle watcher, repeat
//! policy and guarded playlist import, with the Discord glue around them.

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod sources;
pub mod ui;
