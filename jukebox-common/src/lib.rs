//! # Jukebox Common Library
//!
//! Shared code for the jukebox crates:
//! - Song metadata and requester identity
//! - Event types (JukeboxEvent enum) and the broadcast EventBus
//! - Bootstrap configuration loading
//! - Duration formatting for status output

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod song;

pub use error::{Error, Result};
pub use song::{RequesterId, Song};
