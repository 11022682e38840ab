//! # Jukebox Player Library (jukebox-player)
//!
//! Multi-session playback scheduler: each session owns a pending queue, a
//! current song and loop policy, and drives one audio sink through a
//! play, complete, advance loop.
//!
//! **Architecture:** one tokio task per session behind a cloneable
//! [`PlaybackController`](playback::PlaybackController) handle, sessions
//! looked up through a [`SessionRegistry`](registry::SessionRegistry), and an
//! axum HTTP/SSE front end.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod registry;
pub mod resolver;

pub use error::{Error, Result};
pub use registry::{SessionKey, SessionRegistry};
