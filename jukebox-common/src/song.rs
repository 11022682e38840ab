//! Song metadata record
//!
//! A `Song` is produced by a resolver from a user query and is never mutated
//! afterwards. Two requests for the same track produce two equal but distinct
//! values; nothing in the scheduler relies on identity beyond equality.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::human_time::format_duration_opt;

/// Identity of the user who requested a song
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequesterId(String);

impl RequesterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequesterId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One playable item plus the identity of whoever asked for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    /// Display title
    pub title: String,

    /// Locator handed to the audio sink (URL or file path)
    pub stream_locator: String,

    /// Length in whole seconds, when the resolver knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    /// Who requested this song
    pub requester: RequesterId,
}

impl Song {
    /// Create a song with only the required fields set
    pub fn new(
        title: impl Into<String>,
        stream_locator: impl Into<String>,
        requester: RequesterId,
    ) -> Self {
        Self {
            title: title.into(),
            stream_locator: stream_locator.into(),
            duration_seconds: None,
            uploader: None,
            thumbnail_url: None,
            requester,
        }
    }

    pub fn with_duration(mut self, seconds: u64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn with_uploader(mut self, uploader: impl Into<String>) -> Self {
        self.uploader = Some(uploader.into());
        self
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    /// Duration formatted as `m:ss`, or "live" when unknown
    pub fn display_duration(&self) -> String {
        format_duration_opt(self.duration_seconds)
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.uploader {
            Some(uploader) => write!(f, "{} - {}", self.title, uploader),
            None => f.write_str(&self.title),
        }
    }
}
