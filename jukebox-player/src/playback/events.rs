//! Session worker inputs and command outcomes
//!
//! Everything a session reacts to arrives on one ordered stream of
//! [`SessionEvent`]s: user commands, sink completions and resolution results.

use jukebox_common::{RequesterId, Song};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::audio::PlaybackEnd;
use crate::error::Result;
use crate::resolver::ResolveError;

/// Reply channel for one command
pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

/// One entry on a session's ordered event stream
pub(crate) enum SessionEvent {
    Command(Command),

    /// Release the sink and end the worker
    Disconnect { reply: oneshot::Sender<()> },

    /// Sink reported the end of the song started under `generation`
    SinkCompleted { generation: u64, end: PlaybackEnd },

    /// A request's resolution finished
    Resolved {
        ticket: u64,
        result: std::result::Result<Song, ResolveError>,
    },
}

/// User-issued commands
pub(crate) enum Command {
    Join {
        reply: Reply<()>,
    },
    Request {
        query: String,
        requester: RequesterId,
        reply: Reply<RequestOutcome>,
    },
    Pause {
        reply: Reply<()>,
    },
    Resume {
        reply: Reply<()>,
    },
    /// `target` is the generation that was playing when the skip was issued
    Skip {
        target: Option<u64>,
        reply: Reply<SkipOutcome>,
    },
    Stop {
        reply: Reply<()>,
    },
    SetVolume {
        level: i64,
        reply: Reply<u8>,
    },
    SetLoop {
        loop_current: Option<bool>,
        loop_queue: Option<bool>,
        reply: Reply<(bool, bool)>,
    },
    Remove {
        position: usize,
        reply: Reply<Song>,
    },
    Move {
        from: usize,
        to: usize,
        reply: Reply<Song>,
    },
    Shuffle {
        reply: Reply<usize>,
    },
    ClearQueue {
        reply: Reply<usize>,
    },
}

/// What happened to a song request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestOutcome {
    /// Song became current and started
    NowPlaying { song: Song },

    /// Song joined the pending queue at a 1-based position
    Queued { song: Song, position: usize },

    /// Song resolved but was passed over, by a skip or a sink failure
    Skipped { song: Song, reason: String },

    /// Stop or disconnect arrived before the song resolved
    Cancelled,
}

impl RequestOutcome {
    pub fn song(&self) -> Option<&Song> {
        match self {
            RequestOutcome::NowPlaying { song }
            | RequestOutcome::Queued { song, .. }
            | RequestOutcome::Skipped { song, .. } => Some(song),
            RequestOutcome::Cancelled => None,
        }
    }
}

/// What a skip did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SkipOutcome {
    /// The playing song was stopped; the queue advances on its completion
    Skipped { song: Song },

    /// Nothing was playing yet; the song being resolved will be passed over
    Deferred,

    /// The song the skip targeted had already ended
    AlreadyApplied,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serialization() {
        let song = Song::new("Intro", "loc", RequesterId::new("u1"));
        let json = serde_json::to_value(RequestOutcome::Queued {
            song: song.clone(),
            position: 2,
        })
        .unwrap();
        assert_eq!(json["outcome"], "queued");
        assert_eq!(json["position"], 2);
        assert_eq!(json["song"]["title"], "Intro");

        let json = serde_json::to_value(SkipOutcome::AlreadyApplied).unwrap();
        assert_eq!(json["outcome"], "already_applied");
    }

    #[test]
    fn test_outcome_song_accessor() {
        let song = Song::new("Intro", "loc", RequesterId::new("u1"));
        assert_eq!(
            RequestOutcome::NowPlaying { song: song.clone() }.song(),
            Some(&song)
        );
        assert_eq!(RequestOutcome::Cancelled.song(), None);
    }
}
