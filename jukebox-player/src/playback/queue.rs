//! Queue engine
//!
//! Per-session pending queue plus the current song and the two loop flags.
//! Everything here is synchronous and free of I/O: the session worker is the
//! only caller, so the engine needs no locking of its own.
//!
//! Advancement rules:
//! - loop_current with a current song: current is returned unchanged
//! - empty pending: current becomes None
//! - otherwise the pending head becomes current, and with loop_queue the
//!   outgoing current is appended to the tail
//!
//! Flags are read fresh on every call; toggling them never rewrites history.

use crate::error::{Error, Result};
use jukebox_common::Song;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;

/// Pending songs, the current song and the loop policy of one session
#[derive(Debug, Default)]
pub struct QueueEngine {
    /// Songs waiting to become current, head first
    pending: VecDeque<Song>,

    /// Song presumed playing or about to play
    current: Option<Song>,

    /// Song that most recently left `current`
    previous: Option<Song>,

    loop_current: bool,
    loop_queue: bool,
}

impl QueueEngine {
    /// Create new empty queue engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail of the pending queue
    ///
    /// Returns the 1-based position of the new entry.
    pub fn enqueue(&mut self, song: Song) -> usize {
        self.pending.push_back(song);
        self.pending.len()
    }

    /// Decide what plays next and make it current
    pub fn advance(&mut self) -> Option<Song> {
        if self.loop_current {
            if let Some(current) = &self.current {
                return Some(current.clone());
            }
        }

        let Some(next) = self.pending.pop_front() else {
            if let Some(outgoing) = self.current.take() {
                self.previous = Some(outgoing);
            }
            return None;
        };

        if let Some(outgoing) = self.current.take() {
            if self.loop_queue {
                self.pending.push_back(outgoing.clone());
            }
            self.previous = Some(outgoing);
        }

        self.current = Some(next.clone());
        Some(next)
    }

    /// Drop a current song that failed and promote the pending head
    ///
    /// Loop flags are ignored: a broken song is neither held by loop_current
    /// nor recycled by loop_queue, so a failing entry cannot stall the queue.
    pub fn advance_past_failure(&mut self) -> Option<Song> {
        if let Some(failed) = self.current.take() {
            self.previous = Some(failed);
        }
        self.current = self.pending.pop_front();
        self.current.clone()
    }

    /// Forget the current song without promoting anything
    pub fn drop_current(&mut self) -> Option<Song> {
        let dropped = self.current.take();
        if let Some(song) = &dropped {
            self.previous = Some(song.clone());
        }
        dropped
    }

    /// Make a newly requested song current on an engine with nothing current
    ///
    /// With an empty pending queue the song becomes current directly and never
    /// touches `pending`. Songs already waiting keep their turn: the request
    /// joins the tail and the head is promoted instead.
    pub fn begin(&mut self, song: Song) -> Option<Song> {
        if self.current.is_some() {
            self.pending.push_back(song);
            return self.current.clone();
        }

        if self.pending.is_empty() {
            self.current = Some(song.clone());
            return Some(song);
        }

        self.pending.push_back(song);
        self.advance()
    }

    /// Empty the pending queue and forget the current song
    pub fn clear(&mut self) {
        self.pending.clear();
        self.current = None;
    }

    /// Empty the pending queue only, keeping the current song
    ///
    /// Returns how many entries were removed.
    pub fn clear_pending(&mut self) -> usize {
        let removed = self.pending.len();
        self.pending.clear();
        removed
    }

    /// Remove a pending entry by 1-based position
    pub fn remove(&mut self, position: usize) -> Result<Song> {
        let index = self.index_for(position)?;
        self.pending
            .remove(index)
            .ok_or(Error::InvalidPosition {
                position,
                len: self.pending.len(),
            })
    }

    /// Move a pending entry between 1-based positions
    ///
    /// Returns the moved song.
    pub fn move_song(&mut self, from: usize, to: usize) -> Result<Song> {
        let from_index = self.index_for(from)?;
        let to_index = self.index_for(to)?;

        let song = self.pending.remove(from_index).ok_or(Error::InvalidPosition {
            position: from,
            len: self.pending.len(),
        })?;
        self.pending.insert(to_index, song.clone());
        Ok(song)
    }

    /// Shuffle the pending queue in place
    ///
    /// Returns the number of shuffled entries.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<usize> {
        if self.pending.is_empty() {
            return Err(Error::EmptyQueue);
        }
        self.pending.make_contiguous().shuffle(rng);
        Ok(self.pending.len())
    }

    pub fn set_loop_current(&mut self, enabled: bool) {
        self.loop_current = enabled;
    }

    pub fn set_loop_queue(&mut self, enabled: bool) {
        self.loop_queue = enabled;
    }

    pub fn loop_current(&self) -> bool {
        self.loop_current
    }

    pub fn loop_queue(&self) -> bool {
        self.loop_queue
    }

    /// Get current song
    pub fn peek_current(&self) -> Option<&Song> {
        self.current.as_ref()
    }

    /// Song that most recently left `current`
    pub fn previous(&self) -> Option<&Song> {
        self.previous.as_ref()
    }

    /// Copy of the pending queue, head first
    pub fn pending_snapshot(&self) -> Vec<Song> {
        self.pending.iter().cloned().collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Check if there is neither a current song nor anything pending
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.pending.is_empty()
    }

    fn index_for(&self, position: usize) -> Result<usize> {
        if position == 0 || position > self.pending.len() {
            return Err(Error::InvalidPosition {
                position,
                len: self.pending.len(),
            });
        }
        Ok(position - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jukebox_common::RequesterId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn song(title: &str) -> Song {
        Song::new(title, format!("loc://{}", title), RequesterId::new("tester"))
    }

    fn titles(songs: &[Song]) -> Vec<&str> {
        songs.iter().map(|s| s.title.as_str()).collect()
    }

    fn engine_with(names: &[&str]) -> QueueEngine {
        let mut engine = QueueEngine::new();
        for name in names {
            engine.enqueue(song(name));
        }
        engine
    }

    #[test]
    fn test_enqueue_returns_one_based_position() {
        let mut engine = QueueEngine::new();
        assert_eq!(engine.enqueue(song("A")), 1);
        assert_eq!(engine.enqueue(song("B")), 2);
        assert_eq!(engine.enqueue(song("A")), 3);
        assert_eq!(engine.pending_len(), 3);
    }

    #[test]
    fn test_advance_is_fifo_then_none() {
        let mut engine = engine_with(&["A", "B", "C"]);

        for expected in ["A", "B", "C"] {
            let next = engine.advance().unwrap();
            assert_eq!(next.title, expected);
            assert_eq!(engine.peek_current().unwrap().title, expected);
        }

        assert!(engine.advance().is_none());
        assert!(engine.peek_current().is_none());
        assert_eq!(engine.previous().unwrap().title, "C");
    }

    #[test]
    fn test_advance_on_fresh_engine() {
        let mut engine = QueueEngine::new();
        assert!(engine.advance().is_none());
        assert!(engine.peek_current().is_none());
        assert!(engine.previous().is_none());
        assert!(engine.is_empty());
    }

    #[test]
    fn test_pending_never_contains_current() {
        let mut engine = engine_with(&["A", "B"]);
        engine.set_loop_queue(true);

        for _ in 0..6 {
            let current = engine.advance().unwrap();
            assert!(!engine.pending_snapshot().contains(&current));
            assert_eq!(engine.pending_len(), 1);
        }
    }

    #[test]
    fn test_loop_current_holds_song() {
        let mut engine = engine_with(&["A", "B"]);
        engine.advance();
        engine.set_loop_current(true);

        for _ in 0..5 {
            assert_eq!(engine.advance().unwrap().title, "A");
        }
        assert_eq!(titles(&engine.pending_snapshot()), vec!["B"]);
    }

    #[test]
    fn test_loop_current_with_empty_pending() {
        let mut engine = engine_with(&["A"]);
        engine.set_loop_current(true);
        engine.advance();

        for _ in 0..3 {
            assert_eq!(engine.advance().unwrap().title, "A");
        }
        assert_eq!(engine.pending_len(), 0);
    }

    #[test]
    fn test_loop_current_without_current_falls_through() {
        let mut engine = engine_with(&["A"]);
        engine.set_loop_current(true);

        assert_eq!(engine.advance().unwrap().title, "A");
    }

    #[test]
    fn test_loop_queue_cycles() {
        let mut engine = engine_with(&["A", "B"]);
        engine.set_loop_queue(true);

        let sequence: Vec<String> = (0..3).map(|_| engine.advance().unwrap().title).collect();
        assert_eq!(sequence, vec!["A", "B", "A"]);
        assert_eq!(titles(&engine.pending_snapshot()), vec!["B"]);
    }

    #[test]
    fn test_loop_queue_single_song_ends() {
        let mut engine = engine_with(&["A"]);
        engine.set_loop_queue(true);

        assert_eq!(engine.advance().unwrap().title, "A");
        // empty pending is checked before the outgoing song is recycled
        assert!(engine.advance().is_none());
    }

    #[test]
    fn test_both_flags_hold_current() {
        let mut engine = engine_with(&["A", "B"]);
        engine.set_loop_current(true);
        engine.set_loop_queue(true);

        engine.advance();
        assert_eq!(engine.advance().unwrap().title, "A");
        assert_eq!(titles(&engine.pending_snapshot()), vec!["B"]);

        // turning loop_current off lets queue looping take over
        engine.set_loop_current(false);
        assert_eq!(engine.advance().unwrap().title, "B");
        assert_eq!(titles(&engine.pending_snapshot()), vec!["A"]);
    }

    #[test]
    fn test_clear_ignores_flags() {
        let mut engine = engine_with(&["A", "B", "C"]);
        engine.set_loop_current(true);
        engine.set_loop_queue(true);
        engine.advance();

        engine.clear();
        assert!(engine.peek_current().is_none());
        assert!(engine.pending_snapshot().is_empty());
        assert!(engine.advance().is_none());
    }

    #[test]
    fn test_advance_past_failure_ignores_loop_flags() {
        let mut engine = engine_with(&["A", "B"]);
        engine.set_loop_current(true);
        engine.set_loop_queue(true);
        engine.advance();

        assert_eq!(engine.advance_past_failure().unwrap().title, "B");
        assert!(engine.pending_snapshot().is_empty());
        assert!(engine.advance_past_failure().is_none());
        assert_eq!(engine.previous().unwrap().title, "B");
    }

    #[test]
    fn test_drop_current_keeps_pending() {
        let mut engine = engine_with(&["A", "B"]);
        engine.advance();

        assert_eq!(engine.drop_current().unwrap().title, "A");
        assert!(engine.peek_current().is_none());
        assert_eq!(titles(&engine.pending_snapshot()), vec!["B"]);
        assert_eq!(engine.previous().unwrap().title, "A");
    }

    #[test]
    fn test_begin_on_idle_engine_skips_pending() {
        let mut engine = QueueEngine::new();
        assert_eq!(engine.begin(song("A")).unwrap().title, "A");
        assert_eq!(engine.pending_len(), 0);
    }

    #[test]
    fn test_begin_respects_waiting_songs() {
        let mut engine = engine_with(&["A"]);
        assert_eq!(engine.begin(song("B")).unwrap().title, "A");
        assert_eq!(titles(&engine.pending_snapshot()), vec!["B"]);
    }

    #[test]
    fn test_clear_pending_keeps_current() {
        let mut engine = engine_with(&["A", "B", "C"]);
        engine.advance();

        assert_eq!(engine.clear_pending(), 2);
        assert_eq!(engine.peek_current().unwrap().title, "A");
        assert_eq!(engine.pending_len(), 0);
    }

    #[test]
    fn test_remove_by_position() {
        let mut engine = engine_with(&["A", "B", "C"]);

        assert_eq!(engine.remove(2).unwrap().title, "B");
        assert_eq!(titles(&engine.pending_snapshot()), vec!["A", "C"]);

        assert!(matches!(
            engine.remove(0),
            Err(Error::InvalidPosition { position: 0, len: 2 })
        ));
        assert!(matches!(
            engine.remove(3),
            Err(Error::InvalidPosition { position: 3, len: 2 })
        ));
    }

    #[test]
    fn test_move_song() {
        let mut engine = engine_with(&["A", "B", "C", "D"]);

        assert_eq!(engine.move_song(4, 1).unwrap().title, "D");
        assert_eq!(titles(&engine.pending_snapshot()), vec!["D", "A", "B", "C"]);

        assert_eq!(engine.move_song(1, 3).unwrap().title, "D");
        assert_eq!(titles(&engine.pending_snapshot()), vec!["A", "B", "D", "C"]);

        assert!(engine.move_song(1, 5).is_err());
        assert_eq!(titles(&engine.pending_snapshot()), vec!["A", "B", "D", "C"]);
    }

    #[test]
    fn test_shuffle_keeps_entries() {
        let mut engine = engine_with(&["A", "B", "C", "D", "E"]);
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(engine.shuffle(&mut rng).unwrap(), 5);

        let mut shuffled: Vec<String> =
            engine.pending_snapshot().into_iter().map(|s| s.title).collect();
        shuffled.sort();
        assert_eq!(shuffled, vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_shuffle_empty_queue() {
        let mut engine = QueueEngine::new();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(engine.shuffle(&mut rng), Err(Error::EmptyQueue)));
    }
}
