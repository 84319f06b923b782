//! The logical playback queue owned by the orchestrator
//!
//! The native session only ever holds an ordered subset of these entries (the
//! ones marked [`EntryState::Loaded`]). Entries are matched against the native
//! queue by track identifier, never by position.

use super::track::{PlaybackSource, Track};

/// Load state of a queue entry with respect to the native session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryState {
    /// Not resolved yet.
    Pending,
    /// A resolver call is in flight.
    Resolving,
    /// Stream URL known, not in the native session.
    Resolved,
    /// Present in the native session queue.
    Loaded,
    /// Resolution failed after a retry. Navigation skips it.
    Failed,
}

#[derive(Clone, Debug)]
pub struct QueueEntry {
    pub track: Track,
    pub state: EntryState,
}

#[derive(Clone, Debug)]
pub struct LogicalQueue {
    entries: Vec<QueueEntry>,
    current: Option<usize>,
    source: PlaybackSource,
    generation: u64,
}

impl LogicalQueue {
    /// `source_list[start_index..]`, with nothing current yet.
    ///
    /// Callers validate `start_index` first; an out-of-range index yields an empty queue.
    pub fn from_slice(source_list: &[Track], start_index: usize, source: PlaybackSource, generation: u64) -> Self {
        let entries = source_list
            .get(start_index..)
            .unwrap_or_default()
            .iter()
            .map(|track| QueueEntry {
                state: if track.is_resolved() { EntryState::Resolved } else { EntryState::Pending },
                track: track.clone(),
            })
            .collect();

        Self {
            entries,
            current: None,
            source,
            generation,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn source(&self) -> &PlaybackSource {
        &self.source
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.and_then(|i| self.track(i))
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.entries.get(index).map(|e| &e.track)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.entries.iter().map(|e| &e.track)
    }

    pub fn state(&self, index: usize) -> Option<EntryState> {
        self.entries.get(index).map(|e| e.state)
    }

    /// Points the queue at `index`. Out-of-range indices are ignored.
    pub fn set_current(&mut self, index: usize) -> bool {
        if index < self.entries.len() {
            self.current = Some(index);
            true
        } else {
            false
        }
    }

    /// Drops the current pointer (idle), keeping the entries.
    pub fn clear_current(&mut self) {
        self.current = None;
    }

    pub fn set_state(&mut self, index: usize, state: EntryState) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.state = state;
        }
    }

    /// Replaces the entry with its resolved version.
    pub fn store_resolved(&mut self, index: usize, track: Track) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.track = track;
            entry.state = EntryState::Resolved;
        }
    }

    pub fn mark_loaded(&mut self, index: usize) {
        self.set_state(index, EntryState::Loaded);
    }

    /// The native session was reset: nothing is loaded anymore, resolved tracks are kept.
    pub fn unload_all(&mut self) {
        for entry in &mut self.entries {
            if entry.state == EntryState::Loaded {
                entry.state = EntryState::Resolved;
            }
        }
    }

    /// Highest index currently loaded in the native session.
    pub fn last_loaded(&self) -> Option<usize> {
        self.entries.iter().rposition(|e| e.state == EntryState::Loaded)
    }

    /// Loaded tracks in logical order, as the native queue should hold them.
    pub fn loaded_tracks(&self) -> Vec<Track> {
        self.entries
            .iter()
            .filter(|e| e.state == EntryState::Loaded)
            .map(|e| e.track.clone())
            .collect()
    }

    /// Finds `track_id`, preferring the nearest match at or after the current entry.
    ///
    /// The same song can appear twice in a list; the search wraps so that an
    /// earlier duplicate is only picked when nothing matches further ahead.
    pub fn find(&self, track_id: &str) -> Option<usize> {
        let len = self.entries.len();
        let start = self.current.unwrap_or(0);
        (0..len)
            .map(|offset| (start + offset) % len)
            .find(|&i| self.entries[i].track.id == track_id)
    }

    /// First non-failed entry after `index`.
    pub fn next_playable_after(&self, index: usize) -> Option<usize> {
        (index + 1..self.entries.len()).find(|&i| self.entries[i].state != EntryState::Failed)
    }

    /// Last non-failed entry before `index`.
    pub fn previous_playable_before(&self, index: usize) -> Option<usize> {
        (0..index.min(self.entries.len()))
            .rev()
            .find(|&i| self.entries[i].state != EntryState::Failed)
    }

    /// First non-failed entry of the queue.
    pub fn first_playable(&self) -> Option<usize> {
        (0..self.entries.len()).find(|&i| self.entries[i].state != EntryState::Failed)
    }

    /// Entries after the current one that are loaded, resolved or being resolved.
    pub fn pipeline_ahead(&self) -> usize {
        let Some(current) = self.current else {
            return 0;
        };
        self.entries
            .iter()
            .skip(current + 1)
            .filter(|e| matches!(e.state, EntryState::Loaded | EntryState::Resolved | EntryState::Resolving))
            .count()
    }

    /// Entries after the current one that still need a resolver call, at most `limit`.
    ///
    /// Only entries past the last loaded one are considered: the native queue is
    /// appended to, so earlier gaps are filled on demand when navigated to.
    pub fn prefetch_candidates(&self, limit: usize) -> Vec<usize> {
        let Some(current) = self.current else {
            return Vec::new();
        };
        let from = self.last_loaded().map_or(current, |l| l.max(current)) + 1;
        (from..self.entries.len())
            .filter(|&i| self.entries[i].state == EntryState::Pending)
            .take(limit)
            .collect()
    }

    /// Resolved entries that can be appended to the native queue right now, in order.
    ///
    /// Walks forward from the last loaded entry, stepping over failed ones, and
    /// stops at the first entry that is still pending or resolving.
    pub fn appendable(&self) -> Vec<usize> {
        let from = self.last_loaded().map_or(0, |l| l + 1);
        let mut ready = Vec::new();
        for i in from..self.entries.len() {
            match self.entries[i].state {
                EntryState::Resolved => ready.push(i),
                EntryState::Failed => continue,
                EntryState::Pending | EntryState::Resolving | EntryState::Loaded => break,
            }
        }
        ready
    }
}
