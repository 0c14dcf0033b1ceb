//! Ordered play-queue with shuffle/repeat navigation and named persistence.
//!
//! The queue keeps its entries in insertion order and navigates over an
//! *active view*: the identity order, or a random permutation when shuffle is
//! on. The cursor always indexes the active view and is either `None`
//! ("before start") or a valid position in it.
//!
//! Every operation takes the single per-queue mutex for its whole duration,
//! so multi-step transitions (permutation regeneration, cursor translation)
//! are observed atomically by readers.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::seq::SliceRandom;
use tracing::{debug, trace};

use crate::errors::{PlaybackError, Result};
use crate::model::MediaEntry;
use crate::persistence::{PlaylistData, Store};

/// Navigation direction for [`EntryQueue::peek_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

#[derive(Debug, Clone)]
struct QueueItem {
    source_tag: String,
    entry: MediaEntry,
}

#[derive(Debug)]
struct QueueState {
    items: Vec<QueueItem>,
    /// Active view: `order[i]` is the index in `items` of the i-th served entry.
    order: Vec<usize>,
    cursor: Option<usize>,
    repeat: bool,
    shuffle: bool,
}

impl QueueState {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn entry_at(&self, position: usize) -> Option<&MediaEntry> {
        self.order
            .get(position)
            .and_then(|&item| self.items.get(item))
            .map(|item| &item.entry)
    }

    fn identity_order(&mut self) {
        self.order = (0..self.items.len()).collect();
    }

    /// Draws a new permutation, placing `pinned` (an index into `items`) first.
    fn shuffle_order(&mut self, pinned: Option<usize>) {
        let mut order: Vec<usize> = (0..self.items.len()).collect();
        order.shuffle(&mut rand::rng());
        if let Some(pinned) = pinned
            && let Some(pos) = order.iter().position(|&i| i == pinned)
        {
            order.remove(pos);
            order.insert(0, pinned);
        }
        self.order = order;
    }

    /// Position the cursor would reach, and whether reaching it wraps around.
    fn target(&self, direction: Direction) -> Option<(usize, bool)> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        match direction {
            Direction::Next => {
                let candidate = self.cursor.map_or(0, |c| c + 1);
                if candidate < len {
                    Some((candidate, false))
                } else if self.repeat {
                    Some((0, true))
                } else {
                    None
                }
            }
            Direction::Previous => match self.cursor {
                Some(c) if c > 0 => Some((c - 1, false)),
                _ if self.repeat => Some((len - 1, true)),
                _ => None,
            },
        }
    }

    fn step(&mut self, direction: Direction) -> Option<MediaEntry> {
        let Some((position, wraps)) = self.target(direction) else {
            self.cursor = None;
            return None;
        };

        if wraps && self.shuffle {
            // Keep the entry a caller may already have peeked at the wrap position,
            // so that peek and step never disagree.
            let peeked = self.order[position];
            self.shuffle_order(None);
            if let Some(pos) = self.order.iter().position(|&i| i == peeked) {
                self.order.swap(pos, position);
            }
        }

        self.cursor = Some(position);
        self.entry_at(position).cloned()
    }
}

/// Queue of playable entries served to a renderer.
#[derive(Debug)]
pub struct EntryQueue {
    source_tag: String,
    state: Mutex<QueueState>,
}

impl EntryQueue {
    /// Builds a queue from browse results of `source_tag`. Containers are dropped.
    pub fn new(entries: Vec<MediaEntry>, source_tag: impl Into<String>) -> Self {
        let source_tag = source_tag.into();
        let items = entries
            .into_iter()
            .filter(|entry| !entry.is_container())
            .map(|entry| QueueItem {
                source_tag: source_tag.clone(),
                entry,
            })
            .collect();
        Self::from_items(items, source_tag)
    }

    fn from_items(items: Vec<QueueItem>, source_tag: String) -> Self {
        let mut state = QueueState {
            items,
            order: Vec::new(),
            cursor: None,
            repeat: false,
            shuffle: false,
        };
        state.identity_order();
        Self {
            source_tag,
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn source_tag(&self) -> &str {
        &self.source_tag
    }

    /// Advances the cursor and returns the entry it lands on.
    ///
    /// Past the end the cursor goes back before start and `None` is returned,
    /// unless repeat is on, in which case it wraps to the first entry (drawing a
    /// fresh permutation when shuffled).
    pub fn next(&self) -> Option<MediaEntry> {
        let mut state = self.state();
        let entry = state.step(Direction::Next);
        trace!(cursor = ?state.cursor, "Queue next");
        entry
    }

    /// Mirror of [`EntryQueue::next`].
    pub fn previous(&self) -> Option<MediaEntry> {
        let mut state = self.state();
        let entry = state.step(Direction::Previous);
        trace!(cursor = ?state.cursor, "Queue previous");
        entry
    }

    /// Position `next()`/`previous()` would move to, without moving.
    pub fn peek_index(&self, direction: Direction) -> Option<usize> {
        self.state().target(direction).map(|(position, _)| position)
    }

    /// Entry `next()`/`previous()` would return, without moving.
    pub fn peek(&self, direction: Direction) -> Option<MediaEntry> {
        let state = self.state();
        let (position, _) = state.target(direction)?;
        state.entry_at(position).cloned()
    }

    /// Entry at `index` in the active view.
    pub fn get(&self, index: usize) -> Option<MediaEntry> {
        self.state().entry_at(index).cloned()
    }

    pub fn current(&self) -> Option<MediaEntry> {
        let state = self.state();
        state.cursor.and_then(|c| state.entry_at(c)).cloned()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.state().cursor
    }

    /// Switches shuffle on or off.
    ///
    /// On: a new permutation is drawn with the current entry (if any) moved to
    /// the front and the cursor on it; with no current entry the cursor stays
    /// before start. Off: the cursor follows the same entry back to its
    /// insertion position.
    pub fn set_shuffle(&self, shuffle: bool) {
        let mut state = self.state();
        let current = state.cursor.map(|c| state.order[c]);

        if shuffle {
            state.shuffle_order(current);
            state.cursor = current.map(|_| 0);
        } else {
            state.identity_order();
            state.cursor = current;
        }
        state.shuffle = shuffle;
        debug!(shuffle, cursor = ?state.cursor, "Queue shuffle changed");
    }

    pub fn set_repeat(&self, repeat: bool) {
        self.state().repeat = repeat;
    }

    pub fn repeat(&self) -> bool {
        self.state().repeat
    }

    pub fn shuffle(&self) -> bool {
        self.state().shuffle
    }

    /// Puts the cursor back before start; a shuffled queue is reshuffled.
    pub fn reset(&self) {
        let mut state = self.state();
        state.cursor = None;
        if state.shuffle {
            state.shuffle_order(None);
        }
    }

    pub fn size(&self) -> usize {
        self.state().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().items.is_empty()
    }

    pub fn has_next(&self) -> bool {
        let state = self.state();
        let len = state.len();
        if state.repeat && len > 0 {
            return true;
        }
        state.cursor.map_or(len > 0, |c| c + 1 < len)
    }

    pub fn has_previous(&self) -> bool {
        let state = self.state();
        if state.repeat && state.len() > 0 {
            return true;
        }
        state.cursor.is_some_and(|c| c > 0)
    }

    /// Entries in the active view order.
    pub fn entries(&self) -> Vec<MediaEntry> {
        let state = self.state();
        state
            .order
            .iter()
            .map(|&i| state.items[i].entry.clone())
            .collect()
    }

    fn grouped(&self) -> PlaylistData {
        let state = self.state();
        let mut data = PlaylistData::new();
        for item in &state.items {
            data.entry(item.source_tag.clone())
                .or_default()
                .push(item.entry.clone());
        }
        data
    }

    /// Persists the queue under `name`, grouped by source tag.
    ///
    /// With `append`, entries already saved under `name` are kept and an entry of
    /// this queue replaces the saved entry designating the same object.
    pub fn save(&self, name: &str, append: bool, store: &dyn Store) -> Result<()> {
        let mut data = self.grouped();

        if append {
            match store.load(name) {
                Ok(existing) => data = merge_playlists(existing, data),
                Err(PlaybackError::PlaylistNotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }

        store.save(name, &data)?;
        debug!(
            playlist = name,
            append,
            entries = data.values().map(Vec::len).sum::<usize>(),
            "Queue saved"
        );
        Ok(())
    }

    /// Restores a queue saved under `name`, optionally keeping only one source.
    ///
    /// The restored queue starts before its first entry, with repeat and
    /// shuffle off.
    pub fn load(name: &str, source_filter: Option<&str>, store: &dyn Store) -> Result<Self> {
        let data = store.load(name)?;

        let tag = match source_filter {
            Some(tag) => tag.to_string(),
            None if data.len() == 1 => data.keys().next().cloned().unwrap_or_default(),
            None => String::new(),
        };

        let items: Vec<QueueItem> = data
            .into_iter()
            .filter(|(source, _)| source_filter.is_none_or(|filter| filter == source))
            .flat_map(|(source_tag, entries)| {
                entries
                    .into_iter()
                    .filter(|entry| !entry.is_container())
                    .map(move |entry| QueueItem {
                        source_tag: source_tag.clone(),
                        entry,
                    })
            })
            .collect();

        debug!(playlist = name, source = ?source_filter, entries = items.len(), "Queue loaded");
        Ok(Self::from_items(items, tag))
    }
}

fn merge_playlists(mut existing: PlaylistData, incoming: PlaylistData) -> PlaylistData {
    for (source, entries) in incoming {
        let merged = existing.entry(source).or_default();
        for entry in entries {
            match merged.iter().position(|old| old.same_object(&entry)) {
                Some(pos) => merged[pos] = entry,
                None => merged.push(entry),
            }
        }
    }
    existing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    fn track(id: &str) -> MediaEntry {
        MediaEntry::item(id, "album", format!("Track {id}"))
            .with_resource(format!("http://server/{id}.flac"), "http-get:*:audio/flac:*")
    }

    fn queue(ids: &[&str]) -> EntryQueue {
        EntryQueue::new(ids.iter().map(|id| track(id)).collect(), "server-1")
    }

    fn id(entry: Option<MediaEntry>) -> Option<String> {
        entry.map(|e| e.id().to_string())
    }

    #[test]
    fn containers_are_not_queued() {
        let q = EntryQueue::new(
            vec![track("1"), MediaEntry::container("c", "0", "Folder"), track("2")],
            "s",
        );
        assert_eq!(q.size(), 2);
        assert_eq!(q.cursor(), None);
    }

    #[test]
    fn next_walks_then_reports_end_once() {
        let q = queue(&["1", "2", "3"]);
        assert_eq!(id(q.next()).as_deref(), Some("1"));
        assert_eq!(id(q.next()).as_deref(), Some("2"));
        assert_eq!(id(q.next()).as_deref(), Some("3"));
        assert_eq!(q.next(), None);
        assert_eq!(q.cursor(), None);
        assert_eq!(id(q.next()).as_deref(), Some("1"));
    }

    #[test]
    fn previous_from_start_without_repeat() {
        let q = queue(&["1", "2"]);
        assert_eq!(q.previous(), None);
        q.next();
        assert_eq!(q.previous(), None);
        assert_eq!(q.cursor(), None);
    }

    #[test]
    fn repeat_wraps_both_ways() {
        let q = queue(&["1", "2", "3"]);
        q.set_repeat(true);
        assert_eq!(id(q.previous()).as_deref(), Some("3"));
        assert_eq!(id(q.next()).as_deref(), Some("1"));
        for _ in 0..10 {
            assert!(q.next().is_some());
            assert!(q.previous().is_some());
            assert!(q.next().is_some());
        }
    }

    #[test]
    fn empty_queue_never_serves() {
        let q = queue(&[]);
        q.set_repeat(true);
        assert_eq!(q.next(), None);
        assert_eq!(q.previous(), None);
        assert_eq!(q.cursor(), None);
        assert!(!q.has_next());
        assert!(!q.has_previous());
        q.set_shuffle(true);
        assert_eq!(q.cursor(), None);
    }

    #[test]
    fn cursor_stays_in_bounds_without_repeat() {
        let q = queue(&["1", "2", "3"]);
        let moves = [true, true, false, true, true, true, true, false, false, false, false];
        for forward in moves {
            if forward {
                q.next();
            } else {
                q.previous();
            }
            assert!(q.cursor().is_none_or(|c| c < q.size()));
        }
    }

    #[test]
    fn has_next_and_previous_follow_cursor() {
        let q = queue(&["1", "2"]);
        assert!(q.has_next());
        assert!(!q.has_previous());
        q.next();
        assert!(q.has_next());
        q.next();
        assert!(!q.has_next());
        assert!(q.has_previous());
        q.set_repeat(true);
        assert!(q.has_next());
    }

    #[test]
    fn peek_does_not_move() {
        let q = queue(&["1", "2", "3"]);
        q.next();
        assert_eq!(q.peek_index(Direction::Next), Some(1));
        assert_eq!(id(q.peek(Direction::Next)).as_deref(), Some("2"));
        assert_eq!(q.peek_index(Direction::Previous), None);
        assert_eq!(q.cursor(), Some(0));
    }

    #[test]
    fn shuffle_on_keeps_current_first() {
        let q = queue(&["1", "2", "3", "4", "5", "6"]);
        q.next();
        q.next();
        q.set_shuffle(true);
        assert_eq!(q.cursor(), Some(0));
        assert_eq!(id(q.current()).as_deref(), Some("2"));
        assert_eq!(q.size(), 6);
    }

    #[test]
    fn shuffle_on_before_start_keeps_cursor_unset() {
        let q = queue(&["1", "2", "3"]);
        q.set_shuffle(true);
        assert_eq!(q.cursor(), None);
    }

    #[test]
    fn shuffle_round_trip_restores_entry() {
        for steps in 0..4 {
            let q = queue(&["1", "2", "3", "4"]);
            for _ in 0..steps {
                q.next();
            }
            let before = id(q.current());
            q.set_shuffle(true);
            q.set_shuffle(false);
            assert_eq!(id(q.current()), before);
        }
    }

    #[test]
    fn shuffle_off_after_moving_maps_back_to_insertion_index() {
        let q = queue(&["1", "2", "3", "4", "5"]);
        q.set_shuffle(true);
        q.next();
        q.next();
        let current = q.current().unwrap();
        q.set_shuffle(false);
        let expected: usize = current.id().parse::<usize>().unwrap() - 1;
        assert_eq!(q.cursor(), Some(expected));
    }

    #[test]
    fn shuffled_wrap_serves_the_peeked_entry() {
        let q = queue(&["1", "2", "3", "4", "5"]);
        q.set_repeat(true);
        q.set_shuffle(true);
        for _ in 0..5 {
            q.next();
        }
        for _ in 0..20 {
            let peeked = q.peek(Direction::Next);
            assert_eq!(q.next(), peeked);
        }
    }

    #[test]
    fn shuffled_view_is_a_permutation() {
        let q = queue(&["1", "2", "3", "4", "5"]);
        q.set_shuffle(true);
        let mut ids: Vec<String> = q.entries().iter().map(|e| e.id().to_string()).collect();
        ids.sort();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn reset_goes_before_start() {
        let q = queue(&["1", "2"]);
        q.next();
        q.reset();
        assert_eq!(q.cursor(), None);
        assert_eq!(id(q.next()).as_deref(), Some("1"));
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = MemoryStore::new();
        let q = queue(&["1", "2", "3"]);
        q.save("x", false, &store).unwrap();

        let restored = EntryQueue::load("x", None, &store).unwrap();
        assert_eq!(restored.entries(), q.entries());
        assert_eq!(restored.cursor(), None);
        assert_eq!(restored.source_tag(), "server-1");
    }

    #[test]
    fn append_replaces_same_ids_and_adds_new() {
        let store = MemoryStore::new();
        queue(&["A", "B"]).save("x", false, &store).unwrap();

        let b_prime = MediaEntry::item("B", "album", "B prime")
            .with_resource("http://server/B2.flac", "http-get:*:audio/flac:*");
        EntryQueue::new(vec![b_prime, track("C")], "server-1")
            .save("x", true, &store)
            .unwrap();

        let restored = EntryQueue::load("x", None, &store).unwrap().entries();
        let ids: Vec<&str> = restored.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(restored[1].title(), "B prime");
    }

    #[test]
    fn append_to_missing_playlist_saves_plainly() {
        let store = MemoryStore::new();
        queue(&["1"]).save("fresh", true, &store).unwrap();
        assert_eq!(EntryQueue::load("fresh", None, &store).unwrap().size(), 1);
    }

    #[test]
    fn load_filters_by_source() {
        let store = MemoryStore::new();
        queue(&["1", "2"]).save("mix", false, &store).unwrap();
        EntryQueue::new(vec![track("9")], "server-2")
            .save("mix", true, &store)
            .unwrap();

        assert_eq!(EntryQueue::load("mix", None, &store).unwrap().size(), 3);
        let only = EntryQueue::load("mix", Some("server-2"), &store).unwrap();
        assert_eq!(only.size(), 1);
        assert_eq!(only.source_tag(), "server-2");
        assert_eq!(EntryQueue::load("mix", Some("other"), &store).unwrap().size(), 0);
    }

    #[test]
    fn load_missing_is_an_error() {
        let store = MemoryStore::new();
        assert!(matches!(
            EntryQueue::load("none", None, &store),
            Err(PlaybackError::PlaylistNotFound(_))
        ));
    }
}
