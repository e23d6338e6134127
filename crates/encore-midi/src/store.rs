//! Thread-safe tick → pitch → note store.
//!
//! One instance holds the performer's history, another holds the notes
//! scheduled for output. Readers (emission, corpus rebuild) share a
//! `parking_lot::RwLock`; appends take it exclusively. Writes are append-only:
//! a note already stored at a (tick, pitch) slot is never replaced.

use crate::error::Result;
use crate::note::{Note, Tick};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Notes sounding at one tick, keyed by pitch.
pub type TickNotes = BTreeMap<u8, Note>;

/// Full store contents, keyed by tick.
pub type NoteMap = BTreeMap<Tick, TickNotes>;

#[derive(Debug, Default)]
pub struct MusicStore {
    notes: RwLock<NoteMap>,
}

impl MusicStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(notes: NoteMap) -> Self {
        Self {
            notes: RwLock::new(notes),
        }
    }

    /// Returns `false` if the (tick, pitch) slot was already taken.
    pub fn add_note(&self, note: Note) -> bool {
        let mut notes = self.notes.write();
        let slot = notes.entry(note.tick).or_default();
        if slot.contains_key(&note.pitch) {
            return false;
        }
        slot.insert(note.pitch, note);
        true
    }

    /// Adds every note under a single write lock. Returns how many were inserted.
    pub fn extend<I>(&self, notes: I) -> usize
    where
        I: IntoIterator<Item = Note>,
    {
        let mut map = self.notes.write();
        let mut inserted = 0;
        for note in notes {
            let slot = map.entry(note.tick).or_default();
            if let std::collections::btree_map::Entry::Vacant(e) = slot.entry(note.pitch) {
                e.insert(note);
                inserted += 1;
            }
        }
        inserted
    }

    /// Notes stored at exactly `tick`, ordered by pitch.
    pub fn notes_at(&self, tick: Tick) -> Vec<Note> {
        self.notes
            .read()
            .get(&tick)
            .map(|slot| slot.values().copied().collect())
            .unwrap_or_default()
    }

    /// Whether anything is scheduled strictly after `tick`.
    pub fn has_future(&self, tick: Tick) -> bool {
        use std::ops::Bound::{Excluded, Unbounded};
        self.notes
            .read()
            .range((Excluded(tick), Unbounded))
            .any(|(_, slot)| !slot.is_empty())
    }

    /// Every note, ordered by tick then pitch.
    pub fn all_notes(&self) -> Vec<Note> {
        self.notes
            .read()
            .values()
            .flat_map(|slot| slot.values().copied())
            .collect()
    }

    /// Number of stored notes.
    pub fn len(&self) -> usize {
        self.notes.read().values().map(|slot| slot.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.read().values().all(|slot| slot.is_empty())
    }

    pub fn first_tick(&self) -> Option<Tick> {
        self.notes.read().keys().next().copied()
    }

    pub fn last_tick(&self) -> Option<Tick> {
        self.notes.read().keys().next_back().copied()
    }

    /// Deep copy of the current contents.
    pub fn snapshot(&self) -> NoteMap {
        self.notes.read().clone()
    }

    /// Runs `f` while holding the read lock for its whole duration.
    pub fn with_read<R>(&self, f: impl FnOnce(&NoteMap) -> R) -> R {
        let notes = self.notes.read();
        f(&notes)
    }

    pub fn clear(&self) {
        self.notes.write().clear();
    }

    /// Loads a JSON snapshot written by [`MusicStore::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let notes: NoteMap = serde_json::from_slice(&data)?;
        let store = Self::from_map(notes);
        info!(path = %path.display(), notes = store.len(), "Loaded music snapshot");
        Ok(store)
    }

    /// Loads a snapshot, falling back to an empty store when the file is
    /// missing or unreadable.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(store) => store,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Starting with empty history");
                Self::new()
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = {
            let notes = self.notes.read();
            serde_json::to_vec(&*notes)?
        };
        std::fs::write(path, data)?;
        debug!(path = %path.display(), "Saved music snapshot");
        Ok(())
    }
}
