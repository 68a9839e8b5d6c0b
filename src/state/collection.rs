/// The in-memory note list and its reconciliation rules
///
/// Local mutations (create, delete) are applied optimistically. Listings from
/// the backend replace the list wholesale, except for what the backend cannot
/// know about yet:
/// - creations still in flight (Local ids)
/// - confirmed creations the listing was requested too early to contain
/// - deletes in flight, or confirmed after the listing was requested
///
/// "Requested too early" is decided with a clock: the number of listings the
/// client had requested when the mutation was confirmed. A listing whose
/// generation is greater than that number was requested afterwards and is
/// authoritative.
use std::collections::{HashMap, HashSet};

use super::data::{Note, NoteId};

/// What `remove` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// Removed a persisted note; the backend delete must follow
    Remote(String),
    /// Removed an unconfirmed creation
    Local,
    /// No such note
    Missing,
}

/// What `confirm` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// The backend note replaced its local placeholder
    Inserted,
    /// The user deleted the placeholder already; the backend delete must follow
    Cancelled(String),
}

/// A removed note and what is needed to put it back
#[derive(Debug)]
struct RemovedNote {
    pos: usize,
    note: Note,
    /// Confirmation clock if the note had not been seen in a listing yet
    unseen: Option<u64>,
}

#[derive(Debug, Default)]
pub struct NotesCollection {
    entries: Vec<Note>,
    pending: HashSet<u64>,
    cancelled: HashSet<u64>,
    /// Confirmed creations not yet seen in a listing, with the confirmation clock
    unseen: HashMap<String, u64>,
    /// Deleted ids; None while the delete is in flight
    tombstones: HashMap<String, Option<u64>>,
    /// Removed notes, for rollback
    removed: HashMap<String, RemovedNote>,
    applied_generation: u64,
}

impl NotesCollection {
    pub fn notes(&self) -> &[Note] {
        &self.entries
    }

    fn position(&self, id: &NoteId) -> Option<usize> {
        self.entries.iter().position(|note| &note.id == id)
    }

    /// Append an unconfirmed creation.
    pub fn push_pending(&mut self, local: u64, note: Note) {
        debug_assert_eq!(note.id, NoteId::Local(local));
        self.pending.insert(local);
        self.entries.push(note);
    }

    /// The backend accepted the creation of `local` and returned `note`.
    pub fn confirm(&mut self, local: u64, note: Note, clock: u64) -> Confirmation {
        self.pending.remove(&local);
        let id = match note.id.remote() {
            Some(id) => id.to_string(),
            None => {
                log::warn!("⚠️  Confirmation for local-{} carried no backend id", local);
                return Confirmation::Inserted;
            }
        };

        if self.cancelled.remove(&local) {
            self.tombstones.insert(id.clone(), None);
            self.removed.insert(
                id.clone(),
                RemovedNote {
                    pos: self.entries.len(),
                    note,
                    unseen: Some(clock),
                },
            );
            return Confirmation::Cancelled(id);
        }

        self.unseen.insert(id, clock);
        match self.position(&NoteId::Local(local)) {
            Some(pos) => self.entries[pos] = note,
            None => self.entries.push(note),
        }
        Confirmation::Inserted
    }

    /// The backend rejected the creation of `local`.
    ///
    /// Returns the placeholder unless the user already deleted it.
    pub fn fail_pending(&mut self, local: u64) -> Option<Note> {
        self.pending.remove(&local);
        if self.cancelled.remove(&local) {
            return None;
        }
        let pos = self.position(&NoteId::Local(local))?;
        Some(self.entries.remove(pos))
    }

    /// Remove a note optimistically, keeping the order of the others.
    pub fn remove(&mut self, id: &NoteId) -> Removal {
        let Some(pos) = self.position(id) else {
            return Removal::Missing;
        };
        let note = self.entries.remove(pos);

        match id {
            NoteId::Local(local) => {
                if self.pending.contains(local) {
                    self.cancelled.insert(*local);
                }
                Removal::Local
            }
            NoteId::Remote(remote) => {
                let unseen = self.unseen.remove(remote);
                self.tombstones.insert(remote.clone(), None);
                self.removed
                    .insert(remote.clone(), RemovedNote { pos, note, unseen });
                Removal::Remote(remote.clone())
            }
        }
    }

    /// The backend confirmed the delete of `id`.
    pub fn delete_confirmed(&mut self, id: &str, clock: u64) {
        self.removed.remove(id);
        if let Some(confirmed) = self.tombstones.get_mut(id) {
            *confirmed = Some(clock);
        }
    }

    /// The backend rejected the delete of `id`; put the note back where it was.
    pub fn delete_failed(&mut self, id: &str) -> bool {
        self.tombstones.remove(id);
        let Some(removed) = self.removed.remove(id) else {
            return false;
        };
        if let Some(clock) = removed.unseen {
            self.unseen.insert(id.to_string(), clock);
        }
        let pos = removed.pos.min(self.entries.len());
        self.entries.insert(pos, removed.note);
        true
    }

    /// Replace the list with a backend listing.
    ///
    /// Returns false if the listing is older than one already applied.
    pub fn replace_from_backend(&mut self, listing: Vec<Note>, generation: u64) -> bool {
        if generation < self.applied_generation {
            return false;
        }
        self.applied_generation = generation;

        let listed: HashSet<String> = listing
            .iter()
            .filter_map(|note| note.id.remote().map(str::to_string))
            .collect();

        self.tombstones.retain(|_, confirmed| match confirmed {
            Some(clock) => generation <= *clock,
            None => true,
        });
        self.unseen
            .retain(|id, clock| generation <= *clock && !listed.contains(id));

        let carried: Vec<Note> = std::mem::take(&mut self.entries)
            .into_iter()
            .filter(|note| match &note.id {
                NoteId::Local(_) => true,
                NoteId::Remote(id) => self.unseen.contains_key(id),
            })
            .collect();

        self.entries = listing
            .into_iter()
            .filter(|note| match note.id.remote() {
                Some(id) => !self.tombstones.contains_key(id),
                None => true,
            })
            .chain(carried)
            .collect();
        true
    }
}
