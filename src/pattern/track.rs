use super::note::Note;
use log::warn;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_MAX_NOTES: usize = 32;

/// One row of a pattern: a fixed number of optional notes.
///
/// The backing vector always holds exactly `max_notes` slots, so every index
/// below the capacity is addressable and nothing beyond it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    notes: Vec<Option<Note>>,
}

impl Track {
    pub fn new(max_notes: usize) -> Self {
        Self {
            notes: vec![None; max_notes],
        }
    }

    pub fn max_notes(&self) -> usize {
        self.notes.len()
    }

    /// Changes the capacity. Shrinking drops the tail, growing exposes empty
    /// slots; notes below the new capacity keep their index.
    pub fn set_max_notes(&mut self, max_notes: usize) {
        self.notes.resize(max_notes, None);
    }

    pub fn get_note(&self, index: usize) -> Option<&Note> {
        self.notes.get(index).and_then(Option::as_ref)
    }

    pub fn get_note_mut(&mut self, index: usize) -> Option<&mut Note> {
        self.notes.get_mut(index).and_then(Option::as_mut)
    }

    /// Writes a slot. Writes past the capacity are ignored and reported as
    /// `false`.
    pub fn set_note(&mut self, index: usize, note: Option<Note>) -> bool {
        match self.notes.get_mut(index) {
            Some(slot) => {
                *slot = note;
                true
            }
            None => false,
        }
    }

    /// Clears a slot, or with `shift_up` pulls every later note one step
    /// toward the head and empties the last slot.
    pub fn delete_note(&mut self, index: usize, shift_up: bool) {
        if index >= self.notes.len() {
            return;
        }

        if shift_up {
            self.notes[index..].rotate_left(1);
            if let Some(last) = self.notes.last_mut() {
                *last = None;
            }
        } else {
            self.notes[index] = None;
        }
    }

    /// Opens an empty slot at `index`, pushing later notes toward the tail.
    /// Whatever was in the last slot is lost.
    pub fn insert_note(&mut self, index: usize) {
        if index >= self.notes.len() {
            return;
        }

        self.notes[index..].rotate_right(1);
        self.notes[index] = None;
    }

    /// Empties every slot without changing the capacity.
    pub fn clear(&mut self) {
        self.notes.fill(None);
    }

    /// Copies every present note into the same slot of `target`. Slots the
    /// target cannot hold are skipped; empty source slots leave the target's
    /// note in place.
    pub fn copy_to(&self, target: &mut Track) {
        for (index, note) in self.notes.iter().enumerate() {
            if let Some(note) = note {
                target.set_note(index, Some(*note));
            }
        }
    }

    /// Iterates `(step, note)` over the occupied slots.
    pub fn notes(&self) -> impl Iterator<Item = (usize, &Note)> + '_ {
        self.notes
            .iter()
            .enumerate()
            .filter_map(|(index, note)| note.as_ref().map(|note| (index, note)))
    }

    pub fn is_empty(&self) -> bool {
        self.notes.iter().all(Option::is_none)
    }

    pub fn to_document(&self) -> TrackDocument {
        TrackDocument {
            max_notes: self.max_notes(),
            notes: self.notes.clone(),
        }
    }

    /// Rebuilds a track from its persisted form. The note list is fitted to
    /// `maxNotes` whatever length it was saved with.
    pub fn from_document(document: TrackDocument) -> Self {
        let mut notes = document.notes;
        notes.resize(document.max_notes, None);
        Self { notes }
    }
}

impl Default for Track {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NOTES)
    }
}

/// Persisted form of a [`Track`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDocument {
    pub max_notes: usize,
    #[serde(default, deserialize_with = "readable_cells")]
    pub notes: Vec<Option<Note>>,
}

/// Reads a note list cell by cell. A cell that is not a note is read as an
/// empty cell rather than failing the whole document.
fn readable_cells<'de, D>(deserializer: D) -> Result<Vec<Option<Note>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Cell {
        Note(Note),
        Unreadable(IgnoredAny),
    }

    let cells = Vec::<Option<Cell>>::deserialize(deserializer)?;
    let mut unreadable = 0;
    let notes = cells
        .into_iter()
        .map(|cell| match cell {
            Some(Cell::Note(note)) => Some(note),
            Some(Cell::Unreadable(_)) => {
                unreadable += 1;
                None
            }
            None => None,
        })
        .collect();

    if unreadable > 0 {
        warn!("{unreadable} unreadable cells read as empty");
    }
    Ok(notes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::note::NoteName;
    use crate::samples::SampleId;

    fn note(octave: i32) -> Note {
        Note::new(NoteName::C, false, octave, Some(SampleId::new(0)))
    }

    fn filled(max_notes: usize) -> Track {
        let mut track = Track::new(max_notes);
        for i in 0..max_notes {
            track.set_note(i, Some(note(i as i32)));
        }
        track
    }

    #[test]
    fn test_track_creation() {
        let track = Track::default();
        assert_eq!(track.max_notes(), 32);
        assert!(track.is_empty());
    }

    #[test]
    fn test_shrink_then_grow_keeps_head() {
        let mut track = filled(8);
        track.set_max_notes(5);
        track.set_max_notes(10);

        for i in 0..5 {
            assert_eq!(track.get_note(i), Some(&note(i as i32)));
        }
        for i in 5..10 {
            assert_eq!(track.get_note(i), None);
        }
    }

    #[test]
    fn test_out_of_range_access() {
        let mut track = Track::new(4);
        assert!(!track.set_note(4, Some(note(1))));
        assert_eq!(track.max_notes(), 4);
        assert_eq!(track.get_note(4), None);
        assert_eq!(track.get_note(100), None);
    }

    #[test]
    fn test_delete_without_shift() {
        let mut track = filled(4);
        track.delete_note(1, false);
        assert_eq!(track.get_note(0), Some(&note(4)));
        assert_eq!(track.get_note(1), None);
        assert_eq!(track.get_note(2), Some(&note(2)));
    }

    #[test]
    fn test_delete_with_shift() {
        let mut track = filled(4);
        track.delete_note(1, true);
        assert_eq!(track.get_note(0), Some(&note(4)));
        assert_eq!(track.get_note(1), Some(&note(2)));
        assert_eq!(track.get_note(2), Some(&note(3)));
        assert_eq!(track.get_note(3), None);
        assert_eq!(track.max_notes(), 4);
    }

    #[test]
    fn test_insert_drops_last() {
        let mut track = filled(4);
        track.insert_note(1);
        assert_eq!(track.get_note(0), Some(&note(4)));
        assert_eq!(track.get_note(1), None);
        assert_eq!(track.get_note(2), Some(&note(1)));
        assert_eq!(track.get_note(3), Some(&note(2)));
        assert_eq!(track.max_notes(), 4);
    }

    #[test]
    fn test_insert_then_delete_restores() {
        let original = filled(6);
        for i in 0..6 {
            let mut track = original.clone();
            track.insert_note(i);
            track.delete_note(i, true);

            for j in 0..5 {
                assert_eq!(track.get_note(j), original.get_note(j));
            }
            assert_eq!(track.get_note(5), None);
        }
    }

    #[test]
    fn test_copy_to_is_independent() {
        let source = filled(4);
        let mut target = Track::new(4);
        source.copy_to(&mut target);
        assert_eq!(target, source);

        target.get_note_mut(0).unwrap().increment(1);
        assert_eq!(source.get_note(0), Some(&note(0)));
    }

    #[test]
    fn test_copy_to_smaller_target() {
        let source = filled(6);
        let mut target = Track::new(3);
        source.copy_to(&mut target);
        assert_eq!(target.max_notes(), 3);
        assert_eq!(target.get_note(2), Some(&note(2)));
    }

    #[test]
    fn test_document_fits_capacity() {
        let document = TrackDocument {
            max_notes: 3,
            notes: vec![Some(note(1)), None, None, Some(note(4)), Some(note(5))],
        };
        let track = Track::from_document(document);
        assert_eq!(track.max_notes(), 3);
        assert_eq!(track.get_note(0), Some(&note(1)));

        let short = Track::from_document(TrackDocument {
            max_notes: 4,
            notes: vec![Some(note(1))],
        });
        assert_eq!(short.max_notes(), 4);
        assert_eq!(short.get_note(3), None);
    }

    #[test]
    fn test_unreadable_cells_read_as_empty() {
        let document: TrackDocument = serde_json::from_str(
            r#"{
                "maxNotes": 4,
                "notes": [
                    {"noteName": "C", "octave": 4, "sampleID": 0},
                    {"noteName": "H", "octave": 4},
                    7,
                    {"noteName": null, "isSharp": false, "octave": null, "volume": 128}
                ]
            }"#,
        )
        .unwrap();

        let track = Track::from_document(document);
        assert_eq!(track.get_note(0), Some(&note(4)));
        assert_eq!(track.get_note(1), None);
        assert_eq!(track.get_note(2), None);
        assert_eq!(track.get_note(3), Some(&Note::volume_only(128)));
    }
}
