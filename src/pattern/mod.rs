/// Pattern data model: notes, tracks and the grid that holds them
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicUsize, Ordering};

pub mod note;
pub mod track;

use crate::samples::SampleId;
use note::Note;
use track::{Track, TrackDocument};

pub const DEFAULT_NOTES_PER_TRACK: usize = 32;
pub const DEFAULT_TEMPO: u32 = 120;

static NEXT_PATTERN_ID: AtomicUsize = AtomicUsize::new(0);

/// Identity of a pattern instance. Copies made with [`Pattern::duplicate`] get
/// a fresh id, so routing can tell a switch to another pattern from a resize
/// of the same one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PatternId(usize);

impl PatternId {
    fn unique() -> Self {
        Self(NEXT_PATTERN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Returned by every mutation that changes how many tracks a pattern has.
/// Whoever owns the routing for the pattern must reconcile it.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackCountChanged {
    pub pattern: PatternId,
    pub from: usize,
    pub to: usize,
}

/// A grid of tracks sharing one step count and tempo.
#[derive(Debug)]
pub struct Pattern {
    id: PatternId,
    tracks: Vec<Track>,
    notes_per_track: usize,
    tempo: u32,
}

impl Pattern {
    pub fn new() -> Self {
        Self {
            id: PatternId::unique(),
            tracks: Vec::new(),
            notes_per_track: DEFAULT_NOTES_PER_TRACK,
            tempo: DEFAULT_TEMPO,
        }
    }

    /// An empty pattern with the given shape.
    pub fn with_shape(track_count: usize, notes_per_track: usize, tempo: u32) -> Self {
        let mut pattern = Self::new();
        pattern.set_notes_per_track(notes_per_track);
        let _ = pattern.set_track_count(track_count);
        pattern.set_tempo(tempo);
        pattern
    }

    pub fn id(&self) -> PatternId {
        self.id
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Appends fresh tracks or drops trailing ones until there are `count`.
    /// Retained tracks are never touched.
    pub fn set_track_count(&mut self, count: usize) -> Option<TrackCountChanged> {
        let from = self.tracks.len();
        if from == count {
            return None;
        }

        let notes_per_track = self.notes_per_track;
        self.tracks.truncate(count);
        self.tracks.resize_with(count, || Track::new(notes_per_track));

        Some(TrackCountChanged {
            pattern: self.id,
            from,
            to: count,
        })
    }

    pub fn notes_per_track(&self) -> usize {
        self.notes_per_track
    }

    pub fn set_notes_per_track(&mut self, notes_per_track: usize) {
        self.notes_per_track = notes_per_track;
        for track in &mut self.tracks {
            track.set_max_notes(notes_per_track);
        }
    }

    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    /// Sets the tempo, never below 1.
    pub fn set_tempo(&mut self, tempo: u32) {
        self.tempo = tempo.max(1);
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get_note(&self, track: usize, step: usize) -> Option<&Note> {
        self.track(track)?.get_note(step)
    }

    pub fn set_note(&mut self, track: usize, step: usize, note: Option<Note>) -> bool {
        self.track_mut(track).is_some_and(|track| track.set_note(step, note))
    }

    pub fn delete_note(&mut self, track: usize, step: usize, shift_up: bool) {
        if let Some(track) = self.track_mut(track) {
            track.delete_note(step, shift_up);
        }
    }

    pub fn insert_note(&mut self, track: usize, step: usize) {
        if let Some(track) = self.track_mut(track) {
            track.insert_note(step);
        }
    }

    /// Clears the rectangle spanned by both inclusive ranges without shifting.
    pub fn delete_notes(&mut self, tracks: RangeInclusive<usize>, steps: RangeInclusive<usize>) {
        for track in tracks {
            let Some(track) = self.track_mut(track) else {
                break;
            };
            for step in steps.clone() {
                track.delete_note(step, false);
            }
        }
    }

    /// Sample ids of the notes sitting at `step`, in track order.
    pub fn samples_at(&self, step: usize) -> Vec<SampleId> {
        self.tracks
            .iter()
            .filter_map(|track| track.get_note(step))
            .filter_map(Note::sample_id)
            .collect()
    }

    /// Makes `target` an exact structural copy of this pattern. The target
    /// keeps its own identity; its track count change, if any, is returned.
    pub fn copy_to(&self, target: &mut Pattern) -> Option<TrackCountChanged> {
        let changed = target.set_track_count(self.track_count());
        target.set_notes_per_track(self.notes_per_track);
        target.set_tempo(self.tempo);

        for (source, target) in self.tracks.iter().zip(&mut target.tracks) {
            target.clear();
            source.copy_to(target);
        }

        changed
    }

    /// A deep copy with a new identity.
    pub fn duplicate(&self) -> Pattern {
        let mut copy = Pattern::new();
        let _ = self.copy_to(&mut copy);
        copy
    }

    pub fn to_document(&self) -> PatternDocument {
        PatternDocument {
            notes_per_track: self.notes_per_track,
            tempo: self.tempo,
            tracks: self.tracks.iter().map(Track::to_document).collect(),
        }
    }

    /// Rebuilds a pattern from its persisted form, fitting every track to the
    /// pattern's step count.
    pub fn from_document(document: PatternDocument) -> Self {
        let mut pattern = Self::new();
        pattern.tracks = document
            .tracks
            .into_iter()
            .map(Track::from_document)
            .collect();
        pattern.set_notes_per_track(document.notes_per_track);
        pattern.set_tempo(document.tempo);
        pattern
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new()
    }
}

/// Persisted form of a [`Pattern`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternDocument {
    pub notes_per_track: usize,
    pub tempo: u32,
    #[serde(default)]
    pub tracks: Vec<TrackDocument>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use note::NoteName;

    fn note(name: NoteName, sample: usize) -> Note {
        Note::new(name, false, 4, Some(SampleId::new(sample)))
    }

    #[test]
    fn test_pattern_defaults() {
        let pattern = Pattern::new();
        assert_eq!(pattern.track_count(), 0);
        assert_eq!(pattern.notes_per_track(), 32);
        assert_eq!(pattern.tempo(), 120);
    }

    #[test]
    fn test_track_count_signal() {
        let mut pattern = Pattern::new();
        let changed = pattern.set_track_count(4).unwrap();
        assert_eq!((changed.from, changed.to), (0, 4));
        assert_eq!(changed.pattern, pattern.id());
        assert_eq!(pattern.set_track_count(4), None);
    }

    #[test]
    fn test_grow_and_shrink_tracks() {
        let mut pattern = Pattern::new();
        pattern.set_notes_per_track(16);
        let _ = pattern.set_track_count(2);
        pattern.set_note(1, 3, Some(note(NoteName::D, 1)));

        let _ = pattern.set_track_count(4);
        assert_eq!(pattern.track(3).unwrap().max_notes(), 16);
        assert_eq!(pattern.get_note(1, 3), Some(&note(NoteName::D, 1)));

        let _ = pattern.set_track_count(1);
        assert_eq!(pattern.track_count(), 1);
        assert!(pattern.track(1).is_none());
    }

    #[test]
    fn test_notes_per_track_propagates() {
        let mut pattern = Pattern::with_shape(3, 8, 125);
        pattern.set_note(0, 7, Some(note(NoteName::C, 0)));
        pattern.set_notes_per_track(4);
        assert!(pattern.tracks().iter().all(|t| t.max_notes() == 4));
        pattern.set_notes_per_track(8);
        assert_eq!(pattern.get_note(0, 7), None);
    }

    #[test]
    fn test_out_of_range_track_is_noop() {
        let mut pattern = Pattern::with_shape(2, 8, 125);
        assert!(!pattern.set_note(5, 0, Some(note(NoteName::C, 0))));
        assert_eq!(pattern.get_note(5, 0), None);
        pattern.delete_note(5, 0, true);
        pattern.insert_note(5, 0);
        assert_eq!(pattern.track_count(), 2);
    }

    #[test]
    fn test_delete_notes_rectangle() {
        let mut pattern = Pattern::with_shape(3, 4, 125);
        for t in 0..3 {
            for s in 0..4 {
                pattern.set_note(t, s, Some(note(NoteName::E, t)));
            }
        }

        pattern.delete_notes(0..=1, 1..=2);

        for t in 0..=1 {
            assert!(pattern.get_note(t, 0).is_some());
            assert!(pattern.get_note(t, 1).is_none());
            assert!(pattern.get_note(t, 2).is_none());
            assert!(pattern.get_note(t, 3).is_some());
        }
        assert!((0..4).all(|s| pattern.get_note(2, s).is_some()));
    }

    #[test]
    fn test_copy_to_is_deep_and_exact() {
        let mut source = Pattern::with_shape(3, 16, 140);
        source.set_note(0, 0, Some(note(NoteName::C, 0)));
        source.set_note(2, 15, Some(note(NoteName::A, 2)));

        let mut target = Pattern::with_shape(5, 8, 90);
        target.set_note(1, 1, Some(note(NoteName::B, 9)));
        let changed = source.copy_to(&mut target).unwrap();

        assert_eq!((changed.from, changed.to), (5, 3));
        assert_eq!(target.tempo(), 140);
        assert_eq!(target.notes_per_track(), 16);
        assert_eq!(target.tracks(), source.tracks());
        assert_ne!(target.id(), source.id());

        source.set_note(0, 0, Some(note(NoteName::G, 7)));
        assert_eq!(target.get_note(0, 0), Some(&note(NoteName::C, 0)));
    }

    #[test]
    fn test_duplicate_has_new_identity() {
        let mut source = Pattern::with_shape(2, 4, 125);
        source.set_note(1, 2, Some(note(NoteName::F, 1)));
        let copy = source.duplicate();
        assert_ne!(copy.id(), source.id());
        assert_eq!(copy.tracks(), source.tracks());
    }

    #[test]
    fn test_samples_at_step() {
        let mut pattern = Pattern::with_shape(3, 4, 125);
        pattern.set_note(0, 1, Some(note(NoteName::C, 4)));
        pattern.set_note(2, 1, Some(note(NoteName::C, 6)));
        pattern.set_note(1, 1, Some(Note::volume_only(3)));
        assert_eq!(
            pattern.samples_at(1),
            vec![SampleId::new(4), SampleId::new(6)]
        );
        assert!(pattern.samples_at(0).is_empty());
    }

    #[test]
    fn test_document_shape() {
        let mut pattern = Pattern::with_shape(1, 2, 125);
        pattern.set_note(0, 0, Some(note(NoteName::C, 0)));
        let value = serde_json::to_value(pattern.to_document()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "notesPerTrack": 2,
                "tempo": 125,
                "tracks": [{
                    "maxNotes": 2,
                    "notes": [
                        { "noteName": "C", "isSharp": false, "octave": 4, "volume": null, "sampleID": 0 },
                        null
                    ]
                }]
            })
        );
    }

    #[test]
    fn test_from_document_fits_tracks() {
        let document: PatternDocument = serde_json::from_value(serde_json::json!({
            "notesPerTrack": 4,
            "tempo": 0,
            "tracks": [
                { "maxNotes": 2, "notes": [null] },
                { "maxNotes": 8, "notes": [] }
            ]
        }))
        .unwrap();

        let pattern = Pattern::from_document(document);
        assert_eq!(pattern.track_count(), 2);
        assert!(pattern.tracks().iter().all(|t| t.max_notes() == 4));
        assert_eq!(pattern.tempo(), 1);
    }
}
