use crate::samples::SampleId;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Concert pitch of A4, the reference every frequency is derived from.
pub const A4_FREQUENCY: f32 = 440.0;

/// Semitone count of A4 above C0.
const A4_PITCH: i32 = 4 * 12 + 9;

/// Volume applied when a triggering note carries none.
pub const DEFAULT_VOLUME: u8 = 255;

/// The twelve names in table order, sharps spelled with `#`.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Letter part of a note name; the sharp flag lives on [`Note`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteName {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl NoteName {
    fn semitone(self) -> i32 {
        match self {
            Self::C => 0,
            Self::D => 2,
            Self::E => 4,
            Self::F => 5,
            Self::G => 7,
            Self::A => 9,
            Self::B => 11,
        }
    }

    fn letter(self) -> char {
        match self {
            Self::C => 'C',
            Self::D => 'D',
            Self::E => 'E',
            Self::F => 'F',
            Self::G => 'G',
            Self::A => 'A',
            Self::B => 'B',
        }
    }
}

// Index into NOTE_NAMES -> (letter, sharp)
const SPELLING: [(NoteName, bool); 12] = [
    (NoteName::C, false),
    (NoteName::C, true),
    (NoteName::D, false),
    (NoteName::D, true),
    (NoteName::E, false),
    (NoteName::F, false),
    (NoteName::F, true),
    (NoteName::G, false),
    (NoteName::G, true),
    (NoteName::A, false),
    (NoteName::A, true),
    (NoteName::B, false),
];

/// One cell of a track.
///
/// A note without a name is a volume-only step: it changes the track's volume
/// without triggering a sample. `volume` is tri-state: `None` means "use the
/// default", `Some(0)` is silence, anything else scales linearly to 255.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Note {
    note_name: Option<NoteName>,
    #[serde(deserialize_with = "null_as_default")]
    is_sharp: bool,
    #[serde(deserialize_with = "null_as_default")]
    octave: i32,
    volume: Option<u8>,
    #[serde(rename = "sampleID")]
    sample_id: Option<SampleId>,
}

/// Volume-only cells are saved with `null` in place of the sharp flag and
/// octave.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Note {
    pub fn new(name: NoteName, sharp: bool, octave: i32, sample_id: Option<SampleId>) -> Self {
        Self {
            note_name: Some(name),
            is_sharp: sharp,
            octave,
            volume: None,
            sample_id,
        }
    }

    /// A step that only sets the track volume.
    pub fn volume_only(volume: u8) -> Self {
        Self {
            volume: Some(volume),
            ..Self::default()
        }
    }

    /// Builds a note from its position in [`NOTE_NAMES`].
    pub fn from_table(index: usize, octave: i32, sample_id: Option<SampleId>) -> Option<Self> {
        let (name, sharp) = *SPELLING.get(index)?;
        Some(Self::new(name, sharp, octave, sample_id))
    }

    #[must_use]
    pub fn with_volume(mut self, volume: Option<u8>) -> Self {
        self.volume = volume;
        self
    }

    pub fn name(&self) -> Option<NoteName> {
        self.note_name
    }

    pub fn is_sharp(&self) -> bool {
        self.is_sharp
    }

    pub fn octave(&self) -> i32 {
        self.octave
    }

    pub fn volume(&self) -> Option<u8> {
        self.volume
    }

    pub fn set_volume(&mut self, volume: Option<u8>) {
        self.volume = volume;
    }

    pub fn sample_id(&self) -> Option<SampleId> {
        self.sample_id
    }

    pub fn set_sample_id(&mut self, sample_id: Option<SampleId>) {
        self.sample_id = sample_id;
    }

    /// True when the note names both a pitch and a sample.
    pub fn is_playable(&self) -> bool {
        self.note_name.is_some() && self.sample_id.is_some()
    }

    /// Semitones above C0, or `None` for an empty cell or an octave too far
    /// out to count in semitones.
    pub fn pitch(&self) -> Option<i32> {
        let name = self.note_name?;
        self.octave
            .checked_mul(12)?
            .checked_add(name.semitone() + i32::from(self.is_sharp))
    }

    /// Index of the note's name in [`NOTE_NAMES`].
    pub fn table_index(&self) -> Option<usize> {
        self.pitch().map(|pitch| pitch.rem_euclid(12) as usize)
    }

    pub fn frequency(&self) -> Option<f32> {
        let distance = self.pitch()?.checked_sub(A4_PITCH)?;
        Some(A4_FREQUENCY * 2.0_f32.powf(distance as f32 / 12.0))
    }

    /// Playback rate relative to the recorded sample, which is taken to be A4.
    pub fn playback_rate(&self) -> Option<f32> {
        self.frequency().map(|frequency| frequency / A4_FREQUENCY)
    }

    /// Linear gain for the track volume node, `None` if the note has no volume.
    pub fn gain(&self) -> Option<f32> {
        self.volume.map(|volume| f32::from(volume) / f32::from(DEFAULT_VOLUME))
    }

    /// Moves the note by `semitones`, carrying the octave in either direction.
    /// The result is always spelled with the table's sharps. Empty cells are
    /// left untouched.
    pub fn increment(&mut self, semitones: i32) {
        let Some(pitch) = self.pitch().and_then(|pitch| pitch.checked_add(semitones)) else {
            return;
        };

        let (name, sharp) = SPELLING[pitch.rem_euclid(12) as usize];

        self.note_name = Some(name);
        self.is_sharp = sharp;
        self.octave = pitch.div_euclid(12);
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.note_name {
            Some(name) => {
                let accidental = if self.is_sharp { '#' } else { '-' };
                write!(f, "{}{accidental}{}", name.letter(), self.octave)
            }
            None => f.write_str("..."),
        }
    }
}
