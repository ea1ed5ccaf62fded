/// Song files: the persisted form of a sequencer's patterns and samples
use crate::audio::AudioOutput;
use crate::error::SongError;
use crate::pattern::{Pattern, PatternDocument};
use crate::samples::{SampleBank, SampleId, SampleRequest};
use crate::sequencer::Sequencer;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const FORMAT: &str = "forcetracker";
pub const VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleEntry {
    pub name: String,
    #[serde(default)]
    pub filename: Option<PathBuf>,
    pub index: SampleId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongDocument {
    pub format: String,
    pub version: String,
    #[serde(rename = "numPatterns", default)]
    pub num_patterns: usize,
    #[serde(default)]
    pub samples: Vec<SampleEntry>,
    #[serde(default)]
    pub patterns: Vec<PatternDocument>,
}

impl Default for SongDocument {
    fn default() -> Self {
        Self {
            format: FORMAT.to_string(),
            version: VERSION.to_string(),
            num_patterns: 0,
            samples: Vec::new(),
            patterns: Vec::new(),
        }
    }
}

impl SongDocument {
    /// A song holding `patterns` and no samples.
    pub fn from_patterns<'a>(patterns: impl IntoIterator<Item = &'a Pattern>) -> Self {
        let patterns: Vec<_> = patterns.into_iter().map(Pattern::to_document).collect();
        Self {
            num_patterns: patterns.len(),
            patterns,
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, SongError> {
        let file = File::open(path)?;
        let document: Self = serde_json::from_reader(BufReader::new(file))?;
        document.validate()?;
        info!(
            "read song {path:?}: {} patterns, {} samples",
            document.patterns.len(),
            document.samples.len()
        );
        Ok(document)
    }

    pub fn save(&self, path: &Path) -> Result<(), SongError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        info!("wrote song {path:?}");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SongError> {
        if self.format != FORMAT {
            return Err(SongError::UnsupportedFormat {
                format: self.format.clone(),
            });
        }
        if self.num_patterns != self.patterns.len() {
            warn!(
                "song claims {} patterns but holds {}",
                self.num_patterns,
                self.patterns.len()
            );
        }
        Ok(())
    }

    /// Sample loads for this song, with relative filenames resolved against
    /// `base_dir` and each sample pinned to its saved index.
    pub fn sample_requests(&self, base_dir: &Path) -> Vec<SampleRequest> {
        self.samples
            .iter()
            .filter_map(|entry| {
                let Some(filename) = &entry.filename else {
                    warn!("sample {:?} has no file, not loading it", entry.name);
                    return None;
                };
                Some(SampleRequest {
                    name: entry.name.clone(),
                    filename: base_dir.join(filename),
                    id: Some(entry.index),
                })
            })
            .collect()
    }
}

impl<O: AudioOutput> Sequencer<O> {
    pub fn to_document(&self, bank: &SampleBank) -> SongDocument {
        SongDocument {
            samples: bank
                .iter()
                .map(|sample| SampleEntry {
                    name: sample.name.clone(),
                    filename: sample.filename.clone(),
                    index: sample.id,
                })
                .collect(),
            ..SongDocument::from_patterns(self.patterns())
        }
    }

    /// Replaces the song with the document's patterns and returns the samples
    /// it needs.
    pub fn load_document(&mut self, document: SongDocument, base_dir: &Path) -> Vec<SampleRequest> {
        let requests = document.sample_requests(base_dir);
        self.replace_patterns(
            document
                .patterns
                .into_iter()
                .map(Pattern::from_document)
                .collect(),
        );
        requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::RecordingOutput;
    use crate::audio::AudioBuffer;
    use crate::pattern::note::{Note, NoteName};

    fn sequencer() -> Sequencer<RecordingOutput> {
        let mut sequencer = Sequencer::new(RecordingOutput::new());
        let mut first = Pattern::with_shape(2, 8, 140);
        first.set_note(
            1,
            3,
            Some(Note::new(NoteName::G, true, 3, Some(SampleId::new(0))).with_volume(Some(80))),
        );
        first.set_note(0, 7, Some(Note::volume_only(0)));
        sequencer.add_pattern(first);
        sequencer.add_pattern(Pattern::with_shape(4, 16, 125));
        sequencer
    }

    #[test]
    fn test_document_shape() {
        let mut bank = SampleBank::new();
        bank.insert("kick", AudioBuffer::new(vec![0.0; 2], 1, 44_100));

        let document = sequencer().to_document(&bank);
        let json = serde_json::to_value(&document).unwrap();

        assert_eq!(json["format"], "forcetracker");
        assert_eq!(json["version"], "1.0.0");
        assert_eq!(json["numPatterns"], 2);
        assert_eq!(json["samples"][0]["name"], "kick");
        assert_eq!(json["samples"][0]["index"], 0);
        assert_eq!(json["patterns"][0]["notesPerTrack"], 8);
        assert_eq!(json["patterns"][0]["tracks"][1]["maxNotes"], 8);
        assert_eq!(json["patterns"][0]["tracks"][1]["notes"][2], serde_json::Value::Null);
        assert_eq!(json["patterns"][0]["tracks"][1]["notes"][3]["noteName"], "G");
    }

    #[test]
    fn test_save_and_load_restores_song() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.json");
        let original = sequencer();

        original.to_document(&SampleBank::new()).save(&path).unwrap();
        let document = SongDocument::load(&path).unwrap();

        let mut restored = Sequencer::new(RecordingOutput::new());
        let requests = restored.load_document(document, dir.path());
        assert!(requests.is_empty());

        assert_eq!(restored.pattern_count(), 2);
        for (a, b) in original.patterns().iter().zip(restored.patterns()) {
            assert_eq!(a.tempo(), b.tempo());
            assert_eq!(a.tracks(), b.tracks());
            assert_ne!(a.id(), b.id());
        }
        assert_eq!(restored.routing().len(), 2);
    }

    #[test]
    fn test_rejects_other_formats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.json");
        let mut file = File::create(&path).unwrap();
        write!(file, r#"{{"format": "xm", "version": "1.0.0"}}"#).unwrap();

        let err = SongDocument::load(&path).unwrap_err();
        assert!(matches!(err, SongError::UnsupportedFormat { format } if format == "xm"));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(SongDocument::load(&path), Err(SongError::Json(_))));
        assert!(matches!(
            SongDocument::load(&dir.path().join("absent.json")),
            Err(SongError::Io(_))
        ));
    }

    #[test]
    fn test_loads_volume_only_cells_with_null_fields() {
        let document: SongDocument = serde_json::from_value(serde_json::json!({
            "format": "forcetracker",
            "version": "1.0.0",
            "numPatterns": 1,
            "samples": [],
            "patterns": [{
                "notesPerTrack": 2,
                "tempo": 125,
                "tracks": [{
                    "maxNotes": 2,
                    "notes": [
                        { "noteName": null, "isSharp": false, "octave": null,
                          "volume": 128, "sampleID": null },
                        null
                    ]
                }]
            }]
        }))
        .unwrap();

        let mut sequencer = Sequencer::new(RecordingOutput::new());
        sequencer.load_document(document, Path::new("."));

        let pattern = sequencer.current_pattern().unwrap();
        assert_eq!(pattern.get_note(0, 0), Some(&Note::volume_only(128)));
        assert_eq!(pattern.get_note(0, 1), None);
    }

    #[test]
    fn test_sample_requests_resolve_paths() {
        let document: SongDocument = serde_json::from_value(serde_json::json!({
            "format": "forcetracker",
            "version": "1.0.0",
            "samples": [
                { "name": "kick", "filename": "kick.wav", "index": 3 },
                { "name": "lost", "index": 1 },
                { "name": "snare", "filename": "/abs/snare.wav", "index": 0 }
            ]
        }))
        .unwrap();

        let requests = document.sample_requests(Path::new("/songs"));
        assert_eq!(
            requests,
            vec![
                SampleRequest {
                    name: "kick".into(),
                    filename: PathBuf::from("/songs/kick.wav"),
                    id: Some(SampleId::new(3)),
                },
                SampleRequest {
                    name: "snare".into(),
                    filename: PathBuf::from("/abs/snare.wav"),
                    id: Some(SampleId::new(0)),
                },
            ]
        );
    }
}
