//! forcetrack - a grid step sequencer core
//!
//! This library provides the pieces of a tracker-style step sequencer:
//! - Notes, tracks and patterns laid out as a tracks x steps grid
//! - A routing graph of per-track volume, pan and analysis chains
//! - A tick-driven playback engine with single pattern and song modes
//! - A sample bank decoding audio files in the background
//! - A software mixer and a cpal output stream to hear it all

pub mod audio;
pub mod config;
pub mod error;
pub mod pattern;
pub mod samples;
pub mod sequencer;
pub mod song;

// Re-export commonly used types
pub use audio::{AudioBuffer, AudioDevice, AudioOutput, Mixer, NodeId};
pub use config::Config;
pub use pattern::note::{Note, NoteName};
pub use pattern::track::Track;
pub use pattern::{Pattern, PatternId, TrackCountChanged};
pub use samples::{SampleBank, SampleId, SampleRequest};
pub use sequencer::playback::{PlayState, PlaybackEvent};
pub use sequencer::Sequencer;
pub use song::SongDocument;
