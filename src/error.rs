/// Errors raised at the outer surfaces: files, decoding and the audio device.
/// The pattern model and the playback engine never return these.
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("failed to read sample: {0}")]
    Io(#[from] io::Error),
    #[error("failed to decode sample: {0}")]
    Decode(#[from] symphonia::core::errors::Error),
    #[error("sample contains no audio track")]
    NoTrack,
    #[error("sample is missing its {0}")]
    MissingParameter(&'static str),
}

#[derive(Debug, Error)]
pub enum SongError {
    #[error("failed to access song file: {0}")]
    Io(#[from] io::Error),
    #[error("malformed song document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported song format {format:?}")]
    UnsupportedFormat { format: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no output device available")]
    NoDevice,
    #[error("output device has no usable config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
    #[error("unsupported sample format {0}")]
    UnsupportedSampleFormat(cpal::SampleFormat),
}
