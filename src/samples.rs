/// Sample bank: decoded buffers addressed by id or name
use crate::audio::AudioBuffer;
use crate::error::SampleError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use symphonia::core::{
    audio::SampleBuffer,
    codecs::DecoderOptions,
    formats::FormatOptions,
    io::{MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
};

/// Stable identifier of a bank entry; notes refer to samples by this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(usize);

impl SampleId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Sample {
    pub id: SampleId,
    pub name: String,
    pub filename: Option<PathBuf>,
    pub buffer: Arc<AudioBuffer>,
}

/// One file to load into the bank. `id` pins the entry to a persisted index
/// when it is still free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRequest {
    pub name: String,
    pub filename: PathBuf,
    pub id: Option<SampleId>,
}

impl SampleRequest {
    pub fn new(name: impl Into<String>, filename: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            id: None,
        }
    }
}

/// Append-only set of decoded samples.
#[derive(Debug, Default)]
pub struct SampleBank {
    samples: BTreeMap<SampleId, Sample>,
    reserved: BTreeSet<SampleId>,
    next_id: usize,
}

impl SampleBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, id: SampleId) -> Option<&Sample> {
        self.samples.get(&id)
    }

    /// First sample carrying `name`, in id order.
    pub fn find(&self, name: &str) -> Option<&Sample> {
        self.samples.values().find(|sample| sample.name == name)
    }

    pub fn buffer(&self, id: SampleId) -> Option<Arc<AudioBuffer>> {
        self.get(id).map(|sample| Arc::clone(&sample.buffer))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.values()
    }

    /// A requested id is honoured when it is free and leaves room for a next
    /// id; otherwise the next free id is used.
    fn reserve(&mut self, requested: Option<SampleId>) -> SampleId {
        let id = match requested {
            Some(id) if !self.reserved.contains(&id) && id.0 < usize::MAX => id,
            _ => SampleId(self.next_id),
        };
        self.reserved.insert(id);
        self.next_id = self.next_id.max(id.0.saturating_add(1));
        id
    }

    /// Adds an already decoded buffer under the next free id.
    pub fn insert(&mut self, name: impl Into<String>, buffer: AudioBuffer) -> SampleId {
        let id = self.reserve(None);
        self.samples.insert(
            id,
            Sample {
                id,
                name: name.into(),
                filename: None,
                buffer: Arc::new(buffer),
            },
        );
        id
    }

    /// Starts decoding every request on its own thread. Ids are reserved now,
    /// in request order; entries appear in the bank as the returned
    /// [`PendingLoad`] is polled.
    pub fn load(&mut self, requests: Vec<SampleRequest>) -> PendingLoad {
        self.load_with(requests, decode_file)
    }

    pub fn load_with<F>(&mut self, requests: Vec<SampleRequest>, decode: F) -> PendingLoad
    where
        F: Fn(&Path) -> Result<AudioBuffer, SampleError> + Send + Sync + 'static,
    {
        let decode = Arc::new(decode);
        let (sender, receiver) = channel();
        let remaining = requests.len();

        for request in requests {
            let id = self.reserve(request.id);
            let sender = sender.clone();
            let decode = Arc::clone(&decode);

            thread::spawn(move || {
                let result = decode(&request.filename);
                let _ = sender.send(Loaded {
                    id,
                    name: request.name,
                    filename: request.filename,
                    result,
                });
            });
        }

        PendingLoad {
            receiver,
            remaining,
            report: Some(LoadReport::default()),
        }
    }

    fn accept(&mut self, loaded: Loaded, report: &mut LoadReport) {
        match loaded.result {
            Ok(buffer) => {
                info!("loaded sample {} {:?}", loaded.id, loaded.name);
                self.samples.insert(
                    loaded.id,
                    Sample {
                        id: loaded.id,
                        name: loaded.name,
                        filename: Some(loaded.filename),
                        buffer: Arc::new(buffer),
                    },
                );
                report.loaded.push(loaded.id);
            }
            Err(err) => {
                warn!("failed to load sample {:?} from {:?}: {err}", loaded.name, loaded.filename);
                report.failed.push((loaded.name, err));
            }
        }
    }
}

#[derive(Debug)]
struct Loaded {
    id: SampleId,
    name: String,
    filename: PathBuf,
    result: Result<AudioBuffer, SampleError>,
}

/// Outcome of a whole batch.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<SampleId>,
    pub failed: Vec<(String, SampleError)>,
}

/// A batch of samples still decoding.
#[derive(Debug)]
pub struct PendingLoad {
    receiver: Receiver<Loaded>,
    remaining: usize,
    report: Option<LoadReport>,
}

impl PendingLoad {
    /// Requests not yet resolved.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// Moves every finished sample into `bank` without blocking. Returns the
    /// report exactly once, when the last request has resolved.
    pub fn poll(&mut self, bank: &mut SampleBank) -> Option<LoadReport> {
        let report = self.report.as_mut()?;

        while self.remaining > 0 {
            match self.receiver.try_recv() {
                Ok(loaded) => {
                    self.remaining -= 1;
                    bank.accept(loaded, report);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("{} sample loads ended without a result", self.remaining);
                    self.remaining = 0;
                }
            }
        }

        if self.remaining == 0 {
            self.report.take()
        } else {
            None
        }
    }

    /// Blocks until every request has resolved.
    pub fn wait(mut self, bank: &mut SampleBank) -> LoadReport {
        let Some(mut report) = self.report.take() else {
            return LoadReport::default();
        };

        while self.remaining > 0 {
            match self.receiver.recv() {
                Ok(loaded) => {
                    self.remaining -= 1;
                    bank.accept(loaded, &mut report);
                }
                Err(_) => {
                    warn!("{} sample loads ended without a result", self.remaining);
                    self.remaining = 0;
                }
            }
        }

        report
    }
}

/// Decodes an audio file into at most two interleaved channels at its own
/// sample rate.
pub fn decode_file(path: &Path) -> Result<AudioBuffer, SampleError> {
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let mut format = symphonia::default::get_probe()
        .format(
            &hint,
            MediaSourceStream::new(
                Box::new(File::open(path)?),
                MediaSourceStreamOptions::default(),
            ),
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?
        .format;

    let track = format.default_track().ok_or(SampleError::NoTrack)?;
    let track_id = track.id;
    let params = track.codec_params.clone();
    let n_channels = params
        .channels
        .ok_or(SampleError::MissingParameter("channel layout"))?
        .count();
    let sample_rate = params
        .sample_rate
        .ok_or(SampleError::MissingParameter("sample rate"))?;

    let mut decoder = symphonia::default::get_codecs().make(&params, &DecoderOptions::default())?;

    let mut samples = Vec::with_capacity(params.n_frames.unwrap_or_default() as usize * 2);
    let mut sample_buf = None;
    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }

        let audio_buf = decoder.decode(&packet)?;

        let sample_buf = sample_buf.get_or_insert_with(|| {
            let capacity = audio_buf.capacity() as u64;
            let spec = *audio_buf.spec();
            SampleBuffer::<f32>::new(capacity, spec)
        });

        sample_buf.copy_interleaved_ref(audio_buf);

        if n_channels <= 2 {
            samples.extend_from_slice(sample_buf.samples());
        } else {
            samples.extend(
                sample_buf
                    .samples()
                    .chunks_exact(n_channels)
                    .flat_map(|frame| [frame[0], frame[1]]),
            );
        }
    }

    Ok(AudioBuffer::new(samples, n_channels.min(2), sample_rate))
}
