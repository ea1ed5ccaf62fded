/// Audio output graph: the primitives the sequencer builds its routing from
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub mod device;
pub mod mixer;
#[cfg(test)]
pub(crate) mod testing;

pub use device::AudioDevice;
pub use mixer::Mixer;

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(1);

/// Handle to a node in an [`AudioOutput`] graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// The graph's final output. Always present, never disconnected.
    pub const DESTINATION: Self = Self(0);

    pub fn unique() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Decoded sample data, interleaved, one or two channels.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Box<[f32]>,
    channels: usize,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: impl Into<Box<[f32]>>, channels: usize, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            channels: channels.clamp(1, 2),
            sample_rate,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    /// Left and right value of `frame`; mono data is duplicated.
    pub fn frame(&self, frame: usize) -> Option<[f32; 2]> {
        let start = frame * self.channels;
        match self.channels {
            1 => self.samples.get(start).map(|&s| [s, s]),
            _ => Some([*self.samples.get(start)?, *self.samples.get(start + 1)?]),
        }
    }
}

/// Graph primitives a track chain is assembled from.
///
/// Nodes are created unconnected. `connect` routes a node's output into
/// another node (or [`NodeId::DESTINATION`]); `disconnect` cuts the node out
/// and releases it. Sources play once, from `start` until their buffer runs
/// out or `stop` is reached. Offsets are in seconds from now.
pub trait AudioOutput {
    fn create_volume(&mut self) -> NodeId;

    fn create_pan(&mut self) -> NodeId;

    fn create_analysis(&mut self) -> NodeId;

    fn create_source(&mut self, buffer: Arc<AudioBuffer>, playback_rate: f32) -> NodeId;

    fn connect(&mut self, from: NodeId, to: NodeId);

    fn disconnect(&mut self, node: NodeId);

    /// Linear gain of a volume node.
    fn set_gain(&mut self, node: NodeId, gain: f32);

    /// Stereo position of a pan node, -1 (left) to 1 (right).
    fn set_pan(&mut self, node: NodeId, pan: f32);

    fn start(&mut self, source: NodeId, offset: f64);

    fn stop(&mut self, source: NodeId, offset: f64);

    /// Recent peak of the signal through an analysis node.
    fn level(&self, analysis: NodeId) -> Option<[f32; 2]>;
}
