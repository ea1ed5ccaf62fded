use super::{AudioBuffer, AudioOutput, NodeId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateVolume(NodeId),
    CreatePan(NodeId),
    CreateAnalysis(NodeId),
    CreateSource(NodeId, f32),
    Connect(NodeId, NodeId),
    Disconnect(NodeId),
    SetGain(NodeId, f32),
    SetPan(NodeId, f32),
    Start(NodeId),
    Stop(NodeId),
}

/// Records every graph call and tracks which nodes are still alive.
#[derive(Debug, Default)]
pub struct RecordingOutput {
    pub calls: Vec<Call>,
    live: HashSet<NodeId>,
    gains: HashMap<NodeId, f32>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn create(&mut self, call: impl FnOnce(NodeId) -> Call) -> NodeId {
        let id = NodeId::unique();
        self.live.insert(id);
        self.calls.push(call(id));
        id
    }

    pub fn live_nodes(&self) -> usize {
        self.live.len()
    }

    pub fn is_live(&self, node: NodeId) -> bool {
        self.live.contains(&node)
    }

    pub fn gain(&self, node: NodeId) -> Option<f32> {
        self.gains.get(&node).copied()
    }

    pub fn started(&self) -> Vec<NodeId> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Start(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn source_rates(&self) -> Vec<f32> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::CreateSource(_, rate) => Some(*rate),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl AudioOutput for RecordingOutput {
    fn create_volume(&mut self) -> NodeId {
        self.create(Call::CreateVolume)
    }

    fn create_pan(&mut self) -> NodeId {
        self.create(Call::CreatePan)
    }

    fn create_analysis(&mut self) -> NodeId {
        self.create(Call::CreateAnalysis)
    }

    fn create_source(&mut self, _buffer: Arc<AudioBuffer>, playback_rate: f32) -> NodeId {
        self.create(|id| Call::CreateSource(id, playback_rate))
    }

    fn connect(&mut self, from: NodeId, to: NodeId) {
        self.calls.push(Call::Connect(from, to));
    }

    fn disconnect(&mut self, node: NodeId) {
        self.live.remove(&node);
        self.calls.push(Call::Disconnect(node));
    }

    fn set_gain(&mut self, node: NodeId, gain: f32) {
        self.gains.insert(node, gain);
        self.calls.push(Call::SetGain(node, gain));
    }

    fn set_pan(&mut self, node: NodeId, pan: f32) {
        self.calls.push(Call::SetPan(node, pan));
    }

    fn start(&mut self, source: NodeId, _offset: f64) {
        self.calls.push(Call::Start(source));
    }

    fn stop(&mut self, source: NodeId, _offset: f64) {
        self.calls.push(Call::Stop(source));
    }

    fn level(&self, analysis: NodeId) -> Option<[f32; 2]> {
        self.live.contains(&analysis).then_some([0.0; 2])
    }
}
