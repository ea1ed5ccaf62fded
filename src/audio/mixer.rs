/// Software implementation of the output graph, rendered block by block
use super::{AudioBuffer, AudioOutput, NodeId};
use std::collections::HashMap;
use std::f32::consts::{FRAC_PI_4, SQRT_2};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Analysis peaks fall by this factor on every rendered block.
const PEAK_DECAY: f32 = 0.9;

/// Longest chain followed from a source before it is treated as unrouted.
const MAX_CHAIN: usize = 16;

#[derive(Debug)]
struct Voice {
    buffer: Arc<AudioBuffer>,
    playback_rate: f32,
    position: f64,
    start_in: Option<u64>,
    stop_in: Option<u64>,
    finished: bool,
}

impl Voice {
    fn render(&mut self, frames: &mut [[f32; 2]], output_rate: u32) {
        let step = f64::from(self.playback_rate) * f64::from(self.buffer.sample_rate())
            / f64::from(output_rate.max(1));

        for frame in frames.iter_mut() {
            *frame = [0.0; 2];

            if let Some(stop) = &mut self.stop_in {
                if *stop == 0 {
                    self.finished = true;
                } else {
                    *stop -= 1;
                }
            }

            if self.finished {
                continue;
            }

            match &mut self.start_in {
                None => continue,
                Some(wait) if *wait > 0 => {
                    *wait -= 1;
                    continue;
                }
                Some(_) => {}
            }

            let index = self.position as usize;
            let frac = (self.position - index as f64) as f32;

            *frame = match (self.buffer.frame(index), self.buffer.frame(index + 1)) {
                (Some([l0, r0]), Some([l1, r1])) => {
                    [(l1 - l0).mul_add(frac, l0), (r1 - r0).mul_add(frac, r0)]
                }
                (Some(last), None) => last,
                _ => {
                    self.finished = true;
                    continue;
                }
            };

            self.position += step;
        }
    }
}

#[derive(Debug)]
enum Kind {
    Volume { gain: f32 },
    Pan { pan: f32 },
    Analysis { peak: [f32; 2] },
    Source(Voice),
}

#[derive(Debug)]
struct Node {
    kind: Kind,
    output: Option<NodeId>,
}

#[derive(Debug)]
struct MixerGraph {
    sample_rate: u32,
    nodes: HashMap<NodeId, Node>,
    sources: Vec<NodeId>,
    scratch: Vec<[f32; 2]>,
}

impl MixerGraph {
    fn render(&mut self, out: &mut [f32], channels: usize) {
        out.fill(0.0);

        if channels == 0 {
            return;
        }

        let frames = out.len() / channels;
        let Self {
            sample_rate,
            nodes,
            sources,
            scratch,
        } = self;

        for node in nodes.values_mut() {
            if let Kind::Analysis { peak } = &mut node.kind {
                *peak = peak.map(|p| p * PEAK_DECAY);
            }
        }

        sources.clear();
        sources.extend(nodes.iter().filter_map(|(id, node)| match &node.kind {
            Kind::Source(voice) if !voice.finished => Some(*id),
            _ => None,
        }));

        scratch.resize(frames, [0.0; 2]);

        for id in sources.iter() {
            let Some(Node {
                kind: Kind::Source(voice),
                output,
            }) = nodes.get_mut(id)
            else {
                continue;
            };

            voice.render(scratch, *sample_rate);

            let mut next = *output;
            let mut reached = false;

            for _ in 0..MAX_CHAIN {
                let Some(id) = next else {
                    break;
                };
                if id == NodeId::DESTINATION {
                    reached = true;
                    break;
                }
                let Some(node) = nodes.get_mut(&id) else {
                    break;
                };

                match &mut node.kind {
                    Kind::Volume { gain } => {
                        for frame in scratch.iter_mut() {
                            *frame = frame.map(|s| s * *gain);
                        }
                    }
                    Kind::Pan { pan } => {
                        let [l, r] = pan_law(*pan);
                        for frame in scratch.iter_mut() {
                            *frame = [frame[0] * l, frame[1] * r];
                        }
                    }
                    Kind::Analysis { peak } => {
                        for frame in scratch.iter() {
                            peak[0] = peak[0].max(frame[0].abs());
                            peak[1] = peak[1].max(frame[1].abs());
                        }
                    }
                    Kind::Source(_) => break,
                }

                next = node.output;
            }

            if reached {
                mix_into(out, scratch, channels);
            }
        }
    }
}

fn mix_into(out: &mut [f32], frames: &[[f32; 2]], channels: usize) {
    for (out, [l, r]) in out.chunks_exact_mut(channels).zip(frames) {
        if channels == 1 {
            out[0] += (l + r) * 0.5;
        } else {
            out[0] += l;
            out[1] += r;
        }
    }
}

fn pan_law(pan: f32) -> [f32; 2] {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4;

    let (r, l) = angle.sin_cos();

    [l * SQRT_2, r * SQRT_2]
}

/// Shared handle to a software output graph.
///
/// The sequencer mutates the graph through [`AudioOutput`] while the audio
/// device pulls blocks with [`Mixer::render`]; both sides lock the same
/// graph, so routing changes and rendering never interleave.
#[derive(Debug, Clone)]
pub struct Mixer {
    graph: Arc<Mutex<MixerGraph>>,
}

impl Mixer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            graph: Arc::new(Mutex::new(MixerGraph {
                sample_rate,
                nodes: HashMap::new(),
                sources: Vec::new(),
                scratch: Vec::new(),
            })),
        }
    }

    fn graph(&self) -> MutexGuard<'_, MixerGraph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn sample_rate(&self) -> u32 {
        self.graph().sample_rate
    }

    pub fn set_sample_rate(&self, sample_rate: u32) {
        self.graph().sample_rate = sample_rate;
    }

    /// Number of live nodes, destination excluded.
    pub fn node_count(&self) -> usize {
        self.graph().nodes.len()
    }

    /// Fills `out` (interleaved, `channels` wide) with the next block.
    pub fn render(&self, out: &mut [f32], channels: usize) {
        self.graph().render(out, channels);
    }

    fn insert(&mut self, kind: Kind) -> NodeId {
        let id = NodeId::unique();
        self.graph().nodes.insert(id, Node { kind, output: None });
        id
    }

    fn frames(&self, offset: f64) -> u64 {
        (offset.max(0.0) * f64::from(self.sample_rate())) as u64
    }
}

impl AudioOutput for Mixer {
    fn create_volume(&mut self) -> NodeId {
        self.insert(Kind::Volume { gain: 1.0 })
    }

    fn create_pan(&mut self) -> NodeId {
        self.insert(Kind::Pan { pan: 0.0 })
    }

    fn create_analysis(&mut self) -> NodeId {
        self.insert(Kind::Analysis { peak: [0.0; 2] })
    }

    fn create_source(&mut self, buffer: Arc<AudioBuffer>, playback_rate: f32) -> NodeId {
        self.insert(Kind::Source(Voice {
            buffer,
            playback_rate,
            position: 0.0,
            start_in: None,
            stop_in: None,
            finished: false,
        }))
    }

    fn connect(&mut self, from: NodeId, to: NodeId) {
        let mut graph = self.graph();
        if to != NodeId::DESTINATION && !graph.nodes.contains_key(&to) {
            return;
        }
        if let Some(node) = graph.nodes.get_mut(&from) {
            node.output = Some(to);
        }
    }

    fn disconnect(&mut self, node: NodeId) {
        let mut graph = self.graph();
        if graph.nodes.remove(&node).is_some() {
            for other in graph.nodes.values_mut() {
                if other.output == Some(node) {
                    other.output = None;
                }
            }
        }
    }

    fn set_gain(&mut self, node: NodeId, gain: f32) {
        if let Some(Node {
            kind: Kind::Volume { gain: current },
            ..
        }) = self.graph().nodes.get_mut(&node)
        {
            *current = gain.max(0.0);
        }
    }

    fn set_pan(&mut self, node: NodeId, pan: f32) {
        if let Some(Node {
            kind: Kind::Pan { pan: current },
            ..
        }) = self.graph().nodes.get_mut(&node)
        {
            *current = pan.clamp(-1.0, 1.0);
        }
    }

    fn start(&mut self, source: NodeId, offset: f64) {
        let frames = self.frames(offset);
        if let Some(Node {
            kind: Kind::Source(voice),
            ..
        }) = self.graph().nodes.get_mut(&source)
        {
            voice.start_in = Some(frames);
        }
    }

    fn stop(&mut self, source: NodeId, offset: f64) {
        let frames = self.frames(offset);
        if let Some(Node {
            kind: Kind::Source(voice),
            ..
        }) = self.graph().nodes.get_mut(&source)
        {
            voice.stop_in = Some(frames);
        }
    }

    fn level(&self, analysis: NodeId) -> Option<[f32; 2]> {
        match self.graph().nodes.get(&analysis)?.kind {
            Kind::Analysis { peak } => Some(peak),
            _ => None,
        }
    }
}
