/// Per-track node chains, kept in step with the active pattern
use crate::audio::{AudioBuffer, AudioOutput, NodeId};
use crate::pattern::{Pattern, PatternId};
use log::debug;
use std::sync::Arc;

/// One track's chain: volume -> pan -> analysis -> destination. Triggered
/// sources feed the volume node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackRoute {
    pub volume: NodeId,
    pub pan: NodeId,
    pub analysis: NodeId,
    pub source: Option<NodeId>,
}

impl TrackRoute {
    fn build<O: AudioOutput>(output: &mut O) -> Self {
        let volume = output.create_volume();
        let pan = output.create_pan();
        let analysis = output.create_analysis();
        output.connect(volume, pan);
        output.connect(pan, analysis);
        output.connect(analysis, NodeId::DESTINATION);

        Self {
            volume,
            pan,
            analysis,
            source: None,
        }
    }

    fn release_source<O: AudioOutput>(&mut self, output: &mut O) {
        if let Some(source) = self.source.take() {
            output.stop(source, 0.0);
            output.disconnect(source);
        }
    }

    fn release<O: AudioOutput>(mut self, output: &mut O) {
        self.release_source(output);
        output.disconnect(self.volume);
        output.disconnect(self.pan);
        output.disconnect(self.analysis);
    }
}

/// What [`RoutingGraph::configure`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingChange {
    /// First activation: one chain per track.
    Built { tracks: usize },
    /// Same pattern, different track count.
    Resized { from: usize, to: usize },
    /// A different pattern became active; chains were resized to fit it.
    Rebuilt { from: usize, to: usize },
    Unchanged,
}

#[derive(Debug, Default)]
pub struct RoutingGraph {
    routes: Vec<TrackRoute>,
    active: Option<PatternId>,
}

impl RoutingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn route(&self, track: usize) -> Option<&TrackRoute> {
        self.routes.get(track)
    }

    pub fn routes(&self) -> &[TrackRoute] {
        &self.routes
    }

    /// The pattern the chains were last fitted to.
    pub fn active(&self) -> Option<PatternId> {
        self.active
    }

    /// True when the chains no longer match `pattern`.
    pub fn is_stale(&self, pattern: &Pattern) -> bool {
        self.active != Some(pattern.id()) || self.routes.len() != pattern.track_count()
    }

    /// Fits the chains to `pattern`, making it the active one.
    pub fn configure<O: AudioOutput>(
        &mut self,
        output: &mut O,
        pattern: &Pattern,
    ) -> RoutingChange {
        let from = self.routes.len();
        let to = pattern.track_count();

        let change = match self.active {
            None => RoutingChange::Built { tracks: to },
            Some(id) if id == pattern.id() && from == to => RoutingChange::Unchanged,
            Some(id) if id == pattern.id() => RoutingChange::Resized { from, to },
            Some(_) => RoutingChange::Rebuilt { from, to },
        };

        self.active = Some(pattern.id());
        self.resize(output, to);

        if change != RoutingChange::Unchanged {
            debug!("routing {change:?}");
        }

        change
    }

    fn resize<O: AudioOutput>(&mut self, output: &mut O, count: usize) {
        while self.routes.len() > count {
            if let Some(route) = self.routes.pop() {
                route.release(output);
            }
        }

        while self.routes.len() < count {
            self.routes.push(TrackRoute::build(output));
        }
    }

    /// Releases every chain; the next `configure` builds from scratch.
    pub fn teardown<O: AudioOutput>(&mut self, output: &mut O) {
        self.resize(output, 0);
        self.active = None;
    }

    /// Plays `buffer` once on `track`, replacing whatever the track was
    /// playing. Returns `false` if the track has no chain.
    pub fn trigger<O: AudioOutput>(
        &mut self,
        output: &mut O,
        track: usize,
        buffer: Arc<AudioBuffer>,
        playback_rate: f32,
        gain: f32,
    ) -> bool {
        let Some(route) = self.routes.get_mut(track) else {
            return false;
        };

        route.release_source(output);

        let source = output.create_source(buffer, playback_rate);
        output.connect(source, route.volume);
        output.set_gain(route.volume, gain);
        output.start(source, 0.0);
        route.source = Some(source);

        true
    }

    pub fn set_gain<O: AudioOutput>(&mut self, output: &mut O, track: usize, gain: f32) -> bool {
        match self.routes.get(track) {
            Some(route) => {
                output.set_gain(route.volume, gain);
                true
            }
            None => false,
        }
    }

    pub fn set_pan<O: AudioOutput>(&mut self, output: &mut O, track: usize, pan: f32) -> bool {
        match self.routes.get(track) {
            Some(route) => {
                output.set_pan(route.pan, pan);
                true
            }
            None => false,
        }
    }

    /// Stops and releases every in-flight source, keeping the chains.
    pub fn silence<O: AudioOutput>(&mut self, output: &mut O) {
        for route in &mut self.routes {
            route.release_source(output);
        }
    }

    /// Peak level of every chain's analysis node, in track order.
    pub fn levels<O: AudioOutput>(&self, output: &O) -> Vec<[f32; 2]> {
        self.routes
            .iter()
            .map(|route| output.level(route.analysis).unwrap_or_default())
            .collect()
    }
}

/// Chain used to audition samples outside of playback: volume -> pan ->
/// destination.
#[derive(Debug)]
pub struct PreviewRoute {
    volume: NodeId,
    source: Option<NodeId>,
}

impl PreviewRoute {
    pub fn build<O: AudioOutput>(output: &mut O) -> Self {
        let volume = output.create_volume();
        let pan = output.create_pan();
        output.connect(volume, pan);
        output.connect(pan, NodeId::DESTINATION);

        Self {
            volume,
            source: None,
        }
    }

    pub fn play<O: AudioOutput>(&mut self, output: &mut O, buffer: Arc<AudioBuffer>, rate: f32) {
        self.stop(output);

        let source = output.create_source(buffer, rate);
        output.connect(source, self.volume);
        output.start(source, 0.0);
        self.source = Some(source);
    }

    pub fn stop<O: AudioOutput>(&mut self, output: &mut O) {
        if let Some(source) = self.source.take() {
            output.stop(source, 0.0);
            output.disconnect(source);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.source.is_some()
    }
}
